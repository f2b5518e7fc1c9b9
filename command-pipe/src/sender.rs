use crate::{command::Command, context::CommandContext, error::PipeError};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// 命令发送者（Command Sender）
///
/// 以调用方构造好的上下文执行一次分发：
/// 解析 `(C, R)` 的处理器，组装中间件链并运行，返回上下文中的结果。
///
/// 找不到处理器时返回 `HandlerNotFound`，此时不会运行任何中间件。
#[async_trait]
pub trait CommandSender: Send + Sync {
    async fn send_context<'c, C, R>(
        &self,
        context: &'c mut CommandContext<C, R>,
        cancel: &CancellationToken,
    ) -> Result<&'c R, PipeError>
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static;
}

/// 发送命令的便捷方法
#[async_trait]
pub trait CommandSenderExt: CommandSender {
    /// 以命令值发送，返回结果值
    ///
    /// 校验失败时处理器不会执行，返回的是 `R::default()`；
    /// 需要读取校验失败时请使用 `send_context`。
    async fn send<C, R>(&self, command: C, cancel: &CancellationToken) -> Result<R, PipeError>
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
    {
        let mut context = CommandContext::new(command);
        self.send_context(&mut context, cancel).await?;
        Ok(context.into_result())
    }

    /// 发送结果为 `bool` 的命令
    async fn execute<C>(&self, command: C, cancel: &CancellationToken) -> Result<bool, PipeError>
    where
        C: Send + Sync + 'static,
    {
        self.send::<C, bool>(command, cancel).await
    }

    /// 按命令标记推断结果类型发送
    async fn send_command<C>(&self, command: C, cancel: &CancellationToken) -> Result<C::Result, PipeError>
    where
        C: Command,
    {
        self.send::<C, C::Result>(command, cancel).await
    }
}

impl<T> CommandSenderExt for T where T: CommandSender + ?Sized {}
