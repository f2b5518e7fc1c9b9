use crate::{context::CommandContext, error::PipeError};
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 命令处理器（Command Handler）
///
/// 管道的终端：读取上下文中的命令并写入结果。
/// 每个 `(C, R)` 组合在一个管道中只解析出一个处理器（后注册者生效）。
#[async_trait]
pub trait CommandHandler<C, R>: Send + Sync
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    async fn handle(
        &self,
        ctx: &mut CommandContext<C, R>,
        cancel: &CancellationToken,
    ) -> Result<(), PipeError>;
}

/// 命令执行器
///
/// 处理器的简化形式：只关心“命令进、结果出”，由 [`Executor`] 适配为处理器。
#[async_trait]
pub trait CommandExecutor<C, R>: Send + Sync
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    async fn execute(&self, command: &C, cancel: &CancellationToken) -> Result<R, PipeError>;
}

/// 执行器到处理器的适配
pub struct Executor<E>(pub E);

#[async_trait]
impl<C, R, E> CommandHandler<C, R> for Executor<E>
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
    E: CommandExecutor<C, R>,
{
    async fn handle(
        &self,
        ctx: &mut CommandContext<C, R>,
        cancel: &CancellationToken,
    ) -> Result<(), PipeError> {
        let result = self.0.execute(ctx.command(), cancel).await?;
        ctx.set_result(result);
        Ok(())
    }
}

/// 闭包处理器
///
/// 以 `Fn(Arc<C>, CancellationToken) -> Future<Output = Result<R, PipeError>>`
/// 的形式注册一次性的处理逻辑。
pub struct RelayHandler<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> RelayHandler<F, Fut> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<C, R, F, Fut> CommandHandler<C, R> for RelayHandler<F, Fut>
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
    F: Fn(Arc<C>, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, PipeError>> + Send + 'static,
{
    async fn handle(
        &self,
        ctx: &mut CommandContext<C, R>,
        cancel: &CancellationToken,
    ) -> Result<(), PipeError> {
        let result = (self.f)(ctx.shared_command(), cancel.clone()).await?;
        ctx.set_result(result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Double(u32);

    struct Doubler;

    #[async_trait]
    impl CommandExecutor<Double, u32> for Doubler {
        async fn execute(&self, command: &Double, _cancel: &CancellationToken) -> Result<u32, PipeError> {
            Ok(command.0 * 2)
        }
    }

    #[tokio::test]
    async fn executor_writes_result_into_context() {
        let handler = Executor(Doubler);
        let mut ctx = CommandContext::<Double, u32>::new(Double(21));
        handler.handle(&mut ctx, &CancellationToken::new()).await.unwrap();
        assert_eq!(*ctx.result(), 42);
    }

    #[tokio::test]
    async fn relay_handler_runs_closure() {
        let handler = RelayHandler::new(|cmd: Arc<Double>, _cancel: CancellationToken| async move {
            Ok::<_, PipeError>(cmd.0 + 1)
        });
        let mut ctx = CommandContext::<Double, u32>::new(Double(1));
        handler.handle(&mut ctx, &CancellationToken::new()).await.unwrap();
        assert_eq!(*ctx.result(), 2);
    }

    #[tokio::test]
    async fn relay_handler_error_leaves_result_untouched() {
        let handler = RelayHandler::new(|_cmd: Arc<Double>, _cancel: CancellationToken| async move {
            Err::<u32, _>(PipeError::msg("boom"))
        });
        let mut ctx = CommandContext::with_result(Double(1), 5_u32);
        let err = handler.handle(&mut ctx, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(*ctx.result(), 5);
    }
}
