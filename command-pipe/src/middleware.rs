use crate::{
    chain::{BoxFuture, Next},
    context::CommandContext,
    error::PipeError,
};
use async_trait::async_trait;
use std::mem;
use tokio_util::sync::CancellationToken;

/// 命令中间件（Command Middleware）
///
/// 包裹在处理器外层的一环，可以：
/// - 在调用 `next.run(ctx)` 前后读写上下文；
/// - 不调用 `next` 直接短路（此时处理器不会执行）；
/// - 返回错误中断整条链。
///
/// `next` 按值传入，因此每个中间件至多推进一次。
#[async_trait]
pub trait CommandMiddleware<C, R>: Send + Sync
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// 实现类型名，用于追踪日志
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    async fn invoke(
        &self,
        ctx: &mut CommandContext<C, R>,
        next: Next<'_, C, R>,
        cancel: &CancellationToken,
    ) -> Result<(), PipeError>;
}

/// 闭包中间件
///
/// 闭包的签名与 [`CommandMiddleware::invoke`] 相同，返回装箱的 future：
///
/// ```rust
/// use command_pipe::CommandPipe;
///
/// struct Ping;
///
/// let pipe = CommandPipe::configure(|pipe| {
///     pipe.add_middleware_fn::<Ping, u32, _>(|ctx, next, _cancel| {
///         Box::pin(async move {
///             next.run(ctx).await?;
///             *ctx.result_mut() += 1;
///             Ok(())
///         })
///     });
/// });
/// # let _ = pipe;
/// ```
pub struct RelayMiddleware<F> {
    f: F,
}

impl<F> RelayMiddleware<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<C, R, F> CommandMiddleware<C, R> for RelayMiddleware<F>
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
    F: for<'a> Fn(&'a mut CommandContext<C, R>, Next<'a, C, R>, &'a CancellationToken) -> BoxFuture<'a, Result<(), PipeError>>
        + Send
        + Sync
        + 'static,
{
    async fn invoke(
        &self,
        ctx: &mut CommandContext<C, R>,
        next: Next<'_, C, R>,
        cancel: &CancellationToken,
    ) -> Result<(), PipeError> {
        (self.f)(ctx, next, cancel).await
    }
}

/// 命令拦截器
///
/// 中间件的简化形式：只看到命令本身与一个返回结果的 `proceed`，
/// 返回值即写入上下文的结果。由 [`Intercepted`] 适配为中间件。
///
/// 不调用 `proceed` 即短路，处理器不会执行。
#[async_trait]
pub trait CommandInterceptor<C, R>: Send + Sync
where
    C: Send + Sync + 'static,
    R: Default + Send + Sync + 'static,
{
    async fn intercept(
        &self,
        command: &C,
        proceed: Proceed<'_, C, R>,
        cancel: &CancellationToken,
    ) -> Result<R, PipeError>;
}

/// 拦截器看到的链的后续部分
pub struct Proceed<'a, C, R> {
    ctx: &'a mut CommandContext<C, R>,
    next: Next<'a, C, R>,
}

impl<C, R> Proceed<'_, C, R>
where
    C: Send + Sync + 'static,
    R: Default + Send + Sync + 'static,
{
    /// 执行链的剩余部分并取出结果
    pub async fn run(self) -> Result<R, PipeError> {
        let Proceed { ctx, next } = self;
        next.run(ctx).await?;
        Ok(mem::take(&mut ctx.result))
    }
}

/// 拦截器到中间件的适配
pub struct Intercepted<I>(pub I);

#[async_trait]
impl<C, R, I> CommandMiddleware<C, R> for Intercepted<I>
where
    C: Send + Sync + 'static,
    R: Default + Send + Sync + 'static,
    I: CommandInterceptor<C, R>,
{
    fn name(&self) -> &'static str {
        std::any::type_name::<I>()
    }

    async fn invoke(
        &self,
        ctx: &mut CommandContext<C, R>,
        next: Next<'_, C, R>,
        cancel: &CancellationToken,
    ) -> Result<(), PipeError> {
        let command = ctx.shared_command();
        let result = self
            .0
            .intercept(&command, Proceed { ctx: &mut *ctx, next }, cancel)
            .await?;
        ctx.set_result(result);
        Ok(())
    }
}
