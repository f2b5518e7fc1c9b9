use crate::{
    context::CommandContext, error::PipeError, handler::CommandHandler,
    middleware::CommandMiddleware,
};
use async_trait::async_trait;
use std::any::type_name;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 链上的后续部分
///
/// 由管道构造并交给中间件；`run` 消耗自身，推进到下一个中间件或处理器。
pub struct Next<'a, C, R> {
    link: Link<'a, C, R>,
    cancel: &'a CancellationToken,
}

enum Link<'a, C, R> {
    Middleware {
        middleware: &'a dyn CommandMiddleware<C, R>,
        next: Box<Next<'a, C, R>>,
    },
    Handler(&'a dyn CommandHandler<C, R>),
    Continuation(Box<dyn Continuation<C, R> + 'a>),
}

/// 以任意逻辑继续执行（用于开放泛型中间件回到具体类型的链上）
pub(crate) trait Continuation<C, R>: Send {
    fn resume<'c>(
        self: Box<Self>,
        ctx: &'c mut CommandContext<C, R>,
    ) -> BoxFuture<'c, Result<(), PipeError>>
    where
        Self: 'c;
}

impl<'a, C, R> Next<'a, C, R>
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    pub(crate) fn handler(
        handler: &'a dyn CommandHandler<C, R>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            link: Link::Handler(handler),
            cancel,
        }
    }

    pub(crate) fn middleware(middleware: &'a dyn CommandMiddleware<C, R>, next: Self) -> Self {
        let cancel = next.cancel;
        Self {
            link: Link::Middleware {
                middleware,
                next: Box::new(next),
            },
            cancel,
        }
    }

    pub(crate) fn continuation(
        continuation: Box<dyn Continuation<C, R> + 'a>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            link: Link::Continuation(continuation),
            cancel,
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        self.cancel
    }

    /// 执行链的剩余部分
    ///
    /// 到达处理器且其成功返回后，上下文被标记为“处理器已执行”。
    pub async fn run(self, ctx: &mut CommandContext<C, R>) -> Result<(), PipeError> {
        match self.link {
            Link::Middleware { middleware, next } => middleware.invoke(ctx, *next, self.cancel).await,
            Link::Handler(handler) => {
                handler.handle(ctx, self.cancel).await?;
                ctx.mark_handler_executed();
                Ok(())
            }
            Link::Continuation(continuation) => continuation.resume(ctx).await,
        }
    }
}

/// 两个中间件的组合：外层的 `next` 先进入内层
struct Connector<C, R> {
    outer: Arc<dyn CommandMiddleware<C, R>>,
    inner: Arc<dyn CommandMiddleware<C, R>>,
}

#[async_trait]
impl<C, R> CommandMiddleware<C, R> for Connector<C, R>
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    async fn invoke(
        &self,
        ctx: &mut CommandContext<C, R>,
        next: Next<'_, C, R>,
        cancel: &CancellationToken,
    ) -> Result<(), PipeError> {
        let next = Next::middleware(self.inner.as_ref(), next);
        self.outer.invoke(ctx, next, cancel).await
    }
}

/// 空链：直接推进
struct PassThrough;

#[async_trait]
impl<C, R> CommandMiddleware<C, R> for PassThrough
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    async fn invoke(
        &self,
        ctx: &mut CommandContext<C, R>,
        next: Next<'_, C, R>,
        _cancel: &CancellationToken,
    ) -> Result<(), PipeError> {
        next.run(ctx).await
    }
}

/// 在中间件前后各发出一条 debug 事件
struct Instrumented<C, R> {
    inner: Arc<dyn CommandMiddleware<C, R>>,
}

#[async_trait]
impl<C, R> CommandMiddleware<C, R> for Instrumented<C, R>
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn invoke(
        &self,
        ctx: &mut CommandContext<C, R>,
        next: Next<'_, C, R>,
        cancel: &CancellationToken,
    ) -> Result<(), PipeError> {
        let middleware = self.inner.name();
        let command = type_name::<C>();

        debug!(middleware, command, "executing middleware");
        self.inner.invoke(ctx, next, cancel).await?;
        debug!(middleware, command, "middleware executed");
        Ok(())
    }
}

/// 一次分发所用的中间件链
pub(crate) struct Pipeline<C, R> {
    chain: Arc<dyn CommandMiddleware<C, R>>,
}

impl<C, R> Pipeline<C, R>
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    /// 按注册顺序左折叠：第一个中间件位于最外层
    pub(crate) fn compose(middlewares: Vec<Arc<dyn CommandMiddleware<C, R>>>, trace: bool) -> Self {
        let chain = middlewares
            .into_iter()
            .map(|m| {
                if trace {
                    Arc::new(Instrumented { inner: m }) as Arc<dyn CommandMiddleware<C, R>>
                } else {
                    m
                }
            })
            .reduce(|outer, inner| Arc::new(Connector { outer, inner }))
            .unwrap_or_else(|| Arc::new(PassThrough));

        Self { chain }
    }

    pub(crate) async fn run(
        &self,
        ctx: &mut CommandContext<C, R>,
        handler: &dyn CommandHandler<C, R>,
        cancel: &CancellationToken,
    ) -> Result<(), PipeError> {
        self.chain.invoke(ctx, Next::handler(handler, cancel), cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Ping;

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<String>>,
        executed: AtomicUsize,
    }

    impl Recorder {
        fn push(&self, line: impl Into<String>) {
            self.lines.lock().unwrap().push(line.into());
        }

        fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }
    }

    struct Handler(Arc<Recorder>);

    #[async_trait]
    impl CommandHandler<Ping, u32> for Handler {
        async fn handle(&self, ctx: &mut CommandContext<Ping, u32>, _cancel: &CancellationToken) -> Result<(), PipeError> {
            self.0.executed.fetch_add(1, Ordering::SeqCst);
            self.0.push("handler");
            ctx.set_result(7);
            Ok(())
        }
    }

    struct Tag {
        name: &'static str,
        recorder: Arc<Recorder>,
        short_circuit: bool,
    }

    #[async_trait]
    impl CommandMiddleware<Ping, u32> for Tag {
        async fn invoke(
            &self,
            ctx: &mut CommandContext<Ping, u32>,
            next: Next<'_, Ping, u32>,
            _cancel: &CancellationToken,
        ) -> Result<(), PipeError> {
            self.recorder.push(format!("{} before", self.name));
            if self.short_circuit {
                return Ok(());
            }
            next.run(ctx).await?;
            self.recorder.push(format!("{} after", self.name));
            Ok(())
        }
    }

    fn tag(name: &'static str, recorder: &Arc<Recorder>) -> Arc<dyn CommandMiddleware<Ping, u32>> {
        Arc::new(Tag {
            name,
            recorder: recorder.clone(),
            short_circuit: false,
        })
    }

    #[tokio::test]
    async fn empty_chain_runs_handler_once() {
        let recorder = Arc::new(Recorder::default());
        let pipeline = Pipeline::compose(Vec::new(), true);
        let mut ctx = CommandContext::<Ping, u32>::new(Ping);

        pipeline
            .run(&mut ctx, &Handler(recorder.clone()), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(recorder.executed.load(Ordering::SeqCst), 1);
        assert!(ctx.handler_executed());
        assert_eq!(*ctx.result(), 7);
    }

    #[tokio::test]
    async fn middlewares_nest_in_registration_order() {
        let recorder = Arc::new(Recorder::default());
        let pipeline = Pipeline::compose(
            vec![tag("a", &recorder), tag("b", &recorder), tag("c", &recorder)],
            false,
        );
        let mut ctx = CommandContext::<Ping, u32>::new(Ping);

        pipeline
            .run(&mut ctx, &Handler(recorder.clone()), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            recorder.lines(),
            vec!["a before", "b before", "c before", "handler", "c after", "b after", "a after"]
        );
    }

    #[tokio::test]
    async fn short_circuit_skips_inner_links() {
        let recorder = Arc::new(Recorder::default());
        let stop: Arc<dyn CommandMiddleware<Ping, u32>> = Arc::new(Tag {
            name: "stop",
            recorder: recorder.clone(),
            short_circuit: true,
        });
        let pipeline = Pipeline::compose(vec![tag("a", &recorder), stop, tag("c", &recorder)], true);
        let mut ctx = CommandContext::<Ping, u32>::new(Ping);

        pipeline
            .run(&mut ctx, &Handler(recorder.clone()), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(recorder.lines(), vec!["a before", "stop before", "a after"]);
        assert_eq!(recorder.executed.load(Ordering::SeqCst), 0);
        assert!(!ctx.handler_executed());
        assert_eq!(*ctx.result(), 0);
    }

    struct Failing;

    #[async_trait]
    impl CommandHandler<Ping, u32> for Failing {
        async fn handle(&self, _ctx: &mut CommandContext<Ping, u32>, _cancel: &CancellationToken) -> Result<(), PipeError> {
            Err(PipeError::msg("handler failed"))
        }
    }

    #[tokio::test]
    async fn handler_error_propagates_and_flag_stays_clear() {
        let recorder = Arc::new(Recorder::default());
        let pipeline = Pipeline::compose(vec![tag("a", &recorder)], true);
        let mut ctx = CommandContext::<Ping, u32>::new(Ping);

        let err = pipeline
            .run(&mut ctx, &Failing, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "handler failed");
        assert!(!ctx.handler_executed());
        assert_eq!(recorder.lines(), vec!["a before"]);
    }

    #[test]
    fn instrumented_reports_inner_name() {
        let recorder = Arc::new(Recorder::default());
        let wrapped = Instrumented { inner: tag("a", &recorder) };
        assert!(CommandMiddleware::<Ping, u32>::name(&wrapped).ends_with("Tag"));
    }
}
