use command_pipe::{CancellationToken, CommandPipe, CommandSenderExt, OpenCommandMiddleware, PipeError, command_module};
use std::sync::Arc;

#[command_module]
pub mod metrics {
    use command_pipe::{CancellationToken, CommandContext, CommandMiddleware, Next, PipeError, async_trait};
    use std::marker::PhantomData;

    #[derive(Default)]
    pub struct Counted<C, R> {
        pub hits: u32,
        _marker: PhantomData<fn() -> (C, R)>,
    }

    #[async_trait]
    impl<C, R> CommandMiddleware<C, R> for Counted<C, R>
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
}

struct Ping;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let module = metrics::module();
    let decision = module.plan().into_iter().next().unwrap();
    assert_eq!(decision.target, "Counted");
    assert!(decision.outcome.is_ok());

    let pipe = CommandPipe::configure(|pipe| {
        pipe.scan(metrics::module())
            .add_handler_fn(|_cmd: Arc<Ping>, _cancel: CancellationToken| async { Ok::<u32, PipeError>(5) });
    });
    assert_eq!(pipe.registry().implementations::<dyn OpenCommandMiddleware>().len(), 1);

    let result: u32 = pipe.send(Ping, &CancellationToken::new()).await.unwrap();
    assert_eq!(result, 5);
}
