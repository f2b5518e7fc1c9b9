use command_pipe::{CommandPipe, OpenCommandMiddleware, command_module, scan::SkipReason};

#[command_module]
pub mod app {
    pub mod middleware {
        use command_pipe::{CancellationToken, CommandContext, CommandMiddleware, Next, PipeError, async_trait};
        use std::marker::PhantomData;

        pub struct Timing<C, R>(PhantomData<fn() -> (C, R)>);

        #[async_trait]
        impl<C, R> CommandMiddleware<C, R> for Timing<C, R>
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

        pub struct OnlyBool<C> {
            _marker: PhantomData<fn() -> C>,
        }

        #[async_trait]
        impl<C> CommandMiddleware<C, bool> for OnlyBool<C>
        where
            C: Send + Sync + 'static,
        {
            async fn invoke(
                &self,
                ctx: &mut CommandContext<C, bool>,
                next: Next<'_, C, bool>,
                _cancel: &CancellationToken,
            ) -> Result<(), PipeError> {
                next.run(ctx).await
            }
        }
    }

    mod private {
        pub struct Hidden;
    }

    pub mod skipped {
        use command_pipe::{CancellationToken, CommandExecutor, PipeError, async_trait};

        #[scan(skip)]
        pub struct Manual;

        #[async_trait]
        impl CommandExecutor<u8, bool> for self::Manual {
            async fn execute(&self, _command: &u8, _cancel: &CancellationToken) -> Result<bool, PipeError> {
                Ok(true)
            }
        }
    }
}

fn main() {
    let module = app::module();
    let outcomes: Vec<_> = module
        .plan()
        .into_iter()
        .map(|d| (d.target, d.outcome.err()))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("middleware::Timing", None),
            ("middleware::OnlyBool", Some(SkipReason::PartiallyGeneric)),
            ("skipped::Manual", Some(SkipReason::Excluded)),
        ]
    );

    let hidden = module.types().iter().find(|t| t.path == "private::Hidden").unwrap();
    assert_eq!(hidden.visibility, command_pipe::scan::Visibility::Restricted);

    let pipe = CommandPipe::configure(|pipe| {
        pipe.scan(app::module());
    });
    assert_eq!(pipe.registry().implementations::<dyn OpenCommandMiddleware>().len(), 1);
}
