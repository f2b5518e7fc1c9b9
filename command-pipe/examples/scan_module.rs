use command_pipe::scan::ScanDecision;
use command_pipe::{CancellationToken, CommandPipe, CommandSenderExt, command_module};

#[command_module]
pub mod inventory {
    use command_pipe::{
        CancellationToken, CommandContext, CommandExecutor, CommandMiddleware, CommandValidator,
        Next, PipeError, ValidationFailure, ValidationResult, async_trait,
    };
    use std::marker::PhantomData;

    #[derive(Debug)]
    pub struct Restock {
        pub sku: String,
        pub quantity: u32,
    }

    pub struct RestockHandler;

    #[async_trait]
    impl CommandExecutor<Restock, u32> for RestockHandler {
        async fn execute(&self, cmd: &Restock, _cancel: &CancellationToken) -> Result<u32, PipeError> {
            println!("restocking {} x{}", cmd.sku, cmd.quantity);
            Ok(cmd.quantity)
        }
    }

    pub struct QuantityValidator;

    #[async_trait]
    impl CommandValidator<Restock> for QuantityValidator {
        async fn validate(&self, cmd: &Restock, _cancel: &CancellationToken) -> ValidationResult {
            if cmd.quantity == 0 {
                ValidationResult::with_errors([ValidationFailure::new(
                    "GreaterThan",
                    "quantity must be positive",
                    "quantity",
                )])
            } else {
                ValidationResult::valid()
            }
        }
    }

    /// 对所有命令生效
    pub struct Stopwatch<C, R>(PhantomData<fn() -> (C, R)>);

    #[async_trait]
    impl<C, R> CommandMiddleware<C, R> for Stopwatch<C, R>
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        async fn invoke(&self, ctx: &mut CommandContext<C, R>, next: Next<'_, C, R>, _cancel: &CancellationToken) -> Result<(), PipeError> {
            let started = std::time::Instant::now();
            let outcome = next.run(ctx).await;
            println!("handled in {:?}", started.elapsed());
            outcome
        }
    }

    // 没有 Default，不会被注册
    pub struct Warehouse {
        pub name: String,
    }

    #[async_trait]
    impl CommandExecutor<Restock, u32> for Warehouse {
        async fn execute(&self, _cmd: &Restock, _cancel: &CancellationToken) -> Result<u32, PipeError> {
            Ok(0)
        }
    }
}

fn describe(decision: &ScanDecision) {
    match decision.outcome {
        Ok(registration) => println!("{:<20} {:?} -> {:?}", decision.target, decision.capability, registration),
        Err(reason) => println!("{:<20} {:?} skipped: {:?}", decision.target, decision.capability, reason),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let module = inventory::module();
    println!("module {}", module.name());
    module.plan().iter().for_each(describe);

    let pipe = CommandPipe::configure(|pipe| {
        pipe.scan(module);
    });
    let cancel = CancellationToken::new();

    let restocked: u32 = pipe
        .send(
            inventory::Restock {
                sku: "A-1".into(),
                quantity: 12,
            },
            &cancel,
        )
        .await?;
    println!("restocked {restocked}");

    // 校验失败时处理器不执行，返回默认值
    let skipped: u32 = pipe
        .send(
            inventory::Restock {
                sku: "A-2".into(),
                quantity: 0,
            },
            &cancel,
        )
        .await?;
    println!("restocked {skipped}");
    Ok(())
}
