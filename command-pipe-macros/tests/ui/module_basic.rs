use command_pipe::{
    CommandHandler, CommandPipe, command_module,
    scan::{Capability, Registration},
};

#[command_module]
mod orders {
    use command_pipe::{
        CancellationToken, CommandContext, CommandExecutor, CommandValidator, PipeError,
        ValidationResult, async_trait,
    };

    pub struct PlaceOrder {
        pub quantity: u32,
    }

    pub struct PlaceOrderHandler;

    #[async_trait]
    impl CommandExecutor<PlaceOrder, u64> for PlaceOrderHandler {
        async fn execute(&self, command: &PlaceOrder, _cancel: &CancellationToken) -> Result<u64, PipeError> {
            Ok(command.quantity as u64)
        }
    }

    #[derive(Default)]
    pub struct QuantityValidator {
        _max: u32,
    }

    #[async_trait]
    impl CommandValidator<PlaceOrder> for QuantityValidator {
        async fn validate(&self, _command: &PlaceOrder, _cancel: &CancellationToken) -> ValidationResult {
            ValidationResult::valid()
        }
    }

    pub struct Stateful {
        _calls: u32,
    }

    #[async_trait]
    impl command_pipe::CommandHandler<PlaceOrder, bool> for Stateful {
        async fn handle(
            &self,
            _ctx: &mut CommandContext<PlaceOrder, bool>,
            _cancel: &CancellationToken,
        ) -> Result<(), PipeError> {
            Ok(())
        }
    }
}

fn main() {
    let module = orders::module();
    assert!(module.name().ends_with("orders"));
    assert_eq!(module.types().len(), 4);

    let plan: Vec<_> = module
        .plan()
        .into_iter()
        .map(|d| (d.target, d.capability, d.outcome.is_ok()))
        .collect();
    assert_eq!(
        plan,
        vec![
            ("PlaceOrderHandler", Capability::Handler, true),
            ("QuantityValidator", Capability::Validator, true),
            ("Stateful", Capability::Handler, false),
        ]
    );
    assert_eq!(module.plan()[0].outcome, Ok(Registration::Closed));

    let pipe = CommandPipe::configure(|pipe| {
        pipe.scan(orders::module());
    });
    assert!(pipe.registry().contains::<dyn CommandHandler<orders::PlaceOrder, u64>>());
    assert!(!pipe.registry().contains::<dyn CommandHandler<orders::PlaceOrder, bool>>());
}
