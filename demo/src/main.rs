use command_pipe::{
    CancellationToken, CommandContext, CommandPipe, CommandSender, CommandSenderExt, DynCommand,
    PipeConfig, PipeError, command_module,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[command_module]
pub mod accounts {
    use async_trait::async_trait;
    use command_pipe::{
        CancellationToken, Command, CommandContext, CommandExecutor, CommandHandler,
        CommandMiddleware, CommandValidator, Next, PipeError, ValidationFailure, ValidationResult,
    };
    use std::collections::HashMap;
    use std::marker::PhantomData;
    use std::sync::{LazyLock, Mutex};

    static BALANCES: LazyLock<Mutex<HashMap<String, i64>>> = LazyLock::new(Default::default);

    #[derive(Debug, thiserror::Error)]
    pub enum AccountError {
        #[error("account already opened: {0}")]
        AlreadyOpened(String),
        #[error("account not opened: {0}")]
        NotOpened(String),
        #[error("insufficient funds: balance {balance}, requested {requested}")]
        InsufficientFunds { balance: i64, requested: i64 },
        #[error("account store poisoned")]
        Poisoned,
    }

    fn with_balances<T>(f: impl FnOnce(&mut HashMap<String, i64>) -> Result<T, AccountError>) -> Result<T, PipeError> {
        let mut balances = BALANCES.lock().map_err(|_| PipeError::handler(AccountError::Poisoned))?;
        f(&mut balances).map_err(PipeError::handler)
    }

    #[derive(Debug)]
    pub struct OpenAccount {
        pub id: String,
        pub initial_balance: i64,
    }

    impl Command for OpenAccount {
        type Result = bool;
    }

    #[derive(Debug)]
    pub struct Withdraw {
        pub id: String,
        pub amount: i64,
    }

    impl Command for Withdraw {
        type Result = i64;
    }

    pub struct OpenAccountHandler;

    #[async_trait]
    impl CommandExecutor<OpenAccount, bool> for OpenAccountHandler {
        async fn execute(&self, cmd: &OpenAccount, _cancel: &CancellationToken) -> Result<bool, PipeError> {
            with_balances(|balances| {
                if balances.contains_key(&cmd.id) {
                    return Err(AccountError::AlreadyOpened(cmd.id.clone()));
                }
                balances.insert(cmd.id.clone(), cmd.initial_balance);
                Ok(true)
            })
        }
    }

    pub struct WithdrawHandler;

    #[async_trait]
    impl CommandHandler<Withdraw, i64> for WithdrawHandler {
        async fn handle(&self, ctx: &mut CommandContext<Withdraw, i64>, _cancel: &CancellationToken) -> Result<(), PipeError> {
            let cmd = ctx.command();
            let remaining = with_balances(|balances| {
                let balance = balances
                    .get_mut(&cmd.id)
                    .ok_or_else(|| AccountError::NotOpened(cmd.id.clone()))?;
                if *balance < cmd.amount {
                    return Err(AccountError::InsufficientFunds {
                        balance: *balance,
                        requested: cmd.amount,
                    });
                }
                *balance -= cmd.amount;
                Ok(*balance)
            })?;
            ctx.set_result(remaining);
            Ok(())
        }
    }

    pub struct PositiveAmount;

    #[async_trait]
    impl CommandValidator<Withdraw> for PositiveAmount {
        async fn validate(&self, cmd: &Withdraw, _cancel: &CancellationToken) -> ValidationResult {
            if cmd.amount > 0 {
                ValidationResult::valid()
            } else {
                ValidationResult::with_errors([ValidationFailure::new(
                    "GreaterThan",
                    "amount must be positive",
                    "amount",
                )])
            }
        }
    }

    /// 记录每条命令的执行结果
    pub struct Audit<C, R> {
        _command: PhantomData<fn() -> C>,
        _result: PhantomData<fn() -> R>,
    }

    #[async_trait]
    impl<C, R> CommandMiddleware<C, R> for Audit<C, R>
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        async fn invoke(&self, ctx: &mut CommandContext<C, R>, next: Next<'_, C, R>, _cancel: &CancellationToken) -> Result<(), PipeError> {
            let outcome = next.run(ctx).await;
            tracing::info!(
                command = std::any::type_name::<C>(),
                executed = ctx.handler_executed(),
                failed = outcome.is_err(),
                "audit"
            );
            outcome
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let pipe = CommandPipe::configure(|pipe| {
        pipe.with_config(PipeConfig::builder().trace_middleware(true).build())
            .scan(accounts::module())
            .add_rules::<accounts::OpenAccount>(|rules| {
                rules
                    .must("id", "id must not be empty", |c| !c.id.is_empty())
                    .must("initial_balance", "initial balance must not be negative", |c| c.initial_balance >= 0)
            });
    });
    let cancel = CancellationToken::new();

    let opened = pipe
        .send_command(
            accounts::OpenAccount {
                id: "acc-1".into(),
                initial_balance: 100,
            },
            &cancel,
        )
        .await?;
    info!(opened, "open acc-1");

    let remaining = pipe
        .send_command(
            accounts::Withdraw {
                id: "acc-1".into(),
                amount: 30,
            },
            &cancel,
        )
        .await?;
    info!(remaining, "withdraw 30 from acc-1");

    // 校验失败
    let mut ctx = CommandContext::<_, bool>::new(accounts::OpenAccount {
        id: String::new(),
        initial_balance: -5,
    });
    pipe.send_context(&mut ctx, &cancel).await?;
    for failure in ctx.validation_failures().unwrap_or_default() {
        warn!(property = %failure.property_name, code = %failure.error_code, "{}", failure.error_message);
    }

    // 处理器返回的领域错误原样透出
    let overdraw = pipe
        .send_command(
            accounts::Withdraw {
                id: "acc-1".into(),
                amount: 1_000,
            },
            &cancel,
        )
        .await;
    if let Err(err) = overdraw {
        match err.downcast_ref::<accounts::AccountError>() {
            Some(domain) => warn!(error = %domain, "withdraw rejected"),
            None => return Err(err.into()),
        }
    }

    // 装箱分发
    let remaining: i64 = pipe
        .send_dyn(
            Some(DynCommand::new(accounts::Withdraw {
                id: "acc-1".into(),
                amount: 20,
            })),
            &cancel,
        )
        .await?;
    info!(remaining, "boxed withdraw 20 from acc-1");

    match pipe.send_dyn::<i64>(None, &cancel).await {
        Err(PipeError::NullArgument { parameter }) => warn!(parameter, "missing command"),
        other => info!(?other, "unexpected"),
    }

    Ok(())
}
