use command_pipe::{
    CancellationToken, CommandContext, CommandExecutor, CommandHandler, CommandPipe, DynCommand,
    PipeError, async_trait,
};
use tokio::task::JoinSet;

#[derive(Debug)]
struct Ping(u32);

#[derive(Debug)]
struct Unknown;

#[derive(Default)]
struct PingHandler;

#[async_trait]
impl CommandHandler<Ping, u32> for PingHandler {
    async fn handle(&self, ctx: &mut CommandContext<Ping, u32>, _cancel: &CancellationToken) -> Result<(), PipeError> {
        let value = ctx.command().0 * 2;
        ctx.set_result(value);
        Ok(())
    }
}

#[derive(Default)]
struct Toggle;

#[async_trait]
impl CommandExecutor<Ping, bool> for Toggle {
    async fn execute(&self, command: &Ping, _cancel: &CancellationToken) -> Result<bool, PipeError> {
        Ok(command.0 % 2 == 0)
    }
}

fn pipe() -> CommandPipe {
    CommandPipe::configure(|pipe| {
        pipe.add_handler::<Ping, u32, PingHandler>()
            .add_executor::<Ping, bool, Toggle>();
    })
}

#[tokio::test]
async fn missing_command_is_a_null_argument() {
    let err = pipe()
        .send_dyn::<u32>(None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PipeError::NullArgument { parameter: "command" }));
}

#[tokio::test]
async fn boxed_command_reaches_its_typed_handler() {
    let pipe = pipe();
    let cancel = CancellationToken::new();

    let doubled = pipe.send_dyn::<u32>(Some(DynCommand::new(Ping(21))), &cancel).await.unwrap();
    let even = pipe.execute_dyn(Some(DynCommand::new(Ping(4))), &cancel).await.unwrap();

    assert_eq!(doubled, 42);
    assert!(even);
}

#[tokio::test]
async fn unregistered_command_type_is_not_found() {
    let pipe = pipe();
    let err = pipe
        .send_dyn::<u32>(Some(DynCommand::new(Unknown)), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        PipeError::HandlerNotFound { command, result } => {
            assert!(command.ends_with("Unknown"));
            assert_eq!(result, "u32");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(pipe.proxies_built(), 0);
}

#[tokio::test]
async fn wrong_result_type_names_the_requested_result() {
    let pipe = pipe();
    let err = pipe
        .send_dyn::<String>(Some(DynCommand::new(Ping(1))), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        format!(
            "no command handler found for the command {} with the result {}",
            std::any::type_name::<Ping>(),
            std::any::type_name::<String>()
        )
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_builds_one_proxy() {
    let pipe = pipe();
    let mut set = JoinSet::new();

    for i in 0..64u32 {
        let pipe = pipe.clone();
        set.spawn(async move {
            pipe.send_dyn::<u32>(Some(DynCommand::new(Ping(i))), &CancellationToken::new())
                .await
        });
    }

    let mut total = 0;
    while let Some(joined) = set.join_next().await {
        total += joined.unwrap().unwrap();
    }

    assert_eq!(total, (0..64u32).map(|i| i * 2).sum::<u32>());
    assert_eq!(pipe.proxies_built(), 1);
}

#[tokio::test]
async fn clones_share_the_proxy_cache() {
    let pipe = pipe();
    let twin = pipe.clone();
    let cancel = CancellationToken::new();

    pipe.send_dyn::<u32>(Some(DynCommand::new(Ping(1))), &cancel).await.unwrap();
    twin.execute_dyn(Some(DynCommand::new(Ping(2))), &cancel).await.unwrap();

    assert_eq!(pipe.proxies_built(), 1);
    assert_eq!(twin.proxies_built(), 1);

    let rebuilt = CommandPipe::configure(|p| {
        p.add_handler::<Ping, u32, PingHandler>();
    });
    assert_eq!(rebuilt.proxies_built(), 0);
}

#[test]
fn dyn_command_reports_its_type() {
    let command = DynCommand::new(Ping(0));
    assert_eq!(command.type_name(), std::any::type_name::<Ping>());
    assert_eq!(command.command_type(), std::any::TypeId::of::<Ping>());
    assert!(format!("{command:?}").contains("Ping"));
}
