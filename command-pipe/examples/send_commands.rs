use command_pipe::{
    CancellationToken, Command, CommandContext, CommandExecutor, CommandMiddleware, CommandPipe,
    CommandSender, CommandSenderExt, DynCommand, Next, PipeError, async_trait,
};
use std::sync::Arc;

#[derive(Debug)]
struct CreateUser {
    name: String,
}

impl Command for CreateUser {
    type Result = u64;
}

#[derive(Default)]
struct CreateUserHandler;

#[async_trait]
impl CommandExecutor<CreateUser, u64> for CreateUserHandler {
    async fn execute(&self, cmd: &CreateUser, _cancel: &CancellationToken) -> Result<u64, PipeError> {
        println!("CreateUser: name={}", cmd.name);
        Ok(cmd.name.len() as u64)
    }
}

#[derive(Debug)]
struct DeleteUser {
    id: u32,
}

struct Logging;

#[async_trait]
impl CommandMiddleware<CreateUser, u64> for Logging {
    async fn invoke(
        &self,
        ctx: &mut CommandContext<CreateUser, u64>,
        next: Next<'_, CreateUser, u64>,
        _cancel: &CancellationToken,
    ) -> Result<(), PipeError> {
        println!("-> {:?}", ctx.command());
        next.run(ctx).await?;
        println!("<- {}", ctx.result());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let pipe = CommandPipe::configure(|pipe| {
        pipe.add_executor::<CreateUser, u64, CreateUserHandler>()
            .add_middleware_instance::<CreateUser, u64, _>(Logging)
            .add_rules::<CreateUser>(|rules| rules.must("name", "name must not be empty", |c| !c.name.is_empty()))
            .add_fire_and_forget_fn(|cmd: Arc<DeleteUser>, _cancel: CancellationToken| async move {
                println!("DeleteUser: id={}", cmd.id);
                Ok(())
            });
    });
    let cancel = CancellationToken::new();

    let id = pipe
        .send_command(
            CreateUser {
                name: "Alice".into(),
            },
            &cancel,
        )
        .await?;
    println!("created user {id}");

    let deleted = pipe.execute(DeleteUser { id: 42 }, &cancel).await?;
    println!("deleted: {deleted}");

    // 校验失败 -> 处理器不执行，失败信息留在上下文中
    let mut ctx = CommandContext::<_, u64>::new(CreateUser { name: String::new() });
    pipe.send_context(&mut ctx, &cancel).await?;
    for failure in ctx.validation_failures().unwrap_or_default() {
        eprintln!("{}: {}", failure.property_name, failure.error_message);
    }

    // 装箱发送
    let id: u64 = pipe
        .send_dyn(Some(DynCommand::new(CreateUser { name: "Bob".into() })), &cancel)
        .await?;
    println!("created user {id} through a boxed command");

    // 未注册的命令 -> 返回 HandlerNotFound 错误
    #[allow(dead_code)]
    #[derive(Debug)]
    struct UpdateUser {
        id: u32,
        name: String,
    }

    if let Err(err @ PipeError::HandlerNotFound { .. }) = pipe
        .execute(
            UpdateUser {
                id: 7,
                name: "Eve".into(),
            },
            &cancel,
        )
        .await
    {
        eprintln!("{err}");
    }
    Ok(())
}
