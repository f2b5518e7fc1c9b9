//! 进程内命令管道
//!
//! 调用方提交一个强类型命令，管道为 `(命令类型, 结果类型)` 解析唯一的处理器，
//! 让执行依次穿过有序的中间件链（校验、日志、自定义策略），最后返回处理器的结果。
//!
//! - 中间件按注册顺序嵌套，先注册者在最外层，可短路；
//! - 只持有装箱命令的调用方经由按类型缓存的代理回到强类型路径；
//! - `#[command_module]` 标注的模块可被扫描，自动注册符合规则的实现。

extern crate self as command_pipe;

pub mod builder;
pub mod chain;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod open;
pub mod pipe;
pub mod proxy;
pub mod registry;
pub mod scan;
pub mod sender;
pub mod validation;

pub use builder::{CommandBuilder, CommandPipeBuilder};
pub use chain::{BoxFuture, Next};
pub use command::Command;
pub use config::PipeConfig;
pub use context::{CommandContext, Extensions};
pub use error::PipeError;
pub use handler::{CommandExecutor, CommandHandler, Executor, RelayHandler};
pub use middleware::{CommandInterceptor, CommandMiddleware, Intercepted, Proceed, RelayMiddleware};
pub use open::{AnyCommand, AnyResult, OpenCommandMiddleware, OpenContext};
pub use pipe::CommandPipe;
pub use proxy::DynCommand;
pub use registry::{ServiceLifetime, ServiceRegistry};
pub use sender::{CommandSender, CommandSenderExt};
pub use validation::{
    CommandValidator, RuleValidator, ValidationFailure, ValidationMiddleware, ValidationResult,
};

pub use command_pipe_macros::command_module;

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
