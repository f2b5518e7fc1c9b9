//! 类型擦除的分发
//!
//! 调用方只持有一个装箱的命令（`DynCommand`）时，
//! 由按命令类型缓存的代理（`CommandProxy`）还原出具体类型，再走普通的强类型分发。

use crate::{
    chain::BoxFuture, context::CommandContext, error::PipeError, open::AnyResult,
    pipe::CommandPipe, sender::CommandSender,
};
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 装箱的命令
pub struct DynCommand {
    type_id: TypeId,
    type_name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

impl DynCommand {
    pub fn new<C>(command: C) -> Self
    where
        C: Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<C>(),
            type_name: type_name::<C>(),
            value: Box::new(command),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn command_type(&self) -> TypeId {
        self.type_id
    }

    fn downcast<C: 'static>(self) -> Result<C, PipeError> {
        let found = self.type_name;
        self.value
            .downcast::<C>()
            .map(|c| *c)
            .map_err(|_| PipeError::TypeMismatch {
                expected: type_name::<C>(),
                found,
            })
    }
}

impl fmt::Debug for DynCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynCommand")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// 期望的结果类型
#[derive(Clone, Copy, Debug)]
pub(crate) struct ResultType {
    pub(crate) id: TypeId,
    pub(crate) name: &'static str,
}

impl ResultType {
    pub(crate) fn of<R: 'static>() -> Self {
        Self {
            id: TypeId::of::<R>(),
            name: type_name::<R>(),
        }
    }
}

/// 某一命令类型的代理
pub(crate) trait CommandProxy: Send + Sync {
    fn send<'a>(
        &'a self,
        pipe: &'a CommandPipe,
        command: DynCommand,
        result: ResultType,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<AnyResult, PipeError>>;
}

pub(crate) type ProxyFactory = fn() -> Arc<dyn CommandProxy>;

struct TypedProxy<C>(PhantomData<fn() -> C>);

/// 命令类型 `C` 的代理工厂
pub(crate) fn build_proxy<C>() -> Arc<dyn CommandProxy>
where
    C: Send + Sync + 'static,
{
    Arc::new(TypedProxy::<C>(PhantomData))
}

impl<C> CommandProxy for TypedProxy<C>
where
    C: Send + Sync + 'static,
{
    fn send<'a>(
        &'a self,
        pipe: &'a CommandPipe,
        command: DynCommand,
        result: ResultType,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<AnyResult, PipeError>> {
        Box::pin(async move {
            let route = pipe.route::<C>(result)?;
            let command = command.downcast::<C>()?;
            route.send(pipe, command, cancel).await
        })
    }
}

/// 命令类型 `C` 到某个结果类型的路由
///
/// 结果装入 [`AnyResult`] 交回，保留实际的类型名。
pub(crate) trait Route<C>: Send + Sync {
    fn send<'a>(
        &'a self,
        pipe: &'a CommandPipe,
        command: C,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<AnyResult, PipeError>>;
}

pub(crate) struct TypedRoute<C, R>(PhantomData<fn() -> (C, R)>);

impl<C, R> TypedRoute<C, R> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<C, R> Route<C> for TypedRoute<C, R>
where
    C: Send + Sync + 'static,
    R: Default + Send + Sync + 'static,
{
    fn send<'a>(
        &'a self,
        pipe: &'a CommandPipe,
        command: C,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<AnyResult, PipeError>> {
        Box::pin(async move {
            let mut ctx = CommandContext::<C, R>::new(command);
            pipe.send_context(&mut ctx, cancel).await?;
            Ok(AnyResult::new(ctx.into_result()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;

    #[tokio::test]
    async fn route_result_names_its_actual_type() {
        let pipe = CommandPipe::configure(|pipe| {
            pipe.add_handler_fn(|_cmd: Arc<Ping>, _cancel: CancellationToken| async { Ok::<u32, PipeError>(3) });
        });

        let route = TypedRoute::<Ping, u32>::new();
        let mut result = route.send(&pipe, Ping, &CancellationToken::new()).await.unwrap();
        assert_eq!(result.type_name(), Some("u32"));

        match result.take::<String>().unwrap_err() {
            PipeError::TypeMismatch { expected, found } => {
                assert_eq!(expected, "alloc::string::String");
                assert_eq!(found, "u32");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn route_result_takes_as_its_own_type() {
        let pipe = CommandPipe::configure(|pipe| {
            pipe.add_handler_fn(|_cmd: Arc<Ping>, _cancel: CancellationToken| async { Ok::<u32, PipeError>(3) });
        });

        let mut result = TypedRoute::<Ping, u32>::new()
            .send(&pipe, Ping, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.take::<u32>().unwrap(), 3);
    }

    #[test]
    fn dyn_command_downcasts_to_its_own_type() {
        let command = DynCommand::new(Ping);
        assert!(command.type_name().ends_with("Ping"));
        assert_eq!(command.command_type(), TypeId::of::<Ping>());
        assert!(command.downcast::<Ping>().is_ok());
    }

    #[test]
    fn dyn_command_rejects_other_types() {
        let err = DynCommand::new(Ping).downcast::<String>().unwrap_err();
        match err {
            PipeError::TypeMismatch { expected, found } => {
                assert!(expected.contains("String"));
                assert!(found.ends_with("Ping"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
