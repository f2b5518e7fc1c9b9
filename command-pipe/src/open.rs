//! 开放泛型中间件
//!
//! 一个对 `(AnyCommand, AnyResult)` 实现的中间件会被应用到每一种命令上。
//! 进入时把具体类型的上下文擦除为 [`OpenContext`]，
//! 在它推进 `next` 或返回时再还原为具体类型。

use crate::{
    chain::{BoxFuture, Continuation, Next},
    context::CommandContext,
    error::PipeError,
    middleware::CommandMiddleware,
};
use async_trait::async_trait;
use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 类型擦除后的上下文
pub type OpenContext = CommandContext<AnyCommand, AnyResult>;

/// 擦除了具体类型的命令
pub struct AnyCommand {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl AnyCommand {
    pub(crate) fn from_shared<C>(command: Arc<C>) -> Self
    where
        C: Send + Sync + 'static,
    {
        Self {
            type_name: type_name::<C>(),
            value: command,
        }
    }

    /// 原始命令的类型名
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

/// 空命令（`()`），只用于构造开放泛型中间件在擦除类型上的实例
impl Default for AnyCommand {
    fn default() -> Self {
        Self::from_shared(Arc::new(()))
    }
}

impl fmt::Debug for AnyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyCommand")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// 擦除了具体类型的结果槽
#[derive(Default)]
pub struct AnyResult {
    type_name: &'static str,
    value: Option<Box<dyn Any + Send + Sync>>,
}

impl AnyResult {
    pub fn new<T>(value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self {
            type_name: type_name::<T>(),
            value: Some(Box::new(value)),
        }
    }

    /// 当前值的类型名；结果槽为空时返回 `None`
    pub fn type_name(&self) -> Option<&'static str> {
        self.value.as_ref().map(|_| self.type_name)
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.as_ref().is_some_and(|v| v.is::<T>())
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_ref().and_then(|v| v.downcast_ref::<T>())
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.value.as_mut().and_then(|v| v.downcast_mut::<T>())
    }

    /// 替换结果值
    ///
    /// 类型必须与命令的结果类型一致，否则还原时报 `TypeMismatch`。
    pub fn replace<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        *self = Self::new(value);
    }

    pub fn clear(&mut self) {
        self.value = None;
    }

    pub(crate) fn take<T>(&mut self) -> Result<T, PipeError>
    where
        T: Default + 'static,
    {
        let Some(value) = self.value.take() else {
            return Ok(T::default());
        };

        match value.downcast::<T>() {
            Ok(v) => Ok(*v),
            Err(_) => Err(PipeError::TypeMismatch {
                expected: type_name::<T>(),
                found: self.type_name,
            }),
        }
    }
}

impl fmt::Debug for AnyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyResult")
            .field("type_name", &self.type_name())
            .finish_non_exhaustive()
    }
}

/// 已注册的开放泛型中间件
///
/// 对所有 `CommandMiddleware<AnyCommand, AnyResult>` 自动实现，
/// 只用于在注册表中与“恰好以擦除类型为参数的封闭中间件”区分开。
pub trait OpenCommandMiddleware: CommandMiddleware<AnyCommand, AnyResult> {}

impl<T> OpenCommandMiddleware for T where T: CommandMiddleware<AnyCommand, AnyResult> {}

fn erase<C, R>(typed: &mut CommandContext<C, R>) -> OpenContext
where
    C: Send + Sync + 'static,
    R: Default + Send + Sync + 'static,
{
    OpenContext {
        command: Arc::new(AnyCommand::from_shared(Arc::clone(&typed.command))),
        result: AnyResult::new(mem::take(&mut typed.result)),
        handler_executed: typed.handler_executed,
        extensions: mem::take(&mut typed.extensions),
    }
}

/// 把擦除上下文的状态移回具体上下文
///
/// 结果类型不符时仍会移回扩展槽与执行标记，只有结果保持默认值。
fn restore<C, R>(erased: &mut OpenContext, typed: &mut CommandContext<C, R>) -> Result<(), PipeError>
where
    R: Default + 'static,
{
    let result = erased.result.take::<R>();
    typed.handler_executed = erased.handler_executed;
    typed.extensions = mem::take(&mut erased.extensions);
    typed.result = result?;
    Ok(())
}

fn reload<C, R>(typed: &mut CommandContext<C, R>, erased: &mut OpenContext)
where
    R: Default + Send + Sync + 'static,
{
    erased.result = AnyResult::new(mem::take(&mut typed.result));
    erased.handler_executed = typed.handler_executed;
    erased.extensions = mem::take(&mut typed.extensions);
}

/// 开放泛型中间件在某个具体 `(C, R)` 上的实例
pub(crate) struct OpenAdapter<C, R> {
    inner: Arc<dyn OpenCommandMiddleware>,
    _marker: PhantomData<fn() -> (C, R)>,
}

impl<C, R> OpenAdapter<C, R> {
    pub(crate) fn new(inner: Arc<dyn OpenCommandMiddleware>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<C, R> CommandMiddleware<C, R> for OpenAdapter<C, R>
where
    C: Send + Sync + 'static,
    R: Default + Send + Sync + 'static,
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
        let mut erased = erase(ctx);
        let resume = Box::new(Resume { typed: &mut *ctx, next });

        let outcome = self
            .inner
            .invoke(&mut erased, Next::continuation(resume, cancel), cancel)
            .await;

        let restored = restore(&mut erased, ctx);
        outcome.and(restored)
    }
}

/// 擦除链回到具体类型链的桥
struct Resume<'a, C, R> {
    typed: &'a mut CommandContext<C, R>,
    next: Next<'a, C, R>,
}

impl<'a, C, R> Continuation<AnyCommand, AnyResult> for Resume<'a, C, R>
where
    C: Send + Sync + 'static,
    R: Default + Send + Sync + 'static,
{
    fn resume<'c>(
        self: Box<Self>,
        erased: &'c mut OpenContext,
    ) -> BoxFuture<'c, Result<(), PipeError>>
    where
        Self: 'c,
    {
        let Resume { typed, next } = *self;

        // 无论成败都把状态交还擦除上下文，由适配器在最外层统一还原
        Box::pin(async move {
            let outcome = match restore(erased, typed) {
                Ok(()) => next.run(typed).await,
                Err(err) => Err(err),
            };
            reload(typed, erased);
            outcome
        })
    }
}
