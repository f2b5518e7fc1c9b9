use crate::validation::ValidationFailure;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 命令上下文（Command Context）
///
/// 一次分发的全部可变状态：命令本身、结果槽、处理器是否已执行的标记，
/// 以及供中间件之间传递数据的扩展槽（`Extensions`）。
///
/// - 命令以 `Arc` 持有，构造后不可替换；
/// - 结果初始为 `R::default()`（或 `with_result` 给定的值），处理器成功后写入；
/// - `handler_executed` 只能由管道在处理器成功返回后置位。
pub struct CommandContext<C, R> {
    pub(crate) command: Arc<C>,
    pub(crate) result: R,
    pub(crate) handler_executed: bool,
    pub(crate) extensions: Extensions,
}

impl<C, R> CommandContext<C, R>
where
    R: Default,
{
    pub fn new(command: C) -> Self {
        Self::with_result(command, R::default())
    }
}

impl<C, R> CommandContext<C, R> {
    /// 以给定的初始结果构造上下文
    pub fn with_result(command: C, result: R) -> Self {
        Self::from_shared(Arc::new(command), result)
    }

    pub(crate) fn from_shared(command: Arc<C>, result: R) -> Self {
        Self {
            command,
            result,
            handler_executed: false,
            extensions: Extensions::default(),
        }
    }

    pub fn command(&self) -> &C {
        &self.command
    }

    /// 共享的命令句柄（可跨 await 或任务持有）
    pub fn shared_command(&self) -> Arc<C> {
        Arc::clone(&self.command)
    }

    pub fn result(&self) -> &R {
        &self.result
    }

    pub fn result_mut(&mut self) -> &mut R {
        &mut self.result
    }

    pub fn set_result(&mut self, result: R) {
        self.result = result;
    }

    pub fn into_result(self) -> R {
        self.result
    }

    /// 处理器是否已成功执行
    pub fn handler_executed(&self) -> bool {
        self.handler_executed
    }

    pub(crate) fn mark_handler_executed(&mut self) {
        self.handler_executed = true;
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

impl<C, R> fmt::Debug for CommandContext<C, R>
where
    C: fmt::Debug,
    R: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("command", &self.command)
            .field("result", &self.result)
            .field("handler_executed", &self.handler_executed)
            .field("extensions", &self.extensions)
            .finish()
    }
}

/// 上下文扩展槽
///
/// 校验状态（错误标记与失败列表）是内置的强类型字段，
/// 其它数据按类型存取，每种类型至多一个值。
#[derive(Default)]
pub struct Extensions {
    pub(crate) has_error: bool,
    pub(crate) validation_failures: Option<Vec<ValidationFailure>>,
    slots: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// 写入一个值，返回同类型的旧值
    pub fn insert<T>(&mut self, value: T) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.slots
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|prev| prev.downcast::<T>().ok().map(|b| *b))
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|b| b.downcast_ref::<T>())
    }

    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.slots
            .get_mut(&TypeId::of::<T>())
            .and_then(|b| b.downcast_mut::<T>())
    }

    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.slots
            .remove(&TypeId::of::<T>())
            .and_then(|b| b.downcast::<T>().ok().map(|b| *b))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<T>())
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("has_error", &self.has_error)
            .field("validation_failures", &self.validation_failures)
            .field("slots", &self.slots.len())
            .finish()
    }
}
