use std::fmt::{Debug, Display};

/// 命令管道错误
///
/// 除 `Handler` 外的变体均由管道自身产生；
/// 处理器与中间件抛出的业务错误统一包装在 `Handler` 中原样透传。
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum PipeError {
    #[error("argument is null: {parameter}")]
    NullArgument { parameter: &'static str },

    #[error("no command handler found for the command {command} with the result {result}")]
    HandlerNotFound {
        command: &'static str,
        result: &'static str,
    },

    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("command cancelled")]
    Cancelled,

    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

impl PipeError {
    /// 包装任意业务错误
    pub fn handler<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Handler(anyhow::Error::new(err))
    }

    /// 以消息构造业务错误
    pub fn msg<M>(message: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        Self::Handler(anyhow::Error::msg(message))
    }

    /// 取回被包装的业务错误
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Display + Debug + Send + Sync + 'static,
    {
        match self {
            Self::Handler(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}
