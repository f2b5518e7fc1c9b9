//! 命令校验
//!
//! 校验器（`CommandValidator`）针对某一命令类型给出失败列表；
//! 校验中间件（`ValidationMiddleware`）位于链首，汇总所有校验器的结果，
//! 有任何失败即把失败写入上下文并短路。

mod context;
mod middleware;
mod result;
mod rules;
mod validator;

pub use middleware::ValidationMiddleware;
pub use result::{ValidationFailure, ValidationResult};
pub use rules::{
    NULL_COMMAND_ERROR_CODE, NULL_COMMAND_MESSAGE, NULL_COMMAND_PROPERTY, PREDICATE_ERROR_CODE,
    RuleValidator,
};
pub use validator::CommandValidator;
