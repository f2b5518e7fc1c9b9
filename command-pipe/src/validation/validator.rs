use super::ValidationResult;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// 命令校验器
///
/// 同一命令类型可以注册任意多个校验器，它们按注册顺序依次执行。
#[async_trait]
pub trait CommandValidator<C>: Send + Sync
where
    C: Send + Sync + 'static,
{
    async fn validate(&self, command: &C, cancel: &CancellationToken) -> ValidationResult;
}
