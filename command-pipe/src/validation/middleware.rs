use super::CommandValidator;
use crate::{chain::Next, context::CommandContext, error::PipeError, middleware::CommandMiddleware};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 校验中间件
///
/// 依次运行某命令类型的全部校验器并汇总失败：
/// - 无失败：推进到链的后续部分；
/// - 有失败：按校验器顺序追加到上下文、置位错误标记，不再推进。
pub struct ValidationMiddleware<C> {
    validators: Vec<Arc<dyn CommandValidator<C>>>,
}

impl<C> ValidationMiddleware<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(validators: Vec<Arc<dyn CommandValidator<C>>>) -> Self {
        Self { validators }
    }
}

#[async_trait]
impl<C, R> CommandMiddleware<C, R> for ValidationMiddleware<C>
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    async fn invoke(
        &self,
        ctx: &mut CommandContext<C, R>,
        next: Next<'_, C, R>,
        cancel: &CancellationToken,
    ) -> Result<(), PipeError> {
        let mut failures = Vec::new();
        for validator in &self.validators {
            let result = validator.validate(ctx.command(), cancel).await;
            failures.extend(result.into_errors());
        }

        if failures.is_empty() {
            return next.run(ctx).await;
        }

        ctx.add_validation_failures(failures);
        Ok(())
    }
}
