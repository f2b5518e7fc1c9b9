use super::{CommandValidator, ValidationFailure, ValidationResult};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// 命令缺失时报告的属性名
pub const NULL_COMMAND_PROPERTY: &str = "this";
/// 命令缺失时报告的错误码
pub const NULL_COMMAND_ERROR_CODE: &str = "CommandCannotBeNull";
/// 命令缺失时报告的错误信息
pub const NULL_COMMAND_MESSAGE: &str = "command cannot be null";
/// `must` 规则使用的错误码
pub const PREDICATE_ERROR_CODE: &str = "PredicateValidator";

struct Rule<C> {
    property: String,
    error_code: String,
    error_message: String,
    predicate: Box<dyn Fn(&C) -> bool + Send + Sync>,
}

impl<C> Rule<C> {
    fn failure(&self) -> ValidationFailure {
        ValidationFailure::new(&self.error_code, &self.error_message, &self.property)
    }
}

/// 基于规则的校验器
///
/// 每条规则是一个谓词，返回 `false` 即产生一条失败；全部规则都会运行。
///
/// ```rust
/// use command_pipe::RuleValidator;
///
/// struct Rename {
///     name: String,
/// }
///
/// let validator = RuleValidator::<Rename>::new()
///     .rule("name", "NotEmpty", "name is required", |c| !c.name.is_empty())
///     .must("name", "name is too long", |c| c.name.len() <= 32);
///
/// let result = validator.validate_value(Some(&Rename { name: String::new() }));
/// assert_eq!(result.errors().len(), 1);
/// ```
pub struct RuleValidator<C> {
    rules: Vec<Rule<C>>,
}

impl<C> Default for RuleValidator<C> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<C> RuleValidator<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule<P>(
        mut self,
        property: impl Into<String>,
        error_code: impl Into<String>,
        error_message: impl Into<String>,
        predicate: P,
    ) -> Self
    where
        P: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            property: property.into(),
            error_code: error_code.into(),
            error_message: error_message.into(),
            predicate: Box::new(predicate),
        });
        self
    }

    /// 以默认错误码添加一条规则
    pub fn must<P>(self, property: impl Into<String>, error_message: impl Into<String>, predicate: P) -> Self
    where
        P: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.rule(property, PREDICATE_ERROR_CODE, error_message, predicate)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 校验一个可能缺失的命令
    ///
    /// 命令缺失时只报告一条 `CommandCannotBeNull`，不运行任何规则。
    pub fn validate_value(&self, command: Option<&C>) -> ValidationResult {
        let Some(command) = command else {
            return ValidationResult::with_errors([ValidationFailure::new(
                NULL_COMMAND_ERROR_CODE,
                NULL_COMMAND_MESSAGE,
                NULL_COMMAND_PROPERTY,
            )]);
        };

        self.rules
            .iter()
            .filter(|rule| !(rule.predicate)(command))
            .map(Rule::failure)
            .collect()
    }
}

#[async_trait]
impl<C> CommandValidator<C> for RuleValidator<C>
where
    C: Send + Sync + 'static,
{
    async fn validate(&self, command: &C, _cancel: &CancellationToken) -> ValidationResult {
        self.validate_value(Some(command))
    }
}
