use super::ValidationFailure;
use crate::context::CommandContext;

impl<C, R> CommandContext<C, R> {
    /// 是否已有校验失败
    pub fn has_error(&self) -> bool {
        self.extensions.has_error
    }

    pub fn set_has_error(&mut self, has_error: bool) {
        self.extensions.has_error = has_error;
    }

    /// 已累积的校验失败；从未写入时为 `None`
    pub fn validation_failures(&self) -> Option<&[ValidationFailure]> {
        self.extensions.validation_failures.as_deref()
    }

    /// 追加校验失败并置位错误标记
    ///
    /// 已存在的失败会保留，新失败追加在其后。
    pub fn add_validation_failures(&mut self, failures: impl IntoIterator<Item = ValidationFailure>) {
        self.extensions
            .validation_failures
            .get_or_insert_with(Vec::new)
            .extend(failures);
        self.extensions.has_error = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_appended_not_replaced() {
        let mut ctx = CommandContext::<(), bool>::new(());
        assert!(!ctx.has_error());
        assert!(ctx.validation_failures().is_none());

        ctx.add_validation_failures([ValidationFailure::new("A", "first", "x")]);
        ctx.add_validation_failures([
            ValidationFailure::new("B", "second", "y"),
            ValidationFailure::new("C", "third", "z"),
        ]);

        let codes: Vec<_> = ctx
            .validation_failures()
            .unwrap()
            .iter()
            .map(|f| f.error_code.as_str())
            .collect();
        assert_eq!(codes, vec!["A", "B", "C"]);
        assert!(ctx.has_error());
    }
}
