use serde::{Deserialize, Serialize};

/// 单条校验失败
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub error_code: String,
    pub error_message: String,
    pub property_name: String,
}

impl ValidationFailure {
    pub fn new(
        error_code: impl Into<String>,
        error_message: impl Into<String>,
        property_name: impl Into<String>,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            error_message: error_message.into(),
            property_name: property_name.into(),
        }
    }
}

/// 一个校验器的结果：失败列表为空即为通过
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    errors: Vec<ValidationFailure>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn with_errors(errors: impl IntoIterator<Item = ValidationFailure>) -> Self {
        errors.into_iter().collect()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationFailure] {
        &self.errors
    }

    pub fn push(&mut self, failure: ValidationFailure) {
        self.errors.push(failure);
    }

    pub fn into_errors(self) -> Vec<ValidationFailure> {
        self.errors
    }
}

impl FromIterator<ValidationFailure> for ValidationResult {
    fn from_iter<I: IntoIterator<Item = ValidationFailure>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}
