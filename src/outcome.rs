//! Uniform result shape handed to callers that render messages to a user.
//! Mutating operations report through [`Outcome`] so the presentation layer
//! can print `message` directly or inspect `error` for diagnostics.

use crate::error::{Result, StoreError};

#[derive(Debug)]
pub struct Outcome<T = ()> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
    pub error: Option<StoreError>,
}

impl<T> Outcome<T> {
    pub fn succeeded(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
            error: None,
        }
    }

    /// Failed outcome whose message is the error's display text, so not-found
    /// and validation errors read naturally ("Cannot find document group X in
    /// database").
    pub fn failed(error: StoreError) -> Self {
        Self {
            success: false,
            message: Some(error.to_string()),
            data: None,
            error: Some(error),
        }
    }

    /// Failed outcome with a caller-chosen message in front of the error.
    pub fn failed_with(message: impl Into<String>, error: StoreError) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            error: Some(error),
        }
    }

    /// Build an outcome from a fallible computation, formatting the success
    /// message from the produced value.
    pub fn from_result(result: Result<T>, message: impl FnOnce(&T) -> String) -> Self {
        match result {
            Ok(data) => {
                let text = message(&data);
                Self::succeeded(text, data)
            }
            Err(err) => Self::failed(err),
        }
    }

    /// Re-raise the carried error, handing back the data on success.
    pub fn into_result(self) -> Result<Option<T>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_uses_error_text_as_message() {
        let outcome: Outcome<usize> =
            Outcome::failed(StoreError::not_found("document group", "group 9"));

        assert!(!outcome.success);
        assert_eq!(
            outcome.message(),
            "Cannot find document group group 9 in database"
        );
        assert!(outcome.data.is_none());
        assert!(matches!(outcome.into_result(), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn from_result_formats_success_message() {
        let outcome = Outcome::from_result(Ok(4usize), |count| format!("Imported {count}"));

        assert!(outcome.success);
        assert_eq!(outcome.message(), "Imported 4");
        assert_eq!(outcome.into_result().unwrap(), Some(4));
    }
}
