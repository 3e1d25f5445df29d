//! Per-test verdicts.

use serde::{Deserialize, Serialize};

/// Context reported with every verdict that got as far as running the code
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Function that was called
    pub function_name: String,
    /// Its parameter names, in declaration order
    pub arg_names: Vec<String>,
    /// Repr of each argument before the call
    pub input_args: Vec<String>,
    /// Repr of the expected return value, `None` when unchecked
    pub expected_output: String,
    /// Repr of each expected argument after the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output_args: Option<Vec<String>>,
}

/// Outcome of one test case
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestResult {
    /// The source does not parse
    SyntaxError {
        /// `Line <n>. SyntaxError: <message>`
        error: String,
    },
    /// The source parses but does not define a callable target
    SpecificationError {
        /// `Line <n>. <message>`
        error: String,
    },
    /// The program raised an exception
    RuntimeError {
        /// `Line <n>. <Kind>: <message>`
        error: String,
        /// Call context
        #[serde(flatten)]
        diagnostics: Diagnostics,
    },
    /// The call exceeded its time budget
    Timeout {
        /// Call context
        #[serde(flatten)]
        diagnostics: Diagnostics,
    },
    /// The call finished with the wrong result
    Fail {
        /// Call context
        #[serde(flatten)]
        diagnostics: Diagnostics,
        /// Repr of the actual return value
        output: String,
        /// Repr of each argument after the call
        output_args: Vec<String>,
    },
    /// The call finished with the expected result
    Success,
}

impl TestResult {
    /// Serialised tag
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SyntaxError { .. } => "syntax_error",
            Self::SpecificationError { .. } => "specification_error",
            Self::RuntimeError { .. } => "runtime_error",
            Self::Timeout { .. } => "timeout",
            Self::Fail { .. } => "fail",
            Self::Success => "success",
        }
    }

    /// Whether the test passed
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Error text, for the variants that carry one
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::SyntaxError { error }
            | Self::SpecificationError { error }
            | Self::RuntimeError { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Call context, for the variants that ran the code
    #[must_use]
    pub const fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            Self::RuntimeError { diagnostics, .. }
            | Self::Timeout { diagnostics }
            | Self::Fail { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diagnostics() -> Diagnostics {
        Diagnostics {
            function_name: "add".to_string(),
            arg_names: vec!["a".to_string(), "b".to_string()],
            input_args: vec!["1".to_string(), "2".to_string()],
            expected_output: "3".to_string(),
            expected_output_args: None,
        }
    }

    #[test]
    fn test_fail_serialises_flat() {
        let result = TestResult::Fail {
            diagnostics: diagnostics(),
            output: "4".to_string(),
            output_args: vec!["1".to_string(), "2".to_string()],
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "type": "fail",
                "function_name": "add",
                "arg_names": ["a", "b"],
                "input_args": ["1", "2"],
                "expected_output": "3",
                "output": "4",
                "output_args": ["1", "2"],
            })
        );
    }

    #[test]
    fn test_tags() {
        assert_eq!(
            serde_json::to_value(TestResult::Success).unwrap(),
            json!({"type": "success"})
        );
        let syntax = TestResult::SyntaxError {
            error: "Line 1. SyntaxError: invalid syntax".to_string(),
        };
        assert_eq!(syntax.kind(), "syntax_error");
        assert_eq!(
            serde_json::to_value(&syntax).unwrap()["type"],
            json!("syntax_error")
        );
        let timeout = TestResult::Timeout {
            diagnostics: diagnostics(),
        };
        assert_eq!(serde_json::to_value(&timeout).unwrap()["type"], json!("timeout"));
    }

    #[test]
    fn test_expected_output_args_present_when_given() {
        let mut diag = diagnostics();
        diag.expected_output_args = Some(vec!["None".to_string(), "[1]".to_string()]);
        let value = serde_json::to_value(TestResult::Timeout { diagnostics: diag }).unwrap();
        assert_eq!(value["expected_output_args"], json!(["None", "[1]"]));
    }

    #[test]
    fn test_accessors() {
        let result = TestResult::RuntimeError {
            error: "Line 2. NameError: name 'x' is not defined".to_string(),
            diagnostics: diagnostics(),
        };
        assert!(!result.is_success());
        assert_eq!(result.error(), Some("Line 2. NameError: name 'x' is not defined"));
        assert_eq!(result.diagnostics().map(|d| d.function_name.as_str()), Some("add"));
        assert!(TestResult::Success.error().is_none());
    }

    #[test]
    fn test_roundtrip_runtime_error() {
        let result = TestResult::RuntimeError {
            error: "Line 1. ValueError".to_string(),
            diagnostics: diagnostics(),
        };
        let text = serde_json::to_string(&result).unwrap();
        assert_eq!(serde_json::from_str::<TestResult>(&text).unwrap(), result);
    }
}
