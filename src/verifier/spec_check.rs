//! Static checks that a submission defines the function a test wants to call.

use thiserror::Error;

use crate::script::ast::{FunctionDef, Module, Stmt, StmtKind};
use crate::RESTRICTED_ENTRY_POINT;

/// The function a test will call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedSpec {
    /// Name of the selected function
    pub function_name: String,
    /// Its parameter names, in declaration order
    pub arg_names: Vec<String>,
}

/// Why a submission cannot be called as the test requires
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SpecificationError {
    /// Import in restricted mode
    #[error("'import' statement not allowed")]
    ImportNotAllowed {
        /// Line of the import
        line: usize,
    },
    /// No top-level function at all
    #[error("No function found in source")]
    NoFunction,
    /// No top-level function with the required name
    #[error("Function '{name}' not found")]
    FunctionNotFound {
        /// Required name
        name: String,
    },
    /// The function's parameter count differs from the test's argument count
    #[error(
        "Function '{name}' accepts {expected} {}, but was given {actual}",
        argument_noun(.expected)
    )]
    WrongArity {
        /// Function name
        name: String,
        /// Number of test arguments
        expected: usize,
        /// Number of declared parameters
        actual: usize,
        /// Line of the offending `def`
        line: usize,
    },
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn argument_noun(count: &usize) -> &'static str {
    if *count == 1 {
        "argument"
    } else {
        "arguments"
    }
}

impl SpecificationError {
    /// Source line the error points at, 0 when it has none
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::ImportNotAllowed { line } | Self::WrongArity { line, .. } => *line,
            Self::NoFunction | Self::FunctionNotFound { .. } => 0,
        }
    }

    /// `Line <n>. <message>`, the form reported to callers
    #[must_use]
    pub fn describe(&self) -> String {
        format!("Line {}. {self}", self.line())
    }
}

/// Resolve the function a test calls and check its arity
///
/// In restricted mode the target is always the reserved entry point and any
/// import, however deeply nested, is rejected. The first violation in source
/// order wins.
///
/// # Errors
/// Returns the first [`SpecificationError`] found
pub fn check_specification(
    module: &Module,
    arg_count: usize,
    requested: Option<&str>,
    restricted: bool,
) -> Result<ResolvedSpec, SpecificationError> {
    let required = if restricted {
        Some(RESTRICTED_ENTRY_POINT)
    } else {
        requested
    };
    let mut walker = Walker {
        arg_count,
        restricted,
        target: required.map(str::to_string),
        resolved: None,
        ancestors: Vec::new(),
    };
    walker.visit_block(&module.body)?;

    match (walker.resolved, walker.target) {
        (Some(arg_names), Some(function_name)) => Ok(ResolvedSpec {
            function_name,
            arg_names,
        }),
        (_, Some(name)) if required.is_some() => Err(SpecificationError::FunctionNotFound { name }),
        _ => Err(SpecificationError::NoFunction),
    }
}

struct Walker<'a> {
    arg_count: usize,
    restricted: bool,
    /// Name being looked for, fixed by the first top-level `def` if not given
    target: Option<String>,
    /// Parameter names of the latest matching definition
    resolved: Option<Vec<String>>,
    ancestors: Vec<&'a Stmt>,
}

impl<'a> Walker<'a> {
    fn visit_block(&mut self, body: &'a [Stmt]) -> Result<(), SpecificationError> {
        body.iter().try_for_each(|stmt| self.visit(stmt))
    }

    fn visit(&mut self, stmt: &'a Stmt) -> Result<(), SpecificationError> {
        match &stmt.kind {
            StmtKind::Import(_) | StmtKind::ImportFrom { .. } if self.restricted => {
                return Err(SpecificationError::ImportNotAllowed { line: stmt.line });
            }
            StmtKind::FunctionDef(def) if self.ancestors.is_empty() => self.candidate(def)?,
            _ => {}
        }

        self.ancestors.push(stmt);
        let result = match &stmt.kind {
            StmtKind::FunctionDef(def) => self.visit_block(&def.body),
            StmtKind::If { body, orelse, .. } => self
                .visit_block(body)
                .and_then(|()| self.visit_block(orelse)),
            StmtKind::While { body, .. } | StmtKind::For { body, .. } => self.visit_block(body),
            _ => Ok(()),
        };
        self.ancestors.pop();
        result
    }

    fn candidate(&mut self, def: &FunctionDef) -> Result<(), SpecificationError> {
        let target = self.target.get_or_insert_with(|| def.name.clone());
        if def.name != *target {
            return Ok(());
        }
        if def.params.len() != self.arg_count {
            return Err(SpecificationError::WrongArity {
                name: def.name.clone(),
                expected: self.arg_count,
                actual: def.params.len(),
                line: def.line,
            });
        }
        self.resolved = Some(def.param_names());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse;

    fn check(
        source: &str,
        arg_count: usize,
        requested: Option<&str>,
        restricted: bool,
    ) -> Result<ResolvedSpec, SpecificationError> {
        check_specification(&parse(source).unwrap(), arg_count, requested, restricted)
    }

    #[test]
    fn test_first_def_is_default_target() {
        let spec = check("def add(a, b):\n    return a + b\n\ndef neg(x):\n    return -x\n", 2, None, false)
            .unwrap();
        assert_eq!(spec.function_name, "add");
        assert_eq!(spec.arg_names, vec!["a", "b"]);
    }

    #[test]
    fn test_requested_name() {
        let spec = check("def add(a, b):\n    pass\ndef neg(x):\n    pass\n", 1, Some("neg"), false)
            .unwrap();
        assert_eq!(spec.function_name, "neg");
        assert_eq!(spec.arg_names, vec!["x"]);
    }

    #[test]
    fn test_arity_message() {
        let err = check("x = 1\ndef f(a, b):\n    pass\n", 1, None, false).unwrap_err();
        assert_eq!(
            err.describe(),
            "Line 2. Function 'f' accepts 1 argument, but was given 2"
        );
        let err = check("def f():\n    pass\n", 3, None, false).unwrap_err();
        assert_eq!(
            err.describe(),
            "Line 1. Function 'f' accepts 3 arguments, but was given 0"
        );
    }

    #[test]
    fn test_redefinitions_use_last_names() {
        let spec = check("def f(a):\n    pass\ndef f(b):\n    pass\n", 1, None, false).unwrap();
        assert_eq!(spec.arg_names, vec!["b"]);
        let err = check("def f(a):\n    pass\ndef f(a, b):\n    pass\n", 1, None, false).unwrap_err();
        assert_eq!(err.line(), 3);
    }

    #[test]
    fn test_missing_function() {
        assert_eq!(
            check("x = 1\n", 0, None, false).unwrap_err().describe(),
            "Line 0. No function found in source"
        );
        assert_eq!(
            check("def f():\n    pass\n", 0, Some("g"), false)
                .unwrap_err()
                .describe(),
            "Line 0. Function 'g' not found"
        );
    }

    #[test]
    fn test_nested_defs_are_not_candidates() {
        let source = "def outer(a):\n    def inner(a, b):\n        pass\n    return a\n";
        let err = check(source, 2, Some("inner"), false).unwrap_err();
        assert_eq!(
            err,
            SpecificationError::FunctionNotFound {
                name: "inner".to_string()
            }
        );
        let err = check("if True:\n    def f():\n        pass\n", 0, None, false).unwrap_err();
        assert_eq!(err, SpecificationError::NoFunction);
    }

    #[test]
    fn test_restricted_entry_point() {
        let spec = check("def when_run(n):\n    return n\n", 1, Some("other"), true).unwrap();
        assert_eq!(spec.function_name, "when_run");
        let err = check("def main(n):\n    return n\n", 1, None, true).unwrap_err();
        assert_eq!(err.describe(), "Line 0. Function 'when_run' not found");
    }

    #[test]
    fn test_restricted_imports_at_any_depth() {
        let sources = [
            ("import math\ndef when_run():\n    pass\n", 1),
            ("def when_run():\n    from math import sqrt\n", 2),
            ("def when_run():\n    for i in range(3):\n        if i:\n            import os\n", 4),
        ];
        for (source, line) in sources {
            let err = check(source, 0, None, true).unwrap_err();
            assert_eq!(err, SpecificationError::ImportNotAllowed { line });
            assert_eq!(err.describe(), format!("Line {line}. 'import' statement not allowed"));
        }
    }

    #[test]
    fn test_imports_allowed_when_unrestricted() {
        assert!(check("import math\ndef f():\n    pass\n", 0, None, false).is_ok());
    }

    #[test]
    fn test_first_violation_wins() {
        let err = check("def when_run(a):\n    pass\nimport math\n", 0, None, true).unwrap_err();
        assert_eq!(err.line(), 1);
    }
}
