//! Runtime for the submission scripting language.

use std::fmt;

use super::Executable;
use crate::script::ast::Module;
use crate::script::{ErrorKind, Interpreter, Limits, ScriptError, Value};

/// Loads parsed programs into fresh interpreters
#[derive(Clone, Copy, Debug, Default)]
pub struct ScriptRuntime {
    limits: Limits,
}

impl ScriptRuntime {
    /// Runtime whose interpreters run under `limits`
    #[must_use]
    pub const fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// Run the program's top level and look up `name`
    ///
    /// # Errors
    /// Returns the exception raised at top level, or a `NameError` when the
    /// program never binds `name`
    pub fn load(&self, module: &Module, name: &str) -> Result<ScriptFunction, ScriptError> {
        let mut interpreter = Interpreter::new(self.limits);
        interpreter.run_module(module)?;
        let function = interpreter.global(name).ok_or_else(|| {
            ScriptError::new(ErrorKind::NameError, format!("name '{name}' is not defined"))
                .at_line(0)
        })?;
        Ok(ScriptFunction {
            interpreter,
            function,
            name: name.to_string(),
        })
    }
}

/// A function bound inside the interpreter that defined it
pub struct ScriptFunction {
    interpreter: Interpreter,
    function: Value,
    name: String,
}

impl fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ScriptFunction {
    /// Everything the program printed so far
    #[must_use]
    pub fn output(&self) -> &str {
        self.interpreter.output()
    }
}

impl Executable for ScriptFunction {
    fn call(&mut self, args: &[Value]) -> Result<Value, ScriptError> {
        self.interpreter.call(&self.function, args.to_vec())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse;

    fn load(source: &str, name: &str) -> Result<ScriptFunction, ScriptError> {
        ScriptRuntime::default().load(&parse(source).unwrap(), name)
    }

    #[test]
    fn test_call_loaded_function() {
        let mut function = load("def add(a, b):\n    return a + b\n", "add").unwrap();
        assert_eq!(function.name(), "add");
        let result = function.call(&[Value::Int(2), Value::Int(3)]).unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn test_arguments_are_shared_with_caller() {
        let mut function = load("def push(xs):\n    xs.append(1)\n", "push").unwrap();
        let list = Value::list(vec![]);
        function.call(std::slice::from_ref(&list)).unwrap();
        assert_eq!(list, Value::list(vec![Value::Int(1)]));
    }

    #[test]
    fn test_top_level_error() {
        let err = load("def f():\n    pass\nfoo()\n", "f").unwrap_err();
        assert_eq!(err.describe(), "Line 3. NameError: name 'foo' is not defined");
    }

    #[test]
    fn test_missing_binding() {
        let err = load("x = 1\n", "f").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NameError);
    }

    #[test]
    fn test_debug_names_function() {
        let function = load("def f():\n    pass\n", "f").unwrap();
        assert_eq!(format!("{function:?}"), "ScriptFunction { name: \"f\", .. }");
    }

    #[test]
    fn test_print_is_captured() {
        let mut function = load("def f():\n    print('hi', 2)\n", "f").unwrap();
        function.call(&[]).unwrap();
        assert_eq!(function.output(), "hi 2\n");
    }
}
