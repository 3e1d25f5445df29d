//! Tree-walking evaluator.
//!
//! Every statement stamps its line on errors passing through it, and every
//! call expression does the same, so a failure reports the innermost line
//! that saw it. Loop iterations and calls tick a step counter; the deadline
//! is checked every [`DEADLINE_CHECK_INTERVAL`] steps.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use super::ast::{
    BinOp, Constant, Expr, ExprKind, Index, Module, Stmt, StmtKind, Target, UnaryOp,
};
use super::builtins;
use super::error::{ErrorKind, ScriptError};
use super::methods;
use super::ops::{self, MAX_COLLECTION_LEN};
use super::value::{BoundMethod, Dict, Function, ListRef, ModuleValue, Value};

pub(crate) type Eval<T> = Result<T, ScriptError>;

/// Steps between two deadline checks
pub const DEADLINE_CHECK_INTERVAL: u64 = 1024;

/// Captured `print` output is truncated past this size
const MAX_OUTPUT_BYTES: usize = 1 << 20;

/// Resource limits for one interpreter
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    /// Deepest allowed chain of script function calls
    pub max_call_depth: usize,
    /// Wall-clock instant after which execution is interrupted
    pub deadline: Option<Instant>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_call_depth: 1000,
            deadline: None,
        }
    }
}

/// A variable scope
#[derive(Default)]
pub struct Env {
    vars: RefCell<HashMap<String, Value>>,
    globals: RefCell<HashSet<String>>,
    parent: Option<Rc<Env>>,
}

impl Env {
    fn child(parent: &Rc<Self>) -> Rc<Self> {
        Rc::new(Self {
            parent: Some(Rc::clone(parent)),
            ..Self::default()
        })
    }

    fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref()?.get(name)
    }

    fn set(&self, name: &str, value: Value) {
        self.vars.borrow_mut().insert(name.to_string(), value);
    }

    fn declares_global(&self, name: &str) -> bool {
        self.globals.borrow().contains(name)
    }
}

/// How a block finished
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Iteration state over a sequence
pub(crate) enum SeqIter {
    Items(std::vec::IntoIter<Value>),
    /// Lists are walked live, so appends during iteration are seen
    List { list: ListRef, index: usize },
    Range { next: i64, remaining: usize, step: i64 },
}

impl SeqIter {
    pub(crate) fn next_item(&mut self) -> Option<Value> {
        match self {
            Self::Items(items) => items.next(),
            Self::List { list, index } => {
                let item = list.borrow().get(*index).cloned()?;
                *index += 1;
                Some(item)
            }
            Self::Range {
                next,
                remaining,
                step,
            } => {
                if *remaining == 0 {
                    return None;
                }
                let value = *next;
                *next = next.wrapping_add(*step);
                *remaining -= 1;
                Some(Value::Int(value))
            }
        }
    }
}

/// Resolved slice parameters
#[derive(Clone, Copy, Debug)]
pub(crate) struct SliceBounds {
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
}

/// Interpreter state for one loaded program
pub struct Interpreter {
    globals: Rc<Env>,
    limits: Limits,
    depth: usize,
    steps: u64,
    output: String,
    math: Option<Rc<ModuleValue>>,
}

impl Interpreter {
    /// Fresh interpreter with an empty global scope
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            globals: Rc::new(Env::default()),
            limits,
            depth: 0,
            steps: 0,
            output: String::new(),
            math: None,
        }
    }

    /// Execute a module's top-level statements
    ///
    /// # Errors
    /// Returns the first uncaught exception
    pub fn run_module(&mut self, module: &Module) -> Result<(), ScriptError> {
        let env = Rc::clone(&self.globals);
        self.exec_block(&module.body, &env).map(|_| ())
    }

    /// Value bound to a global name
    #[must_use]
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name)
    }

    /// Call a function value with positional arguments
    ///
    /// # Errors
    /// Returns the exception the call raised
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, ScriptError> {
        self.call_value(callee, args, Vec::new(), 0)
    }

    /// Everything the program printed so far
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    pub(crate) fn write_output(&mut self, text: &str) {
        let room = MAX_OUTPUT_BYTES.saturating_sub(self.output.len());
        if text.len() <= room {
            self.output.push_str(text);
        } else {
            let mut end = room;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            self.output.push_str(&text[..end]);
        }
    }

    /// Count one step and enforce the deadline
    pub(crate) fn tick(&mut self) -> Eval<()> {
        self.steps = self.steps.wrapping_add(1);
        if self.steps % DEADLINE_CHECK_INTERVAL == 0 {
            if let Some(deadline) = self.limits.deadline {
                if Instant::now() >= deadline {
                    return Err(ScriptError::new(
                        ErrorKind::Interrupted,
                        "execution time limit exceeded",
                    ));
                }
            }
        }
        Ok(())
    }

    // -- statements -------------------------------------------------------

    fn exec_block(&mut self, stmts: &[Stmt], env: &Rc<Env>) -> Eval<Flow> {
        for stmt in stmts {
            let flow = self
                .exec_stmt(stmt, env)
                .map_err(|err| err.at_line(stmt.line))?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Rc<Env>) -> Eval<Flow> {
        match &stmt.kind {
            StmtKind::FunctionDef(def) => {
                let defaults = def
                    .params
                    .iter()
                    .map(|p| p.default.as_ref().map(|e| self.eval(e, env)).transpose())
                    .collect::<Eval<Vec<_>>>()?;
                let function = Function {
                    def: Arc::clone(def),
                    defaults,
                    env: Rc::clone(env),
                };
                self.store(&def.name, Value::Function(Rc::new(function)), env);
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::If { test, body, orelse } => {
                let branch = if self.eval(test, env)?.truthy() {
                    body
                } else {
                    orelse
                };
                return self.exec_block(branch, env);
            }
            StmtKind::While { test, body } => {
                while self.eval(test, env)?.truthy() {
                    self.tick()?;
                    match self.exec_block(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::For { target, iter, body } => {
                let iterable = self.eval(iter, env)?;
                let mut items = self.iterate(&iterable)?;
                while let Some(item) = items.next_item() {
                    self.tick()?;
                    self.assign(target, item, env)?;
                    match self.exec_block(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Pass => {}
            StmtKind::Import(names) => {
                for name in names {
                    let module = self.import(&name.name)?;
                    self.store(name.bound_name(), Value::Module(module), env);
                }
            }
            StmtKind::ImportFrom { module, names } => {
                let source = self.import(module)?;
                for name in names {
                    let value = source.get(&name.name).ok_or_else(|| {
                        ScriptError::new(
                            ErrorKind::ImportError,
                            format!("cannot import name '{}' from '{module}'", name.name),
                        )
                    })?;
                    self.store(name.bound_name(), value, env);
                }
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value, env)?;
                for target in targets {
                    self.assign(target, value.clone(), env)?;
                }
            }
            StmtKind::AugAssign { target, op, value } => {
                self.augmented_assign(target, *op, value, env)?;
            }
            StmtKind::Expr(expr) => {
                self.eval(expr, env)?;
            }
            StmtKind::Raise(exc) => return Err(self.raised(exc.as_ref(), env)),
            StmtKind::Assert { test, msg } => {
                if !self.eval(test, env)?.truthy() {
                    let message = match msg {
                        Some(expr) => self.eval(expr, env)?.to_display(),
                        None => String::new(),
                    };
                    return Err(ScriptError::new(ErrorKind::AssertionError, message));
                }
            }
            StmtKind::Global(names) => {
                let mut declared = env.globals.borrow_mut();
                declared.extend(names.iter().cloned());
            }
        }
        Ok(Flow::Normal)
    }

    fn raised(&mut self, exc: Option<&Expr>, env: &Rc<Env>) -> ScriptError {
        let Some(expr) = exc else {
            return ScriptError::new(ErrorKind::RuntimeError, "No active exception to reraise");
        };
        match self.eval(expr, env) {
            Ok(Value::ExceptionType(kind)) => ScriptError::new(kind, ""),
            Ok(Value::Exception(err)) => ScriptError::new(err.kind, err.message.clone()),
            Ok(_) => ScriptError::type_error("exceptions must derive from BaseException"),
            Err(err) => err,
        }
    }

    fn import(&mut self, name: &str) -> Eval<Rc<ModuleValue>> {
        if name == "math" {
            return Ok(Rc::clone(
                self.math
                    .get_or_insert_with(|| Rc::new(builtins::math_module())),
            ));
        }
        Err(ScriptError::new(
            ErrorKind::ImportError,
            format!("No module named '{name}'"),
        ))
    }

    // -- names and targets ------------------------------------------------

    fn load(&self, name: &str, env: &Env) -> Eval<Value> {
        let found = if env.declares_global(name) {
            self.globals.get(name)
        } else {
            env.get(name)
        };
        found
            .or_else(|| builtins::lookup(name))
            .ok_or_else(|| {
                ScriptError::new(
                    ErrorKind::NameError,
                    format!("name '{name}' is not defined"),
                )
            })
    }

    fn store(&self, name: &str, value: Value, env: &Env) {
        if env.declares_global(name) {
            self.globals.set(name, value);
        } else {
            env.set(name, value);
        }
    }

    fn assign(&mut self, target: &Target, value: Value, env: &Rc<Env>) -> Eval<()> {
        match target {
            Target::Name(name) => {
                self.store(name, value, env);
                Ok(())
            }
            Target::Subscript {
                value: container,
                index,
            } => {
                let container = self.eval(container, env)?;
                match &**index {
                    Index::Single(key) => {
                        let key = self.eval(key, env)?;
                        self.set_item(&container, key, value)
                    }
                    Index::Slice { lower, upper, step } => {
                        let bounds = self.slice_bounds(lower, upper, step, env)?;
                        self.set_slice(&container, bounds, &value)
                    }
                }
            }
            Target::Attribute { value: object, attr } => {
                let object = self.eval(object, env)?;
                Err(no_attribute(&object, attr))
            }
            Target::Tuple(targets) => {
                let items = self.collect(&value)?;
                if items.len() > targets.len() {
                    return Err(ScriptError::value_error(format!(
                        "too many values to unpack (expected {})",
                        targets.len()
                    )));
                }
                if items.len() < targets.len() {
                    return Err(ScriptError::value_error(format!(
                        "not enough values to unpack (expected {}, got {})",
                        targets.len(),
                        items.len()
                    )));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item, env)?;
                }
                Ok(())
            }
        }
    }

    fn augmented_assign(
        &mut self,
        target: &Target,
        op: BinOp,
        value: &Expr,
        env: &Rc<Env>,
    ) -> Eval<()> {
        match target {
            Target::Name(name) => {
                let current = self.load(name, env)?;
                let rhs = self.eval(value, env)?;
                let result = self.augment(op, current, &rhs)?;
                self.store(name, result, env);
                Ok(())
            }
            Target::Subscript {
                value: container,
                index,
            } => {
                let container = self.eval(container, env)?;
                let Index::Single(key) = &**index else {
                    return Err(ScriptError::type_error(
                        "augmented assignment to a slice is not supported",
                    ));
                };
                let key = self.eval(key, env)?;
                let current = self.get_item(&container, &key)?;
                let rhs = self.eval(value, env)?;
                let result = self.augment(op, current, &rhs)?;
                self.set_item(&container, key, result)
            }
            Target::Attribute { value: object, attr } => {
                let object = self.eval(object, env)?;
                Err(no_attribute(&object, attr))
            }
            Target::Tuple(_) => Err(ScriptError::type_error(
                "illegal expression for augmented assignment",
            )),
        }
    }

    /// `current op= rhs`; lists are extended or repeated in place
    fn augment(&mut self, op: BinOp, current: Value, rhs: &Value) -> Eval<Value> {
        if let Value::List(list) = &current {
            match op {
                BinOp::Add => {
                    let extra = self.collect(rhs)?;
                    if list.borrow().len() + extra.len() > MAX_COLLECTION_LEN {
                        return Err(ops::too_large());
                    }
                    list.borrow_mut().extend(extra);
                    return Ok(current);
                }
                BinOp::Mul => {
                    if let Some(times) = rhs.as_int() {
                        let items = list.borrow().clone();
                        let times = ops::repeat_count(times, items.len())?;
                        *list.borrow_mut() = ops::repeated(&items, times);
                        return Ok(current);
                    }
                }
                _ => {}
            }
        }
        ops::binary(op, &current, rhs)
    }

    // -- expressions ------------------------------------------------------

    fn eval_all(&mut self, exprs: &[Expr], env: &Rc<Env>) -> Eval<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e, env)).collect()
    }

    fn eval(&mut self, expr: &Expr, env: &Rc<Env>) -> Eval<Value> {
        match &expr.kind {
            ExprKind::Constant(constant) => Ok(match constant {
                Constant::None => Value::None,
                Constant::Bool(b) => Value::Bool(*b),
                Constant::Int(i) => Value::Int(*i),
                Constant::Float(f) => Value::Float(*f),
                Constant::Str(s) => Value::str(s),
            }),
            ExprKind::Name(name) => self.load(name, env),
            ExprKind::List(items) => Ok(Value::list(self.eval_all(items, env)?)),
            ExprKind::Tuple(items) => Ok(Value::tuple(self.eval_all(items, env)?)),
            ExprKind::Dict(entries) => {
                let mut dict = Dict::new();
                for (key, value) in entries {
                    let key = self.eval(key, env)?;
                    if !key.is_hashable() {
                        return Err(ops::unhashable(&key));
                    }
                    let value = self.eval(value, env)?;
                    dict.insert(key, value);
                }
                Ok(Value::Dict(Rc::new(RefCell::new(dict))))
            }
            ExprKind::Unary { op, operand } => {
                let operand = self.eval(operand, env)?;
                match op {
                    UnaryOp::Neg => ops::negate(&operand),
                    UnaryOp::Pos => ops::positive(&operand),
                    UnaryOp::Not => Ok(Value::Bool(!operand.truthy())),
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                ops::binary(*op, &left, &right)
            }
            ExprKind::BoolOp { op, left, right } => {
                let left = self.eval(left, env)?;
                let settled = match op {
                    super::ast::BoolOp::And => !left.truthy(),
                    super::ast::BoolOp::Or => left.truthy(),
                };
                if settled {
                    Ok(left)
                } else {
                    self.eval(right, env)
                }
            }
            ExprKind::Compare { left, ops: links } => {
                let mut left = self.eval(left, env)?;
                for (op, right) in links {
                    let right = self.eval(right, env)?;
                    if !ops::compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            ExprKind::IfExp { test, body, orelse } => {
                if self.eval(test, env)?.truthy() {
                    self.eval(body, env)
                } else {
                    self.eval(orelse, env)
                }
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                let callee = self.eval(func, env)?;
                let args = self.eval_all(args, env)?;
                let mut kwargs = Vec::with_capacity(keywords.len());
                for (name, value) in keywords {
                    kwargs.push((name.clone(), self.eval(value, env)?));
                }
                self.call_value(&callee, args, kwargs, expr.line)
                    .map_err(|err| err.at_line(expr.line))
            }
            ExprKind::Attribute { value, attr } => {
                let object = self.eval(value, env)?;
                attribute(&object, attr)
            }
            ExprKind::Subscript { value, index } => {
                let container = self.eval(value, env)?;
                match &**index {
                    Index::Single(key) => {
                        let key = self.eval(key, env)?;
                        self.get_item(&container, &key)
                    }
                    Index::Slice { lower, upper, step } => {
                        let bounds = self.slice_bounds(lower, upper, step, env)?;
                        get_slice(&container, bounds)
                    }
                }
            }
            ExprKind::ListComp {
                element,
                target,
                iter,
                conditions,
            } => {
                let iterable = self.eval(iter, env)?;
                let mut items = self.iterate(&iterable)?;
                let scope = Env::child(env);
                let mut out = Vec::new();
                'items: while let Some(item) = items.next_item() {
                    self.tick()?;
                    self.assign(target, item, &scope)?;
                    for condition in conditions {
                        if !self.eval(condition, &scope)?.truthy() {
                            continue 'items;
                        }
                    }
                    out.push(self.eval(element, &scope)?);
                    if out.len() > MAX_COLLECTION_LEN {
                        return Err(ops::too_large());
                    }
                }
                Ok(Value::list(out))
            }
        }
    }

    // -- calls --------------------------------------------------------------

    pub(crate) fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
        line: usize,
    ) -> Eval<Value> {
        match callee {
            Value::Function(function) => self.call_function(function, args, kwargs),
            Value::Builtin(builtin) => builtins::call(self, *builtin, args, kwargs),
            Value::Method(method) => {
                methods::call(self, &method.receiver, method.name, args, &kwargs, line)
            }
            Value::ExceptionType(kind) => {
                if !kwargs.is_empty() {
                    return Err(ScriptError::type_error(format!(
                        "{kind}() takes no keyword arguments"
                    )));
                }
                let message = match args.as_slice() {
                    [] => String::new(),
                    [one] => one.to_display(),
                    many => Value::tuple(many.to_vec()).repr(),
                };
                Ok(Value::Exception(Rc::new(ScriptError::new(*kind, message))))
            }
            other => Err(ScriptError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(
        &mut self,
        function: &Function,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Eval<Value> {
        let def = &function.def;
        let name = &def.name;
        let params = &def.params;
        if args.len() > params.len() {
            return Err(ScriptError::type_error(format!(
                "{name}() takes {} positional argument{} but {} {} given",
                params.len(),
                plural(params.len()),
                args.len(),
                if args.len() == 1 { "was" } else { "were" }
            )));
        }

        let mut slots: Vec<Option<Value>> = args.into_iter().map(Some).collect();
        slots.resize(params.len(), None);
        for (key, value) in kwargs {
            let Some(index) = params.iter().position(|p| p.name == key) else {
                return Err(ScriptError::type_error(format!(
                    "{name}() got an unexpected keyword argument '{key}'"
                )));
            };
            if slots[index].is_some() {
                return Err(ScriptError::type_error(format!(
                    "{name}() got multiple values for argument '{key}'"
                )));
            }
            slots[index] = Some(value);
        }

        let scope = Env::child(&function.env);
        let mut missing = Vec::new();
        for ((param, slot), default) in params.iter().zip(slots).zip(&function.defaults) {
            match slot.or_else(|| default.clone()) {
                Some(value) => scope.set(&param.name, value),
                None => missing.push(format!("'{}'", param.name)),
            }
        }
        if !missing.is_empty() {
            return Err(ScriptError::type_error(format!(
                "{name}() missing {} required positional argument{}: {}",
                missing.len(),
                plural(missing.len()),
                join_names(&missing)
            )));
        }

        if self.depth >= self.limits.max_call_depth {
            return Err(ScriptError::new(
                ErrorKind::RecursionError,
                "maximum recursion depth exceeded",
            ));
        }
        self.tick()?;
        self.depth += 1;
        let flow = self.exec_block(&def.body, &scope);
        self.depth -= 1;
        match flow? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::None),
        }
    }

    // -- sequences ----------------------------------------------------------

    pub(crate) fn iterate(&self, value: &Value) -> Eval<SeqIter> {
        Ok(match value {
            Value::List(list) => SeqIter::List {
                list: Rc::clone(list),
                index: 0,
            },
            Value::Tuple(items) => SeqIter::Items(items.to_vec().into_iter()),
            Value::Str(text) => SeqIter::Items(
                text.chars()
                    .map(|c| Value::str(c.encode_utf8(&mut [0; 4])))
                    .collect::<Vec<_>>()
                    .into_iter(),
            ),
            Value::Dict(dict) => SeqIter::Items(dict.borrow().keys().into_iter()),
            Value::Range(range) => SeqIter::Range {
                next: range.start,
                remaining: range.len(),
                step: range.step,
            },
            other => {
                return Err(ScriptError::type_error(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                )))
            }
        })
    }

    /// Drain an iterable into a vector
    pub(crate) fn collect(&mut self, value: &Value) -> Eval<Vec<Value>> {
        if let Value::Range(range) = value {
            if range.len() > MAX_COLLECTION_LEN {
                return Err(ops::too_large());
            }
        }
        let mut items = self.iterate(value)?;
        let mut out = Vec::new();
        while let Some(item) = items.next_item() {
            self.tick()?;
            out.push(item);
            if out.len() > MAX_COLLECTION_LEN {
                return Err(ops::too_large());
            }
        }
        Ok(out)
    }

    pub(crate) fn get_item(&self, container: &Value, key: &Value) -> Eval<Value> {
        match container {
            Value::List(items) => {
                let items = items.borrow();
                let index = sequence_index(key, items.len(), "list", "list index out of range")?;
                Ok(items[index].clone())
            }
            Value::Tuple(items) => {
                let index =
                    sequence_index(key, items.len(), "tuple", "tuple index out of range")?;
                Ok(items[index].clone())
            }
            Value::Str(text) => {
                let chars: Vec<char> = text.chars().collect();
                let index =
                    sequence_index(key, chars.len(), "string", "string index out of range")?;
                Ok(Value::str(chars[index].encode_utf8(&mut [0; 4])))
            }
            Value::Range(range) => {
                let index = sequence_index(
                    key,
                    range.len(),
                    "range",
                    "range object index out of range",
                )?;
                range
                    .get(index)
                    .map(Value::Int)
                    .ok_or_else(|| ScriptError::index_error("range object index out of range"))
            }
            Value::Dict(dict) => {
                if !key.is_hashable() {
                    return Err(ops::unhashable(key));
                }
                dict.borrow()
                    .get(key)
                    .cloned()
                    .ok_or_else(|| ScriptError::new(ErrorKind::KeyError, key.repr()))
            }
            other => Err(ScriptError::type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    fn set_item(&self, container: &Value, key: Value, value: Value) -> Eval<()> {
        match container {
            Value::List(items) => {
                let len = items.borrow().len();
                let index = sequence_index(&key, len, "list", "list assignment index out of range")?;
                items.borrow_mut()[index] = value;
                Ok(())
            }
            Value::Dict(dict) => {
                if !key.is_hashable() {
                    return Err(ops::unhashable(&key));
                }
                dict.borrow_mut().insert(key, value);
                Ok(())
            }
            other => Err(ScriptError::type_error(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            ))),
        }
    }

    fn slice_bounds(
        &mut self,
        lower: &Option<Expr>,
        upper: &Option<Expr>,
        step: &Option<Expr>,
        env: &Rc<Env>,
    ) -> Eval<SliceBounds> {
        let mut bound = |expr: &Option<Expr>| -> Eval<Option<i64>> {
            let Some(expr) = expr else { return Ok(None) };
            match self.eval(expr, env)? {
                Value::None => Ok(None),
                value => value.as_int().map(Some).ok_or_else(|| {
                    ScriptError::type_error(
                        "slice indices must be integers or None or have an __index__ method",
                    )
                }),
            }
        };
        Ok(SliceBounds {
            lower: bound(lower)?,
            upper: bound(upper)?,
            step: bound(step)?,
        })
    }

    fn set_slice(&mut self, container: &Value, bounds: SliceBounds, value: &Value) -> Eval<()> {
        let Value::List(list) = container else {
            return Err(ScriptError::type_error(format!(
                "'{}' object does not support slice assignment",
                container.type_name()
            )));
        };
        let items = self.collect(value)?;
        let len = list.borrow().len();
        if bounds.step.unwrap_or(1) == 1 {
            let start = bounds.lower.map_or(0, |i| clamp_index(i, len));
            let stop = bounds.upper.map_or(len, |i| clamp_index(i, len)).max(start);
            let _removed: Vec<Value> = list.borrow_mut().splice(start..stop, items).collect();
            return Ok(());
        }
        let indices = slice_indices(bounds, len)?;
        if indices.len() != items.len() {
            return Err(ScriptError::value_error(format!(
                "attempt to assign sequence of size {} to extended slice of size {}",
                items.len(),
                indices.len()
            )));
        }
        let mut target = list.borrow_mut();
        for (index, item) in indices.into_iter().zip(items) {
            target[index] = item;
        }
        Ok(())
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        // Global functions point back at the global scope; break the cycle.
        self.globals.vars.borrow_mut().clear();
    }
}

fn attribute(object: &Value, attr: &str) -> Eval<Value> {
    if let Value::Module(module) = object {
        return module.get(attr).ok_or_else(|| {
            ScriptError::new(
                ErrorKind::AttributeError,
                format!("module '{}' has no attribute '{attr}'", module.name),
            )
        });
    }
    match methods::lookup(object, attr) {
        Some(name) => Ok(Value::Method(Rc::new(BoundMethod {
            receiver: object.clone(),
            name,
        }))),
        None => Err(no_attribute(object, attr)),
    }
}

fn no_attribute(object: &Value, attr: &str) -> ScriptError {
    ScriptError::new(
        ErrorKind::AttributeError,
        format!("'{}' object has no attribute '{attr}'", object.type_name()),
    )
}

fn get_slice(container: &Value, bounds: SliceBounds) -> Eval<Value> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let indices = slice_indices(bounds, items.len())?;
            Ok(Value::list(indices.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Tuple(items) => {
            let indices = slice_indices(bounds, items.len())?;
            Ok(Value::tuple(indices.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let indices = slice_indices(bounds, chars.len())?;
            let sliced: String = indices.into_iter().map(|i| chars[i]).collect();
            Ok(Value::str(&sliced))
        }
        Value::Range(range) => {
            let indices = slice_indices(bounds, range.len())?;
            Ok(Value::list(
                indices
                    .into_iter()
                    .filter_map(|i| range.get(i))
                    .map(Value::Int)
                    .collect(),
            ))
        }
        other => Err(ScriptError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn sequence_index(key: &Value, len: usize, kind: &str, out_of_range: &str) -> Eval<usize> {
    let Some(index) = key.as_int() else {
        return Err(ScriptError::type_error(format!(
            "{kind} indices must be integers or slices, not {}",
            key.type_name()
        )));
    };
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if index < 0 { index + len } else { index };
    if resolved < 0 || resolved >= len {
        return Err(ScriptError::index_error(out_of_range));
    }
    usize::try_from(resolved).map_err(|_| ScriptError::index_error(out_of_range))
}

fn clamp_index(index: i64, len: usize) -> usize {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if index < 0 { (index + len_i).max(0) } else { index.min(len_i) };
    usize::try_from(resolved).unwrap_or(0)
}

/// Indices selected by a slice over a sequence of `len` items
fn slice_indices(bounds: SliceBounds, len: usize) -> Eval<Vec<usize>> {
    let step = bounds.step.unwrap_or(1);
    if step == 0 {
        return Err(ScriptError::value_error("slice step cannot be zero"));
    }
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let (start, stop) = if step > 0 {
        let clamp = |i: i64| if i < 0 { (i + len).max(0) } else { i.min(len) };
        (
            bounds.lower.map_or(0, clamp),
            bounds.upper.map_or(len, clamp),
        )
    } else {
        let clamp = |i: i64| if i < 0 { (i + len).max(-1) } else { i.min(len - 1) };
        (
            bounds.lower.map_or(len - 1, clamp),
            bounds.upper.map_or(-1, clamp),
        )
    };

    let mut indices = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        indices.push(usize::try_from(current).unwrap_or(0));
        current = match current.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(indices)
}

const fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`
fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{first} and {second}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse;

    fn run(source: &str, function: &str, args: Vec<Value>) -> Eval<Value> {
        let module = parse(source).unwrap();
        let mut interpreter = Interpreter::new(Limits::default());
        interpreter.run_module(&module)?;
        let callee = interpreter.global(function).unwrap();
        interpreter.call(&callee, args)
    }

    fn ints(values: &[i64]) -> Value {
        Value::list(values.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn test_loops_and_arithmetic() {
        let src = "def total(xs):\n    s = 0\n    for x in xs:\n        if x % 2 == 0:\n            continue\n        s += x\n    return s\n";
        assert_eq!(run(src, "total", vec![ints(&[1, 2, 3, 4, 5])]).unwrap(), Value::Int(9));
    }

    #[test]
    fn test_while_with_break() {
        let src = "def f(n):\n    i = 0\n    while True:\n        i += 1\n        if i * i > n:\n            break\n    return i\n";
        assert_eq!(run(src, "f", vec![Value::Int(50)]).unwrap(), Value::Int(8));
    }

    #[test]
    fn test_list_mutation_is_shared() {
        let src = "def f(a, b):\n    a += b\n    a.append(0)\n";
        let a = ints(&[1]);
        run(src, "f", vec![a.clone(), ints(&[2, 3])]).unwrap();
        assert_eq!(a, ints(&[1, 2, 3, 0]));
    }

    #[test]
    fn test_rebinding_does_not_mutate() {
        let src = "def f(a):\n    a = a + [9]\n    return a\n";
        let a = ints(&[1]);
        let out = run(src, "f", vec![a.clone()]).unwrap();
        assert_eq!(a, ints(&[1]));
        assert_eq!(out, ints(&[1, 9]));
    }

    #[test]
    fn test_error_line_is_innermost() {
        let src = "def helper(x):\n    return x[10]\n\ndef f(x):\n    y = 1\n    return helper(x)\n";
        let err = run(src, "f", vec![ints(&[1])]).unwrap_err();
        assert_eq!(err.describe(), "Line 2. IndexError: list index out of range");
    }

    #[test]
    fn test_module_level_failure() {
        let module = parse("x = 1\nfoo()\n").unwrap();
        let mut interpreter = Interpreter::new(Limits::default());
        let err = interpreter.run_module(&module).unwrap_err();
        assert_eq!(err.describe(), "Line 2. NameError: name 'foo' is not defined");
    }

    #[test]
    fn test_defaults_keywords_and_arity_errors() {
        let src = "def f(a, b=10):\n    return a - b\n\ndef g():\n    return f(b=1, a=5)\n";
        assert_eq!(run(src, "f", vec![Value::Int(15)]).unwrap(), Value::Int(5));
        assert_eq!(run(src, "g", vec![]).unwrap(), Value::Int(4));
        let err = run(src, "f", vec![]).unwrap_err();
        assert_eq!(
            err.message,
            "f() missing 1 required positional argument: 'a'"
        );
    }

    #[test]
    fn test_recursion_limit() {
        let outcome = std::thread::Builder::new()
            .stack_size(256 << 20)
            .spawn(|| {
                let src = "def f(n):\n    return f(n + 1)\n";
                run(src, "f", vec![Value::Int(0)]).unwrap_err().describe()
            })
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(outcome, "Line 2. RecursionError: maximum recursion depth exceeded");
    }

    #[test]
    fn test_bounded_recursion_succeeds() {
        let src = "def fact(n):\n    if n <= 1:\n        return 1\n    return n * fact(n - 1)\n";
        assert_eq!(run(src, "fact", vec![Value::Int(10)]).unwrap(), Value::Int(3_628_800));
    }

    #[test]
    fn test_deadline_interrupts() {
        let module = parse("def spin():\n    while True:\n        pass\n").unwrap();
        let mut interpreter = Interpreter::new(Limits {
            deadline: Some(Instant::now()),
            ..Limits::default()
        });
        interpreter.run_module(&module).unwrap();
        let spin = interpreter.global("spin").unwrap();
        let err = interpreter.call(&spin, vec![]).unwrap_err();
        assert!(err.is_cancellation());
    }

    #[test]
    fn test_raise_and_assert() {
        let src = "def f(x):\n    if x < 0:\n        raise ValueError('negative')\n    assert x != 0, 'zero'\n    return x\n";
        let err = run(src, "f", vec![Value::Int(-1)]).unwrap_err();
        assert_eq!(err.describe(), "Line 3. ValueError: negative");
        let err = run(src, "f", vec![Value::Int(0)]).unwrap_err();
        assert_eq!(err.describe(), "Line 4. AssertionError: zero");

        let err = run("def f():\n    raise KeyboardInterrupt\n", "f", vec![]).unwrap_err();
        assert!(err.is_cancellation());
    }

    #[test]
    fn test_slices_and_unpacking() {
        let src = "def f(xs):\n    a, b = xs[0], xs[-1]\n    xs[1:3] = [a, b]\n    return xs[::-1]\n";
        let xs = ints(&[1, 2, 3, 4]);
        let out = run(src, "f", vec![xs.clone()]).unwrap();
        assert_eq!(xs, ints(&[1, 1, 4, 4]));
        assert_eq!(out, ints(&[4, 4, 1, 1]));
    }

    #[test]
    fn test_globals_and_comprehensions() {
        let src = "count = 0\n\ndef bump(xs):\n    global count\n    count += 1\n    return [x * count for x in xs if x > 1]\n";
        assert_eq!(run(src, "bump", vec![ints(&[1, 2, 3])]).unwrap(), ints(&[2, 3]));
    }

    #[test]
    fn test_dicts_and_strings() {
        let src = "def f(s):\n    counts = {}\n    for c in s:\n        counts[c] = counts.get(c, 0) + 1\n    return counts['a'], len(counts)\n";
        let out = run(src, "f", vec![Value::str("banana")]).unwrap();
        assert_eq!(out, Value::tuple(vec![Value::Int(3), Value::Int(3)]));
    }

    #[test]
    fn test_imports() {
        let src = "import math\nfrom math import floor\n\ndef f(x):\n    return floor(math.sqrt(x))\n";
        assert_eq!(run(src, "f", vec![Value::Int(17)]).unwrap(), Value::Int(4));
        let module = parse("import os\n").unwrap();
        let err = Interpreter::new(Limits::default()).run_module(&module).unwrap_err();
        assert_eq!(err.describe(), "Line 1. ImportError: No module named 'os'");
    }

    #[test]
    fn test_print_is_captured() {
        let module = parse("print('hi', 3)\nprint('x', end='')\n").unwrap();
        let mut interpreter = Interpreter::new(Limits::default());
        interpreter.run_module(&module).unwrap();
        assert_eq!(interpreter.output(), "hi 3\nx");
    }

    #[test]
    fn test_slice_index_rules() {
        let bounds = |lower, upper, step| SliceBounds { lower, upper, step };
        assert_eq!(slice_indices(bounds(None, None, Some(-1)), 3).unwrap(), vec![2, 1, 0]);
        assert_eq!(slice_indices(bounds(Some(-2), None, None), 3).unwrap(), vec![1, 2]);
        assert_eq!(slice_indices(bounds(Some(5), Some(9), None), 3).unwrap(), Vec::<usize>::new());
        assert!(slice_indices(bounds(None, None, Some(0)), 3).is_err());
    }
}
