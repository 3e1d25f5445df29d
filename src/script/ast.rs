//! Syntax tree of the script language.
//!
//! Every statement and expression records the source line it starts on.
//! Function definitions sit behind an `Arc` so the interpreter can keep a
//! definition alive in a function value without copying its body.

use std::sync::Arc;

/// A parsed source file
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Module {
    /// Top-level statements in source order
    pub body: Vec<Stmt>,
}

/// A statement with its starting line
#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    /// 1-based source line
    pub line: usize,
    /// What the statement does
    pub kind: StmtKind,
}

/// Statement forms
#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    /// `def name(params): body`
    FunctionDef(Arc<FunctionDef>),
    /// `return [value]`
    Return(Option<Expr>),
    /// `if test: body else: orelse` (`elif` nests in `orelse`)
    If {
        /// Condition
        test: Expr,
        /// Taken branch
        body: Vec<Stmt>,
        /// Fallback branch
        orelse: Vec<Stmt>,
    },
    /// `while test: body`
    While {
        /// Loop condition
        test: Expr,
        /// Loop body
        body: Vec<Stmt>,
    },
    /// `for target in iter: body`
    For {
        /// Loop variable(s)
        target: Target,
        /// Iterated expression
        iter: Expr,
        /// Loop body
        body: Vec<Stmt>,
    },
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `pass`
    Pass,
    /// `import a, b as c`
    Import(Vec<ImportName>),
    /// `from module import a, b as c`
    ImportFrom {
        /// Source module
        module: String,
        /// Imported names
        names: Vec<ImportName>,
    },
    /// `t1 = t2 = value`
    Assign {
        /// Targets, assigned left to right
        targets: Vec<Target>,
        /// Assigned value
        value: Expr,
    },
    /// `target op= value`
    AugAssign {
        /// Updated target
        target: Target,
        /// Operator applied
        op: BinOp,
        /// Right-hand side
        value: Expr,
    },
    /// Bare expression
    Expr(Expr),
    /// `raise [exc]`
    Raise(Option<Expr>),
    /// `assert test[, msg]`
    Assert {
        /// Asserted condition
        test: Expr,
        /// Optional message
        msg: Option<Expr>,
    },
    /// `global a, b`
    Global(Vec<String>),
}

/// A function definition
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDef {
    /// Function name
    pub name: String,
    /// Parameters in declaration order
    pub params: Vec<Param>,
    /// Function body
    pub body: Vec<Stmt>,
    /// Line of the `def` keyword
    pub line: usize,
}

impl FunctionDef {
    /// Parameter names in declaration order
    #[must_use]
    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }
}

/// A declared parameter
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Default value, evaluated when the `def` runs
    pub default: Option<Expr>,
}

/// One name in an import statement
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportName {
    /// Imported name
    pub name: String,
    /// `as` alias
    pub alias: Option<String>,
}

impl ImportName {
    /// Name bound in the importing scope
    #[must_use]
    pub fn bound_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Assignment targets
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    /// Plain variable
    Name(String),
    /// `value[index]`
    Subscript {
        /// Container
        value: Box<Expr>,
        /// Index or slice
        index: Box<Index>,
    },
    /// `value.attr`
    Attribute {
        /// Object
        value: Box<Expr>,
        /// Attribute name
        attr: String,
    },
    /// `a, b` unpacking
    Tuple(Vec<Target>),
}

/// An expression with its starting line
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    /// 1-based source line
    pub line: usize,
    /// Expression form
    pub kind: ExprKind,
}

/// Expression forms
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// Literal
    Constant(Constant),
    /// Variable reference
    Name(String),
    /// `[a, b]`
    List(Vec<Expr>),
    /// `(a, b)`
    Tuple(Vec<Expr>),
    /// `{k: v}`
    Dict(Vec<(Expr, Expr)>),
    /// `-x`, `+x`, `not x`
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// Arithmetic
    Binary {
        /// Operator
        op: BinOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// Short-circuit `and` / `or`
    BoolOp {
        /// Operator
        op: BoolOp,
        /// Left operand
        left: Box<Expr>,
        /// Right operand
        right: Box<Expr>,
    },
    /// `a < b <= c`
    Compare {
        /// First operand
        left: Box<Expr>,
        /// Operators with their right operands
        ops: Vec<(CmpOp, Expr)>,
    },
    /// `body if test else orelse`
    IfExp {
        /// Condition
        test: Box<Expr>,
        /// Value when true
        body: Box<Expr>,
        /// Value when false
        orelse: Box<Expr>,
    },
    /// `func(args, key=value)`
    Call {
        /// Callee
        func: Box<Expr>,
        /// Positional arguments
        args: Vec<Expr>,
        /// Keyword arguments
        keywords: Vec<(String, Expr)>,
    },
    /// `value.attr`
    Attribute {
        /// Object
        value: Box<Expr>,
        /// Attribute name
        attr: String,
    },
    /// `value[index]`
    Subscript {
        /// Container
        value: Box<Expr>,
        /// Index or slice
        index: Box<Index>,
    },
    /// `[element for target in iter if cond]`
    ListComp {
        /// Produced element
        element: Box<Expr>,
        /// Loop variable(s)
        target: Target,
        /// Iterated expression
        iter: Box<Expr>,
        /// Filters, all of which must hold
        conditions: Vec<Expr>,
    },
}

/// Subscript forms
#[derive(Clone, Debug, PartialEq)]
pub enum Index {
    /// `x[i]`
    Single(Expr),
    /// `x[lower:upper:step]`
    Slice {
        /// Start bound
        lower: Option<Expr>,
        /// End bound
        upper: Option<Expr>,
        /// Stride
        step: Option<Expr>,
    },
}

/// Literal values
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    /// `None`
    None,
    /// `True` / `False`
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal
    Str(String),
}

/// Unary operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`
    Neg,
    /// `+`
    Pos,
    /// `not`
    Not,
}

/// Binary arithmetic operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `**`
    Pow,
}

impl BinOp {
    /// Operator symbol
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
        }
    }
}

/// Short-circuit operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoolOp {
    /// `and`
    And,
    /// `or`
    Or,
}

/// Comparison operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtE,
    /// `>`
    Gt,
    /// `>=`
    GtE,
    /// `in`
    In,
    /// `not in`
    NotIn,
    /// `is`
    Is,
    /// `is not`
    IsNot,
}

impl CmpOp {
    /// Operator symbol
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Is => "is",
            Self::IsNot => "is not",
        }
    }
}
