//! Recursive-descent parser producing the [`Module`] tree.
//!
//! Operator precedence, lowest first: conditional expression, `or`, `and`,
//! `not`, comparisons, `+ -`, `* / // %`, unary `- +`, `**`, then calls,
//! subscripts and attribute access.

use std::sync::Arc;

use super::ast::{
    BinOp, BoolOp, CmpOp, Constant, Expr, ExprKind, FunctionDef, ImportName, Index, Module,
    Param, Stmt, StmtKind, Target, UnaryOp,
};
use super::error::ParseError;
use super::lexer::{tokenize, Tok, Token};

/// Keywords that belong to the full language but not to this subset
const UNSUPPORTED: &[&str] = &[
    "class", "try", "except", "finally", "with", "lambda", "yield", "del", "nonlocal", "async",
    "await",
];

const AUGMENTED: &[(&str, BinOp)] = &[
    ("+=", BinOp::Add),
    ("-=", BinOp::Sub),
    ("*=", BinOp::Mul),
    ("/=", BinOp::Div),
    ("//=", BinOp::FloorDiv),
    ("%=", BinOp::Mod),
    ("**=", BinOp::Pow),
];

/// Deepest expression nesting accepted, counting unary chains and
/// conditional expressions as well as brackets
pub(crate) const MAX_EXPRESSION_DEPTH: usize = 500;

type PResult<T> = Result<T, ParseError>;

/// Parse a whole source file
///
/// # Errors
/// Returns the first syntax error, with the line it was found on
pub fn parse(source: &str) -> Result<Module, ParseError> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).module()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    function_depth: usize,
    loop_depth: usize,
    expression_depth: usize,
}

impl Parser {
    const fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            function_depth: 0,
            loop_depth: 0,
            expression_depth: 0,
        }
    }

    // -- token cursor -----------------------------------------------------

    fn peek(&self) -> &Tok {
        self.tokens.get(self.pos).map_or(&Tok::Eof, |t| &t.tok)
    }

    fn peek_next(&self) -> &Tok {
        self.tokens.get(self.pos + 1).map_or(&Tok::Eof, |t| &t.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Tok::Punct(p) if *p == punct)
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Tok::Keyword(k) if *k == keyword)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        let found = self.check_punct(punct);
        if found {
            self.pos += 1;
        }
        found
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let found = self.check_keyword(keyword);
        if found {
            self.pos += 1;
        }
        found
    }

    fn expect_punct(&mut self, punct: &str, message: &str) -> PResult<()> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    fn expect_name(&mut self) -> PResult<String> {
        match self.peek() {
            Tok::Name(name) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.invalid()),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line(), message)
    }

    fn invalid(&self) -> ParseError {
        match self.peek() {
            Tok::Keyword(kw) if UNSUPPORTED.contains(kw) => {
                self.error(format!("'{kw}' is not supported"))
            }
            Tok::Indent => self.error("unexpected indent"),
            _ => self.error("invalid syntax"),
        }
    }

    /// Whether the current token can begin an expression
    fn starts_expression(&self) -> bool {
        match self.peek() {
            Tok::Name(_) | Tok::Int(_) | Tok::Float(_) | Tok::Str(_) => true,
            Tok::Keyword(kw) => matches!(*kw, "None" | "True" | "False" | "not" | "lambda"),
            Tok::Punct(p) => matches!(*p, "(" | "[" | "{" | "-" | "+"),
            _ => false,
        }
    }

    // -- statements -------------------------------------------------------

    fn module(mut self) -> PResult<Module> {
        let mut body = Vec::new();
        while *self.peek() != Tok::Eof {
            if *self.peek() == Tok::Newline {
                self.pos += 1;
                continue;
            }
            body.extend(self.statement()?);
        }
        Ok(Module { body })
    }

    fn statement(&mut self) -> PResult<Vec<Stmt>> {
        match self.peek() {
            Tok::Keyword("def") => Ok(vec![self.function_def()?]),
            Tok::Keyword("if") => Ok(vec![self.if_statement()?]),
            Tok::Keyword("while") => Ok(vec![self.while_statement()?]),
            Tok::Keyword("for") => Ok(vec![self.for_statement()?]),
            Tok::Keyword(kw) if UNSUPPORTED.contains(kw) => Err(self.invalid()),
            Tok::Keyword("elif" | "else") | Tok::Indent | Tok::Dedent => Err(self.invalid()),
            _ => self.simple_statements(),
        }
    }

    fn simple_statements(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = vec![self.small_statement()?];
        while self.eat_punct(";") {
            if *self.peek() == Tok::Newline {
                break;
            }
            stmts.push(self.small_statement()?);
        }
        if *self.peek() != Tok::Newline {
            return Err(self.invalid());
        }
        self.pos += 1;
        Ok(stmts)
    }

    /// `:` followed by an indented block or a one-line simple statement list
    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_punct(":", "expected ':'")?;
        if *self.peek() != Tok::Newline {
            return self.simple_statements();
        }
        self.pos += 1;
        if *self.peek() != Tok::Indent {
            return Err(self.error("expected an indented block"));
        }
        self.pos += 1;

        let mut body = Vec::new();
        loop {
            match self.peek() {
                Tok::Dedent => {
                    self.pos += 1;
                    break;
                }
                Tok::Eof => break,
                _ => body.extend(self.statement()?),
            }
        }
        Ok(body)
    }

    fn function_def(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.advance();
        let name = self.expect_name()?;
        self.expect_punct("(", "expected '('")?;

        let mut params: Vec<Param> = Vec::new();
        while !self.check_punct(")") {
            if self.check_punct("*") || self.check_punct("**") {
                return Err(self.error("variadic parameters are not supported"));
            }
            let param = self.expect_name()?;
            if params.iter().any(|p| p.name == param) {
                return Err(self.error(format!(
                    "duplicate argument '{param}' in function definition"
                )));
            }
            let default = if self.eat_punct("=") {
                Some(self.test()?)
            } else {
                if params.iter().any(|p| p.default.is_some()) {
                    return Err(self.error("non-default argument follows default argument"));
                }
                None
            };
            params.push(Param { name: param, default });
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")", "expected ')'")?;
        if self.eat_punct("->") {
            self.test()?;
        }

        let outer_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;
        let body = self.block();
        self.function_depth -= 1;
        self.loop_depth = outer_loops;

        Ok(Stmt {
            line,
            kind: StmtKind::FunctionDef(Arc::new(FunctionDef {
                name,
                params,
                body: body?,
                line,
            })),
        })
    }

    /// Handles both `if` and `elif`; an `elif` chain nests in `orelse`
    fn if_statement(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.advance();
        let test = self.test()?;
        let body = self.block()?;
        let orelse = if self.check_keyword("elif") {
            vec![self.if_statement()?]
        } else if self.eat_keyword("else") {
            self.block()?
        } else {
            Vec::new()
        };
        Ok(Stmt {
            line,
            kind: StmtKind::If { test, body, orelse },
        })
    }

    fn loop_body(&mut self) -> PResult<Vec<Stmt>> {
        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;
        let body = body?;
        if self.check_keyword("else") {
            return Err(self.error("'else' clauses on loops are not supported"));
        }
        Ok(body)
    }

    fn while_statement(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.advance();
        let test = self.test()?;
        let body = self.loop_body()?;
        Ok(Stmt {
            line,
            kind: StmtKind::While { test, body },
        })
    }

    fn for_statement(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.advance();
        let target = self.target_list()?;
        if !self.eat_keyword("in") {
            return Err(self.error("expected 'in'"));
        }
        let iter = self.expression_list()?;
        let body = self.loop_body()?;
        Ok(Stmt {
            line,
            kind: StmtKind::For { target, iter, body },
        })
    }

    fn small_statement(&mut self) -> PResult<Stmt> {
        let line = self.line();
        let kind = match self.peek() {
            Tok::Keyword("pass") => {
                self.advance();
                StmtKind::Pass
            }
            Tok::Keyword("break") => {
                if self.loop_depth == 0 {
                    return Err(self.error("'break' outside loop"));
                }
                self.advance();
                StmtKind::Break
            }
            Tok::Keyword("continue") => {
                if self.loop_depth == 0 {
                    return Err(self.error("'continue' not properly in loop"));
                }
                self.advance();
                StmtKind::Continue
            }
            Tok::Keyword("return") => {
                if self.function_depth == 0 {
                    return Err(self.error("'return' outside function"));
                }
                self.advance();
                if self.at_statement_end() {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.expression_list()?))
                }
            }
            Tok::Keyword("import") => {
                self.advance();
                StmtKind::Import(self.import_names(false)?)
            }
            Tok::Keyword("from") => {
                self.advance();
                let module = self.dotted_name()?;
                if !self.eat_keyword("import") {
                    return Err(self.error("expected 'import'"));
                }
                if self.check_punct("*") {
                    return Err(self.error("wildcard imports are not supported"));
                }
                let parenthesized = self.eat_punct("(");
                let names = self.import_names(true)?;
                if parenthesized {
                    self.expect_punct(")", "expected ')'")?;
                }
                StmtKind::ImportFrom { module, names }
            }
            Tok::Keyword("raise") => {
                self.advance();
                if self.at_statement_end() {
                    StmtKind::Raise(None)
                } else {
                    let exc = self.test()?;
                    if self.check_keyword("from") {
                        return Err(self.error("'raise ... from' is not supported"));
                    }
                    StmtKind::Raise(Some(exc))
                }
            }
            Tok::Keyword("assert") => {
                self.advance();
                let test = self.test()?;
                let msg = if self.eat_punct(",") {
                    Some(self.test()?)
                } else {
                    None
                };
                StmtKind::Assert { test, msg }
            }
            Tok::Keyword("global") => {
                self.advance();
                let mut names = vec![self.expect_name()?];
                while self.eat_punct(",") {
                    names.push(self.expect_name()?);
                }
                StmtKind::Global(names)
            }
            _ => self.expression_statement()?,
        };
        Ok(Stmt { line, kind })
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek(), Tok::Newline | Tok::Eof) || self.check_punct(";")
    }

    fn dotted_name(&mut self) -> PResult<String> {
        let mut name = self.expect_name()?;
        while self.eat_punct(".") {
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        Ok(name)
    }

    fn import_names(&mut self, plain: bool) -> PResult<Vec<ImportName>> {
        let mut names = Vec::new();
        loop {
            let name = if plain {
                self.expect_name()?
            } else {
                self.dotted_name()?
            };
            let alias = if self.eat_keyword("as") {
                Some(self.expect_name()?)
            } else {
                None
            };
            names.push(ImportName { name, alias });
            if !self.eat_punct(",") || (plain && self.check_punct(")")) {
                break;
            }
        }
        Ok(names)
    }

    fn expression_statement(&mut self) -> PResult<StmtKind> {
        let first = self.expression_list()?;

        if let Some(&(_, op)) = AUGMENTED.iter().find(|(p, _)| self.check_punct(p)) {
            self.advance();
            let target = match first.kind {
                ExprKind::Tuple(_) | ExprKind::List(_) => {
                    return Err(ParseError::new(
                        first.line,
                        "illegal expression for augmented assignment",
                    ))
                }
                _ => to_target(first)?,
            };
            let value = self.expression_list()?;
            return Ok(StmtKind::AugAssign { target, op, value });
        }

        if !self.check_punct("=") {
            return Ok(StmtKind::Expr(first));
        }
        let mut targets = Vec::new();
        let mut current = first;
        while self.eat_punct("=") {
            targets.push(to_target(current)?);
            current = self.expression_list()?;
        }
        Ok(StmtKind::Assign {
            targets,
            value: current,
        })
    }

    // -- expressions ------------------------------------------------------

    /// Comma-separated expressions; more than one becomes a tuple
    fn expression_list(&mut self) -> PResult<Expr> {
        let first = self.test()?;
        if !self.check_punct(",") {
            return Ok(first);
        }
        let line = first.line;
        let mut items = vec![first];
        while self.eat_punct(",") {
            if !self.starts_expression() {
                break;
            }
            items.push(self.test()?);
        }
        Ok(Expr {
            line,
            kind: ExprKind::Tuple(items),
        })
    }

    /// Loop targets: stops before `in`
    fn target_list(&mut self) -> PResult<Target> {
        let first = self.arith()?;
        if !self.check_punct(",") {
            return to_target(first);
        }
        let mut items = vec![to_target(first)?];
        while self.eat_punct(",") {
            if self.check_keyword("in") {
                break;
            }
            items.push(to_target(self.arith()?)?);
        }
        Ok(Target::Tuple(items))
    }

    /// Run `parse` one expression level deeper
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.expression_depth >= MAX_EXPRESSION_DEPTH {
            return Err(self.error("too many nested expressions"));
        }
        self.expression_depth += 1;
        let result = parse(self);
        self.expression_depth -= 1;
        result
    }

    fn test(&mut self) -> PResult<Expr> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> PResult<Expr> {
        let body = self.or_test()?;
        if !self.eat_keyword("if") {
            return Ok(body);
        }
        let test = self.or_test()?;
        if !self.eat_keyword("else") {
            return Err(self.error("expected 'else' after 'if' expression"));
        }
        let orelse = self.test()?;
        Ok(Expr {
            line: body.line,
            kind: ExprKind::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
        })
    }

    fn or_test(&mut self) -> PResult<Expr> {
        let mut left = self.and_test()?;
        while self.eat_keyword("or") {
            let right = self.and_test()?;
            left = bool_op(BoolOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_test(&mut self) -> PResult<Expr> {
        let mut left = self.not_test()?;
        while self.eat_keyword("and") {
            let right = self.not_test()?;
            left = bool_op(BoolOp::And, left, right);
        }
        Ok(left)
    }

    fn not_test(&mut self) -> PResult<Expr> {
        if self.check_keyword("not") {
            let line = self.line();
            self.advance();
            let operand = self.nested(Self::not_test)?;
            return Ok(Expr {
                line,
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
            });
        }
        self.comparison()
    }

    fn comparison_operator(&mut self) -> Option<CmpOp> {
        let op = match self.peek() {
            Tok::Punct("==") => CmpOp::Eq,
            Tok::Punct("!=") => CmpOp::NotEq,
            Tok::Punct("<") => CmpOp::Lt,
            Tok::Punct("<=") => CmpOp::LtE,
            Tok::Punct(">") => CmpOp::Gt,
            Tok::Punct(">=") => CmpOp::GtE,
            Tok::Keyword("in") => CmpOp::In,
            Tok::Keyword("not") if *self.peek_next() == Tok::Keyword("in") => {
                self.pos += 2;
                return Some(CmpOp::NotIn);
            }
            Tok::Keyword("is") => {
                self.pos += 1;
                return Some(if self.eat_keyword("not") {
                    CmpOp::IsNot
                } else {
                    CmpOp::Is
                });
            }
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let left = self.arith()?;
        let mut ops = Vec::new();
        while let Some(op) = self.comparison_operator() {
            ops.push((op, self.arith()?));
        }
        if ops.is_empty() {
            return Ok(left);
        }
        Ok(Expr {
            line: left.line,
            kind: ExprKind::Compare {
                left: Box::new(left),
                ops,
            },
        })
    }

    fn arith(&mut self) -> PResult<Expr> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Tok::Punct("+") => BinOp::Add,
                Tok::Punct("-") => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = binary(op, left, right);
        }
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut left = self.factor()?;
        loop {
            let op = match self.peek() {
                Tok::Punct("*") => BinOp::Mul,
                Tok::Punct("/") => BinOp::Div,
                Tok::Punct("//") => BinOp::FloorDiv,
                Tok::Punct("%") => BinOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.factor()?;
            left = binary(op, left, right);
        }
    }

    fn factor(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            Tok::Punct("-") => UnaryOp::Neg,
            Tok::Punct("+") => UnaryOp::Pos,
            _ => return self.power(),
        };
        let line = self.line();
        self.advance();
        let operand = self.nested(Self::factor)?;
        Ok(Expr {
            line,
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
        })
    }

    fn power(&mut self) -> PResult<Expr> {
        let base = self.primary()?;
        if !self.eat_punct("**") {
            return Ok(base);
        }
        let exponent = self.nested(Self::factor)?;
        Ok(binary(BinOp::Pow, base, exponent))
    }

    fn primary(&mut self) -> PResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            let line = self.line();
            if self.eat_punct("(") {
                let (args, keywords) = self.call_arguments()?;
                expr = Expr {
                    line,
                    kind: ExprKind::Call {
                        func: Box::new(expr),
                        args,
                        keywords,
                    },
                };
            } else if self.eat_punct("[") {
                let index = self.subscript()?;
                self.expect_punct("]", "expected ']'")?;
                expr = Expr {
                    line,
                    kind: ExprKind::Subscript {
                        value: Box::new(expr),
                        index: Box::new(index),
                    },
                };
            } else if self.eat_punct(".") {
                let attr = self.expect_name()?;
                expr = Expr {
                    line,
                    kind: ExprKind::Attribute {
                        value: Box::new(expr),
                        attr,
                    },
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Arguments after `(`, consuming the closing `)`
    fn call_arguments(&mut self) -> PResult<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut args = Vec::new();
        let mut keywords: Vec<(String, Expr)> = Vec::new();
        while !self.check_punct(")") {
            if self.check_punct("*") || self.check_punct("**") {
                return Err(self.error("argument unpacking is not supported"));
            }
            if let (Tok::Name(name), Tok::Punct("=")) = (self.peek(), self.peek_next()) {
                let name = name.clone();
                if keywords.iter().any(|(k, _)| *k == name) {
                    return Err(self.error(format!("keyword argument repeated: {name}")));
                }
                self.pos += 2;
                keywords.push((name, self.test()?));
            } else {
                if !keywords.is_empty() {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                let arg = self.test()?;
                if self.check_keyword("for") {
                    args.push(self.comprehension(arg)?);
                } else {
                    args.push(arg);
                }
            }
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")", "expected ')'")?;
        Ok((args, keywords))
    }

    fn subscript(&mut self) -> PResult<Index> {
        let lower = if self.check_punct(":") {
            None
        } else {
            let index = self.test()?;
            if !self.check_punct(":") {
                return Ok(Index::Single(index));
            }
            Some(index)
        };
        self.advance();
        let upper = if self.check_punct(":") || self.check_punct("]") {
            None
        } else {
            Some(self.test()?)
        };
        let step = if self.eat_punct(":") && !self.check_punct("]") {
            Some(self.test()?)
        } else {
            None
        };
        Ok(Index::Slice { lower, upper, step })
    }

    /// `for target in iter [if cond]...` after an already-parsed element
    fn comprehension(&mut self, element: Expr) -> PResult<Expr> {
        self.advance();
        let target = self.target_list()?;
        if !self.eat_keyword("in") {
            return Err(self.error("expected 'in'"));
        }
        let iter = self.or_test()?;
        let mut conditions = Vec::new();
        while self.eat_keyword("if") {
            conditions.push(self.or_test()?);
        }
        if self.check_keyword("for") {
            return Err(self.error("nested comprehension loops are not supported"));
        }
        Ok(Expr {
            line: element.line,
            kind: ExprKind::ListComp {
                element: Box::new(element),
                target,
                iter: Box::new(iter),
                conditions,
            },
        })
    }

    fn atom(&mut self) -> PResult<Expr> {
        let line = self.line();
        let kind = match self.peek().clone() {
            Tok::Name(name) => {
                self.advance();
                ExprKind::Name(name)
            }
            Tok::Int(value) => {
                self.advance();
                ExprKind::Constant(Constant::Int(value))
            }
            Tok::Float(value) => {
                self.advance();
                ExprKind::Constant(Constant::Float(value))
            }
            Tok::Str(_) => {
                let mut text = String::new();
                while let Tok::Str(part) = self.peek() {
                    text.push_str(part);
                    self.pos += 1;
                }
                ExprKind::Constant(Constant::Str(text))
            }
            Tok::Keyword("None") => {
                self.advance();
                ExprKind::Constant(Constant::None)
            }
            Tok::Keyword("True") => {
                self.advance();
                ExprKind::Constant(Constant::Bool(true))
            }
            Tok::Keyword("False") => {
                self.advance();
                ExprKind::Constant(Constant::Bool(false))
            }
            Tok::Punct("(") => {
                self.advance();
                return self.parenthesized(line);
            }
            Tok::Punct("[") => {
                self.advance();
                return self.list_display(line);
            }
            Tok::Punct("{") => {
                self.advance();
                return self.dict_display(line);
            }
            _ => return Err(self.invalid()),
        };
        Ok(Expr { line, kind })
    }

    fn parenthesized(&mut self, line: usize) -> PResult<Expr> {
        if self.eat_punct(")") {
            return Ok(Expr {
                line,
                kind: ExprKind::Tuple(Vec::new()),
            });
        }
        let first = self.test()?;
        if self.check_keyword("for") {
            let comp = self.comprehension(first)?;
            self.expect_punct(")", "expected ')'")?;
            return Ok(comp);
        }
        if !self.check_punct(",") {
            self.expect_punct(")", "expected ')'")?;
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_punct(",") {
            if self.check_punct(")") {
                break;
            }
            items.push(self.test()?);
        }
        self.expect_punct(")", "expected ')'")?;
        Ok(Expr {
            line,
            kind: ExprKind::Tuple(items),
        })
    }

    fn list_display(&mut self, line: usize) -> PResult<Expr> {
        if self.eat_punct("]") {
            return Ok(Expr {
                line,
                kind: ExprKind::List(Vec::new()),
            });
        }
        let first = self.test()?;
        if self.check_keyword("for") {
            let comp = self.comprehension(first)?;
            self.expect_punct("]", "expected ']'")?;
            return Ok(Expr { line, ..comp });
        }
        let mut items = vec![first];
        while self.eat_punct(",") {
            if self.check_punct("]") {
                break;
            }
            items.push(self.test()?);
        }
        self.expect_punct("]", "expected ']'")?;
        Ok(Expr {
            line,
            kind: ExprKind::List(items),
        })
    }

    fn dict_display(&mut self, line: usize) -> PResult<Expr> {
        let mut entries = Vec::new();
        while !self.check_punct("}") {
            let key = self.test()?;
            if !self.eat_punct(":") {
                return Err(self.error("set displays are not supported"));
            }
            let value = self.test()?;
            entries.push((key, value));
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}", "expected '}'")?;
        Ok(Expr {
            line,
            kind: ExprKind::Dict(entries),
        })
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr {
        line: left.line,
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn bool_op(op: BoolOp, left: Expr, right: Expr) -> Expr {
    Expr {
        line: left.line,
        kind: ExprKind::BoolOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn to_target(expr: Expr) -> PResult<Target> {
    match expr.kind {
        ExprKind::Name(name) => Ok(Target::Name(name)),
        ExprKind::Subscript { value, index } => Ok(Target::Subscript { value, index }),
        ExprKind::Attribute { value, attr } => Ok(Target::Attribute { value, attr }),
        ExprKind::Tuple(items) | ExprKind::List(items) => Ok(Target::Tuple(
            items.into_iter().map(to_target).collect::<PResult<_>>()?,
        )),
        ExprKind::Call { .. } => Err(ParseError::new(expr.line, "cannot assign to function call")),
        ExprKind::Constant(_) => Err(ParseError::new(expr.line, "cannot assign to literal")),
        _ => Err(ParseError::new(expr.line, "cannot assign to expression")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_def(module: &Module) -> &FunctionDef {
        match &module.body[0].kind {
            StmtKind::FunctionDef(def) => def,
            other => panic!("expected a function, got {other:?}"),
        }
    }

    #[test]
    fn test_function_with_defaults() {
        let module = parse("def f(a, b=2):\n    return a + b\n").unwrap();
        let def = first_def(&module);
        assert_eq!(def.name, "f");
        assert_eq!(def.param_names(), vec!["a", "b"]);
        assert!(def.params[1].default.is_some());
        assert_eq!(def.body[0].line, 2);
    }

    #[test]
    fn test_precedence() {
        let module = parse("x = 1 + 2 * 3 ** 2\n").unwrap();
        let StmtKind::Assign { value, .. } = &module.body[0].kind else {
            panic!("expected assignment");
        };
        let ExprKind::Binary { op, right, .. } = &value.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn test_elif_chain_nests() {
        let src = "if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n";
        let module = parse(src).unwrap();
        let StmtKind::If { orelse, .. } = &module.body[0].kind else {
            panic!("expected if");
        };
        assert_eq!(orelse.len(), 1);
        assert_eq!(orelse[0].line, 3);
        assert!(matches!(orelse[0].kind, StmtKind::If { .. }));
    }

    #[test]
    fn test_inline_block_and_semicolons() {
        let module = parse("while x: x -= 1; y = 2\n").unwrap();
        let StmtKind::While { body, .. } = &module.body[0].kind else {
            panic!("expected while");
        };
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn test_imports() {
        let module = parse("import math as m, os\nfrom math import (sqrt, pi)\n").unwrap();
        let StmtKind::Import(names) = &module.body[0].kind else {
            panic!("expected import");
        };
        assert_eq!(names[0].bound_name(), "m");
        assert_eq!(names[1].bound_name(), "os");
        let StmtKind::ImportFrom { module: source, names } = &module.body[1].kind else {
            panic!("expected from-import");
        };
        assert_eq!(source, "math");
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_comprehension_and_slice() {
        let module = parse("y = [v * 2 for v in xs[1:] if v]\n").unwrap();
        let StmtKind::Assign { value, .. } = &module.body[0].kind else {
            panic!("expected assignment");
        };
        let ExprKind::ListComp { iter, conditions, .. } = &value.kind else {
            panic!("expected comprehension");
        };
        assert_eq!(conditions.len(), 1);
        assert!(matches!(
            &iter.kind,
            ExprKind::Subscript { index, .. } if matches!(**index, Index::Slice { .. })
        ));
    }

    #[test]
    fn test_tuple_unpacking_targets() {
        let module = parse("a, b = b, a\nfor i, v in pairs:\n    pass\n").unwrap();
        assert!(matches!(
            &module.body[0].kind,
            StmtKind::Assign { targets, .. } if matches!(targets[0], Target::Tuple(_))
        ));
        assert!(matches!(
            &module.body[1].kind,
            StmtKind::For { target: Target::Tuple(items), .. } if items.len() == 2
        ));
    }

    #[test]
    fn test_syntax_errors_carry_lines() {
        let err = parse("def f(:\n    pass\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.message, "'(' was never closed");

        let err = parse("x = 1\ny = 1 +\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "invalid syntax");

        let err = parse("def f():\nreturn 1\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "expected an indented block");

        let err = parse("x = 1\n    y = 2\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "unexpected indent");

        let err = parse("def f()\n    pass\n").unwrap_err();
        assert_eq!(err.message, "expected ':'");
    }

    #[test]
    fn test_expression_nesting_limit() {
        let chain = |depth: usize| format!("x = {}1\n", "-".repeat(depth));
        assert!(parse(&chain(MAX_EXPRESSION_DEPTH / 2)).is_ok());
        let err = parse(&chain(MAX_EXPRESSION_DEPTH * 50)).unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.message, "too many nested expressions");

        let nots = format!("x = {}True\n", "not ".repeat(MAX_EXPRESSION_DEPTH * 50));
        assert_eq!(parse(&nots).unwrap_err().message, "too many nested expressions");
    }

    #[test]
    fn test_bracket_nesting_is_a_syntax_error() {
        let depth = 5000;
        let source = format!("def f():\n    return {}1{}\n", "(".repeat(depth), ")".repeat(depth));
        let err = parse(&source).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "too many nested parentheses");
    }

    #[test]
    fn test_unsupported_keywords() {
        let err = parse("class A:\n    pass\n").unwrap_err();
        assert_eq!(err.message, "'class' is not supported");
        let err = parse("f = lambda x: x\n").unwrap_err();
        assert_eq!(err.message, "'lambda' is not supported");
    }

    #[test]
    fn test_control_flow_outside_context() {
        assert_eq!(parse("return 1\n").unwrap_err().message, "'return' outside function");
        assert_eq!(parse("break\n").unwrap_err().message, "'break' outside loop");
        let err = parse("while x:\n    def g():\n        break\n").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_bad_assignment_target() {
        let err = parse("f() = 3\n").unwrap_err();
        assert_eq!(err.message, "cannot assign to function call");
    }
}
