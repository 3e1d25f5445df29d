//! Tokenizer for the script language.
//!
//! Produces a flat token stream with explicit `Newline`, `Indent` and `Dedent`
//! markers so the parser never has to look at whitespace. Newlines inside
//! brackets and after a `\` continuation are not logical line ends.

use super::error::ParseError;

/// Reserved words. Some are reserved only so the parser can reject them
/// with a precise message.
const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Punctuation, longest first so greedy matching works.
const PUNCTS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "->", "**", "//", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=",
    "%=", "<<", ">>", "+", "-", "*", "/", "%", "<", ">", "=", "(", ")", "[", "]", "{", "}", ",",
    ":", ".", ";", "|", "&", "^", "~", "@",
];

const TAB_WIDTH: usize = 8;

/// Token kinds
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Tok {
    Name(String),
    Keyword(&'static str),
    Int(i64),
    Float(f64),
    Str(String),
    Punct(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

/// A token and the line it starts on
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Token {
    pub tok: Tok,
    pub line: usize,
}

/// Split `source` into tokens
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let normalized = source.replace("\r\n", "\n").replace('\r', "\n");
    Lexer::new(&normalized).run()
}

/// Deepest bracket nesting accepted
pub(crate) const MAX_BRACKET_DEPTH: usize = 200;

/// Deepest block indentation accepted
pub(crate) const MAX_INDENT_DEPTH: usize = 100;

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    indents: Vec<usize>,
    /// Open brackets with the line they were opened on
    brackets: Vec<(char, usize)>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            tokens: Vec::new(),
            indents: vec![0],
            brackets: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, tok: Tok, line: usize) {
        self.tokens.push(Token { tok, line });
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line, message)
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        let mut at_line_start = true;
        loop {
            if at_line_start && self.brackets.is_empty() {
                if !self.start_logical_line()? {
                    break;
                }
                at_line_start = false;
            }
            let Some(c) = self.peek() else { break };
            match c {
                '\n' => {
                    self.pos += 1;
                    if self.brackets.is_empty() {
                        self.push(Tok::Newline, self.line);
                        at_line_start = true;
                    }
                    self.line += 1;
                }
                ' ' | '\t' | '\x0c' => self.pos += 1,
                '#' => self.skip_comment(),
                '\\' => {
                    if self.peek_at(1) != Some('\n') {
                        return Err(self.error("unexpected character after line continuation character"));
                    }
                    self.pos += 2;
                    self.line += 1;
                }
                '\'' | '"' => {
                    let line = self.line;
                    let text = self.string(false)?;
                    self.push(Tok::Str(text), line);
                }
                c if c.is_ascii_digit() => self.number()?,
                '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.number()?,
                c if c.is_alphabetic() || c == '_' => self.name()?,
                _ => self.punct()?,
            }
        }

        if let Some(&(open, line)) = self.brackets.last() {
            return Err(ParseError::new(line, format!("'{open}' was never closed")));
        }
        if !matches!(self.tokens.last().map(|t| &t.tok), None | Some(Tok::Newline)) {
            self.push(Tok::Newline, self.line);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent, self.line);
        }
        self.push(Tok::Eof, self.line);
        Ok(self.tokens)
    }

    /// Measure indentation of the next non-blank line and emit indent tokens.
    /// Returns `false` at end of input.
    fn start_logical_line(&mut self) -> Result<bool, ParseError> {
        loop {
            let mut width = 0;
            while let Some(c) = self.peek() {
                match c {
                    ' ' => width += 1,
                    '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                    '\x0c' => width = 0,
                    _ => break,
                }
                self.pos += 1;
            }
            match self.peek() {
                None => return Ok(false),
                Some('\n') => {
                    self.pos += 1;
                    self.line += 1;
                }
                Some('#') => self.skip_comment(),
                Some(_) => {
                    self.indent_to(width)?;
                    return Ok(true);
                }
            }
        }
    }

    fn indent_to(&mut self, width: usize) -> Result<(), ParseError> {
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            if self.indents.len() > MAX_INDENT_DEPTH {
                return Err(self.error("too many levels of indentation"));
            }
            self.indents.push(width);
            self.push(Tok::Indent, self.line);
            return Ok(());
        }
        while width < self.indents.last().copied().unwrap_or(0) {
            self.indents.pop();
            self.push(Tok::Dedent, self.line);
        }
        if width != self.indents.last().copied().unwrap_or(0) {
            return Err(self.error("unindent does not match any outer indentation level"));
        }
        Ok(())
    }

    fn skip_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.pos += 1;
        }
    }

    fn name(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        if matches!(self.peek(), Some('\'' | '"')) {
            match word.to_ascii_lowercase().as_str() {
                "r" => {
                    let line = self.line;
                    let text = self.string(true)?;
                    self.push(Tok::Str(text), line);
                    return Ok(());
                }
                "u" => {
                    let line = self.line;
                    let text = self.string(false)?;
                    self.push(Tok::Str(text), line);
                    return Ok(());
                }
                "f" | "rf" | "fr" => return Err(self.error("f-strings are not supported")),
                "b" | "rb" | "br" => return Err(self.error("bytes literals are not supported")),
                _ => {}
            }
        }

        let tok = match KEYWORDS.iter().find(|k| **k == word) {
            Some(keyword) => Tok::Keyword(keyword),
            None => Tok::Name(word),
        };
        self.push(tok, self.line);
        Ok(())
    }

    fn number(&mut self) -> Result<(), ParseError> {
        let line = self.line;
        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_digit(radix) || c == '_') {
                    self.pos += 1;
                }
                let digits: String = self.chars[start..self.pos].iter().filter(|c| **c != '_').collect();
                let value = i64::from_str_radix(&digits, radix)
                    .map_err(|_| self.error("invalid integer literal"))?;
                self.push(Tok::Int(value), line);
                return self.reject_trailing_name();
            }
        }

        let start = self.pos;
        let mut is_float = false;
        self.digits();
        if self.peek() == Some('.') {
            is_float = true;
            self.pos += 1;
            self.digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some('+' | '-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.pos += 1 + sign;
                self.digits();
            }
        }
        let text: String = self.chars[start..self.pos].iter().filter(|c| **c != '_').collect();
        let tok = if is_float {
            Tok::Float(text.parse().map_err(|_| self.error("invalid decimal literal"))?)
        } else {
            Tok::Int(text.parse().map_err(|_| self.error("integer literal is too large"))?)
        };
        self.push(tok, line);
        self.reject_trailing_name()
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.pos += 1;
        }
    }

    fn reject_trailing_name(&self) -> Result<(), ParseError> {
        if self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return Err(self.error("invalid decimal literal"));
        }
        Ok(())
    }

    fn string(&mut self, raw: bool) -> Result<String, ParseError> {
        let start_line = self.line;
        let Some(quote) = self.peek() else {
            return Err(self.error("unterminated string literal"));
        };
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut text = String::new();
        loop {
            let Some(c) = self.peek() else {
                let message = if triple {
                    "unterminated triple-quoted string literal"
                } else {
                    "unterminated string literal"
                };
                return Err(ParseError::new(start_line, message));
            };
            if c == quote {
                if !triple {
                    self.pos += 1;
                    break;
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
            }
            if c == '\n' {
                if !triple {
                    return Err(ParseError::new(start_line, "unterminated string literal"));
                }
                self.line += 1;
            }
            self.pos += 1;
            if c != '\\' {
                text.push(c);
                continue;
            }

            let Some(escaped) = self.peek() else { continue };
            self.pos += 1;
            if escaped == '\n' {
                self.line += 1;
            }
            if raw {
                text.push('\\');
                text.push(escaped);
                continue;
            }
            match escaped {
                '\n' => {}
                'n' => text.push('\n'),
                't' => text.push('\t'),
                'r' => text.push('\r'),
                '0' => text.push('\0'),
                '\\' | '\'' | '"' => text.push(escaped),
                other => {
                    text.push('\\');
                    text.push(other);
                }
            }
        }
        Ok(text)
    }

    fn punct(&mut self) -> Result<(), ParseError> {
        let line = self.line;
        let Some(punct) = PUNCTS.iter().find(|p| {
            p.chars().enumerate().all(|(i, c)| self.peek_at(i) == Some(c))
        }) else {
            let c = self.peek().unwrap_or(' ');
            return Err(self.error(format!("invalid character '{c}'")));
        };
        self.pos += punct.chars().count();

        match *punct {
            "(" | "[" | "{" => {
                if self.brackets.len() >= MAX_BRACKET_DEPTH {
                    return Err(self.error("too many nested parentheses"));
                }
                self.brackets.push((punct.chars().next().unwrap_or('('), line));
            }
            ")" | "]" | "}" => {
                let close = punct.chars().next().unwrap_or(')');
                let Some((open, _)) = self.brackets.pop() else {
                    return Err(self.error(format!("unmatched '{close}'")));
                };
                let expected = match open {
                    '(' => ')',
                    '[' => ']',
                    _ => '}',
                };
                if close != expected {
                    return Err(self.error(format!(
                        "closing parenthesis '{close}' does not match opening parenthesis '{open}'"
                    )));
                }
            }
            _ => {}
        }
        self.push(Tok::Punct(punct), line);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Tok> {
        tokenize(source).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn test_indentation_tokens() {
        let toks = kinds("def f(x):\n    return x\n");
        assert_eq!(
            toks,
            vec![
                Tok::Keyword("def"),
                Tok::Name("f".into()),
                Tok::Punct("("),
                Tok::Name("x".into()),
                Tok::Punct(")"),
                Tok::Punct(":"),
                Tok::Newline,
                Tok::Indent,
                Tok::Keyword("return"),
                Tok::Name("x".into()),
                Tok::Newline,
                Tok::Dedent,
                Tok::Eof,
            ]
        );
    }

    #[test]
    fn test_blank_and_comment_lines_are_skipped() {
        let toks = kinds("x = 1\n\n   # note\ny = 2");
        let newlines = toks.iter().filter(|t| **t == Tok::Newline).count();
        assert_eq!(newlines, 2);
        assert!(!toks.contains(&Tok::Indent));
    }

    #[test]
    fn test_brackets_join_lines() {
        let tokens = tokenize("x = [1,\n     2]\ny = 3\n").unwrap();
        let y = tokens.iter().find(|t| t.tok == Tok::Name("y".into())).unwrap();
        assert_eq!(y.line, 3);
        assert_eq!(tokens.iter().filter(|t| t.tok == Tok::Newline).count(), 2);
    }

    #[test]
    fn test_numbers_and_strings() {
        let toks = kinds("a = 0x1f + 2.5e1 + 1_000\nb = 'it\\'s' \"x\\ny\"\n");
        assert!(toks.contains(&Tok::Int(31)));
        assert!(toks.contains(&Tok::Float(25.0)));
        assert!(toks.contains(&Tok::Int(1000)));
        assert!(toks.contains(&Tok::Str("it's".into())));
        assert!(toks.contains(&Tok::Str("x\ny".into())));
    }

    #[test]
    fn test_triple_quoted_string_counts_lines() {
        let tokens = tokenize("s = \"\"\"a\nb\"\"\"\nt = 1\n").unwrap();
        let t = tokens.iter().find(|t| t.tok == Tok::Name("t".into())).unwrap();
        assert_eq!(t.line, 3);
    }

    #[test]
    fn test_bad_dedent() {
        let err = tokenize("if x:\n        y = 1\n    z = 2\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.message.contains("unindent"));
    }

    #[test]
    fn test_unclosed_bracket_reports_opening_line() {
        let err = tokenize("x = (1,\n2\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.message, "'(' was never closed");
    }

    #[test]
    fn test_bracket_nesting_limit() {
        let nested = |depth: usize| format!("x = {}1{}\n", "(".repeat(depth), ")".repeat(depth));
        assert!(tokenize(&nested(MAX_BRACKET_DEPTH)).is_ok());
        let err = tokenize(&nested(MAX_BRACKET_DEPTH + 1)).unwrap_err();
        assert_eq!(err.line, 1);
        assert_eq!(err.message, "too many nested parentheses");
    }

    #[test]
    fn test_indentation_limit() {
        let mut source = String::new();
        for level in 0..=MAX_INDENT_DEPTH {
            source.push_str(&format!("{}if x:\n", " ".repeat(level)));
        }
        source.push_str(&format!("{}pass\n", " ".repeat(MAX_INDENT_DEPTH + 1)));
        let err = tokenize(&source).unwrap_err();
        assert_eq!(err.message, "too many levels of indentation");
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("x = 'abc\n").unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("x = 1 $ 2").unwrap_err();
        assert_eq!(err.message, "invalid character '$'");
    }
}
