//! Expression lexing and parsing
//!
//! Precedence, loosest first: `||`, `&&`, comparisons (non-associative),
//! unary `!`, postfix `->field` / `[index]`, primaries.

use super::ast::{CompareOp, Expr, Function, Location};
use super::error::TemplateError;
use crate::value::Value;

/// Deepest expression tree the parser builds
pub(crate) const MAX_EXPR_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    /// `$name`
    Var(String),
    /// `$$name`
    Indirect(String),
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Arrow,
    FatArrow,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Bang,
    AndAnd,
    OrOr,
    Compare(CompareOp),
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::Var(name) => format!("`${}`", name),
            Tok::Indirect(name) => format!("`$${}`", name),
            Tok::Ident(name) => format!("`{}`", name),
            Tok::Str(s) => format!("string {:?}", s),
            Tok::Int(i) => format!("`{}`", i),
            Tok::Float(f) => format!("`{}`", f),
            Tok::Arrow => "`->`".to_string(),
            Tok::FatArrow => "`=>`".to_string(),
            Tok::LParen => "`(`".to_string(),
            Tok::RParen => "`)`".to_string(),
            Tok::LBracket => "`[`".to_string(),
            Tok::RBracket => "`]`".to_string(),
            Tok::Comma => "`,`".to_string(),
            Tok::Colon => "`:`".to_string(),
            Tok::Semicolon => "`;`".to_string(),
            Tok::Bang => "`!`".to_string(),
            Tok::AndAnd => "`&&`".to_string(),
            Tok::OrOr => "`||`".to_string(),
            Tok::Compare(op) => format!("`{}`", op.symbol()),
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Lexer<'s> {
    chars: Vec<char>,
    pos: usize,
    at: Location,
    source: &'s str,
}

impl<'s> Lexer<'s> {
    fn new(source: &'s str, at: Location) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            at,
            source,
        }
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Parse {
            message: message.into(),
            location: self.at,
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn name(&mut self) -> String {
        let start = self.pos;
        while self.peek(0).is_some_and(is_name_char) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn variable(&mut self) -> Result<Tok, TemplateError> {
        // on `$`
        self.pos += 1;
        let indirect = self.peek(0) == Some('$');
        if indirect {
            self.pos += 1;
        }
        if !self.peek(0).is_some_and(is_name_start) {
            return Err(self.error(format!("expected a variable name after `$` in `{}`", self.source.trim())));
        }
        let name = self.name();
        Ok(if indirect { Tok::Indirect(name) } else { Tok::Var(name) })
    }

    fn string(&mut self, quote: char) -> Result<Tok, TemplateError> {
        self.pos += 1;
        let mut text = String::new();
        loop {
            let Some(c) = self.peek(0) else {
                return Err(self.error("unterminated string literal"));
            };
            self.pos += 1;
            match c {
                c if c == quote => return Ok(Tok::Str(text)),
                '\\' => {
                    let Some(next) = self.peek(0) else {
                        return Err(self.error("unterminated string literal"));
                    };
                    self.pos += 1;
                    match (quote, next) {
                        (_, '\\') => text.push('\\'),
                        (q, n) if q == n => text.push(n),
                        ('"', 'n') => text.push('\n'),
                        ('"', 't') => text.push('\t'),
                        ('"', 'r') => text.push('\r'),
                        ('"', '$') => text.push('$'),
                        (_, other) => {
                            text.push('\\');
                            text.push(other);
                        }
                    }
                }
                other => text.push(other),
            }
        }
    }

    fn number(&mut self) -> Result<Tok, TemplateError> {
        let start = self.pos;
        if self.peek(0) == Some('-') {
            self.pos += 1;
        }
        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let is_float = self.peek(0) == Some('.') && self.peek(1).is_some_and(|c| c.is_ascii_digit());
        if is_float {
            self.pos += 1;
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            text.parse()
                .map(Tok::Float)
                .map_err(|_| self.error(format!("invalid number `{}`", text)))
        } else {
            text.parse()
                .map(Tok::Int)
                .map_err(|_| self.error(format!("integer `{}` out of range", text)))
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), TemplateError> {
        self.pos += 2;
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some('*'), Some('/')) => {
                    self.pos += 2;
                    return Ok(());
                }
                (Some(_), _) => self.pos += 1,
                (None, _) => return Err(self.error("unterminated `/*` comment")),
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while self.peek(0).is_some_and(|c| c != '\n') {
            self.pos += 1;
        }
    }

    fn tokenize(mut self) -> Result<Vec<Tok>, TemplateError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek(0) {
            let next = self.peek(1);
            let tok = match c {
                c if c.is_whitespace() => {
                    self.pos += 1;
                    continue;
                }
                '/' if next == Some('*') => {
                    self.skip_block_comment()?;
                    continue;
                }
                '/' if next == Some('/') => {
                    self.skip_line_comment();
                    continue;
                }
                '#' => {
                    self.skip_line_comment();
                    continue;
                }
                '$' => self.variable()?,
                '"' | '\'' => self.string(c)?,
                c if c.is_ascii_digit() => self.number()?,
                '-' if next.is_some_and(|n| n.is_ascii_digit()) => self.number()?,
                c if is_name_start(c) => Tok::Ident(self.name()),
                _ => {
                    let (tok, width) = match (c, next, self.peek(2)) {
                        ('-', Some('>'), _) => (Tok::Arrow, 2),
                        ('=', Some('>'), _) => (Tok::FatArrow, 2),
                        ('=', Some('='), Some('=')) => (Tok::Compare(CompareOp::Eq), 3),
                        ('!', Some('='), Some('=')) => (Tok::Compare(CompareOp::Ne), 3),
                        ('=', Some('='), _) => (Tok::Compare(CompareOp::Eq), 2),
                        ('!', Some('='), _) => (Tok::Compare(CompareOp::Ne), 2),
                        ('<', Some('='), _) => (Tok::Compare(CompareOp::Le), 2),
                        ('>', Some('='), _) => (Tok::Compare(CompareOp::Ge), 2),
                        ('&', Some('&'), _) => (Tok::AndAnd, 2),
                        ('|', Some('|'), _) => (Tok::OrOr, 2),
                        ('<', _, _) => (Tok::Compare(CompareOp::Lt), 1),
                        ('>', _, _) => (Tok::Compare(CompareOp::Gt), 1),
                        ('!', _, _) => (Tok::Bang, 1),
                        ('(', _, _) => (Tok::LParen, 1),
                        (')', _, _) => (Tok::RParen, 1),
                        ('[', _, _) => (Tok::LBracket, 1),
                        (']', _, _) => (Tok::RBracket, 1),
                        (',', _, _) => (Tok::Comma, 1),
                        (':', _, _) => (Tok::Colon, 1),
                        (';', _, _) => (Tok::Semicolon, 1),
                        _ => return Err(self.error(format!("unexpected character `{}`", c))),
                    };
                    self.pos += width;
                    tok
                }
            };
            tokens.push(tok);
        }
        Ok(tokens)
    }
}

/// Cursor over the tokens of one directive
///
/// Statement parsing drives the cursor directly (keywords, `as`, bindings);
/// [`ExprParser::parse_expr`] parses a full expression at the cursor.
pub(crate) struct ExprParser {
    tokens: Vec<Tok>,
    pos: usize,
    at: Location,
    depth: usize,
}

impl ExprParser {
    pub fn new(source: &str, at: Location) -> Result<Self, TemplateError> {
        Ok(Self {
            tokens: Lexer::new(source, at).tokenize()?,
            pos: 0,
            at,
            depth: 0,
        })
    }

    pub fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Parse {
            message: message.into(),
            location: self.at,
        }
    }

    pub fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    pub fn peek_at(&self, offset: usize) -> Option<&Tok> {
        self.tokens.get(self.pos + offset)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn advance(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    pub fn eat(&mut self, expected: &Tok) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Ident(name)) if name == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn found(&self) -> String {
        self.peek()
            .map(Tok::describe)
            .unwrap_or_else(|| "end of directive".to_string())
    }

    pub fn expect(&mut self, expected: &Tok) -> Result<(), TemplateError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}, found {}", expected.describe(), self.found())))
        }
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> Result<(), TemplateError> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{}`, found {}", keyword, self.found())))
        }
    }

    /// A `$name` binding target
    pub fn expect_variable(&mut self) -> Result<String, TemplateError> {
        match self.peek() {
            Some(Tok::Var(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(format!("expected a `$name` binding, found {}", self.found()))),
        }
    }

    /// Require the end of the directive, allowing a trailing `;` or `:`
    pub fn finish(&mut self) -> Result<(), TemplateError> {
        if !self.eat(&Tok::Semicolon) {
            self.eat(&Tok::Colon);
        }
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.error(format!("unexpected {} at end of directive", self.found()))),
        }
    }

    /// One more level of tree height; trees are evaluated recursively
    fn deeper(&mut self) -> Result<(), TemplateError> {
        self.depth += 1;
        if self.depth > MAX_EXPR_DEPTH {
            return Err(self.error(format!(
                "expression nests deeper than the limit of {}",
                MAX_EXPR_DEPTH
            )));
        }
        Ok(())
    }

    pub fn parse_expr(&mut self) -> Result<Expr, TemplateError> {
        let depth = self.depth;
        self.deeper()?;
        let expr = self.parse_or()?;
        self.depth = depth;
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, TemplateError> {
        let depth = self.depth;
        let mut lhs = self.parse_and()?;
        while self.eat(&Tok::OrOr) || self.eat_keyword("or") {
            self.deeper()?;
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, TemplateError> {
        let depth = self.depth;
        let mut lhs = self.parse_compare()?;
        while self.eat(&Tok::AndAnd) || self.eat_keyword("and") {
            self.deeper()?;
            let rhs = self.parse_compare()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        self.depth = depth;
        Ok(lhs)
    }

    fn parse_compare(&mut self) -> Result<Expr, TemplateError> {
        let lhs = self.parse_unary()?;
        let Some(Tok::Compare(op)) = self.peek().cloned() else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.parse_unary()?;
        if let Some(Tok::Compare(next)) = self.peek() {
            return Err(self.error(format!(
                "comparisons cannot be chained (`{}` after `{}`); use `&&`",
                next.symbol(),
                op.symbol()
            )));
        }
        Ok(Expr::Compare(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_unary(&mut self) -> Result<Expr, TemplateError> {
        if self.eat(&Tok::Bang) {
            let depth = self.depth;
            self.deeper()?;
            let inner = self.parse_unary()?;
            self.depth = depth;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, TemplateError> {
        let depth = self.depth;
        let mut expr = self.parse_primary()?;
        loop {
            if matches!(self.peek(), Some(Tok::Arrow | Tok::LBracket)) {
                self.deeper()?;
            }
            if self.eat(&Tok::Arrow) {
                match self.advance() {
                    Some(Tok::Ident(field)) => expr = Expr::Field(Box::new(expr), field),
                    _ => return Err(self.error(format!("expected a field name after `{}->`", expr))),
                }
            } else if self.eat(&Tok::LBracket) {
                let index = self.parse_expr()?;
                self.expect(&Tok::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                self.depth = depth;
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, TemplateError> {
        let Some(tok) = self.advance() else {
            return Err(self.error("expected an expression, found end of directive"));
        };
        match tok {
            Tok::Var(name) => Ok(Expr::Var(name)),
            Tok::Indirect(name) => Ok(Expr::IndirectRef(name)),
            Tok::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Tok::Int(i) => Ok(Expr::Literal(Value::Int(i))),
            Tok::Float(f) => Ok(Expr::Literal(Value::Float(f))),
            Tok::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Tok::RParen)?;
                Ok(inner)
            }
            Tok::LBracket => self.parse_array(),
            Tok::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                "include" => Err(self.error(
                    "`include(...)` must be the whole directive, not part of an expression",
                )),
                _ => {
                    let function = Function::from_name(&name)
                        .ok_or_else(|| self.error(format!("unknown function `{}`", name)))?;
                    self.expect(&Tok::LParen)?;
                    let arg = self.parse_expr()?;
                    if self.peek() == Some(&Tok::Comma) {
                        return Err(self.error(format!("`{}` takes exactly one argument", name)));
                    }
                    self.expect(&Tok::RParen)?;
                    Ok(Expr::Call(function, Box::new(arg)))
                }
            },
            other => Err(self.error(format!("expected an expression, found {}", other.describe()))),
        }
    }

    /// `[a, b]` list or `["Key" => value]` map; the `[` is already consumed
    fn parse_array(&mut self) -> Result<Expr, TemplateError> {
        if self.eat(&Tok::RBracket) {
            return Ok(Expr::List(Vec::new()));
        }
        let first = self.parse_expr()?;
        if !self.eat(&Tok::FatArrow) {
            let mut items = vec![first];
            while self.eat(&Tok::Comma) {
                if self.peek() == Some(&Tok::RBracket) {
                    break;
                }
                items.push(self.parse_expr()?);
            }
            self.expect(&Tok::RBracket)?;
            return Ok(Expr::List(items));
        }

        let mut entries = Vec::new();
        let mut key = first;
        loop {
            let name = match key {
                Expr::Literal(Value::String(name)) => name,
                other => {
                    return Err(self.error(format!(
                        "map keys must be string literals, found `{}`",
                        other
                    )));
                }
            };
            entries.push((name, self.parse_expr()?));
            if !self.eat(&Tok::Comma) || self.peek() == Some(&Tok::RBracket) {
                break;
            }
            key = self.parse_expr()?;
            self.expect(&Tok::FatArrow)?;
        }
        self.expect(&Tok::RBracket)?;
        Ok(Expr::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Expr, TemplateError> {
        let mut parser = ExprParser::new(source, Location::new(1, 1))?;
        let expr = parser.parse_expr()?;
        parser.finish()?;
        Ok(expr)
    }

    #[test]
    fn test_parse_variables() {
        assert_eq!(parse("$Title").unwrap(), Expr::Var("Title".into()));
        assert_eq!(parse("$$Heading").unwrap(), Expr::IndirectRef("Heading".into()));
    }

    #[test]
    fn test_parse_field_and_index_chain() {
        let expr = parse("$Items[0]->Name").unwrap();
        assert_eq!(expr.to_string(), "$Items[0]->Name");
    }

    #[test]
    fn test_precedence_and_binds_tighter_than_or() {
        let expr = parse("$a || $b && !$c").unwrap();
        assert_eq!(
            expr,
            Expr::Or(
                Box::new(Expr::Var("a".into())),
                Box::new(Expr::And(
                    Box::new(Expr::Var("b".into())),
                    Box::new(Expr::Not(Box::new(Expr::Var("c".into()))))
                ))
            )
        );
    }

    #[test]
    fn test_comparison_with_function_call() {
        let expr = parse("count($NavItem->DropDown) > 0").unwrap();
        assert!(matches!(expr, Expr::Compare(CompareOp::Gt, _, _)));
        assert_eq!(expr.to_string(), "len($NavItem->DropDown) > 0");
    }

    #[test]
    fn test_chained_comparison_rejected() {
        let err = parse("1 < $x < 3").unwrap_err();
        assert!(err.to_string().contains("cannot be chained"));
    }

    #[test]
    fn test_strings_with_escapes() {
        assert_eq!(
            parse(r#""a\"b\n""#).unwrap(),
            Expr::Literal(Value::String("a\"b\n".into()))
        );
        assert_eq!(
            parse(r"'it\'s \n'").unwrap(),
            Expr::Literal(Value::String("it's \\n".into()))
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse("-3").unwrap(), Expr::Literal(Value::Int(-3)));
        assert_eq!(parse("2.5").unwrap(), Expr::Literal(Value::Float(2.5)));
    }

    #[test]
    fn test_map_literal() {
        let expr = parse(r#"["Title" => $Name, "Count" => 2,]"#).unwrap();
        let Expr::Map(entries) = expr else {
            panic!("expected map");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "Title");
    }

    #[test]
    fn test_map_requires_string_keys() {
        let err = parse("[$k => 1]").unwrap_err();
        assert!(err.to_string().contains("string literals"));
    }

    #[test]
    fn test_unknown_function() {
        let err = parse("shout($x)").unwrap_err();
        assert!(err.to_string().contains("unknown function `shout`"));
    }

    #[test]
    fn test_include_inside_expression_rejected() {
        let err = parse(r#"upper(include("a"))"#).unwrap_err();
        assert!(err.to_string().contains("whole directive"));
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(parse("/* note */ $x // trailing").unwrap(), Expr::Var("x".into()));
    }

    #[test]
    fn test_hash_comment_skipped() {
        assert_eq!(parse("$x # it's a note").unwrap(), Expr::Var("x".into()));
    }

    #[test]
    fn test_nesting_at_limit_accepted() {
        let source = format!("{}$x{}", "(".repeat(MAX_EXPR_DEPTH - 1), ")".repeat(MAX_EXPR_DEPTH - 1));
        assert_eq!(parse(&source).unwrap(), Expr::Var("x".into()));
    }

    #[test]
    fn test_deep_nesting_rejected() {
        for source in [
            format!("{}$x{}", "(".repeat(10_000), ")".repeat(10_000)),
            format!("{}$x", "!".repeat(10_000)),
            vec!["$x"; 10_000].join(" || "),
            format!("$x{}", "->a".repeat(10_000)),
        ] {
            let err = parse(&source).unwrap_err();
            assert!(err.to_string().contains("deeper than the limit"), "{}", err);
        }
    }

    #[test]
    fn test_long_flat_list_accepted() {
        let source = format!("[{}]", vec!["1"; 1_000].join(", "));
        let Expr::List(items) = parse(&source).unwrap() else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 1_000);
    }

    #[test]
    fn test_parse_is_pure() {
        let source = r#"isset($a) && $b->c != "x""#;
        assert_eq!(parse(source).unwrap(), parse(source).unwrap());
    }
}
