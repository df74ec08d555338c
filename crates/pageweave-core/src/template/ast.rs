//! Directive tree produced by the parser

use crate::value::Value;
use std::fmt;

/// 1-based line/column of a directive in its template source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A parsed template: an ordered list of nodes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    pub(crate) nodes: Vec<Node>,
}

impl Template {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

/// Escape policy of an output directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    /// `<?= expr ?>`: HTML-escaped
    Html,
    /// `<?! expr ?>`: emitted verbatim
    Raw,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(String),
    Output {
        expr: Expr,
        escape: Escape,
        at: Location,
    },
    Conditional {
        predicate: Expr,
        then_branch: Vec<Node>,
        else_branch: Option<Vec<Node>>,
        at: Location,
    },
    Loop {
        sequence: Expr,
        item: String,
        key: Option<String>,
        body: Vec<Node>,
        at: Location,
    },
    Include {
        target: Expr,
        bindings: Option<Expr>,
        at: Location,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
        }
    }
}

/// Built-in functions callable from expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Upper,
    Lower,
    Strlen,
    Len,
    HtmlSpecialChars,
    Isset,
    Empty,
    Print,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "upper" | "strtoupper" => Some(Function::Upper),
            "lower" | "strtolower" => Some(Function::Lower),
            "strlen" => Some(Function::Strlen),
            "len" | "count" => Some(Function::Len),
            "htmlspecialchars" => Some(Function::HtmlSpecialChars),
            "isset" => Some(Function::Isset),
            "empty" => Some(Function::Empty),
            "print" => Some(Function::Print),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Upper => "upper",
            Function::Lower => "lower",
            Function::Strlen => "strlen",
            Function::Len => "len",
            Function::HtmlSpecialChars => "htmlspecialchars",
            Function::Isset => "isset",
            Function::Empty => "empty",
            Function::Print => "print",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `$Name`
    Var(String),
    /// `$$Name`: the value of the variable whose name `Name` holds
    IndirectRef(String),
    /// `expr->Field`
    Field(Box<Expr>, String),
    /// `expr[index]`
    Index(Box<Expr>, Box<Expr>),
    Literal(Value),
    /// `[a, b, c]`
    List(Vec<Expr>),
    /// `["Key" => expr, ...]`
    Map(Vec<(String, Expr)>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Call(Function, Box<Expr>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(name) => write!(f, "${}", name),
            Expr::IndirectRef(name) => write!(f, "$${}", name),
            Expr::Field(inner, field) => write!(f, "{}->{}", inner, field),
            Expr::Index(inner, index) => write!(f, "{}[{}]", inner, index),
            Expr::Literal(Value::String(s)) => write!(f, "{:?}", s),
            Expr::Literal(value) => match value.to_text() {
                Some(text) if !value.is_null() => f.write_str(&text),
                _ => f.write_str("null"),
            },
            Expr::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Expr::Map(entries) => {
                f.write_str("[")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?} => {}", key, value)?;
                }
                f.write_str("]")
            }
            Expr::Not(inner) => write!(f, "!{}", inner),
            Expr::And(lhs, rhs) => write!(f, "{} && {}", lhs, rhs),
            Expr::Or(lhs, rhs) => write!(f, "{} || {}", lhs, rhs),
            Expr::Compare(op, lhs, rhs) => write!(f, "{} {} {}", lhs, op.symbol(), rhs),
            Expr::Call(function, arg) => write!(f, "{}({})", function.name(), arg),
        }
    }
}
