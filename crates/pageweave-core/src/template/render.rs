//! Directive tree evaluation
//!
//! Rendering is a depth-first, left-to-right walk over the tree. Loops and
//! includes derive child contexts; nothing is ever written back to the caller's
//! context. Includes are delegated through the [`Includer`] seam so that this
//! module stays free of file system concerns.

use super::ast::{CompareOp, Expr, Function, Location, Node, Template};
use super::error::TemplateError;
use super::functions;
use crate::context::{Context, LookupError};
use crate::value::{Record, Value};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// One template on the include stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeFrame {
    pub identifier: String,
    pub path: PathBuf,
}

/// Templates currently being rendered, outermost first
///
/// Used to reject include cycles before they recurse.
#[derive(Debug, Clone, Default)]
pub struct IncludeStack {
    frames: Vec<IncludeFrame>,
}

impl IncludeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of templates being rendered
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.frames.iter().any(|frame| frame.path == path)
    }

    /// Enter a template
    ///
    /// # Errors
    ///
    /// [`TemplateError::CyclicInclude`] when `path` is already on the stack;
    /// the chain lists every identifier from the first occurrence onwards.
    pub fn push(&mut self, identifier: &str, path: &Path) -> Result<(), TemplateError> {
        if let Some(first) = self.frames.iter().position(|frame| frame.path == path) {
            let mut chain: Vec<String> = self.frames[first..]
                .iter()
                .map(|frame| frame.identifier.clone())
                .collect();
            chain.push(identifier.to_string());
            return Err(TemplateError::CyclicInclude { chain });
        }
        self.frames.push(IncludeFrame {
            identifier: identifier.to_string(),
            path: path.to_path_buf(),
        });
        Ok(())
    }

    pub fn pop(&mut self) -> Option<IncludeFrame> {
        self.frames.pop()
    }

    pub fn identifiers(&self) -> Vec<&str> {
        self.frames.iter().map(|frame| frame.identifier.as_str()).collect()
    }
}

/// Renders include targets
///
/// `context` is already derived from the caller's context with the include's
/// explicit bindings applied.
pub trait Includer {
    fn include(
        &self,
        identifier: &str,
        context: &Context,
        stack: &mut IncludeStack,
    ) -> Result<String, TemplateError>;
}

/// Includer for standalone rendering: no template resolves
struct NoIncludes;

impl Includer for NoIncludes {
    fn include(&self, identifier: &str, _: &Context, _: &mut IncludeStack) -> Result<String, TemplateError> {
        Err(TemplateError::UnresolvedIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

/// Render a template against a context, without include support
///
/// Include directives fail with [`TemplateError::UnresolvedIdentifier`].
pub fn render(template: &Template, context: &Context) -> Result<String, TemplateError> {
    render_with(template, context, &NoIncludes, &mut IncludeStack::new())
}

/// Render a template, delegating include directives to `includer`
pub fn render_with(
    template: &Template,
    context: &Context,
    includer: &dyn Includer,
    stack: &mut IncludeStack,
) -> Result<String, TemplateError> {
    let mut renderer = Renderer { includer, stack };
    let mut out = String::new();
    renderer.render_nodes(template.nodes(), context, &mut out)?;
    Ok(out)
}

struct Renderer<'r> {
    includer: &'r dyn Includer,
    stack: &'r mut IncludeStack,
}

impl Renderer<'_> {
    fn render_nodes(&mut self, nodes: &[Node], ctx: &Context, out: &mut String) -> Result<(), TemplateError> {
        for node in nodes {
            self.render_node(node, ctx, out)?;
        }
        Ok(())
    }

    fn render_node(&mut self, node: &Node, ctx: &Context, out: &mut String) -> Result<(), TemplateError> {
        match node {
            Node::Literal(text) => out.push_str(text),
            Node::Output { expr, escape, at } => {
                let value = eval(expr, ctx, *at)?;
                let text = value.to_text().ok_or_else(|| TemplateError::NotRenderable {
                    expr: expr.to_string(),
                    kind: value.kind(),
                    location: *at,
                })?;
                out.push_str(&escape.apply(&text));
            }
            Node::Conditional {
                predicate,
                then_branch,
                else_branch,
                at,
            } => {
                if eval(predicate, ctx, *at)?.is_truthy() {
                    self.render_nodes(then_branch, ctx, out)?;
                } else if let Some(else_branch) = else_branch {
                    self.render_nodes(else_branch, ctx, out)?;
                }
            }
            Node::Loop {
                sequence,
                item,
                key,
                body,
                at,
            } => {
                let target = eval(sequence, ctx, *at)?;
                let items = target.as_sequence().ok_or_else(|| TemplateError::NotIterable {
                    expr: sequence.to_string(),
                    kind: target.kind(),
                    location: *at,
                })?;
                for (index, element) in items.iter().enumerate() {
                    let mut bindings = Vec::with_capacity(2);
                    if let Some(key) = key {
                        bindings.push((key.as_str(), Value::from(index)));
                    }
                    bindings.push((item.as_str(), element.clone()));
                    let child = ctx.derive(bindings);
                    self.render_nodes(body, &child, out)?;
                }
            }
            Node::Include { target, bindings, at } => {
                let identifier = eval(target, ctx, *at)?;
                let identifier = identifier.as_str().ok_or_else(|| TemplateError::TypeMismatch {
                    message: format!(
                        "include target `{}` must be a string identifier, found {}",
                        target,
                        identifier.kind()
                    ),
                    location: *at,
                })?;
                let extra = match bindings {
                    Some(expr) => record_of(expr, eval(expr, ctx, *at)?.into_owned(), *at)?,
                    None => Record::new(),
                };
                let child = ctx.derive(extra);
                out.push_str(&self.includer.include(identifier, &child, self.stack)?);
            }
        }
        Ok(())
    }
}

fn record_of(expr: &Expr, value: Value, at: Location) -> Result<Record, TemplateError> {
    match value {
        Value::Record(fields) => Ok(fields),
        Value::Sequence(items) if items.is_empty() => Ok(Record::new()),
        other => Err(TemplateError::TypeMismatch {
            message: format!(
                "include bindings `{}` must be a [\"Name\" => value] map, found {}",
                expr,
                other.kind()
            ),
            location: at,
        }),
    }
}

fn lookup_error(err: LookupError, at: Location) -> TemplateError {
    match err {
        LookupError::Unbound { name } => TemplateError::UnboundVariable {
            name,
            via: None,
            location: at,
        },
        LookupError::IndirectUnbound { via, name } => TemplateError::UnboundVariable {
            name,
            via: Some(via),
            location: at,
        },
        LookupError::NotAName { name, kind } => TemplateError::TypeMismatch {
            message: format!("`$${}` needs `${}` to hold a variable name, found {}", name, name, kind),
            location: at,
        },
    }
}

/// Where an `[index]` points
enum Slot {
    Position(Option<usize>),
    Field(String),
}

/// Narrow a value to one of its parts, borrowing when the value is borrowed
fn project<'c>(value: Cow<'c, Value>, pick: impl Fn(&Value) -> Option<&Value>) -> Option<Cow<'c, Value>> {
    match value {
        Cow::Borrowed(value) => pick(value).map(Cow::Borrowed),
        Cow::Owned(value) => pick(&value).cloned().map(Cow::Owned),
    }
}

fn eval<'c>(expr: &Expr, ctx: &'c Context, at: Location) -> Result<Cow<'c, Value>, TemplateError> {
    let value = match expr {
        Expr::Var(name) => Cow::Borrowed(ctx.get(name).map_err(|e| lookup_error(e, at))?),
        Expr::IndirectRef(name) => Cow::Borrowed(ctx.resolve_indirect(name).map_err(|e| lookup_error(e, at))?),
        Expr::Field(inner, field) => {
            let base = eval(inner, ctx, at)?;
            if base.as_record().is_none() {
                return Err(TemplateError::TypeMismatch {
                    message: format!("cannot read field `{}` of `{}`, a {}", field, inner, base.kind()),
                    location: at,
                });
            }
            project(base, |v| v.field(field)).ok_or_else(|| TemplateError::UnboundVariable {
                name: expr.to_string(),
                via: None,
                location: at,
            })?
        }
        Expr::Index(inner, index) => {
            let base = eval(inner, ctx, at)?;
            let index_value = eval(index, ctx, at)?;
            let slot = match (base.as_ref(), index_value.as_ref()) {
                (Value::Sequence(_), Value::Int(i)) => Slot::Position(usize::try_from(*i).ok()),
                (Value::Record(_), Value::String(key)) => Slot::Field(key.clone()),
                (container, key) => {
                    return Err(TemplateError::TypeMismatch {
                        message: format!(
                            "cannot index a {} with a {} in `{}`",
                            container.kind(),
                            key.kind(),
                            expr
                        ),
                        location: at,
                    });
                }
            };
            let picked = match slot {
                Slot::Position(i) => project(base, |v| i.and_then(|i| v.as_sequence()?.get(i))),
                Slot::Field(key) => project(base, |v| v.field(&key)),
            };
            picked.ok_or_else(|| TemplateError::UnboundVariable {
                name: expr.to_string(),
                via: None,
                location: at,
            })?
        }
        Expr::Literal(value) => Cow::Owned(value.clone()),
        Expr::List(items) => Cow::Owned(Value::Sequence(
            items
                .iter()
                .map(|item| eval(item, ctx, at).map(Cow::into_owned))
                .collect::<Result<_, _>>()?,
        )),
        Expr::Map(entries) => Cow::Owned(Value::Record(
            entries
                .iter()
                .map(|(key, item)| Ok((key.clone(), eval(item, ctx, at)?.into_owned())))
                .collect::<Result<_, TemplateError>>()?,
        )),
        Expr::Not(inner) => Cow::Owned(Value::Bool(!eval(inner, ctx, at)?.is_truthy())),
        Expr::And(lhs, rhs) => {
            let result = eval(lhs, ctx, at)?.is_truthy() && eval(rhs, ctx, at)?.is_truthy();
            Cow::Owned(Value::Bool(result))
        }
        Expr::Or(lhs, rhs) => {
            let result = eval(lhs, ctx, at)?.is_truthy() || eval(rhs, ctx, at)?.is_truthy();
            Cow::Owned(Value::Bool(result))
        }
        Expr::Compare(op, lhs, rhs) => {
            let lhs_value = eval(lhs, ctx, at)?;
            let rhs_value = eval(rhs, ctx, at)?;
            Cow::Owned(Value::Bool(compare(*op, &lhs_value, &rhs_value, expr, at)?))
        }
        Expr::Call(function @ (Function::Isset | Function::Empty), arg) => {
            let value = match eval(arg, ctx, at) {
                Ok(value) => value.into_owned(),
                Err(TemplateError::UnboundVariable { .. }) => Value::Null,
                Err(other) => return Err(other),
            };
            Cow::Owned(functions::apply(*function, arg, value, at)?)
        }
        Expr::Call(function, arg) => {
            let value = eval(arg, ctx, at)?.into_owned();
            Cow::Owned(functions::apply(*function, arg, value, at)?)
        }
    };
    Ok(value)
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(l), Some(r)) => l == r,
        _ => lhs == rhs,
    }
}

fn compare(op: CompareOp, lhs: &Value, rhs: &Value, expr: &Expr, at: Location) -> Result<bool, TemplateError> {
    let accept: fn(Ordering) -> bool = match op {
        CompareOp::Eq => return Ok(values_equal(lhs, rhs)),
        CompareOp::Ne => return Ok(!values_equal(lhs, rhs)),
        CompareOp::Lt => |o| o == Ordering::Less,
        CompareOp::Gt => |o| o == Ordering::Greater,
        CompareOp::Le => |o| o != Ordering::Greater,
        CompareOp::Ge => |o| o != Ordering::Less,
    };
    let ordering = match (lhs, rhs) {
        (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => {
                return Err(TemplateError::TypeMismatch {
                    message: format!("cannot order a {} and a {} in `{}`", lhs.kind(), rhs.kind(), expr),
                    location: at,
                });
            }
        },
    };
    // NaN is unordered: every ordering test is false
    Ok(ordering.is_some_and(accept))
}
