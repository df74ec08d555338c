//! Built-in expression functions

use super::ast::{Expr, Function, Location};
use super::error::TemplateError;
use super::escape::escape_html;
use crate::value::Value;

fn text_of(function: Function, arg: &Expr, value: &Value, at: Location) -> Result<String, TemplateError> {
    value.to_text().ok_or_else(|| TemplateError::TypeMismatch {
        message: format!(
            "`{}` expects a scalar, but `{}` is a {}",
            function.name(),
            arg,
            value.kind()
        ),
        location: at,
    })
}

/// Apply a function to an already evaluated, bound argument
///
/// `isset` and `empty` also accept unbound names; the renderer answers those
/// before evaluation reaches here.
pub(crate) fn apply(function: Function, arg: &Expr, value: Value, at: Location) -> Result<Value, TemplateError> {
    let result = match function {
        Function::Upper => Value::String(text_of(function, arg, &value, at)?.to_uppercase()),
        Function::Lower => Value::String(text_of(function, arg, &value, at)?.to_lowercase()),
        Function::Strlen => Value::from(text_of(function, arg, &value, at)?.chars().count()),
        Function::HtmlSpecialChars => {
            let text = text_of(function, arg, &value, at)?;
            Value::String(escape_html(&text).into_owned())
        }
        Function::Len => match &value {
            Value::Null => Value::Int(0),
            Value::Sequence(items) => Value::from(items.len()),
            Value::Record(fields) => Value::from(fields.len()),
            Value::String(s) => Value::from(s.chars().count()),
            other => {
                return Err(TemplateError::TypeMismatch {
                    message: format!("`len` cannot count a {} (`{}`)", other.kind(), arg),
                    location: at,
                });
            }
        },
        Function::Isset => Value::Bool(!value.is_null()),
        Function::Empty => Value::Bool(!value.is_truthy()),
        Function::Print => value,
    };
    Ok(result)
}
