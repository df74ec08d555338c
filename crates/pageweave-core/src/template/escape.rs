//! HTML escaping for output directives

use super::ast::Escape;
use std::borrow::Cow;

/// Escape `&`, `<`, `>`, `"` and `'` as HTML entities
///
/// Safe in element content and in single- or double-quoted attribute values.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    html_escape::encode_quoted_attribute(text)
}

impl Escape {
    /// Apply this policy to rendered text
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match self {
            Escape::Html => escape_html(text),
            Escape::Raw => Cow::Borrowed(text),
        }
    }
}
