//! Template error types

use super::ast::Location;
use std::path::PathBuf;
use thiserror::Error;

/// Template parsing and rendering errors
///
/// Every variant aborts the current render call only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    /// Malformed directive syntax
    #[error("Parse error at {location}: {message}")]
    Parse {
        /// Error message
        message: String,
        /// Where the offending directive starts
        location: Location,
    },

    /// A referenced name has no value
    ///
    /// For an indirect reference whose second level is missing, `name` is the
    /// missing second-level name and `via` the first-level name that held it.
    #[error("Unbound variable '{name}'{} at {location}", via_note(.via))]
    UnboundVariable {
        name: String,
        via: Option<String>,
        location: Location,
    },

    /// Loop target is not a sequence
    #[error("'{expr}' is a {kind}, not a sequence, at {location}")]
    NotIterable {
        expr: String,
        kind: &'static str,
        location: Location,
    },

    /// Records and sequences have no text form
    #[error("'{expr}' is a {kind} and cannot be printed at {location}. Use a field or a foreach loop")]
    NotRenderable {
        expr: String,
        kind: &'static str,
        location: Location,
    },

    /// An operator or function was applied to values it does not accept
    #[error("Type mismatch at {location}: {message}")]
    TypeMismatch { message: String, location: Location },

    /// Include/page target does not name a known template
    #[error("'{identifier}' does not resolve to a template")]
    UnresolvedIdentifier { identifier: String },

    /// Identifier is not a well-formed dotted name
    #[error("Invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    /// Identifier resolves to a file outside the template root
    #[error("Identifier '{identifier}' resolves outside the template root")]
    PathEscape { identifier: String },

    /// A template includes itself, directly or through others
    #[error("Cyclic include: {}", .chain.join(" -> "))]
    CyclicInclude { chain: Vec<String> },

    /// Include nesting went deeper than the configured maximum
    #[error("Include depth exceeded {max} while including '{identifier}'")]
    IncludeDepthExceeded { identifier: String, max: usize },

    /// Template source could not be read
    #[error("Failed to read '{}': {message}", .path.display())]
    Io { path: PathBuf, message: String },

    /// An error raised while rendering the named template
    #[error("In '{identifier}': {source}")]
    InTemplate {
        identifier: String,
        source: Box<TemplateError>,
    },
}

fn via_note(via: &Option<String>) -> String {
    match via {
        Some(via) => format!(" (named by '{}')", via),
        None => String::new(),
    }
}

impl TemplateError {
    /// Wrap this error with the identifier of the template it occurred in
    pub fn in_template(self, identifier: impl Into<String>) -> Self {
        TemplateError::InTemplate {
            identifier: identifier.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all [`TemplateError::InTemplate`] layers removed
    pub fn root_cause(&self) -> &TemplateError {
        let mut current = self;
        while let TemplateError::InTemplate { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    /// Identifiers of the templates the error passed through, outermost first
    pub fn template_trail(&self) -> Vec<&str> {
        let mut trail = Vec::new();
        let mut current = self;
        while let TemplateError::InTemplate { identifier, source } = current {
            trail.push(identifier.as_str());
            current = source.as_ref();
        }
        trail
    }
}
