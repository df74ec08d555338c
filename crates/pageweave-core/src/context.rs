//! Render context: scoped, ordered name → value bindings
//!
//! A [`Context`] is an immutable scope. Nested scopes (loop iterations,
//! includes) are created with [`Context::derive`], which shares the parent
//! through an `Arc` and shadows only the names it binds. Nothing ever writes
//! into a parent scope; a child's bindings disappear when the child is dropped.

use crate::error::PageweaveError;
use crate::value::{Record, Value};
use indexmap::IndexSet;
use std::sync::Arc;
use thiserror::Error;

/// Why a name could not be looked up
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The name is bound in no visible scope
    #[error("'{name}' is not bound")]
    Unbound { name: String },

    /// The first level of an indirect reference resolved, the name it holds did not
    #[error("'{name}' (named by '{via}') is not bound")]
    IndirectUnbound { via: String, name: String },

    /// The first level of an indirect reference does not hold a string
    #[error("'{name}' holds a {kind}, not a variable name")]
    NotAName { name: String, kind: &'static str },
}

impl LookupError {
    /// The binding that is actually missing (or unusable)
    pub fn missing_name(&self) -> &str {
        match self {
            LookupError::Unbound { name }
            | LookupError::IndirectUnbound { name, .. }
            | LookupError::NotAName { name, .. } => name,
        }
    }
}

#[derive(Debug)]
struct Scope {
    bindings: Record,
    parent: Option<Arc<Scope>>,
}

/// Scoped data context for a render call
#[derive(Debug, Clone)]
pub struct Context {
    scope: Arc<Scope>,
}

impl Context {
    /// Create a root context from a set of bindings
    pub fn new(bindings: Record) -> Self {
        Self {
            scope: Arc::new(Scope {
                bindings,
                parent: None,
            }),
        }
    }

    /// A root context without bindings
    pub fn empty() -> Self {
        Self::new(Record::new())
    }

    /// Build a root context from a JSON object
    pub fn from_json(data: serde_json::Value) -> Result<Self, PageweaveError> {
        Self::from_value(Value::from(data))
    }

    /// Build a root context from a TOML table
    pub fn from_toml(data: toml::Value) -> Result<Self, PageweaveError> {
        Self::from_value(Value::from(data))
    }

    /// Build a root context from a record value
    pub fn from_value(data: Value) -> Result<Self, PageweaveError> {
        match data {
            Value::Record(bindings) => Ok(Self::new(bindings)),
            other => Err(PageweaveError::ContextInvalid(format!(
                "top-level data must be a table/object, found {}",
                other.kind()
            ))),
        }
    }

    /// Look up a name, innermost scope first
    pub fn get(&self, name: &str) -> Result<&Value, LookupError> {
        let mut scope: &Scope = &self.scope;
        loop {
            if let Some(value) = scope.bindings.get(name) {
                return Ok(value);
            }
            match &scope.parent {
                Some(parent) => scope = parent.as_ref(),
                None => {
                    return Err(LookupError::Unbound {
                        name: name.to_string(),
                    });
                }
            }
        }
    }

    /// Two-level lookup: the value bound to `name` is itself the name to fetch
    pub fn resolve_indirect(&self, name: &str) -> Result<&Value, LookupError> {
        let key = self.get(name)?;
        let target = key.as_str().ok_or_else(|| LookupError::NotAName {
            name: name.to_string(),
            kind: key.kind(),
        })?;

        self.get(target)
            .map_err(|_| LookupError::IndirectUnbound {
                via: name.to_string(),
                name: target.to_string(),
            })
    }

    /// Derive a child context that shadows `bindings` and delegates the rest
    pub fn derive<I, K>(&self, bindings: I) -> Context
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Context {
            scope: Arc::new(Scope {
                bindings: bindings
                    .into_iter()
                    .map(|(name, value)| (name.into(), value))
                    .collect(),
                parent: Some(Arc::clone(&self.scope)),
            }),
        }
    }

    /// Derive a child context binding a single name
    pub fn with(&self, name: impl Into<String>, value: impl Into<Value>) -> Context {
        self.derive([(name.into(), value.into())])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Every visible name, innermost scope first, without duplicates
    pub fn names(&self) -> Vec<&str> {
        let mut names = IndexSet::new();
        let mut scope: Option<&Scope> = Some(&self.scope);
        while let Some(current) = scope {
            names.extend(current.bindings.keys().map(String::as_str));
            scope = current.parent.as_deref();
        }
        names.into_iter().collect()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Record> for Context {
    fn from(bindings: Record) -> Self {
        Self::new(bindings)
    }
}
