//! pageweave: server-rendered view composition
//!
//! Pages are template files under a root directory, addressed by dotted
//! identifiers (`components.header`). A [`ViewEngine`] resolves an identifier,
//! parses the file once into a directive tree, renders it against a
//! [`Context`] and splices in included components. With live reload enabled,
//! file changes reported to the [`ReloadNotifier`] invalidate the parse cache
//! and notify connected browsers.

// Core modules
pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod path;
pub mod reload;
pub mod resolve;
pub mod template;
pub mod value;

// Re-export commonly used types
pub use cache::TemplateCache;
pub use config::Config;
pub use context::Context;
pub use engine::{EngineOptions, ViewEngine};
pub use error::{PageweaveError, Result};
pub use reload::{BroadcastReport, ReloadEvent, ReloadNotifier, Subscription};
pub use resolve::{IdentifierResolver, SourceLocation};
pub use template::TemplateError;
pub use value::{Record, Value};
