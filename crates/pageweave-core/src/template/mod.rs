//! Template module - directive templates for server-rendered views
//!
//! Views are HTML interleaved with `<? ... ?>` directives and are rendered
//! against a [`Context`](crate::context::Context).
//!
//! ## Syntax
//!
//! - Escaped output: `<?= $Title ?>`; raw output: `<?! $Body ?>`
//! - Indirect output: `<?= $$Heading ?>` prints the variable whose name `Heading` holds
//! - Loops: `<?php foreach ($Items as $i => $Item): ?> ... <?php endforeach ?>`
//! - Conditionals: `<?php if (expr): ?> ... <?php elseif (expr): ?> ... <?php else: ?> ... <?php endif ?>`
//! - Includes: `<?= include("components.header", ["Title" => $Name]) ?>`
//! - Escape sequences: `\<?` is a literal `<?`
//!
//! ## Pipeline
//!
//! [`parse`] turns text into a [`Template`] (pure, cacheable); [`render`]
//! evaluates a template against a context. Includes need a resolver and are
//! rendered through [`render_with`] by the view engine.

pub mod ast;
pub mod error;
pub mod escape;
mod expr;
mod functions;
mod parser;
pub mod render;
mod tokenize;

pub use ast::{Escape, Expr, Location, Node, Template};
pub use error::TemplateError;
pub use escape::escape_html;
pub use parser::{ParseOptions, parse, parse_with};
pub use render::{render, render_with, IncludeFrame, IncludeStack, Includer};

#[cfg(test)]
mod tests;
