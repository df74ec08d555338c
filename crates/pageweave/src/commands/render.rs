//! Render command - render one page against a data file

use crate::context::AppContext;
use crate::output::print_raw;
use anyhow::{Context as _, Result, bail};
use pageweave_core::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Render `page` and write it to `output` or stdout
///
/// # Arguments
///
/// * `data` - JSON or TOML file whose top-level table becomes the context
pub fn run(
    root: Option<PathBuf>,
    page: String,
    data: Option<PathBuf>,
    output: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let ctx = AppContext::new(root, verbose)?;
    let engine = ctx.engine()?;
    let context = match data {
        Some(path) => load_data(&path)?,
        None => Context::empty(),
    };

    let html = engine
        .render_page(&page, &context)
        .with_context(|| format!("Failed to render '{}'", page))?;

    match output {
        Some(path) => {
            fs::write(&path, &html).with_context(|| format!("Failed to write {}", path.display()))?;
            debug!(page, path = %path.display(), bytes = html.len(), "page written");
        }
        None => print_raw(&html)?,
    }
    Ok(())
}

/// Load a context from a `.json` or `.toml` file
fn load_data(path: &Path) -> Result<Context> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();

    let context = match extension {
        "json" => {
            let value: serde_json::Value =
                serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))?;
            Context::from_json(value)?
        }
        "toml" => {
            let value: toml::Value =
                toml::from_str(&content).with_context(|| format!("Invalid TOML in {}", path.display()))?;
            Context::from_toml(value)?
        }
        other => bail!(
            "Unsupported data file '{}': expected .json or .toml, got '.{}'",
            path.display(),
            other
        ),
    };
    Ok(context)
}
