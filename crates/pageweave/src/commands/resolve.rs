//! Resolve command - show the file behind an identifier

use crate::context::AppContext;
use crate::output::print_text;
use anyhow::Result;

pub fn run(root: Option<std::path::PathBuf>, identifier: String, verbose: bool) -> Result<()> {
    let ctx = AppContext::new(root, verbose)?;
    let engine = ctx.engine()?;
    let location = engine.locate(&identifier)?;
    print_text(&location.path.display().to_string())?;
    Ok(())
}
