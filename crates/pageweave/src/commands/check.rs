//! Check command - parse every template under the root

use crate::context::AppContext;
use crate::output::print_json;
use anyhow::{Result, bail};
use colored::Colorize;
use pageweave_core::{TemplateError, ViewEngine};
use serde_json::json;

struct CheckResult {
    identifier: String,
    error: Option<TemplateError>,
}

/// Parse all templates
///
/// # Exit Code
///
/// Exits with code 1 if any template fails to parse.
pub fn run(root: Option<std::path::PathBuf>, json: bool, verbose: bool) -> Result<()> {
    let ctx = AppContext::new(root, verbose)?;
    let engine = ctx.engine()?;
    let results = check_all(&engine);

    if json {
        render_json(&engine, &results)?;
    } else {
        render_human(&ctx, &results);
    }

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        bail!("{} of {} template(s) failed to parse", failed, results.len());
    }
    Ok(())
}

fn check_all(engine: &ViewEngine) -> Vec<CheckResult> {
    engine
        .resolver()
        .list_identifiers()
        .into_iter()
        .map(|identifier| {
            let error = engine.load(&identifier).err();
            CheckResult { identifier, error }
        })
        .collect()
}

fn render_json(engine: &ViewEngine, results: &[CheckResult]) -> Result<()> {
    let templates: Vec<_> = results
        .iter()
        .map(|r| {
            json!({
                "identifier": r.identifier,
                "ok": r.error.is_none(),
                "error": r.error.as_ref().map(|e| e.root_cause().to_string()),
            })
        })
        .collect();
    let output = json!({
        "root": engine.resolver().root().display().to_string(),
        "templates": templates,
    });
    print_json(&serde_json::to_string_pretty(&output)?)?;
    Ok(())
}

fn render_human(ctx: &AppContext, results: &[CheckResult]) {
    if ctx.verbose {
        println!("Templates in {}", ctx.config.template_root(&ctx.root).display());
    }
    for result in results {
        match &result.error {
            None => println!("{} {}", "✓".green(), result.identifier),
            Some(error) => {
                println!("{} {}", "✗".red(), result.identifier);
                println!("  - {}", error.root_cause());
            }
        }
    }
    if ctx.verbose && results.is_empty() {
        println!("  (no templates found)");
    }

    println!();
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    if failed == 0 {
        println!("{} {} template(s) OK", "✓".green().bold(), results.len());
    } else {
        println!("{} {} error(s)", "✗".red().bold(), failed);
    }
}
