//! Shared test helpers for template tests

use crate::context::Context;
use crate::template::{TemplateError, parse, render};
use serde_json::json;

/// Parse and render in one step
pub(super) fn render_str(template: &str, context: &Context) -> Result<String, TemplateError> {
    render(&parse(template)?, context)
}

/// Scalars of every kind
pub(super) fn simple_context() -> Context {
    Context::from_json(json!({
        "Title": "My Title",
        "Count": 42,
        "Price": 9.99,
        "Enabled": true,
        "Missing": null,
        "Markup": "<b>bold</b> & more",
    }))
    .unwrap()
}

/// Navigation data in the shape the header component expects
pub(super) fn nav_context() -> Context {
    Context::from_json(json!({
        "Heading": "SiteName",
        "SiteName": "Portfolio",
        "NavItems": [
            {"Name": "Home", "Href": "/", "DropDown": null, "Disabled": false},
            {"Name": "Projects", "Href": "#", "Disabled": false, "DropDown": [
                {"Name": "Rust", "Href": "/projects/rust"},
                {"Name": "Web", "Href": "/projects/web"}
            ]},
            {"Name": "Drafts", "Href": "/drafts", "DropDown": null, "Disabled": true}
        ]
    }))
    .unwrap()
}
