//! Release notes rendering.
//!
//! The notes source is lightweight markup (headings, emphasis, lists, links)
//! rendered to an HTML fragment with pulldown-cmark. When an HTML template is
//! available the fragment is substituted at its `{{release_notes}}`
//! placeholder with Handlebars; otherwise the bare fragment is used.

use crate::bundler::error::{Error, ErrorExt, Result};
use handlebars::Handlebars;
use pulldown_cmark::{Options, Parser, html};
use std::{collections::BTreeMap, path::Path};

/// Template variable holding the rendered fragment.
pub const RELEASE_NOTES_PLACEHOLDER: &str = "release_notes";

/// Converts markup to an HTML fragment.
pub fn markup_to_html(markup: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(markup, options);
    let mut fragment = String::with_capacity(markup.len() * 3 / 2);
    html::push_html(&mut fragment, parser);
    fragment
}

/// Substitutes `fragment` into `template`.
pub fn apply_template(template: &str, fragment: &str) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
        .register_template_string("release_notes", template)
        .map_err(|e| {
            Error::GenericError(format!("failed to register release notes template: {}", e))
        })?;

    let mut data = BTreeMap::new();
    data.insert(RELEASE_NOTES_PLACEHOLDER, fragment);

    Ok(handlebars.render("release_notes", &data)?)
}

/// Renders `markup` and wraps it in the template at `template_path`, if the
/// template exists.
pub async fn render_release_notes(markup: &str, template_path: Option<&Path>) -> Result<String> {
    let fragment = markup_to_html(markup);

    let Some(template_path) = template_path else {
        return Ok(fragment);
    };

    match tokio::fs::read_to_string(template_path).await {
        Ok(template) => {
            log::debug!("Using release notes template {}", template_path.display());
            apply_template(&template, &fragment)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!(
                "No release notes template at {}, using the bare fragment",
                template_path.display()
            );
            Ok(fragment)
        }
        Err(e) => Err(e).fs_context("reading release notes template", template_path),
    }
}
