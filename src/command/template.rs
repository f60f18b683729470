//! Placeholder rendering for the builder's configure command
//!
//! Templates use `{{name}}` placeholders (surrounding whitespace and a leading
//! dot are tolerated, so `{{ .volume }}` works too). Rendering happens before
//! tokenization, so substituted values must already be single argv tokens.

use crate::config::ImageLabels;
use crate::error::BuildError;
use regex::Regex;
use std::sync::OnceLock;

/// Default configure command shipped with the engine
pub const DEFAULT_CONFIGURE_TEMPLATE: &str = "lb config \\
  --distribution bookworm \\
  --archive-areas \"main contrib non-free non-free-firmware\" \\
  --binary-images iso-hybrid \\
  --iso-volume {{volume}} \\
  --iso-publisher {{publisher}} \\
  --iso-application {{application}} \\
  --image-name {{image_name}}";

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*\.?([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid regex")
    })
}

/// Replace whitespace and quotes so a label stays one argv token
pub fn normalize_label(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            '\'' | '"' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// Render `template` against the image labels
pub fn render(template: &str, labels: &ImageLabels) -> Result<String, BuildError> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for caps in placeholder_re().captures_iter(template) {
        let whole = caps.get(0).expect("group 0 always matches");
        let name = &caps[1];
        let value = lookup(labels, name)
            .ok_or_else(|| BuildError::Template(format!("unknown placeholder '{}'", name)))?;

        let label = normalize_label(value);
        if label.is_empty() {
            return Err(BuildError::Template(format!("label '{}' is empty", name)));
        }

        let literal = &template[last..whole.start()];
        check_literal(literal)?;
        rendered.push_str(literal);
        rendered.push_str(&label);
        last = whole.end();
    }

    let tail = &template[last..];
    check_literal(tail)?;
    rendered.push_str(tail);
    Ok(rendered)
}

fn lookup<'a>(labels: &'a ImageLabels, name: &str) -> Option<&'a str> {
    labels
        .fields()
        .into_iter()
        .find_map(|(field, value)| (field == name).then_some(value))
}

// Any `{{` left between placeholders is malformed
fn check_literal(literal: &str) -> Result<(), BuildError> {
    if let Some(pos) = literal.find("{{") {
        let snippet: String = literal[pos..].chars().take(24).collect();
        return Err(BuildError::Template(format!(
            "malformed placeholder near '{}'",
            snippet
        )));
    }
    Ok(())
}
