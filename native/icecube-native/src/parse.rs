//! Parse Module for the IceCube compiler
//!
//! Splits a single-file component source into its code section, optional
//! script section and style blocks. Parsing is pure: identical input always
//! yields an identical `ParsedComponent`.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::digest::compute_digest;

/// Marker that closes the server-side code section.
pub const CODE_CLOSING_MARKER: &str = "?>";

/// Separator between namespace segments of a component identifier.
pub const NAMESPACE_SEPARATOR: char = '\\';

lazy_static! {
    /// First inline script block
    static ref SCRIPT_REGEX: Regex = Regex::new(r"(?is)<script\b[^>]*>(.*?)</script>").unwrap();

    /// Every inline style block, with its attribute text
    static ref STYLE_REGEX: Regex = Regex::new(r"(?is)<style\b([^>]*)>(.*?)</style>").unwrap();

    static ref GLOBAL_MARKER_REGEX: Regex = Regex::new(r"\bglobal\b").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSED COMPONENT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleBlock {
    pub content: String,
    pub is_global: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedComponent {
    /// Fully-qualified identifier, e.g. `App\Components\Counter`
    pub identifier: String,
    /// Identifier flattened to a single token, e.g. `App_Components_Counter`
    pub component_name: String,
    pub code_section: String,
    pub script_section: Option<String>,
    pub style_blocks: Vec<StyleBlock>,
    pub digest: String,
}

/// Flattens namespace separators so the name is safe as a file name and as a
/// scoping attribute value.
pub fn component_name(identifier: &str) -> String {
    identifier.replace(NAMESPACE_SEPARATOR, "_")
}

/// Parse a component source.
///
/// A non-empty colocated script takes precedence over any inline `<script>`
/// block, which is then ignored entirely.
pub fn parse_component(
    identifier: &str,
    source: &str,
    colocated_script: Option<&str>,
) -> ParsedComponent {
    let colocated_script = colocated_script.filter(|s| !s.is_empty());

    let script_section = match colocated_script {
        Some(script) => Some(script.to_string()),
        None => extract_script(source),
    };

    ParsedComponent {
        identifier: identifier.to_string(),
        component_name: component_name(identifier),
        code_section: extract_code(source),
        script_section,
        style_blocks: extract_style_blocks(source),
        digest: compute_digest(source, colocated_script),
    }
}

/// Everything up to and including the last closing marker, trimmed. Without a
/// marker the whole source is code.
fn extract_code(source: &str) -> String {
    match source.rfind(CODE_CLOSING_MARKER) {
        Some(pos) => source[..pos + CODE_CLOSING_MARKER.len()].trim().to_string(),
        None => source.to_string(),
    }
}

fn extract_script(source: &str) -> Option<String> {
    SCRIPT_REGEX
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn extract_style_blocks(source: &str) -> Vec<StyleBlock> {
    STYLE_REGEX
        .captures_iter(source)
        .map(|caps| {
            let attributes = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            let content = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            StyleBlock {
                content: content.to_string(),
                is_global: GLOBAL_MARKER_REGEX.is_match(attributes),
            }
        })
        .collect()
}
