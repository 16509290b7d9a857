//! Style compilation strategies.
//!
//! Non-global style blocks are scoped to the component's root element through
//! the `data-icecube` attribute that the server renders on it.

use crate::error::{IceCubeError, Result};
use crate::parse::StyleBlock;

/// Attribute carrying the component name on the rendered root element.
pub const SCOPE_ATTRIBUTE: &str = "data-icecube";

pub trait StyleCompiler {
    fn compile(&self, component_name: &str, style: &str, is_global: bool) -> Result<String>;
}

/// Compile every block independently and join the results in source order.
pub fn compile_style_blocks(
    compiler: &dyn StyleCompiler,
    component_name: &str,
    blocks: &[StyleBlock],
) -> Result<String> {
    let compiled = blocks
        .iter()
        .map(|block| compiler.compile(component_name, &block.content, block.is_global))
        .collect::<Result<Vec<_>>>()?;
    Ok(compiled.join("\n"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCOPING ONLY
// ═══════════════════════════════════════════════════════════════════════════════

/// Wraps the block in a scope selector and leaves nested rules to native CSS
/// nesting in the browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct NestingStyleCompiler;

impl StyleCompiler for NestingStyleCompiler {
    fn compile(&self, component_name: &str, style: &str, is_global: bool) -> Result<String> {
        if is_global {
            return Ok(style.to_string());
        }
        Ok(format!(
            "[{}={}] {{ {} }}",
            SCOPE_ATTRIBUTE, component_name, style
        ))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PREPROCESSOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs the block through an SCSS compiler so nested selectors resolve against
/// the scope selector. Output is compressed; no source maps are produced.
pub struct ScssStyleCompiler {
    options: grass::Options<'static>,
}

impl ScssStyleCompiler {
    pub fn new() -> Self {
        Self {
            options: grass::Options::default().style(grass::OutputStyle::Compressed),
        }
    }
}

impl Default for ScssStyleCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleCompiler for ScssStyleCompiler {
    fn compile(&self, component_name: &str, style: &str, is_global: bool) -> Result<String> {
        if style.is_empty() {
            return Ok(String::new());
        }

        let input = if is_global {
            style.to_string()
        } else {
            format!(
                "[{}=\"{}\"] {{ {} }}",
                SCOPE_ATTRIBUTE, component_name, style
            )
        };

        grass::from_string(input, &self.options).map_err(|e| IceCubeError::Style {
            component: component_name.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting_scopes_local_blocks() {
        let css = NestingStyleCompiler.compile("Foo", "color:red", false).unwrap();
        assert_eq!(css, "[data-icecube=Foo] { color:red }");
    }

    #[test]
    fn test_nesting_passes_global_blocks_through() {
        let css = NestingStyleCompiler
            .compile("Foo", "body { margin: 0 }", true)
            .unwrap();
        assert_eq!(css, "body { margin: 0 }");
    }

    #[test]
    fn test_blocks_join_in_source_order() {
        let blocks = vec![
            StyleBlock {
                content: "a{}".to_string(),
                is_global: false,
            },
            StyleBlock {
                content: "b{}".to_string(),
                is_global: true,
            },
            StyleBlock {
                content: "c{}".to_string(),
                is_global: false,
            },
        ];
        let css = compile_style_blocks(&NestingStyleCompiler, "Foo", &blocks).unwrap();
        assert_eq!(
            css,
            "[data-icecube=Foo] { a{} }\nb{}\n[data-icecube=Foo] { c{} }"
        );
    }

    #[test]
    fn test_no_blocks_compile_to_empty() {
        let css = compile_style_blocks(&NestingStyleCompiler, "Foo", &[]).unwrap();
        assert_eq!(css, "");
    }

    #[test]
    fn test_scss_empty_input() {
        let css = ScssStyleCompiler::new().compile("Foo", "", false).unwrap();
        assert_eq!(css, "");
    }

    #[test]
    fn test_scss_resolves_nesting_against_scope() {
        let css = ScssStyleCompiler::new()
            .compile("Foo", "color: red; a { color: blue; }", false)
            .unwrap();
        assert!(css.contains("data-icecube"), "{css}");
        assert!(css.contains("Foo"), "{css}");
        assert!(css.contains("color:red"), "{css}");
        assert!(css.contains(" a{color:blue}"), "{css}");
    }

    #[test]
    fn test_scss_global_is_not_scoped() {
        let css = ScssStyleCompiler::new()
            .compile("Foo", "body { margin: 0; }", true)
            .unwrap();
        assert!(!css.contains("data-icecube"), "{css}");
        assert!(css.contains("body{margin:0}"), "{css}");
    }

    #[test]
    fn test_scss_syntax_error_is_reported() {
        let err = ScssStyleCompiler::new()
            .compile("Foo", "a { color: ", false)
            .unwrap_err();
        assert_eq!(err.code(), crate::error::ERR_STYLE);
    }
}
