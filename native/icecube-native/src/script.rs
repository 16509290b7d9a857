//! Script compilation strategies: how a component's compiled CSS reaches the
//! browser alongside its script module.

/// Prefix of the DOM id given to a component's injected `<style>` element.
pub const STYLE_ID_PREFIX: &str = "icecube-style-";

pub trait ScriptCompiler {
    fn compile(&self, component_name: &str, script: &str, style: &str) -> String;

    /// Whether compiled style text should be persisted in the cache. False
    /// when a downstream bundler owns stylesheet delivery.
    fn embeds_styles(&self) -> bool {
        true
    }
}

pub fn style_element_id(component_name: &str) -> String {
    format!("{}{}", STYLE_ID_PREFIX, component_name)
}

/// Escape text for use inside a JavaScript template literal.
fn escape_template_literal(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}

// ═══════════════════════════════════════════════════════════════════════════════
// EMBEDDED
// ═══════════════════════════════════════════════════════════════════════════════

/// Appends a self-invoking block that injects the component's `<style>`
/// element once per document.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbedStyleScriptCompiler;

impl ScriptCompiler for EmbedStyleScriptCompiler {
    fn compile(&self, component_name: &str, script: &str, style: &str) -> String {
        format!(
            r#"{script}

// Embedded CSS
(() => {{
    const styleId = `{style_id}`;
    if (document.getElementById(styleId)) return;
    const style = document.createElement('style');
    style.id = styleId;
    style.textContent = `{style}`;
    (document.head || document.body).appendChild(style);
}})();"#,
            script = script,
            style_id = style_element_id(component_name),
            style = escape_template_literal(style),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTERNAL BUNDLER
// ═══════════════════════════════════════════════════════════════════════════════

/// Imports the sibling `<component>.css` artifact and leaves it to the bundler.
#[derive(Debug, Default, Clone, Copy)]
pub struct BundlerScriptCompiler;

impl ScriptCompiler for BundlerScriptCompiler {
    fn compile(&self, component_name: &str, script: &str, _style: &str) -> String {
        format!(
            "// Embedded CSS\nimport './{}.css';\n\n{}",
            component_name, script
        )
    }

    fn embeds_styles(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_keeps_script_and_guards_injection() {
        let js = EmbedStyleScriptCompiler.compile(
            "Foo",
            "console.log(1)",
            "[data-icecube=Foo] { color:red }",
        );
        assert!(js.starts_with("console.log(1)"));
        assert!(js.contains("const styleId = `icecube-style-Foo`;"));
        assert!(js.contains("if (document.getElementById(styleId)) return;"));
        assert!(js.contains("document.createElement('style')"));
        assert!(js.contains("style.textContent = `[data-icecube=Foo] { color:red }`;"));
    }

    #[test]
    fn test_embedded_escapes_template_literal() {
        let js = EmbedStyleScriptCompiler.compile("Foo", "", "a::after { content: `${x}\\`; }");
        assert!(js.contains(r"content: \`\${x}\\\`;"), "{js}");
    }

    #[test]
    fn test_bundler_imports_sibling_stylesheet() {
        let js = BundlerScriptCompiler.compile("App_Components_Foo", "run()", "ignored { }");
        assert_eq!(js, "// Embedded CSS\nimport './App_Components_Foo.css';\n\nrun()");
        assert!(!BundlerScriptCompiler.embeds_styles());
        assert!(EmbedStyleScriptCompiler.embeds_styles());
    }
}
