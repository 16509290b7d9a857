//! Server-side component capability and root-element attributes.
//!
//! Components expose their client-visible state explicitly through
//! [`SingleFileComponent::exposes_state`]; the rendered root element carries
//! that state as JSON so the client runtime and remote calls can rebuild it.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::digest::signature;
use crate::parse::component_name;
use crate::style::SCOPE_ATTRIBUTE;

pub const PROPS_ATTRIBUTE: &str = "data-props";
pub const SIGNATURE_ATTRIBUTE: &str = "x-ice";
pub const DATA_ATTRIBUTE: &str = "x-data";
pub const ID_PREFIX: &str = "icecube-";

pub trait SingleFileComponent {
    /// Fully-qualified identifier, e.g. `App\Components\Counter`
    fn identifier(&self) -> &str;

    /// Name to value mapping of the state shipped to the client.
    fn exposes_state(&self) -> Map<String, Value>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// UNIQUE IDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Unique DOM id for a component instance.
pub fn generate_unique_id() -> String {
    format!("{}{}", ID_PREFIX, Uuid::new_v4().simple())
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROOT ATTRIBUTES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootAttributes {
    pub id: String,
    pub component_name: String,
    pub props: String,
    /// Present for interactive components only
    pub signature: Option<String>,
}

impl RootAttributes {
    /// Attributes for `component`'s root element.
    ///
    /// With a `secret`, the props snapshot is signed so the component can
    /// accept remote method calls.
    pub fn for_component(
        component: &dyn SingleFileComponent,
        id: Option<&str>,
        secret: Option<&str>,
    ) -> Self {
        let props = Value::Object(component.exposes_state()).to_string();
        Self {
            id: id.map(str::to_string).unwrap_or_else(generate_unique_id),
            component_name: component_name(component.identifier()),
            signature: secret.map(|secret| signature(secret, &props)),
            props,
        }
    }

    /// `(name, value)` pairs in render order.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("id", self.id.clone()),
            (SCOPE_ATTRIBUTE, self.component_name.clone()),
            (PROPS_ATTRIBUTE, self.props.clone()),
        ];
        if let Some(signature) = &self.signature {
            pairs.push((SIGNATURE_ATTRIBUTE, signature.clone()));
            pairs.push((DATA_ATTRIBUTE, "IceComponent($el)".to_string()));
        }
        pairs
    }

    pub fn render(&self) -> String {
        self.pairs()
            .into_iter()
            .map(|(name, value)| format!("{}=\"{}\"", name, escape_attribute(&value)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
