//! Remote method calls on interactive components.
//!
//! The client posts the signed props snapshot it was rendered with. A request
//! is only executed when the signature matches and the target component has a
//! registered factory; otherwise it is rejected as a client error before any
//! component is constructed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, warn};

use crate::component::SingleFileComponent;
use crate::digest::signature;
use crate::parse::component_name;

/// Header carrying the snapshot signature.
pub const SIGNATURE_HEADER: &str = "X-Ice";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRequest {
    pub id: String,
    /// Flattened component name, as rendered in `data-icecube`
    pub component: String,
    pub snapshot: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentResponse {
    pub html: String,
    pub data: Map<String, Value>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("component failure: {0}")]
    Component(String),
}

impl RemoteError {
    /// HTTP status for the boundary handler.
    pub fn status(&self) -> u16 {
        match self {
            RemoteError::BadRequest(_) => 400,
            RemoteError::Component(_) => 500,
        }
    }
}

/// A component that accepts remote method calls.
pub trait InteractiveComponent: SingleFileComponent {
    fn set_id(&mut self, id: &str);

    /// Whether `method` can be invoked with `arity` arguments.
    fn accepts(&self, method: &str, arity: usize) -> bool;

    fn set_state(&mut self, name: &str, value: Value) -> Result<(), RemoteError>;

    /// Invoke `method`. `Some(html)` replaces the rendered component.
    fn call(&mut self, method: &str, args: &[Value]) -> Result<Option<String>, RemoteError>;
}

/// Builds a component from its props snapshot.
pub type ComponentFactory = Box<
    dyn Fn(&Map<String, Value>) -> Result<Box<dyn InteractiveComponent>, RemoteError>
        + Send
        + Sync,
>;

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISPATCHER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct RemoteDispatcher {
    secret: String,
    factories: HashMap<String, ComponentFactory>,
}

impl RemoteDispatcher {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            factories: HashMap::new(),
        }
    }

    /// Allow remote calls on the component `identifier`.
    pub fn register<F>(&mut self, identifier: &str, factory: F)
    where
        F: Fn(&Map<String, Value>) -> Result<Box<dyn InteractiveComponent>, RemoteError>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .insert(component_name(identifier), Box::new(factory));
    }

    pub fn sign(&self, snapshot: &str) -> String {
        signature(&self.secret, snapshot)
    }

    pub fn handle(
        &self,
        signature_header: Option<&str>,
        request: &ComponentRequest,
    ) -> Result<ComponentResponse, RemoteError> {
        let factory = self.factories.get(&request.component).ok_or_else(|| {
            warn!(component = %request.component, "remote call to non-interactive component");
            RemoteError::BadRequest(format!("unknown component '{}'", request.component))
        })?;

        let expected = self.sign(&request.snapshot);
        let valid = signature_header
            .map(|header| constant_time_eq(header.as_bytes(), expected.as_bytes()))
            .unwrap_or(false);
        if !valid {
            warn!(component = %request.component, "remote call with invalid signature");
            return Err(RemoteError::BadRequest("signature mismatch".to_string()));
        }

        let props: Map<String, Value> = serde_json::from_str(&request.snapshot)
            .map_err(|e| RemoteError::BadRequest(format!("invalid snapshot: {}", e)))?;

        let mut component = factory(&props)?;
        component.set_id(&request.id);

        let method = request.method.as_deref().filter(|m| !m.is_empty());
        if let Some(method) = method {
            if !component.accepts(method, request.args.len()) {
                return Err(RemoteError::BadRequest(format!(
                    "method '{}' cannot be called with {} argument(s)",
                    method,
                    request.args.len()
                )));
            }
        }

        for (key, value) in &request.data {
            if props.contains_key(key) {
                component.set_state(key, value.clone())?;
            }
        }

        if let Some(method) = method {
            debug!(component = %request.component, method, "invoking remote method");
            if let Some(html) = component.call(method, &request.args)? {
                return Ok(ComponentResponse {
                    html,
                    data: Map::new(),
                });
            }
        }

        Ok(ComponentResponse {
            html: String::new(),
            data: component.exposes_state(),
        })
    }

    /// Decode a JSON request body and encode the response.
    pub fn handle_json(
        &self,
        signature_header: Option<&str>,
        body: &str,
    ) -> Result<String, RemoteError> {
        let request: ComponentRequest = serde_json::from_str(body)
            .map_err(|e| RemoteError::BadRequest(format!("invalid request: {}", e)))?;
        let response = self.handle(signature_header, &request)?;
        serde_json::to_string(&response).map_err(|e| RemoteError::Component(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Counter {
        id: String,
        count: i64,
    }

    impl SingleFileComponent for Counter {
        fn identifier(&self) -> &str {
            r"App\Components\Counter"
        }

        fn exposes_state(&self) -> Map<String, Value> {
            let mut state = Map::new();
            state.insert("count".to_string(), json!(self.count));
            state
        }
    }

    impl InteractiveComponent for Counter {
        fn set_id(&mut self, id: &str) {
            self.id = id.to_string();
        }

        fn accepts(&self, method: &str, arity: usize) -> bool {
            matches!((method, arity), ("increment", 0) | ("add", 1) | ("render", 0))
        }

        fn set_state(&mut self, name: &str, value: Value) -> Result<(), RemoteError> {
            match name {
                "count" => {
                    self.count = value
                        .as_i64()
                        .ok_or_else(|| RemoteError::BadRequest("count must be an integer".into()))?;
                    Ok(())
                }
                _ => Ok(()),
            }
        }

        fn call(&mut self, method: &str, args: &[Value]) -> Result<Option<String>, RemoteError> {
            match method {
                "increment" => self.count += 1,
                "add" => self.count += args[0].as_i64().unwrap_or(0),
                "render" => return Ok(Some(format!("<b id=\"{}\">{}</b>", self.id, self.count))),
                _ => unreachable!(),
            }
            Ok(None)
        }
    }

    fn dispatcher() -> RemoteDispatcher {
        let mut dispatcher = RemoteDispatcher::new("app-key");
        dispatcher.register(r"App\Components\Counter", |props| {
            Ok(Box::new(Counter {
                id: String::new(),
                count: props.get("count").and_then(Value::as_i64).unwrap_or(0),
            }) as Box<dyn InteractiveComponent>)
        });
        dispatcher
    }

    fn request(method: Option<&str>, args: Vec<Value>) -> ComponentRequest {
        ComponentRequest {
            id: "c1".to_string(),
            component: "App_Components_Counter".to_string(),
            snapshot: r#"{"count":1}"#.to_string(),
            method: method.map(str::to_string),
            args,
            data: Map::new(),
        }
    }

    #[test]
    fn test_method_updates_state() {
        let d = dispatcher();
        let req = request(Some("increment"), vec![]);
        let sig = d.sign(&req.snapshot);
        let res = d.handle(Some(&sig), &req).unwrap();
        assert_eq!(res.html, "");
        assert_eq!(res.data.get("count"), Some(&json!(2)));
    }

    #[test]
    fn test_client_data_is_applied_before_call() {
        let d = dispatcher();
        let mut req = request(Some("add"), vec![json!(5)]);
        req.data.insert("count".to_string(), json!(10));
        req.data.insert("unknown".to_string(), json!("ignored"));
        let sig = d.sign(&req.snapshot);
        let res = d.handle(Some(&sig), &req).unwrap();
        assert_eq!(res.data.get("count"), Some(&json!(15)));
        assert!(!res.data.contains_key("unknown"));
    }

    #[test]
    fn test_html_result() {
        let d = dispatcher();
        let req = request(Some("render"), vec![]);
        let sig = d.sign(&req.snapshot);
        let res = d.handle(Some(&sig), &req).unwrap();
        assert_eq!(res.html, "<b id=\"c1\">1</b>");
        assert!(res.data.is_empty());
    }

    #[test]
    fn test_bad_signature_is_rejected() {
        let d = dispatcher();
        let req = request(Some("increment"), vec![]);
        let err = d.handle(Some("deadbeef"), &req).unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(d.handle(None, &req).is_err());
    }

    #[test]
    fn test_unregistered_component_is_rejected() {
        let d = dispatcher();
        let mut req = request(None, vec![]);
        req.component = "App_Components_Static".to_string();
        let sig = d.sign(&req.snapshot);
        let err = d.handle(Some(&sig), &req).unwrap_err();
        assert!(matches!(err, RemoteError::BadRequest(_)));
    }

    #[test]
    fn test_arity_mismatch_is_rejected() {
        let d = dispatcher();
        let req = request(Some("add"), vec![]);
        let sig = d.sign(&req.snapshot);
        let err = d.handle(Some(&sig), &req).unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn test_handle_json_round_trip() {
        let d = dispatcher();
        let snapshot = r#"{"count":1}"#;
        let body = json!({
            "id": "c1",
            "component": "App_Components_Counter",
            "snapshot": snapshot,
            "method": "",
            "args": [],
            "data": {}
        })
        .to_string();
        let out = d.handle_json(Some(&d.sign(snapshot)), &body).unwrap();
        let res: ComponentResponse = serde_json::from_str(&out).unwrap();
        assert_eq!(res.data.get("count"), Some(&json!(1)));
    }
}
