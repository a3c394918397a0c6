//! Event payload and submodel tree types.
//!
//! An [`Element`] covers both the top-level submodel snapshot and every
//! nested submodel element; payloads carry many more fields than these, but
//! only the ones relevant for indexing are deserialized.

use serde::Deserialize;

/// Inbound change notification, one per mutation and top-level entity.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub id: String,
    #[serde(rename = "smElementPath", default)]
    pub sm_element_path: Option<String>,
    #[serde(default)]
    pub submodel: Option<Element>,
    #[serde(rename = "smElement", default)]
    pub sm_element: Option<Element>,
}

/// A node of the submodel tree. All fields are optional because payloads
/// are produced by an external repository and vary by element kind.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Element {
    pub id: Option<String>,
    pub id_short: Option<String>,
    pub model_type: Option<String>,
    pub content_type: Option<String>,
    pub value: Option<ElementValue>,
    pub submodel_elements: Vec<Element>,
}

/// The `value` field is either a scalar (file reference, property value)
/// or an ordered sequence of child elements.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ElementValue {
    Text(String),
    Elements(Vec<Element>),
    Other(serde_json::Value),
}

impl Element {
    /// Children in declared order: the typed child collection when present,
    /// otherwise a list-valued `value`.
    pub fn children(&self) -> &[Element] {
        if !self.submodel_elements.is_empty() {
            return &self.submodel_elements;
        }
        match &self.value {
            Some(ElementValue::Elements(children)) => children,
            _ => &[],
        }
    }

    /// Whether this node's own `value` is an ordered sequence of nodes,
    /// which makes it a list context for path resolution.
    pub fn is_list_valued(&self) -> bool {
        matches!(&self.value, Some(ElementValue::Elements(_)))
    }

    pub fn value_text(&self) -> Option<&str> {
        match &self.value {
            Some(ElementValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}
