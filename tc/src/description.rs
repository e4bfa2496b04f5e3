//! Thing Description model
//!
//! Only the parts of a TD the client needs are modelled: the title, the
//! optional base URL, the affordances with their forms, and the unit
//! annotations on data schemas. Unknown members are ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A protocol binding for one affordance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub href: String,

    #[serde(rename = "contentType", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Schema of a value, possibly an object with per-field schemas
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, DataSchema>,
}

/// A readable/writable property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyAffordance {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, DataSchema>,

    #[serde(default)]
    pub forms: Vec<Form>,
}

/// An invokable action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionAffordance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<DataSchema>,

    #[serde(default)]
    pub forms: Vec<Form>,
}

/// Thing Description as published by a device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThingDescription {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,

    #[serde(default)]
    pub properties: HashMap<String, PropertyAffordance>,

    #[serde(default)]
    pub actions: HashMap<String, ActionAffordance>,
}

impl ThingDescription {
    /// Create an empty description with a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Add a property (builder style)
    pub fn with_property(mut self, name: impl Into<String>, property: PropertyAffordance) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    /// Add an action (builder style)
    pub fn with_action(mut self, name: impl Into<String>, action: ActionAffordance) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// First form href of a property
    pub fn property_href(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .and_then(|p| p.forms.first())
            .map(|f| f.href.as_str())
    }

    /// First form href of an action
    pub fn action_href(&self, name: &str) -> Option<&str> {
        self.actions
            .get(name)
            .and_then(|a| a.forms.first())
            .map(|f| f.href.as_str())
    }

    /// Unit declared directly on a scalar property
    pub fn property_unit(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(|p| p.unit.as_deref())
    }

    /// Unit declared on one field of an object-valued property
    pub fn property_field_unit(&self, name: &str, field: &str) -> Option<&str> {
        self.properties
            .get(name)
            .and_then(|p| p.properties.get(field))
            .and_then(|s| s.unit.as_deref())
    }

    /// Unit declared on one field of an action's input object
    pub fn action_input_unit(&self, name: &str, field: &str) -> Option<&str> {
        self.actions
            .get(name)
            .and_then(|a| a.input.as_ref())
            .and_then(|i| i.properties.get(field))
            .and_then(|s| s.unit.as_deref())
    }
}

impl Form {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            content_type: None,
        }
    }
}

impl DataSchema {
    /// Number schema with a unit annotation
    pub fn number(unit: impl Into<String>) -> Self {
        Self {
            data_type: Some("number".to_string()),
            unit: Some(unit.into()),
            properties: HashMap::new(),
        }
    }

    /// Object schema from (field, unit) pairs
    pub fn object_with_units(fields: &[(&str, &str)]) -> Self {
        Self {
            data_type: Some("object".to_string()),
            unit: None,
            properties: fields
                .iter()
                .map(|(field, unit)| (field.to_string(), DataSchema::number(*unit)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UARM_TD: &str = r#"{
        "title": "VirtualUarm1",
        "base": "http://localhost:8080/uarm1/",
        "properties": {
            "currentPosition": {
                "type": "object",
                "properties": {
                    "x": {"type": "number", "unit": "millimeter"},
                    "y": {"type": "number", "unit": "millimeter"},
                    "z": {"type": "number", "unit": "millimeter"}
                },
                "forms": [{"href": "properties/currentPosition"}]
            }
        },
        "actions": {
            "goTo": {
                "input": {
                    "type": "object",
                    "properties": {
                        "x": {"type": "number", "unit": "mm"},
                        "y": {"type": "number", "unit": "mm"},
                        "z": {"type": "number", "unit": "mm"}
                    }
                },
                "forms": [{"href": "actions/goTo"}]
            },
            "gripOpen": {"forms": [{"href": "actions/gripOpen"}]}
        },
        "security": ["nosec_sc"]
    }"#;

    #[test]
    fn test_parse_td_with_units() {
        let td: ThingDescription = serde_json::from_str(UARM_TD).unwrap();

        assert_eq!(td.title, "VirtualUarm1");
        assert_eq!(td.base.as_deref(), Some("http://localhost:8080/uarm1/"));
        assert!(td.has_action("goTo"));
        assert!(td.has_property("currentPosition"));
        assert_eq!(td.property_field_unit("currentPosition", "x"), Some("millimeter"));
        assert_eq!(td.action_input_unit("goTo", "z"), Some("mm"));
        assert_eq!(td.action_input_unit("goTo", "rx"), None);
        assert_eq!(td.action_href("gripOpen"), Some("actions/gripOpen"));
    }

    #[test]
    fn test_missing_members_default() {
        let td: ThingDescription = serde_json::from_str(r#"{"title": "Bare"}"#).unwrap();

        assert!(td.properties.is_empty());
        assert!(td.actions.is_empty());
        assert_eq!(td.property_href("objectPresence"), None);
        assert_eq!(td.property_unit("objectDistance"), None);
    }

    #[test]
    fn test_builder_matches_parsed_shape() {
        let td = ThingDescription::new("Sensor").with_property(
            "objectDistance",
            PropertyAffordance {
                unit: Some("millimeter".to_string()),
                forms: vec![Form::new("properties/objectDistance")],
                ..Default::default()
            },
        );

        assert_eq!(td.property_unit("objectDistance"), Some("millimeter"));
        assert_eq!(td.property_href("objectDistance"), Some("properties/objectDistance"));
    }
}
