use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// A server-owned configuration item.
///
/// Unknown JSON keys are ignored on read. On write every field is emitted,
/// including empty collections and `null` parents, because the remote schema
/// rejects sparse bodies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub id: String,
    pub key: String,
    /// Discriminator for how `content` is interpreted. Opaque to the engine.
    #[serde(rename = "type")]
    pub kind: String,
    pub content: Vec<ParameterContent>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,
    #[serde(default)]
    pub parent_type: Option<String>,
    #[serde(default)]
    pub linked_parameters: Vec<String>,
}

/// One localized value entry of a [`Parameter`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParameterContent {
    pub unit: String,
    /// Scalar stored as text regardless of the logical type.
    pub value: String,
    pub language: String,
    pub display_name: String,
}

impl Parameter {
    /// The value at content index 0, if any.
    pub fn current_value(&self) -> Option<&str> {
        self.content.first().map(|c| c.value.as_str())
    }

    /// The current value parsed as a float. `None` when absent or not numeric.
    pub fn current_f32(&self) -> Option<f32> {
        self.current_value()?.trim().parse().ok()
    }

    /// Copy of this parameter with `content[0].value` replaced.
    ///
    /// Every other field and every other content entry is kept as is.
    pub fn with_value(&self, new_value: &str) -> Result<Parameter, SyncError> {
        let mut updated = self.clone();
        let first = updated
            .content
            .first_mut()
            .ok_or_else(|| SyncError::EmptyContent(self.id.clone()))?;
        first.value = new_value.to_string();
        Ok(updated)
    }
}

/// The (space, container, version) namespace a parameter belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTriple {
    pub space_id: String,
    pub config_container_id: String,
    pub version_id: String,
}

impl ConfigTriple {
    pub fn new(
        space_id: impl Into<String>,
        config_container_id: impl Into<String>,
        version_id: impl Into<String>,
    ) -> Self {
        Self {
            space_id: space_id.into(),
            config_container_id: config_container_id.into(),
            version_id: version_id.into(),
        }
    }

    /// All three components are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.space_id.is_empty()
            && !self.config_container_id.is_empty()
            && !self.version_id.is_empty()
    }

    /// Fails with [`SyncError::ConfigurationNotSet`] unless complete.
    pub fn ensure_complete(&self) -> Result<&Self, SyncError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(SyncError::ConfigurationNotSet)
        }
    }

    /// Relative resource path for one parameter, each segment percent-encoded.
    pub fn parameter_path(&self, parameter_id: &str) -> String {
        format!(
            "spaces/{}/configurations/{}/{}/{}",
            urlencoding::encode(&self.space_id),
            urlencoding::encode(&self.config_container_id),
            urlencoding::encode(&self.version_id),
            urlencoding::encode(parameter_id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Parameter {
        Parameter {
            id: "p1".to_string(),
            key: "coinWidth".to_string(),
            kind: "float".to_string(),
            content: vec![
                ParameterContent {
                    unit: "mm".to_string(),
                    value: "23.25".to_string(),
                    language: "en".to_string(),
                    display_name: "Coin width".to_string(),
                },
                ParameterContent {
                    unit: "mm".to_string(),
                    value: "23.25".to_string(),
                    language: "de".to_string(),
                    display_name: "Münzbreite".to_string(),
                },
            ],
            parent_id: None,
            parameters: BTreeMap::new(),
            parent_type: None,
            linked_parameters: vec![],
        }
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{
            "id": "p1",
            "key": "coinWidth",
            "type": "float",
            "content": [{"unit": "mm", "value": "20.0", "language": "en", "displayName": "Width", "extra": 1}],
            "parentId": "root",
            "parentType": "group",
            "createdBy": "someone"
        }"#;
        let p: Parameter = serde_json::from_str(json).unwrap();
        assert_eq!(p.kind, "float");
        assert_eq!(p.parent_id.as_deref(), Some("root"));
        assert!(p.parameters.is_empty());
        assert!(p.linked_parameters.is_empty());
        assert_eq!(p.current_value(), Some("20.0"));
    }

    #[test]
    fn test_serialization_is_explicit() {
        let value = serde_json::to_value(sample()).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.get("parentId"), Some(&serde_json::Value::Null));
        assert_eq!(obj.get("parentType"), Some(&serde_json::Value::Null));
        assert_eq!(obj.get("parameters"), Some(&serde_json::json!({})));
        assert_eq!(obj.get("linkedParameters"), Some(&serde_json::json!([])));
        assert_eq!(obj.get("type"), Some(&serde_json::json!("float")));
        assert!(obj["content"][0].get("displayName").is_some());
    }

    #[test]
    fn test_with_value_replaces_only_first_entry() {
        let original = sample();
        let updated = original.with_value("30.0").unwrap();
        assert_eq!(updated.content[0].value, "30.0");
        assert_eq!(updated.content[0].unit, "mm");
        assert_eq!(updated.content[1].value, "23.25");
        assert_eq!(updated.id, original.id);
        assert_eq!(original.content[0].value, "23.25");
    }

    #[test]
    fn test_empty_content_is_degraded_not_fatal() {
        let mut p = sample();
        p.content.clear();
        assert_eq!(p.current_value(), None);
        assert_eq!(p.current_f32(), None);
        assert_eq!(p.with_value("1"), Err(SyncError::EmptyContent("p1".to_string())));
    }

    #[test]
    fn test_current_f32() {
        let mut p = sample();
        assert_eq!(p.current_f32(), Some(23.25));
        p.content[0].value = "PROCEED".to_string();
        assert_eq!(p.current_f32(), None);
    }

    #[test]
    fn test_triple_completeness() {
        assert!(ConfigTriple::new("space1", "cfg1", "v1").is_complete());
        assert!(!ConfigTriple::new("", "cfg1", "v1").is_complete());
        assert!(!ConfigTriple::new("space1", "", "v1").is_complete());
        assert_eq!(
            ConfigTriple::new("space1", "cfg1", "").ensure_complete(),
            Err(SyncError::ConfigurationNotSet)
        );
    }

    #[test]
    fn test_parameter_path_encodes_segments() {
        let triple = ConfigTriple::new("space 1", "cfg/1", "latest");
        assert_eq!(
            triple.parameter_path("abc"),
            "spaces/space%201/configurations/cfg%2F1/latest/abc"
        );
    }
}
