use crate::core::{JsonMap, Result, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sparse set of property updates for one entity, in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    properties: JsonMap,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Every property present in the change set.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// Properties whose requested value differs from `original`. An absent
    /// property on the original compares equal to `null`.
    pub fn changed_property_names<E: Serialize>(&self, original: &E) -> Result<Vec<String>> {
        let original = to_object(original)?;
        Ok(self
            .properties
            .iter()
            .filter(|(name, value)| original.get(*name).unwrap_or(&Value::Null) != *value)
            .map(|(name, _)| name.clone())
            .collect())
    }

    /// Writes every property onto `original` and reads the entity back.
    pub fn apply<E: Serialize + DeserializeOwned>(&self, original: &E) -> Result<E> {
        let mut object = to_object(original)?;
        for (name, value) in &self.properties {
            object.insert(name.clone(), value.clone());
        }
        Ok(serde_json::from_value(Value::Object(object))?)
    }
}

impl From<JsonMap> for ChangeSet {
    fn from(properties: JsonMap) -> Self {
        Self { properties }
    }
}

fn to_object<E: Serialize>(value: &E) -> Result<JsonMap> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Serialization(format!(
            "expected an object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
        pinned: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    }

    fn note() -> Note {
        Note {
            title: "draft".to_string(),
            pinned: false,
            color: None,
        }
    }

    #[test]
    fn deserializes_in_request_order() {
        let changes: ChangeSet = serde_json::from_value(json!({ "z": 1, "a": 2, "m": 3 })).unwrap();
        assert_eq!(changes.property_names().collect::<Vec<_>>(), ["z", "a", "m"]);
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn unchanged_values_are_not_reported() {
        let changes = ChangeSet::new()
            .set("pinned", true)
            .set("title", "draft")
            .set("color", Value::Null);
        assert_eq!(changes.changed_property_names(&note()).unwrap(), ["pinned"]);
    }

    #[test]
    fn unknown_properties_count_as_changes() {
        let changes = ChangeSet::new().set("owner", "someone");
        assert_eq!(changes.changed_property_names(&note()).unwrap(), ["owner"]);
    }

    #[test]
    fn apply_merges_onto_original() {
        let changes = ChangeSet::new().set("title", "final").set("color", "red");
        let patched = changes.apply(&note()).unwrap();
        assert_eq!(
            patched,
            Note {
                title: "final".to_string(),
                pinned: false,
                color: Some("red".to_string()),
            }
        );
    }

    #[test]
    fn apply_rejects_wrongly_typed_values() {
        let changes = ChangeSet::new().set("pinned", "yes");
        assert!(matches!(
            changes.apply(&note()),
            Err(StoreError::Serialization(_))
        ));
    }
}
