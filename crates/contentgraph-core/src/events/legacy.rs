//! Upcasting of payloads written by earlier versions
//!
//! Older payloads used `*Identifier` keys and described the placement of a
//! new node by a single `succeedingNodeAggregateIdentifier` plus a set of
//! covered points. Both are rewritten into the current shape before
//! deserialization. Current payloads pass through unchanged.

use serde_json::{Map, Value};

const LEGACY_SUFFIX: &str = "Identifier";
const CURRENT_SUFFIX: &str = "Id";

/// Bring a stored payload into the current shape
pub fn upcast(event_type: &str, payload: Value) -> Value {
    let mut object = match payload {
        Value::Object(object) => rename_identifier_keys(object),
        other => return other,
    };

    if let Some(Value::Array(references)) = object.get_mut("references") {
        for reference in references.iter_mut() {
            if let Value::Object(inner) = reference {
                *inner = rename_identifier_keys(std::mem::take(inner));
            }
        }
    }

    match event_type {
        "NodeAggregateWithNodeWasCreated" => upcast_sibling_placement(&mut object),
        "NodeReferencesWereSet" => upcast_reference_targets(&mut object),
        _ => {}
    }
    Value::Object(object)
}

// Only top-level keys: property names inside values are user data.
fn rename_identifier_keys(object: Map<String, Value>) -> Map<String, Value> {
    object
        .into_iter()
        .map(|(key, value)| match key.strip_suffix(LEGACY_SUFFIX) {
            Some(stem) => (format!("{}{}", stem, CURRENT_SUFFIX), value),
            None => match key.strip_suffix("Identifiers") {
                Some(stem) => (format!("{}Ids", stem), value),
                None => (key, value),
            },
        })
        .collect()
}

/// `coveredDimensionSpacePoints` + `succeedingNodeAggregateId` become one
/// sibling entry per covered point, all naming the same sibling
///
/// A missing or null sibling means the node was appended as the last child,
/// so each entry carries `null`.
fn upcast_sibling_placement(object: &mut Map<String, Value>) {
    if object.contains_key("succeedingSiblingsForCoverage") {
        return;
    }
    let Some(Value::Array(covered)) = object.remove("coveredDimensionSpacePoints") else {
        return;
    };
    let sibling = object
        .remove("succeedingNodeAggregateId")
        .unwrap_or(Value::Null);

    let siblings = covered
        .into_iter()
        .map(|point| {
            let mut entry = Map::new();
            entry.insert("dimensionSpacePoint".to_string(), point);
            entry.insert("nodeAggregateId".to_string(), sibling.clone());
            Value::Object(entry)
        })
        .collect();
    object.insert("succeedingSiblingsForCoverage".to_string(), Value::Array(siblings));
}

/// A single source origin plus a list of destination ids become the
/// current list-of-origins / list-of-references shape
fn upcast_reference_targets(object: &mut Map<String, Value>) {
    if let Some(origin) = object.remove("sourceOriginDimensionSpacePoint") {
        object
            .entry("affectedSourceOriginDimensionSpacePoints")
            .or_insert_with(|| Value::Array(vec![origin]));
    }
    if let Some(Value::Array(targets)) = object.remove("destinationNodeAggregateIds") {
        let references = targets
            .into_iter()
            .map(|target| {
                let mut entry = Map::new();
                entry.insert("targetNodeAggregateId".to_string(), target);
                Value::Object(entry)
            })
            .collect();
        object
            .entry("references")
            .or_insert(Value::Array(references));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifier_keys_are_renamed() {
        let upcasted = upcast(
            "ContentStreamWasForked",
            json!({
                "contentStreamIdentifier": "a",
                "sourceContentStreamIdentifier": "b",
                "versionOfSourceContentStream": 3
            }),
        );
        assert_eq!(
            upcasted,
            json!({
                "contentStreamId": "a",
                "sourceContentStreamId": "b",
                "versionOfSourceContentStream": 3
            })
        );
    }

    #[test]
    fn test_null_sibling_becomes_append_at_every_point() {
        let upcasted = upcast(
            "NodeAggregateWithNodeWasCreated",
            json!({
                "coveredDimensionSpacePoints": [{ "language": "de" }, { "language": "gsw" }],
                "succeedingNodeAggregateIdentifier": null
            }),
        );
        assert_eq!(
            upcasted["succeedingSiblingsForCoverage"],
            json!([
                { "dimensionSpacePoint": { "language": "de" }, "nodeAggregateId": null },
                { "dimensionSpacePoint": { "language": "gsw" }, "nodeAggregateId": null }
            ])
        );
        assert!(upcasted.get("coveredDimensionSpacePoints").is_none());
    }

    #[test]
    fn test_property_names_are_left_alone() {
        let upcasted = upcast(
            "NodePropertiesWereSet",
            json!({
                "propertyValues": { "externalIdentifier": { "value": "x", "type": "string" } }
            }),
        );
        assert!(upcasted["propertyValues"].get("externalIdentifier").is_some());
    }

    #[test]
    fn test_legacy_reference_shape() {
        let upcasted = upcast(
            "NodeReferencesWereSet",
            json!({
                "sourceOriginDimensionSpacePoint": { "language": "de" },
                "destinationNodeAggregateIdentifiers": ["t1", "t2"]
            }),
        );
        assert_eq!(
            upcasted["affectedSourceOriginDimensionSpacePoints"],
            json!([{ "language": "de" }])
        );
        assert_eq!(
            upcasted["references"],
            json!([{ "targetNodeAggregateId": "t1" }, { "targetNodeAggregateId": "t2" }])
        );
    }
}
