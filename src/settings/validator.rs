use serde::Serialize;

use super::codec;
use super::diff::ChangeSet;

/// A structural problem with one changed key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid(ChangeSet),
    Invalid(Vec<FieldError>),
}

/// Structurally check every JSON-shaped entry, collecting all failures.
///
/// Other shapes pass as-is; range checks on numbers belong to the caller's UI.
pub fn validate(change_set: ChangeSet) -> ValidationResult {
    let errors: Vec<FieldError> = change_set
        .iter()
        .filter(|change| change.shape.is_json())
        .filter_map(|change| {
            codec::decode(&change.value, change.shape)
                .err()
                .map(|e| FieldError {
                    key: change.key.to_string(),
                    reason: e.reason,
                })
        })
        .collect();

    if errors.is_empty() {
        ValidationResult::Valid(change_set)
    } else {
        for error in &errors {
            tracing::warn!(key = %error.key, reason = %error.reason, "Setting failed validation");
        }
        ValidationResult::Invalid(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::diff::Change;
    use crate::settings::schema::SettingShape;

    fn change(key: &'static str, shape: SettingShape, value: &str) -> Change {
        Change {
            key,
            shape,
            value: value.into(),
        }
    }

    #[test]
    fn test_valid_changeset_passes_through() {
        let set: ChangeSet = [
            change("ModelRatio", SettingShape::JsonObject, r#"{"a":1}"#),
            change("RetryTimes", SettingShape::Numeric, "not-a-number"),
        ]
        .into_iter()
        .collect();
        assert_eq!(validate(set.clone()), ValidationResult::Valid(set));
    }

    #[test]
    fn test_reports_every_malformed_field() {
        let set: ChangeSet = [
            change("ModelRatio", SettingShape::JsonObject, "{bad"),
            change("GroupRatio", SettingShape::JsonObject, "[1,2]"),
            change("Chats", SettingShape::JsonArray, "[]"),
        ]
        .into_iter()
        .collect();
        let ValidationResult::Invalid(errors) = validate(set) else {
            panic!("expected invalid");
        };
        let keys: Vec<&str> = errors.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["ModelRatio", "GroupRatio"]);
        assert_eq!(errors[1].reason, "expected a JSON object");
    }
}
