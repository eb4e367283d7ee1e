use serde::Serialize;

use super::codec;
use super::schema::SettingShape;
use super::store::DiffSnapshot;

/// One pending write: the canonical wire value for `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub key: &'static str,
    pub shape: SettingShape,
    pub value: String,
}

/// Minimal ordered set of changed keys, in the panel's schema order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet(Vec<Change>);

impl ChangeSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.0.iter()
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.0.iter().map(|change| change.key).collect()
    }
}

impl FromIterator<Change> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        ChangeSet(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Compute the changeset between draft and baseline.
///
/// Walks the declared schema, not the draft, so a key missing from the draft
/// is never reported as removed. Both sides are compared on their normalized
/// wire strings.
pub fn diff(snapshot: DiffSnapshot<'_>) -> ChangeSet {
    snapshot
        .schema
        .specs()
        .iter()
        .filter_map(|spec| {
            let draft = snapshot.draft.get(spec.key)?;
            let value = codec::normalize(draft, spec.shape);
            if spec.shape == SettingShape::Secret && value.is_empty() {
                return None;
            }
            let unchanged = snapshot
                .baseline
                .get(spec.key)
                .is_some_and(|baseline| codec::normalize(baseline, spec.shape) == value);
            if unchanged {
                return None;
            }
            Some(Change {
                key: spec.key,
                shape: spec.shape,
                value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::OptionEntry;
    use crate::settings::keys;
    use crate::settings::store::SettingsStore;

    fn store(panel: &str, entries: &[(&str, &str)]) -> SettingsStore {
        let mut store = SettingsStore::new(keys::panel(panel).unwrap());
        let entries: Vec<OptionEntry> = entries
            .iter()
            .map(|(k, v)| OptionEntry::new(*k, *v))
            .collect();
        store.load(&entries);
        store
    }

    #[test]
    fn test_no_edits_yields_empty_changeset() {
        let s = store("general", &[(keys::CHAT_LINK, "https://chat"), (keys::RETRY_TIMES, "3")]);
        assert!(diff(s.snapshot_for_diff()).is_empty());
    }

    #[test]
    fn test_changes_follow_schema_order_not_edit_order() {
        let mut s = store(
            "general",
            &[
                (keys::TOP_UP_LINK, ""),
                (keys::RETRY_TIMES, "3"),
                (keys::DISPLAY_IN_CURRENCY_ENABLED, "false"),
            ],
        );
        s.set_draft(keys::DISPLAY_IN_CURRENCY_ENABLED, true).unwrap();
        s.set_draft(keys::RETRY_TIMES, "5").unwrap();
        s.set_draft(keys::TOP_UP_LINK, "https://shop/").unwrap();

        let changes = diff(s.snapshot_for_diff());
        assert_eq!(
            changes.keys(),
            vec![keys::TOP_UP_LINK, keys::RETRY_TIMES, keys::DISPLAY_IN_CURRENCY_ENABLED]
        );
        let values: Vec<&str> = changes.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(values, vec!["https://shop", "5", "true"]);
    }

    #[test]
    fn test_reformatted_json_is_not_a_change() {
        let mut s = store("magnification", &[(keys::MODEL_RATIO, r#"{"gpt-4":15,"gpt-3.5-turbo":0.75}"#)]);
        s.set_draft(keys::MODEL_RATIO, "{\n  \"gpt-3.5-turbo\": 0.75,\n  \"gpt-4\": 15\n}")
            .unwrap();
        assert!(diff(s.snapshot_for_diff()).is_empty());
    }

    #[test]
    fn test_same_value_different_type_is_not_a_change() {
        let mut s = store("monitoring", &[(keys::AUTOMATIC_DISABLE_CHANNEL_ENABLED, "true")]);
        s.set_draft(keys::AUTOMATIC_DISABLE_CHANNEL_ENABLED, "true").unwrap();
        assert!(diff(s.snapshot_for_diff()).is_empty());
    }

    #[test]
    fn test_key_missing_from_baseline_is_a_change_when_drafted() {
        let mut s = store("credit-limit", &[]);
        assert!(diff(s.snapshot_for_diff()).is_empty());
        s.set_draft(keys::QUOTA_FOR_INVITEE, "10").unwrap();
        assert_eq!(diff(s.snapshot_for_diff()).keys(), vec![keys::QUOTA_FOR_INVITEE]);
    }

    #[test]
    fn test_empty_secret_is_never_submitted() {
        let mut s = store("system", &[(keys::SMTP_SERVER, "smtp.example.com")]);
        s.set_draft(keys::SMTP_TOKEN, "").unwrap();
        assert!(diff(s.snapshot_for_diff()).is_empty());
        s.set_draft(keys::SMTP_TOKEN, "s3cret").unwrap();
        assert_eq!(diff(s.snapshot_for_diff()).keys(), vec![keys::SMTP_TOKEN]);
    }
}
