use std::collections::{HashMap, HashSet};

use crate::api::types::OptionEntry;
use crate::error::AppError;

use super::codec::{self, SettingValue};
use super::schema::PanelSchema;

/// Read-only view of a store handed to the diff engine.
///
/// Holding it borrows the store immutably, so neither map can change while a
/// diff is being computed.
#[derive(Debug, Clone, Copy)]
pub struct DiffSnapshot<'a> {
    pub schema: &'a PanelSchema,
    pub draft: &'a HashMap<String, SettingValue>,
    pub baseline: &'a HashMap<String, SettingValue>,
}

/// Per-panel draft/baseline pair.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    schema: PanelSchema,
    baseline: HashMap<String, SettingValue>,
    draft: HashMap<String, SettingValue>,
}

impl SettingsStore {
    pub fn new(schema: PanelSchema) -> Self {
        Self {
            schema,
            baseline: HashMap::new(),
            draft: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &PanelSchema {
        &self.schema
    }

    /// Replace baseline and draft wholesale with the declared subset of `entries`.
    ///
    /// Unknown keys are ignored. A stored value that does not decode under its
    /// declared shape is kept as plain text so it shows up as-is and can be fixed.
    pub fn load(&mut self, entries: &[OptionEntry]) {
        let mut loaded = HashMap::new();
        let mut ignored = 0usize;
        for entry in entries {
            let Some(spec) = self.schema.spec(&entry.key) else {
                ignored += 1;
                continue;
            };
            let value = match codec::decode(&entry.value, spec.shape) {
                Ok(value) => value,
                Err(e) => {
                    let err = e.for_key(&entry.key);
                    tracing::warn!(
                        panel = %self.schema.name(),
                        error = %err,
                        "Stored option does not match its declared shape; keeping raw text",
                    );
                    SettingValue::Text(entry.value.clone())
                }
            };
            loaded.insert(entry.key.clone(), value);
        }

        tracing::debug!(
            panel = %self.schema.name(),
            kept = loaded.len(),
            ignored,
            "Panel options loaded",
        );
        self.draft = loaded.clone();
        self.baseline = loaded;
    }

    /// Replace the draft value for `key`. The value itself is not validated here.
    pub fn set_draft(&mut self, key: &str, value: impl Into<SettingValue>) -> Result<(), AppError> {
        if !self.schema.contains(key) {
            return Err(AppError::NotFound(format!(
                "{key} is not a setting of the {} panel",
                self.schema.name()
            )));
        }
        self.draft.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn draft(&self, key: &str) -> Option<&SettingValue> {
        self.draft.get(key)
    }

    pub fn baseline(&self, key: &str) -> Option<&SettingValue> {
        self.baseline.get(key)
    }

    pub fn snapshot_for_diff(&self) -> DiffSnapshot<'_> {
        DiffSnapshot {
            schema: &self.schema,
            draft: &self.draft,
            baseline: &self.baseline,
        }
    }

    /// Advance the baseline to the draft for exactly `successful_keys`.
    ///
    /// Keys outside the set keep their old baseline and therefore stay dirty.
    pub fn commit(&mut self, successful_keys: &HashSet<String>) {
        for key in successful_keys {
            match self.draft.get(key) {
                Some(value) => {
                    self.baseline.insert(key.clone(), value.clone());
                }
                None => {
                    self.baseline.remove(key);
                }
            }
        }
    }

    /// Throw away unsaved edits.
    pub fn discard_draft(&mut self) {
        self.draft = self.baseline.clone();
    }

    /// Declared keys whose draft currently differs from the baseline, in schema order.
    pub fn dirty_keys(&self) -> Vec<&'static str> {
        super::diff::diff(self.snapshot_for_diff())
            .iter()
            .map(|change| change.key)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::keys;

    fn credit_store() -> SettingsStore {
        let mut store = SettingsStore::new(keys::panel("credit-limit").unwrap());
        store.load(&[
            OptionEntry::new(keys::QUOTA_FOR_NEW_USER, "100"),
            OptionEntry::new(keys::PRE_CONSUMED_QUOTA, "500"),
            OptionEntry::new(keys::MODEL_RATIO, "{}"),
        ]);
        store
    }

    #[test]
    fn test_load_ignores_undeclared_keys() {
        let store = credit_store();
        assert_eq!(store.baseline(keys::QUOTA_FOR_NEW_USER), Some(&SettingValue::from(100i64)));
        assert!(store.baseline(keys::MODEL_RATIO).is_none());
        assert_eq!(store.draft(keys::PRE_CONSUMED_QUOTA), store.baseline(keys::PRE_CONSUMED_QUOTA));
    }

    #[test]
    fn test_load_keeps_malformed_stored_value_as_text() {
        let mut store = SettingsStore::new(keys::panel("magnification").unwrap());
        store.load(&[OptionEntry::new(keys::MODEL_RATIO, "{oops")]);
        assert_eq!(store.baseline(keys::MODEL_RATIO), Some(&SettingValue::Text("{oops".into())));
    }

    #[test]
    fn test_set_draft_leaves_baseline() {
        let mut store = credit_store();
        store.set_draft(keys::QUOTA_FOR_NEW_USER, "250").unwrap();
        assert_eq!(store.draft(keys::QUOTA_FOR_NEW_USER), Some(&SettingValue::Text("250".into())));
        assert_eq!(store.baseline(keys::QUOTA_FOR_NEW_USER), Some(&SettingValue::from(100i64)));
    }

    #[test]
    fn test_set_draft_rejects_undeclared_key() {
        let mut store = credit_store();
        let err = store.set_draft(keys::MODEL_RATIO, "{}").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_commit_only_successful_keys() {
        let mut store = credit_store();
        store.set_draft(keys::QUOTA_FOR_NEW_USER, "250").unwrap();
        store.set_draft(keys::PRE_CONSUMED_QUOTA, "600").unwrap();

        let ok: HashSet<String> = [keys::QUOTA_FOR_NEW_USER.to_string()].into();
        store.commit(&ok);

        assert_eq!(store.baseline(keys::QUOTA_FOR_NEW_USER), Some(&SettingValue::Text("250".into())));
        assert_eq!(store.baseline(keys::PRE_CONSUMED_QUOTA), Some(&SettingValue::from(500i64)));
        assert_eq!(store.dirty_keys(), vec![keys::PRE_CONSUMED_QUOTA]);
    }

    #[test]
    fn test_discard_draft() {
        let mut store = credit_store();
        store.set_draft(keys::QUOTA_FOR_NEW_USER, "1").unwrap();
        assert_eq!(store.dirty_keys().len(), 1);
        store.discard_draft();
        assert!(store.dirty_keys().is_empty());
    }
}
