//! Settings synchronization engine.
//!
//! One [`SettingsPanel`] per logical group of options. Each panel owns its own
//! [`store::SettingsStore`]; nothing is shared between panels.
//!
//! Save pipeline: diff → validate → batch submit → commit succeeded keys.

pub mod codec;
pub mod diff;
pub mod features;
pub mod keys;
pub mod schema;
pub mod store;
pub mod submit;
pub mod validator;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::api::types::OptionEntry;
use crate::error::AppError;

use self::codec::SettingValue;
use self::features::FeatureSnapshot;
use self::schema::PanelSchema;
use self::store::SettingsStore;
use self::submit::{BatchReport, BatchSubmitter, OptionWriter};
use self::validator::{FieldError, ValidationResult};

/// Result of one save attempt, as surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SaveOutcome {
    /// Draft equals baseline; no request was sent.
    NothingToSave,
    /// Malformed structured values; no request was sent.
    Invalid { errors: Vec<FieldError> },
    Saved { keys: Vec<String> },
    /// The single changed key failed to save.
    Failed { key: String, reason: String },
    /// Some keys saved, the rest stay dirty. Retry to resend only those.
    PartialFailure {
        saved: Vec<String>,
        failed: BTreeMap<String, String>,
    },
}

impl SaveOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. } | SaveOutcome::NothingToSave)
    }
}

/// A settings panel bound to its declared schema.
///
/// Keys gated on a feature flag are only part of the panel while the flag is
/// on. Flags saved through this panel re-evaluate the gates, so turning a
/// provider on exposes its keys without rebuilding the panel.
#[derive(Debug, Clone)]
pub struct SettingsPanel {
    schema: PanelSchema,
    features: FeatureSnapshot,
    loaded: Vec<OptionEntry>,
    store: SettingsStore,
}

impl SettingsPanel {
    /// Build a panel. Keys gated on a flag that is off in `features` are dropped.
    pub fn new(schema: PanelSchema, features: &FeatureSnapshot) -> Self {
        Self {
            store: SettingsStore::new(schema.restricted_to(features)),
            schema,
            features: features.clone(),
            loaded: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.store.schema().name()
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    pub fn load(&mut self, entries: &[OptionEntry]) {
        self.loaded = entries
            .iter()
            .filter(|entry| self.schema.contains(&entry.key))
            .cloned()
            .collect();
        self.store.load(entries);
        self.refresh_gates();
    }

    pub fn set_draft(&mut self, key: &str, value: impl Into<SettingValue>) -> Result<(), AppError> {
        self.store.set_draft(key, value)
    }

    /// Parse `raw` according to the key's declared shape and stage it.
    pub fn set_draft_input(&mut self, key: &str, raw: &str) -> Result<(), AppError> {
        let shape = self
            .store
            .schema()
            .spec(key)
            .map(|spec| spec.shape)
            .ok_or_else(|| AppError::NotFound(format!("{key} is not a setting of the {} panel", self.name())))?;
        self.store.set_draft(key, codec::parse_input(raw, shape))
    }

    /// Declared values rendered for display, in schema order.
    pub fn rendered(&self) -> Vec<(&'static str, String)> {
        let store = &self.store;
        store
            .schema()
            .specs()
            .iter()
            .filter_map(|spec| {
                store
                    .draft(spec.key)
                    .map(|value| (spec.key, codec::display(value, spec.shape)))
            })
            .collect()
    }

    /// Run the save pipeline against `submitter`.
    pub async fn save<W: OptionWriter>(&mut self, submitter: &BatchSubmitter<W>) -> SaveOutcome {
        let change_set = diff::diff(self.store.snapshot_for_diff());
        if change_set.is_empty() {
            tracing::info!(panel = %self.name(), "Nothing changed; skipping save");
            return SaveOutcome::NothingToSave;
        }

        let change_set = match validator::validate(change_set) {
            ValidationResult::Valid(change_set) => change_set,
            ValidationResult::Invalid(errors) => return SaveOutcome::Invalid { errors },
        };

        tracing::debug!(panel = %self.name(), keys = ?change_set.keys(), "Submitting changes");
        let result = submitter.submit(&change_set).await;
        self.store.commit(&result.succeeded());
        self.refresh_gates();

        match result.report() {
            BatchReport::Saved => SaveOutcome::Saved {
                keys: change_set.keys().into_iter().map(String::from).collect(),
            },
            BatchReport::Failed { key, reason } => SaveOutcome::Failed { key, reason },
            BatchReport::PartialFailure { failed } => SaveOutcome::PartialFailure {
                saved: result.succeeded_keys.into_iter().collect(),
                failed,
            },
        }
    }

    /// Re-evaluate gated keys against the saved values of their flags.
    ///
    /// The rebuilt store keeps every saved value and every pending edit of a
    /// key that is still part of the panel.
    fn refresh_gates(&mut self) {
        let mut features = self.features.clone();
        for flag in self.schema.specs().iter().filter_map(|spec| spec.requires) {
            if let Some(SettingValue::Bool(enabled)) = self.store.baseline(flag) {
                features = features.with_flag(flag, *enabled);
            }
        }
        if features == self.features {
            return;
        }

        for spec in self.store.schema().specs() {
            let Some(value) = self.store.baseline(spec.key) else {
                continue;
            };
            let wire = codec::encode(value);
            match self.loaded.iter_mut().find(|entry| entry.key == spec.key) {
                Some(entry) => entry.value = wire,
                None => self.loaded.push(OptionEntry::new(spec.key, wire)),
            }
        }

        let mut store = SettingsStore::new(self.schema.restricted_to(&features));
        store.load(&self.loaded);
        for key in self.store.dirty_keys() {
            let Some(value) = self.store.draft(key) else {
                continue;
            };
            if let Err(e) = store.set_draft(key, value.clone()) {
                tracing::debug!(panel = %self.name(), key, error = %e, "Dropping edit of a key gated off");
            }
        }

        tracing::info!(
            panel = %self.name(),
            before = self.store.schema().specs().len(),
            after = store.schema().specs().len(),
            "Feature gates changed; panel keys re-evaluated",
        );
        self.features = features;
        self.store = store;
    }
}
