use std::collections::BTreeMap;

use crate::api::types::OptionEntry;

use super::schema::SettingShape;

/// Immutable snapshot of the boolean feature flags present in the option set.
///
/// Built once per load and handed to each panel at construction time instead of
/// panels reading a shared mutable store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSnapshot {
    flags: BTreeMap<String, bool>,
}

impl FeatureSnapshot {
    pub fn from_entries(entries: &[OptionEntry]) -> Self {
        let flags = entries
            .iter()
            .filter(|entry| SettingShape::infer(&entry.key) == SettingShape::Boolean)
            .map(|entry| (entry.key.clone(), entry.value.trim() == "true"))
            .collect();
        Self { flags }
    }

    /// Copy of this snapshot with `flag` set to `enabled`.
    pub fn with_flag(mut self, flag: &str, enabled: bool) -> Self {
        self.flags.insert(flag.to_string(), enabled);
        self
    }

    /// Unknown flags read as disabled.
    pub fn is_enabled(&self, flag: &str) -> bool {
        self.flags.get(flag).copied().unwrap_or(false)
    }

    pub fn enabled_flags(&self) -> impl Iterator<Item = &str> {
        self.flags
            .iter()
            .filter(|(_, on)| **on)
            .map(|(flag, _)| flag.as_str())
    }
}
