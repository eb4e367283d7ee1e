//! Panel schemas: the fixed, ordered list of `{key, shape}` a panel declares.
//!
//! The schema order is the order in which changesets are emitted and
//! submitted, so it must be stable across runs.

use serde::Serialize;

use super::features::FeatureSnapshot;

/// How a setting's wire string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingShape {
    /// `"true"` / `"false"` only.
    Boolean,
    /// A numeric string such as `"500000"` or `"7.3"`.
    Numeric,
    /// Free-form text.
    Text,
    /// A JSON object stored as a string (rate tables).
    JsonObject,
    /// A JSON array stored as a string.
    JsonArray,
    /// An address; trailing `/` is stripped on the wire.
    Url,
    /// A write-only credential. Empty drafts are never submitted.
    Secret,
    /// Comma-joined list of items.
    List,
}

impl SettingShape {
    /// Best-effort shape for keys that no panel declares.
    pub fn infer(key: &str) -> Self {
        if key.ends_with("Enabled") || key == "DefaultCollapseSidebar" {
            SettingShape::Boolean
        } else {
            SettingShape::Text
        }
    }

    pub fn is_json(self) -> bool {
        matches!(self, SettingShape::JsonObject | SettingShape::JsonArray)
    }
}

/// One declared setting of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettingSpec {
    pub key: &'static str,
    pub shape: SettingShape,
    /// Boolean feature flag that must be on for this key to be part of the panel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires: Option<&'static str>,
}

impl SettingSpec {
    pub const fn new(key: &'static str, shape: SettingShape) -> Self {
        Self {
            key,
            shape,
            requires: None,
        }
    }

    pub const fn gated(key: &'static str, shape: SettingShape, flag: &'static str) -> Self {
        Self {
            key,
            shape,
            requires: Some(flag),
        }
    }
}

/// Ordered key schema for a panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSchema {
    name: String,
    specs: Vec<SettingSpec>,
}

impl PanelSchema {
    pub fn new(name: impl Into<String>, specs: &[SettingSpec]) -> Self {
        let mut seen = std::collections::HashSet::new();
        let specs = specs
            .iter()
            .filter(|spec| seen.insert(spec.key))
            .copied()
            .collect();
        Self {
            name: name.into(),
            specs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn specs(&self) -> &[SettingSpec] {
        &self.specs
    }

    pub fn spec(&self, key: &str) -> Option<&SettingSpec> {
        self.specs.iter().find(|spec| spec.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.spec(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.iter().map(|spec| spec.key)
    }

    /// Drop keys whose required feature flag is off in `features`.
    pub fn restricted_to(&self, features: &FeatureSnapshot) -> Self {
        let specs = self
            .specs
            .iter()
            .filter(|spec| spec.requires.map_or(true, |flag| features.is_enabled(flag)))
            .copied()
            .collect();
        Self {
            name: self.name.clone(),
            specs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::OptionEntry;

    #[test]
    fn test_infer_boolean_keys() {
        assert_eq!(SettingShape::infer("GitHubOAuthEnabled"), SettingShape::Boolean);
        assert_eq!(SettingShape::infer("DefaultCollapseSidebar"), SettingShape::Boolean);
        assert_eq!(SettingShape::infer("ChatLink"), SettingShape::Text);
    }

    #[test]
    fn test_duplicate_keys_keep_first() {
        let schema = PanelSchema::new(
            "p",
            &[
                SettingSpec::new("A", SettingShape::Text),
                SettingSpec::new("A", SettingShape::Boolean),
            ],
        );
        assert_eq!(schema.specs().len(), 1);
        assert_eq!(schema.spec("A").unwrap().shape, SettingShape::Text);
    }

    #[test]
    fn test_restricted_to_drops_disabled_gates() {
        let schema = PanelSchema::new(
            "system",
            &[
                SettingSpec::new("ServerAddress", SettingShape::Url),
                SettingSpec::gated("WeChatServerAddress", SettingShape::Url, "WeChatAuthEnabled"),
            ],
        );
        let off = FeatureSnapshot::from_entries(&[OptionEntry::new("WeChatAuthEnabled", "false")]);
        let on = FeatureSnapshot::from_entries(&[OptionEntry::new("WeChatAuthEnabled", "true")]);

        assert!(!schema.restricted_to(&off).contains("WeChatServerAddress"));
        assert!(schema.restricted_to(&on).contains("WeChatServerAddress"));
        assert!(schema.restricted_to(&off).contains("ServerAddress"));
    }
}
