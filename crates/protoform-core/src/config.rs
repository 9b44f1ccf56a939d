//! Loader configuration: document vocabulary and serializer layout.
//!
//! Every field has a default, so a config file only lists what it changes.
//! Configs can be built in code or read from TOML or RON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a derived record's collection merges with the inherited one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverridePolicy {
    /// The derived collection supersedes the inherited one.
    Replace,
    /// Derived elements are appended after the inherited ones.
    #[default]
    Combine,
}

impl fmt::Display for OverridePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverridePolicy::Replace => f.write_str("Replace"),
            OverridePolicy::Combine => f.write_str("Combine"),
        }
    }
}

impl FromStr for OverridePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.eq_ignore_ascii_case("replace") {
            Ok(OverridePolicy::Replace)
        } else if t.eq_ignore_ascii_case("combine") {
            Ok(OverridePolicy::Combine)
        } else {
            Err(format!("unknown collection override action {t:?}"))
        }
    }
}

/// Attribute names recognized on container, record and field elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeNames {
    pub identifier: String,
    pub inherits: String,
    pub type_override: String,
    pub is_abstract: String,
    pub override_policy: String,
}

impl Default for AttributeNames {
    fn default() -> Self {
        Self {
            identifier: "Id".into(),
            inherits: "Inherits".into(),
            type_override: "Type".into(),
            is_abstract: "Abstract".into(),
            override_policy: "CollectionOverrideAction".into(),
        }
    }
}

/// Settings shared by every parse and serialize call of a loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Root element name of every document.
    pub container_element: String,
    /// Preferred namespace when a short type name is ambiguous.
    pub standard_namespace: Option<String>,
    pub attributes: AttributeNames,
    /// Element name of collection items written by the serializer.
    pub collection_item_element: String,
    /// Field text meaning "no value".
    pub null_token: String,
    /// Policy for collection fields that carry no override attribute.
    pub default_override_policy: OverridePolicy,
    pub indent: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            container_element: "Container".into(),
            standard_namespace: None,
            attributes: AttributeNames::default(),
            collection_item_element: "li".into(),
            null_token: "$NULL".into(),
            default_override_policy: OverridePolicy::Combine,
            indent: "    ".into(),
        }
    }
}

impl LoaderConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn with_standard_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.standard_namespace = Some(namespace.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid RON config: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_document_vocabulary() {
        let c = LoaderConfig::default();
        assert_eq!(c.container_element, "Container");
        assert_eq!(c.attributes.identifier, "Id");
        assert_eq!(c.attributes.override_policy, "CollectionOverrideAction");
        assert_eq!(c.null_token, "$NULL");
        assert_eq!(c.default_override_policy, OverridePolicy::Combine);
    }

    #[test]
    fn toml_overrides_only_listed_fields() {
        let c = LoaderConfig::from_toml_str(
            r#"
            container_element = "Defs"
            standard_namespace = "game.items"
            default_override_policy = "Replace"

            [attributes]
            identifier = "Name"
            "#,
        )
        .unwrap();
        assert_eq!(c.container_element, "Defs");
        assert_eq!(c.standard_namespace.as_deref(), Some("game.items"));
        assert_eq!(c.default_override_policy, OverridePolicy::Replace);
        assert_eq!(c.attributes.identifier, "Name");
        assert_eq!(c.attributes.inherits, "Inherits");
        assert_eq!(c.null_token, "$NULL");
    }

    #[test]
    fn ron_config() {
        let c = LoaderConfig::from_ron_str(r#"(null_token: "~", indent: "\t")"#).unwrap();
        assert_eq!(c.null_token, "~");
        assert_eq!(c.indent, "\t");
        assert_eq!(c.collection_item_element, "li");
    }

    #[test]
    fn malformed_config_errors() {
        assert!(matches!(
            LoaderConfig::from_toml_str("container_element = 3"),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            LoaderConfig::from_ron_str("(null_token: )"),
            Err(ConfigError::Ron(_))
        ));
    }

    #[test]
    fn override_policy_parses_any_case() {
        assert_eq!("Replace".parse::<OverridePolicy>(), Ok(OverridePolicy::Replace));
        assert_eq!(" combine ".parse::<OverridePolicy>(), Ok(OverridePolicy::Combine));
        assert!("Merge".parse::<OverridePolicy>().is_err());
    }
}
