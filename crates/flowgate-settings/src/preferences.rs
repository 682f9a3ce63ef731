//! Preferences & custom registry data model.

use serde::{Deserialize, Serialize};

/// A custom bundle or behavior registered by URI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// The full persisted preferences document (`web-preferences.json`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub default_bundle: String,
    #[serde(default)]
    pub default_behaviors: Vec<String>,
    #[serde(default)]
    pub show_thinking: bool,
    #[serde(default)]
    pub default_cwd: Option<String>,
    #[serde(default)]
    pub custom_bundles: Vec<RegistryEntry>,
    #[serde(default)]
    pub custom_behaviors: Vec<RegistryEntry>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_bundle: "default".to_string(),
            default_behaviors: Vec::new(),
            show_thinking: false,
            default_cwd: None,
            custom_bundles: Vec::new(),
            custom_behaviors: Vec::new(),
        }
    }
}
