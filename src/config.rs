//! Configuration: tree style plus render settings, loadable from JSON.

use crate::style::TreeStyle;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Vertical page size in document pixels for the paginated backend.
    pub page_height: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { page_height: 800.0 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub style: TreeStyle,
    pub render: RenderConfig,
}

/// Loads a JSON config, or defaults when no path is given. Every field is
/// optional and overlays onto [Config::default].
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_overlays_defaults() {
        let config: Config = serde_json::from_str(r#"{"style": {"x_scale": 120.0}}"#).unwrap();
        assert_eq!(config.style.x_scale, 120.0);
        assert_eq!(config.style.y_scale, TreeStyle::default().y_scale);
        assert_eq!(config.render.page_height, 800.0);
    }
}
