//! Command handler modules for tbk-cli.
//!
//! Shared utilities used by multiple command paths live here.

pub mod replay;

use anyhow::Result;
use tbk_config::LoadedConfig;

/// Merge the given YAML layers. No paths means an empty (all-defaults) config.
pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    if paths.is_empty() {
        return tbk_config::load_layered_yaml_from_strings(&[]);
    }
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    tbk_config::load_layered_yaml(&path_refs)
}
