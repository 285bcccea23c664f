//! Unused-key guard.
//!
//! Every leaf of the merged document is addressed by its JSON-pointer path.
//! A leaf is consumed when some entry of [`CONSUMED_POINTERS`] is a whole-
//! segment prefix of that path: `/export/out_dir` consumes
//! `/export/out_dir/x` but not `/export/out_dirs`.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON pointers the replay pipeline reads. Keep this in step with
/// [`crate::TbkConfig`]: a field added there must be registered here.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/replay/expired_trade_policy",
    "/replay/settle_at",
    "/tradebook/default_expiry_time",
    "/export/out_dir",
    "/export/price_decimals",
];

/// How many offending pointers an error message lists.
const ERROR_PREVIEW: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Registered pointers, normalized, sorted and unique.
    pub consumed_prefixes: Vec<String>,
    /// Leaves no registered pointer covers, sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Check `config_json` against [`CONSUMED_POINTERS`].
///
/// `Warn` always returns the report; `Fail` errors with `CONFIG_UNUSED_KEYS`
/// when any leaf is unused.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut consumed: Vec<Vec<String>> = CONSUMED_POINTERS.iter().map(|p| segments(p)).collect();
    consumed.sort();
    consumed.dedup();

    let mut leaves = Vec::new();
    walk_leaves(config_json, &mut Vec::new(), &mut leaves);

    let mut unused: Vec<String> = leaves
        .iter()
        .filter(|leaf| !consumed.iter().any(|c| leaf.starts_with(c)))
        .map(|leaf| render(leaf))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        consumed_prefixes: consumed.iter().map(|c| render(c)).collect(),
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let shown: Vec<&str> = report
            .unused_leaf_pointers
            .iter()
            .take(ERROR_PREVIEW)
            .map(String::as_str)
            .collect();
        bail!(
            "CONFIG_UNUSED_KEYS: {} config key(s) are not read by anything \
             (typo?): {}",
            report.unused_leaf_pointers.len(),
            shown.join(", ")
        );
    }

    Ok(report)
}

/// Split a pointer into unescaped segments. Leading, trailing and repeated
/// `/` are ignored, so `export/out_dir/` and `/export/out_dir` agree.
fn segments(pointer: &str) -> Vec<String> {
    pointer
        .trim()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Render segments as an RFC 6901 pointer; the document root is `/`.
fn render(segs: &[String]) -> String {
    if segs.is_empty() {
        return "/".to_string();
    }
    segs.iter()
        .map(|s| format!("/{}", s.replace('~', "~0").replace('/', "~1")))
        .collect()
}

/// Collect the path of every scalar (including null) under `v`. Empty objects
/// and arrays contribute nothing.
fn walk_leaves(v: &Value, path: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
    match v {
        Value::Object(map) => {
            for (key, child) in map {
                path.push(key.clone());
                walk_leaves(child, path, out);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                path.push(i.to_string());
                walk_leaves(child, path, out);
                path.pop();
            }
        }
        _ => out.push(path.clone()),
    }
}
