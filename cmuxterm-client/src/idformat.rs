//! `--id-format` rendering: rewrite response JSON so that entity
//! identifiers appear as short refs, UUIDs, or both.
//!
//! Server responses carry paired fields like `window_id` (UUID) and
//! `window_ref` (`window:N`).  In `refs` mode the UUID field is dropped
//! when its ref sibling is present; in `uuids` mode the ref is dropped;
//! `both` keeps everything.

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdFormat {
    Refs,
    Uuids,
    Both,
}

impl Default for IdFormat {
    fn default() -> Self {
        IdFormat::Refs
    }
}

impl std::str::FromStr for IdFormat {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<IdFormat, Self::Err> {
        match s {
            "refs" => Ok(IdFormat::Refs),
            "uuids" => Ok(IdFormat::Uuids),
            "both" => Ok(IdFormat::Both),
            _ => anyhow::bail!("invalid id format {:?}; expected refs, uuids or both", s),
        }
    }
}

impl IdFormat {
    /// Recursively rewrite a response value in place.
    pub fn rewrite(self, value: &mut Value) {
        match value {
            Value::Object(map) => {
                let keys: Vec<String> = map.keys().cloned().collect();
                let mut drop = vec![];
                for key in &keys {
                    match self {
                        IdFormat::Refs => {
                            if let Some(stem) = key.strip_suffix("_id") {
                                if map.contains_key(&format!("{}_ref", stem)) {
                                    drop.push(key.clone());
                                }
                            }
                        }
                        IdFormat::Uuids => {
                            if let Some(stem) = key.strip_suffix("_ref") {
                                if map.contains_key(&format!("{}_id", stem)) {
                                    drop.push(key.clone());
                                }
                            }
                        }
                        IdFormat::Both => {}
                    }
                }
                for key in drop {
                    map.remove(&key);
                }
                for (_, child) in map.iter_mut() {
                    self.rewrite(child);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.rewrite(item);
                }
            }
            _ => {}
        }
    }

    pub fn rewritten(self, mut value: Value) -> Value {
        self.rewrite(&mut value);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "window_id": "8c4a43d0-91b7-4f0a-a377-0f16bb4df0a1",
            "window_ref": "window:2",
            "nested": {
                "surface_id": "97f3a2a0-11aa-4a43-9f3e-30f05a3a2bfb",
                "surface_ref": "surface:7",
                "title": "Terminal",
            },
            "items": [
                { "pane_id": "5e9cbb42-61c6-4f0e-ae57-37a1a2dc6d17", "pane_ref": "pane:3" },
                { "workspace_id": "no-ref-sibling" },
            ],
        })
    }

    #[test]
    fn refs_drops_uuid_when_ref_present() {
        let value = IdFormat::Refs.rewritten(sample());
        assert!(value.get("window_id").is_none());
        assert_eq!(value["window_ref"], json!("window:2"));
        assert!(value["nested"].get("surface_id").is_none());
        assert_eq!(value["nested"]["title"], json!("Terminal"));
        assert!(value["items"][0].get("pane_id").is_none());
        // fields with no ref sibling survive
        assert_eq!(value["items"][1]["workspace_id"], json!("no-ref-sibling"));
    }

    #[test]
    fn uuids_drops_refs_when_uuid_present() {
        let value = IdFormat::Uuids.rewritten(sample());
        assert!(value.get("window_ref").is_none());
        assert!(value["window_id"].is_string());
        assert!(value["items"][0].get("pane_ref").is_none());
    }

    #[test]
    fn both_keeps_everything() {
        let value = IdFormat::Both.rewritten(sample());
        assert!(value.get("window_id").is_some());
        assert!(value.get("window_ref").is_some());
    }
}
