use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MediaError, Result};
use crate::files;

/// Frame index -> title shown from that frame until the next keyframe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyframeMap {
    titles: BTreeMap<usize, String>,
}

fn invalid(details: String) -> crate::error::EditorError {
    MediaError::InvalidParameters { details }.into()
}

/// The index an alias value points to, if the value is one
fn alias_target(value: &Value) -> Option<Option<usize>> {
    match value {
        Value::Number(n) => Some(n.as_u64().map(|n| n as usize)),
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => Some(s.parse().ok()),
        _ => None,
    }
}

impl KeyframeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `{"<frame index>": "<title>" | <index>}`.
    ///
    /// An integer value, or a string made only of digits, reuses the title of
    /// the keyframe at that index.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Value> = serde_json::from_str(json)?;

        let mut entries = BTreeMap::new();
        for (key, value) in raw {
            let index = key
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid(format!("keyframe key {:?} is not a frame index", key)))?;
            entries.insert(index, value);
        }

        let mut titles = BTreeMap::new();
        for (&index, value) in &entries {
            titles.insert(index, Self::resolve(index, value, &entries)?);
        }
        Ok(Self { titles })
    }

    fn resolve(index: usize, value: &Value, entries: &BTreeMap<usize, Value>) -> Result<String> {
        let mut current = value;
        // an alias chain longer than the map itself must contain a cycle
        for _ in 0..=entries.len() {
            match alias_target(current) {
                None => {
                    return match current {
                        Value::String(title) => Ok(title.clone()),
                        other => Err(invalid(format!("keyframe {} has an unsupported value {}", index, other))),
                    };
                }
                Some(target) => {
                    current = target
                        .and_then(|target| entries.get(&target))
                        .ok_or_else(|| invalid(format!("keyframe {} refers to an undefined keyframe", index)))?;
                }
            }
        }
        Err(invalid(format!("keyframe {} is part of an alias cycle", index)))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| MediaError::SourceNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_json_str(&content)
    }

    /// Write the resolved map (titles only, no aliases)
    pub fn save<P: AsRef<Path>>(&self, path: P, overwrite: bool) -> Result<std::path::PathBuf> {
        files::save_json(self, path, overwrite)
    }

    pub fn insert<S: Into<String>>(&mut self, index: usize, title: S) {
        self.titles.insert(index, title.into());
    }

    /// Give `index` the same title as the keyframe at `existing`
    pub fn alias(&mut self, index: usize, existing: usize) -> Result<()> {
        let title = self
            .titles
            .get(&existing)
            .cloned()
            .ok_or_else(|| invalid(format!("no keyframe at frame {}", existing)))?;
        self.titles.insert(index, title);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<String> {
        self.titles.remove(&index)
    }

    /// Title starting exactly at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.titles.get(&index).map(String::as_str)
    }

    /// Latest keyframe at or before `index`
    pub fn active(&self, index: usize) -> Option<(usize, &str)> {
        self.titles
            .range(..=index)
            .next_back()
            .map(|(start, title)| (*start, title.as_str()))
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.titles.iter().map(|(index, title)| (*index, title.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_aliases_resolve_to_titles() {
        let map = KeyframeMap::from_json_str(r#"{"0": "approach", "24": "grasp", "60": 0, "90": "24"}"#).unwrap();
        assert_eq!(map.get(60), Some("approach"));
        assert_eq!(map.get(90), Some("grasp"));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_active_title() {
        let map = KeyframeMap::from_json_str(r#"{"5": "a", "10": "b"}"#).unwrap();
        assert_eq!(map.active(3), None);
        assert_eq!(map.active(5), Some((5, "a")));
        assert_eq!(map.active(9), Some((5, "a")));
        assert_eq!(map.active(400), Some((10, "b")));
    }

    #[test]
    fn test_bad_maps_are_rejected() {
        assert!(KeyframeMap::from_json_str(r#"{"x": "a"}"#).is_err());
        assert!(KeyframeMap::from_json_str(r#"{"0": 7}"#).is_err());
        assert!(KeyframeMap::from_json_str(r#"{"0": 1, "1": 0}"#).is_err());
        assert!(KeyframeMap::from_json_str(r#"{"0": true}"#).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let mut map = KeyframeMap::new();
        map.insert(0, "start");
        map.alias(12, 0).unwrap();
        assert!(map.alias(13, 99).is_err());

        let path = map.save(dir.path().join("keyframes.json"), false).unwrap();
        assert_eq!(KeyframeMap::load(&path).unwrap(), map);
    }
}
