//! Local cache of the player's profile, balance, selection and joined games.
//!
//! Stored as one JSON document so it can be reloaded verbatim.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::collaborators::UserProfile;
use crate::types::Card;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCache {
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub balance: u64,
    #[serde(default)]
    pub selected_cards: Vec<Card>,
    /// Session ids joined from this device, oldest first.
    #[serde(default)]
    pub games: Vec<String>,
}

impl LocalCache {
    /// Load the cache; a missing file is `Ok(None)`.
    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let cache = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(cache))
    }

    /// Write the cache, replacing any previous file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bingo_core::CardGenerator;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LocalCache::load(&dir.path().join("absent.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let cache = LocalCache {
            user: Some(UserProfile {
                id: "u1".into(),
                display_name: "Ana".into(),
                balance: 80,
            }),
            balance: 80,
            selected_cards: CardGenerator::new(3).generate_many(2),
            games: vec!["s1".into()],
        };
        tokio_test::assert_ok!(cache.save(&path));
        assert_eq!(LocalCache::load(&path).unwrap(), Some(cache));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get("selectedCards").is_some());
        assert_eq!(raw["selectedCards"][0]["numbers"][2][2], "FREE");
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{not json").unwrap();
        tokio_test::assert_err!(LocalCache::load(&path));
    }
}
