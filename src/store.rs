//! File-backed document store.
//!
//! The whole issue document persists as one JSON blob at a configured
//! path. Reads fall back to a seed document when the blob is absent,
//! unreadable, or has no sections; writes go through a temp-file-then-
//! rename cycle so a concurrent reader never observes a half-written
//! document.
//!
//! A store value is explicitly constructed and injected, never ambient
//! state, so tests can spin up isolated stores in temp directories. A
//! mutex serializes read-modify-write cycles within the process; across
//! processes the last writer wins, which is an accepted limitation.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::config::StoreConfig;
use crate::models::IssueDocument;
use crate::mutate::MutationError;

/// Seed document compiled into the binary, used when no seed path is
/// configured.
const BUNDLED_SEED: &str = include_str!("../seed/default_issues.json");

pub struct DocumentStore {
    path: PathBuf,
    seed: IssueDocument,
    write_lock: Mutex<()>,
}

impl DocumentStore {
    /// Open a store against the configured blob path, resolving the seed
    /// document (configured file, or the bundled default).
    pub fn open(config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create store directory: {}", parent.display())
                })?;
            }
        }

        let seed = match &config.seed {
            Some(seed_path) => {
                let raw = fs::read_to_string(seed_path).with_context(|| {
                    format!("Failed to read seed document: {}", seed_path.display())
                })?;
                serde_json::from_str(&raw).with_context(|| {
                    format!("Failed to parse seed document: {}", seed_path.display())
                })?
            }
            None => serde_json::from_str(BUNDLED_SEED)
                .context("Bundled seed document is invalid")?,
        };

        Ok(Self {
            path: config.path.clone(),
            seed,
            write_lock: Mutex::new(()),
        })
    }

    /// Read the persisted document.
    ///
    /// An absent, unreadable, or section-less blob is replaced by the seed
    /// (when the seed itself has at least one section), and the seed is
    /// written back as the new persisted state; a failed write-back is
    /// logged and the seeded document still returned. With no usable seed
    /// the empty document is returned without writing.
    pub fn load(&self) -> Result<IssueDocument> {
        let doc = match fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str::<IssueDocument>(&raw).unwrap_or_default(),
            Err(_) => IssueDocument::default(),
        };

        if !doc.sections.is_empty() {
            return Ok(doc);
        }
        if self.seed.sections.is_empty() {
            return Ok(IssueDocument::default());
        }

        let seeded = self.seed.clone();
        if let Err(e) = self.save(&seeded) {
            eprintln!("Warning: could not persist seed document: {}", e);
        }
        Ok(seeded)
    }

    /// Overwrite the persisted blob. The document is serialized to a temp
    /// file next to the blob and renamed into place, so readers see either
    /// the old state or the new one, never a partial write.
    pub fn save(&self, doc: &IssueDocument) -> Result<()> {
        let json =
            serde_json::to_string_pretty(doc).context("Failed to serialize issue document")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    /// Run one serialized read-modify-write cycle.
    ///
    /// The outer `Result` is storage failure (load or save); the inner one
    /// is the operation's own verdict. The document is only saved when the
    /// operation succeeded, so a rejected mutation never partially applies.
    pub fn mutate<T, F>(&self, op: F) -> Result<Result<T, MutationError>>
    where
        F: FnOnce(&mut IssueDocument) -> Result<T, MutationError>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;

        let mut doc = self.load()?;
        match op(&mut doc) {
            Ok(value) => {
                self.save(&doc)?;
                Ok(Ok(value))
            }
            Err(e) => Ok(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use serde_json::json;
    use tempfile::TempDir;

    fn store_config(tmp: &TempDir, seed: Option<serde_json::Value>) -> StoreConfig {
        let seed_path = seed.map(|doc| {
            let p = tmp.path().join("seed.json");
            fs::write(&p, doc.to_string()).unwrap();
            p
        });
        StoreConfig {
            path: tmp.path().join("data").join("issues.json"),
            seed: seed_path,
        }
    }

    fn one_section_seed() -> serde_json::Value {
        json!({
            "sections": [{
                "title": "Seeded",
                "sub_sections": [{
                    "title": "Sub",
                    "finding_templates": [{
                        "sem_template": {"sem_header": "Seeded issue"}
                    }]
                }]
            }]
        })
    }

    #[test]
    fn test_load_seeds_absent_blob_and_writes_back() {
        let tmp = TempDir::new().unwrap();
        let cfg = store_config(&tmp, Some(one_section_seed()));
        let store = DocumentStore::open(&cfg).unwrap();

        let doc = store.load().unwrap();
        assert_eq!(doc.sections[0].title, "Seeded");
        assert!(cfg.path.exists(), "seed should be persisted on first load");
    }

    #[test]
    fn test_load_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::open(&store_config(&tmp, Some(one_section_seed()))).unwrap();

        let first = store.load().unwrap();
        let second = store.load().unwrap();
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[test]
    fn test_load_replaces_corrupt_blob_with_seed() {
        let tmp = TempDir::new().unwrap();
        let cfg = store_config(&tmp, Some(one_section_seed()));
        fs::create_dir_all(cfg.path.parent().unwrap()).unwrap();
        fs::write(&cfg.path, "{ not json").unwrap();

        let store = DocumentStore::open(&cfg).unwrap();
        let doc = store.load().unwrap();
        assert_eq!(doc.sections[0].title, "Seeded");
    }

    #[test]
    fn test_load_empty_seed_yields_empty_document_without_writing() {
        let tmp = TempDir::new().unwrap();
        let cfg = store_config(&tmp, Some(json!({"sections": []})));
        let store = DocumentStore::open(&cfg).unwrap();

        let doc = store.load().unwrap();
        assert!(doc.sections.is_empty());
        assert!(!cfg.path.exists(), "no write without a usable seed");
    }

    #[test]
    fn test_bundled_seed_used_when_no_seed_configured() {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::open(&store_config(&tmp, None)).unwrap();
        let doc = store.load().unwrap();
        assert!(!doc.sections.is_empty());
        assert!(doc.contains_header("Disable legacy authentication protocols"));
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::open(&store_config(&tmp, Some(one_section_seed()))).unwrap();

        let mut doc = store.load().unwrap();
        doc.sections[0].title = "Renamed".to_string();
        store.save(&doc).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.sections[0].title, "Renamed");
    }

    #[test]
    fn test_mutate_rejected_operation_does_not_save() {
        let tmp = TempDir::new().unwrap();
        let store = DocumentStore::open(&store_config(&tmp, Some(one_section_seed()))).unwrap();
        store.load().unwrap(); // persist the seed

        let before = fs::read_to_string(tmp.path().join("data").join("issues.json")).unwrap();
        let verdict = store
            .mutate(|doc| crate::mutate::delete(doc, "does-not-exist"))
            .unwrap();
        assert!(verdict.is_err());

        let after = fs::read_to_string(tmp.path().join("data").join("issues.json")).unwrap();
        assert_eq!(before, after, "failed mutation must not rewrite the blob");
    }
}
