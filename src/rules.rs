//! Blocked words and substitution rules, persisted as two small JSON files.
//!
//! Both lists are read in full on every use and rewritten in full on every
//! mutation, so edits made through the admin commands apply to the next
//! message without a restart.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::RuleStoreError;

/// Snapshot of both rule lists, taken once per normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    pub blacklist: Vec<String>,
    /// Kept in the order the rules were added.
    pub replacements: IndexMap<String, String>,
}

pub trait RuleStore: Send + Sync {
    fn load_blacklist(&self) -> Result<Vec<String>, RuleStoreError>;
    fn save_blacklist(&self, words: &[String]) -> Result<(), RuleStoreError>;
    fn load_replacements(&self) -> Result<IndexMap<String, String>, RuleStoreError>;
    fn save_replacements(&self, rules: &IndexMap<String, String>) -> Result<(), RuleStoreError>;

    /// Loads both lists, falling back to empty lists when a read fails.
    fn snapshot(&self) -> RuleSet {
        let blacklist = self.load_blacklist().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load blacklist; using empty list");
            Vec::new()
        });
        let replacements = self.load_replacements().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load replacements; using empty map");
            IndexMap::new()
        });
        RuleSet {
            blacklist,
            replacements,
        }
    }

    /// Returns `false` when the word is already listed.
    fn add_word(&self, word: &str) -> Result<bool, RuleStoreError> {
        let mut words = self.load_blacklist()?;
        if words.iter().any(|w| w == word) {
            return Ok(false);
        }
        words.push(word.to_string());
        self.save_blacklist(&words)?;
        Ok(true)
    }

    /// Returns `false` when the word was not listed.
    fn remove_word(&self, word: &str) -> Result<bool, RuleStoreError> {
        let mut words = self.load_blacklist()?;
        let Some(idx) = words.iter().position(|w| w == word) else {
            return Ok(false);
        };
        words.remove(idx);
        self.save_blacklist(&words)?;
        Ok(true)
    }

    /// Inserts or overwrites the rule for `source`.
    fn set_replacement(&self, source: &str, target: &str) -> Result<(), RuleStoreError> {
        let mut rules = self.load_replacements()?;
        rules.insert(source.to_string(), target.to_string());
        self.save_replacements(&rules)
    }

    /// Returns `false` when no rule existed for `source`.
    fn remove_replacement(&self, source: &str) -> Result<bool, RuleStoreError> {
        let mut rules = self.load_replacements()?;
        if rules.shift_remove(source).is_none() {
            return Ok(false);
        }
        self.save_replacements(&rules)?;
        Ok(true)
    }
}

/// File-backed store. A missing file reads as an empty list; an unparseable
/// file is logged and also reads as empty.
#[derive(Debug, Clone)]
pub struct JsonRuleStore {
    blacklist_path: PathBuf,
    replacements_path: PathBuf,
}

impl JsonRuleStore {
    pub fn new(blacklist_path: impl Into<PathBuf>, replacements_path: impl Into<PathBuf>) -> Self {
        Self {
            blacklist_path: blacklist_path.into(),
            replacements_path: replacements_path.into(),
        }
    }
}

impl RuleStore for JsonRuleStore {
    fn load_blacklist(&self) -> Result<Vec<String>, RuleStoreError> {
        read_json(&self.blacklist_path)
    }

    fn save_blacklist(&self, words: &[String]) -> Result<(), RuleStoreError> {
        write_json(&self.blacklist_path, &words)
    }

    fn load_replacements(&self) -> Result<IndexMap<String, String>, RuleStoreError> {
        read_json(&self.replacements_path)
    }

    fn save_replacements(&self, rules: &IndexMap<String, String>) -> Result<(), RuleStoreError> {
        write_json(&self.replacements_path, rules)
    }
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, RuleStoreError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(source) => {
            return Err(RuleStoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    match serde_json::from_str(&data) {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Rule file is not valid JSON; treating as empty");
            Ok(T::default())
        }
    }
}

/// Whole-file rewrite through a temp file in the same directory, persisted
/// over the target.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), RuleStoreError> {
    let data = serde_json::to_string_pretty(value)?;
    let io_err = |source| RuleStoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(io_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(data.as_bytes()).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    debug!(path = %path.display(), "Rule file written");
    Ok(())
}

/// In-process store, used where no durable files are wanted.
#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    rules: Mutex<RuleSet>,
}

impl MemoryRuleStore {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: Mutex::new(rules),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut RuleSet) -> R) -> R {
        let mut guard = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }
}

impl RuleStore for MemoryRuleStore {
    fn load_blacklist(&self) -> Result<Vec<String>, RuleStoreError> {
        Ok(self.with(|r| r.blacklist.clone()))
    }

    fn save_blacklist(&self, words: &[String]) -> Result<(), RuleStoreError> {
        self.with(|r| r.blacklist = words.to_vec());
        Ok(())
    }

    fn load_replacements(&self) -> Result<IndexMap<String, String>, RuleStoreError> {
        Ok(self.with(|r| r.replacements.clone()))
    }

    fn save_replacements(&self, rules: &IndexMap<String, String>) -> Result<(), RuleStoreError> {
        self.with(|r| r.replacements = rules.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> JsonRuleStore {
        JsonRuleStore::new(dir.join("blacklist.json"), dir.join("replacements.json"))
    }

    #[test]
    fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        assert_eq!(store.snapshot(), RuleSet::default());
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("blacklist.json"), "{not json").unwrap();
        let store = store_in(dir.path());
        assert!(store.load_blacklist().unwrap().is_empty());
    }

    #[test]
    fn add_word_rejects_duplicates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        assert!(store.add_word("ספאם").unwrap());
        assert!(!store.add_word("ספאם").unwrap());
        assert!(store.add_word("פרסומת").unwrap());

        let reopened = store_in(dir.path());
        assert_eq!(reopened.load_blacklist().unwrap(), vec!["ספאם", "פרסומת"]);

        let raw = fs::read_to_string(dir.path().join("blacklist.json")).unwrap();
        assert!(raw.contains("ספאם"), "non-ASCII should be written verbatim: {raw}");
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec!["blacklist.json"], "no temp files left behind");
    }

    #[test]
    fn remove_word_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.add_word("a").unwrap();

        assert!(!store.remove_word("b").unwrap());
        assert!(store.remove_word("a").unwrap());
        assert!(store.load_blacklist().unwrap().is_empty());
    }

    #[test]
    fn replacement_overwrites_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        store.set_replacement("ר'", "רבי").unwrap();
        store.set_replacement("ר'", "רב").unwrap();
        assert_eq!(
            store.load_replacements().unwrap().get("ר'").map(String::as_str),
            Some("רב")
        );

        assert!(store.remove_replacement("ר'").unwrap());
        assert!(!store.remove_replacement("ר'").unwrap());
    }

    #[test]
    fn replacements_keep_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        for (source, target) in [("שבת", "שַׁבָּת"), ("ב\"ה", "ברוך השם"), ("אא", "א")] {
            store.set_replacement(source, target).unwrap();
        }
        store.set_replacement("שבת", "שבת קודש").unwrap();
        store.remove_replacement("ב\"ה").unwrap();
        store.set_replacement("בס\"ד", "").unwrap();

        let reopened = store_in(dir.path());
        let sources: Vec<String> = reopened.load_replacements().unwrap().into_keys().collect();
        assert_eq!(sources, vec!["שבת", "אא", "בס\"ד"]);
    }

    #[test]
    fn memory_store_round_trips_mutations() {
        let store = MemoryRuleStore::default();
        store.add_word("x").unwrap();
        store.set_replacement("a", "b").unwrap();
        let snap = store.snapshot();
        assert_eq!(snap.blacklist, vec!["x"]);
        assert_eq!(snap.replacements.len(), 1);
    }
}
