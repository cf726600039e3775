//! ISO 639 language codes.
//!
//! A [`LanguageCodeTable`] maps 2-letter (ISO 639-1), alternate 3-letter (ISO 639-2/B) and
//! canonical 3-letter (ISO 639-3) codes to one logical language. Alternate names in the
//! gazetteer are tagged with whichever code their source used, so lookups go through
//! [`LanguageCodeTable::codes`] to match every tag of the same language.
//!
//! Tables are immutable once built. [`SharedLanguageTable`] publishes a new table by
//! swapping an `Arc`, so readers never see a half-built table and never take a lock.

use std::{fmt, sync::Arc, time::Instant};

use ahash::AHashMap as HashMap;
use arc_swap::ArcSwap;
use gazetteer_store::{CancelSignal, DataStore, StoreError, StoreRequest, columns};
use itertools::izip;
use once_cell::sync::Lazy;
use tracing::{info, instrument, warn};

pub use error::LanguageError;
use error::Result;

/// `[a-z]{len}`
fn is_code(code: &str, len: usize) -> bool {
    code.len() == len && code.bytes().all(|b| b.is_ascii_lowercase())
}

/// One logical language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Entry {
    pub iso639_1: Option<String>,
    pub iso639_2: Option<String>,
    pub iso639_3: String,
    pub name: String,
}

impl Entry {
    pub fn new(
        iso639_1: Option<&str>,
        iso639_2: Option<&str>,
        iso639_3: &str,
        name: &str,
    ) -> Self {
        Self {
            iso639_1: iso639_1.map(ToString::to_string),
            iso639_2: iso639_2.map(ToString::to_string),
            iso639_3: iso639_3.to_string(),
            name: name.to_string(),
        }
    }

    /// A canonical-only entry without a display name.
    pub fn special(code: &str) -> Self {
        Self {
            iso639_3: code.to_string(),
            ..Self::default()
        }
    }

    /// The alternate 3-letter code when it differs from the canonical one.
    fn distinct_iso639_2(&self) -> Option<&str> {
        self.iso639_2
            .as_deref()
            .filter(|code| *code != self.iso639_3)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#""LanguageCodes": {{ "iso_639-3": "{}""#, self.iso639_3)?;
        if let Some(code) = &self.iso639_1 {
            write!(f, r#", "iso_639-1": "{code}""#)?;
        }
        if let Some(code) = &self.iso639_2 {
            write!(f, r#", "iso_639-2": "{code}""#)?;
        }
        write!(f, r#", "description": "{}"}}"#, self.name)
    }
}

/// Lookup table over every known language.
#[derive(Debug, Clone, Default)]
pub struct LanguageCodeTable {
    entries: Vec<Entry>,
    iso639_1: HashMap<String, usize>,
    iso639_2: HashMap<String, usize>,
    iso639_3: HashMap<String, usize>,
}

impl LanguageCodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from the store's `languages` relation plus canonical-only special codes.
    ///
    /// Malformed or duplicate rows are logged and skipped.
    #[instrument(name = "Load language codes", level = "info", skip_all)]
    pub fn load<S: DataStore + ?Sized>(
        store: &mut S,
        cancel: &CancelSignal,
        special_codes: &[String],
    ) -> std::result::Result<Self, StoreError> {
        let t = Instant::now();
        let df = store.execute_read(&StoreRequest::Languages, cancel)?;
        let mut table = Self::new();
        let mut skipped = 0_usize;

        for (iso639_1, iso639_2, iso639_3, name) in izip!(
            df.column(columns::ISO_639_1)?.str()?,
            df.column(columns::ISO_639_2)?.str()?,
            df.column(columns::ISO_639_3)?.str()?,
            df.column(columns::NAME)?.str()?,
        ) {
            let entry = Entry::new(
                iso639_1,
                iso639_2,
                iso639_3.unwrap_or_default(),
                name.unwrap_or_default(),
            );
            if let Err(e) = table.add(entry.clone()) {
                warn!(entry = %entry, error = %e, "Skipping language code entry");
                skipped += 1;
            }
        }
        for code in special_codes {
            table.add_special_code(code);
        }

        info!(
            languages = table.len(),
            skipped,
            elapsed_ms = ?t.elapsed(),
            "Language code table loaded"
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate and insert an entry. Nothing is inserted when validation fails.
    pub fn add(&mut self, entry: Entry) -> Result<()> {
        if !is_code(&entry.iso639_3, 3) {
            return Err(LanguageError::InvalidCode {
                standard: "ISO 639-3",
                code: entry.iso639_3,
            });
        }
        if self.iso639_3.contains_key(&entry.iso639_3) {
            return Err(LanguageError::DuplicateCode {
                standard: "ISO 639-3",
                code: entry.iso639_3,
            });
        }
        if let Some(code) = &entry.iso639_1 {
            if !is_code(code, 2) {
                return Err(LanguageError::InvalidCode {
                    standard: "ISO 639-1",
                    code: code.clone(),
                });
            }
            if self.iso639_1.contains_key(code) {
                return Err(LanguageError::DuplicateCode {
                    standard: "ISO 639-1",
                    code: code.clone(),
                });
            }
        }
        if let Some(code) = entry.distinct_iso639_2() {
            if !is_code(code, 3) {
                return Err(LanguageError::InvalidCode {
                    standard: "ISO 639-2",
                    code: code.to_string(),
                });
            }
            if self.iso639_2.contains_key(code) {
                return Err(LanguageError::DuplicateCode {
                    standard: "ISO 639-2",
                    code: code.to_string(),
                });
            }
        }

        let index = self.entries.len();
        self.iso639_3.insert(entry.iso639_3.clone(), index);
        if let Some(code) = &entry.iso639_1 {
            self.iso639_1.insert(code.clone(), index);
        }
        if let Some(code) = entry.distinct_iso639_2() {
            self.iso639_2.insert(code.to_string(), index);
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Insert a canonical-only code without validation. An existing canonical code is kept.
    pub fn add_special_code(&mut self, code: &str) {
        if self.iso639_3.contains_key(code) {
            return;
        }
        self.iso639_3.insert(code.to_string(), self.entries.len());
        self.entries.push(Entry::special(code));
    }

    /// Find the language of a 2-letter, canonical 3-letter or alternate 3-letter code.
    pub fn get(&self, code: &str) -> Option<&Entry> {
        let index = match code.len() {
            2 => self.iso639_1.get(code),
            0 | 1 => None,
            _ => self
                .iso639_3
                .get(code)
                .or_else(|| self.iso639_2.get(code)),
        }?;
        self.entries.get(*index)
    }

    /// Every code of the language: canonical, alternate, then 2-letter.
    /// An unknown language is its own only code.
    pub fn codes(&self, language: &str) -> Vec<String> {
        let Some(entry) = self.get(language) else {
            return vec![language.to_string()];
        };
        let mut codes = vec![entry.iso639_3.clone()];
        if let Some(code) = entry.distinct_iso639_2() {
            codes.push(code.to_string());
        }
        if let Some(code) = &entry.iso639_1 {
            codes.push(code.clone());
        }
        codes
    }
}

/// The current language table, replaceable while readers hold older snapshots.
#[derive(Clone)]
pub struct SharedLanguageTable(Arc<ArcSwap<LanguageCodeTable>>);

static GLOBAL: Lazy<SharedLanguageTable> = Lazy::new(SharedLanguageTable::default);

impl Default for SharedLanguageTable {
    fn default() -> Self {
        Self::new(LanguageCodeTable::default())
    }
}

impl fmt::Debug for SharedLanguageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedLanguageTable")
            .field("languages", &self.0.load().len())
            .finish()
    }
}

impl SharedLanguageTable {
    pub fn new(table: LanguageCodeTable) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(table)))
    }

    /// The process-wide table shared by engines that are not given their own.
    pub fn global() -> Self {
        GLOBAL.clone()
    }

    /// The table as of now. Later publications do not affect the returned snapshot.
    pub fn snapshot(&self) -> Arc<LanguageCodeTable> {
        self.0.load_full()
    }

    /// Atomically replace the table, returning the previous one.
    pub fn publish(&self, table: LanguageCodeTable) -> Arc<LanguageCodeTable> {
        self.0.swap(Arc::new(table))
    }

    pub fn get(&self, code: &str) -> Option<Entry> {
        self.0.load().get(code).cloned()
    }

    pub fn codes(&self, language: &str) -> Vec<String> {
        self.0.load().codes(language)
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum LanguageError {
        #[error("Invalid {standard} language code '{code}'")]
        InvalidCode { standard: &'static str, code: String },
        #[error("Duplicate {standard} language code '{code}'")]
        DuplicateCode { standard: &'static str, code: String },
    }

    pub type Result<T> = std::result::Result<T, LanguageError>;
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
    };

    use gazetteer_store::{FrameStore, test_data};

    use super::*;

    fn table() -> LanguageCodeTable {
        let mut table = LanguageCodeTable::new();
        table
            .add(Entry::new(Some("fi"), Some("fin"), "fin", "Finnish"))
            .unwrap();
        table
            .add(Entry::new(Some("fo"), Some("bar"), "foo", ""))
            .unwrap();
        table
            .add(Entry::new(Some("de"), Some("ger"), "deu", "German"))
            .unwrap();
        table
    }

    #[test]
    fn test_get_by_each_code_form() {
        let table = table();
        assert_eq!(table.get("fi").unwrap().iso639_3, "fin");
        assert_eq!(table.get("fin").unwrap().iso639_1.as_deref(), Some("fi"));
        let entry = table.get("bar").unwrap();
        assert_eq!(entry.iso639_1.as_deref(), Some("fo"));
        assert_eq!(entry.iso639_2.as_deref(), Some("bar"));
        assert_eq!(table.get("ger").unwrap().iso639_3, "deu");
    }

    #[test]
    fn test_get_unknown_and_short_codes() {
        let table = table();
        assert!(table.get("sv").is_none());
        assert!(table.get("swe").is_none());
        assert!(table.get("f").is_none());
        assert!(table.get("").is_none());
        // 2-letter lookups never consult the 3-letter indexes
        assert!(table.get("fo").is_some());
        assert!(table.get("xfin").is_none());
    }

    #[test]
    fn test_invalid_codes_are_rejected_without_partial_insert() {
        let mut table = table();
        let err = table
            .add(Entry::new(Some("sv"), Some("swe"), "SWE", "Swedish"))
            .unwrap_err();
        assert!(matches!(err, LanguageError::InvalidCode { standard: "ISO 639-3", .. }));

        let err = table
            .add(Entry::new(Some("s"), Some("swe"), "swe", "Swedish"))
            .unwrap_err();
        assert!(matches!(err, LanguageError::InvalidCode { standard: "ISO 639-1", .. }));
        assert!(table.get("swe").is_none());

        let err = table
            .add(Entry::new(None, Some("s1e"), "swe", "Swedish"))
            .unwrap_err();
        assert!(matches!(err, LanguageError::InvalidCode { standard: "ISO 639-2", .. }));
    }

    #[test]
    fn test_duplicates_are_rejected() {
        let mut table = table();
        let err = table
            .add(Entry::new(None, None, "fin", "Finnish again"))
            .unwrap_err();
        assert_eq!(
            err,
            LanguageError::DuplicateCode {
                standard: "ISO 639-3",
                code: "fin".into()
            }
        );
        let err = table
            .add(Entry::new(Some("fi"), None, "fiu", "Finno-Ugrian"))
            .unwrap_err();
        assert!(matches!(err, LanguageError::DuplicateCode { standard: "ISO 639-1", .. }));
        let err = table
            .add(Entry::new(None, Some("ger"), "gmh", "Middle High German"))
            .unwrap_err();
        assert!(matches!(err, LanguageError::DuplicateCode { standard: "ISO 639-2", .. }));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_codes_equivalence_class() {
        let table = table();
        assert_eq!(table.codes("fi"), vec!["fin", "fi"]);
        assert_eq!(table.codes("ger"), vec!["deu", "ger", "de"]);
        assert_eq!(table.codes("xyz"), vec!["xyz"]);
    }

    #[test]
    fn test_special_codes() {
        let mut table = table();
        table.add_special_code("fmisid");
        table.add_special_code("wmo");
        table.add_special_code("fmisid");
        assert_eq!(table.len(), 5);
        let entry = table.get("fmisid").unwrap();
        assert!(entry.iso639_1.is_none());
        assert!(entry.name.is_empty());
        assert_eq!(table.codes("wmo"), vec!["wmo"]);
    }

    #[test]
    fn test_display() {
        let entry = Entry::new(Some("lv"), Some("lav"), "lav", "Latvian");
        assert_eq!(
            entry.to_string(),
            r#""LanguageCodes": { "iso_639-3": "lav", "iso_639-1": "lv", "iso_639-2": "lav", "description": "Latvian"}"#
        );
    }

    #[test]
    fn test_load_skips_bad_rows() {
        let mut store = FrameStore::new(test_data::sample_tables().unwrap());
        let specials = vec!["fmisid".to_string(), "wmo".to_string(), "lpnn".to_string()];
        let table = LanguageCodeTable::load(&mut store, &CancelSignal::new(), &specials).unwrap();

        let lv = table.get("lv").unwrap();
        assert_eq!(lv.iso639_2.as_deref(), Some("lav"));
        assert_eq!(lv.iso639_3, "lav");
        assert_eq!(table.get("cze").unwrap().iso639_3, "ces");
        assert_eq!(table.get("sv").unwrap().name, "Swedish");
        assert!(table.get("x1x").is_none());
        assert!(table.get("swx").is_none());
        assert!(table.get("lpnn").is_some());
    }

    #[test]
    fn test_snapshot_survives_publish() {
        let shared = SharedLanguageTable::new(table());
        let before = shared.snapshot();
        let previous = shared.publish(LanguageCodeTable::new());
        assert!(shared.get("fi").is_none());
        assert!(before.get("fi").is_some());
        assert_eq!(previous.len(), 3);
    }

    fn generation(n: usize) -> LanguageCodeTable {
        let mut table = LanguageCodeTable::new();
        for (two, three) in [("fi", "fin"), ("sv", "swe"), ("et", "est")] {
            table
                .add(Entry::new(Some(two), None, three, &format!("generation {n}")))
                .unwrap();
        }
        table
    }

    #[test]
    fn test_readers_never_mix_generations() {
        let shared = SharedLanguageTable::new(generation(0));
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    let mut reads = 0_usize;
                    while !done.load(Ordering::Relaxed) || reads == 0 {
                        let snapshot = shared.snapshot();
                        let names: Vec<&str> = ["fi", "swe", "et"]
                            .iter()
                            .map(|code| snapshot.get(code).unwrap().name.as_str())
                            .collect();
                        assert!(names.iter().all(|n| *n == names[0]), "{names:?}");
                        reads += 1;
                    }
                    reads
                })
            })
            .collect();

        for n in 1..200 {
            shared.publish(generation(n));
        }
        done.store(true, Ordering::Relaxed);
        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
        assert_eq!(shared.get("fi").unwrap().name, "generation 199");
    }
}
