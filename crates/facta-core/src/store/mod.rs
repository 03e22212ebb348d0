//! Persisted cache of resolved records keyed by document fingerprint.
//!
//! A fingerprint is the set of lowercase words of at least
//! `min_word_length` characters found in the first `sample_length`
//! characters of a document. Documents of the same layout share most of
//! their long words, so a new document is matched against stored samples by
//! Jaccard similarity.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::config::PatternConfig;
use crate::models::record::{Amounts, Currency, ExtractionMethod, InvoiceRecord};

/// Schema version written to and expected from store files.
pub const STORE_VERSION: u32 = 1;

/// Record snapshot kept by a pattern, without the source name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedStructure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(flatten)]
    pub amounts: Amounts,
    pub currency: Currency,
}

impl CachedStructure {
    pub fn from_record(record: &InvoiceRecord) -> Self {
        Self {
            invoice_number: record.invoice_number.clone(),
            date: record.date.clone(),
            amounts: record.amounts,
            currency: record.currency,
        }
    }

    /// Materialize a record tagged as a cache hit.
    pub fn to_record(&self, source_name: impl Into<String>) -> InvoiceRecord {
        InvoiceRecord {
            source_name: source_name.into(),
            invoice_number: self.invoice_number.clone(),
            date: self.date.clone(),
            amounts: self.amounts.clamped(),
            currency: self.currency,
            method: ExtractionMethod::PatternCache,
            warnings: Vec::new(),
        }
    }
}

/// One cache entry. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionPattern {
    pub id: Uuid,
    /// Document text truncated to the configured sample length.
    pub sample_text: String,
    pub created_at: DateTime<Utc>,
    /// Strategy that produced the cached structure.
    pub method: ExtractionMethod,
    pub structure: CachedStructure,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    patterns: BTreeMap<Uuid, ExtractionPattern>,
}

/// A successful lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch<'a> {
    pub pattern: &'a ExtractionPattern,
    pub similarity: f64,
}

/// Pattern id → pattern, optionally backed by a JSON file.
#[derive(Debug)]
pub struct PatternStore {
    path: Option<PathBuf>,
    config: PatternConfig,
    patterns: BTreeMap<Uuid, ExtractionPattern>,
    fingerprints: HashMap<Uuid, HashSet<String>>,
}

impl PatternStore {
    /// Empty store that is never persisted.
    pub fn in_memory(config: PatternConfig) -> Self {
        Self {
            path: None,
            config,
            patterns: BTreeMap::new(),
            fingerprints: HashMap::new(),
        }
    }

    /// Load the store at `path`, starting empty when the file is missing or
    /// unusable.
    pub fn open(path: impl Into<PathBuf>, config: PatternConfig) -> Self {
        let path = path.into();
        let patterns = match Self::load(&path) {
            Ok(patterns) => {
                info!("Loaded {} patterns from {}", patterns.len(), path.display());
                patterns
            }
            Err(StoreError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                debug!("No pattern store at {}, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                warn!("Ignoring pattern store {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        let mut store = Self::in_memory(config);
        store.path = Some(path);
        for (id, pattern) in patterns {
            store.index(&pattern);
            store.patterns.insert(id, pattern);
        }
        store
    }

    fn load(path: &Path) -> Result<BTreeMap<Uuid, ExtractionPattern>, StoreError> {
        let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: StoreFile = serde_json::from_str(&content)?;
        if file.version != STORE_VERSION {
            return Err(StoreError::Version {
                found: file.version,
                expected: STORE_VERSION,
            });
        }
        Ok(file.patterns)
    }

    /// Overwrite the backing file with the full store.
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = StoreFile {
            version: STORE_VERSION,
            patterns: self.patterns.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        debug!("Saved {} patterns to {}", self.patterns.len(), path.display());
        Ok(())
    }

    /// Drop every pattern and persist the empty store.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.patterns.clear();
        self.fingerprints.clear();
        self.save()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Patterns, oldest first.
    pub fn patterns(&self) -> Vec<&ExtractionPattern> {
        let mut patterns: Vec<_> = self.patterns.values().collect();
        patterns.sort_by_key(|p| p.created_at);
        patterns
    }

    fn fingerprint_of(&self, text: &str) -> HashSet<String> {
        fingerprint(text, self.config.sample_length, self.config.min_word_length)
    }

    fn index(&mut self, pattern: &ExtractionPattern) {
        let words = self.fingerprint_of(&pattern.sample_text);
        self.fingerprints.insert(pattern.id, words);
    }

    /// Best stored pattern for `text`.
    ///
    /// A candidate must reach the similarity threshold and, when both the
    /// cached structure and `scan_total` carry a positive total, agree on it
    /// within the configured relative tolerance.
    pub fn find_match(&self, text: &str, scan_total: Option<Decimal>) -> Option<PatternMatch<'_>> {
        let words = self.fingerprint_of(text);
        if words.is_empty() {
            return None;
        }

        self.patterns
            .values()
            .filter_map(|pattern| {
                let similarity = jaccard(&words, self.fingerprints.get(&pattern.id)?);
                (similarity >= self.config.similarity_threshold).then_some(PatternMatch {
                    pattern,
                    similarity,
                })
            })
            .filter(|m| self.totals_agree(m.pattern.structure.amounts.total, scan_total))
            .max_by(|a, b| a.similarity.total_cmp(&b.similarity))
    }

    fn totals_agree(&self, cached: Decimal, scanned: Option<Decimal>) -> bool {
        match scanned {
            Some(scanned) if cached > Decimal::ZERO && scanned > Decimal::ZERO => {
                (cached - scanned).abs() / cached <= self.config.total_agreement
            }
            _ => true,
        }
    }

    /// Remember a resolved record. Returns the new pattern id, or `None` when
    /// the text has no usable fingerprint or an identical one is stored.
    pub fn insert(&mut self, text: &str, record: &InvoiceRecord) -> Option<Uuid> {
        let words = self.fingerprint_of(text);
        if words.is_empty() {
            debug!("{}: no fingerprint words, not caching", record.source_name);
            return None;
        }
        if self.fingerprints.values().any(|existing| *existing == words) {
            debug!("{}: identical fingerprint already cached", record.source_name);
            return None;
        }

        let pattern = ExtractionPattern {
            id: Uuid::new_v4(),
            sample_text: text.chars().take(self.config.sample_length).collect(),
            created_at: Utc::now(),
            method: record.method,
            structure: CachedStructure::from_record(record),
        };
        let id = pattern.id;
        self.fingerprints.insert(id, words);
        self.patterns.insert(id, pattern);
        Some(id)
    }
}

/// Lowercase alphabetic words of at least `min_len` characters from the
/// first `sample_length` characters of `text`.
pub fn fingerprint(text: &str, sample_length: usize, min_len: usize) -> HashSet<String> {
    let sample: String = text.chars().take(sample_length).collect();
    sample
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= min_len && w.chars().any(char::is_alphabetic))
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard similarity; zero when both sets are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
