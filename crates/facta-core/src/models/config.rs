//! Configuration structures for the extraction pipeline.

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main configuration for the facta pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FactaConfig {
    /// Strategy cascade switches.
    pub extraction: ExtractionConfig,

    /// Total/component reconciliation tolerances.
    pub reconcile: ReconcileConfig,

    /// Pattern store configuration.
    pub patterns: PatternConfig,

    /// Currency forcing overrides.
    pub currency: CurrencyConfig,

    /// External OCR command.
    pub ocr: OcrConfig,

    /// PDF processing configuration.
    pub pdf: PdfConfig,
}

/// Strategy cascade switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Look up and persist learned patterns.
    pub use_pattern_matching: bool,

    /// Run the loose rule table over OCR text when OCR text is available.
    pub use_ocr_strategy: bool,

    /// Skip the cache lookup but keep persisting new patterns.
    pub ignore_saved_patterns: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            use_pattern_matching: true,
            use_ocr_strategy: true,
            ignore_saved_patterns: false,
        }
    }
}

/// Reconciliation tolerances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Relative difference above which the extracted total is considered
    /// inconsistent with its components.
    pub relative_tolerance: Decimal,

    /// Relative difference above which a warning is recorded.
    pub loose_relative_tolerance: Decimal,

    /// Absolute gap that triggers the non-taxable phrase search.
    pub absolute_tolerance: Decimal,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            relative_tolerance: Decimal::new(5, 2),
            loose_relative_tolerance: Decimal::new(15, 2),
            absolute_tolerance: Decimal::ONE,
        }
    }
}

/// Pattern store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Store file; the CLI falls back to the user data directory.
    pub store_path: Option<PathBuf>,

    /// Characters of document text kept per pattern.
    pub sample_length: usize,

    /// Minimum Jaccard similarity for a cache hit (0.0 - 1.0).
    pub similarity_threshold: f64,

    /// Maximum relative disagreement between cached and scanned totals.
    pub total_agreement: Decimal,

    /// Minimum word length counted in a fingerprint.
    pub min_word_length: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            sample_length: 1000,
            similarity_threshold: 0.85,
            total_agreement: Decimal::new(10, 2),
            min_word_length: 6,
        }
    }
}

/// Issuer tokens that force a currency.
///
/// Tokens are matched case-insensitively against the document name; foreign
/// issuers are also looked up in the document text. The defaults are a
/// starter list of Argentine utilities and US cloud vendors; a config file
/// replaces a list as a whole, and an empty list disables that override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    /// Issuers whose invoices are always in pesos.
    pub domestic_issuers: Vec<String>,

    /// Issuers whose invoices are always in US dollars.
    pub foreign_issuers: Vec<String>,
}

const DOMESTIC_ISSUERS: [&str; 7] = [
    "edenor", "edesur", "metrogas", "aysa", "telecom", "fibertel", "movistar",
];

const FOREIGN_ISSUERS: [&str; 6] = [
    "amazon web services",
    "google cloud",
    "github",
    "openai",
    "digitalocean",
    "microsoft corporation",
];

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            domestic_issuers: DOMESTIC_ISSUERS.iter().map(|t| t.to_string()).collect(),
            foreign_issuers: FOREIGN_ISSUERS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// External OCR command configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Command and arguments; `{input}` is replaced by the document path.
    /// The command must print the recognized text on stdout.
    pub command: Option<Vec<String>>,

    /// Per-document timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: 60,
        }
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Minimum text length to consider PDF as text-based.
    pub min_text_length: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self { min_text_length: 50 }
    }
}

impl FactaConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = FactaConfig::default();
        assert!(config.extraction.use_pattern_matching);
        assert!(config.extraction.use_ocr_strategy);
        assert!(!config.extraction.ignore_saved_patterns);
        assert_eq!(config.reconcile.relative_tolerance, Decimal::new(5, 2));
        assert_eq!(config.patterns.sample_length, 1000);
        assert_eq!(config.patterns.min_word_length, 6);
        assert_eq!(config.ocr.timeout_secs, 60);
        assert!(config.currency.domestic_issuers.contains(&"edenor".to_string()));
        assert!(config.currency.foreign_issuers.contains(&"github".to_string()));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: FactaConfig = serde_json::from_str(
            r#"{"extraction": {"use_ocr_strategy": false}, "currency": {"foreign_issuers": ["acme"]}}"#,
        )
        .unwrap();
        assert!(!config.extraction.use_ocr_strategy);
        assert!(config.extraction.use_pattern_matching);
        assert_eq!(config.currency.foreign_issuers, vec!["acme".to_string()]);
        assert!(!config.currency.domestic_issuers.is_empty());
        assert_eq!(config.patterns.similarity_threshold, 0.85);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = FactaConfig::default();
        config.ocr.command = Some(vec!["tesseract".into(), "{input}".into(), "-".into()]);
        config.reconcile.absolute_tolerance = Decimal::new(5, 1);
        config.save(&path).unwrap();

        let loaded = FactaConfig::from_file(&path).unwrap();
        assert_eq!(loaded.ocr.command, config.ocr.command);
        assert_eq!(loaded.reconcile.absolute_tolerance, Decimal::new(5, 1));
    }
}
