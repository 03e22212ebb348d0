//! Subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod patterns;
pub mod process;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use facta_core::models::config::FactaConfig;
use facta_core::models::record::InvoiceRecord;
use facta_core::store::PatternStore;
use facta_core::{ExtractionOrchestrator, FactaError};
use tokio::task::JoinError;
use tracing::{debug, error};

use crate::reader::DocumentReader;

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("facta")
        .join("config.json")
}

/// Configuration file in effect: `--config`, else the default location.
pub fn config_file(config_path: Option<&str>) -> PathBuf {
    config_path.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load the configuration, falling back to defaults when no file exists.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<FactaConfig> {
    if let Some(path) = config_path {
        return Ok(FactaConfig::from_file(Path::new(path))?);
    }

    let path = default_config_path();
    if path.exists() {
        debug!("Using config at {}", path.display());
        Ok(FactaConfig::from_file(&path)?)
    } else {
        Ok(FactaConfig::default())
    }
}

/// Pattern store file in effect.
pub fn store_path(config: &FactaConfig) -> PathBuf {
    config.patterns.store_path.clone().unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("facta")
            .join("patterns.json")
    })
}

/// Open the pattern store, or an in-memory one when pattern matching is off.
pub fn open_store(config: &FactaConfig) -> PatternStore {
    if config.extraction.use_pattern_matching {
        PatternStore::open(store_path(config), config.patterns.clone())
    } else {
        PatternStore::in_memory(config.patterns.clone())
    }
}

/// Read and extract one document. Every outcome yields a record: read
/// failures and aborted extraction tasks become `error` records.
pub async fn extract_one(
    reader: &DocumentReader,
    orchestrator: Arc<ExtractionOrchestrator>,
    path: &Path,
    ocr_text: Option<String>,
) -> InvoiceRecord {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let doc = match reader.read(path).await {
        Ok(doc) => doc,
        Err(e) => return ExtractionOrchestrator::error_record(&name, &e),
    };
    let doc = match ocr_text {
        Some(text) => doc.with_ocr_text(text),
        None => doc,
    };

    let joined = tokio::task::spawn_blocking(move || orchestrator.process(&doc)).await;
    record_or_aborted(&name, joined)
}

fn record_or_aborted(name: &str, joined: Result<InvoiceRecord, JoinError>) -> InvoiceRecord {
    joined.unwrap_or_else(|e| {
        error!("{}: extraction task failed: {}", name, e);
        ExtractionOrchestrator::error_record(name, &FactaError::Aborted(e.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use facta_core::ExtractionMethod;

    #[tokio::test]
    async fn test_panicking_extraction_becomes_error_record() {
        let joined = tokio::task::spawn_blocking(|| -> InvoiceRecord { panic!("boom") }).await;
        let record = record_or_aborted("bad.txt", joined);

        assert_eq!(record.method, ExtractionMethod::Error);
        assert_eq!(record.source_name, "bad.txt");
        assert!(record.amounts.is_zero());
        assert!(record.warnings[0].starts_with("processing aborted"));
    }

    #[tokio::test]
    async fn test_unreadable_document_becomes_error_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();

        let config = FactaConfig::default();
        let orchestrator = Arc::new(ExtractionOrchestrator::new(
            config.clone(),
            PatternStore::in_memory(config.patterns.clone()),
        ));
        let record = extract_one(&DocumentReader::new(&config), orchestrator, &path, None).await;

        assert_eq!(record.method, ExtractionMethod::Error);
        assert_eq!(record.source_name, "broken.pdf");
    }
}
