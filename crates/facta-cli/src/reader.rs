//! Turns input files into source documents: PDF text decoding, plain text
//! files, and the external OCR command.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, warn};

use facta_core::error::{FactaError, PdfError};
use facta_core::models::config::FactaConfig;
use facta_core::pdf::PdfDecoder;
use facta_core::SourceDocument;

/// File extensions the reader accepts.
pub const SUPPORTED_EXTENSIONS: [&str; 9] =
    ["pdf", "txt", "png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

/// Whether a path has a supported extension.
pub fn is_supported(path: &Path) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension(path).as_str())
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// External OCR program printing recognized text on stdout.
#[derive(Debug, Clone)]
pub struct OcrCommand {
    argv: Vec<String>,
    timeout: Duration,
}

impl OcrCommand {
    pub fn from_config(config: &FactaConfig) -> Option<Self> {
        let argv = config.ocr.command.clone().filter(|argv| !argv.is_empty())?;
        Some(Self {
            argv,
            timeout: Duration::from_secs(config.ocr.timeout_secs),
        })
    }

    /// Run OCR on one file. The child is killed when the timeout expires.
    pub async fn run(&self, input: &Path) -> anyhow::Result<String> {
        let input_arg = input.display().to_string();
        let (program, rest) = self
            .argv
            .split_first()
            .context("OCR command is empty")?;

        let mut args: Vec<String> = rest.iter().map(|a| a.replace("{input}", &input_arg)).collect();
        if !self.argv.iter().any(|a| a.contains("{input}")) {
            args.push(input_arg);
        }

        let mut command = Command::new(program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running OCR: {} {:?}", program, args);
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| anyhow::anyhow!("OCR timed out after {}s", self.timeout.as_secs()))?
            .with_context(|| format!("failed to run OCR command {}", program))?;

        if !output.status.success() {
            anyhow::bail!(
                "OCR command exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        // Form feeds separate pages in tesseract output
        Ok(String::from_utf8_lossy(&output.stdout).replace('\x0c', "\n"))
    }
}

/// Reads files into [`SourceDocument`]s.
#[derive(Debug, Clone)]
pub struct DocumentReader {
    min_text_length: usize,
    ocr: Option<OcrCommand>,
}

impl DocumentReader {
    pub fn new(config: &FactaConfig) -> Self {
        let ocr = if config.extraction.use_ocr_strategy {
            OcrCommand::from_config(config)
        } else {
            None
        };
        Self {
            min_text_length: config.pdf.min_text_length,
            ocr,
        }
    }

    /// Read a file. Only failures to obtain any input are errors; a failing
    /// OCR command leaves the document without OCR text.
    pub async fn read(&self, path: &Path) -> Result<SourceDocument, FactaError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let (text, wants_ocr) = match extension(path).as_str() {
            "txt" => (tokio::fs::read_to_string(path).await?, false),
            "pdf" => {
                let data = tokio::fs::read(path).await?;
                let min_text_length = self.min_text_length;
                let content = tokio::task::spawn_blocking(move || {
                    PdfDecoder::decode(&data, min_text_length)
                })
                .await
                .map_err(|e| PdfError::TextExtraction(e.to_string()))??;
                debug!("{}: {:?} PDF, {} pages", name, content.pdf_type, content.page_count);
                let wants_ocr = content.pdf_type.needs_ocr();
                (content.text, wants_ocr)
            }
            _ => (String::new(), true),
        };

        let mut doc = SourceDocument::new(name, text);
        if wants_ocr {
            if let Some(ocr_text) = self.ocr_text(path).await {
                doc = doc.with_ocr_text(ocr_text);
            }
        }
        Ok(doc)
    }

    async fn ocr_text(&self, path: &Path) -> Option<String> {
        let Some(ocr) = &self.ocr else {
            debug!("{}: no OCR command configured", path.display());
            return None;
        };
        match ocr.run(path).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("{}: {:#}", path.display(), e);
                None
            }
        }
    }
}
