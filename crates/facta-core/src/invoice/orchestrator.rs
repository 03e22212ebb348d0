//! Per-document extraction cascade.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use super::reconcile::{has_nontaxable_phrase, ReconcileInput, Reconciler};
use super::rules::currency::classify_currency;
use super::rules::kind::{classify_kind, DocumentKind};
use super::rules::patterns::USD_PHRASE;
use super::strategy::{scan_total, ExtractionStrategy, RuleStrategy};
use super::travel::TravelExtractor;
use crate::error::{ExtractionError, FactaError};
use crate::models::config::{CurrencyConfig, ExtractionConfig, FactaConfig};
use crate::models::record::{Currency, ExtractionMethod, InvoiceRecord};
use crate::store::PatternStore;

/// Text of one input document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDocument {
    /// Display name, usually the file name.
    pub name: String,
    /// Decoded text (PDF text layer or plain text file).
    pub text: String,
    /// OCR output, when the OCR collaborator produced any.
    pub ocr_text: Option<String>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            ocr_text: None,
        }
    }

    pub fn with_ocr_text(mut self, ocr_text: impl Into<String>) -> Self {
        self.ocr_text = Some(ocr_text.into());
        self
    }

    /// Decoded text, or the OCR text when nothing was decoded.
    pub fn primary_text(&self) -> Option<&str> {
        [Some(self.text.as_str()), self.ocr_text.as_deref()]
            .into_iter()
            .flatten()
            .find(|t| !t.trim().is_empty())
    }

    fn usable_ocr_text(&self) -> Option<&str> {
        self.ocr_text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Cascade states, in the order a document moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeState {
    Init,
    CacheLookup,
    OcrAttempt,
    RegexAttempt,
    SpecializedAttempt,
    Failed,
    Done,
}

/// Runs the extraction cascade for one document at a time.
///
/// Extraction itself runs without locks; cache lookups and appends go through
/// one mutex so the orchestrator can be shared across worker threads.
pub struct ExtractionOrchestrator {
    extraction: ExtractionConfig,
    currency: CurrencyConfig,
    store: Mutex<PatternStore>,
    ocr: RuleStrategy,
    text: RuleStrategy,
    travel: TravelExtractor,
    reconciler: Reconciler,
}

impl ExtractionOrchestrator {
    pub fn new(config: FactaConfig, store: PatternStore) -> Self {
        let FactaConfig {
            extraction,
            reconcile,
            currency,
            ..
        } = config;

        Self {
            extraction,
            currency,
            store: Mutex::new(store),
            ocr: RuleStrategy::ocr(reconcile.clone()),
            text: RuleStrategy::text(reconcile.clone()),
            travel: TravelExtractor::new(reconcile.clone()),
            reconciler: Reconciler::new(reconcile),
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, PatternStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve one document into exactly one record.
    pub fn process(&self, doc: &SourceDocument) -> InvoiceRecord {
        let Some(text) = doc.primary_text() else {
            let err = FactaError::NoText(doc.name.clone());
            warn!("{}", err);
            return Self::error_record(&doc.name, &err);
        };

        let kind = classify_kind(text);
        let classified = classify_currency(text);
        debug!("{}: kind {}, classified currency {}", doc.name, kind, classified);

        let mut state = CascadeState::Init;
        let mut record = loop {
            debug!("{}: {:?}", doc.name, state);
            state = match state {
                CascadeState::Init => {
                    if self.extraction.use_pattern_matching && !self.extraction.ignore_saved_patterns {
                        CascadeState::CacheLookup
                    } else {
                        CascadeState::OcrAttempt
                    }
                }
                CascadeState::CacheLookup => match self.lookup(doc, text, kind) {
                    Some(record) => break record,
                    None => CascadeState::OcrAttempt,
                },
                CascadeState::OcrAttempt => {
                    let ocr_text = doc
                        .usable_ocr_text()
                        .filter(|_| self.extraction.use_ocr_strategy);
                    if let Some(record) = ocr_text.and_then(|t| self.attempt(&self.ocr, doc, t, kind)) {
                        break record;
                    }
                    CascadeState::RegexAttempt
                }
                CascadeState::RegexAttempt => {
                    if let Some(record) = self.attempt(&self.text, doc, text, kind) {
                        break record;
                    }
                    if kind == DocumentKind::Travel {
                        CascadeState::SpecializedAttempt
                    } else {
                        CascadeState::Failed
                    }
                }
                CascadeState::SpecializedAttempt => {
                    if let Some(record) = self.attempt(&self.travel, doc, text, kind) {
                        break record;
                    }
                    CascadeState::Failed
                }
                CascadeState::Failed | CascadeState::Done => {
                    break self.failed_record(doc, text, kind)
                }
            };
        };
        debug!("{}: {:?}", doc.name, CascadeState::Done);

        let base = match record.method {
            ExtractionMethod::PatternCache => record.currency,
            _ => classified,
        };
        record.currency = self.resolve_currency(&doc.name, text, kind, base);

        let learned = matches!(
            record.method,
            ExtractionMethod::Ocr | ExtractionMethod::Regex | ExtractionMethod::SpecializedTravel
        );
        if learned && self.extraction.use_pattern_matching {
            self.remember(text, &record);
        }

        info!(
            "{}: {} total {} {}",
            doc.name, record.method, record.amounts.total, record.currency
        );
        record
    }

    fn lookup(&self, doc: &SourceDocument, text: &str, kind: DocumentKind) -> Option<InvoiceRecord> {
        let mut record = {
            let store = self.lock_store();
            let hit = store.find_match(text, scan_total(text))?;
            debug!(
                "{}: cache hit {} (similarity {:.2})",
                doc.name, hit.pattern.id, hit.similarity
            );
            hit.pattern.structure.to_record(&doc.name)
        };

        // Amounts come from the cached layout; identifiers belong to this document.
        let fresh = self.text.capture(text, kind);
        record.invoice_number = fresh.invoice_number.or(record.invoice_number);
        record.date = fresh.date.or(record.date);
        Some(record)
    }

    fn attempt(
        &self,
        strategy: &dyn ExtractionStrategy,
        doc: &SourceDocument,
        text: &str,
        kind: DocumentKind,
    ) -> Option<InvoiceRecord> {
        match strategy.extract(text, kind) {
            Ok(set) => Some(set.into_record(&doc.name, Currency::Unknown, strategy.method())),
            Err(e @ ExtractionError::NoTotal { .. }) => {
                debug!("{}: {}", doc.name, e);
                None
            }
            Err(e) => {
                warn!("{}: {} strategy failed: {}", doc.name, strategy.method(), e);
                None
            }
        }
    }

    /// Zeroed record for an exhausted cascade, keeping whatever the
    /// non-taxable phrase recovery finds.
    fn failed_record(&self, doc: &SourceDocument, text: &str, kind: DocumentKind) -> InvoiceRecord {
        let partial = self.text.capture(text, kind);
        let reconciled = self.reconciler.reconcile(&ReconcileInput {
            amounts: partial.amounts,
            has_nontaxable_phrase: has_nontaxable_phrase(text),
            other_total: None,
            raw_text: text,
        });

        let mut record = InvoiceRecord::empty(&doc.name, ExtractionMethod::Failed);
        record.invoice_number = partial.invoice_number;
        record.date = partial.date;
        record.amounts = reconciled.amounts;
        record.warnings.push(ExtractionError::NoData.to_string());
        record.warnings.extend(reconciled.warnings);
        warn!("{}: no strategy produced a total", doc.name);
        record
    }

    /// Record for a document whose text could not be obtained.
    pub fn error_record(name: &str, err: &FactaError) -> InvoiceRecord {
        let mut record = InvoiceRecord::empty(name, ExtractionMethod::Error);
        record.warnings.push(err.to_string());
        record
    }

    /// Apply issuer and type based currency forcing.
    ///
    /// Priority: explicit USD signal, then domestic issuer, then the domestic
    /// type default, then `base`.
    fn resolve_currency(&self, name: &str, text: &str, kind: DocumentKind, base: Currency) -> Currency {
        let name = name.to_lowercase();
        let lower_text = text.to_lowercase();

        let foreign = tokens(&self.currency.foreign_issuers)
            .any(|t| name.contains(&t) || lower_text.contains(&t));
        if foreign || USD_PHRASE.is_match(text) {
            if base != Currency::Usd {
                debug!("{}: currency forced to USD", name);
            }
            return Currency::Usd;
        }

        if tokens(&self.currency.domestic_issuers).any(|t| name.contains(&t)) {
            return Currency::Ars;
        }

        if kind.is_domestic() && base == Currency::Unknown {
            return Currency::Ars;
        }
        base
    }

    fn remember(&self, text: &str, record: &InvoiceRecord) {
        let mut store = self.lock_store();
        if let Some(id) = store.insert(text, record) {
            debug!("{}: cached as pattern {}", record.source_name, id);
            if let Err(e) = store.save() {
                warn!("Failed to save pattern store: {}", e);
            }
        }
    }
}

fn tokens(list: &[String]) -> impl Iterator<Item = String> + '_ {
    list.iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
}

/// Drop later records that repeat an invoice number.
///
/// Numbered records come first, in input order, keeping the first occurrence
/// of each number; records without a number follow, all of them, in input
/// order.
pub fn deduplicate(records: Vec<InvoiceRecord>) -> Vec<InvoiceRecord> {
    let (numbered, unnumbered): (Vec<_>, Vec<_>) =
        records.into_iter().partition(|r| r.dedup_key().is_some());

    let mut seen = HashSet::new();
    let mut kept: Vec<InvoiceRecord> = numbered
        .into_iter()
        .filter(|r| {
            let key = r.dedup_key().unwrap_or_default().to_string();
            let first = seen.insert(key);
            if !first {
                debug!("{}: duplicate invoice {}, dropped", r.source_name, r.label());
            }
            first
        })
        .collect();
    kept.extend(unnumbered);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::Amounts;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    const REGEX_INVOICE: &str = "Gravado: 1000,00\nIVA 21%: 210,00\nTOTAL: 1210,00";
    const TRAVEL_INVOICE: &str =
        "TOTAL USD: 1.500,00\nSrvs de transporte exento s/ley 23871: 1.500,00";
    const LAYOUT: &str = "Distribuidora Mayorista Patagónica\nDomicilio comercial Avenida Corrientes\n\
                          Factura N° 0002-00000077\nGravado: 1000,00\nIVA 21%: 210,00\nTOTAL: 1210,00";

    fn orchestrator(config: FactaConfig) -> ExtractionOrchestrator {
        let store = PatternStore::in_memory(config.patterns.clone());
        ExtractionOrchestrator::new(config, store)
    }

    fn dec(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn test_regex_scenario() {
        let record = orchestrator(FactaConfig::default())
            .process(&SourceDocument::new("factura.pdf", REGEX_INVOICE));

        assert_eq!(record.method, ExtractionMethod::Regex);
        assert_eq!(
            record.amounts,
            Amounts {
                taxed: dec(1000),
                tax: dec(210),
                total: dec(1210),
                ..Default::default()
            }
        );
        assert!(record.warnings.is_empty());
    }

    #[test]
    fn test_travel_scenario() {
        let record = orchestrator(FactaConfig::default())
            .process(&SourceDocument::new("pasajes.pdf", TRAVEL_INVOICE));

        assert_eq!(record.method, ExtractionMethod::SpecializedTravel);
        assert_eq!(record.amounts.exempt, dec(1500));
        assert_eq!(record.amounts.total, dec(1500));
        assert_eq!(record.currency, Currency::Usd);
    }

    #[test]
    fn test_ocr_text_preferred_when_enabled() {
        let doc = SourceDocument::new("scan.pdf", "")
            .with_ocr_text("GRAVAD0: 1 000,00\n1VA 21%: 210,00\nT0TAL: $ 1 210,00");

        let record = orchestrator(FactaConfig::default()).process(&doc);
        assert_eq!(record.method, ExtractionMethod::Ocr);
        assert_eq!(record.amounts.total, dec(1210));

        let mut config = FactaConfig::default();
        config.extraction.use_ocr_strategy = false;
        let record = orchestrator(config).process(&doc);
        assert_eq!(record.method, ExtractionMethod::Failed);
    }

    #[test]
    fn test_oversized_captures_degrade_to_failed() {
        let text = "Gravado: 50000000000000000000000000000\nIVA: 50000000000000000000000000000";
        let record = orchestrator(FactaConfig::default())
            .process(&SourceDocument::new("big.txt", text));
        assert_eq!(record.method, ExtractionMethod::Failed);
        assert!(record.amounts.is_zero());
    }

    #[test]
    fn test_failed_record_is_zeroed() {
        let record = orchestrator(FactaConfig::default())
            .process(&SourceDocument::new("remito.pdf", "Remito de entrega sin valorizar"));
        assert_eq!(record.method, ExtractionMethod::Failed);
        assert!(record.amounts.is_zero());
        assert_eq!(record.warnings[0], "no invoice data found");
    }

    #[test]
    fn test_missing_text_is_error_record() {
        let record = orchestrator(FactaConfig::default())
            .process(&SourceDocument::new("broken.pdf", "  \n").with_ocr_text(""));
        assert_eq!(record.method, ExtractionMethod::Error);
        assert_eq!(record.currency, Currency::Unknown);
        assert!(record.amounts.is_zero());
    }

    #[test]
    fn test_cache_hit_on_second_pass() {
        let orchestrator = orchestrator(FactaConfig::default());

        let first = orchestrator.process(&SourceDocument::new("a.pdf", LAYOUT));
        assert_eq!(first.method, ExtractionMethod::Regex);
        assert_eq!(orchestrator.lock_store().len(), 1);

        let second = orchestrator.process(&SourceDocument::new("b.pdf", LAYOUT));
        assert_eq!(second.method, ExtractionMethod::PatternCache);
        assert_eq!(second.source_name, "b.pdf");
        assert_eq!(second.amounts, first.amounts);
        assert_eq!(second.invoice_number.as_deref(), Some("0002-00000077"));
        assert_eq!(orchestrator.lock_store().len(), 1);
    }

    #[test]
    fn test_cache_hit_with_subtotal_line() {
        let layout = "Distribuidora Mayorista Patagónica\nDomicilio comercial Avenida Corrientes\n\
                      Factura N° 0002-00000078\nSubtotal: 1.000,00\nIVA 21%: 210,00\nTotal: 1.210,00";
        let orchestrator = orchestrator(FactaConfig::default());

        let first = orchestrator.process(&SourceDocument::new("a.pdf", layout));
        assert_eq!(first.amounts.total, dec(1210));

        let second = orchestrator.process(&SourceDocument::new("b.pdf", layout));
        assert_eq!(second.method, ExtractionMethod::PatternCache);
    }

    #[test]
    fn test_ignore_saved_patterns_still_learns() {
        let mut config = FactaConfig::default();
        config.extraction.ignore_saved_patterns = true;
        let orchestrator = orchestrator(config);

        orchestrator.process(&SourceDocument::new("a.pdf", LAYOUT));
        let second = orchestrator.process(&SourceDocument::new("b.pdf", LAYOUT));
        assert_eq!(second.method, ExtractionMethod::Regex);
        assert_eq!(orchestrator.lock_store().len(), 1);
    }

    #[test]
    fn test_pattern_matching_disabled() {
        let mut config = FactaConfig::default();
        config.extraction.use_pattern_matching = false;
        let orchestrator = orchestrator(config);

        orchestrator.process(&SourceDocument::new("a.pdf", LAYOUT));
        assert!(orchestrator.lock_store().is_empty());
    }

    #[test]
    fn test_default_issuer_tokens_force_currency() {
        let orchestrator = orchestrator(FactaConfig::default());

        let doc = SourceDocument::new("edenor-2024-05.pdf", "Price EUR 45.00\nTOTAL: 45,00");
        let record = orchestrator.process(&doc);
        assert_eq!(record.currency, Currency::Ars);

        let doc = SourceDocument::new("recibo.pdf", "GitHub, Inc.\nTOTAL: 21,00");
        let record = orchestrator.process(&doc);
        assert_eq!(record.currency, Currency::Usd);
    }

    #[test]
    fn test_currency_overrides() {
        let mut config = FactaConfig::default();
        config.currency.domestic_issuers = vec!["telecom".into()];
        config.currency.foreign_issuers = vec!["amazon web services".into()];
        let orchestrator = orchestrator(config);

        // Domestic issuer token in the file name forces pesos.
        let text = "Price EUR 45.00\nTOTAL: 45,00";
        let record = orchestrator.process(&SourceDocument::new("Telecom-2024-03.pdf", text));
        assert_eq!(record.currency, Currency::Ars);

        // Foreign issuer named in the text beats the domestic file name.
        let text = "Amazon Web Services, Inc.\nTOTAL: 45,00";
        let record = orchestrator.process(&SourceDocument::new("telecom.pdf", text));
        assert_eq!(record.currency, Currency::Usd);

        // Explicit USD phrasing.
        let text = "Importes en dólares\nTOTAL: 45,00";
        let record = orchestrator.process(&SourceDocument::new("x.pdf", text));
        assert_eq!(record.currency, Currency::Usd);

        // Domestic layout with no currency signal.
        let text = "FACTURA A\nCOD. 01\nTOTAL: 45,00";
        let record = orchestrator.process(&SourceDocument::new("y.pdf", text));
        assert_eq!(record.currency, Currency::Ars);
    }

    #[test]
    fn test_deduplicate() {
        let numbered = |name: &str, number: Option<&str>| {
            let mut record = InvoiceRecord::empty(name, ExtractionMethod::Regex);
            record.invoice_number = number.map(String::from);
            record
        };
        let records = vec![
            numbered("1.pdf", Some("A1")),
            numbered("2.pdf", Some("A1")),
            numbered("3.pdf", None),
            numbered("4.pdf", Some("A2")),
        ];

        let names: Vec<String> = deduplicate(records)
            .into_iter()
            .map(|r| r.source_name)
            .collect();
        assert_eq!(names, vec!["1.pdf", "4.pdf", "3.pdf"]);
    }

    #[test]
    fn test_unnumbered_records_are_never_merged() {
        let records = vec![
            InvoiceRecord::empty("a.pdf", ExtractionMethod::Failed),
            InvoiceRecord::empty("b.pdf", ExtractionMethod::Failed),
        ];
        assert_eq!(deduplicate(records).len(), 2);
    }

    #[test]
    fn test_orchestrator_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExtractionOrchestrator>();
    }
}
