//! Rule-table extraction strategies.

use rust_decimal::Decimal;
use tracing::debug;

use super::reconcile::{capture_near_phrase, has_nontaxable_phrase, ReconcileInput, Reconciler};
use super::rules::kind::DocumentKind;
use super::rules::numbers::amount_or_zero;
use super::rules::patterns::{
    ANY_TOTAL, OCR_RULES, OCR_RULES_TRAVEL, TEXT_RULES, TEXT_RULES_TRAVEL,
};
use super::rules::table::{Field, RuleTable};
use crate::error::ExtractionError;
use crate::models::config::ReconcileConfig;
use crate::models::record::{AmountSet, Amounts, ExtractionMethod};

/// One stage of the extraction cascade.
pub trait ExtractionStrategy: Send + Sync {
    /// Provenance tag for records produced by this strategy.
    fn method(&self) -> ExtractionMethod;

    /// Extract and reconcile the fields of one document.
    ///
    /// Fails with [`ExtractionError::NoTotal`] when no positive total could
    /// be established.
    fn extract(&self, text: &str, kind: DocumentKind) -> Result<AmountSet, ExtractionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Ocr,
    Text,
}

/// Strategy driven by a [`RuleTable`]: loose rules for OCR text, strict rules
/// for decoded text.
#[derive(Debug, Clone)]
pub struct RuleStrategy {
    flavor: Flavor,
    reconciler: Reconciler,
}

impl RuleStrategy {
    /// OCR-tolerant strategy.
    pub fn ocr(config: ReconcileConfig) -> Self {
        Self {
            flavor: Flavor::Ocr,
            reconciler: Reconciler::new(config),
        }
    }

    /// Strict strategy for decoded PDF text.
    pub fn text(config: ReconcileConfig) -> Self {
        Self {
            flavor: Flavor::Text,
            reconciler: Reconciler::new(config),
        }
    }

    fn table(&self, kind: DocumentKind) -> &'static RuleTable {
        match (self.flavor, kind) {
            (Flavor::Ocr, DocumentKind::Travel) => &OCR_RULES_TRAVEL,
            (Flavor::Ocr, _) => &OCR_RULES,
            (Flavor::Text, DocumentKind::Travel) => &TEXT_RULES_TRAVEL,
            (Flavor::Text, _) => &TEXT_RULES,
        }
    }

    /// Raw captures for every field, before reconciliation.
    pub fn capture(&self, text: &str, kind: DocumentKind) -> AmountSet {
        let table = self.table(kind);
        let mut set = AmountSet {
            invoice_number: table.first_capture(Field::InvoiceNumber, text).map(|c| c.value),
            date: table.first_capture(Field::Date, text).map(|c| c.value),
            ..Default::default()
        };

        for field in Field::ALL.into_iter().filter(Field::is_amount) {
            let Some(capture) = table.first_capture(field, text) else {
                continue;
            };
            let amount = amount_or_zero(field.name(), &capture.value);
            if let Some(slot) = amount_slot(&mut set.amounts, field) {
                *slot = amount;
            }
        }
        set
    }
}

impl ExtractionStrategy for RuleStrategy {
    fn method(&self) -> ExtractionMethod {
        match self.flavor {
            Flavor::Ocr => ExtractionMethod::Ocr,
            Flavor::Text => ExtractionMethod::Regex,
        }
    }

    fn extract(&self, text: &str, kind: DocumentKind) -> Result<AmountSet, ExtractionError> {
        let mut set = self.capture(text, kind);

        let has_phrase = has_nontaxable_phrase(text);
        if set.amounts.untaxed.is_zero() && has_phrase {
            if let Some(untaxed) = capture_near_phrase(text) {
                debug!("untaxed {} captured near non-taxable phrase", untaxed);
                set.amounts.untaxed = untaxed;
            }
        }

        // Travel totals are left to the specialized extractor.
        let other_total = match kind {
            DocumentKind::Travel => None,
            _ => scan_total(text),
        };

        finish(&self.reconciler, set, text, has_phrase, other_total, self.method())
    }
}

/// Reconcile a raw capture and require a positive total.
pub(crate) fn finish(
    reconciler: &Reconciler,
    mut set: AmountSet,
    text: &str,
    has_phrase: bool,
    other_total: Option<Decimal>,
    method: ExtractionMethod,
) -> Result<AmountSet, ExtractionError> {
    let reconciled = reconciler.reconcile(&ReconcileInput {
        amounts: set.amounts,
        has_nontaxable_phrase: has_phrase,
        other_total,
        raw_text: text,
    });
    if reconciled.adjusted {
        debug!("{}: reconciliation adjusted amounts to {:?}", method, reconciled.amounts);
    }

    set.amounts = reconciled.amounts;
    set.warnings.extend(reconciled.warnings);

    if set.amounts.total > Decimal::ZERO {
        Ok(set)
    } else {
        Err(ExtractionError::NoTotal {
            strategy: method.to_string(),
        })
    }
}

/// Last positive amount on a line naming a total, labeled or not.
pub fn scan_total(text: &str) -> Option<Decimal> {
    ANY_TOTAL
        .captures_iter(text)
        .map(|caps| amount_or_zero("total", &caps[1]))
        .filter(|total| *total > Decimal::ZERO)
        .last()
}

pub(crate) fn amount_slot(amounts: &mut Amounts, field: Field) -> Option<&mut Decimal> {
    match field {
        Field::Untaxed => Some(&mut amounts.untaxed),
        Field::Exempt => Some(&mut amounts.exempt),
        Field::Taxed => Some(&mut amounts.taxed),
        Field::Tax => Some(&mut amounts.tax),
        Field::Total => Some(&mut amounts.total),
        Field::InvoiceNumber | Field::Date => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(v: i64, scale: u32) -> Decimal {
        Decimal::new(v, scale)
    }

    #[test]
    fn test_text_strategy_basic_invoice() {
        let text = "FACTURA N° 0003-00001234\nFecha: 15/03/2024\n\
                    Gravado: 1000,00\nIVA 21%: 210,00\nTOTAL: 1210,00";
        let strategy = RuleStrategy::text(ReconcileConfig::default());
        let set = strategy.extract(text, DocumentKind::Generic).unwrap();

        assert_eq!(set.invoice_number.as_deref(), Some("0003-00001234"));
        assert_eq!(set.date.as_deref(), Some("15/03/2024"));
        assert_eq!(
            set.amounts,
            Amounts {
                taxed: dec(1000, 0),
                tax: dec(210, 0),
                total: dec(1210, 0),
                ..Default::default()
            }
        );
        assert!(set.warnings.is_empty());
        assert_eq!(strategy.method(), ExtractionMethod::Regex);
    }

    #[test]
    fn test_phrase_search_fills_untaxed() {
        let text = "Gravado: 1000,00\nIVA 21%: 210,00\n\
                    Otros conceptos no gravados: 40,00\nTOTAL: 1250,00";
        let set = RuleStrategy::text(ReconcileConfig::default())
            .extract(text, DocumentKind::Generic)
            .unwrap();
        assert_eq!(set.amounts.untaxed, dec(40, 0));
        assert_eq!(set.amounts.total, dec(1250, 0));
    }

    #[test]
    fn test_unlabeled_total_scan() {
        // No labeled total rule matches, but a "total" line carries an amount.
        let text = "Total de la operación con IVA 21% incluido 1.210,00";
        let set = RuleStrategy::text(ReconcileConfig::default())
            .extract(text, DocumentKind::Generic)
            .unwrap();
        assert_eq!(set.amounts.total, dec(1210, 0));
        assert_eq!(set.amounts.taxed, dec(1000, 0));
        assert_eq!(set.amounts.tax, dec(210, 0));
    }

    #[test]
    fn test_travel_kind_skips_currency_total() {
        let text = "TOTAL USD: 1.500,00";
        let strategy = RuleStrategy::text(ReconcileConfig::default());
        assert_eq!(
            strategy.extract(text, DocumentKind::Travel),
            Err(ExtractionError::NoTotal {
                strategy: "regex".to_string()
            })
        );
        let set = strategy.extract(text, DocumentKind::Generic).unwrap();
        assert_eq!(set.amounts.total, dec(1500, 0));
    }

    #[test]
    fn test_ocr_strategy_reads_noisy_text() {
        let text = "GRAVAD0: 1 000,00\n1VA 21%: 210,00\nT0TAL: $ 1 210,00";
        let strategy = RuleStrategy::ocr(ReconcileConfig::default());
        let set = strategy.extract(text, DocumentKind::Generic).unwrap();
        assert_eq!(set.amounts.taxed, dec(1000, 0));
        assert_eq!(set.amounts.total, dec(1210, 0));
        assert_eq!(strategy.method(), ExtractionMethod::Ocr);
    }

    #[test]
    fn test_no_total_is_an_error() {
        let strategy = RuleStrategy::text(ReconcileConfig::default());
        assert!(strategy.extract("Remito sin importes", DocumentKind::Generic).is_err());
    }

    #[test]
    fn test_scan_total() {
        assert_eq!(scan_total("Total a pagar en pesos 350,00"), Some(dec(350, 0)));
        assert_eq!(scan_total("Sin importes"), None);
    }

    #[test]
    fn test_scan_total_skips_subtotal_lines() {
        let text = "Subtotal: 1.000,00\nIVA 21%: 210,00\nTotal: 1.210,00";
        assert_eq!(scan_total(text), Some(dec(1210, 0)));
        assert_eq!(scan_total("Subtotal: 1.000,00"), None);
        // The last positive total line wins over an earlier partial one.
        let text = "Total gravado 1.000,00\nTOTAL A PAGAR 1.210,00\nTotal percepciones 0,00";
        assert_eq!(scan_total(text), Some(dec(1210, 0)));
    }
}
