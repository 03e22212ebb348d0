//! Line-oriented extractor for travel agency invoices.
//!
//! Travel layouts print every amount on its own labeled line, often with the
//! currency code between label and value (`TOTAL USD: 1.500,00`) and with
//! transport exemptions citing law 23871. The generic rule tables miss both.

use lazy_static::lazy_static;
use regex::Regex;

use super::reconcile::{has_nontaxable_phrase, Reconciler};
use super::rules::kind::DocumentKind;
use super::rules::numbers::amount_or_zero;
use super::rules::patterns::{AMOUNT_TOKEN, TEXT_RULES_TRAVEL};
use super::rules::table::Field;
use super::strategy::{amount_slot, finish, ExtractionStrategy};
use crate::error::ExtractionError;
use crate::models::config::ReconcileConfig;
use crate::models::record::{AmountSet, ExtractionMethod};

lazy_static! {
    // Checked in order; a line feeds the first field whose label it carries.
    static ref LINE_LABELS: Vec<(Field, Regex)> = vec![
        (Field::Untaxed, Regex::new(r"(?i)\bno\s+gravad").unwrap()),
        (Field::Exempt, Regex::new(r"(?i)exent|exempt|\b23\.?871\b").unwrap()),
        (Field::Taxed, Regex::new(r"(?i)gravad").unwrap()),
        (Field::Tax, Regex::new(r"(?i)\bi\.?v\.?a\b|\bvat\b").unwrap()),
        (Field::Total, Regex::new(r"(?i)\btotal\b").unwrap()),
    ];
}

/// Specialized extractor for the travel agency layout family.
#[derive(Debug, Clone, Default)]
pub struct TravelExtractor {
    reconciler: Reconciler,
}

impl TravelExtractor {
    pub fn new(config: ReconcileConfig) -> Self {
        Self {
            reconciler: Reconciler::new(config),
        }
    }

    fn scan_lines(&self, text: &str) -> AmountSet {
        let mut set = AmountSet {
            invoice_number: TEXT_RULES_TRAVEL
                .first_capture(Field::InvoiceNumber, text)
                .map(|c| c.value),
            date: TEXT_RULES_TRAVEL.first_capture(Field::Date, text).map(|c| c.value),
            ..Default::default()
        };
        let mut seen: Vec<Field> = Vec::new();

        for line in text.lines() {
            let Some(caps) = AMOUNT_TOKEN.captures_iter(line).last() else {
                continue;
            };
            let Some(field) = LINE_LABELS
                .iter()
                .find(|(_, label)| label.is_match(line))
                .map(|(field, _)| *field)
            else {
                continue;
            };
            if seen.contains(&field) {
                continue;
            }

            let amount = amount_or_zero(field.name(), &caps[1]);
            if let Some(slot) = amount_slot(&mut set.amounts, field) {
                *slot = amount;
                seen.push(field);
            }
        }
        set
    }
}

impl ExtractionStrategy for TravelExtractor {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::SpecializedTravel
    }

    fn extract(&self, text: &str, _kind: DocumentKind) -> Result<AmountSet, ExtractionError> {
        let set = self.scan_lines(text);
        finish(
            &self.reconciler,
            set,
            text,
            has_nontaxable_phrase(text),
            None,
            self.method(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::Amounts;
    use rust_decimal::Decimal;
    use pretty_assertions::assert_eq;

    fn extract(text: &str) -> Result<AmountSet, ExtractionError> {
        TravelExtractor::default().extract(text, DocumentKind::Travel)
    }

    #[test]
    fn test_transport_exemption() {
        let text = "TOTAL USD: 1.500,00\nSrvs de transporte exento s/ley 23871: 1.500,00";
        let set = extract(text).unwrap();
        assert_eq!(
            set.amounts,
            Amounts {
                exempt: Decimal::new(1500, 0),
                total: Decimal::new(1500, 0),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_mixed_lines() {
        let text = "Agencia de Viajes Sur\n\
                    Conceptos no gravados 1 200,00\n\
                    Servicios gravados 1.000,00\n\
                    IVA 21% 210,00\n\
                    Subtotal 1.410,00\n\
                    Total 1.410,00";
        let set = extract(text).unwrap();
        assert_eq!(set.amounts.untaxed, Decimal::new(200, 0));
        assert_eq!(set.amounts.taxed, Decimal::new(1000, 0));
        assert_eq!(set.amounts.tax, Decimal::new(210, 0));
        assert_eq!(set.amounts.total, Decimal::new(1410, 0));
    }

    #[test]
    fn test_first_line_per_field_wins() {
        let text = "Total 500,00\nTotal 900,00";
        assert_eq!(extract(text).unwrap().amounts.total, Decimal::new(500, 0));
    }

    #[test]
    fn test_no_amounts() {
        assert_eq!(
            extract("Itinerario: EZE - MAD"),
            Err(ExtractionError::NoTotal {
                strategy: "specialized_travel".to_string()
            })
        );
    }
}
