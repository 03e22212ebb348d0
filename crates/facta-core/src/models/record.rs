//! Resolved invoice record and its amount set.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;
use crate::invoice::rules::numbers::parse_amount;

/// Currency an invoice is expressed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Argentine peso, the local default.
    Ars,
    /// US dollar.
    Usd,
    /// Euro.
    Eur,
    /// No currency signal found.
    #[default]
    Unknown,
}

impl Currency {
    /// All currencies in report order.
    pub const ALL: [Currency; 4] = [Currency::Ars, Currency::Usd, Currency::Eur, Currency::Unknown];

    /// ISO-like code used in reports.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Ars => "ARS",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Unknown => "UNKNOWN",
        }
    }
}

impl FromStr for Currency {
    type Err = ExtractionError;

    /// Parse a currency code or common token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ARS" | "PESOS" | "$" => Ok(Currency::Ars),
            "USD" | "U$S" | "US$" | "DOLARES" | "DÓLARES" => Ok(Currency::Usd),
            "EUR" | "€" | "EUROS" => Ok(Currency::Eur),
            "UNKNOWN" | "" => Ok(Currency::Unknown),
            _ => Err(ExtractionError::Parse {
                field: "currency".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Provenance of a record: which strategy produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Reused from the pattern store.
    PatternCache,
    /// Loose rule table over OCR text.
    Ocr,
    /// Strict rule table over decoded text.
    Regex,
    /// Travel agency layout extractor.
    SpecializedTravel,
    /// Every strategy was exhausted.
    Failed,
    /// The document text could not be obtained.
    Error,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::PatternCache => "pattern_cache",
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::Regex => "regex",
            ExtractionMethod::SpecializedTravel => "specialized_travel",
            ExtractionMethod::Failed => "failed",
            ExtractionMethod::Error => "error",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five fiscal amounts of an invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amounts {
    /// Amount excluded from tax computation (no gravado).
    pub untaxed: Decimal,
    /// Amount legally exempt from the tax (exento).
    pub exempt: Decimal,
    /// Net base subject to tax (gravado).
    pub taxed: Decimal,
    /// Tax amount (IVA).
    pub tax: Decimal,
    /// Invoice total.
    pub total: Decimal,
}

impl Amounts {
    /// Sum of the four components, saturating instead of overflowing.
    pub fn component_sum(&self) -> Decimal {
        self.untaxed
            .saturating_add(self.exempt)
            .saturating_add(self.taxed)
            .saturating_add(self.tax)
    }

    /// Floor every amount at zero.
    pub fn clamped(self) -> Self {
        Self {
            untaxed: self.untaxed.max(Decimal::ZERO),
            exempt: self.exempt.max(Decimal::ZERO),
            taxed: self.taxed.max(Decimal::ZERO),
            tax: self.tax.max(Decimal::ZERO),
            total: self.total.max(Decimal::ZERO),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.total.is_zero() && self.component_sum().is_zero()
    }
}

/// Fields produced by one extraction strategy, before currency and
/// provenance are attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmountSet {
    pub invoice_number: Option<String>,
    pub date: Option<String>,
    pub amounts: Amounts,
    pub warnings: Vec<String>,
}

impl AmountSet {
    /// Attach provenance and produce a record.
    pub fn into_record(
        self,
        source_name: impl Into<String>,
        currency: Currency,
        method: ExtractionMethod,
    ) -> InvoiceRecord {
        InvoiceRecord {
            source_name: source_name.into(),
            invoice_number: self.invoice_number,
            date: self.date,
            amounts: self.amounts.clamped(),
            currency,
            method,
            warnings: self.warnings,
        }
    }
}

/// One resolved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Display name of the input document.
    pub source_name: String,

    /// Invoice number, when one was captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,

    /// Invoice date, free form as printed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(flatten)]
    pub amounts: Amounts,

    pub currency: Currency,

    pub method: ExtractionMethod,

    /// Soft-invariant violations and degradations seen while resolving.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl InvoiceRecord {
    /// A zeroed record with no captured fields.
    pub fn empty(source_name: impl Into<String>, method: ExtractionMethod) -> Self {
        Self {
            source_name: source_name.into(),
            invoice_number: None,
            date: None,
            amounts: Amounts::default(),
            currency: Currency::Unknown,
            method,
            warnings: Vec::new(),
        }
    }

    /// Invoice number normalized for grouping; blank numbers count as absent.
    pub fn dedup_key(&self) -> Option<&str> {
        self.invoice_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }

    /// Display label: invoice number, or the file stem limited to 31 characters.
    pub fn label(&self) -> String {
        if let Some(number) = self.dedup_key() {
            return number.to_string();
        }
        let stem = std::path::Path::new(&self.source_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.source_name);
        stem.chars().take(31).collect()
    }

    /// Apply a manual override of one field.
    pub fn apply_override(&mut self, field: &str, value: &str) -> Result<(), ExtractionError> {
        let invalid = |reason: &str| ExtractionError::Override {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        match field {
            "invoice_number" => {
                self.invoice_number = Some(value.trim().to_string()).filter(|v| !v.is_empty());
            }
            "date" => {
                self.date = Some(value.trim().to_string()).filter(|v| !v.is_empty());
            }
            "currency" => {
                self.currency = value.parse().map_err(|_| invalid("unknown currency"))?;
            }
            "untaxed" | "exempt" | "taxed" | "tax" | "total" => {
                // The amount parser drops signs along with other noise.
                if value.trim_start().starts_with('-') {
                    return Err(invalid("amount must not be negative"));
                }
                let amount = parse_amount(field, value)?;
                let slot = match field {
                    "untaxed" => &mut self.amounts.untaxed,
                    "exempt" => &mut self.amounts.exempt,
                    "taxed" => &mut self.amounts.taxed,
                    "tax" => &mut self.amounts.tax,
                    _ => &mut self.amounts.total,
                };
                *slot = amount;
            }
            _ => return Err(invalid("unknown field")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_currency_parsing() {
        assert_eq!("usd".parse::<Currency>(), Ok(Currency::Usd));
        assert_eq!("U$S".parse::<Currency>(), Ok(Currency::Usd));
        assert_eq!("€".parse::<Currency>(), Ok(Currency::Eur));
        assert_eq!(" ars ".parse::<Currency>(), Ok(Currency::Ars));
        assert!(matches!(
            "yen".parse::<Currency>(),
            Err(ExtractionError::Parse { .. })
        ));
    }

    #[test]
    fn test_currency_serializes_as_code() {
        assert_eq!(serde_json::to_string(&Currency::Usd).unwrap(), "\"USD\"");
        assert_eq!(serde_json::to_string(&Currency::Unknown).unwrap(), "\"UNKNOWN\"");
    }

    #[test]
    fn test_clamped_floors_negative_amounts() {
        let amounts = Amounts {
            untaxed: Decimal::new(-5, 0),
            total: Decimal::new(10, 0),
            ..Default::default()
        }
        .clamped();
        assert_eq!(amounts.untaxed, Decimal::ZERO);
        assert_eq!(amounts.total, Decimal::new(10, 0));
    }

    #[test]
    fn test_apply_override() {
        let mut record = InvoiceRecord::empty("a.pdf", ExtractionMethod::Regex);
        record.apply_override("total", "1.210,50").unwrap();
        record.apply_override("currency", "USD").unwrap();
        record.apply_override("invoice_number", " 0001-00000042 ").unwrap();

        assert_eq!(record.amounts.total, Decimal::new(121050, 2));
        assert_eq!(record.currency, Currency::Usd);
        assert_eq!(record.invoice_number.as_deref(), Some("0001-00000042"));

        assert!(record.apply_override("total", "abc").is_err());
        assert!(record.apply_override("vendor", "x").is_err());
        assert!(record.apply_override("currency", "yen").is_err());
    }

    #[test]
    fn test_negative_override_is_rejected() {
        let mut record = InvoiceRecord::empty("a.pdf", ExtractionMethod::Regex);
        record.apply_override("total", "100").unwrap();

        let err = record.apply_override("total", "-100").unwrap_err();
        assert!(matches!(err, ExtractionError::Override { .. }));
        assert!(record.apply_override("tax", " -1,50").is_err());
        assert_eq!(record.amounts.total, Decimal::new(100, 0));
    }

    #[test]
    fn test_label_falls_back_to_file_stem() {
        let record = InvoiceRecord::empty(
            "dir/a-very-long-file-name-that-exceeds-the-sheet-limit.pdf",
            ExtractionMethod::Failed,
        );
        assert_eq!(record.label().chars().count(), 31);
        assert!(record.label().starts_with("a-very-long"));
    }
}
