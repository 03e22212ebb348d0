//! Layout family classification by keyword presence.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Known invoice layout families.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Travel agency invoices (tickets, transport exemptions).
    Travel,
    /// Electronic invoices authorized by the tax authority (CAE).
    ElectronicTaxAuthority,
    /// Type A invoices (code 01).
    TypeA,
    /// Type B invoices (code 06).
    TypeB,
    #[default]
    Generic,
}

impl DocumentKind {
    /// Whether the layout implies a domestic (peso) invoice.
    pub fn is_domestic(&self) -> bool {
        matches!(
            self,
            DocumentKind::ElectronicTaxAuthority | DocumentKind::TypeA | DocumentKind::TypeB
        )
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::Travel => "travel",
            DocumentKind::ElectronicTaxAuthority => "electronic_tax_authority",
            DocumentKind::TypeA => "type_a",
            DocumentKind::TypeB => "type_b",
            DocumentKind::Generic => "generic",
        };
        f.write_str(name)
    }
}

lazy_static! {
    static ref KIND_RULES: Vec<(DocumentKind, Vec<Regex>)> = vec![
        (
            DocumentKind::Travel,
            keywords(&[
                r"agencia\s+de\s+(?:viajes|turismo)",
                r"travel\s+agency",
                r"\bpasajer[oa]s?\b",
                r"\bpassengers?\b",
                r"\bitinerar(?:io|y)\b",
                r"ley\s+23\.?871",
                r"\b(?:boleto|ticket|pasaje)s?\s+a[eé]reos?\b",
            ]),
        ),
        (
            DocumentKind::ElectronicTaxAuthority,
            keywords(&[
                r"\bC\.?A\.?E\.?\s*(?:N[°ºo]\.?|nro\.?)?\s*:?\s*\d{14}",
                r"\bCAE\b",
                r"\bAFIP\b",
                r"\bARCA\b",
                r"comprobante\s+autorizado",
            ]),
        ),
        (
            DocumentKind::TypeA,
            keywords(&[
                r"\bfactura\s+A\b",
                r"\bc[oó]d(?:igo)?\.?\s*(?:N[°ºo]\.?)?\s*0?1\b",
            ]),
        ),
        (
            DocumentKind::TypeB,
            keywords(&[
                r"\bfactura\s+B\b",
                r"\bc[oó]d(?:igo)?\.?\s*(?:N[°ºo]\.?)?\s*0?6\b",
            ]),
        ),
    ];
}

fn keywords(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
        .collect()
}

/// Bucket a document into a layout family.
///
/// Travel terms are checked first, then electronic-invoice markers, then the
/// type code markers. The first family with any keyword present wins.
pub fn classify_kind(text: &str) -> DocumentKind {
    KIND_RULES
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(text)))
        .map(|(kind, _)| *kind)
        .unwrap_or_default()
}
