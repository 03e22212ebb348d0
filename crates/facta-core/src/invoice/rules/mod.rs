//! Rule-based field extraction for Spanish/English invoices.

pub mod currency;
pub mod kind;
pub mod numbers;
pub mod patterns;
pub mod table;

pub use currency::classify_currency;
pub use kind::{classify_kind, DocumentKind};
pub use numbers::{amount_or_zero, format_amount, parse_amount};
pub use table::{Capture, Field, FieldRule, RuleTable};
