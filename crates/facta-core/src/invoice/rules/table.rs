//! Ordered capture rules per logical field.
//!
//! A [`RuleTable`] holds, for every [`Field`], an ordered list of patterns.
//! The first pattern that matches is the value of the field; later patterns
//! are never consulted, and fields never influence each other.

use std::fmt;

use regex::Regex;
use tracing::trace;

/// Logical invoice field targeted by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    InvoiceNumber,
    Date,
    Untaxed,
    Exempt,
    Taxed,
    Tax,
    Total,
}

impl Field {
    /// Every field, in extraction order.
    pub const ALL: [Field; 7] = [
        Field::InvoiceNumber,
        Field::Date,
        Field::Untaxed,
        Field::Exempt,
        Field::Taxed,
        Field::Tax,
        Field::Total,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Field::InvoiceNumber => "invoice_number",
            Field::Date => "date",
            Field::Untaxed => "untaxed",
            Field::Exempt => "exempt",
            Field::Taxed => "taxed",
            Field::Tax => "tax",
            Field::Total => "total",
        }
    }

    pub fn is_amount(&self) -> bool {
        !matches!(self, Field::InvoiceNumber | Field::Date)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One pattern plus the capture groups that form the value.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pattern: Regex,
    groups: Vec<usize>,
    joiner: &'static str,
}

impl FieldRule {
    /// Rule whose value is capture group 1.
    pub fn new(pattern: Regex) -> Self {
        Self {
            pattern,
            groups: vec![1],
            joiner: "",
        }
    }

    /// Rule whose value joins several capture groups.
    pub fn joined(pattern: Regex, groups: &[usize], joiner: &'static str) -> Self {
        Self {
            pattern,
            groups: groups.to_vec(),
            joiner,
        }
    }

    /// Apply the rule, returning the trimmed value of its groups.
    pub fn capture(&self, text: &str) -> Option<String> {
        let caps = self.pattern.captures(text)?;
        let parts: Vec<&str> = self
            .groups
            .iter()
            .filter_map(|&g| caps.get(g))
            .map(|m| m.as_str().trim())
            .collect();

        if parts.len() != self.groups.len() || parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        Some(parts.join(self.joiner))
    }
}

/// A successful capture and the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub field: Field,
    /// Position of the winning rule in the field's list.
    pub rule_index: usize,
    pub value: String,
}

/// Field → ordered rules.
#[derive(Debug, Clone)]
pub struct RuleTable {
    name: &'static str,
    rules: Vec<(Field, Vec<FieldRule>)>,
}

impl RuleTable {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rules: Vec::new(),
        }
    }

    /// Append rules for a field, after any rules it already has.
    pub fn with(mut self, field: Field, rules: Vec<FieldRule>) -> Self {
        match self.rules.iter_mut().find(|(f, _)| *f == field) {
            Some((_, existing)) => existing.extend(rules),
            None => self.rules.push((field, rules)),
        }
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Rules for a field, in priority order.
    pub fn rules(&self, field: Field) -> &[FieldRule] {
        self.rules
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, rules)| rules.as_slice())
            .unwrap_or(&[])
    }

    /// First successful capture for a field.
    pub fn first_capture(&self, field: Field, text: &str) -> Option<Capture> {
        self.rules(field)
            .iter()
            .enumerate()
            .find_map(|(rule_index, rule)| {
                rule.capture(text).map(|value| Capture {
                    field,
                    rule_index,
                    value,
                })
            })
            .inspect(|c| trace!("{}: {} matched rule #{} -> {:?}", self.name, field, c.rule_index, c.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RuleTable {
        RuleTable::new("test")
            .with(
                Field::Total,
                vec![
                    FieldRule::new(Regex::new(r"TOTAL:\s*(\d+)").unwrap()),
                    FieldRule::new(Regex::new(r"Total\s+(\d+)").unwrap()),
                ],
            )
            .with(
                Field::InvoiceNumber,
                vec![FieldRule::joined(
                    Regex::new(r"PV\s*(\d+)\s+Nro\s*(\d+)").unwrap(),
                    &[1, 2],
                    "-",
                )],
            )
    }

    #[test]
    fn test_first_rule_wins_even_if_later_rule_matches_earlier_text() {
        let text = "Total 10\nTOTAL: 20";
        let capture = table().first_capture(Field::Total, text).unwrap();
        assert_eq!(capture.value, "20");
        assert_eq!(capture.rule_index, 0);
    }

    #[test]
    fn test_later_rule_used_when_earlier_rules_fail() {
        let capture = table().first_capture(Field::Total, "Total 10").unwrap();
        assert_eq!(capture.value, "10");
        assert_eq!(capture.rule_index, 1);
    }

    #[test]
    fn test_joined_groups() {
        let capture = table()
            .first_capture(Field::InvoiceNumber, "PV 0003 Nro 00001234")
            .unwrap();
        assert_eq!(capture.value, "0003-00001234");
    }

    #[test]
    fn test_field_without_rules() {
        assert!(table().rules(Field::Tax).is_empty());
        assert!(table().first_capture(Field::Tax, "IVA 21").is_none());
    }

    #[test]
    fn test_with_appends_to_existing_field() {
        let table = table().with(
            Field::Total,
            vec![FieldRule::new(Regex::new(r"Importe\s+(\d+)").unwrap())],
        );
        assert_eq!(table.rules(Field::Total).len(), 3);
    }
}
