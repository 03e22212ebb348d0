//! Currency-grouped summary of resolved records.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::record::{Amounts, Currency, InvoiceRecord};

/// Records of one currency and their subtotal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyGroup<'a> {
    pub currency: Currency,
    pub records: Vec<&'a InvoiceRecord>,
    pub subtotal: Amounts,
}

/// Records grouped by currency, in report order, with a global total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report<'a> {
    pub groups: Vec<CurrencyGroup<'a>>,
    /// Sum over every record regardless of currency.
    pub total: Amounts,
}

impl<'a> Report<'a> {
    /// Group records by currency. Empty groups are omitted; input order is
    /// kept within a group.
    pub fn build(records: &'a [InvoiceRecord]) -> Self {
        let groups: Vec<CurrencyGroup<'a>> = Currency::ALL
            .iter()
            .filter_map(|currency| {
                let records: Vec<&InvoiceRecord> =
                    records.iter().filter(|r| r.currency == *currency).collect();
                if records.is_empty() {
                    return None;
                }
                let subtotal = sum(records.iter().copied());
                Some(CurrencyGroup {
                    currency: *currency,
                    records,
                    subtotal,
                })
            })
            .collect();

        Report {
            total: sum(records.iter()),
            groups,
        }
    }
}

fn sum<'r>(records: impl Iterator<Item = &'r InvoiceRecord>) -> Amounts {
    records.fold(Amounts::default(), |acc, r| Amounts {
        untaxed: acc.untaxed.saturating_add(r.amounts.untaxed),
        exempt: acc.exempt.saturating_add(r.amounts.exempt),
        taxed: acc.taxed.saturating_add(r.amounts.taxed),
        tax: acc.tax.saturating_add(r.amounts.tax),
        total: acc.total.saturating_add(r.amounts.total),
    })
}

/// Rounded copy of an amount set for display.
pub fn rounded(amounts: &Amounts) -> Amounts {
    let round = |d: Decimal| d.round_dp(2);
    Amounts {
        untaxed: round(amounts.untaxed),
        exempt: round(amounts.exempt),
        taxed: round(amounts.taxed),
        tax: round(amounts.tax),
        total: round(amounts.total),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::ExtractionMethod;
    use pretty_assertions::assert_eq;

    fn record(name: &str, currency: Currency, total: i64) -> InvoiceRecord {
        let mut record = InvoiceRecord::empty(name, ExtractionMethod::Regex);
        record.currency = currency;
        record.amounts.taxed = Decimal::new(total, 0);
        record.amounts.total = Decimal::new(total, 0);
        record
    }

    #[test]
    fn test_groups_follow_currency_order() {
        let records = vec![
            record("u1", Currency::Usd, 100),
            record("a1", Currency::Ars, 1000),
            record("u2", Currency::Usd, 50),
            record("x1", Currency::Unknown, 7),
        ];
        let report = Report::build(&records);

        let currencies: Vec<Currency> = report.groups.iter().map(|g| g.currency).collect();
        assert_eq!(currencies, vec![Currency::Ars, Currency::Usd, Currency::Unknown]);

        let usd = &report.groups[1];
        let names: Vec<&str> = usd.records.iter().map(|r| r.source_name.as_str()).collect();
        assert_eq!(names, vec!["u1", "u2"]);
        assert_eq!(usd.subtotal.total, Decimal::new(150, 0));

        assert_eq!(report.total.total, Decimal::new(1157, 0));
        let grouped: usize = report.groups.iter().map(|g| g.records.len()).sum();
        assert_eq!(grouped, 4);
    }

    #[test]
    fn test_sums_saturate() {
        let mut big = record("a", Currency::Ars, 0);
        big.amounts.total = Decimal::MAX;
        let records = vec![big.clone(), big];
        let report = Report::build(&records);
        assert_eq!(report.total.total, Decimal::MAX);
    }

    #[test]
    fn test_empty_report() {
        let report = Report::build(&[]);
        assert!(report.groups.is_empty());
        assert_eq!(report.total, Amounts::default());
    }

    #[test]
    fn test_rounded() {
        let amounts = Amounts {
            total: Decimal::new(1234567, 4),
            ..Default::default()
        };
        assert_eq!(rounded(&amounts).total, Decimal::new(12346, 2));
    }
}
