//! Record formatting and the currency-grouped CSV report.

use std::path::Path;

use rust_decimal::Decimal;

use facta_core::invoice::rules::numbers::format_amount;
use facta_core::models::record::{Amounts, InvoiceRecord};
use facta_core::report::{rounded, Report};

/// Output format for single records.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

const RECORD_HEADER: [&str; 11] = [
    "label",
    "source",
    "invoice_number",
    "date",
    "untaxed",
    "exempt",
    "taxed",
    "tax",
    "total",
    "currency",
    "method",
];

fn amount(d: Decimal) -> String {
    format!("{:.2}", d.round_dp(2))
}

fn amount_cells(amounts: &Amounts) -> [String; 5] {
    [
        amount(amounts.untaxed),
        amount(amounts.exempt),
        amount(amounts.taxed),
        amount(amounts.tax),
        amount(amounts.total),
    ]
}

fn record_row(record: &InvoiceRecord) -> Vec<String> {
    let mut row = vec![
        record.label(),
        record.source_name.clone(),
        record.invoice_number.clone().unwrap_or_default(),
        record.date.clone().unwrap_or_default(),
    ];
    row.extend(amount_cells(&record.amounts));
    row.push(record.currency.code().to_string());
    row.push(record.method.as_str().to_string());
    row
}

fn summary_row(label: String, amounts: &Amounts, currency: &str) -> Vec<String> {
    let mut row = vec![label, String::new(), String::new(), String::new()];
    row.extend(amount_cells(amounts));
    row.push(currency.to_string());
    row.push(String::new());
    row
}

pub fn format_record(record: &InvoiceRecord, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(vec![]);
            wtr.write_record(RECORD_HEADER)?;
            wtr.write_record(record_row(record))?;
            Ok(String::from_utf8(wtr.into_inner()?)?)
        }
        OutputFormat::Text => Ok(format_text(record)),
    }
}

fn format_text(record: &InvoiceRecord) -> String {
    let mut output = String::new();
    let amounts = rounded(&record.amounts);
    let currency = record.currency.code();

    output.push_str(&format!("Invoice: {}\n", record.invoice_number.as_deref().unwrap_or("-")));
    output.push_str(&format!("Date: {}\n", record.date.as_deref().unwrap_or("-")));
    output.push_str(&format!("Source: {} ({})\n", record.source_name, record.method));
    output.push('\n');

    output.push_str("Amounts:\n");
    output.push_str(&format!("  No gravado: {} {}\n", format_amount(amounts.untaxed), currency));
    output.push_str(&format!("  Exento:     {} {}\n", format_amount(amounts.exempt), currency));
    output.push_str(&format!("  Gravado:    {} {}\n", format_amount(amounts.taxed), currency));
    output.push_str(&format!("  IVA:        {} {}\n", format_amount(amounts.tax), currency));
    output.push_str(&format!("  Total:      {} {}\n", format_amount(amounts.total), currency));

    if !record.warnings.is_empty() {
        output.push_str("\nWarnings:\n");
        for warning in &record.warnings {
            output.push_str(&format!("  - {}\n", warning));
        }
    }
    output
}

/// Write records grouped by currency, each group followed by its subtotal,
/// then a global total row.
pub fn write_report(path: &Path, records: &[InvoiceRecord]) -> anyhow::Result<()> {
    let report = Report::build(records);
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(RECORD_HEADER)?;
    for group in &report.groups {
        for record in &group.records {
            wtr.write_record(record_row(record))?;
        }
        let code = group.currency.code();
        wtr.write_record(summary_row(format!("SUBTOTAL {}", code), &group.subtotal, code))?;
    }
    wtr.write_record(summary_row("TOTAL".to_string(), &report.total, ""))?;

    wtr.flush()?;
    Ok(())
}
