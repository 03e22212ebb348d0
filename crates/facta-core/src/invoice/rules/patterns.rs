//! Regex patterns and rule tables for Spanish/English invoice extraction.

use lazy_static::lazy_static;
use regex::Regex;

use super::table::{Field, FieldRule, RuleTable};

/// Numeric capture, not followed by `%` or another digit group.
pub const AMOUNT: &str = r"(\d[\d.,]*\d|\d)(?:[^%\d.,]|[.,](?:\D|$)|$)";

/// Numeric capture tolerating space thousands separators (`1 500,00`).
pub const LOOSE_AMOUNT: &str =
    r"(\d{1,3}(?: \d{3})+(?:[.,]\d{1,2})?|\d[\d.,]*\d|\d)(?:[^%\d.,]|[.,](?:\D|$)|$)";

/// Label to value separator for decoded text.
const SEP: &str = r"\s*[:.]?\s*(?:\$|ARS)?\s*";

/// Label to value separator for OCR text: stray punctuation, `$` read as `S`.
const LOOSE_SEP: &str = r"[\s:;.,_-]*(?:\$|S|ARS)?[\s:;]*";

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

fn rule(pattern: &str) -> FieldRule {
    FieldRule::new(regex(pattern))
}

/// Rule for `<label><separator><amount>`.
fn amount_rule(label: &str) -> FieldRule {
    rule(&format!("{}{}{}", label, SEP, AMOUNT))
}

fn loose_amount_rule(label: &str) -> FieldRule {
    rule(&format!("{}{}{}", label, LOOSE_SEP, LOOSE_AMOUNT))
}

fn text_table(name: &'static str) -> RuleTable {
    RuleTable::new(name)
        .with(
            Field::InvoiceNumber,
            vec![
                FieldRule::joined(
                    regex(r"(?i)punto\s+de\s+venta\s*:?\s*(\d{1,5})\s+comp\.?\s*nro\.?\s*:?\s*(\d{1,8})"),
                    &[1, 2],
                    "-",
                ),
                rule(r"(?i)(?:factura|invoice|comprobante)\s*(?:[A-C]\s+)?(?:n[°ºo]\.?|nro\.?|n[uú]mero|number|no\.|#)\s*:?\s*(\d{4,5}-\d{8})"),
                rule(r"(?i)(?:factura|invoice)\s*(?:n[°ºo]\.?|nro\.?|n[uú]mero|number|no\.|#)\s*:?\s*([A-Z0-9][A-Z0-9\-/]{3,})"),
                rule(r"\b(\d{4,5}-\d{8})\b"),
            ],
        )
        .with(
            Field::Date,
            vec![
                rule(r"(?i)fecha\s+de\s+emisi[oó]n\s*:?\s*(\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4})"),
                rule(r"(?i)(?:fecha|issue\s+date|invoice\s+date|date)\s*:?\s*(\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4})"),
                rule(r"(?i)(?:fecha|date)\s*:?\s*(\d{4}-\d{2}-\d{2})"),
                rule(r"\b(\d{2}/\d{2}/\d{4})\b"),
            ],
        )
        .with(
            Field::Untaxed,
            vec![
                amount_rule(r"(?i)importe\s+no\s+gravado"),
                amount_rule(r"(?i)(?:neto\s+)?no\s+gravado"),
                amount_rule(r"(?i)(?:untaxed|non[- ]taxable)(?:\s+amount)?"),
            ],
        )
        .with(
            Field::Exempt,
            vec![
                amount_rule(r"(?i)importe\s+exento"),
                amount_rule(r"(?i)\bexento"),
                amount_rule(r"(?i)\bexempt(?:\s+amount)?"),
            ],
        )
        .with(
            Field::Taxed,
            vec![
                amount_rule(r"(?i)importe\s+neto\s+gravado"),
                amount_rule(r"(?i)neto\s+gravado"),
                amount_rule(r"(?im)^\s*gravado"),
                amount_rule(r"(?i)(?:taxed|taxable)\s+amount"),
                amount_rule(r"(?i)\bnet\s+amount"),
            ],
        )
        .with(
            Field::Tax,
            vec![
                amount_rule(r"(?i)\bIVA\s*(?:21|10[.,]5|27|5|2[.,]5)\s*%"),
                amount_rule(r"(?i)\bIVA"),
                amount_rule(r"(?i)\b(?:VAT|tax)(?:\s+amount)?"),
            ],
        )
        .with(
            Field::Total,
            vec![
                amount_rule(r"(?i)importe\s+total"),
                amount_rule(r"(?i)total\s+a\s+pagar"),
                amount_rule(r"(?im)^\s*total"),
                amount_rule(r"(?i)\btotal"),
            ],
        )
}

fn ocr_table(name: &'static str) -> RuleTable {
    RuleTable::new(name)
        .with(
            Field::InvoiceNumber,
            vec![
                FieldRule::joined(
                    regex(r"(?i)p[uv]nt[o0]\s*de\s*venta[\s:;.]*(\d{1,5})[\s,;]+c[o0]mp[\s.:]*nr[o0][\s.:;]*(\d{1,8})"),
                    &[1, 2],
                    "-",
                ),
                FieldRule::joined(regex(r"(\d{4,5})\s*[-–—_]\s*(\d{8})"), &[1, 2], "-"),
                rule(r"(?i)f[a4]ctur[a4][\s:;.]*(?:n[°ºo0]?[\s.:;]*|nr[o0][\s.:;]*)([A-Z0-9][A-Z0-9\-/]{3,})"),
            ],
        )
        .with(
            Field::Date,
            vec![
                FieldRule::joined(
                    regex(r"(?i)emisi[oó0]n[\s:;.]*(\d{1,2})\s*[/.-]\s*(\d{1,2})\s*[/.-]\s*(\d{2,4})"),
                    &[1, 2, 3],
                    "/",
                ),
                FieldRule::joined(
                    regex(r"(?i)(?:fech[a4]|date)[\s:;.]*(\d{1,2})\s*[/.-]\s*(\d{1,2})\s*[/.-]\s*(\d{2,4})"),
                    &[1, 2, 3],
                    "/",
                ),
                FieldRule::joined(
                    regex(r"\b(\d{1,2})\s*/\s*(\d{1,2})\s*/\s*(\d{4})\b"),
                    &[1, 2, 3],
                    "/",
                ),
            ],
        )
        .with(
            Field::Untaxed,
            vec![
                loose_amount_rule(r"(?i)n[o0]\s*gr[a4]v[a4]d[o0]s?"),
                loose_amount_rule(r"(?i)(?:untaxed|n[o0]n[\s-]*taxable)"),
            ],
        )
        .with(
            Field::Exempt,
            vec![
                loose_amount_rule(r"(?i)ex[e3]nt[o0]"),
                loose_amount_rule(r"(?i)ex[e3]mpt"),
            ],
        )
        .with(
            Field::Taxed,
            vec![
                loose_amount_rule(r"(?i)net[o0]\s*gr[a4]v[a4]d[o0]"),
                loose_amount_rule(r"(?im)^[\s|]*gr[a4]v[a4]d[o0]"),
                loose_amount_rule(r"(?i)(?:taxed|taxable)\s*amount"),
            ],
        )
        .with(
            Field::Tax,
            vec![
                loose_amount_rule(r"(?i)[i1l|]\.?v\.?[a4]\.?\s*(?:21|10[.,]?5|27)\s*[%o]"),
                loose_amount_rule(r"(?i)\b[i1l|]\.?v\.?[a4]\b"),
                loose_amount_rule(r"(?i)\bvat\b"),
            ],
        )
        .with(
            Field::Total,
            vec![
                loose_amount_rule(r"(?i)imp[o0]rte\s*t[o0]t[a4]l"),
                loose_amount_rule(r"(?i)t[o0]t[a4]l\s*a\s*p[a4]g[a4]r"),
                loose_amount_rule(r"(?i)\bt[o0]t[a4]l"),
            ],
        )
}

lazy_static! {
    // Currency-coded total lines (TOTAL USD: 1.500,00). Travel invoices leave
    // these to the specialized extractor.
    static ref CURRENCY_TOTAL: FieldRule =
        amount_rule(r"(?i)\btotal\s+(?:USD|U\$S|US\$|ARS|EUR)");
    static ref LOOSE_CURRENCY_TOTAL: FieldRule =
        loose_amount_rule(r"(?i)\bt[o0]t[a4]l\s*(?:USD|U\$S|US\$|ARS|EUR)");

    /// Strict rules for decoded text.
    pub static ref TEXT_RULES: RuleTable =
        text_table("text").with(Field::Total, vec![CURRENCY_TOTAL.clone()]);

    /// Strict rules for decoded text of travel invoices.
    pub static ref TEXT_RULES_TRAVEL: RuleTable = text_table("text-travel");

    /// Loose rules for OCR text.
    pub static ref OCR_RULES: RuleTable =
        ocr_table("ocr").with(Field::Total, vec![LOOSE_CURRENCY_TOTAL.clone()]);

    /// Loose rules for OCR text of travel invoices.
    pub static ref OCR_RULES_TRAVEL: RuleTable = ocr_table("ocr-travel");

    // Standalone amount token.
    pub static ref AMOUNT_TOKEN: Regex = regex(AMOUNT);

    // "Other non-taxable concepts" phrase family.
    pub static ref NONTAXABLE_PHRASES: Vec<Regex> = vec![
        regex(r"(?i)otros?\s+conceptos?\s+no\s+gravad[oa]s?"),
        regex(r"(?i)conceptos?\s+no\s+gravad[oa]s?"),
        regex(r"(?i)importe\s+otros\s+(?:conceptos|tributos)"),
        regex(r"(?i)other\s+non[- ]?taxable\s+(?:concepts|items|charges)"),
        regex(r"(?i)non[- ]?taxable\s+concepts"),
        regex(r"(?i)\bno\s+gravad[oa]s?\b"),
    ];

    // Increasingly loose captures after a non-taxable phrase.
    pub static ref NEAR_PHRASE_TIGHT: Regex =
        regex(&format!(r"^\s*[:=]\s*\$?\s*{}", AMOUNT));

    // Any line mentioning a total as a whole word (not "Subtotal"), used
    // when no labeled total was captured.
    pub static ref ANY_TOTAL: Regex =
        regex(&format!(r"(?i)\btotal\b[^\n]{{0,60}}?{}", AMOUNT));

    pub static ref RATE_21: Regex = regex(r"\b21\s*%");
    pub static ref RATE_10_5: Regex = regex(r"\b10[.,]5\s*%");
    pub static ref EXEMPT_WORD: Regex = regex(r"(?i)\bexent[oa]s?\b|\bexempt\b");

    // Currency classification
    pub static ref CURRENCY_PHRASE: Regex = regex(
        r"(?i)(?:emitid[oa]s?|expresad[oa]s?|pagader[oa]s?|cancelad[oa]s?|issued|payable|settled|expressed)\s+(?:en|in)\s*:?\s*(d[oó]lares|u\$s|us\$|usd\b|euros?\b|eur\b|pesos\b|ars\b)"
    );
    pub static ref USD_SYMBOL: Regex =
        regex(r"(?i)U\$S|US\$|\$\s?USD|\bUSD\s*\d|\d\s*USD\b");
    pub static ref EUR_SYMBOL: Regex = regex(r"€|\bEUR\s*\d|\d\s*EUR\b");
    pub static ref TOTAL_CURRENCY_LINE: Regex =
        regex(r"(?im)\btotal\s+(USD|U\$S|US\$|ARS|EUR)\s*:\s*\$?\s*\d");
    pub static ref DOLLAR_SIGN: Regex = regex(r"\$");
    pub static ref USD_TOKEN: Regex =
        regex(r"(?i)U\$S|US\$|\bUSD\b|d[oó]lar");

    // Explicit USD phrasing used by the currency override.
    pub static ref USD_PHRASE: Regex = regex(
        r"(?i)en\s+d[oó]lares|in\s+us\s+dollars|moneda\s*:\s*(?:usd|d[oó]lar)|currency\s*:\s*usd"
    );
}
