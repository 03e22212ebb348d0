//! Cross-checks an extracted total against its components.
//!
//! Neither the total line nor the component lines are trusted outright: OCR
//! and regex capture fail independently on both. The reconciler compares the
//! two, keeps the extracted total when one exists, and attributes the
//! discrepancy to the most plausible missing field, usually the "other
//! non-taxable concepts" amount that many layouts only print inside the
//! line-item table.

use rust_decimal::Decimal;
use tracing::debug;

use super::rules::numbers::amount_or_zero;
use super::rules::patterns::{
    AMOUNT_TOKEN, EXEMPT_WORD, NEAR_PHRASE_TIGHT, NONTAXABLE_PHRASES, RATE_10_5, RATE_21,
};
use crate::models::config::ReconcileConfig;
use crate::models::record::Amounts;

/// Guards the relative difference against a zero total.
const EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

/// Input to one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileInput<'a> {
    /// Captured amounts; `total` is the extracted total (zero when none).
    pub amounts: Amounts,
    /// Whether the "other non-taxable concepts" phrase family is present.
    pub has_nontaxable_phrase: bool,
    /// A total obtained outside the labeled total rules, if any.
    pub other_total: Option<Decimal>,
    pub raw_text: &'a str,
}

/// Outcome of reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub amounts: Amounts,
    /// Whether any amount differs from the (clamped) input.
    pub adjusted: bool,
    pub warnings: Vec<String>,
}

/// Tolerance-based reconciliation of totals and components.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn reconcile(&self, input: &ReconcileInput<'_>) -> Reconciled {
        let original = input.amounts.clamped();
        let mut amounts = original;
        let computed = amounts.component_sum();

        if amounts.total > Decimal::ZERO {
            let diff = relative_diff(amounts.total, computed);
            if diff > self.config.relative_tolerance {
                debug!(
                    "extracted total {} disagrees with components {} ({:.1}%), keeping extracted",
                    amounts.total,
                    computed,
                    diff * Decimal::ONE_HUNDRED
                );
                if input.has_nontaxable_phrase && amounts.untaxed.is_zero() {
                    amounts.untaxed = residual(&amounts);
                    debug!("assigned residual {} to untaxed", amounts.untaxed);
                }
            }
        } else {
            amounts.total = computed;
            if computed.is_zero() {
                if let Some(other) = input.other_total.filter(|t| *t > Decimal::ZERO) {
                    self.attribute_unexplained_total(&mut amounts, other, input);
                }
            }
        }
        amounts = amounts.clamped();

        let sum_gap = amounts.component_sum().saturating_sub(amounts.total).abs();
        if amounts.untaxed.is_zero() || sum_gap > self.config.absolute_tolerance {
            if let Some(untaxed) = recover_untaxed(input.raw_text, &amounts) {
                debug!("phrase search recovered untaxed {}", untaxed);
                amounts.untaxed = untaxed;
                if amounts.total.is_zero() {
                    amounts.total = amounts.component_sum();
                }
            }
        }
        amounts = amounts.clamped();

        let mut warnings = Vec::new();
        let computed = amounts.component_sum();
        if amounts.total > Decimal::ZERO
            && relative_diff(amounts.total, computed) > self.config.loose_relative_tolerance
        {
            warnings.push(format!(
                "components sum {} does not match total {}",
                computed, amounts.total
            ));
        }

        Reconciled {
            adjusted: amounts != original,
            amounts,
            warnings,
        }
    }

    /// A total exists but nothing explains it: back-compute from a named tax
    /// rate, or give it to the most plausible single field.
    fn attribute_unexplained_total(
        &self,
        amounts: &mut Amounts,
        total: Decimal,
        input: &ReconcileInput<'_>,
    ) {
        amounts.total = total;
        if let Some(rate) = named_tax_rate(input.raw_text) {
            let taxed = (total / (Decimal::ONE + rate)).round_dp(2);
            amounts.taxed = taxed;
            amounts.tax = total - taxed;
            debug!("back-computed taxed {} / tax {} at rate {}", taxed, amounts.tax, rate);
        } else if input.has_nontaxable_phrase {
            amounts.untaxed = total;
        } else if EXEMPT_WORD.is_match(input.raw_text) {
            amounts.exempt = total;
        } else {
            amounts.untaxed = total;
        }
    }
}

fn relative_diff(total: Decimal, computed: Decimal) -> Decimal {
    total.saturating_sub(computed).abs() / total.saturating_add(EPSILON)
}

/// `total − (exempt + taxed + tax)`, floored at zero.
fn residual(amounts: &Amounts) -> Decimal {
    let explained = amounts
        .exempt
        .saturating_add(amounts.taxed)
        .saturating_add(amounts.tax);
    amounts.total.saturating_sub(explained).max(Decimal::ZERO)
}

fn named_tax_rate(text: &str) -> Option<Decimal> {
    if RATE_21.is_match(text) {
        Some(Decimal::new(21, 2))
    } else if RATE_10_5.is_match(text) {
        Some(Decimal::new(105, 3))
    } else {
        None
    }
}

/// Whether any phrase of the "other non-taxable concepts" family is present.
pub fn has_nontaxable_phrase(text: &str) -> bool {
    NONTAXABLE_PHRASES.iter().any(|p| p.is_match(text))
}

/// Search for an amount near a non-taxable phrase.
///
/// Each phrase occurrence is tried with three increasingly loose captures:
/// an amount right after a `:`, the last amount on the same line, and the
/// first amount within the next two lines.
pub fn capture_near_phrase(text: &str) -> Option<Decimal> {
    for phrase in NONTAXABLE_PHRASES.iter() {
        for m in phrase.find_iter(text) {
            let after = &text[m.end()..];

            if let Some(caps) = NEAR_PHRASE_TIGHT.captures(after) {
                let amount = amount_or_zero("untaxed", &caps[1]);
                if amount > Decimal::ZERO {
                    return Some(amount);
                }
            }

            let line_end = after.find('\n').unwrap_or(after.len());
            let same_line = AMOUNT_TOKEN
                .captures_iter(&after[..line_end])
                .last()
                .map(|caps| amount_or_zero("untaxed", &caps[1]));
            if let Some(amount) = same_line.filter(|a| *a > Decimal::ZERO) {
                return Some(amount);
            }

            let window: String = after[line_end..]
                .lines()
                .filter(|l| !l.trim().is_empty())
                .take(2)
                .collect::<Vec<_>>()
                .join("\n");
            let next_lines = AMOUNT_TOKEN
                .captures(&window)
                .map(|caps| amount_or_zero("untaxed", &caps[1]));
            if let Some(amount) = next_lines.filter(|a| *a > Decimal::ZERO) {
                return Some(amount);
            }
        }
    }
    None
}

/// Phrase-proximity recovery of the untaxed amount, falling back to the
/// residual when a phrase is present but carries no readable amount.
fn recover_untaxed(text: &str, amounts: &Amounts) -> Option<Decimal> {
    if !has_nontaxable_phrase(text) {
        return None;
    }
    capture_near_phrase(text).or_else(|| Some(residual(amounts)).filter(|r| *r > Decimal::ZERO))
}
