//! Invoice currency inference.

use tracing::debug;

use super::patterns::{
    CURRENCY_PHRASE, DOLLAR_SIGN, EUR_SYMBOL, TOTAL_CURRENCY_LINE, USD_SYMBOL, USD_TOKEN,
};
use crate::models::record::Currency;

/// Infer the currency of an invoice from its text.
///
/// Rules are tried in priority order and the first one that fires wins:
/// explicit phrases ("emitida en dólares"), currency symbols, a
/// `TOTAL <CUR>:` line, and finally a bare `$` which defaults to pesos.
pub fn classify_currency(text: &str) -> Currency {
    if let Some(caps) = CURRENCY_PHRASE.captures(text) {
        if let Some(currency) = token_currency(&caps[1]) {
            debug!("currency {} from explicit phrase {:?}", currency, &caps[0]);
            return currency;
        }
    }

    if USD_SYMBOL.is_match(text) {
        debug!("currency USD from symbol");
        return Currency::Usd;
    }
    if EUR_SYMBOL.is_match(text) {
        debug!("currency EUR from symbol");
        return Currency::Eur;
    }

    if let Some(caps) = TOTAL_CURRENCY_LINE.captures(text) {
        if let Some(currency) = token_currency(&caps[1]) {
            debug!("currency {} from total line", currency);
            return currency;
        }
    }

    if DOLLAR_SIGN.is_match(text) && !USD_TOKEN.is_match(text) {
        debug!("currency ARS from bare $");
        return Currency::Ars;
    }

    Currency::Unknown
}

fn token_currency(token: &str) -> Option<Currency> {
    let token = token.to_lowercase();
    if token.starts_with("d") || token.contains("us") || token.contains("u$s") {
        Some(Currency::Usd)
    } else if token.starts_with("eur") {
        Some(Currency::Eur)
    } else if token == "pesos" || token == "ars" {
        Some(Currency::Ars)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_phrase_wins_over_symbols() {
        let text = "Factura emitida en dólares estadounidenses\nTotal $ 1.000,00 EUR 5";
        assert_eq!(classify_currency(text), Currency::Usd);
        assert_eq!(classify_currency("Payable in EUR"), Currency::Eur);
        assert_eq!(classify_currency("Importes expresados en pesos. Total: $ 10"), Currency::Ars);
    }

    #[test]
    fn test_symbols() {
        assert_eq!(classify_currency("Total U$S 1.500,00"), Currency::Usd);
        assert_eq!(classify_currency("Amount US$ 99.00"), Currency::Usd);
        assert_eq!(classify_currency("Precio: 45,00 €"), Currency::Eur);
        assert_eq!(classify_currency("Price EUR 45.00"), Currency::Eur);
    }

    #[test]
    fn test_total_line_currency() {
        assert_eq!(classify_currency("TOTAL USD: 1.500,00"), Currency::Usd);
        assert_eq!(classify_currency("TOTAL ARS: 1.500,00"), Currency::Ars);
    }

    #[test]
    fn test_bare_dollar_defaults_to_pesos() {
        assert_eq!(classify_currency("Total: $ 1.210,00"), Currency::Ars);
    }

    #[test]
    fn test_unknown_without_signals() {
        assert_eq!(classify_currency("Gravado: 1000,00\nTOTAL: 1210,00"), Currency::Unknown);
    }
}
