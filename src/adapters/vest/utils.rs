//! Vest symbol conversion and fee defaults

use rust_decimal::Decimal;

use crate::adapters::types::TradeFeeSchema;

/// Bases listed as `BASE-PERP`; everything else is `BASE-USD-PERP`
const CRYPTO_BASES: [&str; 5] = ["BTC", "ETH", "SOL", "AVAX", "DOGE"];

pub const EXAMPLE_PAIR: &str = "BTC-USDC";

pub fn default_fees() -> TradeFeeSchema {
    TradeFeeSchema {
        maker_percent_fee_decimal: Decimal::new(2, 4),
        taker_percent_fee_decimal: Decimal::new(5, 4),
        buy_percent_fee_deducted_from_returns: true,
    }
}

/// "BTC-USDC" -> "BTC-PERP", "AAPL-USDC" -> "AAPL-USD-PERP"
pub fn convert_to_exchange_trading_pair(trading_pair: &str) -> String {
    let Some((base, _)) = trading_pair.split_once('-') else {
        return trading_pair.to_string();
    };
    if CRYPTO_BASES.contains(&base) {
        format!("{}-PERP", base)
    } else {
        format!("{}-USD-PERP", base)
    }
}

/// "BTC-PERP" -> "BTC-USDC", "AAPL-USD-PERP" -> "AAPL-USDC"
pub fn convert_from_exchange_trading_pair(symbol: &str) -> String {
    let Some(stripped) = symbol.strip_suffix("-PERP") else {
        return symbol.to_string();
    };
    let base = stripped.strip_suffix("-USD").unwrap_or(stripped);
    format!("{}-USDC", base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fees() {
        let fees = default_fees();
        assert_eq!(fees.maker_percent_fee_decimal.to_string(), "0.0002");
        assert_eq!(fees.taker_percent_fee_decimal.to_string(), "0.0005");
        assert!(fees.buy_percent_fee_deducted_from_returns);
    }

    #[test]
    fn test_to_exchange_symbol() {
        assert_eq!(convert_to_exchange_trading_pair("BTC-USDC"), "BTC-PERP");
        assert_eq!(convert_to_exchange_trading_pair("BTC-USDT"), "BTC-PERP");
        assert_eq!(convert_to_exchange_trading_pair("SOL-USDC"), "SOL-PERP");
        assert_eq!(convert_to_exchange_trading_pair("AAPL-USDC"), "AAPL-USD-PERP");
        assert_eq!(convert_to_exchange_trading_pair("BTCUSDC"), "BTCUSDC");
    }

    #[test]
    fn test_from_exchange_symbol() {
        assert_eq!(convert_from_exchange_trading_pair("ETH-PERP"), "ETH-USDC");
        assert_eq!(convert_from_exchange_trading_pair("TSLA-USD-PERP"), "TSLA-USDC");
        assert_eq!(convert_from_exchange_trading_pair("BTC-USDC"), "BTC-USDC");
    }

    #[test]
    fn test_round_trip() {
        for pair in ["BTC-USDC", "DOGE-USDC", "AAPL-USDC"] {
            assert_eq!(convert_from_exchange_trading_pair(&convert_to_exchange_trading_pair(pair)), pair);
        }
    }
}
