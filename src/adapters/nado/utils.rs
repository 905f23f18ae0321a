//! Nado encoding helpers
//!
//! x18 fixed-point conversion, nonce and expiration generation, sender and
//! verifying-contract derivation, and the order appendix bit-field.

use std::collections::BTreeMap;
use std::str::FromStr;

use ethers::core::types::I256;
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

use super::constants::{self, DEFAULT_SUBACCOUNT_HEX};
use super::types::NadoMarket;

/// 10^18 as an I256
fn x18_factor() -> I256 {
    I256::exp10(18)
}

// =============================================================================
// Decimal parsing
// =============================================================================

/// Parse a decimal string, accepting scientific notation as well
pub fn parse_decimal(raw: &str) -> ExchangeResult<Decimal> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| ExchangeError::InvalidInput(format!("not a decimal: {:?} ({})", raw, e)))
}

/// Decimal from a JSON string or number leaf
pub fn decimal_from_value(value: &Value) -> ExchangeResult<Decimal> {
    match value {
        Value::String(s) => parse_decimal(s),
        Value::Number(n) => parse_decimal(&n.to_string()),
        other => Err(ExchangeError::InvalidInput(format!(
            "expected a numeric leaf, got {}",
            other
        ))),
    }
}

/// Round to the scale of `precision` (e.g. 0.01 -> 2 places), half to even
pub fn quantize(value: Decimal, precision: Decimal) -> Decimal {
    let scale = precision.scale();
    let mut rounded = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(scale);
    rounded
}

// =============================================================================
// x18 conversion
// =============================================================================

/// Raw text of a numeric leaf
fn leaf_text(value: &Value) -> ExchangeResult<String> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(ExchangeError::InvalidInput(format!(
            "expected a numeric leaf, got {}",
            other
        ))),
    }
}

/// Scalar x18 decode of an integer: `raw / 10^18`, optionally quantized
///
/// Whole and fractional parts are split on the 256-bit integer so raws far
/// beyond the Decimal mantissa still decode.
pub fn from_x18_integer(raw: I256, precision: Option<Decimal>) -> ExchangeResult<Decimal> {
    let out_of_range = || ExchangeError::InvalidInput(format!("x18 value out of range: {}", raw));
    let factor = x18_factor();
    let whole = raw.checked_div(factor).ok_or_else(out_of_range)?;
    let frac = raw.checked_rem(factor).ok_or_else(out_of_range)?;

    let whole = i128::try_from(whole)
        .ok()
        .and_then(|w| Decimal::try_from_i128_with_scale(w, 0).ok())
        .ok_or_else(out_of_range)?;
    let frac = i128::try_from(frac)
        .ok()
        .and_then(|f| Decimal::try_from_i128_with_scale(f, 18).ok())
        .ok_or_else(out_of_range)?;
    let value = whole.checked_add(frac).ok_or_else(out_of_range)?;

    Ok(match precision {
        Some(p) => quantize(value, p),
        None => value.normalize(),
    })
}

/// Scalar x18 decode of a string leaf
///
/// Integer raws take the 256-bit path; fractional or scientific raws fall
/// back to Decimal division.
pub fn from_x18_str(raw: &str, precision: Option<Decimal>) -> ExchangeResult<Decimal> {
    let trimmed = raw.trim();
    if let Ok(int) = I256::from_dec_str(trimmed) {
        return from_x18_integer(int, precision);
    }
    let value = parse_decimal(trimmed)?
        .checked_div(Decimal::from(1_000_000_000_000_000_000u64))
        .ok_or_else(|| ExchangeError::InvalidInput(format!("x18 decode overflow: {}", raw)))?;
    Ok(match precision {
        Some(p) => quantize(value, p),
        None => value.normalize(),
    })
}

/// Scalar x18 encode: optionally quantize, multiply by 10^18, round to an integer
pub fn to_x18_integer(value: Decimal, precision: Option<Decimal>) -> I256 {
    let value = match precision {
        Some(p) => quantize(value, p),
        None => value,
    };
    // at most 18 places left, so the scaled mantissa is exact
    let value = value.round_dp_with_strategy(18, RoundingStrategy::MidpointNearestEven);
    I256::from(value.mantissa()) * I256::exp10(18 - value.scale() as usize)
}

/// Decode one x18 leaf (string or number) straight to a Decimal
pub fn x18_value(value: &Value) -> ExchangeResult<Decimal> {
    from_x18_str(&leaf_text(value)?, None)
}

/// Decode every numeric leaf of `data` from x18 into a decimal string
///
/// Objects and arrays are walked recursively, `null` stays `null`, and any
/// other leaf (booleans) is rejected.
pub fn convert_from_x18(data: &Value, precision: Option<Decimal>) -> ExchangeResult<Value> {
    match data {
        Value::Null => Ok(Value::Null),
        Value::String(_) | Value::Number(_) => {
            let decoded = from_x18_str(&leaf_text(data)?, precision)?;
            Ok(Value::String(decoded.to_string()))
        }
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), convert_from_x18(v, precision)?)))
            .collect::<ExchangeResult<serde_json::Map<_, _>>>()
            .map(Value::Object),
        Value::Array(items) => items
            .iter()
            .map(|v| convert_from_x18(v, precision))
            .collect::<ExchangeResult<Vec<_>>>()
            .map(Value::Array),
        Value::Bool(_) => Err(ExchangeError::InvalidInput(format!(
            "unsupported type for convert_from_x18: {}",
            data
        ))),
    }
}

/// Encode every numeric leaf of `data` as an x18 integer string
pub fn convert_to_x18(data: &Value, precision: Option<Decimal>) -> ExchangeResult<Value> {
    match data {
        Value::Null => Ok(Value::Null),
        Value::String(_) | Value::Number(_) => {
            let encoded = to_x18_integer(decimal_from_value(data)?, precision);
            Ok(Value::String(encoded.to_string()))
        }
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), convert_to_x18(v, precision)?)))
            .collect::<ExchangeResult<serde_json::Map<_, _>>>()
            .map(Value::Object),
        Value::Array(items) => items
            .iter()
            .map(|v| convert_to_x18(v, precision))
            .collect::<ExchangeResult<Vec<_>>>()
            .map(Value::Array),
        Value::Bool(_) => Err(ExchangeError::InvalidInput(format!(
            "unsupported type for convert_to_x18: {}",
            data
        ))),
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Hex string to 32 bytes, right-padded with zeros
pub fn hex_to_bytes32(hex_string: &str) -> ExchangeResult<[u8; 32]> {
    let stripped = hex_string.strip_prefix("0x").unwrap_or(hex_string);
    let bytes = hex::decode(stripped)
        .map_err(|e| ExchangeError::InvalidInput(format!("invalid hex {:?}: {}", hex_string, e)))?;
    if bytes.len() > 32 {
        return Err(ExchangeError::InvalidInput(format!(
            "{} bytes do not fit in bytes32",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out[..bytes.len()].copy_from_slice(&bytes);
    Ok(out)
}

/// Nanosecond timestamp to seconds
pub fn convert_timestamp(timestamp_ns: &Value) -> ExchangeResult<f64> {
    let ns = decimal_from_value(timestamp_ns)?;
    let seconds = ns / Decimal::from(1_000_000_000u64);
    seconds
        .to_string()
        .parse::<f64>()
        .map_err(|e| ExchangeError::InvalidInput(format!("bad timestamp {}: {}", ns, e)))
}

/// Product id whose market matches `trading_pair` ("BTC-USDT0" -> "BTC/USDT0")
pub fn trading_pair_to_product_id(
    trading_pair: &str,
    markets: &BTreeMap<u32, NadoMarket>,
    perp_only: bool,
) -> Option<u32> {
    let market = trading_pair.replace('-', "/");
    markets
        .values()
        .filter(|m| !perp_only || m.symbol.to_lowercase().contains("perp"))
        .find(|m| m.market == market)
        .map(|m| m.product_id)
}

pub fn market_to_trading_pair(market: &str) -> String {
    market.replace('/', "-")
}

/// Market name for a symbol: "BTC-PERP" -> "BTC/USDT0"
pub fn symbol_to_market(symbol: &str) -> String {
    if symbol.contains('/') {
        return symbol.to_string();
    }
    let upper = symbol.to_uppercase();
    let base = upper
        .strip_suffix("-PERP")
        .or_else(|| upper.strip_suffix("_PERP"))
        .unwrap_or(&upper);
    format!("{}/{}", base, constants::QUOTE)
}

/// Wallet address plus the "default" subaccount, 32 bytes as hex
pub fn convert_address_to_sender(address: &str) -> ExchangeResult<String> {
    let stripped = address
        .strip_prefix("0x")
        .ok_or_else(|| ExchangeError::InvalidInput(format!("address must be 0x-prefixed: {:?}", address)))?;
    let bytes = hex::decode(stripped)
        .map_err(|e| ExchangeError::InvalidInput(format!("invalid address {:?}: {}", address, e)))?;
    if bytes.len() != 20 {
        return Err(ExchangeError::InvalidInput(format!(
            "address must be 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(format!("{}{}", address, DEFAULT_SUBACCOUNT_HEX))
}

/// Per-product verifying contract: the product id big-endian in 20 bytes
pub fn generate_order_verifying_contract(product_id: u32) -> String {
    format!("0x{:040x}", product_id)
}

// =============================================================================
// Nonce, expiration, appendix
// =============================================================================

pub const DEFAULT_EXPIRY_SECONDS: u64 = 86_400;
pub const DEFAULT_NONCE_EXPIRY_MS: u64 = 90;

/// Unix seconds `expiry_seconds` after `timestamp`, as a string
pub fn generate_expiration(timestamp: f64, expiry_seconds: u64) -> String {
    (timestamp as u64 + expiry_seconds).to_string()
}

/// `((timestamp_ms + expiry_ms * 1000) << 20) + jitter` with jitter in 1..=1001
pub fn generate_nonce(timestamp: f64, expiry_ms: u64) -> u64 {
    let unix_epoch_ms = (timestamp * 1000.0 + (expiry_ms * 1000) as f64) as u64;
    let jitter: u64 = rand::thread_rng().gen_range(1..=1001);
    (unix_epoch_ms << 20) + jitter
}

/// Bit 11 of the appendix marks a reduce/close order
pub const CLOSE_POSITION_BIT: u128 = 1 << 11;

/// `(version & 0xFF) | ((tif & 3) << 9)`, plus the close bit when requested
pub fn build_order_appendix(time_in_force: &str, version: u32, close_position: bool) -> u128 {
    let tif = constants::time_in_force_code(time_in_force);
    let mut appendix = (version as u128 & 0xFF) | ((tif & 0x3) << 9);
    if close_position {
        appendix |= CLOSE_POSITION_BIT;
    }
    appendix
}
