use ethnum::U256;

use crate::{ErrorCode, BPS_SCALE, MAX_PERCENTAGE};

/// Largest number of decimals `parse_units`/`format_units` accept; 10^38 still fits u128.
const MAX_DECIMALS: u8 = 38;

pub fn ceil_div(token_amount: u128, fee_numerator: u128, fee_denominator: u128) -> Option<u128> {
    if fee_denominator == 0 {
        return None;
    }
    let product = U256::from(token_amount) * U256::from(fee_numerator);
    let result = (product + U256::from(fee_denominator) - U256::ONE) / U256::from(fee_denominator);
    narrow(result)
}

pub fn floor_div(token_amount: u128, fee_numerator: u128, fee_denominator: u128) -> Option<u128> {
    if fee_denominator == 0 {
        return None;
    }
    let product = U256::from(token_amount) * U256::from(fee_numerator);
    narrow(product / U256::from(fee_denominator))
}

/// `a * b / c` with a 256-bit intermediate, floored.
pub fn mul_div(a: u128, b: u128, c: u128) -> Result<u128, ErrorCode> {
    floor_div(a, b, c).ok_or(ErrorCode::MathOverflow)
}

pub(crate) fn narrow(value: U256) -> Option<u128> {
    if value > U256::from(u128::MAX) {
        None
    } else {
        Some(value.as_u128())
    }
}

/// Fee charged on `amount`, rounded up so the pool never under-collects.
pub fn get_trade_fee(amount: u128, trade_fee_rate: u64) -> Option<u128> {
    ceil_div(
        amount,
        u128::from(trade_fee_rate),
        u128::from(MAX_PERCENTAGE),
    )
}

/// Lowest acceptable output for a quoted `amount` under `slippage_bps`.
pub fn minimum_output(amount: u128, slippage_bps: u64) -> Result<u128, ErrorCode> {
    if slippage_bps > BPS_SCALE {
        return Err(ErrorCode::InvalidInput);
    }
    mul_div(
        amount,
        u128::from(BPS_SCALE - slippage_bps),
        u128::from(BPS_SCALE),
    )
}

/// Unix timestamp `minutes` after `now`.
pub fn calculate_deadline(now: u64, minutes: u64) -> u64 {
    now.saturating_add(minutes.saturating_mul(60))
}

/// Parse a decimal string such as `"1.25"` into base units with `decimals` places.
pub fn parse_units(text: &str, decimals: u8) -> Result<u128, ErrorCode> {
    if decimals > MAX_DECIMALS {
        return Err(ErrorCode::InvalidInput);
    }
    let text = text.trim();
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(ErrorCode::InvalidInput);
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(ErrorCode::InvalidInput);
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > decimals as usize {
        return Err(ErrorCode::InvalidInput);
    }

    let scale = 10u128.pow(u32::from(decimals));
    let whole_units = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u128>()
            .map_err(|_| ErrorCode::MathOverflow)?
            .checked_mul(scale)
            .ok_or(ErrorCode::MathOverflow)?
    };
    let fraction_units = if fraction.is_empty() {
        0
    } else {
        let padding = 10u128.pow((decimals as usize - fraction.len()) as u32);
        fraction
            .parse::<u128>()
            .map_err(|_| ErrorCode::InvalidInput)?
            * padding
    };

    whole_units
        .checked_add(fraction_units)
        .ok_or(ErrorCode::MathOverflow)
}

/// Render base units as a decimal string, trimming trailing fractional zeros.
pub fn format_units(amount: u128, decimals: u8) -> Result<String, ErrorCode> {
    if decimals > MAX_DECIMALS {
        return Err(ErrorCode::InvalidInput);
    }
    if decimals == 0 {
        return Ok(amount.to_string());
    }
    let scale = 10u128.pow(u32::from(decimals));
    let whole = amount / scale;
    let fraction = amount % scale;
    if fraction == 0 {
        return Ok(format!("{whole}.0"));
    }
    let fraction = format!("{:0width$}", fraction, width = decimals as usize);
    Ok(format!("{whole}.{}", fraction.trim_end_matches('0')))
}
