//! Swap operations for the exchange
//!
//! Constant-product pricing with the trade fee taken from the input side.
//! Every function here is a pure function of the reserve snapshot it is given.

use ethnum::U256;
use tracing::{debug, warn};

use crate::{
    state::{ReserveState, SwapDirection, SwapQuote, SwapResult},
    utils::{get_trade_fee, minimum_output, narrow},
    AmmConfig, ErrorCode, MAX_PERCENTAGE,
};

pub fn swap_base_input_without_fees(
    source_amount: u128,
    swap_source_amount: u128,
    swap_destination_amount: u128,
) -> Option<u128> {
    // (x + delta_x) * (y - delta_y) = x * y
    // delta_y = (delta_x * y) / (x + delta_x)
    let numerator = U256::from(source_amount).checked_mul(U256::from(swap_destination_amount))?;
    let denominator = U256::from(swap_source_amount).checked_add(U256::from(source_amount))?;
    if denominator == U256::ZERO {
        return None;
    }
    narrow(numerator / denominator)
}

/// Output for `source_amount` after deducting `trade_fee_rate` from the input.
///
/// The fee is folded into a single floor division,
/// `y * dx * (D - f) / (x * D + dx * (D - f))`, so the result matches the
/// exchange contract's integer arithmetic exactly rather than flooring twice.
pub fn swap(
    source_amount: u128,
    pool_source_amount: u128,
    pool_destination_amount: u128,
    trade_fee_rate: u64,
) -> Option<SwapResult> {
    if trade_fee_rate >= MAX_PERCENTAGE {
        return None;
    }
    let fee_factor = U256::from(MAX_PERCENTAGE - trade_fee_rate);
    let scale = U256::from(MAX_PERCENTAGE);

    let effective_input = U256::from(source_amount).checked_mul(fee_factor)?;
    let numerator = effective_input.checked_mul(U256::from(pool_destination_amount))?;
    let denominator = U256::from(pool_source_amount)
        .checked_mul(scale)?
        .checked_add(effective_input)?;
    if denominator == U256::ZERO {
        return None;
    }
    let destination_amount_swapped = narrow(numerator / denominator)?;

    let trade_fee = get_trade_fee(source_amount, trade_fee_rate)?;

    Some(SwapResult {
        from_amount: source_amount.checked_sub(trade_fee)?,
        to_amount: destination_amount_swapped,
        trade_fee,
    })
}

/// Calculate the output amount for a given input amount
///
/// # Arguments
/// * `input_amount` - The amount of input tokens
/// * `input_reserve` - The reserve of input tokens in the pool
/// * `output_reserve` - The reserve of output tokens in the pool
/// * `amm_config` - Supplies the trade fee rate
///
/// # Returns
/// The output amount, floored. Always strictly below `output_reserve`.
pub fn quote_output(
    input_amount: u128,
    input_reserve: u128,
    output_reserve: u128,
    amm_config: &AmmConfig,
) -> Result<u128, ErrorCode> {
    if input_amount == 0 || input_reserve == 0 || output_reserve == 0 {
        return Err(ErrorCode::InvalidInput);
    }
    if amm_config.trade_fee_rate >= MAX_PERCENTAGE {
        return Err(ErrorCode::InvalidInput);
    }

    let result = swap(
        input_amount,
        input_reserve,
        output_reserve,
        amm_config.trade_fee_rate,
    )
    .ok_or(ErrorCode::MathOverflow)?;

    Ok(result.to_amount)
}

/// Relative move of the marginal price caused by a trade, in percent.
///
/// Compares `out_reserve / in_reserve` before the trade with
/// `(out_reserve - output) / (in_reserve + input)` after it. Returns 0 when
/// either reserve or the input is zero.
pub fn price_impact(
    input_amount: u128,
    output_amount: u128,
    reserves: &ReserveState,
    direction: SwapDirection,
) -> f64 {
    let (input_reserve, output_reserve) = reserves.oriented(direction);
    if input_amount == 0 || input_reserve == 0 || output_reserve == 0 {
        return 0.0;
    }

    let input_reserve = input_reserve as f64;
    let output_reserve = output_reserve as f64;

    let price_before = output_reserve / input_reserve;
    let price_after =
        (output_reserve - output_amount as f64) / (input_reserve + input_amount as f64);

    ((price_before - price_after) / price_before * 100.0).abs()
}

/// Quote a swap against a reserve snapshot.
///
/// `slippage_bps` only shapes `minimum_output`; the quote itself is advisory
/// and the exchange contract remains the final arbiter.
pub fn quote_swap(
    reserves: &ReserveState,
    direction: SwapDirection,
    input_amount: u128,
    slippage_bps: u64,
    amm_config: &AmmConfig,
) -> Result<SwapQuote, ErrorCode> {
    if !reserves.is_active() {
        warn!(?reserves, "swap quote requested against uninitialized pool");
        return Err(ErrorCode::ZeroReserves);
    }
    if input_amount == 0 {
        return Err(ErrorCode::InvalidInput);
    }

    let (input_reserve, output_reserve) = reserves.oriented(direction);
    let output_amount = quote_output(input_amount, input_reserve, output_reserve, amm_config)?;
    if output_amount == 0 {
        warn!(?direction, input_amount, "swap output rounds down to zero");
        return Err(ErrorCode::OutputIsZero);
    }
    let trade_fee =
        get_trade_fee(input_amount, amm_config.trade_fee_rate).ok_or(ErrorCode::MathOverflow)?;
    let price_impact_percent = price_impact(input_amount, output_amount, reserves, direction);
    let minimum_output = minimum_output(output_amount, slippage_bps)?;

    debug!(
        ?direction,
        input_amount,
        output_amount,
        trade_fee,
        price_impact_percent,
        minimum_output,
        "quoted swap"
    );

    Ok(SwapQuote {
        direction,
        input_amount,
        output_amount,
        trade_fee,
        price_impact_percent,
        minimum_output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_SLIPPAGE_BPS;
    use proptest::prelude::*;

    fn config() -> AmmConfig {
        AmmConfig::default()
    }

    #[test]
    fn test_quote_basic() {
        // 100 * 997_000 * 1500 / (1000 * 10^6 + 100 * 997_000) = 135.99
        let result = quote_output(100, 1_000, 1_500, &config()).unwrap();
        assert_eq!(result, 135);
    }

    #[test]
    fn test_quote_below_fee_free_product() {
        let output = quote_output(100, 1_000, 1_500, &config()).unwrap();
        let no_fee = 1_500.0 - (1_500.0 * 1_000.0) / 1_100.0;
        assert!(output > 0);
        assert!(output < 1_500);
        assert!((output as f64) < no_fee);
    }

    #[test]
    fn test_quote_without_fee_matches_plain_product() {
        let zero_fee = AmmConfig {
            trade_fee_rate: 0,
            ..AmmConfig::default()
        };
        let output = quote_output(100, 1_000, 2_000, &zero_fee).unwrap();
        assert_eq!(Some(output), swap_base_input_without_fees(100, 1_000, 2_000));
        assert_eq!(output, 181); // 100 * 2000 / 1100
    }

    #[test]
    fn test_quote_zero_inputs() {
        assert!(matches!(quote_output(0, 1_000, 2_000, &config()), Err(ErrorCode::InvalidInput)));
        assert!(matches!(quote_output(100, 0, 2_000, &config()), Err(ErrorCode::InvalidInput)));
        assert!(matches!(quote_output(100, 1_000, 0, &config()), Err(ErrorCode::InvalidInput)));
    }

    #[test]
    fn test_quote_rejects_full_fee() {
        let full_fee = AmmConfig {
            trade_fee_rate: MAX_PERCENTAGE,
            ..AmmConfig::default()
        };
        assert!(matches!(quote_output(100, 1_000, 2_000, &full_fee), Err(ErrorCode::InvalidInput)));
    }

    #[test]
    fn test_fee_applies_in_both_directions() {
        let reserves = ReserveState::new(5_000, 5_000);
        let buy = quote_swap(&reserves, SwapDirection::BaseToToken, 500, 0, &config()).unwrap();
        let sell = quote_swap(&reserves, SwapDirection::TokenToBase, 500, 0, &config()).unwrap();
        assert_eq!(buy.output_amount, sell.output_amount);
        assert_eq!(buy.trade_fee, 2); // ceil(500 * 0.003)
    }

    #[test]
    fn test_swap_reports_fee_split() {
        let result = swap(1_000, 10_000, 10_000, 3_000).unwrap();
        assert_eq!(result.trade_fee, 3);
        assert_eq!(result.from_amount, 997);
        assert_eq!(result.to_amount, 906); // 10_000 * 997 / 10_997
    }

    #[test]
    fn test_eighteen_decimal_reserves() {
        let eth = 1_000_000_000_000_000_000u128;
        // 1000 ETH against 2,000,000 tokens, sell 1 ETH
        let output = quote_output(eth, 1_000 * eth, 2_000_000 * eth, &config()).unwrap();
        assert!(output > 1_990 * eth && output < 2_000 * eth);
    }

    #[test]
    fn test_price_impact() {
        let reserves = ReserveState::new(1_000, 1_500);
        let impact = price_impact(100, 135, &reserves, SwapDirection::BaseToToken);
        // before 1.5, after 1365 / 1100
        let expected = (1.5 - 1_365.0 / 1_100.0) / 1.5 * 100.0;
        assert!((impact - expected).abs() < 1e-9);
        assert!(impact > 0.0);
    }

    #[test]
    fn test_price_impact_zero_reserves() {
        assert_eq!(price_impact(100, 50, &ReserveState::EMPTY, SwapDirection::BaseToToken), 0.0);
        assert_eq!(
            price_impact(0, 0, &ReserveState::new(10, 10), SwapDirection::TokenToBase),
            0.0
        );
    }

    #[test]
    fn test_quote_swap_uninitialized_pool() {
        let result = quote_swap(&ReserveState::EMPTY, SwapDirection::BaseToToken, 10, 50, &config());
        assert!(matches!(result, Err(ErrorCode::ZeroReserves)));
    }

    #[test]
    fn test_quote_swap_minimum_output() {
        let reserves = ReserveState::new(1_000_000, 3_000_000);
        let quote = quote_swap(
            &reserves,
            SwapDirection::BaseToToken,
            10_000,
            DEFAULT_SLIPPAGE_BPS,
            &config(),
        )
        .unwrap();
        assert_eq!(quote.minimum_output, quote.output_amount * 9_950 / 10_000);
        assert!(quote.price_impact_percent > 0.0);
    }

    #[test]
    fn test_quote_swap_zero_output() {
        // 500 base against 1_000 tokens at a 1000:1 price floors to nothing
        let reserves = ReserveState::new(1_000_000, 1_000);
        assert_eq!(quote_output(500, 1_000_000, 1_000, &config()).unwrap(), 0);
        let result = quote_swap(&reserves, SwapDirection::BaseToToken, 500, 0, &config());
        assert!(matches!(result, Err(ErrorCode::OutputIsZero)));

        let quote = quote_swap(&reserves, SwapDirection::BaseToToken, 2_000, 0, &config()).unwrap();
        assert!(quote.output_amount > 0);
    }

    proptest! {
        #[test]
        fn prop_output_never_drains_pool(
            input in 1u128..1_000_000_000_000,
            input_reserve in 1u128..1_000_000_000_000,
            output_reserve in 1u128..1_000_000_000_000,
            fee in 0u64..100_000,
        ) {
            let cfg = AmmConfig { trade_fee_rate: fee, ..AmmConfig::default() };
            let output = quote_output(input, input_reserve, output_reserve, &cfg).unwrap();
            prop_assert!(output < output_reserve);
        }

        #[test]
        fn prop_output_monotone_in_input(
            input in 1u128..1_000_000_000,
            extra in 1u128..1_000_000_000,
            input_reserve in 1u128..1_000_000_000_000,
            output_reserve in 1u128..1_000_000_000_000,
        ) {
            let cfg = AmmConfig::default();
            let small = quote_output(input, input_reserve, output_reserve, &cfg).unwrap();
            let large = quote_output(input + extra, input_reserve, output_reserve, &cfg).unwrap();
            prop_assert!(large >= small);
        }

        #[test]
        fn prop_fee_never_increases_output(
            input in 1u128..1_000_000_000,
            input_reserve in 1u128..1_000_000_000,
            output_reserve in 1u128..1_000_000_000,
        ) {
            let with_fee = quote_output(input, input_reserve, output_reserve, &AmmConfig::default()).unwrap();
            let without = swap_base_input_without_fees(input, input_reserve, output_reserve).unwrap();
            prop_assert!(with_fee <= without);
        }
    }
}
