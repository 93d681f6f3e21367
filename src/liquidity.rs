//! Liquidity operations for the exchange
//!
//! Mint and burn quotes for liquidity tokens, computed against a reserve
//! snapshot and the current total liquidity-token supply.

use ethnum::U256;
use integer_sqrt::IntegerSquareRoot;
use tracing::{debug, warn};

use crate::{
    state::{
        AddLiquidityQuote, Address, InitialMint, LiquidityPosition, PoolStatus,
        RemoveLiquidityQuote, ReserveState,
    },
    utils::mul_div,
    AmmConfig, ErrorCode, MAX_PERCENTAGE,
};

/// Liquidity minted by the first deposit into an empty exchange.
pub fn initial_liquidity(
    base_amount: u128,
    token_amount: u128,
    initial_mint: InitialMint,
) -> Result<u128, ErrorCode> {
    match initial_mint {
        InitialMint::BaseAmount => Ok(base_amount),
        InitialMint::GeometricMean => Ok(base_amount
            .checked_mul(token_amount)
            .ok_or(ErrorCode::MathOverflow)?
            .integer_sqrt()),
    }
}

/// Quote a deposit of `base_amount` together with the caller's `token_amount`.
///
/// # Arguments
/// * `base_amount` - Base asset being deposited
/// * `token_amount` - Tokens the caller intends to deposit alongside it
/// * `reserves` - Current reserve snapshot
/// * `total_liquidity` - Current total supply of liquidity tokens
/// * `amm_config` - Supplies the ratio tolerance and first-deposit rule
///
/// # Returns
/// The token amount the pool ratio requires and the liquidity that would be
/// minted. On an empty pool both amounts are taken as given and set the ratio.
pub fn quote_add_liquidity(
    base_amount: u128,
    token_amount: u128,
    reserves: &ReserveState,
    total_liquidity: u128,
    amm_config: &AmmConfig,
) -> Result<AddLiquidityQuote, ErrorCode> {
    if base_amount == 0 || token_amount == 0 {
        return Err(ErrorCode::InvalidInput);
    }

    if total_liquidity == 0 {
        let liquidity_minted =
            initial_liquidity(base_amount, token_amount, amm_config.initial_mint)?;
        if liquidity_minted == 0 {
            return Err(ErrorCode::LiquidityTooLow);
        }
        debug!(base_amount, token_amount, liquidity_minted, "quoted first deposit");
        return Ok(AddLiquidityQuote {
            token_amount_required: token_amount,
            liquidity_minted,
        });
    }

    if reserves.status() == PoolStatus::Uninitialized {
        warn!(?reserves, total_liquidity, "liquidity supply without reserves");
        return Err(ErrorCode::ZeroReserves);
    }

    let token_amount_required =
        mul_div(base_amount, reserves.token_reserve, reserves.base_reserve)?;
    if !within_tolerance(
        token_amount,
        token_amount_required,
        amm_config.ratio_change_tolerance_rate,
    ) {
        warn!(
            token_amount,
            token_amount_required,
            tolerance = amm_config.ratio_change_tolerance_rate,
            "deposit does not preserve pool ratio"
        );
        return Err(ErrorCode::RatioMismatch);
    }

    let liquidity_minted = mul_div(base_amount, total_liquidity, reserves.base_reserve)?;
    if liquidity_minted == 0 {
        warn!(base_amount, total_liquidity, "deposit too small to mint liquidity");
        return Err(ErrorCode::LiquidityTooLow);
    }
    debug!(
        base_amount,
        token_amount_required,
        liquidity_minted,
        "quoted deposit"
    );

    Ok(AddLiquidityQuote {
        token_amount_required,
        liquidity_minted,
    })
}

/// `|supplied - required| <= required * tolerance_rate / MAX_PERCENTAGE`
fn within_tolerance(supplied: u128, required: u128, tolerance_rate: u64) -> bool {
    let diff = supplied.abs_diff(required);
    U256::from(diff) * U256::from(MAX_PERCENTAGE)
        <= U256::from(required) * U256::from(tolerance_rate)
}

/// Calculate the amounts returned for burning `liquidity_amount`
///
/// # Arguments
/// * `liquidity_amount` - Liquidity tokens being burned
/// * `reserves` - Current reserve snapshot
/// * `total_liquidity` - Current total supply of liquidity tokens
///
/// # Returns
/// The pro-rata base and token amounts, floored. Burning liquidity for
/// nothing on both sides is rejected.
pub fn quote_remove_liquidity(
    liquidity_amount: u128,
    reserves: &ReserveState,
    total_liquidity: u128,
) -> Result<RemoveLiquidityQuote, ErrorCode> {
    if liquidity_amount == 0 || liquidity_amount > total_liquidity {
        warn!(liquidity_amount, total_liquidity, "withdrawal exceeds supply");
        return Err(ErrorCode::InsufficientLiquidity);
    }

    let base_amount_out = mul_div(liquidity_amount, reserves.base_reserve, total_liquidity)?;
    let token_amount_out = mul_div(liquidity_amount, reserves.token_reserve, total_liquidity)?;
    if base_amount_out == 0 && token_amount_out == 0 {
        warn!(liquidity_amount, total_liquidity, "withdrawal yields nothing");
        return Err(ErrorCode::ZeroTokenOutput);
    }
    debug!(
        liquidity_amount,
        base_amount_out,
        token_amount_out,
        "quoted withdrawal"
    );

    Ok(RemoveLiquidityQuote {
        base_amount_out,
        token_amount_out,
    })
}

/// Share of the pool, in percent, held by `liquidity_amount`.
pub fn pool_share_percent(liquidity_amount: u128, total_liquidity: u128) -> f64 {
    if total_liquidity == 0 {
        return 0.0;
    }
    liquidity_amount as f64 / total_liquidity as f64 * 100.0
}

impl LiquidityPosition {
    pub fn new(owner: Address, liquidity_tokens: u128) -> Self {
        Self {
            owner,
            liquidity_tokens,
        }
    }

    pub fn share_percent(&self, total_liquidity: u128) -> f64 {
        pool_share_percent(self.liquidity_tokens, total_liquidity)
    }

    /// Like [`quote_remove_liquidity`], but also bounded by this position's holdings.
    pub fn quote_withdrawal(
        &self,
        liquidity_amount: u128,
        reserves: &ReserveState,
        total_liquidity: u128,
    ) -> Result<RemoveLiquidityQuote, ErrorCode> {
        if liquidity_amount > self.liquidity_tokens {
            warn!(
                owner = %self.owner,
                liquidity_amount,
                held = self.liquidity_tokens,
                "withdrawal exceeds holdings"
            );
            return Err(ErrorCode::InsufficientLiquidity);
        }
        quote_remove_liquidity(liquidity_amount, reserves, total_liquidity)
    }
}
