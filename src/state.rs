use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::{ErrorCode, DEFAULT_RATIO_CHANGE_TOLERANCE_RATE, DEFAULT_TRADE_FEE_RATE};

/// How liquidity is minted for the first deposit into an empty exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialMint {
    /// Mint exactly the base amount deposited (factory/exchange contract behaviour).
    #[default]
    BaseAmount,
    /// Mint `sqrt(base * token)`.
    GeometricMean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmmConfig {
    pub trade_fee_rate: u64,              // 10^6 = 100%
    pub ratio_change_tolerance_rate: u64, // 10^6 = 100%
    pub initial_mint: InitialMint,
}

impl Default for AmmConfig {
    fn default() -> Self {
        Self {
            trade_fee_rate: DEFAULT_TRADE_FEE_RATE,
            ratio_change_tolerance_rate: DEFAULT_RATIO_CHANGE_TOLERANCE_RATE,
            initial_mint: InitialMint::default(),
        }
    }
}

/// 20-byte account address (wallet, token or exchange contract).
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, BorshSerialize, BorshDeserialize,
)]
pub struct Address(pub [u8; 20]);

/// An exchange is identified by its contract address.
pub type PairId = Address;

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl FromStr for Address {
    type Err = ErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| ErrorCode::InvalidInput)?;
        Ok(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Something an account can hold: the chain's base asset or a token contract's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Asset {
    Base,
    Token(Address),
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Base => write!(f, "base asset"),
            Asset::Token(token) => write!(f, "token {token}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub enum SwapDirection {
    /// Sell base asset (ETH), receive tokens.
    BaseToToken,
    /// Sell tokens, receive base asset.
    TokenToBase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    Uninitialized,
    Active,
}

/// Snapshot of one exchange's reserves, in base units.
///
/// Snapshots are values: every transition returns a new one and leaves
/// `self` untouched, so a failed computation never corrupts the caller's copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct ReserveState {
    pub base_reserve: u128,
    pub token_reserve: u128,
}

impl ReserveState {
    pub const EMPTY: ReserveState = ReserveState {
        base_reserve: 0,
        token_reserve: 0,
    };

    pub fn new(base_reserve: u128, token_reserve: u128) -> Self {
        Self {
            base_reserve,
            token_reserve,
        }
    }

    pub fn status(&self) -> PoolStatus {
        if self.base_reserve > 0 && self.token_reserve > 0 {
            PoolStatus::Active
        } else {
            PoolStatus::Uninitialized
        }
    }

    pub fn is_active(&self) -> bool {
        self.status() == PoolStatus::Active
    }

    /// `(input_reserve, output_reserve)` for a swap in `direction`.
    pub fn oriented(&self, direction: SwapDirection) -> (u128, u128) {
        match direction {
            SwapDirection::BaseToToken => (self.base_reserve, self.token_reserve),
            SwapDirection::TokenToBase => (self.token_reserve, self.base_reserve),
        }
    }

    /// Marginal price in output units per input unit; 0 for an empty side.
    pub fn spot_price(&self, direction: SwapDirection) -> f64 {
        let (input_reserve, output_reserve) = self.oriented(direction);
        if input_reserve == 0 {
            return 0.0;
        }
        output_reserve as f64 / input_reserve as f64
    }

    pub fn with_deposit(&self, base_amount: u128, token_amount: u128) -> Result<Self, ErrorCode> {
        Ok(Self {
            base_reserve: self
                .base_reserve
                .checked_add(base_amount)
                .ok_or(ErrorCode::MathOverflow)?,
            token_reserve: self
                .token_reserve
                .checked_add(token_amount)
                .ok_or(ErrorCode::MathOverflow)?,
        })
    }

    pub fn with_withdrawal(
        &self,
        base_amount: u128,
        token_amount: u128,
    ) -> Result<Self, ErrorCode> {
        Ok(Self {
            base_reserve: self
                .base_reserve
                .checked_sub(base_amount)
                .ok_or(ErrorCode::NegativeReserve)?,
            token_reserve: self
                .token_reserve
                .checked_sub(token_amount)
                .ok_or(ErrorCode::NegativeReserve)?,
        })
    }

    /// Reserves after `input_amount` enters and `output_amount` leaves the pool.
    pub fn with_swap(
        &self,
        direction: SwapDirection,
        input_amount: u128,
        output_amount: u128,
    ) -> Result<Self, ErrorCode> {
        let (input_reserve, output_reserve) = self.oriented(direction);
        let input_reserve = input_reserve
            .checked_add(input_amount)
            .ok_or(ErrorCode::MathOverflow)?;
        let output_reserve = output_reserve
            .checked_sub(output_amount)
            .ok_or(ErrorCode::NegativeReserve)?;
        Ok(match direction {
            SwapDirection::BaseToToken => Self::new(input_reserve, output_reserve),
            SwapDirection::TokenToBase => Self::new(output_reserve, input_reserve),
        })
    }
}

/// A holder's share of an exchange, in liquidity tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityPosition {
    pub owner: Address,
    pub liquidity_tokens: u128,
}

pub struct SwapResult {
    /// Amount of source token swapped, after the trade fee
    pub from_amount: u128,
    /// Amount of destination token swapped
    pub to_amount: u128,

    pub trade_fee: u128,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapQuote {
    pub direction: SwapDirection,
    pub input_amount: u128,
    pub output_amount: u128,
    pub trade_fee: u128,
    pub price_impact_percent: f64,
    /// Output bound to submit with the swap, after slippage.
    pub minimum_output: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddLiquidityQuote {
    pub token_amount_required: u128,
    pub liquidity_minted: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveLiquidityQuote {
    pub base_amount_out: u128,
    pub token_amount_out: u128,
}
