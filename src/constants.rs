/// Denominator for every `*_rate` field: 10^6 = 100%.
pub const MAX_PERCENTAGE: u64 = 1_000_000;

/// 0.3% trade fee, taken from the input side of every swap.
pub const DEFAULT_TRADE_FEE_RATE: u64 = 3_000;

/// 1% allowed drift between supplied and required token amount on deposit.
pub const DEFAULT_RATIO_CHANGE_TOLERANCE_RATE: u64 = 10_000;

/// Basis points scale (10,000 bps = 100%), used for slippage.
pub const BPS_SCALE: u64 = 10_000;

pub const DEFAULT_SLIPPAGE_BPS: u64 = 50;

pub const DEFAULT_DEADLINE_MINUTES: u64 = 20;

pub const ETH_DECIMALS: u8 = 18;
