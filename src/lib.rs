//! Exchange Math Library
//!
//! Constant-product pricing and liquidity accounting mirrored from the
//! factory/exchange contracts, plus the typed seams (ledger reads, factory
//! lookups, transaction submission) an application drives them through.

pub mod config;
pub mod constants;
pub mod errors;
pub mod ledger;
pub mod liquidity;
pub mod session;
pub mod state;
pub mod swap;
pub mod tx;
pub mod utils;
// Re-export functions for convenience
pub use config::{ConfigError, DexConfig};
pub use constants::*;
pub use errors::ErrorCode;
pub use ledger::{
    Action, Confirmation, ExchangeFactory, Ledger, LedgerError, MemoryLedger, Outcome,
    PreparedCall, TransactionSubmitter,
};
pub use liquidity::{pool_share_percent, quote_add_liquidity, quote_remove_liquidity};
pub use session::ExchangeSession;
pub use state::{
    AddLiquidityQuote, Address, AmmConfig, Asset, InitialMint, LiquidityPosition, PairId,
    PoolStatus, RemoveLiquidityQuote, ReserveState, SwapDirection, SwapQuote,
};
pub use swap::{price_impact, quote_output, quote_swap};
pub use tx::{TxState, TxTracker};
pub use utils::{calculate_deadline, format_units, minimum_output, parse_units};
