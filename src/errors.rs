use anchor_lang::prelude::error_code;

#[error_code]
pub enum ErrorCode {
    #[msg("Invalid input")]
    InvalidInput,
    #[msg("Token amount does not preserve the pool ratio")]
    RatioMismatch,
    #[msg("Liquidity amount exceeds holdings or total supply")]
    InsufficientLiquidity,
    #[msg("Reserve would become negative")]
    NegativeReserve,
    #[msg("Pool is uninitialized, reserves are zero")]
    ZeroReserves,
    #[msg("Math overflow")]
    MathOverflow,
    #[msg("Slippage tolerance exceeded")]
    SlippageExceeded,
    #[msg("Deadline expired")]
    DeadlineExpired,
    #[msg("Invalid transaction state transition")]
    InvalidTransition,
    #[msg("Output is zero")]
    OutputIsZero,
    #[msg("Liquidity too low")]
    LiquidityTooLow,
    #[msg("Liquidity tokens did not yield any pair tokens")]
    ZeroTokenOutput,
}
