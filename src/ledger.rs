//! Seams to the external chain: reads, the exchange factory, and the signer.
//!
//! [`MemoryLedger`] implements all three in memory, executing calls with the
//! same integer math the exchange contract uses. Accounts hold base and token
//! balances, and an exchange can only pull tokens an owner has approved.

use std::collections::{BTreeMap, HashMap};

use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    liquidity::quote_add_liquidity,
    state::{Address, Asset, LiquidityPosition, PairId, ReserveState, SwapDirection},
    swap::quote_output,
    utils::mul_div,
    AmmConfig, ErrorCode,
};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no exchange registered for token {0}")]
    UnknownExchange(Address),
    #[error("exchange already exists for token {0}")]
    ExchangeExists(Address),
    #[error("{0}")]
    Math(ErrorCode),
    #[error("{owner} holds {available} of {asset}, needs {required}")]
    InsufficientBalance {
        owner: Address,
        asset: Asset,
        required: u128,
        available: u128,
    },
    #[error("exchange {spender} may pull {available} tokens from {owner}, needs {required}")]
    InsufficientAllowance {
        owner: Address,
        spender: PairId,
        required: u128,
        available: u128,
    },
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("call encoding error: {0}")]
    Encoding(#[from] std::io::Error),
}

impl From<ErrorCode> for LedgerError {
    fn from(code: ErrorCode) -> Self {
        LedgerError::Math(code)
    }
}

/// Read-only view of exchange state. Eventually consistent with the chain.
pub trait Ledger {
    fn get_reserves(&self, pair: &PairId) -> Result<ReserveState, LedgerError>;

    fn get_total_liquidity_supply(&self, pair: &PairId) -> Result<u128, LedgerError>;

    fn liquidity_balance(&self, pair: &PairId, owner: &Address) -> Result<u128, LedgerError>;

    /// Wallet balance of `owner` in `asset`.
    fn balance_of(&self, owner: &Address, asset: &Asset) -> Result<u128, LedgerError>;

    /// Tokens of `token` that `spender` may still pull from `owner`.
    fn allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &PairId,
    ) -> Result<u128, LedgerError>;
}

/// Token to exchange registry.
pub trait ExchangeFactory {
    fn get_exchange(&self, token: &Address) -> Result<Option<PairId>, LedgerError>;

    /// Reverse lookup: the token an exchange trades.
    fn get_token(&self, pair: &PairId) -> Result<Option<Address>, LedgerError>;

    fn create_exchange(&mut self, token: &Address) -> Result<PairId, LedgerError>;
}

pub trait TransactionSubmitter {
    fn submit(&mut self, call: &PreparedCall) -> Result<Confirmation, LedgerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Action {
    Swap {
        direction: SwapDirection,
        input_amount: u128,
        minimum_output: u128,
    },
    AddLiquidity {
        base_amount: u128,
        max_token_amount: u128,
    },
    RemoveLiquidity {
        liquidity_amount: u128,
        minimum_base: u128,
        minimum_token: u128,
    },
    /// Let the exchange pull up to `amount` of its token from the sender.
    /// Replaces any previous allowance.
    Approve { amount: u128 },
}

/// A call ready for signing: what to do, on which exchange, and until when.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PreparedCall {
    pub pair: PairId,
    pub sender: Address,
    pub action: Action,
    /// Unix timestamp after which the call must be rejected.
    pub deadline: u64,
}

impl PreparedCall {
    pub fn encode(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(self.try_to_vec()?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, LedgerError> {
        Ok(Self::try_from_slice(bytes)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Swapped {
        input_amount: u128,
        output_amount: u128,
    },
    LiquidityAdded {
        base_amount: u128,
        token_amount: u128,
        liquidity_minted: u128,
    },
    LiquidityRemoved {
        base_amount: u128,
        token_amount: u128,
    },
    Approved {
        amount: u128,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_id: u64,
    pub outcome: Outcome,
}

struct Pool {
    token: Address,
    reserves: ReserveState,
    positions: BTreeMap<Address, u128>,
}

impl Pool {
    /// Supply is derived from positions, so the two can never disagree.
    fn total_supply(&self) -> u128 {
        self.positions.values().sum()
    }

    fn position(&self, owner: &Address) -> LiquidityPosition {
        LiquidityPosition::new(*owner, self.positions.get(owner).copied().unwrap_or(0))
    }
}

#[derive(Default)]
struct Balances {
    holdings: BTreeMap<(Address, Asset), u128>,
    /// `(token, owner, spender)` to remaining allowance.
    allowances: BTreeMap<(Address, Address, PairId), u128>,
}

impl Balances {
    fn balance(&self, owner: &Address, asset: &Asset) -> u128 {
        self.holdings.get(&(*owner, *asset)).copied().unwrap_or(0)
    }

    fn allowance(&self, token: &Address, owner: &Address, spender: &PairId) -> u128 {
        self.allowances
            .get(&(*token, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, token: Address, owner: Address, spender: PairId, amount: u128) {
        self.allowances.insert((token, owner, spender), amount);
    }

    fn credit(&mut self, owner: Address, asset: Asset, amount: u128) -> Result<(), LedgerError> {
        let held = self.holdings.entry((owner, asset)).or_insert(0);
        *held = held.checked_add(amount).ok_or(ErrorCode::MathOverflow)?;
        Ok(())
    }

    /// Move `owner`'s funds for one call made to `spender`.
    ///
    /// Base debits travel with the call; token debits are pulled by the
    /// exchange and consume allowance. Every check runs before anything
    /// changes. Assets within one call must be distinct.
    fn settle(
        &mut self,
        owner: Address,
        spender: PairId,
        debits: &[(Asset, u128)],
        credits: &[(Asset, u128)],
    ) -> Result<(), LedgerError> {
        for &(asset, required) in debits {
            let available = self.balance(&owner, &asset);
            if available < required {
                return Err(LedgerError::InsufficientBalance {
                    owner,
                    asset,
                    required,
                    available,
                });
            }
            if let Asset::Token(token) = asset {
                let available = self.allowance(&token, &owner, &spender);
                if available < required {
                    return Err(LedgerError::InsufficientAllowance {
                        owner,
                        spender,
                        required,
                        available,
                    });
                }
            }
        }
        for &(asset, amount) in credits {
            self.balance(&owner, &asset)
                .checked_add(amount)
                .ok_or(ErrorCode::MathOverflow)?;
        }

        for &(asset, amount) in debits {
            if let Some(held) = self.holdings.get_mut(&(owner, asset)) {
                *held -= amount;
            }
            if let Asset::Token(token) = asset {
                if let Some(allowed) = self.allowances.get_mut(&(token, owner, spender)) {
                    *allowed -= amount;
                }
            }
        }
        for &(asset, amount) in credits {
            self.credit(owner, asset, amount)?;
        }
        Ok(())
    }
}

pub struct MemoryLedger {
    config: AmmConfig,
    now: u64,
    next_tx_id: u64,
    exchanges: BTreeMap<Address, PairId>,
    pools: HashMap<PairId, Pool>,
    balances: Balances,
}

impl MemoryLedger {
    pub fn new(config: AmmConfig) -> Self {
        Self {
            config,
            now: 0,
            next_tx_id: 1,
            exchanges: BTreeMap::new(),
            pools: HashMap::new(),
            balances: Balances::default(),
        }
    }

    /// Credit `owner` with `amount` of `asset` out of thin air.
    pub fn fund(&mut self, owner: Address, asset: Asset, amount: u128) -> Result<(), LedgerError> {
        self.balances.credit(owner, asset, amount)
    }

    /// Clock used for deadline checks.
    pub fn set_time(&mut self, now: u64) {
        self.now = now;
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn positions(&self, pair: &PairId) -> Result<Vec<LiquidityPosition>, LedgerError> {
        let pool = self.pool(pair)?;
        Ok(pool
            .positions
            .iter()
            .map(|(owner, amount)| LiquidityPosition::new(*owner, *amount))
            .collect())
    }

    fn pool(&self, pair: &PairId) -> Result<&Pool, LedgerError> {
        self.pools
            .get(pair)
            .ok_or(LedgerError::UnknownExchange(*pair))
    }

    fn exchange_address(index: u64) -> Address {
        let mut bytes = [0u8; 20];
        bytes[0] = 0xee;
        bytes[12..].copy_from_slice(&index.to_be_bytes());
        Address(bytes)
    }

    fn execute(&mut self, call: &PreparedCall) -> Result<Outcome, LedgerError> {
        if self.now > call.deadline {
            return Err(ErrorCode::DeadlineExpired.into());
        }
        let config = self.config;
        let pool = self
            .pools
            .get_mut(&call.pair)
            .ok_or(LedgerError::UnknownExchange(call.pair))?;
        let total_supply = pool.total_supply();

        match call.action {
            Action::Swap {
                direction,
                input_amount,
                minimum_output,
            } => {
                if !pool.reserves.is_active() {
                    return Err(ErrorCode::ZeroReserves.into());
                }
                let (input_reserve, output_reserve) = pool.reserves.oriented(direction);
                let output_amount =
                    quote_output(input_amount, input_reserve, output_reserve, &config)?;
                if output_amount == 0 {
                    return Err(ErrorCode::OutputIsZero.into());
                }
                if output_amount < minimum_output {
                    return Err(ErrorCode::SlippageExceeded.into());
                }
                let reserves = pool
                    .reserves
                    .with_swap(direction, input_amount, output_amount)?;
                let token = Asset::Token(pool.token);
                let (sold, bought) = match direction {
                    SwapDirection::BaseToToken => (Asset::Base, token),
                    SwapDirection::TokenToBase => (token, Asset::Base),
                };
                self.balances.settle(
                    call.sender,
                    call.pair,
                    &[(sold, input_amount)],
                    &[(bought, output_amount)],
                )?;
                pool.reserves = reserves;
                Ok(Outcome::Swapped {
                    input_amount,
                    output_amount,
                })
            }
            Action::AddLiquidity {
                base_amount,
                max_token_amount,
            } => {
                let token_amount = if total_supply == 0 {
                    max_token_amount
                } else {
                    if !pool.reserves.is_active() {
                        return Err(ErrorCode::ZeroReserves.into());
                    }
                    let required = mul_div(
                        base_amount,
                        pool.reserves.token_reserve,
                        pool.reserves.base_reserve,
                    )?;
                    if required > max_token_amount {
                        return Err(ErrorCode::SlippageExceeded.into());
                    }
                    required
                };
                let quote = quote_add_liquidity(
                    base_amount,
                    token_amount,
                    &pool.reserves,
                    total_supply,
                    &config,
                )?;
                let reserves = pool
                    .reserves
                    .with_deposit(base_amount, quote.token_amount_required)?;
                self.balances.settle(
                    call.sender,
                    call.pair,
                    &[
                        (Asset::Base, base_amount),
                        (Asset::Token(pool.token), quote.token_amount_required),
                    ],
                    &[],
                )?;
                pool.reserves = reserves;
                *pool.positions.entry(call.sender).or_insert(0) += quote.liquidity_minted;
                Ok(Outcome::LiquidityAdded {
                    base_amount,
                    token_amount: quote.token_amount_required,
                    liquidity_minted: quote.liquidity_minted,
                })
            }
            Action::RemoveLiquidity {
                liquidity_amount,
                minimum_base,
                minimum_token,
            } => {
                let position = pool.position(&call.sender);
                let quote =
                    position.quote_withdrawal(liquidity_amount, &pool.reserves, total_supply)?;
                if quote.base_amount_out < minimum_base || quote.token_amount_out < minimum_token {
                    return Err(ErrorCode::SlippageExceeded.into());
                }
                let reserves = pool
                    .reserves
                    .with_withdrawal(quote.base_amount_out, quote.token_amount_out)?;
                self.balances.settle(
                    call.sender,
                    call.pair,
                    &[],
                    &[
                        (Asset::Base, quote.base_amount_out),
                        (Asset::Token(pool.token), quote.token_amount_out),
                    ],
                )?;
                pool.reserves = reserves;
                let remaining = position.liquidity_tokens - liquidity_amount;
                if remaining == 0 {
                    pool.positions.remove(&call.sender);
                } else {
                    pool.positions.insert(call.sender, remaining);
                }
                Ok(Outcome::LiquidityRemoved {
                    base_amount: quote.base_amount_out,
                    token_amount: quote.token_amount_out,
                })
            }
            Action::Approve { amount } => {
                self.balances
                    .approve(pool.token, call.sender, call.pair, amount);
                Ok(Outcome::Approved { amount })
            }
        }
    }
}

impl Ledger for MemoryLedger {
    fn get_reserves(&self, pair: &PairId) -> Result<ReserveState, LedgerError> {
        Ok(self.pool(pair)?.reserves)
    }

    fn get_total_liquidity_supply(&self, pair: &PairId) -> Result<u128, LedgerError> {
        Ok(self.pool(pair)?.total_supply())
    }

    fn liquidity_balance(&self, pair: &PairId, owner: &Address) -> Result<u128, LedgerError> {
        Ok(self.pool(pair)?.position(owner).liquidity_tokens)
    }

    fn balance_of(&self, owner: &Address, asset: &Asset) -> Result<u128, LedgerError> {
        Ok(self.balances.balance(owner, asset))
    }

    fn allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &PairId,
    ) -> Result<u128, LedgerError> {
        Ok(self.balances.allowance(token, owner, spender))
    }
}

impl ExchangeFactory for MemoryLedger {
    fn get_exchange(&self, token: &Address) -> Result<Option<PairId>, LedgerError> {
        Ok(self.exchanges.get(token).copied())
    }

    fn get_token(&self, pair: &PairId) -> Result<Option<Address>, LedgerError> {
        Ok(self.pools.get(pair).map(|pool| pool.token))
    }

    fn create_exchange(&mut self, token: &Address) -> Result<PairId, LedgerError> {
        if token.is_zero() {
            return Err(ErrorCode::InvalidInput.into());
        }
        if self.exchanges.contains_key(token) {
            return Err(LedgerError::ExchangeExists(*token));
        }
        let pair = Self::exchange_address(self.exchanges.len() as u64 + 1);
        self.exchanges.insert(*token, pair);
        self.pools.insert(
            pair,
            Pool {
                token: *token,
                reserves: ReserveState::EMPTY,
                positions: BTreeMap::new(),
            },
        );
        info!(%token, exchange = %pair, "exchange created");
        Ok(pair)
    }
}

impl TransactionSubmitter for MemoryLedger {
    fn submit(&mut self, call: &PreparedCall) -> Result<Confirmation, LedgerError> {
        debug!(pair = %call.pair, action = ?call.action, "executing call");
        match self.execute(call) {
            Ok(outcome) => {
                let tx_id = self.next_tx_id;
                self.next_tx_id += 1;
                let token = self.pools.get(&call.pair).map(|pool| pool.token);
                info!(tx_id, pair = %call.pair, ?token, ?outcome, "transaction confirmed");
                Ok(Confirmation { tx_id, outcome })
            }
            Err(err) => {
                warn!(pair = %call.pair, %err, "transaction reverted");
                Err(err)
            }
        }
    }
}
