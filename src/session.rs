//! Per-exchange application state.
//!
//! A session owns the last reserve snapshot it read and the transaction it
//! has in flight. Methods that touch the chain take `&mut self`, so calls for
//! one exchange are serialized while sessions for other exchanges proceed
//! independently.

use tracing::{debug, info, warn};

use crate::{
    config::DexConfig,
    ledger::{
        Action, Confirmation, ExchangeFactory, Ledger, LedgerError, PreparedCall,
        TransactionSubmitter,
    },
    liquidity::{pool_share_percent, quote_add_liquidity, quote_remove_liquidity},
    state::{
        AddLiquidityQuote, Address, Asset, PairId, RemoveLiquidityQuote, ReserveState,
        SwapDirection, SwapQuote,
    },
    swap::quote_swap,
    tx::{TxState, TxTracker},
    utils::{calculate_deadline, minimum_output},
    ErrorCode,
};

pub struct ExchangeSession {
    token: Address,
    pair: PairId,
    sender: Address,
    config: DexConfig,
    reserves: ReserveState,
    total_liquidity: u128,
    tracker: TxTracker,
}

impl ExchangeSession {
    /// Look up the exchange for `token` and take a first snapshot of it.
    pub fn open<L>(
        ledger: &L,
        token: Address,
        sender: Address,
        config: DexConfig,
    ) -> Result<Self, LedgerError>
    where
        L: Ledger + ExchangeFactory,
    {
        let pair = ledger
            .get_exchange(&token)?
            .ok_or(LedgerError::UnknownExchange(token))?;
        let mut session = Self {
            token,
            pair,
            sender,
            config,
            reserves: ReserveState::EMPTY,
            total_liquidity: 0,
            tracker: TxTracker::new(),
        };
        session.refresh(ledger)?;
        Ok(session)
    }

    pub fn refresh<L: Ledger>(&mut self, ledger: &L) -> Result<(), LedgerError> {
        self.reserves = ledger.get_reserves(&self.pair)?;
        self.total_liquidity = ledger.get_total_liquidity_supply(&self.pair)?;
        debug!(
            pair = %self.pair,
            base_reserve = self.reserves.base_reserve,
            token_reserve = self.reserves.token_reserve,
            total_liquidity = self.total_liquidity,
            "refreshed reserves"
        );
        Ok(())
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn pair(&self) -> PairId {
        self.pair
    }

    pub fn reserves(&self) -> ReserveState {
        self.reserves
    }

    pub fn total_liquidity(&self) -> u128 {
        self.total_liquidity
    }

    pub fn config(&self) -> &DexConfig {
        &self.config
    }

    pub fn tx_state(&self) -> &TxState {
        self.tracker.state()
    }

    /// The sender's wallet balances as `(base, token)`.
    pub fn balances<L: Ledger>(&self, ledger: &L) -> Result<(u128, u128), LedgerError> {
        Ok((
            ledger.balance_of(&self.sender, &Asset::Base)?,
            ledger.balance_of(&self.sender, &Asset::Token(self.token))?,
        ))
    }

    /// Tokens the exchange may still pull from the sender.
    pub fn allowance<L: Ledger>(&self, ledger: &L) -> Result<u128, LedgerError> {
        ledger.allowance(&self.token, &self.sender, &self.pair)
    }

    /// Share of the pool held by the session's sender, in percent.
    pub fn pool_share<L: Ledger>(&self, ledger: &L) -> Result<f64, LedgerError> {
        let held = ledger.liquidity_balance(&self.pair, &self.sender)?;
        Ok(pool_share_percent(held, self.total_liquidity))
    }

    pub fn quote_swap(
        &self,
        direction: SwapDirection,
        input_amount: u128,
    ) -> Result<SwapQuote, ErrorCode> {
        quote_swap(
            &self.reserves,
            direction,
            input_amount,
            self.config.slippage_bps,
            &self.config.amm,
        )
    }

    pub fn quote_add_liquidity(
        &self,
        base_amount: u128,
        token_amount: u128,
    ) -> Result<AddLiquidityQuote, ErrorCode> {
        quote_add_liquidity(
            base_amount,
            token_amount,
            &self.reserves,
            self.total_liquidity,
            &self.config.amm,
        )
    }

    pub fn quote_remove_liquidity(
        &self,
        liquidity_amount: u128,
    ) -> Result<RemoveLiquidityQuote, ErrorCode> {
        quote_remove_liquidity(liquidity_amount, &self.reserves, self.total_liquidity)
    }

    pub fn prepare_swap(
        &self,
        direction: SwapDirection,
        input_amount: u128,
        now: u64,
    ) -> Result<PreparedCall, ErrorCode> {
        let quote = self.quote_swap(direction, input_amount)?;
        Ok(self.prepared(
            Action::Swap {
                direction,
                input_amount,
                minimum_output: quote.minimum_output,
            },
            now,
        ))
    }

    pub fn prepare_add_liquidity(
        &self,
        base_amount: u128,
        token_amount: u128,
        now: u64,
    ) -> Result<PreparedCall, ErrorCode> {
        let quote = self.quote_add_liquidity(base_amount, token_amount)?;
        Ok(self.prepared(
            Action::AddLiquidity {
                base_amount,
                max_token_amount: token_amount.max(quote.token_amount_required),
            },
            now,
        ))
    }

    pub fn prepare_remove_liquidity(
        &self,
        liquidity_amount: u128,
        now: u64,
    ) -> Result<PreparedCall, ErrorCode> {
        let quote = self.quote_remove_liquidity(liquidity_amount)?;
        Ok(self.prepared(
            Action::RemoveLiquidity {
                liquidity_amount,
                minimum_base: minimum_output(quote.base_amount_out, self.config.slippage_bps)?,
                minimum_token: minimum_output(quote.token_amount_out, self.config.slippage_bps)?,
            },
            now,
        ))
    }

    /// Approval the exchange needs before it can pull `amount` tokens for a
    /// token sale or a deposit.
    pub fn prepare_approve(&self, amount: u128, now: u64) -> PreparedCall {
        self.prepared(Action::Approve { amount }, now)
    }

    fn prepared(&self, action: Action, now: u64) -> PreparedCall {
        PreparedCall {
            pair: self.pair,
            sender: self.sender,
            action,
            deadline: calculate_deadline(now, self.config.deadline_minutes),
        }
    }

    /// Submit `call`, then re-read the exchange once it is confirmed.
    ///
    /// The tracker moves to `Failed` when the submitter rejects the call; the
    /// previous snapshot is kept in that case. A confirmed call is returned as
    /// confirmed even if the follow-up read fails, leaving the snapshot stale
    /// until the next [`ExchangeSession::refresh`].
    pub fn execute<C>(
        &mut self,
        client: &mut C,
        call: &PreparedCall,
    ) -> Result<Confirmation, LedgerError>
    where
        C: Ledger + TransactionSubmitter,
    {
        if call.pair != self.pair {
            return Err(LedgerError::Rejected(format!(
                "call targets {} but session is bound to {}",
                call.pair, self.pair
            )));
        }
        if self.tracker.is_finished() {
            self.tracker.reset()?;
        }
        self.tracker.submit()?;

        match client.submit(call) {
            Ok(confirmation) => {
                self.tracker.confirm(confirmation.clone())?;
                info!(tx_id = confirmation.tx_id, pair = %self.pair, "confirmed");
                if let Err(err) = self.refresh(&*client) {
                    warn!(pair = %self.pair, %err, "refresh after confirmation failed");
                }
                Ok(confirmation)
            }
            Err(err) => {
                warn!(pair = %self.pair, %err, "submission failed");
                self.tracker.fail(err.to_string())?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MemoryLedger, Outcome};

    fn token() -> Address {
        Address([0x70; 20])
    }

    fn user() -> Address {
        Address([0x05; 20])
    }

    fn setup() -> (MemoryLedger, ExchangeSession) {
        let config = DexConfig::default();
        let mut ledger = MemoryLedger::new(config.amm);
        ledger.create_exchange(&token()).unwrap();
        ledger.fund(user(), Asset::Base, 10_000_000).unwrap();
        ledger.fund(user(), Asset::Token(token()), 10_000_000).unwrap();
        let session = ExchangeSession::open(&ledger, token(), user(), config).unwrap();
        ledger.submit(&session.prepare_approve(u128::MAX, 0)).unwrap();
        (ledger, session)
    }

    /// Delegates to a [`MemoryLedger`] but fails every read once a call lands.
    struct ReadsFailAfterSubmit {
        inner: MemoryLedger,
        down: bool,
    }

    impl ReadsFailAfterSubmit {
        fn read(&self) -> Result<(), LedgerError> {
            if self.down {
                return Err(LedgerError::Rejected("node unavailable".to_string()));
            }
            Ok(())
        }
    }

    impl Ledger for ReadsFailAfterSubmit {
        fn get_reserves(&self, pair: &PairId) -> Result<ReserveState, LedgerError> {
            self.read()?;
            self.inner.get_reserves(pair)
        }

        fn get_total_liquidity_supply(&self, pair: &PairId) -> Result<u128, LedgerError> {
            self.read()?;
            self.inner.get_total_liquidity_supply(pair)
        }

        fn liquidity_balance(&self, pair: &PairId, owner: &Address) -> Result<u128, LedgerError> {
            self.read()?;
            self.inner.liquidity_balance(pair, owner)
        }

        fn balance_of(&self, owner: &Address, asset: &Asset) -> Result<u128, LedgerError> {
            self.read()?;
            self.inner.balance_of(owner, asset)
        }

        fn allowance(
            &self,
            token: &Address,
            owner: &Address,
            spender: &PairId,
        ) -> Result<u128, LedgerError> {
            self.read()?;
            self.inner.allowance(token, owner, spender)
        }
    }

    impl TransactionSubmitter for ReadsFailAfterSubmit {
        fn submit(&mut self, call: &PreparedCall) -> Result<Confirmation, LedgerError> {
            let confirmation = self.inner.submit(call)?;
            self.down = true;
            Ok(confirmation)
        }
    }

    #[test]
    fn test_open_unknown_exchange() {
        let ledger = MemoryLedger::new(DexConfig::default().amm);
        let result = ExchangeSession::open(&ledger, token(), user(), DexConfig::default());
        assert!(matches!(result, Err(LedgerError::UnknownExchange(_))));
    }

    #[test]
    fn test_swap_on_empty_exchange() {
        let (_, session) = setup();
        assert!(matches!(
            session.prepare_swap(SwapDirection::BaseToToken, 10, 0),
            Err(ErrorCode::ZeroReserves)
        ));
    }

    #[test]
    fn test_execute_refreshes_snapshot() {
        let (mut ledger, mut session) = setup();
        let call = session.prepare_add_liquidity(10_000, 15_000, 0).unwrap();
        assert_eq!(call.deadline, 20 * 60);

        session.execute(&mut ledger, &call).unwrap();
        assert_eq!(session.reserves(), ReserveState::new(10_000, 15_000));
        assert_eq!(session.total_liquidity(), 10_000);
        assert!(matches!(session.tx_state(), TxState::Confirmed(_)));
        assert_eq!(session.pool_share(&ledger).unwrap(), 100.0);
        assert_eq!(
            session.balances(&ledger).unwrap(),
            (10_000_000 - 10_000, 10_000_000 - 15_000)
        );
    }

    #[test]
    fn test_zero_output_swap_not_prepared() {
        let (mut ledger, mut session) = setup();
        let seed = session.prepare_add_liquidity(1_000_000, 1_000, 0).unwrap();
        session.execute(&mut ledger, &seed).unwrap();

        assert!(matches!(
            session.prepare_swap(SwapDirection::BaseToToken, 500, 0),
            Err(ErrorCode::OutputIsZero)
        ));
        assert_eq!(session.reserves(), ReserveState::new(1_000_000, 1_000));
    }

    #[test]
    fn test_token_sale_after_approval() {
        let (mut ledger, mut session) = setup();
        let seed = session.prepare_add_liquidity(10_000, 15_000, 0).unwrap();
        session.execute(&mut ledger, &seed).unwrap();

        let revoke = session.prepare_approve(0, 0);
        session.execute(&mut ledger, &revoke).unwrap();
        assert_eq!(session.allowance(&ledger).unwrap(), 0);
        let sell = session.prepare_swap(SwapDirection::TokenToBase, 1_500, 0).unwrap();
        assert!(matches!(
            session.execute(&mut ledger, &sell),
            Err(LedgerError::InsufficientAllowance { .. })
        ));

        let approve = session.prepare_approve(1_500, 0);
        session.execute(&mut ledger, &approve).unwrap();
        session.execute(&mut ledger, &sell).unwrap();
        assert_eq!(session.allowance(&ledger).unwrap(), 0);
        assert_eq!(session.reserves().token_reserve, 16_500);
    }

    #[test]
    fn test_failed_submission_keeps_snapshot() {
        let (mut ledger, mut session) = setup();
        let seed = session.prepare_add_liquidity(10_000, 15_000, 0).unwrap();
        session.execute(&mut ledger, &seed).unwrap();

        ledger.set_time(10_000);
        let stale = session.prepare_swap(SwapDirection::BaseToToken, 100, 0).unwrap();
        let err = session.execute(&mut ledger, &stale).unwrap_err();
        assert!(matches!(err, LedgerError::Math(ErrorCode::DeadlineExpired)));
        assert!(matches!(session.tx_state(), TxState::Failed(_)));
        assert_eq!(session.reserves(), ReserveState::new(10_000, 15_000));

        // the next call starts from a clean tracker
        let fresh = session.prepare_swap(SwapDirection::BaseToToken, 100, 10_000).unwrap();
        session.execute(&mut ledger, &fresh).unwrap();
        assert!(matches!(session.tx_state(), TxState::Confirmed(_)));
    }

    #[test]
    fn test_confirmed_call_survives_failed_refresh() {
        let (ledger, mut session) = setup();
        let mut client = ReadsFailAfterSubmit {
            inner: ledger,
            down: false,
        };
        let seed = session.prepare_add_liquidity(10_000, 15_000, 0).unwrap();

        let confirmation = session.execute(&mut client, &seed).unwrap();
        assert!(matches!(
            confirmation.outcome,
            Outcome::LiquidityAdded {
                liquidity_minted: 10_000,
                ..
            }
        ));
        assert!(matches!(session.tx_state(), TxState::Confirmed(_)));
        // the snapshot predates the deposit until a refresh succeeds
        assert_eq!(session.reserves(), ReserveState::EMPTY);

        client.down = false;
        session.refresh(&client).unwrap();
        assert_eq!(session.reserves(), ReserveState::new(10_000, 15_000));
    }

    #[test]
    fn test_call_for_other_exchange_rejected() {
        let (mut ledger, mut session) = setup();
        let mut call = session.prepare_add_liquidity(10, 15, 0).unwrap();
        call.pair = Address([0x99; 20]);
        assert!(matches!(
            session.execute(&mut ledger, &call),
            Err(LedgerError::Rejected(_))
        ));
        assert_eq!(session.tx_state(), &TxState::Idle);
    }
}
