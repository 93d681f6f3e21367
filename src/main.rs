use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use exchange_math::{
    format_units, parse_units, pool_share_percent, quote_add_liquidity, quote_remove_liquidity,
    quote_swap, Address, Asset, DexConfig, ErrorCode, ExchangeFactory, ExchangeSession,
    MemoryLedger, ReserveState, SwapDirection,
};

#[derive(Parser)]
#[command(
    name = "exchange-math",
    about = "Quote swaps and liquidity changes for a constant-product exchange"
)]
struct Cli {
    /// TOML file overriding fee, slippage, deadline and decimals
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Quote a swap against the given reserves
    Swap {
        #[arg(long)]
        base_reserve: String,
        #[arg(long)]
        token_reserve: String,
        /// Amount sold, in the input asset's units
        #[arg(long)]
        amount: String,
        /// Sell tokens for the base asset instead of the reverse
        #[arg(long)]
        sell_token: bool,
    },
    /// Quote a liquidity deposit
    Add {
        #[arg(long, default_value = "0")]
        base_reserve: String,
        #[arg(long, default_value = "0")]
        token_reserve: String,
        #[arg(long, default_value = "0")]
        total_liquidity: String,
        #[arg(long)]
        base: String,
        #[arg(long)]
        token: String,
    },
    /// Quote a liquidity withdrawal
    Remove {
        #[arg(long)]
        base_reserve: String,
        #[arg(long)]
        token_reserve: String,
        #[arg(long)]
        total_liquidity: String,
        #[arg(long)]
        liquidity: String,
    },
    /// Pool share of a liquidity amount
    Share {
        #[arg(long)]
        liquidity: String,
        #[arg(long)]
        total_liquidity: String,
    },
    /// Create an exchange, deposit, swap and withdraw against an in-memory ledger
    Simulate {
        #[arg(long, default_value = "10")]
        base: String,
        #[arg(long, default_value = "15")]
        token: String,
        #[arg(long, default_value = "1")]
        swap: String,
    },
}

fn math<T>(result: Result<T, ErrorCode>) -> Result<T> {
    result.map_err(|code| anyhow!("{code}"))
}

fn units(text: &str, decimals: u8) -> Result<u128> {
    math(parse_units(text, decimals)).with_context(|| format!("invalid amount {text:?}"))
}

fn show(amount: u128, decimals: u8) -> Result<String> {
    math(format_units(amount, decimals))
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before unix epoch")?
        .as_secs())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => DexConfig::load(path)?,
        None => DexConfig::default(),
    };
    let (base_decimals, token_decimals) = (config.base_decimals, config.token_decimals);

    match cli.command {
        Command::Swap {
            base_reserve,
            token_reserve,
            amount,
            sell_token,
        } => {
            let reserves = ReserveState::new(
                units(&base_reserve, base_decimals)?,
                units(&token_reserve, token_decimals)?,
            );
            let (direction, in_decimals, out_decimals) = if sell_token {
                (SwapDirection::TokenToBase, token_decimals, base_decimals)
            } else {
                (SwapDirection::BaseToToken, base_decimals, token_decimals)
            };
            let input = units(&amount, in_decimals)?;
            let quote = math(quote_swap(
                &reserves,
                direction,
                input,
                config.slippage_bps,
                &config.amm,
            ))?;
            println!("output:        {}", show(quote.output_amount, out_decimals)?);
            println!("minimum:       {}", show(quote.minimum_output, out_decimals)?);
            println!("trade fee:     {}", show(quote.trade_fee, in_decimals)?);
            println!("price impact:  {:.4}%", quote.price_impact_percent);
        }
        Command::Add {
            base_reserve,
            token_reserve,
            total_liquidity,
            base,
            token,
        } => {
            let reserves = ReserveState::new(
                units(&base_reserve, base_decimals)?,
                units(&token_reserve, token_decimals)?,
            );
            let total = units(&total_liquidity, base_decimals)?;
            let quote = math(quote_add_liquidity(
                units(&base, base_decimals)?,
                units(&token, token_decimals)?,
                &reserves,
                total,
                &config.amm,
            ))?;
            println!(
                "token required:   {}",
                show(quote.token_amount_required, token_decimals)?
            );
            println!(
                "liquidity minted: {}",
                show(quote.liquidity_minted, base_decimals)?
            );
            println!(
                "pool share:       {:.4}%",
                pool_share_percent(
                    quote.liquidity_minted,
                    total.saturating_add(quote.liquidity_minted)
                )
            );
        }
        Command::Remove {
            base_reserve,
            token_reserve,
            total_liquidity,
            liquidity,
        } => {
            let reserves = ReserveState::new(
                units(&base_reserve, base_decimals)?,
                units(&token_reserve, token_decimals)?,
            );
            let quote = math(quote_remove_liquidity(
                units(&liquidity, base_decimals)?,
                &reserves,
                units(&total_liquidity, base_decimals)?,
            ))?;
            println!("base out:  {}", show(quote.base_amount_out, base_decimals)?);
            println!("token out: {}", show(quote.token_amount_out, token_decimals)?);
        }
        Command::Share {
            liquidity,
            total_liquidity,
        } => {
            let share = pool_share_percent(
                units(&liquidity, base_decimals)?,
                units(&total_liquidity, base_decimals)?,
            );
            println!("{share:.4}%");
        }
        Command::Simulate { base, token, swap } => {
            simulate(config, &base, &token, &swap)?;
        }
    }

    Ok(())
}

fn simulate(config: DexConfig, base: &str, token: &str, swap: &str) -> Result<()> {
    let (base_decimals, token_decimals) = (config.base_decimals, config.token_decimals);
    let token_address: Address = math("0x1c7d4b196cb0c7b01d743fbc6116a902379c7238".parse())?;
    let sender = Address([0x01; 20]);

    let mut ledger = MemoryLedger::new(config.amm);
    let now = unix_now()?;
    ledger.set_time(now);
    let pair = ledger.create_exchange(&token_address)?;
    println!("exchange {pair} created for token {token_address}");

    let base_amount = units(base, base_decimals)?;
    let token_amount = units(token, token_decimals)?;
    let swap_amount = units(swap, base_decimals)?;
    ledger.fund(sender, Asset::Base, base_amount.saturating_add(swap_amount))?;
    ledger.fund(sender, Asset::Token(token_address), token_amount)?;

    let mut session = ExchangeSession::open(&ledger, token_address, sender, config)?;
    let approve = session.prepare_approve(token_amount, now);
    session.execute(&mut ledger, &approve)?;

    let deposit = math(session.prepare_add_liquidity(base_amount, token_amount, now))?;
    session.execute(&mut ledger, &deposit)?;
    let reserves = session.reserves();
    println!(
        "deposited: reserves {} / {}",
        show(reserves.base_reserve, base_decimals)?,
        show(reserves.token_reserve, token_decimals)?
    );

    let sell = math(session.prepare_swap(SwapDirection::BaseToToken, swap_amount, now))?;
    let confirmation = session.execute(&mut ledger, &sell)?;
    println!("swap confirmed: {:?}", confirmation.outcome);

    let held = session.total_liquidity();
    let withdraw = math(session.prepare_remove_liquidity(held, now))?;
    let confirmation = session.execute(&mut ledger, &withdraw)?;
    println!("withdrawal confirmed: {:?}", confirmation.outcome);
    println!("pool status: {:?}", session.reserves().status());

    let (base_held, token_held) = session.balances(&ledger)?;
    println!(
        "wallet: {} base / {} token",
        show(base_held, base_decimals)?,
        show(token_held, token_decimals)?
    );

    Ok(())
}
