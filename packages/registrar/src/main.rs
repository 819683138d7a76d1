//! Helix relayer registrar CLI
//!
//! - `helix-registrar register --group mainnet` registers every bridge of a group
//! - `helix-registrar plan --group mainnet` prints the calls without sending them

use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::utils::format_units;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use helix_chain::{ChainClient, EvmRpcClient, EvmSigner};
use tracing_subscriber::EnvFilter;

use registrar::dispatch::SafeServiceFactory;
use registrar::index::HelixIndexer;
use registrar::lock::{hash_intent, LockStore};
use registrar::pipeline::{dispatch_mode, load_groups, PreparedPlan};
use registrar::{Config, Definition, Registrar, RunSummary};

#[derive(Parser)]
#[command(name = "helix-registrar")]
#[command(about = "Register Helix LnBridge relayers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory holding definition.yml and bridges.<group>.yml
    #[arg(short, long, global = true)]
    datadir: Option<PathBuf>,

    /// Definition file (defaults to <datadir>/definition.yml)
    #[arg(long, global = true)]
    definition: Option<PathBuf>,

    /// Register group, may be repeated
    #[arg(short, long, global = true)]
    group: Vec<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register (or propose) every bridge of the groups
    Register,

    /// Print the planned calls without sending anything
    Plan,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*};

    let default = if verbose {
        "debug"
    } else {
        "info,helix_registrar=debug,registrar=debug"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

async fn async_main(cli: Cli) -> Result<()> {
    if cli.group.is_empty() {
        return Err(eyre!("missing group, please add --group"));
    }

    let config = Config::load(cli.datadir, cli.definition)?;
    config.validate()?;
    tracing::info!(
        datadir = %config.datadir.display(),
        lock_dir = %config.lock_dir.display(),
        groups = ?cli.group,
        "Configuration loaded"
    );

    let definition = Arc::new(
        Definition::load(&config.definition_path).wrap_err("Failed to load definition")?,
    );
    // every group is loaded up front so a broken include aborts before any send
    let groups =
        load_groups(&config.datadir, &cli.group).wrap_err("Failed to load register groups")?;

    let signer = EvmSigner::from_private_key(config.signer_key()?)?;
    let chain: Arc<dyn ChainClient> = Arc::new(EvmRpcClient::new(signer.clone()));
    let index = Arc::new(HelixIndexer::new((*definition).clone(), config.http_timeout)?);
    let backends = Arc::new(SafeServiceFactory::new(
        chain.clone(),
        signer,
        definition.clone(),
    ));
    let locks = LockStore::new(&config.lock_dir);
    let mut registrar = Registrar::new(definition, chain, index, backends, locks.clone());

    match cli.command {
        Commands::Register => {
            let mut summary = RunSummary::default();
            for (group, intents) in &groups {
                registrar.run_group(group, intents, &mut summary).await;
            }
            print_summary(&summary);
            if !summary.is_success() {
                return Err(eyre!("{} registration(s) failed", summary.failed.len()));
            }
        }
        Commands::Plan => {
            let mut failed = 0usize;
            for (group, intents) in &groups {
                println!("group {group}");
                for intent in intents {
                    let name = intent.identity_name();
                    let locked = locks.check(&name, &hash_intent(intent))?;
                    match registrar.prepare(intent).await {
                        Ok(prepared) => print_plan(&name, locked, intent, &prepared),
                        Err(e) => {
                            failed += 1;
                            println!("  {name}: failed: {e}");
                        }
                    }
                }
            }
            if failed > 0 {
                return Err(eyre!("{failed} plan(s) failed"));
            }
        }
    }

    Ok(())
}

fn print_plan(
    name: &str,
    locked: bool,
    intent: &registrar::RegistrationIntent,
    prepared: &PreparedPlan,
) {
    let ctx = &prepared.context;
    println!(
        "  {name} ({:?}{})",
        dispatch_mode(intent),
        if locked { ", locked" } else { "" }
    );
    println!("    relayer:  {}", ctx.relayer_address);
    let decimals = ctx.token(intent.bridge_type.margin_side()).decimals;
    let existing = format_units(prepared.existing_margin, decimals)
        .unwrap_or_else(|_| prepared.existing_margin.to_string());
    println!("    margin:   existing {existing}, {}", prepared.plan.margin);
    for step in &prepared.plan.steps {
        let chain = ctx.chain(step.side);
        println!(
            "    [{}:{}] {} -> {}",
            chain.code,
            chain.id,
            step.call.signature(),
            step.target_contract
        );
        println!("        calldata: {}", step.call.calldata());
        if !step.native_value.is_zero() {
            let value = format_units(step.native_value, ctx.token(step.side).decimals)
                .unwrap_or_else(|_| step.native_value.to_string());
            println!("        value:    {value} {}", chain.native_symbol);
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("Summary: {summary}");
    for (name, reason) in &summary.failed {
        println!("  FAILED {name}: {reason}");
    }
}
