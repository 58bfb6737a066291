use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use repute_registry::{run_bootstrap, RegistryConfig, ReputationRegistry};
use repute_types::{Address, RatingPreset, ReputationRecord};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Storage directory used when neither the config nor `--store` names one.
const DEFAULT_STORE_DIR: &str = "repute-data";

/// Command-line interface for the reputation registry
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// Path to a registry configuration file (TOML)
    #[clap(long, short, global = true)]
    config: Option<PathBuf>,

    /// Registry storage directory, overrides the config file
    #[clap(long, global = true)]
    store: Option<PathBuf>,

    /// Print results as JSON
    #[clap(long, global = true)]
    json: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

/// Who acts, and on whom, for the rating shortcuts
#[derive(Args, Debug)]
struct RateTarget {
    /// Address submitting the rating (defaults to the configured operator)
    #[clap(long)]
    caller: Option<Address>,

    /// Address being rated
    ratee: Address,
}

/// CLI commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Register the configured operator and apply the configured seed ratings
    Bootstrap,

    /// Register (or re-register) an address
    Register { address: Address },

    /// Register the caller itself
    RegisterSelf {
        #[clap(long)]
        caller: Option<Address>,
    },

    /// Register several addresses in order
    BatchRegister {
        #[clap(required = true)]
        addresses: Vec<Address>,
    },

    /// Submit a raw rating (values above the maximum are capped)
    Rate {
        #[clap(flatten)]
        target: RateTarget,
        rating: u64,
    },

    /// Submit the positive preset rating
    Positive(RateTarget),

    /// Submit the negative preset rating
    Negative(RateTarget),

    /// Submit the neutral preset rating
    Neutral(RateTarget),

    /// Overwrite a score without counting it as a rating
    SetScore {
        #[clap(long)]
        caller: Option<Address>,
        address: Address,
        score: u64,
    },

    /// Reset an address to the initial score with no ratings
    Reset {
        #[clap(long)]
        caller: Option<Address>,
        address: Address,
    },

    /// Show the full record for an address
    Show { address: Address },

    /// Show the score for an address
    Score { address: Address },

    /// Check whether an address is registered
    IsRegistered { address: Address },

    /// List registered addresses in registration order
    Users,

    /// Count registered addresses
    Total,

    /// Show scores for several addresses, in the given order
    BatchScores {
        #[clap(required = true)]
        addresses: Vec<Address>,
    },

    /// List registry events
    Events {
        /// First sequence number to include
        #[clap(long, default_value = "0")]
        since: u64,
    },

    /// Show the registry bounds
    Constants,
}

/// Explicit caller, else the configured operator, else the zero address.
fn resolve_caller(explicit: Option<Address>, config: &RegistryConfig) -> Address {
    explicit
        .or(config.operator_address)
        .unwrap_or(Address::ZERO)
}

fn load_config(cli: &Cli) -> Result<RegistryConfig> {
    let mut config = match &cli.config {
        Some(path) => RegistryConfig::from_file(path)?,
        None => RegistryConfig::default(),
    };
    if let Some(store) = &cli.store {
        config.storage_path = Some(store.clone());
    }
    if config.storage_path.is_none() {
        config.storage_path = Some(PathBuf::from(DEFAULT_STORE_DIR));
    }
    Ok(config)
}

fn print_record(address: &Address, record: &ReputationRecord, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({
            "address": address,
            "score": record.score,
            "total_ratings": record.total_ratings,
            "is_registered": record.is_registered,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let status = if record.is_registered {
        "registered".green()
    } else {
        "not registered".yellow()
    };
    println!("{} {}", "Address:".bold(), address);
    println!("  Score: {}", record.score);
    println!("  Ratings: {}", record.total_ratings);
    println!("  Status: {}", status);
    Ok(())
}

fn print_addresses(addresses: &[Address], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(addresses)?);
        return Ok(());
    }
    for (i, address) in addresses.iter().enumerate() {
        println!("{:>4}  {}", i, address);
    }
    Ok(())
}

async fn rate(
    registry: &ReputationRegistry,
    config: &RegistryConfig,
    target: &RateTarget,
    rating: u64,
    label: &str,
) -> Result<()> {
    let caller = resolve_caller(target.caller, config);
    let score = registry
        .submit_rating(&caller, &target.ratee, rating)
        .await
        .with_context(|| format!("Failed to rate {}", target.ratee))?;
    println!(
        "{} {} rating ({}) for {} by {}, new score {}",
        "Submitted".green(),
        label,
        rating,
        target.ratee,
        caller,
        score.to_string().bold()
    );
    Ok(())
}

async fn run(cli: &Cli, config: &RegistryConfig, registry: &ReputationRegistry) -> Result<()> {
    match &cli.command {
        Commands::Bootstrap => {
            let report = run_bootstrap(registry, config)
                .await
                .context("Bootstrap failed")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                match report.operator {
                    Some(operator) => println!("{} operator {}", "Registered".green(), operator),
                    None => println!("{}", "No operator configured".yellow()),
                }
                for (address, score) in &report.seeded {
                    println!("  seeded {} -> {}", address, score);
                }
                println!("Total users: {}", report.total_users);
            }
        }
        Commands::Register { address } => {
            registry.register(address).await?;
            println!("{} {}", "Registered".green(), address);
        }
        Commands::RegisterSelf { caller } => {
            let caller = resolve_caller(*caller, config);
            registry.register_self(&caller).await?;
            println!("{} {}", "Registered".green(), caller);
        }
        Commands::BatchRegister { addresses } => {
            let users = registry.batch_register(addresses).await?;
            println!(
                "{} {} addresses, {} users total",
                "Registered".green(),
                addresses.len(),
                users.len()
            );
        }
        Commands::Rate { target, rating } => {
            rate(registry, config, target, *rating, "raw").await?;
        }
        Commands::Positive(target) => {
            let preset = RatingPreset::Positive;
            rate(registry, config, target, preset.value(), preset.label()).await?;
        }
        Commands::Negative(target) => {
            let preset = RatingPreset::Negative;
            rate(registry, config, target, preset.value(), preset.label()).await?;
        }
        Commands::Neutral(target) => {
            let preset = RatingPreset::Neutral;
            rate(registry, config, target, preset.value(), preset.label()).await?;
        }
        Commands::SetScore {
            caller,
            address,
            score,
        } => {
            let caller = resolve_caller(*caller, config);
            let record = registry.set_reputation(&caller, address, *score).await?;
            println!("{} score of {} to {}", "Set".green(), address, record.score);
        }
        Commands::Reset { caller, address } => {
            let caller = resolve_caller(*caller, config);
            registry.reset_reputation(&caller, address).await?;
            println!("{} {}", "Reset".green(), address);
        }
        Commands::Show { address } => {
            let record = registry.reputation_data(address).await;
            print_record(address, &record, cli.json)?;
        }
        Commands::Score { address } => {
            println!("{}", registry.reputation(address).await);
        }
        Commands::IsRegistered { address } => {
            println!("{}", registry.is_registered(address).await);
        }
        Commands::Users => {
            let users = registry.registered_users().await;
            print_addresses(&users, cli.json)?;
        }
        Commands::Total => {
            println!("{}", registry.total_users().await);
        }
        Commands::BatchScores { addresses } => {
            let scores = registry.batch_reputations(addresses).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&scores)?);
            } else {
                for (address, score) in addresses.iter().zip(scores) {
                    println!("{}  {}", address, score);
                }
            }
        }
        Commands::Events { since } => {
            let events = registry.events_since(*since).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else {
                for envelope in events {
                    println!(
                        "{:>6}  {}  {:?}",
                        envelope.seq,
                        envelope.recorded_at.to_rfc3339(),
                        envelope.event
                    );
                }
            }
        }
        Commands::Constants => {
            let constants = registry.constants();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&constants)?);
            } else {
                println!("MAX_REPUTATION     {}", constants.max_reputation);
                println!("MIN_REPUTATION     {}", constants.min_reputation);
                println!("INITIAL_REPUTATION {}", constants.initial_reputation);
            }
        }
    }
    Ok(())
}

/// Entrypoint
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let log_level_str = config.log_level.as_deref().unwrap_or("warn");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level_str))
        .unwrap_or_else(|_| EnvFilter::new(Level::WARN.to_string()));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let registry = config.open_registry().await?;
    run(&cli, &config, &registry).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    async fn exec(dir: &std::path::Path, args: &[&str]) -> Result<ReputationRegistry> {
        let store = dir.to_string_lossy().into_owned();
        let mut argv = vec!["repute", "--store", store.as_str()];
        argv.extend_from_slice(args);

        let cli = Cli::try_parse_from(argv)?;
        let config = load_config(&cli)?;
        let registry = config.open_registry().await?;
        run(&cli, &config, &registry).await?;
        Ok(registry)
    }

    #[test]
    fn caller_falls_back_to_operator_then_zero() {
        let mut config = RegistryConfig::default();
        assert_eq!(resolve_caller(None, &config), Address::ZERO);

        config.operator_address = Some(addr(0xaa));
        assert_eq!(resolve_caller(None, &config), addr(0xaa));
        assert_eq!(resolve_caller(Some(addr(1)), &config), addr(1));
    }

    #[test]
    fn store_flag_overrides_default_directory() {
        let cli = Cli::try_parse_from(["repute", "--store", "/tmp/x", "users"]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.storage_path, Some(PathBuf::from("/tmp/x")));

        let cli = Cli::try_parse_from(["repute", "users"]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.storage_path, Some(PathBuf::from(DEFAULT_STORE_DIR)));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(Cli::try_parse_from(["repute", "register", "0x1234"]).is_err());
        assert!(Cli::try_parse_from(["repute", "batch-register"]).is_err());
    }

    #[tokio::test]
    async fn commands_persist_between_invocations() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (a, b) = (addr(1).to_string(), addr(2).to_string());

        drop(exec(dir.path(), &["register", &a]).await?);
        drop(exec(dir.path(), &["positive", "--caller", &b, &a]).await?);
        drop(exec(dir.path(), &["negative", "--caller", &b, &a]).await?);

        let registry = exec(dir.path(), &["show", &a]).await?;
        let record = registry.reputation_data(&addr(1)).await;
        assert_eq!((record.score, record.total_ratings), (500, 2));
        assert_eq!(registry.registered_users().await, vec![addr(1), addr(2)]);
        Ok(())
    }

    #[tokio::test]
    async fn set_score_and_reset() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let a = addr(7).to_string();

        drop(exec(dir.path(), &["rate", &a, "5000"]).await?);
        drop(exec(dir.path(), &["set-score", &a, "42"]).await?);
        let registry = exec(dir.path(), &["score", &a]).await?;
        let record = registry.reputation_data(&addr(7)).await;
        assert_eq!((record.score, record.total_ratings), (42, 1));
        drop(registry);

        let registry = exec(dir.path(), &["reset", &a]).await?;
        assert_eq!(registry.reputation_data(&addr(7)).await, ReputationRecord::registered());
        Ok(())
    }
}
