//! Operator CLI for the price-intelligence service. Not part of the HTTP
//! request path — this talks to the database and the price engine directly,
//! for the things an operator does by hand: migrate, seed a demo catalogue,
//! run one price-update cycle, or print a monitoring snapshot.

use clap::{Parser, Subcommand};
use qcd_core::AppConfig;
use qcd_monitor::{AlertThresholds, MonitorRegistry};
use qcd_pricing::{EngineSettings, PriceUpdateEngine};
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "qcd-cli")]
#[command(about = "quick-commerce price intelligence — operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database management commands
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run one price-update cycle against current_prices and exit
    PriceCycle,
    /// Print a one-shot monitoring snapshot as JSON
    Monitor,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Test the database connection
    Ping,
    /// Run pending migrations
    Migrate,
    /// Seed a demo catalogue of platforms, products, and starting prices
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| {
        let level = std::env::var("QCD_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(level)
    })?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Db { command }) => match command {
            DbCommands::Ping => run_db_ping().await?,
            DbCommands::Migrate => run_db_migrate().await?,
            DbCommands::Seed => run_db_seed().await?,
        },
        Some(Commands::PriceCycle) => run_price_cycle().await?,
        Some(Commands::Monitor) => run_monitor_snapshot().await?,
        None => println!("qcd-cli: run with --help to see available commands"),
    }

    Ok(())
}

async fn run_db_ping() -> anyhow::Result<()> {
    let pool = connect_or_exit().await;
    qcd_db::health_check(&pool).await?;
    println!("database is healthy");
    Ok(())
}

async fn run_db_migrate() -> anyhow::Result<()> {
    let pool = connect_or_exit().await;
    let applied = qcd_db::run_migrations(&pool).await?;
    if applied == 0 {
        println!("0 pending migrations — database is up to date");
    } else {
        println!("applied {applied} migration(s) successfully");
    }
    Ok(())
}

async fn run_db_seed() -> anyhow::Result<()> {
    let pool = connect_or_exit().await;
    let (platforms, products, prices) = qcd_db::seed::seed_demo_catalog(&pool).await?;
    println!("seeded {platforms} platform(s), {products} product(s), {prices} starting price(s)");
    Ok(())
}

async fn run_price_cycle() -> anyhow::Result<()> {
    let config = load_config_or_exit();
    let pool = connect_or_exit().await;
    let engine = PriceUpdateEngine::new(pool, EngineSettings::from(&config));
    let updated = engine.run_cycle().await?;
    println!("updated {updated} price(s)");
    println!("{:#?}", engine.metrics());
    Ok(())
}

async fn run_monitor_snapshot() -> anyhow::Result<()> {
    let config = load_config_or_exit();
    let pool = connect_or_exit().await;
    qcd_db::health_check(&pool).await?;

    let registry = MonitorRegistry::new(config.slow_query_threshold_secs, AlertThresholds::default());
    let metrics = registry.comprehensive_metrics();
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

fn load_config_or_exit() -> AppConfig {
    qcd_core::load_app_config().unwrap_or_else(|e| {
        eprintln!("error: invalid configuration: {e}");
        std::process::exit(1);
    })
}

async fn connect_or_exit() -> PgPool {
    qcd_db::connect_pool_from_env().await.unwrap_or_else(|e| {
        match &e {
            qcd_db::DbError::MissingDatabaseUrl => {
                eprintln!("error: DATABASE_URL is not set");
                eprintln!("hint: copy .env.example to .env and set DATABASE_URL");
            }
            qcd_db::DbError::Sqlx(sql_err) => {
                eprintln!("error: failed to connect to database: {sql_err}");
                eprintln!("hint: ensure postgres is running");
            }
            qcd_db::DbError::Migration(mig_err) => {
                eprintln!("error: unexpected migration error during connect: {mig_err}");
            }
            qcd_db::DbError::NotFound => {
                eprintln!("error: unexpected not-found during connect");
            }
            qcd_db::DbError::ConcurrentUpdateConflict { entity, id } => {
                eprintln!("error: unexpected concurrent update conflict for {entity} id {id} during connect");
            }
            qcd_db::DbError::Config(cfg_err) => {
                eprintln!("error: invalid configuration: {cfg_err}");
                eprintln!("hint: copy .env.example to .env and fill required values");
            }
        }
        std::process::exit(1);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_db_ping_command() {
        let cli = Cli::try_parse_from(["qcd-cli", "db", "ping"]).expect("expected valid cli args");
        assert!(matches!(cli.command, Some(Commands::Db { command: DbCommands::Ping })));
    }

    #[test]
    fn parses_db_migrate_command() {
        let cli = Cli::try_parse_from(["qcd-cli", "db", "migrate"]).expect("expected valid cli args");
        assert!(matches!(cli.command, Some(Commands::Db { command: DbCommands::Migrate })));
    }

    #[test]
    fn parses_db_seed_command() {
        let cli = Cli::try_parse_from(["qcd-cli", "db", "seed"]).expect("expected valid cli args");
        assert!(matches!(cli.command, Some(Commands::Db { command: DbCommands::Seed })));
    }

    #[test]
    fn parses_price_cycle_command() {
        let cli = Cli::try_parse_from(["qcd-cli", "price-cycle"]).expect("expected valid cli args");
        assert!(matches!(cli.command, Some(Commands::PriceCycle)));
    }

    #[test]
    fn parses_monitor_command() {
        let cli = Cli::try_parse_from(["qcd-cli", "monitor"]).expect("expected valid cli args");
        assert!(matches!(cli.command, Some(Commands::Monitor)));
    }

    #[test]
    fn no_command_is_none() {
        let cli = Cli::try_parse_from(["qcd-cli"]).expect("expected valid cli args");
        assert!(cli.command.is_none());
    }
}
