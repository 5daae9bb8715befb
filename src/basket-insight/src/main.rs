//! Basket Insight: market-basket analysis and sales dashboard for a store's
//! point-of-sale transactions.
//!
//! Runs the REST server or answers one-off queries from the command line.

use anyhow::Context;
use basket_api::ApiServer;
use basket_core::config::AppConfig;
use basket_core::TransactionStore;
use basket_mining::{MiningParams, MiningPipeline, RecommendationQuery, Recommender};
use basket_reporting::SalesDashboard;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "basket-insight")]
#[command(about = "Market-basket analysis and product recommendations from till transactions")]
#[command(version)]
struct Cli {
    /// Transactions file, a JSON array of raw records (overrides config)
    #[arg(long, global = true, env = "BASKET_INSIGHT__DATA__TRANSACTIONS_PATH")]
    data: Option<String>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Minimum itemset support in (0, 1] (overrides config)
    #[arg(long, global = true)]
    min_support: Option<f64>,

    /// Minimum value of the rule metric (overrides config)
    #[arg(long, global = true)]
    min_threshold: Option<f64>,

    /// Rule metric: support, confidence, lift, leverage, conviction
    #[arg(long, global = true)]
    metric: Option<String>,

    /// Number of recommendations to return (overrides config)
    #[arg(long, global = true)]
    top_n: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API and metrics exporter
    Serve {
        /// HTTP port (overrides config)
        #[arg(long, env = "BASKET_INSIGHT__API__HTTP_PORT")]
        http_port: Option<u16>,
    },

    /// Mine association rules and print the report as JSON
    Mine,

    /// Recommend products to go with the given ones
    Recommend {
        /// Comma-separated product names, e.g. "Kopi Bubuk, Gula Pasir"
        #[arg(short, long)]
        products: String,
    },

    /// Print the sales dashboard as JSON
    Dashboard {
        /// Print the intraday trend for this date (YYYY-MM-DD) instead
        #[arg(long)]
        date: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "basket_insight=info,basket_api=info,tower_http=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if let Some(data) = cli.data {
        config.data.transactions_path = Some(data);
    }
    if let Some(min_support) = cli.min_support {
        config.mining.min_support = min_support;
    }
    if let Some(min_threshold) = cli.min_threshold {
        config.mining.min_threshold = min_threshold;
    }
    if let Some(metric) = cli.metric {
        config.mining.metric = metric.parse()?;
    }
    if let Some(top_n) = cli.top_n {
        config.mining.top_n = top_n;
    }

    config.validate()?;

    info!(
        data = ?config.data.transactions_path,
        min_support = config.mining.min_support,
        metric = %config.mining.metric,
        min_threshold = config.mining.min_threshold,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Serve { http_port } => {
            if let Some(port) = http_port {
                config.api.http_port = port;
            }
            serve(config).await
        }
        Commands::Mine => {
            let store = load_store(&config)?;
            let pipeline = MiningPipeline::new(MiningParams::from_config(&config.mining))?;
            let report = pipeline.run(&store)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::Recommend { products } => {
            let store = load_store(&config)?;
            let query = RecommendationQuery::parse(&products)?;
            let recommender = Recommender::new(config.mining.top_n)?;
            let pipeline = MiningPipeline::new(MiningParams::from_config(&config.mining))?;
            let report = pipeline.run(&store)?;
            let result = report.recommend(&query, &recommender);
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Commands::Dashboard { date } => {
            let store = load_store(&config)?;
            let dashboard = SalesDashboard::default();
            match date {
                Some(date) => {
                    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
                        .with_context(|| format!("invalid date '{date}', expected YYYY-MM-DD"))?;
                    match dashboard.intraday(&store, date) {
                        Some(trend) => println!("{}", serde_json::to_string_pretty(&trend)?),
                        None => anyhow::bail!("no transactions on {date}"),
                    }
                }
                None => println!("{}", serde_json::to_string_pretty(&dashboard.overview(&store))?),
            }
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    info!("Basket Insight starting up");

    let store = match config.data.transactions_path {
        Some(_) => load_store(&config)?,
        None => {
            warn!("No transactions file configured, starting empty until PUT /v1/transactions");
            TransactionStore::new(Vec::new())?
        }
    };

    let api_server = ApiServer::new(config, store);

    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Basket Insight is ready to serve traffic");

    // Blocks until shutdown
    api_server.start_http().await?;

    Ok(())
}

/// An explicit `--config` must load; without one, environment overrides
/// apply on top of the defaults.
fn load_config(path: Option<&str>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            AppConfig::load(Some(path)).with_context(|| format!("failed to load config {path}"))
        }
        None => AppConfig::load(None).or_else(|e| {
            warn!(error = %e, "Failed to read environment config, using defaults");
            Ok(AppConfig::default())
        }),
    }
}

fn load_store(config: &AppConfig) -> anyhow::Result<TransactionStore> {
    let path = config
        .data
        .transactions_path
        .as_deref()
        .context("no transactions file, pass --data or set data.transactions_path")?;
    TransactionStore::from_json_file(path)
        .with_context(|| format!("failed to load transactions from {path}"))
}
