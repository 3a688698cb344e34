use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rmtgraph::backend::{MemoryExecutor, SqlExecutor};
use rmtgraph::config::{CliConfig, StoreConfig};
use rmtgraph::model_catalog::ModelSchemaConfig;
use rmtgraph::ModelStore;

/// rmtgraph - map generalization/aggregation models onto PostgreSQL relations
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Store configuration file (YAML); environment variables are used otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model definitions file (YAML)
    #[arg(long, global = true)]
    models: Option<PathBuf>,

    /// PostgreSQL connection target
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Prefix of the catalog relations
    #[arg(long, global = true)]
    catalog_prefix: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the statements defining the models would run, without touching a database
    Plan,
    /// Define the models against PostgreSQL, creating and migrating relations
    Sync,
}

impl Cli {
    fn overrides(&self) -> CliConfig {
        CliConfig {
            database_url: self.database_url.clone(),
            catalog_prefix: self.catalog_prefix.clone(),
            model_config_path: self.models.clone(),
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let base = match &cli.config {
        Some(path) => StoreConfig::from_yaml_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => StoreConfig::from_env()?,
    };
    Ok(base.merge_cli(cli.overrides())?)
}

fn load_models(config: &StoreConfig) -> anyhow::Result<ModelSchemaConfig> {
    let path = config
        .model_config_path
        .as_ref()
        .context("no model file given (use --models or RMTGRAPH_MODELS)")?;
    Ok(ModelSchemaConfig::from_yaml_file(path)?)
}

async fn plan(config: &StoreConfig, models: &ModelSchemaConfig) -> anyhow::Result<()> {
    let memory = Arc::new(MemoryExecutor::new());
    let store = ModelStore::with_config(memory.clone(), config);
    let names = store.define_from_config(models).await?;

    for statement in memory.statements() {
        println!("{};", statement);
    }
    for name in names {
        let model = store.model(&name)?;
        println!(
            "\n-- read query for {} ({} join(s))\n{};",
            name,
            model.query().join_count(),
            model.query().render().sql
        );
    }
    Ok(())
}

async fn sync(config: &StoreConfig, models: &ModelSchemaConfig) -> anyhow::Result<()> {
    let executor = connect(&config.database_url).await?;
    let store = ModelStore::with_config(executor, config);
    for name in store.define_from_config(models).await? {
        println!("{}: ready", name);
    }
    Ok(())
}

#[cfg(feature = "postgres")]
async fn connect(database_url: &str) -> anyhow::Result<Arc<dyn SqlExecutor>> {
    let executor = rmtgraph::backend::PostgresExecutor::connect(database_url).await?;
    Ok(Arc::new(executor))
}

#[cfg(not(feature = "postgres"))]
async fn connect(_database_url: &str) -> anyhow::Result<Arc<dyn SqlExecutor>> {
    anyhow::bail!("this build has no PostgreSQL support; rebuild with --features postgres")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let models = load_models(&config)?;
    log::info!(
        "Loaded {} type definition(s) from {:?}",
        models.types.len(),
        config.model_config_path
    );

    match cli.command {
        Command::Plan => plan(&config, &models).await,
        Command::Sync => sync(&config, &models).await,
    }
}
