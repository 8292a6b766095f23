//! Oddstore CLI
//!
//! Loads a store configuration, optionally seeds the configured backend from a
//! JSON file, then runs one store operation through the bus and prints the
//! JSON result.

use clap::{Parser, Subcommand};
use oddstore::constants::{CMD_BATCH_GET, CMD_GET, CMD_QUERY, CMD_REMOVE, CMD_SCAN, CMD_SET};
use oddstore::{Pattern, StoreConfig, StoreService};
use serde_json::{json, Value};

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Application name
pub const APP_NAME: &str = "oddstore";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// CLI
// =============================================================================

/// Oddstore - run store operations against a configured backend
#[derive(Parser, Debug)]
#[command(name = APP_NAME)]
#[command(about = "Run store operations through the command/query bus")]
#[command(version)]
struct Cli {
    /// JSON configuration file (ODDSTORE_* variables override it)
    #[arg(short, long)]
    config: Option<String>,

    /// JSON file with an array of records to store before the operation
    #[arg(short, long)]
    seed: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one record (Riak lists the bucket when --id is omitted)
    Get {
        /// Entity type
        #[arg(short = 't', long = "type")]
        entity_type: String,
        /// Record id
        #[arg(long)]
        id: Option<String>,
        /// Channel (not needed for channel records)
        #[arg(long)]
        channel: Option<String>,
        /// Relations to expand, comma separated
        #[arg(long, value_delimiter = ',')]
        include: Vec<String>,
    },
    /// Store a record (full replace)
    Set {
        /// Entity type
        #[arg(short = 't', long = "type")]
        entity_type: String,
        /// Record as JSON
        payload: String,
    },
    /// Delete a record
    Remove {
        /// Entity type
        #[arg(short = 't', long = "type")]
        entity_type: String,
        /// Record id
        #[arg(long)]
        id: String,
        /// Channel (not needed for channel records)
        #[arg(long)]
        channel: Option<String>,
    },
    /// List records of a type in a channel
    Scan {
        /// Entity type
        #[arg(short = 't', long = "type")]
        entity_type: String,
        /// Channel (not needed for channel records)
        #[arg(long)]
        channel: Option<String>,
        /// Maximum records
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Fetch many records; keys are `type/id`
    BatchGet {
        /// Channel every key resolves in
        #[arg(long)]
        channel: Option<String>,
        /// Keys as `type/id`
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Free-text search, materialized through batchGet
    Search {
        /// Query text
        query: String,
        /// Only this type
        #[arg(short = 't', long = "type")]
        entity_type: Option<String>,
        /// Channel to materialize in
        #[arg(long)]
        channel: Option<String>,
    },
}

/// Put `value` under `name` when present.
fn with_optional(mut args: Value, name: &str, value: Option<Value>) -> Value {
    if let Some(value) = value {
        args[name] = value;
    }
    args
}

fn parse_key(raw: &str) -> anyhow::Result<Value> {
    let (entity_type, id) = raw
        .split_once('/')
        .ok_or_else(|| anyhow::anyhow!("key {raw:?} must look like type/id"))?;
    Ok(json!({ "type": entity_type, "id": id }))
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .init();

    tracing::info!("{} v{}", APP_NAME, APP_VERSION);

    let config = StoreConfig::load(cli.config.as_deref())?;
    let service = StoreService::start(config).await?;
    if let Some(seed) = &cli.seed {
        service.seed_file(seed).await?;
    }
    let bus = service.bus();

    let result = match cli.command {
        Command::Get {
            entity_type,
            id,
            channel,
            include,
        } => {
            let mut args = json!({});
            args = with_optional(args, "id", id.map(Value::from));
            args = with_optional(args, "channel", channel.map(Value::from));
            if !include.is_empty() {
                args["include"] = json!(include);
            }
            bus.query(&Pattern::store(CMD_GET).with_type(entity_type), args).await?
        }
        Command::Set {
            entity_type,
            payload,
        } => {
            let payload: Value = serde_json::from_str(&payload)?;
            bus.command(&Pattern::store(CMD_SET).with_type(entity_type), payload).await?
        }
        Command::Remove {
            entity_type,
            id,
            channel,
        } => {
            let args = with_optional(json!({ "id": id }), "channel", channel.map(Value::from));
            bus.command(&Pattern::store(CMD_REMOVE).with_type(entity_type), args).await?
        }
        Command::Scan {
            entity_type,
            channel,
            limit,
        } => {
            let mut args = with_optional(json!({}), "channel", channel.map(Value::from));
            args = with_optional(args, "limit", limit.map(Value::from));
            bus.query(&Pattern::store(CMD_SCAN).with_type(entity_type), args).await?
        }
        Command::BatchGet { channel, keys } => {
            let keys = keys.iter().map(|k| parse_key(k)).collect::<anyhow::Result<Vec<_>>>()?;
            let args = with_optional(json!({ "keys": keys }), "channel", channel.map(Value::from));
            bus.query(&Pattern::store(CMD_BATCH_GET), args).await?
        }
        Command::Search {
            query,
            entity_type,
            channel,
        } => {
            let mut args = with_optional(json!({ "query": query }), "type", entity_type.map(Value::from));
            args = with_optional(args, "channel", channel.map(Value::from));
            bus.query(&Pattern::store(CMD_QUERY), args).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
