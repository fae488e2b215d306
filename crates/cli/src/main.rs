//! Administrative and client CLI for Arklet.

mod api_client;

use anyhow::{Context, Result};
use api_client::{
    ApiClient, ArkRecord, BulkMintRequest, BulkUpdateRequest, MintRequest, QueryItem,
    UpdateRequest,
};
use arklet_core::ark::display_ark;
use arklet_core::config::AppConfig;
use arklet_core::credential::{generate_secret, hash_secret};
use arklet_core::{ArkUpdate, Naan, Shoulder};
use arklet_metadata::MetadataStore;
use arklet_metadata::models::{KeyRow, NaanRow, ShoulderRow};
use clap::{Args, Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

const DEFAULT_SAMPLE_SIZE: u32 = 50;

#[derive(Parser)]
#[command(name = "arkletctl")]
#[command(about = "Administrative and client CLI for Arklet")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct StoreArgs {
    /// Server configuration file naming the metadata store
    #[arg(long, env = "ARKLET_CONFIG", default_value = "config/arklet.toml")]
    config: String,
}

#[derive(Args, Clone)]
struct ApiArgs {
    /// Server URL
    #[arg(long, env = "ARKLET_URL", default_value = "http://127.0.0.1:8080")]
    server: String,

    /// API key for the NAAN being written
    #[arg(long, env = "ARKLET_API_KEY")]
    key: Option<String>,
}

/// Descriptive fields accepted by mint and update.
#[derive(Args, Clone, Default)]
struct FieldArgs {
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    metadata: Option<String>,
    #[arg(long)]
    commitment: Option<String>,
    #[arg(long)]
    title: Option<String>,
    #[arg(long = "type")]
    kind: Option<String>,
    #[arg(long)]
    identifier: Option<String>,
    #[arg(long)]
    format: Option<String>,
    #[arg(long)]
    relation: Option<String>,
    #[arg(long)]
    source: Option<String>,
}

impl From<FieldArgs> for ArkUpdate {
    fn from(args: FieldArgs) -> Self {
        Self {
            url: args.url,
            metadata: args.metadata,
            commitment: args.commitment,
            title: args.title,
            kind: args.kind,
            identifier: args.identifier,
            format: args.format,
            relation: args.relation,
            source: args.source,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Naming authority management
    Naan {
        #[command(subcommand)]
        command: NaanCommands,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Shoulder management
    Shoulder {
        #[command(subcommand)]
        command: ShoulderCommands,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// API key management
    Key {
        #[command(subcommand)]
        command: KeyCommands,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Identifier maintenance
    Ark {
        #[command(subcommand)]
        command: ArkCommands,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Mint one identifier on a running server
    Mint {
        #[arg(long)]
        naan: Naan,
        #[arg(long)]
        shoulder: String,
        #[command(flatten)]
        fields: FieldArgs,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Update the given fields of one identifier
    Update {
        /// Identifier, e.g. ark:/12345/x5bcdfghjk9
        ark: String,
        #[command(flatten)]
        fields: FieldArgs,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Show the JSON description of one identifier
    Query {
        ark: String,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Look up identifiers listed in a JSON file (`[{"ark": ...}]`)
    BulkQuery {
        file: PathBuf,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Update identifiers from a JSON file (`{"data": [{"ark": ..., ...}]}`)
    BulkUpdate {
        file: PathBuf,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Mint identifiers from a JSON file (`{"naan": ..., "data": [{"shoulder": ..., ...}]}`)
    BulkMint {
        file: PathBuf,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Check a running server
    Status {
        #[command(flatten)]
        api: ApiArgs,
    },
}

#[derive(Subcommand)]
enum NaanCommands {
    /// Register a naming authority
    Create {
        naan: Naan,
        #[arg(long)]
        name: String,
        /// Base URL receiving ARKs with no local match
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List naming authorities
    List,
}

#[derive(Subcommand)]
enum ShoulderCommands {
    /// Register a shoulder under a NAAN
    Create {
        naan: Naan,
        /// Shoulder, e.g. /x5
        shoulder: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List shoulders of a NAAN
    List { naan: Naan },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Create an API key (the secret is shown once)
    Create {
        naan: Naan,
        #[arg(long)]
        description: Option<String>,
    },
    /// List API keys of a NAAN
    List { naan: Naan },
    /// Deactivate an API key
    Deactivate { key_id: Uuid },
}

#[derive(Subcommand)]
enum ArkCommands {
    /// Count identifiers per shoulder
    Count { naan: Naan },
    /// Show a random sample of identifiers under a shoulder
    Sample {
        naan: Naan,
        shoulder: String,
        #[arg(long, default_value_t = DEFAULT_SAMPLE_SIZE)]
        count: u32,
    },
    /// Delete every identifier under a shoulder
    Delete {
        naan: Naan,
        shoulder: String,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let Cli { command } = Cli::parse();

    match command {
        Commands::Naan { command, store } => {
            handle_naan_command(command, open_store(&store).await?.as_ref()).await
        }
        Commands::Shoulder { command, store } => {
            handle_shoulder_command(command, open_store(&store).await?.as_ref()).await
        }
        Commands::Key { command, store } => {
            handle_key_command(command, open_store(&store).await?.as_ref()).await
        }
        Commands::Ark { command, store } => {
            handle_ark_command(command, open_store(&store).await?.as_ref()).await
        }
        Commands::Mint {
            naan,
            shoulder,
            fields,
            api,
        } => {
            let client = get_api_client(&api)?;
            let response = client
                .mint(&MintRequest {
                    naan,
                    shoulder,
                    update: fields.into(),
                })
                .await?;
            println!("{}", response.ark);
            Ok(())
        }
        Commands::Update { ark, fields, api } => {
            let client = get_api_client(&api)?;
            let record = client
                .update(&UpdateRequest {
                    ark,
                    update: fields.into(),
                })
                .await?;
            print_json(&record)
        }
        Commands::Query { ark, api } => {
            let record = get_api_client(&api)?.query(&ark).await?;
            print_json(&record)
        }
        Commands::BulkQuery { file, api } => {
            let items: Vec<QueryItem> = read_json_file(&file).await?;
            let records = get_api_client(&api)?.bulk_query(&items).await?;
            print_json(&records)
        }
        Commands::BulkUpdate { file, api } => {
            let request: BulkUpdateRequest = read_json_file(&file).await?;
            let response = get_api_client(&api)?.bulk_update(&request).await?;
            println!(
                "Received: {}, updated: {}",
                response.num_received, response.num_updated
            );
            Ok(())
        }
        Commands::BulkMint { file, api } => {
            let request: BulkMintRequest = read_json_file(&file).await?;
            let response = get_api_client(&api)?.bulk_mint(&request).await?;
            println!(
                "Received: {}, created: {}",
                response.num_received,
                response.arks_created.len()
            );
            print_ark_table(&response.arks_created);
            Ok(())
        }
        Commands::Status { api } => {
            let status = get_api_client(&api)?.status().await?;
            println!("Status: {}", status.status);
            println!("Version: {}", status.version);
            println!("Mode: {}", status.mode);
            Ok(())
        }
    }
}

// =============================================================================
// Store access
// =============================================================================

/// Load the server configuration the same way `arkletd` does.
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if Path::new(path).exists() {
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(config_path = %path, "No config file found, using defaults and environment");
    }
    figment
        .merge(
            Env::prefixed("ARKLET_")
                .ignore(&["config", "url", "api_key"])
                .split("__"),
        )
        .extract()
        .context("failed to load configuration")
}

async fn open_store(store: &StoreArgs) -> Result<Arc<dyn MetadataStore>> {
    let config = load_config(&store.config)?;
    config.metadata.validate().map_err(anyhow::Error::msg)?;
    arklet_metadata::from_config(&config.metadata)
        .await
        .context("failed to open metadata store")
}

fn naan_key(naan: Naan) -> Result<i64> {
    i64::try_from(naan).map_err(|_| anyhow::anyhow!("NAAN {naan} is out of range"))
}

async fn require_naan(store: &dyn MetadataStore, naan: Naan) -> Result<i64> {
    let key = naan_key(naan)?;
    if store.get_naan(key).await?.is_none() {
        anyhow::bail!("NAAN {naan} is not registered; run `arkletctl naan create` first");
    }
    Ok(key)
}

fn validate_naan_url(url: &str) -> Result<()> {
    let parsed = Url::parse(url).with_context(|| format!("invalid NAAN URL: {url}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("NAAN URL must start with http:// or https://");
    }
    Ok(())
}

async fn create_naan(
    store: &dyn MetadataStore,
    naan: Naan,
    name: String,
    url: String,
    description: String,
) -> Result<NaanRow> {
    validate_naan_url(&url)?;
    let row = NaanRow {
        naan: naan_key(naan)?,
        name,
        description,
        url,
    };
    store.create_naan(&row).await?;
    tracing::info!(naan, "naan created");
    Ok(row)
}

async fn create_shoulder(
    store: &dyn MetadataStore,
    naan: Naan,
    shoulder: &str,
    name: String,
    description: String,
) -> Result<ShoulderRow> {
    let shoulder = Shoulder::new(shoulder)?;
    let naan_key = require_naan(store, naan).await?;
    let row = ShoulderRow {
        naan: naan_key,
        shoulder: shoulder.as_str().to_string(),
        name,
        description,
        created_at: OffsetDateTime::now_utc(),
    };
    store.create_shoulder(&row).await?;
    tracing::info!(naan, shoulder = %shoulder, "shoulder created");
    Ok(row)
}

/// Create a key and return its row together with the plaintext secret.
async fn create_key(
    store: &dyn MetadataStore,
    naan: Naan,
    description: Option<String>,
) -> Result<(KeyRow, String)> {
    let naan_key = require_naan(store, naan).await?;
    let secret = generate_secret();
    let row = KeyRow {
        key_id: Uuid::new_v4(),
        naan: naan_key,
        key_hash: hash_secret(&secret)?,
        active: true,
        created_at: OffsetDateTime::now_utc(),
        deactivated_at: None,
        description,
    };
    store.create_key(&row).await?;
    tracing::info!(naan, key_id = %row.key_id, "api key created");
    Ok((row, secret))
}

async fn handle_naan_command(command: NaanCommands, store: &dyn MetadataStore) -> Result<()> {
    match command {
        NaanCommands::Create {
            naan,
            name,
            url,
            description,
        } => {
            let row = create_naan(store, naan, name, url, description).await?;
            println!("NAAN created: {} ({})", row.naan, row.name);
        }
        NaanCommands::List => {
            let naans = store.list_naans().await?;
            if naans.is_empty() {
                println!("No NAANs found.");
            } else {
                println!("{:<12} {:<30} URL", "NAAN", "Name");
                println!("{}", "-".repeat(80));
                for naan in naans {
                    println!("{:<12} {:<30} {}", naan.naan, naan.name, naan.url);
                }
            }
        }
    }
    Ok(())
}

async fn handle_shoulder_command(
    command: ShoulderCommands,
    store: &dyn MetadataStore,
) -> Result<()> {
    match command {
        ShoulderCommands::Create {
            naan,
            shoulder,
            name,
            description,
        } => {
            let row = create_shoulder(store, naan, &shoulder, name, description).await?;
            println!("Shoulder created: ark:/{}{}", row.naan, row.shoulder);
        }
        ShoulderCommands::List { naan } => {
            let shoulders = store.list_shoulders(naan_key(naan)?).await?;
            if shoulders.is_empty() {
                println!("No shoulders found.");
            } else {
                println!("{:<16} {:<30} Created", "Shoulder", "Name");
                println!("{}", "-".repeat(80));
                for shoulder in shoulders {
                    println!(
                        "{:<16} {:<30} {}",
                        shoulder.shoulder, shoulder.name, shoulder.created_at
                    );
                }
            }
        }
    }
    Ok(())
}

async fn handle_key_command(command: KeyCommands, store: &dyn MetadataStore) -> Result<()> {
    match command {
        KeyCommands::Create { naan, description } => {
            let (row, secret) = create_key(store, naan, description).await?;
            println!("API key created successfully!");
            println!("\nKey ID: {}", row.key_id);
            println!("Secret: {secret}");
            println!("\nIMPORTANT: Save this secret now. It cannot be recovered.");
        }
        KeyCommands::List { naan } => {
            let keys = store.list_keys(naan_key(naan)?).await?;
            if keys.is_empty() {
                println!("No keys found.");
            } else {
                println!("{:<38} {:<8} {:<26} Description", "ID", "Active", "Created");
                println!("{}", "-".repeat(100));
                for key in keys {
                    println!(
                        "{:<38} {:<8} {:<26} {}",
                        key.key_id,
                        key.active,
                        key.created_at.to_string(),
                        key.description.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        KeyCommands::Deactivate { key_id } => {
            store
                .deactivate_key(key_id, OffsetDateTime::now_utc())
                .await?;
            println!("Key deactivated: {key_id}");
        }
    }
    Ok(())
}

async fn handle_ark_command(command: ArkCommands, store: &dyn MetadataStore) -> Result<()> {
    match command {
        ArkCommands::Count { naan } => {
            let counts = store.count_arks_by_shoulder(naan_key(naan)?).await?;
            if counts.is_empty() {
                println!("No identifiers under NAAN {naan}.");
            } else {
                println!("{:<16} Count", "Shoulder");
                println!("{}", "-".repeat(32));
                for count in &counts {
                    println!("{:<16} {}", count.shoulder, count.count);
                }
                let total: i64 = counts.iter().map(|c| c.count).sum();
                println!("{:<16} {}", "total", total);
            }
        }
        ArkCommands::Sample {
            naan,
            shoulder,
            count,
        } => {
            let shoulder = Shoulder::new(shoulder)?;
            let rows = store
                .sample_arks(naan_key(naan)?, shoulder.as_str(), count)
                .await?;
            if rows.is_empty() {
                println!("No identifiers under ark:/{naan}{shoulder}.");
            }
            for row in rows {
                println!("{:<40} {}", display_ark(&row.ark), row.url);
            }
        }
        ArkCommands::Delete {
            naan,
            shoulder,
            force,
        } => {
            let shoulder = Shoulder::new(shoulder)?;
            if !force && !confirm(&format!(
                "This will delete every identifier under ark:/{naan}{shoulder}. Are you sure? [y/N]: "
            ))? {
                println!("Deletion cancelled.");
                return Ok(());
            }
            let deleted = store
                .delete_arks_for_shoulder(naan_key(naan)?, shoulder.as_str())
                .await?;
            tracing::info!(naan, shoulder = %shoulder, deleted, "identifiers deleted");
            println!("Deleted {deleted} identifiers under ark:/{naan}{shoulder}");
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    use std::io::Write;
    print!("{prompt}");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

// =============================================================================
// Server access
// =============================================================================

fn normalize_base_url(url: &str) -> Result<String> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("server URL must start with http:// or https://");
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn get_api_client(api: &ApiArgs) -> Result<ApiClient> {
    let base_url = normalize_base_url(&api.server)?;
    ApiClient::new(&base_url, api.key.as_deref())
}

async fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_ark_table(records: &[ArkRecord]) {
    for record in records {
        println!("{:<40} {}", display_ark(&record.ark), record.url);
    }
}
