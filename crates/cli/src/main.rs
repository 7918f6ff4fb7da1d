//! Administrative CLI for VaxTrack.

mod api_client;

use anyhow::{Context, Result};
use api_client::{ApiClient, RegisterRequest};
use clap::{Args, Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde_json::Value;
use std::path::{Path, PathBuf};
use vaxtrack_core::{DashboardStats, VaccinationRecord};

#[derive(Parser)]
#[command(name = "vaxctl")]
#[command(about = "Administrative CLI for VaxTrack")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ClientConfigArgs {
    /// Client config file path
    #[arg(long, env = "VAXTRACK_CLIENT_CONFIG")]
    client_config: Option<String>,
}

#[derive(Args, Clone)]
struct ApiArgs {
    /// Server API URL (overrides client config and VAXTRACK_SERVER)
    #[arg(long)]
    server: Option<String>,

    /// API token (overrides client config and VAXTRACK_TOKEN)
    #[arg(long)]
    token: Option<String>,

    #[command(flatten)]
    client: ClientConfigArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a vaccination and print its certificate ID
    Register {
        #[command(flatten)]
        record: RegisterArgs,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Show a record by certificate ID
    Get {
        /// Certificate ID (e.g., VAX-20250115-004211)
        cert_id: String,
        /// Print the raw JSON record
        #[arg(long, default_value_t = false)]
        json: bool,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// List all records
    List {
        /// Print the raw JSON records
        #[arg(long, default_value_t = false)]
        json: bool,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Delete a record by certificate ID
    Delete {
        /// Certificate ID
        cert_id: String,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Bulk import records from a JSON file
    Import {
        /// JSON file holding an array of records or `{"records": [...]}`
        file: PathBuf,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Dashboard statistics
    Stats {
        /// Print the raw JSON statistics
        #[arg(long, default_value_t = false)]
        json: bool,
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Check server health and version
    Health {
        #[command(flatten)]
        api: ApiArgs,
    },
    /// Save the server URL and token to the client config
    Login {
        /// Server API base URL (e.g., https://vax.example.org)
        url: String,
        /// Token value (avoid if possible; prefer --token-stdin)
        #[arg(long)]
        token: Option<String>,
        /// Read token from stdin
        #[arg(long, default_value_t = false)]
        token_stdin: bool,
        #[command(flatten)]
        client: ClientConfigArgs,
    },
}

#[derive(Args, Clone)]
struct RegisterArgs {
    /// Full name
    #[arg(long)]
    name: String,
    /// Email address for the confirmation
    #[arg(long)]
    email: String,
    /// Age in years
    #[arg(long)]
    age: Option<u32>,
    /// Gender (Male, Female, Other)
    #[arg(long)]
    gender: Option<String>,
    /// State
    #[arg(long)]
    state: String,
    /// District
    #[arg(long)]
    district: String,
    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    latitude: Option<f64>,
    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    longitude: Option<f64>,
    /// Vaccine type (e.g., Covishield)
    #[arg(long)]
    vaccine_type: String,
    /// Dose number or "Booster"
    #[arg(long)]
    dose: String,
    /// Date administered (YYYY-MM-DD)
    #[arg(long)]
    date: String,
    /// Administering officer
    #[arg(long)]
    officer: Option<String>,
}

impl From<RegisterArgs> for RegisterRequest {
    fn from(args: RegisterArgs) -> Self {
        Self {
            name: args.name,
            email: args.email,
            age: args.age,
            gender: args.gender,
            state: args.state,
            district: args.district,
            latitude: args.latitude,
            longitude: args.longitude,
            vaccine_type: args.vaccine_type,
            dose: args.dose,
            date_administered: args.date,
            administering_officer: args.officer,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Register { record, api } => {
            let client = get_api_client(&api).await?;
            let response = client.register(&record.into()).await?;
            println!("Registered vaccination record");
            println!("  Certificate ID: {}", response.cert_id);
            render_record(&response.record);
            Ok(())
        }
        Commands::Get { cert_id, json, api } => {
            let client = get_api_client(&api).await?;
            let record = client.get_record(&cert_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                render_record(&record);
            }
            Ok(())
        }
        Commands::List { json, api } => {
            let client = get_api_client(&api).await?;
            let records = client.list_records().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                render_record_list(&records);
            }
            Ok(())
        }
        Commands::Delete { cert_id, api } => {
            let client = get_api_client(&api).await?;
            let response = client.delete_record(&cert_id).await?;
            println!("{}: {cert_id}", response.message);
            Ok(())
        }
        Commands::Import { file, api } => {
            let records = read_import_file(&file).await?;
            let client = get_api_client(&api).await?;
            println!("Importing {} records from {}", records.len(), file.display());
            let response = client.bulk_import(records).await?;
            println!("{}", response.message);
            if response.errors > 0 {
                eprintln!(
                    "Warning: {} records were skipped (invalid or already present)",
                    response.errors
                );
            }
            Ok(())
        }
        Commands::Stats { json, api } => {
            let client = get_api_client(&api).await?;
            let stats = client.dashboard().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                render_stats(&stats);
            }
            Ok(())
        }
        Commands::Health { api } => handle_health_command(&api).await,
        Commands::Login {
            url,
            token,
            token_stdin,
            client,
        } => handle_login_command(&url, token, token_stdin, &client).await,
    }
}

async fn resolve_api_config(api: &ApiArgs) -> Result<(String, String)> {
    let config_path = client_config_path(api.client.client_config.as_deref())?;
    let config = load_client_config(&config_path).await?;

    let server = api.server.clone().or(config.server).ok_or_else(|| {
        anyhow::anyhow!(
            "no server configured: pass --server, set VAXTRACK_SERVER, or run `vaxctl login`"
        )
    })?;
    let token = api.token.clone().or(config.token).ok_or_else(|| {
        anyhow::anyhow!(
            "no token configured: pass --token, set VAXTRACK_TOKEN, or run `vaxctl login`"
        )
    })?;

    Ok((server, token))
}

async fn get_api_client(api: &ApiArgs) -> Result<ApiClient> {
    let (server, token) = resolve_api_config(api).await?;
    let base_url = normalize_base_url(&server)?;
    ApiClient::new(&base_url, &token)
}

async fn handle_health_command(api: &ApiArgs) -> Result<()> {
    let client = get_api_client(api).await?;
    let health = client.health().await?;

    println!("Status: {}", health.status);
    println!("Server version: {}", health.version);
    println!("Client version: {}", env!("CARGO_PKG_VERSION"));

    if health.version != env!("CARGO_PKG_VERSION") {
        eprintln!(
            "Warning: version mismatch (server: {}, client: {})",
            health.version,
            env!("CARGO_PKG_VERSION")
        );
    }
    Ok(())
}

async fn handle_login_command(
    url: &str,
    token: Option<String>,
    token_stdin: bool,
    client: &ClientConfigArgs,
) -> Result<()> {
    let base_url = normalize_base_url(url)?;
    let token = read_token(token, token_stdin)?;

    let api = ApiClient::new(&base_url, &token)?;
    api.list_records()
        .await
        .context("server rejected the token")?;

    let path = client_config_path(client.client_config.as_deref())?;
    let config = ClientConfig {
        server: Some(base_url.clone()),
        token: Some(token),
    };
    save_client_config(&path, &config).await?;

    println!("Logged in to {base_url}");
    println!("Saved credentials to {}", path.display());
    Ok(())
}

/// Accept either a bare array or the `{"records": [...]}` request shape.
async fn read_import_file(path: &Path) -> Result<Vec<Value>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    parse_import_document(value)
}

fn parse_import_document(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(records) => Ok(records),
        Value::Object(mut object) => match object.remove("records") {
            Some(Value::Array(records)) => Ok(records),
            _ => anyhow::bail!("import file must contain a \"records\" array"),
        },
        _ => anyhow::bail!("import file must be a JSON array of records"),
    }
}

fn render_record(record: &VaccinationRecord) {
    println!("  Name: {}", record.name);
    if let Some(email) = &record.email {
        println!("  Email: {email}");
    }
    if let Some(age) = record.age {
        println!("  Age: {age}");
    }
    if let Some(gender) = record.gender {
        println!("  Gender: {gender}");
    }
    println!("  Location: {}, {}", record.district, record.state);
    println!("  Vaccine: {} ({})", record.vaccine_type, record.dose_label());
    println!("  Date: {}", record.date_administered);
    if let Some(officer) = &record.administering_officer {
        println!("  Officer: {officer}");
    }
}

fn render_record_list(records: &[VaccinationRecord]) {
    if records.is_empty() {
        println!("No records found.");
        return;
    }

    println!(
        "{:<20} {:<24} {:<16} {:<10} {:<12} LOCATION",
        "CERT ID", "NAME", "VACCINE", "DOSE", "DATE"
    );
    for record in records {
        println!(
            "{:<20} {:<24} {:<16} {:<10} {:<12} {}, {}",
            record.cert_id,
            record.name,
            record.vaccine_type,
            record.dose_label(),
            record.date_administered,
            record.district,
            record.state
        );
    }
    println!("\n{} records", records.len());
}

fn render_stats(stats: &DashboardStats) {
    println!("Dashboard Statistics:");
    println!("  Total vaccinations: {}", stats.total_vaccinations);

    println!("\n  By vaccine type:");
    for (vaccine, count) in &stats.vaccine_types {
        println!("    {vaccine}: {count}");
    }

    println!("\n  By dose:");
    for (dose, count) in &stats.dose_distribution {
        println!("    {dose}: {count}");
    }

    println!("\n  By month:");
    for (month, count) in &stats.monthly_data {
        println!("    {month}: {count}");
    }

    println!("\n  By state:");
    for counter in &stats.state_heatmap_data {
        println!("    {}: {}", counter.state, counter.count);
    }

    println!("\n  By district:");
    for counter in &stats.district_heatmap_data {
        println!(
            "    {}, {}: {}",
            counter.district, counter.state, counter.count
        );
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Default)]
#[serde(default)]
struct ClientConfig {
    server: Option<String>,
    token: Option<String>,
}

fn client_config_path(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(PathBuf::from(path));
    }

    if let Some(path) = std::env::var_os("VAXTRACK_CLIENT_CONFIG") {
        return Ok(PathBuf::from(path));
    }

    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(path) => PathBuf::from(path),
        None => {
            let home = std::env::var_os("HOME")
                .ok_or_else(|| anyhow::anyhow!("HOME not set; set VAXTRACK_CLIENT_CONFIG"))?;
            PathBuf::from(home).join(".config")
        }
    };

    Ok(base.join("vaxtrack").join("client.toml"))
}

async fn load_client_config(path: &Path) -> Result<ClientConfig> {
    let mut figment = Figment::new();

    if path.exists() {
        figment = figment.merge(Toml::file(path));
    }

    // VAXTRACK_SERVER and VAXTRACK_TOKEN; the server's own VAXTRACK_* settings are ignored.
    figment = figment.merge(Env::prefixed("VAXTRACK_").only(&["server", "token"]));

    match figment.extract() {
        Ok(config) => Ok(config),
        Err(_) if !path.exists() => Ok(ClientConfig::default()),
        Err(err) => Err(anyhow::anyhow!(err).context("failed to load client configuration")),
    }
}

async fn save_client_config(path: &Path, config: &ClientConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let contents = toml::to_string_pretty(config)?;

    tokio::fs::write(path, contents).await?;

    // The file holds the API token
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(path, perms).await?;
    }

    Ok(())
}

fn read_token(token: Option<String>, token_stdin: bool) -> Result<String> {
    if let Some(token) = token {
        return Ok(token);
    }
    if token_stdin {
        let mut buf = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)?;
        let token = buf.trim().to_string();
        if token.is_empty() {
            anyhow::bail!("token read from stdin is empty");
        }
        return Ok(token);
    }
    anyhow::bail!("provide --token or --token-stdin")
}

fn normalize_base_url(url: &str) -> Result<String> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("server URL must start with http:// or https://");
    }
    Ok(url.trim_end_matches('/').to_string())
}
