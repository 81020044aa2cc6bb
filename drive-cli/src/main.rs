//! `drive` - command line access to Google Drive.
//!
//! Every subcommand authorizes first: stored credentials are reused or
//! refreshed, and a browser consent flow runs when neither works. Logs go to
//! stderr so `drive download` can write file contents to stdout.

use anyhow::{Context, Result};
use bridge_traits::time::LogLevel;
use clap::{Parser, Subcommand, ValueEnum};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::{CoreConfig, DriveClient, MimeTable};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "drive")]
#[command(about = "Google Drive from the command line")]
#[command(version)]
struct Cli {
    /// Credentials file, created on first authorization.
    #[arg(long, env = "DRIVE_TOKEN_PATH", default_value = "token.json", global = true)]
    token: PathBuf,

    /// OAuth client-secret file downloaded from the Google Cloud console.
    #[arg(long, env = "DRIVE_CLIENT_SECRETS", global = true)]
    client_secrets: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = Format::Compact, global = true)]
    format: Format,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use the standard image MIME types instead of the historical mapping.
    #[arg(long, global = true)]
    corrected_mime: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pretty,
    Json,
    Compact,
}

impl From<Format> for LogFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Pretty => LogFormat::Pretty,
            Format::Json => LogFormat::Json,
            Format::Compact => LogFormat::Compact,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Obtain credentials and store them in the token file.
    Auth {
        /// Forget stored credentials first and ask for consent again.
        #[arg(long)]
        reset: bool,
    },

    /// Download a file's content.
    Download {
        /// Drive file id.
        file_id: String,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload a local file and print the new file id.
    Upload {
        path: PathBuf,

        /// Folder to upload into.
        #[arg(long)]
        parent: Option<String>,
    },

    /// List a folder's children as `id<TAB>name`.
    List {
        /// Folder id (`root` for My Drive).
        folder_id: String,
    },

    /// Create a folder and print its id.
    Mkdir {
        name: String,

        /// Folder to create it in.
        #[arg(long)]
        parent: Option<String>,
    },
}

#[core_async::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let mut logging = LoggingConfig::default()
        .with_format(cli.format.into())
        .with_level(level)
        .with_target(cli.verbose);
    if let Ok(filter) = std::env::var("RUST_LOG") {
        logging = logging.with_filter(filter);
    }
    init_logging(logging)?;

    let mut builder = CoreConfig::builder().token_path(&cli.token);
    if let Some(path) = &cli.client_secrets {
        builder = builder.client_secrets_path(path);
    }
    if cli.corrected_mime {
        builder = builder.mime_table(MimeTable::corrected());
    }
    let config = builder.build().context("Invalid configuration")?;
    debug!(?config, "Configuration loaded");

    let client = DriveClient::new(config);

    match cli.command {
        Commands::Auth { reset } => cmd_auth(&client, reset).await,
        Commands::Download { file_id, output } => cmd_download(&client, &file_id, output).await,
        Commands::Upload { path, parent } => cmd_upload(&client, path, parent.as_deref()).await,
        Commands::List { folder_id } => cmd_list(&client, &folder_id).await,
        Commands::Mkdir { name, parent } => cmd_mkdir(&client, &name, parent.as_deref()).await,
    }
}

async fn cmd_auth(client: &DriveClient, reset: bool) -> Result<()> {
    if reset && client.sign_out().await? {
        info!("Removed stored credentials");
    }

    let credentials = client.authorize().await.context("Authorization failed")?;
    let expiry = credentials
        .expiry
        .map(|e| e.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());
    println!("Authorized; access token valid until {}", expiry);
    Ok(())
}

async fn cmd_download(client: &DriveClient, file_id: &str, output: Option<PathBuf>) -> Result<()> {
    let bytes = client
        .read_file(file_id)
        .await
        .with_context(|| format!("Failed to download {}", file_id))?;

    match output {
        Some(path) => {
            core_async::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = bytes.len(), "Saved download");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

async fn cmd_upload(client: &DriveClient, path: PathBuf, parent: Option<&str>) -> Result<()> {
    let id = client
        .upload_file(&path, parent)
        .await
        .with_context(|| format!("Failed to upload {}", path.display()))?;
    println!("{}", id);
    Ok(())
}

async fn cmd_list(client: &DriveClient, folder_id: &str) -> Result<()> {
    let entries = client
        .list_files(folder_id)
        .await
        .with_context(|| format!("Failed to list {}", folder_id))?;

    for entry in entries {
        println!("{}\t{}", entry.id, entry.name);
    }
    Ok(())
}

async fn cmd_mkdir(client: &DriveClient, name: &str, parent: Option<&str>) -> Result<()> {
    let id = client
        .create_folder(name, parent)
        .await
        .with_context(|| format!("Failed to create folder {}", name))?;
    println!("{}", id);
    Ok(())
}
