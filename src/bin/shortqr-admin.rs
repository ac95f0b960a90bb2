use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shortqr::config::Config;
use shortqr::models::ShortLinkProperties;
use shortqr::services::Services;
use shortqr::storage::{ClickLog, Stores};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "shortqr-admin")]
#[command(about = "shortqr link management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shorten a URL
    Create {
        url: String,
        /// Sponsor recorded with the link
        #[arg(long)]
        sponsor: Option<String>,
        /// Also generate a QR code
        #[arg(long)]
        qr: bool,
    },
    /// Show a short link
    Show { code: String },
    /// Deactivate a short link (soft delete)
    Deactivate { code: String },
    /// Reactivate a short link
    Reactivate { code: String },
    /// Write the QR code of a short link to a PNG file
    Qr {
        code: String,
        #[arg(short, long, default_value = "qr.png")]
        output: PathBuf,
    },
    /// Count recorded clicks of a short link
    Clicks { code: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let stores = Stores::open(&config.database).await?;
    let services = Services::new(&config, &stores);

    match cli.command {
        Commands::Create { url, sponsor, qr } => {
            let properties = ShortLinkProperties {
                ip: None,
                sponsor,
                qr,
            };
            let record = services.shortener.create(&url, properties).await?;
            if record.qr_requested {
                // The server would generate in the background; a CLI run must wait
                services
                    .qr
                    .generate(&record.target_url, &record.short_code)
                    .await?;
            }
            println!(
                "✓ {}/{} -> {}",
                config.redirect_base_url, record.short_code, record.target_url
            );
        }
        Commands::Show { code } => {
            let record = services.shortener.find(&code).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Deactivate { code } => {
            services.shortener.set_active(&code, false).await?;
            println!("✓ Deactivated '{}'", code);
        }
        Commands::Reactivate { code } => {
            services.shortener.set_active(&code, true).await?;
            println!("✓ Reactivated '{}'", code);
        }
        Commands::Qr { code, output } => {
            let image = services.qr.get(&code).await?;
            tokio::fs::write(&output, &image)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("✓ Wrote {} bytes to {}", image.len(), output.display());
        }
        Commands::Clicks { code } => {
            let record = services.shortener.find(&code).await?;
            let count = stores.clicks.count(&record.short_code).await?;
            println!("{:<12} {}", record.short_code, count);
        }
    }

    services.clicks.shutdown().await;
    Ok(())
}
