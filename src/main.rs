mod browser;
mod config;
mod export;
mod models;
mod pipeline;
mod scraper;
mod server;
mod upload;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::upload::DriveUploader;

#[derive(Parser)]
#[command(name = "q84-scraper", about = "q84sale real-estate listing scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape all configured categories and export one CSV per category
    Scrape {
        /// Keep only records published on this day: today, yesterday, or YYYY-MM-DD
        #[arg(long)]
        filter: Option<String>,

        /// Output directory for the exported files (default: from config)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Upload the exported files to Google Drive afterwards
        #[arg(long)]
        upload: bool,
    },

    /// Run the HTTP front-end
    Serve {
        /// Bind address, e.g. 127.0.0.1:8080 (default: from config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Print the configured category table
    Categories,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "q84sale_scraper=info,warn",
        1 => "q84sale_scraper=debug,info",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .compact()
        .with_target(false)
        .with_env_filter(EnvFilter::new(level))
        .init();

    let mut config = AppConfig::load()?;

    match cli.command {
        Command::Scrape {
            filter,
            out_dir,
            upload,
        } => {
            if filter.is_some() {
                config.pipeline.publish_filter = filter;
            }
            if let Some(dir) = out_dir {
                config.export.out_dir = dir;
            }

            let _t = utils::Timer::start("Scrape run");
            let (results, stats) = Pipeline::new(config.clone()).run().await?;
            info!(
                "Done: {} categories, {} records scraped, {} kept, {} page errors",
                stats.categories_processed,
                utils::fmt_number(stats.records_scraped as i64),
                utils::fmt_number(stats.records_kept as i64),
                stats.page_errors
            );

            let files = export::write_category_files(&results, &config.export.out_dir)?;
            info!(
                "Exported {} file(s) to {}",
                files.len(),
                config.export.out_dir.display()
            );

            if upload {
                if files.is_empty() {
                    warn!("Nothing to upload");
                } else {
                    let uploader = DriveUploader::from_credentials_file(
                        &config.upload.credentials_path,
                        config.upload.folder_id.clone(),
                    )?;
                    let uploaded = uploader.upload_all(&files).await;
                    info!("Uploaded {}/{} file(s)", uploaded, files.len());
                }
            }
        }

        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            server::serve(config).await?;
        }

        Command::Categories => {
            println!("{} categories:", config.categories.len());
            for category in &config.categories {
                println!(
                    "  {:<30} pages: {:<3} {}",
                    category.name, category.pages, category.url_template
                );
            }
        }
    }

    Ok(())
}
