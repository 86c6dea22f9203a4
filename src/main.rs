//! CLI entry point for postkit

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "postkit")]
#[command(version)]
#[command(about = "Parse, validate and serve markdown blog posts", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List posts, newest first
    #[command(alias = "ls")]
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List post slugs
    Slugs,

    /// Validate every post and report problems
    Check,

    /// Show a single post as JSON
    Show {
        /// Post slug (file name without extension)
        slug: String,

        /// Include rendered HTML
        #[arg(long)]
        html: bool,
    },

    /// Create a new post
    New {
        /// Title of the new post
        title: String,

        /// Category of the new post
        #[arg(short = 'C', long)]
        category: Option<String>,

        /// Comma-separated tags
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Serve posts over a JSON API
    #[command(alias = "s")]
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// IP address to bind to
        #[arg(short, long)]
        ip: Option<String>,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "postkit=debug,info"
    } else {
        "postkit=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Determine base directory
    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::List { json } => {
            let site = postkit::Site::new(&base_dir)?;
            postkit::commands::list::run(&site, json)?;
        }

        Commands::Slugs => {
            let site = postkit::Site::new(&base_dir)?;
            postkit::commands::list::slugs(&site)?;
        }

        Commands::Check => {
            let site = postkit::Site::new(&base_dir)?;
            let summary = postkit::commands::check::run(&site)?;
            if !summary.is_ok() {
                std::process::exit(1);
            }
        }

        Commands::Show { slug, html } => {
            let site = postkit::Site::new(&base_dir)?;
            postkit::commands::show::run(&site, &slug, html)?;
        }

        Commands::New {
            title,
            category,
            tags,
        } => {
            let site = postkit::Site::new(&base_dir)?;
            tracing::info!("Creating new post with title: {}", title);
            let new_post = postkit::commands::new::NewPost {
                title: &title,
                category: category.as_deref(),
                tags: tags
                    .iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect(),
            };
            let path = postkit::commands::new::create_post(&site, &new_post)?;
            println!("Created: {:?}", path);
        }

        Commands::Serve { port, ip } => {
            let site = postkit::Site::new(&base_dir)?;
            let ip = ip.unwrap_or_else(|| site.config.server.ip.clone());
            let port = port.unwrap_or(site.config.server.port);

            tracing::info!("Starting server at http://{}:{}", ip, port);
            postkit::server::start(&site, &ip, port).await?;
        }

        Commands::Version => {
            println!("postkit version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
