use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use clay::app::serve;
use clay::build::Builder;
use clay::config::Overrides;
use clay::scaffold::create_new;
use clay::site::{Site, SiteOptions};
use clay::BUILD_DIR;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(about, version)]
struct Args {
    /// command
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// start a new project
    New {
        /// where to create it
        dest: PathBuf,
        /// a project folder to copy instead of the default one
        template: Option<PathBuf>,
    },
    /// serve the source folder while designing
    Run {
        #[arg(long)]
        host: Option<String>,
        #[arg(long, short)]
        port: Option<u16>,
        /// source folder, `source` by default
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// build a static, relocatable copy of the site
    Build {
        /// source folder, `source` by default
        #[arg(long)]
        source: Option<PathBuf>,
        /// output folder, `build` by default
        #[arg(long)]
        folder: Option<PathBuf>,
        /// only report problems
        #[arg(long, short)]
        quiet: bool,
        /// copy static files even when the build has a newer copy
        #[arg(long, short)]
        force: bool,
    },
    /// print the version
    Version,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    match args.command {
        Commands::New { dest, template } => {
            init_logger();
            create_new(&dest, template.as_deref())
                .with_context(|| format!("Unable to create `{}`", dest.display()))?;
        }
        Commands::Run { host, port, source } => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "clay=debug,tower_http=debug".into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();
            let options = SiteOptions {
                source,
                overrides: Overrides {
                    host,
                    port,
                    ..Default::default()
                },
            };
            let site = Site::open(".", options)?;
            let (host, port) = (site.settings().host.clone(), site.settings().port);
            serve(site, &host, port).await?;
        }
        Commands::Build {
            source,
            folder,
            quiet,
            force,
        } => {
            init_logger();
            let options = SiteOptions {
                source,
                overrides: Overrides {
                    force: force.then_some(true),
                    ..Default::default()
                },
            };
            let site = Site::open(".", options)?;
            let folder = folder.unwrap_or_else(|| BUILD_DIR.into());
            let report = Builder::new(&site, &folder).quiet(quiet).run()?;
            if !report.fell_back.is_empty() {
                log::warn!("{} pages were copied from their source", report.fell_back.len());
            }
            if !report.failed.is_empty() {
                log::warn!("{} files couldn't be written", report.failed.len());
            }
            log::info!(
                "Built {} files and {} pages into `{}`",
                report.files.len(),
                report.index.len(),
                folder.display()
            );
        }
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
    }
    Ok(())
}
