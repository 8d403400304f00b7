use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use tubetoonie::cli::{self, DownloadRequest};
use tubetoonie::core::bootstrap::{BootstrapConfig, BootstrapReport, Bootstrapper};
use tubetoonie::core::config::AppConfig;
use tubetoonie::core::models::{AppError, AppResult};
use tubetoonie::tui;
use tubetoonie::utils::init_tracing;

#[derive(Parser)]
#[command(name = "tubetoonie", version, about = "Download YouTube audio as MP3 and push it to creative tonies")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Download one or more URLs (the default when no subcommand is given)
    Download(DownloadArgs),
    /// Interactive menu with progress bars and tonie editing
    Tui,
    /// Prepare the environment (ffmpeg, yt-dlp, tools directory) and exit
    Setup,
    /// List the creative tonies on the configured account
    ListTonies,
    /// Store Tonie credentials in the OS secret store (macOS / Windows)
    Credentials {
        /// Remove stored credentials instead of setting them
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Args, Default)]
struct DownloadArgs {
    /// YouTube video URL; prompted for interactively when omitted
    url: Option<String>,

    /// Read URLs from a text file, one per line ('#' lines are comments)
    #[arg(long)]
    urls_file: Option<String>,

    /// Directory for the finished MP3s (default: configured dir, then cwd)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Skip the Tonie upload even when credentials are configured
    #[arg(long)]
    no_tonie: bool,
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start async runtime: {}", err);
            std::process::exit(3);
        }
    };

    let code = runtime.block_on(run(cli.command));
    std::process::exit(code);
}

async fn run(command: Option<Command>) -> i32 {
    let config = load_config();

    let result = match command.unwrap_or(Command::Download(DownloadArgs::default())) {
        Command::Download(args) => run_download(&config, args).await,
        Command::Tui => run_tui(&config).await,
        Command::Setup => run_setup(&config).await.map(|_| 0),
        Command::ListTonies => cli::list_tonies().await.map(|_| 0),
        Command::Credentials { clear } => cli::manage_credentials(clear).map(|_| 0),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            eprintln!("Error: {}", err);
            err.exit_code()
        }
    }
}

/// Load the persisted config, falling back to defaults when it is missing
/// or unreadable so a broken config file never blocks downloads.
fn load_config() -> AppConfig {
    match AppConfig::load().and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(err) => {
            warn!("Using default config: {}", err);
            AppConfig::default()
        }
    }
}

async fn bootstrap(config: &AppConfig) -> AppResult<BootstrapReport> {
    let bootstrap_config = BootstrapConfig::resolve(&config.bootstrap)?;
    let bootstrapper = Bootstrapper::new(bootstrap_config);
    let on_status: tubetoonie::core::models::StatusCallback =
        Arc::new(|message: &str| println!("{}", message));
    bootstrapper.run(Some(on_status)).await
}

async fn run_download(config: &AppConfig, args: DownloadArgs) -> AppResult<i32> {
    let report = bootstrap(config).await?;
    cli::run_download(
        config,
        &report,
        DownloadRequest {
            url: args.url,
            urls_file: args.urls_file,
            output_dir: args.output_dir,
            skip_tonie: args.no_tonie,
        },
    )
    .await
}

async fn run_tui(config: &AppConfig) -> AppResult<i32> {
    let bootstrap_config = BootstrapConfig::resolve(&config.bootstrap)?;
    if !bootstrap_config.is_provisioned() {
        return Err(AppError::Bootstrap(
            "Environment is not set up yet. Run `tubetoonie setup` first.".to_string(),
        ));
    }
    // Never installs or updates anything from this entry point.
    let report = bootstrap_config.existing_report();
    Ok(tui::run(config, &report).await)
}

async fn run_setup(config: &AppConfig) -> AppResult<()> {
    let report = bootstrap(config).await?;
    info!("Environment ready, yt-dlp at {:?}", report.ytdlp_path);
    println!("Environment ready.");
    println!("  yt-dlp: {}", report.ytdlp_path.display());
    match &report.tonie {
        tubetoonie::TonieSupport::Available => println!("  Tonie upload: available"),
        tubetoonie::TonieSupport::Degraded { reason } => {
            println!("  Tonie upload: disabled ({})", reason)
        }
    }
    Ok(())
}
