use anyhow::Result;
use clap::{Parser, ValueEnum};
use eesmoke::{CredentialMode, Session, SmokeTest, acquire, credentials_path, load_config};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Use the credential file already on disk
    Ambient,
    /// Write EARTHENGINE_TOKEN to the credential file, then use it
    Persist,
    /// Build credentials from EARTHENGINE_TOKEN without writing to disk
    InMemory,
}

impl From<Mode> for CredentialMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Ambient => CredentialMode::Ambient,
            Mode::Persist => CredentialMode::Persist,
            Mode::InMemory => CredentialMode::InMemory,
        }
    }
}

/// Authenticate against Earth Engine, echo a greeting and sample Mount Everest.
#[derive(Debug, Parser)]
#[command(name = "ee-smoke", version, about)]
struct Cli {
    /// How credentials are obtained
    #[arg(long, value_enum, default_value = "ambient")]
    credentials: Mode,

    /// Credential file path (defaults to ~/.config/earthengine/credentials)
    #[arg(long)]
    credentials_file: Option<PathBuf>,

    /// Cloud project to run computations under
    #[arg(long)]
    project: Option<String>,

    /// Earth Engine API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Attempts per request before giving up
    #[arg(long, default_value_t = 5)]
    retry_max: usize,

    /// Disable the progress spinner
    #[arg(long)]
    no_progress: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn run(cli: Cli) -> Result<()> {
    let mode = CredentialMode::from(cli.credentials);
    tracing::info!(?mode, "acquiring credentials");

    let path = credentials_path(cli.credentials_file)?;
    let credentials = acquire(mode, &path)?;

    let session = Session::new(credentials, load_config(cli.api_url, cli.project, None))?
        .with_retry_max(cli.retry_max)
        .with_progress(!cli.no_progress);
    session.initialize()?;

    let report = SmokeTest::default().run(&session)?;
    println!("{}", report.greeting);
    println!("Mount Everest elevation (m): {}", report.elevation);
    println!("Test passed: The elevation of Mount Everest was retrieved successfully.");
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    eesmoke::init_logger(cli.verbose);

    if let Err(e) = run(cli) {
        tracing::debug!("smoke test failed: {:?}", e);
        eprintln!("Test failed: {:#}", e);
        std::process::exit(1);
    }
}
