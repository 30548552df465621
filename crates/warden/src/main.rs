use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use warden::{build_pdp, deploy_files, loader, RootConfig, RootError};

/// Warden: an XACML policy decision point
///
/// Deploys JSON policy documents and decides JSON requests against them.
#[derive(Parser, Debug)]
#[command(name = "warden", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decide a request and print the response as JSON
    Evaluate {
        /// Policy documents deployed after those in the config file
        #[arg(short, long, num_args = 1..)]
        policies: Vec<PathBuf>,

        /// Request document
        #[arg(short, long)]
        request: PathBuf,
    },

    /// Load and validate policy documents without deciding anything
    Check {
        #[arg(short, long, num_args = 1..)]
        policies: Vec<PathBuf>,
    },

    /// List the registered combining algorithms
    Algorithms,

    /// List the registered functions
    Functions,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("warden=debug,warden_policy=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warden=info"))
    };

    // Logs go to stderr so that stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RootConfig, RootError> {
    match path {
        Some(p) => RootConfig::load(p),
        None => {
            let default_path = RootConfig::default_config_path();
            RootConfig::load(&default_path)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = run(cli);
    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), RootError> {
    match cli.command {
        Commands::Evaluate { policies, request } => cmd_evaluate(cli.config.as_ref(), &policies, &request),
        Commands::Check { policies } => cmd_check(cli.config.as_ref(), &policies),
        Commands::Algorithms => cmd_algorithms(cli.config.as_ref()),
        Commands::Functions => cmd_functions(cli.config.as_ref()),
    }
}

fn cmd_evaluate(config_path: Option<&PathBuf>, policies: &[PathBuf], request: &Path) -> Result<(), RootError> {
    let config = load_config(config_path)?;
    let pdp = build_pdp(&config)?;
    deploy_files(&pdp, policies)?;

    let request = loader::load_request(request)?;
    let response = pdp.evaluate(&request);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn cmd_check(config_path: Option<&PathBuf>, policies: &[PathBuf]) -> Result<(), RootError> {
    let config = load_config(config_path)?;
    let pdp = build_pdp(&config)?;
    deploy_files(&pdp, policies)?;

    let nodes = pdp.repository().evaluatables();
    info!(count = nodes.len(), "policies valid");
    println!("{} evaluatable(s) deployed:", nodes.len());
    for node in nodes {
        println!("  {} (version {})", node.id(), node.version());
    }
    Ok(())
}

fn cmd_algorithms(config_path: Option<&PathBuf>) -> Result<(), RootError> {
    let config = load_config(config_path)?;
    let pdp = build_pdp(&config)?;
    let algorithms = pdp.algorithms();

    let mut rule_ids = algorithms.rule_ids();
    rule_ids.sort_unstable();
    println!("Rule-combining algorithms:");
    for id in rule_ids {
        println!("  {}", id);
    }

    let mut policy_ids = algorithms.policy_ids();
    policy_ids.sort_unstable();
    println!("Policy-combining algorithms:");
    for id in policy_ids {
        let marker = if id == config.pdp.root_combining_algorithm { " (root)" } else { "" };
        println!("  {}{}", id, marker);
    }
    Ok(())
}

fn cmd_functions(config_path: Option<&PathBuf>) -> Result<(), RootError> {
    let config = load_config(config_path)?;
    let pdp = build_pdp(&config)?;
    let mut ids = pdp.functions().ids();
    ids.sort_unstable();
    println!("Functions ({}):", ids.len());
    for id in ids {
        println!("  {}", id);
    }
    Ok(())
}
