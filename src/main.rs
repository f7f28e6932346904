use std::path::PathBuf;
use std::process::ExitCode;

use auth_connector::{AuthenticationConnector, Configuration, CredentialInput, initialize_connector};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file, `config.yaml` when omitted.
    #[clap(long, short, env = "AUTH_CONNECTOR_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Bind as a principal and print the issued token.
    Authenticate {
        principal: String,
        #[clap(long, env = "AUTH_CONNECTOR_CREDENTIAL", hide_env_values = true)]
        credential: String,
    },
    /// Print the role held by a principal.
    Role { principal: String },
    /// Print the effective directory configuration.
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            ExitCode::FAILURE
        },
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let Args { config, cmd } = args;

    match cmd {
        Commands::Authenticate {
            principal,
            credential,
        } => {
            let connector = initialize_connector(config)?;
            let token = connector
                .authenticate(&CredentialInput::new(principal, credential))
                .await?;
            println!("{token}");
        },
        Commands::Role { principal } => {
            let connector = initialize_connector(config)?;
            let role = connector.resolve_role(&principal).await?;
            println!("{role}");
        },
        Commands::Config => {
            let config = Configuration::default()
                .path(config.unwrap_or_default())
                .read()?;
            print!("{}", serde_yaml::to_string(&config.directory.redacted())?);
        },
    }

    Ok(())
}
