mod cli;
mod commands;
mod config;
mod observability;
mod output;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, KeysCommands, ServersCommands};
use octofhir_smart_client::{
    FileCredentialStore, KeySet, SmartClientConfig, TokenClient, TokenValidator,
};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing(&cli.log_level);

    let settings = config::load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Servers(args) => match &args.command {
            ServersCommands::Add(add) => {
                let client = make_client(&cli, &settings, KeySet::new()).await?;
                commands::servers::add(&client, &add.url, add.metadata.as_deref()).await?;
            }
            ServersCommands::Reload(server) => {
                let client = make_client(&cli, &settings, KeySet::new()).await?;
                commands::servers::reload(&client, &server.url).await?;
            }
            ServersCommands::List => {
                let client = make_client(&cli, &settings, KeySet::new()).await?;
                commands::servers::list(&client).await?;
            }
        },
        Commands::Register(server) => {
            let keys = config::load_keys(cli.keys.as_deref())?;
            let client = make_client(&cli, &settings, keys).await?;
            commands::token::register(&client, &server.url).await?;
        }
        Commands::Token(args) => {
            let keys = config::load_keys(cli.keys.as_deref())?;
            let client = make_client(&cli, &settings, keys).await?;
            commands::token::token(&client, args).await?;
        }
        Commands::Assertion(args) => {
            let keys = config::load_keys(cli.keys.as_deref())?;
            let client = make_client(&cli, &settings, keys).await?;
            commands::token::assertion(&client, args)?;
        }
        Commands::Validate(args) => {
            let validator = TokenValidator::from_config(&settings)?;
            commands::validate::validate(&validator, &args.token, args.introspect).await?;
        }
        Commands::ClearTokens(args) => {
            let client = make_client(&cli, &settings, KeySet::new()).await?;
            commands::token::clear_tokens(&client, args.url.as_deref()).await?;
        }
        Commands::Keys(args) => match &args.command {
            KeysCommands::ImportPem(import) => {
                commands::keys::import_pem(&import.file, &import.kid)?;
            }
        },
    }

    Ok(())
}

/// Builds a client over the file-backed store. Commands that never sign
/// anything get an empty key set.
async fn make_client(cli: &Cli, settings: &SmartClientConfig, keys: KeySet) -> Result<TokenClient> {
    let path = config::store_path(cli.store.as_deref())?;
    let store = FileCredentialStore::open(path).await?;
    Ok(TokenClient::from_config(keys, Arc::new(store), settings)?)
}
