use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "octofhir-smart")]
#[command(about = "SMART Backend Services client: register, obtain and validate access tokens")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: ~/.octofhir/smart.toml)
    #[arg(short, long, global = true, env = "OCTOFHIR_SMART_CONFIG")]
    pub config: Option<PathBuf>,

    /// JWKS file holding this client's private signing keys
    /// (default: ~/.octofhir/smart-keys.json)
    #[arg(short, long, global = true, env = "OCTOFHIR_SMART_KEYS")]
    pub keys: Option<PathBuf>,

    /// Credential store file (default: ~/.octofhir/smart-store.json)
    #[arg(long, global = true, env = "OCTOFHIR_SMART_STORE")]
    pub store: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage remote authorization servers
    Servers(ServersArgs),
    /// Register this client with a server (dynamic client registration)
    Register(ServerArgs),
    /// Obtain an access token from a server
    Token(TokenArgs),
    /// Sign a client assertion without sending it
    Assertion(AssertionArgs),
    /// Validate a bearer token using the [validator] configuration
    Validate(ValidateArgs),
    /// Drop cached access tokens
    ClearTokens(ClearTokensArgs),
    /// Manage local key material
    Keys(KeysArgs),
}

#[derive(clap::Args)]
pub struct ServersArgs {
    #[command(subcommand)]
    pub command: ServersCommands,
}

#[derive(Subcommand)]
pub enum ServersCommands {
    /// Add a server, discovering its SMART configuration unless given
    Add(ServerAddArgs),
    /// Re-discover a server's configuration and keys
    Reload(ServerArgs),
    /// List known servers
    List,
}

#[derive(clap::Args)]
pub struct ServerArgs {
    /// Server base URL
    pub url: String,
}

#[derive(clap::Args)]
pub struct ServerAddArgs {
    /// Server base URL
    pub url: String,
    /// JSON file with the server metadata (skips discovery)
    #[arg(long)]
    pub metadata: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct TokenArgs {
    /// Server base URL
    pub url: String,
    /// Signing key id (overrides client.signing_key_id)
    #[arg(long)]
    pub kid: Option<String>,
    /// Requested scopes (overrides client.scopes)
    #[arg(long)]
    pub scopes: Option<String>,
    /// Return any cached token, even an expired one
    #[arg(long)]
    pub cached: bool,
}

#[derive(clap::Args)]
pub struct AssertionArgs {
    /// Client id used as iss and sub
    #[arg(long)]
    pub client_id: String,
    /// Audience, usually the token endpoint
    #[arg(long)]
    pub audience: String,
    /// Signing key id
    #[arg(long)]
    pub kid: Option<String>,
}

#[derive(clap::Args)]
pub struct ValidateArgs {
    /// The bearer token
    pub token: String,
    /// Ask the introspection endpoint instead of checking the signature
    #[arg(long)]
    pub introspect: bool,
}

#[derive(clap::Args)]
pub struct ClearTokensArgs {
    /// Server base URL (all servers if omitted)
    pub url: Option<String>,
}

#[derive(clap::Args)]
pub struct KeysArgs {
    #[command(subcommand)]
    pub command: KeysCommands,
}

#[derive(Subcommand)]
pub enum KeysCommands {
    /// Convert an RSA private key PEM into a JWKS
    ImportPem(ImportPemArgs),
}

#[derive(clap::Args)]
pub struct ImportPemArgs {
    /// PEM file (PKCS#8 or PKCS#1)
    pub file: PathBuf,
    /// Key id to assign
    #[arg(long)]
    pub kid: String,
}
