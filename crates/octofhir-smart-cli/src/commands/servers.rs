use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use octofhir_smart_client::{ServerMetadata, TokenClient};

use crate::output::{print_field, print_success};

pub async fn add(client: &TokenClient, url: &str, metadata_file: Option<&Path>) -> Result<()> {
    let metadata = match metadata_file {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let metadata: ServerMetadata = serde_json::from_str(&content)
                .with_context(|| format!("Invalid server metadata in {}", path.display()))?;
            Some(metadata)
        }
        None => None,
    };

    let metadata = client.add_server(url, metadata).await?;
    print_success(&format!("Added {url}"));
    print_metadata(&metadata);
    Ok(())
}

pub async fn reload(client: &TokenClient, url: &str) -> Result<()> {
    let metadata = client.reload_server(url).await?;
    print_success(&format!("Reloaded {url}"));
    print_metadata(&metadata);
    Ok(())
}

pub async fn list(client: &TokenClient) -> Result<()> {
    let store = client.store();
    let servers = store.servers().await?;
    if servers.is_empty() {
        println!("No servers. Add one with: octofhir-smart servers add <url>");
        return Ok(());
    }

    for server in servers {
        let registration = store.get_client_registration(&server).await?;
        let token = store.get_access_token(&server).await?;

        let client_id = registration
            .map(|r| r.client_id)
            .unwrap_or_else(|| "(not registered)".to_string());
        let token_state = match token {
            Some(token) if token.is_fresh() => "token cached".green(),
            Some(_) => "token expired".yellow(),
            None => "no token".normal(),
        };

        println!("{}  {}  {}", server.cyan(), client_id, token_state);
    }
    Ok(())
}

fn print_metadata(metadata: &ServerMetadata) {
    print_field("Token endpoint", &metadata.token_endpoint);
    let optional = [
        ("Registration endpoint", &metadata.registration_endpoint),
        ("JWKS URI", &metadata.jwks_uri),
        ("Introspection endpoint", &metadata.introspection_endpoint),
    ];
    for (label, value) in optional {
        print_field(label, value.as_deref().unwrap_or("(none)"));
    }
}
