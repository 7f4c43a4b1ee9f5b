use anyhow::Result;
use octofhir_smart_client::{RegistrationOutcome, TokenClient};

use crate::cli::{AssertionArgs, TokenArgs};
use crate::output::{print_json, print_success, print_warning};

pub async fn register(client: &TokenClient, url: &str) -> Result<()> {
    match client.register(url).await? {
        RegistrationOutcome::Registered(registration) => {
            print_success(&format!("Registered with {url}"));
            print_json(&registration)
        }
        RegistrationOutcome::Unavailable => {
            print_warning(&format!(
                "{url} does not support dynamic registration; provision a client out-of-band"
            ));
            Ok(())
        }
    }
}

pub async fn token(client: &TokenClient, args: &TokenArgs) -> Result<()> {
    let token = if args.cached {
        client.request_token(&args.url).await?
    } else {
        client
            .request_access_token(&args.url, args.kid.as_deref(), args.scopes.as_deref())
            .await?
    };

    if !token.is_fresh() {
        print_warning("Cached token has expired");
    }
    print_json(&token)
}

pub fn assertion(client: &TokenClient, args: &AssertionArgs) -> Result<()> {
    let assertion = client.generate_assertion(&args.client_id, &args.audience, args.kid.as_deref())?;
    println!("{assertion}");
    Ok(())
}

pub async fn clear_tokens(client: &TokenClient, url: Option<&str>) -> Result<()> {
    client.clear_tokens(url).await?;
    match url {
        Some(url) => print_success(&format!("Cleared cached token for {url}")),
        None => print_success("Cleared all cached tokens"),
    }
    Ok(())
}
