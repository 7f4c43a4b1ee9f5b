use anyhow::Result;
use colored::Colorize;
use octofhir_smart_client::{Introspection, TokenValidator};
use time::OffsetDateTime;

use crate::output::{print_field, print_json, print_warning};

pub async fn validate(validator: &TokenValidator, token: &str, introspect: bool) -> Result<()> {
    if introspect {
        return remote(validator, token).await;
    }

    let verified = validator.validate_local(token).await?;
    println!("{}", "Signature valid".green());
    print_field("Key", verified.header.kid.as_deref().unwrap_or("(no kid)"));
    print_field("Algorithm", &format!("{:?}", verified.header.alg));
    if let Some(issuer) = verified.issuer() {
        print_field("Issuer", issuer);
    }
    if let Some(subject) = verified.subject() {
        print_field("Subject", subject);
    }

    if verified.is_expired_at(OffsetDateTime::now_utc().unix_timestamp()) {
        print_warning("Token has expired");
    }
    print_json(&verified.claims)
}

async fn remote(validator: &TokenValidator, token: &str) -> Result<()> {
    match validator.validate_remote(token).await? {
        Introspection::Active(response) => {
            println!("{}", "Active".green());
            print_json(&response)
        }
        Introspection::Inactive => {
            println!("{}", "Inactive".red());
            std::process::exit(2);
        }
    }
}
