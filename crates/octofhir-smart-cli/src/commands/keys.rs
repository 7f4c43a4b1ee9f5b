use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use octofhir_smart_client::{Jwk, KeySet};

use crate::output::print_json;

/// Prints a JWKS holding the imported key, private parameters included.
pub fn import_pem(file: &Path, kid: &str) -> Result<()> {
    let pem = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let jwk = Jwk::from_rsa_pem(kid, &pem)?;
    print_json(&KeySet::from_keys(vec![jwk]))
}
