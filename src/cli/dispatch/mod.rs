use crate::{
    cli::actions::{server, Action},
    identity::{ServiceAccount, DEFAULT_JWKS_URL},
};
use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;

/// Turn parsed arguments into the action to run.
///
/// # Errors
/// Returns an error if a required value is missing or the service key cannot be decoded.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let string = |name: &str| matches.get_one::<String>(name).cloned();

    Ok(Action::Server(server::Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(3000),
        dsn: string("dsn").ok_or_else(|| anyhow!("missing required argument: --dsn"))?,
        db_user: string("db-user"),
        db_password: string("db-password").map(SecretString::from),
        db_max_connections: matches
            .get_one::<u32>("db-max-connections")
            .copied()
            .unwrap_or(5),
        firebase_project_id: firebase_project_id(
            string("firebase-project-id"),
            string("firebase-service-key"),
        )?,
        jwks_url: string("jwks-url").unwrap_or_else(|| DEFAULT_JWKS_URL.to_string()),
        cors_origin: string("cors-origin"),
    }))
}

// An explicit project id wins over the one inside the service key.
fn firebase_project_id(project_id: Option<String>, service_key: Option<String>) -> Result<String> {
    if let Some(project_id) = project_id.filter(|id| !id.trim().is_empty()) {
        return Ok(project_id.trim().to_string());
    }

    let service_key = service_key
        .ok_or_else(|| anyhow!("missing --firebase-project-id or --firebase-service-key"))?;
    let account =
        ServiceAccount::from_base64(&service_key).context("Invalid --firebase-service-key")?;
    Ok(account.project_id)
}
