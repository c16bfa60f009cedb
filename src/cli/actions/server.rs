use crate::{
    api,
    cli::globals::GlobalArgs,
    identity::FirebaseVerifier,
    lifecycle::Coordinator,
    store::postgres::PgStore,
};
use anyhow::{anyhow, Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub db_user: Option<String>,
    pub db_password: Option<SecretString>,
    pub db_max_connections: u32,
    pub firebase_project_id: String,
    pub jwks_url: String,
    pub cors_origin: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database or keyset cannot be reached, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let globals = GlobalArgs::new(args.db_user.clone(), args.db_password.clone());
    debug!("Global args: {:?}", globals);

    let dsn = database_url(&args.dsn, &globals)?;

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(args.db_max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn.as_str())
        .await
        .context("Failed to connect to database")?;

    let store = PgStore::new(pool);
    store
        .migrate()
        .await
        .context("Failed to apply database schema")?;

    let verifier = FirebaseVerifier::new_remote(args.jwks_url, args.firebase_project_id).await?;

    let coordinator = Coordinator::new(Arc::new(store));
    let cors = api::cors_layer(args.cors_origin.as_deref())?;
    let app = api::router(coordinator, Arc::new(verifier), cors);

    api::new(args.port, app).await
}

// Credentials passed separately replace the ones embedded in the DSN.
fn database_url(dsn: &str, globals: &GlobalArgs) -> Result<Url> {
    let mut dsn = Url::parse(dsn).context("Invalid database DSN")?;

    if !globals.db_username.is_empty() {
        dsn.set_username(&globals.db_username)
            .map_err(|()| anyhow!("Error setting username"))?;
    }

    if !globals.db_password.expose_secret().is_empty() {
        dsn.set_password(Some(globals.db_password.expose_secret()))
            .map_err(|()| anyhow!("Error setting password"))?;
    }

    Ok(dsn)
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        (
            "db_user",
            args.db_user.clone().unwrap_or_else(|| "from dsn".to_string()),
        ),
        ("db_password_set", args.db_password.is_some().to_string()),
        ("db_max_connections", args.db_max_connections.to_string()),
        ("firebase_project_id", args.firebase_project_id.clone()),
        ("jwks_url", args.jwks_url.clone()),
        (
            "cors_origin",
            args.cors_origin.clone().unwrap_or_else(|| "*".to_string()),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn banner() -> String {
    BANNER.replace(
        "{VERSION}",
        &format!(
            " - {} - {}",
            env!("CARGO_PKG_VERSION"),
            short_commit(crate::GIT_COMMIT_HASH)
        ),
    )
}

fn short_commit(hash: &str) -> String {
    hash.trim().chars().take(7).collect()
}

const BANNER: &str = r"
    _____
   /     \
  | () () |   S H A R E   M E A L {VERSION}
   \  ^  /
    |||||";
