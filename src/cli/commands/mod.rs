use crate::identity::DEFAULT_JWKS_URL;
use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("sharemeal")
        .about("Food donation marketplace API")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("3000")
                .env("SHAREMEAL_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Database connection string, example: postgres://localhost:5432/sharemeal")
                .env("SHAREMEAL_DSN")
                .required(true),
        )
        .arg(
            Arg::new("db-user")
                .long("db-user")
                .help("Database user, overrides the one in the DSN")
                .env("SHAREMEAL_DB_USER"),
        )
        .arg(
            Arg::new("db-password")
                .long("db-password")
                .help("Database password, overrides the one in the DSN")
                .env("SHAREMEAL_DB_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("db-max-connections")
                .long("db-max-connections")
                .help("Maximum number of pooled database connections")
                .default_value("5")
                .env("SHAREMEAL_DB_MAX_CONNECTIONS")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("firebase-project-id")
                .long("firebase-project-id")
                .help("Firebase project id; ID tokens must be issued for it")
                .env("SHAREMEAL_FB_PROJECT_ID")
                .required_unless_present("firebase-service-key"),
        )
        .arg(
            Arg::new("firebase-service-key")
                .long("firebase-service-key")
                .help("Base64 encoded Firebase service account JSON, used for its project_id")
                .env("SHAREMEAL_FB_SERVICE_KEY")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("jwks-url")
                .long("jwks-url")
                .help("JWKS endpoint with the ID token signing keys")
                .default_value(DEFAULT_JWKS_URL)
                .env("SHAREMEAL_JWKS_URL"),
        )
        .arg(
            Arg::new("cors-origin")
                .long("cors-origin")
                .help("Allowed browser origin, example: https://sharemeal.dev (default: any)")
                .env("SHAREMEAL_CORS_ORIGIN"),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("SHAREMEAL_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
