use secrecy::SecretString;

/// Database credentials kept apart from the DSN so they never show up in logs.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub db_username: String,
    pub db_password: SecretString,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(db_username: Option<String>, db_password: Option<SecretString>) -> Self {
        Self {
            db_username: db_username.unwrap_or_default(),
            db_password: db_password.unwrap_or_default(),
        }
    }
}
