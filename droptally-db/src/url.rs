use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;

pub fn postgres_url_from_environment() -> String {
    #[derive(Debug, PartialEq, Deserialize)]
    struct DbConfig {
        user: String,
        pass: String,
        host: Option<String>,
        name: Option<String>,
    }
    let provider = figment::providers::Env::prefixed("DB_");
    let db_config: DbConfig = figment::Figment::from(provider)
        .extract()
        .expect("Database connection environment variable(s) missing or invalid");

    // Trailing newlines sneak in when the password comes from a mounted
    // secret file; anything else stays untouched.
    let password = db_config.pass.strip_suffix('\n').unwrap_or(&db_config.pass);
    let password = utf8_percent_encode(password, NON_ALPHANUMERIC);

    format!(
        "postgres://{}:{}@{}/{}",
        db_config.user,
        password,
        db_config.host.as_deref().unwrap_or("localhost"),
        db_config.name.as_deref().unwrap_or("droptally"),
    )
}
