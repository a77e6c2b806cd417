use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CoreConfig {
    pub api_port: u16,
    pub redis_url: String,
    pub db_pool_size: u32,
    /// Static footer string carried on notification payloads.
    pub discord_message_footer: String,
    /// Advisory cap on pending notifications; crossing it only logs.
    pub queue_length: i64,
    pub jwt_token_key: Option<String>,
    pub attachment_root: String,
    pub attachment_base_url: String,
    pub group_sync_period_secs: u64,
    pub points_sweep_period_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_port: 31323,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            db_pool_size: 20,
            discord_message_footer: String::new(),
            queue_length: 10_000,
            jwt_token_key: None,
            attachment_root: "./data/user-upload".to_string(),
            attachment_base_url: "https://www.droptally.io/img/user-upload".to_string(),
            group_sync_period_secs: 60 * 60,
            points_sweep_period_secs: 5 * 60,
        }
    }
}

impl CoreConfig {
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("Droptally.toml"))
            .merge(Env::prefixed("DROPTALLY_"));
        // The deployment's historical bare names keep working.
        if let Ok(port) = std::env::var("API_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                figment = figment.merge(("api_port", port));
            }
        }
        if let Ok(depth) = std::env::var("QUEUE_LENGTH") {
            if let Ok(depth) = depth.parse::<i64>() {
                figment = figment.merge(("queue_length", depth));
            }
        }
        if let Ok(footer) = std::env::var("DISCORD_MESSAGE_FOOTER") {
            figment = figment.merge(("discord_message_footer", footer));
        }
        if let Ok(key) = std::env::var("JWT_TOKEN_KEY") {
            figment = figment.merge(("jwt_token_key", Some(key)));
        }
        figment
    }

    pub fn config() -> figment::Result<Self> {
        Self::figment().extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_the_documented_port() {
        let config = CoreConfig::default();
        assert_eq!(config.api_port, 31323);
        assert_eq!(config.queue_length, 10_000);
    }

    #[test]
    fn bare_env_names_override_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("API_PORT", "8099");
            jail.set_env("DISCORD_MESSAGE_FOOTER", "powered by droptally");
            let config: CoreConfig = CoreConfig::figment().extract()?;
            assert_eq!(config.api_port, 8099);
            assert_eq!(config.discord_message_footer, "powered by droptally");
            Ok(())
        });
    }
}
