use anyhow::Context;
use std::env;
use tracing::warn;

/// Server configuration read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl Config {
    /// Reads `DATABASE_URL` (required), `SERVER_HOST`, `SERVER_PORT`,
    /// `JWT_SECRET`, `DB_MAX_CONNECTIONS` and `RUN_MIGRATIONS`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;

        let host = lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("SERVER_PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| anyhow::anyhow!("Invalid SERVER_PORT"))?;

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using the development default");
            "secret".to_string()
        });

        let max_connections = lookup("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u32>()
            .map_err(|_| anyhow::anyhow!("Invalid DB_MAX_CONNECTIONS"))?;

        let run_migrations = lookup("RUN_MIGRATIONS")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            max_connections,
            run_migrations,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("DATABASE_URL", "postgres://localhost/retail")]).unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.max_connections, 10);
        assert!(config.run_migrations);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DATABASE_URL", "postgres://db/retail"),
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "8080"),
            ("JWT_SECRET", "k"),
            ("DB_MAX_CONNECTIONS", "4"),
            ("RUN_MIGRATIONS", "false"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.jwt_secret, "k");
        assert_eq!(config.max_connections, 4);
        assert!(!config.run_migrations);
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[]).is_err());
        assert!(config(&[("DATABASE_URL", "x"), ("SERVER_PORT", "http")]).is_err());
    }
}
