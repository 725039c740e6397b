use std::{
    env,
    fmt::{self, Display},
    net::SocketAddr,
    str::FromStr,
};

use log::{info, warn};

/// Upper bound for `TOKEN_LIFETIME_HOURS`: ten years.
const MAX_TOKEN_LIFETIME_HOURS: i64 = 24 * 365 * 10;

pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_lifetime_hours: i64,
    pub max_connections: u32,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: require("DATABASE_URL")?,
            host: try_load("APP_HOST", "0.0.0.0")?,
            port: try_load("APP_PORT", "8000")?,
            jwt_secret: require("JWT_SECRET")?,
            token_lifetime_hours: token_lifetime(try_load("TOKEN_LIFETIME_HOURS", "24")?)?,
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::new("APP_HOST", format!("{e}")))
    }
}

#[derive(Debug)]
pub struct ConfigError {
    key: String,
    info: String,
}

impl ConfigError {
    fn new(key: &str, info: String) -> Self {
        Self {
            key: key.to_string(),
            info,
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {} value: {}", self.key, self.info)
    }
}

impl std::error::Error for ConfigError {}

fn token_lifetime(hours: i64) -> Result<i64, ConfigError> {
    if !(1..=MAX_TOKEN_LIFETIME_HOURS).contains(&hours) {
        return Err(ConfigError::new(
            "TOKEN_LIFETIME_HOURS",
            format!("{hours} is outside 1..={MAX_TOKEN_LIFETIME_HOURS}"),
        ));
    }
    Ok(hours)
}

fn require(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::new(key, String::from("variable is not set")))
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    parse_value(key, env::var(key).ok(), default)
}

fn parse_value<T: FromStr>(key: &str, value: Option<String>, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            ConfigError::new(key, format!("{e}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default() {
        let port: u16 = parse_value("APP_PORT", None, "8000").unwrap();
        assert_eq!(port, 8000);
    }

    #[test]
    fn rejects_unparsable_values() {
        let result: Result<u16, _> = parse_value("APP_PORT", Some(String::from("http")), "8000");
        let error = result.unwrap_err();
        assert!(error.to_string().starts_with("Invalid APP_PORT value"));
    }

    #[test]
    fn token_lifetime_must_be_positive_and_bounded() {
        assert_eq!(token_lifetime(24).unwrap(), 24);
        assert!(token_lifetime(0).is_err());
        assert!(token_lifetime(-5).is_err());

        let error = token_lifetime(i64::MAX).unwrap_err();
        assert!(error.to_string().starts_with("Invalid TOKEN_LIFETIME_HOURS value"));
    }

    #[test]
    fn builds_socket_address() {
        let config = Config {
            database_url: String::new(),
            host: String::from("127.0.0.1"),
            port: 8080,
            jwt_secret: String::new(),
            token_lifetime_hours: 1,
            max_connections: 1,
        };

        assert_eq!(config.socket_addr().unwrap().port(), 8080);
    }
}
