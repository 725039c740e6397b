use std::sync::Arc;

use chrono::Duration;
use sqlx::{Pool, Postgres};

use crate::config::Config;

/// Per-request shared state handed to every route.
#[derive(Clone)]
pub struct Context {
    pub pool: Pool<Postgres>,
    pub auth: Arc<AuthSettings>,
}

pub struct AuthSettings {
    pub secret: Vec<u8>,
    pub token_lifetime: Duration,
}

impl Context {
    pub fn new(pool: Pool<Postgres>, config: &Config) -> Self {
        Self::with_secret(
            pool,
            config.jwt_secret.as_bytes(),
            Duration::hours(config.token_lifetime_hours),
        )
    }

    pub fn with_secret(pool: Pool<Postgres>, secret: &[u8], token_lifetime: Duration) -> Self {
        Self {
            pool,
            auth: Arc::new(AuthSettings {
                secret: secret.to_vec(),
                token_lifetime,
            }),
        }
    }
}
