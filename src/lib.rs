mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
pub mod api;
pub mod config;
mod constants;
pub mod context;
pub mod export;

pub use authentication::*;
pub use constants::*;
pub use database::*;

/// Embedded schema migrations, applied by the server on startup.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
