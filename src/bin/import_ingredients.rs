//! Loads `name,measurement_unit` rows from a CSV file into the ingredient catalog
//! and adds the default meal tags.
//!
//! Usage: `import-ingredients <path>`. Rows and tags that already exist are skipped.

use std::{env, error::Error, fs};

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, EnvFilter};

use recipe_share::{
    actions::{import_ingredients, parse_ingredient_csv, seed_default_tags},
    MIGRATOR,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = dotenvy::dotenv();
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let Some(path) = env::args().nth(1) else {
        return Err("usage: import-ingredients <path-to-csv>".into());
    };

    let data = fs::read_to_string(&path)?;
    let rows = parse_ingredient_csv(&data)?;
    log::info!("Parsed {} ingredients from {path}", rows.len());

    let database_url = dotenvy::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;
    MIGRATOR.run(&pool).await?;

    let added = import_ingredients(&pool, &rows).await?;
    log::info!("Imported {added} new ingredients, {} already present", rows.len() as u64 - added);

    let tags = seed_default_tags(&pool).await?;
    log::info!("Added {tags} default tags");

    pool.close().await;
    Ok(())
}
