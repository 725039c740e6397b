use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, HtmlError, QueryError, TypeError},
    schema::{Id, Ingredient},
};

/// Escapes LIKE wildcards so user input only matches literally.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Lists ingredients, optionally restricted to a case-insensitive name prefix.
pub async fn list_ingredients(
    pool: &Pool<Postgres>,
    name_prefix: Option<&str>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = match name_prefix.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prefix) => sqlx::query_as(
            "SELECT id, name, measurement_unit FROM ingredients WHERE name ILIKE $1 || '%' ORDER BY name",
        )
        .bind(escape_like(prefix))
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?,
        None => sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

pub async fn get_ingredient(pool: &Pool<Postgres>, id: Id) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> =
        sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn create_ingredient(
    pool: &Pool<Postgres>,
    name: &str,
    measurement_unit: &str,
) -> Result<Ingredient, Error> {
    let row: Option<Ingredient> = sqlx::query_as(
        "
        INSERT INTO ingredients (name, measurement_unit)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING RETURNING id, name, measurement_unit;
    ",
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    row.ok_or_else(|| {
        HtmlError::InvalidRequest.new("Ingredient with this name and measurement unit already exists")
    })
}

pub async fn update_ingredient(
    pool: &Pool<Postgres>,
    id: Id,
    name: &str,
    measurement_unit: &str,
) -> Result<Ingredient, Error> {
    if get_ingredient(pool, id).await?.is_none() {
        return Err(HtmlError::NotFound.default());
    }

    let conflict: (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM ingredients WHERE name = $1 AND measurement_unit = $2 AND id <> $3)",
    )
    .bind(name)
    .bind(measurement_unit)
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    if conflict.0 {
        return Err(HtmlError::InvalidRequest
            .new("Ingredient with this name and measurement unit already exists"));
    }

    let row: Ingredient = sqlx::query_as(
        "UPDATE ingredients SET name = $1, measurement_unit = $2 WHERE id = $3 RETURNING id, name, measurement_unit",
    )
    .bind(name)
    .bind(measurement_unit)
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

/// Deletes an ingredient that no recipe uses.
pub async fn delete_ingredient(pool: &Pool<Postgres>, id: Id) -> Result<(), Error> {
    if get_ingredient(pool, id).await?.is_none() {
        return Err(HtmlError::NotFound.default());
    }

    let used: (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM recipe_ingredients WHERE ingredient_id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(QueryError::from)?;

    if used.0 {
        return Err(HtmlError::InvalidRequest.new("Ingredient is used in recipes and cannot be deleted"));
    }

    sqlx::query("DELETE FROM ingredients WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Parses headerless `name,measurement_unit` records. Fields may be quoted,
/// and blank records are skipped.
pub fn parse_ingredient_csv(data: &str) -> Result<Vec<(String, String)>, TypeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| TypeError::new(&format!("Malformed CSV: {e}")))?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let (Some(name), Some(unit), None) = (record.get(0), record.get(1), record.get(2)) else {
            return Err(TypeError::new(&format!("Line {line}: expected name,unit")));
        };
        if name.is_empty() || unit.is_empty() {
            return Err(TypeError::new(&format!("Line {line}: empty value")));
        }

        rows.push((name.to_string(), unit.to_string()));
    }

    Ok(rows)
}

/// Inserts every pair that does not exist yet; returns how many were added.
pub async fn import_ingredients(
    pool: &Pool<Postgres>,
    ingredients: &[(String, String)],
) -> Result<u64, Error> {
    let mut tr = pool.begin().await.map_err(QueryError::from)?;
    let mut added = 0;

    for (name, unit) in ingredients {
        let result = sqlx::query(
            "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(name)
        .bind(unit)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

        added += result.rows_affected();
    }

    tr.commit().await.map_err(QueryError::from)?;

    Ok(added)
}
