use sqlx::{Pool, Postgres};

use crate::{
    constants::DEFAULT_TAGS,
    error::{Error, FieldErrors, HtmlError, QueryError},
    form::NewTag,
    schema::{Id, LinkedTag, Tag},
};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT id, name, color, slug FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn get_tag(pool: &Pool<Postgres>, id: Id) -> Result<Option<Tag>, Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT id, name, color, slug FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(tag)
}

pub async fn list_tags_for_recipes(
    pool: &Pool<Postgres>,
    recipe_ids: &[Id],
) -> Result<Vec<LinkedTag>, Error> {
    let list: Vec<LinkedTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id AS recipe_id, t.id AS id, t.name AS name, t.color AS color, t.slug AS slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(list)
}

/// Field errors for a name or slug already used by another tag.
async fn check_unique(pool: &Pool<Postgres>, tag: &NewTag, except: Option<Id>) -> Result<(), Error> {
    let taken: (bool, bool) = sqlx::query_as(
        "
        SELECT
            EXISTS (SELECT 1 FROM tags WHERE name = $1 AND id IS DISTINCT FROM $3),
            EXISTS (SELECT 1 FROM tags WHERE slug = $2 AND id IS DISTINCT FROM $3)
    ",
    )
    .bind(&tag.name)
    .bind(&tag.slug)
    .bind(except)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    let mut errors = FieldErrors::default();
    if taken.0 {
        errors.add("name", "A tag with this name already exists.");
    }
    if taken.1 {
        errors.add("slug", "A tag with this slug already exists.");
    }
    errors.into_result()
}

pub async fn create_tag(pool: &Pool<Postgres>, tag: NewTag) -> Result<Tag, Error> {
    check_unique(pool, &tag, None).await?;

    let row: Option<Tag> = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING RETURNING id, name, color, slug",
    )
    .bind(&tag.name)
    .bind(&tag.color)
    .bind(&tag.slug)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    row.ok_or_else(|| HtmlError::InvalidRequest.new("Tag already exists"))
}

pub async fn update_tag(pool: &Pool<Postgres>, id: Id, tag: NewTag) -> Result<Tag, Error> {
    if get_tag(pool, id).await?.is_none() {
        return Err(HtmlError::NotFound.default());
    }
    check_unique(pool, &tag, Some(id)).await?;

    let row: Tag = sqlx::query_as(
        "UPDATE tags SET name = $1, color = $2, slug = $3 WHERE id = $4 RETURNING id, name, color, slug",
    )
    .bind(&tag.name)
    .bind(&tag.color)
    .bind(&tag.slug)
    .bind(id)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn delete_tag(pool: &Pool<Postgres>, id: Id) -> Result<(), Error> {
    let result = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.default());
    }

    Ok(())
}

/// Inserts the default meal tags that are missing; returns how many were added.
pub async fn seed_default_tags(pool: &Pool<Postgres>) -> Result<u64, Error> {
    let mut tr = pool.begin().await.map_err(QueryError::from)?;
    let mut added = 0;

    for (name, slug, color) in DEFAULT_TAGS {
        let result = sqlx::query(
            "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(*name)
        .bind(*color)
        .bind(*slug)
        .execute(&mut *tr)
        .await
        .map_err(QueryError::from)?;

        added += result.rows_affected();
    }

    tr.commit().await.map_err(QueryError::from)?;

    Ok(added)
}
