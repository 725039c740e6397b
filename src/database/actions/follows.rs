use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use super::{get_profile, get_user_by_id};
use crate::{
    error::{Error, HtmlError, QueryError},
    pagination::{PageContext, Pagination},
    schema::{AuthoredRecipe, Id, RecipeShort, Subscription, UserProfile},
};

pub fn ensure_not_self(user_id: Id, author_id: Id) -> Result<(), Error> {
    if user_id == author_id {
        return Err(HtmlError::InvalidRequest.new("You cannot subscribe to yourself"));
    }
    Ok(())
}

pub async fn subscribe(
    pool: &Pool<Postgres>,
    user_id: Id,
    author_id: Id,
    recipes_limit: Option<i64>,
) -> Result<Subscription, Error> {
    ensure_not_self(user_id, author_id)?;

    if get_user_by_id(pool, author_id).await?.is_none() {
        return Err(HtmlError::NotFound.default());
    }

    let result = sqlx::query(
        "INSERT INTO follows (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are already subscribed to this author"));
    }

    let Some(author) = get_profile(pool, author_id, Some(user_id)).await? else {
        return Err(HtmlError::NotFound.default());
    };
    let mut subscriptions = attach_recipes(pool, vec![author], recipes_limit).await?;

    subscriptions
        .pop()
        .ok_or_else(|| HtmlError::InternalServerError.default())
}

pub async fn unsubscribe(pool: &Pool<Postgres>, user_id: Id, author_id: Id) -> Result<(), Error> {
    if get_user_by_id(pool, author_id).await?.is_none() {
        return Err(HtmlError::NotFound.default());
    }

    let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("Cannot remove: you are not subscribed to this author"));
    }

    Ok(())
}

pub async fn fetch_subscriptions(
    pool: &Pool<Postgres>,
    user_id: Id,
    pagination: Pagination,
    recipes_limit: Option<i64>,
) -> Result<PageContext<Subscription>, Error> {
    let rows: Vec<UserProfile> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name, TRUE AS is_subscribed, COUNT(*) OVER() AS count
        FROM follows f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.user_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(pagination.limit)
    .bind(pagination.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let subscriptions = attach_recipes(pool, rows, recipes_limit).await?;

    Ok(PageContext::from_rows(subscriptions, total_count, pagination))
}

/// Adds each author's newest recipes (up to `recipes_limit`) and their total recipe count.
async fn attach_recipes(
    pool: &Pool<Postgres>,
    authors: Vec<UserProfile>,
    recipes_limit: Option<i64>,
) -> Result<Vec<Subscription>, Error> {
    let author_ids: Vec<Id> = authors.iter().map(|author| author.id).collect();

    let counts: HashMap<Id, i64> = sqlx::query_as::<_, (Id, i64)>(
        "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
    )
    .bind(&author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?
    .into_iter()
    .collect();

    let rows: Vec<AuthoredRecipe> = sqlx::query_as(
        "
        SELECT author_id, id, name, image, cooking_time FROM (
            SELECT r.*, ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.id DESC) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR position <= $2
        ORDER BY author_id, id DESC
    ",
    )
    .bind(&author_ids)
    .bind(recipes_limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut recipes: HashMap<Id, Vec<RecipeShort>> = HashMap::new();
    for row in rows {
        recipes.entry(row.author_id).or_default().push(row.recipe);
    }

    Ok(authors
        .into_iter()
        .map(|author| Subscription {
            recipes: recipes.remove(&author.id).unwrap_or_default(),
            recipes_count: counts.get(&author.id).copied().unwrap_or(0),
            author,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cannot_follow_yourself() {
        let error = ensure_not_self(3, 3).unwrap_err();

        assert_eq!(error.code(), 400);
        assert_eq!(error.info(), "You cannot subscribe to yourself");
        assert!(ensure_not_self(3, 4).is_ok());
    }
}
