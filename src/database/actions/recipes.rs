use std::collections::HashMap;

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use super::{list_profiles, list_tags_for_recipes};
use crate::{
    authentication::permissions::{is_author_or_elevated, ActionType},
    error::{Error, HtmlError, QueryError},
    form::{Form, NewRecipe, RecipeChanges},
    jwt::SessionData,
    pagination::{PageContext, Pagination},
    schema::{Id, Recipe, RecipeDetail, RecipeIngredient, RecipeRow, RecipeShort},
};

/// Recipe list filters; the per-user flags only apply to authenticated requests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    pub fn from_form(form: &Form) -> Result<Self, Error> {
        Ok(Self {
            author: form.get_number("author")?,
            tags: form
                .get_all("tags")
                .into_iter()
                .map(|tag| tag.to_string())
                .collect(),
            is_favorited: form.get_flag("is_favorited"),
            is_in_shopping_cart: form.get_flag("is_in_shopping_cart"),
        })
    }
}

fn push_recipe_columns<'a>(query: &mut QueryBuilder<'a, Postgres>, viewer: Option<Id>) {
    query.push(
        "r.id, r.author_id, r.name, r.image, r.text, r.cooking_time,
        EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ",
    );
    query.push_bind(viewer);
    query.push(
        ") AS is_favorited,
        EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ",
    );
    query.push_bind(viewer);
    query.push(") AS is_in_shopping_cart");
}

pub async fn fetch_recipes(
    pool: &Pool<Postgres>,
    filter: &RecipeFilter,
    viewer: Option<Id>,
    pagination: Pagination,
) -> Result<PageContext<RecipeDetail>, Error> {
    let mut query = QueryBuilder::<Postgres>::new("SELECT ");
    push_recipe_columns(&mut query, viewer);
    query.push(", COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ");
        query.push_bind(author);
    }
    if !filter.tags.is_empty() {
        query.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        );
        query.push_bind(filter.tags.clone());
        query.push("))");
    }
    if let Some(viewer) = viewer {
        if filter.is_favorited {
            query.push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ");
            query.push_bind(viewer);
            query.push(")");
        }
        if filter.is_in_shopping_cart {
            query.push(" AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ");
            query.push_bind(viewer);
            query.push(")");
        }
    }

    query.push(" ORDER BY r.id DESC LIMIT ");
    query.push_bind(pagination.limit);
    query.push(" OFFSET ");
    query.push_bind(pagination.offset());

    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    if rows.is_empty() {
        return Ok(PageContext::no_rows(pagination));
    }

    let recipes = hydrate_recipes(pool, rows, viewer).await?;
    Ok(PageContext::from_rows(recipes, total_count, pagination))
}

/// Attaches tags, ingredients and author profiles, keeping the row order.
pub async fn hydrate_recipes(
    pool: &Pool<Postgres>,
    rows: Vec<RecipeRow>,
    viewer: Option<Id>,
) -> Result<Vec<RecipeDetail>, Error> {
    let recipe_ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut author_ids: Vec<Id> = rows.iter().map(|row| row.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let mut tags = HashMap::new();
    for linked in list_tags_for_recipes(pool, &recipe_ids).await? {
        tags.entry(linked.recipe_id)
            .or_insert_with(Vec::new)
            .push(linked.tag);
    }

    let mut ingredients = HashMap::new();
    for part in list_recipe_ingredients(pool, &recipe_ids).await? {
        ingredients
            .entry(part.recipe_id)
            .or_insert_with(Vec::new)
            .push(part);
    }

    let authors: HashMap<Id, _> = list_profiles(pool, &author_ids, viewer)
        .await?
        .into_iter()
        .map(|profile| (profile.id, profile))
        .collect();

    rows.into_iter()
        .map(|row| {
            let author = authors.get(&row.author_id).cloned().ok_or_else(|| {
                log::error!("Recipe {} references missing author {}", row.id, row.author_id);
                HtmlError::InternalServerError.default()
            })?;

            Ok(RecipeDetail {
                id: row.id,
                tags: tags.remove(&row.id).unwrap_or_default(),
                author,
                ingredients: ingredients.remove(&row.id).unwrap_or_default(),
                is_favorited: row.is_favorited,
                is_in_shopping_cart: row.is_in_shopping_cart,
                name: row.name,
                image: row.image,
                text: row.text,
                cooking_time: row.cooking_time,
            })
        })
        .collect()
}

pub async fn list_recipe_ingredients(
    pool: &Pool<Postgres>,
    recipe_ids: &[Id],
) -> Result<Vec<RecipeIngredient>, Error> {
    let rows: Vec<RecipeIngredient> = sqlx::query_as(
        "
        SELECT ri.recipe_id AS recipe_id, i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY i.name
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn get_recipe(pool: &Pool<Postgres>, id: Id) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as(
        "SELECT id, author_id, name, image, text, cooking_time FROM recipes WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_recipe_short(pool: &Pool<Postgres>, id: Id) -> Result<Option<RecipeShort>, Error> {
    let row: Option<RecipeShort> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_recipe_detail(
    pool: &Pool<Postgres>,
    id: Id,
    viewer: Option<Id>,
) -> Result<Option<RecipeDetail>, Error> {
    let mut query = QueryBuilder::<Postgres>::new("SELECT ");
    push_recipe_columns(&mut query, viewer);
    query.push(" FROM recipes r WHERE r.id = ");
    query.push_bind(id);

    let row: Option<RecipeRow> = query
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    match row {
        Some(row) => Ok(hydrate_recipes(pool, vec![row], viewer).await?.pop()),
        None => Ok(None),
    }
}

/// Loads a recipe for modification, enforcing author-or-admin write access.
pub async fn get_recipe_mut(
    pool: &Pool<Postgres>,
    id: Id,
    session: &SessionData,
) -> Result<Recipe, Error> {
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match get_recipe(pool, id).await? {
        Some(recipe) => {
            if is_author_or_elevated(session, recipe.author_id) {
                Ok(recipe)
            } else {
                Err(HtmlError::Forbidden.default())
            }
        }
        None => Err(HtmlError::NotFound.default()),
    }
}

pub async fn create_recipe(
    pool: &Pool<Postgres>,
    author_id: Id,
    recipe: NewRecipe,
) -> Result<Id, Error> {
    let duplicate: (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM recipes WHERE author_id = $1 AND name = $2 AND text = $3)",
    )
    .bind(author_id)
    .bind(&recipe.name)
    .bind(&recipe.text)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    if duplicate.0 {
        return Err(Error::field(
            &recipe.name,
            "A recipe with this name already exists!",
        ));
    }

    let mut tr = pool.begin().await.map_err(QueryError::from)?;

    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&recipe.name)
    .bind(&recipe.image)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    set_recipe_tags(&mut tr, id.0, &recipe.tags).await?;
    add_to_recipe(&mut tr, id.0, &recipe.ingredients).await?;

    tr.commit().await.map_err(QueryError::from)?;
    log::info!("User {author_id} created recipe {}", id.0);

    Ok(id.0)
}

pub async fn update_recipe(
    pool: &Pool<Postgres>,
    recipe: &Recipe,
    changes: RecipeChanges,
) -> Result<(), Error> {
    let mut tr = pool.begin().await.map_err(QueryError::from)?;

    sqlx::query(
        "
        UPDATE recipes SET
        name = COALESCE($1, name),
        image = COALESCE($2, image),
        text = COALESCE($3, text),
        cooking_time = COALESCE($4, cooking_time)
        WHERE id = $5
    ",
    )
    .bind(&changes.name)
    .bind(&changes.image)
    .bind(&changes.text)
    .bind(changes.cooking_time)
    .bind(recipe.id)
    .execute(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    if let Some(tags) = &changes.tags {
        set_recipe_tags(&mut tr, recipe.id, tags).await?;
    }
    if let Some(ingredients) = &changes.ingredients {
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(recipe.id)
            .execute(&mut *tr)
            .await
            .map_err(QueryError::from)?;

        add_to_recipe(&mut tr, recipe.id, ingredients).await?;
    }

    tr.commit().await.map_err(QueryError::from)?;

    Ok(())
}

pub async fn delete_recipe(pool: &Pool<Postgres>, id: Id) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Upserts `(ingredient, amount)` lines; an existing association accumulates the amount.
pub async fn add_to_recipe(
    conn: &mut PgConnection,
    recipe_id: Id,
    ingredients: &[(Id, i32)],
) -> Result<(), Error> {
    let mut ids: Vec<Id> = ingredients.iter().map(|(id, _)| *id).collect();
    ids.sort_unstable();
    ids.dedup();

    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    if found.len() != ids.len() {
        return Err(HtmlError::NotFound.new("Ingredient not found."));
    }

    for (ingredient_id, amount) in ingredients {
        sqlx::query(
            "
            INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
            VALUES ($1, $2, $3)
            ON CONFLICT (recipe_id, ingredient_id) DO UPDATE
            SET amount = recipe_ingredients.amount + EXCLUDED.amount;
        ",
        )
        .bind(recipe_id)
        .bind(ingredient_id)
        .bind(amount)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;
    }

    Ok(())
}

/// Replaces the recipe's tag set; every tag id must exist.
pub async fn set_recipe_tags(
    conn: &mut PgConnection,
    recipe_id: Id,
    tags: &[Id],
) -> Result<(), Error> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(tags)
        .fetch_all(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    if let Some(missing) = tags.iter().find(|tag| !found.iter().any(|(id,)| id == *tag)) {
        return Err(Error::field(
            "tags",
            &format!("Invalid pk \"{missing}\" - object does not exist."),
        ));
    }

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, UNNEST($2::INTEGER[])")
        .bind(recipe_id)
        .bind(tags)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}
