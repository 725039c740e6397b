use sqlx::{Pool, Postgres};

use super::get_recipe_short;
use crate::{
    authentication::permissions::ActionType,
    error::{Error, HtmlError, QueryError},
    schema::{Id, RecipeShort},
};

/// Per-user recipe collections backed by a `(user_id, recipe_id)` join table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeCollection {
    Favorites,
    ShoppingCart,
}

impl RecipeCollection {
    fn table(&self) -> &'static str {
        match self {
            RecipeCollection::Favorites => "favorites",
            RecipeCollection::ShoppingCart => "shopping_cart",
        }
    }

    pub fn action(&self) -> ActionType {
        match self {
            RecipeCollection::Favorites => ActionType::ManageOwnFavorites,
            RecipeCollection::ShoppingCart => ActionType::ManageOwnShoppingCart,
        }
    }

    pub fn already_present(&self) -> &'static str {
        match self {
            RecipeCollection::Favorites => "Recipe is already in favorites",
            RecipeCollection::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    pub fn not_present(&self) -> &'static str {
        match self {
            RecipeCollection::Favorites => "Cannot remove: recipe is not in favorites",
            RecipeCollection::ShoppingCart => "Cannot remove: recipe is not in the shopping cart",
        }
    }
}

/// Adds the recipe; a second add is rejected instead of ignored.
pub async fn add_to_collection(
    pool: &Pool<Postgres>,
    collection: RecipeCollection,
    user_id: Id,
    recipe_id: Id,
) -> Result<RecipeShort, Error> {
    let Some(recipe) = get_recipe_short(pool, recipe_id).await? else {
        return Err(HtmlError::NotFound.default());
    };

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        collection.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new(collection.already_present()));
    }

    Ok(recipe)
}

/// Removes the recipe; removing an absent entry is an error, not a no-op.
pub async fn remove_from_collection(
    pool: &Pool<Postgres>,
    collection: RecipeCollection,
    user_id: Id,
    recipe_id: Id,
) -> Result<(), Error> {
    if get_recipe_short(pool, recipe_id).await?.is_none() {
        return Err(HtmlError::NotFound.default());
    }

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        collection.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new(collection.not_present()));
    }

    Ok(())
}
