use warp::{
    filters::BoxedFilter,
    http::{header, StatusCode},
    reject::Rejection,
    reply::{self, Reply, Response},
    Filter,
};

use super::{json_body, json_reply, no_content, with_form};
use crate::{
    actions::{
        add_to_collection, create_recipe, delete_recipe, fetch_recipes, fetch_shopping_list,
        get_recipe_detail, get_recipe_mut, remove_from_collection, update_recipe,
        RecipeCollection, RecipeFilter,
    },
    constants::SHOPPING_LIST_FILENAME,
    context::Context,
    error::HtmlError,
    export::render_shopping_list,
    form::{Form, RecipePayload},
    jwt::SessionData,
    middleware::{with_context, with_possible_session, with_session},
    pagination::Pagination,
    permissions::ActionType,
    schema::Id,
};

fn with_collection(
    collection: RecipeCollection,
) -> impl Filter<Extract = (RecipeCollection,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || collection)
}

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let list = warp::path!("recipes")
        .and(warp::get())
        .and(with_possible_session(ctx.clone()))
        .and(with_form())
        .and(with_context(ctx.clone()))
        .and_then(list);

    let create = warp::path!("recipes")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(json_body::<RecipePayload>())
        .and(with_context(ctx.clone()))
        .and_then(create);

    let download = warp::path!("recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(download_shopping_cart);

    let retrieve = warp::path!("recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(retrieve);

    let update = warp::path!("recipes" / Id)
        .and(warp::patch())
        .and(with_session(ctx.clone()))
        .and(json_body::<RecipePayload>())
        .and(with_context(ctx.clone()))
        .and_then(update);

    let delete = warp::path!("recipes" / Id)
        .and(warp::delete())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(delete);

    let favorite = warp::path!("recipes" / Id / "favorite")
        .and(with_collection(RecipeCollection::Favorites));
    let cart = warp::path!("recipes" / Id / "shopping_cart")
        .and(with_collection(RecipeCollection::ShoppingCart));
    let collection = favorite.or(cart).unify();

    let add = collection
        .clone()
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(add_to);

    let remove = collection
        .and(warp::delete())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx))
        .and_then(remove_from);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(retrieve)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(add)
        .unify()
        .or(remove)
        .unify()
        .boxed()
}

async fn list(
    session: Option<SessionData>,
    form: Form,
    ctx: Context,
) -> Result<Response, Rejection> {
    let pagination = Pagination::from_form(&form)?;
    let mut filter = RecipeFilter::from_form(&form)?;
    let viewer = session.as_ref().map(|session| session.user_id);

    if viewer.is_none() {
        filter.is_favorited = false;
        filter.is_in_shopping_cart = false;
    }

    let page = fetch_recipes(&ctx.pool, &filter, viewer, pagination).await?;
    Ok(json_reply(&page, StatusCode::OK))
}

async fn retrieve(id: Id, session: Option<SessionData>, ctx: Context) -> Result<Response, Rejection> {
    let viewer = session.map(|session| session.user_id);

    let recipe = get_recipe_detail(&ctx.pool, id, viewer)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(json_reply(&recipe, StatusCode::OK))
}

async fn create(
    session: SessionData,
    payload: RecipePayload,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;
    let recipe = payload.validate_create()?;

    let id = create_recipe(&ctx.pool, session.user_id, recipe).await?;
    let detail = get_recipe_detail(&ctx.pool, id, Some(session.user_id))
        .await?
        .ok_or_else(|| HtmlError::InternalServerError.default())?;

    Ok(json_reply(&detail, StatusCode::CREATED))
}

async fn update(
    id: Id,
    session: SessionData,
    payload: RecipePayload,
    ctx: Context,
) -> Result<Response, Rejection> {
    let recipe = get_recipe_mut(&ctx.pool, id, &session).await?;
    let changes = payload.validate_update()?;

    update_recipe(&ctx.pool, &recipe, changes).await?;
    let detail = get_recipe_detail(&ctx.pool, id, Some(session.user_id))
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(json_reply(&detail, StatusCode::OK))
}

async fn delete(id: Id, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    let recipe = get_recipe_mut(&ctx.pool, id, &session).await?;

    delete_recipe(&ctx.pool, recipe.id).await?;
    log::info!("{} deleted recipe {}", session.username, recipe.id);
    Ok(no_content())
}

async fn add_to(
    id: Id,
    collection: RecipeCollection,
    session: SessionData,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(collection.action())?;

    let recipe = add_to_collection(&ctx.pool, collection, session.user_id, id).await?;
    Ok(json_reply(&recipe, StatusCode::CREATED))
}

async fn remove_from(
    id: Id,
    collection: RecipeCollection,
    session: SessionData,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(collection.action())?;

    remove_from_collection(&ctx.pool, collection, session.user_id, id).await?;
    Ok(no_content())
}

async fn download_shopping_cart(session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnShoppingCart)?;

    let items = fetch_shopping_list(&ctx.pool, session.user_id).await?;
    Ok(attachment(render_shopping_list(&session.username, &items)))
}

fn attachment(body: String) -> Response {
    let disposition = format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\"");

    let reply = reply::with_header(body, header::CONTENT_TYPE, "text/plain; charset=utf-8");
    reply::with_header(reply, header::CONTENT_DISPOSITION, disposition).into_response()
}
