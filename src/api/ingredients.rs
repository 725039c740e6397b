use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reject::Rejection,
    reply::Response,
    Filter,
};

use super::{json_body, json_reply, no_content, with_form};
use crate::{
    actions::{
        create_ingredient, delete_ingredient, get_ingredient, list_ingredients, update_ingredient,
    },
    context::Context,
    error::HtmlError,
    form::{Form, IngredientPayload},
    jwt::SessionData,
    middleware::{with_context, with_session},
    permissions::ActionType,
    schema::Id,
};

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let list = warp::path!("ingredients")
        .and(warp::get())
        .and(with_form())
        .and(with_context(ctx.clone()))
        .and_then(list);

    let create = warp::path!("ingredients")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(json_body::<IngredientPayload>())
        .and(with_context(ctx.clone()))
        .and_then(create);

    let retrieve = warp::path!("ingredients" / Id)
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(retrieve);

    let update = warp::path!("ingredients" / Id)
        .and(warp::patch())
        .and(with_session(ctx.clone()))
        .and(json_body::<IngredientPayload>())
        .and(with_context(ctx.clone()))
        .and_then(update);

    let delete = warp::path!("ingredients" / Id)
        .and(warp::delete())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx))
        .and_then(delete);

    list.or(create)
        .unify()
        .or(retrieve)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

/// `?name=` narrows the list to names starting with the given text.
async fn list(form: Form, ctx: Context) -> Result<Response, Rejection> {
    let ingredients = list_ingredients(&ctx.pool, form.get_str("name")).await?;
    Ok(json_reply(&ingredients, StatusCode::OK))
}

async fn retrieve(id: Id, ctx: Context) -> Result<Response, Rejection> {
    let ingredient = get_ingredient(&ctx.pool, id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(json_reply(&ingredient, StatusCode::OK))
}

async fn create(
    session: SessionData,
    payload: IngredientPayload,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageIngredients)?;
    let (name, unit) = payload.validate()?;

    let ingredient = create_ingredient(&ctx.pool, &name, &unit).await?;
    Ok(json_reply(&ingredient, StatusCode::CREATED))
}

async fn update(
    id: Id,
    session: SessionData,
    payload: IngredientPayload,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageIngredients)?;
    let (name, unit) = payload.validate()?;

    let ingredient = update_ingredient(&ctx.pool, id, &name, &unit).await?;
    Ok(json_reply(&ingredient, StatusCode::OK))
}

async fn delete(id: Id, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageIngredients)?;

    delete_ingredient(&ctx.pool, id).await?;
    log::info!("{} deleted ingredient {id}", session.username);
    Ok(no_content())
}
