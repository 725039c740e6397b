use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reject::Rejection,
    reply::Response,
    Filter,
};

use super::{json_body, json_reply, no_content};
use crate::{
    actions::{create_tag, delete_tag, get_tag, list_tags, update_tag},
    context::Context,
    error::HtmlError,
    form::TagPayload,
    jwt::SessionData,
    middleware::{with_context, with_session},
    permissions::ActionType,
    schema::Id,
};

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let list = warp::path!("tags")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(list);

    let create = warp::path!("tags")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(json_body::<TagPayload>())
        .and(with_context(ctx.clone()))
        .and_then(create);

    let retrieve = warp::path!("tags" / Id)
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(retrieve);

    let update = warp::path!("tags" / Id)
        .and(warp::patch())
        .and(with_session(ctx.clone()))
        .and(json_body::<TagPayload>())
        .and(with_context(ctx.clone()))
        .and_then(update);

    let delete = warp::path!("tags" / Id)
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

async fn list(ctx: Context) -> Result<Response, Rejection> {
    let tags = list_tags(&ctx.pool).await?;
    Ok(json_reply(&tags, StatusCode::OK))
}

async fn retrieve(id: Id, ctx: Context) -> Result<Response, Rejection> {
    let tag = get_tag(&ctx.pool, id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(json_reply(&tag, StatusCode::OK))
}

async fn create(session: SessionData, payload: TagPayload, ctx: Context) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageTags)?;

    let tag = create_tag(&ctx.pool, payload.validate()?).await?;
    log::info!("{} created tag {}", session.username, tag.slug);
    Ok(json_reply(&tag, StatusCode::CREATED))
}

async fn update(
    id: Id,
    session: SessionData,
    payload: TagPayload,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageTags)?;

    let tag = update_tag(&ctx.pool, id, payload.validate()?).await?;
    Ok(json_reply(&tag, StatusCode::OK))
}

async fn delete(id: Id, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageTags)?;

    delete_tag(&ctx.pool, id).await?;
    log::info!("{} deleted tag {id}", session.username);
    Ok(no_content())
}
