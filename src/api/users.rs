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
        fetch_subscriptions, fetch_users, get_profile, register_user, set_password, subscribe,
        unsubscribe,
    },
    context::Context,
    error::{Error, HtmlError},
    form::{Form, RegisterPayload, SetPasswordPayload},
    jwt::SessionData,
    middleware::{with_context, with_session},
    pagination::Pagination,
    permissions::ActionType,
    schema::Id,
};

pub fn routes(ctx: Context) -> BoxedFilter<(Response,)> {
    let list = warp::path!("users")
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_form())
        .and(with_context(ctx.clone()))
        .and_then(list_users);

    let register = warp::path!("users")
        .and(warp::post())
        .and(json_body::<RegisterPayload>())
        .and(with_context(ctx.clone()))
        .and_then(register);

    let me = warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(me);

    let change_password = warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(json_body::<SetPasswordPayload>())
        .and(with_context(ctx.clone()))
        .and_then(change_password);

    let subscriptions = warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_form())
        .and(with_context(ctx.clone()))
        .and_then(list_subscriptions);

    let follow = warp::path!("users" / Id / "subscribe")
        .and(warp::post())
        .and(with_session(ctx.clone()))
        .and(with_form())
        .and(with_context(ctx.clone()))
        .and_then(follow);

    let unfollow = warp::path!("users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx.clone()))
        .and_then(unfollow);

    let retrieve = warp::path!("users" / Id)
        .and(warp::get())
        .and(with_session(ctx.clone()))
        .and(with_context(ctx))
        .and_then(retrieve);

    list.or(register)
        .unify()
        .or(me)
        .unify()
        .or(change_password)
        .unify()
        .or(subscriptions)
        .unify()
        .or(follow)
        .unify()
        .or(unfollow)
        .unify()
        .or(retrieve)
        .unify()
        .boxed()
}

/// `recipes_limit` caps the recipes embedded per author; negative values are refused.
fn recipes_limit(form: &Form) -> Result<Option<i64>, Error> {
    match form.get_number::<i64>("recipes_limit")? {
        Some(limit) if limit < 0 => Err(Error::field(
            "recipes_limit",
            "Ensure this value is greater than or equal to 0.",
        )),
        limit => Ok(limit),
    }
}

async fn list_users(session: SessionData, form: Form, ctx: Context) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ViewUsers)?;
    let pagination = Pagination::from_form(&form)?;

    let page = fetch_users(&ctx.pool, Some(session.user_id), pagination).await?;
    Ok(json_reply(&page, StatusCode::OK))
}

async fn register(payload: RegisterPayload, ctx: Context) -> Result<Response, Rejection> {
    let user = payload.validate()?;
    let profile = register_user(&ctx.pool, user).await?;

    Ok(json_reply(&profile, StatusCode::CREATED))
}

async fn me(session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    let profile = get_profile(&ctx.pool, session.user_id, Some(session.user_id))
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(json_reply(&profile, StatusCode::OK))
}

async fn retrieve(id: Id, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ViewUsers)?;

    let profile = get_profile(&ctx.pool, id, Some(session.user_id))
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(json_reply(&profile, StatusCode::OK))
}

async fn change_password(
    session: SessionData,
    payload: SetPasswordPayload,
    ctx: Context,
) -> Result<Response, Rejection> {
    let (current, new) = payload.validate()?;
    set_password(&ctx.pool, session.user_id, &current, &new).await?;

    log::info!("User {} changed their password", session.user_id);
    Ok(no_content())
}

async fn list_subscriptions(
    session: SessionData,
    form: Form,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    let pagination = Pagination::from_form(&form)?;
    let limit = recipes_limit(&form)?;

    let page = fetch_subscriptions(&ctx.pool, session.user_id, pagination, limit).await?;
    Ok(json_reply(&page, StatusCode::OK))
}

async fn follow(
    author_id: Id,
    session: SessionData,
    form: Form,
    ctx: Context,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    let limit = recipes_limit(&form)?;

    let subscription = subscribe(&ctx.pool, session.user_id, author_id, limit).await?;
    Ok(json_reply(&subscription, StatusCode::CREATED))
}

async fn unfollow(author_id: Id, session: SessionData, ctx: Context) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    unsubscribe(&ctx.pool, session.user_id, author_id).await?;
    Ok(no_content())
}
