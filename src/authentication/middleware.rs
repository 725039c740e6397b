use std::convert::Infallible;

use warp::{reject::Rejection, Filter};

use super::jwt::{verify_jwt_session, SessionData};
use crate::{
    actions::is_token_revoked,
    context::Context,
    error::{Error, HtmlError},
};

pub fn with_context(ctx: Context) -> impl Filter<Extract = (Context,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// Extracts the token from `Authorization: Token <t>` (or `Bearer <t>`), falling back to the `session` cookie.
pub fn parse_authorization(header: &str) -> Option<String> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("token") && !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

fn with_token() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::cookie::optional::<String>("session"))
        .map(|header: Option<String>, cookie: Option<String>| {
            header
                .as_deref()
                .and_then(parse_authorization)
                .or(cookie)
        })
}

pub async fn authenticate(token: &str, ctx: &Context) -> Result<SessionData, Error> {
    let session = verify_jwt_session(token, &ctx.auth.secret)?;

    if is_token_revoked(&session.jti, &ctx.pool).await? {
        return Err(HtmlError::InvalidSession.new("Token has been revoked."));
    }

    Ok(session.into())
}

pub fn with_session(ctx: Context) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    with_token()
        .and(with_context(ctx))
        .and_then(|token: Option<String>, ctx: Context| async move {
            match token {
                Some(token) => authenticate(&token, &ctx).await.map_err(Rejection::from),
                None => Err(Rejection::from(HtmlError::Unauthorized.default())),
            }
        })
}

pub fn with_possible_session(
    ctx: Context,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    with_token()
        .and(with_context(ctx))
        .and_then(|token: Option<String>, ctx: Context| async move {
            let session = match token {
                Some(token) => match authenticate(&token, &ctx).await {
                    Ok(session) => Some(session),
                    Err(e) => {
                        log::debug!("Ignoring unusable token on public route: {e}");
                        None
                    }
                },
                None => None,
            };
            Ok::<_, Rejection>(session)
        })
}
