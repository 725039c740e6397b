use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::{generate_jwt_session, SessionData},
    },
    context::Context,
    error::{Error, FieldErrors, HtmlError, QueryError},
    form::NewUser,
    pagination::{PageContext, Pagination},
    schema::{Id, User, UserProfile},
};

const PROFILE_COLUMNS: &str = "
    u.email, u.id, u.username, u.first_name, u.last_name,
    EXISTS (SELECT 1 FROM follows f WHERE f.user_id = $1 AND f.author_id = u.id) AS is_subscribed
";

pub async fn get_user_by_email(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Profile of `user_id` with `is_subscribed` resolved for `viewer`.
pub async fn get_profile(
    pool: &Pool<Postgres>,
    user_id: Id,
    viewer: Option<Id>,
) -> Result<Option<UserProfile>, Error> {
    let row: Option<UserProfile> =
        sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = $2"))
            .bind(viewer)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn list_profiles(
    pool: &Pool<Postgres>,
    ids: &[Id],
    viewer: Option<Id>,
) -> Result<Vec<UserProfile>, Error> {
    let rows: Vec<UserProfile> =
        sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = ANY($2)"))
            .bind(viewer)
            .bind(ids)
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn fetch_users(
    pool: &Pool<Postgres>,
    viewer: Option<Id>,
    pagination: Pagination,
) -> Result<PageContext<UserProfile>, Error> {
    let rows: Vec<UserProfile> = sqlx::query_as(&format!(
        "SELECT {PROFILE_COLUMNS}, COUNT(*) OVER() AS count FROM users u WHERE u.is_active ORDER BY u.id LIMIT $2 OFFSET $3"
    ))
    .bind(viewer)
    .bind(pagination.limit)
    .bind(pagination.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok(PageContext::from_rows(rows, total_count, pagination))
}

/// Creates a user; the password is hashed before it is stored.
pub async fn register_user(pool: &Pool<Postgres>, user: NewUser) -> Result<UserProfile, Error> {
    let taken: (bool, bool) = sqlx::query_as(
        "
        SELECT
            EXISTS (SELECT 1 FROM users WHERE LOWER(email) = LOWER($1)),
            EXISTS (SELECT 1 FROM users WHERE username = $2)
    ",
    )
    .bind(&user.email)
    .bind(&user.username)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    let mut errors = FieldErrors::default();
    if taken.0 {
        errors.add("email", "A user with that email already exists.");
    }
    if taken.1 {
        errors.add("username", "A user with that username already exists.");
    }
    errors.into_result()?;

    let password = hash_password(&user.password)?;

    let id: Option<(Id,)> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING id;
    ",
    )
    .bind(&user.email)
    .bind(&user.username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(password)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    let Some((id,)) = id else {
        return Err(HtmlError::InvalidRequest.new("User with these credentials already exists"));
    };
    log::info!("Registered user {} ({id})", user.username);

    Ok(UserProfile {
        email: user.email,
        id,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        is_subscribed: false,
        count: 0,
    })
}

pub async fn login_user(ctx: &Context, email: &str, password: &str) -> Result<String, Error> {
    let Some(user) = get_user_by_email(&ctx.pool, email).await? else {
        return Err(HtmlError::InvalidRequest.new("Unable to log in with provided credentials."));
    };

    if !verify_password(password, &user.password) {
        return Err(HtmlError::InvalidRequest.new("Unable to log in with provided credentials."));
    }
    if !user.is_active {
        return Err(HtmlError::InvalidRequest.new("User account is disabled."));
    }

    generate_jwt_session(&user, &ctx.auth.secret, ctx.auth.token_lifetime)
}

/// Revokes the token backing `session`; it is rejected from now until it expires.
pub async fn logout_user(pool: &Pool<Postgres>, session: &SessionData) -> Result<(), Error> {
    sqlx::query(
        "INSERT INTO revoked_tokens (token_id, user_id, expires_at) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
    )
    .bind(&session.token_id)
    .bind(session.user_id)
    .bind(session.expires_at)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < EXTRACT(EPOCH FROM NOW())::BIGINT")
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

pub async fn is_token_revoked(token_id: &str, pool: &Pool<Postgres>) -> Result<bool, Error> {
    let row: (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE token_id = $1)")
            .bind(token_id)
            .fetch_one(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row.0)
}

pub async fn set_password(
    pool: &Pool<Postgres>,
    user_id: Id,
    current_password: &str,
    new_password: &str,
) -> Result<(), Error> {
    let Some(user) = get_user_by_id(pool, user_id).await? else {
        return Err(HtmlError::NotFound.default());
    };

    if !verify_password(current_password, &user.password) {
        return Err(Error::field("current_password", "Invalid password."));
    }

    let password = hash_password(new_password)?;
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}
