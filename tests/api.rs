//! End-to-end tests against a real Postgres database.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.

use chrono::Duration;
use serde_json::{json, Value};
use sqlx::PgPool;
use warp::http::StatusCode;

use recipe_share::{
    actions::{create_ingredient, create_tag, login_user, register_user, seed_default_tags},
    api,
    context::Context,
    form::{NewTag, NewUser},
    schema::Id,
};

const PASSWORD: &str = "correct-horse";

fn context(pool: &PgPool) -> Context {
    Context::with_secret(pool.clone(), b"integration-secret", Duration::hours(1))
}

async fn user(ctx: &Context, username: &str, admin: bool) -> (Id, String) {
    let email = format!("{username}@example.com");
    let profile = register_user(
        &ctx.pool,
        NewUser {
            email: email.clone(),
            username: username.to_string(),
            first_name: String::from("Test"),
            last_name: String::from("Cook"),
            password: PASSWORD.to_string(),
        },
    )
    .await
    .unwrap();

    if admin {
        sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
            .bind(profile.id)
            .execute(&ctx.pool)
            .await
            .unwrap();
    }

    let token = login_user(ctx, &email, PASSWORD).await.unwrap();
    (profile.id, token)
}

async fn catalog(ctx: &Context) -> (Id, Id, Id) {
    let flour = create_ingredient(&ctx.pool, "flour", "g").await.unwrap();
    let milk = create_ingredient(&ctx.pool, "milk", "ml").await.unwrap();
    let tag = create_tag(
        &ctx.pool,
        NewTag {
            name: String::from("Breakfast"),
            color: String::from("#E26C2D"),
            slug: String::from("breakfast"),
        },
    )
    .await
    .unwrap();

    (flour.id, milk.id, tag.id)
}

async fn send(
    ctx: &Context,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> warp::http::Response<warp::hyper::body::Bytes> {
    let mut request = warp::test::request().method(method).path(path);
    if let Some(token) = token {
        request = request.header("authorization", format!("Token {token}"));
    }
    if let Some(body) = body {
        request = request.json(&body);
    }

    request.reply(&api::routes(ctx.clone())).await
}

fn json_body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

fn pancakes(tag: Id, ingredients: Value) -> Value {
    json!({
        "name": "Pancakes",
        "text": "Mix and fry.",
        "cooking_time": 20,
        "tags": [tag],
        "ingredients": ingredients,
    })
}

async fn create_recipe(ctx: &Context, token: &str, body: Value) -> Id {
    let response = send(ctx, "POST", "/api/recipes", Some(token), Some(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    json_body(&response)["id"].as_i64().unwrap() as Id
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_ingredient_lines_are_summed(pool: PgPool) {
    let ctx = context(&pool);
    let (_, token) = user(&ctx, "cook", false).await;
    let (flour, milk, tag) = catalog(&ctx).await;

    let body = pancakes(
        tag,
        json!([
            { "id": flour, "amount": 100 },
            { "id": milk, "amount": 200 },
            { "id": flour, "amount": 50 },
        ]),
    );
    let response = send(&ctx, "POST", "/api/recipes", Some(&token), Some(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let recipe = json_body(&response);
    let ingredients = recipe["ingredients"].as_array().unwrap();
    assert_eq!(ingredients.len(), 2);

    let flour_line = ingredients
        .iter()
        .find(|line| line["id"] == json!(flour))
        .unwrap();
    assert_eq!(flour_line["amount"], json!(150));
    assert_eq!(recipe["author"]["username"], json!("cook"));
    assert_eq!(recipe["is_favorited"], json!(false));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn unknown_ingredient_rolls_back_the_recipe(pool: PgPool) {
    let ctx = context(&pool);
    let (_, token) = user(&ctx, "cook", false).await;
    let (flour, _, tag) = catalog(&ctx).await;

    let body = pancakes(
        tag,
        json!([{ "id": flour, "amount": 100 }, { "id": 9999, "amount": 1 }]),
    );
    let response = send(&ctx, "POST", "/api/recipes", Some(&token), Some(body)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn favorites_reject_repeated_changes(pool: PgPool) {
    let ctx = context(&pool);
    let (_, token) = user(&ctx, "cook", false).await;
    let (flour, _, tag) = catalog(&ctx).await;
    let id = create_recipe(&ctx, &token, pancakes(tag, json!([{ "id": flour, "amount": 1 }]))).await;
    let path = format!("/api/recipes/{id}/favorite");

    let response = send(&ctx, "POST", &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json_body(&response)["name"], json!("Pancakes"));

    let response = send(&ctx, "POST", &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(&response)["errors"].is_string());

    let response = send(&ctx, "DELETE", &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&ctx, "DELETE", &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&ctx, "POST", "/api/recipes/9999/favorite", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn removing_a_recipe_missing_from_the_cart_fails(pool: PgPool) {
    let ctx = context(&pool);
    let (_, token) = user(&ctx, "cook", false).await;
    let (flour, _, tag) = catalog(&ctx).await;
    let id = create_recipe(&ctx, &token, pancakes(tag, json!([{ "id": flour, "amount": 1 }]))).await;

    let path = format!("/api/recipes/{id}/shopping_cart");
    let response = send(&ctx, "DELETE", &path, Some(&token), None).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn shopping_list_sums_across_recipes(pool: PgPool) {
    let ctx = context(&pool);
    let (_, token) = user(&ctx, "cook", false).await;
    let (flour, milk, tag) = catalog(&ctx).await;

    let first = create_recipe(
        &ctx,
        &token,
        pancakes(tag, json!([{ "id": flour, "amount": 100 }, { "id": milk, "amount": 250 }])),
    )
    .await;
    let mut waffles = pancakes(tag, json!([{ "id": flour, "amount": 200 }]));
    waffles["name"] = json!("Waffles");
    let second = create_recipe(&ctx, &token, waffles).await;

    for id in [first, second] {
        let path = format!("/api/recipes/{id}/shopping_cart");
        let response = send(&ctx, "POST", &path, Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = send(&ctx, "GET", "/api/recipes/download_shopping_cart", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"shopping_list.txt\""
    );

    let text = String::from_utf8(response.body().to_vec()).unwrap();
    assert!(text.contains("flour (g): 300"), "{text}");
    assert!(text.contains("milk (ml): 250"), "{text}");

    let response = send(
        &ctx,
        "GET",
        "/api/recipes?is_in_shopping_cart=1",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(json_body(&response)["count"], json!(2));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn subscriptions_follow_other_authors_only(pool: PgPool) {
    let ctx = context(&pool);
    let (reader, token) = user(&ctx, "reader", false).await;
    let (author, author_token) = user(&ctx, "author", false).await;
    let (flour, _, tag) = catalog(&ctx).await;
    create_recipe(&ctx, &author_token, pancakes(tag, json!([{ "id": flour, "amount": 1 }]))).await;

    let path = format!("/api/users/{reader}/subscribe");
    let response = send(&ctx, "POST", &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let path = format!("/api/users/{author}/subscribe");
    let response = send(&ctx, "POST", &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(&response);
    assert_eq!(body["is_subscribed"], json!(true));
    assert_eq!(body["recipes_count"], json!(1));

    let response = send(&ctx, "POST", &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&ctx, "GET", "/api/users/subscriptions", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(&response)["count"], json!(1));

    let response = send(&ctx, "DELETE", &path, Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn only_author_or_admin_may_edit(pool: PgPool) {
    let ctx = context(&pool);
    let (_, author) = user(&ctx, "author", false).await;
    let (_, stranger) = user(&ctx, "stranger", false).await;
    let (_, admin) = user(&ctx, "admin", true).await;
    let (flour, _, tag) = catalog(&ctx).await;

    let response = send(
        &ctx,
        "POST",
        "/api/recipes",
        None,
        Some(pancakes(tag, json!([{ "id": flour, "amount": 1 }]))),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let id = create_recipe(&ctx, &author, pancakes(tag, json!([{ "id": flour, "amount": 1 }]))).await;
    let path = format!("/api/recipes/{id}");
    let change = json!({ "name": "Crepes" });

    let response = send(&ctx, "PATCH", &path, Some(&stranger), Some(change.clone())).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&ctx, "DELETE", &path, Some(&stranger), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&ctx, "PATCH", &path, Some(&admin), Some(change)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(&response)["name"], json!("Crepes"));

    let response = send(&ctx, "DELETE", &path, Some(&author), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&ctx, "GET", &path, None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn catalog_writes_need_an_admin(pool: PgPool) {
    let ctx = context(&pool);
    let (_, cook) = user(&ctx, "cook", false).await;
    let (_, admin) = user(&ctx, "admin", true).await;
    let body = json!({ "name": "sugar", "measurement_unit": "g" });

    let response = send(&ctx, "POST", "/api/ingredients", Some(&cook), Some(body.clone())).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&ctx, "POST", "/api/ingredients", Some(&admin), Some(body.clone())).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&ctx, "POST", "/api/ingredients", Some(&admin), Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&ctx, "GET", "/api/ingredients?name=SU", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(&response).as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn logout_revokes_the_token(pool: PgPool) {
    let ctx = context(&pool);
    let (_, _) = user(&ctx, "cook", false).await;

    let response = send(
        &ctx,
        "POST",
        "/api/auth/token/login",
        None,
        Some(json!({ "email": "cook@example.com", "password": PASSWORD })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let token = json_body(&response)["auth_token"].as_str().unwrap().to_string();

    let response = send(&ctx, "GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(&response)["username"], json!("cook"));

    let response = send(&ctx, "POST", "/api/auth/token/logout", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&ctx, "GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn recipe_list_filters_and_paginates(pool: PgPool) {
    let ctx = context(&pool);
    let (author, token) = user(&ctx, "cook", false).await;
    let (flour, _, tag) = catalog(&ctx).await;

    for n in 0..8 {
        let mut body = pancakes(tag, json!([{ "id": flour, "amount": 1 }]));
        body["name"] = json!(format!("Pancakes #{n}"));
        create_recipe(&ctx, &token, body).await;
    }

    let response = send(&ctx, "GET", "/api/recipes", None, None).await;
    let page = json_body(&response);
    assert_eq!(page["count"], json!(8));
    assert_eq!(page["results"].as_array().unwrap().len(), 6);
    assert_eq!(page["next"], json!(2));
    assert_eq!(page["results"][0]["name"], json!("Pancakes #7"));

    let path = format!("/api/recipes?author={author}&tags=breakfast&page=2&limit=6");
    let response = send(&ctx, "GET", &path, None, None).await;
    let page = json_body(&response);
    assert_eq!(page["results"].as_array().unwrap().len(), 2);
    assert_eq!(page["previous"], json!(1));

    let response = send(&ctx, "GET", "/api/recipes?tags=dinner", None, None).await;
    assert_eq!(json_body(&response)["count"], json!(0));

    let response = send(&ctx, "GET", "/api/recipes?is_favorited=1", None, None).await;
    assert_eq!(json_body(&response)["count"], json!(8));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn update_replaces_ingredients_and_tags(pool: PgPool) {
    let ctx = context(&pool);
    let (_, token) = user(&ctx, "cook", false).await;
    let (flour, milk, breakfast) = catalog(&ctx).await;
    let lunch = create_tag(
        &pool,
        NewTag {
            name: String::from("Lunch"),
            color: String::from("#00FF00"),
            slug: String::from("lunch"),
        },
    )
    .await
    .unwrap();

    let id = create_recipe(
        &ctx,
        &token,
        pancakes(breakfast, json!([{ "id": flour, "amount": 100 }, { "id": milk, "amount": 200 }])),
    )
    .await;

    let change = json!({
        "tags": [lunch.id],
        "ingredients": [{ "id": flour, "amount": 10 }, { "id": flour, "amount": 5 }],
    });
    let path = format!("/api/recipes/{id}");
    let response = send(&ctx, "PATCH", &path, Some(&token), Some(change)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let recipe = json_body(&response);
    assert_eq!(
        recipe["ingredients"],
        json!([{ "id": flour, "name": "flour", "measurement_unit": "g", "amount": 15 }])
    );
    assert_eq!(
        recipe["tags"],
        json!([{ "id": lunch.id, "name": "Lunch", "color": "#00FF00", "slug": "lunch" }])
    );
    assert_eq!(recipe["name"], json!("Pancakes"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn same_recipe_cannot_be_created_twice(pool: PgPool) {
    let ctx = context(&pool);
    let (_, token) = user(&ctx, "cook", false).await;
    let (flour, _, tag) = catalog(&ctx).await;
    let body = pancakes(tag, json!([{ "id": flour, "amount": 1 }]));

    create_recipe(&ctx, &token, body.clone()).await;
    let response = send(&ctx, "POST", "/api/recipes", Some(&token), Some(body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(&response)["Pancakes"].is_array());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn out_of_range_numbers_are_client_errors(pool: PgPool) {
    let ctx = context(&pool);
    let (_, token) = user(&ctx, "cook", false).await;
    let (flour, _, tag) = catalog(&ctx).await;

    let body = pancakes(
        tag,
        json!([{ "id": flour, "amount": 2000000000 }, { "id": flour, "amount": 2000000000 }]),
    );
    let response = send(&ctx, "POST", "/api/recipes", Some(&token), Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(&response)["amount"].is_array());

    for path in [
        "/api/recipes?page=9223372036854775807&limit=100",
        "/api/users?page=9223372036854775807",
        "/api/users/subscriptions?page=9223372036854775807",
    ] {
        let response = send(&ctx, "GET", path, Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
        assert!(json_body(&response)["page"].is_array(), "{path}");
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn default_tags_are_seeded_once(pool: PgPool) {
    let ctx = context(&pool);

    assert_eq!(seed_default_tags(&pool).await.unwrap(), 4);
    assert_eq!(seed_default_tags(&pool).await.unwrap(), 0);

    let response = send(&ctx, "GET", "/api/tags", None, None).await;
    let slugs: Vec<Value> = json_body(&response)
        .as_array()
        .unwrap()
        .iter()
        .map(|tag| tag["slug"].clone())
        .collect();
    assert_eq!(
        slugs,
        vec![json!("breakfast"), json!("lunch"), json!("dinner"), json!("supper")]
    );
}
