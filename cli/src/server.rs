use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use crate::auth;
use foodgram_core::models::{
    Ingredient, NewRecipe, NewRecipeIngredient, RecipeDetail, RecipeFilter, RecipeSummary, Tag,
    User, validate_new_recipe,
};
use foodgram_core::service::FoodgramService;
use foodgram_core::shopping_list::{CONTENT_TYPE, FILE_NAME, ShoppingList};

const BODY_LIMIT: usize = 10 * 1024 * 1024; // 10 MB

const NOT_AUTHENTICATED: &str = "Авторизируйтесь, пожалуйста!";
const EMPTY_CART: &str = "Список покупок пуст!";
const CREDENTIALS_REQUIRED: &str = "Authentication credentials were not provided";

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<FoodgramService>>,
}

impl AppState {
    fn svc(&self) -> MutexGuard<'_, FoodgramService> {
        self.svc
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// The user resolved from the request's API token, set by `resolve_user`.
#[derive(Clone)]
struct CurrentUser(User);

/// Optional caller: `None` for anonymous requests.
struct Viewer(Option<User>);

/// Required caller: rejects anonymous requests with 401.
struct AuthUser(User);

impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(
            parts.extensions.get::<CurrentUser>().map(|u| u.0.clone()),
        ))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .map(|u| AuthUser(u.0.clone()))
            .ok_or_else(|| ApiError::Unauthorized(CREDENTIALS_REQUIRED.to_string()))
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct IngredientAmount {
    id: i64,
    amount: i64,
}

#[derive(Deserialize)]
struct RecipeRequest {
    name: String,
    text: String,
    cooking_time: i64,
    image: Option<String>,
    #[serde(default)]
    tags: Vec<i64>,
    ingredients: Vec<IngredientAmount>,
}

impl RecipeRequest {
    fn into_new_recipe(self) -> NewRecipe {
        NewRecipe {
            name: self.name,
            text: self.text,
            cooking_time: self.cooking_time,
            image: self.image,
            tag_ids: self.tags,
            ingredients: self
                .ingredients
                .into_iter()
                .map(|i| NewRecipeIngredient {
                    ingredient_id: i.id,
                    amount: i.amount,
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct IngredientQuery {
    name: Option<String>,
}

#[derive(Deserialize, Default)]
struct RecipeQuery {
    author: Option<i64>,
    tags: Option<String>,
    is_favorited: Option<String>,
    is_in_shopping_cart: Option<String>,
    limit: Option<i64>,
    page: Option<i64>,
}

fn query_flag(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true"))
}

impl RecipeQuery {
    fn into_filter(self) -> RecipeFilter {
        RecipeFilter {
            author_id: self.author,
            tag_slug: self.tags.filter(|t| !t.is_empty()),
            is_favorited: query_flag(self.is_favorited.as_deref()),
            is_in_shopping_cart: query_flag(self.is_in_shopping_cart.as_deref()),
            limit: self.limit,
            page: self.page,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

// --- Middleware ---

/// Attach `CurrentUser` when the request carries a known API token. Unknown or
/// malformed tokens leave the request anonymous.
async fn resolve_user(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let token_hash = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(auth::token_from_header)
        .map(auth::hash_token);

    if let Some(hash) = token_hash {
        let lookup = state.svc().user_by_token_hash(&hash);
        match lookup {
            Ok(Some(user)) => {
                request.extensions_mut().insert(CurrentUser(user));
            }
            Ok(None) => warn!("request with unknown API token"),
            Err(err) => error!("token lookup failed: {err:#}"),
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Ingredient / Tag handlers ---

async fn list_ingredients(
    State(state): State<AppState>,
    Query(q): Query<IngredientQuery>,
) -> Result<Json<Vec<Ingredient>>, ApiError> {
    let svc = state.svc();
    let ingredients = match q.name.as_deref() {
        Some(name) => svc.search_ingredients(name),
        None => svc.list_ingredients(),
    }
    .context("database error")?;
    Ok(Json(ingredients))
}

async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Ingredient>, ApiError> {
    let ingredient = state
        .svc()
        .get_ingredient(id)
        .map_err(|_| ApiError::NotFound(format!("Ingredient {id} not found")))?;
    Ok(Json(ingredient))
}

async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, ApiError> {
    let tags = state.svc().list_tags().context("database error")?;
    Ok(Json(tags))
}

async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Tag>, ApiError> {
    let tag = state
        .svc()
        .get_tag(id)
        .map_err(|_| ApiError::NotFound(format!("Tag {id} not found")))?;
    Ok(Json(tag))
}

// --- Recipe handlers ---

/// Validate a recipe body and check that every referenced ingredient and tag exists.
fn check_recipe(svc: &FoodgramService, recipe: &NewRecipe) -> Result<(), ApiError> {
    validate_new_recipe(recipe).map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    for ing in &recipe.ingredients {
        svc.get_ingredient(ing.ingredient_id).map_err(|_| {
            ApiError::BadRequest(format!("Ingredient with id {} not found", ing.ingredient_id))
        })?;
    }
    for tag_id in &recipe.tag_ids {
        svc.get_tag(*tag_id)
            .map_err(|_| ApiError::BadRequest(format!("Tag with id {tag_id} not found")))?;
    }
    Ok(())
}

/// Look up a recipe's author, answering 404 for unknown ids and 403 when the
/// caller is not the author.
fn require_author(svc: &FoodgramService, recipe_id: i64, user: &User) -> Result<(), ApiError> {
    let author_id = svc
        .recipe_author_id(recipe_id)
        .map_err(|_| ApiError::NotFound(format!("Recipe {recipe_id} not found")))?;
    if author_id != Some(user.id) {
        return Err(ApiError::Forbidden(
            "Only the author can change this recipe".to_string(),
        ));
    }
    Ok(())
}

async fn list_recipes(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Query(q): Query<RecipeQuery>,
) -> Result<Json<Vec<RecipeDetail>>, ApiError> {
    let filter = q.into_filter();
    let recipes = state
        .svc()
        .list_recipes(&filter, viewer.map(|u| u.id))
        .context("database error")?;
    Ok(Json(recipes))
}

async fn get_recipe(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(id): Path<i64>,
) -> Result<Json<RecipeDetail>, ApiError> {
    let detail = state
        .svc()
        .get_recipe(id, viewer.map(|u| u.id))
        .map_err(|_| ApiError::NotFound(format!("Recipe {id} not found")))?;
    Ok(Json(detail))
}

async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(req): Json<RecipeRequest>,
) -> Result<(StatusCode, Json<RecipeDetail>), ApiError> {
    let recipe = req.into_new_recipe();
    let svc = state.svc();
    check_recipe(&svc, &recipe)?;
    let detail = svc
        .create_recipe(user.id, &recipe)
        .context("failed to create recipe")?;
    Ok((StatusCode::CREATED, Json(detail)))
}

async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<RecipeRequest>,
) -> Result<Json<RecipeDetail>, ApiError> {
    let recipe = req.into_new_recipe();
    let svc = state.svc();
    require_author(&svc, id, &user)?;
    check_recipe(&svc, &recipe)?;
    let detail = svc
        .replace_recipe(id, &recipe, Some(user.id))
        .context("failed to update recipe")?;
    Ok(Json(detail))
}

async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let svc = state.svc();
    require_author(&svc, id, &user)?;
    svc.delete_recipe(id).context("failed to delete recipe")?;
    info!(recipe_id = id, user_id = user.id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- Favorites / Shopping cart ---

#[derive(Clone, Copy)]
enum Collection {
    Favorites,
    Cart,
}

impl Collection {
    fn label(self) -> &'static str {
        match self {
            Self::Favorites => "favorites",
            Self::Cart => "the shopping cart",
        }
    }
}

fn add_to(
    state: &AppState,
    collection: Collection,
    user: &User,
    recipe_id: i64,
) -> Result<(StatusCode, Json<RecipeSummary>), ApiError> {
    let svc = state.svc();
    svc.get_recipe_summary(recipe_id)
        .map_err(|_| ApiError::NotFound(format!("Recipe {recipe_id} not found")))?;
    let added = match collection {
        Collection::Favorites => svc.add_favorite(user.id, recipe_id),
        Collection::Cart => svc.add_to_cart(user.id, recipe_id),
    }
    .context("database error")?;
    let summary = added.ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Recipe {recipe_id} is already in {}",
            collection.label()
        ))
    })?;
    Ok((StatusCode::CREATED, Json(summary)))
}

fn remove_from(
    state: &AppState,
    collection: Collection,
    user: &User,
    recipe_id: i64,
) -> Result<StatusCode, ApiError> {
    let svc = state.svc();
    svc.get_recipe_summary(recipe_id)
        .map_err(|_| ApiError::NotFound(format!("Recipe {recipe_id} not found")))?;
    let removed = match collection {
        Collection::Favorites => svc.remove_favorite(user.id, recipe_id),
        Collection::Cart => svc.remove_from_cart(user.id, recipe_id),
    }
    .context("database error")?;
    if !removed {
        return Err(ApiError::BadRequest(format!(
            "Recipe {recipe_id} is not in {}",
            collection.label()
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<RecipeSummary>), ApiError> {
    add_to(&state, Collection::Favorites, &user, id)
}

async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    remove_from(&state, Collection::Favorites, &user, id)
}

async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<RecipeSummary>), ApiError> {
    add_to(&state, Collection::Cart, &user, id)
}

async fn remove_from_cart(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    remove_from(&state, Collection::Cart, &user, id)
}

/// Both shopping list endpoints reject anonymous callers and empty carts
/// before anything is aggregated.
fn cart_shopping_list(state: &AppState, viewer: Option<User>) -> Result<ShoppingList, ApiError> {
    let user = viewer.ok_or_else(|| ApiError::Unauthorized(NOT_AUTHENTICATED.to_string()))?;
    state
        .svc()
        .shopping_list(user.id)
        .context("failed to build shopping list")?
        .ok_or_else(|| ApiError::BadRequest(EMPTY_CART.to_string()))
}

async fn download_shopping_cart(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
) -> Result<Response, ApiError> {
    let body = cart_shopping_list(&state, viewer)?.render();
    let headers = [
        (header::CONTENT_TYPE, CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={FILE_NAME}"),
        ),
    ];
    Ok((headers, body).into_response())
}

async fn shopping_list(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
) -> Result<Json<ShoppingList>, ApiError> {
    Ok(Json(cart_shopping_list(&state, viewer)?))
}

// --- Users ---

async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/ingredients", get(list_ingredients))
        .route("/api/ingredients/{id}", get(get_ingredient))
        .route("/api/tags", get(list_tags))
        .route("/api/tags/{id}", get(get_tag))
        .route("/api/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/api/recipes/download_shopping_cart",
            get(download_shopping_cart),
        )
        .route("/api/recipes/shopping_list", get(shopping_list))
        .route(
            "/api/recipes/{id}",
            get(get_recipe)
                .put(update_recipe)
                .patch(update_recipe)
                .delete(delete_recipe),
        )
        .route(
            "/api/recipes/{id}/favorite",
            post(add_favorite).delete(remove_favorite),
        )
        .route(
            "/api/recipes/{id}/shopping_cart",
            post(add_to_cart).delete(remove_from_cart),
        )
        .route("/api/users/me", get(me))
        .route_layer(middleware::from_fn_with_state(state.clone(), resolve_user))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(svc: FoodgramService, port: u16, bind: &str) -> anyhow::Result<()> {
    let recipes = svc.count_recipes()?;
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
    };
    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" {
        warn!(bind, "listening on a non-loopback address");
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!(bind, port, recipes, "foodgram API listening");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use foodgram_core::models::{NewTag, NewUser};
    use foodgram_core::shopping_list::{FOOTER, HEADER};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const ALICE_TOKEN: &str = "alice-token";
    const BOB_TOKEN: &str = "bob-token";

    struct Fixture {
        state: AppState,
        flour: i64,
        milk: i64,
        bread: i64,
        pancakes: i64,
    }

    fn add_user(svc: &FoodgramService, username: &str, token: &str) -> User {
        svc.create_user(
            &NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                first_name: String::new(),
                last_name: String::new(),
            },
            &auth::hash_token(token),
        )
        .unwrap()
    }

    fn recipe(name: &str, lines: &[(i64, i64)]) -> NewRecipe {
        NewRecipe {
            name: name.to_string(),
            text: "Готовить".to_string(),
            cooking_time: 30,
            image: None,
            tag_ids: vec![],
            ingredients: lines
                .iter()
                .map(|&(ingredient_id, amount)| NewRecipeIngredient {
                    ingredient_id,
                    amount,
                })
                .collect(),
        }
    }

    /// Alice authors two recipes; Bob exists but owns nothing.
    fn fixture() -> Fixture {
        let svc = FoodgramService::new_in_memory().unwrap();
        let alice = add_user(&svc, "alice", ALICE_TOKEN);
        add_user(&svc, "bob", BOB_TOKEN);
        let flour = svc.add_ingredient("Мука", "г").unwrap().id;
        let milk = svc.add_ingredient("Молоко", "мл").unwrap().id;
        svc.add_ingredient("Мускатный орех", "г").unwrap();
        svc.add_ingredient("Сухое молоко", "г").unwrap();
        svc.add_tag(&NewTag {
            name: "Завтрак".to_string(),
            slug: "breakfast".to_string(),
            color: "#E26C2D".to_string(),
        })
        .unwrap();

        let bread = svc
            .create_recipe(alice.id, &recipe("Хлеб", &[(flour, 200)]))
            .unwrap()
            .id;
        let pancakes = svc
            .create_recipe(alice.id, &recipe("Блины", &[(flour, 300), (milk, 150)]))
            .unwrap()
            .id;

        Fixture {
            state: AppState {
                svc: Arc::new(Mutex::new(svc)),
            },
            flour,
            milk,
            bread,
            pancakes,
        }
    }

    async fn send(
        fx: &Fixture,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Token {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        build_router(fx.state.clone()).oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn download_anonymous_returns_401() {
        let fx = fixture();
        let response = send(&fx, "GET", "/api/recipes/download_shopping_cart", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], NOT_AUTHENTICATED);
    }

    #[tokio::test]
    async fn download_unknown_token_is_anonymous() {
        let fx = fixture();
        let response = send(
            &fx,
            "GET",
            "/api/recipes/download_shopping_cart",
            Some("not-a-token"),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn download_empty_cart_returns_400() {
        let fx = fixture();
        let response = send(
            &fx,
            "GET",
            "/api/recipes/download_shopping_cart",
            Some(BOB_TOKEN),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], EMPTY_CART);
    }

    #[tokio::test]
    async fn download_aggregates_cart() {
        let fx = fixture();
        for id in [fx.pancakes, fx.bread] {
            let uri = format!("/api/recipes/{id}/shopping_cart");
            let response = send(&fx, "POST", &uri, Some(BOB_TOKEN), None).await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = send(
            &fx,
            "GET",
            "/api/recipes/download_shopping_cart",
            Some(BOB_TOKEN),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=shopping_cart.txt"
        );
        // Bread has the lower id, so flour is seen first
        assert_eq!(
            body_text(response).await,
            format!("{HEADER}Мука - 500г.\r\nМолоко - 150мл.\r\n{FOOTER}")
        );
    }

    #[tokio::test]
    async fn shopping_list_json() {
        let fx = fixture();
        let uri = format!("/api/recipes/{}/shopping_cart", fx.pancakes);
        send(&fx, "POST", &uri, Some(ALICE_TOKEN), None).await;

        let response = send(
            &fx,
            "GET",
            "/api/recipes/shopping_list",
            Some(ALICE_TOKEN),
            None,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["recipe_count"], 1);
        assert_eq!(json["entries"][0]["ingredient"]["name"], "Мука");
        assert_eq!(json["entries"][1]["total_quantity"], 150);

        let anonymous = send(&fx, "GET", "/api/recipes/shopping_list", None, None).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn cart_add_remove_status_codes() {
        let fx = fixture();
        let uri = format!("/api/recipes/{}/shopping_cart", fx.bread);

        let response = send(&fx, "POST", &uri, Some(BOB_TOKEN), None).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["name"], "Хлеб");

        let again = send(&fx, "POST", &uri, Some(BOB_TOKEN), None).await;
        assert_eq!(again.status(), StatusCode::BAD_REQUEST);

        let removed = send(&fx, "DELETE", &uri, Some(BOB_TOKEN), None).await;
        assert_eq!(removed.status(), StatusCode::NO_CONTENT);

        let missing = send(&fx, "DELETE", &uri, Some(BOB_TOKEN), None).await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let unknown = send(
            &fx,
            "POST",
            "/api/recipes/999/shopping_cart",
            Some(BOB_TOKEN),
            None,
        )
        .await;
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        let anonymous = send(&fx, "POST", &uri, None, None).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn favorite_add_and_flag() {
        let fx = fixture();
        let uri = format!("/api/recipes/{}/favorite", fx.bread);
        let response = send(&fx, "POST", &uri, Some(BOB_TOKEN), None).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let again = send(&fx, "POST", &uri, Some(BOB_TOKEN), None).await;
        assert_eq!(again.status(), StatusCode::BAD_REQUEST);

        let detail_uri = format!("/api/recipes/{}", fx.bread);
        let detail = send(&fx, "GET", &detail_uri, Some(BOB_TOKEN), None).await;
        let json = body_json(detail).await;
        assert_eq!(json["is_favorited"], true);
        assert_eq!(json["is_in_shopping_cart"], false);

        let list = send(&fx, "GET", "/api/recipes?is_favorited=1", Some(BOB_TOKEN), None).await;
        let json = body_json(list).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["id"], fx.bread);
    }

    #[tokio::test]
    async fn create_recipe_requires_auth_and_valid_body() {
        let fx = fixture();
        let body = serde_json::json!({
            "name": "Каша",
            "text": "Варить",
            "cooking_time": 20,
            "tags": [1],
            "ingredients": [{"id": fx.milk, "amount": 250}, {"id": fx.flour, "amount": 50}]
        });

        let anonymous = send(&fx, "POST", "/api/recipes", None, Some(body.clone())).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let response = send(&fx, "POST", "/api/recipes", Some(BOB_TOKEN), Some(body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["author"]["username"], "bob");
        assert_eq!(json["tags"][0]["slug"], "breakfast");
        assert_eq!(json["ingredients"][0]["name"], "Молоко");

        let duplicate = serde_json::json!({
            "name": "Каша",
            "text": "Варить",
            "cooking_time": 20,
            "ingredients": [{"id": fx.milk, "amount": 1}, {"id": fx.milk, "amount": 2}]
        });
        let response = send(&fx, "POST", "/api/recipes", Some(BOB_TOKEN), Some(duplicate)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let unknown = serde_json::json!({
            "name": "Каша",
            "text": "Варить",
            "cooking_time": 20,
            "ingredients": [{"id": 999, "amount": 1}]
        });
        let response = send(&fx, "POST", "/api/recipes", Some(BOB_TOKEN), Some(unknown)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn only_author_can_modify() {
        let fx = fixture();
        let uri = format!("/api/recipes/{}", fx.bread);
        let body = serde_json::json!({
            "name": "Хлеб ржаной",
            "text": "Печь",
            "cooking_time": 90,
            "ingredients": [{"id": fx.flour, "amount": 400}]
        });

        let forbidden = send(&fx, "PATCH", &uri, Some(BOB_TOKEN), Some(body.clone())).await;
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let updated = send(&fx, "PATCH", &uri, Some(ALICE_TOKEN), Some(body)).await;
        assert_eq!(updated.status(), StatusCode::OK);
        assert_eq!(body_json(updated).await["name"], "Хлеб ржаной");

        let forbidden = send(&fx, "DELETE", &uri, Some(BOB_TOKEN), None).await;
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let deleted = send(&fx, "DELETE", &uri, Some(ALICE_TOKEN), None).await;
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let gone = send(&fx, "GET", &uri, None, None).await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ingredient_search_prefix_first() {
        let fx = fixture();
        let uri = format!(
            "/api/ingredients?name={}",
            "%D0%BC%D0%BE%D0%BB" // "мол"
        );
        let response = send(&fx, "GET", &uri, None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let names: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Молоко", "Сухое молоко"]);

        let one = send(&fx, "GET", &format!("/api/ingredients/{}", fx.flour), None, None).await;
        assert_eq!(body_json(one).await["measurement_unit"], "г");

        let missing = send(&fx, "GET", "/api/ingredients/999", None, None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn tags_list_and_get() {
        let fx = fixture();
        let response = send(&fx, "GET", "/api/tags", None, None).await;
        let json = body_json(response).await;
        assert_eq!(json[0]["slug"], "breakfast");

        let missing = send(&fx, "GET", "/api/tags/42", None, None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn recipe_list_pagination_and_author() {
        let fx = fixture();
        let response = send(&fx, "GET", "/api/recipes?limit=1&page=1", None, None).await;
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["id"], fx.pancakes);

        let response = send(&fx, "GET", "/api/recipes?author=2", None, None).await;
        assert!(body_json(response).await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn recipe_list_huge_page_is_empty() {
        let fx = fixture();
        let uri = format!("/api/recipes?limit=10&page={}", i64::MAX);
        let response = send(&fx, "GET", &uri, None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn me_accepts_bearer_scheme() {
        let fx = fixture();
        let request = axum::http::Request::get("/api/users/me")
            .header("Authorization", format!("Bearer {ALICE_TOKEN}"))
            .body(Body::empty())
            .unwrap();
        let response = build_router(fx.state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["username"], "alice");

        let anonymous = send(&fx, "GET", "/api/users/me", None, None).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn security_headers_present() {
        let fx = fixture();
        let response = send(&fx, "GET", "/api/recipes/download_shopping_cart", None, None).await;

        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[test]
    fn query_flags() {
        assert!(query_flag(Some("1")));
        assert!(query_flag(Some("true")));
        assert!(!query_flag(Some("0")));
        assert!(!query_flag(None));
    }
}
