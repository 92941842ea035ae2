use std::collections::HashMap;

use actix_web::{web, HttpResponse};

use super::{execute, ApiResponse, AuthUser};
use crate::error::Result;
use crate::models::{Filter, ReviewForm};
use crate::recommend::Recommendation;
use crate::state::AppState;

const DEFAULT_PER_PAGE: i64 = 10;

#[derive(Deserialize)]
struct Credentials {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Serialize)]
struct AccessToken {
    access_token: String,
}

#[derive(Deserialize)]
struct FavouriteForm {
    #[serde(default, deserialize_with = "crate::models::opt_string_or_number")]
    beer_id: Option<String>,
}

#[derive(Deserialize)]
struct PageParams {
    page: Option<i64>,
    per_page: Option<i64>,
}

#[derive(Serialize)]
struct RecommendationBody {
    #[serde(flatten)]
    recommendation: Recommendation,
    /// Narrator prose, or null when no narrator is configured or it failed.
    text: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/register", web::post().to(register))
        .route("/login", web::post().to(login))
        .route("/protected", web::get().to(protected))
        .route("/beers", web::get().to(query_beers))
        .route("/beers/categories", web::get().to(list_categories))
        .route("/beers/{id}/reviews", web::get().to(reviews_for_beer))
        .service(
            web::resource("/favourites")
                .route(web::get().to(list_favourites))
                .route(web::post().to(add_favourite)),
        )
        .route("/favourites/{beer_id}", web::delete().to(remove_favourite))
        .route("/breweries", web::get().to(query_breweries))
        .route("/breweries/{id}", web::get().to(get_brewery))
        .service(
            web::resource("/reviews")
                .route(web::get().to(reviews_for_user))
                .route(web::post().to(add_review)),
        )
        .route("/reviews/{id}", web::delete().to(delete_review))
        .route("/recommendations", web::get().to(recommendations));
}

async fn register(state: web::Data<AppState>, form: web::Json<Credentials>) -> Result<HttpResponse> {
    let Credentials { username, password } = form.into_inner();

    let user = execute(&state, move |app| {
        app.identity
            .register(&username.unwrap_or_default(), &password.unwrap_or_default())
    })
    .await?;

    Ok(HttpResponse::Created()
        .json(ApiResponse::new(user).with_message("User created successfully".to_owned())))
}

async fn login(state: web::Data<AppState>, form: web::Json<Credentials>) -> Result<HttpResponse> {
    let Credentials { username, password } = form.into_inner();

    let session = execute(&state, move |app| {
        app.identity
            .authenticate(&username.unwrap_or_default(), &password.unwrap_or_default())
    })
    .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(AccessToken {
        access_token: session.token,
    })))
}

async fn protected(user: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::message(format!("Welcome, {}", user.0)))
}

/// Every query parameter is an equality filter on the beer document.
async fn query_beers(
    state: web::Data<AppState>,
    params: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse> {
    let filter: Filter = params.into_inner().into_iter().collect();
    let beers = execute(&state, move |app| app.catalog.query_beers(&filter)).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(beers)))
}

async fn list_categories(state: web::Data<AppState>) -> Result<HttpResponse> {
    let categories = execute(&state, |app| app.catalog.list_categories()).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(categories)))
}

async fn reviews_for_beer(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let beer_id = path.into_inner();
    let reviews = execute(&state, move |app| app.reviews.reviews_for_beer(&beer_id)).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(reviews)))
}

async fn list_favourites(state: web::Data<AppState>, user: AuthUser) -> Result<HttpResponse> {
    let favourites = execute(&state, move |app| app.identity.list_favorites(&user.0)).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(favourites)))
}

async fn add_favourite(
    state: web::Data<AppState>,
    user: AuthUser,
    form: web::Json<FavouriteForm>,
) -> Result<HttpResponse> {
    let beer_id = form.into_inner().beer_id.unwrap_or_default();

    execute(&state, move |app| app.identity.add_favorite(&user.0, &beer_id)).await?;

    Ok(HttpResponse::Created().json(ApiResponse::message("Beer added to favourites".to_owned())))
}

async fn remove_favourite(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let beer_id = path.into_inner();

    execute(&state, move |app| app.identity.remove_favorite(&user.0, &beer_id)).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message(
        "Beer removed from favourites".to_owned(),
    )))
}

async fn query_breweries(
    state: web::Data<AppState>,
    params: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse> {
    let filter: Filter = params.into_inner().into_iter().collect();
    let breweries = execute(&state, move |app| app.catalog.query_breweries(&filter)).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(breweries)))
}

/// An unknown id is not an error: `data` is simply null.
async fn get_brewery(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let id = path.into_inner();
    let brewery = execute(&state, move |app| app.catalog.get_brewery(&id)).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(brewery)))
}

async fn reviews_for_user(state: web::Data<AppState>, user: AuthUser) -> Result<HttpResponse> {
    let reviews = execute(&state, move |app| app.reviews.reviews_for_user(&user.0)).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(reviews)))
}

async fn add_review(
    state: web::Data<AppState>,
    user: AuthUser,
    form: web::Json<ReviewForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();
    let review = execute(&state, move |app| app.reviews.add_review(&user.0, form)).await?;

    Ok(HttpResponse::Created()
        .json(ApiResponse::new(review).with_message("Review added".to_owned())))
}

async fn delete_review(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let review_id = path.into_inner();

    execute(&state, move |app| app.reviews.delete_review(&user.0, &review_id)).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message("Review deleted".to_owned())))
}

async fn recommendations(
    state: web::Data<AppState>,
    user: AuthUser,
    params: web::Query<PageParams>,
) -> Result<HttpResponse> {
    let page = params.page.unwrap_or(1);
    let per_page = params.per_page.unwrap_or(DEFAULT_PER_PAGE);

    let recommendation = execute(&state, move |app| {
        app.recommender.recommend(&user.0, page, per_page)
    })
    .await?;

    let text = match &state.narrator {
        Some(narrator) => narrator.describe(&recommendation.styles).await,
        None => None,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::new(RecommendationBody {
        recommendation,
        text,
    })))
}
