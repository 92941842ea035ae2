#[macro_use]
extern crate log;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{http, web, App, HttpServer};

use taproom::config::Config;
use taproom::narrator::Narrator;
use taproom::state::AppState;
use taproom::store::Store;
use taproom::{api, seed};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let store = match Store::open(&config.database_url, &config.store) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open the store at {}: {}", config.database_url, e);
            std::process::exit(1);
        }
    };

    let mut state = AppState::new(store.clone(), config.call_timeout, config.session_ttl);

    if let Err(e) = seed::run(&store, &state.identity, &config.seed) {
        error!("Failed to seed the catalog: {}", e);
        std::process::exit(1);
    }

    if let Some(narrator_config) = config.narrator.clone() {
        match Narrator::new(narrator_config) {
            Ok(narrator) => state = state.with_narrator(narrator),
            Err(e) => warn!("Narrator disabled: {}", e),
        }
    }

    let data = web::Data::new(state);
    let listen_addr = config.listen_addr;

    info!("Listening on {}", listen_addr);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "DELETE"])
            .allowed_headers(vec![http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(data.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(api::configure)
    })
    .bind(listen_addr)?
    .run()
    .await
}
