use std::time::Duration;

use super::catalog::Catalog;
use super::identity::Identity;
use super::narrator::Narrator;
use super::recommend::Recommender;
use super::reviews::ReviewLedger;
use super::store::Store;

/// Everything a request handler needs, shared across actix workers.
#[derive(Clone)]
pub struct AppState {
    pub identity: Identity,
    pub catalog: Catalog,
    pub reviews: ReviewLedger,
    pub recommender: Recommender,
    pub narrator: Option<Narrator>,
    pub call_timeout: Duration,
}

impl AppState {
    pub fn new(store: Store, call_timeout: Duration, session_ttl: Option<chrono::Duration>) -> AppState {
        let catalog = Catalog::new(store.clone());

        AppState {
            identity: Identity::new(store.clone(), catalog.clone(), session_ttl),
            reviews: ReviewLedger::new(store.clone()),
            recommender: Recommender::new(store, catalog.clone()),
            catalog,
            narrator: None,
            call_timeout,
        }
    }

    pub fn with_narrator(mut self, narrator: Narrator) -> AppState {
        self.narrator = Some(narrator);
        self
    }
}
