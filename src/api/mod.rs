//! HTTP surface: JSend-style envelope, request plumbing and route table.

use actix_web::web;
use serde::Serialize;

use super::error::{Error, Result};
use super::state::AppState;

mod auth;
mod routes;

pub use self::auth::AuthUser;

#[derive(Debug, Serialize)]
pub enum ResponseStatus {
    Success,
    Error,
    Fail,
}

/// Envelope type for API responses.
///
/// `Fail` marks a problem with the request, `Error` a problem on our side.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub status: ResponseStatus,
    pub data: Option<T>,
    pub messages: Option<Vec<String>>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn new(data: T) -> ApiResponse<T> {
        ApiResponse {
            status: ResponseStatus::Success,
            data: Some(data),
            messages: None,
        }
    }

    pub fn fail(message: String) -> ApiResponse<T> {
        ApiResponse {
            status: ResponseStatus::Fail,
            data: None,
            messages: Some(vec![message]),
        }
    }

    pub fn error(message: String) -> ApiResponse<T> {
        ApiResponse {
            status: ResponseStatus::Error,
            data: None,
            messages: Some(vec![message]),
        }
    }

    pub fn with_message(mut self, message: String) -> ApiResponse<T> {
        self.messages.get_or_insert_with(Vec::new).push(message);
        self
    }
}

impl ApiResponse<()> {
    /// A successful response that carries only a message.
    pub fn message(message: String) -> ApiResponse<()> {
        ApiResponse {
            status: ResponseStatus::Success,
            data: None,
            messages: Some(vec![message]),
        }
    }
}

/// Runs a synchronous core call on the blocking pool, giving up after the
/// configured call timeout.
pub async fn execute<F, T>(state: &web::Data<AppState>, call: F) -> Result<T>
where
    F: FnOnce(AppState) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let app = state.get_ref().clone();
    let blocking = web::block(move || call(app));

    match actix_rt::time::timeout(state.call_timeout, blocking).await {
        Ok(result) => result?,
        Err(_) => Err(Error::Timeout),
    }
}

/// Registers every route, plus extractor error handlers that answer in the
/// response envelope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        Error::MalformedPayload(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        Error::MalformedPayload(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        Error::MalformedPayload(err.to_string()).into()
    }));

    routes::configure(cfg);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use actix_web::http::StatusCode;
    use actix_web::ResponseError;

    use super::*;
    use crate::error::ErrorKind;
    use crate::store::testing::temp_store;

    fn state(call_timeout: Duration) -> (tempfile::TempDir, web::Data<AppState>) {
        let (dir, store) = temp_store();

        (dir, web::Data::new(AppState::new(store, call_timeout, None)))
    }

    #[actix_rt::test]
    async fn slow_calls_time_out() {
        let (_dir, state) = state(Duration::from_millis(20));

        let err = execute(&state, |_app| {
            std::thread::sleep(Duration::from_millis(500));
            Ok(())
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[actix_rt::test]
    async fn calls_within_the_timeout_return_their_result() {
        let (_dir, state) = state(Duration::from_secs(5));

        let categories = execute(&state, |app| app.catalog.list_categories())
            .await
            .unwrap();

        assert!(categories.is_empty());
    }

    #[test]
    fn envelope_serializes_status_data_and_messages() {
        let ok = serde_json::to_value(ApiResponse::new(vec![1, 2])).unwrap();
        assert_eq!(
            ok,
            serde_json::json!({"status": "Success", "data": [1, 2], "messages": null})
        );

        let fail = serde_json::to_value(ApiResponse::<()>::fail("Missing beer_id".into())).unwrap();
        assert_eq!(
            fail,
            serde_json::json!({"status": "Fail", "data": null, "messages": ["Missing beer_id"]})
        );
    }
}
