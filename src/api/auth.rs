use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;

use super::execute;
use crate::error::{Error, Result};
use crate::state::AppState;

/// The username behind the request's `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return None;
    }

    Some(token.trim().to_owned())
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<AuthUser>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = bearer_token(req);
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let token = token.ok_or(Error::SessionNotFound)?;
            let state = state.ok_or_else(|| Error::Config("application state missing".into()))?;

            let username = execute(&state, move |app| app.identity.resolve_session(&token)).await?;

            Ok(AuthUser(username))
        })
    }
}
