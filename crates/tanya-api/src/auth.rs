//! API authentication via per-user bearer tokens.
//!
//! Tokens are random hex strings handed out once; only their SHA-256 hash
//! is stored. The middleware resolves `Authorization: Bearer <token>` to a
//! user and attaches an [`AuthenticatedUser`] to the request extensions.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::Rng;
use sha2::{Digest, Sha256};

use tanya_core::types::AuthenticatedUser;
use tanya_storage::UserRepository;

use crate::error::ApiError;
use crate::state::AppState;

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Hex-encoded SHA-256 of a token, as stored in `users.token_hash`.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

/// Middleware that validates bearer token authentication.
///
/// Returns 401 if the header is missing, malformed, or names no user.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match req.headers().get("authorization") {
        Some(value) => match value.to_str() {
            Ok(s) => match s.strip_prefix("Bearer ") {
                Some(token) if !token.trim().is_empty() => token.trim().to_string(),
                _ => return unauthorized("Invalid bearer token"),
            },
            Err(_) => return unauthorized("Invalid Authorization header encoding"),
        },
        None => return unauthorized("Missing Authorization header"),
    };

    let users = UserRepository::new(state.database.clone());
    match users.find_by_token_hash(&hash_token(&token)) {
        Ok(Some(user)) => {
            req.extensions_mut().insert(AuthenticatedUser::from(&user));
            next.run(req).await
        }
        Ok(None) => unauthorized("Invalid bearer token"),
        Err(e) => {
            tracing::error!(error = %e, "Token lookup failed");
            ApiError::from(e).into_response()
        }
    }
}
