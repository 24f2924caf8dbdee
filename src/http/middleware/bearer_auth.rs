use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};

/// Holds only the digest of the configured token; requests are compared
/// digest to digest so the check does not depend on token length.
#[derive(Clone)]
pub struct BearerAuthState {
    token_digest: Option<Vec<u8>>,
}

impl BearerAuthState {
    pub fn new(token: &str) -> Self {
        let token = token.trim();
        Self {
            token_digest: (!token.is_empty()).then(|| Sha256::digest(token.as_bytes()).to_vec()),
        }
    }
}

pub async fn require_bearer_token(
    State(auth): State<BearerAuthState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .unwrap_or("")
        .trim();

    let authorized = match &auth.token_digest {
        Some(expected) => Sha256::digest(provided.as_bytes()).as_slice() == expected.as_slice(),
        None => false,
    };

    if !authorized {
        return Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .body(Body::from("unauthorized"))
            .unwrap_or_else(|_| Response::new(Body::from("unauthorized")));
    }

    next.run(request).await
}
