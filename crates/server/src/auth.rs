//! Bearer token authentication and request tracing context.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use ridelog_core::token::{Token, TokenId};
use ridelog_core::OwnerId;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::Instrument;
use uuid::Uuid;

/// Longer client trace ids are cut to this many characters.
const MAX_TRACE_ID_LEN: usize = 128;

/// Trace ID for request correlation.
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a client-provided id, keeping printable ASCII only.
    pub fn from_client(value: &str) -> Self {
        let sanitized: String = value
            .chars()
            .take(MAX_TRACE_ID_LEN)
            .filter(|c| c.is_ascii_graphic() || *c == ' ')
            .collect();

        if sanitized.is_empty() {
            Self::new()
        } else {
            Self(sanitized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The owner a request acts for, resolved from its bearer token.
#[derive(Clone, Debug)]
pub struct AuthenticatedOwner {
    pub token: Token,
}

impl AuthenticatedOwner {
    pub fn owner(&self) -> OwnerId {
        self.token.owner
    }
}

impl<S> FromRequestParts<S> for AuthenticatedOwner
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedOwner>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
    }
}

/// Extract the bearer token. The scheme is case-insensitive (RFC 6750).
fn extract_bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    match value.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => Some(value[7..].trim()),
        _ => None,
    }
}

fn extract_or_generate_trace_id(req: &Request) -> TraceId {
    req.headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(TraceId::from_client)
        .unwrap_or_default()
}

/// Hash a bearer secret the way token rows store it.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Resolve the bearer token (if any) to an owner and run the request inside a
/// span carrying its trace id.
///
/// Requests without a token pass through unauthenticated; handlers that need an
/// owner reject them. A token that is unknown, revoked or expired is rejected here.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let trace_id = extract_or_generate_trace_id(&req);
    let span = tracing::info_span!("request", trace_id = %trace_id);
    req.extensions_mut().insert(trace_id);

    if let Some(secret) = extract_bearer_token(&req) {
        let row = state
            .metadata
            .get_token_by_hash(&hash_token(secret))
            .await?
            .ok_or_else(|| ApiError::Unauthorized("unknown token".to_string()))?;

        let token = Token {
            id: TokenId::from_uuid(row.token_id),
            owner: OwnerId(row.owner_id),
            expires_at: row.expires_at,
            revoked_at: row.revoked_at,
            created_at: row.created_at,
            description: row.description,
        };
        if !token.is_valid() {
            return Err(ApiError::Unauthorized(
                "token expired or revoked".to_string(),
            ));
        }

        let metadata = state.metadata.clone();
        let token_id = row.token_id;
        tokio::spawn(async move {
            if let Err(e) = metadata
                .touch_token(token_id, OffsetDateTime::now_utc())
                .await
            {
                tracing::debug!(token_id = %token_id, error = %e, "failed to record token use");
            }
        });

        req.extensions_mut().insert(AuthenticatedOwner { token });
    }

    Ok(next.run(req).instrument(span).await)
}
