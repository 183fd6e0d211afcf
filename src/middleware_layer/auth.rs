use axum::{
    body::Body,
    extract::State,
    middleware::Next,
    response::Response,
};
use http::{Request, header};

use crate::{
    error::AppError,
    services::{account, auth},
    state::AppState,
};

const BEARER_PREFIX: &str = "Bearer ";

/// Extracts the session token from the `Authorization` header.
///
/// Accepts either the bare token or `Bearer <token>`.
fn extract_session_token(request: &Request<Body>) -> Option<String> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX).unwrap_or(value).trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// A middleware that requires a live session token.
///
/// On success the `ResolvedSession` is placed in the request extensions and
/// the account's activity is touched.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `request` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// A `Response`, or an `AppError` rendered as 401 for credential failures.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    tracing::debug!("🔐 Checking authentication...");

    let encoded = extract_session_token(&request).ok_or_else(|| {
        tracing::warn!("❌ No Authorization header found");
        AppError::Unauthorized("missing session token".to_string())
    })?;

    let session = auth::resolve_token(&state, &encoded).await?;
    tracing::debug!("✅ Account authenticated: {}", session.account_id);

    account::touch_activity(&state, &session.account_id).await;

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{Extension, Router, middleware::from_fn_with_state, routing::get};
    use http::StatusCode;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{Config, KdfSettings};
    use crate::models::session::ResolvedSession;
    use crate::repositories::memory::{MemoryBackend, MemoryBlobStore, MemoryCache};
    use crate::store::SessionCache;

    async fn whoami(Extension(session): Extension<ResolvedSession>) -> String {
        session.username
    }

    async fn test_app(dir: &tempfile::TempDir) -> (AppState, Router) {
        let config = Config {
            database_url: String::new(),
            redis_url: None,
            session_duration_days: 7,
            data_dir: dir.path().to_path_buf(),
            daily_secret_path: dir.path().join("secret.key"),
            game_version: "1.0.4".to_string(),
            kdf: KdfSettings {
                memory_kib: 64,
                iterations: 1,
                parallelism: 1,
                max_concurrent: 2,
            },
        };
        let backend = Arc::new(MemoryBackend::new());
        let cache: Arc<dyn SessionCache> = Arc::new(MemoryCache::new());
        let state = AppState::assemble(
            config,
            backend.clone(),
            backend,
            Arc::new(MemoryBlobStore::new()),
            Some(cache),
        )
        .await
        .unwrap();

        let app = Router::new()
            .route("/whoami", get(whoami))
            .route_layer(from_fn_with_state(state.clone(), require_auth))
            .with_state(state.clone());
        (state, app)
    }

    fn request(authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn accepts_raw_and_bearer_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let (state, app) = test_app(&dir).await;

        auth::register(&state, "trainer1", "secretpass").await.unwrap();
        let token = auth::login(&state, "trainer1", "secretpass").await.unwrap().encode();

        let raw = app.clone().oneshot(request(Some(token.as_str()))).await.unwrap();
        assert_eq!(raw.status(), StatusCode::OK);

        let bearer_value = format!("Bearer {}", token);
        let bearer = app
            .oneshot(request(Some(bearer_value.as_str())))
            .await
            .unwrap();
        assert_eq!(bearer.status(), StatusCode::OK);

        let body = http_body_util::BodyExt::collect(bearer.into_body())
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(&body[..], b"trainer1");
    }

    #[tokio::test]
    async fn rejects_missing_malformed_and_revoked_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let (state, app) = test_app(&dir).await;

        let missing = app.clone().oneshot(request(None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let malformed = app.clone().oneshot(request(Some("Bearer nope"))).await.unwrap();
        assert_eq!(malformed.status(), StatusCode::UNAUTHORIZED);

        auth::register(&state, "trainer2", "secretpass").await.unwrap();
        let token = auth::login(&state, "trainer2", "secretpass").await.unwrap();
        auth::logout(&state, &token).await.unwrap();

        let revoked = app.oneshot(request(Some(token.encode().as_str()))).await.unwrap();
        assert_eq!(revoked.status(), StatusCode::UNAUTHORIZED);
    }
}
