//! Identity resolution.
//!
//! Turns the session's `authenticated_user_id` into exactly one [`Identity`]
//! per request. Handlers read it back through [`CurrentIdentity`].

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tower_sessions::Session;

use paperback_core::{Identity, UserId};

use super::session::AUTHENTICATED_USER_ID;
use crate::db::RepositoryError;
use crate::error::{AppError, set_sentry_user};
use crate::state::AppState;

/// Resolve the session's user and attach the resulting [`Identity`].
///
/// A missing or zero id and a deleted account both resolve to
/// `Identity::Anonymous`. A stored value that does not decode as an id is
/// removed from the session and also resolves to `Identity::Anonymous`.
///
/// # Errors
///
/// Returns `AppError` if the session store or the user lookup fails.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = request
        .extensions()
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal("session layer missing".to_string()))?;

    let user_id = match session.get::<i64>(AUTHENTICATED_USER_ID).await {
        Ok(id) => id.unwrap_or(0),
        Err(tower_sessions::session::Error::SerdeJson(e)) => {
            tracing::warn!(error = %e, "Discarding unreadable authenticated user id");
            session.remove_value(AUTHENTICATED_USER_ID).await?;
            0
        }
        Err(e) => return Err(e.into()),
    };

    let identity = match state.repos().users.get_by_id(UserId::new(user_id)).await {
        Ok(user) => {
            set_sentry_user(&user);
            Identity::Account(user)
        }
        Err(RepositoryError::NotFound) => Identity::Anonymous,
        Err(e) => return Err(e.into()),
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// The identity attached by [`resolve_identity`].
///
/// Using it on a route the resolver did not run for is a server bug and
/// yields a 500.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(Self)
            .ok_or_else(|| {
                AppError::Internal("identity missing from request extensions".to_string())
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::{
        Router,
        body::{Body, to_bytes},
        extract::Path,
        http::{StatusCode, header::COOKIE, header::SET_COOKIE},
        middleware,
        routing::{get, post},
    };
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::config::ServerConfig;
    use crate::db::{InMemoryStore, NewUserRecord, Repositories, UserRepository};
    use crate::middleware::session::create_session_layer;
    use crate::services::LogNotifier;
    use crate::tasks::BackgroundTasks;

    async fn describe(CurrentIdentity(identity): CurrentIdentity) -> String {
        match identity {
            Identity::Anonymous => "anonymous".to_string(),
            Identity::Account(user) => user.email.to_string(),
        }
    }

    async fn sign_in(session: Session, Path(id): Path<i64>) -> StatusCode {
        session.insert(AUTHENTICATED_USER_ID, id).await.unwrap();
        StatusCode::OK
    }

    async fn corrupt(session: Session) -> StatusCode {
        session
            .insert(AUTHENTICATED_USER_ID, "not-a-number")
            .await
            .unwrap();
        StatusCode::OK
    }

    fn state(store: Arc<InMemoryStore>) -> AppState {
        let config = ServerConfig::local("postgres://unused");
        let notifier = Arc::new(LogNotifier::new(config.base_url.clone()));
        AppState::new(
            config,
            Repositories::in_memory(store),
            notifier,
            BackgroundTasks::new(),
        )
        .unwrap()
    }

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/", get(describe))
            .route_layer(middleware::from_fn_with_state(state, resolve_identity))
            .route("/sign-in/{id}", post(sign_in))
            .route("/corrupt", post(corrupt))
            .layer(create_session_layer(MemoryStore::default(), false))
    }

    async fn whoami(app: &Router, cookie: Option<&str>) -> String {
        let mut request = Request::get("/");
        if let Some(cookie) = cookie {
            request = request.header(COOKIE, cookie);
        }
        let response = app
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn sign_in_cookie(app: &Router, id: i64) -> String {
        session_cookie(app, &format!("/sign-in/{id}")).await
    }

    async fn session_cookie(app: &Router, path: &str) -> String {
        let response = app
            .clone()
            .oneshot(Request::post(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_owned()
    }

    async fn insert_user(store: &InMemoryStore) -> UserId {
        UserRepository::insert(
            store,
            &NewUserRecord {
                name: "Ada".into(),
                email: paperback_core::Email::parse("ada@example.com").unwrap(),
                password_hash: "x".into(),
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_no_session_is_anonymous() {
        let app = app(state(Arc::new(InMemoryStore::new())));
        assert_eq!(whoami(&app, None).await, "anonymous");
    }

    #[tokio::test]
    async fn test_session_user_is_resolved() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = insert_user(&store).await;
        let app = app(state(store));

        let cookie = sign_in_cookie(&app, user_id.as_i64()).await;
        assert_eq!(whoami(&app, Some(&cookie)).await, "ada@example.com");
    }

    #[tokio::test]
    async fn test_deleted_user_is_anonymous() {
        let store = Arc::new(InMemoryStore::new());
        let user_id = insert_user(&store).await;
        let app = app(state(store.clone()));

        let cookie = sign_in_cookie(&app, user_id.as_i64()).await;
        store.remove_user(user_id).unwrap();
        assert_eq!(whoami(&app, Some(&cookie)).await, "anonymous");
    }

    #[tokio::test]
    async fn test_undecodable_user_id_is_anonymous() {
        let app = app(state(Arc::new(InMemoryStore::new())));

        let cookie = session_cookie(&app, "/corrupt").await;
        assert_eq!(whoami(&app, Some(&cookie)).await, "anonymous");
        assert_eq!(whoami(&app, Some(&cookie)).await, "anonymous");
    }

    #[tokio::test]
    async fn test_extractor_without_resolver_is_500() {
        let app = Router::new().route("/", get(describe));
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
