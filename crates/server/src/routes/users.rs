//! Account handlers: sign-up, activation, login and profile.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;

use paperback_core::{Credentials, SignupInput, UserPatch};

use super::extract::{JsonBody, QueryParams};
use crate::error::{AppError, Result, set_sentry_user};
use crate::middleware::session::AUTHENTICATED_USER_ID;
use crate::middleware::{CsrfToken, CurrentUser};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmailBody {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TokenBody {
    pub token: String,
}

/// `POST /user/signup`
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<SignupInput>,
) -> Result<impl IntoResponse> {
    let user = state.accounts().signup(input).await?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

/// `POST /user/activation-token`
pub async fn reissue_activation(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<EmailBody>,
) -> Result<impl IntoResponse> {
    state.accounts().reissue_activation(&body.email).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "an email will be sent to you containing activation instructions"
        })),
    ))
}

/// `GET /user/activate`
///
/// Landing page of the activation link. Echoes the token with the CSRF
/// token the activating `PUT` must carry.
pub async fn activation_form(
    CsrfToken(csrf): CsrfToken,
    QueryParams(query): QueryParams<TokenBody>,
) -> Json<Value> {
    Json(json!({
        "message": "submit the token to PUT /user/activated to activate your account",
        "token": query.token,
        "csrf_token": csrf,
    }))
}

/// `PUT /user/activated`
pub async fn activate(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<TokenBody>,
) -> Result<Json<Value>> {
    let user = state.accounts().activate(&body.token).await?;
    Ok(Json(json!({ "user": user })))
}

/// `GET /user/login`
///
/// Target of the unauthenticated redirect. Hands out the CSRF token the
/// login `POST` must echo.
pub async fn login_form(CsrfToken(token): CsrfToken) -> Json<Value> {
    Json(json!({
        "message": "submit email and password to log in",
        "csrf_token": token,
    }))
}

/// `POST /user/login`
///
/// The session id is renewed before the user id is stored.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    JsonBody(credentials): JsonBody<Credentials>,
) -> Result<Json<Value>> {
    let user = state.accounts().authenticate(&credentials).await?;

    session.cycle_id().await?;
    session
        .insert(AUTHENTICATED_USER_ID, user.id.as_i64())
        .await?;

    set_sentry_user(&user);
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(json!({ "user": user })))
}

/// `POST /user/logout`
pub async fn logout(session: Session) -> Result<StatusCode> {
    if let Some(user_id) = session.remove::<i64>(AUTHENTICATED_USER_ID).await? {
        tracing::info!(user_id, "User logged out");
    }
    session.cycle_id().await?;
    sentry::configure_scope(|scope| scope.set_user(None));
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /user/me`
pub async fn me(CurrentUser(user): CurrentUser) -> Json<Value> {
    Json(json!({ "user": user }))
}

/// `PATCH /user/me`
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(patch): JsonBody<UserPatch>,
) -> Result<Json<Value>> {
    let user = state.accounts().update_profile(&user, patch).await?;
    Ok(Json(json!({ "user": user })))
}

/// `GET /user/csrf`
pub async fn csrf(CsrfToken(token): CsrfToken) -> Json<Value> {
    Json(json!({ "csrf_token": token }))
}

/// Unknown routes.
pub async fn not_found() -> AppError {
    AppError::NotFound
}
