use crate::server::{
    Result, ServerError, ServerRouter,
    auth::{check_credentials, issue_token},
    json::Json,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use yatube_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_post(obtain_token)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/api-token-auth/", rejection(ServerError))]
struct TokenPath();

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct TokenResponse {
    token: String,
}

/// Trades a username and password for a bearer token that does not expire.
async fn obtain_token(
    TokenPath(): TokenPath,
    State(db): State<Arc<DbClient>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<TokenResponse>> {
    let user = check_credentials(&db, &credentials.username, &credentials.password)
        .await?
        .ok_or(ServerError::InvalidCredentials)?;

    let token = issue_token(&db, user.id, None).await?;
    info!(user = %user.username, "Issued API token");

    Ok(Json(TokenResponse {
        token: token.as_token_str(),
    }))
}
