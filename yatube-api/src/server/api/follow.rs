use crate::server::{
    Result, ServerError, ServerRouter, api::Query, auth::AuthenticatedUser, json::Json,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use yatube_common::model::follow::Follow;
use yatube_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_follows)
        .typed_post(create_follow)
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct FollowResponse {
    user: String,
    following: String,
}

impl From<Follow> for FollowResponse {
    fn from(follow: Follow) -> Self {
        Self {
            user: follow.user.username.into_inner(),
            following: follow.author.username.into_inner(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct FollowQuery {
    search: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct FollowInput {
    following: String,
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/follow/", rejection(ServerError))]
struct FollowPath();

async fn list_follows(
    FollowPath(): FollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Query(FollowQuery { search }): Query<FollowQuery>,
) -> Result<Json<Vec<FollowResponse>>> {
    let search = search.as_deref().filter(|search| !search.is_empty());
    let follows = db.fetch_follows(user.user_id(), search).await?;

    Ok(Json(follows.into_iter().map(FollowResponse::from).collect()))
}

async fn create_follow(
    FollowPath(): FollowPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(input): Json<FollowInput>,
) -> Result<(StatusCode, Json<FollowResponse>)> {
    let author = db
        .fetch_user_by_username(&input.following)
        .await?
        .ok_or(ServerError::UsernameNotFound(input.following))?;

    db.follow(user.user_id(), author.id).await?;
    info!(user = %user.user.username, author = %author.username, "Followed author through the API");

    let follow = Follow {
        user: user.user,
        author,
    };
    Ok((StatusCode::CREATED, Json(follow.into())))
}
