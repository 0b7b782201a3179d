use crate::server::{Result, ServerError, ServerRouter, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use yatube_common::model::{
    Id,
    group::{Group, GroupMarker},
};
use yatube_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(list_groups).typed_get(get_group)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/groups/", rejection(ServerError))]
struct GroupsPath();

async fn list_groups(
    GroupsPath(): GroupsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<Group>>> {
    Ok(Json(db.fetch_groups().await?))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/groups/{id}/", rejection(ServerError))]
struct GroupPath {
    id: Id<GroupMarker>,
}

async fn get_group(
    GroupPath { id }: GroupPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Group>> {
    let group = db
        .fetch_group(id)
        .await?
        .ok_or(ServerError::GroupByIdNotFound(id))?;

    Ok(Json(group))
}
