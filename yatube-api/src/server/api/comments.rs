use crate::server::{
    Result, ServerError, ServerRouter, auth::AuthenticatedUser, json::Json,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use yatube_common::model::{
    Id, Text,
    comment::{Comment, CommentMarker},
    post::PostMarker,
    user::UserMarker,
};
use yatube_db::client::DbClient;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_comments)
        .typed_post(create_comment)
        .typed_get(get_comment)
        .typed_put(replace_comment)
        .typed_patch(update_comment)
        .typed_delete(delete_comment)
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
struct CommentResponse {
    id: Id<CommentMarker>,
    author: String,
    post: Id<PostMarker>,
    text: String,
    #[serde(with = "time::serde::rfc3339")]
    created: OffsetDateTime,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            author: comment.author.username.into_inner(),
            post: comment.post,
            text: comment.text.into_inner(),
            created: comment.created,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct CommentInput {
    text: Text,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct CommentPatch {
    #[serde(default)]
    text: Option<Text>,
}

async fn ensure_post_exists(db: &DbClient, post_id: Id<PostMarker>) -> Result<()> {
    match db.fetch_post(post_id).await? {
        Some(_) => Ok(()),
        None => Err(ServerError::PostByIdNotFound(post_id)),
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/comments/", rejection(ServerError))]
struct CommentsPath {
    post_id: Id<PostMarker>,
}

async fn list_comments(
    CommentsPath { post_id }: CommentsPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<Vec<CommentResponse>>> {
    ensure_post_exists(&db, post_id).await?;

    let comments = db.fetch_comments(post_id).await?;
    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}

async fn create_comment(
    CommentsPath { post_id }: CommentsPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(input): Json<CommentInput>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    ensure_post_exists(&db, post_id).await?;

    let comment = db
        .create_comment(post_id, user.user_id(), &input.text)
        .await?;

    Ok((StatusCode::CREATED, Json(comment.into())))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{post_id}/comments/{id}/", rejection(ServerError))]
struct CommentPath {
    post_id: Id<PostMarker>,
    id: Id<CommentMarker>,
}

async fn fetch_comment(
    db: &DbClient,
    post_id: Id<PostMarker>,
    id: Id<CommentMarker>,
) -> Result<Comment> {
    db.fetch_comment(post_id, id)
        .await?
        .ok_or(ServerError::CommentByIdNotFound(id))
}

async fn fetch_own_comment(
    db: &DbClient,
    post_id: Id<PostMarker>,
    id: Id<CommentMarker>,
    user: Id<UserMarker>,
) -> Result<Comment> {
    let comment = fetch_comment(db, post_id, id).await?;

    if comment.author.id == user {
        Ok(comment)
    } else {
        Err(ServerError::NotAuthor)
    }
}

async fn get_comment(
    CommentPath { post_id, id }: CommentPath,
    State(db): State<Arc<DbClient>>,
) -> Result<Json<CommentResponse>> {
    Ok(Json(fetch_comment(&db, post_id, id).await?.into()))
}

async fn store_text(
    db: &DbClient,
    post_id: Id<PostMarker>,
    id: Id<CommentMarker>,
    text: &Text,
) -> Result<Json<CommentResponse>> {
    db.update_comment(id, text).await?;
    Ok(Json(fetch_comment(db, post_id, id).await?.into()))
}

async fn replace_comment(
    CommentPath { post_id, id }: CommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(input): Json<CommentInput>,
) -> Result<Json<CommentResponse>> {
    fetch_own_comment(&db, post_id, id, user.user_id()).await?;
    store_text(&db, post_id, id, &input.text).await
}

async fn update_comment(
    CommentPath { post_id, id }: CommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
    Json(patch): Json<CommentPatch>,
) -> Result<Json<CommentResponse>> {
    let comment = fetch_own_comment(&db, post_id, id, user.user_id()).await?;
    let text = patch.text.unwrap_or(comment.text);

    store_text(&db, post_id, id, &text).await
}

async fn delete_comment(
    CommentPath { post_id, id }: CommentPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    fetch_own_comment(&db, post_id, id, user.user_id()).await?;
    db.delete_comment(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::server::testing::{TestApp, body_json};
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn comment_lifecycle() {
        let app = TestApp::new().await;
        let author = app.create_user("leo").await;
        let other = app.create_user("anna").await;
        let post = app.create_post(&author, "Commentable", None).await;
        let list_uri = format!("/api/v1/posts/{}/comments/", post.id);
        let token = app.token(&author).await;

        let response = app
            .json(Method::POST, &list_uri, None, Some(json!({ "text": "Anonymous" })))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .json(Method::POST, &list_uri, Some(&token), Some(json!({ "text": "First" })))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let comment = body_json(response).await;
        assert_eq!(comment["author"], "leo");
        assert_eq!(comment["post"], post.id.get());

        let list = body_json(app.json(Method::GET, &list_uri, None, None).await).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let comment_uri = format!("{list_uri}{}/", comment["id"]);
        let other_token = app.token(&other).await;
        let response = app
            .json(
                Method::PATCH,
                &comment_uri,
                Some(&other_token),
                Some(json!({ "text": "Mine now" })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .json(Method::PUT, &comment_uri, Some(&token), Some(json!({ "text": "Edited" })))
            .await;
        assert_eq!(body_json(response).await["text"], "Edited");

        let response = app.json(Method::DELETE, &comment_uri, Some(&token), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = app.json(Method::GET, &comment_uri, None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn comments_of_missing_posts() {
        let app = TestApp::new().await;

        let response = app
            .json(Method::GET, "/api/v1/posts/999/comments/", None, None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
