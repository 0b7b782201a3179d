use crate::server::{
    Result, ServerError, ServerRouter,
    api::{Query, double_option},
    auth::AuthenticatedUser,
    json::Json,
    media::MediaStore,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::info;
use yatube_common::model::{
    Id, Text,
    group::GroupMarker,
    post::{Post, PostContent, PostMarker},
    user::UserMarker,
};
use yatube_db::{PostFilter, client::DbClient};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_put(replace_post)
        .typed_patch(update_post)
        .typed_delete(delete_post)
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct PostResponse {
    id: Id<PostMarker>,
    author: String,
    text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub_date: OffsetDateTime,
    image: Option<String>,
    group: Option<Id<GroupMarker>>,
}

impl PostResponse {
    fn new(post: Post, media: &MediaStore) -> Self {
        Self {
            id: post.id,
            author: post.author.username.into_inner(),
            text: post.text.into_inner(),
            pub_date: post.pub_date,
            image: post.image.as_deref().map(|image| media.url(image)),
            group: post.group.map(|group| group.id),
        }
    }
}

/// Either a plain list or, when `limit` was given, a limit/offset page.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
#[serde(untagged)]
enum PostList {
    Plain(Vec<PostResponse>),
    Paginated {
        count: u64,
        next: Option<String>,
        previous: Option<String>,
        results: Vec<PostResponse>,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct ListQuery {
    limit: Option<u32>,
    offset: Option<u64>,
}

fn list_url(limit: u32, offset: u64) -> String {
    if offset == 0 {
        format!("/api/v1/posts/?limit={limit}")
    } else {
        format!("/api/v1/posts/?limit={limit}&offset={offset}")
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/", rejection(ServerError))]
struct PostsPath();

async fn list_posts(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    State(media): State<Arc<MediaStore>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PostList>> {
    let into_responses = |posts: Vec<Post>| -> Vec<PostResponse> {
        posts
            .into_iter()
            .map(|post| PostResponse::new(post, &media))
            .collect()
    };

    let Some(limit) = query.limit.filter(|limit| *limit > 0) else {
        let posts = db.fetch_posts(PostFilter::All, None, 0).await?;
        return Ok(Json(PostList::Plain(into_responses(posts))));
    };

    let offset = query.offset.unwrap_or(0);
    let count = db.count_posts(PostFilter::All).await?;
    let posts = db.fetch_posts(PostFilter::All, Some(limit), offset).await?;

    let step = u64::from(limit);
    let next = offset
        .checked_add(step)
        .filter(|next| *next < count)
        .map(|next| list_url(limit, next));
    let previous = (offset > 0).then(|| list_url(limit, offset.saturating_sub(step)));

    Ok(Json(PostList::Paginated {
        count,
        next,
        previous,
        results: into_responses(posts),
    }))
}

#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
struct PostInput {
    text: Text,
    #[serde(default)]
    group: Option<Id<GroupMarker>>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct PostPatch {
    #[serde(default)]
    text: Option<Text>,
    #[serde(default, deserialize_with = "double_option")]
    group: Option<Option<Id<GroupMarker>>>,
}

async fn create_post(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    State(media): State<Arc<MediaStore>>,
    user: AuthenticatedUser,
    Json(input): Json<PostInput>,
) -> Result<(StatusCode, Json<PostResponse>)> {
    let content = PostContent {
        text: input.text,
        group: input.group,
        image: None,
    };
    let post = db.create_post(&content, user.user_id()).await?;
    info!(post = %post.id, author = %user.user.username, "Post created through the API");

    Ok((StatusCode::CREATED, Json(PostResponse::new(post, &media))))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    State(media): State<Arc<MediaStore>>,
) -> Result<Json<PostResponse>> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(PostResponse::new(post, &media)))
}

/// Fetches a post that `user` is allowed to modify.
async fn fetch_own_post(db: &DbClient, id: Id<PostMarker>, user: Id<UserMarker>) -> Result<Post> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    if post.author.id == user {
        Ok(post)
    } else {
        Err(ServerError::NotAuthor)
    }
}

async fn store_update(
    db: &DbClient,
    media: &MediaStore,
    id: Id<PostMarker>,
    content: &PostContent,
) -> Result<Json<PostResponse>> {
    db.update_post(id, content).await?;

    let post = db
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))?;

    Ok(Json(PostResponse::new(post, media)))
}

async fn replace_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    State(media): State<Arc<MediaStore>>,
    user: AuthenticatedUser,
    Json(input): Json<PostInput>,
) -> Result<Json<PostResponse>> {
    fetch_own_post(&db, id, user.user_id()).await?;

    let content = PostContent {
        text: input.text,
        group: input.group,
        image: None,
    };
    store_update(&db, &media, id, &content).await
}

async fn update_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    State(media): State<Arc<MediaStore>>,
    user: AuthenticatedUser,
    Json(patch): Json<PostPatch>,
) -> Result<Json<PostResponse>> {
    let post = fetch_own_post(&db, id, user.user_id()).await?;

    let content = PostContent {
        text: patch.text.unwrap_or(post.text),
        group: patch
            .group
            .unwrap_or_else(|| post.group.map(|group| group.id)),
        image: None,
    };
    store_update(&db, &media, id, &content).await
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    fetch_own_post(&db, id, user.user_id()).await?;
    db.delete_post(id).await?;
    info!(post = %id, "Post deleted through the API");

    Ok(StatusCode::NO_CONTENT)
}
