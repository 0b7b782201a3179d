use crate::server::{
    ServerRouter,
    auth::{CurrentUser, LoginRequired},
    media::MediaStore,
    pages::{
        PageError, Result,
        forms::{PageQuery, Query},
        posts::render_listing,
        render,
        templates::{FollowErrorTemplate, FollowTemplate, Layout},
    },
};
use axum::{
    extract::State,
    response::{Html, Redirect},
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use yatube_common::model::user::User;
use yatube_db::{
    PostFilter,
    client::{DbClient, DbError},
};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(follow_index)
        .typed_get(follow_error)
        .typed_get(profile_follow)
        .typed_post(profile_follow)
        .typed_get(profile_unfollow)
        .typed_post(profile_unfollow)
}

const FOLLOW_INDEX: &str = "/follow/";
const FOLLOW_ERROR: &str = "/follow/error/";

#[derive(TypedPath, Deserialize)]
#[typed_path("/follow/", rejection(PageError))]
struct FollowIndexPath();

async fn follow_index(
    FollowIndexPath(): FollowIndexPath,
    LoginRequired(user): LoginRequired,
    State(db): State<Arc<DbClient>>,
    State(media): State<Arc<MediaStore>>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Html<String>> {
    let posts = db
        .fetch_post_page(PostFilter::FollowedBy(user.id), page.as_deref())
        .await?;

    render(&FollowTemplate {
        layout: Layout::new(Some(user)),
        listing: &render_listing(&posts, &media, true)?,
    })
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/follow/error/", rejection(PageError))]
struct FollowErrorPath();

async fn follow_error(
    FollowErrorPath(): FollowErrorPath,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>> {
    render(&FollowErrorTemplate {
        layout: Layout::new(user),
    })
}

async fn fetch_author(db: &DbClient, username: String) -> Result<User> {
    db.fetch_user_by_username(&username)
        .await?
        .ok_or(PageError::UserNotFound(username))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/follow/", rejection(PageError))]
struct FollowPath {
    username: String,
}

async fn profile_follow(
    FollowPath { username }: FollowPath,
    LoginRequired(user): LoginRequired,
    State(db): State<Arc<DbClient>>,
) -> Result<Redirect> {
    let author = fetch_author(&db, username).await?;

    match db.follow(user.id, author.id).await {
        Ok(()) => {
            info!(user = %user.username, author = %author.username, "Followed author");
            Ok(Redirect::to(FOLLOW_INDEX))
        }
        Err(err @ (DbError::SelfFollow | DbError::DuplicateFollow)) => {
            debug!(%err, user = %user.username, author = %author.username, "Follow rejected");
            Ok(Redirect::to(FOLLOW_ERROR))
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/unfollow/", rejection(PageError))]
struct UnfollowPath {
    username: String,
}

async fn profile_unfollow(
    UnfollowPath { username }: UnfollowPath,
    LoginRequired(user): LoginRequired,
    State(db): State<Arc<DbClient>>,
) -> Result<Redirect> {
    let author = fetch_author(&db, username).await?;

    if db.unfollow(user.id, author.id).await? {
        info!(user = %user.username, author = %author.username, "Unfollowed author");
    }

    Ok(Redirect::to(FOLLOW_INDEX))
}

#[cfg(test)]
mod tests {
    use crate::server::testing::{TestApp, body_text, location};

    #[tokio::test]
    async fn follow_is_created_once() {
        let app = TestApp::new().await;
        let reader = app.create_user("reader").await;
        let author = app.create_user("author").await;
        let session = app.session(&reader).await;

        let response = app.get("/profile/author/follow/", Some(&session)).await;
        assert_eq!(location(&response), "/follow/");
        let response = app.get("/profile/author/follow/", Some(&session)).await;
        assert_eq!(location(&response), "/follow/error/");

        let follows = app.db().fetch_follows(reader.id, None).await.unwrap();
        assert_eq!(follows.len(), 1);
        assert_eq!(follows[0].author, author);
    }

    #[tokio::test]
    async fn self_follow_is_rejected() {
        let app = TestApp::new().await;
        let reader = app.create_user("reader").await;
        let session = app.session(&reader).await;

        let response = app.get("/profile/reader/follow/", Some(&session)).await;
        assert_eq!(location(&response), "/follow/error/");
        assert!(app.db().fetch_follows(reader.id, None).await.unwrap().is_empty());

        let error_page = body_text(app.get("/follow/error/", Some(&session)).await).await;
        assert!(error_page.contains("Subscription failed"));
    }

    #[tokio::test]
    async fn unfollow_is_idempotent() {
        let app = TestApp::new().await;
        let reader = app.create_user("reader").await;
        let author = app.create_user("author").await;
        app.db().follow(reader.id, author.id).await.unwrap();
        let session = app.session(&reader).await;

        for _ in 0..2 {
            let response = app.get("/profile/author/unfollow/", Some(&session)).await;
            assert_eq!(location(&response), "/follow/");
        }
        assert!(!app.db().is_following(reader.id, author.id).await.unwrap());
    }

    #[tokio::test]
    async fn timeline_shows_followed_authors_only() {
        let app = TestApp::new().await;
        let reader = app.create_user("reader").await;
        let loner = app.create_user("loner").await;
        let author = app.create_user("author").await;
        let stranger = app.create_user("stranger").await;
        app.create_post(&author, "Followed words", None).await;
        app.create_post(&stranger, "Stranger words", None).await;
        app.db().follow(reader.id, author.id).await.unwrap();

        let session = app.session(&reader).await;
        let timeline = body_text(app.get("/follow/", Some(&session)).await).await;
        assert!(timeline.contains("Followed words"));
        assert!(!timeline.contains("Stranger words"));

        let session = app.session(&loner).await;
        let timeline = body_text(app.get("/follow/", Some(&session)).await).await;
        assert!(!timeline.contains("Followed words"));
        assert!(timeline.contains("No posts yet."));
    }

    #[tokio::test]
    async fn profile_offers_follow_or_unfollow() {
        let app = TestApp::new().await;
        let reader = app.create_user("reader").await;
        let author = app.create_user("author").await;
        let session = app.session(&reader).await;

        let profile = body_text(app.get("/profile/author/", Some(&session)).await).await;
        assert!(profile.contains("/profile/author/follow/"));

        app.db().follow(reader.id, author.id).await.unwrap();
        let profile = body_text(app.get("/profile/author/", Some(&session)).await).await;
        assert!(profile.contains("/profile/author/unfollow/"));

        let own = body_text(app.get("/profile/reader/", Some(&session)).await).await;
        assert!(!own.contains("/profile/reader/follow/"));
    }

    #[tokio::test]
    async fn guests_cannot_follow() {
        let app = TestApp::new().await;
        app.create_user("author").await;

        let response = app.get("/profile/author/follow/", None).await;
        assert_eq!(
            location(&response),
            "/auth/login/?next=/profile/author/follow/"
        );
    }
}
