use crate::server::{
    ServerRouter,
    auth::{CurrentUser, LoginRequired},
    cache::PageCache,
    media::MediaStore,
    pages::{
        PageError, Result,
        forms::{CommentForm, Form, PageQuery, PostForm, Query},
        render,
        templates::{
            CommentView, GroupOption, GroupTemplate, IndexTemplate, Layout, PostCard,
            PostDetailTemplate, PostFormTemplate, PostListTemplate, ProfileTemplate, post_url,
            profile_url,
        },
    },
};
use askama::Template;
use axum::{
    extract::{Multipart, State, multipart::MultipartRejection},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use yatube_common::{
    model::{
        Id, Text,
        post::{Post, PostContent, PostMarker},
        user::User,
    },
    pagination::Page,
};
use yatube_db::{PostFilter, client::DbClient};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(index)
        .typed_get(group_posts)
        .typed_get(profile)
        .typed_get(post_detail)
        .typed_get(post_create_form)
        .typed_post(post_create)
        .typed_get(post_edit_form)
        .typed_post(post_edit)
        .typed_post(add_comment)
}

pub(super) fn render_listing(
    page: &Page<Post>,
    media: &MediaStore,
    show_group: bool,
) -> Result<String> {
    Ok(PostListTemplate::new(page, media, show_group)?.render()?)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/", rejection(PageError))]
struct IndexPath();

async fn index(
    IndexPath(): IndexPath,
    CurrentUser(user): CurrentUser,
    State(db): State<Arc<DbClient>>,
    State(media): State<Arc<MediaStore>>,
    State(cache): State<PageCache>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Html<String>> {
    let key = page.clone().unwrap_or_default();

    let listing = if let Some(listing) = cache.get(&key).await {
        listing
    } else {
        let posts = db.fetch_post_page(PostFilter::All, page.as_deref()).await?;
        let listing: Arc<str> = render_listing(&posts, &media, true)?.into();
        cache.insert(key, Arc::clone(&listing)).await;
        listing
    };

    render(&IndexTemplate {
        layout: Layout::new(user),
        listing: &listing,
    })
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/group/{slug}/", rejection(PageError))]
struct GroupPath {
    slug: String,
}

async fn group_posts(
    GroupPath { slug }: GroupPath,
    CurrentUser(user): CurrentUser,
    State(db): State<Arc<DbClient>>,
    State(media): State<Arc<MediaStore>>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Html<String>> {
    let group = db
        .fetch_group_by_slug(&slug)
        .await?
        .ok_or(PageError::GroupNotFound(slug))?;

    let posts = db
        .fetch_post_page(PostFilter::Group(group.id), page.as_deref())
        .await?;

    render(&GroupTemplate {
        layout: Layout::new(user),
        group: &group,
        listing: &render_listing(&posts, &media, false)?,
    })
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/profile/{username}/", rejection(PageError))]
struct ProfilePath {
    username: String,
}

async fn profile(
    ProfilePath { username }: ProfilePath,
    CurrentUser(user): CurrentUser,
    State(db): State<Arc<DbClient>>,
    State(media): State<Arc<MediaStore>>,
    Query(PageQuery { page }): Query<PageQuery>,
) -> Result<Html<String>> {
    let author = db
        .fetch_user_by_username(&username)
        .await?
        .ok_or(PageError::UserNotFound(username))?;

    let posts = db
        .fetch_post_page(PostFilter::Author(author.id), page.as_deref())
        .await?;

    let own_profile = user.as_ref().is_some_and(|user| user.id == author.id);
    let following = match &user {
        Some(user) if !own_profile => db.is_following(user.id, author.id).await?,
        _ => false,
    };

    render(&ProfileTemplate {
        author_url: profile_url(author.username.get()),
        author: &author,
        post_count: posts.count,
        following,
        own_profile,
        listing: &render_listing(&posts, &media, true)?,
        layout: Layout::new(user),
    })
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/", rejection(PageError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn post_detail(
    PostPath { id }: PostPath,
    CurrentUser(user): CurrentUser,
    State(db): State<Arc<DbClient>>,
    State(media): State<Arc<MediaStore>>,
) -> Result<Html<String>> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(PageError::PostNotFound(id))?;

    let author_post_count = db.count_posts(PostFilter::Author(post.author.id)).await?;
    let comments = db
        .fetch_comments(id)
        .await?
        .iter()
        .map(CommentView::new)
        .collect::<Result<_, _>>()?;

    render(&PostDetailTemplate {
        can_edit: is_author(user.as_ref(), &post),
        post: PostCard::new(&post, &media)?,
        author_post_count,
        comments,
        layout: Layout::new(user),
    })
}

fn is_author(user: Option<&User>, post: &Post) -> bool {
    user.is_some_and(|user| user.id == post.author.id)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/create/", rejection(PageError))]
struct CreatePostPath();

async fn post_create_form(
    CreatePostPath(): CreatePostPath,
    LoginRequired(user): LoginRequired,
    State(db): State<Arc<DbClient>>,
) -> Result<Html<String>> {
    let groups = db.fetch_groups().await?;

    render(&PostFormTemplate {
        layout: Layout::new(Some(user)),
        is_edit: false,
        action: "/create/".to_owned(),
        text: String::new(),
        groups: GroupOption::list(&groups, ""),
        errors: Vec::new(),
    })
}

async fn post_create(
    CreatePostPath(): CreatePostPath,
    LoginRequired(user): LoginRequired,
    State(db): State<Arc<DbClient>>,
    State(media): State<Arc<MediaStore>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response> {
    let form = PostForm::read(multipart?).await?;

    match form.validate(&db, &media).await? {
        Ok(content) => {
            let post = match db.create_post(&content, user.id).await {
                Ok(post) => post,
                Err(err) => {
                    discard_upload(&media, &content).await;
                    return Err(err.into());
                }
            };
            info!(post = %post.id, author = %user.username, "Post created");

            Ok(Redirect::to(&profile_url(user.username.get())).into_response())
        }
        Err(errors) => {
            let groups = db.fetch_groups().await?;

            Ok(render(&PostFormTemplate {
                layout: Layout::new(Some(user)),
                is_edit: false,
                action: "/create/".to_owned(),
                groups: GroupOption::list(&groups, &form.group),
                text: form.text,
                errors,
            })?
            .into_response())
        }
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/edit/", rejection(PageError))]
struct EditPostPath {
    id: Id<PostMarker>,
}

async fn post_edit_form(
    EditPostPath { id }: EditPostPath,
    LoginRequired(user): LoginRequired,
    State(db): State<Arc<DbClient>>,
) -> Result<Response> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(PageError::PostNotFound(id))?;

    if !is_author(Some(&user), &post) {
        return Ok(Redirect::to(&post_url(id)).into_response());
    }

    let groups = db.fetch_groups().await?;
    let selected = post
        .group
        .as_ref()
        .map(|group| group.id.to_string())
        .unwrap_or_default();

    Ok(render(&PostFormTemplate {
        layout: Layout::new(Some(user)),
        is_edit: true,
        action: format!("{}edit/", post_url(id)),
        text: post.text.into_inner(),
        groups: GroupOption::list(&groups, &selected),
        errors: Vec::new(),
    })?
    .into_response())
}

async fn post_edit(
    EditPostPath { id }: EditPostPath,
    LoginRequired(user): LoginRequired,
    State(db): State<Arc<DbClient>>,
    State(media): State<Arc<MediaStore>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Redirect> {
    let post = db
        .fetch_post(id)
        .await?
        .ok_or(PageError::PostNotFound(id))?;

    if is_author(Some(&user), &post) {
        let form = PostForm::read(multipart?).await?;

        if let Ok(content) = form.validate(&db, &media).await? {
            match db.update_post(id, &content).await {
                Ok(true) => info!(post = %id, "Post updated"),
                Ok(false) => discard_upload(&media, &content).await,
                Err(err) => {
                    discard_upload(&media, &content).await;
                    return Err(err.into());
                }
            }
        }
    }

    Ok(Redirect::to(&post_url(id)))
}

/// Drops a freshly stored image whose post was never saved.
async fn discard_upload(media: &MediaStore, content: &PostContent) {
    if let Some(image) = &content.image {
        media.delete(image).await;
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comment/", rejection(PageError))]
struct CommentPath {
    id: Id<PostMarker>,
}

async fn add_comment(
    CommentPath { id }: CommentPath,
    LoginRequired(user): LoginRequired,
    State(db): State<Arc<DbClient>>,
    Form(form): Form<CommentForm>,
) -> Result<Redirect> {
    if db.fetch_post(id).await?.is_none() {
        return Err(PageError::PostNotFound(id));
    }

    if let Ok(text) = Text::new(form.text) {
        db.create_comment(id, user.id, &text).await?;
    }

    Ok(Redirect::to(&post_url(id)))
}

#[cfg(test)]
mod tests {
    use crate::server::{
        media::tests::SMALL_GIF,
        pages::posts::discard_upload,
        testing::{TestApp, body_text, location},
    };
    use axum::http::StatusCode;
    use yatube_common::model::{
        Id, Text,
        post::{PostContent, PostMarker},
    };
    use yatube_db::PostFilter;

    #[tokio::test]
    async fn unsaved_upload_is_discarded() {
        let app = TestApp::new().await;
        let stored = app
            .state
            .media
            .save_post_image(Some("small.gif"), SMALL_GIF)
            .await
            .unwrap();
        assert!(app.media_root.path().join(&stored).exists());

        let content = PostContent {
            text: Text::new("Never saved".to_owned()).unwrap(),
            group: None,
            image: Some(stored.clone()),
        };
        discard_upload(&app.state.media, &content).await;
        assert!(!app.media_root.path().join(&stored).exists());
    }

    #[tokio::test]
    async fn index_pages_hold_ten_newest_posts() {
        let app = TestApp::new().await;
        let author = app.create_user("leo").await;
        for i in 0..13 {
            app.create_post(&author, &format!("Entry-{i:02}"), None).await;
        }

        let first = body_text(app.get("/", None).await).await;
        assert_eq!(first.matches("<article>").count(), 10);
        assert!(first.contains("Entry-12"));
        assert!(first.contains("Entry-03"));
        assert!(!first.contains("Entry-02"));
        let newest = first.find("Entry-12").unwrap();
        let older = first.find("Entry-11").unwrap();
        assert!(newest < older);

        let second = body_text(app.get("/?page=2", None).await).await;
        assert_eq!(second.matches("<article>").count(), 3);
        assert!(second.contains("Entry-00"));

        let clamped = body_text(app.get("/?page=99", None).await).await;
        assert_eq!(clamped.matches("<article>").count(), 3);
    }

    #[tokio::test]
    async fn index_is_cached_until_cleared() {
        let app = TestApp::new().await;
        let author = app.create_user("leo").await;
        let post = app.create_post(&author, "Cached words", None).await;

        assert!(body_text(app.get("/", None).await).await.contains("Cached words"));

        app.db().delete_post(post.id).await.unwrap();
        assert!(body_text(app.get("/", None).await).await.contains("Cached words"));

        app.state.page_cache.clear();
        assert!(!body_text(app.get("/", None).await).await.contains("Cached words"));
    }

    #[tokio::test]
    async fn guests_are_sent_to_login_instead_of_posting() {
        let app = TestApp::new().await;

        let response = app
            .post_multipart("/create/", None, &[("text", "Guest text")], None)
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/auth/login/?next=/create/");
        assert_eq!(app.db().count_posts(PostFilter::All).await.unwrap(), 0);

        let response = app.get("/create/", None).await;
        assert_eq!(location(&response), "/auth/login/?next=/create/");
    }

    #[tokio::test]
    async fn created_post_with_image_is_shown() {
        let app = TestApp::new().await;
        let author = app.create_user("leo").await;
        let session = app.session(&author).await;
        let group = app.create_group("Cats", "cats").await;
        let group_id = group.id.to_string();

        let response = app
            .post_multipart(
                "/create/",
                Some(&session),
                &[("text", "Post with a picture"), ("group", &group_id)],
                Some(("small.gif", SMALL_GIF)),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/profile/leo/");

        let posts = app.db().fetch_posts(PostFilter::All, None, 0).await.unwrap();
        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.image.as_deref(), Some("posts/small.gif"));
        assert_eq!(post.group.as_ref().map(|group| group.id), Some(group.id));
        assert!(app.media_root.path().join("posts/small.gif").exists());

        let detail = body_text(app.get(&format!("/posts/{}/", post.id), None).await).await;
        assert!(detail.contains("Post with a picture"));
        assert!(detail.contains(r#"src="/media/posts/small.gif""#));

        for page in ["/", "/group/cats/", "/profile/leo/"] {
            let body = body_text(app.get(page, None).await).await;
            assert!(body.contains("/media/posts/small.gif"), "{page}");
        }

        let image = app.get("/media/posts/small.gif", None).await;
        assert_eq!(image.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_post_form_is_shown_again() {
        let app = TestApp::new().await;
        let author = app.create_user("leo").await;
        let session = app.session(&author).await;

        let response = app
            .post_multipart("/create/", Some(&session), &[("text", "   ")], None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("this field is required"));

        let response = app
            .post_multipart(
                "/create/",
                Some(&session),
                &[("text", "Text")],
                Some(("notes.txt", b"plain text")),
            )
            .await;
        assert!(body_text(response).await.contains("upload a valid image"));

        let response = app
            .post_multipart("/create/", Some(&session), &[("text", "Text"), ("group", "42")], None)
            .await;
        assert!(body_text(response).await.contains("select a valid choice"));

        assert_eq!(app.db().count_posts(PostFilter::All).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn only_the_author_can_edit() {
        let app = TestApp::new().await;
        let author = app.create_user("leo").await;
        let other = app.create_user("anna").await;
        let post = app.create_post(&author, "Original", None).await;
        let edit_url = format!("/posts/{}/edit/", post.id);
        let detail_url = format!("/posts/{}/", post.id);

        let other_session = app.session(&other).await;
        let response = app.get(&edit_url, Some(&other_session)).await;
        assert_eq!(location(&response), detail_url);
        let response = app
            .post_multipart(&edit_url, Some(&other_session), &[("text", "Hijacked")], None)
            .await;
        assert_eq!(location(&response), detail_url);
        let unchanged = app.db().fetch_post(post.id).await.unwrap().unwrap();
        assert_eq!(unchanged.text.get(), "Original");

        let session = app.session(&author).await;
        let form = body_text(app.get(&edit_url, Some(&session)).await).await;
        assert!(form.contains("Original"));
        let response = app
            .post_multipart(&edit_url, Some(&session), &[("text", "Edited")], None)
            .await;
        assert_eq!(location(&response), detail_url);
        let edited = app.db().fetch_post(post.id).await.unwrap().unwrap();
        assert_eq!(edited.text.get(), "Edited");
    }

    #[tokio::test]
    async fn comments_need_a_login() {
        let app = TestApp::new().await;
        let author = app.create_user("leo").await;
        let post = app.create_post(&author, "Commentable", None).await;
        let comment_url = format!("/posts/{}/comment/", post.id);

        let response = app.post_form(&comment_url, None, "text=From+a+guest").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(app.db().fetch_comments(post.id).await.unwrap().is_empty());

        let session = app.session(&author).await;
        let response = app
            .post_form(&comment_url, Some(&session), "text=Nice+post")
            .await;
        assert_eq!(location(&response), format!("/posts/{}/", post.id));

        let detail = body_text(app.get(&format!("/posts/{}/", post.id), None).await).await;
        assert!(detail.contains("Nice post"));
    }

    #[tokio::test]
    async fn listings_are_filtered() {
        let app = TestApp::new().await;
        let leo = app.create_user("leo").await;
        let anna = app.create_user("anna").await;
        let cats = app.create_group("Cats", "cats").await;
        let dogs = app.create_group("Dogs", "dogs").await;
        app.create_post(&leo, "About cats", Some(&cats)).await;
        app.create_post(&anna, "About dogs", Some(&dogs)).await;

        let cats_page = body_text(app.get("/group/cats/", None).await).await;
        assert!(cats_page.contains("About cats"));
        assert!(!cats_page.contains("About dogs"));

        let profile = body_text(app.get("/profile/anna/", None).await).await;
        assert!(profile.contains("About dogs"));
        assert!(!profile.contains("About cats"));
        assert!(profile.contains("Posts: 1"));
    }

    #[tokio::test]
    async fn missing_things_are_not_found() {
        let app = TestApp::new().await;
        let missing: Id<PostMarker> = Id::new(404);

        for uri in [
            "/unexisting_page/".to_owned(),
            "/group/nothing/".to_owned(),
            "/profile/nobody/".to_owned(),
            format!("/posts/{missing}/"),
            "/posts/not-a-number/".to_owned(),
        ] {
            let response = app.get(&uri, None).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
            assert!(body_text(response).await.contains("Page not found"));
        }
    }

    #[tokio::test]
    async fn cross_site_posts_are_forbidden() {
        let app = TestApp::new().await;
        let author = app.create_user("leo").await;
        let post = app.create_post(&author, "Target", None).await;
        let session = app.session(&author).await;

        let request = axum::http::Request::post(format!("/posts/{}/comment/", post.id))
            .header(axum::http::header::HOST, "yatube.test")
            .header(axum::http::header::ORIGIN, "https://evil.test")
            .header(axum::http::header::COOKIE, session)
            .header(
                axum::http::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(axum::body::Body::from("text=spam"))
            .unwrap();
        let response = app.send(request).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(app.db().fetch_comments(post.id).await.unwrap().is_empty());
    }
}
