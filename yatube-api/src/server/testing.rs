//! Harness for driving the full router in tests.

use crate::server::{
    ServerState, app,
    auth::{SESSION_COOKIE, issue_token},
    cache::PageCache,
    media::MediaStore,
};
use axum::{
    body::Body,
    http::{Method, Request, header},
    response::Response,
};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tempfile::TempDir;
use tower::ServiceExt;
use yatube_common::model::{
    Text,
    auth::hash_password,
    group::{CreateGroup, Group},
    post::{Post, PostContent},
    user::{User, Username},
};
use yatube_db::client::DbClient;

pub const PASSWORD: &str = "correct horse battery";
const BOUNDARY: &str = "yatube-test-boundary";

pub struct TestApp {
    pub state: ServerState,
    pub media_root: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let media_root = tempfile::tempdir().unwrap();
        let state = ServerState {
            db_client: Arc::new(DbClient::connect_in_memory().await.unwrap()),
            page_cache: PageCache::new(Duration::from_secs(15 * 60)),
            media: Arc::new(MediaStore::new(media_root.path(), "/media")),
            session_lifetime: time::Duration::days(14),
        };

        Self { state, media_root }
    }

    pub fn db(&self) -> &DbClient {
        &self.state.db_client
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        app(self.state.clone()).oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, session: Option<&str>) -> Response {
        let mut request = Request::get(uri);
        if let Some(session) = session {
            request = request.header(header::COOKIE, session);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, session: Option<&str>, form: &str) -> Response {
        let mut request = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(session) = session {
            request = request.header(header::COOKIE, session);
        }
        self.send(request.body(Body::from(form.to_owned())).unwrap())
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        session: Option<&str>,
        fields: &[(&str, &str)],
        file: Option<(&str, &[u8])>,
    ) -> Response {
        let mut request = Request::post(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
        if let Some(session) = session {
            request = request.header(header::COOKIE, session);
        }
        let body = multipart_body(fields, file);
        self.send(request.body(Body::from(body)).unwrap()).await
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(bearer) = bearer {
            request = request.header(header::AUTHORIZATION, format!("Bearer {bearer}"));
        }
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        self.send(request.body(body).unwrap()).await
    }

    pub async fn create_user(&self, username: &str) -> User {
        let password_hash = hash_password(PASSWORD).unwrap();
        self.db()
            .create_user(&Username::new(username.to_owned()).unwrap(), &password_hash)
            .await
            .unwrap()
    }

    /// `Cookie` header value of a fresh session for `user`.
    pub async fn session(&self, user: &User) -> String {
        let token = issue_token(self.db(), user.id, Some(time::Duration::days(1)))
            .await
            .unwrap();
        format!("{SESSION_COOKIE}={}", token.as_token_str())
    }

    pub async fn token(&self, user: &User) -> String {
        issue_token(self.db(), user.id, None)
            .await
            .unwrap()
            .as_token_str()
    }

    pub async fn create_group(&self, title: &str, slug: &str) -> Group {
        let group = CreateGroup::new(title, slug, format!("About {title}")).unwrap();
        self.db().create_group(&group).await.unwrap()
    }

    pub async fn create_post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        let content = PostContent {
            text: Text::new(text.to_owned()).unwrap(),
            group: group.map(|group| group.id),
            image: None,
        };
        self.db().create_post(&content, author.id).await.unwrap()
    }
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, data)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    body
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|location| location.to_str().ok())
        .unwrap_or_default()
}
