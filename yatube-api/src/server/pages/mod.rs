use crate::server::{
    ServerRouter,
    auth::{AuthError, login_url},
    media::MediaError,
    pages::templates::{
        BadRequestTemplate, ForbiddenTemplate, Layout, NotFoundTemplate, ServerErrorTemplate,
    },
};
use askama::Template;
use axum::{
    extract::{
        DefaultBodyLimit, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::{FormRejection, PathRejection, QueryRejection},
    },
    http::{
        HeaderMap, StatusCode, Uri,
        header::{HOST, ORIGIN},
    },
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::{error, warn};
use yatube_common::model::{Id, post::PostMarker};
use yatube_db::client::DbError;

mod about;
mod account;
mod follow;
mod forms;
mod posts;
pub mod templates;

/// Upper bound for request bodies, multipart uploads included.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(posts::routes())
        .merge(follow::routes())
        .merge(about::routes())
        .merge(account::routes())
        .route_layer(middleware::from_fn(same_origin_writes))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

pub async fn fallback(request: Request) -> PageError {
    PageError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = PageError> = std::result::Result<T, E>;

pub fn render(template: &impl Template) -> Result<Html<String>> {
    Ok(Html(template.render()?))
}

/// Rejects form submissions whose `Origin` does not match the `Host` they were sent to.
async fn same_origin_writes(request: Request, next: Next) -> Result<Response> {
    if !request.method().is_safe() && !is_same_origin(request.headers()) {
        return Err(PageError::CrossOrigin);
    }

    Ok(next.run(request).await)
}

fn is_same_origin(headers: &HeaderMap) -> bool {
    let Some(origin) = headers.get(ORIGIN) else {
        return true;
    };

    match (origin.to_str(), headers.get(HOST).map(|host| host.to_str())) {
        (Ok(origin), Some(Ok(host))) => origin
            .split_once("://")
            .is_some_and(|(_, authority)| authority == host),
        _ => false,
    }
}

/// Errors of the HTML pages, rendered with the error templates.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Form rejected: {0}")]
    FormRejection(#[from] FormRejection),
    #[error("Multipart body rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Reading multipart body failed: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Post with id {0} was not found")]
    PostNotFound(Id<PostMarker>),
    #[error("Group with slug {0:?} was not found")]
    GroupNotFound(String),
    #[error("User {0:?} was not found")]
    UserNotFound(String),
    #[error("Login required to access {0}")]
    LoginRequired(String),
    #[error("Cross-origin form submission")]
    CrossOrigin,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("Formatting a date failed: {0}")]
    DateFormat(#[from] time::error::Format),
    #[error("Rendering a template failed: {0}")]
    Template(#[from] askama::Error),
}

impl PageError {
    pub fn status(&self) -> StatusCode {
        match self {
            PageError::UnknownRoute(_)
            | PageError::PathRejection(_)
            | PageError::PostNotFound(_)
            | PageError::GroupNotFound(_)
            | PageError::UserNotFound(_) => StatusCode::NOT_FOUND,
            PageError::QueryRejection(_)
            | PageError::FormRejection(_)
            | PageError::MultipartRejection(_)
            | PageError::Multipart(_) => StatusCode::BAD_REQUEST,
            PageError::LoginRequired(_) => StatusCode::SEE_OTHER,
            PageError::CrossOrigin => StatusCode::FORBIDDEN,
            PageError::Auth(_)
            | PageError::Database(_)
            | PageError::Media(_)
            | PageError::DateFormat(_)
            | PageError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn render_page(&self) -> askama::Result<String> {
        let layout = Layout::new(None);

        match self.status() {
            StatusCode::NOT_FOUND => {
                let path = match self {
                    PageError::UnknownRoute(uri) => uri.path().to_owned(),
                    _ => String::new(),
                };
                NotFoundTemplate { layout, path }.render()
            }
            StatusCode::FORBIDDEN => ForbiddenTemplate { layout }.render(),
            StatusCode::BAD_REQUEST => BadRequestTemplate { layout }.render(),
            _ => ServerErrorTemplate { layout }.render(),
        }
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        if let PageError::LoginRequired(next) = &self {
            return Redirect::to(&login_url(next)).into_response();
        }

        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error page");
        } else {
            warn!(error = %self, %status, "Replying with error page");
        }

        match self.render_page() {
            Ok(page) => (status, Html(page)).into_response(),
            Err(err) => {
                error!(%err, "Rendering the error page failed");
                status.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::server::pages::is_same_origin;
    use axum::http::{
        HeaderMap, HeaderValue,
        header::{HOST, ORIGIN},
    };

    fn headers(origin: Option<&'static str>, host: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static(host));
        if let Some(origin) = origin {
            headers.insert(ORIGIN, HeaderValue::from_static(origin));
        }
        headers
    }

    #[test]
    fn origin_check() {
        assert!(is_same_origin(&headers(None, "yatube.test")));
        assert!(is_same_origin(&headers(Some("https://yatube.test"), "yatube.test")));
        assert!(is_same_origin(&headers(
            Some("http://localhost:8000"),
            "localhost:8000"
        )));
        assert!(!is_same_origin(&headers(Some("https://evil.test"), "yatube.test")));
        assert!(!is_same_origin(&headers(Some("null"), "yatube.test")));
    }
}
