use crate::server::{cache::PageCache, json::Json, media::MediaStore};
use axum::{
    Router,
    extract::{
        FromRef,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, warn};
use yatube_common::model::{
    Id, comment::CommentMarker, group::GroupMarker, post::PostMarker,
};
use yatube_db::client::{DbClient, DbError};

mod api;
pub mod auth;
pub mod cache;
mod json;
pub mod media;
mod pages;
#[cfg(test)]
mod testing;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub db_client: Arc<DbClient>,
    pub page_cache: PageCache,
    pub media: Arc<MediaStore>,
    /// How long a login session stays valid.
    pub session_lifetime: time::Duration,
}

/// The whole application: HTML pages, the JSON API under `/api/v1` and uploaded media.
pub fn app(state: ServerState) -> Router {
    let media = ServeDir::new(state.media.root());
    let media_url = state.media.url_prefix().to_owned();

    pages::routes()
        .nest("/api/v1", api::routes())
        .nest_service(&media_url, media)
        .fallback(pages::fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

/// Errors of the JSON API.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Query string rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("Provided token was invalid")]
    InvalidToken,
    #[error("Unable to log in with the provided credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Auth(#[from] auth::AuthError),
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Post with id {0} was not found")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("Comment with id {0} was not found")]
    CommentByIdNotFound(Id<CommentMarker>),
    #[error("Group with id {0} was not found")]
    GroupByIdNotFound(Id<GroupMarker>),
    #[error("User with username {0:?} does not exist")]
    UsernameNotFound(String),
    #[error("You do not have permission to modify this content")]
    NotAuthor,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::CommentByIdNotFound(_)
            | ServerError::GroupByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(_) | ServerError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::NotAuthor => StatusCode::FORBIDDEN,
            ServerError::JsonRejection(_)
            | ServerError::QueryRejection(_)
            | ServerError::InvalidCredentials
            | ServerError::UsernameNotFound(_)
            | ServerError::Database(
                DbError::SelfFollow | DbError::DuplicateFollow | DbError::MissingReference,
            ) => StatusCode::BAD_REQUEST,
            ServerError::JsonResponse(_) | ServerError::Auth(_) | ServerError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        let detail = if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
            "Internal server error".to_owned()
        } else {
            warn!(error = %self, %status, "Replying with error");
            self.to_string()
        };

        let error_response = ErrorResponse {
            status: status.as_u16(),
            detail,
        };
        (status, Json(error_response)).into_response()
    }
}
