use crate::server::{ServerError, ServerRouter};
use axum::extract::{FromRequestParts, Query as AxumQuery, Request};

mod comments;
mod follow;
mod groups;
mod posts;
mod token;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(token::routes())
        .merge(posts::routes())
        .merge(comments::routes())
        .merge(groups::routes())
        .merge(follow::routes())
        .fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

/// `axum::extract::Query` with rejections reported as [`ServerError`].
#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(AxumQuery), rejection(ServerError))]
pub struct Query<T>(pub T);

/// Lets `PATCH` bodies tell an explicit `null` apart from a missing field.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}
