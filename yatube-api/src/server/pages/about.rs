use crate::server::{
    ServerRouter,
    auth::CurrentUser,
    pages::{
        PageError, Result, render,
        templates::{AboutAuthorTemplate, AboutTechTemplate, Layout},
    },
};
use axum::response::Html;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(author).typed_get(tech)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/about/author/", rejection(PageError))]
struct AuthorPath();

async fn author(AuthorPath(): AuthorPath, CurrentUser(user): CurrentUser) -> Result<Html<String>> {
    render(&AboutAuthorTemplate {
        layout: Layout::new(user),
    })
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/about/tech/", rejection(PageError))]
struct TechPath();

async fn tech(TechPath(): TechPath, CurrentUser(user): CurrentUser) -> Result<Html<String>> {
    render(&AboutTechTemplate {
        layout: Layout::new(user),
    })
}
