use crate::server::{
    ServerRouter,
    auth::{
        AuthError, CurrentUser, SESSION_COOKIE, check_credentials, issue_token, revoke_token,
        safe_next,
    },
    pages::{
        PageError, Result,
        forms::{Form, Query},
        render,
        templates::{Layout, LoggedOutTemplate, LoginTemplate, SignupTemplate},
    },
};
use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::{
    extract::{
        CookieJar,
        cookie::{Cookie, SameSite},
    },
    routing::{RouterExt, TypedPath},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use yatube_common::model::{
    auth::hash_password,
    user::{InvalidUsernameError, USERNAME_MAX_LEN, User, Username},
};
use yatube_db::client::{DbClient, DbError};

const PASSWORD_MIN_LEN: usize = 8;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(signup_form)
        .typed_post(signup)
        .typed_get(login_form)
        .typed_post(login)
        .typed_get(logout)
        .typed_post(logout)
}

/// Starts a session for `user` and redirects to `next`.
async fn start_session(
    db: &DbClient,
    jar: CookieJar,
    user: &User,
    lifetime: time::Duration,
    next: &str,
) -> Result<(CookieJar, Redirect)> {
    let token = issue_token(db, user.id, Some(lifetime)).await?;

    let cookie = Cookie::build((SESSION_COOKIE, token.as_token_str()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(lifetime);

    info!(user = %user.username, "Logged in");
    Ok((jar.add(cookie), Redirect::to(next)))
}

fn password_errors(password1: &str, password2: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if password1 != password2 {
        errors.push("The two password fields didn't match.".to_owned());
    }
    if password1.chars().count() < PASSWORD_MIN_LEN {
        errors.push(format!(
            "This password is too short. It must contain at least {PASSWORD_MIN_LEN} characters."
        ));
    }
    if !password1.is_empty() && password1.chars().all(|c| c.is_ascii_digit()) {
        errors.push("This password is entirely numeric.".to_owned());
    }

    errors
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/signup/", rejection(PageError))]
struct SignupPath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(default)]
struct SignupForm {
    username: String,
    password1: String,
    password2: String,
}

async fn signup_form(
    SignupPath(): SignupPath,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>> {
    render(&SignupTemplate {
        layout: Layout::new(user),
        username: String::new(),
        errors: Vec::new(),
    })
}

async fn signup(
    SignupPath(): SignupPath,
    State(db): State<Arc<DbClient>>,
    State(session_lifetime): State<time::Duration>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response> {
    let mut errors = password_errors(&form.password1, &form.password2);

    let username = match Username::new_for_signup(form.username.clone()) {
        Ok(username) => Some(username),
        Err(err) => {
            errors.push(match err {
                InvalidUsernameError::Empty => "Username: this field is required.".to_owned(),
                InvalidUsernameError::TooLong(_) => {
                    format!("Username: at most {USERNAME_MAX_LEN} characters.")
                }
                InvalidUsernameError::ForbiddenCharacter(_) => {
                    "Username: only letters, digits and @/./+/-/_ are allowed.".to_owned()
                }
            });
            None
        }
    };

    let user = match username {
        Some(username) if errors.is_empty() => {
            let password_hash = hash_password(&form.password1).map_err(AuthError::from)?;
            match db.create_user(&username, &password_hash).await {
                Ok(user) => Some(user),
                Err(DbError::DuplicateUsername(_)) => {
                    errors.push("A user with that username already exists.".to_owned());
                    None
                }
                Err(err) => return Err(err.into()),
            }
        }
        _ => None,
    };

    match user {
        Some(user) => {
            info!(user = %user.username, "Signed up");
            Ok(start_session(&db, jar, &user, session_lifetime, "/")
                .await?
                .into_response())
        }
        None => Ok(render(&SignupTemplate {
            layout: Layout::new(None),
            username: form.username,
            errors,
        })?
        .into_response()),
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/login/", rejection(PageError))]
struct LoginPath();

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct NextQuery {
    next: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(default)]
struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

async fn login_form(
    LoginPath(): LoginPath,
    CurrentUser(user): CurrentUser,
    Query(NextQuery { next }): Query<NextQuery>,
) -> Result<Html<String>> {
    render(&LoginTemplate {
        layout: Layout::new(user),
        username: String::new(),
        next: next.unwrap_or_default(),
        failed: false,
    })
}

async fn login(
    LoginPath(): LoginPath,
    State(db): State<Arc<DbClient>>,
    State(session_lifetime): State<time::Duration>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    match check_credentials(&db, &form.username, &form.password).await? {
        Some(user) => {
            let next = safe_next(form.next.as_deref().filter(|next| !next.is_empty()));
            Ok(start_session(&db, jar, &user, session_lifetime, next)
                .await?
                .into_response())
        }
        None => Ok(render(&LoginTemplate {
            layout: Layout::new(None),
            username: form.username,
            next: form.next.unwrap_or_default(),
            failed: true,
        })?
        .into_response()),
    }
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/auth/logout/", rejection(PageError))]
struct LogoutPath();

async fn logout(
    LogoutPath(): LogoutPath,
    State(db): State<Arc<DbClient>>,
    jar: CookieJar,
) -> Result<(CookieJar, Html<String>)> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        revoke_token(&db, cookie.value()).await?;
        info!("Logged out");
    }

    let page = render(&LoggedOutTemplate {
        layout: Layout::new(None),
    })?;

    Ok((jar.remove(Cookie::build(SESSION_COOKIE).path("/")), page))
}
