use crate::server::{ServerError, pages::PageError};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, uri::PathAndQuery},
};
use axum_extra::{TypedHeader, extract::CookieJar};
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use yatube_common::model::{
    Id,
    auth::{
        AuthToken, AuthTokenHashError, Authentication, PasswordHashError, verify_password,
    },
    user::{User, UserMarker},
};
use yatube_db::client::{DbClient, DbError};

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// Name of the cookie carrying the session token of logged in browsers.
pub const SESSION_COOKIE: &str = "yatube_session";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    TokenHash(#[from] AuthTokenHashError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    Database(#[from] DbError),
}

/// Looks up the user a token was issued to.
///
/// Malformed, unknown and expired tokens all resolve to `None`.
pub async fn user_for_token(db: &DbClient, raw_token: &str) -> Result<Option<User>, AuthError> {
    let Ok(token) = raw_token.parse::<AuthToken>() else {
        return Ok(None);
    };

    let token_hash = token.hash()?;
    let Some(authentication) = db.fetch_auth(&token_hash).await? else {
        return Ok(None);
    };

    if authentication.user != token.user_id
        || authentication.is_expired_at(OffsetDateTime::now_utc())
    {
        debug!(user = %token.user_id, "Rejected expired or mismatched token");
        return Ok(None);
    }

    Ok(db.fetch_user(authentication.user).await?)
}

/// Creates and stores a fresh token for `user`, valid for `lifetime` or forever.
pub async fn issue_token(
    db: &DbClient,
    user: Id<UserMarker>,
    lifetime: Option<time::Duration>,
) -> Result<AuthToken, AuthError> {
    let token = AuthToken::generate_random(user);
    let created_at = OffsetDateTime::now_utc();

    let authentication = Authentication {
        user,
        token_hash: token.hash()?,
        created_at,
        expires_at: lifetime.map(|lifetime| created_at + lifetime),
    };
    db.create_auth(&authentication).await?;

    debug!(%user, "Issued auth token");
    Ok(token)
}

/// Removes the stored hash of `raw_token`. Unknown tokens are ignored.
pub async fn revoke_token(db: &DbClient, raw_token: &str) -> Result<(), AuthError> {
    if let Ok(token) = raw_token.parse::<AuthToken>() {
        db.delete_auth(&token.hash()?).await?;
    }

    Ok(())
}

pub async fn check_credentials(
    db: &DbClient,
    username: &str,
    password: &str,
) -> Result<Option<User>, AuthError> {
    let credentials = db.fetch_credentials(username).await?;

    Ok(credentials
        .filter(|(_, password_hash)| verify_password(password, password_hash))
        .map(|(user, _)| user))
}

/// API caller identified by an `Authorization: Bearer` token.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    pub user: User,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.user.id
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?;

        let db = Arc::<DbClient>::from_ref(state);
        let user = user_for_token(&db, header.token())
            .await?
            .ok_or(ServerError::InvalidToken)?;

        Ok(Self { user })
    }
}

/// Browser visitor, logged in through the session cookie or anonymous.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Default)]
pub struct CurrentUser(pub Option<User>);

impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(Self(None));
        };

        let db = Arc::<DbClient>::from_ref(state);
        let user = user_for_token(&db, cookie.value()).await?;

        Ok(Self(user))
    }
}

/// Logged in browser visitor. Anonymous visitors are sent to the login page.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct LoginRequired(pub User);

impl<S> FromRequestParts<S> for LoginRequired
where
    Arc<DbClient>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await? {
            CurrentUser(Some(user)) => Ok(Self(user)),
            CurrentUser(None) => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map_or_else(|| parts.uri.path(), PathAndQuery::as_str);

                Err(PageError::LoginRequired(next.to_owned()))
            }
        }
    }
}

/// Login page URL that sends the visitor back to `next` afterwards.
#[must_use]
pub fn login_url(next: &str) -> String {
    let next = urlencoding::encode(next).replace("%2F", "/");
    format!("/auth/login/?next={next}")
}

/// Only local absolute paths are accepted as redirect targets after login.
///
/// Browsers read `/\` like `//`, so backslashes are refused along with anything that
/// is not a valid path and query.
#[must_use]
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(next)
            if next.starts_with('/')
                && !next.starts_with("//")
                && !next.contains('\\')
                && !next.chars().any(char::is_control)
                && next.parse::<PathAndQuery>().is_ok() =>
        {
            next
        }
        _ => "/",
    }
}

#[cfg(test)]
mod tests {
    use crate::server::auth::{
        check_credentials, issue_token, login_url, revoke_token, safe_next, user_for_token,
    };
    use yatube_common::model::{auth::hash_password, user::Username};
    use yatube_db::client::DbClient;

    #[test]
    fn login_url_keeps_slashes() {
        assert_eq!(login_url("/create/"), "/auth/login/?next=/create/");
        assert_eq!(
            login_url("/posts/1/edit/?a=b"),
            "/auth/login/?next=/posts/1/edit/%3Fa%3Db"
        );
    }

    #[test]
    fn only_local_redirects() {
        assert_eq!(safe_next(Some("/follow/")), "/follow/");
        assert_eq!(safe_next(Some("//evil.example/")), "/");
        assert_eq!(safe_next(Some("https://evil.example/")), "/");
        assert_eq!(safe_next(Some("/\\evil.example/")), "/");
        assert_eq!(safe_next(Some("/a\r\nX-Injected: 1")), "/");
        assert_eq!(safe_next(Some("/profile/leo/?page=2")), "/profile/leo/?page=2");
        assert_eq!(safe_next(None), "/");
    }

    #[tokio::test]
    async fn token_lifecycle() {
        let db = DbClient::connect_in_memory().await.unwrap();
        let password_hash = hash_password("correct horse").unwrap();
        let user = db
            .create_user(&Username::new("leo".to_owned()).unwrap(), &password_hash)
            .await
            .unwrap();

        let token = issue_token(&db, user.id, None).await.unwrap();
        let raw = token.as_token_str();
        assert_eq!(user_for_token(&db, &raw).await.unwrap(), Some(user.clone()));
        assert_eq!(user_for_token(&db, "garbage").await.unwrap(), None);

        revoke_token(&db, &raw).await.unwrap();
        assert_eq!(user_for_token(&db, &raw).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let db = DbClient::connect_in_memory().await.unwrap();
        let user = db
            .create_user(&Username::new("leo".to_owned()).unwrap(), "unused")
            .await
            .unwrap();

        let token = issue_token(&db, user.id, Some(time::Duration::seconds(-1)))
            .await
            .unwrap();
        assert_eq!(user_for_token(&db, &token.as_token_str()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn credentials() {
        let db = DbClient::connect_in_memory().await.unwrap();
        let password_hash = hash_password("correct horse").unwrap();
        let user = db
            .create_user(&Username::new("leo".to_owned()).unwrap(), &password_hash)
            .await
            .unwrap();

        assert_eq!(
            check_credentials(&db, "leo", "correct horse").await.unwrap(),
            Some(user)
        );
        assert_eq!(check_credentials(&db, "leo", "wrong").await.unwrap(), None);
        assert_eq!(check_credentials(&db, "nobody", "x").await.unwrap(), None);
    }
}
