use crate::record::{AuthenticationRecord, CredentialsRecord, UserRecord};
use sqlx::{
    SqlitePool, query, query_as, query_scalar,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;
use thiserror::Error;
use yatube_common::model::{
    Id, ModelValidationError,
    auth::{AuthTokenHash, Authentication},
    group::GroupSlug,
    user::{User, UserMarker, Username},
};

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Running migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("The username {0} is already taken")]
    DuplicateUsername(Username),
    #[error("The group slug {0} is already taken")]
    DuplicateGroupSlug(GroupSlug),
    #[error("A referenced record does not exist")]
    MissingReference,
    #[error("Users cannot follow themselves")]
    SelfFollow,
    #[error("The follow relation already exists")]
    DuplicateFollow,
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

#[derive(Debug, Clone)]
pub struct DbClient {
    pub(crate) pool: SqlitePool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `url` and brings its schema up to date.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let client = Self::new(pool);
        client.migrate().await?;
        Ok(client)
    }

    /// A fresh, migrated database that lives as long as the client.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // Every connection to `:memory:` opens its own database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let client = Self::new(pool);
        client.migrate().await?;
        Ok(client)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.username
            FROM
                users
            WHERE
                users.user_id = ?
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_id,
                users.username
            FROM
                users
            WHERE
                users.username = ?
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    /// The user together with their stored password hash.
    pub async fn fetch_credentials(&self, username: &str) -> Result<Option<(User, String)>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT
                users.user_id,
                users.username,
                users.password_hash
            FROM
                users
            WHERE
                users.username = ?
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(<(User, String)>::try_from).transpose()?;
        Ok(credentials)
    }

    pub async fn create_user(&self, username: &Username, password_hash: &str) -> Result<User> {
        let result = query_scalar::<_, i64>(
            "
            INSERT INTO users (username, password_hash)
            VALUES (?, ?)
            RETURNING user_id
            ",
        )
        .bind(username.get())
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user_id) => Ok(User {
                id: user_id.into(),
                username: username.clone(),
            }),
            Err(err) if is_unique_violation(&err) => {
                Err(DbError::DuplicateUsername(username.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO auth_tokens (token_hash, user_id, created_at, expires_at)
            VALUES (?, ?, ?, ?)
            ",
        )
        .bind(authentication.token_hash.0.as_slice())
        .bind(authentication.user.get())
        .bind(authentication.created_at)
        .bind(authentication.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                auth_tokens.user_id,
                auth_tokens.token_hash,
                auth_tokens.created_at,
                auth_tokens.expires_at
            FROM
                auth_tokens
            WHERE
                auth_tokens.token_hash = ?
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    pub async fn delete_auth(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let result = query("DELETE FROM auth_tokens WHERE token_hash = ?")
            .bind(token_hash.0.as_slice())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
