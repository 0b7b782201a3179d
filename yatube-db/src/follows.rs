use crate::{
    client::{DbClient, DbError, Result, is_unique_violation},
    record::FollowRecord,
};
use sqlx::{query, query_as, query_scalar};
use tracing::debug;
use yatube_common::model::{Id, follow::Follow, user::UserMarker};

impl DbClient {
    /// Subscribes `user` to `author`.
    ///
    /// Self-follows are refused before touching the database; duplicates are
    /// refused by the unique constraint on (user, author).
    pub async fn follow(&self, user: Id<UserMarker>, author: Id<UserMarker>) -> Result<()> {
        if user == author {
            return Err(DbError::SelfFollow);
        }

        let result = query("INSERT INTO follows (user_id, author_id) VALUES (?, ?)")
            .bind(user.get())
            .bind(author.get())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {
                debug!(%user, %author, "Created follow");
                Ok(())
            }
            Err(err) if is_unique_violation(&err) => Err(DbError::DuplicateFollow),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes the subscription if present. Returns whether one existed.
    pub async fn unfollow(&self, user: Id<UserMarker>, author: Id<UserMarker>) -> Result<bool> {
        let result = query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
            .bind(user.get())
            .bind(author.get())
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        debug!(%user, %author, deleted, "Removed follow");
        Ok(deleted)
    }

    pub async fn is_following(&self, user: Id<UserMarker>, author: Id<UserMarker>) -> Result<bool> {
        let exists = query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = ? AND author_id = ?)",
        )
        .bind(user.get())
        .bind(author.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Everyone `user` follows, optionally only authors whose name contains `search`.
    pub async fn fetch_follows(
        &self,
        user: Id<UserMarker>,
        search: Option<&str>,
    ) -> Result<Vec<Follow>> {
        let records = query_as::<_, FollowRecord>(
            "
            SELECT
                followers.user_id,
                followers.username AS user_username,
                authors.user_id AS author_id,
                authors.username AS author_username
            FROM
                follows
                JOIN users AS followers ON followers.user_id = follows.user_id
                JOIN users AS authors ON authors.user_id = follows.author_id
            WHERE
                follows.user_id = ?
                AND (? IS NULL OR instr(authors.username, ?) > 0)
            ORDER BY
                follows.follow_id
            ",
        )
        .bind(user.get())
        .bind(search)
        .bind(search)
        .fetch_all(&self.pool)
        .await?;

        let follows = records
            .into_iter()
            .map(Follow::try_from)
            .collect::<Result<_, _>>()?;
        Ok(follows)
    }
}
