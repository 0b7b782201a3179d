use crate::{
    client::{DbClient, DbError, Result, is_foreign_key_violation},
    record::CommentRecord,
};
use sqlx::{query, query_as, query_scalar};
use time::OffsetDateTime;
use yatube_common::model::{
    Id, Text,
    comment::{Comment, CommentMarker},
    post::PostMarker,
    user::UserMarker,
};

const SELECT_COMMENT: &str = "
    SELECT
        comments.comment_id,
        comments.post_id,
        users.user_id AS author_id,
        users.username AS author_username,
        comments.text,
        comments.created
    FROM
        comments
        JOIN users ON users.user_id = comments.author_id
";

impl DbClient {
    pub async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        text: &Text,
    ) -> Result<Comment> {
        let result = query_scalar::<_, i64>(
            "
            INSERT INTO comments (post_id, author_id, text, created)
            VALUES (?, ?, ?, ?)
            RETURNING comment_id
            ",
        )
        .bind(post_id.get())
        .bind(author.get())
        .bind(text.get())
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await;

        let comment_id: Id<CommentMarker> = match result {
            Ok(comment_id) => comment_id.into(),
            Err(err) if is_foreign_key_violation(&err) => return Err(DbError::MissingReference),
            Err(err) => return Err(err.into()),
        };

        self.fetch_comment(post_id, comment_id)
            .await?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))
    }

    /// Comments of a post, oldest first.
    pub async fn fetch_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let sql = format!(
            "{SELECT_COMMENT} WHERE comments.post_id = ? ORDER BY comments.created, comments.comment_id"
        );
        let records = query_as::<_, CommentRecord>(&sql)
            .bind(post_id.get())
            .fetch_all(&self.pool)
            .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    /// A comment, only if it belongs to the given post.
    pub async fn fetch_comment(
        &self,
        post_id: Id<PostMarker>,
        comment_id: Id<CommentMarker>,
    ) -> Result<Option<Comment>> {
        let sql =
            format!("{SELECT_COMMENT} WHERE comments.post_id = ? AND comments.comment_id = ?");
        let record = query_as::<_, CommentRecord>(&sql)
            .bind(post_id.get())
            .bind(comment_id.get())
            .fetch_optional(&self.pool)
            .await?;

        let comment = record.map(Comment::try_from).transpose()?;
        Ok(comment)
    }

    pub async fn update_comment(&self, comment_id: Id<CommentMarker>, text: &Text) -> Result<bool> {
        let result = query("UPDATE comments SET text = ? WHERE comment_id = ?")
            .bind(text.get())
            .bind(comment_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_comment(&self, comment_id: Id<CommentMarker>) -> Result<bool> {
        let result = query("DELETE FROM comments WHERE comment_id = ?")
            .bind(comment_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
