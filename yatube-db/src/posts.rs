use crate::{
    client::{DbClient, DbError, Result, is_foreign_key_violation},
    record::FullPostRecord,
};
use sqlx::{query, query_as, query_scalar};
use time::OffsetDateTime;
use tracing::debug;
use yatube_common::{
    model::{
        Id,
        group::GroupMarker,
        post::{Post, PostContent, PostMarker},
        user::UserMarker,
    },
    pagination::{PAGE_SIZE, Page, PageRequest, Paginator},
};

const SELECT_FULL_POST: &str = "
    SELECT
        posts.post_id,
        posts.text,
        posts.pub_date,
        posts.image,
        users.user_id AS author_id,
        users.username AS author_username,
        post_groups.group_id,
        post_groups.title AS group_title,
        post_groups.slug AS group_slug
    FROM
        posts
        JOIN users ON users.user_id = posts.author_id
        LEFT JOIN post_groups ON post_groups.group_id = posts.group_id
";

const TIMELINE_ORDER: &str = "ORDER BY posts.pub_date DESC, posts.post_id DESC";

/// Which posts a listing shows.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostFilter {
    All,
    Group(Id<GroupMarker>),
    Author(Id<UserMarker>),
    /// Posts by every author the given user follows.
    FollowedBy(Id<UserMarker>),
}

impl PostFilter {
    fn condition(self) -> (&'static str, Option<i64>) {
        match self {
            PostFilter::All => ("1 = 1", None),
            PostFilter::Group(group_id) => ("posts.group_id = ?", Some(group_id.get())),
            PostFilter::Author(author_id) => ("posts.author_id = ?", Some(author_id.get())),
            PostFilter::FollowedBy(user_id) => (
                "posts.author_id IN (SELECT follows.author_id FROM follows WHERE follows.user_id = ?)",
                Some(user_id.get()),
            ),
        }
    }
}

impl DbClient {
    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let sql = format!("{SELECT_FULL_POST} WHERE posts.post_id = ?");
        let record = query_as::<_, FullPostRecord>(&sql)
            .bind(post_id.get())
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    pub async fn count_posts(&self, filter: PostFilter) -> Result<u64> {
        let (condition, bind) = filter.condition();
        let sql = format!("SELECT COUNT(*) FROM posts WHERE {condition}");

        let mut statement = query_scalar::<_, i64>(&sql);
        if let Some(bind) = bind {
            statement = statement.bind(bind);
        }
        let count = statement.fetch_one(&self.pool).await?;

        Ok(count.cast_unsigned())
    }

    /// Posts matching `filter`, newest first.
    pub async fn fetch_posts(
        &self,
        filter: PostFilter,
        limit: Option<u32>,
        offset: u64,
    ) -> Result<Vec<Post>> {
        let (condition, bind) = filter.condition();
        // SQLite reads a negative LIMIT as "no limit".
        let limit = limit.map_or(-1, i64::from);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let sql = format!("{SELECT_FULL_POST} WHERE {condition} {TIMELINE_ORDER} LIMIT ? OFFSET ?");

        let mut statement = query_as::<_, FullPostRecord>(&sql);
        if let Some(bind) = bind {
            statement = statement.bind(bind);
        }
        let records = statement
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let posts = records
            .into_iter()
            .map(Post::try_from)
            .collect::<Result<_, _>>()?;
        Ok(posts)
    }

    /// One page of at most [`PAGE_SIZE`] posts, selected by the raw `page` query parameter.
    pub async fn fetch_post_page(
        &self,
        filter: PostFilter,
        page: Option<&str>,
    ) -> Result<Page<Post>> {
        let count = self.count_posts(filter).await?;
        let request: PageRequest = Paginator::new(count, PAGE_SIZE).page(page);

        let posts = self
            .fetch_posts(filter, Some(request.limit), request.offset)
            .await?;
        Ok(request.into_page(posts))
    }

    pub async fn create_post(&self, post: &PostContent, author: Id<UserMarker>) -> Result<Post> {
        let result = query_scalar::<_, i64>(
            "
            INSERT INTO posts (text, pub_date, author_id, group_id, image)
            VALUES (?, ?, ?, ?, ?)
            RETURNING post_id
            ",
        )
        .bind(post.text.get())
        .bind(OffsetDateTime::now_utc())
        .bind(author.get())
        .bind(post.group.map(Id::get))
        .bind(post.image.as_deref())
        .fetch_one(&self.pool)
        .await;

        let post_id: Id<PostMarker> = match result {
            Ok(post_id) => post_id.into(),
            Err(err) if is_foreign_key_violation(&err) => return Err(DbError::MissingReference),
            Err(err) => return Err(err.into()),
        };
        debug!(%post_id, %author, "Created post");

        self.fetch_post(post_id)
            .await?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))
    }

    /// Replaces text and group. The stored image is kept unless a new one is given.
    pub async fn update_post(&self, post_id: Id<PostMarker>, post: &PostContent) -> Result<bool> {
        let result = query(
            "
            UPDATE posts
            SET text = ?, group_id = ?, image = COALESCE(?, image)
            WHERE post_id = ?
            ",
        )
        .bind(post.text.get())
        .bind(post.group.map(Id::get))
        .bind(post.image.as_deref())
        .bind(post_id.get())
        .execute(&self.pool)
        .await;

        match result {
            Ok(result) => Ok(result.rows_affected() > 0),
            Err(err) if is_foreign_key_violation(&err) => Err(DbError::MissingReference),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts WHERE post_id = ?")
            .bind(post_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
