use crate::{
    client::{DbClient, DbError, Result, is_unique_violation},
    record::GroupRecord,
};
use sqlx::query_as;
use yatube_common::model::{
    Id,
    group::{CreateGroup, Group, GroupMarker},
};

impl DbClient {
    pub async fn create_group(&self, group: &CreateGroup) -> Result<Group> {
        let result = query_as::<_, GroupRecord>(
            "
            INSERT INTO post_groups (title, slug, description)
            VALUES (?, ?, ?)
            RETURNING group_id, title, slug, description
            ",
        )
        .bind(&group.title)
        .bind(group.slug.get())
        .bind(&group.description)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(Group::try_from(record)?),
            Err(err) if is_unique_violation(&err) => {
                Err(DbError::DuplicateGroupSlug(group.slug.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn fetch_group(&self, group_id: Id<GroupMarker>) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM post_groups
            WHERE group_id = ?
            ",
        )
        .bind(group_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    pub async fn fetch_group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let record = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM post_groups
            WHERE slug = ?
            ",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        let group = record.map(Group::try_from).transpose()?;
        Ok(group)
    }

    pub async fn fetch_groups(&self) -> Result<Vec<Group>> {
        let records = query_as::<_, GroupRecord>(
            "
            SELECT group_id, title, slug, description
            FROM post_groups
            ORDER BY title, group_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let groups = records
            .into_iter()
            .map(Group::try_from)
            .collect::<Result<_, _>>()?;
        Ok(groups)
    }
}
