use crate::model::{Id, ModelValidationError};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

pub const GROUP_TITLE_MAX_LEN: usize = 200;
pub const GROUP_SLUG_MAX_LEN: usize = 50;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct GroupMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Group {
    pub id: Id<GroupMarker>,
    pub title: String,
    pub slug: GroupSlug,
    pub description: String,
}

/// What a post carries about its group.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PartialGroup {
    pub id: Id<GroupMarker>,
    pub title: String,
    pub slug: GroupSlug,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateGroup {
    pub title: String,
    pub slug: GroupSlug,
    pub description: String,
}

impl CreateGroup {
    pub fn new(
        title: impl Into<String>,
        slug: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self, ModelValidationError> {
        let title = title.into();
        if title.is_empty() || title.chars().count() > GROUP_TITLE_MAX_LEN {
            return Err(InvalidGroupTitleError(title).into());
        }

        Ok(Self {
            title,
            slug: GroupSlug::new(slug.into())?,
            description: description.into(),
        })
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct GroupSlug(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The group slug is invalid: {0:?}")]
pub struct InvalidGroupSlugError(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The group title must have 1 to {GROUP_TITLE_MAX_LEN} characters: {0:?}")]
pub struct InvalidGroupTitleError(String);

impl GroupSlug {
    pub fn new(slug: String) -> Result<Self, InvalidGroupSlugError> {
        let valid = !slug.is_empty()
            && slug.len() <= GROUP_SLUG_MAX_LEN
            && slug
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');

        if valid {
            Ok(Self(slug))
        } else {
            Err(InvalidGroupSlugError(slug))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GroupSlug {
    type Error = InvalidGroupSlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Display for GroupSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        ModelValidationError,
        group::{CreateGroup, GROUP_SLUG_MAX_LEN, GroupSlug},
    };

    #[test]
    fn slug_charset() {
        for slug in ["test", "test-2", "snake_case", "A1"] {
            assert!(GroupSlug::new(slug.to_owned()).is_ok(), "{slug}");
        }
        for slug in ["", "with space", "поэзия", "a/b", &"x".repeat(GROUP_SLUG_MAX_LEN + 1)] {
            assert!(GroupSlug::new(slug.to_owned()).is_err(), "{slug}");
        }
    }

    #[test]
    fn create_group_checks_title() {
        assert!(CreateGroup::new("Поэзия", "test", "Наши поэты").is_ok());
        assert!(matches!(
            CreateGroup::new("", "test", ""),
            Err(ModelValidationError::GroupTitle(_))
        ));
        assert!(matches!(
            CreateGroup::new("Кино", "no slug", ""),
            Err(ModelValidationError::GroupSlug(_))
        ));
    }
}
