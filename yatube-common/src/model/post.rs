use crate::model::{
    Id, Text,
    group::{GroupMarker, PartialGroup},
    user::User,
};
use time::OffsetDateTime;

/// Directory under the media root that post images are stored in.
pub const POST_IMAGE_DIR: &str = "posts";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub text: Text,
    pub pub_date: OffsetDateTime,
    pub author: User,
    pub group: Option<PartialGroup>,
    /// Path of the uploaded image relative to the media root, e.g. `posts/small.gif`.
    pub image: Option<String>,
}

/// Author-supplied part of a post.
///
/// When updating, an `image` of `None` keeps the stored image.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostContent {
    pub text: Text,
    pub group: Option<Id<GroupMarker>>,
    pub image: Option<String>,
}
