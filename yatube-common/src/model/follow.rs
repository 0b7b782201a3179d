use crate::model::user::User;

/// A subscription of `user` to the posts of `author`.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct Follow {
    pub user: User,
    pub author: User,
}
