use crate::model::Id;
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::Display;
use thiserror::Error;

pub const USERNAME_MAX_LEN: usize = 150;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Username,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Username(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidUsernameError {
    #[error("The username must not be empty")]
    Empty,
    #[error("The username is longer than {USERNAME_MAX_LEN} characters: {0}")]
    TooLong(String),
    #[error("The username contains the forbidden character {0:?}")]
    ForbiddenCharacter(char),
}

impl Username {
    pub fn new(username: String) -> Result<Self, InvalidUsernameError> {
        if username.is_empty() {
            Err(InvalidUsernameError::Empty)
        } else if username.chars().count() > USERNAME_MAX_LEN {
            Err(InvalidUsernameError::TooLong(username))
        } else {
            Ok(Username(username))
        }
    }

    /// Stricter check for self-chosen usernames: letters, digits and `@.+-_` only.
    pub fn new_for_signup(username: String) -> Result<Self, InvalidUsernameError> {
        if let Some(forbidden) = username
            .chars()
            .find(|c| !(c.is_alphanumeric() || "@.+-_".contains(*c)))
        {
            return Err(InvalidUsernameError::ForbiddenCharacter(forbidden));
        }

        Self::new(username)
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Username::new(inner)
            .map_err(|_| Error::invalid_value(Unexpected::Other("string"), &"Username"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::{InvalidUsernameError, USERNAME_MAX_LEN, Username};

    #[test]
    fn username_length() {
        assert_eq!(Username::new(String::new()), Err(InvalidUsernameError::Empty));
        assert!(Username::new("a".repeat(USERNAME_MAX_LEN)).is_ok());
        assert!(matches!(
            Username::new("ы".repeat(USERNAME_MAX_LEN + 1)),
            Err(InvalidUsernameError::TooLong(_))
        ));
    }

    #[test]
    fn signup_username_charset() {
        assert!(Username::new_for_signup("leo.tolstoy+1@x_y-z".to_owned()).is_ok());
        assert!(Username::new_for_signup("МухамедАли".to_owned()).is_ok());
        assert_eq!(
            Username::new_for_signup("Анна Ахматова".to_owned()),
            Err(InvalidUsernameError::ForbiddenCharacter(' '))
        );
        // Existing accounts may carry any characters.
        assert!(Username::new("Анна Ахматова".to_owned()).is_ok());
    }
}
