use crate::server::{
    media::{MediaError, MediaStore},
    pages::{PageError, Result},
};
use axum::{
    Form as AxumForm,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart, Query as AxumQuery},
};
use serde::Deserialize;
use yatube_common::model::{Id, Text, group::GroupMarker, post::PostContent};
use yatube_db::client::DbClient;

/// `axum::Form` with rejections rendered as error pages.
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumForm), rejection(PageError))]
pub struct Form<T>(pub T);

/// `axum::extract::Query` with rejections rendered as error pages.
#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(AxumQuery), rejection(PageError))]
pub struct Query<T>(pub T);

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Upload {
    pub file_name: Option<String>,
    pub data: Bytes,
}

/// Raw fields of the create and edit post form.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct PostForm {
    pub text: String,
    pub group: String,
    pub image: Option<Upload>,
}

impl PostForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(ToOwned::to_owned);
            match name.as_deref() {
                Some("text") => form.text = field.text().await?,
                Some("group") => form.group = field.text().await?,
                Some("image") => {
                    let file_name = field.file_name().map(ToOwned::to_owned);
                    let data = field.bytes().await?;
                    if !data.is_empty() {
                        form.image = Some(Upload { file_name, data });
                    }
                }
                _ => {}
            }
        }

        Ok(form)
    }

    /// Checks the fields and stores the image once everything else is valid.
    ///
    /// The inner `Err` holds messages to show next to the form.
    pub async fn validate(
        &self,
        db: &DbClient,
        media: &MediaStore,
    ) -> Result<Result<PostContent, Vec<String>>> {
        let mut errors = Vec::new();

        let text = Text::new(self.text.clone());
        if text.is_err() {
            errors.push("Text: this field is required.".to_owned());
        }

        let raw_group = self.group.trim();
        let group = raw_group.parse::<Id<GroupMarker>>().ok();
        let group_exists = match group {
            Some(id) => db.fetch_group(id).await?.is_some(),
            None => false,
        };
        if !raw_group.is_empty() && !group_exists {
            errors.push("Group: select a valid choice.".to_owned());
        }

        let Ok(text) = text else {
            return Ok(Err(errors));
        };
        if !errors.is_empty() {
            return Ok(Err(errors));
        }

        let image = match &self.image {
            Some(upload) => {
                match media
                    .save_post_image(upload.file_name.as_deref(), &upload.data)
                    .await
                {
                    Ok(stored_path) => Some(stored_path),
                    Err(MediaError::NotAnImage) => {
                        return Ok(Err(vec![
                            "Image: upload a valid image. The file you uploaded was either not an image or a corrupted image.".to_owned(),
                        ]));
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            None => None,
        };

        Ok(Ok(PostContent { text, group, image }))
    }
}
