use crate::server::media::MediaStore;
use askama::Template;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use yatube_common::{
    model::{
        Id,
        comment::Comment,
        group::{Group, GroupMarker},
        post::{Post, PostMarker},
        user::User,
    },
    pagination::Page,
};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[day] [month repr:short] [year] [hour]:[minute]");

pub fn format_date(date: OffsetDateTime) -> Result<String, time::error::Format> {
    date.format(DATE_FORMAT)
}

#[must_use]
pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

#[must_use]
pub fn group_url(slug: &str) -> String {
    format!("/group/{slug}/")
}

#[must_use]
pub fn post_url(id: Id<PostMarker>) -> String {
    format!("/posts/{id}/")
}

/// Navigation and footer data shared by every page.
#[derive(Clone, Debug)]
pub struct Layout {
    pub user: Option<User>,
    pub profile_url: String,
    pub year: i32,
}

impl Layout {
    #[must_use]
    pub fn new(user: Option<User>) -> Self {
        let profile_url = user
            .as_ref()
            .map(|user| profile_url(user.username.get()))
            .unwrap_or_default();

        Self {
            user,
            profile_url,
            year: OffsetDateTime::now_utc().year(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GroupLink {
    pub title: String,
    pub url: String,
}

/// A post as shown in listings and on its detail page.
#[derive(Clone, Debug)]
pub struct PostCard {
    pub id: Id<PostMarker>,
    pub text: String,
    pub preview: String,
    pub author: String,
    pub author_url: String,
    pub pub_date: String,
    pub url: String,
    pub group: Option<GroupLink>,
    pub image_url: Option<String>,
}

impl PostCard {
    pub fn new(post: &Post, media: &MediaStore) -> Result<Self, time::error::Format> {
        Ok(Self {
            id: post.id,
            text: post.text.get().to_owned(),
            preview: post.text.preview().to_owned(),
            author: post.author.username.get().to_owned(),
            author_url: profile_url(post.author.username.get()),
            pub_date: format_date(post.pub_date)?,
            url: post_url(post.id),
            group: post.group.as_ref().map(|group| GroupLink {
                title: group.title.clone(),
                url: group_url(group.slug.get()),
            }),
            image_url: post.image.as_deref().map(|image| media.url(image)),
        })
    }
}

#[derive(Clone, Debug)]
pub struct CommentView {
    pub author: String,
    pub author_url: String,
    pub text: String,
    pub created: String,
}

impl CommentView {
    pub fn new(comment: &Comment) -> Result<Self, time::error::Format> {
        Ok(Self {
            author: comment.author.username.get().to_owned(),
            author_url: profile_url(comment.author.username.get()),
            text: comment.text.get().to_owned(),
            created: format_date(comment.created)?,
        })
    }
}

/// Paginator links under a listing.
#[derive(Clone, Debug)]
pub struct PageNav {
    pub number: u64,
    pub num_pages: u64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous: u64,
    pub next: u64,
    pub links: Vec<PageLink>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct PageLink {
    pub number: u64,
    pub current: bool,
}

impl PageNav {
    #[must_use]
    pub fn new<T>(page: &Page<T>) -> Self {
        Self {
            number: page.number,
            num_pages: page.num_pages,
            has_previous: page.has_previous(),
            has_next: page.has_next(),
            previous: page.previous_page_number(),
            next: page.next_page_number(),
            links: page
                .page_numbers()
                .map(|number| PageLink {
                    number,
                    current: number == page.number,
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GroupOption {
    pub id: Id<GroupMarker>,
    pub title: String,
    pub selected: bool,
}

impl GroupOption {
    #[must_use]
    pub fn list(groups: &[Group], selected: &str) -> Vec<Self> {
        groups
            .iter()
            .map(|group| Self {
                id: group.id,
                title: group.title.clone(),
                selected: group.id.to_string() == selected,
            })
            .collect()
    }
}

/// The post listing with its paginator, without the surrounding layout.
#[derive(Template)]
#[template(path = "includes/post_list.html")]
pub struct PostListTemplate {
    pub cards: Vec<PostCard>,
    pub nav: PageNav,
    pub show_group: bool,
}

impl PostListTemplate {
    pub fn new(
        page: &Page<Post>,
        media: &MediaStore,
        show_group: bool,
    ) -> Result<Self, time::error::Format> {
        let cards = page
            .items
            .iter()
            .map(|post| PostCard::new(post, media))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            cards,
            nav: PageNav::new(page),
            show_group,
        })
    }
}

#[derive(Template)]
#[template(path = "posts/index.html")]
pub struct IndexTemplate<'a> {
    pub layout: Layout,
    pub listing: &'a str,
}

#[derive(Template)]
#[template(path = "posts/group_list.html")]
pub struct GroupTemplate<'a> {
    pub layout: Layout,
    pub group: &'a Group,
    pub listing: &'a str,
}

#[derive(Template)]
#[template(path = "posts/profile.html")]
pub struct ProfileTemplate<'a> {
    pub layout: Layout,
    pub author: &'a User,
    pub author_url: String,
    pub post_count: u64,
    pub following: bool,
    pub own_profile: bool,
    pub listing: &'a str,
}

#[derive(Template)]
#[template(path = "posts/follow.html")]
pub struct FollowTemplate<'a> {
    pub layout: Layout,
    pub listing: &'a str,
}

#[derive(Template)]
#[template(path = "posts/post_detail.html")]
pub struct PostDetailTemplate {
    pub layout: Layout,
    pub post: PostCard,
    pub author_post_count: u64,
    pub comments: Vec<CommentView>,
    pub can_edit: bool,
}

#[derive(Template)]
#[template(path = "posts/create_post.html")]
pub struct PostFormTemplate {
    pub layout: Layout,
    pub is_edit: bool,
    pub action: String,
    pub text: String,
    pub groups: Vec<GroupOption>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "posts/follow_error.html")]
pub struct FollowErrorTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "about/author.html")]
pub struct AboutAuthorTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "about/tech.html")]
pub struct AboutTechTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "users/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub username: String,
    pub next: String,
    pub failed: bool,
}

#[derive(Template)]
#[template(path = "users/signup.html")]
pub struct SignupTemplate {
    pub layout: Layout,
    pub username: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "users/logged_out.html")]
pub struct LoggedOutTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "core/404.html")]
pub struct NotFoundTemplate {
    pub layout: Layout,
    pub path: String,
}

#[derive(Template)]
#[template(path = "core/400.html")]
pub struct BadRequestTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "core/403.html")]
pub struct ForbiddenTemplate {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "core/500.html")]
pub struct ServerErrorTemplate {
    pub layout: Layout,
}
