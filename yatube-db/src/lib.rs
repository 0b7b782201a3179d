pub mod client;
mod comments;
mod follows;
mod groups;
mod posts;
mod record;

pub use posts::PostFilter;
