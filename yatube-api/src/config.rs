use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf, time::Duration};
use tracing::debug;

use crate::InitError;

/// Settings read from the environment (and `.env`, if present).
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_media_root")]
    pub media_root: PathBuf,
    #[serde(default = "default_media_url")]
    pub media_url: String,
    #[serde(default = "default_page_cache_seconds")]
    pub page_cache_seconds: u64,
    #[serde(default = "default_session_days")]
    pub session_days: u16,
}

fn default_database_url() -> String {
    "sqlite://yatube.db?mode=rwc".to_owned()
}

fn default_media_root() -> PathBuf {
    PathBuf::from("media")
}

fn default_media_url() -> String {
    "/media".to_owned()
}

fn default_page_cache_seconds() -> u64 {
    15 * 60
}

fn default_session_days() -> u16 {
    14
}

impl Env {
    pub fn page_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.page_cache_seconds)
    }

    pub fn session_lifetime(&self) -> time::Duration {
        time::Duration::days(i64::from(self.session_days))
    }
}

pub fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}
