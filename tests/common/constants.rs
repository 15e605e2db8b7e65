//! Test constants shared by end-to-end tests.

#![allow(dead_code)]

use std::time::Duration;

/// Upper bound for any single wait on session state.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

pub const ALLOWED_EXTENSIONS: &[&str] = &["mp3", "flac"];

pub const ALBUM_A_NAME: &str = "Kind of Blue";
pub const ALBUM_A_ARTIST: &str = "Miles Davis";
pub const ALBUM_A_FILES: &[&str] = &["/music/kob/so_what.mp3", "/music/kob/blue_in_green.flac"];

pub const ALBUM_B_NAME: &str = "A Love Supreme";
pub const ALBUM_B_ARTIST: &str = "John Coltrane";
pub const ALBUM_B_FILES: &[&str] = &["/music/als/acknowledgement.mp3"];
