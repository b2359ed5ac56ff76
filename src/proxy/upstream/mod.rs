pub mod client;

pub use client::{validate_target_url, RedirectMode, UpstreamClient};
