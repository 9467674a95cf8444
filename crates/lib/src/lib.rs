//! VANT AI client library: backend HTTP client, data model, explicit UI state and the
//! controller shared by the CLI and desktop applications.

pub mod api;
pub mod config;
pub mod controller;
pub mod init;
pub mod model;
pub mod render;
pub mod snapshot;
pub mod state;
pub mod transcript;
pub mod voice;
