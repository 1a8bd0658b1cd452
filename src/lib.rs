pub mod api;
pub mod download;
pub mod models;
pub mod settings;
pub mod state;
