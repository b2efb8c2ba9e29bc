pub mod api;
pub mod cache;
pub mod extractors;
pub mod fetcher;
pub mod models;
pub mod settings;
pub mod suppliers;
pub mod utils;
