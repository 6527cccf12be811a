pub mod api;
pub mod config;
pub mod fetch;
pub mod item;
pub mod viewer;
