pub mod actions;
pub mod api;
pub mod app;
pub mod config;
pub mod debounce;
pub mod error;
pub mod matrix;
pub mod message;
pub mod model;
pub mod shell;
pub mod state;
pub mod store;
pub mod task;
pub mod ui;
