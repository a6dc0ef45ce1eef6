pub mod api;
pub mod client;
pub mod sync;
pub mod timeline;
