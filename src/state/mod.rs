pub mod rows;
pub mod timeline;
