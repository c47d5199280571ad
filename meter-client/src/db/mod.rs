pub mod cursor_queries;
pub mod reading_queries;
