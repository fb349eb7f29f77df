pub mod citation;
pub mod image;
pub mod prompt;
pub mod title;
