pub mod file;
pub mod hn;

pub use file::JsonFileProvider;
pub use hn::{Feed, HnProvider};
