pub mod app;
pub mod build;
pub mod config;
pub mod document;
pub mod error;
pub mod extensions;
pub mod index;
pub mod matcher;
pub mod metadata;
pub mod path;
pub mod processors;
pub mod relativize;
pub mod scaffold;
pub mod site;
pub mod templates;
pub mod tree;
pub mod typography;

pub use config::{BUILD_DIR, SETTINGS_FILE, SOURCE_DIR};
pub use templates::{INDEX_PAGE, INDEX_TEXT, NOT_FOUND_PAGE};
