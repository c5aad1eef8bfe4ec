//! Shared types, error model, and configuration for lessongen.
//!
//! This crate is the foundation depended on by all other lessongen crates.
//! It provides:
//! - [`LessonGenError`], the unified error type
//! - Domain types ([`Skill`], [`LessonContent`], [`LessonRecord`])
//! - Configuration ([`AppConfig`], [`Settings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CredentialReport, GeneratorConfig, GeneratorSettings, PacingConfig, Settings,
    StoreConfig, StoreSettings, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{LessonGenError, Result};
pub use types::{LessonContent, LessonItem, LessonRecord, Skill};
