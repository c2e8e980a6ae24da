//! Report rendering and raw record dumps.

pub mod dump;
pub mod generator;

pub use dump::write_dump;
pub use generator::{generate_json_report, generate_markdown_report, write_report};
