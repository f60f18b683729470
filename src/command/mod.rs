//! Command text handling: template rendering and shell-style tokenizing

pub mod template;
pub mod tokenizer;

pub use template::{normalize_label, render, DEFAULT_CONFIGURE_TEMPLATE};
pub use tokenizer::{parse_command, tokenize, CommandLine};
