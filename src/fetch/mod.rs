// src/fetch/mod.rs

pub mod links;

pub use links::{discover_sheet_links, extract_links};
