// src/process/mod.rs

pub mod email;
pub mod normalize;
pub mod record;

pub use email::derive_emails;
pub use normalize::{normalize, NormalizeOptions, RawRow, Record};
pub use record::StudentRecord;
