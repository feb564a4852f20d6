//! Tag parsing engine
//!
//! Grammars are stored as data (regex source strings) in a [`PatternStore`]
//! and compiled on demand by the [`TagParser`].

pub mod digital_link;
pub mod parser;
#[cfg(feature = "database")]
pub mod postgres;
pub mod store;
pub mod types;

pub use digital_link::parse_digital_link;
pub use parser::TagParser;
#[cfg(feature = "database")]
pub use postgres::PgPatternStore;
pub use store::{import_grammars, parse_seed_document, MemoryPatternStore, PatternStore};
pub use types::{GrammarPattern, GrammarSummary, ParsedTag, TagGrammar};
