//! Tag grammar data types

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ResolverError, Result};

/// A named regular expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarPattern {
    pub name: String,
    pub pattern: String,
}

impl GrammarPattern {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }
}

/// A tag format: the envelope pattern plus the field-extracting sub-patterns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagGrammar {
    pub entire_pattern: GrammarPattern,
    #[serde(default)]
    pub contents: Vec<GrammarPattern>,
}

impl TagGrammar {
    pub fn new(entire_pattern: GrammarPattern, contents: Vec<GrammarPattern>) -> Self {
        Self {
            entire_pattern,
            contents,
        }
    }

    pub fn name(&self) -> &str {
        &self.entire_pattern.name
    }

    /// Reject grammars whose patterns do not compile
    pub fn validate(&self) -> Result<()> {
        if self.entire_pattern.name.trim().is_empty() {
            return Err(ResolverError::InvalidGrammar(
                "grammar name must not be empty".to_string(),
            ));
        }
        compile_full_match(&self.entire_pattern.pattern).map_err(|e| {
            ResolverError::InvalidGrammar(format!("entire pattern '{}': {}", self.name(), e))
        })?;
        for content in &self.contents {
            Regex::new(&content.pattern).map_err(|e| {
                ResolverError::InvalidGrammar(format!("content pattern '{}': {}", content.name, e))
            })?;
        }
        Ok(())
    }
}

/// One row of the grammar listing (contents excluded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarSummary {
    pub id: i64,
    pub name: String,
    pub entire_pattern: String,
}

/// Result of parsing a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedTag {
    pub grammar_name: String,
    pub raw_tag: String,
    pub fields: BTreeMap<String, String>,
}

/// Anchor a pattern so it must consume the whole input
pub(crate) fn compile_full_match(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}
