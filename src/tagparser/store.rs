//! Persistence for tag grammars
//!
//! `PatternStore` is the only owner of grammar records. The parser and the
//! HTTP front-end operate exclusively through this trait, so the in-memory
//! store (default, tests) and PostgreSQL (`database` feature) are
//! interchangeable.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;

use super::types::{GrammarPattern, GrammarSummary, TagGrammar};
use crate::error::{ResolverError, Result};

#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Store a grammar and all its contents as one unit. Returns the new id.
    async fn create(&self, grammar: &TagGrammar) -> Result<i64>;

    /// Load a grammar with its contents. Missing ids are `Ok(None)`.
    async fn get_by_id(&self, id: i64) -> Result<Option<TagGrammar>>;

    /// All grammars without their contents, ordered by id.
    async fn list_all(&self) -> Result<Vec<GrammarSummary>>;

    /// Replace the entire pattern and the whole content set.
    /// Returns false when the id does not exist.
    async fn update(&self, id: i64, grammar: &TagGrammar) -> Result<bool>;

    /// Returns false when the id does not exist.
    async fn delete_by_id(&self, id: i64) -> Result<bool>;

    async fn delete_all(&self) -> Result<bool>;

    async fn health_check(&self) -> Result<bool>;
}

// ── In-memory store ─────────────────────────────────────────────

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    grammars: BTreeMap<i64, TagGrammar>,
}

/// Grammar store held in process memory.
///
/// Every operation runs inside one lock acquisition, so writers are
/// serialized and readers never observe a half-written grammar.
#[derive(Default)]
pub struct MemoryPatternStore {
    state: RwLock<MemoryState>,
}

impl MemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PatternStore for MemoryPatternStore {
    async fn create(&self, grammar: &TagGrammar) -> Result<i64> {
        grammar.validate()?;
        let mut state = self.state.write().await;
        state.next_id += 1;
        let id = state.next_id;
        state.grammars.insert(id, grammar.clone());
        tracing::debug!(id, name = grammar.name(), "Grammar created");
        Ok(id)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<TagGrammar>> {
        Ok(self.state.read().await.grammars.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<GrammarSummary>> {
        let state = self.state.read().await;
        Ok(state
            .grammars
            .iter()
            .map(|(id, g)| GrammarSummary {
                id: *id,
                name: g.entire_pattern.name.clone(),
                entire_pattern: g.entire_pattern.pattern.clone(),
            })
            .collect())
    }

    async fn update(&self, id: i64, grammar: &TagGrammar) -> Result<bool> {
        grammar.validate()?;
        let mut state = self.state.write().await;
        match state.grammars.get_mut(&id) {
            Some(existing) => {
                *existing = grammar.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool> {
        Ok(self.state.write().await.grammars.remove(&id).is_some())
    }

    async fn delete_all(&self) -> Result<bool> {
        self.state.write().await.grammars.clear();
        Ok(true)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

// ── Seeding ─────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SeedEntry {
    #[serde(rename = "ENTIRE_PATTERN")]
    entire_pattern: String,
    #[serde(default)]
    contents: serde_json::Map<String, serde_json::Value>,
}

/// Parse a tagstyles document: `{name: {"ENTIRE_PATTERN": .., "contents": {field: pattern}}}`
pub fn parse_seed_document(json: &str) -> Result<Vec<TagGrammar>> {
    let entries: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| ResolverError::InvalidGrammar(format!("seed document: {}", e)))?;

    let mut grammars = Vec::with_capacity(entries.len());
    for (name, value) in entries {
        let entry: SeedEntry = serde_json::from_value(value)
            .map_err(|e| ResolverError::InvalidGrammar(format!("seed '{}': {}", name, e)))?;
        let mut contents = Vec::with_capacity(entry.contents.len());
        for (field, pattern) in entry.contents {
            let pattern = pattern.as_str().ok_or_else(|| {
                ResolverError::InvalidGrammar(format!(
                    "seed '{}': content '{}' is not a string",
                    name, field
                ))
            })?;
            contents.push(GrammarPattern::new(field, pattern));
        }
        grammars.push(TagGrammar::new(
            GrammarPattern::new(name, entry.entire_pattern),
            contents,
        ));
    }
    Ok(grammars)
}

/// Import every grammar of a tagstyles file whose name is not stored yet.
/// Returns the ids of the created grammars.
pub async fn import_grammars(store: &dyn PatternStore, path: &Path) -> Result<Vec<i64>> {
    let content = tokio::fs::read_to_string(path).await?;
    let grammars = parse_seed_document(&content)?;
    let existing: Vec<String> = store.list_all().await?.into_iter().map(|s| s.name).collect();

    let mut created = Vec::new();
    for grammar in grammars {
        if existing.iter().any(|name| name == grammar.name()) {
            tracing::debug!(name = grammar.name(), "Seed grammar already stored, skipping");
            continue;
        }
        created.push(store.create(&grammar).await?);
    }
    tracing::info!(path = %path.display(), imported = created.len(), "Seed grammars imported");
    Ok(created)
}
