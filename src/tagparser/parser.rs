//! Tag parser
//!
//! Classifies a raw tag against every stored grammar and extracts its fields.
//!
//! The envelope (`entire_pattern`) must match the whole tag, which keeps a
//! loose grammar such as a bare number from claiming a structured digital
//! link. Content patterns are searched anywhere in the tag because digital
//! links carry application identifiers in arbitrary order. Exactly one
//! grammar may match; ambiguity is an error, not a priority decision.

use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::store::PatternStore;
use super::types::{compile_full_match, ParsedTag};
use crate::error::{ResolverError, Result};

/// A compiled envelope pattern, remembered with its source so an update
/// through the store invalidates it.
struct CachedEnvelope {
    source: String,
    regex: Regex,
}

pub struct TagParser {
    store: Arc<dyn PatternStore>,
    envelopes: RwLock<HashMap<i64, CachedEnvelope>>,
    /// Content regexes per grammar id, keyed by pattern source
    contents: RwLock<HashMap<i64, HashMap<String, Regex>>>,
}

impl TagParser {
    pub fn new(store: Arc<dyn PatternStore>) -> Self {
        Self {
            store,
            envelopes: RwLock::new(HashMap::new()),
            contents: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn PatternStore> {
        &self.store
    }

    /// Parse a tag into its grammar name and fields
    pub async fn parse(&self, raw_tag: &str) -> Result<ParsedTag> {
        let candidates = self.match_entire_pattern(raw_tag).await?;

        let (id, name) = match candidates.len() {
            0 => {
                return Err(ResolverError::InvalidTag {
                    tag: raw_tag.to_string(),
                })
            }
            1 => candidates.into_iter().next().ok_or(ResolverError::InvalidTag {
                tag: raw_tag.to_string(),
            })?,
            _ => {
                return Err(ResolverError::AmbiguousTag {
                    tag: raw_tag.to_string(),
                    candidates: candidates.into_iter().map(|(_, name)| name).collect(),
                })
            }
        };

        let fields = self.match_contents(id, raw_tag).await?;
        tracing::debug!(tag = raw_tag, grammar = %name, fields = fields.len(), "Tag parsed");

        Ok(ParsedTag {
            grammar_name: name,
            raw_tag: raw_tag.to_string(),
            fields,
        })
    }

    /// Ids and names of every grammar whose envelope fully matches the tag
    pub async fn match_entire_pattern(&self, raw_tag: &str) -> Result<Vec<(i64, String)>> {
        let summaries = self.store.list_all().await?;
        self.prune_caches(&summaries.iter().map(|s| s.id).collect::<Vec<_>>())
            .await;

        let mut matches = Vec::new();
        for summary in summaries {
            if let Some(true) = self
                .envelope_matches(summary.id, &summary.entire_pattern, raw_tag)
                .await
            {
                matches.push((summary.id, summary.name));
            }
        }
        Ok(matches)
    }

    /// Run the grammar's content patterns over the tag
    pub async fn match_contents(&self, grammar_id: i64, raw_tag: &str) -> Result<BTreeMap<String, String>> {
        let grammar = self
            .store
            .get_by_id(grammar_id)
            .await?
            .ok_or_else(|| ResolverError::InvalidTag {
                tag: raw_tag.to_string(),
            })?;

        let mut fields = BTreeMap::new();
        for content in &grammar.contents {
            let Some(regex) = self.content_regex(grammar_id, &content.pattern).await else {
                continue;
            };
            if let Some(caps) = regex.captures(raw_tag) {
                // Patterns without a capture group yield the whole match
                let group = if regex.captures_len() > 1 {
                    caps.get(1)
                } else {
                    caps.get(0)
                };
                if let Some(value) = group {
                    fields.insert(content.name.clone(), value.as_str().to_string());
                }
            }
        }

        if let Some(cached) = self.contents.write().await.get_mut(&grammar_id) {
            cached.retain(|source, _| grammar.contents.iter().any(|c| &c.pattern == source));
        }
        Ok(fields)
    }

    async fn envelope_matches(&self, id: i64, source: &str, raw_tag: &str) -> Option<bool> {
        {
            let cache = self.envelopes.read().await;
            if let Some(cached) = cache.get(&id) {
                if cached.source == source {
                    return Some(cached.regex.is_match(raw_tag));
                }
            }
        }

        let regex = match compile_full_match(source) {
            Ok(regex) => regex,
            Err(e) => {
                tracing::warn!(grammar_id = id, error = %e, "Stored entire pattern does not compile");
                return None;
            }
        };
        let matched = regex.is_match(raw_tag);
        self.envelopes.write().await.insert(
            id,
            CachedEnvelope {
                source: source.to_string(),
                regex,
            },
        );
        Some(matched)
    }

    async fn content_regex(&self, grammar_id: i64, pattern: &str) -> Option<Regex> {
        if let Some(regex) = self
            .contents
            .read()
            .await
            .get(&grammar_id)
            .and_then(|cached| cached.get(pattern))
        {
            return Some(regex.clone());
        }
        match Regex::new(pattern) {
            Ok(regex) => {
                self.contents
                    .write()
                    .await
                    .entry(grammar_id)
                    .or_default()
                    .insert(pattern.to_string(), regex.clone());
                Some(regex)
            }
            Err(e) => {
                tracing::warn!(pattern, error = %e, "Stored content pattern does not compile");
                None
            }
        }
    }

    /// Drop cached regexes of grammars that no longer exist
    async fn prune_caches(&self, live_ids: &[i64]) {
        self.envelopes
            .write()
            .await
            .retain(|id, _| live_ids.contains(id));
        self.contents
            .write()
            .await
            .retain(|id, _| live_ids.contains(id));
    }

    #[cfg(test)]
    async fn cached_content_patterns(&self) -> usize {
        self.contents.read().await.values().map(HashMap::len).sum()
    }
}
