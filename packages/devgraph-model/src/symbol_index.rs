//! Symbol index: the lookup structure C1 specifies — URI ↔ entity id, file →
//! declared entities, and wildcard name-pattern lookup. Implementations may
//! back this with the columnar store (production) or an in-memory map
//! (tests); both satisfy the same contract, expressed here as a trait.

use std::collections::BTreeMap;

use crate::entity_id::EntityId;
use crate::uri::CanonicalUri;

/// Contract a symbol index must satisfy, regardless of backing storage.
pub trait SymbolIndex {
    fn uri_to_entity(&self, uri: &CanonicalUri) -> Option<EntityId>;
    fn entity_to_uri(&self, entity_id: &EntityId) -> Option<CanonicalUri>;
    fn entities_in_file(&self, repo: &str, package: &str, file: &str) -> Vec<EntityId>;
    /// `pattern` uses `*` as the only wildcard; matching is case-sensitive.
    fn find_by_pattern(&self, pattern: &str) -> Vec<EntityId>;
}

/// In-memory [`SymbolIndex`], used by tests and as the default index before
/// a package has ever been written to the seed store.
#[derive(Debug, Default)]
pub struct InMemorySymbolIndex {
    entries: Vec<(EntityId, CanonicalUri)>,
    by_file: BTreeMap<(String, String, String), Vec<usize>>,
}

impl InMemorySymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity_id: EntityId, uri: CanonicalUri) {
        let key = (uri.repo.clone(), uri.package.clone(), uri.file.clone());
        let idx = self.entries.len();
        self.entries.push((entity_id, uri));
        self.by_file.entry(key).or_default().push(idx);
    }
}

impl SymbolIndex for InMemorySymbolIndex {
    fn uri_to_entity(&self, uri: &CanonicalUri) -> Option<EntityId> {
        self.entries
            .iter()
            .find(|(_, candidate)| candidate == uri)
            .map(|(id, _)| id.clone())
    }

    fn entity_to_uri(&self, entity_id: &EntityId) -> Option<CanonicalUri> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == entity_id)
            .map(|(_, uri)| uri.clone())
    }

    fn entities_in_file(&self, repo: &str, package: &str, file: &str) -> Vec<EntityId> {
        let key = (repo.to_string(), package.to_string(), file.to_string());
        self.by_file
            .get(&key)
            .into_iter()
            .flatten()
            .map(|&idx| self.entries[idx].0.clone())
            .collect()
    }

    fn find_by_pattern(&self, pattern: &str) -> Vec<EntityId> {
        self.entries
            .iter()
            .filter(|(_, uri)| uri.symbol_path.as_deref().is_some_and(|name| matches_wildcard(pattern, name)))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

/// Matches `text` against `pattern`, where `*` in `pattern` matches any run
/// of characters (including none). Case-sensitive.
fn matches_wildcard(pattern: &str, text: &str) -> bool {
    let segments: Vec<&str> = pattern.split('*').collect();
    if segments.len() == 1 {
        return pattern == text;
    }

    let mut pos = 0usize;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            if !text[pos..].starts_with(segment) {
                return false;
            }
            pos += segment.len();
        } else if i == segments.len() - 1 {
            return text[pos..].ends_with(segment);
        } else {
            match text[pos..].find(segment) {
                Some(found) => pos += found + segment.len(),
                None => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    #[test]
    fn wildcard_matches_prefix_suffix_and_middle() {
        assert!(matches_wildcard("Widget*", "WidgetRenderer"));
        assert!(matches_wildcard("*Renderer", "WidgetRenderer"));
        assert!(matches_wildcard("*render*", "prerenderPost"));
        assert!(!matches_wildcard("Widget*", "widgetRenderer"));
        assert!(matches_wildcard("*", "anything"));
    }

    #[test]
    fn in_memory_index_round_trips_uri_and_entity() {
        let mut index = InMemorySymbolIndex::new();
        let entity = EntityId::compute("acme", "core", NodeKind::Function, "a.ts:f");
        let uri = CanonicalUri::parse("devac://acme/core/a.ts#f").unwrap();
        index.insert(entity.clone(), uri.clone());

        assert_eq!(index.uri_to_entity(&uri), Some(entity.clone()));
        assert_eq!(index.entity_to_uri(&entity), Some(uri));
        assert_eq!(index.entities_in_file("acme", "core", "a.ts"), vec![entity]);
    }

    #[test]
    fn in_memory_index_finds_by_pattern() {
        let mut index = InMemorySymbolIndex::new();
        let render = EntityId::compute("acme", "core", NodeKind::Method, "a.ts:Widget.render");
        let render_uri = CanonicalUri::parse("devac://acme/core/a.ts#Widget.render").unwrap();
        index.insert(render.clone(), render_uri);

        let other = EntityId::compute("acme", "core", NodeKind::Function, "a.ts:f");
        let other_uri = CanonicalUri::parse("devac://acme/core/a.ts#parseFoo").unwrap();
        index.insert(other.clone(), other_uri);

        let found = index.find_by_pattern("Widget*");
        assert_eq!(found, vec![render]);

        let found = index.find_by_pattern("*Foo");
        assert_eq!(found, vec![other]);
    }
}
