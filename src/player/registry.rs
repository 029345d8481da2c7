use std::collections::BTreeMap;

use crate::foundation::core::Rect;

/// A drawn object that later actions can refer to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Registered {
    /// Index into the storyboard's marks.
    pub mark: usize,
    /// Scene-space bounds of the mark.
    pub bounds: Rect,
}

/// Point ids and canonical multi-ids mapped to the last mark drawn for them.
///
/// Owned by one timeline run; a later draw under the same key replaces the earlier entry.
#[derive(Clone, Debug, Default)]
pub struct SceneObjectRegistry {
    entries: BTreeMap<String, Registered>,
}

impl SceneObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, mark: usize, bounds: Rect) {
        let key = key.into();
        if let Some(prev) = self.entries.insert(key.clone(), Registered { mark, bounds }) {
            tracing::debug!(key, previous = prev.mark, mark, "registry entry replaced");
        }
    }

    pub fn get(&self, key: &str) -> Option<&Registered> {
        self.entries.get(key)
    }

    /// Look up a highlight target: the raw id, then its characters sorted. When both exist
    /// the sorted form wins.
    pub fn resolve_highlight(&self, target: &str) -> Option<&Registered> {
        [target.to_owned(), sorted_chars(target)]
            .iter()
            .filter_map(|k| self.entries.get(k))
            .last()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Registry key for a figure defined by several points: the ids sorted and concatenated.
pub fn canonical_id<S: AsRef<str>>(ids: &[S]) -> String {
    let mut sorted: Vec<&str> = ids.iter().map(|s| s.as_ref()).collect();
    sorted.sort_unstable();
    sorted.concat()
}

/// The characters of `id` in sorted order.
pub fn sorted_chars(id: &str) -> String {
    let mut chars: Vec<char> = id.chars().collect();
    chars.sort_unstable();
    chars.into_iter().collect()
}
