//! First-match mapping lookup over an import description.

use crate::models::Mapping;

/// Mappings in their stored order with lower-cased matchers.
///
/// Lookup is a linear scan and the earliest matching mapping wins, even when a
/// later one has a longer or more specific matcher.
#[derive(Debug, Clone, Default)]
pub struct MappingMatcher {
    rules: Vec<(String, Mapping)>,
}

impl MappingMatcher {
    pub fn new(mappings: Vec<Mapping>) -> Self {
        let rules = mappings
            .into_iter()
            .map(|m| (m.matcher.to_lowercase(), m))
            .collect();
        Self { rules }
    }

    pub fn find(&self, description: &str) -> Option<&Mapping> {
        let description = description.to_lowercase();
        self.rules
            .iter()
            .find(|(matcher, _)| description.contains(matcher.as_str()))
            .map(|(_, mapping)| mapping)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
