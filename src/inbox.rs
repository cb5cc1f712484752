use crate::classifier::ClassificationMap;
use crate::normalization::CanonicalRecord;

/// Identifies one listing request. Only the most recently issued token may
/// replace the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchToken(u64);

/// Caller-side view of the current listing.
///
/// A new fetch supersedes every fetch started before it: results that arrive
/// for an older token are dropped instead of overwriting newer state.
#[derive(Debug, Default)]
pub struct InboxState {
    generation: u64,
    records: Vec<CanonicalRecord>,
}

impl InboxState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_fetch(&mut self) -> FetchToken {
        self.generation += 1;
        FetchToken(self.generation)
    }

    pub fn is_current(&self, token: FetchToken) -> bool {
        token.0 == self.generation
    }

    /// Install `records` if `token` is still current. Returns whether they
    /// were applied.
    pub fn complete_fetch(&mut self, token: FetchToken, records: Vec<CanonicalRecord>) -> bool {
        if !self.is_current(token) {
            log::debug!(
                "Dropping stale listing (generation {} superseded by {})",
                token.0,
                self.generation
            );
            return false;
        }
        self.records = records;
        true
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    /// Attach each record's entry from `map`, if it has one. Records with no
    /// entry keep whatever they had.
    pub fn apply_classifications(&mut self, map: &ClassificationMap) -> usize {
        let mut attached = 0;
        for record in &mut self.records {
            if let Some(classification) = map.get(&record.id) {
                record.classification = Some(classification.clone());
                attached += 1;
            }
        }
        attached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Category, Classification, Signal};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn record(id: &str) -> CanonicalRecord {
        CanonicalRecord {
            id: id.to_string(),
            sender: "s".to_string(),
            subject: "x".to_string(),
            snippet: String::new(),
            body_preview: String::new(),
            date: String::new(),
            classification: None,
        }
    }

    #[test]
    fn test_stale_completion_is_discarded() {
        let mut state = InboxState::new();
        let first = state.begin_fetch();
        let second = state.begin_fetch();

        assert!(state.complete_fetch(second, vec![record("new")]));
        assert!(!state.complete_fetch(first, vec![record("old")]));
        assert_eq!(state.records().len(), 1);
        assert_eq!(state.records()[0].id, "new");
    }

    #[test]
    fn test_apply_classifications_by_id() {
        let mut state = InboxState::new();
        let token = state.begin_fetch();
        state.complete_fetch(token, vec![record("a"), record("b")]);

        let mut map = ClassificationMap::new();
        map.merge(
            ["a"],
            vec![Classification {
                id: "a".to_string(),
                category: Category::Social,
                signal: Signal::Confidence { confidence: 0.7 },
                reasoning: "friend request".to_string(),
            }],
        );

        assert_eq!(state.apply_classifications(&map), 1);
        assert_eq!(
            state.records()[0].classification.as_ref().map(|c| c.category),
            Some(Category::Social)
        );
        assert!(state.records()[1].classification.is_none());
    }

    #[tokio::test]
    async fn test_slow_earlier_fetch_cannot_overwrite_newer() {
        let state = Arc::new(Mutex::new(InboxState::new()));

        let slow_token = state.lock().unwrap().begin_fetch();
        let slow_state = Arc::clone(&state);
        let slow = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            slow_state
                .lock()
                .unwrap()
                .complete_fetch(slow_token, vec![record("stale")])
        });

        let fast_token = state.lock().unwrap().begin_fetch();
        assert!(state
            .lock()
            .unwrap()
            .complete_fetch(fast_token, vec![record("fresh"), record("fresh2")]));

        assert!(!slow.await.unwrap());
        let guard = state.lock().unwrap();
        assert_eq!(guard.records().len(), 2);
        assert_eq!(guard.records()[0].id, "fresh");
    }
}
