use tracing::warn;
use uuid::Uuid;

/// Committed conversation identity with first-wins semantics per turn.
///
/// The committed value is mutated only through [`resolve`]; callers feed it
/// candidates from every carrier (response header, body field, turn-started
/// event) in priority order and the first valid one wins for the turn.
/// Differing candidates later in the same turn are anomalies: logged and
/// rejected. Across turns the identity is updatable.
///
/// [`resolve`]: ConversationIdResolver::resolve
#[derive(Debug, Default)]
pub struct ConversationIdResolver {
    current: Option<String>,
    committed_this_turn: bool,
}

impl ConversationIdResolver {
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Re-arm the per-turn latch; the committed identity itself persists.
    pub fn begin_turn(&mut self) {
        self.committed_this_turn = false;
    }

    /// Validate and commit a candidate identity. Returns `false` and leaves
    /// state untouched for empty, already-committed, malformed, or
    /// conflicting candidates.
    pub fn resolve(&mut self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return false;
        }
        if self.current.as_deref() == Some(candidate) {
            return false;
        }
        if !is_uuid_v4(candidate) {
            warn!(candidate, "rejecting malformed conversation id");
            return false;
        }
        if self.committed_this_turn {
            warn!(
                candidate,
                current = self.current.as_deref(),
                "conflicting conversation id within one turn"
            );
            return false;
        }

        self.current = Some(candidate.to_owned());
        self.committed_this_turn = true;
        true
    }
}

fn is_uuid_v4(candidate: &str) -> bool {
    Uuid::try_parse(candidate).is_ok_and(|id| id.get_version_num() == 4)
}

#[cfg(test)]
mod tests {
    use super::ConversationIdResolver;

    const ID_A: &str = "0b8f8a8e-7c25-4f43-9f3c-93e8f1a9b001";
    const ID_B: &str = "4dd4f7fa-90a5-4b29-8d1e-52a6a0f2c002";

    #[test]
    fn resolve_commits_a_valid_candidate_once() {
        let mut resolver = ConversationIdResolver::default();
        assert!(resolver.resolve(ID_A));
        assert_eq!(resolver.current(), Some(ID_A));

        // same value again: no-op
        assert!(!resolver.resolve(ID_A));
        // differing value within the same turn: anomaly, not an override
        assert!(!resolver.resolve(ID_B));
        assert_eq!(resolver.current(), Some(ID_A));
    }

    #[test]
    fn identity_is_updatable_across_turns() {
        let mut resolver = ConversationIdResolver::default();
        assert!(resolver.resolve(ID_A));

        resolver.begin_turn();
        assert!(resolver.resolve(ID_B));
        assert_eq!(resolver.current(), Some(ID_B));
    }

    #[test]
    fn malformed_candidates_are_rejected() {
        let mut resolver = ConversationIdResolver::default();
        assert!(!resolver.resolve(""));
        assert!(!resolver.resolve("not-a-uuid"));
        // v1-shaped uuid fails the v4 check
        assert!(!resolver.resolve("8c035a2e-0e2a-11ee-be56-0242ac120002"));
        assert_eq!(resolver.current(), None);
    }
}
