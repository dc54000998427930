use serde::{Deserialize, Serialize};

use crate::error::StoryError;

/// Who produced a turn: the director (system instructions), the narrator
/// (generated story text) or the player (a chosen action).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Director,
    Narrator,
    Player,
}

/// One exchange unit. Immutable once created; compaction produces new turn
/// sequences, it never rewrites existing turns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Turn {
            role,
            content: content.into(),
        }
    }

    pub fn director(content: impl Into<String>) -> Self {
        Turn::new(Role::Director, content)
    }

    pub fn narrator(content: impl Into<String>) -> Self {
        Turn::new(Role::Narrator, content)
    }

    pub fn player(content: impl Into<String>) -> Self {
        Turn::new(Role::Player, content)
    }
}

/// The full, append-only record of a session: one director turn, one opening
/// narrator turn, then strictly alternating player/narrator turns.
///
/// The transcript is the source of truth for persistence and never shrinks.
/// Only the context window derived from it (see `compactor`) is bounded.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Opens a new transcript with the director instructions and the opening
    /// scene.
    pub fn open(director: impl Into<String>, opening: impl Into<String>) -> Self {
        Transcript {
            turns: vec![Turn::director(director), Turn::narrator(opening)],
        }
    }

    /// Appends a turn, enforcing the alternation invariant: after the opening
    /// pair, player and narrator turns strictly alternate and no further
    /// director turns are recorded.
    pub fn push(&mut self, turn: Turn) -> Result<(), StoryError> {
        let valid = match (self.turns.last().map(|t| t.role), turn.role) {
            (None, Role::Director) => true,
            (Some(Role::Director), Role::Narrator) => true,
            (Some(Role::Narrator), Role::Player) => true,
            (Some(Role::Player), Role::Narrator) => true,
            _ => false,
        };
        if !valid {
            return Err(StoryError::BrokenAlternation {
                last: self.turns.last().map(|t| t.role),
                pushed: turn.role,
            });
        }
        self.turns.push(turn);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn director_turn(&self) -> Option<&Turn> {
        self.turns.first().filter(|t| t.role == Role::Director)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of completed (player, narrator) pairs at or after `start`.
    pub fn pairs_since(&self, start: usize) -> usize {
        let start = start.max(2); // skip the director/narrator opening
        self.turns[start.min(self.turns.len())..]
            .windows(2)
            .filter(|w| w[0].role == Role::Player && w[1].role == Role::Narrator)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story_transcript(pairs: usize) -> Transcript {
        let mut t = Transcript::open("You are the narrator.", "An opening scene.");
        for i in 0..pairs {
            t.push(Turn::player(format!("choice {i}"))).unwrap();
            t.push(Turn::narrator(format!("scene {i}"))).unwrap();
        }
        t
    }

    #[test]
    fn transcript_opens_with_director_then_narrator() {
        let t = story_transcript(0);
        assert_eq!(t.turns()[0].role, Role::Director);
        assert_eq!(t.turns()[1].role, Role::Narrator);
    }

    #[test]
    fn alternation_is_enforced() {
        let mut t = story_transcript(1);
        // Narrator just spoke, so another narrator turn is rejected.
        assert!(t.push(Turn::narrator("again")).is_err());
        t.push(Turn::player("act")).unwrap();
        assert!(t.push(Turn::player("act twice")).is_err());
        // A director turn can never be appended mid-story.
        assert!(t.push(Turn::director("meddle")).is_err());
    }

    #[test]
    fn pair_counting_skips_the_opening() {
        let t = story_transcript(5);
        assert_eq!(t.len(), 12);
        assert_eq!(t.pairs_since(0), 5);
        assert_eq!(t.pairs_since(8), 2);
    }
}
