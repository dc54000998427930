//! Bounds the provider-facing context window while the full transcript keeps
//! growing. Older turns are replaced by a generated prose summary; the
//! transcript itself is never truncated.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::completion::{CompletionService, SUMMARY_SAMPLING};
use crate::error::CompletionError;
use crate::prompt::{FALLBACK_SUMMARY, SUMMARIZER_PREAMBLE};
use crate::turn::{Role, Transcript, Turn};

/// Completed player/narrator pairs since the last compaction that trigger a
/// new one.
pub const COMPACT_AFTER_PAIRS: usize = 5;

/// Raw turns kept verbatim after the summary (two player/narrator pairs).
pub const KEEP_RECENT_TURNS: usize = 4;

/// Explicit compaction bookkeeping, persisted with a save so a loaded session
/// keeps its bounded window. `build_context` is a pure function of a
/// transcript and this state; there is no shared mutable message list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactionState {
    pub summary: Option<String>,
    pub summarized_until: usize,
    pub compaction_count: u32,
}

pub fn should_compact(transcript: &Transcript, state: &CompactionState) -> bool {
    transcript.pairs_since(state.summarized_until) >= COMPACT_AFTER_PAIRS
}

/// The turn sequence actually sent to the generation service: the full
/// transcript while the session is small, or `[director, summary, ...tail]`
/// once a compaction has happened. The original director turn is always
/// first and never duplicated.
pub fn build_context(transcript: &Transcript, state: &CompactionState) -> Vec<Turn> {
    let Some(summary) = &state.summary else {
        return transcript.turns().to_vec();
    };

    let mut window = Vec::with_capacity(2 + transcript.len() - state.summarized_until);
    if let Some(director) = transcript.director_turn() {
        window.push(director.clone());
    }
    window.push(Turn::director(format!(
        "STORY SUMMARY SO FAR: {summary}\n\nPlease continue the story based on this summary and the most recent exchanges."
    )));
    window.extend(
        transcript.turns()[state.summarized_until.min(transcript.len())..]
            .iter()
            .cloned(),
    );
    window
}

fn role_label(role: Role) -> &'static str {
    match role {
        Role::Director => "DIRECTOR",
        Role::Narrator => "NARRATOR",
        Role::Player => "PLAYER",
    }
}

async fn generate_summary(
    transcript: &Transcript,
    cut: usize,
    service: &dyn CompletionService,
) -> Result<String, CompletionError> {
    let story = transcript.turns()[1..cut]
        .iter()
        .map(|t| format!("{}: {}", role_label(t.role), t.content))
        .collect::<Vec<_>>()
        .join("\n\n");

    let request = vec![
        Turn::director(SUMMARIZER_PREAMBLE.trim()),
        Turn::player(format!(
            "Here is the story so far:\n\n{story}\n\nPlease summarize this narrative."
        )),
    ];
    let summary = service.complete(&request, SUMMARY_SAMPLING).await?;
    Ok(summary.trim().to_string())
}

/// Produces the next compaction state: everything except the most recent
/// `KEEP_RECENT_TURNS` turns is condensed into a fresh summary. Summary
/// failure is non-fatal; a generic placeholder keeps the story moving.
pub async fn compact(
    transcript: &Transcript,
    state: &CompactionState,
    service: &dyn CompletionService,
) -> CompactionState {
    let cut = transcript.len().saturating_sub(KEEP_RECENT_TURNS).max(1);

    let summary = match generate_summary(transcript, cut, service).await {
        Ok(summary) if !summary.is_empty() => summary,
        Ok(_) => FALLBACK_SUMMARY.to_string(),
        Err(e) => {
            warn!("summary generation failed, using placeholder: {e:#}");
            FALLBACK_SUMMARY.to_string()
        }
    };

    info!(
        "compacted transcript: {} turns summarized, {} kept",
        cut - 1,
        transcript.len() - cut
    );

    CompactionState {
        summary: Some(summary),
        summarized_until: cut,
        compaction_count: state.compaction_count + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::SamplingParams;
    use async_trait::async_trait;

    struct FixedSummary(&'static str);

    #[async_trait]
    impl CompletionService for FixedSummary {
        async fn complete(
            &self,
            _turns: &[Turn],
            _params: SamplingParams,
        ) -> Result<String, CompletionError> {
            Ok(self.0.to_string())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl CompletionService for Unreachable {
        async fn complete(
            &self,
            _turns: &[Turn],
            _params: SamplingParams,
        ) -> Result<String, CompletionError> {
            Err(CompletionError::Transport("connection refused".into()))
        }
    }

    fn transcript_with_pairs(pairs: usize) -> Transcript {
        let mut t = Transcript::open("Narrate.", "It begins.");
        for i in 0..pairs {
            t.push(Turn::player(format!("choice {i}"))).unwrap();
            t.push(Turn::narrator(format!("scene {i}"))).unwrap();
        }
        t
    }

    #[test]
    fn compaction_triggers_at_five_pairs() {
        let state = CompactionState::default();
        assert!(!should_compact(&transcript_with_pairs(4), &state));
        assert!(should_compact(&transcript_with_pairs(5), &state));
    }

    #[test]
    fn small_sessions_send_the_whole_transcript() {
        let transcript = transcript_with_pairs(2);
        let window = build_context(&transcript, &CompactionState::default());
        assert_eq!(window.len(), transcript.len());
    }

    #[tokio::test]
    async fn compacted_window_is_director_summary_and_tail() {
        let transcript = transcript_with_pairs(5);
        let state = compact(
            &transcript,
            &CompactionState::default(),
            &FixedSummary("Much has happened."),
        )
        .await;

        assert_eq!(state.compaction_count, 1);
        let window = build_context(&transcript, &state);
        assert_eq!(window.len(), 2 + KEEP_RECENT_TURNS);
        assert_eq!(window[0].role, Role::Director);
        assert_eq!(window[0].content, "Narrate.");
        assert!(window[1].content.contains("Much has happened."));
        assert_eq!(window.last().unwrap().content, "scene 4");
        assert!(window.len() <= transcript.len());
    }

    #[tokio::test]
    async fn recompacting_never_duplicates_the_director() {
        let mut transcript = transcript_with_pairs(5);
        let mut state = compact(
            &transcript,
            &CompactionState::default(),
            &FixedSummary("First act."),
        )
        .await;

        for i in 5..10 {
            transcript.push(Turn::player(format!("choice {i}"))).unwrap();
            transcript.push(Turn::narrator(format!("scene {i}"))).unwrap();
        }
        assert!(should_compact(&transcript, &state));
        state = compact(&transcript, &state, &FixedSummary("Second act.")).await;

        assert_eq!(state.compaction_count, 2);
        let window = build_context(&transcript, &state);
        let directors = window.iter().filter(|t| t.content == "Narrate.").count();
        assert_eq!(directors, 1);
        assert_eq!(window[0].role, Role::Director);
        assert!(window[1].content.contains("Second act."));
        assert_eq!(window.len(), 2 + KEEP_RECENT_TURNS);
    }

    #[tokio::test]
    async fn summary_failure_degrades_to_a_placeholder() {
        let transcript = transcript_with_pairs(5);
        let state = compact(&transcript, &CompactionState::default(), &Unreachable).await;
        assert_eq!(state.summary.as_deref(), Some(FALLBACK_SUMMARY));
        assert_eq!(state.compaction_count, 1);
    }
}
