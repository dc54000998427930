//! The dialogue state machine: submits context, validates completions,
//! retries once with a format reminder, and commits the result to both the
//! full transcript and the bounded context window.
//!
//! Progress beats perfection: a turn that reaches the provider always ends in
//! a committed segment with three choices, even if the provider misbehaves.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::compactor::{self, CompactionState};
use crate::completion::{CompletionService, STORY_SAMPLING};
use crate::error::EngineError;
use crate::parser::{self, StorySegment};
use crate::prompt::{FORMAT_REMINDER, GLITCH_CHOICES, GLITCH_NARRATIVE, OPENING_SCENE};
use crate::turn::{Transcript, Turn};

/// Transport retries allowed while starting a session, with exponential
/// backoff in between. Mid-session transport failures never retry; they
/// substitute a canned segment instead.
pub const FIRST_TURN_MAX_ATTEMPTS: u32 = 3;
const FIRST_TURN_BACKOFF: Duration = Duration::from_millis(500);

/// Where the engine is in a turn. A new submission is only accepted in
/// `Idle`; everything else means a request is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    AwaitingCompletion,
    Validating,
    Retrying,
    Forced,
}

pub struct StoryEngine {
    service: Arc<dyn CompletionService>,
    transcript: Transcript,
    compaction: CompactionState,
    segment: StorySegment,
    phase: EnginePhase,
}

impl StoryEngine {
    /// Starts a fresh session: composes the opening narrator turn by asking
    /// the service to continue the premise, folding opening scene and first
    /// continuation into one turn so player/narrator alternation holds from
    /// the start.
    pub async fn new_session(
        service: Arc<dyn CompletionService>,
        director: String,
    ) -> Result<Self, EngineError> {
        let probe = vec![
            Turn::director(director.clone()),
            Turn::narrator(OPENING_SCENE),
        ];

        let mut attempt = 0;
        let raw = loop {
            match service.complete(&probe, STORY_SAMPLING).await {
                Ok(raw) => break raw,
                Err(e) => {
                    attempt += 1;
                    if attempt >= FIRST_TURN_MAX_ATTEMPTS {
                        return Err(EngineError::MaxAttemptsReached);
                    }
                    let backoff = FIRST_TURN_BACKOFF * 2u32.pow(attempt - 1);
                    warn!("opening completion failed (attempt {attempt}): {e:#}");
                    tokio::time::sleep(backoff).await;
                }
            }
        };

        let mut parsed = parser::parse(&raw);
        if !parsed.well_formed {
            let mut reminder_probe = probe.clone();
            reminder_probe.push(Turn::director(FORMAT_REMINDER.trim()));
            if let Ok(retry_raw) = service.complete(&reminder_probe, STORY_SAMPLING).await {
                parsed = parser::parse(&retry_raw);
            }
        }

        let continuation = parsed.segment;
        let segment = StorySegment {
            narrative: format!("{}\n\n{}", OPENING_SCENE, continuation.narrative),
            choices: continuation.choices,
        };
        let transcript = Transcript::open(director, segment.to_formatted());

        Ok(StoryEngine {
            service,
            transcript,
            compaction: CompactionState::default(),
            segment,
            phase: EnginePhase::Idle,
        })
    }

    /// Rebuilds an engine from persisted state.
    pub fn restore(
        service: Arc<dyn CompletionService>,
        transcript: Transcript,
        segment: StorySegment,
        compaction: CompactionState,
    ) -> Self {
        StoryEngine {
            service,
            transcript,
            compaction,
            segment,
            phase: EnginePhase::Idle,
        }
    }

    pub fn segment(&self) -> &StorySegment {
        &self.segment
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn compaction(&self) -> &CompactionState {
        &self.compaction
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// Plays one turn. An out-of-range index or a submission while a turn is
    /// in flight is rejected with state unchanged; everything past that point
    /// commits a segment.
    pub async fn submit_choice(&mut self, index: usize) -> Result<&StorySegment, EngineError> {
        if self.phase != EnginePhase::Idle {
            return Err(EngineError::Busy);
        }
        if index >= self.segment.choices.len() {
            return Err(EngineError::InvalidChoice {
                index,
                available: self.segment.choices.len(),
            });
        }

        let action = self.segment.choices[index].clone();
        self.transcript
            .push(Turn::player(format!("I choose to: {action}")))?;
        self.phase = EnginePhase::AwaitingCompletion;

        if compactor::should_compact(&self.transcript, &self.compaction) {
            info!("context window reached compaction threshold");
            self.compaction =
                compactor::compact(&self.transcript, &self.compaction, self.service.as_ref())
                    .await;
        }

        let context = compactor::build_context(&self.transcript, &self.compaction);
        let raw = match self.service.complete(&context, STORY_SAMPLING).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("the universe glitches: {e:#}");
                return self.commit_canned();
            }
        };

        self.phase = EnginePhase::Validating;
        let mut parsed = parser::parse(&raw);

        if !parsed.well_formed {
            // Exactly one stricter retry, then accept whatever comes back.
            self.phase = EnginePhase::Retrying;
            let mut reminder_context = context;
            reminder_context.push(Turn::director(FORMAT_REMINDER.trim()));
            match self
                .service
                .complete(&reminder_context, STORY_SAMPLING)
                .await
            {
                Ok(retry_raw) => {
                    parsed = parser::parse(&retry_raw);
                    if !parsed.well_formed {
                        self.phase = EnginePhase::Forced;
                    }
                }
                Err(e) => {
                    warn!("format retry failed: {e:#}");
                    return self.commit_canned();
                }
            }
        }

        self.commit(parsed.segment)
    }

    fn commit(&mut self, segment: StorySegment) -> Result<&StorySegment, EngineError> {
        self.transcript
            .push(Turn::narrator(segment.to_formatted()))?;
        self.segment = segment;
        self.phase = EnginePhase::Idle;
        Ok(&self.segment)
    }

    /// Mid-session transport failure: substitute a canned glitch segment so
    /// the session never deadlocks.
    fn commit_canned(&mut self) -> Result<&StorySegment, EngineError> {
        let segment = StorySegment {
            narrative: GLITCH_NARRATIVE.to_string(),
            choices: GLITCH_CHOICES.iter().map(|c| c.to_string()).collect(),
        };
        self.commit(segment)
    }
}
