// ../tests/tests.rs
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reality_glitch::completion::SamplingParams;
use reality_glitch::*;
use tempfile::tempdir;

const WELL_FORMED: &str =
    "Story: The device hums louder.\n\nChoices:\n1. Touch it\n2. Name it\n3. Unplug the fridge";

/// Plays back a queue of scripted responses and records every request it
/// sees. Once the script runs out it keeps answering well-formed text.
struct ScriptedService {
    responses: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedService {
    fn new(responses: Vec<Result<String, CompletionError>>) -> Arc<Self> {
        Arc::new(ScriptedService {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn request(&self, index: usize) -> Vec<Turn> {
        self.requests.lock().unwrap()[index].clone()
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn complete(
        &self,
        turns: &[Turn],
        _params: SamplingParams,
    ) -> Result<String, CompletionError> {
        self.requests.lock().unwrap().push(turns.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(WELL_FORMED.to_string()))
    }
}

fn transport_err() -> Result<String, CompletionError> {
    Err(CompletionError::Transport("connection refused".into()))
}

async fn started_engine(service: Arc<ScriptedService>) -> StoryEngine {
    StoryEngine::new_session(service, "Narrate the glitch.".to_string())
        .await
        .expect("session should start")
}

#[tokio::test]
async fn well_formed_responses_commit_without_a_retry() {
    let service = ScriptedService::new(vec![]);
    let mut engine = started_engine(service.clone()).await;
    assert_eq!(service.request_count(), 1);

    let segment = engine.submit_choice(0).await.unwrap().clone();
    assert_eq!(segment.choices.len(), 3);
    assert_eq!(segment.narrative, "The device hums louder.");
    // One opening call plus one story call; no format retry happened.
    assert_eq!(service.request_count(), 2);
    assert_eq!(engine.phase(), EnginePhase::Idle);
}

#[tokio::test]
async fn malformed_response_triggers_one_stricter_retry() {
    let service = ScriptedService::new(vec![
        Ok(WELL_FORMED.to_string()),
        Ok("The aliens blink at you in confused silence.".to_string()),
        Ok(WELL_FORMED.to_string()),
    ]);
    let mut engine = started_engine(service.clone()).await;

    let segment = engine.submit_choice(1).await.unwrap().clone();
    assert_eq!(segment.narrative, "The device hums louder.");
    assert_eq!(service.request_count(), 3);

    // The retry carried an extra director turn with the format reminder.
    let retry_request = service.request(2);
    let reminder = retry_request.last().unwrap();
    assert_eq!(reminder.role, Role::Director);
    assert!(reminder.content.contains("CRITICAL FORMAT REMINDER"));
}

#[tokio::test]
async fn a_twice_malformed_response_is_forced_into_shape() {
    let service = ScriptedService::new(vec![
        Ok(WELL_FORMED.to_string()),
        Ok("no structure here".to_string()),
        Ok("Still just prose about a humming device.".to_string()),
    ]);
    let mut engine = started_engine(service.clone()).await;

    let segment = engine.submit_choice(0).await.unwrap().clone();
    // Fallback synthesis keeps the three-choice contract alive.
    assert_eq!(segment.choices.len(), 3);
    assert!(!segment.narrative.is_empty());
    for choice in &segment.choices {
        assert!(!choice.is_empty());
        assert!(!(choice.starts_with('[') && choice.ends_with(']')));
    }
    assert_eq!(engine.phase(), EnginePhase::Idle);
}

#[tokio::test]
async fn mid_session_transport_failure_substitutes_a_canned_segment() {
    let service = ScriptedService::new(vec![Ok(WELL_FORMED.to_string()), transport_err()]);
    let mut engine = started_engine(service.clone()).await;
    let before = engine.transcript().len();

    let segment = engine.submit_choice(2).await.unwrap().clone();
    assert!(segment.narrative.contains("universe glitches"));
    assert_eq!(segment.choices.len(), 3);

    // The canned turn is committed like any other, keeping alternation.
    let transcript = engine.transcript();
    assert_eq!(transcript.len(), before + 2);
    let turns = transcript.turns();
    assert_eq!(turns[turns.len() - 2].role, Role::Player);
    assert_eq!(turns[turns.len() - 1].role, Role::Narrator);
    assert_eq!(engine.phase(), EnginePhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn opening_transport_failures_give_up_after_bounded_retries() {
    let service = ScriptedService::new(vec![transport_err(), transport_err(), transport_err()]);
    let result = StoryEngine::new_session(service.clone(), "Narrate.".to_string()).await;
    assert!(matches!(result, Err(EngineError::MaxAttemptsReached)));
    assert_eq!(
        service.request_count() as u32,
        engine::FIRST_TURN_MAX_ATTEMPTS
    );
}

#[tokio::test]
async fn invalid_choice_is_rejected_with_state_unchanged() {
    let service = ScriptedService::new(vec![]);
    let mut engine = started_engine(service.clone()).await;
    let before = engine.transcript().len();

    let result = engine.submit_choice(7).await;
    assert!(matches!(
        result,
        Err(EngineError::InvalidChoice {
            index: 7,
            available: 3
        })
    ));
    assert_eq!(engine.transcript().len(), before);
    assert_eq!(engine.phase(), EnginePhase::Idle);
    // The rejected submission never reached the service.
    assert_eq!(service.request_count(), 1);
}

#[tokio::test]
async fn long_sessions_compact_but_the_transcript_keeps_growing() {
    let service = ScriptedService::new(vec![]);
    let mut engine = started_engine(service.clone()).await;

    let mut last_len = engine.transcript().len();
    for _ in 0..6 {
        engine.submit_choice(0).await.unwrap();
        assert!(engine.transcript().len() > last_len);
        last_len = engine.transcript().len();

        let window = compactor::build_context(engine.transcript(), engine.compaction());
        assert!(window.len() <= engine.transcript().len());
        assert_eq!(window[0].role, Role::Director);
    }

    // Five completed pairs trigger a compaction on the sixth submission.
    assert_eq!(engine.compaction().compaction_count, 1);
    assert!(engine.compaction().summary.is_some());

    let window = compactor::build_context(engine.transcript(), engine.compaction());
    let directors = window.iter().filter(|t| t.role == Role::Director).count();
    assert_eq!(directors, 2); // persona plus the synthetic summary turn
}

#[tokio::test]
async fn sessions_save_and_load_through_the_store() {
    let dir = tempdir().unwrap();
    let service = ScriptedService::new(vec![]);
    let saves = SaveManager::with_dir(dir.path());

    let mut session = StorySession::new_session(service.clone(), saves, None)
        .await
        .unwrap();
    let saved_segment = session.segment().clone();
    let id = session.save(None, Some("the hum".to_string())).unwrap();

    // Play on, then roll back to the save.
    session.submit_choice(0).await.unwrap();
    let reloaded = session.load(id).unwrap().clone();
    assert_eq!(reloaded, saved_segment);
    assert_eq!(session.title(), "the hum");

    let listing = session.list_saves();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].id, id);
    assert_eq!(listing[0].choices_preview.len(), 3);
}

#[tokio::test]
async fn loading_a_missing_save_leaves_the_session_intact() {
    let dir = tempdir().unwrap();
    let service = ScriptedService::new(vec![]);
    let saves = SaveManager::with_dir(dir.path());

    let mut session = StorySession::new_session(service, saves, None)
        .await
        .unwrap();
    let current = session.segment().clone();

    let missing = uuid::Uuid::new_v4();
    assert!(session.load(missing).is_err());
    assert_eq!(session.segment(), &current);
}
