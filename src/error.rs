use thiserror::Error;

use crate::turn::Role;
use uuid::Uuid;

// Enum for handling various application-level errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Engine error: {:#}", 0)]
    Engine(#[from] EngineError), // Errors from the dialogue engine.

    #[error("Save error: {:#}", 0)]
    Save(#[from] SaveError), // Errors from the save store.

    #[error("Story error: {:#}", 0)]
    Story(#[from] StoryError), // Errors in transcript bookkeeping.

    #[error("Serialization error: {:#}", 0)]
    Serialization(#[from] serde_json::Error), // Errors related to data serialization.

    #[error("IO error: {:#}", 0)]
    IO(#[from] std::io::Error), // Input/output errors.

    #[error("No current story")]
    NoCurrentStory, // Error when no story session is active.
}

// Errors surfaced by the dialogue state machine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Completion error: {:#}", 0)]
    Completion(#[from] CompletionError), // Errors from the generation service.

    #[error("Choice index {index} out of range (have {available} choices)")]
    InvalidChoice { index: usize, available: usize }, // Caller error; state unchanged.

    #[error("A turn is already in flight")]
    Busy, // Concurrent submission is a programming error, not a feature.

    #[error("Max attempts reached starting the story")]
    MaxAttemptsReached, // First-turn transport retries exhausted.

    #[error("Story error: {:#}", 0)]
    Story(#[from] StoryError),
}

// Errors in transcript construction.
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("Turn ordering violated: {pushed:?} cannot follow {last:?}")]
    BrokenAlternation { last: Option<Role>, pushed: Role },
}

// Errors from the generation service, behind the CompletionService seam.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("OpenAI API error: {:#}", 0)]
    OpenAI(#[from] async_openai::error::OpenAIError), // Errors from the OpenAI API.

    #[error("Empty completion returned")]
    EmptyCompletion, // The provider answered with no message content.

    #[error("Transport error: {:#}", 0)]
    Transport(String), // Network-level failure reaching the provider.
}

// Errors from the save store. A failed save or load leaves the in-memory
// session untouched.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("No save found with id {0}")]
    NotFound(Uuid),

    #[error("Malformed save id: {0}")]
    InvalidId(String),

    #[error("IO error: {:#}", 0)]
    Io(#[from] std::io::Error),

    #[error("Corrupt save file: {:#}", 0)]
    Corrupt(#[from] serde_json::Error),
}
