pub mod compactor;
pub mod completion;
pub mod engine;
pub mod error;
pub mod glitch;
pub mod logging;
pub mod parser;
pub mod prompt;
pub mod providers;
pub mod save;
pub mod session;
pub mod settings;
pub mod turn;

// Re-export commonly used items for easier access
pub use compactor::CompactionState;
pub use completion::{CompletionService, OpenAiService, SamplingParams};
pub use engine::{EnginePhase, StoryEngine};
pub use error::{AppError, CompletionError, EngineError, SaveError};
pub use glitch::{GlitchIntensity, GlitchProfile, SignalAggregator, SignalSnapshot};
pub use parser::StorySegment;
pub use save::{SaveManager, SaveRecord, SaveSummary};
pub use session::StorySession;
pub use settings::Settings;
pub use turn::{Role, Transcript, Turn};
