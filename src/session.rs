//! The full surface the UI layer needs: new_session, submit_choice, save,
//! load and list_saves. Keyboard handling and rendering live elsewhere.

use std::sync::Arc;

use chrono::Local;
use log::info;
use uuid::Uuid;

use crate::completion::CompletionService;
use crate::engine::StoryEngine;
use crate::error::AppError;
use crate::glitch::GlitchProfile;
use crate::parser::StorySegment;
use crate::prompt;
use crate::save::{SaveManager, SaveRecord, SaveSummary};

const DEFAULT_TITLE: &str = "Untitled glitch";

pub struct StorySession {
    service: Arc<dyn CompletionService>,
    saves: SaveManager,
    engine: StoryEngine,
    save_id: Option<Uuid>,
    title: String,
}

impl StorySession {
    /// Starts a new story, optionally tinted by the current glitch profile.
    pub async fn new_session(
        service: Arc<dyn CompletionService>,
        saves: SaveManager,
        profile: Option<&GlitchProfile>,
    ) -> Result<Self, AppError> {
        let director = prompt::compose_director(profile);
        let engine = StoryEngine::new_session(service.clone(), director).await?;
        Ok(StorySession {
            service,
            saves,
            engine,
            save_id: None,
            title: DEFAULT_TITLE.to_string(),
        })
    }

    pub fn segment(&self) -> &StorySegment {
        self.engine.segment()
    }

    pub async fn submit_choice(&mut self, index: usize) -> Result<&StorySegment, AppError> {
        Ok(self.engine.submit_choice(index).await?)
    }

    /// Saves the session. A fresh id is minted on the first save; passing an
    /// id (or saving again) updates that record in place.
    pub fn save(&mut self, id: Option<Uuid>, title: Option<String>) -> Result<Uuid, AppError> {
        let id = id.or(self.save_id).unwrap_or_else(Uuid::new_v4);
        if let Some(title) = title {
            self.title = title;
        }

        let now = Local::now();
        // Keep the original creation time when updating an existing record.
        let created_at = self
            .saves
            .read(id)
            .map(|existing| existing.created_at)
            .unwrap_or(now);

        let record = SaveRecord {
            id,
            title: self.title.clone(),
            created_at,
            updated_at: now,
            transcript: self.engine.transcript().clone(),
            segment: self.engine.segment().clone(),
            compaction: self.engine.compaction().clone(),
        };
        self.saves.write(&record)?;
        self.save_id = Some(id);
        info!("saved story {id} ({})", self.title);
        Ok(id)
    }

    /// Replaces the running session with a saved one. The read happens first,
    /// so a failed load leaves the current session untouched.
    pub fn load(&mut self, id: Uuid) -> Result<&StorySegment, AppError> {
        let record = self.saves.read(id)?;
        self.engine = StoryEngine::restore(
            self.service.clone(),
            record.transcript,
            record.segment,
            record.compaction,
        );
        self.save_id = Some(record.id);
        self.title = record.title;
        info!("loaded story {id} ({})", self.title);
        Ok(self.engine.segment())
    }

    pub fn list_saves(&self) -> Vec<SaveSummary> {
        self.saves.list()
    }

    pub fn save_id(&self) -> Option<Uuid> {
        self.save_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}
