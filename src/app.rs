//! Application state: wires the stores, engine, and analysis client
//! together and exposes the operations the presentation layer drives.
//!
//! Submissions are synchronous, so only one analysis is ever in flight; a
//! second submission cannot start while one is pending.

use anyhow::{anyhow, Result};
use chrono::Utc;
use std::path::Path;
use std::rc::Rc;

use crate::analysis::AnalysisClient;
use crate::config::Config;
use crate::ingest::{self, IngestError, IngestOutcome};
use crate::journal::{ChatRole, ChatTurn, JournalStore};
use crate::scout::{ProgressionEngine, Rank};
use crate::store::DurableStore;

const EMPTY_JOURNAL_WELCOME: &str = "Welcome, Eco-Scout! The planet needs our help to listen to its stories. Your photos, videos, and sounds are valuable data. Let's start our first field mission.";

/// The screen the presentation layer should be showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Capture,
    Explorer,
    Journal,
    Hub,
}

/// A hope-spotlight ready for display. The story is best-effort: a failed
/// fetch still shows the spotlight, just without one.
#[derive(Debug, Clone)]
pub struct HopeSpotlight {
    pub subject_name: String,
    pub story: Option<String>,
}

pub struct App {
    pub config: Config,
    pub journal: JournalStore,
    pub engine: ProgressionEngine,
    client: AnalysisClient,
    view: View,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let store = Rc::new(DurableStore::open(&config.db_path)?);
        let client = AnalysisClient::from_config(&config.analysis);
        Ok(Self::assemble(config, store, client))
    }

    /// Build from explicit parts; tests use this with an in-memory store
    /// and a scripted client.
    pub fn assemble(config: Config, store: Rc<DurableStore>, client: AnalysisClient) -> Self {
        let journal = JournalStore::load(Rc::clone(&store));
        let engine = ProgressionEngine::load(store, journal.entries());
        Self {
            config,
            journal,
            engine,
            client,
            view: View::Capture,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn set_view(&mut self, view: View) {
        self.view = view;
    }

    /// Submit a media file for analysis and, when accepted, log it. The
    /// view moves to the journal only after the XP award and endangered
    /// recording completed; any failure returns to capture.
    pub fn submit_media(
        &mut self,
        path: &Path,
        is_favorite: bool,
    ) -> Result<IngestOutcome, IngestError> {
        match ingest::ingest_media(
            path,
            is_favorite,
            &self.client,
            &mut self.journal,
            &mut self.engine,
        ) {
            Ok(outcome) => {
                self.view = View::Journal;
                Ok(outcome)
            }
            Err(e) => {
                self.view = View::Capture;
                Err(e)
            }
        }
    }

    /// Complete a mission suggested on a journal entry. Returns false when
    /// the mission was already completed.
    pub fn complete_mission(&mut self, entry_id: &str, title: &str) -> Result<bool> {
        let entry = self
            .journal
            .get(entry_id)
            .ok_or_else(|| anyhow!("No journal entry with id {}", entry_id))?;
        let mission = entry
            .analysis
            .suggested_missions
            .iter()
            .find(|m| m.title == title)
            .ok_or_else(|| {
                anyhow!("Entry {} suggests no mission titled \"{}\"", entry_id, title)
            })?;
        let xp = mission.xp;
        Ok(self.engine.complete_mission(title, xp))
    }

    /// Send a chat message to a logged subject and persist both turns.
    pub fn chat(&mut self, entry_id: &str, message: &str) -> Result<String> {
        let (subject, persona, history) = {
            let entry = self
                .journal
                .get(entry_id)
                .ok_or_else(|| anyhow!("No journal entry with id {}", entry_id))?;
            (
                entry.analysis.subject_name.clone(),
                entry.analysis.description.clone(),
                entry.chat_history.clone(),
            )
        };

        let reply = self
            .client
            .chat_reply(&subject, &persona, &history, message)?;

        let mut turns = history;
        turns.push(ChatTurn {
            role: ChatRole::User,
            text: message.to_string(),
        });
        turns.push(ChatTurn {
            role: ChatRole::Agent,
            text: reply.clone(),
        });
        self.journal.update_chat_history(entry_id, turns);

        Ok(reply)
    }

    /// Armed rank-up notification, if any.
    pub fn take_rank_up(&mut self) -> Option<Rank> {
        self.engine.rank_up().take()
    }

    pub fn acknowledge_rank_up(&mut self) {
        self.engine.rank_up().acknowledge();
    }

    /// Armed hope-spotlight, if any, with its subject and a best-effort
    /// story. An unlock with no endangered favorite to feature is consumed
    /// silently.
    pub fn take_hope_spotlight(&mut self) -> Option<HopeSpotlight> {
        if !self.engine.spotlight().take() {
            return None;
        }
        let subject = match self.journal.latest_endangered_favorite() {
            Some(entry) => entry.analysis.subject_name.clone(),
            None => {
                self.engine.spotlight().acknowledge();
                return None;
            }
        };
        let story = match self.client.hope_spotlight_story(&subject) {
            Ok(story) => Some(story),
            Err(e) => {
                tracing::warn!(error = %e, subject, "Hope-spotlight story fetch failed");
                None
            }
        };
        Some(HopeSpotlight {
            subject_name: subject,
            story,
        })
    }

    pub fn acknowledge_hope_spotlight(&mut self) {
        self.engine.spotlight().acknowledge();
    }

    /// Welcome message shown on startup: a check-in about a random
    /// favorite, or a fixed greeting for an empty journal.
    pub fn check_in(&self) -> Option<String> {
        if self.journal.entries().is_empty() {
            return Some(EMPTY_JOURNAL_WELCOME.to_string());
        }
        let favorites: Vec<_> = self.journal.favorites().collect();
        if favorites.is_empty() {
            return None;
        }
        let pick = Utc::now().timestamp_millis() as usize % favorites.len();
        let subject = &favorites[pick].analysis.subject_name;
        match self.client.check_in(subject) {
            Ok(message) => Some(message),
            Err(e) => {
                tracing::warn!(error = %e, "Check-in fetch failed");
                None
            }
        }
    }

    /// Clearing the journal also resets profile progress.
    pub fn clear_journal(&mut self) {
        self.journal.clear();
        self.engine.reset();
    }

    pub fn reset_profile(&mut self) {
        self.engine.reset();
    }
}
