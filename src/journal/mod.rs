//! Journal store: the ordered collection of sighting entries.
//!
//! The journal is the single source of truth for entries. It is loaded once
//! at startup and every mutation persists the full collection synchronously
//! before returning, so the in-memory list and the stored copy never
//! diverge across a successful call. Persistence failures are logged and
//! the in-memory mutation stands (optimistic update).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::analysis::AnalysisResult;
use crate::store::DurableStore;

pub const JOURNAL_KEY: &str = "journal";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

/// Stored media payload: the raw bytes as a base64 data URL plus the MIME
/// tag they were captured with. Immutable after entry creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRef {
    pub data_url: String,
    pub mime_type: String,
}

/// One logged wildlife observation with its AI-generated report.
///
/// Apart from `chat_history` every field is write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SightingEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub media: MediaRef,
    pub analysis: AnalysisResult,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
}

/// Entry fields supplied by the caller; the id and chat history are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub created_at: DateTime<Utc>,
    pub media: MediaRef,
    pub analysis: AnalysisResult,
    pub is_favorite: bool,
}

/// Generate a unique entry id. The atomic counter keeps ids unique even
/// when several entries land within the same millisecond.
fn next_entry_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("sighting-{}-{}", Utc::now().timestamp_millis(), seq)
}

pub struct JournalStore {
    store: Rc<DurableStore>,
    entries: Vec<SightingEntry>,
}

impl JournalStore {
    /// Load the journal from durable storage. Absent or corrupt persisted
    /// state yields an empty journal, never an error.
    pub fn load(store: Rc<DurableStore>) -> Self {
        let entries = match store.get_json::<Vec<SightingEntry>>(JOURNAL_KEY) {
            Ok(Some(entries)) => entries,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load journal entries");
                Vec::new()
            }
        };
        Self { store, entries }
    }

    /// All entries, newest first.
    pub fn entries(&self) -> &[SightingEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&SightingEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn persist(&self) {
        if let Err(e) = self.store.set_json(JOURNAL_KEY, &self.entries) {
            tracing::error!(error = %e, "Failed to persist journal entries");
        }
    }

    /// Create an entry from a draft, prepend it, and persist. Returns the
    /// stored record with its assigned id.
    pub fn add_entry(&mut self, draft: EntryDraft) -> &SightingEntry {
        let entry = SightingEntry {
            id: next_entry_id(),
            created_at: draft.created_at,
            media: draft.media,
            analysis: draft.analysis,
            is_favorite: draft.is_favorite,
            chat_history: Vec::new(),
        };
        self.entries.insert(0, entry);
        self.persist();
        &self.entries[0]
    }

    /// Remove the entry with the given id. Silent no-op when absent.
    pub fn remove_entry(&mut self, id: &str) {
        self.entries.retain(|e| e.id != id);
        self.persist();
    }

    /// Replace the chat history of the matching entry; every other field is
    /// untouched. Silent no-op when the id is unknown.
    pub fn update_chat_history(&mut self, id: &str, turns: Vec<ChatTurn>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.chat_history = turns;
            self.persist();
        }
    }

    /// Empty the journal and delete the persisted key entirely (a full
    /// reset, distinct from persisting an empty list).
    pub fn clear(&mut self) {
        self.entries.clear();
        if let Err(e) = self.store.remove(JOURNAL_KEY) {
            tracing::error!(error = %e, "Failed to clear persisted journal");
        }
    }

    /// Count of entries whose conservation status is in the endangered set.
    pub fn endangered_count(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| e.analysis.conservation_status.is_endangered())
            .count() as u64
    }

    pub fn favorites(&self) -> impl Iterator<Item = &SightingEntry> {
        self.entries.iter().filter(|e| e.is_favorite)
    }

    /// Most recently logged endangered favorite; the subject shown when a
    /// hope spotlight unlocks.
    pub fn latest_endangered_favorite(&self) -> Option<&SightingEntry> {
        self.entries
            .iter()
            .find(|e| e.is_favorite && e.analysis.conservation_status.is_endangered())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisResult, ConservationStatus};

    fn sample_analysis(subject: &str, status: ConservationStatus) -> AnalysisResult {
        AnalysisResult {
            is_animal_or_plant: true,
            subject_name: subject.to_string(),
            description: format!("Field notes on the {}.", subject),
            conservation_status: status,
            population_trend: Default::default(),
            primary_threats: vec!["Habitat Loss".to_string()],
            estimated_location: "Yellowstone, USA".to_string(),
            ecosystem: "Temperate Forest".to_string(),
            coordinates: Default::default(),
            suggested_missions: Vec::new(),
        }
    }

    fn draft(subject: &str, status: ConservationStatus) -> EntryDraft {
        EntryDraft {
            created_at: Utc::now(),
            media: MediaRef {
                data_url: "data:image/jpeg;base64,AAAA".to_string(),
                mime_type: "image/jpeg".to_string(),
            },
            analysis: sample_analysis(subject, status),
            is_favorite: false,
        }
    }

    fn store() -> Rc<DurableStore> {
        Rc::new(DurableStore::open_in_memory().unwrap())
    }

    #[test]
    fn test_add_entries_newest_first() {
        let mut journal = JournalStore::load(store());
        let first = journal.add_entry(draft("Red Fox", ConservationStatus::LC)).id.clone();
        let second = journal.add_entry(draft("Snow Leopard", ConservationStatus::VU)).id.clone();
        assert_ne!(first, second);
        let subjects: Vec<&str> = journal
            .entries()
            .iter()
            .map(|e| e.analysis.subject_name.as_str())
            .collect();
        assert_eq!(subjects, vec!["Snow Leopard", "Red Fox"]);
    }

    #[test]
    fn test_remove_entry_keeps_others() {
        let mut journal = JournalStore::load(store());
        journal.add_entry(draft("A", ConservationStatus::LC));
        let id = journal.add_entry(draft("B", ConservationStatus::LC)).id.clone();
        journal.add_entry(draft("C", ConservationStatus::LC));

        journal.remove_entry(&id);
        assert_eq!(journal.entries().len(), 2);
        assert!(journal.get(&id).is_none());

        // Removing an unknown id is a silent no-op.
        journal.remove_entry("sighting-0-0");
        assert_eq!(journal.entries().len(), 2);
    }

    #[test]
    fn test_update_chat_history_only_touches_target() {
        let mut journal = JournalStore::load(store());
        let id = journal.add_entry(draft("Koala", ConservationStatus::VU)).id.clone();
        journal.add_entry(draft("Emu", ConservationStatus::LC));

        let turns = vec![
            ChatTurn { role: ChatRole::User, text: "Hello!".to_string() },
            ChatTurn { role: ChatRole::Agent, text: "G'day, explorer!".to_string() },
        ];
        journal.update_chat_history(&id, turns.clone());

        assert_eq!(journal.get(&id).unwrap().chat_history, turns);
        assert!(journal.entries()[0].chat_history.is_empty());
        assert_eq!(journal.get(&id).unwrap().analysis.subject_name, "Koala");
    }

    #[test]
    fn test_persists_across_reload() {
        let store = store();
        {
            let mut journal = JournalStore::load(Rc::clone(&store));
            journal.add_entry(draft("Kakapo", ConservationStatus::CR));
        }
        let journal = JournalStore::load(store);
        assert_eq!(journal.entries().len(), 1);
        assert_eq!(journal.entries()[0].analysis.subject_name, "Kakapo");
    }

    #[test]
    fn test_clear_removes_persisted_key() {
        let store = store();
        let mut journal = JournalStore::load(Rc::clone(&store));
        journal.add_entry(draft("A", ConservationStatus::LC));
        journal.clear();
        assert!(journal.entries().is_empty());
        assert!(store.get(JOURNAL_KEY).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_persisted_journal_loads_empty() {
        let store = store();
        store
            .set(JOURNAL_KEY, &serde_json::json!({"not": "an array"}))
            .unwrap();
        let journal = JournalStore::load(store);
        assert!(journal.entries().is_empty());
    }

    #[test]
    fn test_endangered_count() {
        let mut journal = JournalStore::load(store());
        journal.add_entry(draft("Red Fox", ConservationStatus::LC));
        journal.add_entry(draft("Snow Leopard", ConservationStatus::VU));
        journal.add_entry(draft("Kakapo", ConservationStatus::CR));
        assert_eq!(journal.endangered_count(), 2);
    }

    #[test]
    fn test_latest_endangered_favorite() {
        let mut journal = JournalStore::load(store());
        let mut fav = draft("Snow Leopard", ConservationStatus::VU);
        fav.is_favorite = true;
        journal.add_entry(fav);
        journal.add_entry(draft("Tiger", ConservationStatus::EN)); // not favorite
        let mut fav2 = draft("Red Fox", ConservationStatus::LC); // favorite, not endangered
        fav2.is_favorite = true;
        journal.add_entry(fav2);

        let subject = journal
            .latest_endangered_favorite()
            .map(|e| e.analysis.subject_name.as_str());
        assert_eq!(subject, Some("Snow Leopard"));
    }
}
