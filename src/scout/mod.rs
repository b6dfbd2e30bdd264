//! Scout profile and progression engine.
//!
//! The profile is the single source of truth for XP, rank, and unlock
//! state. `rank`, `endangered_sightings_count`, and
//! `hope_spotlights_unlocked` are cached projections with fixed
//! recomputation rules, not independent state: the rank always equals
//! `Rank::from_xp(xp)`, and the endangered counter is re-derived from the
//! journal on every load instead of being trusted from storage.

pub mod signals;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::journal::SightingEntry;
use crate::store::DurableStore;
use signals::{RankUpSignal, SpotlightSignal};

pub const PROFILE_KEY: &str = "scout_profile";

/// Endangered sightings needed per hope-spotlight unlock.
pub const HOPE_SPOTLIGHT_THRESHOLD: u64 = 5;

/// Ranger ranks, a pure function of XP via fixed inclusive thresholds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum Rank {
    #[default]
    #[serde(rename = "Trainee Scout")]
    TraineeScout,
    #[serde(rename = "Field Ranger")]
    FieldRanger,
    #[serde(rename = "Ecosystem Guardian")]
    EcosystemGuardian,
    #[serde(rename = "Planet Ambassador")]
    PlanetAmbassador,
}

impl Rank {
    const THRESHOLDS: [(Rank, u64); 4] = [
        (Rank::TraineeScout, 0),
        (Rank::FieldRanger, 100),
        (Rank::EcosystemGuardian, 500),
        (Rank::PlanetAmbassador, 1500),
    ];

    /// Highest rank whose threshold is `<= xp`. An exact threshold match
    /// promotes.
    pub fn from_xp(xp: u64) -> Rank {
        let mut current = Rank::TraineeScout;
        for (rank, threshold) in Self::THRESHOLDS {
            if xp >= threshold {
                current = rank;
            }
        }
        current
    }

    pub fn title(self) -> &'static str {
        match self {
            Rank::TraineeScout => "Trainee Scout",
            Rank::FieldRanger => "Field Ranger",
            Rank::EcosystemGuardian => "Ecosystem Guardian",
            Rank::PlanetAmbassador => "Planet Ambassador",
        }
    }

    /// XP needed for the next rank, or None at the top.
    pub fn next_threshold(self) -> Option<u64> {
        let position = Self::THRESHOLDS.iter().position(|(r, _)| *r == self)?;
        Self::THRESHOLDS.get(position + 1).map(|(_, t)| *t)
    }
}

/// The singleton progression record, persisted as one JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScoutProfile {
    pub xp: u64,
    pub rank: Rank,
    #[serde(default)]
    pub completed_missions: BTreeSet<String>,
    #[serde(default)]
    pub endangered_sightings_count: u64,
    #[serde(default)]
    pub hope_spotlights_unlocked: u64,
}

pub struct ProgressionEngine {
    store: Rc<DurableStore>,
    profile: ScoutProfile,
    rank_up: RankUpSignal,
    spotlight: SpotlightSignal,
}

impl ProgressionEngine {
    /// Load the persisted profile (zero defaults when absent or corrupt)
    /// and heal the derived projections against the current journal. The
    /// healed profile is persisted and no signals fire: the first
    /// observation establishes the rank baseline silently.
    pub fn load(store: Rc<DurableStore>, entries: &[SightingEntry]) -> Self {
        let mut profile = match store.get_json::<ScoutProfile>(PROFILE_KEY) {
            Ok(Some(profile)) => profile,
            Ok(None) => ScoutProfile::default(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load scout profile");
                ScoutProfile::default()
            }
        };

        profile.endangered_sightings_count = entries
            .iter()
            .filter(|e| e.analysis.conservation_status.is_endangered())
            .count() as u64;
        profile.hope_spotlights_unlocked =
            profile.endangered_sightings_count / HOPE_SPOTLIGHT_THRESHOLD;
        profile.rank = Rank::from_xp(profile.xp);

        let engine = Self {
            store,
            rank_up: RankUpSignal::new(profile.rank),
            spotlight: SpotlightSignal::new(),
            profile,
        };
        engine.persist();
        engine
    }

    pub fn profile(&self) -> &ScoutProfile {
        &self.profile
    }

    fn persist(&self) {
        if let Err(e) = self.store.set_json(PROFILE_KEY, &self.profile) {
            tracing::error!(error = %e, "Failed to persist scout profile");
        }
    }

    /// Apply an XP delta in memory: updates xp, recomputes the rank, and
    /// feeds the rank-up signal. Does not persist.
    fn apply_xp(&mut self, amount: u64) {
        self.profile.xp = self.profile.xp.saturating_add(amount);
        let new_rank = Rank::from_xp(self.profile.xp);
        if new_rank != self.profile.rank {
            self.profile.rank = new_rank;
        }
        self.rank_up.observe(new_rank);
    }

    pub fn add_xp(&mut self, amount: u64) {
        self.apply_xp(amount);
        self.persist();
    }

    /// Complete a mission by title, awarding its XP. Idempotent: a title
    /// already in the completed set is a no-op, so missions can never be
    /// farmed for double XP. The title insert and the XP award land in one
    /// persisted write. Returns whether the mission was newly completed.
    pub fn complete_mission(&mut self, title: &str, xp_reward: u64) -> bool {
        if self.profile.completed_missions.contains(title) {
            return false;
        }
        self.profile.completed_missions.insert(title.to_string());
        self.apply_xp(xp_reward);
        self.persist();
        true
    }

    pub fn mission_completed(&self, title: &str) -> bool {
        self.profile.completed_missions.contains(title)
    }

    /// Record one newly logged endangered sighting. Arms the spotlight
    /// signal exactly when the unlock count crosses a threshold, before the
    /// new state is persisted.
    pub fn record_endangered_sighting(&mut self) {
        self.profile.endangered_sightings_count += 1;
        let unlocks = self.profile.endangered_sightings_count / HOPE_SPOTLIGHT_THRESHOLD;
        if unlocks > self.profile.hope_spotlights_unlocked {
            self.spotlight.arm();
        }
        self.profile.hope_spotlights_unlocked = unlocks;
        self.persist();
    }

    /// Delete the persisted profile and return to the zero state. The
    /// journal is untouched.
    pub fn reset(&mut self) {
        if let Err(e) = self.store.remove(PROFILE_KEY) {
            tracing::error!(error = %e, "Failed to remove persisted scout profile");
        }
        self.profile = ScoutProfile::default();
        self.rank_up = RankUpSignal::new(self.profile.rank);
        self.spotlight = SpotlightSignal::new();
    }

    pub fn rank_up(&mut self) -> &mut RankUpSignal {
        &mut self.rank_up
    }

    pub fn spotlight(&mut self) -> &mut SpotlightSignal {
        &mut self.spotlight
    }
}

#[cfg(test)]
mod tests {
    use super::signals::SignalState;
    use super::*;
    use crate::analysis::{AnalysisResult, ConservationStatus};
    use crate::journal::{MediaRef, SightingEntry};
    use chrono::Utc;

    fn entry(status: ConservationStatus) -> SightingEntry {
        SightingEntry {
            id: format!("sighting-test-{:?}", status),
            created_at: Utc::now(),
            media: MediaRef {
                data_url: "data:image/jpeg;base64,AAAA".to_string(),
                mime_type: "image/jpeg".to_string(),
            },
            analysis: AnalysisResult {
                is_animal_or_plant: true,
                subject_name: "Subject".to_string(),
                description: String::new(),
                conservation_status: status,
                population_trend: Default::default(),
                primary_threats: Vec::new(),
                estimated_location: String::new(),
                ecosystem: String::new(),
                coordinates: Default::default(),
                suggested_missions: Vec::new(),
            },
            is_favorite: false,
            chat_history: Vec::new(),
        }
    }

    fn store() -> Rc<DurableStore> {
        Rc::new(DurableStore::open_in_memory().unwrap())
    }

    #[test]
    fn test_rank_from_xp_thresholds_inclusive() {
        assert_eq!(Rank::from_xp(0), Rank::TraineeScout);
        assert_eq!(Rank::from_xp(99), Rank::TraineeScout);
        assert_eq!(Rank::from_xp(100), Rank::FieldRanger);
        assert_eq!(Rank::from_xp(499), Rank::FieldRanger);
        assert_eq!(Rank::from_xp(500), Rank::EcosystemGuardian);
        assert_eq!(Rank::from_xp(1500), Rank::PlanetAmbassador);
        assert_eq!(Rank::from_xp(u64::MAX), Rank::PlanetAmbassador);
    }

    #[test]
    fn test_rank_never_drifts_from_xp() {
        let mut engine = ProgressionEngine::load(store(), &[]);
        for amount in [0, 10, 33, 57, 400, 1000, 5000] {
            engine.add_xp(amount);
            assert_eq!(engine.profile().rank, Rank::from_xp(engine.profile().xp));
        }
    }

    #[test]
    fn test_rank_up_scenario() {
        let mut engine = ProgressionEngine::load(store(), &[]);
        engine.add_xp(100);
        assert_eq!(engine.profile().rank, Rank::FieldRanger);
        assert_eq!(engine.rank_up().take(), Some(Rank::FieldRanger));
        engine.rank_up().acknowledge();

        engine.add_xp(50);
        assert_eq!(engine.profile().rank, Rank::FieldRanger);
        assert!(engine.rank_up().take().is_none());
    }

    #[test]
    fn test_mission_completion_is_idempotent() {
        let mut engine = ProgressionEngine::load(store(), &[]);
        assert!(engine.complete_mission("Plastic Patrol", 30));
        let xp_after_first = engine.profile().xp;
        assert!(!engine.complete_mission("Plastic Patrol", 30));
        assert_eq!(engine.profile().xp, xp_after_first);
        assert!(engine.mission_completed("Plastic Patrol"));
    }

    #[test]
    fn test_mission_xp_lands_in_one_persisted_write() {
        let store = store();
        let mut engine = ProgressionEngine::load(Rc::clone(&store), &[]);
        engine.complete_mission("Pollinator Pledge", 40);

        let persisted: ScoutProfile = store.get_json(PROFILE_KEY).unwrap().unwrap();
        assert_eq!(persisted.xp, 40);
        assert!(persisted.completed_missions.contains("Pollinator Pledge"));
    }

    #[test]
    fn test_load_reconciles_endangered_count() {
        let store = store();
        // Persist a profile with a stale counter.
        let stale = ScoutProfile {
            xp: 200,
            rank: Rank::FieldRanger,
            endangered_sightings_count: 40,
            hope_spotlights_unlocked: 8,
            ..Default::default()
        };
        store.set_json(PROFILE_KEY, &stale).unwrap();

        let entries = vec![
            entry(ConservationStatus::VU),
            entry(ConservationStatus::LC),
            entry(ConservationStatus::EN),
            entry(ConservationStatus::CR),
        ];
        let mut engine = ProgressionEngine::load(Rc::clone(&store), &entries);
        assert_eq!(engine.profile().endangered_sightings_count, 3);
        assert_eq!(engine.profile().hope_spotlights_unlocked, 0);
        assert_eq!(engine.profile().xp, 200);
        // Healing fires no signals.
        assert!(engine.rank_up().take().is_none());
        assert!(!engine.spotlight().take());

        // The healed profile is what got persisted.
        let persisted: ScoutProfile = store.get_json(PROFILE_KEY).unwrap().unwrap();
        assert_eq!(persisted.endangered_sightings_count, 3);
    }

    #[test]
    fn test_load_heals_stale_rank() {
        let store = store();
        let stale = ScoutProfile {
            xp: 600,
            rank: Rank::TraineeScout,
            ..Default::default()
        };
        store.set_json(PROFILE_KEY, &stale).unwrap();

        let mut engine = ProgressionEngine::load(store, &[]);
        assert_eq!(engine.profile().rank, Rank::EcosystemGuardian);
        assert!(engine.rank_up().take().is_none());
    }

    #[test]
    fn test_spotlight_unlocks_on_fifth_sighting_only() {
        let mut engine = ProgressionEngine::load(store(), &[]);
        for n in 1..=4 {
            engine.record_endangered_sighting();
            assert_eq!(engine.profile().endangered_sightings_count, n);
            assert!(!engine.spotlight().take(), "no unlock before the fifth");
        }
        engine.record_endangered_sighting();
        assert_eq!(engine.profile().hope_spotlights_unlocked, 1);
        assert!(engine.spotlight().take());
        engine.spotlight().acknowledge();

        // Sixth sighting: count grows, unlocks stay at floor(6/5) = 1.
        engine.record_endangered_sighting();
        assert_eq!(engine.profile().endangered_sightings_count, 6);
        assert_eq!(engine.profile().hope_spotlights_unlocked, 1);
        assert!(!engine.spotlight().take());
    }

    #[test]
    fn test_reset_returns_to_defaults() {
        let store = store();
        let mut engine = ProgressionEngine::load(Rc::clone(&store), &[]);
        engine.add_xp(250);
        engine.complete_mission("Art for Awareness", 50);
        engine.reset();

        assert_eq!(engine.profile(), &ScoutProfile::default());
        assert!(store.get(PROFILE_KEY).unwrap().is_none());
        assert_eq!(engine.rank_up().state(), SignalState::Idle);
    }

    #[test]
    fn test_profile_roundtrip_is_stable() {
        let store = store();
        let mut engine = ProgressionEngine::load(Rc::clone(&store), &[]);
        engine.add_xp(120);
        engine.complete_mission("Plastic Patrol", 30);
        let before = engine.profile().clone();

        let reloaded = ProgressionEngine::load(store, &[]);
        assert_eq!(reloaded.profile(), &before);
    }

    #[test]
    fn test_corrupt_profile_loads_as_default() {
        let store = store();
        store.set(PROFILE_KEY, &serde_json::json!("garbage")).unwrap();
        let engine = ProgressionEngine::load(store, &[]);
        assert_eq!(engine.profile().xp, 0);
        assert_eq!(engine.profile().rank, Rank::TraineeScout);
    }
}
