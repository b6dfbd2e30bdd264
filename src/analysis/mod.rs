//! Typed contract with the external AI field-biologist service.
//!
//! The service itself is an opaque collaborator: the core only constructs
//! requests and consumes the structured sighting report it returns.

pub mod client;
pub mod provider;

pub use client::AnalysisClient;
pub use provider::AnalysisProvider;

use serde::{Deserialize, Serialize};

/// IUCN Red List category codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConservationStatus {
    LC,
    NT,
    VU,
    EN,
    CR,
    EW,
    EX,
    DD,
    NE,
}

impl ConservationStatus {
    /// Statuses that count toward hope-spotlight progress.
    pub fn is_endangered(self) -> bool {
        matches!(
            self,
            ConservationStatus::VU | ConservationStatus::EN | ConservationStatus::CR
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ConservationStatus::LC => "Least Concern",
            ConservationStatus::NT => "Near Threatened",
            ConservationStatus::VU => "Vulnerable",
            ConservationStatus::EN => "Endangered",
            ConservationStatus::CR => "Critically Endangered",
            ConservationStatus::EW => "Extinct in the Wild",
            ConservationStatus::EX => "Extinct",
            ConservationStatus::DD => "Data Deficient",
            ConservationStatus::NE => "Not Evaluated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PopulationTrend {
    Increasing,
    Decreasing,
    Stable,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MissionKind {
    PlasticPatrol,
    PollinatorPledge,
    ArtForAwareness,
    General,
}

/// An actionable conservation task suggested alongside a sighting report.
/// Titles act as mission identity: a title can be completed at most once
/// per profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMission {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: MissionKind,
    pub emoji: String,
    pub xp: u64,
}

/// The structured sighting report returned by the analysis service.
///
/// Field names follow the wire format. Everything past the subject and its
/// status defaults when missing so that an older persisted journal still
/// deserializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub is_animal_or_plant: bool,
    pub subject_name: String,
    /// Narrative written in the voice of a field biologist. For a rejected
    /// (non-wildlife) subject this carries the rejection message instead.
    pub description: String,
    pub conservation_status: ConservationStatus,
    #[serde(default)]
    pub population_trend: PopulationTrend,
    #[serde(default)]
    pub primary_threats: Vec<String>,
    #[serde(default)]
    pub estimated_location: String,
    #[serde(default)]
    pub ecosystem: String,
    #[serde(default)]
    pub coordinates: Coordinates,
    #[serde(default)]
    pub suggested_missions: Vec<FieldMission>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endangered_set() {
        assert!(ConservationStatus::VU.is_endangered());
        assert!(ConservationStatus::EN.is_endangered());
        assert!(ConservationStatus::CR.is_endangered());
        assert!(!ConservationStatus::LC.is_endangered());
        assert!(!ConservationStatus::EW.is_endangered());
        assert!(!ConservationStatus::NE.is_endangered());
    }

    #[test]
    fn test_result_parses_wire_format() {
        let json = r#"{
            "isAnimalOrPlant": true,
            "subjectName": "Snow Leopard",
            "description": "A ghost of the high mountains.",
            "conservationStatus": "VU",
            "populationTrend": "Decreasing",
            "primaryThreats": ["Poaching", "Habitat Loss"],
            "estimatedLocation": "Himalayas, Nepal",
            "ecosystem": "Alpine Steppe",
            "coordinates": {"latitude": 28.3, "longitude": 84.1},
            "suggestedMissions": [
                {"title": "Art for Awareness", "description": "Draw one",
                 "type": "artForAwareness", "emoji": "A", "xp": 40}
            ]
        }"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.subject_name, "Snow Leopard");
        assert_eq!(result.conservation_status, ConservationStatus::VU);
        assert_eq!(result.population_trend, PopulationTrend::Decreasing);
        assert_eq!(result.suggested_missions[0].kind, MissionKind::ArtForAwareness);
        assert_eq!(result.suggested_missions[0].xp, 40);
    }

    #[test]
    fn test_result_defaults_optional_fields() {
        let json = r#"{
            "isAnimalOrPlant": false,
            "subjectName": "Toy Car",
            "description": "I can see this is a toy car, but I identify wildlife.",
            "conservationStatus": "NE"
        }"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert!(!result.is_animal_or_plant);
        assert_eq!(result.population_trend, PopulationTrend::Unknown);
        assert!(result.suggested_missions.is_empty());
    }
}
