//! Analysis result ingestion: the pipeline from a submitted media file to
//! a journal entry plus its progression side effects.
//!
//! Within one ingestion the steps run in strict sequence: encode, analyze,
//! journal append, XP award, endangered recording. The journal write lands
//! before the XP award; a crash between the two leaves an entry without
//! its XP. The endangered counter is healed on the next load, the XP is
//! not — that loss is a documented gap, not something ingestion retries.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use std::path::Path;
use thiserror::Error;

use crate::analysis::{AnalysisClient, AnalysisResult};
use crate::journal::{EntryDraft, JournalStore, MediaRef};
use crate::scout::ProgressionEngine;

/// XP awarded for logging a new sighting.
pub const SIGHTING_XP: u64 = 10;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The media file could not be read; the journal is untouched.
    #[error("Could not save the file to the journal: {0}")]
    CouldNotSave(#[from] std::io::Error),

    /// The service identified the subject but it is not wildlife. Carries
    /// the service's rejection message; no entry is created and no XP is
    /// awarded.
    #[error("{0}")]
    NotWildlife(String),

    /// The analysis service failed (network, malformed response). No store
    /// mutation occurred; the user may retry.
    #[error("{0}")]
    Analysis(#[source] anyhow::Error),
}

/// What a successful ingestion produced.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub entry_id: String,
    pub subject_name: String,
    pub xp_awarded: u64,
    pub endangered: bool,
}

fn mime_for_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

/// Read a media file and encode it as a base64 data URL for storage and
/// for the analysis request.
pub fn encode_media(path: &Path) -> Result<MediaRef, std::io::Error> {
    let bytes = std::fs::read(path)?;
    let mime_type = mime_for_extension(path);
    Ok(MediaRef {
        data_url: format!("data:{};base64,{}", mime_type, BASE64.encode(&bytes)),
        mime_type: mime_type.to_string(),
    })
}

/// Full ingestion of a media file: encode, analyze, then record.
pub fn ingest_media(
    path: &Path,
    is_favorite: bool,
    client: &AnalysisClient,
    journal: &mut JournalStore,
    engine: &mut ProgressionEngine,
) -> Result<IngestOutcome, IngestError> {
    let media = encode_media(path)?;
    let analysis = client
        .analyze_media(&media.data_url, &media.mime_type)
        .map_err(IngestError::Analysis)?;
    record_analysis(media, analysis, is_favorite, journal, engine)
}

/// Journal append and progression side effects for a completed analysis.
pub fn record_analysis(
    media: MediaRef,
    analysis: AnalysisResult,
    is_favorite: bool,
    journal: &mut JournalStore,
    engine: &mut ProgressionEngine,
) -> Result<IngestOutcome, IngestError> {
    if !analysis.is_animal_or_plant {
        return Err(IngestError::NotWildlife(analysis.description));
    }

    let endangered = analysis.conservation_status.is_endangered();
    let subject_name = analysis.subject_name.clone();

    let entry_id = journal
        .add_entry(EntryDraft {
            created_at: Utc::now(),
            media,
            analysis,
            is_favorite,
        })
        .id
        .clone();

    engine.add_xp(SIGHTING_XP);
    if endangered {
        engine.record_endangered_sighting();
    }

    tracing::info!(entry_id, subject = %subject_name, endangered, "Logged sighting");

    Ok(IngestOutcome {
        entry_id,
        subject_name,
        xp_awarded: SIGHTING_XP,
        endangered,
    })
}
