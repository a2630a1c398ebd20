//! Builds the canonical text blob that represents a participant in the RAG
//! index and in the embedding cache.
//!
//! The first line is always a hidden `[ID:<participantId>]` token. Search
//! results are correlated back to a participant through it, and snippet
//! extraction strips it before anything reaches a reader.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CoreError, Result};
use crate::models::{Participant, Profile};
use crate::store::ParticipantStore;

static ID_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[ID:[^\]]*\]").expect("valid regex"));

/// A participant rendered as embeddable text.
#[derive(Debug, Clone)]
pub struct ConsolidatedText {
    pub text: String,
    pub participant: Participant,
    /// max(participant created-at, profile created-at, 0), epoch millis
    pub last_updated: i64,
}

/// Load a participant and its profile and render the consolidated text.
pub async fn generate_participant_text(
    store: &dyn ParticipantStore,
    participant_id: &str,
) -> Result<ConsolidatedText> {
    let participant = store
        .participant(participant_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("participant {participant_id}")))?;
    let profile = store.profile(participant_id).await?;

    let text = consolidate(&participant, profile.as_ref());
    let last_updated = participant
        .created_at
        .max(profile.as_ref().map(|p| p.created_at).unwrap_or(0))
        .max(0);

    Ok(ConsolidatedText {
        text,
        participant,
        last_updated,
    })
}

/// Render `participant` + `profile` as newline-joined `Label: value` lines.
///
/// Field order is fixed so the output is byte-identical for identical input.
pub fn consolidate(participant: &Participant, profile: Option<&Profile>) -> String {
    let mut lines = vec![id_token(&participant.id)];

    let mut field = |label: &str, value: Option<&str>| {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            lines.push(format!("{label}: {v}"));
        }
    };

    // Identity
    field("Nome", Some(participant.name.as_str()));
    field("Email", participant.email.as_deref());
    field("Telefone", participant.phone.as_deref());

    // Professional
    field("Cargo", participant.role.as_deref());
    field("Empresa", participant.company.as_deref());
    field("Setor", participant.sector.as_deref());

    // Career
    field("Senioridade", participant.seniority.as_deref());
    let years = participant.years_of_experience.map(|y| y.to_string());
    field("Anos de experiência", years.as_deref());
    field("Área de atuação", participant.career_area.as_deref());

    // Demographic
    field("Gênero", participant.gender.as_deref());
    field("Faixa etária", participant.age_range.as_deref());
    field("Cidade", participant.city.as_deref());
    field("Estado", participant.state.as_deref());
    field("País", participant.country.as_deref());

    // Program
    field("Programa", participant.program.as_deref());
    field("Turma", participant.cohort.as_deref());

    if let Some(profile) = profile {
        field("Conquistas", profile.achievements.as_deref());
        field("Visão de futuro", profile.future_vision.as_deref());
        field("Desafios superados", profile.challenges_overcome.as_deref());
        field("Desafios atuais", profile.current_challenges.as_deref());
        field("Motivação", profile.motivation.as_deref());
    }

    if participant.is_council_member {
        lines.push("Membro do Conselho".to_string());
    }
    if participant.is_mentor {
        lines.push("Mentor".to_string());
    }

    let tags: Vec<&str> = participant
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if !tags.is_empty() {
        lines.push(format!("Tags: {}", tags.join(", ")));
    }

    lines.join("\n")
}

pub fn id_token(participant_id: &str) -> String {
    format!("[ID:{participant_id}]")
}

/// Remove every `[ID:...]` token from `text`.
pub fn strip_id_token(text: &str) -> String {
    ID_TOKEN.replace_all(text, "").into_owned()
}

/// Whether `text` carries anything besides the hidden id token.
pub fn has_indexable_content(text: &str) -> bool {
    !strip_id_token(text).trim().is_empty()
}
