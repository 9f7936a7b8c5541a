//! Knowledge extractor
//!
//! Turns raw transcript text into knowledge entry drafts. Extraction is a
//! primary write path: unparseable model output is an error, never an empty
//! result.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::batch::run_batched;
use crate::error::{Error, Result};
use crate::knowledge::{Actionability, KnowledgeEntry, KnowledgeType, Speaker};
use crate::llm::{CompletionProvider, complete_json};
use crate::prompts::{PromptId, PromptRegistry};

/// Default character window applied before extraction
pub const DEFAULT_MAX_TRANSCRIPT_CHARS: usize = 25_000;

/// Marker appended when a transcript is cut
pub const TRUNCATION_MARKER: &str = "\n[truncated]";

/// Minimum number of quality signals an entry needs to be kept
pub const MIN_QUALITY_SIGNALS: usize = 2;

/// Kind of call a transcript records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptType {
    Coaching,
    Sales,
}

impl TranscriptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coaching => "coaching",
            Self::Sales => "sales",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "coaching" => Some(Self::Coaching),
            "sales" => Some(Self::Sales),
            _ => None,
        }
    }

    /// Type-specific focus given to the model
    pub fn guidance(&self) -> &'static str {
        match self {
            Self::Coaching => {
                "This is a coaching call. Prioritize what the host teaches: frameworks, how-to steps, \
                 insights, stories with a lesson, mistakes to avoid, and the questions participants ask \
                 (their questions reveal what the audience struggles with)."
            }
            Self::Sales => {
                "This is a sales call. Prioritize objections and how they were handled, product gaps \
                 and feature requests, market intel about competitors and pricing, buying decisions and \
                 their reasons, and questions prospects ask before buying."
            }
        }
    }
}

impl std::fmt::Display for TranscriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a named person on the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    Host,
    Client,
    Guest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerInfo {
    pub role: SpeakerRole,
    #[serde(default)]
    pub company: Option<String>,
}

/// Speaker name to role
pub type SpeakerMap = BTreeMap<String, SpeakerInfo>;

/// A transcript awaiting extraction
#[derive(Debug, Clone)]
pub struct Transcript {
    pub id: String,
    pub owner_id: String,
    pub team_id: Option<String>,
    pub profile_id: Option<String>,
    pub transcript_type: TranscriptType,
    pub text: String,
    pub speakers: Option<SpeakerMap>,
}

impl Transcript {
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        transcript_type: TranscriptType,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            team_id: None,
            profile_id: None,
            transcript_type,
            text: text.into(),
            speakers: None,
        }
    }

    pub fn with_speakers(mut self, speakers: SpeakerMap) -> Self {
        self.speakers = Some(speakers);
        self
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    pub fn with_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }
}

/// Entries extracted from one transcript
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub transcript_id: String,
    pub entries: Vec<KnowledgeEntry>,
    pub total: usize,
    /// Entries discarded by the quality gate or for invalid fields
    pub dropped: usize,
    pub truncated: bool,
}

/// Six yes/no signals reported by the model for each entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySignals {
    pub specific: bool,
    pub actionable: bool,
    pub concrete_example: bool,
    pub non_obvious: bool,
    pub self_contained: bool,
    pub evidence_backed: bool,
}

impl QualitySignals {
    pub fn count(&self) -> usize {
        [
            self.specific,
            self.actionable,
            self.concrete_example,
            self.non_obvious,
            self.self_contained,
            self.evidence_backed,
        ]
        .into_iter()
        .filter(|s| *s)
        .count()
    }

    /// Two-of-six gate: vague opinions rarely clear two signals
    pub fn passes_gate(&self) -> bool {
        self.count() >= MIN_QUALITY_SIGNALS
    }
}

#[derive(Debug, Deserialize)]
struct ExtractionOutput {
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    knowledge_type: String,
    #[serde(default)]
    speaker: Option<String>,
    #[serde(default)]
    speaker_name: Option<String>,
    content: String,
    #[serde(default)]
    context: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    suggested_topics: Vec<String>,
    #[serde(default)]
    quality_score: Option<f64>,
    #[serde(default)]
    specificity: Option<bool>,
    #[serde(default)]
    actionability: Option<String>,
    #[serde(default)]
    quality_signals: QualitySignals,
}

/// Cut text to at most `max_chars` characters, appending a marker when cut
pub fn truncate_transcript(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => (format!("{}{}", &text[..byte_index], TRUNCATION_MARKER), true),
        None => (text.to_string(), false),
    }
}

/// Who gets credit for an entry
///
/// With a speaker map, a named speaker's mapped role decides. A missing name,
/// or one the map does not know, is never credited to the host.
pub fn attribute_speaker(
    reported: Option<&str>,
    speaker_name: Option<&str>,
    speakers: Option<&SpeakerMap>,
) -> Speaker {
    let Some(map) = speakers.filter(|m| !m.is_empty()) else {
        return reported.and_then(Speaker::parse).unwrap_or(Speaker::Participant);
    };

    // With a map, only a named host counts as the host
    let Some(name) = speaker_name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Speaker::Participant;
    };

    let known = map
        .iter()
        .find(|(known, _)| known.trim().eq_ignore_ascii_case(name))
        .map(|(_, info)| info.role);

    match known {
        Some(SpeakerRole::Host) => Speaker::Host,
        Some(SpeakerRole::Client | SpeakerRole::Guest) | None => Speaker::Participant,
    }
}

fn speaker_guidance(speakers: Option<&SpeakerMap>) -> String {
    match speakers {
        Some(map) if !map.is_empty() => {
            let mut lines: Vec<String> = map
                .iter()
                .map(|(name, info)| {
                    let role = match info.role {
                        SpeakerRole::Host => "host",
                        SpeakerRole::Client => "client",
                        SpeakerRole::Guest => "guest",
                    };
                    match &info.company {
                        Some(company) => format!("- {}: {} ({})", name, role, company),
                        None => format!("- {}: {}", name, role),
                    }
                })
                .collect();
            lines.push(
                "Attribute strictly by this map. Anything a client or guest said is speaker \
                 \"participant\" even if the host agreed with it. Always fill speaker_name."
                    .to_string(),
            );
            lines.join("\n")
        }
        _ => "No speaker map was given. Infer the host from who runs the call and attribute \
              everything else to \"participant\"."
            .to_string(),
    }
}

/// Extracts knowledge entries from transcripts
#[derive(Clone)]
pub struct KnowledgeExtractor {
    provider: Arc<dyn CompletionProvider>,
    prompts: Arc<PromptRegistry>,
    max_chars: usize,
}

impl KnowledgeExtractor {
    pub fn new(provider: Arc<dyn CompletionProvider>, prompts: Arc<PromptRegistry>) -> Self {
        Self {
            provider,
            prompts,
            max_chars: DEFAULT_MAX_TRANSCRIPT_CHARS,
        }
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars.max(1);
        self
    }

    /// Extract entry drafts (without embeddings) from one transcript
    pub async fn extract(&self, transcript: &Transcript) -> Result<ExtractionResult> {
        if transcript.text.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "Transcript '{}' is empty",
                transcript.id
            )));
        }

        let (text, truncated) = truncate_transcript(&transcript.text, self.max_chars);
        if truncated {
            warn!(
                transcript_id = %transcript.id,
                max_chars = self.max_chars,
                "Transcript truncated before extraction"
            );
        }

        let guidance = speaker_guidance(transcript.speakers.as_ref());
        let request = self.prompts.get_prompt(PromptId::ExtractKnowledge)?.request(&[
            ("transcript_type", transcript.transcript_type.as_str()),
            ("type_guidance", transcript.transcript_type.guidance()),
            ("speaker_guidance", guidance.as_str()),
            ("transcript", text.as_str()),
        ]);

        let output: ExtractionOutput = complete_json(self.provider.as_ref(), &request)
            .await
            .map_err(|e| match e {
                Error::InvalidResponse { reason, excerpt } => Error::ExtractionFailed(format!(
                    "transcript '{}': {}. Response excerpt: {}",
                    transcript.id, reason, excerpt
                )),
                other => other,
            })?;

        let raw_count = output.entries.len();
        let entries: Vec<KnowledgeEntry> = output
            .entries
            .into_iter()
            .filter_map(|raw| self.build_entry(transcript, raw))
            .collect();
        let dropped = raw_count - entries.len();

        info!(
            transcript_id = %transcript.id,
            owner_id = %transcript.owner_id,
            extracted = entries.len(),
            dropped,
            "Knowledge extracted"
        );

        Ok(ExtractionResult {
            transcript_id: transcript.id.clone(),
            total: entries.len(),
            entries,
            dropped,
            truncated,
        })
    }

    /// Extract many transcripts in bounded batches, isolating failures
    pub async fn batch_extract(
        &self,
        transcripts: &[Transcript],
        batch_size: usize,
    ) -> HashMap<String, Result<ExtractionResult>> {
        run_batched(transcripts, batch_size, |t| t.id.clone(), |t| self.extract(t)).await
    }

    fn build_entry(&self, transcript: &Transcript, raw: RawEntry) -> Option<KnowledgeEntry> {
        let content = raw.content.trim();
        if content.is_empty() {
            debug!(transcript_id = %transcript.id, "Dropping entry with empty content");
            return None;
        }

        let Some(knowledge_type) = KnowledgeType::parse(&raw.knowledge_type) else {
            warn!(
                transcript_id = %transcript.id,
                knowledge_type = %raw.knowledge_type,
                "Dropping entry with unknown knowledge type"
            );
            return None;
        };

        if !raw.quality_signals.passes_gate() {
            debug!(
                transcript_id = %transcript.id,
                signals = raw.quality_signals.count(),
                "Entry failed quality gate"
            );
            return None;
        }

        let speaker = attribute_speaker(
            raw.speaker.as_deref(),
            raw.speaker_name.as_deref(),
            transcript.speakers.as_ref(),
        );
        let quality = raw.quality_score.map(|q| q.round() as i64).unwrap_or(3);

        let mut entry = KnowledgeEntry::new(&transcript.owner_id, knowledge_type, content)
            .with_speaker(speaker)
            .with_quality(quality)
            .with_context(raw.context.trim())
            .with_tags(clean_list(raw.tags))
            .with_suggested_topics(clean_list(raw.suggested_topics))
            .with_source(&transcript.id);

        entry.speaker_name = raw.speaker_name.filter(|n| !n.trim().is_empty());
        entry.specificity = raw.specificity.unwrap_or(raw.quality_signals.specific);
        entry.actionability = raw
            .actionability
            .as_deref()
            .and_then(Actionability::parse)
            .unwrap_or_default();
        entry.team_id = transcript.team_id.clone();
        entry.profile_id = transcript.profile_id.clone();
        Some(entry)
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let item = item.trim();
        if !item.is_empty() && !cleaned.iter().any(|c| c.eq_ignore_ascii_case(item)) {
            cleaned.push(item.to_string());
        }
    }
    cleaned
}
