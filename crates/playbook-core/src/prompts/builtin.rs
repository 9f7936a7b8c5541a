//! Built-in prompt definitions

use super::registry::{ModelTier, PromptId, PromptSpec};

const EXTRACTION_SYSTEM: &str = "You are a knowledge analyst. You read call transcripts and \
distill atomic, reusable knowledge. You only report what was actually said, you attribute \
every entry to the person who said it, and you always answer with a single JSON object.";

const EXTRACT_KNOWLEDGE: &str = r#"Extract reusable knowledge from this {{transcript_type}} call transcript.

## Focus
{{type_guidance}}

## Speakers
{{speaker_guidance}}

## Rules
- Each entry is ONE atomic idea that stands on its own without the transcript.
- Allowed knowledge_type values: how_to, insight, story, question, objection, mistake, decision, market_intel.
- speaker is "host" only when the host said it; anything a client or guest said is "participant".
- Put the speaker's name in speaker_name when known.
- Score quality_score from 1 (vague) to 5 (specific, proven, immediately usable).
- actionability is one of: immediately_actionable, contextual, theoretical.
- For every entry, report six quality signals honestly:
  specific (names concrete numbers, tools or steps), actionable (someone could act on it this week),
  concrete_example (includes a real example or story), non_obvious (not common knowledge),
  self_contained (understandable without the call), evidence_backed (supported by a result or data).
- suggested_topics: 1-3 short topic phrases.

## Output
Return JSON only:
{
  "entries": [
    {
      "knowledge_type": "how_to",
      "speaker": "host",
      "speaker_name": "Name or null",
      "content": "The knowledge itself",
      "context": "When or why it came up",
      "tags": ["tag"],
      "suggested_topics": ["topic"],
      "quality_score": 4,
      "specificity": true,
      "actionability": "immediately_actionable",
      "quality_signals": {
        "specific": true,
        "actionable": true,
        "concrete_example": false,
        "non_obvious": true,
        "self_contained": true,
        "evidence_backed": false
      }
    }
  ]
}

## Transcript
{{transcript}}"#;

const NORMALIZE_TOPICS: &str = r#"Map suggested topics onto an existing topic vocabulary.

## Existing vocabulary (slug: display name)
{{vocabulary}}

## Suggested topics
{{suggestions}}

## Content the topics describe
{{content}}

## Rules
- If a suggestion means the same thing as an existing topic, return that existing slug with is_new false.
- Only create a new topic for a genuinely new subject. New slugs are lowercase words joined by hyphens.
- Return at most 3 topics, most relevant first, without duplicates.

Return JSON only:
{"topics": [{"slug": "cold-email", "display_name": "Cold Email", "description": "One sentence", "is_new": false}]}"#;

const SUGGEST_ANGLES: &str = r#"Suggest content angles for the topic "{{topic}}" based only on the knowledge below.

## Knowledge
{{context}}
{{voice_section}}
Give 3 to 5 distinct angles. Each angle is one sentence naming a specific hook grounded in the knowledge.

Return JSON only:
{"angles": ["angle one", "angle two"]}"#;

const DETECT_COLLISIONS: &str = r#"These posts are all scheduled for {{date}}. Flag pairs written by DIFFERENT authors that cover overlapping topics closely enough that publishing both on the same day would feel repetitive.

## Posts
{{posts}}

Never pair two posts by the same author. severity is high, medium or low.

Return JSON only:
{"has_collision": false, "collisions": [{"post_a_id": "id", "post_b_id": "id", "overlap_description": "what overlaps", "severity": "medium", "suggestion": "how to fix it"}]}"#;

const ASSESS_READINESS: &str = r#"Decide whether there is enough knowledge about "{{topic}}" to produce a {{goal}} ({{goal_description}}).

## Minimum thresholds
{{thresholds}}

## Knowledge statistics
{{stats}}

## Sample entries
{{samples}}

Judge depth and coverage, not just counts. List concrete gaps that would improve the result and suggest content archetypes that fit the knowledge.

Return JSON only:
{"ready": true, "confidence": 0.8, "reasoning": "Short explanation", "gaps_that_would_improve": ["gap"], "suggested_archetypes": ["archetype"]}"#;

const CLASSIFY_SOP: &str = r#"Decide whether this knowledge entry belongs in the SOP "{{doc_title}}".

## Entry ({{knowledge_type}})
{{content}}

Context: {{context}}

## SOP
{{document}}

## Actions
- enrich: the entry adds genuinely new value the SOP does not already contain. Name the section heading it belongs under in target_section.
- redundant: the SOP already covers this adequately.
- tangential: the entry is related but does not belong in this SOP.

Return JSON only:
{"action": "enrich", "reasoning": "Short explanation", "target_section": "Section heading or null"}"#;

const EDIT_SYSTEM: &str = "You are a careful technical editor. You never rewrite or delete existing \
text. You only propose insertions anchored to text that already exists, and you always answer with \
a single JSON object.";

const GENERATE_SOP_EDIT: &str = r#"Add the following knowledge to the "{{section}}" section of the SOP "{{doc_title}}".

## New knowledge
{{entries}}

## Current SOP
{{document}}

## Rules
- insert_after must be copied EXACTLY from the current SOP and must appear in it exactly once. Prefer the last line of the target section.
- new_content is a markdown block inserted directly after that text. Do not repeat existing text.
- When several entries make the same point, merge them into one bullet or paragraph.
- Never modify or remove existing text.

Return JSON only:
{"insert_after": "exact existing text", "new_content": "\n- New bullet", "summary": "One line describing the change"}"#;

const FORMAT_REFERENCE: &str = r#"Format the product knowledge below as reference material for the "{{section}}" section of "{{doc_title}}".

## Entries
{{entries}}

## Rules
- Output plain markdown only. No JSON, no code fences, no section heading.
- Merge entries that describe the same product fact into one item.
- Keep specific names, numbers and limits exactly as given."#;

const FORMAT_FAQ: &str = r#"Format the questions below as FAQ items for the "{{section}}" section of "{{doc_title}}".

## Entries
{{entries}}

## Rules
- Output plain markdown only. No JSON, no code fences, no section heading.
- Each item is a bold question followed by a concise answer drawn from the entries.
- When several entries ask the same question, write it once and merge the answers."#;

const CLUSTER_ORPHANS: &str = r#"These knowledge entries did not fit any existing SOP. Group them into candidate NEW SOPs.

## Existing modules
{{modules}}

## Entries
{{entries}}

## Rules
- Only propose a cluster when at least 3 entries share one coherent, actionable topic.
- Each entry belongs to at most one cluster. Leave entries out when they do not fit.
- module_number must be one of the existing module numbers above.

Return JSON only:
{"clusters": [{"entry_ids": ["id"], "module_number": 1, "title": "SOP title", "rationale": "Why these belong together"}]}"#;

const GENERATE_SOP: &str = r#"Write a new SOP titled "{{title}}" for module {{module}} using only the knowledge below.

## Knowledge
{{entries}}

## Rules
- overview: 2-4 sentences on what the SOP achieves and when to use it.
- steps: ordered, imperative steps.
- key_lessons and common_mistakes: short bullet texts drawn from the knowledge.

Return JSON only:
{"title": "SOP title", "overview": "...", "steps": ["Step"], "key_lessons": ["Lesson"], "common_mistakes": ["Mistake"]}"#;

fn spec(tier: ModelTier, max_tokens: usize, system: Option<&str>, template: &str) -> PromptSpec {
    PromptSpec {
        tier,
        max_tokens,
        system: system.map(str::to_string),
        template: template.to_string(),
    }
}

pub(super) fn builtin_prompts() -> Vec<(PromptId, PromptSpec)> {
    use ModelTier::*;

    vec![
        (
            PromptId::ExtractKnowledge,
            spec(Strong, 8000, Some(EXTRACTION_SYSTEM), EXTRACT_KNOWLEDGE),
        ),
        (PromptId::NormalizeTopics, spec(Fast, 500, None, NORMALIZE_TOPICS)),
        (PromptId::SuggestAngles, spec(Balanced, 800, None, SUGGEST_ANGLES)),
        (PromptId::DetectCollisions, spec(Fast, 1000, None, DETECT_COLLISIONS)),
        (PromptId::AssessReadiness, spec(Balanced, 1000, None, ASSESS_READINESS)),
        (PromptId::ClassifySop, spec(Fast, 500, None, CLASSIFY_SOP)),
        (
            PromptId::GenerateSopEdit,
            spec(Strong, 2000, Some(EDIT_SYSTEM), GENERATE_SOP_EDIT),
        ),
        (PromptId::FormatReference, spec(Balanced, 1500, None, FORMAT_REFERENCE)),
        (PromptId::FormatFaq, spec(Balanced, 1500, None, FORMAT_FAQ)),
        (PromptId::ClusterOrphans, spec(Balanced, 2000, None, CLUSTER_ORPHANS)),
        (PromptId::GenerateSop, spec(Strong, 4000, None, GENERATE_SOP)),
    ]
}
