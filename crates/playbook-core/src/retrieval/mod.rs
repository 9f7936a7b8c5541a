//! Knowledge consumption
//!
//! - [`BriefingRetriever`]: topic query to a compiled [`ContentBrief`]
//! - [`TemplateMatcher`]: topic query to ranked post templates
//! - [`ReadinessAssessor`]: topic and goal to a go/no-go judgment

mod brief;
mod readiness;
mod templates;

pub use brief::{
    BriefOptions, BriefingRetriever, ContentBrief, MIN_ENTRIES_FOR_ANGLES, ReadinessWeights,
    average_quality, compile_context, top_knowledge_types, topic_readiness,
};
pub use readiness::{
    AssessmentSource, ContentGoal, KnowledgeStats, READINESS_SAMPLES, ReadinessAssessment,
    ReadinessAssessor, ReadinessThresholds, fallback_assessment,
};
pub use templates::{TemplateMatcher, TemplateOptions, build_template_guidance};
