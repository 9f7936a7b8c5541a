//! Prompt templates and model tiers

mod builtin;
mod registry;

pub use registry::{
    ModelTier, PromptId, PromptRegistry, PromptSpec, ResolvedPrompt, interpolate,
};
