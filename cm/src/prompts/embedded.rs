//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

pub const JOB_MATCHING: &str = include_str!("../../prompts/job-matching.pmt");

pub const SKILL_ASSESSMENT: &str = include_str!("../../prompts/skill-assessment.pmt");

pub const DEMAND_ANALYSIS: &str = include_str!("../../prompts/demand-analysis.pmt");

/// Base analysis requested by the resume expert at dispatch
pub const RESUME_EXPERT_ANALYSIS: &str = include_str!("../../prompts/resume-expert-analysis.pmt");

/// Search-backed recommendations, with a no-web-data fallback branch
pub const TRAINING_RESOURCE: &str = include_str!("../../prompts/training-resource.pmt");

/// Names of every embedded template
pub const NAMES: &[&str] = &[
    "job-matching",
    "skill-assessment",
    "demand-analysis",
    "resume-expert-analysis",
    "training-resource",
];

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "job-matching" => Some(JOB_MATCHING),
        "skill-assessment" => Some(SKILL_ASSESSMENT),
        "demand-analysis" => Some(DEMAND_ANALYSIS),
        "resume-expert-analysis" => Some(RESUME_EXPERT_ANALYSIS),
        "training-resource" => Some(TRAINING_RESOURCE),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
