//! Built-in handlers
//!
//! The five career-advice handlers of the network, each with its own
//! registry, keyword table, matching strategy and completion policy. The
//! registries overlap but are not symmetric, and no handler lists itself.

use tracing::debug;

use super::spec::{AuxiliarySource, HandlerSpec};
use crate::config::Config;
use crate::domain::{Address, CollaboratorRegistry};
use crate::policy::{DEFAULT_FIXED_DELAY, PolicyKind};
use crate::router::{KeywordTable, MatchStrategy};
use crate::synth::SynthesisMode;

pub const RESUME_EXPERT: &str = "agent1qvpk7cwgjfdtzfsxv092gcdu0sdsu43z6p0z8nrfckxmcmzd532dgxuy0x5";
pub const SKILL_ASSESSMENT: &str = "agent1qgys89d7tr5rxxamvdhkdg80z9q99jf7sfq08kx0yftt59yjggpsk4ewgm4";
pub const DEMAND_ANALYSIS: &str = "agent1qfvyd3y9qf9cmsl2waatsdchumu8gjj2fl6ynuzy0mlqcjwpge6ekp74qen";
pub const TRAINING_RESOURCE: &str = "agent1qvfed9rmxdz4j488gqvannjs6fatpl3u0ehk2kelez6pz8tr2u8nyxjg5kc";
pub const JOB_MATCHING: &str = "agent1qv4xn6kxtylzyvf5zc4ywx4qcq2g3q6cp2mpvz8twkwmtnm27gl6xp9x7av";

/// Website scraper agent (external)
pub const WEBSITE_SCRAPER: &str = "agent1qwnjmzwwdq9rjs30y3qw988htrvte6lk2xaak9xg4kz0fsdz0t9ws4mwsgs";

/// Web search agent (external)
pub const WEB_SEARCH: &str = "agent1qt5uffgp0l3h9mqed8zh8vy5vs374jl2f8y0mjjvqm44axqseejqzmzx9v8";

pub const JOB_SEARCH_URL: &str = "https://in.indeed.com/jobs?q={query}&start=0";

const RESUME_NAME: &str = "Resume Expert";
const SKILL_NAME: &str = "Skill Assessment";
const DEMAND_NAME: &str = "Demand Analysis";
const TRAINING_NAME: &str = "Training Resource";
const JOB_NAME: &str = "Job Matching";

/// Handler used when none is named
pub const DEFAULT_HANDLER: &str = "job-matching";

pub fn job_matching() -> HandlerSpec {
    HandlerSpec {
        name: "job-matching".to_string(),
        display_name: JOB_NAME.to_string(),
        address: Address::new(JOB_MATCHING),
        registry: CollaboratorRegistry::from_pairs([
            (RESUME_EXPERT, RESUME_NAME),
            (SKILL_ASSESSMENT, SKILL_NAME),
            (DEMAND_ANALYSIS, DEMAND_NAME),
            (TRAINING_RESOURCE, TRAINING_NAME),
        ]),
        keywords: KeywordTable::new(
            MatchStrategy::TokenSet,
            [
                ("resume", RESUME_NAME),
                ("cv", RESUME_NAME),
                ("skills", SKILL_NAME),
                ("qualification", SKILL_NAME),
                ("trend", DEMAND_NAME),
                ("market", DEMAND_NAME),
                ("course", TRAINING_NAME),
                ("certification", TRAINING_NAME),
                ("training", TRAINING_NAME),
            ],
        ),
        policy: PolicyKind::DualSource,
        delay: None,
        stall_timeout: None,
        auxiliary: AuxiliarySource::Scrape {
            address: Address::new(WEBSITE_SCRAPER),
            url_template: JOB_SEARCH_URL.to_string(),
        },
        synthesis: SynthesisMode::Prompted {
            template: "job-matching".to_string(),
        },
        temperature: 0.6,
    }
}

pub fn skill_assessment() -> HandlerSpec {
    HandlerSpec {
        name: "skill-assessment".to_string(),
        display_name: SKILL_NAME.to_string(),
        address: Address::new(SKILL_ASSESSMENT),
        registry: CollaboratorRegistry::from_pairs([
            (RESUME_EXPERT, RESUME_NAME),
            (DEMAND_ANALYSIS, DEMAND_NAME),
            (TRAINING_RESOURCE, TRAINING_NAME),
            (JOB_MATCHING, JOB_NAME),
        ]),
        keywords: KeywordTable::new(
            MatchStrategy::Substring,
            [
                ("resume", RESUME_NAME),
                ("cv", RESUME_NAME),
                ("trend", DEMAND_NAME),
                ("demand", DEMAND_NAME),
                ("market", DEMAND_NAME),
                ("course", TRAINING_NAME),
                ("training", TRAINING_NAME),
                ("certification", TRAINING_NAME),
                ("job", JOB_NAME),
                ("apply", JOB_NAME),
                ("vacancy", JOB_NAME),
            ],
        ),
        policy: PolicyKind::PendingSet,
        delay: None,
        stall_timeout: None,
        auxiliary: AuxiliarySource::None,
        synthesis: SynthesisMode::Prompted {
            template: "skill-assessment".to_string(),
        },
        temperature: 0.7,
    }
}

pub fn demand_analysis() -> HandlerSpec {
    HandlerSpec {
        name: "demand-analysis".to_string(),
        display_name: DEMAND_NAME.to_string(),
        address: Address::new(DEMAND_ANALYSIS),
        registry: CollaboratorRegistry::from_pairs([
            (RESUME_EXPERT, RESUME_NAME),
            (SKILL_ASSESSMENT, SKILL_NAME),
            (TRAINING_RESOURCE, TRAINING_NAME),
            (JOB_MATCHING, JOB_NAME),
        ]),
        keywords: KeywordTable::new(
            MatchStrategy::TokenSet,
            [
                ("resume", RESUME_NAME),
                ("cv", RESUME_NAME),
                ("gap", SKILL_NAME),
                ("upskill", TRAINING_NAME),
                ("learn", TRAINING_NAME),
                ("course", TRAINING_NAME),
                ("job", JOB_NAME),
                ("vacancy", JOB_NAME),
                ("hiring", JOB_NAME),
            ],
        ),
        policy: PolicyKind::FixedDelay,
        delay: Some(DEFAULT_FIXED_DELAY),
        stall_timeout: None,
        auxiliary: AuxiliarySource::None,
        synthesis: SynthesisMode::Prompted {
            template: "demand-analysis".to_string(),
        },
        temperature: 0.6,
    }
}

pub fn resume_expert() -> HandlerSpec {
    HandlerSpec {
        name: "resume-expert".to_string(),
        display_name: RESUME_NAME.to_string(),
        address: Address::new(RESUME_EXPERT),
        registry: CollaboratorRegistry::from_pairs([
            (DEMAND_ANALYSIS, DEMAND_NAME),
            (TRAINING_RESOURCE, TRAINING_NAME),
            (JOB_MATCHING, JOB_NAME),
        ]),
        keywords: KeywordTable::new(
            MatchStrategy::Substring,
            [
                ("trend", DEMAND_NAME),
                ("demand", DEMAND_NAME),
                ("industry", DEMAND_NAME),
                ("course", TRAINING_NAME),
                ("certification", TRAINING_NAME),
                ("learning", TRAINING_NAME),
                ("job", JOB_NAME),
                ("apply", JOB_NAME),
                ("vacancy", JOB_NAME),
                ("hiring", JOB_NAME),
            ],
        ),
        policy: PolicyKind::DualSource,
        delay: None,
        stall_timeout: None,
        auxiliary: AuxiliarySource::SelfAnalysis {
            template: "resume-expert-analysis".to_string(),
        },
        synthesis: SynthesisMode::Annotated,
        temperature: 0.7,
    }
}

pub fn training_resource() -> HandlerSpec {
    HandlerSpec {
        name: "training-resource".to_string(),
        display_name: TRAINING_NAME.to_string(),
        address: Address::new(TRAINING_RESOURCE),
        registry: CollaboratorRegistry::from_pairs([
            (RESUME_EXPERT, RESUME_NAME),
            (DEMAND_ANALYSIS, DEMAND_NAME),
            (JOB_MATCHING, JOB_NAME),
        ]),
        keywords: KeywordTable::new(
            MatchStrategy::Substring,
            [
                ("resume", RESUME_NAME),
                ("cv", RESUME_NAME),
                ("market", DEMAND_NAME),
                ("demand", DEMAND_NAME),
                ("trends", DEMAND_NAME),
                ("job", JOB_NAME),
                ("vacancy", JOB_NAME),
                ("hiring", JOB_NAME),
            ],
        ),
        policy: PolicyKind::DualSource,
        delay: None,
        stall_timeout: None,
        auxiliary: AuxiliarySource::Search {
            address: Address::new(WEB_SEARCH),
        },
        synthesis: SynthesisMode::Prompted {
            template: "training-resource".to_string(),
        },
        temperature: 0.7,
    }
}

/// All built-in handlers, without config overrides
pub fn builtin() -> Vec<HandlerSpec> {
    vec![
        job_matching(),
        skill_assessment(),
        demand_analysis(),
        resume_expert(),
        training_resource(),
    ]
}

/// All built-in handlers with the config's per-handler overrides applied
pub fn configured(config: &Config) -> Vec<HandlerSpec> {
    debug!(override_count = config.handlers.len(), "configured: called");
    builtin()
        .into_iter()
        .map(|spec| match config.overrides_for(&spec.name) {
            Some(overrides) => spec.with_overrides(overrides),
            None => spec,
        })
        .collect()
}

/// Look up a built-in handler by name
pub fn find(name: &str) -> Option<HandlerSpec> {
    builtin().into_iter().find(|spec| spec.name == name)
}

/// Find a handler by name in an already-configured list
pub fn find_in<'a>(specs: &'a [HandlerSpec], name: &str) -> Option<&'a HandlerSpec> {
    specs.iter().find(|spec| spec.name == name)
}
