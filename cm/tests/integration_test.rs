//! Integration tests for careermesh
//!
//! These tests run the full handler network over the in-process bus with a
//! scripted generation backend, plus the `cm` binary's offline commands.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use async_trait::async_trait;
use predicates::prelude::*;
use tempfile::TempDir;

use careermesh::config::{Config, HandlerOverrides};
use careermesh::handler::catalog;
use careermesh::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
use careermesh::mesh::Mesh;
use careermesh::policy::PolicyKind;

/// Answers every prompt with "answer to: <first line of the prompt>"
#[derive(Default)]
struct FirstLineLlm {
    prompts: Mutex<Vec<String>>,
}

impl FirstLineLlm {
    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn prompt_starting_with(&self, prefix: &str) -> Option<String> {
        self.prompts().into_iter().find(|p| p.trim_start().starts_with(prefix))
    }
}

#[async_trait]
impl LlmClient for FirstLineLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        let first_line = prompt
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string();
        self.prompts.lock().unwrap().push(prompt);
        Ok(CompletionResponse::text(format!("answer to: {}", first_line)))
    }
}

// =============================================================================
// Mesh Tests
// =============================================================================

#[tokio::test]
async fn test_skill_assessment_gathers_both_collaborators() {
    let llm = Arc::new(FirstLineLlm::default());
    let mesh = Mesh::spawn(&Config::default(), llm.clone()).await.unwrap();
    let address = mesh.address_of("skill-assessment").unwrap().clone();
    let mut requester = mesh.requester().await.unwrap();

    let reply = requester
        .ask(&address, "update my resume for a data job", Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(reply, "answer to: You are a Skill Assessment expert.");

    let prompt = llm.prompt_starting_with("You are a Skill Assessment expert.").unwrap();
    assert!(prompt.contains("Resume Expert Insights:\nanswer to: You are a Resume Review Expert."));
    assert!(prompt.contains("Job Matching Insights:\nanswer to: You are a Job Matching assistant."));
    assert!(!prompt.contains("Training Resource Insights"));

    mesh.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_job_matching_falls_back_without_scraper() {
    let llm = Arc::new(FirstLineLlm::default());
    let mesh = Mesh::spawn(&Config::default(), llm.clone()).await.unwrap();
    let address = mesh.address_of(catalog::DEFAULT_HANDLER).unwrap().clone();
    let mut requester = mesh.requester().await.unwrap();

    let reply = requester
        .ask(&address, "data analyst openings", Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(reply, "answer to: You are a Job Matching assistant.");

    let prompt = llm.prompt_starting_with("You are a Job Matching assistant.").unwrap();
    assert!(prompt.contains("No job listings could be retrieved."));
    assert!(prompt.contains("No additional collaborator input was used."));

    mesh.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_resume_expert_annotates_base_analysis() {
    let llm = Arc::new(FirstLineLlm::default());
    let mesh = Mesh::spawn(&Config::default(), llm.clone()).await.unwrap();
    let address = mesh.address_of("resume-expert").unwrap().clone();
    let mut requester = mesh.requester().await.unwrap();

    let reply = requester
        .ask(&address, "five years of backend work", Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(
        reply,
        "answer to: You are a Resume Review Expert. Given the following user resume text or description, \
         identify:\n\nNo additional collaborator input was used."
    );

    mesh.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_configured_fixed_delay_is_honoured() {
    let mut config = Config::default();
    config.handlers.insert(
        "demand-analysis".to_string(),
        HandlerOverrides {
            policy: Some(PolicyKind::FixedDelay),
            delay_ms: Some(200),
            ..Default::default()
        },
    );

    let llm = Arc::new(FirstLineLlm::default());
    let mesh = Mesh::spawn(&config, llm.clone()).await.unwrap();
    let address = mesh.address_of("demand-analysis").unwrap().clone();
    let mut requester = mesh.requester().await.unwrap();

    let started = Instant::now();
    let reply = requester
        .ask(&address, "hello world", Duration::from_secs(10))
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(reply.starts_with("answer to: You are a Job Market Analyst"));

    let prompt = llm.prompt_starting_with("You are a Job Market Analyst").unwrap();
    assert!(prompt.contains("No additional collaborators were needed or invoked for this demand analysis."));

    mesh.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_requesters_get_their_own_replies() {
    let llm = Arc::new(FirstLineLlm::default());
    let mesh = Mesh::spawn(&Config::default(), llm).await.unwrap();
    let job = mesh.address_of("job-matching").unwrap().clone();
    let resume = mesh.address_of("resume-expert").unwrap().clone();

    let mut first = mesh.requester().await.unwrap();
    let mut second = mesh.requester().await.unwrap();
    let (a, b) = tokio::join!(
        first.ask(&job, "openings in Pune", Duration::from_secs(10)),
        second.ask(&resume, "my cv", Duration::from_secs(10)),
    );
    assert!(a.unwrap().starts_with("answer to: You are a Job Matching assistant."));
    assert!(b.unwrap().starts_with("answer to: You are a Resume Review Expert."));

    mesh.shutdown().await.unwrap();
}

// =============================================================================
// CLI Tests
// =============================================================================

fn cm(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cm").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_DATA_HOME", home.path().join("data"));
    cmd
}

#[test]
fn test_cli_handlers_lists_catalog() {
    let home = TempDir::new().unwrap();
    cm(&home)
        .arg("handlers")
        .assert()
        .success()
        .stdout(predicate::str::contains("job-matching"))
        .stdout(predicate::str::contains("resume-expert"))
        .stdout(predicate::str::contains("dual-source"))
        .stdout(predicate::str::contains("substring"));
}

#[test]
fn test_cli_handlers_json() {
    let home = TempDir::new().unwrap();
    let output = cm(&home).args(["handlers", "--format", "json"]).output().unwrap();
    assert!(output.status.success());

    let list: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 5);
    let demand = list.iter().find(|h| h["name"] == "demand-analysis").unwrap();
    assert_eq!(demand["policy"], "fixed-delay");
    assert_eq!(demand["strategy"], "token-set");

    let skill = list.iter().find(|h| h["name"] == "skill-assessment").unwrap();
    let peers = skill["peers"].as_array().unwrap();
    assert_eq!(peers.len(), skill["collaborators"].as_u64().unwrap() as usize);
    assert!(peers.iter().any(|p| p["name"] == "Resume Expert"));
    assert!(peers.iter().all(|p| p["address"].as_str().is_some_and(|a| !a.is_empty())));
}

#[test]
fn test_cli_route_prints_collaborators() {
    let home = TempDir::new().unwrap();
    cm(&home)
        .args(["route", "-H", "skill-assessment", "python course for this job"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Training Resource"))
        .stdout(predicate::str::contains("Job Matching"))
        .stdout(predicate::str::contains("Resume Expert").not());
}

#[test]
fn test_cli_route_nothing_matched() {
    let home = TempDir::new().unwrap();
    cm(&home)
        .args(["route", "-H", "job-matching", "hello world"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No collaborators would be consulted."));
}

#[test]
fn test_cli_unknown_handler() {
    let home = TempDir::new().unwrap();
    cm(&home)
        .args(["route", "-H", "astrology", "anything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown handler 'astrology'"));
}

#[test]
fn test_cli_ask_requires_api_key() {
    let home = TempDir::new().unwrap();
    cm(&home)
        .env_remove("ASI1_API_KEY")
        .args(["ask", "data engineer roles"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ASI1_API_KEY"));
}

#[test]
fn test_cli_reads_local_config() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join(".careermesh.yml"),
        "handlers:\n  job-matching:\n    policy: pending-set\n",
    )
    .unwrap();

    let output = cm(&home).args(["handlers", "-f", "json"]).output().unwrap();
    let list: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let job = list
        .as_array()
        .unwrap()
        .iter()
        .find(|h| h["name"] == "job-matching")
        .unwrap()
        .clone();
    assert_eq!(job["policy"], "pending-set");
}
