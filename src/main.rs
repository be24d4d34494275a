use anyhow::Context;
use staffgraph::graph::Roster;
use staffgraph::{CancelToken, MatchOptions, SharedGraph, StaffingConfig, StaffingService, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_ROSTER: &str = "demos/roster.json";

const DEMO_QUESTIONS: &[&str] = &[
    "How many Python developers are available?",
    "What is the average hourly rate of senior Python developers?",
    "Average hourly rate by location",
    "Who has worked with Jacob Young?",
    "Who becomes available in the next 30 days?",
    "Which skills are we missing for our projects?",
    "Who has the same skills as Jacob Young?",
    "Show current assignments",
    "How many active projects are there?",
    "What is the optimal team for a Python project?",
    "What if Jacob Young leaves Apollo Platform?",
];

const DEMO_REQUIREMENT: &str = r#"{
    "project_title": "Orion Data Platform",
    "required_skills": ["Python", "AWS", "Kubernetes"],
    "team_size": 3,
    "location": "Berlin, Germany",
    "allocation_needed": 0.5,
    "duration_months": 6
}"#;

struct Args {
    config: Option<PathBuf>,
    roster: PathBuf,
    question: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        config: None,
        roster: PathBuf::from(DEFAULT_ROSTER),
        question: None,
    };
    let mut words = Vec::new();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => args.config = Some(iter.next().context("--config needs a path")?.into()),
            "--roster" => args.roster = iter.next().context("--roster needs a path")?.into(),
            _ => words.push(arg),
        }
    }
    if !words.is_empty() {
        args.question = Some(words.join(" "));
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => StaffingConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => {
            let mut config = StaffingConfig::default();
            config.apply_env(|key| std::env::var(key).ok())?;
            config
        }
    };

    println!("Staffgraph v{}", staffgraph::version());
    println!("==========================================");

    let service = StaffingService::from_config(SharedGraph::default(), config, Arc::new(SystemClock))?;
    let roster = Roster::from_path(&args.roster).with_context(|| format!("reading {}", args.roster.display()))?;
    let summary = service.load_roster(&roster).await?;
    println!(
        "Loaded {} candidates, {} projects, {} assignments from {}",
        summary.candidates,
        summary.projects,
        summary.assignments,
        args.roster.display()
    );

    if let Some(question) = &args.question {
        let answer = service.answer_question(question, &request_token()).await?;
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    println!("\n=== Questions ===");
    for question in DEMO_QUESTIONS {
        match service.answer_question(question, &request_token()).await {
            Ok(answer) => println!("Q: {}\nA: {}\n", question, answer.summary()),
            Err(e) => println!("Q: {}\n!: {}\n", question, e),
        }
    }

    println!("=== Team matching (dry run) ===");
    let team = service
        .match_team(DEMO_REQUIREMENT, "orion", MatchOptions::dry_run(), &request_token())
        .await?;
    for member in &team.filled {
        println!(
            "  {:<14} {:<9} score {:>5.1}  load {:.2} -> {:.2}",
            member.name, member.stage.to_string(), member.score.total, member.previous_load, member.new_load
        );
    }
    println!("  stage: {}, open seats: {}", team.stage, team.gaps);

    Ok(())
}

/// Every request gets its own deadline
fn request_token() -> CancelToken {
    CancelToken::with_timeout(Duration::from_secs(30))
}
