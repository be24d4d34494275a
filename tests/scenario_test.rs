use chrono::NaiveDate;
use staffgraph::graph::view::assignment_edge_count;
use staffgraph::query::ScenarioChange;
use staffgraph::{
    Answer, CancelToken, FixedClock, GraphView, QueryValue, Requirement, Roster, SharedGraph, SimulationOutcome,
    StaffingConfig, StaffingError, StaffingService,
};
use std::sync::Arc;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

async fn demo_service() -> StaffingService {
    let roster = Roster::from_path(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/roster.json")).unwrap();
    let service = StaffingService::new(
        SharedGraph::default(),
        StaffingConfig::default(),
        Arc::new(FixedClock(today())),
    );
    service.load_roster(&roster).await.unwrap();
    service
}

async fn available_count(service: &StaffingService) -> QueryValue {
    let answer = service
        .answer_question("How many developers are available?", &CancelToken::new())
        .await
        .unwrap();
    answer.result().map(|r| r.value.clone()).expect("a count")
}

#[tokio::test]
async fn test_simulations_never_touch_the_store() {
    let service = demo_service().await;
    let edges_before = assignment_edge_count(&*service.graph().read().await.unwrap());
    // Jacob and Marco are fully booked, the other five have headroom
    assert_eq!(available_count(&service).await, QueryValue::Count(5));

    let questions = [
        "What if Jacob Young leaves Apollo Platform?",
        "What if Lena Schmidt joins Apollo Platform full time?",
        "Suppose Hermes Checkout is cancelled",
        "What if we staff a new project with two Rust developers?",
    ];
    for question in questions {
        for _ in 0..2 {
            let answer = service.answer_question(question, &CancelToken::new()).await.unwrap();
            assert!(matches!(answer, Answer::Simulation { .. }), "{} did not simulate", question);
        }
    }

    assert_eq!(available_count(&service).await, QueryValue::Count(5));
    let store = service.graph().read().await.unwrap();
    assert_eq!(assignment_edge_count(&store), edges_before);
    assert!(store.project_by_key("simulated-1").is_none());
}

#[tokio::test]
async fn test_leaving_frees_capacity() {
    let service = demo_service().await;

    let outcome = service
        .simulate("What if Jacob Young leaves Apollo Platform?", &CancelToken::new())
        .await
        .unwrap();
    let SimulationOutcome::Report(report) = outcome else {
        panic!("expected a report");
    };
    assert_eq!(report.available_delta(), 1);
    assert!((report.free_capacity_delta() - 1.0).abs() < 1e-9);
    assert_eq!(report.load_changes.len(), 1);
    assert_eq!(report.load_changes[0].candidate_id, "cand-jy");
    assert_eq!(report.load_changes[0].after, 0.0);
}

#[tokio::test]
async fn test_changes_apply_in_order_and_clamp() {
    let service = demo_service().await;
    let changes = vec![
        ScenarioChange::AddAssignment {
            candidate: "cand-sw".to_string(),
            project: "apollo".to_string(),
            allocation: 0.6,
        },
        // only 0.4 is left after the first change
        ScenarioChange::AddAssignment {
            candidate: "Sara Wong".to_string(),
            project: "hermes".to_string(),
            allocation: 0.6,
        },
    ];
    let report = service.simulate_changes(&changes, &CancelToken::new()).await.unwrap();

    assert_eq!(report.applied.len(), 2);
    assert!(report.applied[1].effect.contains("clamped"));
    let sara = report
        .load_changes
        .iter()
        .find(|c| c.candidate_id == "cand-sw")
        .unwrap();
    assert!((sara.after - 1.0).abs() < 1e-9);
    assert_eq!(report.available_delta(), -1);
}

#[tokio::test]
async fn test_staffing_a_requirement_is_a_dry_run() {
    let service = demo_service().await;
    let changes = vec![ScenarioChange::StaffRequirement {
        requirement: Requirement::new(&["python"], 2)
            .with_allocation(0.5)
            .with_title("Data Lake")
            .with_budget(90_000.0),
    }];
    let report = service.simulate_changes(&changes, &CancelToken::new()).await.unwrap();

    assert_eq!(report.teams.len(), 1);
    let team = &report.teams[0];
    assert!(team.dry_run);
    assert_eq!(team.filled.len(), 2);
    assert!(team.filled.iter().all(|m| m.edge.is_none()));
    assert!(service.graph().read().await.unwrap().project_by_key(&team.project_id).is_none());
}

#[tokio::test]
async fn test_unknown_names_are_validation_errors() {
    let service = demo_service().await;
    let changes = vec![ScenarioChange::RemoveAssignment {
        candidate: "Nobody Atall".to_string(),
        project: None,
    }];
    let err = service
        .simulate_changes(&changes, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StaffingError::Validation(_)));

    let err = service.simulate_changes(&[], &CancelToken::new()).await.unwrap_err();
    assert!(matches!(err, StaffingError::Validation(_)));
}

#[tokio::test]
async fn test_plain_question_is_not_a_simulation() {
    let service = demo_service().await;
    let outcome = service
        .simulate("How many developers are available?", &CancelToken::new())
        .await
        .unwrap();
    assert!(matches!(outcome, SimulationOutcome::Clarification { .. }));
}
