// Competing completions of one pending stage against a file-backed database

mod fixtures;

use approval_flow::model::{RequestStatus, StageAction, StepKey};
use approval_flow::{CompleteStage, EngineConfig, SqliteStore, WorkflowEngine, WorkflowError};
use fixtures::*;
use tempfile::TempDir;

async fn file_engine(dir: &TempDir) -> WorkflowEngine<SqliteStore> {
    let url = format!("sqlite://{}", dir.path().join("approvals.db").display());
    let store = SqliteStore::connect(&url, 4).await.unwrap();
    store.migrate().await.unwrap();
    seed(&store).await;
    WorkflowEngine::new(store, EngineConfig::default())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn only_one_concurrent_completion_wins() {
    let dir = TempDir::new().unwrap();
    let engine = file_engine(&dir).await;
    let request = start(&engine, LEAVE, STAFF, form(&[("reason", "audit".into())])).await;
    let review = live_at(&history(&engine, request.id).await, StepKey::main(2)).id;

    let manager = acting_user(&engine, MANAGER).await;
    let director = acting_user(&engine, DIRECTOR).await;
    let approve = CompleteStage {
        stage_id: review,
        action: StageAction::Approve,
        acted_by_user_id: MANAGER,
        field_responses: form(&[]),
        comment: None,
        acting_user: manager,
    };
    let reject = CompleteStage {
        stage_id: review,
        action: StageAction::Reject,
        acted_by_user_id: DIRECTOR,
        field_responses: form(&[]),
        comment: Some("duplicate".into()),
        acting_user: director,
    };

    let (first, second) = tokio::join!(engine.complete_stage(approve), engine.complete_stage(reject));

    let results = [first, second];
    let winners = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(winners, 1, "exactly one completion may succeed: {results:?}");
    for result in &results {
        if let Err(err) = result {
            assert!(
                matches!(
                    err,
                    WorkflowError::InvalidState { .. } | WorkflowError::Storage(_)
                ),
                "unexpected loser error: {err:?}"
            );
        }
    }

    let request = engine.request(request.id).await.unwrap();
    assert!(request.status.is_terminal());
    assert_ne!(request.status, RequestStatus::Pending);
    // Only the winner's audit entry survives.
    assert_eq!(request.form_responses.approvers.len(), 1);
    assert_eq!(history(&engine, request.id).await.len(), 2);

    engine.store().shutdown().await;
}
