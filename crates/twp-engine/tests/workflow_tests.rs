//! End-to-end workflow scenarios through the engine facade.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use twp_engine::prelude::*;
use twp_test_utils::{
    complete_plan, dangerous_db_op, multi_module_request, plan_missing, small_request,
};

fn engine() -> PolicyEngine {
    PolicyEngine::new(PolicySet::default())
}

#[tokio::test]
async fn multi_module_request_requires_plan_and_incomplete_plan_holds() {
    let engine = engine();
    let handle = engine.submit(multi_module_request()).unwrap();

    let decision = engine.trigger_decision(&handle).await.unwrap();
    assert!(decision.required);
    assert!(decision.matched.contains(&TriggerRule::MultiModule));
    assert_eq!(engine.get_state(&handle).await.unwrap(), WorkflowState::Plan);

    // A plan missing its manual test plan is rejected with the section
    // named, and the workflow does not advance.
    let result = engine
        .submit_plan(&handle, plan_missing(PlanSection::ManualTestPlan))
        .await
        .unwrap();
    assert!(!result.valid);
    assert!(result.missing.contains("manual_test_plan"));
    assert_eq!(engine.get_state(&handle).await.unwrap(), WorkflowState::Plan);

    // Completing the plan unlocks Build.
    let result = engine.submit_plan(&handle, complete_plan()).await.unwrap();
    assert!(result.valid);
    assert_eq!(engine.get_state(&handle).await.unwrap(), WorkflowState::Build);
}

#[tokio::test]
async fn small_request_fast_path_to_done() {
    let engine = engine();
    let handle = engine.submit(small_request()).unwrap();
    assert_eq!(engine.get_state(&handle).await.unwrap(), WorkflowState::Build);

    let op = engine
        .queue_operation(&handle, Operation::new(OperationKind::Filesystem))
        .await
        .unwrap();
    engine
        .execute_operation(&op, |_| async { Ok::<_, CallError>(()) })
        .await
        .unwrap();

    engine.begin_verify(&handle).await.unwrap();
    engine.complete(&handle).await.unwrap();
    assert_eq!(engine.get_state(&handle).await.unwrap(), WorkflowState::Done);
}

#[tokio::test]
async fn plan_submission_outside_plan_phase_is_rejected() {
    let engine = engine();
    let handle = engine.submit(small_request()).unwrap();

    let err = engine
        .submit_plan(&handle, complete_plan())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::WrongPhase {
            expected: WorkflowState::Plan,
            actual: WorkflowState::Build,
            ..
        }
    ));
}

#[tokio::test]
async fn verify_blocked_while_operations_pending() {
    let engine = engine();
    let handle = engine.submit(small_request()).unwrap();

    // Queued but never executed.
    engine
        .queue_operation(&handle, Operation::new(OperationKind::Generic))
        .await
        .unwrap();

    let err = engine.begin_verify(&handle).await.unwrap_err();
    assert!(matches!(err, EngineError::OperationsPending(_)));
    assert_eq!(engine.get_state(&handle).await.unwrap(), WorkflowState::Build);
}

#[tokio::test]
async fn reopen_build_from_verify() {
    let engine = engine();
    let handle = engine.submit(small_request()).unwrap();
    engine.begin_verify(&handle).await.unwrap();

    engine.reopen_build(&handle).await.unwrap();
    assert_eq!(engine.get_state(&handle).await.unwrap(), WorkflowState::Build);

    // The reopened Build accepts further operations.
    let op = engine
        .queue_operation(&handle, Operation::new(OperationKind::Generic))
        .await
        .unwrap();
    engine
        .execute_operation(&op, |_| async { Ok::<_, CallError>(()) })
        .await
        .unwrap();
    engine.begin_verify(&handle).await.unwrap();
    engine.complete(&handle).await.unwrap();
}

#[tokio::test]
async fn cancel_mid_build_blocks_workflow_and_operations() {
    let engine = engine();
    let handle = engine.submit(small_request()).unwrap();
    let op = engine
        .queue_operation(&handle, Operation::new(OperationKind::Network))
        .await
        .unwrap();

    engine.cancel(&handle).await.unwrap();

    assert_eq!(
        engine.get_state(&handle).await.unwrap(),
        WorkflowState::Blocked
    );
    assert_eq!(
        engine.operation_status(&op).await.unwrap(),
        OperationStatus::Blocked
    );
}

#[tokio::test]
async fn block_is_terminal() {
    let engine = engine();
    let handle = engine.submit(small_request()).unwrap();
    engine.block(&handle, "manual halt").await.unwrap();

    let err = engine
        .queue_operation(&handle, Operation::new(OperationKind::Generic))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::WrongPhase { .. }));

    // Already terminal; a second block cannot transition again.
    let err = engine.block(&handle, "again").await.unwrap_err();
    assert!(matches!(err, EngineError::IllegalTransition { .. }));
}

#[tokio::test]
async fn observer_sees_the_full_transition_history() {
    let observer = Arc::new(MemoryObserver::new());
    let engine = PolicyEngine::with_observer(PolicySet::default(), observer.clone());

    let handle = engine.submit(multi_module_request()).unwrap();
    engine.submit_plan(&handle, complete_plan()).await.unwrap();
    engine.begin_verify(&handle).await.unwrap();
    engine.complete(&handle).await.unwrap();

    let states: Vec<_> = observer
        .transitions()
        .into_iter()
        .filter(|(id, _, _)| *id == handle.request_id)
        .map(|(_, from, to)| (from, to))
        .collect();
    assert_eq!(
        states,
        vec![
            (WorkflowState::Idle, WorkflowState::Plan),
            (WorkflowState::Plan, WorkflowState::Build),
            (WorkflowState::Build, WorkflowState::Verify),
            (WorkflowState::Verify, WorkflowState::Done),
        ]
    );
}

#[tokio::test]
async fn approved_dangerous_op_passes_verification() {
    let engine = engine();
    let handle = engine.submit(small_request()).unwrap();

    let op = engine.queue_operation(&handle, dangerous_db_op()).await.unwrap();
    let record = engine.confirmation_record(&op).unwrap();
    engine
        .resolve_confirmation(record.id, ConfirmationDecision::Approved)
        .unwrap();
    engine
        .execute_operation(&op, |_| async { Ok::<_, CallError>(()) })
        .await
        .unwrap();

    engine.begin_verify(&handle).await.unwrap();
    engine.complete(&handle).await.unwrap();
    assert_eq!(engine.get_state(&handle).await.unwrap(), WorkflowState::Done);
}

#[tokio::test]
async fn concurrent_workflows_do_not_interfere() {
    let engine = Arc::new(engine());

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            let handle = engine.submit(small_request()).unwrap();
            let op = engine
                .queue_operation(&handle, Operation::new(OperationKind::Generic))
                .await
                .unwrap();
            engine
                .execute_operation(&op, |_| async { Ok::<_, CallError>(()) })
                .await
                .unwrap();
            engine.begin_verify(&handle).await.unwrap();
            engine.complete(&handle).await.unwrap();
            engine.get_state(&handle).await.unwrap()
        }));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap(), WorkflowState::Done);
    }
}
