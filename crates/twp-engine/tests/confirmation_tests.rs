//! Fail-closed confirmation behavior through the engine facade.

use std::sync::Arc;
use std::time::Duration;
use twp_engine::prelude::*;
use twp_test_utils::{dangerous_db_op, small_request};

fn engine() -> PolicyEngine {
    PolicyEngine::new(PolicySet::default())
}

#[tokio::test]
async fn dangerous_op_cannot_execute_while_pending() {
    let engine = engine();
    let handle = engine.submit(small_request()).unwrap();
    let op = engine.queue_operation(&handle, dangerous_db_op()).await.unwrap();

    let record = engine.confirmation_record(&op).unwrap();
    assert_eq!(record.decision, ConfirmationDecision::Pending);

    let err = engine
        .execute_operation(&op, |_| async { Ok::<_, CallError>(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConfirmationPending(_)));

    // Still queued: the side effect never ran.
    assert_eq!(
        engine.operation_status(&op).await.unwrap(),
        OperationStatus::Queued
    );
}

#[tokio::test]
async fn denial_is_permanent() {
    let engine = engine();
    let handle = engine.submit(small_request()).unwrap();
    let op = engine.queue_operation(&handle, dangerous_db_op()).await.unwrap();

    let record = engine.confirmation_record(&op).unwrap();
    engine
        .resolve_confirmation(record.id, ConfirmationDecision::Denied)
        .unwrap();

    let err = engine
        .execute_operation(&op, |_| async { Ok::<_, CallError>(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConfirmationDenied(_)));
    assert_eq!(
        engine.operation_status(&op).await.unwrap(),
        OperationStatus::Rejected
    );

    // A denied operation stays denied on re-execution.
    let err = engine
        .execute_operation(&op, |_| async { Ok::<_, CallError>(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ConfirmationDenied(_)));
}

#[tokio::test]
async fn approval_unlocks_execution_exactly_once() {
    let engine = engine();
    let handle = engine.submit(small_request()).unwrap();
    let op = engine.queue_operation(&handle, dangerous_db_op()).await.unwrap();

    let record = engine.confirmation_record(&op).unwrap();
    let resolved = engine
        .resolve_confirmation(record.id, ConfirmationDecision::Approved)
        .unwrap();
    assert!(resolved.is_approved());
    assert!(resolved.resolved_at.is_some());

    engine
        .execute_operation(&op, |_| async { Ok::<_, CallError>(42) })
        .await
        .unwrap();

    // Consumed: the approval does not grant a second execution.
    let err = engine
        .execute_operation(&op, |_| async { Ok::<_, CallError>(42) })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::OperationConsumed(_)));
}

#[tokio::test]
async fn double_resolution_is_rejected_and_first_decision_stands() {
    let engine = engine();
    let handle = engine.submit(small_request()).unwrap();
    let op = engine.queue_operation(&handle, dangerous_db_op()).await.unwrap();
    let record = engine.confirmation_record(&op).unwrap();

    engine
        .resolve_confirmation(record.id, ConfirmationDecision::Denied)
        .unwrap();
    let err = engine
        .resolve_confirmation(record.id, ConfirmationDecision::Approved)
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateConfirmation(_)));

    assert_eq!(
        engine.confirmation_record(&op).unwrap().decision,
        ConfirmationDecision::Denied
    );
}

#[tokio::test(start_paused = true)]
async fn pending_confirmation_never_times_out_into_approval() {
    let engine = Arc::new(engine());
    let handle = engine.submit(small_request()).unwrap();
    let op = engine.queue_operation(&handle, dangerous_db_op()).await.unwrap();

    // A very long wall-clock wait changes nothing: the record stays
    // pending and the waiter stays parked.
    let waiter = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.wait_for_confirmation(&op).await })
    };
    tokio::time::sleep(Duration::from_secs(86_400)).await;

    assert!(!waiter.is_finished());
    assert_eq!(
        engine.confirmation_record(&op).unwrap().decision,
        ConfirmationDecision::Pending
    );

    let record = engine.confirmation_record(&op).unwrap();
    engine
        .resolve_confirmation(record.id, ConfirmationDecision::Approved)
        .unwrap();
    let decision = waiter.await.unwrap().unwrap();
    assert_eq!(decision, ConfirmationDecision::Approved);
}

#[tokio::test]
async fn cancellation_releases_a_parked_waiter() {
    let engine = Arc::new(engine());
    let handle = engine.submit(small_request()).unwrap();
    let op = engine.queue_operation(&handle, dangerous_db_op()).await.unwrap();

    let waiter = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.wait_for_confirmation(&op).await })
    };
    tokio::task::yield_now().await;

    engine.cancel(&handle).await.unwrap();
    let err = waiter.await.unwrap().unwrap_err();
    assert!(matches!(err, EngineError::Cancelled(_)));
}

#[tokio::test]
async fn safe_operations_need_no_confirmation() {
    let engine = engine();
    let handle = engine.submit(small_request()).unwrap();
    let op = engine
        .queue_operation(&handle, Operation::new(OperationKind::Filesystem))
        .await
        .unwrap();

    assert!(engine.confirmation_record(&op).is_none());
    engine
        .execute_operation(&op, |_| async { Ok::<_, CallError>(()) })
        .await
        .unwrap();
}
