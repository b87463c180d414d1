mod support;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sqlgate::GatewayService;
use sqlgate::operation::OperationKind;
use sqlgate::wire::Response;
use tokio::time::timeout;

#[tokio::test]
async fn connections_beyond_the_pool_are_rejected_within_the_login_window() {
    let server =
        support::start_server(support::service(), 2, Duration::from_millis(200)).await;

    // Two admitted connections hold both worker permits.
    let mut first = support::TestClient::connect(server.addr).await;
    let mut second = support::TestClient::connect(server.addr).await;
    first.open_session("alice").await;
    second.open_session("bob").await;

    // The third waits out the login window and is turned away.
    let mut third = support::TestClient::connect(server.addr).await;
    let pushed = timeout(Duration::from_secs(2), third.read_pushed())
        .await
        .expect("no rejection within the login window");

    match pushed {
        Some(Response::Rejected { status }) => {
            assert_eq!(status.error_code.as_deref(), Some("CAPACITY_EXHAUSTED"));
        }
        other => panic!("expected a rejection frame, got {other:?}"),
    }
}

#[tokio::test]
async fn a_released_worker_admits_the_next_connection() {
    let server =
        support::start_server(support::service(), 1, Duration::from_millis(500)).await;

    let mut first = support::TestClient::connect(server.addr).await;
    first.open_session("alice").await;
    drop(first);

    // The permit goes back to the pool when the connection drops.
    let mut second = support::TestClient::connect(server.addr).await;
    second.open_session("bob").await;
}

#[tokio::test]
async fn statements_on_one_session_never_overlap() {
    let backend = Arc::new(support::RecordingBackend::new(Duration::from_millis(50)));
    let service = GatewayService::new(support::open_policy(), backend.clone());

    let session = service
        .sessions()
        .open_session("alice", "", "127.0.0.1", HashMap::new())
        .unwrap();

    let mut runs = Vec::new();
    for i in 0..4 {
        let record = service
            .operations()
            .new_operation(
                &session,
                OperationKind::ExecuteStatement {
                    statement: format!("CREATE TABLE t{i} (id BIGINT)"),
                },
                HashMap::new(),
            )
            .unwrap();

        let service = service.clone();
        let session = session.clone();
        runs.push(tokio::spawn(async move {
            service.operations().run(&session, &record).await
        }));
    }

    for run in runs {
        run.await.unwrap().unwrap();
    }

    assert_eq!(backend.max_active(), 1, "session gate admitted overlap");
}

#[tokio::test]
async fn statements_on_distinct_sessions_do_overlap() {
    let backend = Arc::new(support::RecordingBackend::new(Duration::from_millis(200)));
    let service = GatewayService::new(support::open_policy(), backend.clone());

    let mut runs = Vec::new();
    for (i, user) in ["alice", "bob"].iter().enumerate() {
        let session = service
            .sessions()
            .open_session(user, "", "127.0.0.1", HashMap::new())
            .unwrap();
        let record = service
            .operations()
            .new_operation(
                &session,
                OperationKind::ExecuteStatement {
                    statement: format!("CREATE TABLE t{i} (id BIGINT)"),
                },
                HashMap::new(),
            )
            .unwrap();

        let service = service.clone();
        runs.push(tokio::spawn(async move {
            service.operations().run(&session, &record).await
        }));
    }

    for run in runs {
        run.await.unwrap().unwrap();
    }

    assert_eq!(backend.max_active(), 2, "sessions serialized against each other");
}
