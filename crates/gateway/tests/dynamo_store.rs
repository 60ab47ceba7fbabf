mod common;

use std::time::Duration;

use axum::http::StatusCode;
use catalog_gateway::filter;
use catalog_gateway::store::{RecordStore, StoreError};
use futures::TryStreamExt;

use common::{MockBehavior, MockStore, book_item, spawn_server, store_for};

#[tokio::test]
async fn fetch_all_follows_page_cursor_in_order() {
    let mock = MockStore::new(MockBehavior::Pages(vec![
        vec![book_item("1", &["Fantasy"], None), book_item("2", &[], None)],
        vec![book_item("3", &["Sci-Fi"], Some("covers/3.png"))],
        vec![],
    ]));
    let (addr, shutdown, task) = spawn_server(mock.router()).await;

    let store = store_for(addr, Duration::from_secs(2));
    let records = store
        .fetch_all()
        .try_collect::<Vec<_>>()
        .await
        .expect("scan should succeed");

    let ids = records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(records[2].image_key.as_deref(), Some("covers/3.png"));
    assert_eq!(records[0].authors, vec!["Ursula K. Le Guin"]);

    let scans = mock.recorded();
    assert_eq!(scans.len(), 3);
    assert!(scans[0].body.get("ExclusiveStartKey").is_none());
    assert_eq!(
        scans[1].body["ExclusiveStartKey"],
        serde_json::json!({ "id": { "S": "page-1" } })
    );
    assert!(scans.iter().all(|s| s.body.get("FilterExpression").is_none()));
    assert!(scans.iter().all(|s| s.body["Limit"] == 2));

    let _ = shutdown.send(());
    let _ = task.await;
}

#[tokio::test]
async fn fetch_filtered_sends_expression_and_bindings() {
    let mock = MockStore::new(MockBehavior::Pages(vec![vec![book_item(
        "1",
        &["Fantasy"],
        None,
    )]]));
    let (addr, shutdown, task) = spawn_server(mock.router()).await;

    let compiled = filter::compile([
        ("publisher", Some("Acme")),
        ("genres", Some("Fantasy,Sci-Fi")),
    ])
    .expect("filter should compile");

    let store = store_for(addr, Duration::from_secs(2));
    let records = store
        .fetch_filtered(compiled)
        .try_collect::<Vec<_>>()
        .await
        .expect("scan should succeed");
    assert_eq!(records.len(), 1);

    let scans = mock.recorded();
    assert_eq!(scans.len(), 1);
    let scan = &scans[0];
    assert_eq!(scan.body["TableName"], "books");
    assert_eq!(
        scan.body["FilterExpression"],
        "(publisher = :publisher) and (contains(genres,:genres0) or contains(genres,:genres1))"
    );
    assert_eq!(
        scan.body["ExpressionAttributeValues"],
        serde_json::json!({
            ":publisher": { "S": "Acme" },
            ":genres0": { "S": "Fantasy" },
            ":genres1": { "S": "Sci-Fi" }
        })
    );

    assert_eq!(
        scan.headers
            .get("x-amz-target")
            .and_then(|v| v.to_str().ok()),
        Some("DynamoDB_20120810.Scan")
    );
    assert_eq!(
        scan.headers
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/x-amz-json-1.0")
    );
    assert!(scan.headers.contains_key("x-amz-date"));
    let authorization = scan
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .expect("request should be signed");
    assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDTEST/"));
    assert!(authorization.contains("/us-west-1/dynamodb/aws4_request"));
    assert!(authorization.contains("SignedHeaders=content-type;host;x-amz-date;x-amz-target"));

    let _ = shutdown.send(());
    let _ = task.await;
}

#[tokio::test]
async fn rejected_scan_surfaces_store_diagnostic() {
    let mock = MockStore::new(MockBehavior::Reject {
        status: StatusCode::BAD_REQUEST,
        body: serde_json::json!({
            "__type": "com.amazonaws.dynamodb.v20120810#ValidationException",
            "message": "Invalid FilterExpression"
        }),
    });
    let (addr, shutdown, task) = spawn_server(mock.router()).await;

    let store = store_for(addr, Duration::from_secs(2));
    let err = store
        .fetch_all()
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();

    match err {
        StoreError::Rejected {
            status,
            error_type,
            message,
        } => {
            assert_eq!(status, 400);
            assert_eq!(error_type, "ValidationException");
            assert_eq!(message, "Invalid FilterExpression");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(mock.call_count(), 1);

    let _ = shutdown.send(());
    let _ = task.await;
}

#[tokio::test]
async fn slow_page_times_out() {
    let mock = MockStore::new(MockBehavior::Stall(Duration::from_secs(2)));
    let (addr, shutdown, task) = spawn_server(mock.router()).await;

    let store = store_for(addr, Duration::from_millis(100));
    let err = store
        .fetch_all()
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Timeout), "got {:?}", err);

    let _ = shutdown.send(());
    let _ = task.await;
}

#[tokio::test]
async fn item_without_id_is_an_invalid_response() {
    let mock = MockStore::new(MockBehavior::Pages(vec![vec![serde_json::json!({
        "title": { "S": "No identity" }
    })]]));
    let (addr, shutdown, task) = spawn_server(mock.router()).await;

    let store = store_for(addr, Duration::from_secs(2));
    let err = store
        .fetch_all()
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidResponse(_)));

    let _ = shutdown.send(());
    let _ = task.await;
}

#[tokio::test]
async fn unreachable_store_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local_addr should succeed");
    drop(listener);

    let store = store_for(addr, Duration::from_secs(2));
    let err = store
        .fetch_all()
        .try_collect::<Vec<_>>()
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Http(_)), "got {:?}", err);
}
