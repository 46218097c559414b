// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use logtrack::{
    bulk::BulkSender, bus::BusSubscription, event_loop::EventLoop, filter::PatternSet,
    opensearch::OpenSearchApi,
};
use mockito::{Matcher, Mock, Server};
use tokio::{
    io::AsyncWriteExt,
    net::UnixStream,
    task::JoinHandle,
    time::{sleep, timeout, Duration},
};
use tokio_util::sync::CancellationToken;

// Wires the whole pipeline to one end of a socket pair; the test plays
// supervisor on the other end.
fn start_pipeline(
    endpoint: String,
    include: Option<&str>,
    exclude: Option<&str>,
) -> (UnixStream, JoinHandle<()>, CancellationToken) {
    let patterns = PatternSet::from_config(include, exclude).expect("patterns should compile");
    let api = OpenSearchApi::new(endpoint, Duration::from_secs(2));
    let sender = BulkSender::new(api, true);
    let (event_loop, handle) = EventLoop::new(patterns, sender);

    let (supervisor_end, agent_end) = UnixStream::pair().expect("unable to create socket pair");
    let cancel_token = CancellationToken::new();
    let subscription = BusSubscription::from_stream(agent_end, handle.sender(), cancel_token.clone());
    tokio::spawn(subscription.spin());

    let task = tokio::spawn(event_loop.run());

    (supervisor_end, task, cancel_token)
}

async fn wait_for(mock: &Mock) {
    let matched = async {
        while !mock.matched_async().await {
            sleep(Duration::from_millis(20)).await;
        }
    };
    timeout(Duration::from_secs(2), matched)
        .await
        .expect("timed out before the backend received the batch");
}

#[tokio::test]
async fn forwards_stdout_and_stderr_to_bulk_endpoint() {
    let mut server = Server::new_async().await;
    let stdout_mock = server
        .mock("POST", "/_bulk")
        .match_header("content-type", "application/x-ndjson")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("\"_index\":\"web\"".to_string()),
            Matcher::Regex("\"stream\":\"stdout\"".to_string()),
            Matcher::Regex("\"msg\":\"hi\"".to_string()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"took":2,"errors":false,"items":[{"index":{"status":201}},{"index":{"status":201}}]}"#,
        )
        .create_async()
        .await;
    let stderr_mock = server
        .mock("POST", "/_bulk")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("\"stream\":\"stderr\"".to_string()),
            Matcher::Regex("\"raw\":\"boom\"".to_string()),
        ]))
        .with_status(200)
        .with_body(r#"{"took":1,"errors":false,"items":[{"index":{"status":201}}]}"#)
        .create_async()
        .await;

    let (mut supervisor, task, cancel_token) = start_pipeline(server.url(), Some("*"), None);

    supervisor
        .write_all(
            concat!(
                "{\"event\":\"log:out\",\"msg\":{\"process\":{\"name\":\"web\"},",
                "\"data\":\"{\\\"msg\\\":\\\"hi\\\"}\\nplain\\n\",\"at\":1700000000000}}\n",
                "{\"event\":\"log:err\",\"msg\":{\"process\":{\"name\":\"web\"},",
                "\"data\":\" boom \",\"at\":1700000000000}}\n",
            )
            .as_bytes(),
        )
        .await
        .expect("supervisor write failed");

    wait_for(&stdout_mock).await;
    wait_for(&stderr_mock).await;
    stdout_mock.assert_async().await;
    stderr_mock.assert_async().await;

    supervisor
        .write_all(b"{\"event\":\"close\"}\n")
        .await
        .expect("supervisor write failed");

    timeout(Duration::from_secs(2), task)
        .await
        .expect("event loop did not stop on close")
        .expect("event loop task failed");
    cancel_token.cancel();
}

#[tokio::test]
async fn excluded_process_never_reaches_backend() {
    let mut server = Server::new_async().await;
    let mock = server.mock("POST", "/_bulk").expect(0).create_async().await;

    let (mut supervisor, task, cancel_token) =
        start_pipeline(server.url(), Some("app-*"), Some("app-2"));

    supervisor
        .write_all(
            concat!(
                "{\"event\":\"log:out\",\"msg\":{\"process\":{\"name\":\"worker\"},",
                "\"data\":\"hello\\n\",\"at\":1700000000000}}\n",
                "{\"event\":\"log:out\",\"msg\":{\"process\":{\"name\":\"app-2\"},",
                "\"data\":\"hello\\n\",\"at\":1700000000000}}\n",
                "{\"event\":\"close\"}\n",
            )
            .as_bytes(),
        )
        .await
        .expect("supervisor write failed");

    timeout(Duration::from_secs(2), task)
        .await
        .expect("event loop did not stop on close")
        .expect("event loop task failed");

    sleep(Duration::from_millis(100)).await;
    mock.assert_async().await;
    cancel_token.cancel();
}

#[tokio::test]
async fn supervisor_disconnect_stops_the_loop() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/_bulk")
        .with_status(200)
        .with_body(r#"{"took":1,"errors":false,"items":[{"index":{"status":201}}]}"#)
        .create_async()
        .await;

    let (mut supervisor, task, cancel_token) = start_pipeline(server.url(), Some("*"), None);

    supervisor
        .write_all(
            concat!(
                "{\"event\":\"log:out\",\"msg\":{\"process\":{\"name\":\"web\"},",
                "\"data\":\"bye\\n\",\"at\":1700000000000}}\n",
            )
            .as_bytes(),
        )
        .await
        .expect("supervisor write failed");

    wait_for(&mock).await;

    // Dropping the supervisor end is an EOF; the reader surfaces it as close.
    drop(supervisor);

    timeout(Duration::from_secs(2), task)
        .await
        .expect("event loop did not stop after disconnect")
        .expect("event loop task failed");
    cancel_token.cancel();
}
