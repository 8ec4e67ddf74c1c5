#![allow(missing_docs, clippy::expect_used)]

use std::time::Duration;

use http::header::{HeaderName, HeaderValue};
use http::{Method, StatusCode};
use pollux_core::fake::{FakeTransport, PollerResponder};
use pollux_core::{
    CancellationToken, HttpResponse, PollResult, PollUntilDoneOptions, Poller, PollerError,
    PollerOptions, PollerStatus, PollingStrategy, ResumeToken,
};
use rstest::rstest;
use serde::Deserialize;
use serde_json::json;

mod common;
use self::common::{init_tracing, url};

#[derive(Debug, PartialEq, Deserialize)]
struct Disk {
    name: String,
    #[serde(rename = "sizeGb")]
    size_gb: u32,
}

fn fast() -> PollUntilDoneOptions {
    PollUntilDoneOptions::default().with_frequency(Duration::from_millis(1))
}

fn responder(disk: &str) -> PollerResponder {
    PollerResponder::new(
        url(&format!("disks/{disk}")),
        url(&format!("operations/{disk}-op")),
    )
}

#[tokio::test]
async fn should_poll_six_times_until_succeeded() -> anyhow::Result<()> {
    init_tracing();
    let transport = FakeTransport::default();
    let mut script = responder("disk-1");
    for _ in 0..5 {
        script = script.add_non_terminal_response("Running");
    }
    let script = script.set_terminal_response(json!({ "name": "disk-1", "sizeGb": 128 }));
    script.install(&transport).await;

    let mut poller = Poller::<Disk, _>::create(
        script.initial_response(Method::POST),
        transport.clone(),
        PollerOptions::new("Disks_Grant"),
    )?;
    assert_eq!(poller.status(), PollerStatus::InProgress);
    assert_eq!(poller.strategy(), PollingStrategy::OperationLocation);

    let disk = poller.poll_until_done(&fast()).await?;

    assert_eq!(
        disk,
        Disk {
            name: "disk-1".to_string(),
            size_gb: 128,
        }
    );
    assert_eq!(transport.request_count().await, 6);
    assert!(
        transport
            .requests()
            .await
            .iter()
            .all(|request| request.method == Method::GET && request.url == *script.operation_url())
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn should_drive_two_pollers_concurrently() -> anyhow::Result<()> {
    init_tracing();
    let transport = FakeTransport::default();

    let mut tasks = Vec::new();
    for (disk, polls) in [("disk-1", 3), ("disk-2", 5)] {
        let mut script = responder(disk);
        for _ in 0..polls {
            script = script.add_non_terminal_response("Running");
        }
        let script = script.set_terminal_response(json!({ "name": disk, "sizeGb": polls }));
        script.install(&transport).await;

        let mut poller = Poller::<Disk, _>::create(
            script.initial_response(Method::POST),
            transport.clone(),
            PollerOptions::new("Disks_Grant"),
        )?;
        tasks.push(tokio::spawn(
            async move { poller.poll_until_done(&fast()).await },
        ));
    }

    let mut disks = Vec::new();
    for task in tasks {
        disks.push(task.await??);
    }

    assert_eq!(
        disks,
        vec![
            Disk {
                name: "disk-1".to_string(),
                size_gb: 3,
            },
            Disk {
                name: "disk-2".to_string(),
                size_gb: 5,
            },
        ]
    );
    assert_eq!(transport.request_count().await, 4 + 6);
    assert_eq!(transport.pending().await, 0);
    Ok(())
}

#[tokio::test]
async fn should_resume_on_the_same_poll_url() -> anyhow::Result<()> {
    init_tracing();
    let transport = FakeTransport::default();
    let script = responder("disk-1")
        .add_non_terminal_response("Running")
        .add_non_terminal_response("Running")
        .set_terminal_response(json!({ "name": "disk-1", "sizeGb": 64 }));
    script.install(&transport).await;

    let mut poller = Poller::<Disk, _>::create(
        script.initial_response(Method::POST),
        transport.clone(),
        PollerOptions::new("Disks_Grant"),
    )?;
    let result = poller.poll().await?;
    assert!(matches!(result, PollResult::InProgress { status: Some(status) } if status == "Running"));
    let token = poller.resume_token()?;
    let expected_url = poller.poll_url().clone();
    drop(poller);

    // Tokens are plain strings, e.g. persisted between two processes
    let token: ResumeToken = token.to_string().parse()?;
    let mut resumed =
        Poller::<Disk, _>::resume(&token, transport.clone(), PollerOptions::new("Disks_Grant"))?;
    assert_eq!(resumed.status(), PollerStatus::InProgress);
    resumed.poll().await?;

    let requests = transport.requests().await;
    assert_eq!(requests.last().map(|request| &request.url), Some(&expected_url));

    let disk = resumed.result(&fast()).await?;
    assert_eq!(disk.size_gb, 64);
    Ok(())
}

#[tokio::test]
async fn should_reject_token_of_another_operation() -> anyhow::Result<()> {
    let transport = FakeTransport::default();
    let script = responder("disk-1");
    let poller = Poller::<(), _>::create(
        script.initial_response(Method::DELETE),
        transport.clone(),
        PollerOptions::new("Disks_Delete"),
    )?;
    let token = poller.resume_token()?;

    let error = Poller::<Disk, _>::resume(&token, transport, PollerOptions::new("Disks_Grant"))
        .expect_err("wrong operation");

    assert!(matches!(error, PollerError::InvalidToken { .. }));
    Ok(())
}

#[tokio::test]
async fn should_keep_state_on_transport_error() -> anyhow::Result<()> {
    init_tracing();
    let transport = FakeTransport::default();
    let script = responder("disk-1")
        .add_non_terminal_response("Running")
        .add_non_terminal_error("connection reset by peer")
        .set_terminal_response(json!({ "name": "disk-1", "sizeGb": 32 }));
    script.install(&transport).await;

    let mut poller = Poller::<Disk, _>::create(
        script.initial_response(Method::POST),
        transport.clone(),
        PollerOptions::new("Disks_Grant"),
    )?;
    poller.poll().await?;
    let url_before = poller.poll_url().clone();

    let error = poller.poll().await.expect_err("transport fails");

    insta::assert_snapshot!(error, @"Transport error: Transport failure: connection reset by peer");
    assert_eq!(poller.status(), PollerStatus::InProgress);
    assert_eq!(poller.poll_url(), &url_before);
    assert!(poller.resume_token().is_ok());

    // The caller retries the poll itself
    let result = poller.poll().await?;
    assert!(matches!(result, PollResult::Succeeded(_)));
    assert_eq!(poller.result(&fast()).await?.size_gb, 32);
    Ok(())
}

#[tokio::test]
async fn should_not_poll_a_terminal_poller() -> anyhow::Result<()> {
    let transport = FakeTransport::default();
    let script = responder("disk-1").set_terminal_response(json!({ "name": "disk-1", "sizeGb": 8 }));
    script.install(&transport).await;

    let mut poller = Poller::<Disk, _>::create(
        script.initial_response(Method::POST),
        transport.clone(),
        PollerOptions::new("Disks_Grant"),
    )?;
    poller.poll_until_done(&fast()).await?;
    assert!(poller.done());
    let count = transport.request_count().await;

    let again = poller.poll_until_done(&fast()).await?;
    let result = poller.poll().await?;

    assert_eq!(again.size_gb, 8);
    assert!(matches!(result, PollResult::Succeeded(_)));
    assert_eq!(transport.request_count().await, count);
    assert!(matches!(
        poller.resume_token(),
        Err(PollerError::NotResumable {
            state: PollerStatus::Succeeded
        })
    ));
    Ok(())
}

#[tokio::test]
async fn should_report_operation_failure() -> anyhow::Result<()> {
    let transport = FakeTransport::default();
    let script = responder("disk-1")
        .add_non_terminal_response("Running")
        .set_terminal_error("DiskInUse", "disk-1 is attached to vm-1");
    script.install(&transport).await;

    let mut poller = Poller::<(), _>::create(
        script.initial_response(Method::DELETE),
        transport.clone(),
        PollerOptions::new("Disks_Delete"),
    )?;
    let error = poller
        .poll_until_done(&fast())
        .await
        .expect_err("operation fails");

    insta::assert_snapshot!(error, @"Operation failed: DiskInUse: disk-1 is attached to vm-1 (HTTP 200)");
    assert_eq!(poller.status(), PollerStatus::Failed);
    let result = poller.poll().await?;
    assert!(matches!(result, PollResult::Failed(error) if error.code() == Some("DiskInUse")));
    assert_eq!(transport.request_count().await, 2);
    Ok(())
}

#[tokio::test]
async fn should_stop_waiting_when_cancelled() -> anyhow::Result<()> {
    init_tracing();
    let transport = FakeTransport::default();
    let script = responder("disk-1")
        .add_non_terminal_response("Running")
        .set_terminal_response(json!({ "name": "disk-1", "sizeGb": 16 }));
    script.install(&transport).await;

    let mut poller = Poller::<Disk, _>::create(
        script.initial_response(Method::POST),
        transport.clone(),
        PollerOptions::new("Disks_Grant"),
    )?;
    let cancellation = CancellationToken::new();
    let options = PollUntilDoneOptions::default()
        .with_frequency(Duration::from_secs(3600))
        .with_cancellation(cancellation.clone());
    tokio::spawn({
        let cancellation = cancellation.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancellation.cancel();
        }
    });

    let error = tokio::time::timeout(Duration::from_secs(5), poller.poll_until_done(&options))
        .await?
        .expect_err("cancelled");

    assert!(matches!(error, PollerError::Cancelled));
    assert_eq!(poller.status(), PollerStatus::InProgress);
    assert_eq!(transport.request_count().await, 1);

    // The last completed poll stands, polling can go on
    let disk = poller.poll_until_done(&fast()).await?;
    assert_eq!(disk.size_gb, 16);
    Ok(())
}

#[tokio::test]
async fn should_honor_retry_after() -> anyhow::Result<()> {
    let transport = FakeTransport::default();
    let operation = url("operations/op-retry");
    transport
        .enqueue(
            Method::GET,
            operation.clone(),
            HttpResponse::new(Method::GET, operation.clone(), StatusCode::OK)
                .with_json(&json!({ "status": "Running" }))
                .with_header(
                    HeaderName::from_static("retry-after-ms"),
                    HeaderValue::from_static("5"),
                ),
        )
        .await;
    transport
        .enqueue(
            Method::GET,
            operation.clone(),
            HttpResponse::new(Method::GET, operation.clone(), StatusCode::OK)
                .with_json(&json!({ "status": "Succeeded" })),
        )
        .await;
    let initial = HttpResponse::new(Method::DELETE, url("disks/disk-1"), StatusCode::ACCEPTED)
        .with_header(
            HeaderName::from_static("azure-asyncoperation"),
            HeaderValue::from_str(operation.as_str())?,
        );

    let mut poller =
        Poller::<(), _>::create(initial, transport, PollerOptions::new("Disks_Delete"))?;
    let options = PollUntilDoneOptions::default().with_frequency(Duration::from_secs(3600));

    tokio::time::timeout(Duration::from_secs(5), poller.poll_until_done(&options)).await??;

    assert_eq!(poller.retry_after(), None);
    assert!(poller.done());
    Ok(())
}

#[rstest]
#[case::no_content(StatusCode::NO_CONTENT)]
#[case::ok(StatusCode::OK)]
#[tokio::test]
async fn should_follow_location_until_not_accepted(#[case] terminal: StatusCode) -> anyhow::Result<()> {
    let transport = FakeTransport::default();
    let location = url("locations/disk-1");
    for status in [StatusCode::ACCEPTED, terminal] {
        transport
            .enqueue(
                Method::GET,
                location.clone(),
                HttpResponse::new(Method::GET, location.clone(), status),
            )
            .await;
    }
    let initial = HttpResponse::new(Method::DELETE, url("disks/disk-1"), StatusCode::ACCEPTED)
        .with_header(
            http::header::LOCATION,
            HeaderValue::from_str(location.as_str())?,
        );

    let mut poller =
        Poller::<(), _>::create(initial, transport.clone(), PollerOptions::new("Disks_Delete"))?;
    assert_eq!(poller.strategy(), PollingStrategy::Location);
    poller.poll_until_done(&fast()).await?;

    assert_eq!(poller.status(), PollerStatus::Succeeded);
    assert_eq!(transport.request_count().await, 2);
    Ok(())
}

#[tokio::test]
async fn should_fail_on_malformed_status_monitor() -> anyhow::Result<()> {
    let transport = FakeTransport::default();
    let script = responder("disk-1");
    transport
        .enqueue(
            Method::GET,
            script.operation_url().clone(),
            HttpResponse::new(Method::GET, script.operation_url().clone(), StatusCode::OK)
                .with_json(&json!({ "state": "Running" })),
        )
        .await;

    let mut poller = Poller::<(), _>::create(
        script.initial_response(Method::DELETE),
        transport,
        PollerOptions::new("Disks_Delete"),
    )?;
    let error = poller.poll().await.expect_err("no status field");

    assert!(matches!(error, PollerError::MalformedResponse { .. }));
    assert_eq!(poller.status(), PollerStatus::InProgress);
    Ok(())
}
