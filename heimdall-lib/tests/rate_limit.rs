mod common;

use common::{base_config, spawn_server, TestResult};

#[tokio::test]
async fn test_soft_then_hard_rate_limit_ladder() -> TestResult {
    // soft 2/s, hard 4/s, burst 2: the first two requests pass, the next two
    // get 429 on a surviving connection, the rest get 429 and a close.
    let mut config = base_config();
    config.security.rate_limit.enabled = true;
    config.security.rate_limit.soft_req_per_sec = 2.0;
    config.security.rate_limit.hard_req_per_sec = 4.0;
    config.security.rate_limit.burst = 2;

    let server = spawn_server(config, |_builder| Ok(())).await?;

    let client = reqwest::Client::new();
    let mut statuses = Vec::new();
    let mut saw_connection_close = false;
    for _ in 0..10 {
        let response = client.get(server.url("/ping")).send().await?;
        if response
            .headers()
            .get("connection")
            .and_then(|value| value.to_str().ok())
            == Some("close")
        {
            saw_connection_close = true;
        }
        statuses.push(response.status().as_u16());
    }

    assert_eq!(&statuses[..2], &[200, 200]);
    assert_eq!(&statuses[2..4], &[429, 429]);
    assert!(statuses[4..].iter().all(|status| *status == 429));
    assert!(saw_connection_close, "hard-limited responses should close the connection");

    server.handle.shutdown();
    let _ = server.join.await;
    Ok(())
}

#[tokio::test]
async fn test_rate_limit_recovers_after_refill() -> TestResult {
    let mut config = base_config();
    config.security.rate_limit.enabled = true;
    config.security.rate_limit.soft_req_per_sec = 10.0;
    config.security.rate_limit.hard_req_per_sec = 100.0;
    config.security.rate_limit.burst = 1;

    let server = spawn_server(config, |_builder| Ok(())).await?;

    let client = reqwest::Client::new();
    let first = client.get(server.url("/ping")).send().await?;
    assert_eq!(first.status(), reqwest::StatusCode::OK);
    let second = client.get(server.url("/ping")).send().await?;
    assert_eq!(second.status(), reqwest::StatusCode::TOO_MANY_REQUESTS);

    // 10 tokens/sec: 200ms refills the single-token burst.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    let third = client.get(server.url("/ping")).send().await?;
    assert_eq!(third.status(), reqwest::StatusCode::OK);

    server.handle.shutdown();
    let _ = server.join.await;
    Ok(())
}

#[tokio::test]
async fn test_disabled_rate_limit_admits_everything() -> TestResult {
    let server = spawn_server(base_config(), |_builder| Ok(())).await?;

    let client = reqwest::Client::new();
    for _ in 0..30 {
        let response = client.get(server.url("/ping")).send().await?;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
    }

    server.handle.shutdown();
    let _ = server.join.await;
    Ok(())
}
