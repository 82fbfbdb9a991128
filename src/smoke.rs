//! Endpoint checks against a running server: the root, health, the gateway's
//! fixed operations and the JSON 404.

use clap::Args;
use serde_json::Value;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct SmokeArgs {
    /// Where the server is listening.
    #[arg(long, default_value = "http://localhost:3000")]
    pub base_url: String,

    /// Delay before the first request, for a server that is still starting.
    #[arg(long, default_value_t = 0)]
    pub wait_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeCase {
    pub name: &'static str,
    pub path: String,
    pub expected_status: u16,
}

/// The checks to run for a server mounted at `prefix`.
pub fn cases(prefix: &str) -> Vec<SmokeCase> {
    vec![
        SmokeCase {
            name: "Root Endpoint",
            path: "/".to_string(),
            expected_status: 200,
        },
        SmokeCase {
            name: "Health Check",
            path: "/api/health".to_string(),
            expected_status: 200,
        },
        SmokeCase {
            name: "Database Connection Test",
            path: format!("{prefix}/test"),
            expected_status: 200,
        },
        SmokeCase {
            name: "Database Tables List",
            path: format!("{prefix}/tables"),
            expected_status: 200,
        },
        SmokeCase {
            name: "404 Not Found Test",
            path: "/api/nonexistent".to_string(),
            expected_status: 404,
        },
    ]
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SmokeSummary {
    pub passed: usize,
    pub failed: usize,
}

/// Runs every case in order, printing one block per check.
pub async fn run_cases(
    client: &reqwest::Client,
    base_url: &str,
    cases: &[SmokeCase],
) -> SmokeSummary {
    let base_url = base_url.trim_end_matches('/');
    let mut summary = SmokeSummary::default();

    for case in cases {
        let url = format!("{base_url}{}", case.path);
        match client.get(&url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                if status == case.expected_status {
                    println!("✓ {}", case.name);
                    println!("  Status: {status}");
                    println!("  Response: {}", preview(&body));
                    summary.passed += 1;
                } else {
                    println!("✗ {}", case.name);
                    println!("  Expected: {}, Got: {status}", case.expected_status);
                    println!("  Response: {body}");
                    summary.failed += 1;
                }
            }
            Err(e) => {
                println!("✗ {}", case.name);
                println!("  Error: {e}");
                summary.failed += 1;
            }
        }
        println!();
    }

    summary
}

/// The first lines of a pretty-printed JSON body, or the raw body.
fn preview(body: &str) -> String {
    let pretty = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| body.to_string());
    pretty.lines().take(5).collect::<Vec<_>>().join("\n")
}

pub async fn run(args: SmokeArgs, prefix: &str) -> anyhow::Result<()> {
    if args.wait_ms > 0 {
        println!("Waiting {} ms for server to be ready...\n", args.wait_ms);
        tokio::time::sleep(Duration::from_millis(args.wait_ms)).await;
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let summary = run_cases(&client, &args.base_url, &cases(prefix)).await;

    println!("═══════════════════════════════════════");
    println!(
        "Test Results: {} passed, {} failed",
        summary.passed, summary.failed
    );
    println!("═══════════════════════════════════════");

    if summary.failed > 0 {
        anyhow::bail!("{} smoke check(s) failed", summary.failed);
    }
    println!("✓ All checks passed.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::Settings;
    use core_types::Backend;
    use gateway::QueryGateway;
    use web_server::{AppState, router};

    #[test]
    fn cases_follow_the_route_prefix() {
        let cases = cases("/db");
        let paths: Vec<_> = cases.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, ["/", "/api/health", "/db/test", "/db/tables", "/api/nonexistent"]);
        assert_eq!(cases[4].expected_status, 404);
    }

    #[test]
    fn preview_keeps_the_first_five_lines() {
        let body = r#"{"a":1,"b":2,"c":3,"d":4,"e":5}"#;
        let preview = preview(body);
        assert_eq!(preview.lines().count(), 5);
        assert!(preview.starts_with('{'));
        assert_eq!(super::preview("plain"), "plain");
    }

    #[tokio::test]
    async fn all_checks_pass_against_a_live_server() {
        let mut settings = Settings::default();
        settings.database.backend = Backend::Sqlite;
        settings.database.name = ":memory:".to_string();
        settings.pool.max_connections = 1;

        let gateway = QueryGateway::from_settings(&settings).unwrap();
        let app = router(AppState::new(gateway, &settings.server), &settings.server).unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let client = reqwest::Client::new();
        let summary = run_cases(
            &client,
            &format!("http://{addr}/"),
            &cases(&settings.server.route_prefix),
        )
        .await;
        assert_eq!(summary, SmokeSummary { passed: 5, failed: 0 });
    }
}
