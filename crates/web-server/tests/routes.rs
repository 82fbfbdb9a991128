//! HTTP surface tests, driven in-process through the router.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use configuration::{ServerSettings, Settings};
use core_types::Backend;
use database::testing::{Fault, ScriptedManager};
use database::{ConnectionManager, ConnectionPool, PoolOptions};
use gateway::{GatewayOptions, QueryGateway};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use web_server::{AppState, router};

fn app_with<M: ConnectionManager>(gateway: QueryGateway<M>, server: &ServerSettings) -> Router {
    router(AppState::new(gateway, server), server).unwrap()
}

fn sqlite_app() -> Router {
    let mut settings = Settings::default();
    settings.database.backend = Backend::Sqlite;
    settings.database.name = ":memory:".to_string();
    settings.pool.max_connections = 1;
    let gateway = QueryGateway::from_settings(&settings).unwrap();
    app_with(gateway, &settings.server)
}

fn scripted_app(options: GatewayOptions) -> (Router, ScriptedManager) {
    let manager = ScriptedManager::new();
    let pool = ConnectionPool::new(manager.clone(), PoolOptions::default());
    let app = app_with(QueryGateway::new(pool, options), &ServerSettings::default());
    (app, manager)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn root_lists_the_endpoints() {
    let (status, body) = get(sqlite_app(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("running"));
    assert_eq!(body["endpoints"]["health"], json!("/api/health"));
    assert_eq!(body["endpoints"]["database"], json!("/api/mysql"));
    assert_eq!(body["endpoints"]["mysql"], json!("/api/mysql"));
}

#[tokio::test]
async fn health_reports_database_and_pool() {
    let (status, body) = get(sqlite_app(), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["database"]["healthy"], json!(true));
    assert_eq!(body["pool"]["capacity"], json!(1));
    assert_eq!(body["pool"]["active"], json!(0));
}

#[tokio::test]
async fn health_is_503_when_the_database_is_unreachable() {
    let (app, manager) = scripted_app(GatewayOptions::default());
    manager.set_fail_connect(true);

    let (status, body) = get(app, "/api/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"]["healthy"], json!(false));
    assert!(body["database"]["error"].is_string());
}

#[tokio::test]
async fn test_route_returns_the_scalar() {
    let (status, body) = get(sqlite_app(), "/api/mysql/test").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["result"], json!(2));
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn tables_route_on_an_empty_schema() {
    let (status, body) = get(sqlite_app(), "/api/mysql/tables").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tables"], json!([]));
    assert_eq!(body["count"], json!(0));
}

#[tokio::test]
async fn query_route_executes_the_sql_parameter() {
    let (status, body) = get(sqlite_app(), "/api/mysql/query?sql=SELECT%201%2B1%20AS%20result").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([{ "result": 2 }]));
    assert_eq!(body["count"], json!(1));
}

#[tokio::test]
async fn query_route_without_sql_is_400() {
    for uri in ["/api/mysql/query", "/api/mysql/query?sql=", "/api/mysql/query?sql=%20%20"] {
        let (status, body) = get(sqlite_app(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("SQL query parameter is required"));
        assert!(body.get("error").is_none());
    }
}

#[tokio::test]
async fn unparseable_query_string_is_a_400_envelope() {
    let (app, manager) = scripted_app(GatewayOptions::default());

    let (status, body) = get(app, "/api/mysql/query?sql=SELECT%201&sql=SELECT%202").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Invalid query string"));
    assert!(body["error"].as_str().unwrap().contains("duplicate field"));
    assert!(body["timestamp"].is_string());
    assert!(manager.executed().is_empty());
}

#[tokio::test]
async fn failing_sql_is_500_with_driver_detail() {
    let (status, body) = get(sqlite_app(), "/api/mysql/query?sql=SELEC%201").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], json!("Query execution failed"));
    assert!(body["error"].as_str().unwrap().contains("syntax error"));
}

#[tokio::test]
async fn connection_failure_on_tables_is_500() {
    let (app, manager) = scripted_app(GatewayOptions::default());
    manager.set_fault(Fault::ConnectionLost);

    let (status, body) = get(app, "/api/mysql/tables").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], json!("Failed to fetch tables"));
}

#[tokio::test]
async fn disabled_passthrough_is_403() {
    let (app, manager) = scripted_app(GatewayOptions {
        allow_passthrough: false,
        ..Default::default()
    });

    let (status, body) = get(app, "/api/mysql/query?sql=SELECT%201").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], json!(false));
    assert!(manager.executed().is_empty());
}

#[tokio::test]
async fn unknown_routes_are_json_404() {
    let (status, body) = get(sqlite_app(), "/api/nonexistent").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Not Found"));
    assert_eq!(body["message"], json!("Route GET /api/nonexistent not found"));
}

#[tokio::test]
async fn route_prefix_is_configurable() {
    let server = ServerSettings {
        route_prefix: "/db".to_string(),
        ..Default::default()
    };
    let pool = ConnectionPool::new(ScriptedManager::new(), PoolOptions::default());
    let app = app_with(QueryGateway::new(pool, GatewayOptions::default()), &server);

    let (status, _) = get(app.clone(), "/db/test").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(app, "/api/mysql/test").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_echoes_a_configured_origin() {
    let server = ServerSettings {
        cors_origin: "http://app.local, http://admin.local".to_string(),
        ..Default::default()
    };
    let pool = ConnectionPool::new(ScriptedManager::new(), PoolOptions::default());
    let app = app_with(QueryGateway::new(pool, GatewayOptions::default()), &server);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/mysql/test")
                .header(header::ORIGIN, "http://admin.local")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://admin.local"
    );
}
