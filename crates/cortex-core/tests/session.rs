use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cortex_core::query::QUERY_PATH;
use cortex_core::session::LOGIN_PATH;
use cortex_core::{
    Authenticator, ConnectionManager, Credentials, Session, SessionLeg, SessionTarget,
    SnowflakeAuthenticator, SqlExecutor,
};

const IDENTITY_SQL: &str = "SELECT CURRENT_USER(), CURRENT_ROLE()";

fn target(database: &str, schema: &str) -> SessionTarget {
    SessionTarget {
        role: "MERU_DEVELOPER".to_string(),
        warehouse: "CORTEX_WH".to_string(),
        database: database.to_string(),
        schema: schema.to_string(),
    }
}

fn authenticator(server: &MockServer) -> SnowflakeAuthenticator {
    SnowflakeAuthenticator::new(
        &server.uri(),
        "org-acct.eu-west-1",
        "alice",
        Credentials::Password("hunter2".to_string()),
    )
}

async fn mount_login(server: &MockServer, token: &str, expected_logins: u64) {
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .and(body_partial_json(json!({
            "data": {"ACCOUNT_NAME": "ORG-ACCT", "LOGIN_NAME": "alice", "AUTHENTICATOR": "SNOWFLAKE", "PASSWORD": "hunter2"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"token": token, "masterToken": "m"},
            "code": null,
            "message": null,
            "success": true
        })))
        .expect(expected_logins)
        .mount(server)
        .await;
}

async fn mount_identity(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .and(body_partial_json(json!({"sqlText": IDENTITY_SQL})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "rowtype": [{"name": "CURRENT_USER()", "type": "text"}, {"name": "CURRENT_ROLE()", "type": "text"}],
                "rowset": [["ALICE", "MERU_DEVELOPER"]],
                "queryId": "q-identity",
                "queryResultFormat": "json"
            },
            "success": true
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn query_leg_logs_in_with_scope_and_checks_identity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .and(query_param("databaseName", "MERU_PREPARED"))
        .and(query_param("schemaName", "MERU_PREPARED"))
        .and(query_param("warehouse", "CORTEX_WH"))
        .and(query_param("roleName", "MERU_DEVELOPER"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"token": "query-token"},
            "success": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_identity(&server).await;

    let session = authenticator(&server)
        .open(SessionLeg::Query, &target("MERU_PREPARED", "MERU_PREPARED"))
        .await
        .unwrap();

    assert_eq!(session.authorization(), "Snowflake Token=\"query-token\"");
    let identity = session.identity().unwrap();
    assert_eq!(identity.user, "ALICE");
    assert_eq!(identity.role, "MERU_DEVELOPER");
}

#[tokio::test]
async fn rejected_login_names_the_leg() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "code": "390100",
            "message": "Incorrect username or password was specified.",
            "success": false
        })))
        .mount(&server)
        .await;

    let err = authenticator(&server)
        .open(SessionLeg::Analyst, &target("MERU_PREPARED", "UTILIZATION_DASHBOARD"))
        .await
        .unwrap_err();

    assert_eq!(err.leg, SessionLeg::Analyst);
    assert_eq!(err.code.as_deref(), Some("390100"));
    assert!(err.to_string().contains("analyst"));
}

#[tokio::test]
async fn manager_opens_each_leg_once() {
    let server = MockServer::start().await;
    mount_login(&server, "tok", 2).await;
    mount_identity(&server).await;

    let mut manager = ConnectionManager::new(
        authenticator(&server),
        target("MERU_PREPARED", "MERU_PREPARED"),
        target("MERU_PREPARED", "UTILIZATION_DASHBOARD"),
    );

    let first = manager.ensure_connections().await.unwrap();
    let second = manager.ensure_connections().await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&first.analyst, &second.analyst));
    assert_eq!(first.analyst.target().schema, "UTILIZATION_DASHBOARD");
    assert!(first.query.identity().is_some());
    assert!(first.analyst.identity().is_none());
}

fn session(server: &MockServer) -> Session {
    Session::new(SessionLeg::Query, &server.uri(), "tok", target("D", "S"))
}

#[tokio::test]
async fn execute_returns_columns_and_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .and(header("Authorization", "Snowflake Token=\"tok\""))
        .and(header("Accept", "application/snowflake"))
        .and(body_partial_json(json!({"sqlText": "SELECT month, rate FROM u", "asyncExec": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "rowtype": [{"name": "MONTH", "type": "text"}, {"name": "RATE", "type": "fixed"}],
                "rowset": [["2024-01", "0.71"], ["2024-02", null]],
                "queryId": "q-1",
                "queryResultFormat": "json"
            },
            "success": true
        })))
        .mount(&server)
        .await;

    let result = session(&server).execute("SELECT month, rate FROM u").await.unwrap();
    assert_eq!(result.column_names(), vec!["MONTH", "RATE"]);
    assert_eq!(result.row_count(), 2);
    assert_eq!(result.cell(0, 1), Some("0.71"));
    assert_eq!(result.cell(1, 1), None);
    assert_eq!(result.query_id.as_deref(), Some("q-1"));
}

#[tokio::test]
async fn execute_polls_running_query_and_downloads_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"queryId": "q-2", "getResultUrl": "/queries/q-2/result"},
            "code": "333334",
            "message": "Asynchronous execution in progress.",
            "success": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/queries/q-2/result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "rowtype": [{"name": "N", "type": "fixed"}, {"name": "L", "type": "text"}],
                "rowset": [["1", "a"], ["2", "b"]],
                "queryId": "q-2",
                "queryResultFormat": "json",
                "chunks": [{"url": format!("{}/chunks/0", server.uri()), "rowCount": 2}],
                "chunkHeaders": {"x-amz-server-side-encryption-customer-key": "k"}
            },
            "success": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chunks/0"))
        .and(header("x-amz-server-side-encryption-customer-key", "k"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[\"3\",\"c\"],\n[\"4\",null]"))
        .mount(&server)
        .await;

    let result = session(&server).execute("SELECT n, l FROM big").await.unwrap();
    assert_eq!(result.row_count(), 4);
    assert_eq!(result.cell(2, 1), Some("c"));
    assert_eq!(result.cell(3, 1), None);
}

#[tokio::test]
async fn failed_statement_carries_code_and_query_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"queryId": "q-err"},
            "code": "002003",
            "message": "SQL compilation error: Object 'UTILIZATION' does not exist.",
            "success": false
        })))
        .mount(&server)
        .await;

    let err = session(&server).execute("SELECT * FROM utilization").await.unwrap_err();
    assert_eq!(err.code.as_deref(), Some("002003"));
    assert_eq!(err.query_id.as_deref(), Some("q-err"));
    assert!(err.message.contains("does not exist"));
}

#[tokio::test]
async fn arrow_results_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(QUERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"queryId": "q-a", "queryResultFormat": "arrow", "rowsetBase64": ""},
            "success": true
        })))
        .mount(&server)
        .await;

    let err = session(&server).execute("SELECT 1").await.unwrap_err();
    assert!(err.message.contains("arrow"));
}
