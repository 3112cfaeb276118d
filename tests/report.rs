//! End-to-end report retrieval tests against a mock CZDS API.

use czds_dl::report::{self, Report, SCRUB_PLACEHOLDER};
use czds_dl::{Config, Credentials, CzdsClient, ReportFormat};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USERNAME: &str = "user@example.org";

const REPORT_CSV: &str = "email,tld,status,last updated,reason,expires\n\
    user@example.org,xyz,approved,2025-01-01,,2026-01-01\n\
    user@example.org,abc,pending,2025-02-01,awaiting review,\n\
    user@example.org,def,denied,2025-03-01,registry policy,\n";

fn credentials() -> Credentials {
    Credentials {
        username: USERNAME.to_string(),
        password: "secret".to_string(),
    }
}

fn config_for(server: &MockServer, output: &Path) -> Config {
    let mut config = Config::default();
    config.endpoints.auth_base_url = server.uri();
    config.endpoints.api_base_url = server.uri();
    config.download.output_dir = output.to_path_buf();
    config
}

async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/authenticate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "accessToken": "test-token" })),
        )
        .mount(server)
        .await;
}

async fn mount_report(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/czds/requests/report"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn connect(server: &MockServer, output: &Path) -> CzdsClient {
    let config = config_for(server, output);
    CzdsClient::connect(&config, credentials()).await.unwrap()
}

// -----------------------------------------------------------------------
// Plain retrieval
// -----------------------------------------------------------------------

#[tokio::test]
async fn report_is_saved_verbatim_without_options() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_auth(&server).await;
    mount_report(&server, REPORT_CSV).await;

    let client = connect(&server, dir.path()).await;
    let dest = dir.path().join(".report.csv");
    report::fetch_report(&client, &dest, &Default::default())
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&dest).unwrap(), REPORT_CSV);
}

#[tokio::test]
async fn report_write_leaves_no_temp_file() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_auth(&server).await;
    mount_report(&server, REPORT_CSV).await;

    let client = connect(&server, dir.path()).await;
    let dest = dir.path().join(".report.csv");
    report::fetch_report(&client, &dest, &Default::default())
        .await
        .unwrap();

    let tmp_files: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(tmp_files.is_empty());
}

#[tokio::test]
async fn failed_report_fetch_leaves_no_file() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_auth(&server).await;
    Mock::given(method("GET"))
        .and(path("/czds/requests/report"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = connect(&server, dir.path()).await;
    let dest = dir.path().join(".report.csv");
    let result = report::fetch_report(&client, &dest, &Default::default()).await;

    assert!(result.is_err());
    assert!(!dest.exists(), "no file may exist after a failed fetch");
}

// -----------------------------------------------------------------------
// Scrubbing
// -----------------------------------------------------------------------

#[tokio::test]
async fn scrub_removes_every_identity_occurrence() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_auth(&server).await;
    mount_report(&server, REPORT_CSV).await;

    let client = connect(&server, dir.path()).await;
    let dest = dir.path().join(".report.csv");
    let options = czds_dl::ReportOptions {
        scrub: true,
        format: ReportFormat::Csv,
    };
    report::fetch_report(&client, &dest, &options).await.unwrap();

    let saved = std::fs::read_to_string(&dest).unwrap();
    assert!(!saved.contains(USERNAME), "identity must be gone");
    assert_eq!(
        saved.matches(SCRUB_PLACEHOLDER).count(),
        3,
        "every row gets the placeholder"
    );

    // Every other field is byte-identical to the source
    let original = Report::parse_csv(REPORT_CSV);
    let scrubbed = Report::parse_csv(&saved);
    assert_eq!(original.rows.len(), scrubbed.rows.len());
    for (before, after) in original.rows.iter().zip(&scrubbed.rows) {
        for (b, a) in before.iter().zip(after) {
            if b == USERNAME {
                assert_eq!(a, SCRUB_PLACEHOLDER);
            } else {
                assert_eq!(a, b);
            }
        }
    }
}

// -----------------------------------------------------------------------
// Format conversion
// -----------------------------------------------------------------------

#[tokio::test]
async fn json_format_preserves_rows_and_field_values() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_auth(&server).await;
    mount_report(&server, REPORT_CSV).await;

    let client = connect(&server, dir.path()).await;
    let dest = dir.path().join(".report.json");
    let options = czds_dl::ReportOptions {
        scrub: false,
        format: ReportFormat::Json,
    };
    report::fetch_report(&client, &dest, &options).await.unwrap();

    let saved = std::fs::read_to_string(&dest).unwrap();
    let back = Report::from_json(&saved).unwrap();
    assert_eq!(
        back.to_csv(),
        REPORT_CSV,
        "tabular -> JSON -> tabular must be lossless"
    );
}

#[tokio::test]
async fn scrub_and_json_compose() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_auth(&server).await;
    mount_report(&server, REPORT_CSV).await;

    let client = connect(&server, dir.path()).await;
    let dest = dir.path().join(".report.json");
    let options = czds_dl::ReportOptions {
        scrub: true,
        format: ReportFormat::Json,
    };
    report::fetch_report(&client, &dest, &options).await.unwrap();

    let saved = std::fs::read_to_string(&dest).unwrap();
    assert!(!saved.contains(USERNAME));
    let back = Report::from_json(&saved).unwrap();
    assert_eq!(back.rows.len(), 3);
}

// -----------------------------------------------------------------------
// Token refresh on the report path
// -----------------------------------------------------------------------

#[tokio::test]
async fn report_retries_once_after_token_rejection() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_auth(&server).await;

    Mock::given(method("GET"))
        .and(path("/czds/requests/report"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_report(&server, REPORT_CSV).await;

    let client = connect(&server, dir.path()).await;
    let dest = dir.path().join(".report.csv");
    report::fetch_report(&client, &dest, &Default::default())
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&dest).unwrap(), REPORT_CSV);

    let auth_calls = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/api/authenticate")
        .count();
    assert_eq!(auth_calls, 2, "initial authentication plus one refresh");
}
