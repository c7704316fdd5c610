#![deny(clippy::all, clippy::pedantic)]

use httpmock::MockServer;
use serde_json::json;
use tempfile::NamedTempFile;

use crate::args::{Cli, Commands};
use crate::client::{CliError, Ctx, build_ctx_from_cli};

fn ctx(server: &MockServer) -> Ctx {
    Ctx::new(&server.base_url(), "key".into()).expect("ctx")
}

fn tmp_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("tmp file");
    std::io::Write::write_all(&mut file, contents.as_bytes()).expect("write tmp");
    file
}

fn cli(api: Option<&str>, key_file: Option<&NamedTempFile>, env_key: Option<&str>) -> Cli {
    Cli {
        api: api.map(str::to_string),
        key_file: key_file.map(|file| file.path().to_path_buf()),
        api_key_env: env_key.map(str::to_string),
        command: Commands::Health,
    }
}

#[test]
fn build_ctx_prefers_key_file() -> Result<(), CliError> {
    let file = tmp_file("file-key\n");
    let ctx = build_ctx_from_cli(&cli(
        Some("http://127.0.0.1:8080"),
        Some(&file),
        Some("env-key"),
    ))?;
    assert_eq!(ctx.key, "file-key");
    Ok(())
}

#[test]
fn build_ctx_errors_without_key() {
    let err = build_ctx_from_cli(&cli(Some("http://127.0.0.1:8080"), None, None))
        .expect_err("missing key should fail");
    assert!(matches!(err, CliError::MissingKey));
}

#[test]
fn build_ctx_errors_without_api() {
    let err = build_ctx_from_cli(&cli(None, None, Some("k"))).expect_err("missing api");
    assert!(matches!(err, CliError::MissingApi));
}

#[test]
fn trailing_slashes_are_trimmed_from_the_root() -> Result<(), CliError> {
    let ctx = Ctx::new("http://127.0.0.1:8080/edge//", "k".into())?;
    assert_eq!(
        ctx.url("/purge")?.as_str(),
        "http://127.0.0.1:8080/edge/purge"
    );
    Ok(())
}

#[tokio::test]
async fn purge_posts_url_with_key_as_username() -> Result<(), CliError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/purge")
            // base64("key:")
            .header("authorization", "Basic a2V5Og==")
            .json_body(json!({ "url": "http://example.com/a" }));
        then.status(204);
    });

    ctx(&server).purge("http://example.com/a").await?;
    mock.assert();
    Ok(())
}

#[tokio::test]
async fn purge_maps_status_codes() {
    let cases = [
        (422, "invalid"),
        (500, "internal"),
        (401, "unexpected"),
    ];

    for (status, expected) in cases {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("POST").path("/purge");
            then.status(status);
        });

        let err = ctx(&server)
            .purge("http://example.com/a")
            .await
            .expect_err("non-204 should fail");
        match (expected, err) {
            ("invalid", CliError::InvalidUrl(url)) => assert_eq!(url, "http://example.com/a"),
            ("internal", CliError::InternalServerError) => {}
            ("unexpected", CliError::UnexpectedStatus(code)) => assert_eq!(code, 401),
            (expected, other) => panic!("status {status}: expected {expected}, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn health_reports_unhealthy_store() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/health");
        then.status(503);
    });

    let err = ctx(&server).health().await.expect_err("unhealthy");
    assert!(matches!(err, CliError::Unhealthy));
}

#[tokio::test]
async fn health_succeeds_on_no_content() -> Result<(), CliError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET").path("/health");
        then.status(204);
    });

    ctx(&server).health().await?;
    mock.assert();
    Ok(())
}
