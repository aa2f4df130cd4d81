//! Integration tests using wiremock to simulate a FileseXchange server.

use filexchange::retry::RetryPredicate;
use filexchange::{Client, Credentials, Error, ProgressReporter, RetryStrategy, Role, Session};
use serde_json::json;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(mock_server: &MockServer) -> Client {
    Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .build()
        .unwrap()
}

fn user_session() -> Session {
    Session::new("tok123", Role::User)
}

fn admin_session() -> Session {
    Session::new("admintok", Role::Admin)
}

#[tokio::test]
async fn test_login_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth.php"))
        .and(body_string_contains("username=alice"))
        .and(body_string_contains("password=secret"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"token_api": "abc", "role": "admin"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let session = client
        .login(Credentials::new("alice", "secret"))
        .await
        .unwrap();

    assert_eq!(session.token(), "abc");
    assert_eq!(session.role(), &Role::Admin);
}

#[tokio::test]
async fn test_login_rejected_with_201() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth.php"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .login(Credentials::new("alice", "wrong"))
        .await
        .unwrap_err();

    assert_eq!(err.message(), "Invalid credentials");
    assert_eq!(err.status_code(), 201);
}

#[tokio::test]
async fn test_login_with_empty_credentials_is_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth.php"))
        .and(body_string_contains("username=&password="))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.login(Credentials::new("", "")).await.unwrap_err();

    assert_eq!(err.message(), "Invalid credentials");
    assert_eq!(err.status_code(), 201);
}

#[tokio::test]
async fn test_login_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth.php"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Fatal error"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .login(Credentials::new("alice", "secret"))
        .await
        .unwrap_err();

    assert_eq!(err.message(), "Internal server error (code 500)");
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn test_login_missing_token_is_a_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"role": "user"})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .login(Credentials::new("alice", "secret"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Application { .. }));
    assert_eq!(err.status_code(), 200);
}

#[tokio::test]
async fn test_list_user_files_drops_malformed_entries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user_files.php"))
        .and(body_string_contains("token_api=tok123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "files": [
                {"id": "1", "file_name": "a.txt", "file_url": "http://x/f/1"},
                {"id": "", "file_name": "bad"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let files = client.list_user_files(&user_session()).await.unwrap();

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, "1");
    assert_eq!(files[0].file_name, "a.txt");
    assert_eq!(files[0].lookup_identifier(), Some("1"));
}

#[tokio::test]
async fn test_list_user_files_malformed_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user_files.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.list_user_files(&user_session()).await.unwrap_err();

    assert!(matches!(err, Error::Protocol { .. }));
    assert!(err
        .message()
        .starts_with("Could not parse server response as JSON"));
}

#[tokio::test]
async fn test_empty_token_never_reaches_server() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let session = Session::new("", Role::Admin);

    let failures = vec![
        client.list_user_files(&session).await.unwrap_err(),
        client.file_info(&session, "abc").await.unwrap_err(),
        client.delete_file(&session, "1").await.unwrap_err(),
        client.list_users(&session).await.unwrap_err(),
        client.delete_user(&session, "1").await.unwrap_err(),
        client.trigger_backup(&session).await.unwrap_err(),
    ];

    for err in failures {
        assert!(matches!(err, Error::Validation { .. }));
        assert_eq!(err.status_code(), 0);
    }
}

#[tokio::test]
async fn test_empty_inputs_never_reach_server() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let session = admin_session();

    let err = client
        .change_user_password(&session, "3", "")
        .await
        .unwrap_err();
    assert_eq!(err.message(), "New password must not be empty");
    assert_eq!(err.status_code(), 0);

    let err = client.create_user(&session, "", "pw").await.unwrap_err();
    assert_eq!(err.status_code(), 0);

    let err = client.delete_file(&session, "").await.unwrap_err();
    assert_eq!(err.status_code(), 0);
}

#[tokio::test]
async fn test_upload_missing_file_fails_locally() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload_file.php"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.txt");

    let client = client_for(&mock_server);
    let err = client
        .upload_file(&user_session(), &missing, ProgressReporter::disabled())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(err.status_code(), 0);
    assert_eq!(err.message(), "File 'missing.txt' not found");
}

#[tokio::test]
async fn test_upload_sends_multipart_and_reports_progress() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload_file.php"))
        .and(body_string_contains("name=\"token_api\""))
        .and(body_string_contains("tok123"))
        .and(body_string_contains("filename=\"notes.txt\""))
        .and(body_string_contains("text/plain"))
        .and(body_string_contains("hello upload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("notes.txt");
    let mut file = std::fs::File::create(&file_path).unwrap();
    file.write_all(b"hello upload").unwrap();
    drop(file);

    let (progress, mut updates) = ProgressReporter::channel();
    let client = client_for(&mock_server);
    client
        .upload_file(&user_session(), &file_path, progress)
        .await
        .unwrap();

    let mut last = None;
    while let Ok(update) = updates.try_recv() {
        assert_eq!(update.bytes_total, 12);
        last = Some(update);
    }
    assert_eq!(last.map(|p| p.bytes_transferred), Some(12));
}

#[tokio::test]
async fn test_upload_rejected_with_201() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload_file.php"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&mock_server)
        .await;

    let file = tempfile::Builder::new()
        .suffix(".bin")
        .tempfile()
        .unwrap();
    std::fs::write(file.path(), [1u8, 2, 3]).unwrap();
    let name = file.path().file_name().unwrap().to_string_lossy().into_owned();

    let client = client_for(&mock_server);
    let err = client
        .upload_file(&user_session(), file.path(), ProgressReporter::disabled())
        .await
        .unwrap_err();

    assert_eq!(
        err.message(),
        format!("Authorization error during upload of '{}'", name)
    );
    assert_eq!(err.status_code(), 201);
}

#[tokio::test]
async fn test_file_info() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/file_info.php"))
        .and(body_string_contains("file_url=a1b2c3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "file_name": "report.pdf",
            "file_size": "2 MB",
            "owner_name": "alice",
            "count_downloads": 3
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let info = client.file_info(&user_session(), "a1b2c3").await.unwrap();

    assert_eq!(info.file_name(), "report.pdf");
    assert_eq!(info.file_size(), "2 MB");
    assert_eq!(info.id().as_deref(), Some("7"));
    assert_eq!(info.download_count().as_deref(), Some("3"));
    assert_eq!(info.upload_date(), None);
}

#[tokio::test]
async fn test_file_info_forbidden() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/file_info.php"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "no"})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client.file_info(&user_session(), "x").await.unwrap_err();

    assert_eq!(err.message(), "Authorization error accessing file info");
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn test_download_uses_get_with_query_and_reports_progress() {
    let mock_server = MockServer::start().await;
    let payload = vec![b'x'; 64 * 1024];

    Mock::given(method("GET"))
        .and(path("/download_file.php"))
        .and(query_param("token_api", "tok123"))
        .and(query_param("file_id", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (progress, mut updates) = ProgressReporter::channel();
    let client = client_for(&mock_server);
    let download = client
        .download_file(&user_session(), "7", "report.pdf", progress)
        .await
        .unwrap();

    assert_eq!(download.file_id, "7");
    assert_eq!(download.display_name, "report.pdf");
    assert_eq!(download.bytes.len(), payload.len());

    let mut last = None;
    while let Ok(update) = updates.try_recv() {
        last = Some(update);
    }
    let last = last.unwrap();
    assert_eq!(last.bytes_transferred, payload.len() as u64);
    assert_eq!(last.percent(), Some(100));

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("report.pdf");
    download.save_to(&target).await.unwrap();
    assert_eq!(std::fs::read(&target).unwrap().len(), payload.len());
}

#[tokio::test]
async fn test_download_empty_body_is_a_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/download_file.php"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .download_file(&user_session(), "7", "a.txt", ProgressReporter::disabled())
        .await
        .unwrap_err();

    assert_eq!(err.message(), "Server returned an empty file");
    assert_eq!(err.status_code(), 200);
}

#[tokio::test]
async fn test_download_201_uses_status_field() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/download_file.php"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"status": "Access denied to file"})),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .download_file(&user_session(), "7", "a.txt", ProgressReporter::disabled())
        .await
        .unwrap_err();

    assert_eq!(err.message(), "Access denied to file");
    assert_eq!(err.status_code(), 201);
}

#[tokio::test]
async fn test_delete_file_not_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/delete_file.php"))
        .and(body_string_contains("file_id=42"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .delete_file(&user_session(), "42")
        .await
        .unwrap_err();

    assert_eq!(err.message(), "File for deletion not found on server");
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_error_message_policy_on_plain_bodies() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/delete_user.php"))
        .respond_with(ResponseTemplate::new(400).set_body_string("  user is protected \n"))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/change_password.php"))
        .respond_with(ResponseTemplate::new(400).set_body_string("x".repeat(300)))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let session = admin_session();

    let err = client.delete_user(&session, "5").await.unwrap_err();
    assert_eq!(err.message(), "Failed to delete user: user is protected");

    let err = client
        .change_user_password(&session, "5", "newpw")
        .await
        .unwrap_err();
    assert_eq!(
        err.message(),
        "Failed to change password (response too long to display)"
    );
}

#[tokio::test]
async fn test_create_user_refreshes_list_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/new_user.php"))
        .and(body_string_contains("username=carol"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/user_list.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "users": [{"id": "1", "username": "alice"}, {"id": "2", "username": "carol"}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let created = client
        .create_user(&admin_session(), "carol", "pw")
        .await
        .unwrap();

    assert_eq!(created.username, "carol");
    let users = created.refresh.unwrap();
    assert_eq!(users.len(), 2);
}

#[tokio::test]
async fn test_create_user_survives_refresh_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/new_user.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/user_list.php"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let created = client
        .create_user(&admin_session(), "carol", "pw")
        .await
        .unwrap();

    let refresh_error = created.refresh.unwrap_err();
    assert_eq!(refresh_error.status_code(), 500);
}

#[tokio::test]
async fn test_create_user_refresh_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/new_user.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/user_list.php"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .retry_strategy(RetryStrategy::Linear {
            delay: Duration::from_millis(10),
            max_retries: 3,
        })
        .build()
        .unwrap();

    let created = client
        .create_user(&admin_session(), "carol", "pw")
        .await
        .unwrap();

    assert_eq!(created.username, "carol");
    assert_eq!(created.refresh.unwrap_err().status_code(), 503);
}

#[tokio::test]
async fn test_create_user_failure_skips_refresh() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/new_user.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "error", "message": "User already exists"})),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/user_list.php"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let err = client
        .create_user(&admin_session(), "carol", "pw")
        .await
        .unwrap_err();

    assert_eq!(err.message(), "User already exists");
    assert_eq!(err.status_code(), 200);
}

#[tokio::test]
async fn test_trigger_backup_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/make_backup.php"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Backup started"})),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let message = client.trigger_backup(&admin_session()).await.unwrap();
    assert_eq!(message, "Backup started");
}

#[tokio::test]
async fn test_network_error_has_status_zero() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Client::builder()
        .base_url(format!("http://{}/", addr))
        .unwrap()
        .build()
        .unwrap();

    let err = client
        .login(Credentials::new("alice", "secret"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Network(_)));
    assert_eq!(err.status_code(), 0);
}

#[tokio::test]
async fn test_download_network_error_hides_token() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = Client::builder()
        .base_url(format!("http://{}/", addr))
        .unwrap()
        .build()
        .unwrap();
    let session = Session::new("SECRET-TOKEN-123", Role::User);

    let err = client
        .download_file(&session, "7", "a.bin", ProgressReporter::disabled())
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 0);
    assert!(!err.message().contains("SECRET-TOKEN-123"));
}

#[tokio::test]
async fn test_timeout_has_status_zero() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user_files.php"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let err = client.list_user_files(&user_session()).await.unwrap_err();
    assert!(matches!(err, Error::Timeout));
    assert_eq!(err.status_code(), 0);
}

#[tokio::test]
async fn test_retry_on_5xx_for_reads() {
    let mock_server = MockServer::start().await;
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let attempt_count_clone = attempt_count.clone();

    // First two requests fail with 503, third succeeds
    Mock::given(method("POST"))
        .and(path("/user_files.php"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = attempt_count_clone.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                ResponseTemplate::new(503).set_body_string("busy")
            } else {
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "success", "files": []}))
            }
        })
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .retry_strategy(RetryStrategy::Linear {
            delay: Duration::from_millis(10),
            max_retries: 3,
        })
        .build()
        .unwrap();

    let files = client.list_user_files(&user_session()).await.unwrap();
    assert!(files.is_empty());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retries_exhausted_returns_last_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user_list.php"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({"status": "down"})))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .retry_strategy(RetryStrategy::Linear {
            delay: Duration::from_millis(10),
            max_retries: 2,
        })
        .build()
        .unwrap();

    let err = client.list_users(&admin_session()).await.unwrap_err();
    assert_eq!(err.message(), "Failed to fetch users: down");
    assert_eq!(err.status_code(), 502);
}

#[tokio::test]
async fn test_mutations_are_never_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/delete_file.php"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .retry_strategy(RetryStrategy::Linear {
            delay: Duration::from_millis(10),
            max_retries: 3,
        })
        .build()
        .unwrap();

    let err = client.delete_file(&user_session(), "1").await.unwrap_err();
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn test_custom_retry_predicate() {
    let mock_server = MockServer::start().await;

    // Only retries on 503
    struct RetryOn503;
    impl RetryPredicate for RetryOn503 {
        fn should_retry(&self, error: &Error, _attempt: usize) -> bool {
            error.status_code() == 503
        }
    }

    Mock::given(method("POST"))
        .and(path("/file_info.php"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .retry_strategy(RetryStrategy::Linear {
            delay: Duration::from_millis(10),
            max_retries: 3,
        })
        .retry_predicate(Box::new(RetryOn503))
        .build()
        .unwrap();

    let err = client.file_info(&user_session(), "abc").await.unwrap_err();
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn test_default_headers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/make_backup.php"))
        .and(header("X-Client", "desktop"))
        .and(header("user-agent", "fexclient/2.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("queued"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .base_url(mock_server.uri())
        .unwrap()
        .default_header("X-Client", "desktop")
        .unwrap()
        .user_agent("fexclient/2.0")
        .unwrap()
        .build()
        .unwrap();

    let message = client.trigger_backup(&admin_session()).await.unwrap();
    assert_eq!(message, "queued");
}
