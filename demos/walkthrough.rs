//! Logs in, lists files, optionally uploads one, and shows details and
//! a download of the first listed file.
//!
//! ```text
//! FEX_URL=https://files.example.com/api FEX_USER=alice FEX_PASSWORD=secret \
//!     cargo run --example walkthrough -- ./notes.txt
//! ```

use filexchange::{Client, Credentials, ProgressReporter, RetryStrategy};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filexchange=info".into()),
        )
        .init();

    let base_url = std::env::var("FEX_URL").unwrap_or_else(|_| "http://localhost:8080/".into());
    let username = std::env::var("FEX_USER").unwrap_or_else(|_| "alice".into());
    let password = std::env::var("FEX_PASSWORD").unwrap_or_default();

    let client = Client::builder()
        .base_url(&base_url)?
        .timeout(Duration::from_secs(30))
        .retry_strategy(RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            max_retries: 2,
            jitter: true,
        })
        .build()?;

    let session = match client.login(Credentials::new(username, password)).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Login failed ({}): {}", e.status_code(), e.message());
            return Ok(());
        }
    };
    println!("Logged in as {}", session.role());

    if let Some(path) = std::env::args().nth(1) {
        let (progress, mut updates) = ProgressReporter::channel();
        let printer = tokio::spawn(async move {
            while let Some(p) = updates.recv().await {
                if let Some(percent) = p.percent() {
                    println!("  uploaded {}%", percent);
                }
            }
        });
        match client.upload_file(&session, &path, progress).await {
            Ok(()) => println!("Uploaded {}", path),
            Err(e) => eprintln!("Upload failed ({}): {}", e.status_code(), e.message()),
        }
        let _ = printer.await;
    }

    let files = client.list_user_files(&session).await?;
    println!("{} file(s):", files.len());
    for file in &files {
        println!("  [{}] {} {} {}", file.id, file.file_name, file.file_size, file.upload_date);
    }

    if let Some(first) = files.first() {
        if let Some(identifier) = first.lookup_identifier() {
            match client.file_info(&session, identifier).await {
                Ok(info) => println!(
                    "{}: {}, {} downloads",
                    info.file_name(),
                    info.file_size(),
                    info.download_count().unwrap_or_else(|| "?".into())
                ),
                Err(e) => eprintln!("File info failed: {}", e),
            }
        }

        let download = client
            .download_file(&session, &first.id, &first.file_name, ProgressReporter::disabled())
            .await?;
        println!("Downloaded {} ({} bytes)", download.display_name, download.bytes.len());
    }

    if session.is_admin() {
        let users = client.list_users(&session).await?;
        println!("{} account(s)", users.len());
    }

    Ok(())
}
