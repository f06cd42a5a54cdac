use crate::error::{Result, RungoError};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Build the HTTP client shared by the catalog and the downloader
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .timeout(timeout)
        .build()
        .map_err(|e| RungoError::ConfigError(format!("failed to build HTTP client: {}", e)))
}

#[derive(Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Download a file with progress indication. On any failure the partially
    /// written destination file is removed.
    pub async fn download_with_progress<P: AsRef<Path>>(&self, url: &str, dest: P) -> Result<u64> {
        let dest = dest.as_ref();
        let result = self.fetch_into(url, dest).await;

        if result.is_err() && dest.exists() {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                warn!("failed to remove partial download {}: {}", dest.display(), e);
            }
        }

        result
    }

    async fn fetch_into(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RungoError::request(url, e))?;

        if response.status() != StatusCode::OK {
            return Err(RungoError::UnexpectedStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let total_size = response.content_length().unwrap_or(0);

        let pb = ProgressBar::new(total_size);
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(format!(
            "Downloading {}",
            url.rsplit('/').next().unwrap_or("archive")
        ));

        let mut file = File::create(dest).await?;
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RungoError::request(url, e))?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush().await?;

        pb.finish_and_clear();
        debug!("downloaded {} bytes from {}", downloaded, url);
        Ok(downloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_download_writes_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/file.bin")
            .with_status(200)
            .with_body("hello world")
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("file.bin");
        let downloader = Downloader::new(http_client(Duration::from_secs(5)).unwrap());

        let written = downloader
            .download_with_progress(&format!("{}/file.bin", server.url()), &dest)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(written, 11);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_download_rejects_non_ok_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.tar.gz")
            .with_status(404)
            .create_async()
            .await;

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("missing.tar.gz");
        let downloader = Downloader::new(http_client(Duration::from_secs(5)).unwrap());

        let err = downloader
            .download_with_progress(&format!("{}/missing.tar.gz", server.url()), &dest)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RungoError::UnexpectedStatus { status, .. } if status == StatusCode::NOT_FOUND
        ));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_unresponsive_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("slow.tar.gz");
        let downloader = Downloader::new(http_client(Duration::from_millis(200)).unwrap());

        let err = downloader
            .download_with_progress(&format!("http://{}/slow.tar.gz", addr), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, RungoError::Timeout { .. }), "got {err:?}");
        assert!(err.is_retryable());
        assert!(!dest.exists());
        server.abort();
    }
}
