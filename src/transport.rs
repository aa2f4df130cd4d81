//! Executes one HTTP exchange and reports body progress.
//!
//! The transport knows nothing about endpoint semantics: it sends an
//! [`ApiRequest`] and returns whatever status and body came back. Anything
//! that prevents a response from arriving becomes [`Error::Network`] or
//! [`Error::Timeout`], both reported with status code 0.

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use http::{HeaderMap, Method};
use reqwest::multipart::{Form, Part};
use std::time::{Duration, Instant};
use tokio_util::io::ReaderStream;
use url::Url;

use crate::{
    progress::ProgressReporter,
    request::{ApiRequest, Endpoint, RequestBody, UploadSource},
    response::RawResponse,
    Result,
};

/// Caps the up-front buffer reservation for bodies with a declared length.
const MAX_PREALLOCATION: u64 = 8 * 1024 * 1024;

pub(crate) struct Transport {
    http_client: reqwest::Client,
    base_url: Url,
    default_headers: HeaderMap,
    timeout: Option<Duration>,
}

impl Transport {
    pub(crate) fn new(
        http_client: reqwest::Client,
        base_url: Url,
        default_headers: HeaderMap,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            http_client,
            base_url,
            default_headers,
            timeout,
        }
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an endpoint against the base address.
    pub(crate) fn url_for(&self, endpoint: Endpoint) -> Result<Url> {
        Ok(self.base_url.join(endpoint.path())?)
    }

    /// Sends `request` and reads the full response body.
    ///
    /// Upload bodies report sent bytes through `progress`; GET responses
    /// report received bytes. Other exchanges report nothing. The upload file
    /// handle is owned by the request body and released when it is dropped,
    /// on success and on every failure path.
    pub(crate) async fn execute(
        &self,
        request: ApiRequest,
        attempt: usize,
        progress: &ProgressReporter,
    ) -> Result<RawResponse> {
        let url = self.url_for(request.endpoint)?;
        let method = request.endpoint.method();

        tracing::debug!(
            method = %method,
            url = %url,
            params = %request.param_names(),
            attempt = attempt,
            "Executing HTTP request"
        );

        let mut builder = self.http_client.request(method.clone(), url);

        for (name, value) in &self.default_headers {
            builder = builder.header(name, value);
        }

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let receive_progress = if method == Method::GET {
            progress.clone()
        } else {
            ProgressReporter::disabled()
        };

        builder = match request.body {
            RequestBody::Params if method == Method::GET => builder.query(&request.params),
            RequestBody::Params => builder.form(&request.params),
            RequestBody::Upload(source) => {
                builder.multipart(upload_form(request.params, source, progress.clone())?)
            }
        };

        let start_time = Instant::now();
        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = read_body(response, &receive_progress).await?;
        let latency = start_time.elapsed();

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            bytes = body.len(),
            attempt = attempt,
            "Received HTTP response"
        );

        Ok(RawResponse {
            status,
            headers,
            body,
            latency,
        })
    }
}

/// Builds the multipart body: text fields first, then the streamed file.
fn upload_form(
    params: Vec<(&'static str, String)>,
    source: UploadSource,
    progress: ProgressReporter,
) -> Result<Form> {
    let total = source.len;
    let mut sent = 0u64;
    let stream = ReaderStream::new(source.file).inspect(move |chunk| {
        if let Ok(bytes) = chunk {
            sent += bytes.len() as u64;
            if total > 0 {
                progress.report(sent, total);
            }
        }
    });

    let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
        .file_name(source.file_name)
        .mime_str(&source.content_type)?;

    let mut form = Form::new();
    for (name, value) in params {
        form = form.text(name, value);
    }
    Ok(form.part("file", part))
}

async fn read_body(mut response: reqwest::Response, progress: &ProgressReporter) -> Result<Bytes> {
    let total = response.content_length().unwrap_or(0);
    let mut body = BytesMut::with_capacity(total.min(MAX_PREALLOCATION) as usize);

    while let Some(chunk) = response.chunk().await? {
        body.extend_from_slice(&chunk);
        progress.report(body.len() as u64, total);
    }

    Ok(body.freeze())
}
