//! The repeat-request benchmark client.
//!
//! Sends the same GET request a fixed number of times over a pinned
//! HTTP version and emits one JSON line per completed request with its
//! wall-clock latency. Request failures are logged and skipped rather
//! than aborting the run, so a transient error does not discard the
//! measurements already taken.

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

/// Errors from building or driving the benchmark client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// A record could not be written to the output.
    #[error("failed to write request record: {0}")]
    Record(#[from] std::io::Error),

    /// A record could not be encoded.
    #[error("failed to encode request record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The HTTP protocol version the client is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    /// HTTP/1.1 only.
    Http1,
    /// HTTP/2 over cleartext, negotiated by prior knowledge.
    Http2,
}

impl TryFrom<u8> for HttpVersion {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Self::Http1),
            2 => Ok(Self::Http2),
            other => Err(format!("invalid HTTP version: {other}")),
        }
    }
}

/// How the client disposes of each response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// Drop the response without reading the body.
    Discard,
    /// Read the body to completion before moving on.
    Drain,
}

/// One measured request, emitted as a JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Completion time of the request.
    pub time: DateTime<Utc>,
    /// Unique id correlating this record with diagnostic output.
    pub req_uuid: String,
    /// HTTP status code of the response.
    pub status_code: u16,
    /// Wall-clock time from send to body disposal, in nanoseconds.
    pub elapsed_ns: u64,
}

/// An HTTP client that repeats one request and records per-request
/// timing.
#[derive(Debug)]
pub struct RepeatClient {
    client: reqwest::Client,
    url: Url,
    body_mode: BodyMode,
}

impl RepeatClient {
    /// Builds a client pinned to the given HTTP version.
    pub fn new(url: Url, version: HttpVersion, body_mode: BodyMode) -> Result<Self, ClientError> {
        let builder = reqwest::Client::builder();
        let builder = match version {
            HttpVersion::Http1 => builder.http1_only(),
            HttpVersion::Http2 => builder.http2_prior_knowledge(),
        };
        let client = builder.build().map_err(ClientError::Build)?;

        Ok(Self {
            client,
            url,
            body_mode,
        })
    }

    /// Sends the request `n` times, writing one [`RequestRecord`] line
    /// per completed request to `out`.
    ///
    /// The elapsed time covers send through body disposal, so drain
    /// and discard modes measure genuinely different work.
    pub async fn run<W>(&self, n: u64, out: &mut W) -> Result<(), ClientError>
    where
        W: AsyncWrite + Unpin,
    {
        for _ in 0..n {
            let req_uuid = Uuid::new_v4().to_string();
            let started = Instant::now();

            let response = match self.client.get(self.url.clone()).send().await {
                Ok(response) => response,
                Err(error) => {
                    warn!(req_uuid = %req_uuid, error = %error, "request failed");
                    continue;
                }
            };
            let status_code = response.status().as_u16();

            if let Err(error) = self.dispose(response).await {
                warn!(req_uuid = %req_uuid, error = %error, "response body read failed");
                continue;
            }
            let elapsed_ns = started.elapsed().as_nanos() as u64;

            let record = RequestRecord {
                time: Utc::now(),
                req_uuid,
                status_code,
                elapsed_ns,
            };
            let mut line = serde_json::to_vec(&record)?;
            line.push(b'\n');
            out.write_all(&line).await?;
        }
        out.flush().await?;
        Ok(())
    }

    async fn dispose(&self, mut response: reqwest::Response) -> Result<(), reqwest::Error> {
        match self.body_mode {
            BodyMode::Discard => drop(response),
            BodyMode::Drain => while response.chunk().await?.is_some() {},
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_version_parses_from_integers() {
        assert_eq!(HttpVersion::try_from(1).unwrap(), HttpVersion::Http1);
        assert_eq!(HttpVersion::try_from(2).unwrap(), HttpVersion::Http2);
        assert!(HttpVersion::try_from(3).is_err());
    }

    #[test]
    fn request_record_round_trips_as_json_line() {
        let record = RequestRecord {
            time: Utc::now(),
            req_uuid: "abc".into(),
            status_code: 200,
            elapsed_ns: 1_234_567,
        };
        let line = serde_json::to_string(&record).unwrap();
        let parsed: RequestRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.status_code, 200);
        assert_eq!(parsed.elapsed_ns, 1_234_567);
    }

    #[tokio::test]
    async fn records_every_completed_request() {
        let (addr, shutdown) = crate::server::spawn("127.0.0.1:0").await.unwrap();

        let url: Url = format!("http://{addr}/64").parse().unwrap();
        let client = RepeatClient::new(url, HttpVersion::Http1, BodyMode::Drain).unwrap();

        let mut out = Vec::new();
        client.run(3, &mut out).await.unwrap();
        drop(shutdown);

        let lines: Vec<RequestRecord> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        for record in lines {
            assert_eq!(record.status_code, 200);
            assert!(record.elapsed_ns > 0);
        }
    }
}
