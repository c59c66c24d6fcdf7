// Device HTTP client
//
// Wraps `reqwest::Client` with device URL construction and status
// normalization. Every call is independent: the client holds nothing but
// the base address and the connection pool, and never retries.

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    ActivityLogEntry, HealthStatus, LockCommand, LockCommandRequest, LockState, MotionClip,
};
use crate::transport::TransportConfig;

/// Request/response client for the lock device.
///
/// Failures of any call surface as [`Error::Transport`] (the request never
/// completed) or [`Error::Status`] (non-2xx). The caller decides whether to
/// retry.
#[derive(Debug, Clone)]
pub struct LockClient {
    http: reqwest::Client,
    base_url: Url,
}

impl LockClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the device root, e.g. `http://10.0.0.5:8000`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Parse and validate a configured endpoint address, then build a client.
    pub fn from_address(address: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let base_url = parse_base_address(address)?;
        Self::new(base_url, transport)
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/{path}` without doubling the separator.
    fn address(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/{path}")
    }

    /// Address of the live camera resource. Never fetched by this client.
    pub fn camera_stream_address(&self) -> String {
        self.address("camera/live")
    }

    /// Address of a single recorded clip.
    ///
    /// The filename is a single percent-encoded path segment, so `/`, `?`
    /// and `#` in a device-supplied name cannot escape the clips folder.
    pub fn clip_address(&self, filename: &str) -> String {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        match url.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().push("clips").push(filename);
            }
            // http(s) bases always have a path
            Err(()) => return self.address(&format!("clips/{filename}")),
        }
        url.into()
    }

    // ── Lock state ───────────────────────────────────────────────────

    /// `GET /lock/state`
    pub async fn fetch_state(&self) -> Result<LockState, Error> {
        self.get_json("lock/state").await
    }

    /// `POST /lock/command` with `{"command": "lock" | "unlock"}`.
    ///
    /// The response body is ignored; any 2xx counts as success.
    pub async fn set_state(&self, is_locked: bool) -> Result<(), Error> {
        let url = self.address("lock/command");
        let body = LockCommandRequest {
            command: LockCommand::for_state(is_locked),
        };
        debug!(command = ?body.command, "POST {url}");

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        check_status(resp, &url).await.map(|_| ())
    }

    // ── History ──────────────────────────────────────────────────────

    /// `GET /activity`, in the order the device returns it.
    pub async fn fetch_activity_logs(&self) -> Result<Vec<ActivityLogEntry>, Error> {
        self.get_json("activity").await
    }

    /// `GET /clips`, in the order the device returns it.
    pub async fn fetch_motion_clips(&self) -> Result<Vec<MotionClip>, Error> {
        self.get_json("clips").await
    }

    // ── Health ───────────────────────────────────────────────────────

    /// `GET /` -- the device's liveness document.
    pub async fn health(&self) -> Result<HealthStatus, Error> {
        self.get_json("").await
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.address(path);
        debug!("GET {url}");

        let resp = self.http.get(&url).send().await.map_err(Error::Transport)?;
        let resp = check_status(resp, &url).await?;
        let body = resp.text().await.map_err(Error::Transport)?;

        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body: body.clone(),
            }
        })
    }
}

/// Map non-2xx responses to [`Error::Status`], keeping a body preview.
async fn check_status(resp: reqwest::Response, url: &str) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let preview: String = body.chars().take(200).collect();
    Err(Error::Status {
        status: status.as_u16(),
        url: url.to_owned(),
        body: preview,
    })
}

/// Parse a configured endpoint. Only `http` and `https` are accepted.
pub fn parse_base_address(address: &str) -> Result<Url, Error> {
    let url = Url::parse(address.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::UnsupportedScheme {
            scheme: other.to_owned(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> LockClient {
        LockClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn derived_addresses_do_not_double_slashes() {
        let c = client("http://10.0.0.5:8000/");
        assert_eq!(c.camera_stream_address(), "http://10.0.0.5:8000/camera/live");
        assert_eq!(
            c.clip_address("motion_20260105.mp4"),
            "http://10.0.0.5:8000/clips/motion_20260105.mp4"
        );
    }

    #[test]
    fn derived_addresses_keep_path_prefix() {
        let c = client("https://lock.example.com/front-door");
        assert_eq!(
            c.camera_stream_address(),
            "https://lock.example.com/front-door/camera/live"
        );
    }

    #[test]
    fn clip_address_encodes_filename_as_one_segment() {
        let c = client("https://lock.example.com/front-door/");
        assert_eq!(
            c.clip_address("front door #2?.mp4"),
            "https://lock.example.com/front-door/clips/front%20door%20%232%3F.mp4"
        );
        assert_eq!(
            c.clip_address("../config"),
            "https://lock.example.com/front-door/clips/..%2Fconfig"
        );
    }

    #[test]
    fn base_address_requires_http_scheme() {
        assert!(parse_base_address("http://10.0.0.5:8000").is_ok());
        assert!(matches!(
            parse_base_address("ftp://10.0.0.5"),
            Err(Error::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            parse_base_address("10.0.0.5:8000/no-scheme"),
            Err(Error::InvalidUrl(_) | Error::UnsupportedScheme { .. })
        ));
    }
}
