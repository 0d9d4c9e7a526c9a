use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::classify::classify;
use super::endpoint::Endpoint;
use super::transport::{HttpTransport, Method, OutboundRequest, RequestBody, Transport};
use super::validate::{CallOptions, validate};
use crate::config::SdkConfig;
use crate::error::Result;

/// Validated, classified JSON calls against the AI Hero API.
///
/// Every call goes validate -> send -> classify. Nothing reaches the
/// transport unless validation passed.
#[derive(Debug)]
pub struct ApiClient<T> {
    endpoint: Endpoint,
    transport: T,
    config: SdkConfig,
}

/// The client used outside tests.
pub type Client = ApiClient<HttpTransport>;

impl Client {
    /// Build the reqwest-backed client from configuration.
    pub fn connect(config: SdkConfig) -> Result<Self> {
        config.check()?;
        if !config.is_production() {
            warn!(server_url = %config.server_url, "connecting to a non-production server");
        }
        let transport = HttpTransport::new(&config.api_key)?;
        ApiClient::with_transport(config, transport)
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(config: SdkConfig, transport: T) -> Result<Self> {
        let endpoint = Endpoint::new(&config.server_url)?;
        Ok(Self {
            endpoint,
            transport,
            config,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fresh options carrying the configured request timeout.
    pub fn options(&self, error_msg: impl Into<String>) -> CallOptions {
        CallOptions::new(error_msg).timeout_secs(self.config.request_timeout_secs)
    }

    /// [`CallOptions::resource`] with the configured request timeout.
    pub fn resource_options(&self, kind: &str, id: &str) -> CallOptions {
        CallOptions::resource(kind, id).timeout_secs(self.config.request_timeout_secs)
    }

    /// One validated request. 2xx bodies are parsed as JSON (empty -> `Null`).
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: &CallOptions,
    ) -> Result<Value> {
        let url = validate(&self.endpoint, method, path, &body, options)?;
        let request = OutboundRequest {
            method,
            url,
            body,
            timeout: Duration::from_secs(options.timeout_secs),
            extra_headers: options.extra_headers.clone(),
        };

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            debug!(status = response.status, %path, "request failed");
            return Err(classify(Some(response.status), &response.body, options));
        }
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    pub async fn get(&self, path: &str, options: &CallOptions) -> Result<Value> {
        self.request(Method::Get, path, RequestBody::Empty, options)
            .await
    }

    pub async fn post<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        options: &CallOptions,
    ) -> Result<Value> {
        let body = serde_json::to_value(body)?;
        self.request(Method::Post, path, RequestBody::Json(body), options)
            .await
    }

    pub async fn put_bytes(&self, path: &str, bytes: Vec<u8>, options: &CallOptions) -> Result<()> {
        self.request(Method::Put, path, RequestBody::Bytes(bytes), options)
            .await?;
        Ok(())
    }

    pub async fn get_as<R: DeserializeOwned>(&self, path: &str, options: &CallOptions) -> Result<R> {
        let value = self.get(path, options).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn post_as<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        options: &CallOptions,
    ) -> Result<R> {
        let value = self.post(path, body, options).await?;
        Ok(serde_json::from_value(value)?)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ScriptedTransport, client};
    use super::*;
    use crate::error::{AiHeroError, ErrorKind};
    use serde_json::json;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn non_production_warning_logged_once_per_connect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aihero.toml");
        std::fs::write(&path, "server_url = \"http://localhost:8080/\"\n").unwrap();

        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut config = SdkConfig::load_from(&path).unwrap();
            config.server_url = "http://localhost:8080/".into();
            Client::connect(config).unwrap();
        });

        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(logs.matches("non-production server").count(), 1, "{logs}");
    }

    #[tokio::test]
    async fn malformed_paths_never_reach_transport() {
        let api = client(ScriptedTransport::new());
        for path in ["", "projects/p1", "/has space"] {
            let err = api.get(path, &CallOptions::default()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Precondition);
        }
        let err = api
            .get("/ok", &CallOptions::default().timeout_secs(0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(api.transport().calls(), 0);
    }

    #[tokio::test]
    async fn success_returns_parsed_json() {
        let api = client(ScriptedTransport::new().reply_json(200, json!({"name": "demo"})));
        let value = api.get("/projects/p1", &CallOptions::default()).await.unwrap();
        assert_eq!(value["name"], "demo");

        let sent = api.transport().request(0);
        assert_eq!(sent.method, Method::Get);
        assert_eq!(sent.url.as_str(), "https://app.aihero.studio/api/v1/projects/p1");
        assert_eq!(sent.timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn listed_status_uses_override() {
        let api = client(ScriptedTransport::new().reply(403, "forbidden"));
        let options = CallOptions::resource("project", "p1");
        let err = api.get("/projects/p1", &options).await.unwrap_err();
        match err {
            AiHeroError::RemoteStatus { status, message } => {
                assert_eq!(status, 403);
                assert!(message.contains("Please check the API key."));
                assert!(message.ends_with("forbidden"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn unlisted_status_uses_generic_message() {
        let api = client(ScriptedTransport::new().reply(500, "internal"));
        let options = CallOptions::resource("project", "p1");
        let err = api.get("/projects/p1", &options).await.unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert!(err.to_string().contains("Could not fetch details for project p1 - internal"));
    }

    #[tokio::test]
    async fn transport_failure_propagates_unchanged() {
        let api = client(ScriptedTransport::new().fail("connection refused"));
        let err = api.get("/ping", &CallOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.status_code(), None);
    }

    #[tokio::test]
    async fn empty_success_body_is_null_and_bad_json_is_decode_error() {
        let api = client(
            ScriptedTransport::new()
                .reply(204, "")
                .reply(200, "<html>not json</html>"),
        );
        let value = api
            .post("/stash", &json!({"a": 1}), &CallOptions::default())
            .await
            .unwrap();
        assert!(value.is_null());

        let err = api.get("/page", &CallOptions::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[tokio::test]
    async fn put_bytes_sends_raw_body() {
        let api = client(ScriptedTransport::new().reply(200, ""));
        api.put_bytes("/files/uploads/a.txt", b"hello".to_vec(), &CallOptions::default())
            .await
            .unwrap();
        let sent = api.transport().request(0);
        assert_eq!(sent.method, Method::Put);
        assert_eq!(sent.body, RequestBody::Bytes(b"hello".to_vec()));
    }
}
