//! HTTP client for the osctrl server
//!
//! Every call is a JSON POST authenticated by the environment secret.
//! Only a 200 response counts as success; nothing is retried.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Serialize;

use od_core::config::ResolvedConfig;
use od_core::{Deadline, RemoteError};
use od_protocol::{
    CertRequest, Endpoints, FlagsRequest, ScriptKind, ScriptRequest, VerifyRequest,
    VerifyResponse, JSON_CONTENT_TYPE, USER_AGENT,
};

/// Client for the osctrld endpoints of one environment
pub struct RemoteStateClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    secret: String,
    secret_file: PathBuf,
    cert_file: PathBuf,
    request_timeout: Duration,
}

impl RemoteStateClient {
    /// Build a client from resolved configuration
    pub fn new(config: &ResolvedConfig) -> Result<Self, RemoteError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if config.insecure {
            tracing::warn!(
                "TLS certificate validation is disabled for {}",
                config.base_url
            );
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build().map_err(|e| RemoteError::Transport {
            url: config.base_url.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            http,
            endpoints: config.endpoints.clone(),
            secret: config.secret.clone(),
            secret_file: config.secret_file.clone(),
            cert_file: config.cert_file.clone(),
            request_timeout: config.request_timeout,
        })
    }

    /// Endpoints this client talks to
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// POST `body` as JSON to `url` and return the raw response body.
    ///
    /// Both sending the request and reading the body count against `deadline`.
    pub async fn fetch<B: Serialize>(
        &self,
        url: &str,
        body: &B,
        deadline: Deadline,
    ) -> Result<Vec<u8>, RemoteError> {
        let payload = serde_json::to_vec(body)?;
        tracing::debug!("POST {} ({} bytes)", url, payload.len());

        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(payload)
            .send();
        let response = deadline
            .run(request)
            .await
            .map_err(|_| timed_out(url, deadline))?
            .map_err(|e| transport(url, deadline, e))?;

        let status = response.status();
        let bytes = deadline
            .run(response.bytes())
            .await
            .map_err(|_| timed_out(url, deadline))?
            .map_err(|e| transport(url, deadline, e))?;

        if status != StatusCode::OK {
            return Err(RemoteError::Server {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).trim().to_string(),
            });
        }
        tracing::debug!("HTTP {} from {} ({} bytes)", status.as_u16(), url, bytes.len());
        Ok(bytes.to_vec())
    }

    /// Enroll or remove script for this platform
    pub async fn fetch_script(&self, kind: ScriptKind) -> Result<String, RemoteError> {
        let request = ScriptRequest {
            secret: self.secret.clone(),
        };
        self.fetch_text(self.endpoints.script(kind), &request).await
    }

    /// Flags osquery should run with
    pub async fn fetch_flags(&self) -> Result<String, RemoteError> {
        let request = self.flags_request();
        self.fetch_text(&self.endpoints.flags, &request).await
    }

    /// Server certificate osquery should trust
    pub async fn fetch_certificate(&self) -> Result<String, RemoteError> {
        let request = CertRequest {
            secret: self.secret.clone(),
        };
        self.fetch_text(&self.endpoints.cert, &request).await
    }

    /// Desired state used by verification
    pub async fn fetch_verification(&self) -> Result<VerifyResponse, RemoteError> {
        let request: VerifyRequest = self.flags_request();
        let body = self
            .fetch(&self.endpoints.verify, &request, self.deadline())
            .await?;
        Ok(VerifyResponse::from_slice(&body)?)
    }

    async fn fetch_text<B: Serialize>(&self, url: &str, body: &B) -> Result<String, RemoteError> {
        let bytes = self.fetch(url, body, self.deadline()).await?;
        Ok(String::from_utf8_lossy(&bytes).trim().to_string())
    }

    fn flags_request(&self) -> FlagsRequest {
        FlagsRequest {
            secret: self.secret.clone(),
            secret_file: self.secret_file.display().to_string(),
            cert_file: self.cert_file.display().to_string(),
        }
    }

    fn deadline(&self) -> Deadline {
        Deadline::after(self.request_timeout)
    }
}

fn timed_out(url: &str, deadline: Deadline) -> RemoteError {
    RemoteError::Timeout {
        url: url.to_string(),
        after: deadline.budget(),
    }
}

fn transport(url: &str, deadline: Deadline, err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        return timed_out(url, deadline);
    }
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    RemoteError::Transport {
        url: url.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use od_core::{AgentConfig, PlatformProfile};
    use std::sync::{Arc, Mutex};
    use tracing::Level;
    use tracing_subscriber::fmt::MakeWriter;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RemoteStateClient {
        let config = AgentConfig {
            secret: "abc".to_string(),
            environment: "dev".to_string(),
            base_url: server.uri(),
            osquery_path: Some(PathBuf::from("/etc/osquery")),
            ..AgentConfig::default()
        };
        let resolved = config.resolve(PlatformProfile::lookup("linux")).unwrap();
        RemoteStateClient::new(&resolved).unwrap()
    }

    /// Log sink shared between a test subscriber and the assertions
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_insecure_client_warns() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(Level::WARN)
            .with_ansi(false)
            .finish();

        let config = AgentConfig {
            environment: "dev".to_string(),
            base_url: "https://osctrl.example.com".to_string(),
            insecure: true,
            ..AgentConfig::default()
        };
        let resolved = config.resolve(PlatformProfile::lookup("linux")).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            RemoteStateClient::new(&resolved).unwrap();
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("TLS certificate validation is disabled"));
        assert!(output.contains("https://osctrl.example.com"));
    }

    #[tokio::test]
    async fn test_secure_client_is_quiet() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(Level::WARN)
            .with_ansi(false)
            .finish();

        let config = AgentConfig {
            environment: "dev".to_string(),
            base_url: "https://osctrl.example.com".to_string(),
            ..AgentConfig::default()
        };
        let resolved = config.resolve(PlatformProfile::lookup("linux")).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            RemoteStateClient::new(&resolved).unwrap();
        });

        assert!(logs.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_flags_trims_and_sends_paths() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dev/osctrld-flags"))
            .and(header("content-type", "application/json"))
            .and(header("user-agent", USER_AGENT))
            .and(body_json(serde_json::json!({
                "secret": "abc",
                "secretFile": "/etc/osquery/osquery.secret",
                "certFile": "/etc/osquery/osctrl.crt",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("--x=1\n--y=2\n\n"))
            .expect(1)
            .mount(&server)
            .await;

        let flags = client_for(&server).fetch_flags().await.unwrap();
        assert_eq!(flags, "--x=1\n--y=2");
    }

    #[tokio::test]
    async fn test_fetch_script_uses_platform_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dev/remove/linux/osctrld-script"))
            .and(body_json(serde_json::json!({ "secret": "abc" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("#!/bin/sh\necho bye\n"))
            .mount(&server)
            .await;

        let script = client_for(&server)
            .fetch_script(ScriptKind::Remove)
            .await
            .unwrap();
        assert_eq!(script, "#!/bin/sh\necho bye");
    }

    #[tokio::test]
    async fn test_non_200_is_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dev/osctrld-cert"))
            .respond_with(ResponseTemplate::new(403).set_body_string("invalid secret\n"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_certificate().await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.to_string(), "HTTP 403 - Response: invalid secret");
    }

    #[tokio::test]
    async fn test_other_2xx_is_not_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_flags().await.unwrap_err();
        assert_eq!(err.status(), Some(204));
    }

    #[tokio::test]
    async fn test_fetch_verification_decodes_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/dev/osctrld-verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "flags": "--x=1",
                "certificate": "",
                "osquery_version": "5.2.0",
            })))
            .mount(&server)
            .await;

        let desired = client_for(&server).fetch_verification().await.unwrap();
        assert_eq!(desired.flags, "--x=1");
        assert_eq!(desired.osquery_version, "5.2.0");
    }

    #[tokio::test]
    async fn test_malformed_verification_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_verification().await.unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .fetch(
                &client.endpoints().flags,
                &serde_json::json!({}),
                Deadline::after(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        drop(server);

        let err = client.fetch_flags().await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport { .. }));
    }
}
