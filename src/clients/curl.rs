use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::Error;
use crate::error::Result;

/// How requests authenticate.
#[derive(Clone)]
pub enum Auth {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// HTTP basic auth, as used by Jira API tokens.
    Basic { user: String, token: String },
}

/// HTTP client using curl for making REST API requests
pub struct CurlClient {
    /// Service name used in error messages, e.g. "GitHub".
    service: &'static str,
    auth: Auth,
    accept: &'static str,
}

/// Error bodies of the services we talk to. GitHub sends `message`, Jira
/// sends `errorMessages` and/or a field map in `errors`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "errorMessages")]
    error_messages: Vec<String>,
    /// Jira sends a field → message map; GitHub sends a list of objects.
    #[serde(default)]
    errors: serde_json::Value,
}

impl ApiErrorBody {
    fn summary(self) -> Option<String> {
        let mut parts: Vec<String> = self.message.into_iter().collect();
        parts.extend(self.error_messages);
        if let serde_json::Value::Object(fields) = self.errors {
            parts.extend(fields.into_iter().filter_map(|(field, message)| {
                message.as_str().map(|message| format!("{field}: {message}"))
            }));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

impl CurlClient {
    pub fn new(service: &'static str, auth: Auth, accept: &'static str) -> Self {
        Self {
            service,
            auth,
            accept,
        }
    }

    /// Make a GET request
    pub async fn get(&self, url: &str) -> Result<String> {
        self.request("GET", url, None).await
    }

    /// Make a POST request
    pub async fn post(&self, url: &str, json_data: &str) -> Result<String> {
        self.request("POST", url, Some(json_data)).await
    }

    async fn request(&self, method: &str, url: &str, json_data: Option<&str>) -> Result<String> {
        debug!("{} {}", method, url);
        let mut args: Vec<String> = vec![
            "-s".into(),
            "-w".into(),
            "\n%{http_code}".into(),
            "-X".into(),
            method.into(),
            "-H".into(),
            format!("Accept: {}", self.accept),
            "-H".into(),
            "User-Agent: jig-cli".into(),
        ];
        match &self.auth {
            Auth::Bearer(token) => {
                args.push("-H".into());
                args.push(format!("Authorization: Bearer {token}"));
            }
            Auth::Basic { user, token } => {
                args.push("-u".into());
                args.push(format!("{user}:{token}"));
            }
        }
        if let Some(json_data) = json_data {
            args.push("-H".into());
            args.push("Content-Type: application/json".into());
            args.push("-d".into());
            args.push(json_data.into());
        }
        args.push(url.into());

        let output = Command::new("curl").args(&args).output().await?;

        if !output.status.success() {
            return Err(Error::Api {
                service: self.service,
                status: 0,
                message: format!(
                    "curl command failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        self.parse_response(&output.stdout)
    }

    /// Parse curl response with status code appended
    fn parse_response(&self, stdout: &[u8]) -> Result<String> {
        let output_str = String::from_utf8_lossy(stdout);
        let (response, status_code) = match output_str.rsplit_once('\n') {
            Some((body, code)) => (body, code.trim().parse::<u16>().unwrap_or(0)),
            None => ("", output_str.trim().parse::<u16>().unwrap_or(0)),
        };

        if status_code >= 400 || status_code == 0 {
            let message = serde_json::from_str::<ApiErrorBody>(response)
                .ok()
                .and_then(ApiErrorBody::summary)
                .unwrap_or_else(|| response.trim().to_string());
            return Err(Error::Api {
                service: self.service,
                status: status_code,
                message,
            });
        }

        Ok(response.to_string())
    }
}
