//! Blocking Bot API client over `reqwest`.
//!
//! Errors never carry the request URL: it embeds the bot token.

use std::io::Read;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

use super::types::{ApiResponse, File, Update, User};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound for every request except long polls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Added on top of the long-poll timeout so the server answers first.
const POLL_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// A download exceeded the configured size limit.
#[derive(Debug, Error)]
#[error("file is larger than the {limit} byte limit")]
pub struct FileTooLarge {
    pub limit: u64,
}

#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    api_url: String,
    token: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, poll_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            poll_timeout,
        })
    }

    pub fn get_me(&self) -> Result<User> {
        self.call("getMe", json!({}))
    }

    /// Long-poll for message updates starting at `offset`.
    pub fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let request = self
            .http
            .post(self.method_url("getUpdates"))
            .timeout(self.poll_timeout + POLL_TIMEOUT_SLACK)
            .json(&json!({
                "offset": offset,
                "timeout": self.poll_timeout.as_secs(),
                "allowed_updates": ["message"],
            }));
        self.execute("getUpdates", request)
    }

    pub fn get_file(&self, file_id: &str) -> Result<File> {
        self.call("getFile", json!({ "file_id": file_id }))
    }

    /// Download a file returned by `getFile`, refusing anything over `limit`.
    pub fn download(&self, file_path: &str, limit: u64) -> Result<Vec<u8>> {
        let url = format!("{}/file/bot{}/{}", self.api_url, self.token, file_path);
        let response = self
            .http
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| self.transport_error("file download", e))?;
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(FileTooLarge { limit }.into());
        }
        let mut bytes = Vec::new();
        response
            .take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .context("read file download")?;
        if bytes.len() as u64 > limit {
            return Err(FileTooLarge { limit }.into());
        }
        Ok(bytes)
    }

    pub fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: serde_json::Value =
            self.call("sendMessage", json!({ "chat_id": chat_id, "text": text }))?;
        Ok(())
    }

    pub fn send_photo(
        &self,
        chat_id: i64,
        photo: &[u8],
        file_name: &str,
        caption: &str,
    ) -> Result<()> {
        let part = Part::bytes(photo.to_vec())
            .file_name(file_name.to_string())
            .mime_str(content_type_for(file_name))
            .context("invalid photo content type")?;
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", part);
        let request = self.http.post(self.method_url("sendPhoto")).multipart(form);
        let _: serde_json::Value = self.execute("sendPhoto", request)?;
        Ok(())
    }

    fn call<T: DeserializeOwned>(&self, method: &str, payload: serde_json::Value) -> Result<T> {
        let request = self.http.post(self.method_url(method)).json(&payload);
        self.execute(method, request)
    }

    fn execute<T: DeserializeOwned>(&self, method: &str, request: RequestBuilder) -> Result<T> {
        // API errors come back as 4xx with a JSON envelope worth reading,
        // so the status is not checked here.
        let response = request
            .send()
            .map_err(|e| self.transport_error(method, e))?;
        let envelope: ApiResponse<T> = response
            .json()
            .map_err(|e| anyhow!("{}: malformed response body: {}", method, e.without_url()))?;
        unwrap_envelope(method, envelope)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    fn transport_error(&self, what: &str, err: reqwest::Error) -> anyhow::Error {
        anyhow!(
            "{} failed: {}",
            what,
            redact(&err.without_url().to_string(), &self.token)
        )
    }
}

/// Turn an API envelope into its result or an error carrying the description.
pub fn unwrap_envelope<T>(method: &str, envelope: ApiResponse<T>) -> Result<T> {
    if !envelope.ok {
        return Err(anyhow!(
            "{} rejected ({}): {}",
            method,
            envelope
                .error_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "no code".to_string()),
            envelope
                .description
                .unwrap_or_else(|| "no description".to_string())
        ));
    }
    envelope
        .result
        .ok_or_else(|| anyhow!("{} returned ok without a result", method))
}

fn redact(text: &str, token: &str) -> String {
    if token.is_empty() {
        text.to_string()
    } else {
        text.replace(token, "<token>")
    }
}

fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}
