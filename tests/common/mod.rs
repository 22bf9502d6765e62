#![allow(dead_code)]

use async_trait::async_trait;
use log_error_analyzer::{AnalyzerError, Config, GenerativeModel, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

pub mod test_helpers {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, Response};
    use serde_json::Value;

    pub const BOUNDARY: &str = "----log-error-analyzer-test";

    /// Model double answering by error message, so replies do not depend on call order
    pub struct FakeModel {
        replies: HashMap<String, Result<String>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeModel {
        pub fn new() -> Self {
            Self {
                replies: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn reply(mut self, error_message: &str, text: &str) -> Self {
            self.replies.insert(error_message.to_string(), Ok(text.to_string()));
            self
        }

        pub fn fail(mut self, error_message: &str) -> Self {
            self.replies.insert(
                error_message.to_string(),
                Err(AnalyzerError::Api("503 Service Unavailable".to_string())),
            );
            self
        }
    }

    #[async_trait]
    impl GenerativeModel for FakeModel {
        fn name(&self) -> &str {
            "fake-model"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            let error_message = prompt
                .trim_end()
                .rsplit("Error message:\n")
                .next()
                .unwrap_or_default()
                .to_string();
            self.calls.lock().unwrap().push(error_message.clone());

            match self.replies.get(&error_message) {
                Some(Ok(text)) => Ok(text.clone()),
                Some(Err(_)) | None => Err(AnalyzerError::Api("503 Service Unavailable".to_string())),
            }
        }
    }

    pub fn fenced_reply(error: &str, description: &str, resolve: &str) -> String {
        format!(
            "Sure! Here you go:\n```json\n{}\n```",
            serde_json::json!({
                "error": error,
                "description": description,
                "resolve_technique": resolve,
            })
        )
    }

    pub fn create_test_config(root: &Path) -> Config {
        let mut config = Config::default();
        config.gemini.api_key = "test-key".to_string();
        config.upload_dir = root.join("uploads");
        config.log_dir = root.join("logs");
        config.rate_limits.enabled = false;
        config
    }

    pub fn multipart_body(field: &str, filename: Option<&str>, contents: &[u8]) -> Vec<u8> {
        let disposition = match filename {
            Some(filename) => format!("form-data; name=\"{}\"; filename=\"{}\"", field, filename),
            None => format!("form-data; name=\"{}\"", field),
        };
        let mut body = format!(
            "--{}\r\nContent-Disposition: {}\r\nContent-Type: text/plain\r\n\r\n",
            BOUNDARY, disposition
        )
        .into_bytes();
        body.extend_from_slice(contents);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    pub fn upload_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    pub fn process_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/process_errors")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub async fn json_body(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
