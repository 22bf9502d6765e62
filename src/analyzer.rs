//! Per-error analysis through a [`GenerativeModel`].

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::gemini::GenerativeModel;
use crate::prompts;
use crate::response::{self, AnalysisResult, SchemaMode};

const LOGGED_MESSAGE_CHARS: usize = 100;
const LOGGED_RESPONSE_CHARS: usize = 500;

/// Sends error messages to a model one at a time and parses the replies
#[derive(Clone)]
pub struct Analyzer {
    model: Arc<dyn GenerativeModel>,
    schema: SchemaMode,
}

impl Analyzer {
    /// Creates an analyzer backed by `model`
    pub fn new(model: Arc<dyn GenerativeModel>, schema: SchemaMode) -> Self {
        Self { model, schema }
    }

    /// Analyzes one error message
    ///
    /// Never fails: transport errors and unparseable replies are logged and
    /// replaced with [`AnalysisResult::fallback`].
    pub async fn analyze(&self, error_message: &str) -> AnalysisResult {
        let prompt = prompts::error_analysis_prompt(error_message);
        info!(
            "Sending error to {}: {}...",
            self.model.name(),
            truncate_chars(error_message, LOGGED_MESSAGE_CHARS)
        );

        let raw = match self.model.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(upstream = e.is_upstream(), "Gemini API error: {}", e);
                return AnalysisResult::fallback(error_message);
            }
        };
        debug!(
            "Gemini API response (first {} chars): {}...",
            LOGGED_RESPONSE_CHARS,
            truncate_chars(&raw, LOGGED_RESPONSE_CHARS)
        );

        match response::parse_analysis(&raw, self.schema) {
            Ok(result) => {
                info!("Successfully parsed Gemini API response");
                debug!(?result, "Parsed analysis");
                result
            }
            Err(failure) => {
                error!(kind = failure.kind(), "{}", failure);
                debug!("Raw response: {}", raw);
                AnalysisResult::fallback(error_message)
            }
        }
    }

    /// Analyzes every message in order, one request at a time
    pub async fn analyze_all(&self, error_messages: &[String]) -> Vec<AnalysisResult> {
        let mut results = Vec::with_capacity(error_messages.len());
        for error_message in error_messages {
            results.push(self.analyze(error_message).await);
        }
        results
    }
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AnalyzerError, Result};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::io;
    use std::sync::Mutex;
    use tracing_subscriber::fmt::MakeWriter;

    /// Replies to each prompt from a fixed script, in call order
    struct ScriptedModel {
        replies: Mutex<Vec<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(mut replies: Vec<Result<String>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(AnalyzerError::Api("script exhausted".into())))
        }
    }

    fn fenced(error: &str) -> Result<String> {
        Ok(format!(
            "```json\n{{\"error\": \"{}\", \"description\": \"d\", \"resolve_technique\": \"r\"}}\n```",
            error
        ))
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_successful_analysis() {
        let model = Arc::new(ScriptedModel::new(vec![fenced("disk full")]));
        let analyzer = Analyzer::new(model.clone(), SchemaMode::Lenient);

        let result = analyzer.analyze("disk full").await;
        assert_eq!(result.error, "disk full");
        assert_eq!(result.description, "d");
        assert_eq!(result.resolve_technique, "r");

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Error message:\ndisk full"));
    }

    #[tokio::test]
    async fn test_transport_failure_falls_back() {
        let model = Arc::new(ScriptedModel::new(vec![Err(AnalyzerError::Api("503".into()))]));
        let analyzer = Analyzer::new(model, SchemaMode::Lenient);

        assert_eq!(analyzer.analyze("timeout").await, AnalysisResult::fallback("timeout"));
    }

    #[tokio::test]
    async fn test_unparseable_reply_falls_back() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(String::new()),
            Ok("I cannot help with that.".to_string()),
            Ok("```json\n{not json}\n```".to_string()),
        ]));
        let analyzer = Analyzer::new(model, SchemaMode::Lenient);

        for message in ["a", "b", "c"] {
            assert_eq!(analyzer.analyze(message).await, AnalysisResult::fallback(message));
        }
    }

    #[tokio::test]
    async fn test_strict_mode_falls_back_on_missing_key() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(
            "```json\n{\"error\": \"e\"}\n```".to_string(),
        )]));
        let analyzer = Analyzer::new(model, SchemaMode::Strict);

        assert_eq!(analyzer.analyze("e").await, AnalysisResult::fallback("e"));
    }

    #[tokio::test]
    async fn test_empty_object_falls_back() {
        let model = Arc::new(ScriptedModel::new(vec![Ok("```json\n{}\n```".to_string())]));
        let analyzer = Analyzer::new(model, SchemaMode::Lenient);

        assert_eq!(analyzer.analyze("disk full").await, AnalysisResult::fallback("disk full"));
    }

    #[tokio::test]
    async fn test_analyze_all_preserves_order() {
        let model = Arc::new(ScriptedModel::new(vec![
            fenced("e1"),
            Err(AnalyzerError::Api("boom".into())),
            fenced("e3"),
        ]));
        let analyzer = Analyzer::new(model, SchemaMode::Lenient);
        let messages = vec!["e1".to_string(), "e2".to_string(), "e3".to_string()];

        let results = analyzer.analyze_all(&messages).await;
        let errors: Vec<&str> = results.iter().map(|r| r.error.as_str()).collect();
        assert_eq!(errors, vec!["e1", "e2", "e3"]);
        assert_eq!(results[1], AnalysisResult::fallback("e2"));
    }

    #[tokio::test]
    async fn test_parse_failure_is_logged_with_kind() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let model = Arc::new(ScriptedModel::new(vec![Ok("no fences here".to_string())]));
        Analyzer::new(model, SchemaMode::Lenient).analyze("oops").await;

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("malformed_fence"));
        assert!(output.contains("Raw response: no fences here"));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
