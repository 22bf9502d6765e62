/// Asks for a fenced JSON object describing one error message
pub const ERROR_ANALYSIS: &str = r#"
Analyze the following error message and provide:
- error: The error message
- description: A brief explanation of why this error occurred
- resolve_technique: Steps to resolve the error

Return the result as a valid JSON object with keys "error", "description", and "resolve_technique". Ensure the response is strictly JSON, enclosed in ```json``` code fences.

Error message:
{error_message}
"#;

/// Renders [`ERROR_ANALYSIS`] for one error message
pub fn error_analysis_prompt(error_message: &str) -> String {
    ERROR_ANALYSIS.replacen("{error_message}", error_message, 1)
}
