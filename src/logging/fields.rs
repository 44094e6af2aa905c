//! Field extraction helpers for structured logging

use crate::api::types::{ApiError, InferenceRequest, InferenceResponse, MessageContent};

/// Extract token counts from an inference response
///
/// Returns a tuple of (prompt_tokens, completion_tokens, total_tokens).
/// Returns (0, 0, 0) if usage information is not available.
///
/// # Examples
///
/// ```no_run
/// use gatehouse::logging::extract_tokens;
/// use gatehouse::api::types::InferenceResponse;
///
/// let response = InferenceResponse {
///     // ... response fields ...
/// #   id: "test".to_string(),
/// #   object: "chat.completion".to_string(),
/// #   created: 0,
/// #   model: "test".to_string(),
/// #   choices: vec![],
/// #   usage: None,
/// };
/// let (prompt, completion, total) = extract_tokens(&response);
/// ```
pub fn extract_tokens(response: &InferenceResponse) -> (u32, u32, u32) {
    if let Some(usage) = &response.usage {
        (
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens,
        )
    } else {
        (0, 0, 0)
    }
}

/// Extract status and error message from a Result
///
/// Returns a tuple of (status, error_message).
/// - For Ok results: ("success", None)
/// - For Err results: (error_type, Some(error_message))
///
/// # Examples
///
/// ```no_run
/// use gatehouse::logging::extract_status;
/// use gatehouse::api::types::ApiError;
/// use axum::response::Response;
///
/// let result: Result<Response, ApiError> = Err(ApiError::unavailable("backend offline"));
/// let (status, error_msg) = extract_status(&result);
/// assert_eq!(status, "error");
/// assert!(error_msg.is_some());
/// ```
pub fn extract_status(
    result: &Result<axum::response::Response, ApiError>,
) -> (String, Option<String>) {
    match result {
        Ok(_) => ("success".to_string(), None),
        Err(e) => {
            let status = e.error.r#type.clone();
            let message = e.error.message.clone();
            (status, Some(message))
        }
    }
}

/// Truncate request prompt for logging preview (privacy-safe)
///
/// Extracts and truncates the first message from an inference request for
/// logging purposes. Returns `None` if content logging is disabled.
///
/// When enabled, returns the first ~100 characters of the first message.
/// This provides context for debugging without logging entire conversations.
pub fn truncate_prompt(request: &InferenceRequest, enable_content_logging: bool) -> Option<String> {
    if !enable_content_logging {
        return None;
    }

    let first_message = request.messages.first()?;
    let content = match &first_message.content {
        MessageContent::Text { content } => content.clone(),
        MessageContent::Parts { content: parts } => parts
            .iter()
            .filter_map(|part| {
                if part.part_type == "text" {
                    part.text.as_deref()
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    };

    if content.is_empty() {
        return None;
    }
    Some(truncate_string(&content, 100))
}

/// Helper function to truncate a string to a maximum length
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len.min(s.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::Usage;

    fn response(usage: Option<Usage>) -> InferenceResponse {
        InferenceResponse {
            id: "test".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: "test".to_string(),
            choices: vec![],
            usage,
        }
    }

    #[test]
    fn test_extract_tokens_with_usage() {
        let response = response(Some(Usage {
            prompt_tokens: 100,
            completion_tokens: 50,
            total_tokens: 150,
        }));

        let (prompt, completion, total) = extract_tokens(&response);
        assert_eq!(prompt, 100);
        assert_eq!(completion, 50);
        assert_eq!(total, 150);
    }

    #[test]
    fn test_extract_tokens_without_usage() {
        let (prompt, completion, total) = extract_tokens(&response(None));
        assert_eq!(prompt, 0);
        assert_eq!(completion, 0);
        assert_eq!(total, 0);
    }
}
