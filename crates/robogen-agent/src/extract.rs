use tracing::warn;

const FENCE: &str = "```";

/// Code and prose separated out of a raw model response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedCode {
    pub code: String,
    pub explanation: String,
    /// An opening fence was found without a matching closing fence
    pub unterminated_fence: bool,
}

/// Split a model response into explanation and code.
///
/// The first fence opens the code block and the next fence closes it. Text before the
/// opening fence is the explanation; text after the closing fence is appended to it.
/// A language tag on the opening fence line (```` ```python ````) is skipped.
///
/// Without any fence the whole response is explanation and the code is empty. An opening
/// fence with no closing fence yields everything after it as code and sets
/// [`ExtractedCode::unterminated_fence`].
pub fn extract_code_and_explanation(response: &str) -> ExtractedCode {
    let Some(open) = response.find(FENCE) else {
        return ExtractedCode {
            code: String::new(),
            explanation: response.trim().to_string(),
            unterminated_fence: false,
        };
    };

    let before = response[..open].trim();
    let body = skip_language_tag(&response[open + FENCE.len()..]);

    match body.find(FENCE) {
        Some(close) => {
            let code = body[..close].trim().to_string();
            let after = body[close + FENCE.len()..].trim();
            let explanation = match (before.is_empty(), after.is_empty()) {
                (_, true) => before.to_string(),
                (true, false) => after.to_string(),
                (false, false) => format!("{}\n\n{}", before, after),
            };
            ExtractedCode {
                code,
                explanation,
                unterminated_fence: false,
            }
        }
        None => {
            warn!("Code block opened but never closed; taking the rest of the response as code");
            ExtractedCode {
                code: body.trim().to_string(),
                explanation: before.to_string(),
                unterminated_fence: true,
            }
        }
    }
}

/// Drop an info-string such as `python` when it sits alone on the fence line
fn skip_language_tag(after_fence: &str) -> &str {
    let tag_len = after_fence
        .find(|c: char| !(c.is_ascii_alphanumeric() || "+-_.#".contains(c)))
        .unwrap_or(after_fence.len());
    let rest = &after_fence[tag_len..];

    if let Some(stripped) = rest.strip_prefix("\r\n") {
        stripped
    } else if let Some(stripped) = rest.strip_prefix('\n') {
        stripped
    } else if tag_len == 0 {
        after_fence
    } else if rest.is_empty() {
        rest
    } else {
        after_fence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_python_block() {
        let response = "This turns the head.\n\n```python\nfrom reachy2_sdk.reachy_sdk import ReachySDK\nreachy = ReachySDK(host=\"localhost\")\n```\n\nIt connects first.";
        let extracted = extract_code_and_explanation(response);
        assert_eq!(
            extracted.code,
            "from reachy2_sdk.reachy_sdk import ReachySDK\nreachy = ReachySDK(host=\"localhost\")"
        );
        assert_eq!(
            extracted.explanation,
            "This turns the head.\n\nIt connects first."
        );
        assert!(!extracted.unterminated_fence);
    }

    #[test]
    fn test_no_fence_is_all_explanation() {
        let extracted = extract_code_and_explanation("  I cannot do that.  ");
        assert_eq!(extracted.code, "");
        assert_eq!(extracted.explanation, "I cannot do that.");
        assert!(!extracted.unterminated_fence);
    }

    #[test]
    fn test_untagged_fence() {
        let extracted = extract_code_and_explanation("```\nprint('hi')\n```");
        assert_eq!(extracted.code, "print('hi')");
        assert_eq!(extracted.explanation, "");
    }

    #[test]
    fn test_only_first_block_is_code() {
        let response = "Intro\n```python\na = 1\n```\nThen\n```python\nb = 2\n```";
        let extracted = extract_code_and_explanation(response);
        assert_eq!(extracted.code, "a = 1");
        assert!(extracted.explanation.starts_with("Intro"));
        assert!(extracted.explanation.contains("b = 2"));
    }

    #[test]
    fn test_unterminated_fence_takes_rest_as_code() {
        let response = "Here you go:\n```python\nreachy.turn_on()\nreachy.head.look_at(0.5, 0.2, 0.0)\n";
        let extracted = extract_code_and_explanation(response);
        assert_eq!(
            extracted.code,
            "reachy.turn_on()\nreachy.head.look_at(0.5, 0.2, 0.0)"
        );
        assert_eq!(extracted.explanation, "Here you go:");
        assert!(extracted.unterminated_fence);
    }

    #[test]
    fn test_inline_code_after_fence_is_kept() {
        let extracted = extract_code_and_explanation("```print(1)```");
        assert_eq!(extracted.code, "print(1)");
    }

    #[test]
    fn test_crlf_after_language_tag() {
        let extracted = extract_code_and_explanation("```python\r\nx = 1\r\n```");
        assert_eq!(extracted.code, "x = 1");
    }
}
