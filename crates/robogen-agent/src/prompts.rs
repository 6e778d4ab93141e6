/// Prompt templates for the code generator
pub struct GeneratorPrompts;

impl GeneratorPrompts {
    /// System prompt describing the Reachy 2 SDK rules and the expected answer format.
    /// `api_summary` is appended verbatim when non-empty.
    pub fn system_prompt(api_summary: &str) -> String {
        let summary_section = if api_summary.trim().is_empty() {
            String::new()
        } else {
            format!(
                "\n## Available API\n\nHere is a summary of the available API classes and methods:\n\n{}\n",
                api_summary.trim()
            )
        };

        format!(
            r#"You are an assistant that generates Python code for controlling a Reachy 2 robot.

## Official Reachy 2 SDK Modules
- reachy2_sdk.reachy_sdk
- reachy2_sdk.parts
- reachy2_sdk.utils
- reachy2_sdk.config
- reachy2_sdk.media
- reachy2_sdk.orbita
- reachy2_sdk.sensors

## Critical Rules
- NEVER use `get_reachy()` or any helper that is not part of the official SDK.
- Follow the documented arguments and parameters exactly.
- Access parts as properties (`reachy.r_arm`, NOT `reachy.r_arm()`).
- Arm `goto()` calls take EXACTLY 7 joint values.

## Required Structure
1. Initialization: import `ReachySDK` from `reachy2_sdk.reachy_sdk`, connect with
   `reachy = ReachySDK(host="localhost")`, and call `reachy.turn_on()` before any movement.
2. Main code: wrap robot actions in `try`/`finally`.
3. Cleanup: in the `finally` block call `reachy.turn_off_smoothly()` (NOT `turn_off()`)
   and then `reachy.disconnect()`.

## Template
```python
from reachy2_sdk.reachy_sdk import ReachySDK

reachy = ReachySDK(host="localhost")

try:
    reachy.turn_on()
    # Your code here...
finally:
    reachy.turn_off_smoothly()
    reachy.disconnect()
```
{summary}
## Response Format
1. A brief explanation of what the code does
2. The complete Python code in a single ```python code block
3. Any important considerations"#,
            summary = summary_section,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_prompt_without_summary() {
        let prompt = GeneratorPrompts::system_prompt("");
        assert!(prompt.contains("turn_off_smoothly()"));
        assert!(!prompt.contains("## Available API"));
    }

    #[test]
    fn test_system_prompt_with_summary() {
        let prompt = GeneratorPrompts::system_prompt("## Head\n- look_at(x, y, z)");
        assert!(prompt.contains("## Available API"));
        assert!(prompt.contains("- look_at(x, y, z)"));
    }
}
