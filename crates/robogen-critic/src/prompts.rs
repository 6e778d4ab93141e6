use serde::{Deserialize, Serialize};

/// How thorough the evaluator should be
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationMode {
    #[default]
    Standard,
    Detailed,
    SafetyFocus,
}

impl std::fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluationMode::Standard => write!(f, "standard"),
            EvaluationMode::Detailed => write!(f, "detailed"),
            EvaluationMode::SafetyFocus => write!(f, "safety-focus"),
        }
    }
}

impl std::str::FromStr for EvaluationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(EvaluationMode::Standard),
            "detailed" => Ok(EvaluationMode::Detailed),
            "safety-focus" | "safety_focus" | "safety" => Ok(EvaluationMode::SafetyFocus),
            _ => Err(format!("Unknown evaluation mode: {}", s)),
        }
    }
}

/// Prompt templates for the evaluator
pub struct EvaluatorPrompts;

impl EvaluatorPrompts {
    /// Build the evaluator system prompt
    pub fn system_prompt(mode: EvaluationMode) -> String {
        let base = r#"You are an expert code evaluator specializing in Python code for the Reachy 2 robot.
Your job is to analyze code and give detailed feedback on correctness, safety, and quality.

## Evaluation Criteria
1. Syntax and Structure: syntax errors and proper code structure
2. API Usage: correct usage of the Reachy 2 SDK API
3. Safety: potential safety issues with robot operation
4. Error Handling: proper error handling and recovery
5. Code Quality: readability and maintainability

## Critical Requirements for Reachy Code
- Connect to the robot: ReachySDK(host="...")
- Call reachy.turn_on() before any movement
- Call reachy.turn_off_smoothly() (NOT turn_off()) and reachy.disconnect() in cleanup
- Access parts as properties (reachy.r_arm, NOT reachy.r_arm())
- Arm goto() takes EXACTLY 7 joint values
- Control grippers through the arm property (reachy.r_arm.gripper)

## Safety Checks
- Unreachable target positions in Cartesian space
- Targets outside safe workspace limits
- Missing error handling around inverse kinematics
- Missing cleanup in finally blocks

## Required Response Format
Return ONLY a JSON object with these fields:
{
  "valid": boolean,
  "errors": [list of critical errors],
  "warnings": [list of non-critical warnings],
  "suggestions": [list of improvement suggestions],
  "score": number between 0 and 100,
  "explanation": string
}

Give actionable feedback and judge whether the code meets the original user request."#;

        let mode_instructions = match mode {
            EvaluationMode::Standard => "",
            EvaluationMode::Detailed => {
                r#"

## Detailed Evaluation Mode
- Analyze each function and code block
- Give detailed suggestions with code examples
- Compare alternative approaches
- Evaluate how well the code meets each requirement of the request
- Explain how each criterion contributed to the score"#
            }
            EvaluationMode::SafetyFocus => {
                r#"

## Safety-Focused Evaluation Mode
- Evaluate workspace boundaries and joint limits extensively
- Analyze potential collision scenarios
- Evaluate error recovery and shutdown sequences
- Assess the robustness of inverse kinematics error handling
- Consider edge cases that could lead to unsafe robot behavior"#
            }
        };

        format!("{}{}", base, mode_instructions)
    }

    /// Build the user message carrying the request and the code under review
    pub fn evaluation_request(user_request: &str, code: &str) -> String {
        format!(
            r#"## Original User Request
{request}

## Generated Code To Evaluate
```python
{code}
```

Evaluate this code against the criteria. List any errors, warnings, and suggestions."#,
            request = user_request,
            code = code,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip_from_str() {
        assert_eq!(
            "safety-focus".parse::<EvaluationMode>().unwrap(),
            EvaluationMode::SafetyFocus
        );
        assert_eq!(EvaluationMode::Detailed.to_string(), "detailed");
        assert!("thorough".parse::<EvaluationMode>().is_err());
    }

    #[test]
    fn test_mode_specific_instructions() {
        let standard = EvaluatorPrompts::system_prompt(EvaluationMode::Standard);
        let safety = EvaluatorPrompts::system_prompt(EvaluationMode::SafetyFocus);
        assert!(standard.contains("\"score\""));
        assert!(!standard.contains("Safety-Focused"));
        assert!(safety.starts_with(&standard));
        assert!(safety.contains("Safety-Focused Evaluation Mode"));
    }

    #[test]
    fn test_evaluation_request_fences_code() {
        let message = EvaluatorPrompts::evaluation_request("wave", "reachy.turn_on()");
        assert!(message.contains("## Original User Request\nwave"));
        assert!(message.contains("```python\nreachy.turn_on()\n```"));
    }
}
