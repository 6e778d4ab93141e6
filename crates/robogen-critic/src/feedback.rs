use crate::EvaluationResult;

const NO_ADDITIONAL_EXPLANATION: &str = "No additional explanation provided.";

/// Render an evaluation as a critique the generator can act on.
///
/// Sections always appear in the same order (score, errors, warnings, suggestions,
/// explanation); empty sections read `None`.
pub fn format_feedback(evaluation: &EvaluationResult) -> String {
    let explanation = if evaluation.explanation().trim().is_empty() {
        NO_ADDITIONAL_EXPLANATION
    } else {
        evaluation.explanation()
    };

    format!(
        "Evaluation feedback (score: {score}/100):

CRITICAL ERRORS TO FIX:
{errors}

WARNINGS TO ADDRESS:
{warnings}

SUGGESTIONS FOR IMPROVEMENT:
{suggestions}

ADDITIONAL EXPLANATION:
{explanation}",
        score = evaluation.score(),
        errors = bullet_list(evaluation.errors()),
        warnings = bullet_list(evaluation.warnings()),
        suggestions = bullet_list(evaluation.suggestions()),
        explanation = explanation,
    )
}

/// Build the self-contained prompt for one optimization round
pub fn build_optimization_prompt(user_request: &str, current_code: &str, feedback: &str) -> String {
    format!(
        r#"I need to improve the code previously generated for the request: "{request}"

The current code is:
```python
{code}
```

{feedback}

Improve this code while following ALL the original guidelines for the Reachy 2 robot API.
Fix the critical errors first, then address the warnings, then apply the suggestions where appropriate.
Preserve what the code is meant to do for the original request.
Return only the improved code in a single ```python code block, without explanation."#,
        request = user_request,
        code = current_code,
        feedback = feedback,
    )
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items
            .iter()
            .map(|item| format!("- {}", item))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
