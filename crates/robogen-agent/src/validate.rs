use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Result of the local static checks on a generated script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

const UNSAFE_PATTERNS: &[&str] = &[
    "os.system",
    "subprocess",
    "eval(",
    "exec(",
    "import shutil",
    "__import__",
    "open(",
    "pickle",
    "shelve",
    "marshal",
    "socket",
    "requests.post",
    "requests.put",
    "requests.delete",
];

const NON_API_PATTERNS: &[&str] = &[
    "import agent",
    "from agent",
    "connection_manager",
    "get_reachy()",
    "get_reachy ",
    "connect_to_reachy",
    "disconnect_reachy",
];

const PROPERTY_CALLS: &[&str] = &[
    "r_arm()",
    "l_arm()",
    "head()",
    "cameras()",
    "gripper()",
    "r_gripper()",
    "l_gripper()",
];

const ARM_JOINTS: usize = 7;

fn arm_goto_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)(?:r_arm|l_arm|right_arm|left_arm)\.goto\s*\(\s*\[(.*?)\]")
            .expect("arm goto pattern is valid")
    })
}

/// Run the static Reachy 2 checks over a script.
///
/// Findings are informational: they are logged alongside a generation and never
/// influence the optimization loop.
pub fn validate_script(code: &str) -> ScriptValidation {
    if code.trim().is_empty() {
        return ScriptValidation {
            valid: false,
            errors: vec!["No code was generated".to_string()],
            warnings: Vec::new(),
        };
    }

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let required = [
        (
            "from reachy2_sdk.reachy_sdk import ReachySDK",
            "Missing import for ReachySDK from reachy2_sdk.reachy_sdk",
        ),
        (
            "ReachySDK(",
            "Code does not initialize ReachySDK to establish a connection",
        ),
        (
            "turn_on()",
            "CRITICAL: Missing reachy.turn_on() call. Always turn on the robot before using it.",
        ),
        (
            "turn_off_smoothly()",
            "CRITICAL: Missing reachy.turn_off_smoothly() call. Always turn off the robot smoothly when done.",
        ),
        ("try:", "No error handling (try/except) found in the code"),
        ("disconnect()", "No disconnect operation found in the code"),
        (
            "finally:",
            "No finally block found for ensuring cleanup operations",
        ),
    ];
    for (needle, message) in required {
        if !code.contains(needle) {
            warnings.push(message.to_string());
        }
    }

    if code.contains("turn_off()") {
        warnings.push(
            "CRITICAL: Using turn_off() instead of turn_off_smoothly(). Always use turn_off_smoothly() to prevent damage to the robot."
                .to_string(),
        );
    }

    for pattern in UNSAFE_PATTERNS {
        if code.contains(pattern) {
            errors.push(format!("Potentially unsafe operation detected: {}", pattern));
        }
    }

    if NON_API_PATTERNS.iter().any(|p| code.contains(p)) {
        errors.push(
            "Non-API code detected: the code uses internal functions that are not part of the official Reachy 2 SDK API."
                .to_string(),
        );
    }

    for pattern in PROPERTY_CALLS {
        if code.contains(pattern) {
            errors.push(format!(
                "Incorrect property usage: '{}' is a property, not a method. Use without parentheses.",
                pattern
            ));
        }
    }

    for caps in arm_goto_regex().captures_iter(code) {
        let joints = caps[1].split(',').filter(|v| !v.trim().is_empty()).count();
        if joints != ARM_JOINTS {
            errors.push(format!(
                "Incorrect arm goto usage: the positions array must have exactly {} values, but found {}.",
                ARM_JOINTS, joints
            ));
        }
    }

    ScriptValidation {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}
