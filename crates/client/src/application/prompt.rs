//! Hint prompt sent with every chat turn.

/// Shown in place of the student's work before they have written anything.
pub const NO_STEPS_PLACEHOLDER: &str = "(The student has not started solving yet)";

/// Build the prompt asking the tutor for a hint on `question`, given the
/// student's current step.
pub fn build_hint_prompt(question: &str, user_input: &str) -> String {
    let steps = if user_input.trim().is_empty() {
        NO_STEPS_PLACEHOLDER
    } else {
        user_input
    };

    format!(
        "You are a math problem-solving assistant. Based on the student's work so far, \
give an appropriate hint that helps them solve this problem.

Problem: {question}

Student's current steps:
{steps}

Keep the hint short and encouraging. Do not give away the answer; guide the student's \
thinking instead. If the student has not started yet, suggest how to begin."
    )
}
