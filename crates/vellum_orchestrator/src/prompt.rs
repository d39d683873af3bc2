//! Prompt rendering.

use std::fmt::Write;
use vellum_core::ProposalRequest;

const SECTIONS: [&str; 6] = [
    "Executive Summary",
    "Solution Overview",
    "Technical Architecture",
    "Implementation Plan",
    "Expected Outcomes",
    "Risk Assessment",
];

/// Render the generation prompt for a request.
///
/// Iterations append the accumulated feedback and the previous draft so the
/// model revises instead of starting over.
///
/// # Examples
///
/// ```
/// use vellum_core::ProposalRequest;
/// use vellum_orchestrator::render_prompt;
///
/// let request = ProposalRequest::builder()
///     .requirements("Real-time payment rails")
///     .build()
///     .unwrap();
/// let prompt = render_prompt(&request);
/// assert!(prompt.contains("Real-time payment rails"));
/// assert!(!prompt.contains("Feedback"));
/// ```
pub fn render_prompt(request: &ProposalRequest) -> String {
    let mut prompt = String::from(
        "As a senior pre-sales solution architect for the financial sector, write a detailed \
         technical proposal for the customer requirements below.\n\n",
    );

    if !request.title.is_empty() {
        let _ = writeln!(prompt, "Proposal: {}", request.title);
    }
    if !request.customer_name.is_empty() {
        let _ = writeln!(prompt, "Customer: {}", request.customer_name);
    }
    let _ = writeln!(prompt, "\nCustomer requirements:\n{}\n", request.requirements);

    if !request.reference_excerpts.is_empty() {
        prompt.push_str("Reference material:\n");
        for excerpt in &request.reference_excerpts {
            let _ = writeln!(prompt, "- {}", excerpt);
        }
        prompt.push('\n');
    }

    prompt.push_str("Structure the proposal with these sections:\n");
    for (index, section) in SECTIONS.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", index + 1, section);
    }
    prompt.push_str(
        "\nThe proposal must be professional, specific and actionable, reflect the \
         realities of the financial industry, and stay between 2000 and 3000 words.\n",
    );

    if !request.feedback.is_empty() {
        prompt.push_str("\nFeedback on earlier drafts, oldest first:\n");
        for item in &request.feedback {
            let _ = writeln!(prompt, "- {}", item);
        }
        if let Some(previous) = &request.previous_content {
            let _ = write!(prompt, "\nPrevious draft:\n{}\n", previous);
        }
        prompt.push_str(
            "\nRevise the previous draft to address the feedback, focusing on the specific \
             changes requested.\n",
        );
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_prompt_carries_feedback_and_draft() {
        let request = ProposalRequest::builder()
            .requirements("Core banking")
            .build()
            .expect("Valid request")
            .iterate("Add a cost table", "Draft one");
        let prompt = render_prompt(&request);
        assert!(prompt.contains("- Add a cost table"));
        assert!(prompt.contains("Previous draft:\nDraft one"));
        assert!(prompt.find("Core banking") < prompt.find("Add a cost table"));
    }

    #[test]
    fn test_lists_every_section() {
        let prompt = render_prompt(&ProposalRequest::default());
        assert!(prompt.contains("6. Risk Assessment"));
    }
}
