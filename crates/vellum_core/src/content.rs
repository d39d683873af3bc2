//! Extraction of structured sections from generated text.

use crate::VersionContent;

/// Characters kept when the summary falls back to a preview.
pub const SUMMARY_PREVIEW_CHARS: usize = 300;

const SUMMARY_MARKERS: &[&str] = &["executive summary", "summary", "执行摘要", "摘要"];
const OVERVIEW_MARKERS: &[&str] = &[
    "solution overview",
    "overview",
    "解决方案概述",
    "方案概述",
];
const MAX_HEADING_CHARS: usize = 48;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Summary,
    Overview,
    Other,
}

/// Split generated text into summary, solution overview and full content.
///
/// Markdown or numbered headings naming a summary or an overview delimit the
/// sections. Any other `#` or bold heading ends the current section; other
/// numbered lines are list items and stay in it. When no summary heading is
/// found the summary is the first [`SUMMARY_PREVIEW_CHARS`] characters, and
/// when no overview heading is found the overview is the whole text.
///
/// # Examples
///
/// ```
/// use vellum_core::parse_content;
///
/// let text = "# Executive Summary\nShort pitch.\n\n# Solution Overview\nThe plan.\n\n# Risks\nFew.";
/// let content = parse_content(text);
/// assert_eq!(content.summary, "Short pitch.");
/// assert_eq!(content.solution_overview, "The plan.");
/// assert_eq!(content.full_content, text);
/// ```
pub fn parse_content(full: &str) -> VersionContent {
    let mut summary: Vec<&str> = Vec::new();
    let mut overview: Vec<&str> = Vec::new();
    let mut found_summary = false;
    let mut found_overview = false;
    let mut current = Section::Other;

    for line in full.lines() {
        if let Some(section) = classify_heading(line) {
            current = section;
            match section {
                Section::Summary => found_summary = true,
                Section::Overview => found_overview = true,
                Section::Other => {}
            }
            continue;
        }
        match current {
            Section::Summary => summary.push(line),
            Section::Overview => overview.push(line),
            Section::Other => {}
        }
    }

    let summary = found_summary
        .then(|| summary.join("\n").trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| preview(full, SUMMARY_PREVIEW_CHARS));
    let solution_overview = found_overview
        .then(|| overview.join("\n").trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| full.to_string());

    VersionContent::new(summary, solution_overview, full.to_string())
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.char_indices();
    match chars.nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn classify_heading(line: &str) -> Option<Section> {
    let trimmed = line.trim();
    let (title, numbered) = heading_title(trimmed)?;
    let lowered = title.to_lowercase();
    // Overview markers first: "solution overview" must not match "summary".
    if OVERVIEW_MARKERS.iter().any(|m| lowered.contains(m)) {
        Some(Section::Overview)
    } else if SUMMARY_MARKERS.iter().any(|m| lowered.contains(m)) {
        Some(Section::Summary)
    } else if numbered {
        None
    } else {
        Some(Section::Other)
    }
}

/// Title of a heading line and whether it used the numbered form.
fn heading_title(line: &str) -> Option<(&str, bool)> {
    if line.is_empty() || line.chars().count() > MAX_HEADING_CHARS {
        return None;
    }
    if let Some(rest) = line.strip_prefix('#') {
        return Some((rest.trim_start_matches('#').trim(), false));
    }
    if let Some(inner) = line.strip_prefix("**").and_then(|l| l.strip_suffix("**")) {
        return Some((inner.trim(), false));
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        for sep in [".", "、", ")"] {
            if let Some(title) = rest.strip_prefix(sep) {
                return Some((title.trim(), true));
            }
        }
    }
    None
}
