use crate::{
    highlight::{render, Segment},
    resolver::{MatchResult, ResolveReport},
};

pub fn header(level: usize, text: &str) -> String {
    let level = level.max(1);
    format!("{} {}", "#".repeat(level), text)
}

pub fn bold(label: &str, value: &str) -> String {
    format!("**{label}:** {value}")
}

/// Joins segments back together, wrapping matches in `**`.
pub fn emphasize(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| {
            if segment.is_match {
                format!("**{}**", segment.text)
            } else {
                segment.text.clone()
            }
        })
        .collect()
}

pub fn result_card(result: &MatchResult, term: &str) -> String {
    let reference = match &result.sub_unit_ref {
        Some(sub_unit) => format!("{} ¶{sub_unit}", result.document_ref),
        None => result.document_ref.clone(),
    };
    let mut heading = format!("{} {reference}", result.collection.label());
    if let Some(title) = &result.title {
        heading.push_str(" — ");
        heading.push_str(title);
    }

    let body = if result.snippet.is_empty() {
        "_(no content)_".to_string()
    } else {
        emphasize(&render(&result.snippet, term))
    };
    [header(3, &heading), body].join("\n")
}

pub fn results_page(term: &str, results: &[MatchResult], report: &ResolveReport) -> String {
    let mut lines = vec![
        header(2, &format!("References for \"{term}\"")),
        String::new(),
        bold("Resolved", &format!("{} of {}", report.resolved, report.unique)),
    ];
    if report.failed > 0 {
        lines.push(bold("Lookup failures", &report.failed.to_string()));
    }
    lines.push(String::new());

    if results.is_empty() {
        lines.push("No passages matched these references.".to_string());
    } else {
        for result in results {
            lines.push(result_card(result, term));
            lines.push(String::new());
        }
    }
    lines.join("\n").trim_end().to_string()
}
