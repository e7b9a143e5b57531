//! Output builder for the non-interactive CLI modes.

use crate::model::OperationOutcome;
use anyhow::{Context, Result};

/// Pre-formatted lines for stdout.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Render an outcome either as its human-readable message or as pretty JSON.
pub(crate) fn build_text_summary(outcome: &OperationOutcome, json: bool) -> Result<TextSummary> {
    if json {
        let out = serde_json::to_string_pretty(outcome).context("serialize outcome")?;
        return Ok(TextSummary { lines: vec![out] });
    }

    let lines = outcome
        .message
        .trim_end()
        .lines()
        .map(str::to_string)
        .collect();
    Ok(TextSummary { lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ManagerState, Operation, Report, StatusReport};

    fn outcome() -> OperationOutcome {
        let report = Report::Status(StatusReport::NotFound {
            target: "8021x.exe".into(),
        });
        OperationOutcome {
            operation: Operation::Refresh,
            ok: true,
            message: report.to_message(),
            report: Some(report),
            state: ManagerState::default(),
        }
    }

    #[test]
    fn text_mode_drops_trailing_blank_lines() {
        let summary = build_text_summary(&outcome(), false).unwrap();
        assert_eq!(summary.lines, vec!["No 8021x.exe process is running"]);
    }

    #[test]
    fn json_mode_tags_report_kind() {
        let summary = build_text_summary(&outcome(), true).unwrap();
        let v: serde_json::Value = serde_json::from_str(&summary.lines[0]).unwrap();
        assert_eq!(v["operation"], "refresh");
        assert_eq!(v["report"]["kind"], "status");
        assert_eq!(v["report"]["status"], "not_found");
    }
}
