//! Post-run processing utilities.
//!
//! Loads the materialized result behind the data gate, builds the text
//! summary, and writes requested exports.

use super::gate::{accessible_pages, LoadedAnalysis, Page};
use crate::model::{AnalysisResult, RunHandle};
use crate::text_summary::{build_result_summary, TextSummary};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Result of post-run processing, ready for presentation layers.
pub(crate) struct ProcessedRun {
    pub analysis: LoadedAnalysis,
    pub pages: Vec<Page>,
    pub summary: TextSummary,
    pub export_messages: Vec<String>,
}

/// Process a completed run: summarize, export, then load it behind the gate.
/// A failed export is an error.
pub(crate) fn process_run_completion(
    handle: &RunHandle,
    export_json_path: Option<&Path>,
    result: AnalysisResult,
) -> Result<ProcessedRun> {
    let pages = accessible_pages(Some(&result));
    let summary = build_result_summary(&handle.run_id, &result, &pages);

    let mut export_messages = Vec::new();
    if let Some(path) = export_json_path {
        export_json(path, &result)?;
        export_messages.push(format!("Exported JSON: {}", path.display()));
    }

    let mut analysis = LoadedAnalysis::default();
    analysis.load(result);
    Ok(ProcessedRun {
        analysis,
        pages,
        summary,
        export_messages,
    })
}

/// Write any serializable value as pretty JSON.
pub(crate) fn export_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value).context("failed to serialize export")?;
    std::fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completed_run_unlocks_views_and_exports() {
        let dir = std::env::temp_dir().join(format!("cinesafe-export-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("result.json");

        let handle = RunHandle::new("run-42");
        let body = json!({"scenes": [{"scene_number": 1}], "total_scenes": 1});
        let processed =
            process_run_completion(&handle, Some(&path), AnalysisResult::new(body.clone()))
                .unwrap();

        assert_eq!(processed.pages, Page::ALL.to_vec());
        assert_eq!(processed.export_messages.len(), 1);
        assert!(processed.export_messages[0].starts_with("Exported JSON"));
        assert_eq!(processed.summary.lines[0], "Run: run-42");

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, body);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn result_without_scenes_only_reaches_home() {
        let handle = RunHandle::new("run-43");
        let processed =
            process_run_completion(&handle, None, AnalysisResult::new(json!({"status": "ok"})))
                .unwrap();
        assert_eq!(processed.pages, vec![Page::Home]);
        assert!(processed.export_messages.is_empty());
    }

    #[test]
    fn failed_export_is_an_error() {
        let handle = RunHandle::new("run-44");
        let path = std::env::temp_dir()
            .join(format!("cinesafe-missing-{}", std::process::id()))
            .join("nested")
            .join("result.json");
        let body = json!({"scenes": [{"scene_number": 1}]});

        let err = process_run_completion(&handle, Some(&path), AnalysisResult::new(body))
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("failed to write"));
        assert!(!path.exists());
    }
}
