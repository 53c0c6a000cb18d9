//! Data-availability gate for views that need a loaded analysis.

use super::readiness::has_scene_list;
use crate::model::AnalysisResult;

/// Views a presentation layer can navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Page {
    Home,
    Analysis,
    Report,
    SceneDetail,
    WhatIf,
}

impl Page {
    pub const ALL: [Page; 5] = [
        Page::Home,
        Page::Analysis,
        Page::Report,
        Page::SceneDetail,
        Page::WhatIf,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Page::Home => "home",
            Page::Analysis => "analysis",
            Page::Report => "report",
            Page::SceneDetail => "scene detail",
            Page::WhatIf => "what-if",
        }
    }
}

/// True when a result is loaded and one of its scene lists holds at least one scene.
pub(crate) fn pages_unlocked(result: Option<&AnalysisResult>) -> bool {
    result.is_some_and(|r| has_scene_list(r.as_value()))
}

pub(crate) fn can_access(page: Page, result: Option<&AnalysisResult>) -> bool {
    page == Page::Home || pages_unlocked(result)
}

/// Pages reachable with the given result loaded, in navigation order.
pub(crate) fn accessible_pages(result: Option<&AnalysisResult>) -> Vec<Page> {
    Page::ALL
        .into_iter()
        .filter(|p| can_access(*p, result))
        .collect()
}

/// Holds the currently loaded result. The gate is evaluated on every query.
#[derive(Debug, Default)]
pub(crate) struct LoadedAnalysis {
    current: Option<AnalysisResult>,
}

impl LoadedAnalysis {
    pub fn load(&mut self, result: AnalysisResult) {
        self.current = Some(result);
    }

    #[cfg(test)]
    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&AnalysisResult> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(v: serde_json::Value) -> AnalysisResult {
        AnalysisResult::new(v)
    }

    #[test]
    fn home_is_always_reachable() {
        assert!(can_access(Page::Home, None));
        assert!(!can_access(Page::Analysis, None));
    }

    #[test]
    fn result_without_scenes_keeps_pages_locked() {
        let r = result(json!({"executive_summary": "x"}));
        assert!(!pages_unlocked(Some(&r)));
        assert!(!can_access(Page::Report, Some(&r)));

        let counted_only = result(json!({"scenes_analysis": {"scenes": []}, "total_scenes": 5}));
        assert!(!pages_unlocked(Some(&counted_only)));
        assert!(!can_access(Page::SceneDetail, Some(&counted_only)));
    }

    #[test]
    fn gate_follows_the_loaded_result() {
        let mut loaded = LoadedAnalysis::default();
        assert_eq!(accessible_pages(loaded.current()), vec![Page::Home]);

        loaded.load(result(json!({"scenes_analysis": {"scenes": [{"id": 1}]}})));
        assert_eq!(accessible_pages(loaded.current()), Page::ALL.to_vec());

        loaded.load(result(json!({"scenes_analysis": {"scenes": []}})));
        assert_eq!(accessible_pages(loaded.current()), vec![Page::Home]);

        loaded.load(result(json!({"scenes": [{"id": 1}]})));
        assert!(pages_unlocked(loaded.current()));
        loaded.clear();
        assert!(!pages_unlocked(loaded.current()));
    }
}
