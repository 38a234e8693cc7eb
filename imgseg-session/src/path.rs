//! Per-path in-flight markers

use std::collections::HashMap;
use std::fmt;

/// Independent triggers that can have async work outstanding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchPath {
    Click,
    Box,
    Everything,
    TextPrompt,
    EmbeddingFetch,
    ModelLoad,
    LocalInference,
}

impl DispatchPath {
    pub const ALL: [DispatchPath; 7] = [
        DispatchPath::Click,
        DispatchPath::Box,
        DispatchPath::Everything,
        DispatchPath::TextPrompt,
        DispatchPath::EmbeddingFetch,
        DispatchPath::ModelLoad,
        DispatchPath::LocalInference,
    ];

    /// Paths served by the remote backend and sharing its cancellation slot
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            DispatchPath::Click
                | DispatchPath::Box
                | DispatchPath::Everything
                | DispatchPath::TextPrompt
                | DispatchPath::EmbeddingFetch
        )
    }
}

impl fmt::Display for DispatchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchPath::Click => "click",
            DispatchPath::Box => "box",
            DispatchPath::Everything => "everything",
            DispatchPath::TextPrompt => "text-prompt",
            DispatchPath::EmbeddingFetch => "embedding-fetch",
            DispatchPath::ModelLoad => "model-load",
            DispatchPath::LocalInference => "local-inference",
        };
        f.write_str(name)
    }
}

/// Lifecycle of the latest operation issued on a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathState {
    #[default]
    Idle,
    InFlight { generation: u64 },
    Succeeded,
    Failed,
    Superseded,
}

impl PathState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, PathState::InFlight { .. })
    }
}

/// Marker table; one entry per path
#[derive(Debug, Default)]
pub struct PathTracker {
    states: HashMap<DispatchPath, PathState>,
}

impl PathTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, path: DispatchPath) -> PathState {
        self.states.get(&path).copied().unwrap_or_default()
    }

    pub fn begin(&mut self, path: DispatchPath, generation: u64) {
        self.states.insert(path, PathState::InFlight { generation });
    }

    /// Settle `path` only if `generation` is still the one in flight
    pub fn settle(&mut self, path: DispatchPath, generation: u64, outcome: PathState) -> bool {
        match self.state(path) {
            PathState::InFlight { generation: current } if current == generation => {
                self.states.insert(path, outcome);
                true
            }
            _ => false,
        }
    }

    /// Mark an in-flight path as superseded; no-op otherwise
    pub fn supersede(&mut self, path: DispatchPath) {
        if self.state(path).is_in_flight() {
            self.states.insert(path, PathState::Superseded);
        }
    }

    pub fn any_in_flight(&self) -> bool {
        self.states.values().any(PathState::is_in_flight)
    }

    pub fn in_flight(&self) -> Vec<DispatchPath> {
        DispatchPath::ALL
            .into_iter()
            .filter(|p| self.state(*p).is_in_flight())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        let tracker = PathTracker::new();
        for path in DispatchPath::ALL {
            assert_eq!(tracker.state(path), PathState::Idle);
        }
        assert!(!tracker.any_in_flight());
    }

    #[test]
    fn test_settle_requires_matching_generation() {
        let mut tracker = PathTracker::new();
        tracker.begin(DispatchPath::Click, 1);
        tracker.begin(DispatchPath::Click, 2);

        assert!(!tracker.settle(DispatchPath::Click, 1, PathState::Succeeded));
        assert!(tracker.state(DispatchPath::Click).is_in_flight());

        assert!(tracker.settle(DispatchPath::Click, 2, PathState::Failed));
        assert_eq!(tracker.state(DispatchPath::Click), PathState::Failed);
    }

    #[test]
    fn test_paths_do_not_clear_each_other() {
        let mut tracker = PathTracker::new();
        tracker.begin(DispatchPath::Everything, 1);
        tracker.begin(DispatchPath::LocalInference, 1);

        tracker.settle(DispatchPath::LocalInference, 1, PathState::Succeeded);
        assert!(tracker.any_in_flight());
        assert_eq!(tracker.in_flight(), vec![DispatchPath::Everything]);
    }

    #[test]
    fn test_supersede_only_in_flight() {
        let mut tracker = PathTracker::new();
        tracker.supersede(DispatchPath::Box);
        assert_eq!(tracker.state(DispatchPath::Box), PathState::Idle);

        tracker.begin(DispatchPath::Box, 4);
        tracker.supersede(DispatchPath::Box);
        assert_eq!(tracker.state(DispatchPath::Box), PathState::Superseded);
    }

    #[test]
    fn test_remote_paths() {
        assert!(DispatchPath::TextPrompt.is_remote());
        assert!(DispatchPath::EmbeddingFetch.is_remote());
        assert!(!DispatchPath::ModelLoad.is_remote());
        assert!(!DispatchPath::LocalInference.is_remote());
    }
}
