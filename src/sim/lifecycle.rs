//! Terminal-outcome state machine shared by every level
//!
//! `Running -> Epilogue -> Complete`. The outcome is recorded once and never
//! changes; completion is reported exactly once.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Lose,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LevelStatus {
    Running,
    /// Terminal outcome reached; waiting for the ending to play out
    Epilogue { outcome: Outcome, remaining_ms: f32 },
    Complete { outcome: Outcome },
}

/// Reported to the router once per level instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    pub success: bool,
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    status: LevelStatus,
    /// When false, completion always reports success
    reports_outcome: bool,
}

impl Lifecycle {
    pub fn new(reports_outcome: bool) -> Self {
        Self {
            status: LevelStatus::Running,
            reports_outcome,
        }
    }

    pub fn status(&self) -> LevelStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, LevelStatus::Running)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, LevelStatus::Complete { .. })
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.status {
            LevelStatus::Running => None,
            LevelStatus::Epilogue { outcome, .. } | LevelStatus::Complete { outcome } => Some(outcome),
        }
    }

    /// Record the terminal outcome. Returns false if one was already set.
    pub fn finish(&mut self, outcome: Outcome, epilogue_ms: f32) -> bool {
        if !self.is_running() {
            return false;
        }
        log::info!("Level finished: {:?}", outcome);
        self.status = LevelStatus::Epilogue {
            outcome,
            remaining_ms: epilogue_ms.max(0.0),
        };
        true
    }

    /// Count the epilogue down. Yields the completion on the tick it ends.
    pub fn advance(&mut self, dt_ms: f32) -> Option<Completion> {
        let LevelStatus::Epilogue {
            outcome,
            remaining_ms,
        } = self.status
        else {
            return None;
        };
        let remaining_ms = remaining_ms - dt_ms.max(0.0);
        if remaining_ms > 0.0 {
            self.status = LevelStatus::Epilogue {
                outcome,
                remaining_ms,
            };
            return None;
        }
        self.status = LevelStatus::Complete { outcome };
        let success = !self.reports_outcome || outcome == Outcome::Win;
        Some(Completion { success })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_is_set_once() {
        let mut lc = Lifecycle::new(true);
        assert!(lc.finish(Outcome::Lose, 1000.0));
        assert!(!lc.finish(Outcome::Win, 1000.0));
        assert_eq!(lc.outcome(), Some(Outcome::Lose));
    }

    #[test]
    fn test_completion_fires_once() {
        let mut lc = Lifecycle::new(false);
        lc.finish(Outcome::Lose, 100.0);
        assert_eq!(lc.advance(60.0), None);
        assert_eq!(lc.advance(60.0), Some(Completion { success: true }));
        assert_eq!(lc.advance(60.0), None);
        assert!(lc.is_complete());
        assert_eq!(lc.outcome(), Some(Outcome::Lose));
    }

    #[test]
    fn test_outcome_reporting() {
        let mut lc = Lifecycle::new(true);
        lc.finish(Outcome::Lose, 0.0);
        assert_eq!(lc.advance(0.0), Some(Completion { success: false }));

        let mut lc = Lifecycle::new(true);
        lc.finish(Outcome::Win, 0.0);
        assert_eq!(lc.advance(16.0), Some(Completion { success: true }));
    }

    #[test]
    fn test_running_never_completes() {
        let mut lc = Lifecycle::new(true);
        for _ in 0..100 {
            assert_eq!(lc.advance(1000.0), None);
        }
        assert!(lc.is_running());
    }
}
