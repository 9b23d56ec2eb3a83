//! Server-authoritative progress, mirrored locally.
//!
//! Each response builds a complete [`ServerState`] from its own fields plus
//! configured fallbacks. Nothing is merged with the previous value.

use serde::Deserialize;

/// Progress as last reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerState {
    /// Current example / problem index (zero based).
    pub current_index: usize,
    /// Number of examples or problems.
    pub total: usize,
    pub game_over: bool,
    /// Server-side animation in progress (canvas variant).
    pub animating: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    InProgress,
    GameOver,
    AllSolved,
}

impl ServerState {
    pub fn initial(total: usize) -> Self {
        Self {
            current_index: 0,
            total,
            game_over: false,
            animating: false,
        }
    }

    pub fn from_snapshot(snapshot: &SnapshotResponse, default_total: usize) -> Self {
        Self {
            current_index: snapshot.current.unwrap_or(0),
            total: snapshot.total.unwrap_or(default_total),
            game_over: false,
            animating: false,
        }
    }

    /// `last_problem_index` supplies the total, which `/state` never reports.
    pub fn from_poll(state: &StateResponse, last_problem_index: usize) -> Self {
        Self {
            current_index: state.current_problem,
            total: last_problem_index.saturating_add(1),
            game_over: state.game_over,
            animating: state.animating,
        }
    }

    /// True once the current index is the final one.
    pub fn is_last_step(&self) -> bool {
        self.current_index >= self.total.saturating_sub(1)
    }

    pub fn outcome(&self) -> Outcome {
        if self.game_over {
            Outcome::GameOver
        } else if self.is_last_step() {
            Outcome::AllSolved
        } else {
            Outcome::InProgress
        }
    }

    /// Server "start" command is allowed.
    pub fn can_start(&self) -> bool {
        !self.animating && !self.game_over
    }

    /// Server "next" command is allowed.
    pub fn can_next(&self) -> bool {
        !self.animating && !self.is_last_step()
    }
}

/// Single frame plus optional progress, returned by init and advance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SnapshotResponse {
    pub frame: String,
    #[serde(default, alias = "currentExample", alias = "problem")]
    pub current: Option<usize>,
    #[serde(default, alias = "totalExamples")]
    pub total: Option<usize>,
}

/// A batch of frames to be played back in order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchResponse {
    pub frames: Vec<String>,
}

/// Polled game state of the canvas variant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StateResponse {
    pub current_problem: usize,
    pub game_over: bool,
    pub animating: bool,
}
