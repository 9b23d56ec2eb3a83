//! Application-level configuration.
//!
//! Constants hold the observed defaults; [`ControllerConfig`] carries the
//! per-deployment values and can be loaded from a JSON object embedded in the
//! host page.

use std::fmt;

use serde::Deserialize;

// Backend
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_IMAGE_FORMAT: &str = "png";

// Cadence
pub const PLAYBACK_INTERVAL_MS: u32 = 500;
pub const POLL_INTERVAL_MS: u32 = 500;

// Canvas surface
pub const SURFACE_WIDTH: u32 = 800;
pub const SURFACE_HEIGHT: u32 = 600;
pub const BYTES_PER_PIXEL: usize = 4;

// Progress
pub const DEFAULT_TOTAL_STEPS: usize = 3;
pub const DEFAULT_LAST_PROBLEM_INDEX: usize = 2;

// Host page
pub const CONFIG_ELEMENT_ID: &str = "replay-config";

/// Which of the known front-ends to reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Initial frame plus one solution batch.
    #[default]
    TreeSolver,
    /// Batch animation per example with a "next example" step.
    BstExamples,
    /// Path search replay, stepping through numbered problems.
    GraphSearch,
    /// Raw canvas stream with server-side commands and polled state.
    CanvasGame,
}

impl Variant {
    pub fn endpoints(self) -> Endpoints {
        match self {
            Variant::TreeSolver => Endpoints {
                init: Some("/api/init".into()),
                batch: Some("/api/solve".into()),
                ..Endpoints::none()
            },
            Variant::BstExamples | Variant::GraphSearch => Endpoints {
                init: Some("/api/init".into()),
                batch: Some("/api/start".into()),
                advance: Some("/api/next".into()),
                ..Endpoints::none()
            },
            Variant::CanvasGame => Endpoints {
                frame: Some("/frame".into()),
                state: Some("/state".into()),
                start_command: Some("/start".into()),
                next_command: Some("/next".into()),
                ..Endpoints::none()
            },
        }
    }

    /// Label for the batch action button.
    pub fn batch_label(self) -> &'static str {
        match self {
            Variant::TreeSolver => "Show Solution",
            Variant::BstExamples => "Start Balancing",
            Variant::GraphSearch => "Start Search",
            Variant::CanvasGame => "Start",
        }
    }
}

/// Backend paths, relative to the base URL. `None` disables the action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default = "Endpoints::none")]
pub struct Endpoints {
    pub init: Option<String>,
    pub batch: Option<String>,
    pub advance: Option<String>,
    pub frame: Option<String>,
    pub state: Option<String>,
    pub start_command: Option<String>,
    pub next_command: Option<String>,
}

impl Endpoints {
    pub fn none() -> Self {
        Self {
            init: None,
            batch: None,
            advance: None,
            frame: None,
            state: None,
            start_command: None,
            next_command: None,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Variant::default().endpoints()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub variant: Variant,
    pub base_url: String,
    /// Overrides the variant's endpoint layout when present.
    pub endpoints: Option<Endpoints>,
    pub image_format: String,
    pub playback_interval_ms: u32,
    pub poll_interval_ms: u32,
    pub surface_width: u32,
    pub surface_height: u32,
    /// Used when a snapshot response does not carry a total.
    pub default_total_steps: usize,
    /// Index of the final problem in the canvas game.
    pub last_problem_index: usize,
    /// Max number of ticks skipped after repeated failures; 0 disables backoff.
    pub backoff_cap: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoints: None,
            image_format: DEFAULT_IMAGE_FORMAT.to_string(),
            playback_interval_ms: PLAYBACK_INTERVAL_MS,
            poll_interval_ms: POLL_INTERVAL_MS,
            surface_width: SURFACE_WIDTH,
            surface_height: SURFACE_HEIGHT,
            default_total_steps: DEFAULT_TOTAL_STEPS,
            last_problem_index: DEFAULT_LAST_PROBLEM_INDEX,
            backoff_cap: 0,
        }
    }
}

impl ControllerConfig {
    pub fn for_variant(variant: Variant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Effective endpoint layout.
    pub fn endpoints(&self) -> Endpoints {
        self.endpoints
            .clone()
            .unwrap_or_else(|| self.variant.endpoints())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url cannot be empty".into()));
        }
        if self.playback_interval_ms == 0 || self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("intervals must be at least 1 ms".into()));
        }
        if self.surface_width == 0 || self.surface_height == 0 {
            return Err(ConfigError::Invalid("surface size must be non-zero".into()));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "Could not parse config: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
