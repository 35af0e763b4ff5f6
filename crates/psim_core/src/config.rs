use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::constants::GLOBAL_PARAMETERS;
use crate::error::{Error, Result};
use crate::types::FileFormat;

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Run-wide settings read from the `GlobalParameters` block of a scene file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct GlobalParameters {
    /// Worker threads; zero or negative uses rayon's global pool
    pub n_threads: i32,
    /// Seconds per frame
    pub frame_duration: f32,
    pub start_frame: u32,
    pub final_frame: u32,
    /// Random seed for IDs and jitter
    pub seed: u64,

    /// Directory frame exports are written to
    pub data_path: String,
    pub output_format: FileFormat,
    pub save_frame_data: bool,

    pub print_log_to_console: bool,
    /// Fallback `tracing` filter when `RUST_LOG` is not set
    pub console_log_level: String,

    #[serde(skip)]
    pub finished_frame: u32,
    #[serde(skip)]
    pub frame_local_time: f32,
}

impl Default for GlobalParameters {
    fn default() -> Self {
        Self {
            n_threads: -1,
            frame_duration: 1.0 / 30.0,
            start_frame: 1,
            final_frame: 1,
            seed: 42,
            data_path: "./Output".into(),
            output_format: FileFormat::Bnn,
            save_frame_data: false,
            print_log_to_console: true,
            console_log_level: "info".into(),
            finished_frame: 0,
            frame_local_time: 0.0,
        }
    }
}

impl GlobalParameters {
    /// Reads the `GlobalParameters` block of `scene`; a missing block gives the defaults
    pub fn from_json(scene: &Value) -> Result<Self> {
        let params: Self = match scene.get(GLOBAL_PARAMETERS) {
            Some(block) => serde_json::from_value(block.clone())?,
            None => Self::default(),
        };
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<()> {
        if !(self.frame_duration > 0.0) {
            return Err(Error::InvalidConfigValue {
                field: "FrameDuration".into(),
                reason: format!("must be positive, got {}", self.frame_duration),
            });
        }
        if self.final_frame < self.start_frame {
            return Err(Error::InvalidConfigValue {
                field: "FinalFrame".into(),
                reason: format!(
                    "final frame {} precedes start frame {}",
                    self.final_frame, self.start_frame
                ),
            });
        }
        if !LOG_LEVELS.contains(&self.console_log_level.to_ascii_lowercase().as_str()) {
            return Err(Error::InvalidConfigValue {
                field: "ConsoleLogLevel".into(),
                reason: format!("unknown level `{}`", self.console_log_level),
            });
        }
        Ok(())
    }

    /// Console filter directive: the configured level, or `off` when console logging is disabled
    pub fn console_filter(&self) -> String {
        if self.print_log_to_console {
            self.console_log_level.to_ascii_lowercase()
        } else {
            "off".to_string()
        }
    }

    /// Simulated time elapsed since frame zero
    pub fn system_time(&self) -> f32 {
        self.frame_duration * self.finished_frame as f32 + self.frame_local_time
    }

    pub fn thread_count(&self) -> Option<usize> {
        (self.n_threads > 0).then_some(self.n_threads as usize)
    }

    pub fn log_parameters(&self) {
        info!(
            frame_duration = self.frame_duration,
            start_frame = self.start_frame,
            final_frame = self.final_frame,
            n_threads = self.n_threads,
            seed = self.seed,
            data_path = %self.data_path,
            output_format = self.output_format.name(),
            "global parameters"
        );
    }
}
