//! Run settings, loaded from JSON.
//!
//! ```json
//! {
//!   "sim":    { "total_ticks": 3600, "seed": 7 },
//!   "router": { "walk_speed": 1.2 },
//!   "output_dir": "out",
//!   "log_level": "debug"
//! }
//! ```
//!
//! Every key is optional; missing ones take their defaults.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use tp_core::SimConfig;
use tp_stage::RouterConfig;

use crate::{SimError, SimResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sim:           SimConfig,
    pub router:        RouterConfig,
    /// Where report files are written.
    pub output_dir:    PathBuf,
    /// `"off"`, `"error"`, `"warn"`, `"info"`, `"debug"` or `"trace"`.
    pub log_level:     String,
    /// Include route lengths in the route report.
    pub route_lengths: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sim:           SimConfig::default(),
            router:        RouterConfig::default(),
            output_dir:    PathBuf::from("output"),
            log_level:     "info".to_owned(),
            route_lengths: false,
        }
    }
}

impl Settings {
    pub fn from_json_reader<R: Read>(reader: R) -> SimResult<Self> {
        let settings: Settings = serde_json::from_reader(reader)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: &Path) -> SimResult<Self> {
        Self::from_json_reader(BufReader::new(File::open(path)?))
    }

    pub fn level_filter(&self) -> SimResult<LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| SimError::Config(format!("unknown log level '{}'", self.log_level)))
    }

    fn validate(&self) -> SimResult<()> {
        if self.sim.tick_duration_secs == 0 {
            return Err(SimError::Config("tick_duration_secs must be positive".to_owned()));
        }
        if self.router.walk_speed <= 0.0 || self.router.car_speed <= 0.0 {
            return Err(SimError::Config("router speeds must be positive".to_owned()));
        }
        self.level_filter().map(|_| ())
    }
}
