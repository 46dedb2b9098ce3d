//! Run metadata written into the header of every exported table.

use crate::measurement::ParameterKind;
use crate::sweep::SweepConfig;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Describes one acquisition run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// Local time the run started.
    pub started_at: DateTime<Local>,
    /// Sample under test.
    pub material: String,
    /// Free-form operator notes.
    pub info: String,
    pub majors: Vec<ParameterKind>,
    pub minors: Vec<ParameterKind>,
    /// Human-readable sweep mode.
    pub mode: String,
    /// Sweep parameters (voltages, averaging, frequencies, setpoint).
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Version of the acquisition software.
    pub software_version: String,
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Local::now(),
            material: "sample".to_string(),
            info: String::new(),
            majors: Vec::new(),
            minors: Vec::new(),
            mode: String::new(),
            parameters: BTreeMap::new(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl RunMetadata {
    pub fn builder() -> RunMetadataBuilder {
        RunMetadataBuilder::default()
    }

    /// Validates the metadata.
    pub fn validate(&self) -> Result<(), String> {
        if self.material.trim().is_empty() {
            return Err("Material name cannot be empty.".to_string());
        }
        Ok(())
    }

    /// `Z+C`-style list of the major kinds.
    pub fn majors_label(&self) -> String {
        join_kinds(&self.majors)
    }

    pub fn minors_label(&self) -> String {
        join_kinds(&self.minors)
    }

    /// `<timestamp>_<material>_<majors>_<minors>` with path-unsafe characters replaced.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.started_at.format("%Y%m%d_%H%M%S"),
            sanitize(&self.material),
            self.majors_label(),
            self.minors_label()
        )
    }
}

fn join_kinds(kinds: &[ParameterKind]) -> String {
    kinds
        .iter()
        .map(|kind| kind.mnemonic())
        .collect::<Vec<_>>()
        .join("+")
}

fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '.' | '+') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A builder for constructing `RunMetadata` instances.
#[derive(Default)]
pub struct RunMetadataBuilder {
    inner: RunMetadata,
}

impl RunMetadataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn material(mut self, material: &str) -> Self {
        self.inner.material = material.to_string();
        self
    }

    pub fn info(mut self, info: &str) -> Self {
        self.inner.info = info.to_string();
        self
    }

    pub fn started_at(mut self, started_at: DateTime<Local>) -> Self {
        self.inner.started_at = started_at;
        self
    }

    pub fn parameter(mut self, key: &str, value: serde_json::Value) -> Self {
        self.inner.parameters.insert(key.to_string(), value);
        self
    }

    /// Copy the kinds, mode and sweep parameters from `config`.
    pub fn sweep(mut self, config: &SweepConfig) -> Self {
        self.inner.majors = config.majors.clone();
        self.inner.minors = config.minors.clone();
        self.inner.mode = config.mode.name().to_string();
        self.parameter("voltage_mv", config.voltage_mv.into())
            .parameter("bias_mv", serde_json::json!(config.bias_mv))
            .parameter("averaging", config.averaging.into())
            .parameter("setpoint_c", serde_json::json!(config.setpoint_c))
            .parameter(
                "mode",
                serde_json::to_value(&config.mode).unwrap_or(serde_json::Value::Null),
            )
    }

    pub fn build(self) -> RunMetadata {
        self.inner
    }
}
