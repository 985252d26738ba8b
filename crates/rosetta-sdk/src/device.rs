use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// Compute device a tensor or model is bound to.
///
/// The core only stores and forwards the selection; dispatching work against
/// the device belongs to the execution layer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    #[default]
    Cpu,
    /// An accelerator identified by its ordinal.
    Gpu(u32),
}

impl Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Gpu(ordinal) => write!(f, "gpu:{ordinal}"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized == "cpu" {
            return Ok(Device::Cpu);
        }
        if normalized == "gpu" {
            return Ok(Device::Gpu(0));
        }
        if let Some(ordinal) = normalized.strip_prefix("gpu:") {
            return ordinal
                .parse::<u32>()
                .map(Device::Gpu)
                .map_err(|_| format!("Invalid device ordinal: {s}"));
        }
        Err(format!("Unknown device: {s}"))
    }
}
