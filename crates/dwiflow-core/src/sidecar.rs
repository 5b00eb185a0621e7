use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::consts::{PHASE_ENCODING_KEY, READOUT_TIME_FALLBACK_KEY, READOUT_TIME_KEY};
use crate::error::{DwiflowError, Result};

/// Acquisition parameters read from a DWI JSON sidecar.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AcquisitionParams {
    /// Total readout time in seconds.
    pub readout_time: f64,
    /// Phase-encoding direction, e.g. `j-`.
    pub phase_encoding_direction: String,
}

/// Read a sidecar file. An absent or unreadable file is reported as missing
/// the readout time, the first key the pipeline needs from it.
pub fn read_acquisition_params(path: &Path) -> Result<AcquisitionParams> {
    let contents = std::fs::read_to_string(path).map_err(|_| DwiflowError::SidecarMetadata {
        path: path.to_path_buf(),
        key: READOUT_TIME_KEY.to_string(),
    })?;
    parse_acquisition_params(path, &contents)
}

/// Parse sidecar JSON. The readout time falls back to
/// `EstimatedTotalReadoutTime` before failing.
pub fn parse_acquisition_params(path: &Path, contents: &str) -> Result<AcquisitionParams> {
    let json: Value = serde_json::from_str(contents)?;
    let missing = |key: &str| DwiflowError::SidecarMetadata {
        path: path.to_path_buf(),
        key: key.to_string(),
    };

    let readout_time = number_field(&json, READOUT_TIME_KEY)
        .or_else(|| number_field(&json, READOUT_TIME_FALLBACK_KEY))
        .ok_or_else(|| missing(READOUT_TIME_KEY))?;

    let phase_encoding_direction = json
        .get(PHASE_ENCODING_KEY)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing(PHASE_ENCODING_KEY))?
        .to_string();

    Ok(AcquisitionParams {
        readout_time,
        phase_encoding_direction,
    })
}

fn number_field(json: &Value, key: &str) -> Option<f64> {
    match json.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
