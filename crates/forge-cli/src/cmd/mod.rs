pub mod commands;
pub mod describe;
pub mod run;
pub mod serve;

use forge_core::StepInputs;

/// Parse a `key=value` input flag.
pub fn parse_input(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

pub fn step_inputs(pairs: Vec<(String, String)>, step: usize) -> anyhow::Result<StepInputs> {
    Ok(StepInputs::from_params(pairs, step)?)
}
