pub mod ask;
pub mod eval;
pub mod index;

use cw_core::error::AppError;
use serde::Serialize;

/// Pretty-print a payload to stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let out = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("OUTPUT_SERIALIZE_FAILED", "Failed to serialize output").with_details(e.to_string())
    })?;
    println!("{out}");
    Ok(())
}
