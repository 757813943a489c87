//! JSON output for the CLI
//!
//! One JSON object per line on stdout, UTF-8 only.

use std::io::Write;

use serde::Serialize;

use super::errors::CliResult;

/// Write one value as a single JSON line
pub fn write_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Write a success response wrapping `data`
pub fn write_response<W: Write, T: Serialize>(out: &mut W, data: &T) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data,
    });
    write_line(out, &response)
}
