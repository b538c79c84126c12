//! Display utilities and output formatting for the tessera CLI.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Output format for fetched items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum Format {
    /// One pretty-printed JSON array.
    Json,
    /// One JSON value per line.
    Ndjson,
}

/// Parses a `key=value` request parameter.
pub(crate) fn parse_param(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid parameter '{s}': expected key=value"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("Invalid parameter '{s}': empty key"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Writes values to `output`, or stdout if none is given.
pub(crate) fn write_values(values: &[Value], output: Option<&Path>, format: Format) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_to(values, &mut writer, format)?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_to(values, &mut writer, format)?;
            writer.flush()?;
        }
    }
    Ok(())
}

fn write_to<W: Write>(values: &[Value], writer: &mut W, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            serde_json::to_writer_pretty(&mut *writer, values)?;
            writeln!(writer)?;
        }
        Format::Ndjson => {
            for value in values {
                serde_json::to_writer(&mut *writer, value)?;
                writeln!(writer)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("code=7203").unwrap(),
            ("code".to_string(), "7203".to_string())
        );
        assert_eq!(
            parse_param("date=2024-01-04=x").unwrap(),
            ("date".to_string(), "2024-01-04=x".to_string())
        );
        assert_eq!(
            parse_param("from=").unwrap(),
            ("from".to_string(), String::new())
        );
        assert!(parse_param("code").is_err());
        assert!(parse_param("=7203").is_err());
    }

    #[test]
    fn test_write_ndjson() {
        let values = vec![json!({ "Code": "7203" }), json!({ "Code": "6758" })];
        let mut buffer = Vec::new();
        write_to(&values, &mut buffer, Format::Ndjson).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "{\"Code\":\"7203\"}\n{\"Code\":\"6758\"}\n");
    }

    #[test]
    fn test_write_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let values = vec![json!(1), json!(2)];

        write_values(&values, Some(&path), Format::Json).unwrap();

        let written: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, values);
    }
}
