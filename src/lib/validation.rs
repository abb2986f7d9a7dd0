//! Input validation utilities
//!
//! This module provides common validation functions for command-line parameters and
//! file paths with consistent error messages. All functions return structured errors from
//! [`crate::errors`].

use crate::errors::{RescueError, Result};
use std::path::Path;

/// Validate that a file exists
///
/// # Arguments
/// * `path` - Path to validate
/// * `description` - Human-readable description of the file (e.g., "Input BAM")
///
/// # Errors
/// Returns an error if the file does not exist
///
/// # Example
/// ```
/// use umirescue_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/file.bam", "Input BAM");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(RescueError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate that a fraction lies in `[0, 1]`.
///
/// # Errors
/// Returns an error if the value is outside `[0, 1]` or is NaN.
///
/// # Example
/// ```
/// use umirescue_lib::validation::validate_fraction;
///
/// validate_fraction(0.9, "min-frac-unambiguous").unwrap();
/// assert!(validate_fraction(1.5, "min-frac-unambiguous").is_err());
/// ```
pub fn validate_fraction(value: f64, name: &str) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(RescueError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be between 0 and 1, got: {value}"),
        });
    }
    Ok(())
}

/// Validate a BGZF compression level (0 = uncompressed blocks, 9 = best).
///
/// # Errors
/// Returns an error if the level is greater than 9.
pub fn validate_compression_level(level: u32, name: &str) -> Result<()> {
    if level > 9 {
        return Err(RescueError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be between 0 and 9, got: {level}"),
        });
    }
    Ok(())
}

/// Validate that a quality score is in the valid Phred range [0, 93]
///
/// # Errors
/// Returns an error if the quality is not in [0, 93]
pub fn validate_quality_score(quality: u8, name: &str) -> Result<()> {
    if quality > 93 {
        return Err(RescueError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be a Phred score between 0 and 93, got: {quality}"),
        });
    }
    Ok(())
}

/// Parse a memory size such as `500M`, `1G`, `768K` or a plain byte count.
///
/// # Errors
/// Returns a message suitable for clap when the string cannot be parsed.
///
/// # Example
/// ```
/// use umirescue_lib::validation::parse_memory;
///
/// assert_eq!(parse_memory("500M").unwrap(), 500 * 1024 * 1024);
/// assert_eq!(parse_memory("1g").unwrap(), 1024 * 1024 * 1024);
/// assert!(parse_memory("lots").is_err());
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn parse_memory(s: &str) -> std::result::Result<usize, String> {
    let s = s.trim().to_uppercase();

    if s.is_empty() {
        return Err("Empty memory specification".to_string());
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('G') {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('K') {
        (n, 1024)
    } else {
        (s.as_str(), 1)
    };

    let num: f64 = num_str.parse().map_err(|_| format!("Invalid number: {num_str}"))?;

    if num <= 0.0 {
        return Err("Memory size must be positive".to_string());
    }

    Ok((num * multiplier as f64) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::NamedTempFile;

    #[test]
    fn test_validate_file_exists_valid() {
        let temp_file = NamedTempFile::new().unwrap();
        validate_file_exists(temp_file.path(), "Test file").unwrap();
    }

    #[test]
    fn test_validate_file_exists_invalid() {
        let result = validate_file_exists("/nonexistent/file.bam", "Input BAM");
        assert!(matches!(result, Err(RescueError::InvalidFileFormat { .. })));
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(0.5, true)]
    #[case(1.0, true)]
    #[case(-0.1, false)]
    #[case(1.01, false)]
    #[case(f64::NAN, false)]
    fn test_validate_fraction(#[case] value: f64, #[case] ok: bool) {
        assert_eq!(validate_fraction(value, "frac").is_ok(), ok);
    }

    #[rstest]
    #[case(0, true)]
    #[case(6, true)]
    #[case(9, true)]
    #[case(10, false)]
    fn test_validate_compression_level(#[case] level: u32, #[case] ok: bool) {
        assert_eq!(validate_compression_level(level, "compression-level").is_ok(), ok);
    }

    #[test]
    fn test_validate_quality_score() {
        validate_quality_score(93, "max-quality").unwrap();
        assert!(validate_quality_score(94, "max-quality").is_err());
    }

    #[rstest]
    #[case("500M", 500 * 1024 * 1024)]
    #[case("2G", 2 * 1024 * 1024 * 1024)]
    #[case("768k", 768 * 1024)]
    #[case("1000", 1000)]
    #[case(" 1.5m ", 1_572_864)]
    fn test_parse_memory(#[case] input: &str, #[case] expected: usize) {
        assert_eq!(parse_memory(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("M")]
    #[case("-5M")]
    #[case("0")]
    #[case("five")]
    fn test_parse_memory_invalid(#[case] input: &str) {
        assert!(parse_memory(input).is_err());
    }
}
