//! Plain-text arrival times: one timestamp in seconds per line.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

/// Parse arrival times from text.
///
/// Blank lines and `#` comments (whole-line or trailing) are skipped.
/// Every timestamp must be finite.
pub fn parse_times(text: &str) -> Result<Vec<f64>> {
    let mut times = Vec::new();
    for (lineno, line) in text.lines().enumerate().map(|(i, l)| (i + 1, l)) {
        let field = line.split('#').next().unwrap_or_default().trim();
        if field.is_empty() {
            continue;
        }
        let t: f64 = field
            .parse()
            .with_context(|| format!("line {lineno} is not a time: {field}"))?;
        if !t.is_finite() {
            bail!("line {lineno} is not a finite time: {field}");
        }
        times.push(t);
    }
    if times.is_empty() {
        bail!("no arrival times found");
    }
    Ok(times)
}

pub fn read_times(path: &Path) -> Result<Vec<f64>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read arrival times {}", path.display()))?;
    parse_times(&text).with_context(|| format!("in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn skips_comments_and_blank_lines() {
        let times = parse_times("# arrival times\n0.5\n\n1e-3  # trailing\n  2 \n").unwrap();
        assert_eq!(times, vec![0.5, 1e-3, 2.0]);
    }

    #[test]
    fn reports_offending_line() {
        let err = parse_times("1.0\nabc\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(parse_times("# nothing\n").is_err());
    }

    #[test]
    fn rejects_non_finite_times() {
        let err = parse_times("0.0\n1.0\nNaN\n").unwrap_err();
        assert_eq!(err.to_string(), "line 3 is not a finite time: NaN");
        let err = parse_times("inf\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn reads_fixture() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../test_data/tiny_times.txt");
        assert_eq!(read_times(&path).unwrap(), vec![0.0, 1.0, 3.0, 6.0]);
    }
}
