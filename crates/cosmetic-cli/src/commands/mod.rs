//! CLI command implementations

pub mod init;
pub mod run;
pub mod threshold;

use anyhow::{Result, bail};
use cosmetic_ops::DefectItem;
use std::path::PathBuf;

fn is_pattern(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Expands target arguments. Glob patterns must match at least one file;
/// plain paths are passed through so missing files are reported per item.
pub fn expand_targets(args: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for arg in args {
        if !is_pattern(arg) {
            files.push(PathBuf::from(arg));
            continue;
        }
        let mut matched: Vec<PathBuf> = glob::glob(arg)?.filter_map(|r| r.ok()).collect();
        if matched.is_empty() {
            bail!("No files match pattern: {}", arg);
        }
        matched.sort();
        files.extend(matched);
    }
    Ok(files)
}

fn parse_u16(s: &str, what: &str) -> Result<u16, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("invalid {} '{}'", what, s))
}

/// Parses `row:N`, `col:N`, `row:N:BEGIN-END` or `col:N:BEGIN-END`.
pub fn parse_defect(s: &str) -> Result<DefectItem, String> {
    let mut parts = s.split(':');
    let kind = parts.next().unwrap_or_default();
    let address = parts
        .next()
        .ok_or_else(|| format!("expected row:N or col:N, got '{}'", s))?;
    let address = parse_u16(address, "address")?;

    let item = match kind.to_ascii_lowercase().as_str() {
        "row" | "r" => DefectItem::row(address),
        "col" | "column" | "c" => DefectItem::column(address),
        other => return Err(format!("unknown defect kind '{}' (row or col)", other)),
    };

    let item = match parts.next() {
        None => item,
        Some(range) => {
            let (begin, end) = range
                .split_once('-')
                .ok_or_else(|| format!("expected BEGIN-END, got '{}'", range))?;
            item.with_range(parse_u16(begin, "range start")?, parse_u16(end, "range end")?)
        }
    };

    if parts.next().is_some() {
        return Err(format!("trailing fields in '{}'", s));
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defect() {
        assert_eq!(parse_defect("row:12").unwrap(), DefectItem::row(12));
        assert_eq!(parse_defect("col:1021").unwrap(), DefectItem::column(1021));
        assert_eq!(
            parse_defect("Row:5:100-220").unwrap(),
            DefectItem::row(5).with_range(100, 220)
        );
        assert_eq!(
            parse_defect("c:7:30-10").unwrap(),
            DefectItem::column(7).with_range(30, 10)
        );
    }

    #[test]
    fn test_parse_defect_errors() {
        for bad in ["row", "diag:3", "row:x", "row:70000", "col:3:5", "col:3:1-2:9", "row:3:a-4"] {
            assert!(parse_defect(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_expand_plain_paths_pass_through() {
        let files = expand_targets(&["missing.tif".to_string()]).unwrap();
        assert_eq!(files, vec![PathBuf::from("missing.tif")]);
    }

    #[test]
    fn test_expand_glob() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in ["b.tif", "a.tif", "c.fit"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let pattern = format!("{}/*.tif", dir.path().display());
        let files = expand_targets(&[pattern]).unwrap();
        assert_eq!(files, vec![dir.path().join("a.tif"), dir.path().join("b.tif")]);

        let none = format!("{}/*.xisf", dir.path().display());
        assert!(expand_targets(&[none]).is_err());
    }
}
