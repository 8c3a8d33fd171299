//! Loading of precomputed fault-site lists.
//!
//! Site files are plain text: one `output_position reduction_position` pair
//! per line, whitespace-separated; `#` starts a comment and blank lines are
//! ignored. One file per dataset. Generating or selecting the sites is
//! external tooling's job; this module only reads what it produced.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

use crate::kernels::fault::{FaultConfig, FaultSite};

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("IO error")]
    Io(#[from] std::io::Error),
    #[error("Malformed fault site at line {line}")]
    Parse { line: usize },
}

pub fn load_sites<P: AsRef<Path>>(path: P) -> Result<Vec<FaultSite>, SiteError> {
    let mut file = File::open(path)?;
    let mut text = String::new();
    file.read_to_string(&mut text)?;
    parse_sites(&text)
}

pub fn parse_sites(text: &str) -> Result<Vec<FaultSite>, SiteError> {
    let mut sites = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let output_position = fields.next().and_then(|f| f.parse().ok());
        let reduction_position = fields.next().and_then(|f| f.parse().ok());
        match (output_position, reduction_position, fields.next()) {
            (Some(output_position), Some(reduction_position), None) => sites.push(FaultSite {
                output_position,
                reduction_position,
            }),
            _ => return Err(SiteError::Parse { line: idx + 1 }),
        }
    }
    Ok(sites)
}

/// Loads one site file per dataset and assembles the fault configuration.
pub fn load_config<P: AsRef<Path>>(
    paths: &[P],
    dataset_index: usize,
    bit_position: u32,
) -> Result<FaultConfig, SiteError> {
    let mut datasets = Vec::with_capacity(paths.len());
    for path in paths {
        datasets.push(load_sites(path)?);
    }
    Ok(FaultConfig::new(dataset_index, bit_position, datasets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_comments_and_blanks() {
        let text = "# header\n12 3\n\n 7 0 # trailing note\n";
        let sites = parse_sites(text).unwrap();
        assert_eq!(
            sites,
            vec![
                FaultSite {
                    output_position: 12,
                    reduction_position: 3
                },
                FaultSite {
                    output_position: 7,
                    reduction_position: 0
                },
            ]
        );
    }

    #[test]
    fn reports_the_offending_line() {
        let err = parse_sites("1 2\n3\n").unwrap_err();
        match err {
            SiteError::Parse { line } => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other),
        }

        let err = parse_sites("1 2 3\n").unwrap_err();
        match err {
            SiteError::Parse { line } => assert_eq!(line, 1),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
