//! Admit/drop decisions applied to already-reassembled frames.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("unknown filter name: {0}")]
    UnknownKind(String),

    #[error("failed to read filter config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid entry {entry:?} on line {line} of {path}")]
    BadEntry {
        path: String,
        line: usize,
        entry: String,
    },
}

/// Which filter to instantiate for a direction, selected by
/// `--filter-in`/`--filter-out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    #[default]
    None,
    Sbp,
}

impl std::str::FromStr for FilterKind {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sbp" => Ok(FilterKind::Sbp),
            other => Err(FilterError::UnknownKind(other.to_owned())),
        }
    }
}

impl FilterKind {
    /// Build the filter described by `(self, config_path)`. `config_path`
    /// must be `Some` iff `self != FilterKind::None`; that coupling is
    /// enforced one level up, in [`crate::config::Config`].
    pub fn build(self, config_path: Option<&Path>) -> Result<Box<dyn Filter>, FilterError> {
        match self {
            FilterKind::None => Ok(Box::new(NoneFilter)),
            FilterKind::Sbp => {
                let path = config_path.expect("Config guarantees a path for a non-None filter");
                Ok(Box::new(SbpFilter::load(path)?))
            }
        }
    }
}

/// A stateless predicate over reassembled frames.
pub trait Filter: Send {
    /// Returns `true` if `frame` should be forwarded, `false` if it should
    /// be silently dropped.
    fn admit(&self, frame: &[u8]) -> bool;
}

/// Admits every frame.
pub struct NoneFilter;

impl Filter for NoneFilter {
    fn admit(&self, _frame: &[u8]) -> bool {
        true
    }
}

/// Admits SBP frames whose `msg_type` (bytes 1-2, little-endian) appears in
/// an allow-list loaded from a config file: UTF-8, one decimal `u16` per
/// non-blank line, surrounding whitespace ignored. A frame too short to
/// carry a `msg_type` is dropped. An empty allow-list drops everything.
pub struct SbpFilter {
    admitted: HashSet<u16>,
}

impl SbpFilter {
    pub fn load(path: &Path) -> Result<Self, FilterError> {
        let text = fs::read_to_string(path).map_err(|source| FilterError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut admitted = HashSet::new();
        for (idx, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            let id: u16 = line.parse().map_err(|_| FilterError::BadEntry {
                path: path.display().to_string(),
                line: idx + 1,
                entry: line.to_owned(),
            })?;
            admitted.insert(id);
        }

        Ok(SbpFilter { admitted })
    }
}

impl Filter for SbpFilter {
    fn admit(&self, frame: &[u8]) -> bool {
        if frame.len() < 3 {
            return false;
        }
        let msg_type = u16::from_le_bytes([frame[1], frame[2]]);
        self.admitted.contains(&msg_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn sbp_frame(msg_type: u16) -> Vec<u8> {
        let mut buf = vec![0x55];
        buf.extend_from_slice(&msg_type.to_le_bytes());
        buf.extend_from_slice(&[0, 0]); // sender_id, unused by the filter
        buf
    }

    #[test]
    fn none_filter_admits_everything() {
        let filter = NoneFilter;
        assert!(filter.admit(&[]));
        assert!(filter.admit(&[1, 2, 3]));
    }

    #[test]
    fn sbp_filter_admits_listed_ids() {
        let file = write_config("65\n66\n");
        let filter = SbpFilter::load(file.path()).unwrap();
        assert!(filter.admit(&sbp_frame(65)));
        assert!(filter.admit(&sbp_frame(66)));
        assert!(!filter.admit(&sbp_frame(67)));
    }

    #[test]
    fn sbp_filter_ignores_blank_lines() {
        let file = write_config("  \n65\n\n");
        let filter = SbpFilter::load(file.path()).unwrap();
        assert!(filter.admit(&sbp_frame(65)));
    }

    #[test]
    fn sbp_filter_rejects_comment_line() {
        let file = write_config("# not part of the spec's grammar\n65\n");
        let err = SbpFilter::load(file.path()).unwrap_err();
        assert!(matches!(err, FilterError::BadEntry { .. }));
    }

    #[test]
    fn sbp_filter_empty_table_drops_all() {
        let file = write_config("");
        let filter = SbpFilter::load(file.path()).unwrap();
        assert!(!filter.admit(&sbp_frame(65)));
    }

    #[test]
    fn sbp_filter_drops_undersized_frame() {
        let file = write_config("65\n");
        let filter = SbpFilter::load(file.path()).unwrap();
        assert!(!filter.admit(&[0x55]));
    }

    #[test]
    fn sbp_filter_rejects_malformed_entry() {
        let file = write_config("not-a-number\n");
        let err = SbpFilter::load(file.path()).unwrap_err();
        assert!(matches!(err, FilterError::BadEntry { .. }));
    }

    #[test]
    fn filter_kind_from_str() {
        assert_eq!("sbp".parse::<FilterKind>().unwrap(), FilterKind::Sbp);
        assert!("bogus".parse::<FilterKind>().is_err());
    }
}
