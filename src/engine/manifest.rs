//! Line-oriented content list parsing.
//!
//! Each line reads `<relative-path>,<size-in-bytes>[,<hex-checksum>]`. Commas in
//! paths are not escaped. Lines that don't fit are dropped with a warning; the
//! parse itself never fails.

use std::path::{Component, Path};

use log::{debug, warn};

use crate::engine::models::{Manifest, ManifestEntry};
use crate::error::ManifestError;
use crate::storage::CONTENT_LIST;

#[derive(Clone, Copy, Debug)]
pub struct ManifestParser {
    min_fields: usize,
}

impl Default for ManifestParser {
    fn default() -> Self {
        Self { min_fields: 2 }
    }
}

impl ManifestParser {
    /// A parser that rejects lines without a checksum field.
    pub fn requiring_checksums() -> Self {
        Self { min_fields: 3 }
    }

    pub fn with_min_fields(min_fields: usize) -> Self {
        Self {
            min_fields: min_fields.clamp(2, 3),
        }
    }

    pub fn parse(&self, text: &str) -> Manifest {
        let mut entries = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match self.parse_line(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => warn!("manifest: skipping line {}: {err} ({line:?})", index + 1),
            }
        }
        debug!("manifest: parsed {} entries", entries.len());
        Manifest { entries }
    }

    pub fn parse_line(&self, line: &str) -> Result<ManifestEntry, ManifestError> {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        if parts.len() < self.min_fields {
            return Err(ManifestError::TooFewFields {
                expected: self.min_fields,
                found: parts.len(),
            });
        }

        let path = parts[0];
        if path.is_empty() {
            return Err(ManifestError::MissingPath);
        }
        if !is_contained(path) {
            return Err(ManifestError::UnsafePath(path.to_owned()));
        }
        if shadows_cached_list(path) {
            return Err(ManifestError::ReservedPath(path.to_owned()));
        }

        let size = parts[1]
            .parse::<u64>()
            .map_err(|_| ManifestError::InvalidSize(parts[1].to_owned()))?;

        let checksum = parts
            .get(2)
            .copied()
            .filter(|value| !value.is_empty())
            .map(str::to_ascii_lowercase);
        if checksum.is_none() && self.min_fields > 2 {
            return Err(ManifestError::TooFewFields {
                expected: self.min_fields,
                found: 2,
            });
        }

        Ok(ManifestEntry::new(path, size, checksum))
    }
}

/// True when joining `path` onto a base directory stays inside it.
fn is_contained(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// True when `path` resolves to the cached content list in the base directory.
fn shadows_cached_list(path: &str) -> bool {
    let mut parts = Path::new(path)
        .components()
        .filter(|c| !matches!(c, Component::CurDir));
    matches!(
        (parts.next(), parts.next()),
        (Some(Component::Normal(name)), None) if name == CONTENT_LIST
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_and_three_field_lines() {
        let manifest = ManifestParser::default().parse(
            "a.mp4,1024,D41D8CD98F00B204E9800998ECF8427E\nclips/b.mp4,0\n",
        );
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.entries[0].relative_path, "a.mp4");
        assert_eq!(manifest.entries[0].size_bytes, 1024);
        assert_eq!(
            manifest.entries[0].checksum.as_deref(),
            Some("d41d8cd98f00b204e9800998ecf8427e")
        );
        assert_eq!(manifest.entries[1].relative_path, "clips/b.mp4");
        assert_eq!(manifest.entries[1].checksum, None);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let text = "\
good.mp4,10,abc
justapath
,10
neg.mp4,-5
big.mp4,ten
../escape.mp4,10
/abs.mp4,10

also-good.mp4,20\r
";
        let manifest = ManifestParser::default().parse(text);
        let paths: Vec<_> = manifest.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["good.mp4", "also-good.mp4"]);
        assert_eq!(manifest.entries[1].size_bytes, 20);
    }

    #[test]
    fn duplicates_are_preserved_in_order() {
        let manifest = ManifestParser::default().parse("x,1\ny,2\nx,1\n");
        let paths: Vec<_> = manifest.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["x", "y", "x"]);
    }

    #[test]
    fn required_checksums_reject_legacy_lines() {
        let parser = ManifestParser::requiring_checksums();
        let manifest = parser.parse("a,1,ff\nb,2\nc,3,\n");
        assert_eq!(manifest.len(), 1);
        assert_eq!(
            parser.parse_line("b,2"),
            Err(ManifestError::TooFewFields {
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn reports_specific_line_errors() {
        let parser = ManifestParser::default();
        assert_eq!(
            parser.parse_line("only"),
            Err(ManifestError::TooFewFields {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            parser.parse_line("a,x"),
            Err(ManifestError::InvalidSize("x".into()))
        );
        assert_eq!(parser.parse_line(" ,1"), Err(ManifestError::MissingPath));
        assert_eq!(
            parser.parse_line("a/../../b,1"),
            Err(ManifestError::UnsafePath("a/../../b".into()))
        );
    }

    #[test]
    fn entry_cannot_overwrite_cached_list() {
        let parser = ManifestParser::default();
        assert_eq!(
            parser.parse_line("content_list,10"),
            Err(ManifestError::ReservedPath("content_list".into()))
        );
        assert_eq!(
            parser.parse_line("./content_list,10"),
            Err(ManifestError::ReservedPath("./content_list".into()))
        );
        assert!(parser.parse_line("lists/content_list,10").is_ok());

        let manifest = parser.parse("content_list,5
a.mp4,1
");
        let paths: Vec<_> = manifest.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.mp4"]);
    }

    #[test]
    fn empty_input_gives_empty_manifest() {
        assert!(ManifestParser::default().parse("").is_empty());
        assert!(ManifestParser::default().parse("\n\n  \n").is_empty());
    }

    #[test]
    fn min_fields_is_clamped() {
        let parser = ManifestParser::with_min_fields(0);
        assert!(parser.parse_line("a").is_err());
        let parser = ManifestParser::with_min_fields(9);
        assert!(parser.parse_line("a,1,ff").is_ok());
    }
}
