//! core::version
//!
//! Version string comparison for manifest merging.
//!
//! Versions are compared the way the npm `compare-versions` package does it:
//! up to four dot-separated numeric segments (missing segments count as `0`,
//! `x`/`*` wildcards match anything), followed by an optional pre-release
//! suffix that sorts before the plain release. Build metadata (`+...`) is
//! ignored.
//!
//! This is not a range solver. Range operators are only tolerated as a
//! prefix and stripped before comparison.
//!
//! # Example
//!
//! ```
//! use std::cmp::Ordering;
//! use modweave::core::version::compare_versions;
//!
//! assert_eq!(compare_versions("1.2.0", "1.10.0").unwrap(), Ordering::Less);
//! assert_eq!(compare_versions("2.0", "2.0.0").unwrap(), Ordering::Equal);
//! assert_eq!(compare_versions("1.0.0-beta", "1.0.0").unwrap(), Ordering::Less);
//! assert!(compare_versions("latest", "1.0.0").is_err());
//! ```

use std::cmp::Ordering;

use thiserror::Error;

/// Errors from version parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version '{0}'")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Number(u64),
    Wildcard,
}

#[derive(Debug, PartialEq, Eq)]
struct Version {
    segments: Vec<Segment>,
    pre: Option<String>,
}

/// Strip leading `^` and `~` range markers.
///
/// ```
/// use modweave::core::version::strip_range_markers;
///
/// assert_eq!(strip_range_markers("^1.2.3"), "1.2.3");
/// assert_eq!(strip_range_markers("~0.4"), "0.4");
/// assert_eq!(strip_range_markers(">=1.0"), ">=1.0");
/// ```
pub fn strip_range_markers(version: &str) -> &str {
    version.trim().trim_start_matches(['^', '~'])
}

/// Compare two version strings.
///
/// # Errors
///
/// Returns [`VersionError::Invalid`] if either side is not a dotted numeric
/// version (e.g. a dist-tag, URL, or path).
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering, VersionError> {
    let a = parse(a)?;
    let b = parse(b)?;

    let len = a.segments.len().max(b.segments.len());
    for i in 0..len {
        let left = a.segments.get(i).copied().unwrap_or(Segment::Number(0));
        let right = b.segments.get(i).copied().unwrap_or(Segment::Number(0));
        match (left, right) {
            (Segment::Number(l), Segment::Number(r)) => match l.cmp(&r) {
                Ordering::Equal => continue,
                other => return Ok(other),
            },
            _ => continue,
        }
    }

    Ok(compare_pre_release(a.pre.as_deref(), b.pre.as_deref()))
}

/// True when two versions are not equal after stripping range markers.
///
/// Unparseable versions fall back to plain string comparison.
pub fn versions_differ(a: &str, b: &str) -> bool {
    let a = strip_range_markers(a);
    let b = strip_range_markers(b);
    match compare_versions(a, b) {
        Ok(ordering) => ordering != Ordering::Equal,
        Err(_) => a != b,
    }
}

/// True when `candidate` is strictly greater than `current` after stripping
/// range markers. Unparseable versions are never considered newer.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    matches!(
        compare_versions(strip_range_markers(candidate), strip_range_markers(current)),
        Ok(Ordering::Greater)
    )
}

fn parse(raw: &str) -> Result<Version, VersionError> {
    let invalid = || VersionError::Invalid(raw.to_string());

    let s = raw
        .trim()
        .trim_start_matches(|c: char| matches!(c, 'v' | 'V' | '^' | '~' | '<' | '>' | '='))
        .trim();

    // Build metadata never participates in ordering.
    let s = s.split_once('+').map_or(s, |(core, _)| core);

    let (core, pre) = match s.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (s, None),
    };

    if core.is_empty() {
        return Err(invalid());
    }

    let mut segments = Vec::new();
    for (i, part) in core.split('.').enumerate() {
        if i >= 4 {
            return Err(invalid());
        }
        let segment = match part {
            "x" | "X" | "*" if i > 0 => Segment::Wildcard,
            _ if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) => {
                Segment::Number(part.parse().map_err(|_| invalid())?)
            }
            _ => return Err(invalid()),
        };
        segments.push(segment);
    }

    if let Some(pre) = pre {
        let valid = !pre.is_empty()
            && pre.split('.').all(|id| {
                !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            });
        if !valid {
            return Err(invalid());
        }
    }

    Ok(Version {
        segments,
        pre: pre.map(str::to_string),
    })
}

fn compare_pre_release(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(a), Some(b)) => {
            let mut left = a.split('.');
            let mut right = b.split('.');
            loop {
                match (left.next(), right.next()) {
                    (None, None) => return Ordering::Equal,
                    (None, Some(_)) => return Ordering::Less,
                    (Some(_), None) => return Ordering::Greater,
                    (Some(l), Some(r)) => {
                        let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                            (Ok(l), Ok(r)) => l.cmp(&r),
                            (Ok(_), Err(_)) => Ordering::Less,
                            (Err(_), Ok(_)) => Ordering::Greater,
                            (Err(_), Err(_)) => l.cmp(r),
                        };
                        if ordering != Ordering::Equal {
                            return ordering;
                        }
                    }
                }
            }
        }
    }
}
