//! Tool version labels and the tolerant version comparator.
//!
//! Tool versions are free-form text printed by user scripts (`v1.2.3`,
//! `release-9`, `nightly`, ...). Comparison is numeric-aware when both labels
//! look like dotted versions and degrades to a byte-wise comparison otherwise.

use semver::Prerelease;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// An opaque version label. The empty label means "unlinked" or "unknown".
///
/// `ToolVersion` deliberately has no `Ord` impl: the comparator treats
/// `1.0` and `1.0.0` as equal while their labels differ. Use
/// [`ToolVersion::compare`] for ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolVersion(String);

impl ToolVersion {
    /// Create a version label from any string.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The sentinel "no version" label.
    #[must_use]
    pub const fn empty() -> Self {
        Self(String::new())
    }

    /// The raw label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the "no version" sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Order two labels with [`compare_versions`].
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        compare_versions(&self.0, &other.0)
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ToolVersion {
    fn from(label: String) -> Self {
        Self(label)
    }
}

impl From<&str> for ToolVersion {
    fn from(label: &str) -> Self {
        Self(label.to_string())
    }
}

impl AsRef<str> for ToolVersion {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compare two version labels.
///
/// Leading characters that are not ASCII digits are stripped from each label.
/// If either stripped label is empty, or either fails to parse as a dotted
/// numeric version, the original labels are compared byte-wise and a warning
/// is logged. Otherwise the numeric cores are compared with missing segments
/// treated as zero, then pre-release identifiers per semver precedence (a
/// release sorts above any of its pre-releases). Build metadata is ignored.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let stripped_a = strip_non_digit_prefix(a);
    let stripped_b = strip_non_digit_prefix(b);

    if stripped_a.is_empty() || stripped_b.is_empty() {
        tracing::warn!(
            left = a,
            right = b,
            "Version label has no numeric part, comparing lexically"
        );
        return a.cmp(b);
    }

    match (
        stripped_a.parse::<LooseVersion>(),
        stripped_b.parse::<LooseVersion>(),
    ) {
        (Ok(left), Ok(right)) => left.cmp(&right),
        (left, right) => {
            let reason = left.err().or(right.err()).unwrap_or_default();
            tracing::warn!(
                left = a,
                right = b,
                reason = %reason,
                "Failed to parse version, comparing lexically"
            );
            a.cmp(b)
        }
    }
}

fn strip_non_digit_prefix(label: &str) -> &str {
    label.trim_start_matches(|c: char| !c.is_ascii_digit())
}

/// Dotted numeric version with an optional pre-release, any segment count.
#[derive(Debug, PartialEq, Eq)]
struct LooseVersion {
    segments: Vec<u64>,
    prerelease: Prerelease,
}

impl std::str::FromStr for LooseVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let without_build = match s.split_once('+') {
            Some((version, build)) => {
                if !is_identifier_list(build) {
                    return Err(format!("invalid build metadata '{build}'"));
                }
                version
            }
            None => s,
        };

        let core_len = without_build
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(without_build.len());
        let (core, rest) = without_build.split_at(core_len);

        let segments = core
            .split('.')
            .map(|segment| {
                segment
                    .parse::<u64>()
                    .map_err(|_| format!("invalid numeric segment '{segment}' in '{s}'"))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let prerelease = if rest.is_empty() {
            Prerelease::EMPTY
        } else {
            let pre = match rest.strip_prefix('-') {
                Some(pre) => pre,
                None if rest.starts_with(|c: char| c.is_ascii_alphabetic()) => rest,
                None => return Err(format!("unexpected '{rest}' after version core")),
            };
            if pre.is_empty() {
                return Err(format!("empty pre-release in '{s}'"));
            }
            Prerelease::new(pre).map_err(|e| format!("invalid pre-release '{pre}': {e}"))?
        };

        Ok(Self {
            segments,
            prerelease,
        })
    }
}

fn is_identifier_list(text: &str) -> bool {
    !text.is_empty()
        && text.split('.').all(|ident| {
            !ident.is_empty() && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

impl Ord for LooseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.segments.len().max(other.segments.len());
        for i in 0..width {
            let left = self.segments.get(i).copied().unwrap_or(0);
            let right = other.segments.get(i).copied().unwrap_or(0);
            match left.cmp(&right) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }

        match (self.prerelease.is_empty(), other.prerelease.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.prerelease.cmp(&other.prerelease),
        }
    }
}

impl PartialOrd for LooseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
