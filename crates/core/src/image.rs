// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container image references and partial-version tag selectors.
//!
//! An image string must be `repository:tag`; digests and the `latest`
//! tag are rejected so every check pins a concrete or selectable
//! version.

use std::fmt;
use thiserror::Error;

/// Errors from parsing image references and tags
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("image is required")]
    Empty,
    #[error("image digests are not supported")]
    DigestNotSupported,
    #[error("image must include a version tag")]
    MissingTag,
    #[error("latest tag is not allowed")]
    LatestTag,
    #[error("invalid tag format: {0}")]
    InvalidTag(String),
}

/// A parsed image reference: repository, tag, and the tag's selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub repository: String,
    pub tag: String,
    pub selector: Selector,
}

/// A partial version specifier parsed from an image tag.
///
/// `MajorPatch` matches on major AND patch while ignoring minor. This
/// is not semantic `major.minor`; the dialect is kept for compatibility
/// with existing check configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Major { major: u64 },
    MajorPatch { major: u64, patch: u64 },
    Full { major: u64, minor: u64, patch: u64 },
}

impl Selector {
    /// Whether a concrete version satisfies this selector.
    pub fn matches(&self, v: Version) -> bool {
        match *self {
            Selector::Major { major } => v.major == major,
            Selector::MajorPatch { major, patch } => v.major == major && v.patch == patch,
            Selector::Full {
                major,
                minor,
                patch,
            } => v.major == major && v.minor == minor && v.patch == patch,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Selector::Major { major } => write!(f, "{major}"),
            Selector::MajorPatch { major, patch } => write!(f, "{major}.{patch}"),
            Selector::Full {
                major,
                minor,
                patch,
            } => write!(f, "{major}.{minor}.{patch}"),
        }
    }
}

/// A concrete three-component version. Ordering is lexicographic over
/// `(major, minor, patch)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Parse an image string into a [`Reference`].
pub fn parse_reference(image: &str) -> Result<Reference, ImageError> {
    if image.is_empty() {
        return Err(ImageError::Empty);
    }
    if image.contains('@') {
        return Err(ImageError::DigestNotSupported);
    }

    let (repo, tag) = split_tag(image)?;
    if tag == "latest" {
        return Err(ImageError::LatestTag);
    }
    let selector = parse_selector(tag)?;

    Ok(Reference {
        repository: repo.to_string(),
        tag: tag.to_string(),
        selector,
    })
}

/// Split `repository:tag`, requiring a tag after the last path segment.
fn split_tag(image: &str) -> Result<(&str, &str), ImageError> {
    let last_slash = image.rfind('/').map(|i| i as isize).unwrap_or(-1);
    match image.rfind(':') {
        Some(colon) if colon as isize > last_slash => {
            let (repo, tag) = (&image[..colon], &image[colon + 1..]);
            if repo.is_empty() || tag.is_empty() {
                return Err(ImageError::MissingTag);
            }
            Ok((repo, tag))
        }
        _ => Err(ImageError::MissingTag),
    }
}

/// Parse a tag into a [`Selector`] of one, two, or three components.
pub fn parse_selector(tag: &str) -> Result<Selector, ImageError> {
    if tag.is_empty() {
        return Err(ImageError::InvalidTag("tag is required".to_string()));
    }
    let parts: Vec<&str> = tag.split('.').collect();
    match parts.as_slice() {
        [major] => Ok(Selector::Major {
            major: parse_component(major)?,
        }),
        [major, patch] => Ok(Selector::MajorPatch {
            major: parse_component(major)?,
            patch: parse_component(patch)?,
        }),
        [major, minor, patch] => Ok(Selector::Full {
            major: parse_component(major)?,
            minor: parse_component(minor)?,
            patch: parse_component(patch)?,
        }),
        _ => Err(ImageError::InvalidTag(tag.to_string())),
    }
}

/// Parse a tag as a full `major.minor.patch` version.
pub fn parse_version(tag: &str) -> Result<Version, ImageError> {
    let parts: Vec<&str> = tag.split('.').collect();
    let [major, minor, patch] = parts.as_slice() else {
        return Err(ImageError::InvalidTag(tag.to_string()));
    };
    Ok(Version {
        major: parse_component(major)?,
        minor: parse_component(minor)?,
        patch: parse_component(patch)?,
    })
}

fn parse_component(part: &str) -> Result<u64, ImageError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ImageError::InvalidTag(part.to_string()));
    }
    part.parse()
        .map_err(|_| ImageError::InvalidTag(part.to_string()))
}

/// Pick the highest version that satisfies the selector, if any.
pub fn resolve_selector(selector: Selector, versions: &[Version]) -> Option<Version> {
    versions
        .iter()
        .copied()
        .filter(|v| selector.matches(*v))
        .max()
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
