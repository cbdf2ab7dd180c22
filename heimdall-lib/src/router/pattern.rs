use ahash::{AHashMap, AHashSet};

use crate::error::{Result, ServerError};

/// One segment of a compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Matches a path segment byte-for-byte.
    Literal(String),
    /// Matches any single segment, capturing it under the given name.
    Param(String),
}

/// A compiled route pattern: an ordered sequence of literal and parameter
/// segments, e.g. `/users/{id}/orders`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile a pattern. Compilation is deterministic; malformed or
    /// duplicate parameter names fail registration.
    pub fn parse(raw: &str) -> Result<Self> {
        if !raw.starts_with('/') {
            return Err(ServerError::Config(format!(
                "Route pattern must start with '/': {raw}"
            )));
        }

        let mut segments = Vec::new();
        let mut seen_params = AHashSet::new();
        for part in split_segments(raw) {
            if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if name.is_empty() {
                    return Err(ServerError::Config(format!(
                        "Empty parameter name in route pattern: {raw}"
                    )));
                }
                if !seen_params.insert(name.to_string()) {
                    return Err(ServerError::Config(format!(
                        "Duplicate parameter '{name}' in route pattern: {raw}"
                    )));
                }
                segments.push(Segment::Param(name.to_string()));
            } else if part.contains('{') || part.contains('}') {
                return Err(ServerError::Config(format!(
                    "Malformed parameter segment '{part}' in route pattern: {raw}"
                )));
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }

        Ok(Self { raw: raw.to_string(), segments })
    }

    /// Match already-split path segments, collecting captures. Literals
    /// require byte equality; parameters capture the segment verbatim.
    pub fn matches(&self, path_segments: &[&str]) -> Option<AHashMap<String, String>> {
        if path_segments.len() != self.segments.len() {
            return None;
        }
        let mut params = AHashMap::new();
        for (segment, part) in self.segments.iter().zip(path_segments) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }
        Some(params)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

/// Split a path on `/`, ignoring the leading empty segment and any trailing
/// slash.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|part| !part.is_empty()).collect()
}
