use qws_core::{QwsError, Result};

/// One compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// `:name`
    Param(String),
    /// Trailing `*`: one or more remaining segments.
    Rest,
}

impl Segment {
    /// Per-position precedence: literal > parameter > wildcard.
    fn rank(&self) -> u8 {
        match self {
            Segment::Literal(_) => 3,
            Segment::Param(_) => 2,
            Segment::Rest => 1,
        }
    }
}

/// Compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
    /// The bare `*` pattern: matches anything, lowest priority.
    catch_all: bool,
}

impl Pattern {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw == "*" {
            return Ok(Self {
                raw: raw.to_string(),
                segments: Vec::new(),
                catch_all: true,
            });
        }
        if !raw.starts_with('/') {
            return Err(QwsError::InvalidRoute(format!("{raw}: must start with '/' or be '*'")));
        }

        let parts: Vec<&str> = split_path(raw).collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            if *part == "*" {
                if i + 1 != parts.len() {
                    return Err(QwsError::InvalidRoute(format!("{raw}: '*' must be the last segment")));
                }
                segments.push(Segment::Rest);
            } else if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(QwsError::InvalidRoute(format!("{raw}: empty parameter name")));
                }
                let dup = segments
                    .iter()
                    .any(|s| matches!(s, Segment::Param(n) if n == name));
                if dup {
                    return Err(QwsError::InvalidRoute(format!("{raw}: duplicate parameter :{name}")));
                }
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Literal((*part).to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            catch_all: false,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_catch_all(&self) -> bool {
        self.catch_all
    }

    /// Ordering key: higher wins. Bare `*` sorts below everything.
    pub(crate) fn specificity(&self) -> (bool, Vec<u8>) {
        (!self.catch_all, self.segments.iter().map(Segment::rank).collect())
    }

    /// Match path segments, collecting `:name` bindings.
    pub(crate) fn matches<'p>(&self, path: &[&'p str]) -> Option<Vec<(String, &'p str)>> {
        if self.catch_all {
            return Some(Vec::new());
        }

        let mut bound = Vec::new();
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Rest => return (path.len() > i).then_some(bound),
                Segment::Literal(lit) => {
                    if path.get(i) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = path.get(i)?;
                    bound.push((name.clone(), *value));
                }
            }
        }
        (path.len() == self.segments.len()).then_some(bound)
    }
}

/// Non-empty `/`-separated segments; repeated and trailing slashes collapse.
pub(crate) fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
