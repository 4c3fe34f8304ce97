use std::{
    fmt,
    path::{Component, Path, PathBuf},
};

use serde::Serialize;

use crate::error::{Error, Result};

/// a `/` separated path relative to the source (or build) root
///
/// never contains `..`, never starts with `/`, never has empty segments
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RelPath(String);

/// `\` only separates on windows, elsewhere it is part of the name
fn is_separator(c: char) -> bool {
    c == '/' || (cfg!(windows) && c == '\\')
}

impl RelPath {
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        let mut segments = Vec::new();
        for segment in raw.split(is_separator) {
            match segment {
                "" | "." => continue,
                ".." => return Err(Error::Traversal(raw.to_string())),
                s => segments.push(s),
            }
        }
        Ok(Self(segments.join("/")))
    }

    /// strip `root` from a full path found while walking it
    pub fn from_root<R: AsRef<Path>, P: AsRef<Path>>(root: R, path: P) -> Result<Self> {
        let path = path.as_ref();
        let relative = path
            .strip_prefix(root.as_ref())
            .map_err(|_| Error::Traversal(path.display().to_string()))?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::CurDir => continue,
                Component::Normal(name) => match name.to_str() {
                    Some(name) => segments.push(name),
                    None => return Err(Error::InvalidPath(path.to_path_buf())),
                },
                _ => return Err(Error::Traversal(path.display().to_string())),
            }
        }
        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// how many directories deep the path sits, the file itself not counted
    pub fn depth(&self) -> usize {
        self.0.matches('/').count()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    pub fn parent(&self) -> RelPath {
        match self.0.rfind('/') {
            Some(idx) => Self(self.0[..idx].to_string()),
            None => Self::default(),
        }
    }

    pub fn join(&self, name: &str) -> Result<RelPath> {
        if self.is_empty() {
            Self::new(name)
        } else {
            Self::new(format!("{}/{}", self.0, name))
        }
    }

    pub fn with_file_name(&self, name: &str) -> RelPath {
        let parent = self.parent();
        if parent.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}/{}", parent.0, name))
        }
    }

    pub fn to_path<T: AsRef<Path>>(&self, root: T) -> PathBuf {
        self.segments()
            .fold(root.as_ref().to_path_buf(), |acc, s| acc.join(s))
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
