use globset::{Glob, GlobSet, GlobSetBuilder};
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;

fn nfd(text: &str) -> String {
    text.nfd().collect()
}

/// a compiled set of shell-style patterns (`*`, `?`, `[seq]`)
///
/// patterns and paths are compared in NFD form, a walk may return a
/// decomposed `ñ` where the settings file has the composed one
#[derive(Debug, Clone)]
pub struct PathMatcher {
    glob_set: GlobSet,
}

impl PathMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(&nfd(pattern.as_ref()))?);
        }
        Ok(Self {
            glob_set: builder.build()?,
        })
    }

    /// true when the basename or the whole path matches one of the patterns
    pub fn matches(&self, path: &str) -> bool {
        if self.glob_set.is_empty() {
            return false;
        }
        let path = nfd(path);
        let name = path.rsplit('/').next().unwrap_or_default();
        self.glob_set.is_match(name) || self.glob_set.is_match(&path)
    }
}

impl Default for PathMatcher {
    fn default() -> Self {
        Self {
            glob_set: GlobSet::empty(),
        }
    }
}

/// one-shot form of [`PathMatcher::matches`]
pub fn matches<S: AsRef<str>>(path: &str, patterns: &[S]) -> Result<bool> {
    Ok(PathMatcher::new(patterns)?.matches(path))
}

/// "exclude unless explicitly included"
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    exclude: PathMatcher,
    include: PathMatcher,
}

impl PathFilter {
    pub fn new<S: AsRef<str>>(exclude: &[S], include: &[S]) -> Result<Self> {
        Ok(Self {
            exclude: PathMatcher::new(exclude)?,
            include: PathMatcher::new(include)?,
        })
    }

    pub fn must_filter(&self, path: &str) -> bool {
        self.exclude.matches(path) && !self.include.matches(path)
    }

    pub fn is_included(&self, path: &str) -> bool {
        self.include.matches(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_patterns_never_match() {
        let m = PathMatcher::new::<&str>(&[]).unwrap();
        assert!(!m.matches("anything.html"));
        assert!(!m.matches(""));
    }

    #[test]
    fn matches_basename_or_full_path() {
        let m = PathMatcher::new(&["*.tmp", "deprecated/*", "page?.html"]).unwrap();
        assert!(m.matches("a.tmp"));
        assert!(m.matches("deep/down/a.tmp"));
        assert!(m.matches("deprecated/old.html"));
        assert!(m.matches("page1.html"));
        assert!(!m.matches("page10.html"));
        assert!(!m.matches("a.txt"));
    }

    #[test]
    fn character_classes() {
        let m = PathMatcher::new(&["alert-[ab].html"]).unwrap();
        assert!(m.matches("alert-a.html"));
        assert!(!m.matches("alert-c.html"));
    }

    #[test]
    fn normalization_form_does_not_matter() {
        let composed = "ma\u{f1}ana.html";
        let decomposed = "man\u{303}ana.html";
        assert!(matches(composed, &[decomposed]).unwrap());
        assert!(matches(decomposed, &[composed]).unwrap());
        assert!(matches(decomposed, &["ma\u{f1}*"]).unwrap());
    }

    #[test]
    fn filter_excludes_unless_included() {
        let f = PathFilter::new(&["*.tmp"], &[]).unwrap();
        assert!(f.must_filter("a.tmp"));
        assert!(!f.must_filter("a.txt"));

        let f = PathFilter::new(&["*.tmp"], &["keep.tmp"]).unwrap();
        assert!(f.must_filter("a.tmp"));
        assert!(!f.must_filter("keep.tmp"));
        assert!(f.is_included("keep.tmp"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(PathMatcher::new(&["[unclosed"]).is_err());
    }
}
