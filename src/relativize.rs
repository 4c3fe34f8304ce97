use regex::{Captures, Regex};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use crate::path::RelPath;

/// `src`, `href` or `data-*` attributes whose value starts with a single `/`
fn rx_abs_url() -> &'static Regex {
    static RX_ABS_URL: OnceLock<Regex> = OnceLock::new();
    RX_ABS_URL.get_or_init(|| {
        Regex::new(
            r#"(?i)(\s)(src|href|data-[a-z0-9_-]+)(\s*=\s*)(?:"(/(?:[^/"][^"]*)?)"|'(/(?:[^/'][^']*)?)')"#,
        )
        .unwrap()
    })
}

/// rewrites root-relative urls so a built page works from any sub-path or
/// straight from `file://`
#[derive(Debug, Clone)]
pub struct UrlRelativizer {
    source_root: PathBuf,
}

impl UrlRelativizer {
    pub fn new<T: AsRef<Path>>(source_root: T) -> Self {
        Self {
            source_root: source_root.as_ref().to_path_buf(),
        }
    }

    fn is_source_dir(&self, path: &str) -> bool {
        let decoded = urlencoding::decode(path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| path.to_string());
        RelPath::new(decoded)
            .map(|rel| !rel.is_empty() && rel.to_path(&self.source_root).is_dir())
            .unwrap_or(false)
    }

    /// `url` (root-relative) as seen from the page at `page`
    pub fn relative_url(&self, page: &RelPath, url: &str) -> String {
        let prefix = "../".repeat(page.depth());
        let stripped = url.strip_prefix('/').unwrap_or(url);
        let split = stripped.find(['?', '#']).unwrap_or(stripped.len());
        let (path, suffix) = stripped.split_at(split);

        if path.is_empty() {
            return format!("{prefix}index.html{suffix}");
        }
        if path.ends_with('/') || self.is_source_dir(path) {
            let dir = path.trim_end_matches('/');
            return format!("{prefix}{dir}/index.html{suffix}");
        }
        format!("{prefix}{path}{suffix}")
    }

    /// rewrite every root-relative url of the page at `page`
    ///
    /// all the matches are found first and the output is built once, values
    /// that don't start with `/` are never touched
    pub fn relativize(&self, html: &str, page: &RelPath) -> String {
        rx_abs_url()
            .replace_all(html, |caps: &Captures| {
                let (quote, url) = match (caps.get(4), caps.get(5)) {
                    (Some(url), _) => ('"', url.as_str()),
                    (None, Some(url)) => ('\'', url.as_str()),
                    (None, None) => return caps[0].to_string(),
                };
                format!(
                    "{}{}{}{quote}{}{quote}",
                    &caps[1],
                    &caps[2],
                    &caps[3],
                    self.relative_url(page, url)
                )
            })
            .into_owned()
    }
}

/// a file whose name changed in the build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFileRecord {
    pub source: RelPath,
    pub output: RelPath,
}

/// retargets `src`/`href` references to processed files
///
/// a page written as `<link href="css/style.scss">` ends up with
/// `<link href="css/style.css">`, query strings and fragments preserved
#[derive(Debug, Clone, Default)]
pub struct ProcessedNames {
    names: HashMap<String, String>,
    rx: Option<Regex>,
}

impl ProcessedNames {
    pub fn new(records: &[ProcessedFileRecord]) -> Self {
        let mut names = HashMap::new();
        for record in records {
            let old = record.source.file_name();
            let new = record.output.file_name();
            if old != new {
                names
                    .entry(old.to_string())
                    .or_insert_with(|| new.to_string());
            }
        }
        if names.is_empty() {
            return Self::default();
        }
        let mut alternatives: Vec<&String> = names.keys().collect();
        alternatives.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let alternatives: Vec<String> = alternatives.iter().map(|n| regex::escape(n)).collect();
        let rx = Regex::new(&format!(
            r#"(\s(?i:src|href)\s*=\s*)(["'])((?:[^"'/]*?(?:/|&#[xX]2[fF];))*)({})((?:[?#][^"']*)?)(["'])"#,
            alternatives.join("|")
        ))
        .ok();
        Self { names, rx }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn apply(&self, html: &str) -> String {
        let Some(rx) = &self.rx else {
            return html.to_string();
        };
        rx.replace_all(html, |caps: &Captures| {
            // autoescaped values write `/` as `&#x2f;`
            let dirs = caps[3].replace("&#x2f;", "/").replace("&#x2F;", "/");
            let external = dirs.starts_with("//") || dirs.contains("://");
            let dirs = &caps[3];
            if caps[2] != caps[6] || external {
                return caps[0].to_string();
            }
            match self.names.get(&caps[4]) {
                Some(new) => format!(
                    "{}{}{dirs}{new}{}{}",
                    &caps[1], &caps[2], &caps[5], &caps[6]
                ),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
    }
}
