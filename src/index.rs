use std::{fs, path::Path};

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::extensions::is_html_name;
use crate::matcher::PathFilter;
use crate::path::RelPath;
use crate::templates::INDEX_PAGE;

/// how much of a page is looked at to tell a document from a fragment
const FRAGMENT_PROBE: usize = 500;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// a page listed in `_index.html`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    /// where the page is in the build
    pub path: RelPath,
    pub source: RelPath,
    pub label: String,
    pub modified_at: NaiveDateTime,
}

/// what the index templates get for each page
#[derive(Debug, Serialize)]
pub struct EntryContext<'a> {
    path: &'a str,
    source: &'a str,
    label: &'a str,
    modified: String,
}

impl PageEntry {
    pub fn new(path: RelPath, source: RelPath, modified_at: NaiveDateTime) -> Self {
        let label = path.segments().collect::<Vec<_>>().join(" / ");
        Self {
            path,
            source,
            label,
            modified_at,
        }
    }

    pub fn context(&self) -> EntryContext<'_> {
        EntryContext {
            path: self.path.as_str(),
            source: self.source.as_str(),
            label: &self.label,
            modified: self.modified_at.format(DATE_FORMAT).to_string(),
        }
    }
}

/// the modification time of `path` on the local clock
///
/// the filesystem gives an instant, it is shifted to the local offset once
pub fn local_mtime<T: AsRef<Path>>(path: T) -> Result<NaiveDateTime> {
    let path = path.as_ref();
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(Error::with_path(path))?;
    let utc: DateTime<Utc> = modified.into();
    Ok(utc.with_timezone(&Local).naive_local())
}

/// a page without `<!doctype` or `<html>` at its start, meant to be included
pub fn is_html_fragment(content: &str) -> bool {
    let probe: String = content.chars().take(FRAGMENT_PROBE).collect();
    let probe = probe.trim_start().to_lowercase();
    !(probe.starts_with("<!doctype") || probe.starts_with("<html"))
}

/// decides which files are built and listed
///
/// `include` always wins, then `exclude`, then the fragment check when
/// `filter_partials` is set. Patterns are tried on both the source and the
/// output name of a file.
#[derive(Debug, Clone, Default)]
pub struct Qualifier {
    filter: PathFilter,
    filter_partials: bool,
}

impl Qualifier {
    pub fn new(filter: PathFilter, filter_partials: bool) -> Self {
        Self {
            filter,
            filter_partials,
        }
    }

    pub fn is_included(&self, source: &RelPath, output: &RelPath) -> bool {
        self.filter.is_included(source.as_str()) || self.filter.is_included(output.as_str())
    }

    /// excluded by the patterns alone, without looking at the content
    pub fn is_excluded(&self, source: &RelPath, output: &RelPath) -> bool {
        !self.is_included(source, output)
            && (self.filter.must_filter(source.as_str()) || self.filter.must_filter(output.as_str()))
    }

    /// rendered html dropped because it's a fragment
    pub fn is_dropped_fragment(&self, source: &RelPath, output: &RelPath, html: &str) -> bool {
        self.filter_partials
            && is_html_name(output.file_name())
            && !self.is_included(source, output)
            && is_html_fragment(html)
    }

    /// an html page that could be listed, the content not considered
    pub fn is_page(&self, source: &RelPath, output: &RelPath) -> bool {
        output.as_str() != INDEX_PAGE
            && is_html_name(output.file_name())
            && !self.is_excluded(source, output)
    }

    /// whether a built page belongs in the index
    pub fn is_listed(&self, source: &RelPath, output: &RelPath, html: &str) -> bool {
        self.is_page(source, output) && !self.is_dropped_fragment(source, output, html)
    }
}

/// collects the pages of one build, dropped afterwards
#[derive(Debug, Default)]
pub struct PageIndex {
    entries: Vec<PageEntry>,
}

impl PageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: PageEntry) {
        self.entries.push(entry);
    }

    /// shallow pages first, then by path
    pub fn finish(mut self) -> Vec<PageEntry> {
        self.entries
            .sort_by(|a, b| (a.path.depth(), &a.path).cmp(&(b.path.depth(), &b.path)));
        self.entries
    }
}
