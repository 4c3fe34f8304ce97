use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};
use crate::index::{PageEntry, PageIndex};
use crate::path::RelPath;
use crate::relativize::{ProcessedFileRecord, ProcessedNames};
use crate::site::{Body, Site};
use crate::templates::{INDEX_PAGE, INDEX_TEXT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    NotStarted,
    Walking,
    Rendering,
    WritingIndex,
    Done,
}

/// what happened to one file of the build folder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    /// the copy in the build folder is newer than the source
    Skipped,
    /// same content as before
    Identical,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Skipped => "skipped",
            Self::Identical => "identical",
        };
        f.pad(s)
    }
}

#[derive(Debug, Default)]
pub struct BuildReport {
    pub files: Vec<(RelPath, Outcome)>,
    /// files that couldn't be written, with the reason
    pub failed: Vec<(RelPath, String)>,
    /// pages written from their source because rendering failed
    pub fell_back: Vec<RelPath>,
    pub index: Vec<PageEntry>,
}

impl BuildReport {
    pub fn outcome(&self, path: &str) -> Option<Outcome> {
        self.files
            .iter()
            .find(|(p, _)| p.as_str() == path)
            .map(|(_, outcome)| *outcome)
    }
}

/// `dest` is missing or older than `source`
fn is_stale(dest: &Path, source: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(dest), modified(source)) {
        (Some(dest), Some(source)) => dest < source,
        _ => true,
    }
}

/// writes the whole site to a build folder
///
/// html pages wait in memory until every rename is known. One build of a
/// given folder at a time
pub struct Builder<'a> {
    site: &'a Site,
    build_dir: PathBuf,
    quiet: bool,
    force: bool,
    state: BuildState,
}

impl<'a> Builder<'a> {
    pub fn new<T: Into<PathBuf>>(site: &'a Site, build_dir: T) -> Self {
        Self {
            site,
            build_dir: build_dir.into(),
            quiet: false,
            force: site.settings().force,
            state: BuildState::NotStarted,
        }
    }

    /// don't report every file
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// copy static files even when the build folder has a newer copy
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    fn advance(&mut self, next: BuildState) {
        log::debug!("Build {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn report(&self, report: &mut BuildReport, path: &RelPath, outcome: Outcome) {
        if !self.quiet {
            log::info!("{outcome:>9}  {path}");
        }
        report.files.push((path.clone(), outcome));
    }

    fn fail(&self, report: &mut BuildReport, path: &RelPath, err: Error) {
        log::error!("Unable to build `{path}`: {err}");
        report.failed.push((path.clone(), err.to_string()));
    }

    fn destination(&self, output: &RelPath) -> Result<PathBuf> {
        let dest = output.to_path(&self.build_dir);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(Error::with_path(parent))?;
        }
        Ok(dest)
    }

    /// copy-if-newer, unless forced
    fn copy(&self, output: &RelPath, from: &Path) -> Result<Outcome> {
        let dest = self.destination(output)?;
        let outcome = if !dest.exists() {
            Outcome::Created
        } else if self.force || is_stale(&dest, from) {
            Outcome::Updated
        } else {
            return Ok(Outcome::Skipped);
        };
        fs::copy(from, &dest).map_err(Error::with_path(&dest))?;
        Ok(outcome)
    }

    fn write(&self, output: &RelPath, content: &str) -> Result<Outcome> {
        let dest = self.destination(output)?;
        let outcome = match fs::read(&dest) {
            Ok(existing) if existing == content.as_bytes() => return Ok(Outcome::Identical),
            Ok(_) => Outcome::Updated,
            Err(_) => Outcome::Created,
        };
        fs::write(&dest, content).map_err(Error::with_path(&dest))?;
        Ok(outcome)
    }

    fn record(&self, report: &mut BuildReport, output: &RelPath, result: Result<Outcome>) {
        match result {
            Ok(outcome) => self.report(report, output, outcome),
            Err(err) => self.fail(report, output, err),
        }
    }

    pub fn run(mut self) -> Result<BuildReport> {
        fs::create_dir_all(&self.build_dir).map_err(|source| Error::BuildRootError {
            path: self.build_dir.clone(),
            source,
        })?;
        let site = self.site;
        let mut report = BuildReport::default();

        self.advance(BuildState::Walking);
        let files = site.files()?;
        log::debug!("Found {} files in `{}`", files.len(), site.source_dir().display());

        self.advance(BuildState::Rendering);
        let renderer = site.renderer();
        let mut index = PageIndex::new();
        let mut records = Vec::new();
        let mut pages = Vec::new();
        for path in &files {
            let processed = match site.process(&renderer, path) {
                Ok(Some(processed)) => processed,
                Ok(None) => continue,
                Err(err) => {
                    self.fail(&mut report, path, err);
                    continue;
                }
            };
            match site.index_entry(&processed) {
                Ok(Some(entry)) => index.record(entry),
                Ok(None) => {}
                Err(err) => log::warn!("Leaving `{path}` out of the index: {err}"),
            }
            if processed.is_renamed() {
                records.push(ProcessedFileRecord {
                    source: processed.source.clone(),
                    output: processed.output.clone(),
                });
            }
            if processed.fell_back {
                report.fell_back.push(path.clone());
            }
            let is_html = processed.is_html();
            match processed.body {
                Body::File(from) => {
                    let result = self.copy(&processed.output, &from);
                    self.record(&mut report, &processed.output, result);
                }
                // the source of a broken page is written untouched
                Body::Text(text) if is_html && !processed.fell_back => {
                    pages.push((processed.output, text));
                }
                Body::Text(text) => {
                    let result = self.write(&processed.output, &text);
                    self.record(&mut report, &processed.output, result);
                }
            }
        }

        let names = ProcessedNames::new(&records);
        let relativizer = site.relativizer();
        for (output, html) in pages {
            let html = names.apply(&relativizer.relativize(&html, &output));
            let result = self.write(&output, &html);
            self.record(&mut report, &output, result);
        }

        self.advance(BuildState::WritingIndex);
        let entries = index.finish();
        for name in [INDEX_PAGE, INDEX_TEXT] {
            let output = RelPath::new(name)?;
            let result = site
                .render_index(&renderer, name, &entries)
                .and_then(|content| self.write(&output, &content));
            self.record(&mut report, &output, result);
        }
        report.index = entries;

        self.advance(BuildState::Done);
        Ok(report)
    }
}
