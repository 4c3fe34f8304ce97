use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use minijinja::{context, Value};

use crate::config::{Overrides, Settings, SOURCE_DIR};
use crate::error::{Error, Result};
use crate::extensions::{is_html_name, ExtensionTranslator, Translation};
use crate::index::{local_mtime, PageEntry, PageIndex, Qualifier};
use crate::matcher::PathFilter;
use crate::path::RelPath;
use crate::processors::ProcessorRegistry;
use crate::relativize::UrlRelativizer;
use crate::templates::Renderer;
use crate::tree::{walk, DEFAULT_IGNORE};

#[derive(Debug, Default, Clone)]
pub struct SiteOptions {
    /// the source folder, relative to the project root, `source` by default
    pub source: Option<PathBuf>,
    pub overrides: Overrides,
}

/// what ends up in the build for one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    /// copied as is from this path
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Processed {
    pub source: RelPath,
    pub output: RelPath,
    pub body: Body,
    /// rendering failed, the body is the source text untouched
    pub fell_back: bool,
}

impl Processed {
    pub fn is_html(&self) -> bool {
        is_html_name(self.output.file_name())
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            Body::Text(text) => Some(text),
            Body::File(_) => None,
        }
    }

    pub fn is_renamed(&self) -> bool {
        self.source != self.output
    }
}

#[derive(Debug)]
pub struct Site {
    root: PathBuf,
    source: PathBuf,
    settings: Settings,
    registry: ProcessorRegistry,
    translator: ExtensionTranslator,
    qualifier: Qualifier,
    relativizer: UrlRelativizer,
}

impl Site {
    pub fn open<T: AsRef<Path>>(project_root: T, options: SiteOptions) -> Result<Self> {
        let root = project_root.as_ref();
        let settings = Settings::load(root, &options.overrides);
        let registry = ProcessorRegistry::from_settings(&settings);
        Self::with_registry(root, options, settings, registry)
    }

    /// open with processors chosen by the caller instead of the settings
    pub fn with_registry<T: AsRef<Path>>(
        project_root: T,
        options: SiteOptions,
        settings: Settings,
        registry: ProcessorRegistry,
    ) -> Result<Self> {
        let root = project_root.as_ref().to_path_buf();
        let source = root.join(options.source.unwrap_or_else(|| SOURCE_DIR.into()));
        if !source.is_dir() {
            return Err(Error::SourceNotFound(source));
        }
        let filter = PathFilter::new(&settings.exclude, &settings.include).unwrap_or_else(|err| {
            log::warn!("Ignoring the exclude and include settings: {err}");
            PathFilter::default()
        });
        let qualifier = Qualifier::new(filter, settings.filter_partials);
        let translator = ExtensionTranslator::new(&registry);
        let relativizer = UrlRelativizer::new(&source);
        log::debug!("Opened site at `{}` with {registry:?}", root.display());
        Ok(Self {
            root,
            source,
            settings,
            registry,
            translator,
            qualifier,
            relativizer,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_dir(&self) -> &Path {
        &self.source
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn translator(&self) -> &ExtensionTranslator {
        &self.translator
    }

    pub fn qualifier(&self) -> &Qualifier {
        &self.qualifier
    }

    pub fn relativizer(&self) -> &UrlRelativizer {
        &self.relativizer
    }

    /// a template engine reading the current state of the source folder
    pub fn renderer(&self) -> Renderer {
        Renderer::new(&self.source)
    }

    pub fn files(&self) -> Result<Vec<RelPath>> {
        walk(&self.source, DEFAULT_IGNORE)
    }

    fn context(&self, output: &RelPath) -> Value {
        Renderer::context(self.settings.template_context(), output)
    }

    /// render, convert and polish one file, whatever the filters say
    ///
    /// `None` when the file has vanished from the source folder
    pub fn render(&self, renderer: &Renderer, path: &RelPath) -> Result<Option<Processed>> {
        let translation = self.translator.translate(path);
        let full = path.to_path(&self.source);
        let processed = |body, fell_back| Processed {
            source: path.clone(),
            output: translation.output.clone(),
            body,
            fell_back,
        };

        if !translation.is_template && translation.processor.is_none() {
            if !full.is_file() {
                return Ok(None);
            }
            return Ok(Some(processed(Body::File(full), false)));
        }

        let raw = match fs::read(&full) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(Error::with_path(&full)(err)),
        };
        let text = match String::from_utf8(raw) {
            Ok(text) => text,
            Err(_) => {
                log::debug!("`{path}` isn't text, copying it");
                return Ok(Some(processed(Body::File(full), false)));
            }
        };

        match self.transform(renderer, path, &translation, &text) {
            Ok(body) => Ok(Some(processed(Body::Text(body), false))),
            // not found here means a missing include or layout
            Err(err) if err.is_recoverable() || matches!(err, Error::TemplateNotFound(_)) => {
                log::warn!("Unable to build `{path}`, using its source as is: {err}");
                Ok(Some(processed(Body::Text(text), true)))
            }
            Err(err) => Err(err),
        }
    }

    fn transform(
        &self,
        renderer: &Renderer,
        path: &RelPath,
        translation: &Translation,
        text: &str,
    ) -> Result<String> {
        let ctx = self.context(&translation.output);
        // the text already read is rendered, the loader only serves includes
        let mut content = if translation.is_template {
            renderer.render(path, text, ctx.clone())?
        } else {
            text.to_string()
        };
        if let Some(processor) = translation
            .processor
            .as_deref()
            .and_then(|name| self.registry.get(name))
        {
            content = processor.convert(&content, &self.settings)?;
            // markdown gives a template, layouts are applied here
            if translation.is_html() {
                content = renderer.render_str(translation.output.as_str(), &content, ctx)?;
            }
        }
        if translation.is_html() {
            content = self.registry.post_process(content);
        }
        Ok(content)
    }

    /// [`Site::render`] with the exclude, include and fragment filters applied
    ///
    /// `None` when the file doesn't belong in the build
    pub fn process(&self, renderer: &Renderer, path: &RelPath) -> Result<Option<Processed>> {
        let output = self.translator.translate(path).output;
        if self.qualifier.is_excluded(path, &output) {
            log::debug!("`{path}` is excluded");
            return Ok(None);
        }
        let Some(processed) = self.render(renderer, path)? else {
            return Ok(None);
        };
        let dropped = match &processed.body {
            Body::Text(text) if !processed.fell_back => {
                self.qualifier.is_dropped_fragment(path, &output, text)
            }
            _ => false,
        };
        if dropped {
            log::debug!("`{path}` is a fragment, leaving it out");
            return Ok(None);
        }
        Ok(Some(processed))
    }

    /// the index entry of a processed file, if it's a listed page
    pub fn index_entry(&self, processed: &Processed) -> Result<Option<PageEntry>> {
        let (source, output) = (&processed.source, &processed.output);
        let listed = match &processed.body {
            Body::Text(text) if !processed.fell_back => self.qualifier.is_listed(source, output, text),
            _ => self.qualifier.is_page(source, output),
        };
        if !listed {
            return Ok(None);
        }
        let modified_at = local_mtime(source.to_path(&self.source))?;
        Ok(Some(PageEntry::new(output.clone(), source.clone(), modified_at)))
    }

    /// every listed page, built in memory
    pub fn pages_index(&self, renderer: &Renderer) -> Result<Vec<PageEntry>> {
        let mut index = PageIndex::new();
        for path in self.files()? {
            if !self.translator.translate(&path).is_html() {
                continue;
            }
            let Some(processed) = self.process(renderer, &path)? else {
                continue;
            };
            if let Some(entry) = self.index_entry(&processed)? {
                index.record(entry);
            }
        }
        Ok(index.finish())
    }

    /// `_index.html` or `_index.txt` listing `entries`
    pub fn render_index(&self, renderer: &Renderer, name: &str, entries: &[PageEntry]) -> Result<String> {
        let index: Vec<_> = entries.iter().map(|e| e.context()).collect();
        let ctx = context! { index => index, ..self.context(&RelPath::new(name)?) };
        renderer.render_name(name, ctx)
    }
}
