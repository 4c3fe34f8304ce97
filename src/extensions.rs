use crate::path::RelPath;
use crate::processors::ProcessorRegistry;

/// marks any text file as a template, removed from the output name
pub const TEMPLATE_MARKER: &str = ".tmpl";
/// outputs with these extensions are html pages
pub const HTML_EXTENSIONS: &[&str] = &[".html", ".htm"];

#[derive(Debug, Clone)]
struct Mapping {
    input: String,
    output: String,
    processor: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub output: RelPath,
    /// name of the pre-processor converting the file
    pub processor: Option<String>,
    /// rendered by the template engine before anything else
    pub is_template: bool,
}

impl Translation {
    pub fn is_html(&self) -> bool {
        is_html_name(self.output.file_name())
    }

    pub fn is_renamed(&self, source: &RelPath) -> bool {
        &self.output != source
    }
}

pub fn is_html_name(name: &str) -> bool {
    let name = name.to_lowercase();
    HTML_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

#[derive(Debug, Clone, Default)]
pub struct ExtensionTranslator {
    /// longest input extension first, so `.css.scss` wins over `.scss`
    table: Vec<Mapping>,
}

impl ExtensionTranslator {
    pub fn new(registry: &ProcessorRegistry) -> Self {
        let mut table: Vec<Mapping> = registry
            .processors()
            .flat_map(|p| {
                p.input_extensions().iter().map(move |ext| Mapping {
                    input: ext.to_string(),
                    output: p.output_extension().to_string(),
                    processor: p.name().to_string(),
                })
            })
            .collect();
        table.sort_by(|a, b| b.input.len().cmp(&a.input.len()));
        Self { table }
    }

    fn lookup(&self, name: &str) -> Option<&Mapping> {
        // the extension must leave a non empty stem: `.scss` alone is a dotfile
        self.table
            .iter()
            .find(|m| name.len() > m.input.len() && name.ends_with(&m.input))
    }

    pub fn translate(&self, path: &RelPath) -> Translation {
        let mut name = path.file_name();
        let mut is_template = false;
        if let Some(stripped) = name.strip_suffix(TEMPLATE_MARKER) {
            if !stripped.is_empty() {
                name = stripped;
                is_template = true;
            }
        }
        let (name, processor) = match self.lookup(name) {
            Some(m) => (
                format!("{}{}", &name[..name.len() - m.input.len()], m.output),
                Some(m.processor.clone()),
            ),
            None => {
                is_template = is_template || is_html_name(name);
                (name.to_string(), None)
            }
        };
        Translation {
            output: path.with_file_name(&name),
            processor,
            is_template,
        }
    }

    /// the extension the file has in the build, with its leading dot
    pub fn output_extension(&self, path: &RelPath) -> String {
        let translation = self.translate(path);
        let name = translation.output.file_name();
        name.rfind('.')
            .map(|idx| name[idx..].to_string())
            .unwrap_or_default()
    }

    /// source files that would be built as `output`, most specific first
    pub fn sources_for(&self, output: &RelPath) -> Vec<RelPath> {
        let name = output.file_name();
        let mut candidates = Vec::new();
        for m in &self.table {
            if let Some(stem) = name.strip_suffix(&m.output) {
                if !stem.is_empty() {
                    candidates.push(format!("{stem}{}", m.input));
                }
            }
        }
        let mut all: Vec<String> = candidates
            .iter()
            .map(|c| format!("{c}{TEMPLATE_MARKER}"))
            .collect();
        all.insert(0, format!("{name}{TEMPLATE_MARKER}"));
        all.extend(candidates);
        all.iter().map(|n| output.with_file_name(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::{testing::Shout, Markdown};

    fn translator() -> ExtensionTranslator {
        let registry = ProcessorRegistry::default()
            .with(Box::new(Shout))
            .with(Box::new(Markdown));
        ExtensionTranslator::new(&registry)
    }

    fn out(t: &ExtensionTranslator, path: &str) -> String {
        t.translate(&RelPath::new(path).unwrap()).output.to_string()
    }

    #[test]
    fn processed_extensions() {
        let t = translator();
        assert_eq!(out(&t, "css/style.scss"), "css/style.css");
        assert_eq!(out(&t, "css/style.css.scss"), "css/style.css");
        assert_eq!(out(&t, "notes.html.md"), "notes.html");
        assert_eq!(out(&t, "notes.md"), "notes.html");
        let translation = t.translate(&RelPath::new("style.scss").unwrap());
        assert_eq!(translation.processor.as_deref(), Some("scss"));
        assert!(!translation.is_template);
    }

    #[test]
    fn pass_through() {
        let t = translator();
        assert_eq!(out(&t, "img/logo.png"), "img/logo.png");
        assert_eq!(out(&t, "main.less"), "main.less");
        let translation = t.translate(&RelPath::new("logo.png").unwrap());
        assert_eq!(translation.processor, None);
        assert!(!translation.is_template);
        assert!(t.translate(&RelPath::new("a/index.html").unwrap()).is_template);
    }

    #[test]
    fn template_marker_is_stripped_once() {
        let t = translator();
        assert_eq!(out(&t, "test.txt.tmpl"), "test.txt");
        assert_eq!(out(&t, "main.css.tmpl"), "main.css");
        assert_eq!(out(&t, "a.tmpl.tmpl"), "a.tmpl");
        assert_eq!(out(&t, "theme.scss.tmpl"), "theme.css");
        assert!(t.translate(&RelPath::new("test.txt.tmpl").unwrap()).is_template);
    }

    #[test]
    fn extension_only_names_are_kept() {
        let t = translator();
        assert_eq!(out(&t, "x/.scss"), "x/.scss");
    }

    #[test]
    fn output_extension_and_html() {
        let t = translator();
        assert_eq!(t.output_extension(&RelPath::new("page.md").unwrap()), ".html");
        assert_eq!(t.output_extension(&RelPath::new("README").unwrap()), "");
        assert!(t.translate(&RelPath::new("page.md").unwrap()).is_html());
        assert!(!t.translate(&RelPath::new("style.scss").unwrap()).is_html());
    }

    #[test]
    fn reverse_lookup() {
        let t = translator();
        let sources: Vec<_> = t
            .sources_for(&RelPath::new("css/style.css").unwrap())
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(
            sources,
            [
                "css/style.css.tmpl",
                "css/style.css.scss.tmpl",
                "css/style.scss.tmpl",
                "css/style.css.scss",
                "css/style.scss",
            ]
        );
    }
}
