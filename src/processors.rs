use std::{
    io::Write,
    process::{Command, Stdio},
};

use crate::config::Settings;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::typography::Typography;

pub trait Processor: Send + Sync {
    fn name(&self) -> &str;
    /// longest first is not required, the translator sorts them
    fn input_extensions(&self) -> &[&'static str];
    fn output_extension(&self) -> &str;
    fn is_available(&self) -> bool {
        true
    }
    fn convert(&self, source: &str, settings: &Settings) -> Result<String>;
}

pub trait PostProcessor: Send + Sync {
    fn name(&self) -> &str;
    fn process(&self, html: &str) -> String;
}

/// markdown to html, in process
#[derive(Debug, Default)]
pub struct Markdown;

impl Processor for Markdown {
    fn name(&self) -> &str {
        "markdown"
    }
    fn input_extensions(&self) -> &[&'static str] {
        &[".html.md", ".md", ".markdown"]
    }
    fn output_extension(&self) -> &str {
        ".html"
    }
    fn convert(&self, source: &str, settings: &Settings) -> Result<String> {
        let doc = Document::parse(source)?;
        Ok(doc.to_template(&settings.theme_prefix))
    }
}

/// a converter living in another program, fed through stdin
#[derive(Debug, Clone)]
pub struct External {
    pub name: &'static str,
    pub command: &'static str,
    pub args: &'static [&'static str],
    pub inputs: &'static [&'static str],
    pub output: &'static str,
}

pub const SCSS: External = External {
    name: "scss",
    command: "sass",
    args: &["--stdin", "--no-source-map"],
    inputs: &[".css.scss", ".scss"],
    output: ".css",
};

pub const LESS: External = External {
    name: "less",
    command: "lessc",
    args: &["-"],
    inputs: &[".css.less", ".less"],
    output: ".css",
};

pub const COFFEE: External = External {
    name: "coffee",
    command: "coffee",
    args: &["--stdio", "--compile", "--bare"],
    inputs: &[".js.coffee", ".coffee"],
    output: ".js",
};

impl External {
    fn failure(&self, message: impl Into<String>) -> Error {
        Error::ProcessorError {
            name: self.name.into(),
            message: message.into(),
        }
    }
}

impl Processor for External {
    fn name(&self) -> &str {
        self.name
    }
    fn input_extensions(&self) -> &[&'static str] {
        self.inputs
    }
    fn output_extension(&self) -> &str {
        self.output
    }
    fn is_available(&self) -> bool {
        which::which(self.command).is_ok()
    }
    fn convert(&self, source: &str, _settings: &Settings) -> Result<String> {
        let mut child = Command::new(self.command)
            .args(self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.failure(format!("unable to run `{}`: {e}", self.command)))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .map_err(|e| self.failure(e.to_string()))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| self.failure(e.to_string()))?;
        if !output.status.success() {
            return Err(self.failure(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }
        String::from_utf8(output.stdout).map_err(|e| self.failure(e.to_string()))
    }
}

pub fn builtin_processor(name: &str) -> Option<Box<dyn Processor>> {
    match name {
        "markdown" => Some(Box::new(Markdown)),
        "scss" | "sass" => Some(Box::new(SCSS)),
        "less" => Some(Box::new(LESS)),
        "coffee" | "coffeescript" => Some(Box::new(COFFEE)),
        _ => None,
    }
}

pub fn builtin_post_processor(name: &str) -> Option<Box<dyn PostProcessor>> {
    match name {
        "typography" | "typogrify" => Some(Box::new(Typography)),
        _ => None,
    }
}

/// the processors enabled for one session
#[derive(Default)]
pub struct ProcessorRegistry {
    pre: Vec<Box<dyn Processor>>,
    post: Vec<Box<dyn PostProcessor>>,
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("pre", &self.pre.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("post", &self.post.iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl ProcessorRegistry {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut registry = Self::default();
        for name in &settings.pre_processors {
            match builtin_processor(name) {
                Some(p) if p.is_available() => registry = registry.with(p),
                Some(_) => log::info!("Processor `{name}` is not installed, skipping it"),
                None => log::warn!("Unknown pre-processor `{name}`"),
            }
        }
        for name in &settings.post_processors {
            match builtin_post_processor(name) {
                Some(p) => registry = registry.with_post(p),
                None => log::warn!("Unknown post-processor `{name}`"),
            }
        }
        registry
    }

    pub fn with(mut self, processor: Box<dyn Processor>) -> Self {
        self.pre.push(processor);
        self
    }

    pub fn with_post(mut self, processor: Box<dyn PostProcessor>) -> Self {
        self.post.push(processor);
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Processor> {
        self.pre
            .iter()
            .find(|p| p.name() == name)
            .map(|p| p.as_ref())
    }

    pub fn processors(&self) -> impl Iterator<Item = &dyn Processor> {
        self.pre.iter().map(|p| p.as_ref())
    }

    /// run every post-processor, in the configured order
    pub fn post_process(&self, html: String) -> String {
        self.post.iter().fold(html, |html, p| p.process(&html))
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// stands in for sass: upper-cases the source
    #[derive(Debug)]
    pub struct Shout;

    impl Processor for Shout {
        fn name(&self) -> &str {
            "scss"
        }
        fn input_extensions(&self) -> &[&'static str] {
            &[".css.scss", ".scss"]
        }
        fn output_extension(&self) -> &str {
            ".css"
        }
        fn convert(&self, source: &str, _settings: &Settings) -> Result<String> {
            if source.contains("@error") {
                return Err(Error::ProcessorError {
                    name: "scss".into(),
                    message: "bad input".into(),
                });
            }
            Ok(source.to_uppercase())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_are_ignored() {
        let settings = Settings {
            pre_processors: vec!["markdown".into(), "nope".into()],
            post_processors: vec!["typography".into(), "nada".into()],
            ..Default::default()
        };
        let registry = ProcessorRegistry::from_settings(&settings);
        assert!(registry.get("markdown").is_some());
        assert!(registry.get("nope").is_none());
        assert_eq!(registry.processors().count(), 1);
        assert_eq!(registry.post.len(), 1);
    }

    #[test]
    fn disabled_processors_are_absent() {
        let settings = Settings {
            pre_processors: vec![],
            ..Default::default()
        };
        let registry = ProcessorRegistry::from_settings(&settings);
        assert!(registry.get("markdown").is_none());
    }

    #[test]
    fn markdown_converts_to_template_source() {
        let settings = Settings::default();
        let out = Markdown.convert("# Hi\n", &settings).unwrap();
        assert!(out.contains("<h1>Hi</h1>"));
    }

    #[test]
    fn missing_tool_is_unavailable() {
        let ghost = External {
            name: "ghost",
            command: "surely-not-an-installed-command-4242",
            args: &[],
            inputs: &[".ghost"],
            output: ".txt",
        };
        assert!(!ghost.is_available());
        let err = ghost.convert("x", &Settings::default()).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn post_processors_run_in_order() {
        let registry = ProcessorRegistry::default().with_post(Box::new(Typography));
        assert_eq!(
            registry.post_process("<p>wait...</p>".into()),
            "<p>wait&#8230;</p>"
        );
    }
}
