use pulldown_cmark::{
    Event::{End, Start, Text},
    Options, Parser, Tag, TagEnd, TextMergeStream,
};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::Result;
use crate::metadata::Metadata;

/// a markdown page, both the front matter and the converted contents
#[derive(Debug)]
pub struct Document {
    pub metadata: Metadata,
    pub contents: String,
}

pub fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options
}

fn first_title(text: &str) -> Option<String> {
    static RX_FIRST_TITLE: OnceLock<Regex> = OnceLock::new();
    let rx = RX_FIRST_TITLE.get_or_init(|| Regex::new(r"(?m)^\s*#\s+(.+?)\s*#*\s*$").unwrap());
    rx.captures(text).map(|c| c[1].to_string())
}

impl Document {
    pub fn parse(text: &str) -> Result<Self> {
        let parser = Parser::new_ext(text, options());
        let mut iterator = TextMergeStream::new(parser).peekable();

        let mut metadata = Metadata::default();
        if let Some(Start(Tag::MetadataBlock(_))) = iterator.peek() {
            iterator.next();
            if let Some(Text(yaml)) = iterator.peek() {
                if !yaml.trim().is_empty() {
                    metadata = serde_yml::from_str(yaml)?;
                }
                iterator.next();
            }
            if let Some(End(TagEnd::MetadataBlock(_))) = iterator.peek() {
                iterator.next();
            }
        }
        if metadata.title.is_none() {
            metadata.title = first_title(text);
        }

        let mut contents = String::new();
        pulldown_cmark::html::push_html(&mut contents, iterator);

        Ok(Self { metadata, contents })
    }

    /// the jinja source the page is rendered from
    ///
    /// with a `template` the page extends `theme_prefix + template` and fills
    /// its `title` and `content` blocks, every other scalar key becoming a
    /// block of its own. Without one, keys become variables set before the
    /// html.
    pub fn to_template(&self, theme_prefix: &str) -> String {
        let mut out = String::new();
        match &self.metadata.template {
            Some(template) => {
                out.push_str(&format!(
                    "{{% extends \"{theme_prefix}{template}\" %}}\n"
                ));
                if let Some(title) = &self.metadata.title {
                    out.push_str(&format!("{{% block title %}}{title}{{% endblock %}}\n"));
                }
                for (key, value) in self.metadata.scalars() {
                    if key == "content" || key == "title" {
                        continue;
                    }
                    out.push_str(&format!(
                        "{{% block {key} %}}{}{{% endblock %}}\n",
                        value.as_text()
                    ));
                }
                out.push_str("{% block content %}");
                out.push_str(&self.contents);
                out.push_str("{% endblock %}\n");
            }
            None => {
                if let Some(title) = &self.metadata.title {
                    let title = crate::metadata::Scalar::Text(title.clone());
                    out.push_str(&format!("{{% set title = {} %}}", title.as_expression()));
                }
                for (key, value) in self.metadata.scalars() {
                    out.push_str(&format!("{{% set {key} = {} %}}", value.as_expression()));
                }
                out.push_str(&self.contents);
            }
        }
        out
    }
}
