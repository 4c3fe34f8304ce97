use std::path::Path;

use globset::Glob;
use minijinja::{
    value::{Kwargs, Rest, ValueKind},
    AutoEscape, Environment, State, Value,
};

use crate::error::Result;
use crate::extensions::{is_html_name, TEMPLATE_MARKER};
use crate::path::RelPath;

pub const INDEX_PAGE: &str = "_index.html";
pub const INDEX_TEXT: &str = "_index.txt";
pub const NOT_FOUND_PAGE: &str = "_notfound.html";

/// the templates used when the project doesn't bring its own
fn builtin(name: &str) -> Option<&'static str> {
    match name {
        INDEX_PAGE => Some(include_str!("../templates/_index.html")),
        INDEX_TEXT => Some(include_str!("../templates/_index.txt")),
        NOT_FOUND_PAGE => Some(include_str!("../templates/_notfound.html")),
        _ => None,
    }
}

fn auto_escape(name: &str) -> AutoEscape {
    let name = name.strip_suffix(TEMPLATE_MARKER).unwrap_or(name);
    if is_html_name(name) {
        AutoEscape::Html
    } else {
        AutoEscape::None
    }
}

fn strip_index(path: &str) -> &str {
    let path = path.trim_matches('/');
    path.strip_suffix("index.html")
        .unwrap_or(path)
        .trim_matches('/')
}

fn current_path(state: &State) -> String {
    state
        .lookup("request")
        .and_then(|r| r.get_attr("path").ok())
        .and_then(|p| p.as_str().map(String::from))
        .unwrap_or_default()
}

/// urls given one by one or as a single list
fn flatten(values: &[Value]) -> std::result::Result<Vec<String>, minijinja::Error> {
    let mut urls = Vec::new();
    for value in values {
        if value.kind() == ValueKind::Seq {
            for item in value.try_iter()? {
                urls.push(item.to_string());
            }
        } else {
            urls.push(value.to_string());
        }
    }
    Ok(urls)
}

/// whether the page at `current` is one of `patterns`, relative patterns
/// start from the page's own folder
fn is_active(current: &str, patterns: &[String], partial: bool) -> bool {
    let folder = current.rfind('/').map(|idx| &current[..idx]).unwrap_or_default();
    let current = strip_index(current);
    patterns.iter().any(|pattern| {
        let pattern = if pattern.starts_with('/') {
            pattern.clone()
        } else {
            format!("{folder}/{pattern}")
        };
        let pattern = strip_index(&pattern);
        let matched = match Glob::new(pattern) {
            Ok(glob) => glob.compile_matcher().is_match(current),
            Err(_) => pattern == current,
        };
        matched || (partial && current.starts_with(pattern))
    })
}

/// `class="{{ active('/blog/*', partial=true) }}"`
///
/// returns the class name when the page being rendered matches any of the
/// patterns, an empty string otherwise
fn active(state: &State, patterns: Rest<Value>, kwargs: Kwargs) -> std::result::Result<String, minijinja::Error> {
    let partial: Option<bool> = kwargs.get("partial")?;
    let class_name: Option<String> = kwargs.get("class_name")?;
    kwargs.assert_all_used()?;

    let patterns = flatten(&patterns)?;
    Ok(if is_active(&current_path(state), &patterns, partial.unwrap_or(false)) {
        class_name.unwrap_or_else(|| "active".into())
    } else {
        String::new()
    })
}

fn quote_attr(value: &str) -> String {
    let escaped = value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;");
    format!("\"{escaped}\"")
}

/// `class="a" data-id="1" id="x" checked`: sorted, `_` written as `-`,
/// `true` values as bare properties and `false`/`none` left out
fn html_attrs(classes: &str, attrs: Vec<(String, Value)>) -> String {
    let mut pairs = Vec::new();
    let mut props = Vec::new();
    if !classes.is_empty() {
        pairs.push(format!("class={}", quote_attr(classes)));
    }
    for (key, value) in attrs {
        let key = key.replace('_', "-");
        match value.kind() {
            ValueKind::Bool if value.is_true() => props.push(key),
            ValueKind::Bool | ValueKind::None | ValueKind::Undefined => {}
            _ => pairs.push(format!("{key}={}", quote_attr(&value.to_string()))),
        }
    }
    pairs.sort();
    props.sort();
    pairs.extend(props);
    pairs.join(" ")
}

/// `{{ link_to('Blog', '/blog/', wrapper='li', partial=true) }}`
///
/// an anchor that gets the `active` class on the pages it points to; with a
/// list of urls the first one is the link and all of them are matched. With a
/// `wrapper` the class and attributes go on the wrapping element
fn link_to(
    state: &State,
    text: String,
    url: Option<Value>,
    kwargs: Kwargs,
) -> std::result::Result<Value, minijinja::Error> {
    let urls = match &url {
        Some(url) => flatten(std::slice::from_ref(url))?,
        None => Vec::new(),
    };
    let href = urls.first().cloned().unwrap_or_else(|| "/".into());
    let wrapper: Option<String> = kwargs.get("wrapper")?;
    let partial: Option<bool> = kwargs.get("partial")?;
    let classes: Option<String> = kwargs.get("classes")?;

    let mut classes = classes.unwrap_or_default().trim().to_string();
    if is_active(&current_path(state), &urls, partial.unwrap_or(false)) {
        if !classes.is_empty() {
            classes.push(' ');
        }
        classes.push_str("active");
    }
    let keys: Vec<String> = kwargs
        .args()
        .filter(|key| !matches!(*key, "wrapper" | "partial" | "classes"))
        .map(String::from)
        .collect();
    let mut attrs = Vec::with_capacity(keys.len());
    for key in keys {
        let value: Value = kwargs.get(&key)?;
        attrs.push((key, value));
    }
    let attrs = html_attrs(&classes, attrs);
    let attrs = if attrs.is_empty() { attrs } else { format!(" {attrs}") };

    let html = match wrapper {
        Some(wrapper) => {
            let wrapper = wrapper.to_lowercase();
            format!("<{wrapper}{attrs}><a href=\"{href}\">{text}</a></{wrapper}>")
        }
        None => format!("<a href=\"{href}\"{attrs}>{text}</a>"),
    };
    Ok(Value::from_safe_string(html))
}

fn now(format: Option<String>) -> String {
    let format = format.unwrap_or_else(|| "%Y-%m-%d %H:%M:%S".into());
    chrono::Local::now().format(&format).to_string()
}

/// the template engine over the source directory
///
/// templates are cached for the lifetime of the renderer, the dev server
/// makes a fresh one for every request
pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    pub fn new<T: AsRef<Path>>(source_dir: T) -> Self {
        let mut env = Environment::new();
        let fs_loader = minijinja::path_loader(source_dir.as_ref());
        env.set_loader(move |name| match fs_loader(name)? {
            Some(source) => Ok(Some(source)),
            None => Ok(builtin(name).map(String::from)),
        });
        env.set_auto_escape_callback(auto_escape);
        env.add_function("active", active);
        env.add_function("link_to", link_to);
        env.add_function("now", now);
        Self { env }
    }

    /// the request data templates see, `request.path` is the page being rendered
    pub fn context(settings_context: Value, path: &RelPath) -> Value {
        let request = minijinja::context! { path => Value::from_safe_string(path.to_string()) };
        minijinja::context! { request => request, ..settings_context }
    }

    /// render the page at `path` from its `source`, read once by the caller
    pub fn render(&self, path: &RelPath, source: &str, ctx: Value) -> Result<String> {
        self.render_str(path.as_str(), source, ctx)
    }

    pub fn render_name(&self, name: &str, ctx: Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }

    /// render a template that only exists in memory, it may still extend or
    /// include templates from the source directory
    pub fn render_str(&self, name: &str, source: &str, ctx: Value) -> Result<String> {
        Ok(self.env.render_named_str(name, source, ctx)?)
    }
}
