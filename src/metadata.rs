use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// the front matter of a markdown page
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    /// layout to extend, relative to the theme prefix
    pub template: Option<String>,
    // everything else, exposed to the layout as blocks or variables
    #[serde(flatten)]
    pub meta: BTreeMap<String, serde_yml::Value>,
}

impl Metadata {
    /// scalar entries whose key can be used as a jinja name
    pub fn scalars(&self) -> impl Iterator<Item = (&str, Scalar)> {
        self.meta.iter().filter_map(|(key, value)| {
            if !is_identifier(key) {
                return None;
            }
            let scalar = match value {
                serde_yml::Value::String(s) => Scalar::Text(s.clone()),
                serde_yml::Value::Bool(b) => Scalar::Literal(b.to_string()),
                serde_yml::Value::Number(n) => Scalar::Literal(n.to_string()),
                _ => return None,
            };
            Some((key.as_str(), scalar))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Literal(String),
}

impl Scalar {
    /// the value as it appears inside a block
    pub fn as_text(&self) -> &str {
        match self {
            Self::Text(s) | Self::Literal(s) => s,
        }
    }

    /// the value as a jinja expression
    pub fn as_expression(&self) -> String {
        match self {
            Self::Text(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Self::Literal(s) => s.clone(),
        }
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
