use regex::Regex;
use std::sync::OnceLock;

use crate::processors::PostProcessor;

/// contents of these elements are left alone
const RAW_ELEMENTS: &[&str] = &["pre", "code", "kbd", "script", "style", "textarea"];

fn rx_tag() -> &'static Regex {
    static RX_TAG: OnceLock<Regex> = OnceLock::new();
    RX_TAG.get_or_init(|| Regex::new(r"(?s)<!--.*?-->|<(/?)([a-zA-Z][a-zA-Z0-9]*)?[^>]*>").unwrap())
}

fn rx_amp() -> &'static Regex {
    static RX_AMP: OnceLock<Regex> = OnceLock::new();
    RX_AMP.get_or_init(|| Regex::new(r"(\s)(?:&|&amp;)(\s)").unwrap())
}

/// dashes, ellipses and ampersands, in the spirit of typogrify
#[derive(Debug, Default, Clone, Copy)]
pub struct Typography;

impl Typography {
    fn text(text: &str) -> String {
        let text = text
            .replace("---", "&#8212;")
            .replace("--", "&#8211;")
            .replace("...", "&#8230;");
        rx_amp()
            .replace_all(&text, "$1<span class=\"amp\">&amp;</span>$2")
            .into_owned()
    }
}

impl PostProcessor for Typography {
    fn name(&self) -> &str {
        "typography"
    }

    fn process(&self, html: &str) -> String {
        let mut out = String::with_capacity(html.len());
        let mut raw_depth = 0usize;
        let mut last = 0;
        for tag in rx_tag().captures_iter(html) {
            let Some(whole) = tag.get(0) else { continue };
            let text = &html[last..whole.start()];
            if raw_depth == 0 {
                out.push_str(&Self::text(text));
            } else {
                out.push_str(text);
            }
            out.push_str(whole.as_str());
            last = whole.end();

            let Some(name) = tag.get(2) else { continue };
            if RAW_ELEMENTS.contains(&name.as_str().to_lowercase().as_str()) {
                if &tag[1] == "/" {
                    raw_depth = raw_depth.saturating_sub(1);
                } else if !whole.as_str().ends_with("/>") {
                    raw_depth += 1;
                }
            }
        }
        let rest = &html[last..];
        if raw_depth == 0 {
            out.push_str(&Self::text(rest));
        } else {
            out.push_str(rest);
        }
        out
    }
}
