//! `@font-face` extraction from API stylesheets (made by FontLab https://www.fontlab.com/)
//!
//! Each subset is located independently: the unmarked default takes the first usable
//! block anywhere in the text, `latin` and `latin-ext` take the first usable block
//! directly introduced by their `/* ... */` comment. Only one block is read per subset,
//! so repeated blocks for the same subset are ignored.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::model::{FontFormat, RawFontFace, Subset};

pub const DEFAULT_ASSET_ORIGIN: &str = "https://fonts.gstatic.com/";

#[derive(Debug, Clone)]
pub struct FontFaceParser {
    src: Regex,
}

impl FontFaceParser {
    /// Parser accepting asset URLs under `asset_origin` only.
    pub fn new(asset_origin: &str) -> Result<Self> {
        let pattern = format!(
            r"src: url\((?P<url>{}[A-Za-z0-9_\-./]+)\)(?: format\('(?P<format>[A-Za-z0-9 \-_]+)'\))?",
            regex::escape(asset_origin)
        );
        let src = Regex::new(&pattern)
            .with_context(|| format!("building src pattern for origin {asset_origin}"))?;
        Ok(Self { src })
    }

    /// Extract at most one record per subset.
    pub fn parse(&self, css: &str) -> BTreeMap<Subset, RawFontFace> {
        Subset::ALL
            .into_iter()
            .filter_map(|subset| self.parse_subset(css, subset).map(|face| (subset, face)))
            .collect()
    }

    pub fn parse_subset(&self, css: &str, subset: Subset) -> Option<RawFontFace> {
        candidate_blocks(css, subset).find_map(|body| self.parse_block(body, subset))
    }

    fn parse_block(&self, body: &str, subset: Subset) -> Option<RawFontFace> {
        let caps = self.src.captures_iter(body).last()?;
        let whole = caps.get(0)?;
        let url = caps.name("url")?.as_str().to_string();
        let format = caps
            .name("format")
            .map(|m| FontFormat::parse(m.as_str()))
            .unwrap_or(FontFormat::Eot);

        let before = &body[..whole.start()];
        let after = &body[whole.end()..];

        Some(RawFontFace {
            subset,
            urls: BTreeMap::from([(format, url)]),
            family: capture(family_re(), before),
            style: capture(style_re(), before),
            weight: capture(weight_re(), before),
            unicode_range: capture(range_re(), after),
        })
    }
}

/// Parse with the default asset origin.
pub fn parse_css(css: &str) -> Result<BTreeMap<Subset, RawFontFace>> {
    Ok(FontFaceParser::new(DEFAULT_ASSET_ORIGIN)?.parse(css))
}

/// Bodies (text between `{` and the next `}`) of blocks eligible for `subset`, in order.
fn candidate_blocks<'a>(css: &'a str, subset: Subset) -> impl Iterator<Item = &'a str> + 'a {
    let anchor = match subset.marker() {
        Some(_) => "/*",
        None => "@font-face",
    };
    css.match_indices(anchor).filter_map(move |(at, _)| {
        let rest = &css[at..];
        let rest = match subset.marker() {
            Some(marker) => skip_marker(rest, marker)?,
            None => rest,
        };
        block_body(rest)
    })
}

/// `/*<ws>marker<ws>*/<ws>` → remainder after the comment.
fn skip_marker<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let rest = text.strip_prefix("/*")?.trim_start();
    let rest = rest.strip_prefix(marker)?.trim_start();
    Some(rest.strip_prefix("*/")?.trim_start())
}

fn block_body(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("@font-face")?.trim_start();
    let rest = rest.strip_prefix('{')?;
    let end = rest.find('}')?;
    Some(&rest[..end])
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn family_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"font-family: '([A-Za-z0-9 ]+)';").expect("valid family regex"))
}

fn style_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"font-style: ([A-Za-z0-9 ]+);").expect("valid style regex"))
}

fn weight_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"font-weight: ([A-Za-z0-9 ]+);").expect("valid weight regex"))
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"unicode-range: ([A-Za-z0-9 +,\-]+);").expect("valid unicode-range regex")
    })
}
