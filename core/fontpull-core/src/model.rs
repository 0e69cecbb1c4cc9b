//! Typed records shared by every pipeline stage (made by FontLab https://www.fontlab.com/)

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Simulated browser used to coax a particular binary format out of the font API.
///
/// The order of [`ClientIdentity::ALL`] is the order in which client responses are
/// merged, so earlier identities win when two clients disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientIdentity {
    Eot,
    Woff2,
    Woff,
    #[serde(rename = "truetype")]
    TrueType,
}

impl ClientIdentity {
    // eot, woff2, woff, truetype: woff2 is asked before woff, so its unicode-range and
    // face order win over the woff client's when both answer.
    pub const ALL: [ClientIdentity; 4] = [
        ClientIdentity::Eot,
        ClientIdentity::Woff2,
        ClientIdentity::Woff,
        ClientIdentity::TrueType,
    ];

    /// `User-Agent` sent for this identity; empty means "send no override".
    pub fn user_agent(self) -> &'static str {
        match self {
            ClientIdentity::Eot => "Mozilla/2.0 (compatible; MSIE 3.01; Windows 98)",
            ClientIdentity::Woff2 => {
                "Mozilla/5.0 (Windows NT 6.3; Win64; x64; rv:105.0) Gecko/20100101 Firefox/105.0"
            }
            ClientIdentity::Woff => {
                "Mozilla/5.0 (Windows; U; Windows NT 6.1; fr; rv:1.9.2) Gecko/20100115 Firefox/3.6"
            }
            ClientIdentity::TrueType => "",
        }
    }

    /// Format the API is expected to serve to this identity.
    pub fn expected_format(self) -> FontFormat {
        match self {
            ClientIdentity::Eot => FontFormat::Eot,
            ClientIdentity::Woff2 => FontFormat::Woff2,
            ClientIdentity::Woff => FontFormat::Woff,
            ClientIdentity::TrueType => FontFormat::TrueType,
        }
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.expected_format().as_str())
    }
}

/// Writing-system group the API marks with a leading `/* <name> */` comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subset {
    Default,
    Latin,
    LatinExt,
}

impl Subset {
    /// Emission order: default first, then latin, then latin-ext.
    pub const ALL: [Subset; 3] = [Subset::Default, Subset::Latin, Subset::LatinExt];

    /// Comment text introducing the subset, `None` for the unmarked default.
    pub fn marker(self) -> Option<&'static str> {
        match self {
            Subset::Default => None,
            Subset::Latin => Some("latin"),
            Subset::LatinExt => Some("latin-ext"),
        }
    }

    /// Name used inside cache file names; empty for the default subset.
    pub fn file_component(self) -> &'static str {
        self.marker().unwrap_or("")
    }
}

/// Binary container named by a `format('...')` token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FontFormat {
    Eot,
    Woff2,
    Woff,
    TrueType,
    /// Any other token; kept through aggregation but never downloaded or emitted.
    Other(String),
}

impl FontFormat {
    /// Formats chained after `local('')` in the main `src` declaration, in order.
    pub const FALLBACK_CHAIN: [FontFormat; 3] =
        [FontFormat::Woff2, FontFormat::Woff, FontFormat::TrueType];

    pub fn parse(token: &str) -> FontFormat {
        match token {
            "eot" => FontFormat::Eot,
            "woff2" => FontFormat::Woff2,
            "woff" => FontFormat::Woff,
            "truetype" => FontFormat::TrueType,
            other => FontFormat::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FontFormat::Eot => "eot",
            FontFormat::Woff2 => "woff2",
            FontFormat::Woff => "woff",
            FontFormat::TrueType => "truetype",
            FontFormat::Other(token) => token,
        }
    }

    /// File extension for cached assets, including the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FontFormat::Eot => ".eot",
            FontFormat::Woff2 => ".woff2",
            FontFormat::Woff => ".woff",
            FontFormat::TrueType => ".ttf",
            FontFormat::Other(_) => "",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, FontFormat::Other(_))
    }
}

impl From<String> for FontFormat {
    fn from(value: String) -> Self {
        FontFormat::parse(&value)
    }
}

impl From<FontFormat> for String {
    fn from(value: FontFormat) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FontFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `@font-face` block as read from a single stylesheet response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFontFace {
    pub subset: Subset,
    pub urls: BTreeMap<FontFormat, String>,
    pub family: Option<String>,
    pub style: Option<String>,
    pub weight: Option<String>,
    pub unicode_range: Option<String>,
}

impl RawFontFace {
    /// Key for aggregation, available only when family, style and weight are all non-empty.
    pub fn key(&self) -> Option<FontKey> {
        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Some(FontKey {
            family: non_empty(&self.family)?,
            style: non_empty(&self.style)?,
            weight: non_empty(&self.weight)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FontKey {
    pub family: String,
    pub style: String,
    pub weight: String,
}

/// Sources known for one subset of an aggregated face.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsetSources {
    #[serde(default)]
    pub unicode_range: Option<String>,
    pub urls: BTreeMap<FontFormat, String>,
}

impl SubsetSources {
    /// True when no format this crate knows how to emit is present.
    pub fn has_usable_format(&self) -> bool {
        self.urls.keys().any(FontFormat::is_known)
    }
}

/// Canonical face keyed by (family, style, weight), merged across clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedFontFace {
    #[serde(flatten)]
    pub key: FontKey,
    pub subsets: BTreeMap<Subset, SubsetSources>,
}

impl AggregatedFontFace {
    pub fn new(key: FontKey) -> Self {
        Self {
            key,
            subsets: BTreeMap::new(),
        }
    }
}
