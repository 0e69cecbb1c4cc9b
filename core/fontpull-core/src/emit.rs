//! `@font-face` stylesheet rendering (made by FontLab https://www.fontlab.com/)

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::model::{AggregatedFontFace, FontFormat, FontKey, Subset, SubsetSources};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitOptions {
    /// Skip subsets that have no eot/woff2/woff/truetype source instead of emitting
    /// a block whose `src` is only `local('')`.
    pub omit_empty_blocks: bool,
}

/// Render every face and subset, blocks separated by a blank line.
///
/// Faces keep their given order; subsets go default, latin, latin-ext.
pub fn render(faces: &[AggregatedFontFace], opts: &EmitOptions) -> String {
    let mut blocks = Vec::new();
    for face in faces {
        for (subset, sources) in &face.subsets {
            if opts.omit_empty_blocks && !sources.has_usable_format() {
                continue;
            }
            blocks.push(render_block(&face.key, *subset, sources));
        }
    }
    blocks.join("\n\n")
}

fn render_block(key: &FontKey, subset: Subset, sources: &SubsetSources) -> String {
    let mut css = String::new();
    if let Some(marker) = subset.marker() {
        let _ = writeln!(css, "/* {marker} */");
    }

    let _ = writeln!(css, "@font-face {{");
    let _ = writeln!(css, "  font-family: '{}';", key.family);
    let _ = writeln!(css, "  font-style: {};", key.style);
    let _ = writeln!(css, "  font-weight: {};", key.weight);
    if let Some(eot) = sources.urls.get(&FontFormat::Eot) {
        let _ = writeln!(css, "  src: url('{eot}');");
    }

    css.push_str("  src: local('')");
    for format in &FontFormat::FALLBACK_CHAIN {
        if let Some(url) = sources.urls.get(format) {
            let _ = write!(css, ",\n        url('{url}') format('{format}')");
        }
    }
    css.push_str(";\n");

    if let Some(range) = &sources.unicode_range {
        let _ = writeln!(css, "  unicode-range: {range};");
    }
    css.push('}');
    css
}
