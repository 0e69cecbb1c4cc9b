//! Merging per-client records into canonical faces (made by FontLab https://www.fontlab.com/)

use std::collections::BTreeMap;

use indexmap::IndexMap;
use log::debug;

use crate::model::{AggregatedFontFace, ClientIdentity, FontKey, RawFontFace, Subset};

/// Merge parsed records from every client into one face per (family, style, weight).
///
/// Clients are visited in the order given, subsets in [`Subset`] order. The first record
/// to fill a (subset, format) slot or a subset's unicode-range keeps it. Records missing
/// family, style or weight are dropped. Faces come back in first-seen order.
pub fn aggregate<'a, I>(per_client: I) -> Vec<AggregatedFontFace>
where
    I: IntoIterator<Item = (ClientIdentity, &'a BTreeMap<Subset, RawFontFace>)>,
{
    let mut faces: IndexMap<FontKey, AggregatedFontFace> = IndexMap::new();

    for (identity, records) in per_client {
        for raw in records.values() {
            let Some(key) = raw.key() else {
                debug!(
                    "{identity} client: dropping {:?} record without family/style/weight",
                    raw.subset
                );
                continue;
            };
            merge(faces.entry(key.clone()).or_insert_with(|| AggregatedFontFace::new(key)), raw);
        }
    }

    faces.into_values().collect()
}

fn merge(face: &mut AggregatedFontFace, raw: &RawFontFace) {
    let slot = face.subsets.entry(raw.subset).or_default();
    if slot.unicode_range.is_none() {
        slot.unicode_range = raw.unicode_range.clone();
    }
    for (format, url) in &raw.urls {
        slot.urls.entry(format.clone()).or_insert_with(|| url.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FontFormat;

    fn raw(subset: Subset, format: FontFormat, url: &str, range: Option<&str>) -> RawFontFace {
        RawFontFace {
            subset,
            urls: BTreeMap::from([(format, url.to_string())]),
            family: Some("Open Sans".into()),
            style: Some("normal".into()),
            weight: Some("400".into()),
            unicode_range: range.map(str::to_string),
        }
    }

    fn single(face: RawFontFace) -> BTreeMap<Subset, RawFontFace> {
        BTreeMap::from([(face.subset, face)])
    }

    #[test]
    fn identical_records_merge_once() {
        let a = single(raw(Subset::Latin, FontFormat::Woff2, "https://x/a.woff2", None));
        let b = a.clone();

        let faces = aggregate([(ClientIdentity::Woff2, &a), (ClientIdentity::Woff, &b)]);

        assert_eq!(faces.len(), 1);
        let latin = &faces[0].subsets[&Subset::Latin];
        assert_eq!(latin.urls.len(), 1);
        assert_eq!(faces[0].key.family, "Open Sans");
    }

    #[test]
    fn formats_accumulate_and_first_writer_wins() {
        let first = single(raw(
            Subset::Latin,
            FontFormat::Woff2,
            "https://x/1.woff2",
            Some("U+0000-00FF"),
        ));
        let second = single(raw(
            Subset::Latin,
            FontFormat::Woff2,
            "https://x/2.woff2",
            Some("U+0100-024F"),
        ));
        let third = single(raw(Subset::Latin, FontFormat::Woff, "https://x/3.woff", None));

        let faces = aggregate([
            (ClientIdentity::Woff2, &first),
            (ClientIdentity::Woff2, &second),
            (ClientIdentity::Woff, &third),
        ]);

        let latin = &faces[0].subsets[&Subset::Latin];
        assert_eq!(latin.urls[&FontFormat::Woff2], "https://x/1.woff2");
        assert_eq!(latin.urls[&FontFormat::Woff], "https://x/3.woff");
        assert_eq!(latin.unicode_range.as_deref(), Some("U+0000-00FF"));
    }

    #[test]
    fn later_range_fills_an_empty_slot() {
        let first = single(raw(Subset::Latin, FontFormat::Eot, "https://x/1.eot", None));
        let second = single(raw(
            Subset::Latin,
            FontFormat::Woff,
            "https://x/2.woff",
            Some("U+0000-00FF"),
        ));

        let faces = aggregate([(ClientIdentity::Eot, &first), (ClientIdentity::Woff, &second)]);

        assert_eq!(faces[0].subsets[&Subset::Latin].unicode_range.as_deref(), Some("U+0000-00FF"));
    }

    #[test]
    fn records_missing_weight_are_discarded() {
        let mut face = raw(Subset::Default, FontFormat::Woff, "https://x/a.woff", None);
        face.weight = None;
        let records = single(face);

        assert!(aggregate([(ClientIdentity::Woff, &records)]).is_empty());
    }

    #[test]
    fn faces_keep_first_seen_order() {
        let mut bold = raw(Subset::Default, FontFormat::Woff, "https://x/b.woff", None);
        bold.weight = Some("700".into());
        let bold = single(bold);
        let regular = single(raw(Subset::Default, FontFormat::Woff, "https://x/r.woff", None));

        let faces = aggregate([
            (ClientIdentity::Woff, &bold),
            (ClientIdentity::TrueType, &regular),
        ]);

        let weights: Vec<_> = faces.iter().map(|f| f.key.weight.as_str()).collect();
        assert_eq!(weights, vec!["700", "400"]);
    }
}
