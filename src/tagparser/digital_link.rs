//! Fixed-vocabulary GS1 digital link parsing
//!
//! Used by the legacy resolver, which predates stored grammars. Segments are
//! split on `/`; a known application identifier takes the following segment
//! as its value.

use std::collections::BTreeMap;

/// Field name for single-segment (unqualified) identifiers
pub const UNQUALIFIED_FIELD: &str = "unknown";

const APPLICATION_IDENTIFIERS: &[(&str, &str)] = &[
    ("01", "GTIN"),
    ("22", "consumer product variant"),
    ("10", "batch number"),
    ("21", "serial number"),
];

pub fn parse_digital_link(tag: &str) -> BTreeMap<String, String> {
    let segments: Vec<&str> = tag.split('/').collect();
    let mut fields = BTreeMap::new();

    if segments.len() == 1 {
        fields.insert(UNQUALIFIED_FIELD.to_string(), segments[0].to_string());
        return fields;
    }

    for (i, segment) in segments.iter().enumerate() {
        let Some((_, field)) = APPLICATION_IDENTIFIERS.iter().find(|(ai, _)| ai == segment) else {
            continue;
        };
        if let Some(value) = segments.get(i + 1) {
            fields.insert(field.to_string(), value.to_string());
        }
    }
    fields
}
