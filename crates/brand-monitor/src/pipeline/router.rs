//! Language routing of mentions.

use std::collections::{BTreeMap, HashSet};

use crate::twitter::Mention;

/// Group mention texts by language, dropping unsupported languages.
///
/// Order within each bucket follows the input order.
pub fn route(
    mentions: &[Mention],
    supported_languages: &HashSet<String>,
) -> BTreeMap<String, Vec<String>> {
    route_positions(mentions, supported_languages)
        .into_iter()
        .map(|(language, positions)| {
            let texts = positions.into_iter().map(|i| mentions[i].text.clone()).collect();
            (language, texts)
        })
        .collect()
}

/// Same grouping as [`route`], yielding positions into `mentions` instead of texts.
pub(crate) fn route_positions(
    mentions: &[Mention],
    supported_languages: &HashSet<String>,
) -> BTreeMap<String, Vec<usize>> {
    let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (position, mention) in mentions.iter().enumerate() {
        if supported_languages.contains(&mention.language) {
            buckets
                .entry(mention.language.clone())
                .or_default()
                .push(position);
        }
    }
    buckets
}
