/// Rank suffixes for taxonomies that stop above genus, indexed by the
/// number of named levels.
const RANK_SUFFIX: [&str; 5] = ["kingdom", "phylum", "class", "order", "family"];

/// Named levels of a `k__Bacteria; p__Firmicutes; ...` string. Each level
/// loses its three-character rank prefix; levels with nothing after the
/// prefix are unnamed and dropped.
pub fn taxonomy_levels(taxonomy: &str) -> Vec<&str> {
    taxonomy
        .split("; ")
        .filter_map(|level| {
            let (offset, _) = level.char_indices().nth(3)?;
            let name = &level[offset..];
            (!name.is_empty()).then_some(name)
        })
        .collect()
}

/// Short human-readable label: genus and species when known, otherwise the
/// deepest named level with its rank.
pub fn pretty_taxonomy(taxonomy: &str) -> String {
    let levels = taxonomy_levels(taxonomy);
    match levels.len() {
        0 => "Unclassified".to_string(),
        n if n > RANK_SUFFIX.len() => levels[RANK_SUFFIX.len()..].join(" "),
        n => format!("{} {}", levels[n - 1], RANK_SUFFIX[n - 1]),
    }
}
