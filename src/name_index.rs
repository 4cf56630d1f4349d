use std::collections::HashSet;
use tst::TSTMap;

/// Word-prefix search over master stop names.
///
/// Names are broken into lowercase words on anything non-alphanumeric, so
/// "St. Mary's Gate" indexes as `st`, `mary`, `gate`. A query matches a name
/// when every one of its words is a prefix of some indexed word of that
/// name. One-character tokens carry no signal and are skipped on both sides.
///
/// # Should do
/// * Fold diacritics (¨, ß, etc.) so "susse" finds "Süße"
/// * Rank hits by how early and how completely the words match
pub struct NameIndex {
    /// indexed word -> ascending ids of the names containing it
    words: TSTMap<Vec<u32>>,
    names: usize,
}

impl NameIndex {
    pub fn new() -> NameIndex {
        NameIndex {
            words: TSTMap::new(),
            names: 0,
        }
    }

    /// Index a name under an id. Ids are expected in ascending order so the
    /// postings lists stay sorted.
    pub fn insert(&mut self, name: &str, id: u32) {
        for word in words_of(name) {
            let postings = self.words.entry(&word).or_insert(Vec::new());
            if postings.last() != Some(&id) {
                postings.push(id);
            }
        }
        self.names += 1;
    }

    /// Number of names indexed
    pub fn len(&self) -> usize {
        self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names == 0
    }

    /// Ids of the names matched by every word of the query, ascending.
    /// An empty or all-punctuation query matches nothing.
    pub fn search(&self, query: &str) -> Vec<u32> {
        let mut matching: Option<HashSet<u32>> = None;
        for word in words_of(query) {
            let mut with_prefix = HashSet::new();
            for (_, postings) in self.words.prefix_iter(&word) {
                with_prefix.extend(postings.iter().copied());
            }
            matching = Some(match matching {
                Some(so_far) => so_far.intersection(&with_prefix).copied().collect(),
                None => with_prefix,
            });
            if matching.as_ref().map_or(false, HashSet::is_empty) {
                break;
            }
        }
        let mut ids: Vec<u32> = matching.unwrap_or_default().into_iter().collect();
        ids.sort_unstable();
        ids
    }
}

/// lowercase alphanumeric words of at least two characters
fn words_of(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 1)
        .map(str::to_lowercase)
}
