//! String similarity and term substitution.
//!
//! Similarity is the Ratcliff/Obershelp "gestalt" ratio: twice the number of
//! characters in matching blocks divided by the combined length of both
//! strings. Matching blocks are found by repeatedly taking the longest common
//! substring and recursing on either side of it.

use serde::de::{Deserializer, Error as DeError};
use serde::{Deserialize, Serialize, Serializer};

/// Similarity between 0.0 (nothing in common) and 1.0 (identical).
pub fn similarity_score(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// The `n` candidates most similar to `target`, best first.
///
/// Ties keep the candidates' original order.
pub fn similar_strings<'a, S: AsRef<str>>(target: &str, candidates: &'a [S], n: usize) -> Vec<&'a str> {
    let mut scored: Vec<(&str, f64)> = candidates
        .iter()
        .map(|c| (c.as_ref(), similarity_score(target, c.as_ref())))
        .collect();
    // sort_by is stable, so equal scores stay in input order
    scored.sort_by(|x, y| y.1.total_cmp(&x.1));
    scored.into_iter().take(n).map(|(c, _)| c).collect()
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    total
}

/// Longest common block in `a[alo..ahi]` / `b[blo..bhi]`, earliest in `a`
/// then earliest in `b` on ties.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo + 1;
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; width];
    for i in alo..ahi {
        let mut cur = vec![0usize; width];
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = prev[j - blo] + 1;
                cur[j - blo + 1] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            }
        }
        prev = cur;
    }
    best
}

/// Ordered literal substitutions applied to recipient names.
///
/// Rules run in sequence, so a later rule sees the output of earlier ones.
/// In YAML this is a mapping whose key order is the rule order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermReplacements(Vec<(String, String)>);

impl TermReplacements {
    pub fn new(rules: Vec<(String, String)>) -> Self {
        Self(rules)
    }

    pub fn rules(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn apply(&self, s: &str) -> String {
        self.0
            .iter()
            .fold(s.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))
    }
}

impl<'de> Deserialize<'de> for TermReplacements {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mapping = serde_yaml::Mapping::deserialize(deserializer)?;
        let mut rules = Vec::with_capacity(mapping.len());
        for (k, v) in mapping {
            let from = yaml_scalar(&k).ok_or_else(|| D::Error::custom("replacement keys must be scalars"))?;
            let to = yaml_scalar(&v).ok_or_else(|| D::Error::custom("replacement values must be scalars"))?;
            rules.push((from, to));
        }
        Ok(Self(rules))
    }
}

impl Serialize for TermReplacements {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut mapping = serde_yaml::Mapping::new();
        for (from, to) in &self.0 {
            mapping.insert(from.clone().into(), to.clone().into());
        }
        mapping.serialize(serializer)
    }
}

/// Render a scalar YAML value as text; `null` becomes the empty string.
pub(crate) fn yaml_scalar(v: &serde_yaml::Value) -> Option<String> {
    match v {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}
