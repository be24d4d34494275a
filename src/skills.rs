//! Skill normalization
//!
//! Every skill string entering the graph or a requirement goes through
//! [`SkillId::normalize`], so "Python", " python " and "py" all land on the
//! same node and compare equal during matching.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Synonyms folded onto a canonical id, after lowercasing
const SYNONYMS: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("ecmascript", "javascript"),
    ("ts", "typescript"),
    ("py", "python"),
    ("python3", "python"),
    ("golang", "go"),
    ("k8s", "kubernetes"),
    ("postgres", "postgresql"),
    ("psql", "postgresql"),
    ("reactjs", "react"),
    ("react.js", "react"),
    ("node", "nodejs"),
    ("node.js", "nodejs"),
    ("vue.js", "vue"),
    ("vuejs", "vue"),
    ("csharp", "c#"),
    ("c sharp", "c#"),
    ("dotnet", ".net"),
    ("amazon web services", "aws"),
    ("gcp", "google cloud"),
    ("google cloud platform", "google cloud"),
    ("ml", "machine learning"),
    ("tf", "tensorflow"),
    ("mongo", "mongodb"),
    ("rustlang", "rust"),
];

/// Normalized skill identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillId(String);

impl SkillId {
    /// Trim, lowercase, collapse inner whitespace and fold synonyms.
    /// Returns `None` for blank input.
    pub fn normalize(raw: &str) -> Option<SkillId> {
        let collapsed = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if collapsed.is_empty() {
            return None;
        }

        let canonical = SYNONYMS
            .iter()
            .find(|(alias, _)| *alias == collapsed)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(collapsed);
        Some(SkillId(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Every alias string that normalizes to this id, the id itself included
    pub fn aliases(&self) -> Vec<&str> {
        let mut out = vec![self.as_str()];
        out.extend(
            SYNONYMS
                .iter()
                .filter(|(_, canonical)| *canonical == self.as_str())
                .map(|(alias, _)| *alias),
        );
        out
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The synonym table as `(alias, canonical id)` pairs
pub fn synonym_table() -> impl Iterator<Item = (&'static str, SkillId)> {
    SYNONYMS
        .iter()
        .map(|(alias, canonical)| (*alias, SkillId(canonical.to_string())))
}

/// Normalize a list, dropping blanks and duplicates while keeping order
pub fn normalize_all<S: AsRef<str>>(raw: &[S]) -> Vec<SkillId> {
    let mut out: Vec<SkillId> = Vec::with_capacity(raw.len());
    for skill in raw.iter().filter_map(|s| SkillId::normalize(s.as_ref())) {
        if !out.contains(&skill) {
            out.push(skill);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_whitespace_insensitive() {
        assert_eq!(SkillId::normalize("Python"), SkillId::normalize("  python "));
        assert_eq!(
            SkillId::normalize("Machine   Learning").unwrap().as_str(),
            "machine learning"
        );
        assert_eq!(SkillId::normalize("   "), None);
    }

    #[test]
    fn test_synonyms_fold() {
        assert_eq!(SkillId::normalize("K8s").unwrap().as_str(), "kubernetes");
        assert_eq!(SkillId::normalize("JS"), SkillId::normalize("javascript"));
        assert_eq!(SkillId::normalize("Postgres"), SkillId::normalize("PostgreSQL"));
        assert_eq!(SkillId::normalize("Node.js").unwrap().as_str(), "nodejs");
    }

    #[test]
    fn test_normalize_all_dedupes() {
        let skills = normalize_all(&["Python", "py", "Rust", ""]);
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0].as_str(), "python");
    }

    #[test]
    fn test_aliases() {
        let k8s = SkillId::normalize("kubernetes").unwrap();
        assert_eq!(k8s.aliases(), vec!["kubernetes", "k8s"]);
    }
}
