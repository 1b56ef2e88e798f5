//! Prefix declarations and CURIE handling.

use std::collections::{BTreeMap, BTreeSet};

/// Prefixes that are always available without a `prefix` declaration.
pub const BUILTIN_PREFIXES: &[(&str, &str)] = &[
    ("sssom", "https://w3id.org/sssom/"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("skos", "http://www.w3.org/2004/02/skos/core#"),
    ("semapv", "https://w3id.org/semapv/vocab/"),
];

/// Maps prefix names to namespace IRIs.
///
/// `expand` is a pure lookup; `resolve` does the same but remembers prefix
/// names it could not find, so a reader can report them once parsing is done.
#[derive(Debug, Clone)]
pub struct PrefixManager {
    prefixes: BTreeMap<String, String>,
    unresolved: BTreeSet<String>,
}

impl Default for PrefixManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefixManager {
    pub fn new() -> Self {
        let prefixes = BUILTIN_PREFIXES.iter().map(|(name, iri)| (name.to_string(), iri.to_string())).collect();
        Self { prefixes, unresolved: BTreeSet::new() }
    }

    /// Declare (or redeclare) a prefix.
    pub fn add(&mut self, name: impl Into<String>, iri: impl Into<String>) {
        self.prefixes.insert(name.into(), iri.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.prefixes.get(name).map(String::as_str)
    }

    /// Expand a CURIE into a full IRI.
    ///
    /// Anything that already looks like an IRI, has no `:`, or uses an unknown
    /// prefix name is returned unchanged.
    pub fn expand(&self, curie: &str) -> String {
        match self.split_known(curie) {
            Some((namespace, local)) => format!("{namespace}{local}"),
            None => curie.to_string(),
        }
    }

    /// Like [`expand`](Self::expand), but records unknown prefix names.
    ///
    /// Only CURIE-shaped input counts: `1:n` has no valid prefix name and is
    /// returned as is without being recorded.
    pub fn resolve(&mut self, curie: &str) -> String {
        if !curie.starts_with("http") {
            if let Some(caps) = regex!(r"\A([A-Za-z_][A-Za-z0-9_.\-]*):").captures(curie) {
                let name = &caps[1];
                if !self.prefixes.contains_key(name) {
                    self.unresolved.insert(name.to_string());
                }
            }
        }
        self.expand(curie)
    }

    /// Prefix names seen by [`resolve`](Self::resolve) that were never declared.
    pub fn unresolved(&self) -> &BTreeSet<String> {
        &self.unresolved
    }

    pub fn clear_unresolved(&mut self) {
        self.unresolved.clear();
    }

    /// Shorten an IRI to a CURIE using the longest matching namespace.
    pub fn shorten(&self, iri: &str) -> String {
        match self.best_match(iri) {
            Some((name, namespace)) => format!("{name}:{}", &iri[namespace.len()..]),
            None => iri.to_string(),
        }
    }

    /// Name of the prefix an IRI falls under, or an empty string.
    pub fn prefix_name(&self, iri: &str) -> String {
        self.best_match(iri).map(|(name, _)| name.to_string()).unwrap_or_default()
    }

    /// Part of the IRI after its namespace.
    ///
    /// Without a known namespace, falls back to whatever follows the last `#` or `/`.
    pub fn local_name(&self, iri: &str) -> String {
        if let Some((_, namespace)) = self.best_match(iri) {
            return iri[namespace.len()..].to_string();
        }
        match iri.rfind(['#', '/']) {
            Some(idx) => iri[idx + 1..].to_string(),
            None => iri.to_string(),
        }
    }

    fn split_known<'a>(&self, curie: &'a str) -> Option<(&str, &'a str)> {
        if curie.starts_with("http") {
            return None;
        }
        let (name, local) = curie.split_once(':')?;
        self.prefixes.get(name).map(|namespace| (namespace.as_str(), local))
    }

    fn best_match(&self, iri: &str) -> Option<(&str, &str)> {
        self.prefixes
            .iter()
            .filter(|(_, namespace)| !namespace.is_empty() && iri.starts_with(namespace.as_str()))
            .max_by_key(|(_, namespace)| namespace.len())
            .map(|(name, namespace)| (name.as_str(), namespace.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> PrefixManager {
        let mut pm = PrefixManager::new();
        pm.add("ORGENT", "https://example.org/entities/");
        pm.add("ORGSUB", "https://example.org/entities/sub/");
        pm
    }

    #[test]
    fn expands_builtin_and_declared_prefixes() {
        let pm = manager();
        assert_eq!(pm.expand("skos:exactMatch"), "http://www.w3.org/2004/02/skos/core#exactMatch");
        assert_eq!(pm.expand("ORGENT:0001"), "https://example.org/entities/0001");
        assert_eq!(pm.expand("ORGENT:*"), "https://example.org/entities/*");
    }

    #[test]
    fn leaves_iris_and_unknown_prefixes_alone() {
        let mut pm = manager();
        assert_eq!(pm.expand("https://example.org/x"), "https://example.org/x");
        assert_eq!(pm.expand("plain"), "plain");
        assert_eq!(pm.resolve("UNKNOWN:1"), "UNKNOWN:1");
        assert_eq!(pm.resolve("ORGENT:1"), "https://example.org/entities/1");
        assert_eq!(pm.unresolved().iter().collect::<Vec<_>>(), vec!["UNKNOWN"]);
    }

    #[test]
    fn non_curie_tokens_are_not_recorded() {
        let mut pm = manager();
        assert_eq!(pm.resolve("1:n"), "1:n");
        assert_eq!(pm.resolve("0:1"), "0:1");
        assert!(pm.unresolved().is_empty());
    }

    #[test]
    fn shortens_with_longest_namespace() {
        let pm = manager();
        assert_eq!(pm.shorten("https://example.org/entities/sub/7"), "ORGSUB:7");
        assert_eq!(pm.shorten("https://example.org/entities/7"), "ORGENT:7");
        assert_eq!(pm.shorten("https://elsewhere.org/7"), "https://elsewhere.org/7");
    }

    #[test]
    fn prefix_and_local_names() {
        let pm = manager();
        let iri = "http://www.w3.org/2004/02/skos/core#exactMatch";
        assert_eq!(pm.prefix_name(iri), "skos");
        assert_eq!(pm.local_name(iri), "exactMatch");
        assert_eq!(pm.prefix_name("https://elsewhere.org/a/b"), "");
        assert_eq!(pm.local_name("https://elsewhere.org/a/b"), "b");
    }
}
