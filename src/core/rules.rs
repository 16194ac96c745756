//! Purpose: Model deprecated-to-canonical field renames and the per-shape rule set.
//! Exports: `AliasRule`, `RuleSet`.
//! Role: Leaf data model consumed read-only by the rewriter, duplicator, and query aliasing.
//! Invariants: A rule's old and new names are distinct and non-empty.
//! Invariants: Rule sets are deduplicated by (old, new) pair and keep first-seen order.
//! Invariants: A built `RuleSet` is immutable and safe to share across threads.
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::{AliasConflict, Error, ErrorKind};

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRule")]
pub struct AliasRule {
    #[serde(rename = "old")]
    old_key: String,
    #[serde(rename = "new")]
    new_key: String,
}

#[derive(Deserialize)]
struct RawRule {
    old: String,
    new: String,
}

impl TryFrom<RawRule> for AliasRule {
    type Error = Error;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        AliasRule::new(raw.old, raw.new)
    }
}

impl AliasRule {
    pub fn new(old_key: impl Into<String>, new_key: impl Into<String>) -> Result<Self, Error> {
        let old_key = old_key.into();
        let new_key = new_key.into();
        if old_key.is_empty() || new_key.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("alias rule names must not be empty")
                .with_hint("Use the form old_name=new_name."));
        }
        if old_key == new_key {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("alias rule renames {old_key:?} to itself")));
        }
        Ok(Self { old_key, new_key })
    }

    pub fn old_key(&self) -> &str {
        &self.old_key
    }

    pub fn new_key(&self) -> &str {
        &self.new_key
    }

    /// The same rename in the opposite direction.
    pub fn swapped(&self) -> Self {
        Self {
            old_key: self.new_key.clone(),
            new_key: self.old_key.clone(),
        }
    }
}

impl fmt::Display for AliasRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.old_key, self.new_key)
    }
}

impl FromStr for AliasRule {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let Some((old, new)) = input.split_once('=') else {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid alias rule {input:?}"))
                .with_hint("Use the form old_name=new_name."));
        };
        AliasRule::new(old.trim(), new.trim())
    }
}

/// Ordered, deduplicated renames for one request or response shape.
///
/// Besides the rules themselves the set precomputes the lookups both
/// transforms need per key: the final canonical name of a deprecated key
/// (following chains such as `a=b`, `b=c`) and the alias family of any
/// tracked key (every name connected to it through some rule).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<AliasRule>", into = "Vec<AliasRule>")]
pub struct RuleSet {
    rules: Vec<AliasRule>,
    canonical: HashMap<String, String>,
    families: HashMap<String, Vec<String>>,
    max_name_len: usize,
}

impl PartialEq for RuleSet {
    fn eq(&self, other: &Self) -> bool {
        self.rules == other.rules
    }
}

impl Eq for RuleSet {}

impl From<Vec<AliasRule>> for RuleSet {
    fn from(rules: Vec<AliasRule>) -> Self {
        RuleSet::new(rules)
    }
}

impl From<RuleSet> for Vec<AliasRule> {
    fn from(set: RuleSet) -> Self {
        set.rules
    }
}

impl FromIterator<AliasRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = AliasRule>>(iter: I) -> Self {
        RuleSet::new(iter)
    }
}

impl RuleSet {
    pub fn new(rules: impl IntoIterator<Item = AliasRule>) -> Self {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for rule in rules {
            if seen.insert(rule.clone()) {
                ordered.push(rule);
            }
        }

        let canonical = resolve_canonical(&ordered);
        let families = build_families(&ordered);
        let max_name_len = ordered
            .iter()
            .map(|rule| rule.old_key.len().max(rule.new_key.len()))
            .max()
            .unwrap_or(0);

        Self {
            rules: ordered,
            canonical,
            families,
            max_name_len,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &[AliasRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Canonical name a deprecated key is rewritten to; `None` when the key
    /// is not deprecated.
    pub fn canonical_of(&self, name: &str) -> Option<&str> {
        self.canonical.get(name).map(String::as_str)
    }

    pub fn is_deprecated(&self, name: &str) -> bool {
        self.canonical.contains_key(name)
    }

    /// Whether the name takes part in any rule, as either spelling.
    pub fn is_tracked(&self, name: &str) -> bool {
        self.families.contains_key(name)
    }

    /// Identity used for per-object conflict detection: the canonical name
    /// for deprecated keys, the key itself for other tracked keys.
    pub fn identity_of<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if let Some(canonical) = self.canonical_of(name) {
            return Some(canonical);
        }
        self.is_tracked(name).then_some(name)
    }

    /// Every other name linked to `name` through the rules, in rule order.
    pub fn family(&self, name: &str) -> &[String] {
        self.families.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Longest tracked name in bytes; keys longer than any escaped form of
    /// this cannot match a rule.
    pub fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    /// Names two spellings of one field as the rule they violate: the
    /// spelling whose rename chain reaches the other one is the old name.
    pub fn alias_conflict(&self, first: &str, second: &str) -> AliasConflict {
        if self.renames_through(second, first) {
            return AliasConflict::new(second, first);
        }
        AliasConflict::new(first, second)
    }

    fn renames_through(&self, from: &str, to: &str) -> bool {
        let mut current = from;
        for _ in 0..self.rules.len() {
            let Some(rule) = self.rules.iter().find(|rule| rule.old_key == current) else {
                return false;
            };
            current = &rule.new_key;
            if current == to {
                return true;
            }
        }
        false
    }

    /// Rule set with every rule reversed, for payloads that serialize with
    /// the old names and must be renamed on output.
    pub fn swapped(&self) -> Self {
        RuleSet::new(self.rules.iter().map(AliasRule::swapped))
    }
}

fn resolve_canonical(rules: &[AliasRule]) -> HashMap<String, String> {
    let mut direct: HashMap<&str, &str> = HashMap::new();
    for rule in rules {
        direct.entry(rule.old_key()).or_insert(rule.new_key());
    }

    let mut canonical = HashMap::with_capacity(direct.len());
    for old in direct.keys() {
        let mut visited = HashSet::from([*old]);
        let mut current = *old;
        while let Some(next) = direct.get(current) {
            if !visited.insert(*next) {
                break;
            }
            current = *next;
        }
        canonical.insert(old.to_string(), current.to_string());
    }
    canonical
}

fn build_families(rules: &[AliasRule]) -> HashMap<String, Vec<String>> {
    let mut order: Vec<&str> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for rule in rules {
        for name in [rule.old_key(), rule.new_key()] {
            if !index.contains_key(name) {
                index.insert(name, order.len());
                order.push(name);
            }
        }
    }

    let mut parent: Vec<usize> = (0..order.len()).collect();
    for rule in rules {
        let a = find(&mut parent, index[rule.old_key()]);
        let b = find(&mut parent, index[rule.new_key()]);
        if a != b {
            parent[a.max(b)] = a.min(b);
        }
    }

    let mut families = HashMap::with_capacity(order.len());
    for (idx, name) in order.iter().enumerate() {
        let root = find(&mut parent, idx);
        let members = order
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != idx && find_readonly(&parent, *other) == root)
            .map(|(_, other)| other.to_string())
            .collect();
        families.insert(name.to_string(), members);
    }
    families
}

fn find(parent: &mut [usize], mut idx: usize) -> usize {
    while parent[idx] != idx {
        parent[idx] = parent[parent[idx]];
        idx = parent[idx];
    }
    idx
}

fn find_readonly(parent: &[usize], mut idx: usize) -> usize {
    while parent[idx] != idx {
        idx = parent[idx];
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::{AliasRule, RuleSet};
    use crate::core::error::ErrorKind;

    fn rule(old: &str, new: &str) -> AliasRule {
        AliasRule::new(old, new).expect("rule")
    }

    #[test]
    fn rule_rejects_empty_and_identity_names() {
        assert_eq!(
            AliasRule::new("", "fleet_id").unwrap_err().kind(),
            ErrorKind::Usage
        );
        assert_eq!(
            AliasRule::new("team_id", "team_id").unwrap_err().kind(),
            ErrorKind::Usage
        );
    }

    #[test]
    fn rule_parses_from_pair_syntax() {
        let parsed: AliasRule = "team_id = fleet_id".parse().expect("parse");
        assert_eq!(parsed, rule("team_id", "fleet_id"));
        assert!("team_id".parse::<AliasRule>().is_err());
    }

    #[test]
    fn rule_set_deduplicates_in_order() {
        let set = RuleSet::new([
            rule("team_id", "fleet_id"),
            rule("query_id", "report_id"),
            rule("team_id", "fleet_id"),
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.rules()[0].old_key(), "team_id");
        assert_eq!(set.rules()[1].old_key(), "query_id");
    }

    #[test]
    fn canonical_follows_chains() {
        let set = RuleSet::new([rule("a", "b"), rule("b", "c")]);
        assert_eq!(set.canonical_of("a"), Some("c"));
        assert_eq!(set.canonical_of("b"), Some("c"));
        assert_eq!(set.canonical_of("c"), None);
        assert_eq!(set.identity_of("c"), Some("c"));
        assert_eq!(set.identity_of("z"), None);
    }

    #[test]
    fn canonical_stops_on_cycles() {
        let set = RuleSet::new([rule("a", "b"), rule("b", "a")]);
        assert_eq!(set.canonical_of("a"), Some("b"));
        assert_eq!(set.canonical_of("b"), Some("a"));
    }

    #[test]
    fn family_links_every_connected_name() {
        let set = RuleSet::new([rule("a", "b"), rule("c", "b"), rule("x", "y")]);
        assert_eq!(set.family("a"), ["b".to_string(), "c".to_string()]);
        assert_eq!(set.family("b"), ["a".to_string(), "c".to_string()]);
        assert_eq!(set.family("y"), ["x".to_string()]);
        assert!(set.family("q").is_empty());
    }

    #[test]
    fn conflict_names_the_violated_rule() {
        let set = RuleSet::new([rule("a", "b"), rule("b", "c")]);
        let conflict = set.alias_conflict("b", "a");
        assert_eq!((conflict.old.as_str(), conflict.new.as_str()), ("a", "b"));
        let conflict = set.alias_conflict("c", "b");
        assert_eq!((conflict.old.as_str(), conflict.new.as_str()), ("b", "c"));
        let conflict = set.alias_conflict("a", "c");
        assert_eq!((conflict.old.as_str(), conflict.new.as_str()), ("a", "c"));
    }

    #[test]
    fn swapped_reverses_rules() {
        let set = RuleSet::new([rule("team_id", "fleet_id")]).swapped();
        assert_eq!(set.canonical_of("fleet_id"), Some("team_id"));
        assert!(!set.is_deprecated("team_id"));
    }

    #[test]
    fn rule_set_loads_from_json() {
        let set: RuleSet =
            serde_json::from_str(r#"[{"old":"team_id","new":"fleet_id"}]"#).expect("rules");
        assert_eq!(set.rules(), [rule("team_id", "fleet_id")]);

        let bad = serde_json::from_str::<RuleSet>(r#"[{"old":"x","new":"x"}]"#);
        assert!(bad.is_err());
    }
}
