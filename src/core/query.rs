// Query-string aliasing: the same rename rules applied to URL parameters.
use std::collections::HashMap;

use crate::core::error::Error;
use crate::core::rules::RuleSet;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct QueryRewrite {
    pub pairs: Vec<(String, String)>,
    pub deprecated: Vec<String>,
}

/// Renames deprecated parameter names to canonical ones. A parameter may
/// repeat under one spelling; mixing spellings of one field is a conflict.
pub fn rewrite_query_pairs<I, K, V>(pairs: I, rules: &RuleSet) -> Result<QueryRewrite, Error>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut rewrite = QueryRewrite::default();
    let mut seen: HashMap<String, String> = HashMap::new();

    for (key, value) in pairs {
        let key = key.into();
        let value = value.into();
        let Some(identity) = rules.identity_of(&key) else {
            rewrite.pairs.push((key, value));
            continue;
        };
        let identity = identity.to_string();

        match seen.get(&identity) {
            Some(first) if *first != key => {
                let conflict = rules.alias_conflict(first, &key);
                return Err(Error::conflict(conflict));
            }
            Some(_) => {}
            None => {
                seen.insert(identity.clone(), key.clone());
            }
        }

        if rules.is_deprecated(&key) {
            if !rewrite.deprecated.contains(&key) {
                rewrite.deprecated.push(key);
            }
            rewrite.pairs.push((identity, value));
        } else {
            rewrite.pairs.push((key, value));
        }
    }
    Ok(rewrite)
}

#[cfg(test)]
mod tests {
    use super::rewrite_query_pairs;
    use crate::core::error::ErrorKind;
    use crate::core::rules::{AliasRule, RuleSet};

    fn rules() -> RuleSet {
        RuleSet::new([
            AliasRule::new("team_id", "fleet_id").expect("rule"),
            AliasRule::new("query_id", "report_id").expect("rule"),
        ])
    }

    #[test]
    fn deprecated_params_are_renamed() {
        let out = rewrite_query_pairs([("team_id", "3"), ("page", "2")], &rules()).expect("query");
        assert_eq!(
            out.pairs,
            [
                ("fleet_id".to_string(), "3".to_string()),
                ("page".to_string(), "2".to_string())
            ]
        );
        assert_eq!(out.deprecated, ["team_id"]);
    }

    #[test]
    fn canonical_params_pass_through() {
        let out = rewrite_query_pairs([("fleet_id", "3")], &rules()).expect("query");
        assert_eq!(out.pairs, [("fleet_id".to_string(), "3".to_string())]);
        assert!(out.deprecated.is_empty());
    }

    #[test]
    fn chained_conflict_names_the_direct_rule() {
        let chain = RuleSet::new([
            AliasRule::new("a", "b").expect("rule"),
            AliasRule::new("b", "c").expect("rule"),
        ]);
        let err = rewrite_query_pairs([("b", "1"), ("a", "2")], &chain).expect_err("conflict");
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let conflict = err.alias_conflict().expect("conflict details");
        assert_eq!((conflict.old.as_str(), conflict.new.as_str()), ("a", "b"));
    }

    #[test]
    fn repeated_spelling_is_allowed() {
        let out =
            rewrite_query_pairs([("query_id", "1"), ("query_id", "2")], &rules()).expect("query");
        assert_eq!(out.pairs.len(), 2);
        assert_eq!(out.deprecated, ["query_id"]);
    }

    #[test]
    fn mixed_spellings_conflict_in_either_order() {
        for pairs in [
            [("team_id", "1"), ("fleet_id", "2")],
            [("fleet_id", "2"), ("team_id", "1")],
        ] {
            let err = rewrite_query_pairs(pairs, &rules()).expect_err("conflict");
            assert_eq!(err.kind(), ErrorKind::Conflict);
            let conflict = err.alias_conflict().expect("conflict");
            assert_eq!(conflict.old, "team_id");
            assert_eq!(conflict.new, "fleet_id");
        }
    }
}
