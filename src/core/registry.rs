//! Purpose: Derive a shape's alias rules once and share them for the process lifetime.
//! Exports: `AliasShape`, `ShapeVisitor`, `rules_for`.
//! Role: Read-through cache between declared field renames and the transforms.
//! Invariants: Each shape's rule set is built at most once and never evicted.
//! Invariants: Nested shapes are visited once per derivation, so cyclic types terminate.
//! Notes: Concurrent first use may race to build; the first inserted set wins.
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, OnceLock, RwLock};

use crate::core::rules::{AliasRule, RuleSet};

/// A request or response type whose JSON fields may carry deprecated names.
///
/// `FIELD_ALIASES` lists `(old, new)` renames for the type's own fields;
/// `visit_nested` forwards to every field type that is itself a shape, so
/// the derived rule set covers the whole document.
///
/// ```
/// use fieldalias::api::{AliasShape, ShapeVisitor, rules_for};
///
/// struct Label;
/// impl AliasShape for Label {
///     const FIELD_ALIASES: &'static [(&'static str, &'static str)] = &[("team_id", "fleet_id")];
/// }
///
/// struct LabelList;
/// impl AliasShape for LabelList {
///     fn visit_nested(visitor: &mut ShapeVisitor) {
///         visitor.visit::<Vec<Label>>();
///     }
/// }
///
/// assert_eq!(rules_for::<LabelList>().canonical_of("team_id"), Some("fleet_id"));
/// ```
pub trait AliasShape: 'static {
    const FIELD_ALIASES: &'static [(&'static str, &'static str)] = &[];

    fn visit_nested(_visitor: &mut ShapeVisitor) {}
}

#[derive(Default)]
pub struct ShapeVisitor {
    visited: HashSet<TypeId>,
    rules: Vec<AliasRule>,
}

impl ShapeVisitor {
    pub fn visit<T: AliasShape>(&mut self) {
        if !self.visited.insert(TypeId::of::<T>()) {
            return;
        }
        for (old, new) in T::FIELD_ALIASES {
            match AliasRule::new(*old, *new) {
                Ok(rule) => self.rules.push(rule),
                Err(err) => tracing::warn!(
                    shape = std::any::type_name::<T>(),
                    old = *old,
                    new = *new,
                    error = %err,
                    "skipping invalid field alias"
                ),
            }
        }
        T::visit_nested(self);
    }

    fn finish(self) -> RuleSet {
        RuleSet::new(self.rules)
    }
}

type RuleCache = RwLock<HashMap<TypeId, Arc<RuleSet>>>;

fn cache() -> &'static RuleCache {
    static CACHE: OnceLock<RuleCache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// The deduplicated rule set for `T`, derived on first use.
pub fn rules_for<T: AliasShape>() -> Arc<RuleSet> {
    let key = TypeId::of::<T>();
    if let Some(rules) = cache()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(&key)
    {
        return Arc::clone(rules);
    }

    let mut visitor = ShapeVisitor::default();
    visitor.visit::<T>();
    let built = Arc::new(visitor.finish());

    let mut guard = cache()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(guard.entry(key).or_insert(built))
}

impl AliasShape for serde_json::Value {}
impl AliasShape for () {}
impl AliasShape for String {}

impl<T: AliasShape> AliasShape for Vec<T> {
    fn visit_nested(visitor: &mut ShapeVisitor) {
        visitor.visit::<T>();
    }
}

impl<T: AliasShape> AliasShape for Option<T> {
    fn visit_nested(visitor: &mut ShapeVisitor) {
        visitor.visit::<T>();
    }
}

impl<T: AliasShape> AliasShape for Box<T> {
    fn visit_nested(visitor: &mut ShapeVisitor) {
        visitor.visit::<T>();
    }
}

impl<T: AliasShape> AliasShape for HashMap<String, T> {
    fn visit_nested(visitor: &mut ShapeVisitor) {
        visitor.visit::<T>();
    }
}

impl<T: AliasShape> AliasShape for BTreeMap<String, T> {
    fn visit_nested(visitor: &mut ShapeVisitor) {
        visitor.visit::<T>();
    }
}
