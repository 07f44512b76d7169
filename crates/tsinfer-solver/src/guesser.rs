//! Nominal resolution of structural object facts.
//!
//! An anonymous `Object { foo, bar }` is matched against every class of the
//! scene declaring all of `foo` and `bar` (as fields or methods). A unique
//! match resolves to that class, a handful of matches to their union.

use crate::processor::TypeFactProcessor;
use crate::type_fact::{ObjectFact, Properties, TypeFact};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use tracing::trace;
use tsinfer_common::limits::MAX_GUESSED_CANDIDATES;
use tsinfer_ir::{Class, ClassId, EtsType, Name, Scene};

pub struct TypeGuesser<'s> {
    scene: &'s Scene,
    processor: TypeFactProcessor<'s>,
    /// Property name -> classes declaring a field or method of that name.
    classes_by_property: FxHashMap<Name, FxHashSet<ClassId>>,
}

impl<'s> TypeGuesser<'s> {
    pub fn new(scene: &'s Scene) -> Self {
        let mut classes_by_property: FxHashMap<Name, FxHashSet<ClassId>> = FxHashMap::default();
        for class in scene.classes() {
            let fields = class.fields.iter().map(|f| f.name.clone());
            let methods = class
                .methods
                .iter()
                .map(|&m| scene.method(m).signature.name.clone());
            for name in fields.chain(methods) {
                classes_by_property.entry(name).or_default().insert(class.id);
            }
        }
        Self {
            scene,
            processor: TypeFactProcessor::new(scene),
            classes_by_property,
        }
    }

    pub fn guess(&self, fact: &TypeFact) -> TypeFact {
        let resolved = self.resolve_type(fact);
        trace!(from = %fact.to_string_limited(), to = %resolved.to_string_limited(), "guessed");
        resolved
    }

    fn resolve_type(&self, fact: &TypeFact) -> TypeFact {
        stacker::maybe_grow(64 * 1024, 1024 * 1024, || {
            match fact.simplify() {
                TypeFact::Array(element) => {
                    if matches!(*element, TypeFact::Unknown) {
                        TypeFact::Array(element)
                    } else {
                        TypeFact::array(self.resolve_type(&element))
                    }
                }
                TypeFact::Object(obj) => self.resolve_object(&obj),
                TypeFact::Guarded(g) => {
                    let inner = self.resolve_type(&g.ty);
                    inner
                        .with_guard(g.guard.clone(), g.negated)
                        .unwrap_or(inner)
                }
                TypeFact::Intersection(types) => {
                    TypeFact::mk_intersection(types.iter().map(|t| self.resolve_type(t)))
                        .map(|t| t.simplify())
                        .unwrap_or(TypeFact::Unknown)
                }
                TypeFact::Union(types) => {
                    let resolved = types
                        .iter()
                        .map(|t| self.resolve_type(t))
                        .filter(|t| !matches!(t, TypeFact::Any));
                    match TypeFact::mk_union(resolved) {
                        Some(union) => union.simplify(),
                        None => TypeFact::Any,
                    }
                }
                other => other,
            }
        })
    }

    fn resolve_object(&self, obj: &ObjectFact) -> TypeFact {
        if obj.cls.is_some() || obj.properties.is_empty() {
            return TypeFact::Object(obj.clone());
        }

        let candidates = self.suitable_classes(obj);
        if candidates.is_empty() {
            return self.special_object(obj);
        }
        if candidates.len() > MAX_GUESSED_CANDIDATES {
            trace!(candidates = candidates.len(), "too many candidate classes");
            return TypeFact::Object(obj.clone());
        }

        let resolved = candidates
            .iter()
            .map(|&id| self.resolve_against(obj, self.scene.class(id)));
        match TypeFact::mk_union(resolved) {
            Some(TypeFact::Union(types)) => TypeFact::Union(types).simplify(),
            Some(single) => single,
            None => TypeFact::Object(obj.clone()),
        }
    }

    fn suitable_classes(&self, obj: &ObjectFact) -> BTreeSet<ClassId> {
        let mut names = obj.properties.keys();
        let Some(first) = names.next() else {
            return BTreeSet::new();
        };
        let mut result: BTreeSet<ClassId> = self
            .classes_by_property
            .get(first)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        for name in names {
            let Some(ids) = self.classes_by_property.get(name) else {
                return BTreeSet::new();
            };
            result.retain(|id| ids.contains(id));
        }
        result
    }

    fn resolve_against(&self, obj: &ObjectFact, class: &Class) -> TypeFact {
        let properties: Properties = obj
            .properties
            .iter()
            .map(|(name, ty)| {
                let resolved = self.resolve_type(ty);
                let refined = match self.declared_member_type(class, name) {
                    Some(declared) => self
                        .processor
                        .intersect(&resolved, &declared)
                        .unwrap_or(resolved),
                    None => resolved,
                };
                (name.clone(), refined)
            })
            .collect();
        TypeFact::object(
            Some(EtsType::Class {
                signature: class.signature.clone(),
            }),
            properties,
        )
    }

    fn declared_member_type(&self, class: &Class, name: &str) -> Option<TypeFact> {
        if let Some(field) = class.field(name) {
            return Some(TypeFact::from_ets_type(&field.ty));
        }
        class
            .methods
            .iter()
            .any(|&m| self.scene.method(m).name() == name)
            .then_some(TypeFact::Function)
    }

    /// Well-known shapes without a declaring class.
    fn special_object(&self, obj: &ObjectFact) -> TypeFact {
        let elements: Vec<TypeFact> = obj
            .properties
            .iter()
            .filter(|(name, _)| name.parse::<i64>().is_ok())
            .map(|(_, ty)| self.resolve_type(ty))
            .collect();
        if !elements.is_empty() {
            let element = TypeFact::mk_union(elements)
                .map(|t| t.simplify())
                .unwrap_or(TypeFact::Unknown);
            return TypeFact::array(element);
        }
        if obj.properties.contains_key("length") && obj.properties.contains_key("splice") {
            return TypeFact::array(TypeFact::Any);
        }
        TypeFact::Object(obj.clone())
    }
}

#[cfg(test)]
#[path = "../tests/guesser_tests.rs"]
mod tests;
