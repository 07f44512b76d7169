//! Narrowing of backward type schemes with forward observations.
//!
//! Forward facts arrive as `(path, type)` pairs. They are grouped per base
//! and per accessor suffix, unioned within a suffix (every caller is real)
//! and then pushed into the scheme type at the position the suffix names.

use std::collections::BTreeMap;
use tsinfer_ir::{AccessPath, AccessPathBase, Accessor};
use tsinfer_solver::{Properties, TypeFact, TypeFactProcessor};

/// Observed types per accessor suffix of one base.
pub type Refinements = BTreeMap<Vec<Accessor>, TypeFact>;

/// Group `(path, type)` observations by base, then by suffix, unioning
/// types observed at the same suffix.
pub fn group_by_suffix<'f>(
    processor: &TypeFactProcessor<'_>,
    facts: impl IntoIterator<Item = (&'f AccessPath, &'f TypeFact)>,
) -> BTreeMap<AccessPathBase, Refinements> {
    let mut grouped: BTreeMap<AccessPathBase, Refinements> = BTreeMap::new();
    for (path, ty) in facts {
        let suffixes = grouped.entry(path.base.clone()).or_default();
        let suffix = path.accesses.to_vec();
        let merged = match suffixes.get(&suffix) {
            Some(seen) => processor.union(seen, ty),
            None => ty.clone(),
        };
        suffixes.insert(suffix, merged);
    }
    grouped
}

/// Narrow the part of `ty` named by `property` with `refined`.
///
/// `None` means the refinement contradicts the scheme.
pub fn refine_property(
    processor: &TypeFactProcessor<'_>,
    ty: &TypeFact,
    property: &[Accessor],
    refined: &TypeFact,
) -> Option<TypeFact> {
    match ty {
        TypeFact::Guarded(guarded) => {
            let inner = refine_property(processor, &guarded.ty, property, refined)?;
            Some(
                inner
                    .with_guard(guarded.guard.clone(), guarded.negated)
                    .unwrap_or(inner),
            )
        }
        TypeFact::Intersection(members) => {
            let refined_members = members
                .iter()
                .map(|member| refine_property(processor, member, property, refined))
                .collect::<Option<Vec<_>>>()?;
            TypeFact::mk_intersection(refined_members)
        }
        TypeFact::Union(members) => TypeFact::mk_union(
            members
                .iter()
                .filter_map(|member| refine_property(processor, member, property, refined)),
        ),
        TypeFact::Object(obj) => match property.split_first() {
            None => match refined {
                TypeFact::Object(other) if obj.cls.is_none() => Some(TypeFact::object(
                    other.cls.clone(),
                    (*obj.properties).clone(),
                )),
                _ => processor.intersect(ty, refined),
            },
            Some((Accessor::Field { name, .. }, rest)) => {
                let Some(current) = obj.property(name) else {
                    return Some(ty.clone());
                };
                let narrowed = refine_property(processor, current, rest, refined)?;
                let mut properties = (*obj.properties).clone();
                properties.insert(name.clone(), narrowed);
                Some(TypeFact::object(obj.cls.clone(), properties))
            }
            Some((Accessor::Element, _)) => Some(ty.clone()),
        },
        TypeFact::Array(element) => match property.split_first() {
            None => processor.intersect(ty, refined),
            Some((Accessor::Element, rest)) => {
                let narrowed = refine_property(processor, element, rest, refined)?;
                Some(TypeFact::array(narrowed))
            }
            Some((Accessor::Field { .. }, _)) => Some(ty.clone()),
        },
        // `.f[*].g: T` on an untyped base becomes `{ f: Array<{ g: T }> }`.
        TypeFact::Unknown => Some(property.iter().rev().fold(refined.clone(), |inner, accessor| {
            match accessor {
                Accessor::Field { name, .. } => TypeFact::object_with(None, [(&**name, inner)]),
                Accessor::Element => TypeFact::array(inner),
            }
        })),
        _ if property.is_empty() => processor.intersect(ty, refined),
        _ => Some(ty.clone()),
    }
}

/// Apply every refinement to `scheme`, shortest suffix first.
///
/// A contradicting refinement is skipped; `on_conflict` receives the type
/// before and the refinement that could not be applied.
pub fn refine_scheme(
    processor: &TypeFactProcessor<'_>,
    scheme: &TypeFact,
    refinements: &Refinements,
    mut on_conflict: impl FnMut(&TypeFact, &[Accessor], &TypeFact),
) -> TypeFact {
    let mut ordered: Vec<_> = refinements.iter().collect();
    ordered.sort_by_key(|(suffix, _)| suffix.len());

    let mut current = scheme.clone();
    for (suffix, refined) in ordered {
        match refine_property(processor, &current, suffix, refined) {
            Some(narrowed) => current = narrowed,
            None => on_conflict(&current, suffix, refined),
        }
    }
    current
}

/// Build a type out of observations alone: the root observation (or an
/// empty object when only nested paths were seen), with observed nested
/// types filled in. `unknown` leftovers become `any`.
pub fn assemble(refinements: &Refinements) -> TypeFact {
    let root = match refinements.get(&Vec::<Accessor>::new()) {
        Some(root) => root.clone(),
        None if !refinements.is_empty() => TypeFact::empty_object(),
        None => TypeFact::Any,
    };
    refine_properties(&root, &mut Vec::new(), refinements)
}

/// Fill in the properties of `ty` below `prefix` from `refinements`.
pub fn refine_properties(
    ty: &TypeFact,
    prefix: &mut Vec<Accessor>,
    refinements: &Refinements,
) -> TypeFact {
    match ty {
        TypeFact::Unknown => TypeFact::Any,
        TypeFact::Object(obj) => {
            let mut properties: Properties = (*obj.properties).clone();
            for (suffix, observed) in refinements.range(prefix.clone()..) {
                if !suffix.starts_with(prefix.as_slice()) {
                    break;
                }
                if let [Accessor::Field { name, .. }] = &suffix[prefix.len()..] {
                    properties.insert(name.clone(), observed.clone());
                }
            }
            for (name, property) in properties.iter_mut() {
                prefix.push(Accessor::field(name));
                *property = refine_properties(property, prefix, refinements);
                prefix.pop();
            }
            TypeFact::object(obj.cls.clone(), properties)
        }
        TypeFact::Array(element) => {
            prefix.push(Accessor::Element);
            let element = refinements.get(&*prefix).unwrap_or(&**element).clone();
            let element = refine_properties(&element, prefix, refinements);
            prefix.pop();
            TypeFact::array(element)
        }
        TypeFact::Guarded(guarded) => {
            let inner = refine_properties(&guarded.ty, prefix, refinements);
            inner
                .with_guard(guarded.guard.clone(), guarded.negated)
                .unwrap_or(inner)
        }
        TypeFact::Union(members) => TypeFact::mk_union(
            members
                .iter()
                .map(|member| refine_properties(member, prefix, refinements)),
        )
        .unwrap_or(TypeFact::Any),
        TypeFact::Intersection(members) => TypeFact::mk_intersection(
            members
                .iter()
                .map(|member| refine_properties(member, prefix, refinements)),
        )
        .unwrap_or(TypeFact::Any),
        _ => ty.clone(),
    }
}

#[cfg(test)]
#[path = "../tests/refine_tests.rs"]
mod tests;
