//! Union and intersection of type facts.
//!
//! The processor optionally borrows a [`Scene`]: intersecting a nominal object
//! then also accounts for the methods its class declares. Without a scene the
//! algebra is purely structural.

use crate::type_fact::{FactSet, ObjectFact, Properties, TypeFact, is_string_property};
use std::sync::Arc;
use tsinfer_ir::{EtsType, Scene};

#[derive(Clone, Copy, Default)]
pub struct TypeFactProcessor<'s> {
    scene: Option<&'s Scene>,
}

impl<'s> TypeFactProcessor<'s> {
    pub fn new(scene: &'s Scene) -> Self {
        Self { scene: Some(scene) }
    }

    /// A processor that knows no classes.
    pub fn detached() -> Self {
        Self { scene: None }
    }

    pub fn union(&self, a: &TypeFact, b: &TypeFact) -> TypeFact {
        if a == b {
            return a.clone();
        }
        stacker::maybe_grow(64 * 1024, 1024 * 1024, || self.union_inner(a, b))
    }

    fn union_inner(&self, a: &TypeFact, b: &TypeFact) -> TypeFact {
        match (a, b) {
            (TypeFact::Object(o1), TypeFact::Object(o2)) => self.union_objects(o1, o2),
            (TypeFact::Object(obj), TypeFact::String) | (TypeFact::String, TypeFact::Object(obj)) => {
                union_object_string(obj)
            }
            (TypeFact::Union(members), other) | (other, TypeFact::Union(members)) => {
                let mut result = FactSet::new();
                for member in members.iter() {
                    match self.union(member, other) {
                        TypeFact::Union(nested) => result.extend(nested.iter().cloned()),
                        single => {
                            result.insert(single);
                        }
                    }
                }
                TypeFact::mk_union(result).unwrap_or_else(|| other.clone())
            }
            _ => TypeFact::either(a.clone(), b.clone()),
        }
    }

    fn union_objects(&self, o1: &ObjectFact, o2: &ObjectFact) -> TypeFact {
        if let (Some(c1), Some(c2)) = (&o1.cls, &o2.cls) {
            if c1 != c2 {
                return TypeFact::either(TypeFact::Object(o1.clone()), TypeFact::Object(o2.clone()));
            }
        }

        let mut common = Properties::new();
        let mut only1 = Properties::new();
        for (name, t1) in o1.properties.iter() {
            match o2.properties.get(name) {
                Some(t2) => {
                    common.insert(name.clone(), self.union(t1, t2));
                }
                None => {
                    only1.insert(name.clone(), t1.clone());
                }
            }
        }
        let only2: Properties = o2
            .properties
            .iter()
            .filter(|(name, _)| !o1.properties.contains_key(*name))
            .map(|(name, t)| (name.clone(), t.clone()))
            .collect();

        let residual1 = TypeFact::object(o1.cls.clone(), only1);
        let residual2 = TypeFact::object(o2.cls.clone(), only2);

        if common.is_empty() {
            return TypeFact::either(residual1, residual2);
        }

        let common_cls = if o1.cls == o2.cls { o1.cls.clone() } else { None };
        let common_object = TypeFact::object(common_cls, common);

        let residuals_empty = [&residual1, &residual2]
            .iter()
            .all(|r| r.as_object().is_some_and(|o| o.properties.is_empty()));
        if residuals_empty {
            return common_object;
        }

        TypeFact::both(common_object, TypeFact::either(residual1, residual2))
    }

    /// `None` when the two facts have no value in common.
    pub fn intersect(&self, a: &TypeFact, b: &TypeFact) -> Option<TypeFact> {
        if a == b {
            return Some(a.clone());
        }
        stacker::maybe_grow(64 * 1024, 1024 * 1024, || self.intersect_inner(a, b))
    }

    /// `other == None` stands for "no constraint".
    pub fn intersect_opt(&self, a: &TypeFact, other: Option<&TypeFact>) -> Option<TypeFact> {
        match other {
            Some(b) => self.intersect(a, b),
            None => Some(a.clone()),
        }
    }

    fn intersect_inner(&self, a: &TypeFact, b: &TypeFact) -> Option<TypeFact> {
        match b {
            TypeFact::Unknown => return Some(a.clone()),
            TypeFact::Any => return Some(TypeFact::Any),
            _ => {}
        }

        match a {
            TypeFact::Unknown => Some(b.clone()),
            TypeFact::Any => Some(TypeFact::Any),
            TypeFact::String
            | TypeFact::Number
            | TypeFact::Boolean
            | TypeFact::Null
            | TypeFact::Undefined => match b {
                TypeFact::Union(_) | TypeFact::Intersection(_) | TypeFact::Guarded(_) => {
                    self.intersect(b, a)
                }
                TypeFact::Object(obj) if matches!(a, TypeFact::String) => {
                    intersect_object_string(obj)
                }
                _ => None,
            },
            TypeFact::Function => match b {
                TypeFact::Object(_) => TypeFact::mk_intersection([a.clone(), b.clone()]),
                TypeFact::Union(_) | TypeFact::Intersection(_) | TypeFact::Guarded(_) => {
                    self.intersect(b, a)
                }
                _ => None,
            },
            TypeFact::Array(e1) => match b {
                TypeFact::Array(e2) => self.intersect(e1, e2).map(TypeFact::array),
                TypeFact::Union(_) | TypeFact::Intersection(_) | TypeFact::Guarded(_) => {
                    self.intersect(b, a)
                }
                _ => None,
            },
            TypeFact::Object(o1) => match b {
                TypeFact::Object(o2) => self.intersect_objects(o1, o2),
                TypeFact::String => intersect_object_string(o1),
                TypeFact::Function => TypeFact::mk_intersection([a.clone(), b.clone()]),
                TypeFact::Union(_) | TypeFact::Intersection(_) | TypeFact::Guarded(_) => {
                    self.intersect(b, a)
                }
                _ => None,
            },
            // Members with nothing in common with `b` drop out.
            TypeFact::Union(members) => {
                TypeFact::mk_union(members.iter().filter_map(|member| self.intersect(member, b)))
            }
            TypeFact::Intersection(members) => {
                let mut result = FactSet::new();
                for member in members.iter() {
                    match self.intersect(member, b)? {
                        TypeFact::Intersection(nested) => result.extend(nested.iter().cloned()),
                        single => {
                            result.insert(single);
                        }
                    }
                }
                TypeFact::mk_intersection(result)
            }
            TypeFact::Guarded(g1) => {
                if let TypeFact::Guarded(g2) = b {
                    if g1.guard == g2.guard {
                        return if g1.negated == g2.negated {
                            self.intersect(&g1.ty, &g2.ty)?
                                .with_guard(g1.guard.clone(), g1.negated)
                                .ok()
                        } else {
                            Some(self.union(&g1.ty, &g2.ty))
                        };
                    }
                }
                TypeFact::mk_intersection([a.clone(), b.clone()])
            }
        }
    }

    fn intersect_objects(&self, o1: &ObjectFact, o2: &ObjectFact) -> Option<TypeFact> {
        let cls = intersect_classes(&o1.cls, &o2.cls)?;
        let mut properties = self.real_properties(o1);
        for (name, ty) in self.real_properties(o2) {
            let merged = match properties.get(&name) {
                Some(current) => self.intersect(current, &ty)?,
                None => ty,
            };
            properties.insert(name, merged);
        }
        Some(TypeFact::Object(ObjectFact {
            cls,
            properties: Arc::new(properties),
        }))
    }

    /// Declared properties plus, for a class known to the scene, its methods
    /// as `function` properties.
    pub fn real_properties(&self, obj: &ObjectFact) -> Properties {
        let mut properties = (*obj.properties).clone();
        let Some((scene, class)) = self
            .scene
            .zip(obj.cls.as_ref().and_then(EtsType::class_signature))
            .and_then(|(scene, signature)| scene.resolve_class(signature).map(|c| (scene, c)))
        else {
            return properties;
        };
        for &method in &class.methods {
            let name = scene.method(method).signature.name.clone();
            match properties.get(&name) {
                Some(old) => {
                    if let Some(merged) = self.intersect(old, &TypeFact::Function) {
                        properties.insert(name, merged);
                    }
                }
                None => {
                    properties.insert(name, TypeFact::Function);
                }
            }
        }
        properties
    }
}

/// `Some(None)` is "no nominal class", outer `None` is "incompatible".
fn intersect_classes(c1: &Option<EtsType>, c2: &Option<EtsType>) -> Option<Option<EtsType>> {
    match (c1, c2) {
        (a, b) if a == b => Some(a.clone()),
        (None, other) | (other, None) => Some(other.clone()),
        _ => None,
    }
}

fn is_string_class(cls: &EtsType) -> bool {
    match cls {
        EtsType::String => true,
        EtsType::UnclearRef { name } => &**name == "String",
        EtsType::Class { signature } => &*signature.name == "String",
        _ => false,
    }
}

fn intersect_object_string(obj: &ObjectFact) -> Option<TypeFact> {
    match &obj.cls {
        Some(cls) if is_string_class(cls) => Some(TypeFact::String),
        Some(_) => None,
        None => {
            let properties = obj
                .properties
                .iter()
                .filter(|(name, _)| is_string_property(name))
                .map(|(name, ty)| (name.clone(), ty.clone()))
                .collect();
            Some(TypeFact::object(None, properties))
        }
    }
}

fn union_object_string(obj: &ObjectFact) -> TypeFact {
    match &obj.cls {
        Some(cls) if is_string_class(cls) => TypeFact::String,
        Some(_) => TypeFact::either(TypeFact::Object(obj.clone()), TypeFact::String),
        None if obj.properties.keys().all(|name| is_string_property(name)) => TypeFact::String,
        None => TypeFact::either(TypeFact::Object(obj.clone()), TypeFact::String),
    }
}

impl TypeFact {
    /// Structural union, without scene information.
    pub fn union(&self, other: &TypeFact) -> TypeFact {
        TypeFactProcessor::detached().union(self, other)
    }

    /// Structural intersection, without scene information.
    pub fn intersect(&self, other: &TypeFact) -> Option<TypeFact> {
        TypeFactProcessor::detached().intersect(self, other)
    }
}

#[cfg(test)]
#[path = "../tests/processor_tests.rs"]
mod tests;
