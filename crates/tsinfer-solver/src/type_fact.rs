//! The structural type lattice.
//!
//! A [`TypeFact`] is an immutable tree with `Arc`-shared children, so clones
//! are cheap and facts can be used directly as hash keys in dataflow facts.
//! Union and intersection members are kept in ordered sets: construction
//! through [`TypeFact::mk_union`] / [`TypeFact::mk_intersection`] flattens
//! nested sets of the same kind, collapses singletons and refuses the empty
//! set.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tsinfer_common::limits::DISPLAY_TRUNCATION;
use tsinfer_ir::model::{ANONYMOUS_CLASS_PREFIX, CONSTRUCTOR_NAME, INSTANCE_INIT_METHOD_NAME};
use tsinfer_ir::{EtsType, Name};

pub type Properties = BTreeMap<Name, TypeFact>;
pub type FactSet = BTreeSet<TypeFact>;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeFact {
    Unknown,
    Any,
    String,
    Number,
    Boolean,
    Null,
    Undefined,
    Function,
    Array(Arc<TypeFact>),
    Object(ObjectFact),
    Union(Arc<FactSet>),
    Intersection(Arc<FactSet>),
    Guarded(Arc<GuardedFact>),
}

/// Object shape. `cls == None` means the nominal identity is unknown.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectFact {
    pub cls: Option<EtsType>,
    pub properties: Arc<Properties>,
}

/// `ty` holds only if the runtime check for `guard` passed (or failed, when
/// `negated`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuardedFact {
    pub guard: TypeFact,
    pub negated: bool,
    pub ty: TypeFact,
}

/// The same guard was applied twice with opposite polarity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("guard `{guard}` applied with both polarities")]
pub struct GuardConflict {
    pub guard: TypeFact,
}

/// Members of the builtin `String` interface; an anonymous object touching
/// only these may be a string.
pub const STRING_PROPERTIES: &[&str] = &[
    "length",
    "constructor",
    "anchor",
    "at",
    "big",
    "blink",
    "bold",
    "charAt",
    "charCodeAt",
    "codePointAt",
    "concat",
    "endsWith",
    "fontcolor",
    "fontsize",
    "fixed",
    "includes",
    "indexOf",
    "isWellFormed",
    "italics",
    "lastIndexOf",
    "link",
    "localeCompare",
    "match",
    "matchAll",
    "normalize",
    "padEnd",
    "padStart",
    "repeat",
    "replace",
    "replaceAll",
    "search",
    "slice",
    "small",
    "split",
    "strike",
    "sub",
    "substr",
    "substring",
    "sup",
    "startsWith",
    "toString",
    "toWellFormed",
    "trim",
    "trimStart",
    "trimLeft",
    "trimEnd",
    "trimRight",
    "toLocaleLowerCase",
    "toLocaleUpperCase",
    "toLowerCase",
    "toUpperCase",
    "valueOf",
];

pub fn is_string_property(name: &str) -> bool {
    STRING_PROPERTIES.contains(&name)
}

impl ObjectFact {
    pub fn new(cls: Option<EtsType>, properties: Properties) -> Self {
        // `Object` as a class name carries no nominal information.
        let cls = cls.filter(|c| !matches!(c, EtsType::UnclearRef { name } if &**name == "Object"));
        Self {
            cls,
            properties: Arc::new(properties),
        }
    }

    pub fn property(&self, name: &str) -> Option<&TypeFact> {
        self.properties.get(name)
    }

    pub fn is_anonymous(&self) -> bool {
        self.cls.is_none()
    }

    fn display_name(&self) -> String {
        self.cls
            .as_ref()
            .map(EtsType::type_name)
            .filter(|n| !n.starts_with(ANONYMOUS_CLASS_PREFIX))
            .unwrap_or_else(|| "Object".to_string())
    }
}

impl TypeFact {
    pub fn object(cls: Option<EtsType>, properties: Properties) -> Self {
        Self::Object(ObjectFact::new(cls, properties))
    }

    /// `Object { }` without a class.
    pub fn empty_object() -> Self {
        Self::object(None, Properties::new())
    }

    pub fn object_with<'a>(
        cls: Option<EtsType>,
        properties: impl IntoIterator<Item = (&'a str, TypeFact)>,
    ) -> Self {
        Self::object(
            cls,
            properties
                .into_iter()
                .map(|(name, ty)| (Name::from(name), ty))
                .collect(),
        )
    }

    pub fn array(element: TypeFact) -> Self {
        Self::Array(Arc::new(element))
    }

    /// Union of `types`, or `None` for the empty set.
    pub fn mk_union(types: impl IntoIterator<Item = TypeFact>) -> Option<TypeFact> {
        let mut set = FactSet::new();
        for ty in types {
            match ty {
                TypeFact::Union(members) => set.extend(members.iter().cloned()),
                other => {
                    set.insert(other);
                }
            }
        }
        collapse(set, TypeFact::Union)
    }

    /// Intersection of `types`, or `None` for the empty set.
    pub fn mk_intersection(types: impl IntoIterator<Item = TypeFact>) -> Option<TypeFact> {
        let mut set = FactSet::new();
        for ty in types {
            match ty {
                TypeFact::Intersection(members) => set.extend(members.iter().cloned()),
                other => {
                    set.insert(other);
                }
            }
        }
        collapse(set, TypeFact::Intersection)
    }

    /// `a | b` without any simplification beyond set normalization.
    pub fn either(a: TypeFact, b: TypeFact) -> TypeFact {
        let fallback = a.clone();
        Self::mk_union([a, b]).unwrap_or(fallback)
    }

    /// `a & b` without any simplification beyond set normalization.
    pub fn both(a: TypeFact, b: TypeFact) -> TypeFact {
        let fallback = a.clone();
        Self::mk_intersection([a, b]).unwrap_or(fallback)
    }

    pub fn from_ets_type(ty: &EtsType) -> TypeFact {
        match ty {
            EtsType::Any => TypeFact::Any,
            EtsType::Unknown | EtsType::Void | EtsType::Never => TypeFact::Unknown,
            EtsType::Boolean => TypeFact::Boolean,
            EtsType::Number => TypeFact::Number,
            EtsType::String => TypeFact::String,
            EtsType::Null => TypeFact::Null,
            EtsType::Undefined => TypeFact::Undefined,
            EtsType::Function => TypeFact::Function,
            EtsType::Class { .. } | EtsType::UnclearRef { .. } => {
                TypeFact::object(Some(ty.clone()), Properties::new())
            }
            EtsType::Array { element } => TypeFact::array(TypeFact::from_ets_type(element)),
            EtsType::Union { types } => {
                TypeFact::mk_union(types.iter().map(TypeFact::from_ets_type))
                    .unwrap_or(TypeFact::Unknown)
            }
        }
    }

    /// Replace `any` by `unknown` everywhere. Declared `any` carries no
    /// information, unlike an inferred `any`.
    pub fn fix_any_to_unknown(&self) -> TypeFact {
        match self {
            TypeFact::Any => TypeFact::Unknown,
            TypeFact::Array(element) => TypeFact::array(element.fix_any_to_unknown()),
            TypeFact::Object(obj) => TypeFact::object(
                obj.cls.clone(),
                obj.properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.fix_any_to_unknown()))
                    .collect(),
            ),
            TypeFact::Union(types) => {
                TypeFact::mk_union(types.iter().map(TypeFact::fix_any_to_unknown))
                    .unwrap_or(TypeFact::Unknown)
            }
            other => other.clone(),
        }
    }

    pub fn is_basic(&self) -> bool {
        !matches!(
            self,
            TypeFact::Union(_) | TypeFact::Intersection(_) | TypeFact::Guarded(_)
        )
    }

    pub fn as_object(&self) -> Option<&ObjectFact> {
        match self {
            TypeFact::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Maximum nesting depth of objects, arrays and type sets.
    pub fn complexity(&self) -> usize {
        match self {
            TypeFact::Object(obj) => {
                obj.properties.values().map(TypeFact::complexity).max().unwrap_or(0) + 1
            }
            TypeFact::Array(element) => element.complexity() + 1,
            TypeFact::Union(types) | TypeFact::Intersection(types) => {
                types.iter().map(TypeFact::complexity).max().unwrap_or(0) + 1
            }
            TypeFact::Guarded(g) => g.ty.complexity(),
            _ => 0,
        }
    }

    /// Wrap in a guard. Re-applying a guard already present is a no-op with
    /// the same polarity and a conflict with the opposite one.
    pub fn with_guard(&self, guard: TypeFact, negated: bool) -> Result<TypeFact, GuardConflict> {
        let mut layer = self;
        while let TypeFact::Guarded(g) = layer {
            if g.guard == guard {
                return if g.negated == negated {
                    Ok(self.clone())
                } else {
                    Err(GuardConflict { guard })
                };
            }
            layer = &g.ty;
        }
        Ok(TypeFact::Guarded(Arc::new(GuardedFact {
            guard,
            negated,
            ty: self.clone(),
        })))
    }

    /// Normalize unions and intersections of anonymous objects.
    ///
    /// In a union, an empty anonymous `Object {}` is dropped once any other
    /// object is present. In an intersection, all anonymous objects merge into
    /// one whose properties are the unions of the merged property types.
    /// Nominal objects are left untouched.
    pub fn simplify(&self) -> TypeFact {
        stacker::maybe_grow(64 * 1024, 1024 * 1024, || self.simplify_inner())
    }

    fn simplify_inner(&self) -> TypeFact {
        match self {
            TypeFact::Union(types) => simplify_union(types),
            TypeFact::Intersection(types) => simplify_intersection(types),
            TypeFact::Guarded(g) => TypeFact::Guarded(Arc::new(GuardedFact {
                guard: g.guard.clone(),
                negated: g.negated,
                ty: g.ty.simplify(),
            })),
            TypeFact::Array(element) => TypeFact::array(element.simplify()),
            TypeFact::Object(obj) if obj.cls.is_none() => TypeFact::object(
                None,
                obj.properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.simplify()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Rendering capped at [`DISPLAY_TRUNCATION`] characters, for logs.
    pub fn to_string_limited(&self) -> String {
        let full = self.to_string();
        match full.char_indices().nth(DISPLAY_TRUNCATION) {
            Some((cut, _)) => format!("{}...", &full[..cut]),
            None => full,
        }
    }
}

fn collapse(set: FactSet, wrap: fn(Arc<FactSet>) -> TypeFact) -> Option<TypeFact> {
    if set.len() > 1 {
        return Some(wrap(Arc::new(set)));
    }
    set.into_iter().next()
}

fn simplify_union(types: &FactSet) -> TypeFact {
    let mut flat = FactSet::new();
    for ty in types {
        match ty.simplify() {
            TypeFact::Union(members) => flat.extend(members.iter().cloned()),
            other => {
                flat.insert(other);
            }
        }
    }

    let mut kept = FactSet::new();
    let mut non_empty_object_found = false;
    let mut empty_object = None;
    for ty in flat {
        match &ty {
            TypeFact::Object(obj) if obj.cls.is_none() && obj.properties.is_empty() => {
                empty_object.get_or_insert(ty);
            }
            TypeFact::Object(_) => {
                non_empty_object_found = true;
                kept.insert(ty);
            }
            _ => {
                kept.insert(ty);
            }
        }
    }
    if !non_empty_object_found {
        kept.extend(empty_object);
    }
    collapse(kept, TypeFact::Union).unwrap_or(TypeFact::Unknown)
}

fn simplify_intersection(types: &FactSet) -> TypeFact {
    let mut flat = FactSet::new();
    for ty in types {
        match ty.simplify() {
            TypeFact::Intersection(members) => flat.extend(members.iter().cloned()),
            other => {
                flat.insert(other);
            }
        }
    }

    let mut kept = FactSet::new();
    let mut merged: BTreeMap<Name, FactSet> = BTreeMap::new();
    let mut any_anonymous = false;
    for ty in flat {
        match &ty {
            TypeFact::Object(obj) if obj.cls.is_none() => {
                any_anonymous = true;
                for (name, prop) in obj.properties.iter() {
                    merged.entry(name.clone()).or_default().insert(prop.clone());
                }
            }
            _ => {
                kept.insert(ty);
            }
        }
    }
    if any_anonymous {
        let properties = merged
            .into_iter()
            .filter_map(|(name, types)| {
                TypeFact::mk_union(types).map(|union| (name, union.simplify()))
            })
            .collect();
        kept.insert(TypeFact::object(None, properties));
    }
    collapse(kept, TypeFact::Intersection).unwrap_or(TypeFact::Unknown)
}

// =============================================================================
// Display
// =============================================================================

impl fmt::Display for TypeFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeFact::Unknown => f.write_str("unknown"),
            TypeFact::Any => f.write_str("any"),
            TypeFact::String => f.write_str("string"),
            TypeFact::Number => f.write_str("number"),
            TypeFact::Boolean => f.write_str("boolean"),
            TypeFact::Null => f.write_str("null"),
            TypeFact::Undefined => f.write_str("undefined"),
            TypeFact::Function => f.write_str("function"),
            TypeFact::Array(element) => write!(f, "Array<{element}>"),
            TypeFact::Object(obj) => write!(f, "{obj}"),
            TypeFact::Union(types) => write_set(f, types, " | "),
            TypeFact::Intersection(types) => write_set(f, types, " & "),
            TypeFact::Guarded(g) => {
                let bang = if g.negated { "!" } else { "" };
                write!(f, "guard<{bang}{}>({})", g.guard, g.ty)
            }
        }
    }
}

fn write_set(f: &mut fmt::Formatter<'_>, types: &FactSet, separator: &str) -> fmt::Result {
    let mut rendered: Vec<String> = types
        .iter()
        .map(|ty| match ty {
            TypeFact::Union(_) | TypeFact::Intersection(_) => format!("({ty})"),
            _ => ty.to_string(),
        })
        .collect();
    rendered.sort();
    f.write_str(&rendered.join(separator))
}

impl fmt::Display for ObjectFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.display_name();
        // Methods first (minus constructors), then the other properties.
        let methods = self.properties.iter().filter(|(k, v)| {
            matches!(v, TypeFact::Function)
                && &***k != CONSTRUCTOR_NAME
                && &***k != INSTANCE_INIT_METHOD_NAME
        });
        let others = self
            .properties
            .iter()
            .filter(|(_, v)| !matches!(v, TypeFact::Function));
        let props: Vec<String> = methods
            .chain(others)
            .map(|(k, v)| format!("{k}: {v}"))
            .collect();
        if props.is_empty() {
            write!(f, "{name} {{}}")
        } else {
            write!(f, "{name} {{ {} }}", props.join(", "))
        }
    }
}

impl fmt::Debug for TypeFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Debug for ObjectFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Debug for GuardedFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", TypeFact::Guarded(Arc::new(self.clone())))
    }
}

#[cfg(test)]
#[path = "../tests/type_fact_tests.rs"]
mod tests;
