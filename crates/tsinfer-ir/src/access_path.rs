//! Symbolic storage locations: a base plus a chain of accessors.

use crate::model::{Constant, Name, Value};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::ops::Add;
use thiserror::Error;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AccessPathBase {
    This,
    Static,
    Arg(u32),
    Local(Name),
    Const(Constant),
}

impl AccessPathBase {
    /// `This` and `Arg(_)`: the bases exported in per-method summaries.
    pub fn is_exported(&self) -> bool {
        matches!(self, Self::This | Self::Arg(_))
    }

    pub fn local_name(&self) -> Option<&str> {
        match self {
            Self::Local(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Debug for AccessPathBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for AccessPathBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::This => f.write_str("<this>"),
            Self::Static => f.write_str("<static>"),
            Self::Arg(i) => write!(f, "arg({i})"),
            Self::Local(name) => f.write_str(name),
            Self::Const(c) => write!(f, "{c}"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Accessor {
    Field {
        name: Name,
        #[serde(default)]
        is_static: bool,
    },
    /// Any array index; all indices collapse to one accessor.
    Element,
}

impl Accessor {
    pub fn field(name: &str) -> Self {
        Self::Field {
            name: name.into(),
            is_static: false,
        }
    }

    pub fn field_name(&self) -> Option<&Name> {
        match self {
            Self::Field { name, .. } => Some(name),
            Self::Element => None,
        }
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field { name, .. } => write!(f, ".{name}"),
            Self::Element => f.write_str("[*]"),
        }
    }
}

pub type Accessors = SmallVec<[Accessor; 2]>;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessPath {
    pub base: AccessPathBase,
    #[serde(default)]
    pub accesses: Accessors,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not an access path")]
pub struct NotAnAccessPath(pub String);

impl AccessPath {
    pub fn new(base: AccessPathBase, accesses: impl IntoIterator<Item = Accessor>) -> Self {
        Self {
            base,
            accesses: accesses.into_iter().collect(),
        }
    }

    pub fn from_base(base: AccessPathBase) -> Self {
        Self {
            base,
            accesses: SmallVec::new(),
        }
    }

    pub fn local(name: &str) -> Self {
        Self::from_base(AccessPathBase::Local(name.into()))
    }

    pub fn is_bare(&self) -> bool {
        self.accesses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.accesses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accesses.is_empty()
    }

    /// Same path on another base.
    pub fn rebase(&self, base: AccessPathBase) -> Self {
        Self {
            base,
            accesses: self.accesses.clone(),
        }
    }

    /// Whether `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &AccessPath) -> bool {
        self.base == prefix.base && self.accesses.starts_with(&prefix.accesses)
    }

    /// Accessors after `prefix`, or `None` if `prefix` does not match.
    pub fn suffix_after(&self, prefix: &AccessPath) -> Option<&[Accessor]> {
        self.starts_with(prefix)
            .then(|| &self.accesses[prefix.accesses.len()..])
    }

    /// Convert an IR value into the location it denotes.
    ///
    /// Casts are transparent; compound expressions have no location.
    pub fn from_value(value: &Value) -> Result<Self, NotAnAccessPath> {
        match value {
            Value::Local(local) => Ok(Self::local(&local.name)),
            Value::This => Ok(Self::from_base(AccessPathBase::This)),
            Value::Parameter { index } => Ok(Self::from_base(AccessPathBase::Arg(*index))),
            Value::Constant { value } => Ok(Self::from_base(AccessPathBase::Const(value.clone()))),
            Value::InstanceField { instance, field } => {
                Ok(Self::from_value(instance)? + Accessor::field(&field.name))
            }
            Value::StaticField { field } => Ok(Self::new(
                AccessPathBase::Static,
                [Accessor::Field {
                    name: field.name.clone(),
                    is_static: true,
                }],
            )),
            Value::ArrayAccess { array, .. } => Ok(Self::from_value(array)? + Accessor::Element),
            Value::Cast { arg, .. } => Self::from_value(arg),
            other => Err(NotAnAccessPath(other.to_string())),
        }
    }
}

/// Shorthand for [`AccessPath::from_value`].
pub fn to_path(value: &Value) -> Result<AccessPath, NotAnAccessPath> {
    AccessPath::from_value(value)
}

impl Add<Accessor> for AccessPath {
    type Output = AccessPath;

    fn add(mut self, accessor: Accessor) -> AccessPath {
        self.accesses.push(accessor);
        self
    }
}

impl Add<Accessor> for &AccessPath {
    type Output = AccessPath;

    fn add(self, accessor: Accessor) -> AccessPath {
        self.clone() + accessor
    }
}

impl Add<&[Accessor]> for &AccessPath {
    type Output = AccessPath;

    fn add(self, tail: &[Accessor]) -> AccessPath {
        let mut path = self.clone();
        path.accesses.extend(tail.iter().cloned());
        path
    }
}

impl fmt::Debug for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        for accessor in &self.accesses {
            write!(f, "{accessor}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/access_path_tests.rs"]
mod tests;
