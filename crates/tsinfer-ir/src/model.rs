//! Three-address IR consumed by the analyses.
//!
//! Values nest only as deep as three-address form allows: an instance field
//! reference has a local (or `this`) as its instance, a call's arguments are
//! plain values, and so on. The analyses rely on this but do not enforce it.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Shared, immutable identifier text.
pub type Name = Arc<str>;

pub const CONSTRUCTOR_NAME: &str = "constructor";
pub const INSTANCE_INIT_METHOD_NAME: &str = "%instInit";
pub const ANONYMOUS_CLASS_PREFIX: &str = "%AC";
pub const UNKNOWN_FILE_NAME: &str = "%unk";
/// Prefix of compiler-generated temporaries.
pub const TEMP_LOCAL_PREFIX: char = '%';

// =============================================================================
// Signatures
// =============================================================================

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassSignature {
    pub name: Name,
    #[serde(default)]
    pub file: Name,
}

impl ClassSignature {
    pub fn new(name: &str, file: &str) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.name.is_empty()
    }

    fn file_is_unknown(&self) -> bool {
        self.file.is_empty() || &*self.file == UNKNOWN_FILE_NAME
    }

    /// Both the class name and its declaring file are known.
    pub fn is_ideal(&self) -> bool {
        !self.is_unknown() && !self.file_is_unknown()
    }

    /// Whether `self` may denote the same class as `other`.
    ///
    /// Unknown parts compare as "maybe".
    pub fn may_equal(&self, other: &Self) -> bool {
        if self.is_unknown() || other.is_unknown() {
            return true;
        }
        if self.name != other.name {
            return false;
        }
        self.file_is_unknown() || other.file_is_unknown() || self.file == other.file
    }
}

impl fmt::Debug for ClassSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for ClassSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSignature {
    #[serde(default = "unknown_class")]
    pub class: ClassSignature,
    pub name: Name,
}

fn unknown_class() -> ClassSignature {
    ClassSignature::new("", "")
}

impl MethodSignature {
    pub fn new(class: ClassSignature, name: &str) -> Self {
        Self {
            class,
            name: name.into(),
        }
    }

    pub fn is_constructor(&self) -> bool {
        &*self.name == CONSTRUCTOR_NAME
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.class, self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldSignature {
    #[serde(default = "unknown_class")]
    pub class: ClassSignature,
    pub name: Name,
    #[serde(default)]
    pub ty: EtsType,
}

// =============================================================================
// Static types
// =============================================================================

/// Declared (static) type as written in the IR.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EtsType {
    Any,
    #[default]
    Unknown,
    Void,
    Never,
    Boolean,
    Number,
    String,
    Null,
    Undefined,
    Function,
    Class { signature: ClassSignature },
    /// A named type the front end could not resolve to a class.
    UnclearRef { name: Name },
    Array { element: Box<EtsType> },
    Union { types: Vec<EtsType> },
}

impl EtsType {
    pub fn class(name: &str, file: &str) -> Self {
        Self::Class {
            signature: ClassSignature::new(name, file),
        }
    }

    pub fn array(element: EtsType) -> Self {
        Self::Array {
            element: Box::new(element),
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Self::Any => "any".into(),
            Self::Unknown => "unknown".into(),
            Self::Void => "void".into(),
            Self::Never => "never".into(),
            Self::Boolean => "boolean".into(),
            Self::Number => "number".into(),
            Self::String => "string".into(),
            Self::Null => "null".into(),
            Self::Undefined => "undefined".into(),
            Self::Function => "function".into(),
            Self::Class { signature } => signature.name.to_string(),
            Self::UnclearRef { name } => name.to_string(),
            Self::Array { element } => format!("{}[]", element.type_name()),
            Self::Union { types } => types
                .iter()
                .map(EtsType::type_name)
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }

    pub fn class_signature(&self) -> Option<&ClassSignature> {
        match self {
            Self::Class { signature } => Some(signature),
            _ => None,
        }
    }
}

// =============================================================================
// Values
// =============================================================================

/// An `f64` with total equality, so constants can key hash maps.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for OrderedFloat {}

impl Hash for OrderedFloat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Constant {
    String(Name),
    Number(OrderedFloat),
    Boolean(bool),
    Null,
    Undefined,
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::String(s) => write!(f, "{s:?}"),
            Constant::Number(n) => write!(f, "{}", n.0),
            Constant::Boolean(b) => write!(f, "{b}"),
            Constant::Null => f.write_str("null"),
            Constant::Undefined => f.write_str("undefined"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Exp,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    NullishCoalescing,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Sub
                | Self::Mul
                | Self::Div
                | Self::Rem
                | Self::Exp
                | Self::BitAnd
                | Self::BitOr
                | Self::BitXor
                | Self::Shl
                | Self::Shr
                | Self::UShr
        )
    }

    pub fn is_relation(self) -> bool {
        matches!(
            self,
            Self::Eq
                | Self::NotEq
                | Self::StrictEq
                | Self::StrictNotEq
                | Self::Lt
                | Self::LtEq
                | Self::Gt
                | Self::GtEq
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::StrictEq)
    }

    pub fn is_inequality(self) -> bool {
        matches!(self, Self::NotEq | Self::StrictNotEq)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Exp => "**",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::UShr => ">>>",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::StrictEq => "===",
            Self::StrictNotEq => "!==",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::NullishCoalescing => "??",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Local {
    pub name: Name,
    #[serde(default)]
    pub ty: EtsType,
}

impl Local {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            ty: EtsType::Unknown,
        }
    }

    pub fn typed(name: &str, ty: EtsType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn is_temp(&self) -> bool {
        self.name.starts_with(TEMP_LOCAL_PREFIX)
    }
}

/// Any operand or right-hand side of a statement.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Value {
    Local(Local),
    This,
    Parameter {
        index: u32,
    },
    Constant {
        value: Constant,
    },
    InstanceField {
        instance: Box<Value>,
        field: FieldSignature,
    },
    StaticField {
        field: FieldSignature,
    },
    ArrayAccess {
        array: Box<Value>,
        index: Box<Value>,
    },
    New {
        ty: EtsType,
    },
    NewArray {
        element: EtsType,
        size: Box<Value>,
    },
    Cast {
        arg: Box<Value>,
        ty: EtsType,
    },
    Typeof {
        arg: Box<Value>,
    },
    In {
        property: Box<Value>,
        object: Box<Value>,
    },
    Unary {
        op: UnaryOp,
        arg: Box<Value>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Value>,
        right: Box<Value>,
    },
    InstanceCall {
        instance: Box<Value>,
        method: MethodSignature,
        #[serde(default)]
        args: Vec<Value>,
    },
    StaticCall {
        method: MethodSignature,
        #[serde(default)]
        args: Vec<Value>,
    },
}

impl Value {
    pub fn local(name: &str) -> Self {
        Self::Local(Local::new(name))
    }

    pub fn string(s: &str) -> Self {
        Self::Constant {
            value: Constant::String(s.into()),
        }
    }

    pub fn number(n: f64) -> Self {
        Self::Constant {
            value: Constant::Number(OrderedFloat(n)),
        }
    }

    pub fn boolean(b: bool) -> Self {
        Self::Constant {
            value: Constant::Boolean(b),
        }
    }

    pub fn field(instance: Value, name: &str) -> Self {
        Self::InstanceField {
            instance: Box::new(instance),
            field: FieldSignature {
                class: unknown_class(),
                name: name.into(),
                ty: EtsType::Unknown,
            },
        }
    }

    pub fn element(array: Value, index: Value) -> Self {
        Self::ArrayAccess {
            array: Box::new(array),
            index: Box::new(index),
        }
    }

    pub fn binary(op: BinaryOp, left: Value, right: Value) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Self::InstanceCall { .. } | Self::StaticCall { .. })
    }

    pub fn call_args(&self) -> &[Value] {
        match self {
            Self::InstanceCall { args, .. } | Self::StaticCall { args, .. } => args,
            _ => &[],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Local(local) => f.write_str(&local.name),
            Value::This => f.write_str("this"),
            Value::Parameter { index } => write!(f, "arg{index}"),
            Value::Constant { value } => write!(f, "{value}"),
            Value::InstanceField { instance, field } => write!(f, "{instance}.{}", field.name),
            Value::StaticField { field } => write!(f, "{}.{}", field.class, field.name),
            Value::ArrayAccess { array, index } => write!(f, "{array}[{index}]"),
            Value::New { ty } => write!(f, "new {ty:?}"),
            Value::NewArray { element, size } => write!(f, "new Array<{element:?}>({size})"),
            Value::Cast { arg, ty } => write!(f, "{arg} as {ty:?}"),
            Value::Typeof { arg } => write!(f, "typeof {arg}"),
            Value::In { property, object } => write!(f, "{property} in {object}"),
            Value::Unary { op, arg } => match op {
                UnaryOp::Neg => write!(f, "-{arg}"),
                UnaryOp::Not => write!(f, "!{arg}"),
                UnaryOp::BitNot => write!(f, "~{arg}"),
            },
            Value::Binary { op, left, right } => write!(f, "{left} {} {right}", op.symbol()),
            Value::InstanceCall {
                instance,
                method,
                args,
            } => {
                write!(f, "{instance}.{}(", method.name)?;
                write_args(f, args)?;
                f.write_str(")")
            }
            Value::StaticCall { method, args } => {
                write!(f, "{method}(")?;
                write_args(f, args)?;
                f.write_str(")")
            }
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Value]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

// =============================================================================
// Statements
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stmt {
    Nop,
    Assign {
        lhv: Value,
        rhv: Value,
    },
    Call {
        expr: Value,
    },
    Return {
        #[serde(default)]
        value: Option<Value>,
    },
    /// Two-way branch. CFG successors are ordered `[false, true]`.
    If {
        condition: Value,
    },
    Throw {
        value: Value,
    },
}

impl Stmt {
    pub fn assign(lhv: Value, rhv: Value) -> Self {
        Self::Assign { lhv, rhv }
    }

    /// The call expression of a call statement or of `x := call(...)`.
    pub fn call_expr(&self) -> Option<&Value> {
        match self {
            Stmt::Call { expr } if expr.is_call() => Some(expr),
            Stmt::Assign { rhv, .. } if rhv.is_call() => Some(rhv),
            _ => None,
        }
    }

    /// Terminators never fall through to the next statement.
    pub fn is_terminator(&self) -> bool {
        matches!(self, Stmt::Return { .. } | Stmt::Throw { .. })
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Nop => f.write_str("nop"),
            Stmt::Assign { lhv, rhv } => write!(f, "{lhv} := {rhv}"),
            Stmt::Call { expr } => write!(f, "{expr}"),
            Stmt::Return { value: Some(v) } => write!(f, "return {v}"),
            Stmt::Return { value: None } => f.write_str("return"),
            Stmt::If { condition } => write!(f, "if ({condition})"),
            Stmt::Throw { value } => write!(f, "throw {value}"),
        }
    }
}
