//! The analyzed program: classes, their fields and methods, and per-method
//! control flow graphs.
//!
//! A [`Scene`] is built once from a [`SceneDecl`] (usually deserialized from
//! JSON) and is read-only afterwards. Methods are addressed by [`MethodId`],
//! statements by [`StmtRef`]. Index `-1` of every method is a synthetic no-op
//! entry whose only successor is the first real statement.

use crate::error::IrError;
use crate::model::{
    ClassSignature, EtsType, Local, MethodSignature, Name, Stmt, CONSTRUCTOR_NAME,
    INSTANCE_INIT_METHOD_NAME,
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use std::fmt;
use tracing::debug;

/// Index of the synthetic entry statement of every method.
pub const SYNTHETIC_ENTRY: i32 = -1;

static SYNTHETIC_NOP: Stmt = Stmt::Nop;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct ClassId(pub u32);

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct MethodId(pub u32);

/// A statement handle: owning method plus index (`-1` = synthetic entry).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtRef {
    pub method: MethodId,
    pub index: i32,
}

impl StmtRef {
    pub const fn new(method: MethodId, index: i32) -> Self {
        Self { method, index }
    }

    pub const fn entry(method: MethodId) -> Self {
        Self::new(method, SYNTHETIC_ENTRY)
    }

    pub const fn is_synthetic_entry(self) -> bool {
        self.index == SYNTHETIC_ENTRY
    }
}

impl fmt::Debug for StmtRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}#{}", self.method.0, self.index)
    }
}

// =============================================================================
// Declarations (serde input)
// =============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SceneDecl {
    #[serde(default)]
    pub classes: Vec<ClassDecl>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassDecl {
    pub signature: ClassSignature,
    #[serde(default)]
    pub super_class: Option<Name>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: Name,
    #[serde(default)]
    pub ty: EtsType,
    #[serde(default)]
    pub is_static: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: Name,
    #[serde(default)]
    pub parameters: Vec<Local>,
    #[serde(default)]
    pub return_type: EtsType,
    /// Declared locals with their static types.
    #[serde(default)]
    pub locals: Vec<Local>,
    #[serde(default)]
    pub stmts: Vec<Stmt>,
    /// Explicit CFG successors per statement. When absent, statements fall
    /// through to the next one; branches then require explicit targets.
    #[serde(default)]
    pub successors: Option<Vec<Vec<u32>>>,
}

// =============================================================================
// Resolved scene
// =============================================================================

#[derive(Debug)]
pub struct Class {
    pub id: ClassId,
    pub signature: ClassSignature,
    pub super_class: Option<Name>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodId>,
}

impl Class {
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| &*f.name == name)
    }
}

#[derive(Debug)]
pub struct Method {
    pub id: MethodId,
    pub class: ClassId,
    pub signature: MethodSignature,
    pub parameters: Vec<Local>,
    pub return_type: EtsType,
    pub locals: Vec<Local>,
    stmts: Vec<Stmt>,
    successors: Vec<SmallVec<[u32; 2]>>,
    predecessors: Vec<SmallVec<[i32; 2]>>,
}

impl Method {
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn stmts(&self) -> &[Stmt] {
        &self.stmts
    }

    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    pub fn stmt(&self, index: i32) -> &Stmt {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.stmts.get(i))
            .unwrap_or(&SYNTHETIC_NOP)
    }

    /// CFG successors of `index`; the synthetic entry flows to statement 0.
    pub fn successors(&self, index: i32) -> SmallVec<[i32; 2]> {
        if index == SYNTHETIC_ENTRY {
            return if self.stmts.is_empty() {
                SmallVec::new()
            } else {
                smallvec![0]
            };
        }
        usize::try_from(index)
            .ok()
            .and_then(|i| self.successors.get(i))
            .map(|succ| succ.iter().map(|&s| s as i32).collect())
            .unwrap_or_default()
    }

    pub fn predecessors(&self, index: i32) -> SmallVec<[i32; 2]> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.predecessors.get(i))
            .cloned()
            .unwrap_or_default()
    }

    /// Statements without successors.
    pub fn exits(&self) -> SmallVec<[i32; 2]> {
        if self.stmts.is_empty() {
            return smallvec![SYNTHETIC_ENTRY];
        }
        (0..self.stmts.len())
            .filter(|&i| self.successors[i].is_empty())
            .map(|i| i as i32)
            .collect()
    }

    pub fn is_constructor(&self) -> bool {
        self.signature.is_constructor()
    }

    pub fn is_instance_init(&self) -> bool {
        &*self.signature.name == INSTANCE_INIT_METHOD_NAME
    }

    /// Declared static type of a local, if any.
    pub fn local_type(&self, name: &str) -> Option<&EtsType> {
        self.locals
            .iter()
            .find(|l| &*l.name == name)
            .map(|l| &l.ty)
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    classes: Vec<Class>,
    methods: Vec<Method>,
    classes_by_name: FxHashMap<Name, SmallVec<[ClassId; 1]>>,
}

impl Scene {
    pub fn from_json(text: &str) -> Result<Self, IrError> {
        let decl: SceneDecl = serde_json::from_str(text)?;
        Self::from_decl(decl)
    }

    pub fn from_decl(decl: SceneDecl) -> Result<Self, IrError> {
        let mut scene = Scene::default();
        for class_decl in decl.classes {
            let class_id = ClassId(scene.classes.len() as u32);
            let mut method_ids = Vec::with_capacity(class_decl.methods.len());
            for method_decl in class_decl.methods {
                let id = MethodId(scene.methods.len() as u32);
                let method = build_method(id, class_id, &class_decl.signature, method_decl)?;
                scene.methods.push(method);
                method_ids.push(id);
            }
            scene
                .classes_by_name
                .entry(class_decl.signature.name.clone())
                .or_default()
                .push(class_id);
            scene.classes.push(Class {
                id: class_id,
                signature: class_decl.signature,
                super_class: class_decl.super_class,
                fields: class_decl.fields,
                methods: method_ids,
            });
        }
        debug!(
            classes = scene.classes.len(),
            methods = scene.methods.len(),
            "scene built"
        );
        Ok(scene)
    }

    pub fn classes(&self) -> &[Class] {
        &self.classes
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn method_ids(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.methods.iter().map(|m| m.id)
    }

    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.0 as usize]
    }

    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.0 as usize]
    }

    pub fn class_of(&self, method: MethodId) -> &Class {
        self.class(self.method(method).class)
    }

    pub fn stmt(&self, stmt: StmtRef) -> &Stmt {
        self.method(stmt.method).stmt(stmt.index)
    }

    pub fn classes_named(&self, name: &str) -> &[ClassId] {
        self.classes_by_name
            .get(name)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

    /// The unique class that `signature` may denote.
    pub fn resolve_class(&self, signature: &ClassSignature) -> Option<&Class> {
        if signature.is_unknown() {
            return None;
        }
        let mut matching = self
            .classes_named(&signature.name)
            .iter()
            .map(|&id| self.class(id))
            .filter(|c| c.signature.may_equal(signature));
        let first = matching.next()?;
        matching.next().is_none().then_some(first)
    }

    /// Look up `Class::method` by names, as written on the command line.
    pub fn find_method(&self, class_name: &str, method_name: &str) -> Option<MethodId> {
        self.classes_named(class_name).iter().find_map(|&id| {
            self.class(id)
                .methods
                .iter()
                .copied()
                .find(|&m| self.method(m).name() == method_name)
        })
    }

    pub fn constructor_of(&self, class: ClassId) -> Option<MethodId> {
        self.class(class)
            .methods
            .iter()
            .copied()
            .find(|&m| self.method(m).name() == CONSTRUCTOR_NAME)
    }
}

fn build_method(
    id: MethodId,
    class: ClassId,
    class_signature: &ClassSignature,
    decl: MethodDecl,
) -> Result<Method, IrError> {
    let signature = MethodSignature::new(class_signature.clone(), &decl.name);
    let len = decl.stmts.len();

    let successors: Vec<SmallVec<[u32; 2]>> = match decl.successors {
        Some(explicit) => {
            if explicit.len() != len {
                return Err(IrError::SuccessorCountMismatch {
                    method: signature.to_string(),
                    stmts: len,
                    successors: explicit.len(),
                });
            }
            explicit.into_iter().map(SmallVec::from_vec).collect()
        }
        None => {
            let mut fall_through = Vec::with_capacity(len);
            for (i, stmt) in decl.stmts.iter().enumerate() {
                if matches!(stmt, Stmt::If { .. }) {
                    return Err(IrError::MissingBranchTargets {
                        method: signature.to_string(),
                        index: i,
                    });
                }
                if stmt.is_terminator() || i + 1 == len {
                    fall_through.push(SmallVec::new());
                } else {
                    fall_through.push(smallvec![(i + 1) as u32]);
                }
            }
            fall_through
        }
    };

    let mut predecessors: Vec<SmallVec<[i32; 2]>> = vec![SmallVec::new(); len];
    if len > 0 {
        predecessors[0].push(SYNTHETIC_ENTRY);
    }
    for (from, targets) in successors.iter().enumerate() {
        for &to in targets {
            let slot = predecessors
                .get_mut(to as usize)
                .ok_or_else(|| IrError::InvalidSuccessor {
                    method: signature.to_string(),
                    index: from,
                    target: to,
                })?;
            slot.push(from as i32);
        }
    }

    Ok(Method {
        id,
        class,
        signature,
        parameters: decl.parameters,
        return_type: decl.return_type,
        locals: decl.locals,
        stmts: decl.stmts,
        successors,
        predecessors,
    })
}

#[cfg(test)]
#[path = "../tests/scene_tests.rs"]
mod tests;
