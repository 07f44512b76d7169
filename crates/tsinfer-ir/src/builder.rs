//! Programmatic scene construction, used by tests, benches and embedders
//! that do not go through JSON.

use crate::error::IrError;
use crate::model::{ClassSignature, EtsType, Local, Stmt, Value};
use crate::scene::{ClassDecl, FieldDecl, MethodDecl, Scene, SceneDecl};
use rustc_hash::FxHashMap;

pub const DEFAULT_FILE_NAME: &str = "main.ts";

#[derive(Debug, Default)]
pub struct SceneBuilder {
    classes: Vec<ClassDecl>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(mut self, class: ClassBuilder) -> Self {
        self.classes.push(class.decl);
        self
    }

    pub fn into_decl(self) -> SceneDecl {
        SceneDecl {
            classes: self.classes,
        }
    }

    pub fn build(self) -> Result<Scene, IrError> {
        Scene::from_decl(self.into_decl())
    }
}

#[derive(Debug)]
pub struct ClassBuilder {
    decl: ClassDecl,
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        Self::in_file(name, DEFAULT_FILE_NAME)
    }

    pub fn in_file(name: &str, file: &str) -> Self {
        Self {
            decl: ClassDecl {
                signature: ClassSignature::new(name, file),
                super_class: None,
                fields: Vec::new(),
                methods: Vec::new(),
            },
        }
    }

    pub fn field(mut self, name: &str, ty: EtsType) -> Self {
        self.decl.fields.push(FieldDecl {
            name: name.into(),
            ty,
            is_static: false,
        });
        self
    }

    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.decl.methods.push(method.finish());
        self
    }
}

/// Statements are appended in order and fall through to the next one unless
/// redirected with [`MethodBuilder::jump`] or given branch targets.
#[derive(Debug)]
pub struct MethodBuilder {
    name: String,
    parameters: Vec<Local>,
    return_type: EtsType,
    locals: Vec<Local>,
    stmts: Vec<Stmt>,
    targets: FxHashMap<usize, Vec<u32>>,
}

impl MethodBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parameters: Vec::new(),
            return_type: EtsType::Unknown,
            locals: Vec::new(),
            stmts: Vec::new(),
            targets: FxHashMap::default(),
        }
    }

    pub fn param(mut self, name: &str) -> Self {
        self.parameters.push(Local::new(name));
        self
    }

    pub fn local(mut self, name: &str, ty: EtsType) -> Self {
        self.locals.push(Local::typed(name, ty));
        self
    }

    pub fn returns(mut self, ty: EtsType) -> Self {
        self.return_type = ty;
        self
    }

    /// Index the next pushed statement will get.
    pub fn next_index(&self) -> usize {
        self.stmts.len()
    }

    pub fn push(&mut self, stmt: Stmt) -> usize {
        self.stmts.push(stmt);
        self.stmts.len() - 1
    }

    pub fn assign(&mut self, lhv: Value, rhv: Value) -> usize {
        self.push(Stmt::assign(lhv, rhv))
    }

    pub fn call(&mut self, expr: Value) -> usize {
        self.push(Stmt::Call { expr })
    }

    pub fn ret(&mut self, value: Option<Value>) -> usize {
        self.push(Stmt::Return { value })
    }

    /// Push a branch; targets are set later with [`MethodBuilder::branch_targets`].
    pub fn branch(&mut self, condition: Value) -> usize {
        self.push(Stmt::If { condition })
    }

    pub fn branch_targets(&mut self, branch: usize, if_false: usize, if_true: usize) {
        self.targets
            .insert(branch, vec![if_false as u32, if_true as u32]);
    }

    /// Make `from` flow to `to` instead of falling through.
    pub fn jump(&mut self, from: usize, to: usize) {
        self.targets.insert(from, vec![to as u32]);
    }

    fn finish(self) -> MethodDecl {
        let len = self.stmts.len();
        let successors = (0..len)
            .map(|i| {
                if let Some(explicit) = self.targets.get(&i) {
                    explicit.clone()
                } else if self.stmts[i].is_terminator() || i + 1 == len {
                    Vec::new()
                } else {
                    vec![(i + 1) as u32]
                }
            })
            .collect();
        MethodDecl {
            name: self.name.into(),
            parameters: self.parameters,
            return_type: self.return_type,
            locals: self.locals,
            stmts: self.stmts,
            successors: Some(successors),
        }
    }
}
