//! What one inference run hands back.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use tsinfer_ir::{AccessPathBase, ClassId, MethodId, Scene};
use tsinfer_solver::{TypeFact, TypeGuesser};

/// Inferred types of the bases of one method.
pub type MethodTypeScheme = BTreeMap<AccessPathBase, TypeFact>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeInferenceResult {
    pub inferred_types: BTreeMap<MethodId, MethodTypeScheme>,
    pub inferred_return_type: BTreeMap<MethodId, TypeFact>,
    pub inferred_combined_this_type: BTreeMap<ClassId, TypeFact>,
}

impl TypeInferenceResult {
    pub fn types_of(&self, method: MethodId) -> Option<&MethodTypeScheme> {
        self.inferred_types.get(&method)
    }

    pub fn type_of(&self, method: MethodId, base: &AccessPathBase) -> Option<&TypeFact> {
        self.inferred_types.get(&method)?.get(base)
    }

    pub fn return_type_of(&self, method: MethodId) -> Option<&TypeFact> {
        self.inferred_return_type.get(&method)
    }

    pub fn combined_this_type_of(&self, class: ClassId) -> Option<&TypeFact> {
        self.inferred_combined_this_type.get(&class)
    }

    /// Resolve anonymous object shapes in every entry to declared classes.
    pub fn with_guessed_types(&self, scene: &Scene) -> Self {
        let guesser = TypeGuesser::new(scene);
        Self {
            inferred_types: self
                .inferred_types
                .iter()
                .map(|(&method, types)| {
                    let guessed = types
                        .iter()
                        .map(|(base, ty)| (base.clone(), guesser.guess(ty)))
                        .collect();
                    (method, guessed)
                })
                .collect(),
            inferred_return_type: self
                .inferred_return_type
                .iter()
                .map(|(&method, ty)| (method, guesser.guess(ty)))
                .collect(),
            inferred_combined_this_type: self
                .inferred_combined_this_type
                .iter()
                .map(|(&class, ty)| (class, guesser.guess(ty)))
                .collect(),
        }
    }

    /// Render every entry against the names in `scene`.
    pub fn report(&self, scene: &Scene) -> InferenceReport {
        let mut methods = IndexMap::new();
        for method in scene.methods() {
            let types = self.types_of(method.id);
            let returns = self.return_type_of(method.id);
            if types.is_none() && returns.is_none() {
                continue;
            }
            methods.insert(
                method.signature.to_string(),
                MethodReport {
                    types: types
                        .into_iter()
                        .flatten()
                        .map(|(base, ty)| (base.to_string(), ty.to_string()))
                        .collect(),
                    returns: returns.map(TypeFact::to_string),
                },
            );
        }
        let classes = self
            .inferred_combined_this_type
            .iter()
            .map(|(&class, ty)| (scene.class(class).signature.to_string(), ty.to_string()))
            .collect();
        InferenceReport { methods, classes }
    }
}

/// Serializable rendering of a [`TypeInferenceResult`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InferenceReport {
    pub methods: IndexMap<String, MethodReport>,
    pub classes: IndexMap<String, String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MethodReport {
    pub types: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
}

#[cfg(test)]
#[path = "../tests/result_tests.rs"]
mod tests;
