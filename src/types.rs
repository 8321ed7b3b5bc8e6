use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Opaque handle to a semantic type.
///
/// The registry that gives a type meaning - its parameter slots and its place in
/// the structural subtype relation - lives outside this crate and is consulted
/// through [`TypeSystem`]. Inside this crate a `TypeRef` is only ever compared,
/// cloned, and handed back to the registry.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef(Arc<str>);

impl TypeRef {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        TypeRef(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TypeRef({})", self.0)
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        TypeRef::new(name)
    }
}

impl Borrow<str> for TypeRef {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The external type registry, queried by the tuple and signature codecs.
///
/// Implementations resolve a type's declared parameter slots and decide the
/// structural subtype relation. Loading type definitions (over the network or
/// otherwise) is entirely the implementation's concern; codecs only ever ask
/// these three questions.
pub trait TypeSystem {
    /// Number of parameter slots the type declares.
    fn parameter_count(&self, ty: &TypeRef) -> Result<usize>;

    /// The declared type of parameter slot `index`.
    fn parameter(&self, ty: &TypeRef, index: usize) -> Result<TypeRef>;

    /// Whether `ty` is structurally based on `base`. Every type is based on
    /// itself.
    fn is_based_on(&self, ty: &TypeRef, base: &TypeRef) -> bool;
}

/// In-memory [`TypeSystem`] with explicitly registered types.
///
/// Collaborators with a real registry will not use this; it exists for tests
/// and for programs that work with a closed, locally known set of types.
#[derive(Clone, Debug, Default)]
pub struct MapTypeSystem {
    types: HashMap<TypeRef, TypeEntry>,
}

#[derive(Clone, Debug)]
struct TypeEntry {
    parameters: Vec<TypeRef>,
    base: Option<TypeRef>,
}

impl MapTypeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a leaf type with no parameter slots.
    pub fn register(&mut self, ty: impl Into<TypeRef>) -> TypeRef {
        self.register_with(ty, Vec::new(), None)
    }

    /// Register a type with the given parameter slots.
    pub fn register_parameterized(
        &mut self,
        ty: impl Into<TypeRef>,
        parameters: Vec<TypeRef>,
    ) -> TypeRef {
        self.register_with(ty, parameters, None)
    }

    /// Register a subtype of an already-registered base.
    pub fn register_based_on(&mut self, ty: impl Into<TypeRef>, base: TypeRef) -> TypeRef {
        self.register_with(ty, Vec::new(), Some(base))
    }

    fn register_with(
        &mut self,
        ty: impl Into<TypeRef>,
        parameters: Vec<TypeRef>,
        base: Option<TypeRef>,
    ) -> TypeRef {
        let ty = ty.into();
        self.types.insert(ty.clone(), TypeEntry { parameters, base });
        ty
    }

    fn entry(&self, ty: &TypeRef) -> Result<&TypeEntry> {
        self.types
            .get(ty)
            .ok_or_else(|| Error::TypeSystem(format!("unknown type {}", ty)))
    }
}

impl TypeSystem for MapTypeSystem {
    fn parameter_count(&self, ty: &TypeRef) -> Result<usize> {
        Ok(self.entry(ty)?.parameters.len())
    }

    fn parameter(&self, ty: &TypeRef, index: usize) -> Result<TypeRef> {
        let entry = self.entry(ty)?;
        entry.parameters.get(index).cloned().ok_or_else(|| {
            Error::TypeSystem(format!(
                "type {} has {} parameter slots, requested {}",
                ty,
                entry.parameters.len(),
                index
            ))
        })
    }

    fn is_based_on(&self, ty: &TypeRef, base: &TypeRef) -> bool {
        if ty == base {
            return true;
        }
        let mut current = ty.clone();
        while let Some(entry) = self.types.get(&current) {
            match &entry.base {
                Some(parent) if parent == base => return true,
                Some(parent) => current = parent.clone(),
                None => return false,
            }
        }
        false
    }
}
