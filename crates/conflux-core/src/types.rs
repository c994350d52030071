//! Type model produced by type checking
//!
//! A [`Package`] is the type system's view of a unit: its path, its name
//! and the scope of package-level objects. Packages are shared through
//! [`PackageRef`], which compares and hashes by identity, so two ad-hoc
//! packages that happen to share a path stay distinct.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ast::NodeId;
use crate::error::CoreError;
use crate::fileset::Pos;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    /// Result of an erroneous expression; compatible with everything
    Invalid,
    Int,
    String,
    Bool,
    Func(Signature),
    /// Result of calling a function without a result type
    Void,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<Type>,
    pub result: Option<Box<Type>>,
}

impl Type {
    /// Look up a predeclared type by name
    pub fn from_name(name: &str) -> Result<Type, CoreError> {
        match name {
            "int" => Ok(Type::Int),
            "string" => Ok(Type::String),
            "bool" => Ok(Type::Bool),
            other => Err(CoreError::UnknownType(other.to_string())),
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Type::Invalid)
    }

    /// Assignability: identical types, with `Invalid` absorbing errors
    pub fn assignable_to(&self, target: &Type) -> bool {
        self.is_invalid() || target.is_invalid() || self == target
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Invalid => f.write_str("invalid type"),
            Type::Int => f.write_str("int"),
            Type::String => f.write_str("string"),
            Type::Bool => f.write_str("bool"),
            Type::Void => f.write_str("()"),
            Type::Func(sig) => {
                f.write_str("func(")?;
                for (i, param) in sig.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                f.write_str(")")?;
                if let Some(result) = &sig.result {
                    write!(f, " {}", result)?;
                }
                Ok(())
            }
        }
    }
}

/// Value of a constant expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstValue {
    Int(i64),
    Str(String),
    Bool(bool),
}

impl ConstValue {
    pub fn ty(&self) -> Type {
        match self {
            ConstValue::Int(_) => Type::Int,
            ConstValue::Str(_) => Type::String,
            ConstValue::Bool(_) => Type::Bool,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Str(v) => write!(f, "{:?}", v),
            ConstValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Const,
    Var,
    Func,
    Param,
    /// The local name of an imported package
    PkgName,
}

/// A named language entity
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub name: String,
    pub kind: ObjectKind,
    pub ty: Type,
    pub pos: Pos,
    /// Path of the declaring package; `None` for locals
    pub pkg: Option<String>,
    /// Folded value, for constants
    pub value: Option<ConstValue>,
    /// Imported package, for `PkgName` objects
    pub imported: Option<PackageRef>,
}

impl Object {
    pub fn new(name: impl Into<String>, kind: ObjectKind, ty: Type, pos: Pos) -> Self {
        Self {
            name: name.into(),
            kind,
            ty,
            pos,
            pkg: None,
            value: None,
            imported: None,
        }
    }

    pub fn in_package(mut self, path: impl Into<String>) -> Self {
        self.pkg = Some(path.into());
        self
    }

    pub fn with_value(mut self, value: ConstValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn is_exported(&self) -> bool {
        crate::ast::is_exported(&self.name)
    }
}

pub type ObjectRef = Arc<Object>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Package,
    File,
    Function,
}

/// Name-to-object table
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    kind: ScopeKind,
    names: BTreeMap<String, ObjectRef>,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            names: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Insert `obj` unless its name is taken; returns the existing object on conflict
    pub fn insert(&mut self, obj: ObjectRef) -> Result<(), ObjectRef> {
        if let Some(existing) = self.names.get(&obj.name) {
            return Err(existing.clone());
        }
        self.names.insert(obj.name.clone(), obj);
        Ok(())
    }

    /// Insert or overwrite an entry
    pub fn replace(&mut self, obj: ObjectRef) {
        self.names.insert(obj.name.clone(), obj);
    }

    pub fn lookup(&self, name: &str) -> Option<&ObjectRef> {
        self.names.get(name)
    }

    /// Names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectRef> {
        self.names.values()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub type ScopeRef = Arc<Scope>;

/// The type system's view of one package
#[derive(Debug)]
pub struct Package {
    path: String,
    name: String,
    scope: Scope,
    imports: Vec<PackageRef>,
    complete: bool,
}

impl Package {
    pub fn new(
        path: impl Into<String>,
        name: impl Into<String>,
        scope: Scope,
        imports: Vec<PackageRef>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            scope,
            imports,
            complete: true,
        }
    }

    /// A package known only by path and name, e.g. a dependency mentioned
    /// by symbol data that was never read itself
    pub fn incomplete(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            scope: Scope::new(ScopeKind::Package),
            imports: Vec::new(),
            complete: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn imports(&self) -> &[PackageRef] {
        &self.imports
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

/// Shared handle to a [`Package`] with identity semantics
#[derive(Clone)]
pub struct PackageRef(Arc<Package>);

impl PackageRef {
    pub fn new(pkg: Package) -> Self {
        PackageRef(Arc::new(pkg))
    }

    pub fn ptr_eq(a: &PackageRef, b: &PackageRef) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl Deref for PackageRef {
    type Target = Package;

    fn deref(&self) -> &Package {
        &self.0
    }
}

impl PartialEq for PackageRef {
    fn eq(&self, other: &Self) -> bool {
        PackageRef::ptr_eq(self, other)
    }
}

impl Eq for PackageRef {}

impl Hash for PackageRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "package {} ({:?})", self.0.name, self.0.path)
    }
}

/// Canonical mapping from import path to package handle
pub type ImportMap = BTreeMap<String, PackageRef>;

/// A resolved `pkg.Name` selector
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub package: PackageRef,
    pub object: ObjectRef,
}

/// Facts recorded while type checking one package
#[derive(Debug, Clone, Default)]
pub struct TypeInfo {
    /// Type of every checked expression
    pub types: HashMap<NodeId, Type>,
    /// Value of every constant expression
    pub values: HashMap<NodeId, ConstValue>,
    /// Identifier to the object it declares
    pub defs: HashMap<NodeId, ObjectRef>,
    /// Identifier to the object it refers to
    pub uses: HashMap<NodeId, ObjectRef>,
    /// Objects without a declaring identifier, e.g. unaliased imports
    pub implicits: HashMap<NodeId, ObjectRef>,
    /// Scopes opened by files and function declarations
    pub scopes: HashMap<NodeId, ScopeRef>,
    /// Selector expressions resolved to imported objects
    pub selections: HashMap<NodeId, Selection>,
}

impl TypeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_of(&self, expr: NodeId) -> Option<&Type> {
        self.types.get(&expr)
    }

    /// Object declared or referenced by an identifier
    pub fn object_of(&self, ident: NodeId) -> Option<&ObjectRef> {
        self.defs.get(&ident).or_else(|| self.uses.get(&ident))
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
            && self.values.is_empty()
            && self.defs.is_empty()
            && self.uses.is_empty()
            && self.implicits.is_empty()
            && self.scopes.is_empty()
            && self.selections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_ref_identity() {
        let a = PackageRef::new(Package::incomplete("main", "main"));
        let b = PackageRef::new(Package::incomplete("main", "main"));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());

        let mut set = std::collections::HashSet::new();
        set.insert(a.clone());
        set.insert(b);
        set.insert(a);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_scope_rejects_duplicates() {
        let mut scope = Scope::new(ScopeKind::Package);
        let x = Arc::new(Object::new("X", ObjectKind::Const, Type::Int, Pos::NONE));
        assert!(scope.insert(x.clone()).is_ok());
        let dup = Arc::new(Object::new("X", ObjectKind::Var, Type::Bool, Pos::NONE));
        let existing = scope.insert(dup).unwrap_err();
        assert_eq!(existing.kind, ObjectKind::Const);
        assert_eq!(scope.len(), 1);
    }

    #[test]
    fn test_type_display() {
        let sig = Type::Func(Signature {
            params: vec![Type::Int, Type::String],
            result: Some(Box::new(Type::Bool)),
        });
        assert_eq!(sig.to_string(), "func(int, string) bool");
        assert!(Type::Invalid.assignable_to(&Type::Int));
        assert!(!Type::Int.assignable_to(&Type::String));
        assert!(matches!(
            Type::from_name("float"),
            Err(CoreError::UnknownType(_))
        ));
    }
}
