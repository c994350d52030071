//! Reference type checker for conflux source
//!
//! Checking runs in phases over the files of one package:
//!
//! 1. imports of every file are resolved through the caller's
//!    [`Importer`] and bound in that file's scope
//! 2. package-level declarations are collected
//! 3. each declaration is typed on demand, in source order, so that a
//!    constant may refer to one declared later (or in another file)
//! 4. function bodies are checked, unless disabled by [`CheckOptions`]

use std::collections::HashMap;
use std::sync::Arc;

use conflux_core::ast::{
    self, BinaryOp, Decl, Expr, ExprKind, FuncDecl, Ident, SourceFile, Stmt, TypeExpr, UnaryOp,
    ValueDecl,
};
use conflux_core::{
    ConstValue, FileSet, Object, ObjectKind, ObjectRef, Package, PackageRef, Pos, Scope,
    ScopeKind, Selection, Signature, Type, TypeInfo,
};

use crate::constant;
use crate::{CheckOptions, Importer, TypeChecker, TypeError};

/// Checker for the conflux source language
#[derive(Debug, Default, Clone, Copy)]
pub struct Checker;

impl Checker {
    pub fn new() -> Self {
        Self
    }
}

impl TypeChecker for Checker {
    fn check(
        &self,
        opts: &CheckOptions,
        path: &str,
        fset: &FileSet,
        files: &[SourceFile],
        info: &mut TypeInfo,
        importer: &mut dyn Importer,
    ) -> (PackageRef, Option<TypeError>) {
        let mut run = Run::new(opts, path, fset, files, info);
        run.collect_imports(importer);
        run.collect_decls();
        for idx in 0..run.decls.len() {
            run.resolve(idx);
        }
        if !opts.ignore_func_bodies {
            run.check_bodies();
        }
        run.finish()
    }
}

/// Type and constant value of a checked expression
#[derive(Debug, Clone)]
struct Operand {
    ty: Type,
    value: Option<ConstValue>,
}

impl Operand {
    fn invalid() -> Self {
        Self {
            ty: Type::Invalid,
            value: None,
        }
    }

    fn of(ty: Type) -> Self {
        Self { ty, value: None }
    }

    fn constant(value: ConstValue) -> Self {
        Self {
            ty: value.ty(),
            value: Some(value),
        }
    }

    fn from_object(obj: &Object) -> Self {
        Self {
            ty: obj.ty.clone(),
            value: match obj.kind {
                ObjectKind::Const => obj.value.clone(),
                _ => None,
            },
        }
    }
}

enum DeclState {
    Unresolved,
    Resolving,
    Done(ObjectRef),
}

struct PkgDecl<'a> {
    decl: &'a Decl,
    file: usize,
    state: DeclState,
}

struct Run<'a> {
    opts: &'a CheckOptions,
    path: &'a str,
    fset: &'a FileSet,
    files: &'a [SourceFile],
    info: &'a mut TypeInfo,
    name: String,
    file_scopes: Vec<Scope>,
    imports: Vec<PackageRef>,
    decls: Vec<PkgDecl<'a>>,
    by_name: HashMap<String, usize>,
    /// File whose scope is consulted for unqualified names
    cur_file: usize,
    /// Function scopes, innermost last
    locals: Vec<Scope>,
    first_error: Option<TypeError>,
}

impl<'a> Run<'a> {
    fn new(
        opts: &'a CheckOptions,
        path: &'a str,
        fset: &'a FileSet,
        files: &'a [SourceFile],
        info: &'a mut TypeInfo,
    ) -> Self {
        let name = match files.first() {
            Some(file) => file.package_name().to_string(),
            None => path.rsplit('/').next().unwrap_or(path).to_string(),
        };
        Self {
            opts,
            path,
            fset,
            files,
            info,
            name,
            file_scopes: Vec::with_capacity(files.len()),
            imports: Vec::new(),
            decls: Vec::new(),
            by_name: HashMap::new(),
            cur_file: 0,
            locals: Vec::new(),
            first_error: None,
        }
    }

    fn error(&mut self, pos: Pos, message: impl Into<String>) {
        let err = TypeError::new(self.fset.position(pos).ok(), message);
        tracing::trace!("{}: {}", self.path, err);
        if let Some(sink) = &self.opts.error_sink {
            sink(&err);
        }
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }

    // ---------- phase 1: imports ----------

    fn collect_imports(&mut self, importer: &mut dyn Importer) {
        let files = self.files;
        for file in files {
            if file.package_name() != self.name {
                let message = format!("package {}; expected {}", file.package_name(), self.name);
                self.error(file.package.pos, message);
            }

            let mut scope = Scope::new(ScopeKind::File);
            for spec in &file.imports {
                let pkg = match importer.import(&spec.path) {
                    Ok(pkg) => pkg,
                    Err(err) => {
                        self.error(spec.pos, format!("could not import {} ({})", spec.path, err));
                        continue;
                    }
                };
                if !self.imports.iter().any(|p| PackageRef::ptr_eq(p, &pkg)) {
                    self.imports.push(pkg.clone());
                }

                let (local, pos) = match &spec.alias {
                    Some(alias) => (alias.name.clone(), alias.pos),
                    None => (pkg.name().to_string(), spec.pos),
                };
                let mut obj = Object::new(local, ObjectKind::PkgName, Type::Invalid, pos)
                    .in_package(self.path);
                obj.imported = Some(pkg);
                let obj = Arc::new(obj);

                if let Err(existing) = scope.insert(obj.clone()) {
                    self.error(pos, format!("{} redeclared in this block", existing.name));
                    continue;
                }
                match &spec.alias {
                    Some(alias) => self.info.defs.insert(alias.id, obj),
                    None => self.info.implicits.insert(spec.id, obj),
                };
            }
            self.file_scopes.push(scope);
        }
    }

    // ---------- phase 2 and 3: package-level declarations ----------

    fn collect_decls(&mut self) {
        let files = self.files;
        for (file_idx, file) in files.iter().enumerate() {
            for decl in &file.decls {
                let name = decl.name();
                if self.by_name.contains_key(&name.name) {
                    self.error(name.pos, format!("{} redeclared in this block", name.name));
                    continue;
                }
                self.by_name.insert(name.name.clone(), self.decls.len());
                self.decls.push(PkgDecl {
                    decl,
                    file: file_idx,
                    state: DeclState::Unresolved,
                });
            }
        }

        let mut conflicts = Vec::new();
        for scope in &self.file_scopes {
            for obj in scope.objects() {
                if self.by_name.contains_key(&obj.name) {
                    let from = obj.imported.as_ref().map(|p| p.path().to_string());
                    conflicts.push((obj.pos, obj.name.clone(), from.unwrap_or_default()));
                }
            }
        }
        for (pos, name, from) in conflicts {
            self.error(
                pos,
                format!("{} already declared through import of package {}", name, from),
            );
        }
    }

    /// Type the package-level declaration at `idx`, once
    fn resolve(&mut self, idx: usize) -> ObjectRef {
        let decl = self.decls[idx].decl;
        if let DeclState::Done(obj) = &self.decls[idx].state {
            return obj.clone();
        }
        if matches!(self.decls[idx].state, DeclState::Resolving) {
            let name = decl.name();
            self.error(name.pos, format!("initialization cycle for {}", name.name));
            return Arc::new(Object::new(
                name.name.clone(),
                ObjectKind::Var,
                Type::Invalid,
                name.pos,
            ));
        }

        self.decls[idx].state = DeclState::Resolving;
        let saved_file = std::mem::replace(&mut self.cur_file, self.decls[idx].file);
        let saved_locals = std::mem::take(&mut self.locals);

        let obj = match decl {
            Decl::Const(d) => self.value_object(d, ObjectKind::Const),
            Decl::Var(d) => self.value_object(d, ObjectKind::Var),
            Decl::Func(f) => self.func_object(f),
        };
        let obj = Arc::new(obj.in_package(self.path));

        self.cur_file = saved_file;
        self.locals = saved_locals;
        self.info.defs.insert(decl.name().id, obj.clone());
        self.decls[idx].state = DeclState::Done(obj.clone());
        obj
    }

    fn value_object(&mut self, d: &ValueDecl, kind: ObjectKind) -> Object {
        let operand = self.value_decl(d, kind);
        let obj = Object::new(d.name.name.clone(), kind, operand.ty, d.name.pos);
        match operand.value {
            Some(value) if kind == ObjectKind::Const => obj.with_value(value),
            _ => obj,
        }
    }

    /// Type of a `const` or `var` declaration, from its annotation or its value
    fn value_decl(&mut self, d: &ValueDecl, kind: ObjectKind) -> Operand {
        let declared = d.ty.as_ref().map(|t| self.named_type(t));
        let operand = self.value_of(&d.value);

        if kind == ObjectKind::Const && operand.value.is_none() && !operand.ty.is_invalid() {
            self.error(
                d.value.pos,
                format!("value of type {} is not constant", operand.ty),
            );
        }

        match declared {
            Some(ty) => {
                if !operand.ty.assignable_to(&ty) {
                    self.error(
                        d.value.pos,
                        format!(
                            "cannot use value of type {} as {} value in declaration of {}",
                            operand.ty, ty, d.name.name
                        ),
                    );
                }
                let value = operand.value.filter(|v| v.ty() == ty);
                Operand { ty, value }
            }
            None => operand,
        }
    }

    fn func_object(&mut self, f: &FuncDecl) -> Object {
        let params = f.params.iter().map(|p| self.named_type(&p.ty)).collect();
        let result = f.result.as_ref().map(|t| Box::new(self.named_type(t)));
        Object::new(
            f.name.name.clone(),
            ObjectKind::Func,
            Type::Func(Signature { params, result }),
            f.name.pos,
        )
    }

    fn named_type(&mut self, t: &TypeExpr) -> Type {
        match Type::from_name(&t.name.name) {
            Ok(ty) => ty,
            Err(_) => {
                self.error(t.name.pos, format!("undeclared type: {}", t.name.name));
                Type::Invalid
            }
        }
    }

    // ---------- phase 4: function bodies ----------

    fn check_bodies(&mut self) {
        let files = self.files;
        for (file_idx, file) in files.iter().enumerate() {
            self.cur_file = file_idx;
            for decl in &file.decls {
                let Decl::Func(f) = decl else { continue };
                // Redeclared functions have no object and are not checked.
                let Some(obj) = self.info.defs.get(&f.name.id).cloned() else {
                    continue;
                };
                if let Type::Func(sig) = &obj.ty {
                    self.func_body(f, sig);
                }
            }
        }
    }

    fn func_body(&mut self, f: &FuncDecl, sig: &Signature) {
        let mut scope = Scope::new(ScopeKind::Function);
        for (param, ty) in f.params.iter().zip(&sig.params) {
            let obj = Arc::new(Object::new(
                param.name.name.clone(),
                ObjectKind::Param,
                ty.clone(),
                param.name.pos,
            ));
            if scope.insert(obj.clone()).is_err() {
                self.error(
                    param.name.pos,
                    format!("duplicate argument {}", param.name.name),
                );
                continue;
            }
            self.info.defs.insert(param.name.id, obj);
        }
        self.locals.push(scope);

        let result = sig.result.as_deref();
        for stmt in &f.body.stmts {
            self.stmt(stmt, result);
        }
        if result.is_some() && !matches!(f.body.stmts.last(), Some(Stmt::Return { .. })) {
            self.error(f.body.end, "missing return");
        }

        if let Some(scope) = self.locals.pop() {
            self.info.scopes.insert(f.id, Arc::new(scope));
        }
    }

    fn stmt(&mut self, stmt: &Stmt, result: Option<&Type>) {
        match stmt {
            Stmt::Var(d) => {
                let operand = self.value_decl(d, ObjectKind::Var);
                let obj = Arc::new(Object::new(
                    d.name.name.clone(),
                    ObjectKind::Var,
                    operand.ty,
                    d.name.pos,
                ));
                let inserted = match self.locals.last_mut() {
                    Some(scope) => scope.insert(obj.clone()).is_ok(),
                    None => false,
                };
                if inserted {
                    self.info.defs.insert(d.name.id, obj);
                } else {
                    self.error(d.name.pos, format!("{} redeclared in this block", d.name.name));
                }
            }
            Stmt::Return { value, pos } => match (value, result) {
                (None, None) => {}
                (None, Some(_)) => self.error(*pos, "missing return value"),
                (Some(e), None) => {
                    self.expr(e);
                    self.error(e.pos, "too many return values");
                }
                (Some(e), Some(want)) => {
                    let operand = self.value_of(e);
                    if !operand.ty.assignable_to(want) {
                        self.error(
                            e.pos,
                            format!(
                                "cannot use value of type {} as {} value in return statement",
                                operand.ty, want
                            ),
                        );
                    }
                }
            },
            Stmt::Expr(e) => {
                self.expr(e);
                if !matches!(e.kind, ExprKind::Call { .. }) {
                    self.error(e.pos, "expression is not used");
                }
            }
        }
    }

    // ---------- expressions ----------

    fn lookup(&mut self, name: &str) -> Option<ObjectRef> {
        for scope in self.locals.iter().rev() {
            if let Some(obj) = scope.lookup(name) {
                return Some(obj.clone());
            }
        }
        if let Some(obj) = self
            .file_scopes
            .get(self.cur_file)
            .and_then(|scope| scope.lookup(name))
        {
            return Some(obj.clone());
        }
        let idx = *self.by_name.get(name)?;
        Some(self.resolve(idx))
    }

    /// Check an expression used for its value
    fn value_of(&mut self, e: &Expr) -> Operand {
        let operand = self.expr(e);
        if operand.ty == Type::Void {
            self.error(e.pos, "function call has no value");
            return Operand::invalid();
        }
        operand
    }

    fn expr(&mut self, e: &Expr) -> Operand {
        let operand = match &e.kind {
            ExprKind::Int(v) => Operand::constant(ConstValue::Int(*v)),
            ExprKind::Str(s) => Operand::constant(ConstValue::Str(s.clone())),
            ExprKind::Bool(b) => Operand::constant(ConstValue::Bool(*b)),
            ExprKind::Ident(id) => self.ident(id),
            ExprKind::Selector { base, sel } => self.selector(e, base, sel),
            ExprKind::Call { func, args } => self.call(e, func, args),
            ExprKind::Unary { op, operand } => self.unary(e, *op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.binary(e, *op, lhs, rhs),
            ExprKind::Paren(inner) => self.expr(inner),
        };

        if !operand.ty.is_invalid() {
            self.info.types.insert(e.id, operand.ty.clone());
        }
        if let Some(value) = &operand.value {
            self.info.values.insert(e.id, value.clone());
        }
        operand
    }

    fn ident(&mut self, id: &Ident) -> Operand {
        let Some(obj) = self.lookup(&id.name) else {
            self.error(id.pos, format!("undeclared name: {}", id.name));
            return Operand::invalid();
        };
        self.info.uses.insert(id.id, obj.clone());
        if obj.kind == ObjectKind::PkgName {
            self.error(id.pos, format!("use of package {} without selector", id.name));
            return Operand::invalid();
        }
        Operand::from_object(&obj)
    }

    fn selector(&mut self, e: &Expr, base: &Expr, sel: &Ident) -> Operand {
        let pkg = match &base.kind {
            ExprKind::Ident(id) => match self.lookup(&id.name) {
                Some(obj) if obj.kind == ObjectKind::PkgName => {
                    self.info.uses.insert(id.id, obj.clone());
                    obj.imported.clone()
                }
                _ => None,
            },
            _ => None,
        };

        let Some(pkg) = pkg else {
            let operand = self.value_of(base);
            if !operand.ty.is_invalid() {
                self.error(
                    sel.pos,
                    format!("{} undefined (type {} has no field {})", sel.name, operand.ty, sel.name),
                );
            }
            return Operand::invalid();
        };

        if !ast::is_exported(&sel.name) {
            self.error(
                sel.pos,
                format!("name {} not exported by package {}", sel.name, pkg.name()),
            );
            return Operand::invalid();
        }
        let Some(obj) = pkg.scope().lookup(&sel.name).cloned() else {
            self.error(sel.pos, format!("undefined: {}.{}", pkg.name(), sel.name));
            return Operand::invalid();
        };

        self.info.uses.insert(sel.id, obj.clone());
        let operand = Operand::from_object(&obj);
        self.info.selections.insert(
            e.id,
            Selection {
                package: pkg,
                object: obj,
            },
        );
        operand
    }

    fn call(&mut self, e: &Expr, func: &Expr, args: &[Expr]) -> Operand {
        let callee = self.value_of(func);
        let operands: Vec<Operand> = args.iter().map(|arg| self.value_of(arg)).collect();

        let sig = match callee.ty {
            Type::Func(sig) => sig,
            Type::Invalid => return Operand::invalid(),
            other => {
                self.error(func.pos, format!("cannot call non-function of type {}", other));
                return Operand::invalid();
            }
        };

        if operands.len() != sig.params.len() {
            let which = if operands.len() < sig.params.len() {
                "not enough"
            } else {
                "too many"
            };
            self.error(
                e.pos,
                format!(
                    "{} arguments in call (have {}, want {})",
                    which,
                    operands.len(),
                    sig.params.len()
                ),
            );
        } else {
            for ((arg, operand), want) in args.iter().zip(&operands).zip(&sig.params) {
                if !operand.ty.assignable_to(want) {
                    self.error(
                        arg.pos,
                        format!(
                            "cannot use value of type {} as {} value in argument",
                            operand.ty, want
                        ),
                    );
                }
            }
        }

        Operand::of(sig.result.map(|ty| *ty).unwrap_or(Type::Void))
    }

    fn unary(&mut self, e: &Expr, op: UnaryOp, x: &Expr) -> Operand {
        let x = self.value_of(x);
        if x.ty.is_invalid() {
            return Operand::invalid();
        }
        let want = match op {
            UnaryOp::Neg => Type::Int,
            UnaryOp::Not => Type::Bool,
        };
        if x.ty != want {
            self.error(
                e.pos,
                format!(
                    "invalid operation: operator {} not defined on value of type {}",
                    op, x.ty
                ),
            );
            return Operand::invalid();
        }

        match &x.value {
            Some(v) => match constant::unary(op, v) {
                Ok(folded) => Operand::constant(folded),
                Err(err) => {
                    self.error(e.pos, err.to_string());
                    Operand::invalid()
                }
            },
            None => Operand::of(want),
        }
    }

    fn binary(&mut self, e: &Expr, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Operand {
        let x = self.value_of(lhs);
        let y = self.value_of(rhs);
        if x.ty.is_invalid() || y.ty.is_invalid() {
            return Operand::invalid();
        }
        if x.ty != y.ty {
            self.error(
                e.pos,
                format!("invalid operation: mismatched types {} and {}", x.ty, y.ty),
            );
            return Operand::invalid();
        }

        let defined = match op {
            BinaryOp::Add | BinaryOp::Lt | BinaryOp::Gt => {
                matches!(x.ty, Type::Int | Type::String)
            }
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => x.ty == Type::Int,
            BinaryOp::Eq | BinaryOp::Ne => !matches!(x.ty, Type::Func(_)),
            BinaryOp::And | BinaryOp::Or => x.ty == Type::Bool,
        };
        if !defined {
            self.error(
                e.pos,
                format!(
                    "invalid operation: operator {} not defined on value of type {}",
                    op, x.ty
                ),
            );
            return Operand::invalid();
        }

        let ty = if op.is_comparison() {
            Type::Bool
        } else {
            x.ty.clone()
        };
        match (&x.value, &y.value) {
            (Some(a), Some(b)) => match constant::binary(op, a, b) {
                Ok(folded) => Operand::constant(folded),
                Err(err) => {
                    self.error(e.pos, err.to_string());
                    Operand::invalid()
                }
            },
            (None, Some(ConstValue::Int(0))) if op == BinaryOp::Div => {
                self.error(rhs.pos, "division by zero");
                Operand::invalid()
            }
            _ => Operand::of(ty),
        }
    }

    // ---------- result ----------

    fn finish(self) -> (PackageRef, Option<TypeError>) {
        let mut scope = Scope::new(ScopeKind::Package);
        for decl in &self.decls {
            if let DeclState::Done(obj) = &decl.state {
                scope.replace(obj.clone());
            }
        }
        for (file, file_scope) in self.files.iter().zip(self.file_scopes) {
            self.info.scopes.insert(file.id, Arc::new(file_scope));
        }

        tracing::trace!(
            "checked package {} ({}): {} objects, {} imports",
            self.path,
            self.name,
            scope.len(),
            self.imports.len()
        );
        let pkg = Package::new(self.path, self.name, scope, self.imports);
        (PackageRef::new(pkg), self.first_error)
    }
}
