//! `Signature` attributes (JVMS 4.7.9.1) for declarations that mention
//! type variables or parameterized types.

use super::gen::ClassContext;
use crate::ast::*;
use crate::consts::{JAVA_LANG_ENUM, JAVA_LANG_OBJECT};
use crate::wash::types::JType;

pub(crate) struct SignatureWriter<'a, 'c> {
    cx: &'c ClassContext<'a>,
    method_tparams: &'a [TypeParam],
}

impl<'a, 'c> SignatureWriter<'a, 'c> {
    pub fn new(cx: &'c ClassContext<'a>, method_tparams: &'a [TypeParam]) -> Self {
        Self { cx, method_tparams }
    }

    fn is_type_var(&self, name: &str) -> bool {
        self.method_tparams.iter().any(|p| p.name == name) || self.cx.decl.type_params.iter().any(|p| p.name == name)
    }

    /// Whether `ty` needs more than its descriptor.
    pub fn is_generic(&self, ty: &TypeRef) -> bool {
        !ty.type_args.is_empty() || self.is_type_var(&ty.name)
    }

    fn class_name(&self, name: &str) -> String {
        match self.cx.resolve(&TypeRef::named(name, Span::default()), self.method_tparams) {
            JType::Class(n) => n,
            _ => name.replace('.', "/"),
        }
    }

    pub fn type_sig(&self, ty: &TypeRef, out: &mut String) {
        for _ in 0..ty.array_dims {
            out.push('[');
        }
        if let Some(p) = JType::from_primitive_name(&ty.name) {
            out.push_str(&p.descriptor());
            return;
        }
        if ty.name == "?" {
            match ty.type_args.first() {
                Some(bound) => {
                    out.push('+');
                    self.type_sig(bound, out);
                }
                None => out.push('*'),
            }
            return;
        }
        if self.is_type_var(&ty.name) {
            out.push('T');
            out.push_str(&ty.name);
            out.push(';');
            return;
        }
        out.push('L');
        out.push_str(&self.class_name(&ty.name));
        self.type_args(&ty.type_args, out);
        out.push(';');
    }

    fn type_args(&self, args: &[TypeRef], out: &mut String) {
        if args.is_empty() {
            return;
        }
        out.push('<');
        for a in args {
            self.type_sig(a, out);
        }
        out.push('>');
    }

    fn type_params(&self, params: &[TypeParam], out: &mut String) {
        if params.is_empty() {
            return;
        }
        out.push('<');
        for p in params {
            out.push_str(&p.name);
            match p.bounds.split_first() {
                None => {
                    out.push(':');
                    out.push_str(&JType::class(JAVA_LANG_OBJECT).descriptor());
                }
                Some((first, rest)) => {
                    // interface bounds leave the class bound empty
                    out.push(':');
                    if self.cx.table().is_interface(&self.class_name(&first.name)) {
                        out.push(':');
                    }
                    self.type_sig(first, out);
                    for b in rest {
                        out.push(':');
                        self.type_sig(b, out);
                    }
                }
            }
        }
        out.push('>');
    }

    /// Class signature, when the class is generic, extends or implements a
    /// parameterized type, or is an enum.
    pub fn class_signature(&self) -> Option<String> {
        let decl = self.cx.decl;
        let generic_super = decl.extends.iter().chain(&decl.implements).any(|t| self.is_generic(t));
        if decl.type_params.is_empty() && !generic_super && decl.kind != TypeKind::Enum {
            return None;
        }
        let mut out = String::new();
        self.type_params(&decl.type_params, &mut out);
        match (&decl.extends, decl.kind) {
            (_, TypeKind::Enum) => {
                out.push_str(&format!("L{}<L{};>;", JAVA_LANG_ENUM, self.cx.class));
            }
            (Some(sup), TypeKind::Class) => self.type_sig(sup, &mut out),
            _ => {
                let sup = JType::class(&self.cx.super_class());
                out.push_str(&sup.descriptor());
            }
        }
        let interfaces = if decl.kind == TypeKind::Interface {
            decl.extends.iter().chain(&decl.implements).collect::<Vec<_>>()
        } else {
            decl.implements.iter().collect()
        };
        for i in interfaces {
            self.type_sig(i, &mut out);
        }
        Some(out)
    }

    /// Method signature, when any part of it is generic.
    pub fn method_signature(&self, params: &[TypeRef], ret: Option<&TypeRef>, throws: &[TypeRef]) -> Option<String> {
        let generic = !self.method_tparams.is_empty()
            || params.iter().chain(ret).any(|t| self.is_generic(t))
            || throws.iter().any(|t| self.is_type_var(&t.name));
        if !generic {
            return None;
        }
        let mut out = String::new();
        self.type_params(self.method_tparams, &mut out);
        out.push('(');
        for p in params {
            self.type_sig(p, &mut out);
        }
        out.push(')');
        match ret {
            Some(r) => self.type_sig(r, &mut out),
            None => out.push('V'),
        }
        if throws.iter().any(|t| self.is_type_var(&t.name)) {
            for t in throws {
                out.push('^');
                self.type_sig(t, &mut out);
            }
        }
        Some(out)
    }

    pub fn field_signature(&self, ty: &TypeRef) -> Option<String> {
        if !self.is_generic(ty) && !ty.type_args.iter().any(|a| self.is_generic(a)) {
            return None;
        }
        let mut out = String::new();
        self.type_sig(ty, &mut out);
        Some(out)
    }
}
