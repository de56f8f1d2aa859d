//! Assembles the class file of one type declaration: flags, supertypes,
//! fields, methods and class attributes.

use std::collections::HashSet;

use super::annotation;
use super::attribute::{AttributeInfo, CodeAttribute, InnerClassEntry, NamedAttribute, TypeAnnotationTarget};
use super::class::ClassFile;
use super::code::Code;
use super::constpool::{Constant, ConstantPool};
use super::defs::access_flags::*;
use super::defs::{CONSTRUCTOR_METHOD_NAME, STATIC_INITIALIZER_METHOD_NAME};
use super::error::{BytecodeResult, ClassGenerationError, CodeGenResult};
use super::field::FieldInfo;
use super::frame::VType;
use super::gen::{BodyKind, ClassContext, Gen, ENUM_CTOR_PREFIX};
use super::lambda::{ClassSynthetics, PendingLambda};
use super::method::MethodInfo;
use super::opcodes::*;
use super::records;
use super::signature::SignatureWriter;
use super::switch_map::SwitchMaps;
use crate::ast::*;
use crate::config::Config;
use crate::consts::{JAVA_LANG_CLASS, JAVA_LANG_ENUM, JAVA_LANG_OBJECT, JAVA_LANG_RECORD};
use crate::review::annotations::{select, Targets};
use crate::wash::types::{method_descriptor, ConstValue, JType};
use crate::wash::Analysis;

const JAVA_LANG_ANNOTATION: &str = "java/lang/annotation/Annotation";

/// Writes the classes of one compilation unit.
pub struct ClassWriter<'a> {
    unit: &'a CompilationUnit,
    analysis: &'a Analysis,
    config: &'a Config,
}

impl<'a> ClassWriter<'a> {
    pub fn new(unit: &'a CompilationUnit, analysis: &'a Analysis, config: &'a Config) -> Self {
        Self { unit, analysis, config }
    }

    /// The class file of `id`. Enum switches in its bodies register their
    /// tables in `maps`, which belongs to the outermost class.
    pub fn write_class(&self, id: DeclId, maps: &mut SwitchMaps) -> CodeGenResult<ClassFile> {
        let decl = &self.unit.decls[id];
        let class_name = self.unit.binary_name(id);
        log::debug!("writing class {}", class_name);
        let cx = ClassContext { unit: self.unit, analysis: self.analysis, config: self.config, decl, class: &class_name };

        let mut class = ClassFile::new(self.config.target_major);
        let mut synthetics = ClassSynthetics::default();
        class.access_flags = class_flags(decl);
        class.this_class = class.constant_pool.try_add_class(&class_name)?;
        let super_name = match decl.kind {
            TypeKind::Record => JAVA_LANG_RECORD.to_string(),
            TypeKind::Enum => JAVA_LANG_ENUM.to_string(),
            TypeKind::Interface | TypeKind::Annotation => JAVA_LANG_OBJECT.to_string(),
            TypeKind::Class => cx.super_class(),
        };
        class.super_class = class.constant_pool.try_add_class(&super_name)?;
        for name in self.interfaces(&cx) {
            let index = class.constant_pool.try_add_class(&name)?;
            class.interfaces.push(index);
        }

        self.write_fields(&cx, &mut class)?;
        self.write_methods(&cx, &mut class, maps, &mut synthetics)?;
        self.write_lambdas(&cx, &mut class, maps, &mut synthetics)?;
        self.write_class_attributes(&cx, &mut class, maps)?;
        if let Some(attr) = synthetics.bootstraps.into_attribute(&mut class.constant_pool)? {
            class.attributes.push(attr);
        }
        Ok(class)
    }

    fn interfaces(&self, cx: &ClassContext<'_>) -> Vec<String> {
        let mut names: Vec<String> = cx.table().get(cx.class).map(|s| s.interfaces.clone()).unwrap_or_default();
        if cx.decl.kind == TypeKind::Annotation && !names.iter().any(|n| n == JAVA_LANG_ANNOTATION) {
            names.push(JAVA_LANG_ANNOTATION.to_string());
        }
        names
    }

    // ----- fields -----

    fn write_fields(&self, cx: &ClassContext<'_>, class: &mut ClassFile) -> CodeGenResult<()> {
        let decl = cx.decl;
        let pool = &mut class.constant_pool;
        let this = JType::class(cx.class);
        for constant in &decl.enum_constants {
            let mut field = new_field(pool, ACC_PUBLIC | ACC_STATIC | ACC_FINAL | ACC_ENUM, &constant.name, &this)?;
            let anns = select(cx.unit, &constant.annotations, Targets::FIELD);
            field.attributes.extend(annotation::declaration_attributes(cx, pool, &anns)?);
            class.fields.push(field);
        }

        let signatures = SignatureWriter::new(cx, &[]);
        for member in &decl.members {
            let Member::Field(f) = member else { continue };
            let mut flags = member_flags(&f.modifiers);
            if decl.is_interface_like() {
                flags |= ACC_PUBLIC | ACC_STATIC | ACC_FINAL;
            }
            if f.origin != Origin::Source {
                flags |= ACC_PRIVATE | ACC_FINAL;
            }
            for d in &f.declarators {
                let sym = cx
                    .table()
                    .find_field(cx.class, &d.name)
                    .ok_or_else(|| ClassGenerationError::MissingAnalysis { what: format!("field {}.{}", cx.class, d.name) })?;
                let mut field = new_field(pool, flags, &d.name, &sym.ty)?;
                if sym.is_static && sym.is_final {
                    if let Some(value) = &sym.constant {
                        let index = constant_index(pool, value)?;
                        field.attributes.push(NamedAttribute::new(pool, AttributeInfo::ConstantValue(index))?);
                    }
                }
                let written = f.ty.with_extra_dims(d.extra_dims);
                if let Some(sig) = signatures.field_signature(&written) {
                    let index = pool.try_add_utf8(&sig)?;
                    field.attributes.push(NamedAttribute::new(pool, AttributeInfo::Signature(index))?);
                }
                let anns = select(cx.unit, &f.annotations, Targets::FIELD);
                field.attributes.extend(annotation::declaration_attributes(cx, pool, &anns)?);
                let mut annotated = written;
                annotated.annotations.extend(type_use_annotations(cx, &f.annotations));
                field
                    .attributes
                    .extend(annotation::type_attributes(cx, pool, &[(TypeAnnotationTarget::Field, &annotated)])?);
                class.fields.push(field);
            }
        }

        if decl.kind == TypeKind::Enum {
            let values = JType::array_of(this);
            class.fields.push(new_field(pool, ACC_PRIVATE | ACC_STATIC | ACC_FINAL | ACC_SYNTHETIC, "$VALUES", &values)?);
        }
        Ok(())
    }

    // ----- methods -----

    fn write_methods<'c>(
        &self,
        cx: &ClassContext<'c>,
        class: &mut ClassFile,
        maps: &mut SwitchMaps,
        synthetics: &mut ClassSynthetics<'c>,
    ) -> CodeGenResult<()> {
        let decl = cx.decl;
        for member in &decl.members {
            match member {
                Member::Constructor(c) if !decl.is_interface_like() => {
                    let method = self.write_constructor(cx, &mut class.constant_pool, maps, synthetics, c)?;
                    class.methods.push(method);
                }
                Member::Method(m) => {
                    let method = self.write_method(cx, &mut class.constant_pool, maps, synthetics, m)?;
                    class.methods.push(method);
                }
                _ => {}
            }
        }
        if decl.kind == TypeKind::Enum {
            self.write_enum_methods(cx, class)?;
        }
        if let Some(clinit) = self.write_static_initializer(cx, &mut class.constant_pool, maps, synthetics)? {
            class.methods.push(clinit);
        }
        Ok(())
    }

    fn write_method<'c>(
        &self,
        cx: &ClassContext<'c>,
        pool: &mut ConstantPool,
        maps: &mut SwitchMaps,
        synthetics: &mut ClassSynthetics<'c>,
        m: &'c MethodDecl,
    ) -> CodeGenResult<MethodInfo> {
        let decl = cx.decl;
        let params: Vec<(&'c str, JType)> =
            m.params.iter().map(|p| (p.name.as_str(), cx.resolve(&p.effective_type(), &m.type_params))).collect();
        let ret = if m.return_type.is_void() { JType::Void } else { cx.resolve(&m.return_type, &m.type_params) };
        let param_types: Vec<JType> = params.iter().map(|(_, t)| t.clone()).collect();
        let desc = method_descriptor(&param_types, &ret);

        let mut flags = member_flags(&m.modifiers);
        if m.object_method.is_some() {
            flags = ACC_PUBLIC | ACC_FINAL;
        }
        if decl.is_interface_like() {
            if !m.modifiers.has(Modifier::Private) {
                flags |= ACC_PUBLIC;
            }
            if m.body.is_none() && !m.is_static() {
                flags |= ACC_ABSTRACT;
            }
        }
        if m.is_varargs() {
            flags |= ACC_VARARGS;
        }
        let mut method = new_method(pool, flags, &m.name, &desc)?;

        let code = if let Some(kind) = m.object_method {
            let code = records::object_method_code(cx, pool, &mut synthetics.bootstraps, kind)
                .map_err(|source| method_error(cx, &m.name, &desc, source))?;
            Some(self.finish(cx, pool, code, &m.name, &desc)?)
        } else if let Some(body) = &m.body {
            let is_static = m.is_static();
            synthetics.enter(&m.name);
            Some(self.body_code(
                cx,
                pool,
                maps,
                synthetics,
                BodyKind::Method,
                is_static,
                &[],
                &params,
                ret.clone(),
                &m.name,
                &desc,
                |g| g.gen_method_body(body),
            )?)
        } else {
            None
        };
        if let Some(code) = code {
            method.attributes.push(NamedAttribute::new(pool, AttributeInfo::Code(code))?);
        }

        self.throws_attribute(cx, pool, &m.throws, &mut method)?;
        let signatures = SignatureWriter::new(cx, &m.type_params);
        let written: Vec<TypeRef> = m.params.iter().map(Parameter::effective_type).collect();
        let ret_ref = (!m.return_type.is_void()).then_some(&m.return_type);
        if let Some(sig) = signatures.method_signature(&written, ret_ref, &m.throws) {
            let index = pool.try_add_utf8(&sig)?;
            method.attributes.push(NamedAttribute::new(pool, AttributeInfo::Signature(index))?);
        }
        let anns = select(cx.unit, &m.annotations, Targets::METHOD);
        method.attributes.extend(annotation::declaration_attributes(cx, pool, &anns)?);
        method.attributes.extend(annotation::parameter_attributes(cx, pool, &m.params)?);

        let mut ret_annotated = m.return_type.clone();
        ret_annotated.annotations.extend(type_use_annotations(cx, &m.annotations));
        let mut uses = vec![(TypeAnnotationTarget::MethodReturn, &ret_annotated)];
        let param_refs = parameter_type_uses(cx, &m.params);
        for (i, p) in param_refs.iter().enumerate() {
            uses.push((TypeAnnotationTarget::FormalParameter(i as u8), p));
        }
        method.attributes.extend(annotation::type_attributes(cx, pool, &uses)?);

        if let Some(value) = &m.default_value {
            method.attributes.push(annotation::default_value(cx, pool, m, value)?);
        }
        Ok(method)
    }

    fn write_constructor<'c>(
        &self,
        cx: &ClassContext<'c>,
        pool: &mut ConstantPool,
        maps: &mut SwitchMaps,
        synthetics: &mut ClassSynthetics<'c>,
        c: &'c ConstructorDecl,
    ) -> CodeGenResult<MethodInfo> {
        let params: Vec<(&'c str, JType)> =
            c.params.iter().map(|p| (p.name.as_str(), cx.resolve(&p.effective_type(), &c.type_params))).collect();
        let synthetic: Vec<JType> = if cx.is_enum() { vec![JType::string(), JType::Int] } else { Vec::new() };
        let mut desc = String::from("(");
        if cx.is_enum() {
            desc.extend(ENUM_CTOR_PREFIX);
        }
        for (_, t) in &params {
            desc.push_str(&t.descriptor());
        }
        desc.push_str(")V");

        let mut flags = member_flags(&c.modifiers);
        if c.params.last().map(|p| p.varargs).unwrap_or(false) {
            flags |= ACC_VARARGS;
        }
        let mut method = new_method(pool, flags, CONSTRUCTOR_METHOD_NAME, &desc)?;
        synthetics.enter(CONSTRUCTOR_METHOD_NAME);
        let code = self.body_code(
            cx,
            pool,
            maps,
            synthetics,
            BodyKind::Constructor,
            false,
            &synthetic,
            &params,
            JType::Void,
            CONSTRUCTOR_METHOD_NAME,
            &desc,
            |g| g.gen_constructor_body(c),
        )?;
        method.attributes.push(NamedAttribute::new(pool, AttributeInfo::Code(code))?);

        self.throws_attribute(cx, pool, &c.throws, &mut method)?;
        if cx.decl.is_record() {
            if let Some(attr) = records::method_parameters(pool, c)? {
                method.attributes.push(attr);
            }
        }
        let signatures = SignatureWriter::new(cx, &c.type_params);
        let written: Vec<TypeRef> = c.params.iter().map(Parameter::effective_type).collect();
        if !cx.is_enum() {
            if let Some(sig) = signatures.method_signature(&written, None, &c.throws) {
                let index = pool.try_add_utf8(&sig)?;
                method.attributes.push(NamedAttribute::new(pool, AttributeInfo::Signature(index))?);
            }
        }
        let anns = select(cx.unit, &c.annotations, Targets::CONSTRUCTOR);
        method.attributes.extend(annotation::declaration_attributes(cx, pool, &anns)?);
        method.attributes.extend(annotation::parameter_attributes(cx, pool, &c.params)?);
        let param_refs = parameter_type_uses(cx, &c.params);
        let uses: Vec<(TypeAnnotationTarget, &TypeRef)> =
            param_refs.iter().enumerate().map(|(i, p)| (TypeAnnotationTarget::FormalParameter(i as u8), p)).collect();
        method.attributes.extend(annotation::type_attributes(cx, pool, &uses)?);
        Ok(method)
    }

    /// `<clinit>`, when the class creates enum constants or has static
    /// state that is not a compile-time constant.
    fn write_static_initializer<'c>(
        &self,
        cx: &ClassContext<'c>,
        pool: &mut ConstantPool,
        maps: &mut SwitchMaps,
        synthetics: &mut ClassSynthetics<'c>,
    ) -> CodeGenResult<Option<MethodInfo>> {
        let desc = "()V";
        let name = STATIC_INITIALIZER_METHOD_NAME;
        synthetics.enter(name);
        let mut gen = Gen::new(*cx, pool, maps, synthetics, BodyKind::Initializer, true, &[], &[], JType::Void);
        let generated = (|| -> BytecodeResult<()> {
            if cx.is_enum() {
                gen.gen_enum_constants()?;
            }
            gen.gen_static_inits()
        })();
        let empty = gen.code.pc() == 0;
        let mut code = gen.into_code();
        generated.map_err(|source| method_error(cx, name, desc, source))?;
        if empty {
            return Ok(None);
        }
        code.ret(&JType::Void).map_err(|source| method_error(cx, name, desc, source))?;
        let code = self.finish(cx, pool, code, name, desc)?;
        let mut method = new_method(pool, ACC_STATIC, name, desc)?;
        method.attributes.push(NamedAttribute::new(pool, AttributeInfo::Code(code))?);
        Ok(Some(method))
    }

    /// Bodies of the lambdas met so far; writing one may queue nested ones.
    fn write_lambdas<'c>(
        &self,
        cx: &ClassContext<'c>,
        class: &mut ClassFile,
        maps: &mut SwitchMaps,
        synthetics: &mut ClassSynthetics<'c>,
    ) -> CodeGenResult<()> {
        let mut next = 0;
        while let Some(pending) = synthetics.lambdas.get(next).cloned() {
            next += 1;
            let method = self.write_lambda(cx, &mut class.constant_pool, maps, synthetics, &pending)?;
            class.methods.push(method);
        }
        Ok(())
    }

    fn write_lambda<'c>(
        &self,
        cx: &ClassContext<'c>,
        pool: &mut ConstantPool,
        maps: &mut SwitchMaps,
        synthetics: &mut ClassSynthetics<'c>,
        pending: &PendingLambda<'c>,
    ) -> CodeGenResult<MethodInfo> {
        let info = cx
            .attr()
            .lambdas
            .get(&pending.expr.id)
            .ok_or_else(|| ClassGenerationError::MissingAnalysis { what: format!("lambda {}", pending.name) })?;
        let receiver: Vec<JType> = if info.captures_this { vec![JType::class(cx.class)] } else { Vec::new() };
        let params: Vec<(&'c str, JType)> = info
            .captures
            .iter()
            .map(|c| (c.name.as_str(), c.ty.clone()))
            .chain(pending.lambda.params.iter().map(|p| p.name.as_str()).zip(info.method.params.iter().cloned()))
            .collect();
        synthetics.enclosing = pending.enclosing.clone();
        let code = self.body_code(
            cx,
            pool,
            maps,
            synthetics,
            BodyKind::Method,
            true,
            &receiver,
            &params,
            info.method.ret.clone(),
            &pending.name,
            &pending.descriptor,
            |g| g.gen_lambda_body(pending.lambda),
        )?;
        let mut method = new_method(pool, ACC_PRIVATE | ACC_STATIC | ACC_SYNTHETIC, &pending.name, &pending.descriptor)?;
        method.attributes.push(NamedAttribute::new(pool, AttributeInfo::Code(code))?);
        Ok(method)
    }

    /// `values()`, `valueOf(String)` and the private `$values()` that
    /// builds the constant array.
    fn write_enum_methods(&self, cx: &ClassContext<'_>, class: &mut ClassFile) -> CodeGenResult<()> {
        let pool = &mut class.constant_pool;
        let this = JType::class(cx.class);
        let array = JType::array_of(this.clone());

        let desc = format!("(){}", array.descriptor());
        let code = enum_values(cx.class, pool, &array).map_err(|source| method_error(cx, "values", &desc, source))?;
        let code = self.finish(cx, pool, code, "values", &desc)?;
        let mut method = new_method(pool, ACC_PUBLIC | ACC_STATIC, "values", &desc)?;
        method.attributes.push(NamedAttribute::new(pool, AttributeInfo::Code(code))?);
        class.methods.push(method);

        let desc = format!("(Ljava/lang/String;){}", this.descriptor());
        let code = enum_value_of(cx.class, pool, &this).map_err(|source| method_error(cx, "valueOf", &desc, source))?;
        let code = self.finish(cx, pool, code, "valueOf", &desc)?;
        let mut method = new_method(pool, ACC_PUBLIC | ACC_STATIC, "valueOf", &desc)?;
        method.attributes.push(NamedAttribute::new(pool, AttributeInfo::Code(code))?);
        class.methods.push(method);

        let desc = format!("(){}", array.descriptor());
        let names: Vec<&str> = cx.decl.enum_constants.iter().map(|c| c.name.as_str()).collect();
        let code = enum_array(cx.class, pool, &this, &names).map_err(|source| method_error(cx, "$values", &desc, source))?;
        let code = self.finish(cx, pool, code, "$values", &desc)?;
        let mut method = new_method(pool, ACC_PRIVATE | ACC_STATIC | ACC_SYNTHETIC, "$values", &desc)?;
        method.attributes.push(NamedAttribute::new(pool, AttributeInfo::Code(code))?);
        class.methods.push(method);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn body_code<'c>(
        &self,
        cx: &ClassContext<'c>,
        pool: &mut ConstantPool,
        maps: &mut SwitchMaps,
        synthetics: &mut ClassSynthetics<'c>,
        kind: BodyKind,
        is_static: bool,
        synthetic: &[JType],
        params: &[(&'c str, JType)],
        ret: JType,
        name: &str,
        desc: &str,
        body: impl FnOnce(&mut Gen<'c, '_>) -> BytecodeResult<()>,
    ) -> CodeGenResult<CodeAttribute> {
        let mut gen = Gen::new(*cx, pool, maps, synthetics, kind, is_static, synthetic, params, ret);
        let generated = body(&mut gen);
        let code = gen.into_code();
        generated.map_err(|source| method_error(cx, name, desc, source))?;
        self.finish(cx, pool, code, name, desc)
    }

    fn finish(&self, cx: &ClassContext<'_>, pool: &mut ConstantPool, code: Code, name: &str, desc: &str) -> CodeGenResult<CodeAttribute> {
        code.finish(pool, self.config.emit_frames, self.config.debug)
            .map_err(|source| method_error(cx, name, desc, source))
    }

    fn throws_attribute(
        &self,
        cx: &ClassContext<'_>,
        pool: &mut ConstantPool,
        throws: &[TypeRef],
        method: &mut MethodInfo,
    ) -> CodeGenResult<()> {
        if throws.is_empty() {
            return Ok(());
        }
        let mut indices = Vec::with_capacity(throws.len());
        for t in throws {
            let name = match cx.resolve(t, &[]) {
                JType::Class(n) => n,
                _ => t.name.replace('.', "/"),
            };
            indices.push(pool.try_add_class(&name)?);
        }
        method.attributes.push(NamedAttribute::new(pool, AttributeInfo::Exceptions(indices))?);
        Ok(())
    }

    // ----- class attributes -----

    fn write_class_attributes(&self, cx: &ClassContext<'_>, class: &mut ClassFile, maps: &SwitchMaps) -> CodeGenResult<()> {
        let decl = cx.decl;
        let pool = &mut class.constant_pool;
        if self.config.debug {
            if let Some(file) = &self.config.source_file {
                let index = pool.try_add_utf8(file)?;
                class.attributes.push(NamedAttribute::new(pool, AttributeInfo::SourceFile(index))?);
            }
        }
        if let Some(sig) = SignatureWriter::new(cx, &[]).class_signature() {
            let index = pool.try_add_utf8(&sig)?;
            class.attributes.push(NamedAttribute::new(pool, AttributeInfo::Signature(index))?);
        }
        if decl.is_record() {
            class.attributes.push(records::record_attribute(cx, pool)?);
        }
        let anns = select(cx.unit, &decl.annotations, Targets::TYPE);
        class.attributes.extend(annotation::declaration_attributes(cx, pool, &anns)?);

        let outermost = self.unit.outermost(decl.id);
        if outermost != decl.id {
            let host = pool.try_add_class(&self.unit.binary_name(outermost))?;
            class.attributes.push(NamedAttribute::new(pool, AttributeInfo::NestHost(host))?);
        } else {
            let mut members = Vec::new();
            for id in descendants(self.unit, decl.id) {
                members.push(pool.try_add_class(&self.unit.binary_name(id))?);
            }
            if !maps.is_empty() {
                members.push(pool.try_add_class(maps.holder())?);
            }
            if !members.is_empty() {
                class.attributes.push(NamedAttribute::new(pool, AttributeInfo::NestMembers(members))?);
            }
        }

        let entries = self.inner_class_entries(pool, decl.id, maps)?;
        if !entries.is_empty() {
            class.attributes.push(NamedAttribute::new(pool, AttributeInfo::InnerClasses(entries))?);
        }
        Ok(())
    }

    /// Every nested class this class refers to, plus its own members and
    /// the outer classes of each, outermost first.
    fn inner_class_entries(&self, pool: &mut ConstantPool, id: DeclId, maps: &SwitchMaps) -> CodeGenResult<Vec<InnerClassEntry>> {
        let nested: Vec<(String, DeclId)> = self
            .unit
            .decls
            .ids()
            .filter(|d| self.unit.decls[*d].enclosing.is_some())
            .map(|d| (self.unit.binary_name(d), d))
            .collect();
        let referenced: HashSet<String> = pool
            .iter()
            .filter_map(|(_, c)| match c {
                Constant::Class(name) => pool.utf8(*name).ok().map(str::to_string),
                _ => None,
            })
            .collect();

        let mut wanted: Vec<DeclId> = nested.iter().filter(|(n, _)| referenced.contains(n)).map(|(_, d)| *d).collect();
        wanted.extend(self.unit.decls[id].nested.iter().copied());
        let mut closed: Vec<DeclId> = Vec::new();
        while let Some(d) = wanted.pop() {
            if closed.contains(&d) {
                continue;
            }
            closed.push(d);
            if let Some(outer) = self.unit.decls[d].enclosing {
                if self.unit.decls[outer].enclosing.is_some() {
                    wanted.push(outer);
                }
            }
        }
        closed.sort_by_key(|d| (depth(self.unit, *d), d.index()));

        let mut entries = Vec::with_capacity(closed.len() + 1);
        for d in closed {
            let decl = &self.unit.decls[d];
            let Some(outer) = decl.enclosing else { continue };
            entries.push(InnerClassEntry {
                inner_class_info: pool.try_add_class(&self.unit.binary_name(d))?,
                outer_class_info: pool.try_add_class(&self.unit.binary_name(outer))?,
                inner_name: pool.try_add_utf8(&decl.name)?,
                access_flags: inner_flags(decl),
            });
        }
        if !maps.is_empty() && referenced.contains(maps.holder()) {
            entries.push(InnerClassEntry {
                inner_class_info: pool.try_add_class(maps.holder())?,
                outer_class_info: 0,
                inner_name: 0,
                access_flags: ACC_STATIC | ACC_SYNTHETIC,
            });
        }
        Ok(entries)
    }
}

fn method_error(cx: &ClassContext<'_>, name: &str, desc: &str, source: super::error::BytecodeError) -> ClassGenerationError {
    ClassGenerationError::MethodGeneration { method: format!("{}.{}{}", cx.class, name, desc), source }
}

fn new_field(pool: &mut ConstantPool, flags: u16, name: &str, ty: &JType) -> CodeGenResult<FieldInfo> {
    let name = pool.try_add_utf8(name)?;
    let desc = pool.try_add_utf8(&ty.descriptor())?;
    Ok(FieldInfo::new(flags, name, desc))
}

fn new_method(pool: &mut ConstantPool, flags: u16, name: &str, desc: &str) -> CodeGenResult<MethodInfo> {
    let name = pool.try_add_utf8(name)?;
    let desc = pool.try_add_utf8(desc)?;
    Ok(MethodInfo::new(flags, name, desc))
}

fn constant_index(pool: &mut ConstantPool, value: &ConstValue) -> CodeGenResult<u16> {
    Ok(match value {
        ConstValue::Int(v) => pool.try_add_integer(*v)?,
        ConstValue::Bool(b) => pool.try_add_integer(i32::from(*b))?,
        ConstValue::Long(v) => pool.try_add_long(*v)?,
        ConstValue::Float(v) => pool.try_add_float(*v)?,
        ConstValue::Double(v) => pool.try_add_double(*v)?,
        ConstValue::Str(s) => pool.try_add_string(s)?,
    })
}

/// Annotations written in modifier position that are type annotations.
fn type_use_annotations(cx: &ClassContext<'_>, anns: &[Annotation]) -> Vec<Annotation> {
    select(cx.unit, anns, Targets::TYPE_USE)
}

fn parameter_type_uses(cx: &ClassContext<'_>, params: &[Parameter]) -> Vec<TypeRef> {
    params
        .iter()
        .map(|p| {
            let mut t = p.effective_type();
            t.annotations.extend(type_use_annotations(cx, &p.annotations));
            t
        })
        .collect()
}

fn member_flags(m: &Modifiers) -> u16 {
    [
        (Modifier::Public, ACC_PUBLIC),
        (Modifier::Private, ACC_PRIVATE),
        (Modifier::Protected, ACC_PROTECTED),
        (Modifier::Static, ACC_STATIC),
        (Modifier::Final, ACC_FINAL),
        (Modifier::Synchronized, ACC_SYNCHRONIZED),
        (Modifier::Volatile, ACC_VOLATILE),
        (Modifier::Transient, ACC_TRANSIENT),
        (Modifier::Native, ACC_NATIVE),
        (Modifier::Abstract, ACC_ABSTRACT),
    ]
    .iter()
    .filter(|(m_, _)| m.has(*m_))
    .fold(0, |acc, (_, f)| acc | f)
}

/// Flags shared by the class itself and its `InnerClasses` entry.
fn kind_flags(decl: &TypeDecl) -> u16 {
    match decl.kind {
        TypeKind::Record => ACC_FINAL,
        TypeKind::Enum => ACC_FINAL | ACC_ENUM,
        TypeKind::Interface => ACC_INTERFACE | ACC_ABSTRACT,
        TypeKind::Annotation => ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION,
        TypeKind::Class => {
            let mut flags = 0;
            if decl.modifiers.has(Modifier::Final) {
                flags |= ACC_FINAL;
            }
            if decl.modifiers.has(Modifier::Abstract) {
                flags |= ACC_ABSTRACT;
            }
            flags
        }
    }
}

fn class_flags(decl: &TypeDecl) -> u16 {
    let mut flags = kind_flags(decl);
    if matches!(decl.modifiers.visibility(), Visibility::Public | Visibility::Protected) {
        flags |= ACC_PUBLIC;
    }
    if !decl.is_interface_like() {
        flags |= ACC_SUPER;
    }
    flags
}

fn inner_flags(decl: &TypeDecl) -> u16 {
    let mut flags = kind_flags(decl);
    flags |= match decl.modifiers.visibility() {
        Visibility::Public => ACC_PUBLIC,
        Visibility::Protected => ACC_PROTECTED,
        Visibility::Private => ACC_PRIVATE,
        Visibility::Package => 0,
    };
    if decl.is_static() {
        flags |= ACC_STATIC;
    }
    flags
}

fn depth(unit: &CompilationUnit, mut id: DeclId) -> usize {
    let mut depth = 0;
    while let Some(outer) = unit.decls[id].enclosing {
        depth += 1;
        id = outer;
    }
    depth
}

/// Nested declarations under `id`, parents before children.
pub(crate) fn descendants(unit: &CompilationUnit, id: DeclId) -> Vec<DeclId> {
    let mut out = Vec::new();
    let mut stack: Vec<DeclId> = unit.decls[id].nested.iter().rev().copied().collect();
    while let Some(d) = stack.pop() {
        out.push(d);
        stack.extend(unit.decls[d].nested.iter().rev().copied());
    }
    out
}

fn enum_values(class: &str, pool: &mut ConstantPool, array: &JType) -> BytecodeResult<Code> {
    let mut code = Code::new(class, true, false, &[]);
    let field = pool.try_add_field_ref(class, "$VALUES", &array.descriptor())?;
    code.field(GETSTATIC, field, array)?;
    let clone = pool.try_add_method_ref(&array.descriptor(), "clone", "()Ljava/lang/Object;")?;
    code.invoke(INVOKEVIRTUAL, clone, &[], &JType::object())?;
    code.checkcast(array, pool)?;
    code.ret(array)?;
    Ok(code)
}

fn enum_value_of(class: &str, pool: &mut ConstantPool, this: &JType) -> BytecodeResult<Code> {
    let mut code = Code::new(class, true, false, &[JType::string()]);
    let class_index = pool.try_add_class(class)?;
    code.ldc(class_index, VType::object(JAVA_LANG_CLASS))?;
    code.load(&JType::string(), 0);
    let value_of =
        pool.try_add_method_ref(JAVA_LANG_ENUM, "valueOf", "(Ljava/lang/Class;Ljava/lang/String;)Ljava/lang/Enum;")?;
    code.invoke(INVOKESTATIC, value_of, &[JType::class(JAVA_LANG_CLASS), JType::string()], &JType::class(JAVA_LANG_ENUM))?;
    code.checkcast(this, pool)?;
    code.ret(this)?;
    Ok(code)
}

fn enum_array(class: &str, pool: &mut ConstantPool, this: &JType, constants: &[&str]) -> BytecodeResult<Code> {
    let mut code = Code::new(class, true, false, &[]);
    code.iconst(constants.len() as i32, pool)?;
    code.new_array(this, pool)?;
    for (i, name) in constants.iter().enumerate() {
        code.dup(DUP)?;
        code.iconst(i as i32, pool)?;
        let field = pool.try_add_field_ref(class, name, &this.descriptor())?;
        code.field(GETSTATIC, field, this)?;
        code.array_store(this)?;
    }
    code.ret(&JType::array_of(this.clone()))?;
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticSink;
    use crate::parser::parse;

    fn write(src: &str, name: &str) -> ClassFile {
        let mut sink = DiagnosticSink::new();
        let mut unit = parse(src, &mut sink);
        let analysis = crate::wash::analyze(&mut unit, &HashSet::new(), &mut sink);
        assert!(!sink.has_errors(), "{:?}", sink);
        let config = Config::default();
        let id = unit.decls.iter().find(|d| d.name == name).unwrap().id;
        let mut maps = SwitchMaps::new(&unit.binary_name(unit.outermost(id)));
        ClassWriter::new(&unit, &analysis, &config).write_class(id, &mut maps).unwrap()
    }

    #[test]
    fn record_class_shape() {
        let class = write("public record Point(int x, int y) {}", "Point");
        assert_eq!(class.access_flags, ACC_PUBLIC | ACC_FINAL | ACC_SUPER);
        assert_eq!(class.super_name(), Some(JAVA_LANG_RECORD));
        assert!(class.field("x").is_some());
        assert!(class.method("<init>", "(II)V").is_some());
        assert!(class.method("x", "()I").is_some());
        assert!(class.method("toString", "()Ljava/lang/String;").is_some());
        assert!(class.method("equals", "(Ljava/lang/Object;)Z").is_some());
        assert!(class.attribute("Record").is_some());
        assert!(class.attribute("BootstrapMethods").is_some());
    }

    #[test]
    fn enum_class_shape() {
        let class = write("enum Color { RED, GREEN }", "Color");
        assert_eq!(class.access_flags, ACC_FINAL | ACC_SUPER | ACC_ENUM);
        assert!(class.method("values", "()[LColor;").is_some());
        assert!(class.method("valueOf", "(Ljava/lang/String;)LColor;").is_some());
        assert!(class.method("<init>", "(Ljava/lang/String;I)V").is_some());
        assert!(class.method("<clinit>", "()V").is_some());
        assert!(class.field("$VALUES").is_some());
    }

    #[test]
    fn nested_records_are_static_members() {
        let class = write("class Outer { record In(int a) {} }", "In");
        assert_eq!(class.name(), "Outer$In");
        assert!(class.attribute("NestHost").is_some());
        match class.attribute("InnerClasses") {
            Some(AttributeInfo::InnerClasses(entries)) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].access_flags, ACC_STATIC | ACC_FINAL);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn constants_skip_the_static_initializer() {
        let class = write("class K { static final int A = 3; static int b = A + 1; }", "K");
        assert!(class.method("<clinit>", "()V").is_some());
        let class = write("class K { static final int A = 3; }", "K");
        assert!(class.method("<clinit>", "()V").is_none());
    }
}
