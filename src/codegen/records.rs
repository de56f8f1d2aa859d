//! Record-specific class file pieces: the `ObjectMethods` call sites of
//! `toString`/`hashCode`/`equals`, the `Record` attribute and the
//! `MethodParameters` of the canonical constructor.

use super::annotation;
use super::attribute::{
    AttributeInfo, BootstrapMethod, MethodParameter, NamedAttribute, RecordComponentInfo, TypeAnnotationTarget,
};
use super::code::Code;
use super::constpool::ConstantPool;
use super::defs::access_flags::ACC_MANDATED;
use super::defs::ref_kinds::{REF_GET_FIELD, REF_INVOKE_STATIC};
use super::error::{BytecodeResult, CodeGenResult, ConstPoolResult};
use super::gen::ClassContext;
use super::signature::SignatureWriter;
use crate::ast::*;
use crate::consts::{JAVA_LANG_OBJECT, OBJECT_METHODS, OBJECT_METHODS_BOOTSTRAP_DESCRIPTOR};
use crate::review::annotations::{select, Targets};
use crate::wash::types::{method_descriptor, JType};

/// Entries of the `BootstrapMethods` attribute, shared by equal call sites.
#[derive(Debug, Default)]
pub(crate) struct BootstrapTable {
    methods: Vec<BootstrapMethod>,
}

impl BootstrapTable {
    pub fn add(&mut self, method_ref: u16, arguments: Vec<u16>) -> u16 {
        let entry = BootstrapMethod { method_ref, arguments };
        match self.methods.iter().position(|m| *m == entry) {
            Some(i) => i as u16,
            None => {
                self.methods.push(entry);
                (self.methods.len() - 1) as u16
            }
        }
    }

    pub fn into_attribute(self, pool: &mut ConstantPool) -> ConstPoolResult<Option<NamedAttribute>> {
        if self.methods.is_empty() {
            return Ok(None);
        }
        NamedAttribute::new(pool, AttributeInfo::BootstrapMethods(self.methods)).map(Some)
    }
}

/// Components with their erased types.
pub(crate) fn components<'a>(cx: &ClassContext<'a>) -> Vec<(&'a str, JType)> {
    cx.decl
        .components
        .iter()
        .map(|c| (c.name.as_str(), cx.resolve(&c.effective_type(), &[])))
        .collect()
}

/// Parameters and result of the `invokedynamic` behind `kind`; the
/// receiver comes first.
fn call_site_type(class: &str, kind: ObjectMethodKind) -> (Vec<JType>, JType) {
    let this = JType::class(class);
    match kind {
        ObjectMethodKind::ToString => (vec![this], JType::string()),
        ObjectMethodKind::HashCode => (vec![this], JType::Int),
        ObjectMethodKind::Equals => (vec![this, JType::class(JAVA_LANG_OBJECT)], JType::Boolean),
    }
}

/// Body of a synthesized `toString`, `hashCode` or `equals`: the receiver
/// (and argument) handed to `ObjectMethods.bootstrap` with the record
/// class, the component names joined by `;` and a getter handle per
/// component.
pub(crate) fn object_method_code(
    cx: &ClassContext<'_>,
    pool: &mut ConstantPool,
    bootstraps: &mut BootstrapTable,
    kind: ObjectMethodKind,
) -> BytecodeResult<Code> {
    let class = cx.class;
    let comps = components(cx);
    let bootstrap = pool.try_add_method_ref(OBJECT_METHODS, "bootstrap", OBJECT_METHODS_BOOTSTRAP_DESCRIPTOR)?;
    let bootstrap = pool.try_add_method_handle(REF_INVOKE_STATIC, bootstrap)?;
    let mut args = vec![pool.try_add_class(class)?];
    let names: Vec<&str> = comps.iter().map(|(n, _)| *n).collect();
    args.push(pool.try_add_string(&names.join(";"))?);
    for (name, ty) in &comps {
        let field = pool.try_add_field_ref(class, name, &ty.descriptor())?;
        args.push(pool.try_add_method_handle(REF_GET_FIELD, field)?);
    }
    let index = bootstraps.add(bootstrap, args);

    let (params, ret) = call_site_type(class, kind);
    let call_site = pool.try_add_invoke_dynamic(index, kind.name(), &method_descriptor(&params, &ret))?;
    let mut code = Code::new(class, false, false, &params[1..]);
    for (slot, p) in params.iter().enumerate() {
        code.load(p, slot as u16);
    }
    code.invoke_dynamic(call_site, &params, &ret)?;
    code.ret(&ret)?;
    Ok(code)
}

/// The `Record` attribute: one entry per component with its signature,
/// the annotations that target record components and its type
/// annotations.
pub(crate) fn record_attribute(cx: &ClassContext<'_>, pool: &mut ConstantPool) -> CodeGenResult<NamedAttribute> {
    let signatures = SignatureWriter::new(cx, &[]);
    let mut entries = Vec::new();
    for (c, (name, ty)) in cx.decl.components.iter().zip(components(cx)) {
        let name_index = pool.try_add_utf8(name)?;
        let descriptor_index = pool.try_add_utf8(&ty.descriptor())?;
        let mut attributes = Vec::new();
        let written = c.effective_type();
        if let Some(sig) = signatures.field_signature(&written) {
            let index = pool.try_add_utf8(&sig)?;
            attributes.push(NamedAttribute::new(pool, AttributeInfo::Signature(index))?);
        }
        let anns: Vec<Annotation> = c.annotations.iter().chain(&c.ty.annotations).cloned().collect();
        let declared = select(cx.unit, &anns, Targets::RECORD_COMPONENT);
        attributes.extend(annotation::declaration_attributes(cx, pool, &declared)?);
        let mut annotated = written;
        annotated.annotations = anns;
        attributes.extend(annotation::type_attributes(cx, pool, &[(TypeAnnotationTarget::Field, &annotated)])?);
        entries.push(RecordComponentInfo { name_index, descriptor_index, attributes });
    }
    Ok(NamedAttribute::new(pool, AttributeInfo::Record(entries))?)
}

/// `MethodParameters` of a canonical constructor whose parameters the
/// language supplies: the implicit one and the compact form.
pub(crate) fn method_parameters(pool: &mut ConstantPool, ctor: &ConstructorDecl) -> CodeGenResult<Option<NamedAttribute>> {
    if !ctor.has_mandated_params() {
        return Ok(None);
    }
    let mut params = Vec::with_capacity(ctor.params.len());
    for p in &ctor.params {
        params.push(MethodParameter { name_index: pool.try_add_utf8(&p.name)?, access_flags: ACC_MANDATED });
    }
    Ok(Some(NamedAttribute::new(pool, AttributeInfo::MethodParameters(params))?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_bootstraps_are_shared() {
        let mut pool = ConstantPool::new();
        assert!(BootstrapTable::default().into_attribute(&mut pool).unwrap().is_none());
        let mut table = BootstrapTable::default();
        assert_eq!(table.add(4, vec![1, 2]), 0);
        assert_eq!(table.add(4, vec![1, 3]), 1);
        assert_eq!(table.add(4, vec![1, 2]), 0);
        let attr = table.into_attribute(&mut pool).unwrap().unwrap();
        match attr.info {
            AttributeInfo::BootstrapMethods(m) => assert_eq!(m.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn call_site_types() {
        let (params, ret) = call_site_type("p/R", ObjectMethodKind::Equals);
        assert_eq!(method_descriptor(&params, &ret), "(Lp/R;Ljava/lang/Object;)Z");
        let (params, ret) = call_site_type("R", ObjectMethodKind::ToString);
        assert_eq!(method_descriptor(&params, &ret), "(LR;)Ljava/lang/String;");
    }
}
