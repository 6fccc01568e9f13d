use repc::layout::{Array, BuiltinType, Record, RecordField, RecordKind, Type, TypeVariant};
use repc::Target;

use marrow_types::{AbiTag, TypeDescriptor};

use crate::by_value::StructByValue;
use crate::error::LayoutError;
use crate::field::Field;
use crate::layout::StructLayout;

/// Assembles a [`StructLayout`] with C offsets computed by `repc`.
pub struct LayoutBuilder {
    name: String,
    target: Target,
    fields: Vec<(String, TypeDescriptor, Option<StructByValue>)>,
}

impl LayoutBuilder {
    /// A builder using the host's C layout rules.
    pub fn new(name: impl Into<String>) -> Result<Self, LayoutError> {
        let target = repc::HOST_TARGET.ok_or(LayoutError::NoHostTarget)?;
        Ok(Self::for_target(name, target))
    }

    pub fn for_target(name: impl Into<String>, target: Target) -> Self {
        LayoutBuilder { name: name.into(), target, fields: Vec::new() }
    }

    pub fn field(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.fields.push((name.into(), ty, None));
        self
    }

    pub fn array(self, name: impl Into<String>, element: TypeDescriptor, length: usize) -> Self {
        self.field(name, TypeDescriptor::array(element, length))
    }

    /// A struct embedded by value; reading the field yields a struct instance.
    pub fn nested(mut self, name: impl Into<String>, by_value: &StructByValue) -> Self {
        self.fields.push((name.into(), by_value.descriptor().clone(), Some(by_value.clone())));
        self
    }

    pub fn build(self) -> Result<StructLayout, LayoutError> {
        let mut record_fields = Vec::with_capacity(self.fields.len());
        for (_, ty, _) in &self.fields {
            record_fields.push(RecordField {
                layout: None,
                annotations: vec![],
                named: true,
                bit_width: None,
                ty: repc_type(ty)?,
            });
        }
        let struct_type = Type {
            layout: (),
            annotations: vec![],
            variant: TypeVariant::Record(Record { kind: RecordKind::Struct, fields: record_fields }),
        };

        let computed = repc::compute_layout(self.target, &struct_type)?;
        let record = match computed.variant {
            TypeVariant::Record(record) => record,
            _ => return Err(LayoutError::NotARecord(self.name)),
        };

        let mut fields = Vec::with_capacity(self.fields.len());
        for ((name, ty, nested), computed_field) in self.fields.into_iter().zip(record.fields.iter()) {
            let offset = match computed_field.layout {
                Some(field_layout) => (field_layout.offset_bits / 8) as usize,
                None => return Err(LayoutError::MissingOffset { layout: self.name, field: name }),
            };
            fields.push(match nested {
                Some(by_value) => Field::nested(name, &by_value, offset),
                None => Field::new(name, ty, offset),
            });
        }
        let size = (computed.layout.size_bits / 8) as usize;
        let alignment = (computed.layout.required_alignment_bits / 8) as usize;
        log::debug!("computed C layout for {}: size={size} alignment={alignment}", self.name);
        Ok(StructLayout::new(self.name, fields, size, alignment)?)
    }
}

fn builtin(variant: BuiltinType) -> Type<()> {
    Type { layout: (), annotations: vec![], variant: TypeVariant::Builtin(variant) }
}

fn repeated(element: Type<()>, count: usize) -> Type<()> {
    Type {
        layout: (),
        annotations: vec![],
        variant: TypeVariant::Array(Array { element_type: Box::new(element), num_elements: Some(count as u64) }),
    }
}

fn repc_type(ty: &TypeDescriptor) -> Result<Type<()>, LayoutError> {
    if let Some((element, length)) = ty.as_array() {
        return Ok(repeated(repc_type(element)?, length));
    }
    let variant = match ty.abi() {
        AbiTag::SInt8 => BuiltinType::Char,
        AbiTag::UInt8 => BuiltinType::UnsignedChar,
        AbiTag::SInt16 => BuiltinType::Short,
        AbiTag::UInt16 => BuiltinType::UnsignedShort,
        AbiTag::SInt32 => BuiltinType::Int,
        AbiTag::UInt32 => BuiltinType::UnsignedInt,
        AbiTag::SInt64 => BuiltinType::LongLong,
        AbiTag::UInt64 => BuiltinType::UnsignedLongLong,
        AbiTag::Float => BuiltinType::Float,
        AbiTag::Double => BuiltinType::Double,
        AbiTag::Pointer => BuiltinType::Pointer,
        AbiTag::Void if ty.is_sized() && ty.size() > 0 => return Ok(opaque_storage(ty)),
        AbiTag::Void | AbiTag::LongDouble => return Err(LayoutError::UnsupportedType(ty.name().to_string())),
    };
    Ok(builtin(variant))
}

/// Opaque storage as an array of unsigned integers as wide as its alignment.
fn opaque_storage(ty: &TypeDescriptor) -> Type<()> {
    let (unit, width) = match ty.alignment() {
        8 => (BuiltinType::UnsignedLongLong, 8),
        4 => (BuiltinType::UnsignedInt, 4),
        2 => (BuiltinType::UnsignedShort, 2),
        _ => (BuiltinType::UnsignedChar, 1),
    };
    if ty.size() % width == 0 {
        repeated(builtin(unit), ty.size() / width)
    } else {
        repeated(builtin(BuiltinType::UnsignedChar), ty.size())
    }
}
