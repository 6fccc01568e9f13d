use std::fmt;

use libffi::middle::Type;
use libffi::raw;
use rustc_hash::FxHashMap;

use marrow_types::{AbiTag, FfiError, FfiResult};

use crate::field::Field;

/// Field offsets, total size and alignment of a struct type.
///
/// Offsets are taken as given: fields may pad or overlap however the
/// declaring code arranged them.
#[derive(Debug)]
pub struct StructLayout {
    name: String,
    fields: Vec<Field>,
    index: FxHashMap<String, usize>,
    size: usize,
    alignment: usize,
}

/// Size and alignment reported by the native layer for a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeStruct {
    pub size: usize,
    pub alignment: usize,
}

impl StructLayout {
    pub fn new(name: impl Into<String>, fields: Vec<Field>, size: usize, alignment: usize) -> FfiResult<Self> {
        let name = name.into();
        let mut index = FxHashMap::default();
        for (position, field) in fields.iter().enumerate() {
            if !field.ty().is_sized() {
                return Err(FfiError::InvalidLayout(format!(
                    "{name}.{} has unsized type {}",
                    field.name(),
                    field.ty().name()
                )));
            }
            if field.offset().checked_add(field.size()).map_or(true, |end| end > size) {
                return Err(FfiError::InvalidLayout(format!(
                    "{name}.{} at offset {} needs {} bytes but the struct is {size} bytes",
                    field.name(),
                    field.offset(),
                    field.size()
                )));
            }
            if index.insert(field.name().to_string(), position).is_some() {
                return Err(FfiError::InvalidLayout(format!("{name} declares `{}` twice", field.name())));
            }
        }
        Ok(StructLayout { name, fields, index, size, alignment: alignment.max(1) })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn alignment(&self) -> usize {
        self.alignment
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field names in declaration order.
    pub fn members(&self) -> Vec<&str> {
        self.fields.iter().map(Field::name).collect()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.index.get(name).map(|&position| &self.fields[position])
    }

    pub(crate) fn require_field(&self, name: &str) -> FfiResult<&Field> {
        self.field(name).ok_or_else(|| FfiError::UnknownField {
            field: name.to_string(),
            members: self.members().join(", "),
        })
    }

    /// Element ABI types in field order, array fields repeated once per
    /// element. Sized storage without a scalar ABI type is spelled as
    /// unsigned integers as wide as its alignment.
    pub fn abi_elements(&self) -> Vec<Type> {
        let mut elements = Vec::new();
        for field in &self.fields {
            let (element, count) = field.element();
            if element.abi() != AbiTag::Void {
                elements.extend((0..count).map(|_| element.abi().ffi_type()));
                continue;
            }
            let width = match element.alignment() {
                w @ (2 | 4 | 8) if element.size() % w == 0 => w,
                _ => 1,
            };
            let unit = AbiTag::unsigned(width);
            elements.extend((0..count * element.size() / width).map(|_| unit.ffi_type()));
        }
        elements
    }

    /// Asks libffi for the size and alignment of this struct.
    pub fn native_struct(&self) -> FfiResult<NativeStruct> {
        let elements = self.abi_elements();
        if elements.is_empty() {
            return Ok(NativeStruct { size: 0, alignment: 1 });
        }
        let count = elements.len();
        let ffi_type = Type::structure(elements);
        let raw_type = ffi_type.as_raw_ptr();
        let mut offsets = vec![0usize; count];
        // SAFETY: raw_type is a struct type with `count` elements owned by
        // `ffi_type`, and `offsets` has room for each of them.
        let status = unsafe {
            raw::ffi_get_struct_offsets(raw::ffi_abi_FFI_DEFAULT_ABI, raw_type, offsets.as_mut_ptr())
        };
        if status != raw::ffi_status_FFI_OK {
            return Err(FfiError::StructPreparationFailed {
                layout: self.to_string(),
                reason: format!("ffi_get_struct_offsets returned status {status}"),
            });
        }
        // SAFETY: initialized by the successful call above.
        let native = unsafe {
            NativeStruct { size: (*raw_type).size, alignment: (*raw_type).alignment as usize }
        };
        log::debug!(
            "prepared native struct {} ({} elements): size={} alignment={}",
            self.name,
            count,
            native.size,
            native.alignment
        );
        Ok(native)
    }
}

impl fmt::Display for StructLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{ ", self.name)?;
        for field in &self.fields {
            write!(f, "{}: {} @{}, ", field.name(), field.ty().name(), field.offset())?;
        }
        write!(f, "}} size={} align={}", self.size, self.alignment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marrow_types::find_type;

    fn int(name: &str) -> marrow_types::TypeDescriptor {
        find_type(name).unwrap()
    }

    #[test]
    fn rejects_duplicate_names() {
        let fields = vec![Field::new("a", int("INT32"), 0), Field::new("a", int("INT32"), 4)];
        assert!(matches!(StructLayout::new("Dup", fields, 8, 4), Err(FfiError::InvalidLayout(_))));
    }

    #[test]
    fn rejects_fields_past_the_end() {
        let fields = vec![Field::new("wide", int("INT64"), 4)];
        assert!(matches!(StructLayout::new("Short", fields, 8, 8), Err(FfiError::InvalidLayout(_))));
    }

    #[test]
    fn rejects_void_fields() {
        let fields = vec![Field::new("nothing", int("VOID"), 0)];
        assert!(StructLayout::new("Void", fields, 8, 8).is_err());
    }

    #[test]
    fn array_fields_expand_to_repeated_elements() {
        let fields = vec![
            Field::new("tag", int("UINT8"), 0),
            Field::array("values", int("INT32"), 3, 4),
        ];
        let layout = StructLayout::new("Tagged", fields, 16, 4).unwrap();
        assert_eq!(layout.abi_elements().len(), 4);
        assert_eq!(layout.members(), vec!["tag", "values"]);
        assert_eq!(layout.field("values").unwrap().size(), 12);
        assert!(layout.field("missing").is_none());
    }

    #[test]
    fn native_struct_matches_c_rules() {
        let fields = vec![Field::new("a", int("INT8"), 0), Field::new("b", int("INT64"), 8)];
        let layout = StructLayout::new("Padded", fields, 16, 8).unwrap();
        assert_eq!(layout.native_struct().unwrap(), NativeStruct { size: 16, alignment: 8 });
    }
}
