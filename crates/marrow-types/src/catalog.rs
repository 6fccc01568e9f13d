use std::mem;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::abi::AbiTag;
use crate::descriptor::TypeDescriptor;
use crate::error::{FfiError, FfiResult};
use crate::strategy::MarshalStrategy;
use crate::value::Value;

static CATALOG: Lazy<TypeCatalog> = Lazy::new(TypeCatalog::with_builtins);

/// The process-wide catalog of builtin native types.
pub fn catalog() -> &'static TypeCatalog {
    &CATALOG
}

/// Shorthand for `catalog().lookup(name)`.
pub fn find_type(name: &str) -> FfiResult<TypeDescriptor> {
    catalog().lookup(name)
}

struct CatalogEntry {
    descriptor: TypeDescriptor,
    aliases: &'static [&'static str],
}

/// Registry of native type descriptors keyed by canonical name and alias.
///
/// Each alias maps straight to one canonical entry; aliases never chain.
pub struct TypeCatalog {
    entries: Vec<CatalogEntry>,
    index: FxHashMap<String, usize>,
}

impl TypeCatalog {
    fn with_builtins() -> Self {
        let mut catalog = TypeCatalog { entries: Vec::new(), index: FxHashMap::default() };

        let ptr_size = mem::size_of::<*const u8>();
        let ptr_align = mem::align_of::<*const u8>();
        let long_size = mem::size_of::<libc::c_long>();
        let bool_size = mem::size_of::<bool>();

        catalog.register(
            TypeDescriptor::builtin("VOID", None, 1, AbiTag::Void, MarshalStrategy::Void),
            &[],
        );
        let integer_pairs: [(&str, &str, usize, &'static [&'static str], &'static [&'static str]); 5] = [
            ("INT8", "UINT8", 1, &["CHAR", "SCHAR"], &["UCHAR"]),
            ("INT16", "UINT16", 2, &["SHORT", "SSHORT"], &["USHORT"]),
            ("INT32", "UINT32", 4, &["INT", "SINT"], &["UINT"]),
            ("INT64", "UINT64", 8, &["LONG_LONG", "SLONG_LONG"], &["ULONG_LONG"]),
            ("LONG", "ULONG", long_size, &["SLONG"], &[]),
        ];
        for (signed, unsigned, width, signed_aliases, unsigned_aliases) in integer_pairs {
            catalog.register(
                TypeDescriptor::builtin(
                    signed,
                    Some(width),
                    width,
                    AbiTag::signed(width),
                    MarshalStrategy::Signed { width },
                ),
                signed_aliases,
            );
            catalog.register(
                TypeDescriptor::builtin(
                    unsigned,
                    Some(width),
                    width,
                    AbiTag::unsigned(width),
                    MarshalStrategy::Unsigned { width },
                ),
                unsigned_aliases,
            );
        }
        catalog.register(
            TypeDescriptor::builtin("FLOAT32", Some(4), 4, AbiTag::Float, MarshalStrategy::Float { width: 4 }),
            &["FLOAT"],
        );
        catalog.register(
            TypeDescriptor::builtin("FLOAT64", Some(8), 8, AbiTag::Double, MarshalStrategy::Float { width: 8 }),
            &["DOUBLE"],
        );
        // Long double is stored at its native width but marshalled as a double.
        let long_double_size = AbiTag::LongDouble.native_size();
        catalog.register(
            TypeDescriptor::builtin(
                "LONGDOUBLE",
                Some(long_double_size),
                AbiTag::LongDouble.native_alignment(),
                AbiTag::LongDouble,
                MarshalStrategy::Float { width: long_double_size },
            ),
            &[],
        );
        // BUFFER_* are plain pointers until in/out buffer semantics exist.
        for name in ["POINTER", "CALLBACK", "FUNCTION", "BUFFER_IN", "BUFFER_OUT", "BUFFER_INOUT"] {
            catalog.register(
                TypeDescriptor::builtin(name, Some(ptr_size), ptr_align, AbiTag::Pointer, MarshalStrategy::Pointer),
                &[],
            );
        }
        catalog.register(
            TypeDescriptor::builtin(
                "BOOL",
                Some(bool_size),
                bool_size,
                AbiTag::unsigned(bool_size),
                MarshalStrategy::Bool { width: bool_size },
            ),
            &[],
        );
        catalog.register(
            TypeDescriptor::builtin("STRING", Some(ptr_size), ptr_align, AbiTag::Pointer, MarshalStrategy::String),
            &[],
        );
        catalog.register(
            TypeDescriptor::builtin("VARARGS", Some(1), 1, AbiTag::Void, MarshalStrategy::Void),
            &[],
        );
        catalog.register(
            TypeDescriptor::builtin("NATIVE_MAPPED", Some(ptr_size), ptr_align, AbiTag::Void, MarshalStrategy::Void),
            &[],
        );

        log::debug!("type catalog initialized with {} types", catalog.entries.len());
        catalog
    }

    fn register(&mut self, descriptor: TypeDescriptor, aliases: &'static [&'static str]) {
        let position = self.entries.len();
        for name in std::iter::once(descriptor.name()).chain(aliases.iter().copied()) {
            let previous = self.index.insert(name.to_string(), position);
            debug_assert!(previous.is_none(), "type name {name} registered twice");
        }
        self.entries.push(CatalogEntry { descriptor, aliases });
    }

    fn entry(&self, name: &str) -> FfiResult<&CatalogEntry> {
        let key = name.to_ascii_uppercase();
        self.index
            .get(&key)
            .map(|&position| &self.entries[position])
            .ok_or_else(|| FfiError::UnknownType(name.to_string()))
    }

    /// Resolves a canonical name or alias, ignoring ASCII case.
    pub fn lookup(&self, name: &str) -> FfiResult<TypeDescriptor> {
        self.entry(name).map(|entry| entry.descriptor.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_ascii_uppercase())
    }

    /// Platform aliases of the canonical type `name` resolves to.
    pub fn aliases_of(&self, name: &str) -> FfiResult<&'static [&'static str]> {
        self.entry(name).map(|entry| entry.aliases)
    }

    /// Canonical descriptors with their aliases, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&TypeDescriptor, &'static [&'static str])> + '_ {
        self.entries.iter().map(|entry| (&entry.descriptor, entry.aliases))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Turns whatever the host passed where a native type was required into
    /// a descriptor. `position` names the slot for the error message.
    pub fn resolve(&self, arg: &TypeArg, position: &str) -> FfiResult<TypeDescriptor> {
        match arg {
            TypeArg::Type(descriptor) => Ok(descriptor.clone()),
            TypeArg::Name(name) => self.lookup(name),
            TypeArg::Value(value) => Err(FfiError::InvalidArgumentType {
                position: position.to_string(),
                found: value.to_string(),
            }),
        }
    }
}

/// A host-supplied type argument.
#[derive(Debug, Clone)]
pub enum TypeArg {
    Type(TypeDescriptor),
    /// A symbolic name, looked up in the catalog.
    Name(String),
    /// Any other host value; never a valid native type.
    Value(Value),
}

impl From<TypeDescriptor> for TypeArg {
    fn from(descriptor: TypeDescriptor) -> Self {
        TypeArg::Type(descriptor)
    }
}

impl From<&TypeDescriptor> for TypeArg {
    fn from(descriptor: &TypeDescriptor) -> Self {
        TypeArg::Type(descriptor.clone())
    }
}

impl From<&str> for TypeArg {
    fn from(name: &str) -> Self {
        TypeArg::Name(name.to_string())
    }
}

impl From<Value> for TypeArg {
    fn from(value: Value) -> Self {
        TypeArg::Value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_the_same_descriptor() {
        let catalog = catalog();
        for (descriptor, aliases) in catalog.iter() {
            for alias in aliases {
                let resolved = catalog.lookup(alias).unwrap();
                assert_eq!(&resolved, descriptor);
                assert_eq!(resolved.size(), descriptor.size());
            }
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(find_type("int32").unwrap().name(), "INT32");
        assert_eq!(find_type("Double").unwrap().name(), "FLOAT64");
    }

    #[test]
    fn unknown_type_is_reported_by_name() {
        let err = find_type("QUADRUPLE").unwrap_err();
        assert_eq!(err, FfiError::UnknownType("QUADRUPLE".to_string()));
    }

    #[test]
    fn void_is_unsized() {
        let void = find_type("VOID").unwrap();
        assert!(!void.is_sized());
        assert_eq!(void.size(), 0);
    }

    #[test]
    fn long_tracks_platform_word() {
        assert_eq!(find_type("LONG").unwrap().size(), mem::size_of::<libc::c_long>());
        assert_eq!(find_type("ULONG").unwrap().size(), mem::size_of::<libc::c_ulong>());
    }

    #[test]
    fn buffer_types_behave_as_pointers() {
        for name in ["BUFFER_IN", "BUFFER_OUT", "BUFFER_INOUT"] {
            let ty = find_type(name).unwrap();
            assert_eq!(ty.abi(), AbiTag::Pointer);
            assert_eq!(ty.strategy().family(), "pointer");
        }
    }

    #[test]
    fn values_are_rejected_as_types() {
        let err = catalog()
            .resolve(&TypeArg::Value(Value::Int(3)), "return")
            .unwrap_err();
        assert!(matches!(err, FfiError::InvalidArgumentType { .. }));
    }
}
