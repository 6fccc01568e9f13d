use libffi::middle::Type;

/// Calling-convention representation of a native type, handed to libffi when
/// a call interface or a struct type is prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbiTag {
    Void,
    SInt8,
    UInt8,
    SInt16,
    UInt16,
    SInt32,
    UInt32,
    SInt64,
    UInt64,
    Float,
    Double,
    LongDouble,
    Pointer,
}

impl AbiTag {
    /// Signed tag for an integer of `width` bytes.
    pub const fn signed(width: usize) -> AbiTag {
        match width {
            1 => AbiTag::SInt8,
            2 => AbiTag::SInt16,
            4 => AbiTag::SInt32,
            _ => AbiTag::SInt64,
        }
    }

    /// Unsigned tag for an integer of `width` bytes.
    pub const fn unsigned(width: usize) -> AbiTag {
        match width {
            1 => AbiTag::UInt8,
            2 => AbiTag::UInt16,
            4 => AbiTag::UInt32,
            _ => AbiTag::UInt64,
        }
    }

    /// A fresh libffi type for this tag. Builtin libffi types are statics, so
    /// this never allocates.
    pub fn ffi_type(self) -> Type {
        match self {
            AbiTag::Void => Type::void(),
            AbiTag::SInt8 => Type::i8(),
            AbiTag::UInt8 => Type::u8(),
            AbiTag::SInt16 => Type::i16(),
            AbiTag::UInt16 => Type::u16(),
            AbiTag::SInt32 => Type::i32(),
            AbiTag::UInt32 => Type::u32(),
            AbiTag::SInt64 => Type::i64(),
            AbiTag::UInt64 => Type::u64(),
            AbiTag::Float => Type::f32(),
            AbiTag::Double => Type::f64(),
            AbiTag::LongDouble => Type::longdouble(),
            AbiTag::Pointer => Type::pointer(),
        }
    }

    /// Size libffi reports for this tag. Builtin types carry their size before
    /// any call interface is prepared.
    pub fn native_size(self) -> usize {
        let ty = self.ffi_type();
        // SAFETY: builtin libffi types point at initialized statics.
        unsafe { (*ty.as_raw_ptr()).size }
    }

    pub fn native_alignment(self) -> usize {
        let ty = self.ffi_type();
        // SAFETY: see `native_size`.
        unsafe { (*ty.as_raw_ptr()).alignment as usize }
    }
}
