use std::cell::UnsafeCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use libffi::low::ffi_arg;
use libffi::middle::Type;
use libffi::raw;

use marrow_types::{catalog, AbiTag, FfiError, FfiResult, TypeArg, TypeDescriptor};

use crate::options::CallOptions;

/// Exchange buffer slots are aligned to this many bytes regardless of type.
pub const EXCHANGE_ALIGN: usize = 8;

const fn align_exchange(n: usize) -> usize {
    (n + EXCHANGE_ALIGN - 1) & !(EXCHANGE_ALIGN - 1)
}

/// Where arguments and the result live in an exchange buffer.
///
/// The buffer starts with one pointer per argument, followed by the
/// argument slots and then the result slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeLayout {
    pub argument_offsets: Vec<usize>,
    pub result_offset: usize,
    pub size: usize,
}

impl ExchangeLayout {
    pub fn compute(argument_types: &[TypeDescriptor], return_type: &TypeDescriptor) -> Self {
        let mut offset = align_exchange(mem::size_of::<*mut u8>() * argument_types.len());
        let mut argument_offsets = Vec::with_capacity(argument_types.len());
        for ty in argument_types {
            offset = align_exchange(offset);
            argument_offsets.push(offset);
            offset += ty.size();
        }
        let result_offset = align_exchange(offset);
        // libffi widens small integer results to a full ffi_arg.
        let size = result_offset + return_type.size().max(mem::size_of::<ffi_arg>());
        ExchangeLayout { argument_offsets, result_offset, size }
    }
}

/// Where a builder is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    Unbuilt,
    Validated,
    Compiled,
    Failed,
}

/// Validates a signature, then compiles it into a [`CallDescriptor`].
///
/// `Compiled` and `Failed` are terminal: a compiled builder keeps handing
/// out the same descriptor and a failed one keeps reporting its failure.
pub struct CallDescriptorBuilder {
    state: BuilderState,
    return_type: Option<TypeDescriptor>,
    argument_types: Vec<TypeDescriptor>,
    options: Option<CallOptions>,
    compiled: Option<Rc<CallDescriptor>>,
    failure: Option<FfiError>,
}

impl Default for CallDescriptorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CallDescriptorBuilder {
    pub fn new() -> Self {
        CallDescriptorBuilder {
            state: BuilderState::Unbuilt,
            return_type: None,
            argument_types: Vec::new(),
            options: None,
            compiled: None,
            failure: None,
        }
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// Resolves the return and argument types. Names are looked up in the
    /// options' `type_map` first, then in the catalog.
    pub fn initialize(
        &mut self,
        return_type: impl Into<TypeArg>,
        argument_types: Vec<TypeArg>,
        options: Option<CallOptions>,
    ) -> FfiResult<()> {
        match self.state {
            BuilderState::Unbuilt => {}
            BuilderState::Failed => return Err(self.stored_failure()),
            BuilderState::Validated | BuilderState::Compiled => {
                return Err(FfiError::CallPreparationFailed {
                    signature: self.signature(),
                    reason: "builder is already initialized".to_string(),
                })
            }
        }
        let result = resolve_signature(&return_type.into(), &argument_types, options.as_ref());
        match result {
            Ok((return_type, argument_types)) => {
                self.return_type = Some(return_type);
                self.argument_types = argument_types;
                self.options = options;
                self.state = BuilderState::Validated;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Lays out the exchange buffer and prepares the native call interface.
    pub fn build(&mut self) -> FfiResult<Rc<CallDescriptor>> {
        match self.state {
            BuilderState::Validated => {}
            BuilderState::Compiled => {
                if let Some(descriptor) = &self.compiled {
                    return Ok(descriptor.clone());
                }
            }
            BuilderState::Failed => return Err(self.stored_failure()),
            BuilderState::Unbuilt => {
                return Err(FfiError::CallPreparationFailed {
                    signature: "?".to_string(),
                    reason: "build called before initialize".to_string(),
                })
            }
        }
        let return_type = match &self.return_type {
            Some(ty) => ty.clone(),
            None => {
                let err = FfiError::CallPreparationFailed {
                    signature: "?".to_string(),
                    reason: "no return type".to_string(),
                };
                return Err(self.fail(err));
            }
        };
        match CallDescriptor::compile(return_type, self.argument_types.clone(), self.options.clone()) {
            Ok(descriptor) => {
                let descriptor = Rc::new(descriptor);
                self.compiled = Some(descriptor.clone());
                self.state = BuilderState::Compiled;
                Ok(descriptor)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn fail(&mut self, err: FfiError) -> FfiError {
        log::debug!("call descriptor builder failed: {err}");
        self.state = BuilderState::Failed;
        self.failure = Some(err.clone());
        err
    }

    fn stored_failure(&self) -> FfiError {
        self.failure.clone().unwrap_or_else(|| FfiError::CallPreparationFailed {
            signature: self.signature(),
            reason: "builder failed earlier".to_string(),
        })
    }

    fn signature(&self) -> String {
        match &self.return_type {
            Some(ret) => format_signature(ret, &self.argument_types),
            None => "?".to_string(),
        }
    }
}

fn resolve_signature(
    return_type: &TypeArg,
    argument_types: &[TypeArg],
    options: Option<&CallOptions>,
) -> FfiResult<(TypeDescriptor, Vec<TypeDescriptor>)> {
    let ret = resolve_type(return_type, "return", options)?;
    if is_varargs(&ret) {
        return Err(FfiError::InvalidArgumentType { position: "return".to_string(), found: ret.name().to_string() });
    }
    let mut args = Vec::with_capacity(argument_types.len());
    for (index, arg) in argument_types.iter().enumerate() {
        let position = format!("argument {index}");
        let ty = resolve_type(arg, &position, options)?;
        if !ty.is_sized() || is_varargs(&ty) {
            return Err(FfiError::InvalidArgumentType { position, found: ty.name().to_string() });
        }
        args.push(ty);
    }
    Ok((ret, args))
}

/// Variadic calls are not supported.
fn is_varargs(ty: &TypeDescriptor) -> bool {
    ty.name().eq_ignore_ascii_case("VARARGS")
}

fn resolve_type(arg: &TypeArg, position: &str, options: Option<&CallOptions>) -> FfiResult<TypeDescriptor> {
    if let (TypeArg::Name(name), Some(options)) = (arg, options) {
        if let Some(target) = options.mapped_name(name) {
            return catalog().lookup(target);
        }
    }
    catalog().resolve(arg, position)
}

fn format_signature(return_type: &TypeDescriptor, argument_types: &[TypeDescriptor]) -> String {
    let args: Vec<&str> = argument_types.iter().map(TypeDescriptor::name).collect();
    format!("{}({})", return_type.name(), args.join(", "))
}

/// The libffi type an argument or result is passed as. Sized storage
/// without a scalar ABI type (structs by value) travels as a pointer.
pub(crate) fn call_abi(ty: &TypeDescriptor, is_argument: bool) -> AbiTag {
    match ty.abi() {
        AbiTag::Void if is_argument || ty.is_sized() => AbiTag::Pointer,
        abi => abi,
    }
}

/// A compiled, immutable call interface for one signature.
pub struct CallDescriptor {
    signature: String,
    return_type: TypeDescriptor,
    argument_types: Vec<TypeDescriptor>,
    layout: ExchangeLayout,
    options: Option<CallOptions>,
    cif: Box<UnsafeCell<raw::ffi_cif>>,
    // `cif` points into both of these; neither may change after prep.
    _atypes: Vec<*mut raw::ffi_type>,
    _ffi_types: Vec<Type>,
}

impl CallDescriptor {
    fn compile(
        return_type: TypeDescriptor,
        argument_types: Vec<TypeDescriptor>,
        options: Option<CallOptions>,
    ) -> FfiResult<Self> {
        let signature = format_signature(&return_type, &argument_types);
        if cfg!(target_endian = "big") {
            return Err(FfiError::CallPreparationFailed {
                signature,
                reason: "exchange buffer layout is not implemented for big-endian targets".to_string(),
            });
        }
        let layout = ExchangeLayout::compute(&argument_types, &return_type);

        let ffi_return = call_abi(&return_type, false).ffi_type();
        let ffi_args: Vec<Type> = argument_types.iter().map(|ty| call_abi(ty, true).ffi_type()).collect();
        let mut atypes: Vec<*mut raw::ffi_type> = ffi_args.iter().map(Type::as_raw_ptr).collect();

        // SAFETY: ffi_cif is plain C data; prep_cif fills it in.
        let cif: Box<UnsafeCell<raw::ffi_cif>> = Box::new(UnsafeCell::new(unsafe { mem::zeroed() }));
        // SAFETY: the type pointers are owned by `ffi_args`/`ffi_return` and
        // stored on the descriptor together with the cif.
        let status = unsafe {
            raw::ffi_prep_cif(
                cif.get(),
                raw::ffi_abi_FFI_DEFAULT_ABI,
                atypes.len() as u32,
                ffi_return.as_raw_ptr(),
                atypes.as_mut_ptr(),
            )
        };
        if status != raw::ffi_status_FFI_OK {
            return Err(FfiError::CallPreparationFailed {
                signature,
                reason: format!("ffi_prep_cif returned status {status}"),
            });
        }
        log::debug!(
            "compiled call descriptor {signature}: argument offsets {:?}, result at {}, {} byte exchange buffer",
            layout.argument_offsets,
            layout.result_offset,
            layout.size
        );

        let mut ffi_types = ffi_args;
        ffi_types.push(ffi_return);
        Ok(CallDescriptor {
            signature,
            return_type,
            argument_types,
            layout,
            options,
            cif,
            _atypes: atypes,
            _ffi_types: ffi_types,
        })
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn return_type(&self) -> &TypeDescriptor {
        &self.return_type
    }

    pub fn argument_types(&self) -> &[TypeDescriptor] {
        &self.argument_types
    }

    pub fn exchange_layout(&self) -> &ExchangeLayout {
        &self.layout
    }

    pub fn argument_offsets(&self) -> &[usize] {
        &self.layout.argument_offsets
    }

    pub fn result_offset(&self) -> usize {
        self.layout.result_offset
    }

    pub fn exchange_size(&self) -> usize {
        self.layout.size
    }

    pub fn options(&self) -> Option<&CallOptions> {
        self.options.as_ref()
    }

    /// The prepared libffi call interface.
    pub fn abi_handle(&self) -> *mut raw::ffi_cif {
        self.cif.get()
    }
}

impl fmt::Debug for CallDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallDescriptor")
            .field("signature", &self.signature)
            .field("layout", &self.layout)
            .field("options", &self.options)
            .finish()
    }
}

impl fmt::Display for CallDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<CallDescriptor {} size={}>", self.signature, self.layout.size)
    }
}
