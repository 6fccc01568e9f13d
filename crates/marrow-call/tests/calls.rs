use std::ffi::{c_char, CStr};
use std::rc::Rc;

use marrow_call::{BuilderState, CallDescriptor, CallDescriptorBuilder, CallOptions, ExchangeBuffer};
use marrow_memory::{MemoryRegion, OwnedBuffer};
use marrow_types::{find_type, Address, FfiError, TypeArg, Value};

extern "C" fn add(a: i32, b: i32) -> i32 {
    a + b
}

extern "C" fn negate(x: i8) -> i8 {
    x.wrapping_neg()
}

extern "C" fn scale(x: f64, factor: u16) -> f64 {
    x * factor as f64
}

extern "C" fn text_length(text: *const c_char) -> u64 {
    if text.is_null() {
        return u64::MAX;
    }
    unsafe { CStr::from_ptr(text) }.to_bytes().len() as u64
}

extern "C" fn store(target: *mut i64, value: i64) {
    unsafe { *target = value };
}

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn compile(ret: &str, args: &[&str]) -> Rc<CallDescriptor> {
    let mut builder = CallDescriptorBuilder::new();
    let args = args.iter().map(|&name| TypeArg::from(name)).collect();
    builder.initialize(ret, args, None).unwrap();
    builder.build().unwrap()
}

fn address_of(function: usize) -> Address {
    Address::new(function)
}

#[test]
fn descriptors_are_deterministic() {
    init();
    let first = compile("INT32", &["INT32", "INT32"]);
    let second = compile("int32", &["int", "sint"]);
    assert_eq!(first.exchange_layout(), second.exchange_layout());
    assert_eq!(first.argument_offsets(), second.argument_offsets());
    assert_eq!(first.result_offset(), second.result_offset());
    assert_eq!(first.exchange_size(), second.exchange_size());
    assert_eq!(first.signature(), "INT32(INT32, INT32)");
}

#[test]
fn builder_walks_its_states() {
    let mut builder = CallDescriptorBuilder::new();
    assert_eq!(builder.state(), BuilderState::Unbuilt);
    assert!(builder.build().is_err());
    assert_eq!(builder.state(), BuilderState::Unbuilt);

    builder.initialize("VOID", vec![TypeArg::from("POINTER")], None).unwrap();
    assert_eq!(builder.state(), BuilderState::Validated);

    let descriptor = builder.build().unwrap();
    assert_eq!(builder.state(), BuilderState::Compiled);
    assert!(Rc::ptr_eq(&descriptor, &builder.build().unwrap()));
    assert!(builder.initialize("VOID", vec![], None).is_err());
}

#[test]
fn invalid_types_fail_the_builder() {
    let mut builder = CallDescriptorBuilder::new();
    let err = builder
        .initialize("INT32", vec![TypeArg::from("INT32"), TypeArg::from(Value::Int(4))], None)
        .unwrap_err();
    assert_eq!(
        err,
        FfiError::InvalidArgumentType { position: "argument 1".to_string(), found: "4".to_string() }
    );
    assert_eq!(builder.state(), BuilderState::Failed);
    assert_eq!(builder.build().unwrap_err(), err);

    let mut builder = CallDescriptorBuilder::new();
    assert!(matches!(
        builder.initialize(Value::from(1.5), vec![], None),
        Err(FfiError::InvalidArgumentType { .. })
    ));

    let mut builder = CallDescriptorBuilder::new();
    assert!(matches!(
        builder.initialize("VOID", vec![TypeArg::from("VOID")], None),
        Err(FfiError::InvalidArgumentType { .. })
    ));

    let mut builder = CallDescriptorBuilder::new();
    assert!(matches!(
        builder.initialize("INT32", vec![TypeArg::from("widget")], None),
        Err(FfiError::UnknownType(_))
    ));
}

#[test]
fn variadic_signatures_are_rejected() {
    let mut builder = CallDescriptorBuilder::new();
    let err = builder
        .initialize("INT32", vec![TypeArg::from("POINTER"), TypeArg::from("varargs")], None)
        .unwrap_err();
    assert_eq!(
        err,
        FfiError::InvalidArgumentType { position: "argument 1".to_string(), found: "VARARGS".to_string() }
    );
    assert_eq!(builder.state(), BuilderState::Failed);

    let mut builder = CallDescriptorBuilder::new();
    assert!(matches!(
        builder.initialize("VARARGS", vec![], None),
        Err(FfiError::InvalidArgumentType { .. })
    ));
}

#[test]
fn type_map_adds_custom_names() {
    let options = CallOptions::from_toml("[type_map]\nsize_t = \"ULONG\"\n").unwrap();
    let mut builder = CallDescriptorBuilder::new();
    builder
        .initialize("size_t", vec![TypeArg::from("size_t")], Some(options.clone()))
        .unwrap();
    let descriptor = builder.build().unwrap();
    assert_eq!(descriptor.return_type(), &find_type("ULONG").unwrap());
    assert_eq!(descriptor.options(), Some(&options));
}

#[test]
fn calls_native_functions() {
    init();
    let exchange = ExchangeBuffer::new(compile("INT32", &["INT32", "INT32"])).unwrap();
    exchange.set_arguments(&[Value::Int(40), Value::Int(2)]).unwrap();
    let result = unsafe { exchange.invoke(address_of(add as usize)) }.unwrap();
    assert_eq!(result, Value::Int(42));

    exchange.set_argument(0, &Value::Int(-7)).unwrap();
    assert_eq!(unsafe { exchange.invoke(address_of(add as usize)) }.unwrap(), Value::Int(-5));
}

#[test]
fn narrow_and_float_results() {
    let exchange = ExchangeBuffer::new(compile("INT8", &["INT8"])).unwrap();
    exchange.set_argument(0, &Value::Int(5)).unwrap();
    assert_eq!(unsafe { exchange.invoke(address_of(negate as usize)) }.unwrap(), Value::Int(-5));

    let exchange = ExchangeBuffer::new(compile("DOUBLE", &["DOUBLE", "USHORT"])).unwrap();
    exchange.set_arguments(&[Value::Float(1.25), Value::UInt(4)]).unwrap();
    assert_eq!(unsafe { exchange.invoke(address_of(scale as usize)) }.unwrap(), Value::Float(5.0));
}

#[test]
fn strings_and_pointers_cross_the_boundary() {
    let exchange = ExchangeBuffer::new(compile("UINT64", &["STRING"])).unwrap();
    exchange.set_argument(0, &Value::from("marrow")).unwrap();
    assert_eq!(unsafe { exchange.invoke(address_of(text_length as usize)) }.unwrap(), Value::UInt(6));

    let target = OwnedBuffer::new("int64", 1, true).unwrap();
    let exchange = ExchangeBuffer::new(compile("VOID", &["POINTER", "INT64"])).unwrap();
    exchange
        .set_arguments(&[Value::Pointer(target.address()), Value::Int(-99)])
        .unwrap();
    assert_eq!(unsafe { exchange.invoke(address_of(store as usize)) }.unwrap(), Value::Nil);
    assert_eq!(target.read("int64").unwrap(), Value::Int(-99));
}

#[test]
fn argument_count_and_null_function_are_checked() {
    let exchange = ExchangeBuffer::new(compile("INT32", &["INT32", "INT32"])).unwrap();
    assert!(exchange.set_arguments(&[Value::Int(1)]).is_err());
    assert!(exchange.set_argument(2, &Value::Int(1)).is_err());
    assert!(matches!(
        unsafe { exchange.invoke(Address::NULL) },
        Err(FfiError::NullPointerAccess { .. })
    ));
}

#[test]
fn pointer_array_addresses_the_argument_slots() {
    let descriptor = compile("INT32", &["INT32", "DOUBLE"]);
    let exchange = ExchangeBuffer::new(descriptor.clone()).unwrap();
    let buffer = exchange.buffer();
    let slots = buffer.read_array_of("pointer", 2).unwrap();
    let expected: Vec<Value> = descriptor
        .argument_offsets()
        .iter()
        .map(|&offset| Value::Pointer(buffer.address().offset(offset as i64)))
        .collect();
    assert_eq!(slots, expected);
}
