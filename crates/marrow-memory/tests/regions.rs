use marrow_memory::{MemoryRegion, NonOwningView, OwnedBuffer, OwnedPointer, TypeHint, ACCESSOR_ALIASES};
use marrow_types::{find_type, Address, DataConverter, FfiError, Value};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn primitives_round_trip() {
    init();
    let buffer = OwnedBuffer::new(32usize, 1, true).unwrap();
    let cases = [
        ("int8", Value::Int(-128)),
        ("uint8", Value::UInt(255)),
        ("int16", Value::Int(-30000)),
        ("uint16", Value::UInt(65535)),
        ("int32", Value::Int(i32::MIN as i64)),
        ("uint32", Value::UInt(u32::MAX as u64)),
        ("int64", Value::Int(i64::MAX)),
        ("uint64", Value::UInt(u64::MAX)),
        ("float32", Value::Float(1.5)),
        ("float64", Value::Float(-0.125)),
        ("bool", Value::Bool(true)),
        ("pointer", Value::Pointer(Address::new(0xdead_beef))),
        ("string", Value::from("marrow")),
    ];
    for (name, value) in cases {
        buffer.put(name, 8, &value).unwrap();
        assert_eq!(buffer.get(name, 8).unwrap(), value, "{name}");
    }
}

#[test]
fn catalog_only_types_round_trip() {
    let buffer = OwnedBuffer::new(32usize, 1, true).unwrap();
    let address = Value::Pointer(Address::new(0x1000));
    let cases = [
        ("LONG", Value::Int(-123_456)),
        ("ULONG", Value::UInt(4_000_000_000)),
        ("LONGDOUBLE", Value::Float(2.5)),
        ("CALLBACK", address.clone()),
        ("FUNCTION", address.clone()),
        ("BUFFER_IN", address.clone()),
        ("BUFFER_OUT", address.clone()),
        ("BUFFER_INOUT", address),
    ];
    for (name, value) in cases {
        let ty = find_type(name).unwrap();
        buffer.put_typed(&ty, 8, &value).unwrap();
        assert_eq!(buffer.get_typed(&ty, 8).unwrap(), value, "{name}");
    }
}

#[test]
fn placeholder_types_neither_read_nor_write() {
    let buffer = OwnedBuffer::new(16usize, 1, true).unwrap();
    buffer.put_bytes(0, &[0xaa; 16], 0, None).unwrap();
    for name in ["VARARGS", "NATIVE_MAPPED"] {
        let ty = find_type(name).unwrap();
        buffer.put_typed(&ty, 0, &Value::Int(7)).unwrap();
        assert_eq!(buffer.get_typed(&ty, 0).unwrap(), Value::Nil, "{name}");
    }
    assert_eq!(buffer.get_bytes(0, 16).unwrap(), vec![0xaa; 16]);
}

#[test]
fn mapped_types_convert_through_regions() {
    let cents = DataConverter::new()
        .native_type(find_type("INT64").unwrap())
        .to_native_with(|v| Ok(Value::Int((v.coerce_float()? * 100.0).round() as i64)))
        .from_native_with(|v| Ok(Value::Float(v.coerce_int()? as f64 / 100.0)))
        .into_type()
        .unwrap();
    let buffer = OwnedBuffer::new(cents.clone(), 2, true).unwrap();

    buffer.put_typed(&cents, 8, &Value::Float(12.34)).unwrap();
    assert_eq!(buffer.get("int64", 8).unwrap(), Value::Int(1234));
    assert_eq!(buffer.get_typed(&cents, 8).unwrap(), Value::Float(12.34));
    assert!(matches!(buffer.put_typed(&cents, 12, &Value::Float(1.0)), Err(FfiError::OutOfBounds { .. })));
}

#[test]
fn bounds_are_checked_on_both_ends() {
    let buffer = OwnedBuffer::new("uint8", 16, true).unwrap();
    for offset in 0..=12 {
        buffer.put("int32", offset, &Value::Int(offset)).unwrap();
        assert_eq!(buffer.get("int32", offset).unwrap(), Value::Int(offset));
    }
    assert_eq!(
        buffer.get("int32", 13).unwrap_err(),
        FfiError::OutOfBounds { offset: 13, size: 4, limit: 16 }
    );
    assert!(matches!(buffer.get("int32", -1), Err(FfiError::OutOfBounds { .. })));
    assert!(matches!(buffer.put("int64", 9, &Value::Int(0)), Err(FfiError::OutOfBounds { .. })));
    assert!(matches!(buffer.get_bytes(10, 7), Err(FfiError::OutOfBounds { .. })));
    assert!(matches!(buffer.get_bytes(0, -1), Err(FfiError::OutOfBounds { .. })));
    assert!(matches!(
        NonOwningView::null().get_bytes(0, -1),
        Err(FfiError::NullPointerAccess { .. })
    ));
}

#[test]
fn aliases_read_the_same_bytes_as_canonical_names() {
    let buffer = OwnedBuffer::new(8usize, 1, true).unwrap();
    buffer.put_bytes(0, &[0x81, 0x92, 0xa3, 0xb4, 0xc5, 0xd6, 0xe7, 0xf8], 0, None).unwrap();
    for (alias, canonical) in ACCESSOR_ALIASES {
        assert_eq!(buffer.read(alias).unwrap(), buffer.read(canonical).unwrap(), "{alias}");
    }
}

#[test]
fn slices_share_backing_bytes() {
    let buffer = OwnedBuffer::new(16usize, 1, true).unwrap();
    let view = buffer.slice(4, 8).unwrap();
    assert_eq!(view.size(), 8);

    view.put("int32", 0, &Value::Int(0x0102_0304)).unwrap();
    assert_eq!(buffer.get("int32", 4).unwrap(), Value::Int(0x0102_0304));

    buffer.put("int32", 8, &Value::Int(-2)).unwrap();
    assert_eq!(view.get("int32", 4).unwrap(), Value::Int(-2));

    assert!(matches!(view.get("int32", 5), Err(FfiError::OutOfBounds { limit: 8, .. })));
    assert!(matches!(buffer.slice(12, 8), Err(FfiError::OutOfBounds { .. })));
}

#[test]
fn release_is_idempotent_and_poisons_views() {
    init();
    let buffer = OwnedBuffer::new("int64", 2, true).unwrap();
    let view = buffer.slice(0, 8).unwrap();
    buffer.release();
    buffer.release();
    assert!(buffer.is_released());
    assert!(matches!(buffer.get("int64", 0), Err(FfiError::UseAfterRelease { .. })));
    assert!(matches!(view.get("int64", 0), Err(FfiError::UseAfterRelease { .. })));
    drop(view);
    drop(buffer);
}

#[test]
fn put_bytes_validates_the_source_window() {
    let buffer = OwnedBuffer::new(4usize, 1, true).unwrap();
    let data = [1u8, 2, 3, 4, 5, 6];

    buffer.put_bytes(1, &data, 3, Some(3)).unwrap();
    assert_eq!(buffer.get_bytes(0, 4).unwrap(), vec![0, 4, 5, 6]);

    assert!(matches!(buffer.put_bytes(0, &data, -1, Some(1)), Err(FfiError::RangeError { .. })));
    assert!(matches!(buffer.put_bytes(0, &data, 4, Some(3)), Err(FfiError::RangeError { .. })));
    assert!(matches!(buffer.put_bytes(0, &data, 0, Some(-2)), Err(FfiError::OutOfBounds { .. })));
    assert!(matches!(buffer.put_bytes(0, &data, 0, None), Err(FfiError::OutOfBounds { .. })));
    assert!(matches!(
        NonOwningView::null().put_bytes(0, &data, 0, None),
        Err(FfiError::NullPointerAccess { .. })
    ));
}

#[test]
fn put_bytes_rejects_extreme_windows() {
    let buffer = OwnedBuffer::new(4usize, 1, true).unwrap();
    let data = [1u8, 2, 3];
    assert!(matches!(buffer.put_bytes(0, &data, i64::MIN, None), Err(FfiError::RangeError { .. })));
    assert!(matches!(buffer.put_bytes(0, &data, 1, Some(i64::MAX)), Err(FfiError::RangeError { .. })));
    assert!(matches!(buffer.put_bytes(0, &data, 4, None), Err(FfiError::RangeError { .. })));
    assert_eq!(buffer.get_bytes(0, 4).unwrap(), vec![0; 4]);
}

#[test]
fn c_strings_stop_at_the_terminator() {
    let buffer = OwnedBuffer::new("char", 16, true).unwrap();
    buffer.put_string(2, "abc").unwrap();
    assert_eq!(buffer.get_string(2).unwrap(), "abc");
    assert_eq!(buffer.get_string(0).unwrap(), "");
    assert!(buffer.put_string(14, "abc").is_err());
    assert!(matches!(buffer.get_string(16), Err(FfiError::OutOfBounds { .. })));
}

#[test]
fn empty_buffers_have_no_string() {
    let empty = OwnedBuffer::new("int32", 0, true).unwrap();
    assert_eq!(empty.size(), 0);
    assert!(matches!(empty.get_string(0), Err(FfiError::OutOfBounds { offset: 0, size: 1, limit: 0 })));
    assert!(matches!(NonOwningView::null().get_string(0), Err(FfiError::NullPointerAccess { .. })));
}

#[test]
fn typed_arrays_use_the_element_stride() {
    let pointer = OwnedPointer::new("int16", 5).unwrap();
    let values: Vec<Value> = (0..5).map(|i| Value::Int(i * 100)).collect();
    pointer.write_array_of("short", &values).unwrap();
    assert_eq!(pointer.read_array_of("int16", 5).unwrap(), values);
    assert_eq!(pointer.get_array_of("int16", 6, 2).unwrap(), vec![Value::Int(300), Value::Int(400)]);
    assert!(pointer.put_array_of("int16", 4, &values).is_err());
    assert_eq!(pointer.get("int16", 4).unwrap(), Value::Int(200));
}

#[test]
fn typed_arrays_near_the_offset_limit_are_out_of_bounds() {
    let pointer = OwnedPointer::new("int64", 2).unwrap();
    assert!(matches!(pointer.get_array_of("int64", i64::MAX - 4, 2), Err(FfiError::OutOfBounds { .. })));
    assert!(matches!(pointer.get_array_of("int64", 8, usize::MAX), Err(FfiError::OutOfBounds { .. })));
    assert!(matches!(
        pointer.put_array_of("int64", i64::MAX, &[Value::Int(1), Value::Int(2)]),
        Err(FfiError::OutOfBounds { .. })
    ));
}

#[test]
fn allocation_rejects_bad_hints() {
    assert!(matches!(
        OwnedBuffer::new(Value::Float(2.0), 1, true),
        Err(FfiError::InvalidTypeHint(_))
    ));
    assert!(matches!(OwnedBuffer::new("quad", 1, true), Err(FfiError::UnknownType(_))));
    let buffer = OwnedBuffer::new(TypeHint::from(find_type("FLOAT64").unwrap()), 2, true).unwrap();
    assert_eq!(buffer.size(), 16);
}

#[test]
fn buffers_compare_by_address() {
    let a = OwnedBuffer::new(4usize, 1, true).unwrap();
    let b = OwnedBuffer::new(4usize, 1, true).unwrap();
    assert_eq!(a, a);
    assert_ne!(a, b);
    assert_eq!(a.slice(0, 4).unwrap(), NonOwningView::wrap(a.address()));
}
