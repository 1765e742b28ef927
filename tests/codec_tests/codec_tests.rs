//! Tests for the typed value codec
//!
//! These tests verify:
//! - Scalars, fixed arrays, vectors and strings encode with the right tag/count
//! - Decoding under another tag always fails with TypeMismatch
//! - Fixed element counts are enforced with SizeMismatch
//! - Dynamic values decode any buffer by its own tag

use fragkv::{decode, encode, CellValNum, Datatype, MapError, TypedBuffer, Value};

// =============================================================================
// Encoding Shape Tests
// =============================================================================

#[test]
fn test_scalar_shape() {
    let buf = encode(&3.5f64);
    assert_eq!(buf.datatype(), Datatype::Float64);
    assert_eq!(buf.cell_val_num(), CellValNum::Fixed(1));
    assert_eq!(buf.len(), 8);
    assert_eq!(buf.element_count(), 1);
}

#[test]
fn test_fixed_array_shape() {
    let buf = encode(&[1u16, 2, 3]);
    assert_eq!(buf.datatype(), Datatype::UInt16);
    assert_eq!(buf.cell_val_num(), CellValNum::Fixed(3));
    assert_eq!(buf.len(), 6);
}

#[test]
fn test_vector_and_string_are_variable() {
    let v = encode(&vec![1i64, 2, 3, 4]);
    assert_eq!(v.cell_val_num(), CellValNum::Var);
    assert_eq!(v.element_count(), 4);

    let s = encode("hello");
    assert_eq!(s.datatype(), Datatype::Char);
    assert_eq!(s.cell_val_num(), CellValNum::Var);
    assert_eq!(s.len(), 5);
}

#[test]
fn test_bytes_are_little_endian() {
    let buf = encode(&0x0102_0304u32);
    assert_eq!(&buf.bytes()[..], &[0x04, 0x03, 0x02, 0x01]);
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_round_trip_each_shape() {
    assert_eq!(decode::<i8>(&encode(&-5i8)).unwrap(), -5);
    assert_eq!(decode::<u64>(&encode(&u64::MAX)).unwrap(), u64::MAX);
    assert_eq!(decode::<f32>(&encode(&0.25f32)).unwrap(), 0.25);
    assert_eq!(decode::<[i32; 2]>(&encode(&[7i32, -7])).unwrap(), [7, -7]);
    assert_eq!(
        decode::<Vec<u8>>(&encode(&vec![9u8, 8, 7])).unwrap(),
        vec![9, 8, 7]
    );
    assert_eq!(decode::<String>(&encode("naïve")).unwrap(), "naïve");
}

#[test]
fn test_empty_vector_round_trip() {
    let buf = encode(&Vec::<i32>::new());
    assert!(buf.is_empty());
    assert_eq!(decode::<Vec<i32>>(&buf).unwrap(), Vec::<i32>::new());
}

// =============================================================================
// Mismatch Tests
// =============================================================================

#[test]
fn test_same_width_other_tag_is_type_mismatch() {
    // i32 and f32 share a width; the bytes must not be reinterpreted
    let err = decode::<f32>(&encode(&1i32)).unwrap_err();
    assert!(matches!(
        err,
        MapError::TypeMismatch {
            expected: Datatype::Float32,
            actual: Datatype::Int32
        }
    ));

    assert!(matches!(
        decode::<u32>(&encode(&1i32)),
        Err(MapError::TypeMismatch { .. })
    ));
    assert!(matches!(
        decode::<String>(&encode(&vec![104u8, 105])),
        Err(MapError::TypeMismatch { .. })
    ));
}

#[test]
fn test_fixed_count_is_size_mismatch() {
    let three = encode(&[1i32, 2, 3]);
    assert!(matches!(
        decode::<[i32; 2]>(&three),
        Err(MapError::SizeMismatch { .. })
    ));
    assert!(matches!(
        decode::<i32>(&three),
        Err(MapError::SizeMismatch { .. })
    ));
    // Variable length takes any whole number of elements
    assert_eq!(decode::<Vec<i32>>(&three).unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_partial_element_is_size_mismatch() {
    let ragged = TypedBuffer::new(Datatype::Int32, CellValNum::Var, vec![1u8, 2, 3, 4, 5]);
    assert!(matches!(
        decode::<Vec<i32>>(&ragged),
        Err(MapError::SizeMismatch { .. })
    ));
}

#[test]
fn test_invalid_utf8_is_rejected() {
    let buf = TypedBuffer::new(Datatype::Char, CellValNum::Var, vec![0xffu8, 0xfe]);
    assert!(decode::<String>(&buf).is_err());
}

// =============================================================================
// Dynamic Value Tests
// =============================================================================

#[test]
fn test_value_from_buffer_and_display() {
    assert_eq!(
        Value::from_buffer(&encode(&42u32)).unwrap().to_string(),
        "42"
    );
    assert_eq!(
        Value::from_buffer(&encode(&[1.5f64, 2.0])).unwrap(),
        Value::Float64(vec![1.5, 2.0])
    );
    assert_eq!(
        Value::from_buffer(&encode("x")).unwrap().to_string(),
        "\"x\""
    );
}

#[test]
fn test_value_parse_by_schema_type() {
    let value = Value::parse(Datatype::Int16, "1,2,3").unwrap();
    let buf = value.to_buffer(CellValNum::Var).unwrap();
    assert_eq!(buf.decode::<Vec<i16>>().unwrap(), vec![1, 2, 3]);

    let text = Value::parse(Datatype::Char, "a,b").unwrap();
    assert_eq!(text, Value::Char("a,b".to_string()));
}

#[test]
fn test_datatype_names_parse() {
    for datatype in Datatype::ALL {
        assert_eq!(datatype.name().parse::<Datatype>().unwrap(), datatype);
    }
    assert_eq!("string".parse::<Datatype>().unwrap(), Datatype::Char);
    assert!("decimal".parse::<Datatype>().is_err());
}
