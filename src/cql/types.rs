use crate::error::{CqlError, Result};
use crate::serde::reader::{bytes, int, short, string};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::IpAddr;
use uuid::Uuid;

const CUSTOM_TYPE_ID: u16 = 0x0000;
const ASCII_TYPE_ID: u16 = 0x0001;
const BIGINT_TYPE_ID: u16 = 0x0002;
const BLOB_TYPE_ID: u16 = 0x0003;
const BOOLEAN_TYPE_ID: u16 = 0x0004;
const COUNTER_TYPE_ID: u16 = 0x0005;
const DECIMAL_TYPE_ID: u16 = 0x0006;
const DOUBLE_TYPE_ID: u16 = 0x0007;
const FLOAT_TYPE_ID: u16 = 0x0008;
const INT_TYPE_ID: u16 = 0x0009;
const TEXT_TYPE_ID: u16 = 0x000A;
const TIMESTAMP_TYPE_ID: u16 = 0x000B;
const UUID_TYPE_ID: u16 = 0x000C;
const VARCHAR_TYPE_ID: u16 = 0x000D;
const VARINT_TYPE_ID: u16 = 0x000E;
const TIMEUUID_TYPE_ID: u16 = 0x000F;
const INET_TYPE_ID: u16 = 0x0010;
const LIST_TYPE_ID: u16 = 0x0020;
const MAP_TYPE_ID: u16 = 0x0021;
const SET_TYPE_ID: u16 = 0x0022;

/// Column types as declared in result/prepared metadata. Collections carry
/// their element types; CUSTOM carries the server's type-name string.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    Custom(String),
    Ascii,
    Bigint,
    Blob,
    Boolean,
    Counter,
    Decimal,
    Double,
    Float,
    Int,
    Text,
    Timestamp,
    Uuid,
    Varchar,
    Varint,
    Timeuuid,
    Inet,
    List(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Set(Box<ColumnType>),
}

impl ColumnType {
    /// Parses a type option from metadata, recursing into collection
    /// subtypes. A CUSTOM subtype consumes its type-name string here, never
    /// during value decode.
    pub(crate) fn parse(src: &mut Bytes) -> Result<ColumnType> {
        let code = short!(src);

        Ok(match code {
            CUSTOM_TYPE_ID => ColumnType::Custom(string!(src)),
            ASCII_TYPE_ID => ColumnType::Ascii,
            BIGINT_TYPE_ID => ColumnType::Bigint,
            BLOB_TYPE_ID => ColumnType::Blob,
            BOOLEAN_TYPE_ID => ColumnType::Boolean,
            COUNTER_TYPE_ID => ColumnType::Counter,
            DECIMAL_TYPE_ID => ColumnType::Decimal,
            DOUBLE_TYPE_ID => ColumnType::Double,
            FLOAT_TYPE_ID => ColumnType::Float,
            INT_TYPE_ID => ColumnType::Int,
            TEXT_TYPE_ID => ColumnType::Text,
            TIMESTAMP_TYPE_ID => ColumnType::Timestamp,
            UUID_TYPE_ID => ColumnType::Uuid,
            VARCHAR_TYPE_ID => ColumnType::Varchar,
            VARINT_TYPE_ID => ColumnType::Varint,
            TIMEUUID_TYPE_ID => ColumnType::Timeuuid,
            INET_TYPE_ID => ColumnType::Inet,
            LIST_TYPE_ID => ColumnType::List(Box::new(ColumnType::parse(src)?)),
            MAP_TYPE_ID => {
                let key = ColumnType::parse(src)?;
                let value = ColumnType::parse(src)?;
                ColumnType::Map(Box::new(key), Box::new(value))
            }
            SET_TYPE_ID => ColumnType::Set(Box::new(ColumnType::parse(src)?)),
            other => {
                return Err(CqlError::Protocol(format!(
                    "unknown column type 0x{other:04X}"
                )))
            }
        })
    }
}

/// A typed CQL value. `Null` stands for the protocol's -1-length sentinel
/// regardless of the declared column type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
    Bigint(i64),
    Int(i32),
    Float(f32),
    Double(f64),
    Decimal(f64),
    Uuid(Uuid),
    Varint(i128),
    Inet(IpAddr),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

fn mismatch(value: &Value, ty: &ColumnType) -> CqlError {
    CqlError::Usage(format!("cannot encode {value:?} as {ty:?}"))
}

/// Packs a value to its wire form for the given column type.
pub fn pack_value(value: &Value, ty: &ColumnType) -> Result<Bytes> {
    match ty {
        ColumnType::Custom(_) | ColumnType::Blob => pack_blob(value, ty),
        ColumnType::Ascii | ColumnType::Text | ColumnType::Varchar => match value {
            Value::Text(s) => Ok(Bytes::copy_from_slice(s.as_bytes())),
            other => Err(mismatch(other, ty)),
        },
        ColumnType::Bigint | ColumnType::Counter | ColumnType::Timestamp => match value {
            Value::Bigint(v) => Ok(Bytes::copy_from_slice(&v.to_be_bytes())),
            other => Err(mismatch(other, ty)),
        },
        ColumnType::Boolean => match value {
            Value::Boolean(b) => Ok(Bytes::copy_from_slice(&[*b as u8])),
            other => Err(mismatch(other, ty)),
        },
        ColumnType::Decimal => match value {
            Value::Decimal(d) => pack_decimal(*d),
            other => Err(mismatch(other, ty)),
        },
        ColumnType::Double => match value {
            // The wire is big-endian; every byte of the native
            // little-endian image is reversed, never reinterpreted.
            Value::Double(d) => {
                let mut raw = d.to_le_bytes();
                raw.reverse();
                Ok(Bytes::copy_from_slice(&raw))
            }
            other => Err(mismatch(other, ty)),
        },
        ColumnType::Float => match value {
            Value::Float(f) => {
                let mut raw = f.to_le_bytes();
                raw.reverse();
                Ok(Bytes::copy_from_slice(&raw))
            }
            other => Err(mismatch(other, ty)),
        },
        ColumnType::Int => match value {
            Value::Int(v) => Ok(Bytes::copy_from_slice(&v.to_be_bytes())),
            other => Err(mismatch(other, ty)),
        },
        ColumnType::Uuid | ColumnType::Timeuuid => match value {
            Value::Uuid(u) => Ok(Bytes::copy_from_slice(u.as_bytes())),
            Value::Text(s) => {
                let uuid = Uuid::parse_str(s)
                    .map_err(|_| CqlError::Usage(format!("invalid uuid text {s:?}")))?;
                Ok(Bytes::copy_from_slice(uuid.as_bytes()))
            }
            other => Err(mismatch(other, ty)),
        },
        ColumnType::Varint => match value {
            Value::Varint(v) => Ok(pack_varint(*v)),
            other => Err(mismatch(other, ty)),
        },
        ColumnType::Inet => match value {
            Value::Inet(ip) => Ok(pack_inet(*ip)),
            Value::Text(s) => {
                let ip: IpAddr = s
                    .parse()
                    .map_err(|_| CqlError::Usage(format!("invalid inet text {s:?}")))?;
                Ok(pack_inet(ip))
            }
            other => Err(mismatch(other, ty)),
        },
        ColumnType::List(elem) | ColumnType::Set(elem) => {
            let items = match value {
                Value::List(items) | Value::Set(items) => items,
                other => return Err(mismatch(other, ty)),
            };
            let mut dst = BytesMut::new();
            dst.put_i32(items.len() as i32);
            for item in items {
                pack_value_with_length(&mut dst, item, elem)?;
            }
            Ok(dst.freeze())
        }
        ColumnType::Map(key_ty, value_ty) => {
            let pairs = match value {
                Value::Map(pairs) => pairs,
                other => return Err(mismatch(other, ty)),
            };
            let mut dst = BytesMut::new();
            dst.put_i32(pairs.len() as i32);
            for (key, item) in pairs {
                pack_value_with_length(&mut dst, key, key_ty)?;
                pack_value_with_length(&mut dst, item, value_ty)?;
            }
            Ok(dst.freeze())
        }
    }
}

/// Packs a value as a `[bytes]` field: -1 length for null, otherwise the
/// length-prefixed wire form.
pub(crate) fn pack_value_with_length(
    dst: &mut BytesMut,
    value: &Value,
    ty: &ColumnType,
) -> Result<()> {
    match value {
        Value::Null => dst.put_i32(-1),
        other => {
            let packed = pack_value(other, ty)?;
            dst.put_u32(packed.len() as u32);
            dst.extend_from_slice(&packed);
        }
    }
    Ok(())
}

/// Unpacks a `[bytes]` payload into a typed value. `None` (the -1-length
/// sentinel) is null for every type.
pub fn unpack_value(content: Option<Bytes>, ty: &ColumnType, raw_blobs: bool) -> Result<Value> {
    let content = match content {
        Some(content) => content,
        None => return Ok(Value::Null),
    };

    match ty {
        ColumnType::Custom(_) | ColumnType::Blob => Ok(unpack_blob(&content, raw_blobs)),
        ColumnType::Ascii | ColumnType::Text | ColumnType::Varchar => {
            Ok(Value::Text(String::from_utf8_lossy(&content).to_string()))
        }
        ColumnType::Bigint | ColumnType::Counter | ColumnType::Timestamp => {
            let raw: [u8; 8] = content
                .as_ref()
                .try_into()
                .map_err(|_| CqlError::protocol("bigint is not 8 bytes"))?;
            Ok(Value::Bigint(i64::from_be_bytes(raw)))
        }
        ColumnType::Boolean => Ok(match content.first() {
            Some(1) => Value::Boolean(true),
            Some(0) => Value::Boolean(false),
            // Absent or out-of-range bytes decode as null, not as an error.
            _ => Value::Null,
        }),
        ColumnType::Decimal => Ok(Value::Decimal(unpack_decimal(&content)?)),
        ColumnType::Double => {
            let mut raw: [u8; 8] = content
                .as_ref()
                .try_into()
                .map_err(|_| CqlError::protocol("double is not 8 bytes"))?;
            raw.reverse();
            Ok(Value::Double(f64::from_le_bytes(raw)))
        }
        ColumnType::Float => {
            let mut raw: [u8; 4] = content
                .as_ref()
                .try_into()
                .map_err(|_| CqlError::protocol("float is not 4 bytes"))?;
            raw.reverse();
            Ok(Value::Float(f32::from_le_bytes(raw)))
        }
        ColumnType::Int => {
            let raw: [u8; 4] = content
                .as_ref()
                .try_into()
                .map_err(|_| CqlError::protocol("int is not 4 bytes"))?;
            Ok(Value::Int(i32::from_be_bytes(raw)))
        }
        ColumnType::Uuid | ColumnType::Timeuuid => {
            if content.is_empty() {
                return Ok(Value::Null);
            }
            let uuid = Uuid::from_slice(&content)
                .map_err(|_| CqlError::protocol("uuid is not 16 bytes"))?;
            Ok(Value::Uuid(uuid))
        }
        ColumnType::Varint => Ok(Value::Varint(unpack_varint(&content)?)),
        ColumnType::Inet => match content.len() {
            4 => {
                let raw: [u8; 4] = content.as_ref().try_into().unwrap();
                Ok(Value::Inet(IpAddr::from(raw)))
            }
            16 => {
                let raw: [u8; 16] = content.as_ref().try_into().unwrap();
                Ok(Value::Inet(IpAddr::from(raw)))
            }
            n => Err(CqlError::Protocol(format!("inet of {n} bytes"))),
        },
        ColumnType::List(elem) | ColumnType::Set(elem) => {
            let mut src = content;
            let count = int!(src);
            let mut items = Vec::new();
            for _ in 0..count {
                let item = bytes!(src);
                items.push(unpack_value(item, elem, raw_blobs)?);
            }
            Ok(match ty {
                ColumnType::Set(_) => Value::Set(items),
                _ => Value::List(items),
            })
        }
        ColumnType::Map(key_ty, value_ty) => {
            let mut src = content;
            let count = int!(src);
            let mut pairs: Vec<(Value, Value)> = Vec::new();
            for _ in 0..count {
                let key_raw = bytes!(src);
                let value_raw = bytes!(src);
                let key = unpack_value(key_raw, key_ty, raw_blobs)?;
                let value = unpack_value(value_raw, value_ty, raw_blobs)?;
                // Last write wins if the server ever sent duplicate keys.
                match pairs.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = value,
                    None => pairs.push((key, value)),
                }
            }
            Ok(Value::Map(pairs))
        }
    }
}

fn pack_blob(value: &Value, ty: &ColumnType) -> Result<Bytes> {
    match value {
        Value::Blob(raw) => Ok(Bytes::copy_from_slice(raw)),
        Value::Text(s) => match s.strip_prefix("0x") {
            Some(hex) => Ok(Bytes::from(hex_decode(hex)?)),
            None => Ok(Bytes::copy_from_slice(s.as_bytes())),
        },
        other => Err(mismatch(other, ty)),
    }
}

fn unpack_blob(content: &Bytes, raw_blobs: bool) -> Value {
    if raw_blobs {
        return Value::Blob(content.to_vec());
    }
    if content.is_empty() {
        return Value::Text(String::new());
    }
    Value::Text(format!("0x{}", hex_encode(content)))
}

fn pack_inet(ip: IpAddr) -> Bytes {
    match ip {
        IpAddr::V4(v4) => Bytes::copy_from_slice(&v4.octets()),
        IpAddr::V6(v6) => Bytes::copy_from_slice(&v6.octets()),
    }
}

/// Minimal-length signed big-endian two's complement, the wire form shared
/// by VARINT values and DECIMAL's unscaled part.
pub(crate) fn pack_varint(value: i128) -> Bytes {
    let raw = value.to_be_bytes();
    let mut start = 0;
    while start < raw.len() - 1 {
        let redundant = (raw[start] == 0x00 && raw[start + 1] & 0x80 == 0)
            || (raw[start] == 0xFF && raw[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    Bytes::copy_from_slice(&raw[start..])
}

/// Folds big-endian two's complement bytes most-significant first. Values
/// wider than 128 bits fail loudly instead of silently wrapping.
pub(crate) fn unpack_varint(content: &[u8]) -> Result<i128> {
    if content.is_empty() {
        return Ok(0);
    }
    if content.len() > 16 {
        return Err(CqlError::Protocol(format!(
            "varint of {} bytes exceeds 128 bits",
            content.len()
        )));
    }

    let negative = content[0] & 0x80 != 0;
    let mut value: i128 = 0;
    for &byte in content {
        let byte = if negative { byte ^ 0xFF } else { byte };
        value = value * 256 + byte as i128;
    }

    if negative {
        // Not -(value + 1): the fold yields i128::MAX for the 16-byte
        // i128::MIN image and the increment would overflow.
        value = -value - 1;
    }
    Ok(value)
}

/// DECIMAL wire form is `{scale: i32}{unscaled: varint}` representing
/// `unscaled * 10^-scale`. The scale is reconstructed from the plain numeric
/// value by trial division; the fractional path wins whenever the value has
/// any fractional component. Known to lose precision for scales the
/// heuristic cannot represent exactly.
fn pack_decimal(value: f64) -> Result<Bytes> {
    if !value.is_finite() {
        return Err(CqlError::Usage(format!("cannot encode {value} as decimal")));
    }

    let mut abs = value.abs();
    let mut positive_scale = 0i32;
    while abs.floor() != 0.0 && abs % 10.0 == 0.0 {
        abs /= 10.0;
        positive_scale += 1;
    }

    let mut shifted = value;
    let mut negative_scale = 0i32;
    while shifted.fract() != 0.0 {
        shifted *= 10.0;
        negative_scale += 1;
    }

    let scale = if negative_scale != 0 {
        negative_scale
    } else {
        -positive_scale
    };
    let unscaled = (value * 10f64.powi(scale)).round() as i128;

    let mut dst = BytesMut::new();
    dst.put_i32(scale);
    dst.extend_from_slice(&pack_varint(unscaled));
    Ok(dst.freeze())
}

fn unpack_decimal(content: &Bytes) -> Result<f64> {
    if content.len() < 5 {
        return Ok(0.0);
    }
    let mut src = content.clone();
    let scale = int!(src);
    let unscaled = unpack_varint(&src)?;
    // The exponent is computed in f64: a server-supplied scale of i32::MIN
    // cannot be negated as an integer, and extreme scales saturate to
    // 0/infinity instead of overflowing.
    Ok(unscaled as f64 * 10f64.powf(-(scale as f64)))
}

fn hex_encode(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len() * 2);
    for byte in raw {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn hex_decode(hex: &str) -> Result<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return Err(CqlError::usage("odd-length hex blob"));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| CqlError::usage("invalid hex blob"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: Value, ty: ColumnType) -> Value {
        let packed = pack_value(&value, &ty).unwrap();
        unpack_value(Some(packed), &ty, true).unwrap()
    }

    #[test]
    fn integer_round_trips_cover_boundaries() {
        for v in [0i32, -1, 1, i32::MIN, i32::MAX] {
            assert_eq!(round_trip(Value::Int(v), ColumnType::Int), Value::Int(v));
        }
        for v in [0i64, -1, i64::MIN, i64::MAX] {
            assert_eq!(
                round_trip(Value::Bigint(v), ColumnType::Bigint),
                Value::Bigint(v)
            );
            assert_eq!(
                round_trip(Value::Bigint(v), ColumnType::Timestamp),
                Value::Bigint(v)
            );
        }
    }

    #[test]
    fn text_passes_through_unchanged() {
        for s in ["", "hello", "ünïcode"] {
            assert_eq!(
                round_trip(Value::Text(s.to_string()), ColumnType::Varchar),
                Value::Text(s.to_string())
            );
        }
    }

    #[test]
    fn boolean_encoding() {
        assert_eq!(
            round_trip(Value::Boolean(true), ColumnType::Boolean),
            Value::Boolean(true)
        );
        assert_eq!(
            round_trip(Value::Boolean(false), ColumnType::Boolean),
            Value::Boolean(false)
        );
        // Out-of-range wire bytes are null, not an error.
        assert_eq!(
            unpack_value(Some(Bytes::from_static(&[7])), &ColumnType::Boolean, true).unwrap(),
            Value::Null
        );
        assert_eq!(
            unpack_value(Some(Bytes::new()), &ColumnType::Boolean, true).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn floats_are_byte_reversed_on_the_wire() {
        let packed = pack_value(&Value::Float(1.5), &ColumnType::Float).unwrap();
        assert_eq!(&packed[..], &1.5f32.to_be_bytes());
        // A native little-endian reinterpretation must NOT read back 1.5.
        assert_ne!(f32::from_le_bytes(packed.as_ref().try_into().unwrap()), 1.5);
        assert_eq!(
            unpack_value(Some(packed), &ColumnType::Float, true).unwrap(),
            Value::Float(1.5)
        );

        let packed = pack_value(&Value::Double(1.5), &ColumnType::Double).unwrap();
        assert_eq!(&packed[..], &1.5f64.to_be_bytes());
        assert_eq!(
            unpack_value(Some(packed), &ColumnType::Double, true).unwrap(),
            Value::Double(1.5)
        );
    }

    #[test]
    fn varint_handles_values_beyond_64_bits() {
        for v in [
            0i128,
            -1,
            127,
            128,
            -128,
            -129,
            i64::MAX as i128,
            i64::MIN as i128,
            i64::MAX as i128 * 1000,
            i64::MIN as i128 * 1000,
            i128::MAX,
            i128::MIN,
        ] {
            let packed = pack_varint(v);
            assert_eq!(unpack_varint(&packed).unwrap(), v, "value {v}");
        }
    }

    #[test]
    fn varint_encoding_is_minimal() {
        assert_eq!(&pack_varint(0)[..], &[0x00]);
        assert_eq!(&pack_varint(-1)[..], &[0xFF]);
        assert_eq!(&pack_varint(127)[..], &[0x7F]);
        assert_eq!(&pack_varint(128)[..], &[0x00, 0x80]);
        assert_eq!(&pack_varint(-128)[..], &[0x80]);
    }

    #[test]
    fn varint_decodes_the_full_16_byte_range() {
        let mut min = vec![0x80u8];
        min.extend_from_slice(&[0x00; 15]);
        assert_eq!(unpack_varint(&min).unwrap(), i128::MIN);

        let mut max = vec![0x7Fu8];
        max.extend_from_slice(&[0xFF; 15]);
        assert_eq!(unpack_varint(&max).unwrap(), i128::MAX);
    }

    #[test]
    fn oversized_varint_is_a_protocol_error() {
        assert!(unpack_varint(&[0x01; 17]).is_err());
    }

    #[test]
    fn decimal_round_trips_within_tolerance() {
        for v in [12.34f64, -12.34, 0.0, 3.0, 1200.0, 0.001] {
            let got = match round_trip(Value::Decimal(v), ColumnType::Decimal) {
                Value::Decimal(d) => d,
                other => panic!("expected decimal, got {other:?}"),
            };
            assert!((got - v).abs() < 1e-9, "expected {v}, got {got}");
        }
    }

    #[test]
    fn decimal_trailing_zeroes_use_a_negative_scale() {
        let packed = pack_value(&Value::Decimal(1200.0), &ColumnType::Decimal).unwrap();
        // scale -2, unscaled 12
        assert_eq!(&packed[..], &[0xFF, 0xFF, 0xFF, 0xFE, 0x0C]);
    }

    #[test]
    fn decimal_extreme_scale_is_a_value_not_a_panic() {
        // scale = i32::MIN, unscaled = 1: saturates rather than overflowing.
        let body = Bytes::from_static(&[0x80, 0x00, 0x00, 0x00, 0x01]);
        match unpack_value(Some(body), &ColumnType::Decimal, true).unwrap() {
            Value::Decimal(d) => assert!(d.is_infinite() && d > 0.0),
            other => panic!("expected decimal, got {other:?}"),
        }
    }

    #[test]
    fn short_decimal_unpacks_as_zero() {
        assert_eq!(
            unpack_value(
                Some(Bytes::from_static(&[0x00, 0x00])),
                &ColumnType::Decimal,
                true
            )
            .unwrap(),
            Value::Decimal(0.0)
        );
    }

    #[test]
    fn uuid_round_trip() {
        let uuid = Uuid::new_v4();
        assert_eq!(
            round_trip(Value::Uuid(uuid), ColumnType::Uuid),
            Value::Uuid(uuid)
        );
        // The canonical hyphenated text form packs to the same 16 bytes.
        let from_text = pack_value(&Value::Text(uuid.to_string()), &ColumnType::Timeuuid).unwrap();
        assert_eq!(&from_text[..], uuid.as_bytes());
    }

    #[test]
    fn inet_round_trip() {
        for ip in ["192.168.1.1", "::1", "2001:db8::8a2e:370:7334"] {
            let ip: IpAddr = ip.parse().unwrap();
            assert_eq!(round_trip(Value::Inet(ip), ColumnType::Inet), Value::Inet(ip));
        }
    }

    #[test]
    fn blobs_use_the_hex_text_convention() {
        let packed = pack_value(
            &Value::Text("0xdeadbeef".to_string()),
            &ColumnType::Blob,
        )
        .unwrap();
        assert_eq!(&packed[..], &[0xDE, 0xAD, 0xBE, 0xEF]);

        assert_eq!(
            unpack_value(Some(packed.clone()), &ColumnType::Blob, false).unwrap(),
            Value::Text("0xdeadbeef".to_string())
        );
        assert_eq!(
            unpack_value(Some(packed), &ColumnType::Blob, true).unwrap(),
            Value::Blob(vec![0xDE, 0xAD, 0xBE, 0xEF])
        );
    }

    #[test]
    fn null_sentinel_decodes_to_null_for_every_type() {
        for ty in [
            ColumnType::Int,
            ColumnType::Bigint,
            ColumnType::Varchar,
            ColumnType::Blob,
            ColumnType::Boolean,
            ColumnType::Uuid,
            ColumnType::List(Box::new(ColumnType::Int)),
            ColumnType::Map(Box::new(ColumnType::Text), Box::new(ColumnType::Int)),
        ] {
            assert_eq!(unpack_value(None, &ty, false).unwrap(), Value::Null);
        }
    }

    #[test]
    fn lists_preserve_order_and_length() {
        let ty = ColumnType::List(Box::new(ColumnType::Int));
        let items: Vec<Value> = (0..5).map(Value::Int).collect();
        assert_eq!(
            round_trip(Value::List(items.clone()), ty.clone()),
            Value::List(items.clone())
        );
        // Sets are not deduplicated or reordered at this layer.
        let dupes = vec![Value::Int(2), Value::Int(2), Value::Int(1)];
        assert_eq!(
            round_trip(Value::Set(dupes.clone()), ColumnType::Set(Box::new(ColumnType::Int))),
            Value::Set(dupes)
        );
    }

    #[test]
    fn maps_keep_associations() {
        let ty = ColumnType::Map(Box::new(ColumnType::Text), Box::new(ColumnType::Int));
        let pairs = vec![
            (Value::Text("a".into()), Value::Int(1)),
            (Value::Text("b".into()), Value::Int(2)),
        ];
        let unpacked = round_trip(Value::Map(pairs.clone()), ty.clone());
        let unpacked = match unpacked {
            Value::Map(pairs) => pairs,
            other => panic!("expected map, got {other:?}"),
        };
        for (key, value) in pairs {
            let found = unpacked.iter().find(|(k, _)| *k == key).unwrap();
            assert_eq!(found.1, value);
        }
    }

    #[test]
    fn nested_collections_recurse() {
        let ty = ColumnType::List(Box::new(ColumnType::List(Box::new(ColumnType::Int))));
        let value = Value::List(vec![
            Value::List(vec![Value::Int(1), Value::Int(2)]),
            Value::List(vec![]),
            Value::Null,
        ]);
        assert_eq!(round_trip(value.clone(), ty), value);
    }

    #[test]
    fn type_mismatch_is_a_usage_error() {
        assert!(matches!(
            pack_value(&Value::Text("nope".into()), &ColumnType::Int),
            Err(CqlError::Usage(_))
        ));
    }

    #[test]
    fn unknown_type_code_is_a_protocol_error() {
        let mut src = Bytes::from_static(&[0x00, 0x99]);
        assert!(matches!(
            ColumnType::parse(&mut src),
            Err(CqlError::Protocol(_))
        ));
    }
}
