//! Writers for the protocol's length-prefixed notations. Fixed-width values
//! go straight through `bytes::BufMut`. Callers must have `BufMut` in scope.

macro_rules! put_string {
    ($dst:expr, $value:expr) => {{
        let value = $value;
        $dst.put_u16(value.len() as u16);
        $dst.extend_from_slice(value.as_ref());
    }};
}

macro_rules! put_long_string {
    ($dst:expr, $value:expr) => {{
        let value = $value;
        $dst.put_u32(value.len() as u32);
        $dst.extend_from_slice(value.as_ref());
    }};
}

macro_rules! put_string_map {
    ($dst:expr, $value:expr) => {{
        let map = $value;
        $dst.put_u16(map.len() as u16);
        for (key, value) in map {
            put_string!($dst, key);
            put_string!($dst, value);
        }
    }};
}

pub(crate) use put_long_string;
pub(crate) use put_string;
pub(crate) use put_string_map;
