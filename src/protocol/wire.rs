// Little-endian packing of the numeric types carried on the wire.
//
// Integers are two's complement, floats are IEEE-754 binary32 reinterpreted
// through their bit pattern, so results never depend on host byte order.

/// Pack a signed 16-bit value
pub fn pack_i16(value: i16) -> [u8; 2] {
    value.to_le_bytes()
}

/// Unpack a signed 16-bit value from the first two bytes
pub fn unpack_i16(bytes: [u8; 2]) -> i16 {
    i16::from_le_bytes(bytes)
}

/// Pack a signed 32-bit value
pub fn pack_i32(value: i32) -> [u8; 4] {
    value.to_le_bytes()
}

pub fn unpack_i32(bytes: [u8; 4]) -> i32 {
    i32::from_le_bytes(bytes)
}

/// Pack a float via its raw bits (NaN payloads survive)
pub fn pack_f32(value: f32) -> [u8; 4] {
    value.to_bits().to_le_bytes()
}

pub fn unpack_f32(bytes: [u8; 4]) -> f32 {
    f32::from_bits(u32::from_le_bytes(bytes))
}

pub fn pack_bool(value: bool) -> [u8; 1] {
    [value as u8]
}

/// Any non-zero byte reads as true
pub fn unpack_bool(bytes: [u8; 1]) -> bool {
    bytes[0] != 0
}

/// Copy `N` bytes starting at `offset`, or `None` if the buffer is too short
pub fn take<const N: usize>(data: &[u8], offset: usize) -> Option<[u8; N]> {
    data.get(offset..offset + N)?.try_into().ok()
}
