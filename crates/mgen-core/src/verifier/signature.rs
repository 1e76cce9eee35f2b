//! ISO base media container signature (`ftyp` box at offset 4).

pub const SIGNATURE: &[u8; 4] = b"ftyp";
pub const SIGNATURE_OFFSET: usize = 4;

/// True if `header` holds `ftyp` at byte offset 4.
pub fn has_container_signature(header: &[u8]) -> bool {
    header.get(SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE.len()) == Some(&SIGNATURE[..])
}
