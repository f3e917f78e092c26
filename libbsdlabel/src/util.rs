pub fn decode_label_name(bytes: &[u8]) -> String {
    // d_typename/d_packname are fixed width and not NUL terminated
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_padding_nuls() {
        let mut raw = [0u8; 16];
        raw[..4].copy_from_slice(b"SCSI");
        assert_eq!(decode_label_name(&raw), "SCSI");
    }

    #[test]
    fn full_width_name_survives() {
        let raw = [b'x'; 16];
        assert_eq!(decode_label_name(&raw), "x".repeat(16));
    }
}
