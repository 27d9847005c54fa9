/// Decoders `read_string`/the read map's `string` entry kind support.
/// The spec leaves "encoding" abstract; these two cover the two shapes a
/// memory-acquisition caller actually needs — narrow ASCII/UTF-8 strings
/// and the UTF-16LE "wide" strings used throughout Windows user-mode memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Utf8,
    Utf16Le,
}

/// Decodes `bytes`, truncating at the first NUL code unit, matching the
/// `read_string` contract. Bytes containing no NUL decode in full; bytes
/// starting with NUL decode to the empty string.
pub fn decode_truncated(bytes: &[u8], encoding: StringEncoding) -> String {
    match encoding {
        StringEncoding::Utf8 => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            String::from_utf8_lossy(&bytes[..end]).into_owned()
        }
        StringEncoding::Utf16Le => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
            char::decode_utf16(units[..end].iter().copied())
                .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_without_nul_decodes_in_full() {
        assert_eq!(decode_truncated(b"hello", StringEncoding::Utf8), "hello");
    }

    #[test]
    fn utf8_truncates_at_first_nul() {
        assert_eq!(decode_truncated(b"hi\0garbage", StringEncoding::Utf8), "hi");
    }

    #[test]
    fn utf8_leading_nul_is_empty_string() {
        assert_eq!(decode_truncated(b"\0rest", StringEncoding::Utf8), "");
    }

    #[test]
    fn utf16le_round_trips_and_truncates() {
        let mut bytes = Vec::new();
        for unit in "hey".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
        for unit in "!!!".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_truncated(&bytes, StringEncoding::Utf16Le), "hey");
    }
}
