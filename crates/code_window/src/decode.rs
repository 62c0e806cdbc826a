use std::borrow::Cow;

/// Encoding a source file was decoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Windows1252,
    /// UTF-8 with invalid sequences replaced by U+FFFD
    Lossy,
}

/// Characters for bytes 0x80..=0x9F; `None` marks the bytes Windows-1252 leaves undefined
const WINDOWS_1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

fn decode_windows_1252(bytes: &[u8]) -> Option<String> {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => WINDOWS_1252_HIGH[usize::from(b - 0x80)],
            _ => Some(char::from(b)),
        })
        .collect()
}

/// Decode file contents as UTF-8, then Windows-1252, then UTF-8 with replacement characters
pub fn decode(bytes: &[u8]) -> (Cow<'_, str>, SourceEncoding) {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return (Cow::Borrowed(text), SourceEncoding::Utf8);
    }
    if let Some(text) = decode_windows_1252(bytes) {
        return (Cow::Owned(text), SourceEncoding::Windows1252);
    }
    (String::from_utf8_lossy(bytes), SourceEncoding::Lossy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_with_bom() {
        let (text, encoding) = decode(b"\xEF\xBB\xBFprint('h\xC3\xA9')\n");
        assert_eq!(text, "print('hé')\n");
        assert_eq!(encoding, SourceEncoding::Utf8);
    }

    #[test]
    fn windows_1252_fallback() {
        let (text, encoding) = decode(b"caf\xE9 \x80 \x93quoted\x94");
        assert_eq!(text, "café € “quoted”");
        assert_eq!(encoding, SourceEncoding::Windows1252);
    }

    #[test]
    fn undefined_bytes_decode_lossily() {
        let (text, encoding) = decode(b"bad \x81 byte \xE9");
        assert_eq!(encoding, SourceEncoding::Lossy);
        assert!(text.starts_with("bad "));
        assert!(text.contains('\u{FFFD}'));
    }
}
