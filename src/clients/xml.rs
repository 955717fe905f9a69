//! Declared-encoding handling for XML bodies.
//!
//! Besides UTF-8, a handful of common declarations are accepted:
//! `US-ASCII` is read as the UTF-8 subset it is, and `ISO-8859-1` /
//! `Windows-1252` are transcoded through the Windows-1252 code page (a
//! superset of Latin-1 for printable characters). Anything else is refused
//! rather than guessed at.

use std::borrow::Cow;

use crate::clients::errors::HttpError;

/// Returns the `encoding` named in a leading `<?xml ...?>` declaration.
pub(crate) fn declared_encoding(body: &[u8]) -> Option<&str> {
    let body = body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(body);
    if !body.starts_with(b"<?xml") {
        return None;
    }
    let end = body.windows(2).position(|w| w == b"?>")?;
    let declaration = std::str::from_utf8(&body[5..end]).ok()?;

    let (_, after) = declaration.split_once("encoding")?;
    let after = after.trim_start().strip_prefix('=')?.trim_start();
    let quote = after.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &after[1..];
    value.find(quote).map(|close| &value[..close])
}

/// Decodes an XML document to text according to its declared encoding.
pub(crate) fn decode_document(body: &[u8]) -> Result<Cow<'_, str>, HttpError> {
    let encoding = declared_encoding(body).map(str::to_ascii_lowercase);
    match encoding.as_deref() {
        None | Some("utf-8" | "utf8" | "us-ascii") => std::str::from_utf8(body)
            .map(Cow::Borrowed)
            .map_err(|source| HttpError::InvalidUtf8 { source }),
        Some("iso-8859-1" | "windows-1252") => {
            let (text, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(body);
            Ok(text)
        }
        Some(other) => Err(HttpError::UnsupportedCharset(other.to_string())),
    }
}
