//! Raw header line handling.

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::Error;

/// Split a raw `Key: Value` header line.
///
/// Returns `None` for the blank line terminating a header block and for lines
/// without a colon (such as the status line). The key is returned as-is; the
/// value is trimmed of spaces and tabs, then of CR/LF.
pub fn parse_header_line(raw: &[u8]) -> Option<(String, String)> {
    if raw == b"\r\n" || raw == b"\n" {
        return None;
    }

    let line = String::from_utf8_lossy(raw);
    let (key, value) = line.split_once(':')?;

    let value = value
        .trim_matches(|c| c == ' ' || c == '\t')
        .trim_matches(|c| c == '\r' || c == '\n');

    Some((key.to_string(), value.to_string()))
}

/// Convert pending request header lines into a header map.
///
/// Every line is appended, so repeated names are all sent.
pub fn header_map(lines: &[String]) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();

    for line in lines {
        let Some((name, value)) = parse_header_line(line.as_bytes()) else {
            log::warn!("Ignoring header line without a colon: {:?}", line);
            continue;
        };

        let header_name = HeaderName::from_bytes(name.trim().as_bytes())?;
        let header_value = HeaderValue::from_str(&value)?;
        headers.append(header_name, header_value);
    }

    Ok(headers)
}
