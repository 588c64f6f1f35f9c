//! URL parameter encoding and query-string parsing.

use std::collections::{BTreeMap, VecDeque};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Every byte except ASCII alphanumerics and `-`, `_`, `.`, `~` is escaped.
const PARAM_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A single key/value pair appended to the request URL at execute time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParam {
    pub key: String,
    pub value: String,
}

impl UrlParam {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Percent-encode `value` as `%XX` with uppercase hex digits.
pub fn encode(value: &str) -> String {
    utf8_percent_encode(value, PARAM_ENCODE_SET).to_string()
}

/// Parse the query parameters of `url`.
///
/// Segments without `=` are dropped and later duplicates overwrite earlier
/// ones. Values are returned exactly as they appear in the URL; no
/// percent-decoding is applied.
pub fn parse_url_params(url: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();

    let Some((_, query)) = url.split_once('?') else {
        return params;
    };

    for segment in query.split('&') {
        if let Some((key, value)) = segment.split_once('=') {
            params.insert(key.to_string(), value.to_string());
        }
    }

    params
}

/// Build the final request URL, draining `params` in insertion order.
///
/// The first parameter is joined with `?` and the rest with `&`. The base URL
/// is used verbatim.
pub fn append_params(base: &str, params: &mut VecDeque<UrlParam>) -> String {
    let mut url = String::from(base);

    for (i, param) in params.drain(..).enumerate() {
        url.push(if i == 0 { '?' } else { '&' });
        url.push_str(&encode(&param.key));
        url.push('=');
        url.push_str(&encode(&param.value));
    }

    url
}
