// Output normalization
// Raw command output becomes one flat line before storage or predicate checks

use tracing::debug;

/// Collapse multi-line text into a single line.
///
/// Every line is trimmed and the lines are concatenated with no separator.
/// Whitespace inside a line is kept, so `Status: Up` survives intact.
/// Applying it twice gives the same result as applying it once.
pub fn normalize(text: &str) -> String {
    text.split(['\n', '\r']).map(str::trim).collect()
}

/// Decode raw process output and normalize it.
///
/// Invalid UTF-8 never fails the observation: offending bytes are replaced
/// and the fallback is logged.
pub fn normalize_bytes(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(text) => normalize(text),
        Err(e) => {
            debug!(error = %e, len = raw.len(), "Output is not valid UTF-8, decoding lossily");
            normalize(&String::from_utf8_lossy(raw))
        }
    }
}
