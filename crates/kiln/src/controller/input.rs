use crate::error::InputError;

/// Parse a comma-separated list of numbers, e.g. `"1, 2.5, -3"`.
///
/// Whitespace around each entry is ignored. An empty entry, anything that is
/// not a number, `NaN` and infinities are rejected with the 1-based position of the
/// offending entry.
pub fn parse_input(text: &str) -> Result<Vec<f32>, InputError> {
    if text.trim().is_empty() {
        return Err(InputError::Empty);
    }

    text.split(',')
        .enumerate()
        .map(|(idx, raw)| {
            let token = raw.trim();
            match token.parse::<f32>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(InputError::InvalidNumber {
                    position: idx + 1,
                    token: token.to_string(),
                }),
            }
        })
        .collect()
}
