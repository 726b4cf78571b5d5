use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("reasoning output is empty")]
    Empty,

    #[error("no JSON value in reasoning output: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Pull a JSON value out of free-form reasoning output.
///
/// Models wrap payloads in code fences or preface them with prose, so:
/// strip a leading fence (all backticks removed, language-tag line
/// dropped), then parse from the earliest `[` or `{` onward. Every
/// reasoning-dependent caller goes through here.
pub fn extract_json(raw: &str) -> Result<Value, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut text = trimmed.to_string();
    if text.starts_with("```") {
        text = text.replace('`', "");
        if let Some(newline) = text.find('\n') {
            text = text[newline + 1..].to_string();
        }
    }

    let offset = match (text.find('['), text.find('{')) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => 0,
    };

    let value = serde_json::from_str(text[offset..].trim())?;
    Ok(value)
}
