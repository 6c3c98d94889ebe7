use serde::Deserialize;
use serde_json::Value;
use shared::ValidationVerdict;

const DEFAULT_REASON: &str = "Analyzed by AI";

/// Why a safe verdict was substituted for the judge's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackCause {
    NotConfigured,
    Transport,
    UpstreamStatus,
    EmptyOutput,
    Unparseable,
    MissingKeys,
}

impl FallbackCause {
    pub fn reason(&self) -> &'static str {
        match self {
            FallbackCause::NotConfigured => {
                "Retinal image validation is not configured. The image could not be verified."
            }
            FallbackCause::Transport => "Validation service unavailable or error occurred",
            FallbackCause::UpstreamStatus => {
                "Validation service returned an error. Please try again."
            }
            FallbackCause::EmptyOutput => "Model returned no readable output. Please try again.",
            FallbackCause::Unparseable => "Model output could not be parsed. Please try again.",
            FallbackCause::MissingKeys => "Missing keys; assumed non-retinal.",
        }
    }

    pub fn verdict(&self) -> ValidationVerdict {
        ValidationVerdict::fallback(self.reason())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVerdict {
    is_retinal: bool,
    confidence: f64,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    suggestions: Option<String>,
}

impl From<RawVerdict> for ValidationVerdict {
    fn from(raw: RawVerdict) -> Self {
        let reason = raw
            .reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REASON.to_string());
        ValidationVerdict::new(raw.is_retinal, raw.confidence, reason)
            .with_suggestions(raw.suggestions)
    }
}

#[derive(Debug, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

/// Known upstream response layouts, tried in declaration order.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UpstreamShape {
    Direct(RawVerdict),
    OutputText { output_text: String },
    Responses { output: Vec<OutputItem> },
    ChatCompletion { choices: Vec<Choice> },
    Generative { candidates: Vec<Candidate> },
}

enum Extracted {
    Verdict(RawVerdict),
    Text(String),
}

impl UpstreamShape {
    fn extract(self) -> Extracted {
        let text = match self {
            UpstreamShape::Direct(raw) => return Extracted::Verdict(raw),
            UpstreamShape::OutputText { output_text } => Some(output_text),
            UpstreamShape::Responses { output } => output
                .into_iter()
                .flat_map(|item| item.content)
                .filter_map(|part| part.text)
                .find(|text| !text.trim().is_empty()),
            UpstreamShape::ChatCompletion { choices } => choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content),
            UpstreamShape::Generative { candidates } => candidates
                .into_iter()
                .next()
                .and_then(|candidate| candidate.content.parts.into_iter().next())
                .and_then(|part| part.text),
        };
        Extracted::Text(text.unwrap_or_default())
    }
}

/// Turns an upstream body into a verdict. Never fails: anything that cannot be
/// understood becomes the fallback verdict for its cause.
pub fn interpret(body: &str) -> ValidationVerdict {
    match parse_verdict(body) {
        Ok(verdict) => verdict,
        Err(cause) => {
            log::warn!("Validator output rejected ({:?}), using fallback verdict", cause);
            cause.verdict()
        }
    }
}

fn parse_verdict(body: &str) -> Result<ValidationVerdict, FallbackCause> {
    let text = match serde_json::from_str::<UpstreamShape>(body) {
        Ok(shape) => match shape.extract() {
            Extracted::Verdict(raw) => return Ok(raw.into()),
            Extracted::Text(text) => text,
        },
        Err(_) => match serde_json::from_str::<String>(body) {
            Ok(text) => text,
            Err(_) => body.to_string(),
        },
    };
    verdict_from_text(&text)
}

fn verdict_from_text(text: &str) -> Result<ValidationVerdict, FallbackCause> {
    if text.trim().is_empty() {
        return Err(FallbackCause::EmptyOutput);
    }
    let span = first_balanced_object(text).ok_or(FallbackCause::Unparseable)?;
    let value: Value = serde_json::from_str(span).map_err(|_| FallbackCause::Unparseable)?;
    let object = value.as_object().ok_or(FallbackCause::Unparseable)?;
    if !object.contains_key("isRetinal") || !object.contains_key("confidence") {
        return Err(FallbackCause::MissingKeys);
    }
    let raw: RawVerdict = serde_json::from_value(value).map_err(|_| FallbackCause::Unparseable)?;
    Ok(raw.into())
}

/// First `{...}` span whose braces balance, ignoring braces inside JSON strings.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in text[start..].bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
