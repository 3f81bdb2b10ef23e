//! Speech markup rendering for the voice gateway.
//!
//! The gateway consumes a small XML vocabulary: `Say` (speak text),
//! `Record` (capture the caller's next utterance and post it to an action
//! URL), and `Hangup`. All dynamic content is sanitized and XML-escaped
//! before it reaches a document.

use cadence_core::config::VoiceConfig;

const FALLBACK_SAY_TEXT: &str = "Sorry, something went wrong. Please try again later.";

#[derive(Clone, Debug)]
pub struct SayAttrs {
    pub language: String,
    pub voice: Option<String>,
}

impl From<&VoiceConfig> for SayAttrs {
    fn from(config: &VoiceConfig) -> Self {
        Self {
            language: config.caller_language.clone(),
            voice: config.tts_voice.clone().filter(|voice| !voice.trim().is_empty()),
        }
    }
}

impl SayAttrs {
    fn render(&self) -> String {
        let mut attrs = format!("language=\"{}\"", xml_escape(&self.language));
        if let Some(voice) = &self.voice {
            attrs.push_str(&format!(" voice=\"{}\"", xml_escape(voice)));
        }
        attrs
    }
}

/// Removes control characters, collapses whitespace, and XML-escapes the
/// text. Empty input falls back to a safe generic line so the gateway
/// never receives an empty `Say`.
pub fn sanitize_say_text(text: &str, fallback: Option<&str>) -> String {
    let cleaned: String = text
        .chars()
        .filter(|ch| *ch == '\n' || *ch == '\t' || !ch.is_control())
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        return xml_escape(fallback.unwrap_or(FALLBACK_SAY_TEXT));
    }
    xml_escape(&collapsed)
}

/// Speak `text`, then record the caller's reply and post it to
/// `action_url`.
pub fn prompt_markup(
    text: &str,
    attrs: &SayAttrs,
    action_url: &str,
    max_length_secs: u32,
    silence_timeout_secs: u32,
) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Response>\n\
         \x20   <Say {say_attrs}>{text}</Say>\n\
         \x20   <Record action=\"{action}\" method=\"POST\" maxLength=\"{max_length_secs}\" \
         timeout=\"{silence_timeout_secs}\" playBeep=\"false\"/>\n\
         </Response>",
        say_attrs = attrs.render(),
        text = sanitize_say_text(text, None),
        action = xml_escape(action_url),
    )
}

/// Speak `text` and end the call.
pub fn hangup_markup(text: &str, attrs: &SayAttrs) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Response>\n\
         \x20   <Say {say_attrs}>{text}</Say>\n\
         \x20   <Hangup/>\n\
         </Response>",
        say_attrs = attrs.render(),
        text = sanitize_say_text(text, None),
    )
}

pub fn error_markup(attrs: &SayAttrs) -> String {
    hangup_markup(FALLBACK_SAY_TEXT, attrs)
}

fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
