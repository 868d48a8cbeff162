//! TwiML reply envelope for the SMS webhook.

pub const TWIML_CONTENT_TYPE: &str = "application/xml";

/// Wrap `message` in a `<Response>` so Twilio sends it back to the sender.
/// `None` yields an empty response, which tells Twilio not to reply.
pub fn message_response(message: Option<&str>) -> String {
    match message {
        Some(body) => format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Response><Message>{}</Message></Response>"#,
            escape_xml(body)
        ),
        None => r#"<?xml version="1.0" encoding="UTF-8"?><Response/>"#.to_string(),
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
