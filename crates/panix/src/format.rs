//! Slack markup helpers and title formatting.

use chrono::{DateTime, Utc};

/// RFC-1123 timestamp layout, always rendered in UTC.
const RFC1123_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Wraps `text` in Slack bold markup.
pub fn bold(text: &str) -> String {
    format!("*{text}*")
}

/// Wraps `text` in Slack inline code markup.
pub fn code_highlight(text: &str) -> String {
    format!("`{text}`")
}

/// Wraps `text` in a Slack code block.
pub fn code_snippet(text: &str) -> String {
    format!("```{text}```")
}

/// Formats `time` as `Mon, 02 Jan 2006 15:04:05 GMT`.
pub fn rfc1123(time: DateTime<Utc>) -> String {
    time.format(RFC1123_FORMAT).to_string()
}

/// Builds a message title stamped with the current time.
///
/// Without a request host the title is `*[env]* | `time``; with one, the
/// host is appended as a third segment.
pub fn build_title(environment: &str, request_host: Option<&str>) -> String {
    build_title_at(environment, Utc::now(), request_host)
}

pub(crate) fn build_title_at(
    environment: &str,
    at: DateTime<Utc>,
    request_host: Option<&str>,
) -> String {
    let env = bold(&format!("[{environment}]"));
    let time = code_highlight(&rfc1123(at));

    match request_host {
        Some(host) => format!("{env} | {time} | {}", code_highlight(host)),
        None => format!("{env} | {time}"),
    }
}
