//! Report title and context extraction for inbound HTTP requests.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{header::HOST, request::Parts},
};
use futures::{StreamExt, future, stream};

use crate::format::build_title;
use crate::notifier::ContextMap;
use crate::reporter::Reporter;
use crate::{Error, Result};

/// Largest request body prefix copied into a report.
pub const MAX_DUMP_BODY_BYTES: usize = 1024 * 1024;

/// Context key under which the request dump is attached.
pub const REQUEST_CONTEXT_KEY: &str = "Request";

/// Title and context for an operation guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub title: String,
    pub context: ContextMap,
}

impl Reporter {
    /// See [`extract_title_and_context`].
    pub async fn extract_title_and_context(
        &self,
        request: Request,
    ) -> (Result<RequestContext>, Request) {
        extract_title_and_context(self.environment(), request).await
    }
}

/// How reading the dumped prefix of a body ended.
enum Remainder {
    /// The whole body was read.
    Done,
    /// The prefix limit was hit; the rest is still in the stream.
    More,
    /// Reading failed.
    Failed(axum::Error),
}

/// Builds a request-specific title and a context holding the raw request dump.
///
/// At most [`MAX_DUMP_BODY_BYTES`] of the body are read for the dump. The
/// request is always handed back with its full body: the bytes read for the
/// dump are replayed ahead of whatever is left of the original stream. A body
/// that fails to read yields [`Error::RequestDump`], and the handed-back body
/// reports the same failure once the buffered prefix is consumed.
pub async fn extract_title_and_context(
    environment: &str,
    request: Request,
) -> (Result<RequestContext>, Request) {
    let (parts, body) = request.into_parts();
    let mut data = body.into_data_stream();

    let mut chunks: Vec<Bytes> = Vec::new();
    let mut buffered = 0;
    let remainder = loop {
        if buffered > MAX_DUMP_BODY_BYTES {
            break Remainder::More;
        }
        match data.next().await {
            Some(Ok(chunk)) => {
                buffered += chunk.len();
                chunks.push(chunk);
            }
            Some(Err(e)) => break Remainder::Failed(e),
            None => break Remainder::Done,
        }
    };

    let head = dump_prefix(&chunks);
    let replayed = stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));

    let (context, body) = match remainder {
        Remainder::Done => (
            Ok(request_context(environment, &parts, &head, false)),
            Body::from(head),
        ),
        Remainder::More => (
            Ok(request_context(environment, &parts, &head, true)),
            Body::from_stream(replayed.chain(data)),
        ),
        Remainder::Failed(e) => {
            let error = Error::request_dump(format!("failed to read request body: {}", e));
            (
                Err(error),
                Body::from_stream(replayed.chain(stream::once(future::ready(Err(e))))),
            )
        }
    };

    (context, Request::from_parts(parts, body))
}

fn request_context(
    environment: &str,
    parts: &Parts,
    body: &[u8],
    truncated: bool,
) -> RequestContext {
    let host = request_host(parts).unwrap_or_default();
    let title = build_title(environment, Some(&host));

    let mut context = ContextMap::new();
    context.insert(
        REQUEST_CONTEXT_KEY.to_string(),
        dump_request(parts, body, truncated),
    );

    RequestContext { title, context }
}

/// Concatenates buffered chunks, keeping at most [`MAX_DUMP_BODY_BYTES`].
fn dump_prefix(chunks: &[Bytes]) -> Vec<u8> {
    let total: usize = chunks.iter().map(Bytes::len).sum();
    let mut head = Vec::with_capacity(total.min(MAX_DUMP_BODY_BYTES));
    for chunk in chunks {
        let room = MAX_DUMP_BODY_BYTES - head.len();
        head.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if head.len() == MAX_DUMP_BODY_BYTES {
            break;
        }
    }
    head
}

/// `Host` header, falling back to the URI authority.
fn request_host(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|authority| authority.to_string()))
}

/// Renders the request in HTTP/1.x wire form: request line, `Host`, the
/// remaining headers, a blank line and the body.
fn dump_request(parts: &Parts, body: &[u8], truncated: bool) -> String {
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut dump = format!("{} {} {:?}\r\n", parts.method, target, parts.version);

    if let Some(host) = request_host(parts) {
        dump.push_str(&format!("Host: {host}\r\n"));
    }
    for (name, value) in parts.headers.iter().filter(|(name, _)| **name != HOST) {
        dump.push_str(&format!(
            "{}: {}\r\n",
            name,
            String::from_utf8_lossy(value.as_bytes())
        ));
    }
    dump.push_str("\r\n");
    dump.push_str(&String::from_utf8_lossy(body));
    if truncated {
        dump.push_str(&format!(
            "\r\n[body truncated, first {MAX_DUMP_BODY_BYTES} bytes shown]"
        ));
    }

    dump
}
