//! Query endpoint
//!
//! Serves the current readings to remote clients. The data path returns
//! `time=<count>&temperature=<int>.<digit>` built from a zero-timeout peek
//! of both channels; other paths come from a static page table. The
//! endpoint only ever peeks, so it never changes what the display sees.
//!
//! Transport is left to the caller: it hands in a request line and writes
//! out the [`Response`] head and body.

use core::fmt::Write;

use heapless::String;
use portable_atomic::{AtomicU32, Ordering};

use crate::channel::LatestValue;
use crate::format::{format_query, QUERY_LEN};

/// Longest response head (status line and headers)
pub const HEAD_LEN: usize = 128;

/// A static page served by path prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Path prefix this page answers
    pub path: &'static str,
    /// MIME type
    pub content_type: &'static str,
    /// Page body
    pub body: &'static str,
}

/// Landing page that polls the data path once a second
pub const INDEX_PAGE: Page = Page {
    path: "/index.html",
    content_type: "text/html",
    body: concat!(
        "<html><head><title>vigil</title></head><body>",
        "<p>Time: <span id=\"t\">-</span></p>",
        "<p>Temperature: <span id=\"c\">-</span></p>",
        "<script>setInterval(function(){var r=new XMLHttpRequest();",
        "r.onload=function(){var p=new URLSearchParams(r.responseText);",
        "document.getElementById('t').textContent=p.get('time');",
        "document.getElementById('c').textContent=p.get('temperature');};",
        "r.open('GET','/dataread');r.send();},1000);</script>",
        "</body></html>",
    ),
};

/// Default page table
pub static DEFAULT_PAGES: [Page; 1] = [INDEX_PAGE];

/// Number of queries served
///
/// Shared between the endpoint and whoever displays the count.
#[derive(Debug, Default)]
pub struct QueryCounter(AtomicU32);

impl QueryCounter {
    /// Create a zeroed counter
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Count one served query
    pub fn record(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Queries served so far (wraps)
    pub fn count(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Malformed request line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestError {
    /// Blank line
    Empty,
    /// Method other than GET
    UnsupportedMethod,
    /// No path, or a path not starting with '/'
    BadPath,
    /// Missing or non-HTTP/1.x version
    BadVersion,
}

/// Parse `GET <path> HTTP/1.x` and return the path
///
/// Any query string is stripped from the path.
pub fn parse_request_line(line: &str) -> Result<&str, RequestError> {
    let mut parts = line.split_ascii_whitespace();

    let method = parts.next().ok_or(RequestError::Empty)?;
    if method != "GET" {
        return Err(RequestError::UnsupportedMethod);
    }

    let target = parts.next().ok_or(RequestError::BadPath)?;
    if !target.starts_with('/') {
        return Err(RequestError::BadPath);
    }

    match parts.next() {
        Some(version) if version.starts_with("HTTP/1.") => {}
        _ => return Err(RequestError::BadVersion),
    }

    let path = target.split('?').next().unwrap_or(target);
    Ok(path)
}

/// Where a path leads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'p> {
    /// Current readings
    Data,
    /// A static page
    Page(&'p Page),
    /// Nothing matches
    NotFound,
}

/// HTTP status of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    MethodNotAllowed,
}

impl Status {
    /// Numeric code
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::MethodNotAllowed => 405,
        }
    }

    /// Reason phrase
    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::NotFound => "Not Found",
            Status::MethodNotAllowed => "Method Not Allowed",
        }
    }
}

/// Response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Freshly formatted readings
    Data(String<QUERY_LEN>),
    /// Static text
    Static(&'static str),
}

impl Body {
    /// Body text
    pub fn as_str(&self) -> &str {
        match self {
            Body::Data(text) => text.as_str(),
            Body::Static(text) => text,
        }
    }
}

/// A complete response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content_type: &'static str,
    pub body: Body,
}

impl Response {
    fn text(status: Status, body: &'static str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: Body::Static(body),
        }
    }

    /// Render the HTTP/1.0 status line and headers, ending in a blank line
    pub fn head(&self) -> String<HEAD_LEN> {
        let mut head = String::new();
        let _ = write!(
            head,
            "HTTP/1.0 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status.code(),
            self.status.reason(),
            self.content_type,
            self.body.as_str().len(),
        );
        head
    }
}

/// Query endpoint over the two latest-value channels
pub struct Endpoint<'a> {
    data_path: &'a str,
    pages: &'a [Page],
    counter: &'a LatestValue<u32>,
    temperature: &'a LatestValue<f32>,
    queries: &'a QueryCounter,
}

impl<'a> Endpoint<'a> {
    /// Create an endpoint
    pub fn new(
        data_path: &'a str,
        pages: &'a [Page],
        counter: &'a LatestValue<u32>,
        temperature: &'a LatestValue<f32>,
        queries: &'a QueryCounter,
    ) -> Self {
        Self {
            data_path,
            pages,
            counter,
            temperature,
            queries,
        }
    }

    /// Resolve a path
    ///
    /// `/` serves the first page. Otherwise the first page whose path is a
    /// prefix of the request wins.
    pub fn route(&self, path: &str) -> Route<'a> {
        if path == self.data_path {
            return Route::Data;
        }

        let pages: &'a [Page] = self.pages;
        if path == "/" {
            return pages.first().map_or(Route::NotFound, Route::Page);
        }

        pages
            .iter()
            .find(|page| path.starts_with(page.path))
            .map_or(Route::NotFound, Route::Page)
    }

    /// Current readings as a query body
    ///
    /// Channels that have never been published read as zero.
    pub fn query_body(&self) -> String<QUERY_LEN> {
        let count = self.counter.try_peek().unwrap_or(0);
        let celsius = self.temperature.try_peek().unwrap_or(0.0);
        format_query(count, celsius)
    }

    /// Answer one request line
    pub fn handle(&self, request_line: &str) -> Response {
        let path = match parse_request_line(request_line) {
            Ok(path) => path,
            Err(RequestError::UnsupportedMethod) => {
                return Response::text(Status::MethodNotAllowed, "method not allowed")
            }
            Err(_) => return Response::text(Status::BadRequest, "bad request"),
        };

        match self.route(path) {
            Route::Data => {
                self.queries.record();
                Response {
                    status: Status::Ok,
                    content_type: "text/plain",
                    body: Body::Data(self.query_body()),
                }
            }
            Route::Page(page) => Response {
                status: Status::Ok,
                content_type: page.content_type,
                body: Body::Static(page.body),
            },
            Route::NotFound => Response::text(Status::NotFound, "not found"),
        }
    }
}
