//! HTML shell wrapped around caller markup before it reaches the browser.

const BASE_STYLESHEET: &str = include_str!("styles/base.css");
const PRINT_STYLESHEET: &str = include_str!("styles/print.css");

/// Stylesheet layers in cascade order; later layers win.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleLayer {
    Base,
    Print,
    Caller,
}

impl StyleLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleLayer::Base => "base",
            StyleLayer::Print => "print",
            StyleLayer::Caller => "caller",
        }
    }
}

/// Compose the full document loaded into the page: base styles, print
/// overrides, caller styles, then the caller markup as the body.
pub fn compose_document(markup: &str, caller_css: Option<&str>) -> String {
    let caller_css = caller_css.filter(|css| !css.trim().is_empty());
    let capacity = BASE_STYLESHEET.len()
        + PRINT_STYLESHEET.len()
        + caller_css.map_or(0, str::len)
        + markup.len()
        + 256;

    let mut document = String::with_capacity(capacity);
    document.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    document.push_str("<meta charset=\"utf-8\">\n");
    document.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    push_style(&mut document, StyleLayer::Base, BASE_STYLESHEET);
    push_style(&mut document, StyleLayer::Print, PRINT_STYLESHEET);
    if let Some(css) = caller_css {
        push_style(&mut document, StyleLayer::Caller, css);
    }
    document.push_str("</head>\n<body>\n");
    document.push_str(markup);
    document.push_str("\n</body>\n</html>\n");
    document
}

fn push_style(document: &mut String, layer: StyleLayer, css: &str) {
    document.push_str("<style data-layer=\"");
    document.push_str(layer.as_str());
    document.push_str("\">\n");
    document.push_str(&escape_style_close(css));
    document.push_str("\n</style>\n");
}

/// Keep a stray `</style` inside caller CSS from ending the element early.
fn escape_style_close(css: &str) -> String {
    let mut escaped = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(index) = find_ascii_case_insensitive(rest, "</style") {
        escaped.push_str(&rest[..index]);
        escaped.push_str("<\\/style");
        rest = &rest[index + "</style".len()..];
    }
    escaped.push_str(rest);
    escaped
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}
