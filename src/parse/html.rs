//! HTML parsing and text extraction

use super::{normalize_whitespace, ExtractedLink, ParsedPage};
use scraper::{node::Node, ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements whose text is never shown to a reader
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Elements that start a new line in [`ParsedPage::whole_text`]
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Parse HTML content and extract title, text, headings and links
pub fn parse_html(content: &str, base_url: Option<&str>) -> ParsedPage {
    let document = Html::parse_document(content);
    let mut page = ParsedPage::default();

    // Extract title
    if let Ok(selector) = Selector::parse("title") {
        if let Some(title_elem) = document.select(&selector).next() {
            let title = normalize_whitespace(&title_elem.text().collect::<String>());
            if !title.is_empty() {
                page.title = Some(title);
            }
        }
    }

    let mut flat = String::new();
    collect_text(document.root_element(), &mut flat, false);
    page.text = normalize_whitespace(&flat);

    let body = Selector::parse("body")
        .ok()
        .and_then(|s| document.select(&s).next())
        .unwrap_or_else(|| document.root_element());
    let mut lines = String::new();
    collect_text(body, &mut lines, true);
    page.whole_text = tidy_lines(&lines);

    // Extract headings
    if let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6") {
        for elem in document.select(&selector) {
            let heading = normalize_whitespace(&elem.text().collect::<String>());
            if !heading.is_empty() {
                page.headings.push(heading);
            }
        }
    }

    page.links = extract_links(&document, base_url);
    page
}

/// Visible text of an HTML document on a single line
pub fn html_to_text(content: &str) -> String {
    let document = Html::parse_document(content);
    let mut text = String::new();
    collect_text(document.root_element(), &mut text, false);
    normalize_whitespace(&text)
}

fn collect_text(element: ElementRef<'_>, out: &mut String, keep_lines: bool) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                if keep_lines {
                    // Source line breaks are not visual ones
                    out.extend(text.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }));
                } else {
                    out.push_str(text);
                    out.push(' ');
                }
            }
            Node::Element(el) => {
                if HIDDEN_ELEMENTS.contains(&el.name()) {
                    continue;
                }
                if let Some(child_elem) = ElementRef::wrap(child) {
                    let block = keep_lines && BLOCK_ELEMENTS.contains(&el.name());
                    if block {
                        out.push('\n');
                    }
                    collect_text(child_elem, out, keep_lines);
                    if block {
                        out.push('\n');
                    }
                }
            }
            _ => {}
        }
    }
}

/// Normalize whitespace per line and drop blank lines
fn tidy_lines(text: &str) -> String {
    text.lines()
        .map(normalize_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn extract_links(document: &Html, base_url: Option<&str>) -> Vec<ExtractedLink> {
    let mut links = Vec::new();
    let Ok(selector) = Selector::parse("a[href]") else {
        return links;
    };
    let base = base_url.and_then(|u| Url::parse(u).ok());
    let mut seen = HashSet::new();

    for elem in document.select(&selector) {
        let Some(href) = elem.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }

        // Resolve relative URLs
        let resolved = match &base {
            Some(base) => base.join(href),
            None => Url::parse(href),
        };
        let Ok(mut url) = resolved else {
            continue;
        };
        if url.scheme() != "http" && url.scheme() != "https" {
            continue;
        }
        url.set_fragment(None);

        let is_internal = match &base {
            Some(base) => url.origin() == base.origin(),
            None => false,
        };

        let url = url.to_string();
        if seen.insert(url.clone()) {
            links.push(ExtractedLink { url, is_internal });
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_html_basic() {
        let html = r#"
        <!DOCTYPE html>
        <html>
        <head><title>Test Page</title></head>
        <body>
            <h1>Main Heading</h1>
            <p>Some paragraph
               text here.</p>
            <h2>Sub Heading</h2>
            <p>More <b>bold</b> text.</p>
        </body>
        </html>
        "#;

        let page = parse_html(html, Some("https://example.com"));

        assert_eq!(page.title.as_deref(), Some("Test Page"));
        assert!(page.text.starts_with("Test Page"));
        assert!(page.text.contains("Some paragraph text here."));
        assert_eq!(page.headings, vec!["Main Heading", "Sub Heading"]);

        let lines: Vec<&str> = page.whole_text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Main Heading",
                "Some paragraph text here.",
                "Sub Heading",
                "More bold text."
            ]
        );
    }

    #[test]
    fn test_hidden_elements_are_skipped() {
        let html = "<html><head><style>p { color: red }</style></head>\
                    <body><p>shown</p><script>var hidden = 1;</script>\
                    <noscript>enable js</noscript></body></html>";
        let text = html_to_text(html);
        assert_eq!(text, "shown");
        assert_eq!(parse_html(html, None).whole_text, "shown");
    }

    #[test]
    fn test_link_extraction() {
        let html = r##"
        <html>
        <body>
            <a href="/internal#part">Internal</a>
            <a href="https://external.com/page">External</a>
            <a href="relative/path">Relative</a>
            <a href="/internal">Duplicate</a>
            <a href="#top">Anchor</a>
            <a href="mailto:someone@example.com">Mail</a>
        </body>
        </html>
        "##;

        let page = parse_html(html, Some("https://example.com/docs/"));

        assert_eq!(page.links.len(), 3);
        assert_eq!(page.links[0].url, "https://example.com/internal");
        assert!(page.links[0].is_internal);
        assert!(!page.links[1].is_internal);
        assert_eq!(page.links[2].url, "https://example.com/docs/relative/path");
    }

    #[test]
    fn test_other_port_is_external() {
        let html = r#"
            <a href="http://127.0.0.1:8000/same">Same</a>
            <a href="http://127.0.0.1:9000/other">Other port</a>
            <a href="https://127.0.0.1:8000/secure">Other scheme</a>
        "#;

        let page = parse_html(html, Some("http://127.0.0.1:8000/"));
        let internal: Vec<bool> = page.links.iter().map(|l| l.is_internal).collect();
        assert_eq!(internal, vec![true, false, false]);
    }

    #[test]
    fn test_missing_title() {
        let page = parse_html("<p>no head</p>", None);
        assert!(page.title.is_none());
        assert_eq!(page.text, "no head");
    }
}
