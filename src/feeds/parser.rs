//! Feed document parsing.
//!
//! Documents are handed to `feed-rs`, which understands RSS 0.9x/2.0,
//! RSS 1.0 (RDF), Atom and their common extension namespaces (`dc:`,
//! `media:`, `content:`, `atom:` inside RSS). Two fixups run on the raw bytes
//! first:
//!
//! 1. **Charset**: the body is decoded using its BOM, the `encoding` of the
//!    XML declaration, or the HTTP charset (in that order), and re-labelled
//!    as UTF-8
//! 2. **HTML entities**: named entities XML does not define (`&nbsp;`,
//!    `&ouml;`, ...) are rewritten as numeric references outside CDATA
//!
//! The `feed-rs` entries are then mapped onto [`RawFeedEntry`]. Every field
//! stays optional; nothing is defaulted here.

use crate::feeds::FeedError;
use crate::models::{ParsedFeed, RawFeedEntry, RawTag};
use encoding_rs::{Encoding, UTF_8};
use feed_rs::model::{Entry, Link};
use feed_rs::parser::Builder;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use tracing::debug;

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// How much of the body is searched for an XML declaration.
const PROLOG_WINDOW: usize = 512;

static XML_DECLARED_ENCODING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[^<]{0,4}<\?xml[^>]*?\bencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#).unwrap()
});

static XML_ENCODING_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(\s*<\?xml[^>]*?\bencoding\s*=\s*["'])[^"']*(["'])"#).unwrap());

static NAMED_ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").unwrap());

/// Parse a feed body into entries, preserving document order.
///
/// # Arguments
///
/// * `body` - Raw bytes as downloaded or read from disk
/// * `charset` - Charset from the HTTP `Content-Type`, if any
///
/// # Returns
///
/// The channel title and one [`RawFeedEntry`] per item/entry.
///
/// # Errors
///
/// [`FeedError::Parse`] when the body is not a well-formed RSS, RDF or Atom
/// document.
pub fn parse_feed(body: &[u8], charset: Option<&str>) -> Result<ParsedFeed, FeedError> {
    let xml = decode_body(body, charset);
    let xml = scrub_html_entities(&xml);
    debug!(bytes = xml.len(), "Parsing feed document");

    // No synthetic ids: an entry without guid/id must fall back to its link.
    let parser = Builder::new().id_generator(|_, _, _| String::new()).build();
    let feed = parser.parse(xml.as_bytes())?;

    Ok(ParsedFeed {
        title: feed.title.map(|t| t.content.trim().to_string()),
        entries: feed.entries.into_iter().map(raw_entry).collect(),
    })
}

fn raw_entry(entry: Entry) -> RawFeedEntry {
    let tags = entry
        .categories
        .into_iter()
        .map(|c| RawTag {
            term: Some(c.term.trim().to_string()).filter(|t| !t.is_empty()),
        })
        .collect::<Vec<_>>();

    RawFeedEntry {
        title: entry.title.map(|t| t.content.trim().to_string()),
        link: primary_link(entry.links),
        id: Some(entry.id).filter(|id| !id.is_empty()),
        summary: entry.summary.map(|t| t.content.trim().to_string()),
        description: entry
            .content
            .and_then(|c| c.body)
            .map(|body| body.trim().to_string()),
        // dc:date and Atom's updated land in `updated` when nothing else does.
        published_parsed: entry.published.or(entry.updated),
        tags: (!tags.is_empty()).then_some(tags),
    }
}

/// The entry's alternate link, else its first link.
fn primary_link(links: Vec<Link>) -> Option<String> {
    links
        .into_iter()
        .find_or_first(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())
}

/// Decode `body` into UTF-8 text whose XML declaration says so.
fn decode_body(body: &[u8], charset: Option<&str>) -> String {
    let head = String::from_utf8_lossy(&body[..body.len().min(PROLOG_WINDOW)]);
    let declared = XML_DECLARED_ENCODING
        .captures(&head)
        .map(|caps| caps[1].to_string());
    let encoding = declared
        .as_deref()
        .or(charset)
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .unwrap_or(UTF_8);

    // A BOM wins over the label.
    let (text, used, had_errors) = encoding.decode(body);
    if had_errors {
        debug!(encoding = used.name(), "Feed body had undecodable bytes");
    }
    XML_ENCODING_ATTR
        .replace(&text, "${1}UTF-8${2}")
        .into_owned()
}

/// Rewrite HTML-only named entities into numeric references.
///
/// CDATA sections are copied untouched. Unknown names are escaped so they
/// survive as literal text instead of failing the whole document.
fn scrub_html_entities(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;
    while let Some(start) = rest.find(CDATA_OPEN) {
        out.push_str(&replace_entities(&rest[..start]));
        let section = &rest[start..];
        let end = section
            .find(CDATA_CLOSE)
            .map(|i| i + CDATA_CLOSE.len())
            .unwrap_or(section.len());
        out.push_str(&section[..end]);
        rest = &section[end..];
    }
    out.push_str(&replace_entities(rest));
    out
}

fn replace_entities(s: &str) -> Cow<'_, str> {
    NAMED_ENTITY.replace_all(s, |caps: &Captures| {
        let name = &caps[1];
        if matches!(name, "amp" | "lt" | "gt" | "quot" | "apos") {
            return caps[0].to_string();
        }
        let decoded = html_escape::decode_html_entities(&caps[0]);
        if decoded == caps[0] {
            format!("&amp;{name};")
        } else {
            decoded.chars().map(|c| format!("&#{};", c as u32)).collect()
        }
    })
}
