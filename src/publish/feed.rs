//! Index and feed assembly.

use chrono::{DateTime, Utc};
use quick_xml::errors::{Error as XmlError, IllFormedError};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::Result;
use crate::render::{cdata_safe, escape_xml};

/// Date as shown to readers, e.g. "January 1, 2025".
pub fn human_date(dt: &DateTime<Utc>) -> String {
    dt.format("%B %-d, %Y").to_string()
}

/// ISO 8601 for `datetime` attributes.
pub fn iso_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// RFC 822 date for `pubDate`.
pub fn rfc822_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
}

/// One entry of the feed.
#[derive(Debug, Clone, Copy)]
pub struct FeedItem<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub published: DateTime<Utc>,
    /// HTML content, embedded as CDATA.
    pub content: &'a str,
}

impl FeedItem<'_> {
    pub fn to_xml(&self) -> String {
        let link = escape_xml(self.link);
        format!(
            "<item>\n  <title>{}</title>\n  <link>{link}</link>\n  <pubDate>{}</pubDate>\n  <description><![CDATA[{}]]></description>\n  <guid>{link}</guid>\n</item>",
            escape_xml(self.title),
            rfc822_date(&self.published),
            cdata_safe(self.content),
        )
    }
}

/// `<item>` elements joined by newlines, in the given order.
pub fn feed_items(items: &[FeedItem<'_>]) -> String {
    items.iter().map(FeedItem::to_xml).collect::<Vec<_>>().join("\n")
}

/// Check that every element in `doc` is closed.
///
/// Templates are free text, so a broken `feed.xml` is only detected here.
pub fn check_well_formed(doc: &str) -> Result<()> {
    let mut reader = Reader::from_str(doc);
    let mut open: Vec<Vec<u8>> = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) => open.push(e.name().as_ref().to_vec()),
            Event::End(_) => {
                open.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    match open.pop() {
        Some(name) => Err(XmlError::IllFormed(IllFormedError::MissingEndTag(
            String::from_utf8_lossy(&name).into_owned(),
        ))
        .into()),
        None => Ok(()),
    }
}
