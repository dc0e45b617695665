//! RSS 2.0 + iTunes rendering of the active feed, and reading it back.
//!
//! The published document doubles as the durable record of which entries are
//! active, so everything rendered per item must survive [`parse_feed_entries`]
//! unchanged.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

use super::entry::FeedEntry;
use super::error::FeedError;
use super::urls::{entry_id_from_media_url, FeedUrls};
use crate::config::Channel;

const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";
const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";

/// Rendered when an entry has no known duration.
const UNKNOWN_DURATION: &str = "00:00";

/// Fallback for documents whose enclosure lacks a `type` attribute.
const DEFAULT_MIME_TYPE: &str = "audio/mpeg";

fn xml_err(e: impl std::fmt::Display) -> FeedError {
    FeedError::Xml(e.to_string())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Render the complete feed document.
///
/// `built_at` only feeds the channel's `lastBuildDate`/`pubDate`; item output
/// depends solely on the entries, channel and URLs.
pub fn render_feed(
    channel: &Channel,
    urls: &FeedUrls,
    entries: &[FeedEntry],
    built_at: DateTime<Utc>,
) -> Result<String, FeedError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:itunes", ITUNES_NS));
    rss.push_attribute(("xmlns:content", CONTENT_NS));
    writer.write_event(Event::Start(rss)).map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .map_err(xml_err)?;

    let build_date = built_at.to_rfc2822();
    let image_url = channel
        .image_url
        .clone()
        .unwrap_or_else(|| urls.default_image_url());

    write_text_element(&mut writer, "title", &channel.title)?;
    write_text_element(&mut writer, "link", &urls.feed_url())?;
    write_text_element(&mut writer, "description", &channel.description)?;
    write_text_element(&mut writer, "language", &channel.language)?;
    write_text_element(&mut writer, "copyright", &channel.copyright)?;
    write_text_element(&mut writer, "lastBuildDate", &build_date)?;
    write_text_element(&mut writer, "pubDate", &build_date)?;
    write_empty_element(&mut writer, "itunes:category", &[("text", &channel.category)])?;
    write_text_element(&mut writer, "itunes:explicit", yes_no(channel.explicit))?;
    write_empty_element(&mut writer, "itunes:image", &[("href", &image_url)])?;
    write_text_element(&mut writer, "itunes:author", &channel.author)?;
    write_text_element(&mut writer, "itunes:summary", &channel.summary)?;

    for entry in entries {
        write_item(&mut writer, channel, urls, entry)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .map_err(xml_err)?;

    let mut bytes = writer.into_inner().into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(xml_err)
}

fn write_item<W: std::io::Write>(
    writer: &mut Writer<W>,
    channel: &Channel,
    urls: &FeedUrls,
    entry: &FeedEntry,
) -> Result<(), FeedError> {
    let media_url = urls.media_url(entry.id);
    let length = entry.file_size.to_string();

    writer
        .write_event(Event::Start(BytesStart::new("item")))
        .map_err(xml_err)?;

    write_text_element(writer, "title", &entry.title)?;
    write_text_element(
        writer,
        "description",
        entry.description.as_deref().unwrap_or(""),
    )?;
    write_text_element(writer, "link", &media_url)?;
    write_empty_element(
        writer,
        "enclosure",
        &[
            ("url", &media_url),
            ("length", &length),
            ("type", &entry.mime_type),
        ],
    )?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "false"));
    writer.write_event(Event::Start(guid)).map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(&entry.guid)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new("guid")))
        .map_err(xml_err)?;

    write_text_element(writer, "pubDate", &entry.pub_date.to_rfc2822())?;
    write_text_element(
        writer,
        "itunes:duration",
        entry.duration.as_deref().unwrap_or(UNKNOWN_DURATION),
    )?;
    write_text_element(writer, "itunes:explicit", yes_no(channel.explicit))?;

    writer
        .write_event(Event::End(BytesEnd::new("item")))
        .map_err(xml_err)?;
    Ok(())
}

/// `<name>text</name>` with all five markup characters escaped.
fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), FeedError> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)?;
    Ok(())
}

fn write_empty_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    attributes: &[(&str, &String)],
) -> Result<(), FeedError> {
    let mut element = BytesStart::new(name);
    for (key, value) in attributes {
        element.push_attribute((*key, value.as_str()));
    }
    writer.write_event(Event::Empty(element)).map_err(xml_err)
}

// ============================================================================
// Reading
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Description,
    Link,
    Guid,
    PubDate,
    Duration,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"description" => Some(Field::Description),
            b"link" => Some(Field::Link),
            b"guid" => Some(Field::Guid),
            b"pubDate" => Some(Field::PubDate),
            b"itunes:duration" => Some(Field::Duration),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct ItemBuilder {
    title: Option<String>,
    description: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    pub_date: Option<String>,
    duration: Option<String>,
    enclosure_url: Option<String>,
    enclosure_length: Option<String>,
    enclosure_type: Option<String>,
}

impl ItemBuilder {
    fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Title => &mut self.title,
            Field::Description => &mut self.description,
            Field::Link => &mut self.link,
            Field::Guid => &mut self.guid,
            Field::PubDate => &mut self.pub_date,
            Field::Duration => &mut self.duration,
        };
        *slot = Some(value);
    }

    fn build(self) -> Result<FeedEntry, FeedError> {
        let guid = self
            .guid
            .filter(|g| !g.trim().is_empty())
            .ok_or_else(|| FeedError::Document("item without guid".to_string()))?;

        let id = self
            .enclosure_url
            .as_deref()
            .or(self.link.as_deref())
            .and_then(entry_id_from_media_url)
            .ok_or_else(|| {
                FeedError::Document(format!("item {guid} has no resolvable enclosure id"))
            })?;

        let raw_date = self
            .pub_date
            .ok_or_else(|| FeedError::Document(format!("item {guid} has no pubDate")))?;
        let pub_date = DateTime::parse_from_rfc2822(raw_date.trim())
            .map_err(|e| FeedError::Document(format!("item {guid} pubDate '{raw_date}': {e}")))?
            .with_timezone(&Utc);

        let file_size = match self.enclosure_length.as_deref().map(str::trim) {
            Some(len) if !len.is_empty() => len.parse::<u64>().map_err(|_| {
                FeedError::Document(format!("item {guid} enclosure length '{len}'"))
            })?,
            _ => 0,
        };

        Ok(FeedEntry {
            id,
            title: self.title.unwrap_or_default(),
            description: self.description.filter(|d| !d.is_empty()),
            file_size,
            mime_type: self
                .enclosure_type
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            pub_date,
            duration: self
                .duration
                .filter(|d| !d.is_empty() && d != UNKNOWN_DURATION),
            guid,
        })
    }
}

/// Read the items of a published feed document back into entries, in document order.
///
/// Accepts both escaped text and CDATA sections, so documents written by
/// earlier CDATA-based generators load as well.
pub fn parse_feed_entries(xml: &str) -> Result<Vec<FeedEntry>, FeedError> {
    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations; only the
    // five predefined entities and character references are resolved.
    let mut reader = Reader::from_str(xml);

    let mut entries = Vec::new();
    let mut item: Option<ItemBuilder> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"item" => item = Some(ItemBuilder::default()),
                b"enclosure" => {
                    if let Some(builder) = item.as_mut() {
                        read_enclosure(&e, &reader, builder)?;
                    }
                }
                name if item.is_some() => {
                    field = Field::from_name(name);
                    text.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if e.name().as_ref() == b"enclosure" => {
                if let Some(builder) = item.as_mut() {
                    read_enclosure(&e, &reader, builder)?;
                }
            }
            Ok(Event::Text(e)) if field.is_some() => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| FeedError::Document(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) if field.is_some() => {
                let raw = std::str::from_utf8(&e)
                    .map_err(|err| FeedError::Document(err.to_string()))?;
                text.push_str(raw);
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"item" {
                    field = None;
                    if let Some(builder) = item.take() {
                        entries.push(builder.build()?);
                    }
                } else if let (Some(f), Some(builder)) = (field.take(), item.as_mut()) {
                    builder.set(f, std::mem::take(&mut text));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FeedError::Document(format!(
                    "XML error at position {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    if item.is_some() {
        return Err(FeedError::Document("unterminated <item>".to_string()));
    }

    Ok(entries)
}

fn read_enclosure(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    builder: &mut ItemBuilder,
) -> Result<(), FeedError> {
    let decoder = reader.decoder();
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| FeedError::Document(err.to_string()))?;
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|err| FeedError::Document(err.to_string()))?
            .into_owned();
        match attr.key.as_ref() {
            b"url" => builder.enclosure_url = Some(value),
            b"length" => builder.enclosure_length = Some(value),
            b"type" => builder.enclosure_type = Some(value),
            _ => {}
        }
    }
    Ok(())
}
