//! Sparkle appcast XML reading and writing.
//!
//! Writing produces a fixed element order so that re-serializing an
//! unchanged feed is byte-identical:
//!
//! ```xml
//! <item>
//!   <title/> <sparkle:version/> <pubDate/> <guid/>
//!   <sparkle:minimumSystemVersion/> <description/> <enclosure/>
//! </item>
//! ```
//!
//! Reading accepts any element order and ignores unknown elements.

use super::model::{DEFAULT_ENCLOSURE_TYPE, Feed, FeedItem};
use crate::bundler::error::{Error, Result};
use chrono::DateTime;
use quick_xml::{
    Reader, Writer,
    events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};
use std::path::Path;

const SPARKLE_NS: &str = "http://www.andymatuschak.org/xml-namespaces/sparkle";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

/// Serializes `feed` as an RSS 2.0 document with the Sparkle namespace.
pub fn serialize(feed: &Feed) -> Result<Vec<u8>> {
    let buf = Vec::with_capacity(1024 + feed.items().len() * 1024);
    let mut writer = Writer::new_with_indent(buf, b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("rss").with_attributes([
        ("version", "2.0"),
        ("xmlns:sparkle", SPARKLE_NS),
        ("xmlns:dc", DC_NS),
    ])))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;
    text_element(&mut writer, "title", &feed.title)?;
    if let Some(link) = &feed.link {
        text_element(&mut writer, "link", link)?;
    }
    if let Some(description) = &feed.description {
        text_element(&mut writer, "description", description)?;
    }
    if let Some(language) = &feed.language {
        text_element(&mut writer, "language", language)?;
    }

    for item in feed.items() {
        write_item(&mut writer, item)?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let mut out = writer.into_inner();
    out.push(b'\n');
    Ok(out)
}

fn write_item(writer: &mut Writer<Vec<u8>>, item: &FeedItem) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("item")))?;
    text_element(writer, "title", &item.title)?;
    text_element(writer, "sparkle:version", &item.version)?;
    text_element(writer, "pubDate", &item.published_at.to_rfc2822())?;
    if let Some(guid) = &item.guid {
        writer
            .create_element("guid")
            .with_attribute(("isPermaLink", "false"))
            .write_text_content(BytesText::new(guid))?;
    }
    if let Some(minimum) = &item.minimum_system_version {
        text_element(writer, "sparkle:minimumSystemVersion", minimum)?;
    }

    writer.write_event(Event::Start(BytesStart::new("description")))?;
    for chunk in cdata_chunks(&item.release_notes_html) {
        writer.write_event(Event::CData(BytesCData::new(chunk)))?;
    }
    writer.write_event(Event::End(BytesEnd::new("description")))?;

    let length = item.enclosure_length.to_string();
    writer.write_event(Event::Empty(BytesStart::new("enclosure").with_attributes([
        ("url", item.enclosure_url.as_str()),
        ("length", length.as_str()),
        ("type", item.enclosure_type.as_str()),
        ("sparkle:version", item.version.as_str()),
    ])))?;
    writer.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer
        .create_element(name)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

/// Splits `text` so that no CDATA section contains `]]>`.
fn cdata_chunks(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = text;
    while let Some(at) = rest.find("]]>") {
        chunks.push(&rest[..at + 2]);
        rest = &rest[at + 2..];
    }
    chunks.push(rest);
    chunks
}

/// Item fields collected while reading.
#[derive(Debug, Default)]
struct ItemBuilder {
    title: Option<String>,
    version: Option<String>,
    pub_date: Option<String>,
    guid: Option<String>,
    minimum_system_version: Option<String>,
    description: Option<String>,
    enclosure_url: Option<String>,
    enclosure_length: Option<String>,
    enclosure_type: Option<String>,
    enclosure_version: Option<String>,
}

impl ItemBuilder {
    fn build(self, path: &Path, index: usize) -> Result<FeedItem> {
        let missing = |what: &str| Error::parse(path, format!("item {} has no {}", index + 1, what));

        let version = self
            .version
            .or(self.enclosure_version)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| missing("version"))?;
        let enclosure_url = self.enclosure_url.ok_or_else(|| missing("enclosure url"))?;
        let length = self
            .enclosure_length
            .ok_or_else(|| missing("enclosure length"))?;
        let enclosure_length = length.trim().parse::<u64>().map_err(|_| {
            Error::parse(
                path,
                format!("item {} has invalid enclosure length `{}`", index + 1, length),
            )
        })?;
        let pub_date = self.pub_date.ok_or_else(|| missing("pubDate"))?;
        let published_at = DateTime::parse_from_rfc2822(pub_date.trim()).map_err(|e| {
            Error::parse(
                path,
                format!("item {} has invalid pubDate `{}`: {}", index + 1, pub_date, e),
            )
        })?;

        Ok(FeedItem {
            title: self.title.unwrap_or_else(|| version.clone()),
            version,
            published_at,
            enclosure_url,
            enclosure_length,
            enclosure_type: self
                .enclosure_type
                .unwrap_or_else(|| DEFAULT_ENCLOSURE_TYPE.to_string()),
            release_notes_html: self.description.unwrap_or_default(),
            minimum_system_version: self.minimum_system_version,
            guid: self.guid,
        })
    }
}

/// Parses an appcast document read from `path`.
///
/// # Errors
///
/// [`Error::Parse`] when the document is not well formed, its root is not
/// `<rss>`, it has no `<channel>` or an item lacks a required field.
pub fn parse(text: &str, path: &Path) -> Result<Feed> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut text_buf = String::new();
    let mut saw_root = false;
    let mut saw_channel = false;

    let mut title = None;
    let mut link = None;
    let mut description = None;
    let mut language = None;
    let mut items = Vec::new();
    let mut current: Option<ItemBuilder> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::parse(
                path,
                format!("malformed XML at byte {}: {}", reader.buffer_position(), e),
            )
        })?;

        match event {
            Event::Start(start) => {
                let name = element_name(&start);
                check_root(&mut saw_root, &stack, &name, path)?;
                if stack.len() == 1 && name == "channel" {
                    saw_channel = true;
                }
                if in_channel(&stack) && name == "item" {
                    current = Some(ItemBuilder::default());
                }
                if name == "enclosure" {
                    if let Some(item) = current.as_mut() {
                        read_enclosure(item, &start, path)?;
                    }
                }
                stack.push(name);
                text_buf.clear();
            }
            Event::Empty(start) => {
                let name = element_name(&start);
                check_root(&mut saw_root, &stack, &name, path)?;
                if let Some(item) = current.as_mut() {
                    if name == "enclosure" {
                        read_enclosure(item, &start, path)?;
                    }
                } else if stack.len() == 1 && name == "channel" {
                    saw_channel = true;
                }
            }
            Event::Text(content) => {
                let unescaped = content
                    .unescape()
                    .map_err(|e| Error::parse(path, format!("bad text content: {}", e)))?;
                text_buf.push_str(&unescaped);
            }
            Event::CData(content) => {
                text_buf.push_str(&String::from_utf8_lossy(&content));
            }
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    return Err(Error::parse(path, "unbalanced closing tag"));
                };
                let value = std::mem::take(&mut text_buf);

                if in_channel(&stack) && name == "item" {
                    if let Some(item) = current.take() {
                        let index = items.len();
                        items.push(item.build(path, index)?);
                    }
                } else if let Some(item) = current.as_mut() {
                    if is_item_child(&stack) {
                        match name.as_str() {
                            "title" => item.title = Some(value),
                            "sparkle:version" => item.version = Some(value),
                            "pubDate" => item.pub_date = Some(value),
                            "guid" => item.guid = Some(value),
                            "sparkle:minimumSystemVersion" => {
                                item.minimum_system_version = Some(value)
                            }
                            "description" => item.description = Some(value),
                            _ => {}
                        }
                    }
                } else if in_channel(&stack) {
                    match name.as_str() {
                        "title" => title = Some(value),
                        "link" => link = Some(value),
                        "description" => description = Some(value),
                        "language" => language = Some(value),
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::parse(
            path,
            format!("document ends inside <{}>", open),
        ));
    }
    if !saw_root {
        return Err(Error::parse(path, "document has no <rss> root element"));
    }
    if !saw_channel {
        return Err(Error::parse(path, "document has no <channel>"));
    }

    Ok(Feed::from_parts(
        title.unwrap_or_default(),
        link,
        description,
        language,
        items,
    ))
}

fn element_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

fn check_root(saw_root: &mut bool, stack: &[String], name: &str, path: &Path) -> Result<()> {
    if stack.is_empty() {
        if *saw_root || name != "rss" {
            return Err(Error::parse(
                path,
                format!("expected a single <rss> root element, found <{}>", name),
            ));
        }
        *saw_root = true;
    }
    Ok(())
}

/// Whether the innermost open element is `rss/channel`.
fn in_channel(stack: &[String]) -> bool {
    stack.len() == 2 && stack[1] == "channel"
}

/// Whether the innermost open element is `rss/channel/item`.
fn is_item_child(stack: &[String]) -> bool {
    stack.len() == 3 && stack[1] == "channel" && stack[2] == "item"
}

fn read_enclosure(item: &mut ItemBuilder, start: &BytesStart<'_>, path: &Path) -> Result<()> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::parse(path, format!("bad enclosure attribute: {}", e)))?;
        let value = attr
            .unescape_value()
            .map_err(|e| Error::parse(path, format!("bad enclosure attribute: {}", e)))?
            .into_owned();
        match attr.key.as_ref() {
            b"url" => item.enclosure_url = Some(value),
            b"length" => item.enclosure_length = Some(value),
            b"type" => item.enclosure_type = Some(value),
            b"sparkle:version" => item.enclosure_version = Some(value),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn sample_item(version: &str) -> FeedItem {
        FeedItem {
            version: version.into(),
            title: format!("MyApp {}", version),
            published_at: FixedOffset::east_opt(2 * 3600)
                .unwrap()
                .with_ymd_and_hms(2026, 10, 19, 9, 30, 0)
                .unwrap(),
            enclosure_url: format!("https://example.com/dl/MyApp-{}.dmg?a=1&b=2", version),
            enclosure_length: 4_194_304,
            enclosure_type: DEFAULT_ENCLOSURE_TYPE.into(),
            release_notes_html: "<h1>Fixed</h1><p>a ]]> b</p>".into(),
            minimum_system_version: Some("10.13".into()),
            guid: Some(format!("MyApp-{}", version)),
        }
    }

    fn sample_feed() -> Feed {
        Feed::from_parts(
            "MyApp".into(),
            Some("https://example.com/dl".into()),
            Some("MyApp updates".into()),
            Some("en".into()),
            vec![sample_item("1.2.0"), sample_item("1.1.0")],
        )
    }

    #[test]
    fn serialized_item_has_fixed_field_order() {
        let xml = String::from_utf8(serialize(&sample_feed()).unwrap()).unwrap();
        let order = [
            "<title>MyApp 1.2.0</title>",
            "<sparkle:version>1.2.0</sparkle:version>",
            "<pubDate>Mon, 19 Oct 2026 09:30:00 +0200</pubDate>",
            "<guid isPermaLink=\"false\">MyApp-1.2.0</guid>",
            "<sparkle:minimumSystemVersion>10.13</sparkle:minimumSystemVersion>",
            "<description><![CDATA[",
            "<enclosure url=\"https://example.com/dl/MyApp-1.2.0.dmg?a=1&amp;b=2\" length=\"4194304\"",
        ];
        let positions: Vec<usize> = order.iter().map(|s| xml.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{xml}");
    }

    #[test]
    fn parse_reads_back_serialized_feed() {
        let feed = sample_feed();
        let bytes = serialize(&feed).unwrap();
        let parsed = parse(std::str::from_utf8(&bytes).unwrap(), Path::new("feed.xml")).unwrap();
        assert_eq!(parsed, feed);
        assert_eq!(serialize(&parsed).unwrap(), bytes);
    }

    #[test]
    fn cdata_terminator_in_notes_is_split() {
        assert_eq!(cdata_chunks("a ]]> b"), vec!["a ]]", "> b"]);
        assert_eq!(cdata_chunks("plain"), vec!["plain"]);

        let xml = String::from_utf8(serialize(&sample_feed()).unwrap()).unwrap();
        assert!(xml.contains("<description><![CDATA[<h1>Fixed</h1><p>a ]]]]><![CDATA[> b</p>]]></description>"));
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<rss "));
        assert!(xml.ends_with("  </channel>\n</rss>\n"));
    }

    #[test]
    fn version_falls_back_to_enclosure_attribute() {
        let xml = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:sparkle="http://www.andymatuschak.org/xml-namespaces/sparkle">
  <channel>
    <title>Legacy</title>
    <item>
      <title>Version 0.9</title>
      <pubDate>Tue, 01 Sep 2009 10:00:00 +0000</pubDate>
      <enclosure sparkle:version="0.9" url="https://example.com/Legacy-0.9.dmg" length="100" type="application/octet-stream"/>
    </item>
  </channel>
</rss>"#;
        let feed = parse(xml, Path::new("legacy.xml")).unwrap();
        assert_eq!(feed.title, "Legacy");
        let item = &feed.items()[0];
        assert_eq!(item.version, "0.9");
        assert_eq!(item.enclosure_length, 100);
        assert_eq!(item.guid, None);
    }

    #[test]
    fn rejects_wrong_root_and_missing_channel() {
        let err = parse("<feed></feed>", Path::new("a.xml")).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
        let err = parse("<rss version=\"2.0\"></rss>", Path::new("a.xml")).unwrap_err();
        assert!(matches!(err, Error::Parse { ref reason, .. } if reason.contains("channel")));
    }

    #[test]
    fn rejects_malformed_xml() {
        let err = parse("<rss><channel><item></channel></rss>", Path::new("a.xml")).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn rejects_item_without_enclosure() {
        let xml = "<rss><channel><item><sparkle:version>1.0</sparkle:version>\
                   <pubDate>Tue, 01 Sep 2009 10:00:00 +0000</pubDate></item></channel></rss>";
        let err = parse(xml, Path::new("a.xml")).unwrap_err();
        assert!(matches!(err, Error::Parse { ref reason, .. } if reason.contains("enclosure")));
    }

    #[test]
    fn rejects_truncated_document() {
        let err = parse("<rss><channel><title>A</title>", Path::new("a.xml")).unwrap_err();
        assert!(matches!(err, Error::Parse { ref reason, .. } if reason.contains("<channel>")));
    }
}
