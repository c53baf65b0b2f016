//! Pull reader over the XML parts of an xlsx package.
//!
//! A reader remembers the part it was opened on, so malformed XML is reported
//! together with the part name.

use crate::error::RoiSheetError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Malformed XML in part '{part}': {source}")]
    MalformedPartError { part: String, source: quick_xml::Error },

    #[error("Unknown entity '&{0};'")]
    UnknownEntityError(String),

    #[error("Attribute {name}=\"{value}\" has an unexpected value")]
    AttributeValueError { name: String, value: String },
}

/// Event reader over one package part.
///
/// Empty elements come back as a start/end pair and text is never trimmed.
pub(crate) struct XmlReader<R: BufRead> {
    part: String,
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(part: &str, source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.check_end_names = false;
        config.trim_text(false);
        Self {
            part: part.to_owned(),
            reader,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Next event of the part, `None` once the part is exhausted.
    pub(crate) fn next(&mut self) -> Result<Option<Event<'_>>, RoiSheetError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(source) => Err(XmlError::MalformedPartError {
                part: self.part.clone(),
                source,
            }
            .into()),
        }
    }
}

/// Attribute lookup on start tags.
pub(crate) trait XmlAttributes {
    /// Unescaped value of the attribute `name`.
    fn attribute(&self, name: &str) -> Result<Option<Cow<'_, str>>, RoiSheetError>;

    /// Value of the attribute `name` parsed as `T`.
    fn parsed_attribute<T: FromStr>(&self, name: &str) -> Result<Option<T>, RoiSheetError> {
        let Some(value) = self.attribute(name)? else {
            return Ok(None);
        };
        match value.parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(RoiSheetError::from(XmlError::AttributeValueError {
                name: name.to_owned(),
                value: value.to_string(),
            })),
        }
    }
}

impl XmlAttributes for BytesStart<'_> {
    fn attribute(&self, name: &str) -> Result<Option<Cow<'_, str>>, RoiSheetError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.unescape_value()?)),
            None => Ok(None),
        }
    }
}

/// Appends the text a `&name;`, `&#n;` or `&#xh;` reference stands for.
pub(crate) fn push_reference(text: &mut String, reference: &BytesRef) -> Result<(), RoiSheetError> {
    let name = reference.xml_content()?;
    if let Some(entity) = resolve_xml_entity(&name) {
        text.push_str(entity);
        return Ok(());
    }

    let code = match name.strip_prefix("#x") {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => name.strip_prefix('#').and_then(|decimal| decimal.parse().ok()),
    };
    match code.and_then(char::from_u32) {
        Some(character) => {
            text.push(character);
            Ok(())
        }
        None => Err(RoiSheetError::from(XmlError::UnknownEntityError(name.to_string()))),
    }
}

/// Loops over the events of an `XmlReader`; events no arm matches are skipped.
#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(event) = $reader.next()? {
            match event {
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::name::QName;

    #[test]
    fn xml_reader_expands_empty_elements() -> Result<(), RoiSheetError> {
        let mut reader = XmlReader::new("xl/test.xml", "<a><b x=\"1\"/></a>".as_bytes());
        let mut names = Vec::new();
        match_xml_events!(reader => {
            Event::Start(event) => names.push(format!("+{}", String::from_utf8_lossy(event.name().as_ref()))),
            Event::End(event) => names.push(format!("-{}", String::from_utf8_lossy(event.name().as_ref()))),
        });
        assert_eq!(names, vec!["+a", "+b", "-b", "-a"]);
        Ok(())
    }

    #[test]
    fn malformed_xml_names_the_part() {
        let mut reader = XmlReader::new("xl/worksheets/sheet9.xml", "<worksheet><row".as_bytes());
        let error = loop {
            match reader.next() {
                Ok(Some(_)) => continue,
                Ok(None) => panic!("unterminated tag was accepted"),
                Err(error) => break error,
            }
        };
        assert!(matches!(
            error,
            RoiSheetError::XmlHelperError(XmlError::MalformedPartError { ref part, .. }) if part == "xl/worksheets/sheet9.xml"
        ));
        assert!(error.to_string().starts_with("Malformed XML in part 'xl/worksheets/sheet9.xml'"));
    }

    #[test]
    fn start_tag_attributes() -> Result<(), RoiSheetError> {
        let mut reader = XmlReader::new("xl/workbook.xml", "<v activeTab=\"2\" name=\"a &amp; b\" bad=\"x\"/>".as_bytes());
        let mut seen = false;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == QName(b"v") => {
                assert_eq!(event.parsed_attribute::<usize>("activeTab")?, Some(2));
                assert_eq!(event.attribute("name")?.as_deref(), Some("a & b"));
                assert_eq!(event.attribute("missing")?, None);
                assert_eq!(event.parsed_attribute::<usize>("missing")?, None);
                let error = event.parsed_attribute::<usize>("bad").unwrap_err();
                assert_eq!(error.to_string(), "Attribute bad=\"x\" has an unexpected value");
                seen = true;
            }
        });
        assert!(seen);
        Ok(())
    }

    #[test]
    fn references_are_resolved() -> Result<(), RoiSheetError> {
        let mut reader = XmlReader::new("xl/sharedStrings.xml", "<t>&lt;&#65;&#x42;&amp;</t>".as_bytes());
        let mut text = String::new();
        match_xml_events!(reader => {
            Event::Text(event) => text.push_str(&event.xml_content()?),
            Event::GeneralRef(event) => push_reference(&mut text, &event)?,
        });
        assert_eq!(text, "<AB&");
        Ok(())
    }

    #[test]
    fn unknown_reference_is_an_error() {
        let mut reader = XmlReader::new("xl/sharedStrings.xml", "<t>&nbsp;</t>".as_bytes());
        let mut text = String::new();
        let result = (|| -> Result<(), RoiSheetError> {
            match_xml_events!(reader => {
                Event::GeneralRef(event) => push_reference(&mut text, &event)?,
            });
            Ok(())
        })();
        assert!(matches!(
            result,
            Err(RoiSheetError::XmlHelperError(XmlError::UnknownEntityError(ref name))) if name == "nbsp"
        ));
    }
}
