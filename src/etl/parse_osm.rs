use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str;

use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::osm::{ElementKind, RawElement, Tag};
use crate::errors::{Error, ErrorKind, Result};

enum ParserState {
    Top,
    Element(RawElement),
}

/// Lazy stream of the top-level nodes, ways and relations of an .osm file.
///
/// Only one element is held in memory at a time. Elements the stream doesn't yield
/// (`osm`, `bounds`, relation `member`s, ...) are counted by name.
pub struct OsmElements<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    state: ParserState,
    other_elements: BTreeMap<String, usize>,
    done: bool,
}

/// Opens an .osm file, decompressing it on the fly if it ends in `.xz`.
pub fn open_osm_file(path: &Path) -> Result<OsmElements<Box<dyn BufRead>>> {
    let file_reader = BufReader::new(fs::File::open(path)?);
    let input: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "xz") {
        Box::new(BufReader::new(XzDecoder::new(file_reader)))
    } else {
        Box::new(file_reader)
    };
    Ok(OsmElements::new(Reader::from_reader(input)))
}

impl<R: BufRead> OsmElements<R> {
    pub fn new(mut reader: Reader<R>) -> Self {
        reader.trim_text(true);
        OsmElements {
            reader,
            buf: Vec::new(),
            state: ParserState::Top,
            other_elements: BTreeMap::new(),
            done: false,
        }
    }

    /// Counts of the elements that were skipped so far, by element name.
    pub fn other_elements(&self) -> &BTreeMap<String, usize> {
        &self.other_elements
    }

    fn read_attributes(el: &BytesStart, element: &mut RawElement) -> Result<()> {
        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            let key = str::from_utf8(attribute.key.as_ref())?.to_string();
            let value = attribute.unescape_value()?.into_owned();
            element.attributes.push((key, value));
        }
        Ok(())
    }

    fn attribute_value(el: &BytesStart, key: &[u8]) -> Result<Option<String>> {
        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            if attribute.key.as_ref() == key {
                return Ok(Some(attribute.unescape_value()?.into_owned()));
            }
        }
        Ok(None)
    }

    fn count_other(&mut self, name: &[u8]) -> Result<()> {
        let name = str::from_utf8(name)?;
        *self.other_elements.entry(name.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn read_child(el: &BytesStart, element: &mut RawElement) -> Result<()> {
        match el.name().as_ref() {
            b"tag" => {
                let key = Self::attribute_value(el, b"k")?.unwrap_or_default();
                let value = Self::attribute_value(el, b"v")?.unwrap_or_default();
                element.tags.push(Tag::new(key, value));
            },
            b"nd" => {
                if let Some(id) = Self::attribute_value(el, b"ref")? {
                    element.node_refs.push(id);
                }
            },
            name => element.other_children.push(str::from_utf8(name)?.to_string()),
        }
        Ok(())
    }

    /// Handles a start tag. `closed` is set for empty elements (`<node ... />`).
    fn on_start(&mut self, el: &BytesStart, closed: bool) -> Result<Option<RawElement>> {
        if let ParserState::Element(element) = &mut self.state {
            Self::read_child(el, element)?;
            return Ok(None);
        }
        match ElementKind::from_name(el.name().as_ref()) {
            Some(kind) => {
                let mut element = RawElement::new(kind);
                Self::read_attributes(el, &mut element)?;
                if closed {
                    return Ok(Some(element));
                }
                self.state = ParserState::Element(element);
            },
            None => self.count_other(el.name().as_ref())?,
        }
        Ok(None)
    }

    fn on_end(&mut self, name: &[u8]) -> Option<RawElement> {
        let closes_element = matches!(
            &self.state,
            ParserState::Element(element) if ElementKind::from_name(name) == Some(element.kind)
        );
        if !closes_element {
            return None;
        }
        match std::mem::replace(&mut self.state, ParserState::Top) {
            ParserState::Element(element) => Some(element),
            ParserState::Top => None,
        }
    }

    fn next_element(&mut self) -> Result<Option<RawElement>> {
        loop {
            self.buf.clear();
            let event = self.reader.read_event_into(&mut self.buf)?.into_owned();
            let finished = match event {
                Event::Eof => return match &self.state {
                    ParserState::Top => Ok(None),
                    ParserState::Element(element) => Err(Error::new(
                        ErrorKind::Xml,
                        format!("unexpected end of file inside <{}>", element.kind.as_str()),
                    )),
                },
                Event::Start(e) => self.on_start(&e, false)?,
                Event::Empty(e) => self.on_start(&e, true)?,
                Event::End(e) => self.on_end(e.name().as_ref()),
                // Declarations, comments and text of <note> elements carry no map data.
                _ => None,
            };
            if finished.is_some() {
                return Ok(finished);
            }
        }
    }
}

impl<R: BufRead> Iterator for OsmElements<R> {
    type Item = Result<RawElement>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.done = true;
                None
            },
            Err(err) => {
                self.done = true;
                Some(Err(err))
            },
        }
    }
}
