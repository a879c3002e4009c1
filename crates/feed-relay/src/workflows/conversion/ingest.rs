use std::collections::HashSet;

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::domain::RawListing;

/// Namespace of the source realty feed. Elements are matched by local name,
/// so documents with or without the prefix are read the same way.
pub const SOURCE_NAMESPACE: &str = "http://webmaster.yandex.ru/schemas/feed/realty/2010-06";

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("feed is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("malformed feed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("malformed attribute in feed: {0}")]
    Attribute(#[from] AttrError),
    #[error("feed has no root element")]
    MissingRoot,
    #[error("feed ends with {0} unclosed element(s)")]
    Unclosed(usize),
    #[error("feed has content after its root element")]
    TrailingContent,
}

/// Reads every `offer` of the document, in feed order. Any syntax error
/// rejects the whole document.
pub fn parse_listings(bytes: &[u8]) -> Result<Vec<RawListing>, ParseError> {
    let text = std::str::from_utf8(bytes)?;
    let mut reader = Reader::from_str(text);
    let mut frames: Vec<Frame> = Vec::new();
    let mut offer: Option<OfferCapture> = None;
    let mut listings = Vec::new();
    let mut saw_root = false;
    let mut root_closed = false;

    loop {
        let event = reader.read_event()?;
        if root_closed && is_markup_or_text(&event) {
            return Err(ParseError::TrailingContent);
        }

        match event {
            Event::Start(start) => {
                saw_root = true;
                let name = local_name(&start);
                if let Some(parent) = frames.last_mut() {
                    parent.has_child = true;
                }
                if offer.is_none() && name == "offer" {
                    offer = Some(OfferCapture::open(&start, frames.len())?);
                }
                frames.push(Frame::new(name));
            }
            Event::Empty(start) => {
                saw_root = true;
                let name = local_name(&start);
                if let Some(parent) = frames.last_mut() {
                    parent.has_child = true;
                }
                match offer.as_mut() {
                    Some(capture) => capture.close(&Frame::new(name), &frames),
                    None if name == "offer" => {
                        listings.push(OfferCapture::open(&start, frames.len())?.raw);
                    }
                    None => {}
                }
                root_closed = frames.is_empty();
            }
            Event::Text(content) => {
                if let Some(frame) = frames.last_mut().filter(|frame| !frame.has_child) {
                    frame.text.push_str(&content.unescape()?);
                }
            }
            Event::CData(content) => {
                if let Some(frame) = frames.last_mut().filter(|frame| !frame.has_child) {
                    frame
                        .text
                        .push_str(&String::from_utf8_lossy(&content.into_inner()));
                }
            }
            Event::End(_) => {
                let Some(frame) = frames.pop() else {
                    continue;
                };
                root_closed = frames.is_empty();
                let closes_offer = offer
                    .as_ref()
                    .is_some_and(|capture| frames.len() == capture.depth);
                if closes_offer {
                    if let Some(done) = offer.take() {
                        listings.push(done.raw);
                    }
                } else if let Some(capture) = offer.as_mut() {
                    capture.close(&frame, &frames);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(ParseError::MissingRoot);
    }
    if !frames.is_empty() {
        return Err(ParseError::Unclosed(frames.len()));
    }

    Ok(listings)
}

/// Events that may not follow the root element. Comments, processing
/// instructions and whitespace are still allowed there.
fn is_markup_or_text(event: &Event<'_>) -> bool {
    match event {
        Event::Start(_) | Event::Empty(_) | Event::End(_) | Event::CData(_) => true,
        Event::Text(text) => !text.iter().all(u8::is_ascii_whitespace),
        _ => false,
    }
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

#[derive(Debug)]
struct Frame {
    name: String,
    text: String,
    has_child: bool,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            text: String::new(),
            has_child: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Phone,
    Description,
    Price,
    Area,
    Floor,
    FloorsTotal,
    Rooms,
    NewFlat,
    BuildingName,
    DevelopmentName,
    District,
}

/// Collects one offer's fields while its subtree is being read.
struct OfferCapture {
    raw: RawListing,
    depth: usize,
    claimed: HashSet<Field>,
}

impl OfferCapture {
    fn open(start: &BytesStart<'_>, depth: usize) -> Result<Self, ParseError> {
        let mut raw = RawListing::default();
        for attribute in start.attributes() {
            let attribute = attribute?;
            let value = non_empty(attribute.unescape_value()?.into_owned());
            match attribute.key.local_name().as_ref() {
                b"internal-id" => raw.internal_id = value,
                b"id" => raw.id = value,
                _ => {}
            }
        }

        Ok(Self {
            raw,
            depth,
            claimed: HashSet::new(),
        })
    }

    /// `ancestors` is the open-element stack without `frame` itself.
    fn close(&mut self, frame: &Frame, ancestors: &[Frame]) {
        let parent = ancestors.last().map(|parent| parent.name.as_str());
        let field = match (frame.name.as_str(), parent) {
            ("image", _) => {
                self.raw.images.push(frame.text.clone());
                return;
            }
            ("value", Some("price")) => Field::Price,
            ("value", Some("area")) => Field::Area,
            ("phone", _) => Field::Phone,
            ("description", _) => Field::Description,
            ("floor", _) => Field::Floor,
            ("floors-total", _) => Field::FloorsTotal,
            ("rooms", _) => Field::Rooms,
            ("new-flat", _) => Field::NewFlat,
            ("building-name", _) => Field::BuildingName,
            ("new-development-name", _) => Field::DevelopmentName,
            ("district", _) if self.within_location(ancestors) => Field::District,
            _ => return,
        };

        // The first matching element decides, even when it carries no text.
        if self.claimed.insert(field) {
            *self.slot(field) = non_empty(frame.text.clone());
        }
    }

    fn within_location(&self, ancestors: &[Frame]) -> bool {
        ancestors
            .iter()
            .skip(self.depth + 1)
            .any(|frame| frame.name == "location")
    }

    fn slot(&mut self, field: Field) -> &mut Option<String> {
        let raw = &mut self.raw;
        match field {
            Field::Phone => &mut raw.phone,
            Field::Description => &mut raw.description,
            Field::Price => &mut raw.price,
            Field::Area => &mut raw.area,
            Field::Floor => &mut raw.floor,
            Field::FloorsTotal => &mut raw.floors_total,
            Field::Rooms => &mut raw.rooms,
            Field::NewFlat => &mut raw.new_flat,
            Field::BuildingName => &mut raw.building_name,
            Field::DevelopmentName => &mut raw.development_name,
            Field::District => &mut raw.district,
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    Some(value).filter(|value| !value.is_empty())
}
