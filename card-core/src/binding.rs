//! Data binding: substituting record values into bound elements.
//!
//! Resolution is a pure function of `(template, record)`. Nothing is cached,
//! so rendering the same template for many records re-resolves every time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::element::{Element, ElementKind, ImageAttrs, TextAttrs};
use crate::template::Template;

/// Record field that replaces an image element's source.
pub const PHOTO_FIELD: &str = "photo";

/// One data row (e.g. a student), keyed by field name.
///
/// Storage metadata such as `_id` rides along and is simply never bound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Raw value of a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Display value of a field, if it is defined and non-empty.
    ///
    /// Strings are used as-is, numbers and booleans are formatted. `null`,
    /// empty strings, arrays and objects count as undefined.
    #[must_use]
    pub fn display_value(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Storage id, if the record carries one.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0
            .get("_id")
            .or_else(|| self.0.get("id"))
            .and_then(Value::as_str)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Text shown by a text element for a record.
///
/// The bound field's value wins when defined and non-empty; otherwise the
/// element's literal text.
#[must_use]
pub fn effective_text(attrs: &TextAttrs, record: &Record) -> String {
    attrs
        .data_field
        .as_deref()
        .and_then(|field| record.display_value(field))
        .unwrap_or_else(|| attrs.text.clone())
}

/// Image source shown by an image element for a record.
///
/// Only a `photo` binding replaces the static source, and only when the
/// record has a photo.
#[must_use]
pub fn effective_image(attrs: &ImageAttrs, record: &Record) -> Option<String> {
    if attrs.data_field.as_deref() == Some(PHOTO_FIELD) {
        if let Some(photo) = record.display_value(PHOTO_FIELD) {
            return Some(photo);
        }
    }
    attrs.image.clone().filter(|src| !src.is_empty())
}

/// The concrete content an element displays for one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Resolved text.
    Text(String),
    /// Resolved image source; `None` when there is nothing to draw.
    Image(Option<String>),
    /// Shapes carry no record-dependent content.
    Shape,
}

/// An element together with its resolved content.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundElement<'a> {
    /// Index in the template's paint order.
    pub index: usize,
    /// The template element.
    pub element: &'a Element,
    /// Resolved content.
    pub content: Content,
}

/// A template with every element's content resolved against one record.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundTemplate<'a> {
    /// The template.
    pub template: &'a Template,
    /// Elements in paint order.
    pub elements: Vec<BoundElement<'a>>,
}

/// Resolve every element of `template` against `record`.
#[must_use]
pub fn bind<'a>(template: &'a Template, record: &Record) -> BoundTemplate<'a> {
    let elements = template
        .elements
        .iter()
        .enumerate()
        .map(|(index, element)| BoundElement {
            index,
            element,
            content: resolve(element, record),
        })
        .collect();
    BoundTemplate { template, elements }
}

fn resolve(element: &Element, record: &Record) -> Content {
    match &element.kind {
        ElementKind::Text(attrs) => Content::Text(effective_text(attrs, record)),
        ElementKind::Image(attrs) => Content::Image(effective_image(attrs, record)),
        ElementKind::Rect(_)
        | ElementKind::Circle(_)
        | ElementKind::Star(_)
        | ElementKind::Triangle(_)
        | ElementKind::Pentagon(_)
        | ElementKind::Hexagon(_)
        | ElementKind::Custom(_) => Content::Shape,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_attrs(element: &Element) -> &TextAttrs {
        match &element.kind {
            ElementKind::Text(attrs) => attrs,
            _ => panic!("expected text"),
        }
    }

    fn image_attrs(element: &mut Element) -> &mut ImageAttrs {
        match &mut element.kind {
            ElementKind::Image(attrs) => attrs,
            _ => panic!("expected image"),
        }
    }

    #[test]
    fn test_bound_text_uses_record_value() {
        let element = Element::text();
        let record = Record::new().with("name", "Ada Lovelace");
        assert_eq!(effective_text(text_attrs(&element), &record), "Ada Lovelace");
    }

    #[test]
    fn test_missing_field_falls_back_to_literal() {
        let element = Element::text();
        assert_eq!(
            effective_text(text_attrs(&element), &Record::new()),
            "Sample Text"
        );
        let blank = Record::new().with("name", "");
        assert_eq!(effective_text(text_attrs(&element), &blank), "Sample Text");
        let null = Record::new().with("name", Value::Null);
        assert_eq!(effective_text(text_attrs(&element), &null), "Sample Text");
    }

    #[test]
    fn test_numeric_values_are_formatted() {
        let mut element = Element::text();
        if let ElementKind::Text(attrs) = &mut element.kind {
            attrs.data_field = Some("studentId".to_string());
        }
        let record = Record::new().with("studentId", 0);
        assert_eq!(effective_text(text_attrs(&element), &record), "0");
    }

    #[test]
    fn test_unbound_text_ignores_record() {
        let mut element = Element::text();
        if let ElementKind::Text(attrs) = &mut element.kind {
            attrs.data_field = None;
            attrs.text = "SCHOOL".to_string();
        }
        let record = Record::new().with("name", "Ada");
        assert_eq!(effective_text(text_attrs(&element), &record), "SCHOOL");
    }

    #[test]
    fn test_photo_binding() {
        let mut element = Element::image("/uploads/images/placeholder.png");
        image_attrs(&mut element).data_field = Some(PHOTO_FIELD.to_string());
        let record = Record::new().with("photo", "/uploads/images/ada.jpg");
        assert_eq!(
            effective_image(image_attrs(&mut element), &record).as_deref(),
            Some("/uploads/images/ada.jpg")
        );
        assert_eq!(
            effective_image(image_attrs(&mut element), &Record::new()).as_deref(),
            Some("/uploads/images/placeholder.png")
        );
    }

    #[test]
    fn test_other_image_bindings_keep_static_source() {
        let mut element = Element::image("/logo.png");
        image_attrs(&mut element).data_field = Some("name".to_string());
        let record = Record::new().with("name", "/elsewhere.png");
        assert_eq!(
            effective_image(image_attrs(&mut element), &record).as_deref(),
            Some("/logo.png")
        );
    }

    #[test]
    fn test_bind_preserves_paint_order() {
        let template = Template::new("t")
            .with_element(Element::rect())
            .with_element(Element::text())
            .with_element(Element::image("a.png"));
        let record = Record::new().with("name", "Grace");
        let bound = bind(&template, &record);
        assert_eq!(bound.elements.len(), 3);
        assert_eq!(bound.elements[0].content, Content::Shape);
        assert_eq!(bound.elements[1].content, Content::Text("Grace".to_string()));
        assert_eq!(bound.elements[1].index, 1);
        assert_eq!(
            bound.elements[2].content,
            Content::Image(Some("a.png".to_string()))
        );
    }

    #[test]
    fn test_record_deserializes_from_storage_row() {
        let record: Record = serde_json::from_str(
            r#"{"_id":"s1","name":"Ada","class":"10A","dob":"1815-12-10","__v":0}"#,
        )
        .expect("parse");
        assert_eq!(record.id(), Some("s1"));
        assert_eq!(record.display_value("class").as_deref(), Some("10A"));
        assert_eq!(record.len(), 5);
    }
}
