//! Templates: a named background plus an ordered element list.

use serde::{Deserialize, Serialize};

use crate::element::{Element, ElementKind};
use crate::transform::sync_derived;
use crate::{CardError, CardResult};

/// Canvas width the editor designs on.
pub const DEFAULT_CANVAS_WIDTH: f64 = 800.0;

/// Canvas height the editor designs on.
pub const DEFAULT_CANVAS_HEIGHT: f64 = 600.0;

fn white() -> String {
    "white".to_string()
}

/// Card background. The image, when present, paints over the color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Background {
    /// CSS color filling the whole canvas.
    #[serde(default = "white")]
    pub color: String,
    /// Image stretched over the whole canvas.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub image: Option<String>,
}

impl Default for Background {
    fn default() -> Self {
        Self {
            color: white(),
            image: None,
        }
    }
}

/// The editor stores "no background image" as an empty string.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// A card layout, independent of any record.
///
/// `elements` order is paint order: later entries paint on top.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Storage id; `None` marks an unsaved draft.
    #[serde(
        rename = "_id",
        alias = "id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Background color and image.
    #[serde(default)]
    pub background: Background,
    /// Elements in paint order.
    #[serde(default)]
    pub elements: Vec<Element>,
}

impl Template {
    /// Create an empty, unsaved template.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            background: Background::default(),
            elements: Vec::new(),
        }
    }

    /// Whether the template has never been saved.
    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.id.is_none()
    }

    /// Append an element on top of the paint order.
    #[must_use]
    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    /// Set the background.
    #[must_use]
    pub fn with_background(mut self, color: impl Into<String>, image: Option<String>) -> Self {
        self.background = Background {
            color: color.into(),
            image,
        };
        self
    }

    /// Repair partially specified elements and recompute derived sizes.
    ///
    /// A circle stored without a radius takes half its width; a star stored
    /// without radii takes half its width as the outer radius and half of
    /// that as the inner radius.
    pub fn normalize(&mut self) {
        for element in &mut self.elements {
            match &mut element.kind {
                ElementKind::Circle(c) if c.radius <= 0.0 && c.width > 0.0 => {
                    c.radius = c.width / 2.0;
                }
                ElementKind::Star(s) if s.outer_radius <= 0.0 && s.width > 0.0 => {
                    s.outer_radius = s.width / 2.0;
                    if s.inner_radius <= 0.0 {
                        s.inner_radius = s.outer_radius / 2.0;
                    }
                }
                _ => {}
            }
            sync_derived(element);
        }
    }

    /// Check the template can be persisted.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] if the name is blank.
    pub fn validate_for_save(&self) -> CardResult<()> {
        if self.name.trim().is_empty() {
            return Err(CardError::Validation(
                "Please enter a template name".to_string(),
            ));
        }
        Ok(())
    }

    /// Payload for saving a copy under a new name.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] if the name is blank.
    pub fn clone_as_copy(&self) -> CardResult<Self> {
        self.validate_for_save()?;
        Ok(Self {
            id: None,
            name: format!("{} (Copy)", self.name),
            background: self.background.clone(),
            elements: self.elements.clone(),
        })
    }

    /// Serialize the template to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CardResult<String> {
        serde_json::to_string(self).map_err(CardError::Serialization)
    }

    /// Deserialize and normalize a template from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_json(json: &str) -> CardResult<Self> {
        let mut template: Self = serde_json::from_str(json)?;
        template.normalize();
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;

    #[test]
    fn test_storage_payload_shape() {
        let json = r##"{
            "_id": "65a1",
            "__v": 0,
            "name": "Student Card",
            "background": { "color": "#fff", "image": "" },
            "elements": [
                { "type": "text", "x": 10, "y": 20, "text": "Sample Text", "dataField": "name" },
                { "type": "circle", "x": 200, "y": 200, "width": 80 }
            ]
        }"##;
        let template = Template::from_json(json).expect("parse");
        assert_eq!(template.id.as_deref(), Some("65a1"));
        assert!(!template.is_draft());
        assert!(template.background.image.is_none());
        assert_eq!(template.elements.len(), 2);

        let ElementKind::Circle(circle) = &template.elements[1].kind else {
            panic!("expected circle");
        };
        assert_eq!(circle.radius, 40.0);
        assert_eq!(circle.height, 80.0);
    }

    #[test]
    fn test_star_repair_from_width() {
        let mut template = Template::new("t")
            .with_element(serde_json::from_str(r#"{"type":"star","width":60}"#).unwrap());
        template.normalize();
        let ElementKind::Star(star) = &template.elements[0].kind else {
            panic!("expected star");
        };
        assert_eq!(star.outer_radius, 30.0);
        assert_eq!(star.inner_radius, 15.0);
        assert_eq!(star.num_points, 5);
    }

    #[test]
    fn test_save_requires_name() {
        let template = Template::new("  ").with_element(Element::rect());
        assert!(matches!(
            template.validate_for_save(),
            Err(CardError::Validation(_))
        ));
        assert!(template.clone_as_copy().is_err());
    }

    #[test]
    fn test_clone_as_copy() {
        let mut template = Template::new("Staff").with_element(Element::circle());
        template.id = Some("abc".to_string());
        let copy = template.clone_as_copy().expect("copy");
        assert_eq!(copy.name, "Staff (Copy)");
        assert!(copy.is_draft());
        assert_eq!(copy.elements, template.elements);
    }

    #[test]
    fn test_draft_serializes_without_id() {
        let json = Template::new("Draft").to_json().expect("json");
        assert!(!json.contains("_id"));
    }
}
