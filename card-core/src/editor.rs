//! Editor state: one template, its selection and the interaction mode.
//!
//! Every mutation is a synchronous state transition. Failed operations leave
//! the template untouched.

use serde::{Deserialize, Serialize};

use crate::binding::Record;
use crate::element::{Element, ElementKind, ShapeType};
use crate::mask::{ShapeAsset, ShapeCatalog};
use crate::scene::{compose_record, CompositionOptions, Scene};
use crate::template::{Background, Template};
use crate::transform::{apply_transform, sync_derived, NodeTransform};
use crate::{CardError, CardResult};

/// Whether the template may be changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    /// Full editing with selection decoration.
    #[default]
    Edit,
    /// Read-only preview.
    View,
}

/// Interactive editing session over a single template.
#[derive(Debug, Clone)]
pub struct Editor {
    template: Template,
    selected: Option<usize>,
    mode: EditorMode,
    dirty: bool,
}

impl Editor {
    /// Open a template for editing.
    #[must_use]
    pub fn open(template: Template) -> Self {
        Self::with_mode(template, EditorMode::Edit)
    }

    /// Open a template read-only.
    #[must_use]
    pub fn view(template: Template) -> Self {
        Self::with_mode(template, EditorMode::View)
    }

    /// Open a template in the given mode.
    #[must_use]
    pub fn with_mode(mut template: Template, mode: EditorMode) -> Self {
        template.normalize();
        Self {
            template,
            selected: None,
            mode,
            dirty: false,
        }
    }

    /// The template being edited.
    #[must_use]
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    /// Index of the selected element.
    #[must_use]
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// The selected element.
    #[must_use]
    pub fn selected_element(&self) -> Option<&Element> {
        self.selected.and_then(|i| self.template.elements.get(i))
    }

    /// Whether there are changes since the last save.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn ensure_editable(&self) -> CardResult<()> {
        match self.mode {
            EditorMode::Edit => Ok(()),
            EditorMode::View => Err(CardError::ReadOnly),
        }
    }

    fn element_mut(&mut self, index: usize) -> CardResult<&mut Element> {
        self.template
            .elements
            .get_mut(index)
            .ok_or(CardError::ElementNotFound(index))
    }

    /// Append an element on top and select it.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::ReadOnly`] in view mode.
    pub fn add(&mut self, mut element: Element) -> CardResult<usize> {
        self.ensure_editable()?;
        sync_derived(&mut element);
        tracing::debug!(kind = element.kind_name(), "Adding element");
        self.template.elements.push(element);
        let index = self.template.elements.len() - 1;
        self.selected = Some(index);
        self.dirty = true;
        Ok(index)
    }

    /// Add a custom element built from an uploaded shape.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::ReadOnly`] in view mode.
    pub fn add_shape(&mut self, shape: &ShapeAsset) -> CardResult<usize> {
        self.add(Element::custom(
            shape.points.clone(),
            shape.url.clone(),
            Some(shape.id.clone()),
        ))
    }

    /// Select an element, or clear the selection with `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::ElementNotFound`] for an unknown index.
    pub fn select(&mut self, index: Option<usize>) -> CardResult<()> {
        if let Some(i) = index {
            if i >= self.template.elements.len() {
                return Err(CardError::ElementNotFound(i));
            }
        }
        self.selected = index;
        Ok(())
    }

    /// Topmost element under a canvas point, honouring rotation.
    #[must_use]
    pub fn hit_test(&self, x: f64, y: f64) -> Option<usize> {
        self.template
            .elements
            .iter()
            .rposition(|element| element.contains_point(x, y))
    }

    /// Select the topmost element under a canvas point.
    ///
    /// Clicking empty canvas clears the selection. View mode never selects.
    pub fn select_at(&mut self, x: f64, y: f64) -> Option<usize> {
        self.selected = match self.mode {
            EditorMode::Edit => self.hit_test(x, y),
            EditorMode::View => None,
        };
        self.selected
    }

    /// Finish a drag: move the element's origin.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::ReadOnly`] in view mode,
    /// [`CardError::ElementNotFound`] for an unknown index and
    /// [`CardError::InvalidTransform`] for a locked element or a non-finite
    /// position.
    pub fn drag_end(&mut self, index: usize, x: f64, y: f64) -> CardResult<()> {
        self.ensure_editable()?;
        if !(x.is_finite() && y.is_finite()) {
            return Err(CardError::InvalidTransform(format!(
                "position ({x}, {y}) is not finite"
            )));
        }
        let element = self.element_mut(index)?;
        if !element.draggable {
            return Err(CardError::InvalidTransform(
                "element is not draggable".to_string(),
            ));
        }
        element.x = x;
        element.y = y;
        self.dirty = true;
        Ok(())
    }

    /// Finish a resize/rotate gesture.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::ReadOnly`] in view mode,
    /// [`CardError::ElementNotFound`] for an unknown index and
    /// [`CardError::InvalidTransform`] for a degenerate node transform.
    pub fn transform_end(&mut self, index: usize, node: &mut NodeTransform) -> CardResult<()> {
        self.ensure_editable()?;
        apply_transform(self.element_mut(index)?, node)?;
        self.dirty = true;
        Ok(())
    }

    /// Edit an element's properties, then recompute its derived fields.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::ReadOnly`] in view mode and
    /// [`CardError::ElementNotFound`] for an unknown index.
    pub fn update<F>(&mut self, index: usize, edit: F) -> CardResult<()>
    where
        F: FnOnce(&mut Element),
    {
        self.ensure_editable()?;
        let element = self.element_mut(index)?;
        edit(element);
        sync_derived(element);
        self.dirty = true;
        Ok(())
    }

    /// Choose the mask shape of an image element.
    ///
    /// Custom shapes snapshot the catalog entry's vertices and mask image
    /// onto the element so it still renders without the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::ReadOnly`] in view mode,
    /// [`CardError::ElementNotFound`] for an unknown index and
    /// [`CardError::Validation`] if the element is not an image or the custom
    /// shape is not in the catalog.
    pub fn set_image_shape(
        &mut self,
        index: usize,
        shape: Option<ShapeType>,
        catalog: &ShapeCatalog,
    ) -> CardResult<()> {
        self.ensure_editable()?;
        let snapshot = match &shape {
            Some(ShapeType::Custom(id)) => {
                let asset = catalog
                    .get(id)
                    .ok_or_else(|| CardError::Validation(format!("Unknown shape {id}")))?;
                (Some(asset.points.clone()), asset.url.clone())
            }
            _ => (None, None),
        };
        let element = self.element_mut(index)?;
        let ElementKind::Image(attrs) = &mut element.kind else {
            return Err(CardError::Validation(
                "Only image elements can be masked".to_string(),
            ));
        };
        attrs.shape_type = shape;
        (attrs.shape_points, attrs.shape_image) = snapshot;
        self.dirty = true;
        Ok(())
    }

    /// Delete an element.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::ReadOnly`] in view mode and
    /// [`CardError::ElementNotFound`] for an unknown index.
    pub fn remove(&mut self, index: usize) -> CardResult<Element> {
        self.ensure_editable()?;
        if index >= self.template.elements.len() {
            return Err(CardError::ElementNotFound(index));
        }
        let removed = self.template.elements.remove(index);
        self.selected = match self.selected {
            Some(s) if s == index => None,
            Some(s) if s > index => Some(s - 1),
            other => other,
        };
        self.dirty = true;
        Ok(removed)
    }

    /// Change the template name.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::ReadOnly`] in view mode.
    pub fn rename(&mut self, name: impl Into<String>) -> CardResult<()> {
        self.ensure_editable()?;
        self.template.name = name.into();
        self.dirty = true;
        Ok(())
    }

    /// Replace the background.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::ReadOnly`] in view mode.
    pub fn set_background(
        &mut self,
        color: impl Into<String>,
        image: Option<String>,
    ) -> CardResult<()> {
        self.ensure_editable()?;
        self.template.background = Background {
            color: color.into(),
            image: image.filter(|i| !i.trim().is_empty()),
        };
        self.dirty = true;
        Ok(())
    }

    /// Clear every element and the background.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::ReadOnly`] in view mode.
    pub fn reset(&mut self) -> CardResult<()> {
        self.ensure_editable()?;
        self.template.elements.clear();
        self.template.background = Background::default();
        self.selected = None;
        self.dirty = true;
        Ok(())
    }

    /// Validate and return the template for saving.
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] if the template has no name.
    pub fn save_payload(&self) -> CardResult<&Template> {
        self.template.validate_for_save()?;
        Ok(&self.template)
    }

    /// Validate and return a copy of the template for "save as new".
    ///
    /// # Errors
    ///
    /// Returns [`CardError::Validation`] if the template has no name.
    pub fn clone_payload(&self) -> CardResult<Template> {
        self.template.clone_as_copy()
    }

    /// Record a successful save under the storage id.
    pub fn mark_saved(&mut self, id: impl Into<String>) {
        self.template.id = Some(id.into());
        self.dirty = false;
    }

    /// Composition options for the current mode and selection.
    #[must_use]
    pub fn composition_options(&self) -> CompositionOptions {
        match self.mode {
            EditorMode::Edit => CompositionOptions::editor(self.selected),
            EditorMode::View => CompositionOptions::default(),
        }
    }

    /// Compose the preview scene for a record.
    #[must_use]
    pub fn preview(&self, record: &Record, catalog: Option<&ShapeCatalog>) -> Scene {
        compose_record(&self.template, record, catalog, &self.composition_options())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor_with_shapes() -> Editor {
        let template = Template::new("Card")
            .with_element(Element::rect().at(0.0, 0.0))
            .with_element(Element::circle().at(60.0, 30.0));
        Editor::open(template)
    }

    #[test]
    fn test_add_selects_new_element() {
        let mut editor = Editor::open(Template::new("Card"));
        let index = editor.add(Element::star()).expect("add");
        assert_eq!(index, 0);
        assert_eq!(editor.selected(), Some(0));
        assert!(editor.is_dirty());
    }

    #[test]
    fn test_hit_test_prefers_topmost() {
        let mut editor = editor_with_shapes();
        // (40, 20) lies in both the rect and the circle; the circle is on top.
        assert_eq!(editor.select_at(40.0, 20.0), Some(1));
        assert_eq!(editor.select_at(5.0, 45.0), Some(0));
        assert_eq!(editor.select_at(500.0, 500.0), None);
        assert_eq!(editor.selected(), None);
    }

    #[test]
    fn test_view_mode_rejects_mutation() {
        let mut editor = Editor::view(Template::new("Card").with_element(Element::rect()));
        assert!(matches!(editor.add(Element::text()), Err(CardError::ReadOnly)));
        assert!(matches!(editor.remove(0), Err(CardError::ReadOnly)));
        assert!(matches!(
            editor.drag_end(0, 1.0, 1.0),
            Err(CardError::ReadOnly)
        ));
        assert_eq!(editor.select_at(60.0, 60.0), None);
        assert!(!editor.composition_options().editable);
        assert!(!editor.is_dirty());
    }

    #[test]
    fn test_drag_end_moves_origin() {
        let mut editor = editor_with_shapes();
        editor.drag_end(1, 300.0, 200.0).expect("drag");
        let circle = &editor.template().elements[1];
        assert_eq!((circle.x, circle.y), (300.0, 200.0));
        assert!(matches!(
            editor.drag_end(7, 0.0, 0.0),
            Err(CardError::ElementNotFound(7))
        ));
    }

    #[test]
    fn test_locked_element_cannot_be_dragged() {
        let mut editor = editor_with_shapes();
        editor.update(0, |e| e.draggable = false).expect("lock");
        assert!(matches!(
            editor.drag_end(0, 10.0, 10.0),
            Err(CardError::InvalidTransform(_))
        ));
        assert_eq!(editor.template().elements[0].x, 0.0);
    }

    #[test]
    fn test_transform_end_resets_scale() {
        let mut editor = editor_with_shapes();
        let mut node = NodeTransform::of(&editor.template().elements[1]).scaled(2.0, 2.0);
        editor.transform_end(1, &mut node).expect("transform");
        assert_eq!(node.scale_x, 1.0);
        assert_eq!(editor.template().elements[1].size(), (200.0, 200.0));
    }

    #[test]
    fn test_update_recomputes_derived_fields() {
        let mut editor = editor_with_shapes();
        editor
            .update(1, |e| {
                if let ElementKind::Circle(c) = &mut e.kind {
                    c.radius = 30.0;
                }
            })
            .expect("update");
        assert_eq!(editor.template().elements[1].size(), (60.0, 60.0));
    }

    #[test]
    fn test_update_points_resizes_polygon_box() {
        let mut editor = Editor::open(Template::new("Card").with_element(Element::triangle()));
        editor
            .update(0, |e| {
                if let ElementKind::Triangle(t) = &mut e.kind {
                    t.points = vec![0.0, -150.0, 150.0, 150.0, -150.0, 150.0];
                }
            })
            .expect("update");
        let triangle = &editor.template().elements[0];
        assert_eq!(triangle.size(), (300.0, 300.0));
        let bounds = triangle.local_bounds();
        assert_eq!((bounds.width, bounds.height), triangle.size());
    }

    #[test]
    fn test_remove_adjusts_selection() {
        let mut editor = editor_with_shapes();
        editor.select(Some(1)).expect("select");
        editor.remove(0).expect("remove");
        assert_eq!(editor.selected(), Some(0));
        editor.remove(0).expect("remove");
        assert_eq!(editor.selected(), None);
        assert!(editor.template().elements.is_empty());
    }

    #[test]
    fn test_set_image_shape_snapshots_catalog_entry() {
        let mut editor = Editor::open(Template::new("Card"));
        let index = editor.add(Element::image("/a.png")).expect("add");
        let catalog: ShapeCatalog = [ShapeAsset {
            id: "s1".to_string(),
            name: "Shield".to_string(),
            url: Some("/uploads/shapes/shield.png".to_string()),
            points: vec![0.0, 0.0, 10.0, 0.0, 5.0, 10.0],
        }]
        .into_iter()
        .collect();
        editor
            .set_image_shape(index, Some(ShapeType::Custom("s1".to_string())), &catalog)
            .expect("shape");
        let ElementKind::Image(attrs) = &editor.template().elements[index].kind else {
            panic!("expected image");
        };
        assert_eq!(attrs.shape_points.as_ref().map(Vec::len), Some(6));
        assert_eq!(
            attrs.shape_image.as_deref(),
            Some("/uploads/shapes/shield.png")
        );

        editor
            .set_image_shape(index, Some(ShapeType::Circle), &catalog)
            .expect("circle");
        let ElementKind::Image(attrs) = &editor.template().elements[index].kind else {
            panic!("expected image");
        };
        assert!(attrs.shape_points.is_none());
        assert!(editor
            .set_image_shape(index, Some(ShapeType::Custom("nope".to_string())), &catalog)
            .is_err());
    }

    #[test]
    fn test_save_and_clone_payloads() {
        let mut editor = Editor::open(Template::new(""));
        assert!(matches!(
            editor.save_payload(),
            Err(CardError::Validation(_))
        ));
        editor.rename("ID Card").expect("rename");
        assert_eq!(editor.save_payload().expect("save").name, "ID Card");
        assert_eq!(editor.clone_payload().expect("clone").name, "ID Card (Copy)");
        editor.mark_saved("t1");
        assert!(!editor.template().is_draft());
        assert!(!editor.is_dirty());
    }

    #[test]
    fn test_reset_clears_canvas() {
        let mut editor = editor_with_shapes();
        editor
            .set_background("navy", Some("/bg.png".to_string()))
            .expect("background");
        editor.select(Some(0)).expect("select");
        editor.reset().expect("reset");
        assert!(editor.template().elements.is_empty());
        assert_eq!(editor.template().background, Background::default());
        assert_eq!(editor.selected(), None);
    }

    #[test]
    fn test_preview_decorates_selection() {
        let mut editor = editor_with_shapes();
        editor.select(Some(0)).expect("select");
        let scene = editor.preview(&Record::new(), None);
        assert_eq!(scene.decoration.map(|d| d.index), Some(0));
    }
}
