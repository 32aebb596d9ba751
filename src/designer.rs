//! Visual field placement over the page renderer. The designer owns a
//! working copy of the template's field list; nothing is persisted
//! until `save` hands the full list to the registry, and dropping the
//! designer without saving discards every local edit.

use crate::error::Error;
use crate::geometry::Point;
use crate::models::{FieldId, FieldPatch, FieldType, TemplateField};
use crate::registry::FieldRegistry;
use crate::render::PageRenderer;
use crate::Config;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DesignerMode {
    Idle,
    Placing(FieldType),
    Editing(FieldId),
}

struct DragState {
    field_id: FieldId,
    pointer_start: Point,
    field_origin: Point,
}

pub struct FieldDesigner {
    template_id: uuid::Uuid,
    mode: DesignerMode,
    fields: Vec<TemplateField>,
    drag: Option<DragState>,
    next_draft: u64,
    config: Config,
}

impl FieldDesigner {
    /// Start a design session over the registry's current field list.
    pub fn open(registry: &FieldRegistry, config: Config) -> Self {
        Self {
            template_id: registry.template_id(),
            mode: DesignerMode::Idle,
            fields: registry.fields().to_vec(),
            drag: None,
            next_draft: chrono::Utc::now().timestamp_millis() as u64,
            config,
        }
    }

    pub fn mode(&self) -> DesignerMode {
        self.mode
    }

    pub fn fields(&self) -> &[TemplateField] {
        &self.fields
    }

    pub fn selected(&self) -> Option<&TemplateField> {
        match self.mode {
            DesignerMode::Editing(id) => self.fields.iter().find(|f| f.id == id),
            _ => None,
        }
    }

    /// Arm placement: the next page click drops a new field of `field_type`.
    pub fn start_placing(&mut self, field_type: FieldType) {
        self.mode = DesignerMode::Placing(field_type);
        self.drag = None;
    }

    pub fn cancel(&mut self) {
        self.mode = DesignerMode::Idle;
        self.drag = None;
    }

    /// A click on the rendered page. While placing, appends a new field
    /// at the converted point; while idle, hit-tests existing fields on
    /// the current page and selects the hit.
    pub fn handle_click(
        &mut self,
        renderer: &PageRenderer,
        screen: Point,
        page_origin: Point,
    ) -> Option<FieldId> {
        let doc_point = renderer.click(screen, page_origin)?;

        match self.mode {
            DesignerMode::Placing(field_type) => {
                let (width, height) = match field_type {
                    FieldType::Signature => self.config.default_signature_size,
                    FieldType::Checkbox => self.config.default_checkbox_size,
                    FieldType::Text | FieldType::Date => self.config.default_field_size,
                };
                let id = FieldId::Draft(self.next_draft);
                self.next_draft += 1;
                let n = self
                    .fields
                    .iter()
                    .filter(|f| f.field_type == field_type)
                    .count()
                    + 1;
                self.fields.push(TemplateField {
                    id,
                    template_id: self.template_id,
                    name: format!("{}_{}", field_type.to_string(), n),
                    field_type,
                    page: renderer.page(),
                    x: doc_point.x,
                    y: doc_point.y,
                    width,
                    height,
                    required: false,
                    placeholder: None,
                });
                debug!("placed {} at ({}, {})", id, doc_point.x, doc_point.y);
                self.mode = DesignerMode::Editing(id);
                Some(id)
            }
            DesignerMode::Idle | DesignerMode::Editing(_) => {
                let page = renderer.page();
                let hit = self
                    .fields
                    .iter()
                    .rev()
                    .find(|f| {
                        f.page == page
                            && doc_point.x >= f.x
                            && doc_point.x <= f.x + f.width
                            && doc_point.y >= f.y
                            && doc_point.y <= f.y + f.height
                    })
                    .map(|f| f.id);
                self.mode = match hit {
                    Some(id) => DesignerMode::Editing(id),
                    None => DesignerMode::Idle,
                };
                self.drag = None;
                hit
            }
        }
    }

    /// Apply property edits to the selected field.
    pub fn edit_selected(&mut self, patch: FieldPatch) -> Option<&TemplateField> {
        let id = match self.mode {
            DesignerMode::Editing(id) => id,
            _ => return None,
        };
        let field = self.fields.iter_mut().find(|f| f.id == id)?;
        if let Some(name) = patch.name {
            field.name = name;
        }
        if let Some(field_type) = patch.field_type {
            field.field_type = field_type;
        }
        if let Some(width) = patch.width {
            field.width = width.max(1.0);
        }
        if let Some(height) = patch.height {
            field.height = height.max(1.0);
        }
        if let Some(required) = patch.required {
            field.required = required;
        }
        if let Some(placeholder) = patch.placeholder {
            field.placeholder = placeholder;
        }
        Some(field)
    }

    pub fn delete_selected(&mut self) -> Option<TemplateField> {
        let id = match self.mode {
            DesignerMode::Editing(id) => id,
            _ => return None,
        };
        let idx = self.fields.iter().position(|f| f.id == id)?;
        self.mode = DesignerMode::Idle;
        self.drag = None;
        Some(self.fields.remove(idx))
    }

    /// Start dragging the selected field from `screen`.
    pub fn begin_drag(&mut self, screen: Point) -> bool {
        let id = match self.mode {
            DesignerMode::Editing(id) => id,
            _ => return false,
        };
        let field = match self.fields.iter().find(|f| f.id == id) {
            Some(f) => f,
            None => return false,
        };
        self.drag = Some(DragState {
            field_id: id,
            pointer_start: screen,
            field_origin: Point::new(field.x, field.y),
        });
        true
    }

    /// Move the dragged field by the pointer delta since `begin_drag`,
    /// un-scaled. Using the delta rather than the absolute pointer
    /// position avoids the jump on drag start.
    pub fn drag_to(&mut self, screen: Point, scale: f64) -> Option<&TemplateField> {
        let drag = self.drag.as_ref()?;
        let dx = (screen.x - drag.pointer_start.x) / scale;
        let dy = (screen.y - drag.pointer_start.y) / scale;
        let (id, origin) = (drag.field_id, drag.field_origin);
        let field = self.fields.iter_mut().find(|f| f.id == id)?;
        field.x = (origin.x + dx).max(0.0);
        field.y = (origin.y + dy).max(0.0);
        Some(field)
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// Persist the full working list. On success the working copy picks
    /// up the server-assigned ids.
    pub async fn save(&mut self, registry: &mut FieldRegistry) -> Result<(), Error> {
        registry.replace_all(self.fields.clone()).await?;
        self.fields = registry.fields().to_vec();
        if let DesignerMode::Editing(_) = self.mode {
            self.mode = DesignerMode::Idle;
        }
        self.drag = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::test_support::blank_pdf;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    fn setup() -> (FieldRegistry, FieldDesigner, PageRenderer) {
        let registry = FieldRegistry::new(uuid::Uuid::new_v4(), Arc::new(MemoryStore::new()));
        let designer = FieldDesigner::open(&registry, Config::default());
        let mut renderer = PageRenderer::new(&Config::default());
        renderer.load(&blank_pdf(3)).unwrap();
        (registry, designer, renderer)
    }

    #[test]
    fn placing_stores_unscaled_coordinates() {
        let (_, mut designer, mut renderer) = setup();
        renderer.next_page();
        renderer.set_scale(1.5);
        designer.start_placing(FieldType::Signature);

        let id = designer
            .handle_click(&renderer, Point::new(120.0, 80.0), ORIGIN)
            .unwrap();
        let field = designer.fields().iter().find(|f| f.id == id).unwrap();
        assert_eq!(field.page, 2);
        assert!((field.x - 120.0 / 1.5).abs() < 1e-9);
        assert!((field.y - 80.0 / 1.5).abs() < 1e-9);
        assert_eq!(
            (field.width, field.height),
            Config::default().default_signature_size
        );
        assert_eq!(designer.mode(), DesignerMode::Editing(id));
    }

    #[test]
    fn placement_waits_for_page_load() {
        let (registry, _, _) = setup();
        let mut designer = FieldDesigner::open(&registry, Config::default());
        let renderer = PageRenderer::new(&Config::default());
        designer.start_placing(FieldType::Text);
        assert!(designer
            .handle_click(&renderer, Point::new(10.0, 10.0), ORIGIN)
            .is_none());
        assert!(designer.fields().is_empty());
    }

    #[test]
    fn idle_click_selects_hit_field_only() {
        let (_, mut designer, renderer) = setup();
        designer.start_placing(FieldType::Text);
        let id = designer
            .handle_click(&renderer, Point::new(100.0, 100.0), ORIGIN)
            .unwrap();
        designer.cancel();

        assert_eq!(
            designer.handle_click(&renderer, Point::new(110.0, 110.0), ORIGIN),
            Some(id)
        );
        assert_eq!(designer.mode(), DesignerMode::Editing(id));

        assert_eq!(
            designer.handle_click(&renderer, Point::new(500.0, 500.0), ORIGIN),
            None
        );
        assert_eq!(designer.mode(), DesignerMode::Idle);
    }

    #[test]
    fn drag_applies_unscaled_pointer_delta() {
        let (_, mut designer, mut renderer) = setup();
        designer.start_placing(FieldType::Text);
        let id = designer
            .handle_click(&renderer, Point::new(100.0, 100.0), ORIGIN)
            .unwrap();
        renderer.set_scale(2.0);

        assert!(designer.begin_drag(Point::new(300.0, 300.0)));
        let moved = designer
            .drag_to(Point::new(320.0, 260.0), renderer.scale())
            .unwrap();
        assert!((moved.x - 110.0).abs() < 1e-9);
        assert!((moved.y - 80.0).abs() < 1e-9);

        // Dragging past the page edge clamps at zero.
        let moved = designer
            .drag_to(Point::new(0.0, 0.0), renderer.scale())
            .unwrap();
        assert_eq!(moved.x, 0.0);
        assert_eq!(moved.y, 0.0);
        assert_eq!(designer.fields().iter().find(|f| f.id == id).unwrap().x, 0.0);
        designer.end_drag();
    }

    #[tokio::test]
    async fn save_persists_and_close_discards() {
        let (mut registry, mut designer, renderer) = setup();
        designer.start_placing(FieldType::Text);
        designer
            .handle_click(&renderer, Point::new(100.0, 100.0), ORIGIN)
            .unwrap();

        {
            let mut abandoned = FieldDesigner::open(&registry, Config::default());
            abandoned.start_placing(FieldType::Checkbox);
            abandoned
                .handle_click(&renderer, Point::new(50.0, 50.0), ORIGIN)
                .unwrap();
            // Dropped without save: no edits reach the registry.
        }
        assert!(registry.fields().is_empty());

        designer.save(&mut registry).await.unwrap();
        assert_eq!(registry.fields().len(), 1);
        assert!(!registry.fields()[0].id.is_draft());
        assert!(!designer.fields()[0].id.is_draft());
    }
}
