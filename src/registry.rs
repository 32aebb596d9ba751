//! Ordered collection of field definitions for one template. Edits are
//! entirely local until `save`, which atomically replaces the whole set
//! through the field store (delete-all-then-insert). After a failed
//! save the local list is no longer authoritative: the registry flags
//! itself stale and `refetch` is the only way back.

use std::sync::Arc;

use crate::error::Error;
use crate::models::{FieldId, FieldPatch, TemplateField};
use crate::store::FieldStore;

pub struct FieldRegistry {
    template_id: uuid::Uuid,
    fields: Vec<TemplateField>,
    store: Arc<dyn FieldStore>,
    next_draft: u64,
    stale: bool,
}

impl FieldRegistry {
    pub fn new(template_id: uuid::Uuid, store: Arc<dyn FieldStore>) -> Self {
        Self {
            template_id,
            fields: vec![],
            store,
            // Time-based draft ids, the shape the designer already uses.
            next_draft: chrono::Utc::now().timestamp_millis() as u64,
            stale: false,
        }
    }

    /// Open a registry over the persisted field set.
    pub async fn open(template_id: uuid::Uuid, store: Arc<dyn FieldStore>) -> Result<Self, Error> {
        let mut registry = Self::new(template_id, store);
        registry.refetch().await?;
        Ok(registry)
    }

    pub fn template_id(&self) -> uuid::Uuid {
        self.template_id
    }

    pub fn fields(&self) -> &[TemplateField] {
        &self.fields
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn next_draft_id(&mut self) -> FieldId {
        let id = FieldId::Draft(self.next_draft);
        self.next_draft += 1;
        id
    }

    pub fn add(&mut self, field: TemplateField) -> Result<FieldId, Error> {
        if field.x < 0.0 || field.y < 0.0 || field.width <= 0.0 || field.height <= 0.0 {
            return Err(Error::FieldBounds(field.name.clone()));
        }
        let id = field.id;
        self.fields.push(field);
        Ok(id)
    }

    pub fn get(&self, id: FieldId) -> Option<&TemplateField> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn update(&mut self, id: FieldId, patch: FieldPatch) -> Option<&TemplateField> {
        let field = self.fields.iter_mut().find(|f| f.id == id)?;
        if let Some(name) = patch.name {
            field.name = name;
        }
        if let Some(field_type) = patch.field_type {
            field.field_type = field_type;
        }
        if let Some(x) = patch.x {
            field.x = x.max(0.0);
        }
        if let Some(y) = patch.y {
            field.y = y.max(0.0);
        }
        if let Some(width) = patch.width {
            field.width = width;
        }
        if let Some(height) = patch.height {
            field.height = height;
        }
        if let Some(required) = patch.required {
            field.required = required;
        }
        if let Some(placeholder) = patch.placeholder {
            field.placeholder = placeholder;
        }
        Some(field)
    }

    pub fn remove(&mut self, id: FieldId) -> Option<TemplateField> {
        let idx = self.fields.iter().position(|f| f.id == id)?;
        Some(self.fields.remove(idx))
    }

    pub fn list_by_page(&self, page: u32) -> Vec<&TemplateField> {
        self.fields.iter().filter(|f| f.page == page).collect()
    }

    /// Persist `fields` as the complete new set for this template and
    /// adopt the saved list (with server-assigned ids) locally.
    pub async fn replace_all(&mut self, fields: Vec<TemplateField>) -> Result<(), Error> {
        match self.store.replace_fields(self.template_id, fields).await {
            Ok(saved) => {
                self.fields = saved;
                self.stale = false;
                Ok(())
            }
            Err(e) => {
                // The delete may have landed without the insert; local
                // state must not be trusted until a refetch.
                warn!("field save failed for template {}: {}", self.template_id, e);
                self.stale = true;
                Err(e)
            }
        }
    }

    pub async fn save(&mut self) -> Result<(), Error> {
        let fields = self.fields.clone();
        self.replace_all(fields).await
    }

    pub async fn refetch(&mut self) -> Result<&[TemplateField], Error> {
        self.fields = self.store.load_fields(self.template_id).await?;
        self.stale = false;
        Ok(&self.fields)
    }
}
