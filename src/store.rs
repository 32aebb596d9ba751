//! Ports onto the external collaborators: long-term object storage and
//! the record backend. The engine only ever talks through these traits;
//! the in-memory implementations below double as test doubles and as a
//! starting point for embedding.

use std::collections::HashMap;

use crate::error::Error;
use crate::models::{FieldId, Recipient, RecipientStatus, SignedDocument, SigningRequest, TemplateField};

/// Opaque byte storage: `put(bytes) -> path`, `get(path) -> bytes`.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, Error>;
    async fn get(&self, path: &str) -> Result<Vec<u8>, Error>;
}

/// Persistence for template field sets. `replace_fields` is the only
/// write path: delete-all-then-insert, returning the saved list with
/// server-assigned ids.
#[async_trait::async_trait]
pub trait FieldStore: Send + Sync {
    async fn load_fields(&self, template_id: uuid::Uuid) -> Result<Vec<TemplateField>, Error>;
    async fn replace_fields(
        &self,
        template_id: uuid::Uuid,
        fields: Vec<TemplateField>,
    ) -> Result<Vec<TemplateField>, Error>;
}

/// Persistence for signing requests and their recipients.
#[async_trait::async_trait]
pub trait SigningStore: Send + Sync {
    async fn find_by_token(&self, token: &str) -> Result<Option<(SigningRequest, Recipient)>, Error>;

    /// Best-effort access telemetry. Callers fire and forget.
    async fn record_access(&self, recipient_id: uuid::Uuid) -> Result<(), Error>;

    /// Conditional write: marks the recipient signed and expires the
    /// link only if it is still pending and unexpired. Returns whether
    /// this call won; a `false` means another session got there first.
    async fn mark_signed(
        &self,
        recipient_id: uuid::Uuid,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool, Error>;

    async fn insert_signed_document(&self, doc: SignedDocument) -> Result<(), Error>;
}

pub struct MemoryObjectStore {
    objects: tokio::sync::Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, Error> {
        self.objects.lock().await.insert(path.to_string(), bytes);
        Ok(path.to_string())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, Error> {
        self.objects
            .lock()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("no object at {}", path)))
    }
}

#[derive(Default)]
struct MemoryStoreInner {
    requests: HashMap<uuid::Uuid, SigningRequest>,
    recipients: HashMap<uuid::Uuid, Recipient>,
    fields: HashMap<uuid::Uuid, Vec<TemplateField>>,
    signed: Vec<SignedDocument>,
}

/// In-memory record backend, the stub-transport of this crate.
pub struct MemoryStore {
    inner: tokio::sync::Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: tokio::sync::Mutex::new(MemoryStoreInner::default()),
        }
    }

    pub async fn add_request(&self, request: SigningRequest) {
        self.inner.lock().await.requests.insert(request.id, request);
    }

    pub async fn add_recipient(&self, recipient: Recipient) {
        self.inner.lock().await.recipients.insert(recipient.id, recipient);
    }

    pub async fn recipient(&self, id: uuid::Uuid) -> Option<Recipient> {
        self.inner.lock().await.recipients.get(&id).cloned()
    }

    pub async fn signed_documents(&self) -> Vec<SignedDocument> {
        self.inner.lock().await.signed.clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FieldStore for MemoryStore {
    async fn load_fields(&self, template_id: uuid::Uuid) -> Result<Vec<TemplateField>, Error> {
        Ok(self
            .inner
            .lock()
            .await
            .fields
            .get(&template_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_fields(
        &self,
        template_id: uuid::Uuid,
        fields: Vec<TemplateField>,
    ) -> Result<Vec<TemplateField>, Error> {
        let mut inner = self.inner.lock().await;
        inner.fields.remove(&template_id);
        let saved = fields
            .into_iter()
            .map(|mut f| {
                if f.id.is_draft() {
                    f.id = FieldId::Saved(uuid::Uuid::new_v4());
                }
                f.template_id = template_id;
                f
            })
            .collect::<Vec<_>>();
        inner.fields.insert(template_id, saved.clone());
        Ok(saved)
    }
}

#[async_trait::async_trait]
impl SigningStore for MemoryStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<(SigningRequest, Recipient)>, Error> {
        let inner = self.inner.lock().await;
        for recipient in inner.recipients.values() {
            if recipient.access_token == token {
                let request = inner
                    .requests
                    .get(&recipient.signing_request_id)
                    .cloned()
                    .ok_or_else(|| Error::Record("recipient without signing request".to_string()))?;
                return Ok(Some((request, recipient.clone())));
            }
        }
        Ok(None)
    }

    async fn record_access(&self, recipient_id: uuid::Uuid) -> Result<(), Error> {
        let mut inner = self.inner.lock().await;
        match inner.recipients.get_mut(&recipient_id) {
            Some(r) => {
                r.access_count += 1;
                Ok(())
            }
            None => Err(Error::Record(format!("no recipient {}", recipient_id))),
        }
    }

    async fn mark_signed(
        &self,
        recipient_id: uuid::Uuid,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool, Error> {
        let mut inner = self.inner.lock().await;
        let recipient = inner
            .recipients
            .get_mut(&recipient_id)
            .ok_or_else(|| Error::Record(format!("no recipient {}", recipient_id)))?;
        if recipient.status != RecipientStatus::Pending || recipient.expired_at.is_some() {
            return Ok(false);
        }
        recipient.status = RecipientStatus::Signed;
        recipient.expired_at = Some(at);
        Ok(true)
    }

    async fn insert_signed_document(&self, doc: SignedDocument) -> Result<(), Error> {
        self.inner.lock().await.signed.push(doc);
        Ok(())
    }
}
