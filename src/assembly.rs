//! Final document assembly: overlays the collected field values onto the
//! base PDF and commits the result. The write order is fixed: object
//! storage first, then the conditional recipient update, then the signed
//! document record. The conditional update is the commit point; losing
//! it means another session already completed this link, and nothing
//! further is written.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;
use sha2::Digest;

use crate::error::Error;
use crate::models::{
    CompletionData, FieldId, FieldType, Recipient, SignedDocument, SigningRequest, TemplateField,
};
use crate::store::{ObjectStore, SigningStore};
use crate::{pdf, Config, SIGNED_DOCUMENTS_DIR};

pub struct AssemblyEngine {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn SigningStore>,
    config: Config,
}

impl AssemblyEngine {
    pub fn new(objects: Arc<dyn ObjectStore>, records: Arc<dyn SigningStore>, config: Config) -> Self {
        Self {
            objects,
            records,
            config,
        }
    }

    /// Runs the full completion pipeline for one recipient. Returns the
    /// stored record, or `ExpiredLink` when another session won the
    /// conditional recipient update.
    pub async fn complete(
        &self,
        request: &SigningRequest,
        recipient: &Recipient,
        fields: &[TemplateField],
        values: &HashMap<FieldId, String>,
    ) -> Result<SignedDocument, Error> {
        let base = self.objects.get(&request.base_file).await?;
        let mut doc = pdf::Document::load(&base)?;

        let by_page = fields
            .iter()
            .sorted_by_key(|f| f.page)
            .group_by(|f| f.page);
        for (page_num, page_fields) in &by_page {
            let mut page = doc.page(page_num)?;
            for field in page_fields {
                let value = match values.get(&field.id) {
                    Some(v) if !v.is_empty() => v,
                    _ => continue,
                };
                match field.field_type {
                    FieldType::Text | FieldType::Date => {
                        page.add_text(
                            value,
                            field.x,
                            field.y,
                            field.width,
                            field.height,
                            self.config.max_font_size,
                        );
                    }
                    FieldType::Checkbox => {
                        if value == "true" {
                            page.add_checkmark(field.x, field.y, field.width, field.height);
                        }
                    }
                    FieldType::Signature => {
                        let png = match decode_signature_value(value) {
                            Ok(png) => png,
                            Err(err) => {
                                warn!("skipping undecodable signature for field {}: {}", field.name, err);
                                continue;
                            }
                        };
                        if let Err(err) =
                            page.add_png_image(&png, field.x, field.y, field.width, field.height)
                        {
                            warn!("skipping unplaceable signature for field {}: {}", field.name, err);
                        }
                    }
                }
            }
            page.finish()?;
        }

        let bytes = doc.save()?;
        let document_hash = sha2::Sha512::digest(&bytes).to_vec();

        let now = chrono::Utc::now();
        let path = format!(
            "{}/{}_{}_signed.pdf",
            SIGNED_DOCUMENTS_DIR,
            now.timestamp(),
            slugify(&request.title),
        );
        let final_document_path = self.objects.put(&path, bytes).await?;

        if !self.records.mark_signed(recipient.id, now).await? {
            return Err(Error::ExpiredLink);
        }

        // Keyed by field id, not name; names are not unique.
        let field_data = fields
            .iter()
            .filter_map(|f| values.get(&f.id).map(|v| (f.id.to_string(), v.clone())))
            .collect();
        let doc_record = SignedDocument {
            id: uuid::Uuid::new_v4(),
            signing_request_id: request.id,
            final_document_path,
            completion_data: CompletionData {
                recipient_id: recipient.id,
                field_data,
            },
            document_hash,
            completed_at: now,
        };
        self.records.insert_signed_document(doc_record.clone()).await?;
        Ok(doc_record)
    }
}

/// Accepts either a bare base64 payload or a `data:*;base64,` URL.
fn decode_signature_value(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = match value.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => value,
    };
    base64::decode_config(payload, base64::STANDARD)
}

fn slugify(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}
