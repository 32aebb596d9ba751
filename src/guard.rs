//! Token-gated entry into a signing session. The token is the only
//! credential a recipient holds, so a consumed or expired one must
//! always dead-end here and never produce a session.

use std::sync::Arc;

use rand::Rng;

use crate::error::Error;
use crate::models::RecipientStatus;
use crate::session::SigningSession;
use crate::store::{FieldStore, SigningStore};

/// Generates a recipient access token: 64 random bytes, URL-safe base64.
pub fn make_access_token() -> String {
    let mut token = [0u8; 64];
    rand::thread_rng().fill(&mut token[..]);
    base64::encode_config(token, base64::URL_SAFE_NO_PAD)
}

pub struct AccessGuard {
    records: Arc<dyn SigningStore>,
    fields: Arc<dyn FieldStore>,
}

impl AccessGuard {
    pub fn new(records: Arc<dyn SigningStore>, fields: Arc<dyn FieldStore>) -> Self {
        Self { records, fields }
    }

    /// Resolves a token to a fresh session at the welcome step. The
    /// access counter is bumped in the background; a failure there is
    /// logged and never blocks the recipient.
    pub async fn open_session(&self, token: &str) -> Result<SigningSession, Error> {
        let (request, recipient) = self
            .records
            .find_by_token(token)
            .await?
            .ok_or(Error::InvalidLink)?;

        if recipient.status == RecipientStatus::Signed || recipient.expired_at.is_some() {
            return Err(Error::ExpiredLink);
        }

        let fields = self.fields.load_fields(request.template_id).await?;

        let records = self.records.clone();
        let recipient_id = recipient.id;
        tokio::spawn(async move {
            if let Err(err) = records.record_access(recipient_id).await {
                warn!("failed to record access for recipient {}: {}", recipient_id, err);
            }
        });

        Ok(SigningSession::new(request, recipient, fields))
    }
}
