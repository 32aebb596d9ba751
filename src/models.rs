use crate::error::Error;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Date,
    Signature,
    Checkbox,
}

impl ToString for FieldType {
    fn to_string(&self) -> String {
        match self {
            Self::Text => "text",
            Self::Date => "date",
            Self::Signature => "signature",
            Self::Checkbox => "checkbox",
        }
        .to_string()
    }
}

/// A field id in either of the two shapes the designer has to tolerate:
/// a client-generated time-based draft id, or the server-assigned uuid
/// that replaces it after a successful save.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldId {
    Draft(u64),
    Saved(uuid::Uuid),
}

impl FieldId {
    pub fn is_draft(&self) -> bool {
        matches!(self, Self::Draft(_))
    }
}

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft(n) => f.write_fmt(format_args!("draft_{}", n)),
            Self::Saved(id) => f.write_fmt(format_args!("{}", id)),
        }
    }
}

impl std::str::FromStr for FieldId {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(n) = s.strip_prefix("draft_") {
            return match n.parse::<u64>() {
                Ok(n) => Ok(Self::Draft(n)),
                Err(_) => Err("invalid draft id"),
            };
        }
        match uuid::Uuid::parse_str(s) {
            Ok(id) => Ok(Self::Saved(id)),
            Err(_) => Err("invalid UUID"),
        }
    }
}

impl serde::Serialize for FieldId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for FieldId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;
        use serde::Deserialize;
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// One placeable element on one page of one template. Positions are
/// stored in document-native units using the designer's top-left, y-down
/// convention; the assembly layer alone flips into PDF space.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TemplateField {
    pub id: FieldId,
    pub template_id: uuid::Uuid,
    #[serde(rename = "field_name")]
    pub name: String,
    pub field_type: FieldType,
    #[serde(rename = "page_number")]
    pub page: u32,
    #[serde(rename = "x_position")]
    pub x: f64,
    #[serde(rename = "y_position")]
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(rename = "is_required")]
    pub required: bool,
    #[serde(rename = "placeholder_text", skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl TemplateField {
    pub fn validate(&self, page_count: u32) -> Result<(), Error> {
        if self.x < 0.0 || self.y < 0.0 || self.width <= 0.0 || self.height <= 0.0 {
            return Err(Error::FieldBounds(self.name.clone()));
        }
        if self.page < 1 || self.page > page_count {
            return Err(Error::PageNotFound(self.page));
        }
        Ok(())
    }
}

/// Partial update applied to a field through the designer's property
/// editor.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct FieldPatch {
    pub name: Option<String>,
    pub field_type: Option<FieldType>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub required: Option<bool>,
    pub placeholder: Option<Option<String>>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Draft,
    Sent,
    Completed,
    Cancelled,
}

/// One instance of "this template, sent for signing".
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SigningRequest {
    pub id: uuid::Uuid,
    pub template_id: uuid::Uuid,
    pub title: String,
    pub message: String,
    pub base_file: String,
    pub status: RequestStatus,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
    Pending,
    Signed,
    Declined,
}

impl ToString for RecipientStatus {
    fn to_string(&self) -> String {
        match self {
            Self::Pending => "pending",
            Self::Signed => "signed",
            Self::Declined => "declined",
        }
        .to_string()
    }
}

/// One invitee on a signing request. Once `status` is `Signed` or
/// `expired_at` is set, the link is permanently inert.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Recipient {
    pub id: uuid::Uuid,
    pub signing_request_id: uuid::Uuid,
    pub name: String,
    pub email: String,
    pub access_token: String,
    pub status: RecipientStatus,
    pub access_count: i64,
    pub expired_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Audit payload stored verbatim alongside the final artifact: the full
/// field-value map as submitted, signature images included.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CompletionData {
    pub recipient_id: uuid::Uuid,
    pub field_data: std::collections::HashMap<String, String>,
}

/// Output record, created exactly once per successful assembly.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SignedDocument {
    pub id: uuid::Uuid,
    pub signing_request_id: uuid::Uuid,
    pub final_document_path: String,
    pub completion_data: CompletionData,
    #[serde(serialize_with = "hex_encode")]
    pub document_hash: Vec<u8>,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

fn hex_encode<S: serde::Serializer>(val: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(val))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> TemplateField {
        TemplateField {
            id: FieldId::Draft(1),
            template_id: uuid::Uuid::new_v4(),
            name: "Name".to_string(),
            field_type: FieldType::Text,
            page: 1,
            x: 40.0,
            y: 60.0,
            width: 150.0,
            height: 30.0,
            required: true,
            placeholder: None,
        }
    }

    #[test]
    fn field_id_round_trips_both_shapes() {
        let draft: FieldId = "draft_1692000000000".parse().unwrap();
        assert_eq!(draft, FieldId::Draft(1692000000000));
        let id = uuid::Uuid::new_v4();
        let saved: FieldId = id.to_string().parse().unwrap();
        assert_eq!(saved, FieldId::Saved(id));
        assert!("draft_x".parse::<FieldId>().is_err());
    }

    #[test]
    fn field_serializes_with_record_names() {
        let v = serde_json::to_value(&field()).unwrap();
        assert_eq!(v["field_name"], "Name");
        assert_eq!(v["field_type"], "text");
        assert_eq!(v["x_position"], 40.0);
        assert_eq!(v["page_number"], 1);
        assert_eq!(v["is_required"], true);
        assert!(v.get("placeholder_text").is_none());
    }

    #[test]
    fn validate_rejects_bad_bounds_and_pages() {
        let mut f = field();
        f.width = 0.0;
        assert!(matches!(f.validate(2), Err(Error::FieldBounds(_))));
        let mut f = field();
        f.page = 3;
        assert!(matches!(f.validate(2), Err(Error::PageNotFound(3))));
        assert!(field().validate(2).is_ok());
    }
}
