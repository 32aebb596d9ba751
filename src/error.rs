/// Error taxonomy for the signing engine.
///
/// `InvalidLink` and `ExpiredLink` are terminal and block a session
/// before it starts. `Validation` is recoverable: the session stays
/// where it is and no collected data is lost. Everything else surfaces
/// as a single failed operation with the state machine left in its
/// pre-call state.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("signing link not found")]
    InvalidLink,
    #[error("signing link already used or expired")]
    ExpiredLink,
    #[error("missing required fields: {}", .0.join(", "))]
    Validation(Vec<String>),
    #[error("a submission is already in progress")]
    SubmitInFlight,
    #[error("submission is only available from the signature step")]
    SubmitOutOfOrder,
    #[error("this signing session is already complete")]
    AlreadyCompleted,
    #[error("page {0} not present in document")]
    PageNotFound(u32),
    #[error("field \"{0}\" is outside the page bounds")]
    FieldBounds(String),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("image error: {0}")]
    Image(#[from] png::DecodingError),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("record store error: {0}")]
    Record(String),
    #[error("unable to read config: {0}")]
    Config(String),
}
