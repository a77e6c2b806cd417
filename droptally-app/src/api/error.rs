use droptally_core::SubmissionError;
use log::error;
use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{Request, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl From<diesel::result::Error> for ApiError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Submission(SubmissionError::Database(err))
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// The transport mapping of the error taxonomy. Auth failures and
    /// duplicates surface as soft 200s so the endpoint can't be used to
    /// probe accounts; rejections carry their reason.
    fn status_and_body(&self) -> (Status, serde_json::Value) {
        match self {
            Self::BadRequest(message) => (Status::BadRequest, json!({"error": message})),
            Self::Submission(err) => match err {
                SubmissionError::Validation(message) => {
                    (Status::BadRequest, json!({"error": message}))
                }
                SubmissionError::AuthFailure => (
                    Status::Ok,
                    json!({"message": "Submission could not be authenticated"}),
                ),
                SubmissionError::Duplicate => {
                    (Status::Ok, json!({"message": "Already processed"}))
                }
                SubmissionError::UnknownReference { .. } => {
                    (Status::Ok, json!({"message": err.to_string()}))
                }
                SubmissionError::DropUnverified { .. } => {
                    (Status::Ok, json!({"error": err.to_string()}))
                }
                SubmissionError::TransientUpstream(_) | SubmissionError::RedisTimeout => (
                    Status::ServiceUnavailable,
                    json!({"error": "upstream service unavailable, please retry"}),
                ),
                SubmissionError::InsufficientPoints { .. } => {
                    (Status::BadRequest, json!({"error": err.to_string()}))
                }
                SubmissionError::Database(_)
                | SubmissionError::Redis(_)
                | SubmissionError::RedisPool(_)
                | SubmissionError::Internal(_) => {
                    error!("Internal error serving request: {err:?}");
                    (Status::InternalServerError, json!({"error": "internal error"}))
                }
            },
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> rocket::response::Result<'o> {
        let (status, body) = self.status_and_body();
        let rendered = body.to_string();

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(rendered.len(), std::io::Cursor::new(rendered))
            .ok()
    }
}
