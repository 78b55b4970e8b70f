//! Support inquiry submission.
//!
//! Attachments go through the same processing as body photos and land under
//! `support/{inquiry_id}/` in the bucket. There is no read side; inquiries
//! are answered out of band.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::photos::imaging::process_upload;
use crate::state::AppState;

const MAX_ATTACHMENTS: usize = 5;
const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Default)]
struct InquiryForm {
    name: String,
    email: String,
    category: String,
    subject: String,
    message: String,
}

impl InquiryForm {
    fn validate(&self) -> Result<(), AppError> {
        let missing: Vec<&str> = [
            ("name", &self.name),
            ("email", &self.email),
            ("subject", &self.subject),
            ("message", &self.message),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(label, _)| *label)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "Required fields are missing: {}",
                missing.join(", ")
            )))
        }
    }

    fn category(&self) -> &str {
        let trimmed = self.category.trim();
        if trimmed.is_empty() {
            DEFAULT_CATEGORY
        } else {
            trimmed
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InquiryResponse {
    pub id: Uuid,
    pub message: String,
}

/// POST /api/v1/support/inquiries (multipart)
///
/// Fields: `name`, `email`, `subject`, `message` (all required), `category`
/// (defaults to general), plus up to five `photo` attachments. Works with
/// or without a session; anonymous inquiries carry no user id.
pub async fn handle_create_inquiry(
    State(state): State<AppState>,
    auth: Option<AuthUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<InquiryResponse>), AppError> {
    let mut form = InquiryForm::default();
    let mut attachments: Vec<Bytes> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "name" => form.name = read_text(field, "name").await?,
            "email" => form.email = read_text(field, "email").await?,
            "category" => form.category = read_text(field, "category").await?,
            "subject" => form.subject = read_text(field, "subject").await?,
            "message" => form.message = read_text(field, "message").await?,
            "photo" => {
                let data = field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("Could not read photo field: {e}"))
                })?;
                if data.is_empty() {
                    continue;
                }
                if attachments.len() == MAX_ATTACHMENTS {
                    return Err(AppError::Validation(format!(
                        "At most {MAX_ATTACHMENTS} photos can be attached"
                    )));
                }
                attachments.push(data);
            }
            _ => {}
        }
    }

    form.validate()?;

    let inquiry_id = Uuid::new_v4();
    let mut photo_keys = Vec::with_capacity(attachments.len());
    for (index, data) in attachments.iter().enumerate() {
        let processed = process_upload(data)?;
        let key = format!("support/{}/{}.{}", inquiry_id, index, processed.extension);
        state
            .storage
            .put_photo(&key, processed.bytes, processed.content_type)
            .await?;
        photo_keys.push(key);
    }

    let user_id = auth.map(|a| a.user_id);
    let attachment_count = photo_keys.len();

    sqlx::query(
        "INSERT INTO support_inquiries \
             (id, user_id, name, email, category, subject, message, photo_keys) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(inquiry_id)
    .bind(user_id)
    .bind(form.name.trim())
    .bind(form.email.trim())
    .bind(form.category())
    .bind(form.subject.trim())
    .bind(form.message.trim())
    .bind(if photo_keys.is_empty() {
        None
    } else {
        Some(photo_keys)
    })
    .execute(&state.db)
    .await?;

    info!(
        inquiry_id = %inquiry_id,
        anonymous = user_id.is_none(),
        attachments = attachment_count,
        "Support inquiry recorded"
    );

    Ok((
        StatusCode::CREATED,
        Json(InquiryResponse {
            id: inquiry_id,
            message: "Your inquiry has been received. We will reply as soon as possible."
                .to_string(),
        }),
    ))
}

async fn read_text(
    field: axum::extract::multipart::Field<'_>,
    label: &str,
) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Could not read {label} field: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_form() -> InquiryForm {
        InquiryForm {
            name: "Jee-eun".to_string(),
            email: "jee-eun@example.com".to_string(),
            category: "billing".to_string(),
            subject: "Double charge".to_string(),
            message: "I was charged twice this month.".to_string(),
        }
    }

    #[test]
    fn test_complete_form_passes() {
        assert!(make_form().validate().is_ok());
    }

    #[test]
    fn test_missing_fields_are_named_in_the_error() {
        let mut form = make_form();
        form.email = String::new();
        form.message = "   ".to_string();

        let err = form.validate().unwrap_err();
        match err {
            AppError::Validation(message) => {
                assert!(message.contains("email"));
                assert!(message.contains("message"));
                assert!(!message.contains("name"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_category_defaults_when_blank() {
        let mut form = make_form();
        assert_eq!(form.category(), "billing");

        form.category = "  ".to_string();
        assert_eq!(form.category(), "general");

        form.category = String::new();
        assert_eq!(form.category(), "general");
    }
}
