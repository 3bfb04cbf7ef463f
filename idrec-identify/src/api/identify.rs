//! Identify endpoint
//!
//! POST /identify with `{"email": string|null, "phone": string|null}`.
//! `phoneNumber` is accepted in place of `phone`, and a numeric phone is
//! taken as its decimal text.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::reconcile::{ConsolidatedContact, IdentifyQuery};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct IdentifyRequest {
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default, alias = "phoneNumber", deserialize_with = "phone_from_json")]
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IdentifyResponse {
    pub contact: ConsolidatedContact,
}

fn phone_from_json<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Phone {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Phone>::deserialize(deserializer)?.map(|phone| match phone {
        Phone::Text(text) => text,
        Phone::Number(number) => number.to_string(),
    }))
}

/// POST /identify
pub async fn identify(
    State(state): State<AppState>,
    payload: Result<Json<IdentifyRequest>, JsonRejection>,
) -> ApiResult<Json<IdentifyResponse>> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let query = IdentifyQuery::new(request.email, request.phone);
    let contact = state.contacts.identify(query).await?;

    Ok(Json(IdentifyResponse { contact }))
}
