//! Public order tracking by code.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use crate::error::Result;
use crate::models::OrderSummary;
use crate::state::AppState;

/// Look up an order by its tracking code.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<OrderSummary>> {
    let summary = state.checkout().track(&code).await?;
    Ok(Json(summary))
}
