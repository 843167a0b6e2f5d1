//! Tauri command for calendar-derived rule ingestion (spec §6).

use tauri::State;

use crate::calendar::{self, IngestResult, ParsedEvent};
use crate::error::ApiError;
use crate::DbState;

#[tauri::command]
pub async fn ingest_calendar_events(
    state: State<'_, DbState>,
    events: Vec<ParsedEvent>,
) -> Result<IngestResult, ApiError> {
    calendar::ingest_calendar_events(&state.rules, &events).await
}
