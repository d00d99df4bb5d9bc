use axum::{extract::State, http::StatusCode, Json};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use fyyur_db::entities::{artist, show, venue};
use fyyur_db::AppState;

#[derive(Debug, Serialize)]
pub struct ShowResponse {
    pub venue_id: i32,
    pub venue_name: String,
    pub artist_id: i32,
    pub artist_name: String,
    pub artist_image_link: Option<String>,
    pub start_time: chrono::DateTime<chrono::FixedOffset>,
}

#[derive(Debug, Deserialize)]
pub struct CreateShowRequest {
    pub artist_id: i32,
    pub venue_id: i32,
    pub start_time: chrono::DateTime<chrono::FixedOffset>,
}

/// Split rows into (past, upcoming) around `now`, strict on both sides.
/// A row starting exactly at `now` lands in neither bucket.
pub(crate) fn split_past_upcoming<T>(
    rows: Vec<(chrono::DateTime<chrono::FixedOffset>, T)>,
    now: chrono::DateTime<chrono::FixedOffset>,
) -> (Vec<T>, Vec<T>) {
    let mut past = Vec::new();
    let mut upcoming = Vec::new();
    for (start, item) in rows {
        if start < now {
            past.push(item);
        } else if start > now {
            upcoming.push(item);
        }
    }
    (past, upcoming)
}

/// GET /api/shows
pub async fn list_shows(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ShowResponse>>, (StatusCode, String)> {
    let shows = show::Entity::find()
        .order_by_asc(show::Column::StartTime)
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    if shows.is_empty() {
        return Ok(Json(vec![]));
    }

    let venue_ids: Vec<i32> = shows.iter().map(|s| s.venue_id).collect();
    let artist_ids: Vec<i32> = shows.iter().map(|s| s.artist_id).collect();

    let venue_names: HashMap<i32, String> = venue::Entity::find()
        .filter(venue::Column::Id.is_in(venue_ids))
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .into_iter()
        .map(|v| (v.id, v.name))
        .collect();

    let artist_info: HashMap<i32, (String, Option<String>)> = artist::Entity::find()
        .filter(artist::Column::Id.is_in(artist_ids))
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .into_iter()
        .map(|a| (a.id, (a.name, a.image_link)))
        .collect();

    let data = shows
        .into_iter()
        .filter_map(|s| {
            let venue_name = venue_names.get(&s.venue_id)?.clone();
            let (artist_name, artist_image_link) = artist_info.get(&s.artist_id)?.clone();
            Some(ShowResponse {
                venue_id: s.venue_id,
                venue_name,
                artist_id: s.artist_id,
                artist_name,
                artist_image_link,
                start_time: s.start_time,
            })
        })
        .collect();

    Ok(Json(data))
}

/// POST /api/shows
pub async fn create_show(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateShowRequest>,
) -> Result<(StatusCode, Json<show::Model>), (StatusCode, String)> {
    // Both references must resolve before anything is written
    artist::Entity::find_by_id(body.artist_id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((
            StatusCode::BAD_REQUEST,
            format!("artist {} does not exist", body.artist_id),
        ))?;

    venue::Entity::find_by_id(body.venue_id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((
            StatusCode::BAD_REQUEST,
            format!("venue {} does not exist", body.venue_id),
        ))?;

    // Uncommitted transactions roll back on drop
    let txn = state
        .db
        .begin()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let created = show::ActiveModel {
        artist_id: Set(body.artist_id),
        venue_id: Set(body.venue_id),
        start_time: Set(body.start_time),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    txn.commit()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    tracing::info!(show_id = created.id, "show created");

    Ok((StatusCode::CREATED, Json(created)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_split_past_upcoming_strict_boundaries() {
        let now = Utc::now().fixed_offset();
        let rows = vec![
            (now - Duration::hours(2), "past"),
            (now, "exactly now"),
            (now + Duration::hours(2), "upcoming"),
        ];
        let (past, upcoming) = split_past_upcoming(rows, now);
        assert_eq!(past, vec!["past"]);
        assert_eq!(upcoming, vec!["upcoming"]);
    }

    #[test]
    fn test_split_past_upcoming_empty() {
        let now = Utc::now().fixed_offset();
        let (past, upcoming) = split_past_upcoming::<&str>(vec![], now);
        assert!(past.is_empty());
        assert!(upcoming.is_empty());
    }

    #[test]
    fn test_split_past_upcoming_preserves_order() {
        let now = Utc::now().fixed_offset();
        let rows = vec![
            (now - Duration::days(3), 1),
            (now + Duration::days(1), 10),
            (now - Duration::days(1), 2),
            (now + Duration::days(2), 20),
        ];
        let (past, upcoming) = split_past_upcoming(rows, now);
        assert_eq!(past, vec![1, 2]);
        assert_eq!(upcoming, vec![10, 20]);
    }

    #[test]
    fn test_create_show_request_deserialization() {
        let json = r#"{"artist_id": 4, "venue_id": 1, "start_time": "2035-05-21T21:30:00+00:00"}"#;
        let req: CreateShowRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.artist_id, 4);
        assert_eq!(req.venue_id, 1);
        assert_eq!(req.start_time.to_rfc3339(), "2035-05-21T21:30:00+00:00");
    }

    #[test]
    fn test_show_response_serialization() {
        let resp = ShowResponse {
            venue_id: 1,
            venue_name: "The Musical Hop".into(),
            artist_id: 4,
            artist_name: "Guns N Petals".into(),
            artist_image_link: None,
            start_time: Utc::now().fixed_offset(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["venue_name"], "The Musical Hop");
        assert_eq!(json["artist_id"], 4);
        assert!(json["artist_image_link"].is_null());
    }
}
