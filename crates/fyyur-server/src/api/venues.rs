use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sea_orm::sea_query::{extension::postgres::PgExpr, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::{ilike_pattern, SearchParams, SearchResponse};
use fyyur_db::entities::{artist, show, venue, Genres};
use fyyur_db::AppState;

#[derive(Debug, Serialize)]
pub struct VenueResponse {
    pub id: i32,
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    pub phone: String,
    pub genres: Vec<String>,
    pub image_link: Option<String>,
    pub website: Option<String>,
    pub facebook_link: Option<String>,
    pub seeking_talent: bool,
    pub seeking_description: Option<String>,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

impl From<venue::Model> for VenueResponse {
    fn from(v: venue::Model) -> Self {
        Self {
            id: v.id,
            name: v.name,
            city: v.city,
            state: v.state,
            address: v.address,
            phone: v.phone,
            genres: v.genres.0,
            image_link: v.image_link,
            website: v.website,
            facebook_link: v.facebook_link,
            seeking_talent: v.seeking_talent,
            seeking_description: v.seeking_description,
            created_at: v.created_at,
        }
    }
}

/// One venue row on the grouped listing page.
#[derive(Debug, Serialize)]
pub struct VenueSummary {
    pub id: i32,
    pub name: String,
    pub num_upcoming_shows: usize,
}

/// Venues sharing an exact (city, state) pair.
#[derive(Debug, Serialize)]
pub struct VenueAreaResponse {
    pub city: String,
    pub state: String,
    pub venues: Vec<VenueSummary>,
}

/// A show on the venue page, seen from the venue's side.
#[derive(Debug, Serialize)]
pub struct VenueShowSummary {
    pub artist_id: i32,
    pub artist_name: String,
    pub artist_image_link: Option<String>,
    pub start_time: chrono::DateTime<chrono::FixedOffset>,
}

#[derive(Debug, Serialize)]
pub struct VenueDetailResponse {
    #[serde(flatten)]
    pub venue: VenueResponse,
    pub past_shows: Vec<VenueShowSummary>,
    pub upcoming_shows: Vec<VenueShowSummary>,
    pub past_shows_count: usize,
    pub upcoming_shows_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct VenuePayload {
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    pub phone: String,
    pub genres: Vec<String>,
    pub image_link: Option<String>,
    pub website: Option<String>,
    pub facebook_link: Option<String>,
    #[serde(default)]
    pub seeking_talent: bool,
    pub seeking_description: Option<String>,
}

impl VenuePayload {
    fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("name", &self.name),
            ("city", &self.city),
            ("state", &self.state),
            ("address", &self.address),
            ("phone", &self.phone),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{field} must not be blank"));
            }
        }
        if self.genres.is_empty() {
            return Err("at least one genre is required".to_string());
        }
        Ok(())
    }
}

/// Upcoming-show tally per venue id, strict `>` against `now`.
pub(crate) fn upcoming_show_counts(
    shows: &[show::Model],
    now: chrono::DateTime<chrono::FixedOffset>,
) -> HashMap<i32, usize> {
    let mut counts = HashMap::new();
    for s in shows {
        if s.start_time > now {
            *counts.entry(s.venue_id).or_insert(0) += 1;
        }
    }
    counts
}

/// Bucket venues by exact (city, state) match, in first-seen order.
/// Every venue lands in exactly one bucket.
pub(crate) fn group_venues_by_locale(
    venues: Vec<venue::Model>,
    counts: &HashMap<i32, usize>,
) -> Vec<VenueAreaResponse> {
    let mut areas: Vec<VenueAreaResponse> = Vec::new();
    for v in venues {
        let summary = VenueSummary {
            id: v.id,
            name: v.name,
            num_upcoming_shows: counts.get(&v.id).copied().unwrap_or(0),
        };
        match areas
            .iter_mut()
            .find(|a| a.city == v.city && a.state == v.state)
        {
            Some(area) => area.venues.push(summary),
            None => areas.push(VenueAreaResponse {
                city: v.city,
                state: v.state,
                venues: vec![summary],
            }),
        }
    }
    areas
}

/// GET /api/venues
pub async fn list_venues(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<VenueAreaResponse>>, (StatusCode, String)> {
    let now = chrono::Utc::now().fixed_offset();

    let venues = venue::Entity::find()
        .order_by_asc(venue::Column::Id)
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let shows = show::Entity::find()
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let counts = upcoming_show_counts(&shows, now);

    Ok(Json(group_venues_by_locale(venues, &counts)))
}

/// GET /api/venues/search?q=...
pub async fn search_venues(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse<VenueResponse>>, (StatusCode, String)> {
    let pattern = ilike_pattern(&params.q);

    let matches = venue::Entity::find()
        .filter(Expr::col(venue::Column::Name).ilike(pattern))
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let data: Vec<VenueResponse> = matches.into_iter().map(VenueResponse::from).collect();

    Ok(Json(SearchResponse {
        count: data.len(),
        data,
    }))
}

/// GET /api/venues/:id
pub async fn get_venue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<VenueDetailResponse>, (StatusCode, String)> {
    let venue_model = venue::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Venue not found".to_string()))?;

    let rows = show::Entity::find()
        .filter(show::Column::VenueId.eq(id))
        .order_by_asc(show::Column::StartTime)
        .find_also_related(artist::Entity)
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let stamped: Vec<(chrono::DateTime<chrono::FixedOffset>, VenueShowSummary)> = rows
        .into_iter()
        .filter_map(|(s, a)| {
            a.map(|a| {
                (
                    s.start_time,
                    VenueShowSummary {
                        artist_id: a.id,
                        artist_name: a.name,
                        artist_image_link: a.image_link,
                        start_time: s.start_time,
                    },
                )
            })
        })
        .collect();

    let now = chrono::Utc::now().fixed_offset();
    let (past_shows, upcoming_shows) = super::shows::split_past_upcoming(stamped, now);

    Ok(Json(VenueDetailResponse {
        venue: VenueResponse::from(venue_model),
        past_shows_count: past_shows.len(),
        upcoming_shows_count: upcoming_shows.len(),
        past_shows,
        upcoming_shows,
    }))
}

/// POST /api/venues
pub async fn create_venue(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VenuePayload>,
) -> Result<(StatusCode, Json<VenueResponse>), (StatusCode, String)> {
    body.validate().map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let txn = state
        .db
        .begin()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let created = venue::ActiveModel {
        name: Set(body.name),
        city: Set(body.city),
        state: Set(body.state),
        address: Set(body.address),
        phone: Set(body.phone),
        genres: Set(Genres(body.genres)),
        image_link: Set(body.image_link),
        website: Set(body.website),
        facebook_link: Set(body.facebook_link),
        seeking_talent: Set(body.seeking_talent),
        seeking_description: Set(body.seeking_description),
        created_at: Set(chrono::Utc::now().fixed_offset()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    txn.commit()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    tracing::info!(venue_id = created.id, name = %created.name, "venue created");

    Ok((StatusCode::CREATED, Json(VenueResponse::from(created))))
}

/// PUT /api/venues/:id — overwrites every mutable field
pub async fn update_venue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(body): Json<VenuePayload>,
) -> Result<Json<VenueResponse>, (StatusCode, String)> {
    body.validate().map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let existing = venue::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Venue not found".to_string()))?;

    let txn = state
        .db
        .begin()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let mut active: venue::ActiveModel = existing.into();
    active.name = Set(body.name);
    active.city = Set(body.city);
    active.state = Set(body.state);
    active.address = Set(body.address);
    active.phone = Set(body.phone);
    active.genres = Set(Genres(body.genres));
    active.image_link = Set(body.image_link);
    active.website = Set(body.website);
    active.facebook_link = Set(body.facebook_link);
    active.seeking_talent = Set(body.seeking_talent);
    active.seeking_description = Set(body.seeking_description);

    let updated = active
        .update(&txn)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    txn.commit()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    tracing::info!(venue_id = updated.id, "venue updated");

    Ok(Json(VenueResponse::from(updated)))
}

/// DELETE /api/venues/:id — dependent shows go with it (FK cascade)
pub async fn delete_venue(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<StatusCode, (StatusCode, String)> {
    venue::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Venue not found".to_string()))?;

    let txn = state
        .db
        .begin()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    venue::Entity::delete_by_id(id)
        .exec(&txn)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    txn.commit()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    tracing::info!(venue_id = id, "venue deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn make_venue(id: i32, name: &str, city: &str, state: &str) -> venue::Model {
        venue::Model {
            id,
            name: name.into(),
            city: city.into(),
            state: state.into(),
            address: "1015 Folsom Street".into(),
            phone: format!("123-123-{id:04}"),
            genres: Genres(vec!["Jazz".into(), "Folk".into()]),
            image_link: None,
            website: None,
            facebook_link: None,
            seeking_talent: false,
            seeking_description: None,
            created_at: Utc::now().fixed_offset(),
        }
    }

    fn make_show(id: i32, venue_id: i32, start_time: chrono::DateTime<chrono::FixedOffset>) -> show::Model {
        show::Model {
            id,
            artist_id: 1,
            venue_id,
            start_time,
        }
    }

    fn make_payload() -> VenuePayload {
        VenuePayload {
            name: "The Fillmore".into(),
            city: "San Francisco".into(),
            state: "CA".into(),
            address: "1805 Geary Boulevard".into(),
            phone: "415-000-1234".into(),
            genres: vec!["Rock n Roll".into()],
            image_link: None,
            website: None,
            facebook_link: None,
            seeking_talent: false,
            seeking_description: None,
        }
    }

    #[test]
    fn test_each_venue_lands_in_exactly_one_area() {
        let venues = vec![
            make_venue(1, "The Musical Hop", "San Francisco", "CA"),
            make_venue(2, "Park Square Live", "New York", "NY"),
            make_venue(3, "The Dueling Pianos Bar", "San Francisco", "CA"),
        ];
        let areas = group_venues_by_locale(venues, &HashMap::new());

        assert_eq!(areas.len(), 2);
        let total: usize = areas.iter().map(|a| a.venues.len()).sum();
        assert_eq!(total, 3);

        let sf = &areas[0];
        assert_eq!((sf.city.as_str(), sf.state.as_str()), ("San Francisco", "CA"));
        assert_eq!(sf.venues.len(), 2);
        let ny = &areas[1];
        assert_eq!((ny.city.as_str(), ny.state.as_str()), ("New York", "NY"));
        assert_eq!(ny.venues.len(), 1);
    }

    #[test]
    fn test_grouping_is_exact_string_match() {
        // Same city name in a different state is a different area
        let venues = vec![
            make_venue(1, "A", "Springfield", "IL"),
            make_venue(2, "B", "Springfield", "MA"),
        ];
        let areas = group_venues_by_locale(venues, &HashMap::new());
        assert_eq!(areas.len(), 2);
    }

    #[test]
    fn test_grouping_attaches_upcoming_counts() {
        let venues = vec![
            make_venue(1, "A", "San Francisco", "CA"),
            make_venue(2, "B", "San Francisco", "CA"),
        ];
        let counts = HashMap::from([(2, 3)]);
        let areas = group_venues_by_locale(venues, &counts);
        assert_eq!(areas[0].venues[0].num_upcoming_shows, 0);
        assert_eq!(areas[0].venues[1].num_upcoming_shows, 3);
    }

    #[test]
    fn test_grouping_empty_input() {
        assert!(group_venues_by_locale(vec![], &HashMap::new()).is_empty());
    }

    #[test]
    fn test_upcoming_show_counts_strictly_after_now() {
        let now = Utc::now().fixed_offset();
        let shows = vec![
            make_show(1, 1, now - Duration::hours(1)),
            make_show(2, 1, now),
            make_show(3, 1, now + Duration::hours(1)),
            make_show(4, 2, now + Duration::days(7)),
        ];
        let counts = upcoming_show_counts(&shows, now);
        // The show exactly at `now` is not upcoming
        assert_eq!(counts.get(&1), Some(&1));
        assert_eq!(counts.get(&2), Some(&1));
        assert_eq!(counts.get(&3), None);
    }

    #[test]
    fn test_venue_payload_validation() {
        assert!(make_payload().validate().is_ok());

        let mut blank_name = make_payload();
        blank_name.name = "   ".into();
        assert!(blank_name.validate().is_err());

        let mut no_genres = make_payload();
        no_genres.genres.clear();
        assert_eq!(
            no_genres.validate().unwrap_err(),
            "at least one genre is required"
        );
    }

    #[test]
    fn test_venue_payload_deserialization_defaults() {
        let json = r#"{
            "name": "The Fillmore",
            "city": "San Francisco",
            "state": "CA",
            "address": "1805 Geary Boulevard",
            "phone": "415-000-1234",
            "genres": ["Rock n Roll"]
        }"#;
        let payload: VenuePayload = serde_json::from_str(json).unwrap();
        assert!(!payload.seeking_talent);
        assert!(payload.image_link.is_none());
    }

    #[test]
    fn test_venue_response_from_model() {
        let model = make_venue(7, "The Musical Hop", "San Francisco", "CA");
        let resp = VenueResponse::from(model);
        assert_eq!(resp.id, 7);
        assert_eq!(resp.genres, vec!["Jazz".to_string(), "Folk".to_string()]);
    }

    #[test]
    fn test_venue_detail_response_flattens_venue_fields() {
        let detail = VenueDetailResponse {
            venue: VenueResponse::from(make_venue(1, "The Musical Hop", "San Francisco", "CA")),
            past_shows: vec![],
            upcoming_shows: vec![],
            past_shows_count: 0,
            upcoming_shows_count: 0,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "The Musical Hop");
        assert_eq!(json["past_shows_count"], 0);
        assert!(json["upcoming_shows"].as_array().unwrap().is_empty());
    }
}
