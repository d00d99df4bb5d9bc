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
use std::sync::Arc;

use super::{ilike_pattern, SearchParams, SearchResponse};
use fyyur_db::entities::{artist, show, venue, Genres};
use fyyur_db::AppState;

#[derive(Debug, Serialize)]
pub struct ArtistResponse {
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
    pub seeking_venue: bool,
    pub seeking_description: Option<String>,
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
}

impl From<artist::Model> for ArtistResponse {
    fn from(a: artist::Model) -> Self {
        Self {
            id: a.id,
            name: a.name,
            city: a.city,
            state: a.state,
            address: a.address,
            phone: a.phone,
            genres: a.genres.0,
            image_link: a.image_link,
            website: a.website,
            facebook_link: a.facebook_link,
            seeking_venue: a.seeking_venue,
            seeking_description: a.seeking_description,
            created_at: a.created_at,
        }
    }
}

/// One row on the flat artist listing page.
#[derive(Debug, Serialize)]
pub struct ArtistSummary {
    pub id: i32,
    pub name: String,
}

/// A show on the artist page, seen from the artist's side.
#[derive(Debug, Serialize)]
pub struct ArtistShowSummary {
    pub venue_id: i32,
    pub venue_name: String,
    pub venue_image_link: Option<String>,
    pub start_time: chrono::DateTime<chrono::FixedOffset>,
}

#[derive(Debug, Serialize)]
pub struct ArtistDetailResponse {
    #[serde(flatten)]
    pub artist: ArtistResponse,
    pub past_shows: Vec<ArtistShowSummary>,
    pub upcoming_shows: Vec<ArtistShowSummary>,
    pub past_shows_count: usize,
    pub upcoming_shows_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ArtistPayload {
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
    pub seeking_venue: bool,
    pub seeking_description: Option<String>,
}

impl ArtistPayload {
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

/// GET /api/artists
pub async fn list_artists(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ArtistSummary>>, (StatusCode, String)> {
    let artists = artist::Entity::find()
        .order_by_asc(artist::Column::Id)
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    Ok(Json(
        artists
            .into_iter()
            .map(|a| ArtistSummary {
                id: a.id,
                name: a.name,
            })
            .collect(),
    ))
}

/// GET /api/artists/search?q=...
pub async fn search_artists(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse<ArtistResponse>>, (StatusCode, String)> {
    let pattern = ilike_pattern(&params.q);

    let matches = artist::Entity::find()
        .filter(Expr::col(artist::Column::Name).ilike(pattern))
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let data: Vec<ArtistResponse> = matches.into_iter().map(ArtistResponse::from).collect();

    Ok(Json(SearchResponse {
        count: data.len(),
        data,
    }))
}

/// GET /api/artists/:id
pub async fn get_artist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ArtistDetailResponse>, (StatusCode, String)> {
    let artist_model = artist::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Artist not found".to_string()))?;

    let rows = show::Entity::find()
        .filter(show::Column::ArtistId.eq(id))
        .order_by_asc(show::Column::StartTime)
        .find_also_related(venue::Entity)
        .all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let stamped: Vec<(chrono::DateTime<chrono::FixedOffset>, ArtistShowSummary)> = rows
        .into_iter()
        .filter_map(|(s, v)| {
            v.map(|v| {
                (
                    s.start_time,
                    ArtistShowSummary {
                        venue_id: v.id,
                        venue_name: v.name,
                        venue_image_link: v.image_link,
                        start_time: s.start_time,
                    },
                )
            })
        })
        .collect();

    let now = chrono::Utc::now().fixed_offset();
    let (past_shows, upcoming_shows) = super::shows::split_past_upcoming(stamped, now);

    Ok(Json(ArtistDetailResponse {
        artist: ArtistResponse::from(artist_model),
        past_shows_count: past_shows.len(),
        upcoming_shows_count: upcoming_shows.len(),
        past_shows,
        upcoming_shows,
    }))
}

/// POST /api/artists
pub async fn create_artist(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ArtistPayload>,
) -> Result<(StatusCode, Json<ArtistResponse>), (StatusCode, String)> {
    body.validate().map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let txn = state
        .db
        .begin()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let created = artist::ActiveModel {
        name: Set(body.name),
        city: Set(body.city),
        state: Set(body.state),
        address: Set(body.address),
        phone: Set(body.phone),
        genres: Set(Genres(body.genres)),
        image_link: Set(body.image_link),
        website: Set(body.website),
        facebook_link: Set(body.facebook_link),
        seeking_venue: Set(body.seeking_venue),
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

    tracing::info!(artist_id = created.id, name = %created.name, "artist created");

    Ok((StatusCode::CREATED, Json(ArtistResponse::from(created))))
}

/// PUT /api/artists/:id — overwrites every mutable field
pub async fn update_artist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(body): Json<ArtistPayload>,
) -> Result<Json<ArtistResponse>, (StatusCode, String)> {
    body.validate().map_err(|e| (StatusCode::BAD_REQUEST, e))?;

    let existing = artist::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?
        .ok_or((StatusCode::NOT_FOUND, "Artist not found".to_string()))?;

    let txn = state
        .db
        .begin()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    let mut active: artist::ActiveModel = existing.into();
    active.name = Set(body.name);
    active.city = Set(body.city);
    active.state = Set(body.state);
    active.address = Set(body.address);
    active.phone = Set(body.phone);
    active.genres = Set(Genres(body.genres));
    active.image_link = Set(body.image_link);
    active.website = Set(body.website);
    active.facebook_link = Set(body.facebook_link);
    active.seeking_venue = Set(body.seeking_venue);
    active.seeking_description = Set(body.seeking_description);

    let updated = active
        .update(&txn)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    txn.commit()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("DB error: {e}")))?;

    tracing::info!(artist_id = updated.id, "artist updated");

    Ok(Json(ArtistResponse::from(updated)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_artist_model() -> artist::Model {
        artist::Model {
            id: 4,
            name: "Guns N Petals".into(),
            city: "San Francisco".into(),
            state: "CA".into(),
            address: "1 Van Ness Avenue".into(),
            phone: "326-123-5000".into(),
            genres: Genres(vec!["Rock n Roll".into()]),
            image_link: Some("https://img.example.com/gnp.jpg".into()),
            website: Some("https://gunsnpetalsband.com".into()),
            facebook_link: None,
            seeking_venue: true,
            seeking_description: Some("Looking for shows to perform at".into()),
            created_at: Utc::now().fixed_offset(),
        }
    }

    fn make_payload() -> ArtistPayload {
        ArtistPayload {
            name: "Matt Quevedo".into(),
            city: "New York".into(),
            state: "NY".into(),
            address: "56 Mott Street".into(),
            phone: "300-400-5000".into(),
            genres: vec!["Jazz".into()],
            image_link: None,
            website: None,
            facebook_link: None,
            seeking_venue: false,
            seeking_description: None,
        }
    }

    #[test]
    fn test_artist_response_from_model() {
        let resp = ArtistResponse::from(make_artist_model());
        assert_eq!(resp.id, 4);
        assert_eq!(resp.name, "Guns N Petals");
        assert!(resp.seeking_venue);
        assert_eq!(resp.genres, vec!["Rock n Roll".to_string()]);
    }

    #[test]
    fn test_artist_detail_response_serialization() {
        let now = Utc::now().fixed_offset();
        let detail = ArtistDetailResponse {
            artist: ArtistResponse::from(make_artist_model()),
            past_shows: vec![],
            upcoming_shows: vec![ArtistShowSummary {
                venue_id: 1,
                venue_name: "The Musical Hop".into(),
                venue_image_link: None,
                start_time: now,
            }],
            past_shows_count: 0,
            upcoming_shows_count: 1,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "Guns N Petals");
        assert_eq!(json["upcoming_shows_count"], 1);
        assert_eq!(json["upcoming_shows"][0]["venue_name"], "The Musical Hop");
    }

    #[test]
    fn test_artist_payload_validation() {
        assert!(make_payload().validate().is_ok());

        let mut blank_phone = make_payload();
        blank_phone.phone = "".into();
        assert_eq!(
            blank_phone.validate().unwrap_err(),
            "phone must not be blank"
        );

        let mut no_genres = make_payload();
        no_genres.genres.clear();
        assert!(no_genres.validate().is_err());
    }

    #[test]
    fn test_artist_summary_serialization() {
        let summary = ArtistSummary {
            id: 4,
            name: "Guns N Petals".into(),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json, serde_json::json!({"id": 4, "name": "Guns N Petals"}));
    }
}
