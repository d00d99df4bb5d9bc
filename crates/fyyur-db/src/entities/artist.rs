use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::Genres;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "artists")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: String,
    #[sea_orm(unique)]
    pub phone: String,
    #[sea_orm(column_type = "JsonBinary")]
    pub genres: Genres,
    pub image_link: Option<String>,
    pub website: Option<String>,
    pub facebook_link: Option<String>,
    pub seeking_venue: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub seeking_description: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::show::Entity")]
    Show,
}

impl Related<super::show::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Show.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
