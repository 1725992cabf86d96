use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use uuid::Uuid;

use crate::dao::models::{CompetitorEntity, MatchEntity, SlotEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMatchDocument {
    #[serde(rename = "_id", with = "binary_uuid")]
    id: Uuid,
    #[serde(default)]
    bracket_id: Option<Uuid>,
    competitor_a: Option<Uuid>,
    competitor_b: Option<Uuid>,
    score_a: u32,
    score_b: u32,
    #[serde(default)]
    penalties_a: Vec<String>,
    #[serde(default)]
    penalties_b: Vec<String>,
    time_remaining: u32,
    is_active: bool,
    is_finished: bool,
    winner: Option<Uuid>,
    category: String,
    round: String,
    level: String,
    next_match_id: Option<Uuid>,
    position_in_next_match: Option<SlotEntity>,
    referee_id: Option<String>,
    #[serde(default)]
    show_in_dashboard: bool,
    #[serde(default)]
    started_at: Option<DateTime>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<MatchEntity> for MongoMatchDocument {
    fn from(value: MatchEntity) -> Self {
        Self {
            id: value.id,
            bracket_id: value.bracket_id,
            competitor_a: value.competitor_a,
            competitor_b: value.competitor_b,
            score_a: value.score_a,
            score_b: value.score_b,
            penalties_a: value.penalties_a,
            penalties_b: value.penalties_b,
            time_remaining: value.time_remaining,
            is_active: value.is_active,
            is_finished: value.is_finished,
            winner: value.winner,
            category: value.category,
            round: value.round,
            level: value.level,
            next_match_id: value.next_match_id,
            position_in_next_match: value.position_in_next_match,
            referee_id: value.referee_id,
            show_in_dashboard: value.show_in_dashboard,
            started_at: value.started_at.map(DateTime::from_system_time),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoMatchDocument> for MatchEntity {
    fn from(value: MongoMatchDocument) -> Self {
        Self {
            id: value.id,
            bracket_id: value.bracket_id,
            competitor_a: value.competitor_a,
            competitor_b: value.competitor_b,
            score_a: value.score_a,
            score_b: value.score_b,
            penalties_a: value.penalties_a,
            penalties_b: value.penalties_b,
            time_remaining: value.time_remaining,
            is_active: value.is_active,
            is_finished: value.is_finished,
            winner: value.winner,
            category: value.category,
            round: value.round,
            level: value.level,
            next_match_id: value.next_match_id,
            position_in_next_match: value.position_in_next_match,
            referee_id: value.referee_id,
            show_in_dashboard: value.show_in_dashboard,
            started_at: value.started_at.map(DateTime::to_system_time),
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoCompetitorDocument {
    #[serde(rename = "_id", with = "binary_uuid")]
    id: Uuid,
    name: String,
    #[serde(default)]
    institution_name: Option<String>,
}

impl From<CompetitorEntity> for MongoCompetitorDocument {
    fn from(value: CompetitorEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            institution_name: value.institution_name,
        }
    }
}

impl From<MongoCompetitorDocument> for CompetitorEntity {
    fn from(value: MongoCompetitorDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            institution_name: value.institution_name,
        }
    }
}

fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

/// `_id` codec shared by the documents and [`doc_id`] so filters match stored keys.
mod binary_uuid {
    use super::*;

    pub fn serialize<S: Serializer>(id: &Uuid, serializer: S) -> Result<S::Ok, S::Error> {
        uuid_as_binary(*id).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Uuid, D::Error> {
        let binary = Binary::deserialize(deserializer)?;
        Uuid::from_slice(&binary.bytes).map_err(D::Error::custom)
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
