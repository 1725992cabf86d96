use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::matches::{CommandError, MatchCommand, MatchRules, Slot};

#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from WebSocket clients.
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    /// Referee or admin control command.
    #[serde(rename = "control_match")]
    ControlMatch(ControlMatchRequest),
}

impl ClientMessage {
    /// Parse a text frame.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Raw control command as sent by referee consoles.
pub struct ControlMatchRequest {
    /// Target match id.
    pub match_id: String,
    /// Action name such as `START` or `ADD_SCORE_A`.
    pub action: String,
    /// Optional integer amount or penalty label.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub payload: Option<Value>,
}

impl ControlMatchRequest {
    /// Validate the request into a typed command, resolving payload defaults from `rules`.
    pub fn parse(&self, rules: &MatchRules) -> Result<(Uuid, MatchCommand), CommandError> {
        let match_id = Uuid::parse_str(self.match_id.trim())
            .map_err(|_| CommandError::InvalidMatchId(self.match_id.clone()))?;

        let amount = || integer_payload(self.payload.as_ref());
        let command = match self.action.as_str() {
            "START" => MatchCommand::Start,
            "PAUSE" => MatchCommand::Pause,
            "RESET" => MatchCommand::Reset,
            "ADD_SCORE_A" => MatchCommand::AddScore {
                slot: Slot::A,
                amount: amount().unwrap_or(1),
            },
            "ADD_SCORE_B" => MatchCommand::AddScore {
                slot: Slot::B,
                amount: amount().unwrap_or(1),
            },
            "ADD_PENALTY_A" => MatchCommand::AddPenalty {
                slot: Slot::A,
                reason: self.penalty_reason(rules),
            },
            "ADD_PENALTY_B" => MatchCommand::AddPenalty {
                slot: Slot::B,
                reason: self.penalty_reason(rules),
            },
            "ADD_TIME" => MatchCommand::AddTime {
                seconds: amount().unwrap_or(i64::from(rules.add_time_secs)),
            },
            "FINISH" => MatchCommand::Finish,
            "UNFINISH" => MatchCommand::Unfinish,
            "ADVANCE_BYE" => MatchCommand::AdvanceBye,
            other => return Err(CommandError::UnknownAction(other.to_string())),
        };

        Ok((match_id, command))
    }

    fn penalty_reason(&self, rules: &MatchRules) -> String {
        match self.payload.as_ref() {
            Some(Value::String(reason)) if !reason.trim().is_empty() => reason.trim().to_string(),
            _ => rules.default_penalty.clone(),
        }
    }
}

/// Integer payloads arrive either as JSON numbers or numeric strings. Fractions are
/// truncated toward zero.
fn integer_payload(payload: Option<&Value>) -> Option<i64> {
    match payload? {
        Value::Number(number) => number.as_i64().or_else(|| truncate(number.as_f64()?)),
        Value::String(text) => {
            let text = text.trim();
            text.parse().ok().or_else(|| truncate(text.parse().ok()?))
        }
        _ => None,
    }
}

fn truncate(value: f64) -> Option<i64> {
    value.is_finite().then(|| value.trunc() as i64)
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Acknowledgement sent to the connection that issued a control command.
pub struct CommandResult {
    /// Target match id as sent by the client.
    pub match_id: String,
    /// Action name as sent by the client.
    pub action: String,
    /// Whether the command was applied.
    pub accepted: bool,
    /// Rejection reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CommandResult {
    /// Positive acknowledgement.
    pub fn accepted(request: &ControlMatchRequest) -> Self {
        Self {
            match_id: request.match_id.clone(),
            action: request.action.clone(),
            accepted: true,
            reason: None,
        }
    }

    /// Negative acknowledgement carrying the reason.
    pub fn rejected(request: &ControlMatchRequest, reason: impl ToString) -> Self {
        Self {
            match_id: request.match_id.clone(),
            action: request.action.clone(),
            accepted: false,
            reason: Some(reason.to_string()),
        }
    }
}
