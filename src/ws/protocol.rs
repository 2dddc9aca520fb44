//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MatchId = i64;
pub type TeamId = i64;
pub type PlayerId = i64;

/// Playing position as stored in the player registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

/// A player as attributed on match events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jersey_number: Option<u8>,
}

/// Team taking part in a simulated match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamInfo {
    pub id: TeamId,
    pub name: String,
    /// Known roster. Home rosters are resolved before kick-off when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roster: Option<Vec<Player>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

/// Match event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    MatchStart,
    Goal,
    ShotOnTarget,
    ShotOffTarget,
    Corner,
    Foul,
    CardYellow,
    CardRed,
    Offside,
    Penalty,
    HalfTime,
    MatchEnd,
}

impl EventType {
    /// Team-level events never carry a player
    pub fn is_team_level(self) -> bool {
        matches!(
            self,
            EventType::MatchStart | EventType::Corner | EventType::HalfTime | EventType::MatchEnd
        )
    }
}

/// A single in-match event. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub id: Uuid,
    pub match_id: MatchId,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub minute: u32,
    /// Unix millis
    pub timestamp: u64,
    pub team_id: TeamId,
    pub team_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<Player>,
    /// Assisting player on goals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_player: Option<Player>,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Receive broadcasts for a match
    SubscribeToMatch { match_id: MatchId },

    /// Stop receiving broadcasts for a match
    UnsubscribeFromMatch { match_id: MatchId },

    /// Start a new live simulation
    StartMatch {
        match_id: MatchId,
        home_team: TeamInfo,
        away_team: TeamInfo,
    },
}

impl ClientMsg {
    pub fn action(&self) -> &'static str {
        match self {
            ClientMsg::SubscribeToMatch { .. } => "subscribe_to_match",
            ClientMsg::UnsubscribeFromMatch { .. } => "unsubscribe_from_match",
            ClientMsg::StartMatch { .. } => "start_match",
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Acknowledgement of an inbound request
    Response {
        action: String,
        success: bool,
        message: String,
    },

    /// One live event for a subscribed match
    MatchEvent { event: MatchEvent },

    /// Terminal broadcast with the full event log
    MatchEnded {
        match_id: MatchId,
        score: Score,
        events: Vec<MatchEvent>,
    },

    /// Error message
    Error { code: String, message: String },
}

impl ServerMsg {
    pub fn response(action: &str, success: bool, message: impl Into<String>) -> Self {
        ServerMsg::Response {
            action: action.to_string(),
            success,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_match_without_away_roster() {
        let raw = r#"{
            "type": "start_match",
            "match_id": 42,
            "home_team": {"id": 1, "name": "Home", "roster": [
                {"id": 10, "name": "Keeper", "position": "GOALKEEPER", "jersey_number": 1}
            ]},
            "away_team": {"id": 2, "name": "Away"}
        }"#;

        let msg: ClientMsg = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMsg::StartMatch {
                match_id,
                home_team,
                away_team,
            } => {
                assert_eq!(match_id, 42);
                assert_eq!(home_team.roster.unwrap()[0].position, Position::Goalkeeper);
                assert!(away_team.roster.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn match_event_is_tagged_and_uses_screaming_event_types() {
        let event = MatchEvent {
            id: Uuid::nil(),
            match_id: 7,
            event_type: EventType::CardYellow,
            minute: 35,
            timestamp: 0,
            team_id: 1,
            team_name: "Home".to_string(),
            player: None,
            related_player: None,
        };

        let json = serde_json::to_value(ServerMsg::MatchEvent { event }).unwrap();
        assert_eq!(json["type"], "match_event");
        assert_eq!(json["event"]["type"], "CARD_YELLOW");
        assert!(json["event"].get("player").is_none());
    }

    #[test]
    fn team_level_events() {
        assert!(EventType::Corner.is_team_level());
        assert!(EventType::HalfTime.is_team_level());
        assert!(!EventType::Goal.is_team_level());
        assert!(!EventType::Foul.is_team_level());
    }
}
