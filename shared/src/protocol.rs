//! Line-oriented text protocol spoken between client and server.
//!
//! Every message is a single newline-terminated line of colon-separated
//! fields. Floats travel with one decimal place, booleans as `"1"`/`"0"`.
//! Decoding is deliberately forgiving at the connection level: a line that
//! fails to decode is dropped by the caller and the stream keeps going.

use crate::PlayerState;
use thiserror::Error;

pub const SNAPSHOT_PREFIX: &str = "PLAYERS:";
pub const ATTACK_PREFIX: &str = "ATTACK:";
pub const DUPLICATE_REPLY: &str = "DUPLICATE";

/// Snapshot records carry eleven positional fields.
const RECORD_FIELDS: usize = 11;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("expected at least {expected} fields, got {got}")]
    FieldCount { expected: usize, got: usize },
    #[error("invalid numeric value in field `{field}`")]
    InvalidNumber { field: &'static str },
    #[error("unrecognized message")]
    UnknownMessage,
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

fn parse_flag(field: &str) -> bool {
    field == "1"
}

fn parse_f64(field: &str, name: &'static str) -> Result<f64, ProtocolError> {
    field
        .parse()
        .map_err(|_| ProtocolError::InvalidNumber { field: name })
}

fn parse_u32(field: &str, name: &'static str) -> Result<u32, ProtocolError> {
    field
        .parse()
        .map_err(|_| ProtocolError::InvalidNumber { field: name })
}

fn parse_u64(field: &str, name: &'static str) -> Result<u64, ProtocolError> {
    field
        .parse()
        .map_err(|_| ProtocolError::InvalidNumber { field: name })
}

fn parse_i32(field: &str, name: &'static str) -> Result<i32, ProtocolError> {
    field
        .parse()
        .map_err(|_| ProtocolError::InvalidNumber { field: name })
}

/// First line a client sends: `skinId:protocolVersion:playerName`.
///
/// The version field is transmitted but not validated. Only the third field
/// is taken as the name, so a name containing `:` is truncated there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub skin_id: u32,
    pub version: u32,
    pub name: String,
}

impl JoinRequest {
    pub fn new(skin_id: u32, name: &str) -> Self {
        Self {
            skin_id,
            version: crate::PROTOCOL_VERSION,
            name: name.to_string(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}:{}:{}", self.skin_id, self.version, self.name)
    }

    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() < 3 {
            return Err(ProtocolError::FieldCount {
                expected: 3,
                got: parts.len(),
            });
        }
        Ok(Self {
            skin_id: parse_u32(parts[0], "skin_id")?,
            version: parse_u32(parts[1], "version")?,
            name: parts[2].to_string(),
        })
    }
}

/// Server's answer to a join: the assigned id, or a duplicate rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinReply {
    Assigned(u32),
    Duplicate,
}

impl JoinReply {
    pub fn encode(&self) -> String {
        match self {
            JoinReply::Assigned(id) => id.to_string(),
            JoinReply::Duplicate => DUPLICATE_REPLY.to_string(),
        }
    }

    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        if line == DUPLICATE_REPLY {
            return Ok(JoinReply::Duplicate);
        }
        line.parse()
            .map(JoinReply::Assigned)
            .map_err(|_| ProtocolError::UnknownMessage)
    }
}

/// Periodic client self-report:
/// `x:y:angle:attackFlag:lastAttackTime:health:killCount:dashFlag`.
///
/// The dash flag was appended to the format later; updates carrying only
/// seven fields still decode, with dashing off.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateUpdate {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub attacking: bool,
    pub last_attack_time: u64,
    pub health: i32,
    pub kill_count: u32,
    pub dashing: bool,
}

impl StateUpdate {
    pub fn encode(&self) -> String {
        format!(
            "{:.1}:{:.1}:{:.1}:{}:{}:{}:{}:{}",
            self.x,
            self.y,
            self.angle,
            flag(self.attacking),
            self.last_attack_time,
            self.health,
            self.kill_count,
            flag(self.dashing)
        )
    }

    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() < 7 {
            return Err(ProtocolError::FieldCount {
                expected: 7,
                got: parts.len(),
            });
        }
        Ok(Self {
            x: parse_f64(parts[0], "x")?,
            y: parse_f64(parts[1], "y")?,
            angle: parse_f64(parts[2], "angle")?,
            attacking: parse_flag(parts[3]),
            last_attack_time: parse_u64(parts[4], "last_attack_time")?,
            health: parse_i32(parts[5], "health")?,
            kill_count: parse_u32(parts[6], "kill_count")?,
            dashing: parts.get(7).copied().map(parse_flag).unwrap_or(false),
        })
    }
}

/// Fire-and-forget swing notification: `ATTACK:x:y:angle:skinId`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackEvent {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub skin_id: u32,
}

impl AttackEvent {
    pub fn encode(&self) -> String {
        format!(
            "{}{:.1}:{:.1}:{:.1}:{}",
            ATTACK_PREFIX, self.x, self.y, self.angle, self.skin_id
        )
    }

    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let body = line
            .strip_prefix(ATTACK_PREFIX)
            .ok_or(ProtocolError::UnknownMessage)?;
        let parts: Vec<&str> = body.split(':').collect();
        if parts.len() < 4 {
            return Err(ProtocolError::FieldCount {
                expected: 4,
                got: parts.len(),
            });
        }
        Ok(Self {
            x: parse_f64(parts[0], "x")?,
            y: parse_f64(parts[1], "y")?,
            angle: parse_f64(parts[2], "angle")?,
            skin_id: parse_u32(parts[3], "skin_id")?,
        })
    }
}

pub fn encode_record(player: &PlayerState) -> String {
    format!(
        "{}:{}:{:.1}:{:.1}:{:.1}:{}:{}:{}:{}:{}:{}",
        player.id,
        player.skin_id,
        player.x,
        player.y,
        player.angle,
        flag(player.attacking),
        player.last_attack_time,
        player.name,
        player.health,
        player.kill_count,
        flag(player.dashing)
    )
}

pub fn decode_record(record: &str) -> Result<PlayerState, ProtocolError> {
    let parts: Vec<&str> = record.split(':').collect();
    if parts.len() < RECORD_FIELDS {
        return Err(ProtocolError::FieldCount {
            expected: RECORD_FIELDS,
            got: parts.len(),
        });
    }
    Ok(PlayerState {
        id: parse_u32(parts[0], "id")?,
        skin_id: parse_u32(parts[1], "skin_id")?,
        x: parse_f64(parts[2], "x")?,
        y: parse_f64(parts[3], "y")?,
        angle: parse_f64(parts[4], "angle")?,
        attacking: parse_flag(parts[5]),
        last_attack_time: parse_u64(parts[6], "last_attack_time")?,
        name: parts[7].to_string(),
        health: parse_i32(parts[8], "health")?,
        kill_count: parse_u32(parts[9], "kill_count")?,
        dashing: parse_flag(parts[10]),
    })
}

/// Serializes the full player list as one `PLAYERS:` line.
pub fn encode_snapshot(players: &[PlayerState]) -> String {
    let records: Vec<String> = players.iter().map(encode_record).collect();
    format!("{}{}", SNAPSHOT_PREFIX, records.join(";"))
}

/// Decodes a `PLAYERS:` line. Records that fail to decode are skipped so
/// one corrupt entry cannot take down the rest of the snapshot.
pub fn decode_snapshot(line: &str) -> Result<Vec<PlayerState>, ProtocolError> {
    let body = line
        .strip_prefix(SNAPSHOT_PREFIX)
        .ok_or(ProtocolError::UnknownMessage)?;
    if body.is_empty() {
        return Ok(Vec::new());
    }
    Ok(body
        .split(';')
        .filter_map(|record| decode_record(record).ok())
        .collect())
}

/// Everything a client may send after the handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Attack(AttackEvent),
    State(StateUpdate),
}

impl ClientMessage {
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        if line.starts_with(ATTACK_PREFIX) {
            AttackEvent::decode(line).map(ClientMessage::Attack)
        } else {
            StateUpdate::decode(line).map(ClientMessage::State)
        }
    }
}

/// Everything a server may send after the handshake. Unrecognized lines
/// surface as `Other` for the generic per-line handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Snapshot(Vec<PlayerState>),
    Attack(AttackEvent),
    Duplicate,
    Other(String),
}

impl ServerMessage {
    pub fn decode(line: &str) -> Self {
        if line.starts_with(SNAPSHOT_PREFIX) {
            match decode_snapshot(line) {
                Ok(players) => ServerMessage::Snapshot(players),
                Err(_) => ServerMessage::Other(line.to_string()),
            }
        } else if line.starts_with(ATTACK_PREFIX) {
            match AttackEvent::decode(line) {
                Ok(event) => ServerMessage::Attack(event),
                Err(_) => ServerMessage::Other(line.to_string()),
            }
        } else if line == DUPLICATE_REPLY {
            ServerMessage::Duplicate
        } else {
            ServerMessage::Other(line.to_string())
        }
    }
}
