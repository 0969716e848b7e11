use serde::{Deserialize, Serialize};

use crate::clock::VectorClock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfoRequest {
    pub player_id: String,
    pub game_mode: String,
    pub clock: VectorClock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Ok,
    AlreadyInQueue,
    InMatch,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuePlayerResponse {
    pub status: QueueStatus,
    pub message: String,
    pub clock: VectorClock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStatusRequest {
    pub player_id: String,
    pub clock: VectorClock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PlayerState {
    Idle,
    InQueue,
    InMatch,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStatusResponse {
    pub state: PlayerState,
    pub match_id: String,
    pub server_addr: String,
    pub clock: VectorClock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignMatchRequest {
    pub match_id: String,
    pub player_ids: Vec<String>,
    pub clock: VectorClock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignStatus {
    Ok,
    Busy,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignMatchResponse {
    pub status: AssignStatus,
    pub message: String,
    pub clock: VectorClock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ServerStatusKind {
    Available,
    Busy,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatusUpdateRequest {
    pub server_id: String,
    pub new_status: ServerStatusKind,
    pub address: String,
    pub match_id: String,
    pub clock: VectorClock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateResult {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatusUpdateResponse {
    pub status: UpdateResult,
    pub clock: VectorClock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRequest {}

/// Internal server status, a superset of [`ServerStatusKind`] that also
/// covers a server that has never reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ServerStatusFull {
    Unknown,
    Available,
    Busy,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub id: String,
    pub status: ServerStatusFull,
    pub address: String,
    pub current_match_id: String,
    pub last_heartbeat_ms_ago: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerQueueEntry {
    pub player_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatusResponse {
    pub servers: Vec<ServerInfo>,
    pub queue: Vec<PlayerQueueEntry>,
    pub clock: VectorClock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForcedStatus {
    ForceAvailable,
    ForceDown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminServerUpdateRequest {
    pub server_id: String,
    pub forced_status: ForcedStatus,
    pub clock: VectorClock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminResult {
    Ok,
    NotFound,
    Conflict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUpdateResponse {
    pub status: AdminResult,
    pub message: String,
    pub clock: VectorClock,
}

/// Envelope multiplexing every player/server/admin request over the
/// Matchmaker's single inbound listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    QueuePlayer(PlayerInfoRequest),
    GetPlayerStatus(PlayerStatusRequest),
    UpdateServerStatus(ServerStatusUpdateRequest),
    AdminGetSystemStatus(AdminRequest),
    AdminUpdateServerState(AdminServerUpdateRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    QueuePlayer(QueuePlayerResponse),
    GetPlayerStatus(PlayerStatusResponse),
    UpdateServerStatus(ServerStatusUpdateResponse),
    AdminGetSystemStatus(SystemStatusResponse),
    AdminUpdateServerState(AdminUpdateResponse),
}
