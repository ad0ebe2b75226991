use serde::{Deserialize, Serialize};
use shared::domain::Address;

use crate::ConnectionState;

/// The four mutually exclusive render states the view layer can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RenderState {
    PromptConnect,
    PromptJoin,
    JoinPending,
    AlreadyJoined,
}

/// Pure projection of controller state onto a render state. No side effects.
pub fn project(connection: ConnectionState, whitelisted: bool, join_pending: bool) -> RenderState {
    match connection {
        ConnectionState::Disconnected | ConnectionState::Connecting => RenderState::PromptConnect,
        ConnectionState::Connected if join_pending => RenderState::JoinPending,
        ConnectionState::Connected if whitelisted => RenderState::AlreadyJoined,
        ConnectionState::Connected => RenderState::PromptJoin,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    pub render_state: RenderState,
    pub whitelist_count: u64,
    pub connected_address: Option<Address>,
    pub last_call_error: Option<String>,
}
