//! Messaging-session lifecycle as an explicit state machine, independent
//! of whatever runtime hosts the connection.

/// Session states. `Ready` carries the resolved destination chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Ready { chat_id: i64 },
    AuthFailed(String),
    Disconnected(String),
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connect,
    Resolved(i64),
    AuthRejected(String),
    Lost(String),
}

impl SessionState {
    /// Pure transition function. Undefined pairs leave the state unchanged.
    pub fn apply(self, event: SessionEvent) -> SessionState {
        use SessionEvent::*;
        use SessionState::*;

        match (self, event) {
            (Idle | Disconnected(_), Connect) => Connecting,
            (Connecting, Resolved(chat_id)) => Ready { chat_id },
            (Connecting, AuthRejected(reason)) => AuthFailed(reason),
            (Connecting | Ready { .. }, Lost(reason)) => Disconnected(reason),
            (state, _) => state,
        }
    }
}
