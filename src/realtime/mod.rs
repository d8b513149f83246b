//! Push-channel plumbing and the per-game realtime session.

mod channel;
mod events;
mod session;
mod socketio;

pub use channel::{PushChannel, PushConnector};
pub use events::{
    AuthenticateRequest, ClockEvent, GameConnectRequest, GameDataEvent, GameDisconnectRequest,
    MoveEvent, MoveRequest, Outgoing, PlayedMove, PushEvent, RawEvent, clock_topic,
    gamedata_topic, move_topic,
};
pub use session::{ConnectionState, GameDataHandler, MoveStatus, RealtimeSession, SessionView};
pub use socketio::{Frame, SocketIoChannel, WebSocketConnector, decode_frame, encode_event};
