//! Realtime session for one game.
//!
//! A [`RealtimeSession`] reconciles the REST snapshot with the push channel:
//! the snapshot is authoritative, and push events only trigger a refetch
//! (or, for passes, a fast-path flag update). All state lives behind a single
//! mutex and every push event is dispatched by one background task, so a
//! push-triggered refresh and a caller's [`RealtimeSession::refresh_snapshot`]
//! can never interleave a partial update. Readers get an `Arc` to a fully
//! built [`BoardSnapshot`].

use super::channel::{PushChannel, PushConnector};
use super::events::{
    AuthenticateRequest, ClockEvent, GameConnectRequest, GameDataEvent, GameDisconnectRequest,
    MoveEvent, MoveRequest, Outgoing, PushEvent,
};
use crate::api::GameApi;
use crate::board::{BoardSnapshot, Phase, TurnStatus, TurnTracker};
use crate::coords::{self, Position};
use crate::cursor::SelectionCursor;
use crate::error::{ErrorKind, GoError, GoResult};
use crate::identity::{GameId, Identity, PlayerId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Connection lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ConnectionState {
    /// No channel open. Initial and re-enterable state.
    Disconnected,
    /// Opening the push channel.
    Connecting,
    /// Channel open and joined; not yet allowed to write.
    Subscribing,
    /// Authenticated; moves may be submitted.
    Live,
    /// Unrecoverable failure; call `connect` again to start over.
    Faulted,
}

impl ConnectionState {
    fn is_attached(self) -> bool {
        matches!(self, ConnectionState::Subscribing | ConnectionState::Live)
    }
}

/// Outcome of a move submission that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum MoveStatus {
    /// Published on the push channel. Legality is up to the server.
    Sent,
    /// The game is over; nothing was published.
    AlreadyFinished,
    /// [`RealtimeSession::authenticate`] has not completed; nothing was published.
    NotAuthenticated,
}

/// Callback for full game-data events.
pub type GameDataHandler = Box<dyn Fn(&GameDataEvent) + Send + Sync>;

type SharedHandler<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    game_data: Option<SharedHandler<GameDataEvent>>,
    on_move: Option<SharedHandler<MoveEvent>>,
    on_clock: Option<SharedHandler<ClockEvent>>,
}

/// Consistent view of everything the board screen draws.
#[derive(Debug, Clone)]
pub struct SessionView {
    /// Connection state.
    pub state: ConnectionState,
    /// Latest adopted snapshot.
    pub snapshot: Option<Arc<BoardSnapshot>>,
    /// Current selection.
    pub cursor: SelectionCursor,
    /// Derived turn status, when a snapshot is present.
    pub turn: Option<TurnStatus>,
    /// Latest clock tick.
    pub clock: Option<ClockEvent>,
}

struct SessionState {
    connection: ConnectionState,
    game_id: Option<GameId>,
    generation: u64,
    authenticated: bool,
    snapshot: Option<Arc<BoardSnapshot>>,
    applied_move_number: i64,
    last_turn_pass: bool,
    realtime_finished: bool,
    clock: Option<ClockEvent>,
    /// Running clock's owner, set by ticks since the cached snapshot's move.
    clock_player: Option<PlayerId>,
    cursor: Option<SelectionCursor>,
    handlers: Handlers,
    commands: Option<mpsc::UnboundedSender<Outgoing>>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            game_id: None,
            generation: 0,
            authenticated: false,
            snapshot: None,
            applied_move_number: i64::MIN,
            last_turn_pass: false,
            realtime_finished: false,
            clock: None,
            clock_player: None,
            cursor: None,
            handlers: Handlers::default(),
            commands: None,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.connection.is_attached()
    }

    fn clear_game(&mut self) {
        self.authenticated = false;
        self.snapshot = None;
        self.applied_move_number = i64::MIN;
        self.last_turn_pass = false;
        self.realtime_finished = false;
        self.clock = None;
        self.clock_player = None;
        self.cursor = None;
    }

    fn publish(&self, request: Outgoing) -> GoResult<()> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| GoError::new(ErrorKind::NotConnected))?;
        commands
            .send(request)
            .map_err(|_| GoError::new(ErrorKind::NotConnected))
    }

    /// Dropping the command sender lets the event loop drain and close the channel.
    fn fault(&mut self) {
        warn!(game_id = ?self.game_id, "Session faulted");
        self.connection = ConnectionState::Faulted;
        self.authenticated = false;
        self.commands = None;
    }

    fn is_finished(&self) -> bool {
        self.realtime_finished || self.snapshot.as_ref().is_some_and(|s| s.is_finished())
    }
}

struct SessionCore {
    api: Arc<dyn GameApi>,
    connector: Arc<dyn PushConnector>,
    identity: Identity,
    state: Mutex<SessionState>,
}

impl SessionCore {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attached_game(&self) -> GoResult<(u64, GameId)> {
        let st = self.lock();
        match (st.connection.is_attached(), st.game_id) {
            (true, Some(game_id)) => Ok((st.generation, game_id)),
            _ => Err(GoError::new(ErrorKind::NotConnected)),
        }
    }

    #[instrument(skip(self))]
    async fn refresh(&self, generation: u64, game_id: GameId) -> GoResult<Arc<BoardSnapshot>> {
        debug!("Fetching board snapshot");
        let fetched = self.api.game_state(game_id).await?;
        self.adopt(generation, fetched)
    }

    fn adopt(&self, generation: u64, fetched: BoardSnapshot) -> GoResult<Arc<BoardSnapshot>> {
        let mut st = self.lock();
        if !st.is_current(generation) {
            debug!("Discarding snapshot fetched for a closed session");
            return Err(GoError::new(ErrorKind::NotConnected));
        }
        if let Some(cached) = st.snapshot.clone() {
            if !cached.same_dimensions(&fetched) {
                let err = GoError::new(ErrorKind::DimensionChanged {
                    old_width: cached.width(),
                    old_height: cached.height(),
                    new_width: fetched.width(),
                    new_height: fetched.height(),
                });
                error!(error = %err, "Protocol violation");
                st.fault();
                return Err(err);
            }
            if fetched.move_number() < cached.move_number() {
                debug!(
                    cached = cached.move_number(),
                    fetched = fetched.move_number(),
                    "Keeping newer cached snapshot"
                );
                return Ok(cached);
            }
        }
        if st
            .snapshot
            .as_ref()
            .is_none_or(|cached| fetched.move_number() > cached.move_number())
        {
            st.clock_player = None;
        }
        let snapshot = Arc::new(fetched);
        st.applied_move_number = st.applied_move_number.max(snapshot.move_number());
        if snapshot.is_finished() {
            if let Some(cursor) = st.cursor.as_mut() {
                cursor.reset();
            }
        }
        st.snapshot = Some(Arc::clone(&snapshot));
        debug!(
            move_number = snapshot.move_number(),
            phase = %snapshot.phase(),
            "Adopted snapshot"
        );
        Ok(snapshot)
    }

    /// Refresh failures other than protocol violations leave the cached snapshot in place.
    async fn refresh_in_background(&self, generation: u64, game_id: GameId) -> GoResult<()> {
        match self.refresh(generation, game_id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_protocol_violation() => Err(e),
            Err(e) => {
                warn!(error = %e, "Push-triggered refresh failed");
                Ok(())
            }
        }
    }

    #[instrument(skip(self, event))]
    async fn dispatch(&self, generation: u64, game_id: GameId, event: PushEvent) -> GoResult<()> {
        match event {
            PushEvent::GameData(data) => {
                {
                    let mut st = self.lock();
                    if !st.is_current(generation) {
                        return Ok(());
                    }
                    if data.phase == Phase::Finished {
                        info!("Game finished");
                        st.realtime_finished = true;
                        if let Some(cursor) = st.cursor.as_mut() {
                            cursor.reset();
                        }
                    }
                }
                self.refresh_in_background(generation, game_id).await?;
                let handler = self.handler(generation, |h| h.game_data.clone());
                if let Some(handler) = handler {
                    handler(&data);
                }
            }
            PushEvent::MovePlayed(played) => {
                let pass = {
                    let mut st = self.lock();
                    if !st.is_current(generation) {
                        return Ok(());
                    }
                    if played.move_number <= st.applied_move_number {
                        debug!(
                            move_number = played.move_number,
                            applied = st.applied_move_number,
                            "Ignoring already-applied move"
                        );
                        return Ok(());
                    }
                    st.last_turn_pass = played.is_pass();
                    if st.last_turn_pass {
                        // The board is unchanged, so no refetch; remember the number instead.
                        st.applied_move_number = played.move_number;
                    }
                    st.last_turn_pass
                };
                info!(
                    move_number = played.move_number,
                    position = %played.played.position,
                    "Move played"
                );
                if !pass {
                    self.refresh_in_background(generation, game_id).await?;
                }
                let handler = self.handler(generation, |h| h.on_move.clone());
                if let Some(handler) = handler {
                    handler(&played);
                }
            }
            PushEvent::ClockTick(clock) => {
                {
                    let mut st = self.lock();
                    if !st.is_current(generation) {
                        return Ok(());
                    }
                    st.clock_player = Some(clock.current_player);
                    st.clock = Some(clock.clone());
                }
                let handler = self.handler(generation, |h| h.on_clock.clone());
                if let Some(handler) = handler {
                    handler(&clock);
                }
            }
        }
        Ok(())
    }

    fn handler<T>(
        &self,
        generation: u64,
        pick: impl FnOnce(&Handlers) -> Option<SharedHandler<T>>,
    ) -> Option<SharedHandler<T>> {
        let st = self.lock();
        if st.generation == generation {
            pick(&st.handlers)
        } else {
            None
        }
    }

    fn fault_if_current(&self, generation: u64) {
        let mut st = self.lock();
        if st.generation == generation && st.connection != ConnectionState::Disconnected {
            st.fault();
        }
    }
}

/// Background task owning the push channel for one connection.
///
/// Publishes queued requests in order and dispatches incoming events one at a
/// time. Exits when the command sender is dropped (disconnect or fault), when
/// the channel fails, or when every session handle is gone.
async fn run_event_loop(
    core: Weak<SessionCore>,
    generation: u64,
    game_id: GameId,
    mut channel: Box<dyn PushChannel>,
    mut commands: mpsc::UnboundedReceiver<Outgoing>,
) {
    debug!(game_id, generation, "Event loop started");
    loop {
        tokio::select! {
            request = commands.recv() => {
                let Some(request) = request else {
                    debug!("Command channel closed, shutting down event loop");
                    break;
                };
                debug!(name = request.name(), "Publishing request");
                if let Err(e) = channel.emit(request.name(), request.payload()).await {
                    error!(error = %e, "Failed to publish request");
                    if let Some(core) = core.upgrade() {
                        core.fault_if_current(generation);
                    }
                    break;
                }
            }
            incoming = channel.recv() => {
                let Some(core) = core.upgrade() else {
                    debug!("Session dropped, shutting down event loop");
                    break;
                };
                match incoming {
                    Some(Ok(raw)) => match PushEvent::decode(game_id, &raw) {
                        Ok(Some(event)) => {
                            if let Err(e) = core.dispatch(generation, game_id, event).await {
                                error!(error = %e, "Stopping event loop");
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "Dropping malformed push event"),
                    },
                    Some(Err(e)) => {
                        error!(error = %e, "Push channel failed");
                        core.fault_if_current(generation);
                        break;
                    }
                    None => {
                        warn!("Push channel closed by server");
                        core.fault_if_current(generation);
                        break;
                    }
                }
            }
        }
    }
    if let Err(e) = channel.close().await {
        debug!(error = %e, "Error while closing push channel");
    }
    debug!(game_id, generation, "Event loop exited");
}

/// Live connection to one game on behalf of one player.
///
/// Cheap to clone; clones share the same session. Network operations are
/// `async` and may be spawned onto any task; state reads never block on the
/// network.
#[derive(Clone)]
pub struct RealtimeSession {
    core: Arc<SessionCore>,
}

impl std::fmt::Debug for RealtimeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.core.lock();
        f.debug_struct("RealtimeSession")
            .field("player_id", self.core.identity.player_id())
            .field("game_id", &st.game_id)
            .field("state", &st.connection)
            .field("authenticated", &st.authenticated)
            .finish()
    }
}

impl RealtimeSession {
    /// Creates a disconnected session acting for `identity`.
    #[instrument(skip(api, connector), fields(player_id = identity.player_id()))]
    pub fn new(
        api: Arc<dyn GameApi>,
        connector: Arc<dyn PushConnector>,
        identity: Identity,
    ) -> Self {
        info!("Creating realtime session");
        Self {
            core: Arc::new(SessionCore {
                api,
                connector,
                identity,
                state: Mutex::new(SessionState::new()),
            }),
        }
    }

    /// Opens the push channel for `game_id`, joins it and fetches the first snapshot.
    ///
    /// `on_game_data` runs whenever the server broadcasts full game data: once
    /// after joining and again on entering stone removal or finishing.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::InvalidState`] unless disconnected or faulted.
    /// - [`ErrorKind::ConnectFailed`] if the channel cannot be opened; the
    ///   session stays disconnected.
    /// - Any error from the first snapshot fetch; the session is torn down
    ///   again so the call can be retried.
    #[instrument(skip(self, on_game_data))]
    pub async fn connect(
        &self,
        game_id: GameId,
        on_game_data: Option<GameDataHandler>,
    ) -> GoResult<()> {
        let generation = {
            let mut st = self.core.lock();
            match st.connection {
                ConnectionState::Disconnected | ConnectionState::Faulted => {}
                other => {
                    return Err(GoError::new(ErrorKind::InvalidState(format!(
                        "connect called while {other}"
                    ))));
                }
            }
            st.generation += 1;
            st.connection = ConnectionState::Connecting;
            st.game_id = Some(game_id);
            st.commands = None;
            st.clear_game();
            st.handlers.game_data = on_game_data.map(SharedHandler::from);
            st.generation
        };
        info!("Connecting to game");

        let channel = match self.core.connector.open().await {
            Ok(channel) => channel,
            Err(e) => {
                let mut st = self.core.lock();
                if st.generation == generation {
                    st.connection = ConnectionState::Disconnected;
                    st.game_id = None;
                    st.handlers = Handlers::default();
                }
                warn!(error = %e, "Failed to open push channel");
                return Err(match e.kind {
                    ErrorKind::ConnectFailed(_) => e,
                    other => GoError::new(ErrorKind::ConnectFailed(other.to_string())),
                });
            }
        };

        {
            let mut st = self.core.lock();
            if st.generation != generation {
                debug!("Disconnected while opening channel");
                return Err(GoError::new(ErrorKind::NotConnected));
            }
            let (tx, rx) = mpsc::unbounded_channel();
            st.commands = Some(tx);
            st.publish(Outgoing::GameConnect(GameConnectRequest {
                game_id,
                player_id: *self.core.identity.player_id(),
                chat: false,
            }))?;
            st.connection = ConnectionState::Subscribing;
            st.cursor = Some(SelectionCursor::new());
            tokio::spawn(run_event_loop(
                Arc::downgrade(&self.core),
                generation,
                game_id,
                channel,
                rx,
            ));
        }

        if let Err(e) = self.core.refresh(generation, game_id).await {
            warn!(error = %e, "Initial snapshot fetch failed");
            self.disconnect();
            return Err(e);
        }
        info!("Subscribed to game");
        Ok(())
    }

    /// Exchanges a chat token for write access on the push channel.
    ///
    /// Must complete before [`RealtimeSession::submit_move`] will publish.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotConnected`] unless subscribed, including when the session
    /// was disconnected while the token was in flight. [`ErrorKind::Transport`]
    /// for an empty token; the session stays unauthenticated.
    #[instrument(skip(self))]
    pub async fn authenticate(&self) -> GoResult<()> {
        let (generation, game_id) = self.core.attached_game()?;
        let token = self.core.api.chat_token().await?;
        if token.is_empty() {
            warn!("Service issued an empty chat token");
            return Err(GoError::new(ErrorKind::Transport(
                "empty chat token".to_string(),
            )));
        }

        let mut st = self.core.lock();
        if !st.is_current(generation) {
            debug!("Discarding chat token for a closed session");
            return Err(GoError::new(ErrorKind::NotConnected));
        }
        st.publish(Outgoing::Authenticate(AuthenticateRequest {
            auth: token,
            player_id: *self.core.identity.player_id(),
            username: self.core.identity.username().clone(),
        }))?;
        st.authenticated = true;
        st.connection = ConnectionState::Live;
        info!(game_id, "Authenticated on push channel");
        Ok(())
    }

    /// Registers the move-played handler, replacing any previous one.
    pub fn on_move(&self, handler: impl Fn(&MoveEvent) + Send + Sync + 'static) {
        self.core.lock().handlers.on_move = Some(Arc::new(handler));
    }

    /// Registers the clock-tick handler, replacing any previous one.
    pub fn on_clock(&self, handler: impl Fn(&ClockEvent) + Send + Sync + 'static) {
        self.core.lock().handlers.on_clock = Some(Arc::new(handler));
    }

    /// Fetches the full board and makes it the cached snapshot.
    ///
    /// A fetch older than the cached snapshot is not adopted; the cached one is
    /// returned instead.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::NotConnected`] if not connected, or if the session was
    ///   disconnected while the fetch was in flight.
    /// - [`ErrorKind::DimensionChanged`] if the board size changed; the session
    ///   is faulted.
    /// - Transport and malformed-data errors from the fetch; the cache is untouched.
    #[instrument(skip(self))]
    pub async fn refresh_snapshot(&self) -> GoResult<Arc<BoardSnapshot>> {
        let (generation, game_id) = self.core.attached_game()?;
        self.core.refresh(generation, game_id).await
    }

    /// Publishes a move at `(x, y)`; `(-1, -1)` passes.
    ///
    /// No legality check is made locally.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::NotConnected`] without a live channel, or
    /// [`ErrorKind::UnsupportedCoordinate`] if the position cannot be encoded.
    #[instrument(skip(self))]
    pub fn submit_move(&self, x: i32, y: i32) -> GoResult<MoveStatus> {
        let st = self.core.lock();
        let game_id = match (st.connection.is_attached(), st.game_id) {
            (true, Some(game_id)) => game_id,
            _ => return Err(GoError::new(ErrorKind::NotConnected)),
        };
        if st.is_finished() {
            info!("Game is finished, not sending move");
            return Ok(MoveStatus::AlreadyFinished);
        }
        if !st.authenticated {
            warn!("Move attempted before authentication");
            return Ok(MoveStatus::NotAuthenticated);
        }
        let notation = coords::encode(Position::new(x, y))?;
        st.publish(Outgoing::Move(MoveRequest {
            game_id,
            player_id: *self.core.identity.player_id(),
            notation,
        }))?;
        info!(game_id, "Move submitted");
        Ok(MoveStatus::Sent)
    }

    /// Passes the turn.
    pub fn pass(&self) -> GoResult<MoveStatus> {
        self.submit_move(Position::PASS.x, Position::PASS.y)
    }

    /// Leaves the game, closes the channel and drops all handlers.
    ///
    /// Idempotent. Fetches still in flight complete but are discarded.
    #[instrument(skip(self))]
    pub fn disconnect(&self) {
        let mut st = self.core.lock();
        if st.connection == ConnectionState::Disconnected {
            return;
        }
        info!(game_id = ?st.game_id, state = %st.connection, "Disconnecting");
        if let Some(game_id) = st.game_id {
            // Best effort; the loop is already gone if the session faulted.
            let _ = st.publish(Outgoing::GameDisconnect(GameDisconnectRequest { game_id }));
        }
        st.generation += 1;
        st.connection = ConnectionState::Disconnected;
        st.game_id = None;
        st.commands = None;
        st.handlers = Handlers::default();
        st.clear_game();
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.core.lock().connection
    }

    /// Game this session is bound to, if connected.
    pub fn game_id(&self) -> Option<GameId> {
        self.core.lock().game_id
    }

    /// The player this session acts for.
    pub fn identity(&self) -> &Identity {
        &self.core.identity
    }

    /// True once [`RealtimeSession::authenticate`] has completed.
    pub fn is_authenticated(&self) -> bool {
        self.core.lock().authenticated
    }

    /// Latest adopted snapshot.
    pub fn snapshot(&self) -> Option<Arc<BoardSnapshot>> {
        self.core.lock().snapshot.clone()
    }

    /// True if the latest move event was a pass.
    pub fn last_turn_pass(&self) -> bool {
        self.core.lock().last_turn_pass
    }

    /// True if either the push channel or the snapshot says the game is over.
    pub fn is_finished(&self) -> bool {
        self.core.lock().is_finished()
    }

    /// Latest clock tick.
    pub fn clock(&self) -> Option<ClockEvent> {
        self.core.lock().clock.clone()
    }

    /// Turn status for the local player.
    pub fn turn_status(&self) -> Option<TurnStatus> {
        self.view().turn
    }

    /// Everything the board screen needs, read under one lock.
    pub fn view(&self) -> SessionView {
        let st = self.core.lock();
        let tracker = TurnTracker::new(*self.core.identity.player_id());
        SessionView {
            state: st.connection,
            snapshot: st.snapshot.clone(),
            cursor: st.cursor.unwrap_or_default(),
            turn: st
                .snapshot
                .as_ref()
                .map(|s| {
                    tracker.status(s, st.realtime_finished, st.last_turn_pass, st.clock_player)
                }),
            clock: st.clock.clone(),
        }
    }

    /// Moves the selection cursor against the latest snapshot.
    ///
    /// No-op when there is no snapshot or the session is not connected.
    pub fn move_selection(&self, dx: i32, dy: i32) {
        let mut st = self.core.lock();
        let finished = st.realtime_finished;
        let Some(snapshot) = st.snapshot.clone() else {
            return;
        };
        if let Some(cursor) = st.cursor.as_mut() {
            if finished {
                cursor.reset();
            } else {
                cursor.move_selection(dx, dy, &snapshot);
            }
        }
    }

    /// Clears the selection.
    pub fn reset_selection(&self) {
        if let Some(cursor) = self.core.lock().cursor.as_mut() {
            cursor.reset();
        }
    }

    /// Currently selected intersection.
    pub fn selected(&self) -> Option<Position> {
        self.core.lock().cursor.and_then(|c| c.selected())
    }
}
