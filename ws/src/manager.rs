use crate::client::{self, Mailbox};
use crate::connection::{ClientId, Connection, Frame};
use crate::dispatch::DispatchTable;
use crate::error::Error;
use events::Event;
use log::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

/// Default number of frames a client may have queued before it is evicted.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Largest mailbox a client may be given. Capacities above this are clamped.
pub const MAX_MAILBOX_CAPACITY: usize = 65_536;

/// Requests processed, in arrival order, by the registry loop.
pub(crate) enum Command {
    Register {
        id: ClientId,
        remote_addr: String,
        mailbox: Mailbox,
    },
    Unregister(ClientId),
    Broadcast {
        event_type: String,
        frame: Frame,
    },
    Count(oneshot::Sender<usize>),
}

/// Handle to the hub.
///
/// Cloning is cheap; every clone talks to the same registry loop. The loop
/// exits once the last handle is dropped. Each connected client holds a
/// handle for its handlers, so the loop keeps running until those clients
/// have disconnected as well.
#[derive(Clone)]
pub struct Manager {
    commands: UnboundedSender<Command>,
    dispatch: Arc<DispatchTable>,
    mailbox_capacity: usize,
}

impl Manager {
    /// Builds the hub and spawns its registry loop on the current runtime.
    ///
    /// The dispatch table is frozen from here on.
    pub fn new(dispatch: DispatchTable, mailbox_capacity: usize) -> Self {
        // tokio channels need a capacity of at least one and panic above
        // their semaphore's permit limit
        let mailbox_capacity = mailbox_capacity.clamp(1, MAX_MAILBOX_CAPACITY);
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(Registry::default().run(receiver));

        info!(
            "Started real-time hub (mailbox capacity {mailbox_capacity}, handlers: {:?})",
            dispatch.tags()
        );

        Self {
            commands,
            dispatch: Arc::new(dispatch),
            mailbox_capacity,
        }
    }

    /// Wraps an established connection into a client, registers it, and
    /// starts its read and write pumps.
    pub fn register<C: Connection>(&self, connection: C) -> ClientId {
        client::spawn(self.clone(), connection)
    }

    /// Serializes `event` once and queues it for every registered client.
    ///
    /// Never waits on clients. The only error a producer can observe is an
    /// event that fails to serialize (or a hub that is gone); per-client
    /// delivery problems are handled by evicting the client.
    pub fn broadcast<P: Serialize>(&self, event: &Event<P>) -> Result<(), Error> {
        let frame: Frame = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(e) => {
                error!("Failed to serialize {} event: {e}", event.event_type);
                return Err(Error::serialization(e));
            }
        };

        self.send(Command::Broadcast {
            event_type: event.event_type.clone(),
            frame,
        })
    }

    /// Number of clients currently registered.
    pub async fn client_count(&self) -> Result<usize, Error> {
        let (reply, count) = oneshot::channel();
        self.send(Command::Count(reply))?;
        count.await.map_err(|_| Error::hub_stopped())
    }

    pub(crate) fn attach(&self, id: ClientId, remote_addr: String, mailbox: Mailbox) {
        if self
            .send(Command::Register {
                id: id.clone(),
                remote_addr,
                mailbox,
            })
            .is_err()
        {
            // Dropping the mailbox inside the failed command stops the pumps.
            error!("Hub is not running, client {id} was not registered");
        }
    }

    pub(crate) fn unregister(&self, id: &ClientId) {
        if self.send(Command::Unregister(id.clone())).is_err() {
            debug!("Hub already stopped while unregistering client {id}");
        }
    }

    pub(crate) fn dispatch_table(&self) -> &DispatchTable {
        &self.dispatch
    }

    pub(crate) fn mailbox_capacity(&self) -> usize {
        self.mailbox_capacity
    }

    fn send(&self, command: Command) -> Result<(), Error> {
        self.commands
            .send(command)
            .map_err(|_| Error::hub_stopped())
    }
}

struct Registration {
    remote_addr: String,
    mailbox: Mailbox,
}

/// The set of live clients. Only ever touched by the loop in `run`; dropping a
/// `Registration` closes that client's mailbox.
#[derive(Default)]
struct Registry {
    clients: HashMap<ClientId, Registration>,
}

impl Registry {
    async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            self.apply(command);
        }
        debug!(
            "Hub stopped, releasing {} remaining client(s)",
            self.clients.len()
        );
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Register {
                id,
                remote_addr,
                mailbox,
            } => self.register(id, remote_addr, mailbox),
            Command::Unregister(id) => self.unregister(&id),
            Command::Broadcast { event_type, frame } => self.broadcast(&event_type, frame),
            Command::Count(reply) => {
                let _ = reply.send(self.clients.len());
            }
        }
    }

    fn register(&mut self, id: ClientId, remote_addr: String, mailbox: Mailbox) {
        info!(
            "Client {id} registered from {remote_addr} ({} connected)",
            self.clients.len() + 1
        );
        self.clients.insert(
            id,
            Registration {
                remote_addr,
                mailbox,
            },
        );
    }

    fn unregister(&mut self, id: &ClientId) {
        if let Some(registration) = self.clients.remove(id) {
            info!(
                "Client {id} from {} unregistered ({} connected)",
                registration.remote_addr,
                self.clients.len()
            );
        }
    }

    fn broadcast(&mut self, event_type: &str, frame: Frame) {
        let mut evicted = 0;
        self.clients
            .retain(|id, registration| match registration.mailbox.try_send(frame.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Evicting client {id} from {}: mailbox full",
                        registration.remote_addr
                    );
                    evicted += 1;
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Dropping client {id}: write pump already stopped");
                    evicted += 1;
                    false
                }
            });

        debug!(
            "Broadcast {event_type} to {} client(s), {evicted} evicted",
            self.clients.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{mailbox, Inbox};
    use crate::connection::memory;
    use events::{tags, ChatMessage};
    use serde_json::{json, Value};
    use std::collections::HashMap as Map;
    use std::time::Duration;

    fn manager(capacity: usize) -> Manager {
        Manager::new(DispatchTable::standard(), capacity)
    }

    /// Registers a bare mailbox so tests can inspect exactly what the hub
    /// queued, without a write pump draining it.
    fn attach_inbox(manager: &Manager) -> (ClientId, Inbox) {
        let id = ClientId::new();
        let (mailbox, inbox) = mailbox(manager.mailbox_capacity());
        manager.attach(id.clone(), "inbox".to_string(), mailbox);
        (id, inbox)
    }

    async fn wait_for_count(manager: &Manager, expected: usize) -> bool {
        for _ in 0..100 {
            if manager.client_count().await.unwrap() == expected {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn concurrent_registrations_are_all_counted() {
        let manager = manager(DEFAULT_MAILBOX_CAPACITY);

        let mut tasks = Vec::new();
        let mut peers = Vec::new();
        for i in 0..50 {
            let (connection, peer) = memory::pair(&format!("peer-{i}"), 8);
            peers.push(peer);
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move { manager.register(connection) }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(manager.client_count().await.unwrap(), 50);
    }

    #[tokio::test]
    async fn unregistering_an_absent_client_is_a_no_op() {
        let manager = manager(DEFAULT_MAILBOX_CAPACITY);
        let (_id, _inbox) = attach_inbox(&manager);

        manager.unregister(&ClientId::new());
        assert_eq!(manager.client_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unregister_twice_only_removes_once() {
        let manager = manager(DEFAULT_MAILBOX_CAPACITY);
        let (id, mut inbox) = attach_inbox(&manager);
        let (_other, _other_inbox) = attach_inbox(&manager);

        manager.unregister(&id);
        manager.unregister(&id);

        assert_eq!(manager.client_count().await.unwrap(), 1);
        assert!(inbox.is_closed().await);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_client_once() {
        let manager = manager(DEFAULT_MAILBOX_CAPACITY);
        let mut inboxes: Vec<Inbox> = (0..3).map(|_| attach_inbox(&manager).1).collect();

        manager.broadcast(&Event::empty("ping")).unwrap();
        assert_eq!(manager.client_count().await.unwrap(), 3);

        for inbox in inboxes.iter_mut() {
            let frame = inbox.try_next().expect("client did not receive ping");
            let decoded: Event = serde_json::from_str(&frame).unwrap();
            assert_eq!(decoded.event_type, "ping");
            assert!(inbox.try_next().is_none());
        }
    }

    #[tokio::test]
    async fn broadcast_preserves_order_per_client() {
        let manager = manager(DEFAULT_MAILBOX_CAPACITY);
        let mut inboxes: Vec<Inbox> = (0..2).map(|_| attach_inbox(&manager).1).collect();

        for n in 0..10 {
            manager.broadcast(&Event::new("tick", json!(n))).unwrap();
        }
        manager.client_count().await.unwrap();

        for inbox in inboxes.iter_mut() {
            let received: Vec<Value> = std::iter::from_fn(|| inbox.try_next())
                .map(|frame| serde_json::from_str::<Event>(&frame).unwrap().payload)
                .collect();
            assert_eq!(received, (0..10).map(|n| json!(n)).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn full_mailbox_gets_client_evicted() {
        let manager = manager(2);
        let (_slow_id, mut slow) = attach_inbox(&manager);

        manager.broadcast(&Event::empty("one")).unwrap();
        manager.broadcast(&Event::empty("two")).unwrap();
        assert_eq!(manager.client_count().await.unwrap(), 1);

        let (_fast_id, mut fast) = attach_inbox(&manager);
        manager.broadcast(&Event::empty("three")).unwrap();
        assert_eq!(manager.client_count().await.unwrap(), 1);

        // The slow client keeps what was queued before eviction, but never
        // sees the event that overflowed it.
        let slow_types: Vec<String> = std::iter::from_fn(|| slow.try_next())
            .map(|frame| serde_json::from_str::<Event>(&frame).unwrap().event_type)
            .collect();
        assert_eq!(slow_types, vec!["one", "two"]);
        assert!(slow.is_closed().await);

        let frame = fast.try_next().expect("fast client missed the event");
        assert_eq!(
            serde_json::from_str::<Event>(&frame).unwrap().event_type,
            "three"
        );
    }

    #[tokio::test]
    async fn unserializable_event_is_reported_and_not_delivered() {
        let manager = manager(DEFAULT_MAILBOX_CAPACITY);
        let (_id, mut inbox) = attach_inbox(&manager);

        // serde_json refuses maps whose keys are not strings
        let mut payload = Map::new();
        payload.insert(vec![1u8, 2], "bytes");
        let err = manager
            .broadcast(&Event::new("broken", payload))
            .unwrap_err();
        assert_eq!(err.error_kind, crate::error::ErrorKind::Serialization);

        manager
            .broadcast(&Event::new(
                tags::NEW_CHAT_MESSAGE,
                ChatMessage {
                    username: "Alice".to_string(),
                    content: "still here".to_string(),
                },
            ))
            .unwrap();

        assert_eq!(manager.client_count().await.unwrap(), 1);
        let frame = inbox.try_next().unwrap();
        let event: Event<ChatMessage> = serde_json::from_str(&frame).unwrap();
        assert_eq!(event.payload.content, "still here");
        assert!(inbox.try_next().is_none());
    }

    #[tokio::test]
    async fn broadcast_after_external_close_drops_client() {
        let manager = manager(DEFAULT_MAILBOX_CAPACITY);
        let (connection, peer) = memory::pair("doomed", 8);
        manager.register(connection);
        assert_eq!(manager.client_count().await.unwrap(), 1);

        drop(peer);
        manager.broadcast(&Event::empty("ping")).unwrap();

        assert!(wait_for_count(&manager, 0).await);
        // Broadcasting to an empty registry is fine too.
        manager.broadcast(&Event::empty("ping")).unwrap();
        assert_eq!(manager.client_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn stalled_connection_is_evicted_and_closed() {
        let manager = manager(2);
        // The peer never reads, so the write pump blocks after one frame.
        let (connection, mut stalled) = memory::pair("stalled", 1);
        manager.register(connection);
        let (healthy_connection, mut healthy) = memory::pair("healthy", 64);
        manager.register(healthy_connection);

        for n in 0..8 {
            manager.broadcast(&Event::new("tick", json!(n))).unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(wait_for_count(&manager, 1).await);
        assert!(stalled.closed().await);
        for n in 0..8 {
            let event = healthy.next_event().await.unwrap();
            assert_eq!(event["payload"], json!(n));
        }
    }

    #[tokio::test]
    async fn out_of_range_capacities_are_clamped() {
        assert_eq!(manager(0).mailbox_capacity(), 1);

        let huge = manager(usize::MAX);
        assert_eq!(huge.mailbox_capacity(), MAX_MAILBOX_CAPACITY);

        let (connection, mut peer) = memory::pair("huge", 8);
        huge.register(connection);
        assert_eq!(huge.client_count().await.unwrap(), 1);

        huge.broadcast(&Event::empty("ping")).unwrap();
        assert_eq!(peer.next_event().await.unwrap()["type"], "ping");
    }

    #[tokio::test]
    async fn connected_clients_keep_the_hub_running() {
        let manager = manager(DEFAULT_MAILBOX_CAPACITY);
        let (connection, mut peer) = memory::pair("player", 8);
        manager.register(connection);
        assert_eq!(manager.client_count().await.unwrap(), 1);
        drop(manager);

        peer.send_text(r#"{"type":"send_message","payload":{"username":"Alice","content":"hi"}}"#);
        let event = peer.next_event().await.expect("hub stopped with a client attached");
        assert_eq!(event["type"], tags::NEW_CHAT_MESSAGE);
    }

    #[tokio::test]
    async fn hub_loop_stops_when_last_handle_is_dropped() {
        let manager = manager(DEFAULT_MAILBOX_CAPACITY);
        let (_id, mut inbox) = attach_inbox(&manager);
        drop(manager);

        // Shutting the loop down drops every registration, closing mailboxes.
        assert!(inbox.is_closed().await);
    }
}
