use crate::connection::{ClientId, Connection, Frame, FrameReader, FrameWriter};
use crate::error::Error;
use crate::manager::Manager;
use events::Message;
use log::*;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// How long the write pump waits for a transport to close before giving up
/// on it. A peer that stopped reading can hold a close open forever.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Sending side of a client's outbound queue, owned by the registry.
///
/// Dropping it is the one and only way a mailbox gets closed, so closing is
/// idempotent by construction.
pub(crate) struct Mailbox {
    frames: mpsc::Sender<Frame>,
    _open: oneshot::Sender<()>,
}

/// Receiving side of a client's outbound queue, drained by the write pump.
pub(crate) struct Inbox {
    frames: mpsc::Receiver<Frame>,
    closed: oneshot::Receiver<()>,
    open: bool,
}

pub(crate) fn mailbox(capacity: usize) -> (Mailbox, Inbox) {
    let (frames_tx, frames_rx) = mpsc::channel(capacity);
    let (open_tx, open_rx) = oneshot::channel();
    (
        Mailbox {
            frames: frames_tx,
            _open: open_tx,
        },
        Inbox {
            frames: frames_rx,
            closed: open_rx,
            open: true,
        },
    )
}

impl Mailbox {
    pub(crate) fn try_send(&self, frame: Frame) -> Result<(), TrySendError<Frame>> {
        self.frames.try_send(frame)
    }
}

impl Inbox {
    /// Next queued frame, or `None` as soon as the mailbox has been closed.
    /// Frames still queued at that point are abandoned.
    async fn recv(&mut self) -> Option<Frame> {
        if !self.open {
            return None;
        }
        tokio::select! {
            biased;
            _ = &mut self.closed => {
                self.open = false;
                None
            }
            frame = self.frames.recv() => frame,
        }
    }

    /// Resolves once the registry has closed this mailbox.
    async fn closed(&mut self) {
        if self.open {
            let _ = (&mut self.closed).await;
            self.open = false;
        }
    }

    #[cfg(test)]
    pub(crate) fn try_next(&mut self) -> Option<Frame> {
        self.frames.try_recv().ok()
    }

    #[cfg(test)]
    pub(crate) async fn is_closed(&mut self) -> bool {
        tokio::time::timeout(std::time::Duration::from_secs(1), self.closed())
            .await
            .is_ok()
    }
}

/// One connected subscriber, as seen by message handlers.
pub struct Client {
    id: ClientId,
    remote_addr: String,
    manager: Manager,
}

impl Client {
    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub fn remote_addr(&self) -> &str {
        &self.remote_addr
    }

    /// The hub this client is registered with, for handlers that broadcast.
    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    /// Decodes one inbound frame and hands it to the matching handler.
    /// Malformed frames and unknown types are logged and skipped.
    async fn dispatch(&self, frame: &[u8]) {
        let message: Message = match serde_json::from_slice(frame) {
            Ok(message) => message,
            Err(e) => {
                let err = Error::decode(e);
                warn!("Skipping malformed frame from client {}: {err}", self.id);
                return;
            }
        };

        match self.manager.dispatch_table().get(&message.message_type) {
            Some(handler) => handler.handle(&message.payload, self).await,
            None => warn!(
                "Unknown message type {:?} received from client {}",
                message.message_type, self.id
            ),
        }
    }
}

/// Registers a new client for `connection` and spawns both of its pumps.
pub(crate) fn spawn<C: Connection>(manager: Manager, connection: C) -> ClientId {
    let id = ClientId::new();
    let remote_addr = connection.remote_addr();
    let (mailbox, inbox) = mailbox(manager.mailbox_capacity());

    manager.attach(id.clone(), remote_addr.clone(), mailbox);

    let (reader, writer) = connection.split();
    let (writer_alive, writer_done) = oneshot::channel();

    tokio::spawn(write_pump(id.clone(), writer, inbox, writer_alive));
    tokio::spawn(read_pump(
        Client {
            id: id.clone(),
            remote_addr,
            manager,
        },
        reader,
        writer_done,
    ));

    id
}

/// Reads frames until the peer goes away, a read fails, or the write pump
/// stops. Always ends by unregistering the client.
async fn read_pump<R: FrameReader>(
    client: Client,
    mut reader: R,
    mut writer_done: oneshot::Receiver<()>,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = &mut writer_done => {
                debug!("Write pump for client {} stopped, ending read pump", client.id);
                break;
            }
            frame = reader.next_frame() => frame,
        };

        match frame {
            Some(Ok(bytes)) => client.dispatch(&bytes).await,
            Some(Err(e)) => {
                warn!("Read from client {} failed: {e}", client.id);
                break;
            }
            None => {
                debug!("Client {} closed the connection", client.id);
                break;
            }
        }
    }

    client.manager.unregister(&client.id);
}

/// Writes queued frames in order until the mailbox is closed or a write
/// fails, then closes the connection. Dropping `alive` tells the read pump to
/// stop; that happens before the close, which may hang on a stalled peer.
async fn write_pump<W: FrameWriter>(
    id: ClientId,
    mut writer: W,
    mut inbox: Inbox,
    alive: oneshot::Sender<()>,
) {
    while let Some(frame) = inbox.recv().await {
        let sent = tokio::select! {
            biased;
            _ = inbox.closed() => break,
            sent = writer.send_frame(&frame) => sent,
        };

        if let Err(e) = sent {
            warn!("Write to client {id} failed: {e}");
            break;
        }
    }

    drop(alive);

    trace!("Closing connection for client {id}");
    if tokio::time::timeout(CLOSE_TIMEOUT, writer.close())
        .await
        .is_err()
    {
        warn!("Timed out closing connection for client {id}, abandoning it");
    }
}
