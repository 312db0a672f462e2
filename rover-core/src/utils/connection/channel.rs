//! Radio command channel.
//!
//! The radio driver delivers packets on its own context (an ISR or driver
//! task). It only ever sees a [`CommandReceiver`], which can decode a payload
//! and store it in the [`CommandSlot`], nothing else. The control loop owns the
//! [`CommandChannel`], reads the slot, and sends telemetry through the
//! [`RadioTransport`].

use core::cell::Cell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use embassy_time::Instant;

use super::packets::{Command, DecodeError, PeerAddress, Telemetry};

/// Peer-to-peer packet radio (ESP-NOW style): fixed small payloads, no retries.
pub trait RadioTransport {
    type Error: core::fmt::Debug;

    /// Register `peer` as a destination.
    fn add_peer(
        &mut self,
        peer: &PeerAddress,
    ) -> Result<(), Self::Error>;

    /// Queue one payload for `peer`. Must not wait for delivery.
    fn send(
        &mut self,
        peer: &PeerAddress,
        payload: &[u8],
    ) -> Result<(), Self::Error>;
}

#[derive(Debug)]
pub enum SendError<E: core::fmt::Debug> {
    Transport(E),
}

/// Everything the control loop learns from the radio, copied out in one go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSnapshot {
    pub command: Command,
    /// Arrival time of `command`; `None` until the first valid packet.
    pub received_at: Option<Instant>,
    pub accepted: u32,
    pub rejected: u32,
}

impl LinkSnapshot {
    const INITIAL: LinkSnapshot = LinkSnapshot {
        command: Command::CENTER,
        received_at: None,
        accepted: 0,
        rejected: 0,
    };
}

/// Latest command plus its arrival time, shared between the receive context
/// and the control loop. The lock is only held for a copy.
pub struct CommandSlot {
    inner: Mutex<CriticalSectionRawMutex, Cell<LinkSnapshot>>,
}

impl CommandSlot {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(LinkSnapshot::INITIAL)),
        }
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        self.inner.lock(|cell| cell.get())
    }

    fn store(
        &self,
        command: Command,
        now: Instant,
    ) {
        self.inner.lock(|cell| {
            let mut snap = cell.get();
            snap.command = command;
            snap.received_at = Some(now);
            snap.accepted = snap.accepted.wrapping_add(1);
            cell.set(snap);
        });
    }

    fn note_rejected(&self) {
        self.inner.lock(|cell| {
            let mut snap = cell.get();
            snap.rejected = snap.rejected.wrapping_add(1);
            cell.set(snap);
        });
    }
}

impl Default for CommandSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Receive-side handle given to the radio driver callback.
#[derive(Clone, Copy)]
pub struct CommandReceiver<'a> {
    slot: &'a CommandSlot,
}

impl<'a> CommandReceiver<'a> {
    pub fn new(slot: &'a CommandSlot) -> Self {
        Self { slot }
    }

    /// Decode `payload` and make it the latest command, stamped with `now`.
    ///
    /// Wrong-sized payloads are dropped and counted; the stored command is
    /// left untouched. The error is informational only.
    pub fn on_receive(
        &self,
        payload: &[u8],
        now: Instant,
    ) -> Result<Command, DecodeError> {
        match Command::decode(payload) {
            Ok(command) => {
                self.slot.store(command, now);
                Ok(command)
            }
            Err(error) => {
                self.slot.note_rejected();
                tracing::debug!(?error, "dropping malformed command packet");
                Err(error)
            }
        }
    }
}

/// Control-loop side of the radio link.
pub struct CommandChannel<'a, T> {
    slot: &'a CommandSlot,
    transport: T,
    peer: PeerAddress,
    sent: u32,
    send_failures: u32,
}

impl<'a, T> CommandChannel<'a, T>
where
    T: RadioTransport,
{
    /// Register `peer` with the transport and wire the channel to `slot`.
    ///
    /// A failed registration is logged and the channel is still returned:
    /// commands can arrive regardless, only telemetry will be lost.
    pub fn initialize(
        slot: &'a CommandSlot,
        mut transport: T,
        peer: PeerAddress,
    ) -> Self {
        match transport.add_peer(&peer) {
            Ok(()) => tracing::info!(%peer, "radio link ready, waiting for commands"),
            Err(error) => tracing::warn!(%peer, ?error, "could not register remote peer"),
        }
        CommandChannel {
            slot,
            transport,
            peer,
            sent: 0,
            send_failures: 0,
        }
    }

    pub fn receiver(&self) -> CommandReceiver<'a> {
        CommandReceiver::new(self.slot)
    }

    pub fn peer(&self) -> PeerAddress {
        self.peer
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        self.slot.snapshot()
    }

    pub fn last_command(&self) -> Command {
        self.slot.snapshot().command
    }

    pub fn last_packet_time(&self) -> Option<Instant> {
        self.slot.snapshot().received_at
    }

    /// Send one telemetry record to the registered peer. Not retried.
    pub fn send_telemetry(
        &mut self,
        telemetry: Telemetry,
    ) -> Result<(), SendError<T::Error>> {
        let payload = telemetry.encode();
        match self.transport.send(&self.peer, &payload) {
            Ok(()) => {
                self.sent = self.sent.wrapping_add(1);
                Ok(())
            }
            Err(error) => {
                self.send_failures = self.send_failures.wrapping_add(1);
                Err(SendError::Transport(error))
            }
        }
    }

    /// `(sent, failed)` telemetry counts.
    pub fn telemetry_stats(&self) -> (u32, u32) {
        (self.sent, self.send_failures)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Loopback {
        peers: Vec<PeerAddress>,
        sent: Vec<Vec<u8>>,
        fail: bool,
    }

    impl RadioTransport for Loopback {
        type Error = &'static str;

        fn add_peer(
            &mut self,
            peer: &PeerAddress,
        ) -> Result<(), Self::Error> {
            self.peers.push(*peer);
            Ok(())
        }

        fn send(
            &mut self,
            _peer: &PeerAddress,
            payload: &[u8],
        ) -> Result<(), Self::Error> {
            if self.fail {
                return Err("busy");
            }
            self.sent.push(payload.to_vec());
            Ok(())
        }
    }

    #[test]
    fn defaults_to_center_before_first_packet() {
        let slot = CommandSlot::new();
        let channel = CommandChannel::initialize(&slot, Loopback::default(), PeerAddress::BROADCAST);
        assert_eq!(channel.last_command(), Command::CENTER);
        assert_eq!(channel.last_packet_time(), None);
        assert_eq!(channel.transport().peers, vec![PeerAddress::BROADCAST]);
    }

    #[test]
    fn valid_packet_replaces_command_and_stamp() {
        let slot = CommandSlot::new();
        let channel = CommandChannel::initialize(&slot, Loopback::default(), PeerAddress::BROADCAST);
        let rx = channel.receiver();

        let cmd = Command { x: 100, y: 4000 };
        assert_eq!(rx.on_receive(&cmd.encode(), Instant::from_millis(42)), Ok(cmd));

        let snap = channel.snapshot();
        assert_eq!(snap.command, cmd);
        assert_eq!(snap.received_at, Some(Instant::from_millis(42)));
        assert_eq!(snap.accepted, 1);
    }

    #[test]
    fn malformed_packet_leaves_previous_command() {
        let slot = CommandSlot::new();
        let channel = CommandChannel::initialize(&slot, Loopback::default(), PeerAddress::BROADCAST);
        let rx = channel.receiver();

        let cmd = Command { x: 2048, y: 4095 };
        rx.on_receive(&cmd.encode(), Instant::from_millis(10)).unwrap();
        assert!(rx.on_receive(&[1, 2, 3], Instant::from_millis(20)).is_err());
        assert!(rx.on_receive(&[0u8; 9], Instant::from_millis(30)).is_err());

        let snap = channel.snapshot();
        assert_eq!(snap.command, cmd);
        assert_eq!(snap.received_at, Some(Instant::from_millis(10)));
        assert_eq!(snap.rejected, 2);
    }

    #[test]
    fn telemetry_goes_to_peer_and_failures_are_counted() {
        let slot = CommandSlot::new();
        let mut channel = CommandChannel::initialize(&slot, Loopback::default(), PeerAddress::BROADCAST);
        let t = Telemetry {
            voltage: 7.4,
            distance: 120,
        };
        channel.send_telemetry(t).unwrap();
        assert_eq!(channel.transport().sent, vec![t.encode().to_vec()]);

        channel.transport.fail = true;
        assert!(matches!(channel.send_telemetry(t), Err(SendError::Transport("busy"))));
        assert_eq!(channel.telemetry_stats(), (1, 1));
    }
}
