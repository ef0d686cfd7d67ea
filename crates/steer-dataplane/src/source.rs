//! Packet sources
//!
//! The seam between packet drivers and the worker loop. Each source is
//! owned and polled by exactly one worker; polling never blocks, so a
//! worker multiplexing several sources stays responsive on all of them.

use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};
use steer_common::{RawPacket, SteerError, SteerResult};

/// Supplies ingress-tagged packets to a single worker
pub trait PacketSource: Send {
    /// Next pending packet, if any; must not block
    fn poll(&mut self) -> Option<RawPacket>;

    /// True once the source can never produce another packet
    ///
    /// A worker whose sources are all exhausted exits its loop early.
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// In-memory source fed through [`PacketInjector`] handles
///
/// Stands in for a driver RX ring in tests and simulations. Becomes
/// exhausted once every injector is dropped and the backlog is drained.
#[derive(Debug)]
pub struct ChannelSource {
    rx: Receiver<RawPacket>,
    exhausted: bool,
}

/// Cloneable producer half of a [`ChannelSource`]
#[derive(Debug, Clone)]
pub struct PacketInjector {
    tx: Sender<RawPacket>,
}

impl ChannelSource {
    /// Create a source and the injector feeding it
    pub fn new() -> (PacketInjector, ChannelSource) {
        let (tx, rx) = unbounded();
        (
            PacketInjector { tx },
            ChannelSource {
                rx,
                exhausted: false,
            },
        )
    }
}

impl PacketSource for ChannelSource {
    fn poll(&mut self) -> Option<RawPacket> {
        match self.rx.try_recv() {
            Ok(pkt) => Some(pkt),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.exhausted = true;
                None
            }
        }
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl PacketInjector {
    /// Hand a packet to the worker owning the source
    pub fn inject(&self, pkt: RawPacket) -> SteerResult<()> {
        self.tx.send(pkt).map_err(|_| SteerError::SourceClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steer_common::InterfaceId;

    fn pkt(tag: u8) -> RawPacket {
        RawPacket::new(InterfaceId(0), vec![tag])
    }

    #[test]
    fn test_poll_order() {
        let (injector, mut source) = ChannelSource::new();
        assert!(source.poll().is_none());
        assert!(!source.is_exhausted());

        injector.inject(pkt(1)).unwrap();
        injector.inject(pkt(2)).unwrap();
        assert_eq!(source.poll().unwrap().data[0], 1);
        assert_eq!(source.poll().unwrap().data[0], 2);
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_exhaustion_after_injectors_drop() {
        let (injector, mut source) = ChannelSource::new();
        let second = injector.clone();

        injector.inject(pkt(7)).unwrap();
        drop(injector);
        // A surviving clone keeps the source alive
        second.inject(pkt(8)).unwrap();
        drop(second);

        // Backlog drains before exhaustion is reported
        assert_eq!(source.poll().unwrap().data[0], 7);
        assert_eq!(source.poll().unwrap().data[0], 8);
        assert!(!source.is_exhausted());
        assert!(source.poll().is_none());
        assert!(source.is_exhausted());
    }

    #[test]
    fn test_inject_after_source_drop() {
        let (injector, source) = ChannelSource::new();
        drop(source);
        assert!(matches!(
            injector.inject(pkt(0)),
            Err(SteerError::SourceClosed)
        ));
    }
}
