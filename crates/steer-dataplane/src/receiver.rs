//! Class-of-service receivers
//!
//! The consumer half of the pipeline: a receiver binds to one class and
//! drains its dispatch queue, blocking between packets.

use std::sync::Arc;
use std::time::Duration;

use steer_classify::{Classifier, DispatchQueue};
use steer_common::{ClassId, RawPacket, SteerResult};

/// Blocking consumer bound to one class of service
#[derive(Debug)]
pub struct CosReceiver {
    class: ClassId,
    class_name: String,
    queue: Arc<DispatchQueue>,
}

impl CosReceiver {
    /// Bind to `class_name`'s dispatch queue
    pub fn attach(classifier: &Classifier, class_name: &str) -> SteerResult<Self> {
        let class = classifier.lookup_class(class_name)?;
        let queue = classifier.queue_of(class)?;
        Ok(Self {
            class,
            class_name: class_name.to_string(),
            queue,
        })
    }

    /// Class this receiver drains
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Name of the class this receiver drains
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Block until a packet arrives
    ///
    /// Unblocks with `QueueClosed` once engine shutdown closes the queue
    /// and the backlog is drained.
    pub fn recv(&self) -> SteerResult<RawPacket> {
        self.queue.dequeue()
    }

    /// Like [`recv`](Self::recv) with a deadline; `Ok(None)` on timeout
    pub fn recv_timeout(&self, timeout: Duration) -> SteerResult<Option<RawPacket>> {
        self.queue.dequeue_timeout(timeout)
    }

    /// Non-blocking receive
    pub fn try_recv(&self) -> SteerResult<Option<RawPacket>> {
        self.queue.try_dequeue()
    }

    /// Packets waiting on the queue
    pub fn backlog(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steer_common::SteerError;

    #[test]
    fn test_attach_and_receive() {
        let classifier = Classifier::new();
        let cos = classifier.create_class("cos_all").unwrap();
        let eth0 = classifier.intern_interface("eth0");
        classifier.bind_interface(eth0, cos, cos).unwrap();

        let receiver = CosReceiver::attach(&classifier, "cos_all").unwrap();
        assert_eq!(receiver.class(), cos);
        assert_eq!(receiver.class_name(), "cos_all");

        // Too short to parse, steered to the error class (same queue)
        classifier
            .process(RawPacket::new(eth0, vec![0u8; 4]))
            .unwrap();
        assert_eq!(receiver.backlog(), 1);
        let pkt = receiver.recv().unwrap();
        assert_eq!(pkt.len(), 4);
    }

    #[test]
    fn test_attach_unknown_class() {
        let classifier = Classifier::new();
        assert!(matches!(
            CosReceiver::attach(&classifier, "cos_missing"),
            Err(SteerError::NotFound(_))
        ));
    }

    #[test]
    fn test_recv_after_shutdown() {
        let classifier = Classifier::new();
        classifier.create_class("cos_all").unwrap();
        let receiver = CosReceiver::attach(&classifier, "cos_all").unwrap();

        classifier.close_queues();
        assert!(matches!(receiver.recv(), Err(SteerError::QueueClosed)));
        assert!(matches!(
            receiver.recv_timeout(Duration::from_millis(5)),
            Err(SteerError::QueueClosed)
        ));
    }
}
