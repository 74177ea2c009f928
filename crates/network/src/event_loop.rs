//! # Event Loop
//!
//! The single task where every packet is parsed, dispatched, and
//! answered. Reader tasks cut complete frames off their sockets and
//! send them here over an unbounded channel; handlers run synchronously
//! to completion, one frame at a time, interleaved with due timers.
//!
//! Because this is the only task that calls into the dispatcher, the
//! opcode table and layout registry need no synchronization, and
//! per-session outbound queues are only ever appended from here.

use bytes::BytesMut;
use roserver_core::{SessionId, TimerQueue};
use roserver_protocol::Dispatcher;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// One complete inbound frame, opcode included.
#[derive(Debug)]
pub struct InboundFrame {
    pub session: SessionId,
    pub frame: BytesMut,
}

/// Create the frame channel connecting reader tasks to the event loop.
pub fn frame_channel() -> (
    mpsc::UnboundedSender<InboundFrame>,
    mpsc::UnboundedReceiver<InboundFrame>,
) {
    mpsc::unbounded_channel()
}

/// The serial dispatch loop.
pub struct EventLoop {
    rx: mpsc::UnboundedReceiver<InboundFrame>,
    dispatcher: Dispatcher,
    timers: TimerQueue,
}

impl EventLoop {
    pub fn new(rx: mpsc::UnboundedReceiver<InboundFrame>, dispatcher: Dispatcher) -> Self {
        Self {
            rx,
            dispatcher,
            timers: TimerQueue::new(),
        }
    }

    /// Access the timer schedule (e.g. to register periodic announces
    /// before the loop starts).
    pub fn timers_mut(&mut self) -> &mut TimerQueue {
        &mut self.timers
    }

    /// Run until every frame sender is dropped.
    pub async fn run(mut self) {
        tracing::info!("event loop started");
        loop {
            // Sleep no further than the next timer deadline; an hour is
            // "no timers pending".
            let deadline = self
                .timers
                .next_deadline()
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                received = self.rx.recv() => {
                    match received {
                        Some(inbound) => {
                            self.dispatcher.dispatch(inbound.session, &inbound.frame);
                        }
                        None => {
                            tracing::info!("frame channel closed, event loop exiting");
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                    self.timers.run_due(Instant::now());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roserver_core::PacketVer;
    use roserver_protocol::{
        serialize, standard_registry, FieldValues, HandlerRegistry, OpcodeTable, PacketKind,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    const VER: PacketVer = PacketVer(20180620);

    #[tokio::test]
    async fn test_frames_are_dispatched_in_order() {
        let registry = standard_registry();
        let table = OpcodeTable::build(&registry, VER).unwrap();

        let ticks = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = ticks.clone();
        let mut handlers = HandlerRegistry::new();
        handlers.register(PacketKind::RequestTime, move |_session, values| {
            sink.lock().push(values.u32("client_tick")?);
            Ok(())
        });

        let (tx, rx) = frame_channel();
        let event_loop = EventLoop::new(rx, Dispatcher::new(Arc::new(table), handlers));
        let handle = tokio::spawn(event_loop.run());

        for tick in [1u32, 2, 3] {
            let values = FieldValues::new().with("client_tick", tick);
            let frame = serialize(&registry, PacketKind::RequestTime, &values, VER).unwrap();
            tx.send(InboundFrame {
                session: SessionId::new(1),
                frame,
            })
            .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        assert_eq!(*ticks.lock(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_scheduled_timer_fires() {
        let registry = standard_registry();
        let table = OpcodeTable::build(&registry, VER).unwrap();

        let fired = Arc::new(AtomicU32::new(0));
        let flag = fired.clone();

        let (tx, rx) = frame_channel();
        let mut event_loop =
            EventLoop::new(rx, Dispatcher::new(Arc::new(table), HandlerRegistry::new()));
        event_loop.timers_mut().schedule(Duration::from_millis(10), move || {
            flag.fetch_add(1, Ordering::Relaxed);
        });
        let handle = tokio::spawn(event_loop.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(tx);
        handle.await.unwrap();

        assert_eq!(fired.load(Ordering::Relaxed), 1);
    }
}
