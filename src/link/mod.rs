//! The companion link context.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                           PmicLink                                │
//! │                                                                   │
//! │  callers ──▶ request builders ──▶ [async Mutex] Transport ──▶ TX  │
//! │     ▲                                                             │
//! │     │ wait() / take_*()                                           │
//! │     │                                                             │
//! │  ┌──┴──────────────┐   Signals / Channels   ┌──────────────────┐  │
//! │  │ SharedState     │◀──────────────────────│   Dispatcher     │  │
//! │  │ (blocking Mutex)│                        │ (one worker)     │  │
//! │  └─────────────────┘                        └────────▲─────────┘  │
//! │                                                      │            │
//! │  RX ──▶ feed_bytes ──▶ FrameDecoder ──▶ inbound Channel           │
//! │         submit ───────────────────────▶                           │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All state that used to be process-wide lives here, so independent
//! links (and tests) never share anything. Snapshots and reassembly state
//! sit behind a critical-section mutex; the serial transport sits behind
//! an async mutex so only one frame is ever on the wire at a time.

pub mod dispatcher;
pub mod energy;
pub mod event_log;
pub mod reassembly;
pub mod requests;
pub mod temperature_log;
pub mod wait;

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver};
use embassy_sync::mutex::Mutex as AsyncMutex;
use embassy_sync::signal::Signal;
use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::config::LinkConfig;
use crate::error::{Error, Result, WaitKind};
use crate::protocol::codec::{self, FrameDecoder, MAX_FRAME_SIZE};
use crate::protocol::ids::CommandId;
use crate::protocol::message::RawMessage;
use crate::protocol::transport::{SerialPort, Transport};
use crate::protocol::types::{
    CapacityRemaining, CompanionStatus, EnergyResult, Payload, SelfTestResult,
};

pub use dispatcher::Dispatcher;
pub use reassembly::{MetadataBlob, METADATA_CAPACITY};
pub use wait::{CapacityRequest, DumpRequest, MetadataRequest};

pub(crate) type RawMutex = CriticalSectionRawMutex;

/// Inbound messages buffered between the receiver and the dispatcher.
pub const INBOUND_DEPTH: usize = 8;
/// Depth of the NDEF and info holding queues.
pub const HOLDING_DEPTH: usize = 4;

// ── Shared state ─────────────────────────────────────────────

/// Latest value of a message kind plus an "updated since last take" flag.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot<T> {
    value: Option<T>,
    updated: bool,
}

impl<T: Clone> Snapshot<T> {
    const fn new() -> Self {
        Self {
            value: None,
            updated: false,
        }
    }

    pub(crate) fn store(&mut self, value: T) {
        self.value = Some(value);
        self.updated = true;
    }

    fn take(&mut self) -> Option<T> {
        if !self.updated {
            return None;
        }
        self.updated = false;
        self.value.clone()
    }

    fn latest(&self) -> Option<T> {
        self.value.clone()
    }
}

pub(crate) struct SharedState {
    pub(crate) status: Snapshot<CompanionStatus>,
    pub(crate) self_test: Snapshot<SelfTestResult>,
    pub(crate) energy: Snapshot<EnergyResult>,
    pub(crate) metadata: reassembly::MetadataAccumulator,
    pub(crate) dump: reassembly::DumpTransfer,
}

// ── Link ─────────────────────────────────────────────────────

pub struct PmicLink<S, D> {
    config: LinkConfig,
    transport: AsyncMutex<RawMutex, Transport<S, D>>,
    shared: BlockingMutex<RawMutex, RefCell<SharedState>>,
    decoder: BlockingMutex<RawMutex, RefCell<FrameDecoder>>,

    pub(crate) inbound: Channel<RawMutex, RawMessage, INBOUND_DEPTH>,
    pub(crate) metadata_done: Signal<RawMutex, Result<()>>,
    pub(crate) dump_done: Signal<RawMutex, Result<u32>>,
    pub(crate) energy_store_result: Signal<RawMutex, u8>,
    pub(crate) capacity: Channel<RawMutex, CapacityRemaining, 1>,
    pub(crate) ndef: Channel<RawMutex, Payload, HOLDING_DEPTH>,
    pub(crate) info: Channel<RawMutex, Payload, HOLDING_DEPTH>,

    metadata_in_flight: AtomicBool,
    dump_in_flight: AtomicBool,
    capacity_in_flight: AtomicBool,
    energy_in_flight: AtomicBool,
    retrieval_epoch: AtomicU32,
}

impl<S: SerialPort, D: DelayNs> PmicLink<S, D> {
    pub fn new(port: S, delay: D, config: LinkConfig) -> Result<Self> {
        config.validate()?;
        let transport = Transport::new(port, delay, &config);
        let dump = reassembly::DumpTransfer::new(config.dump_base_address);
        Ok(Self {
            config,
            transport: AsyncMutex::new(transport),
            shared: BlockingMutex::new(RefCell::new(SharedState {
                status: Snapshot::new(),
                self_test: Snapshot::new(),
                energy: Snapshot::new(),
                metadata: reassembly::MetadataAccumulator::new(),
                dump,
            })),
            decoder: BlockingMutex::new(RefCell::new(FrameDecoder::new())),
            inbound: Channel::new(),
            metadata_done: Signal::new(),
            dump_done: Signal::new(),
            energy_store_result: Signal::new(),
            capacity: Channel::new(),
            ndef: Channel::new(),
            info: Channel::new(),
            metadata_in_flight: AtomicBool::new(false),
            dump_in_flight: AtomicBool::new(false),
            capacity_in_flight: AtomicBool::new(false),
            energy_in_flight: AtomicBool::new(false),
            retrieval_epoch: AtomicU32::new(0),
        })
    }

    /// Frame `payload` under `command` and put it on the wire.
    pub(crate) async fn send_command(&self, command: CommandId, payload: &[u8]) -> Result<()> {
        let mut frame = [0u8; MAX_FRAME_SIZE];
        let len = codec::build_frame(command.as_u8(), &mut frame, payload)?;
        let mut transport = self.transport.lock().await;
        let status = transport.send_frame(&frame[..len])?;
        debug!(
            "PMIC: sent {:?} ({} bytes, lsr=0x{:02X})",
            command, len, status.0
        );
        Ok(())
    }

    /// Like [`send_command`](Self::send_command), after the ack delay.
    pub(crate) async fn send_ack(&self, command: CommandId, payload: &[u8]) -> Result<()> {
        let mut frame = [0u8; MAX_FRAME_SIZE];
        let len = codec::build_frame(command.as_u8(), &mut frame, payload)?;
        let mut transport = self.transport.lock().await;
        transport.pause_ms(self.config.ack_delay_ms);
        transport.send_frame(&frame[..len])?;
        Ok(())
    }
}

impl<S, D> PmicLink<S, D> {
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut SharedState) -> R) -> R {
        self.shared.lock(|cell| f(&mut cell.borrow_mut()))
    }

    // ── Inbound ──────────────────────────────────────────────

    /// Hand a message from an external framer to the dispatcher.
    ///
    /// Returns `false` when the inbound queue is full and the message was
    /// dropped.
    pub fn submit(&self, msg: RawMessage) -> bool {
        match self.inbound.try_send(msg) {
            Ok(()) => true,
            Err(_) => {
                warn!("PMIC: inbound queue full, message dropped");
                false
            }
        }
    }

    /// Run received UART bytes through the frame decoder. Returns the
    /// number of messages queued.
    pub fn feed_bytes(&self, data: &[u8]) -> usize {
        let mut queued = 0;
        self.decoder.lock(|cell| {
            cell.borrow_mut().feed(data, |msg| {
                if self.submit(msg) {
                    queued += 1;
                }
            });
        });
        queued
    }

    /// Frames the decoder has discarded so far.
    pub fn rejected_frames(&self) -> u32 {
        self.decoder.lock(|cell| cell.borrow().rejected())
    }

    // ── Snapshots ────────────────────────────────────────────

    /// Status received since the last call, if any.
    pub fn take_status(&self) -> Option<CompanionStatus> {
        self.with_state(|s| s.status.take())
    }

    pub fn latest_status(&self) -> Option<CompanionStatus> {
        self.with_state(|s| s.status.latest())
    }

    pub fn take_self_test(&self) -> Option<SelfTestResult> {
        self.with_state(|s| s.self_test.take())
    }

    pub fn latest_self_test(&self) -> Option<SelfTestResult> {
        self.with_state(|s| s.self_test.latest())
    }

    pub fn take_energy(&self) -> Option<EnergyResult> {
        self.with_state(|s| s.energy.take())
    }

    pub fn latest_energy(&self) -> Option<EnergyResult> {
        self.with_state(|s| s.energy.latest())
    }

    pub fn metadata_valid(&self) -> bool {
        self.with_state(|s| s.metadata.is_valid())
    }

    /// Metadata bytes accumulated in the current cycle.
    pub fn metadata_received(&self) -> usize {
        self.with_state(|s| s.metadata.received())
    }

    pub fn dump_complete(&self) -> bool {
        self.with_state(|s| s.dump.is_complete())
    }

    // ── Holding queues ───────────────────────────────────────

    pub fn ndef_messages(&self) -> Receiver<'_, RawMutex, Payload, HOLDING_DEPTH> {
        self.ndef.receiver()
    }

    pub fn info_messages(&self) -> Receiver<'_, RawMutex, Payload, HOLDING_DEPTH> {
        self.info.receiver()
    }

    // ── Event-log retrieval cycle ────────────────────────────

    /// Start a new event-log retrieval cycle. The remaining capacity is
    /// recomputed when the next entry arrives.
    pub fn begin_log_retrieval(&self) {
        self.retrieval_epoch.fetch_add(1, Ordering::AcqRel);
    }

    pub fn retrieval_epoch(&self) -> u32 {
        self.retrieval_epoch.load(Ordering::Acquire)
    }

    // ── In-flight tracking ───────────────────────────────────

    pub(crate) fn in_flight(&self, kind: WaitKind) -> &AtomicBool {
        match kind {
            WaitKind::Metadata => &self.metadata_in_flight,
            WaitKind::Dump => &self.dump_in_flight,
            WaitKind::CapacityRemaining => &self.capacity_in_flight,
            WaitKind::EnergyStore => &self.energy_in_flight,
        }
    }

    /// Whether a request of this kind is outstanding.
    pub fn is_in_flight(&self, kind: WaitKind) -> bool {
        self.in_flight(kind).load(Ordering::Acquire)
    }
}

/// Marks one request kind as outstanding until dropped.
pub(crate) struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlight<'a> {
    pub(crate) fn claim<S, D>(link: &'a PmicLink<S, D>, kind: WaitKind) -> Result<Self> {
        let flag = link.in_flight(kind);
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::RequestInFlight(kind))?;
        Ok(Self { flag })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
