// Request issuance and response drain over a STREAMS-style channel.
//
// Reply sequence for one request:
//   getmsg(ctl) -> T_OPTMGMT_ACK + opthdr, status MOREDATA
//   getmsg(data) -> opthdr.len bytes of fixed-size entries
//   ...repeat per table...
//   getmsg(ctl) -> final ack, status 0
//
// Every reply must be consumed before the channel is dropped.

use std::io;
use std::time::{Duration, Instant};

use crate::error::NatstatError;
use crate::mib2::{FamilyTables, KernelCapabilities, MIB2_IP};
use crate::model::ConnectionRecord;
use crate::tpi;

/// `getmsg` status bit: control part not fully read.
pub const MORECTL: i32 = 1;
/// `getmsg` status bit: data part not fully read.
pub const MOREDATA: i32 = 2;

/// Default device that accepts the `tcp`/`udp` module pushes.
pub const DEFAULT_DEVICE: &str = "/dev/arp";
/// Default modules, pushed in this order.
pub const DEFAULT_MODULES: [&str; 2] = ["tcp", "udp"];
/// Upper bound for one declared table payload.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Channel seam
// ---------------------------------------------------------------------------

/// Result of one receive: bytes placed in the buffer and the residual
/// `MORECTL`/`MOREDATA` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    pub len: usize,
    pub more: i32,
}

impl Received {
    pub fn complete(len: usize) -> Self {
        Self { len, more: 0 }
    }

    pub fn more_data(len: usize) -> Self {
        Self {
            len,
            more: MOREDATA,
        }
    }
}

/// Message-oriented kernel channel with separate control and data parts.
pub trait MessageChannel {
    /// Send `ctl` as the control part of one message with no data part.
    fn put_control(&mut self, ctl: &[u8]) -> io::Result<()>;

    /// Receive up to `buf.len()` bytes of the next message's control part.
    fn get_control(&mut self, buf: &mut [u8]) -> io::Result<Received>;

    /// Receive up to `buf.len()` bytes of the pending message's data part.
    fn get_data(&mut self, buf: &mut [u8]) -> io::Result<Received>;

    /// Block until a message is readable or `timeout` elapses.
    ///
    /// Returns `false` on timeout. Channels without a readiness primitive
    /// report ready immediately.
    fn wait_readable(&mut self, _timeout: Duration) -> io::Result<bool> {
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Caller-enforced bounds on the drain loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainBudget {
    /// Absolute deadline for the whole drain.
    pub deadline: Option<Instant>,
    /// Maximum number of table replies accepted.
    pub max_messages: Option<usize>,
    /// Largest declared table payload that will be allocated.
    pub max_payload_bytes: usize,
}

impl DrainBudget {
    pub fn unlimited() -> Self {
        Self {
            deadline: None,
            max_messages: None,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = Some(max);
        self
    }
}

impl Default for DrainBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Everything one snapshot needs.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub device: String,
    pub modules: Vec<String>,
    pub capabilities: KernelCapabilities,
    pub budget: DrainBudget,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            modules: DEFAULT_MODULES.iter().map(|m| m.to_string()).collect(),
            capabilities: KernelCapabilities::detect(),
            budget: DrainBudget::unlimited(),
        }
    }
}

// ---------------------------------------------------------------------------
// Request + drain
// ---------------------------------------------------------------------------

/// Send the IP-level "current" request.
pub fn send_request<C: MessageChannel>(channel: &mut C) -> Result<(), NatstatError> {
    let request = tpi::encode_request(MIB2_IP);
    channel
        .put_control(&request)
        .map_err(NatstatError::RequestSend)
}

/// Issue the request on an already configured channel and drain every reply.
///
/// Records come back grouped TCP4, TCP6, UDP4, UDP6. Nothing is returned
/// unless the whole reply stream was consumed.
pub fn collect<C: MessageChannel>(
    channel: &mut C,
    caps: &KernelCapabilities,
    budget: &DrainBudget,
) -> Result<Vec<ConnectionRecord>, NatstatError> {
    send_request(channel)?;
    let tables = drain(channel, caps, budget)?;
    let records = tables.into_records();
    log::info!("snapshot complete: {} record(s)", records.len());
    Ok(records)
}

/// Read reply messages until the kernel signals completion.
pub fn drain<C: MessageChannel>(
    channel: &mut C,
    caps: &KernelCapabilities,
    budget: &DrainBudget,
) -> Result<FamilyTables, NatstatError> {
    let mut tables = FamilyTables::new();
    let mut messages = 0usize;
    let mut ctl = [0u8; tpi::MESSAGE_LEN];

    loop {
        if let Some(deadline) = budget.deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(NatstatError::DeadlineExceeded { messages });
            }
            let ready = channel
                .wait_readable(remaining)
                .map_err(|e| NatstatError::ProtocolViolation(format!("poll failed: {e}")))?;
            if !ready {
                return Err(NatstatError::DeadlineExceeded { messages });
            }
        }

        ctl.fill(0);
        let got = channel
            .get_control(&mut ctl)
            .map_err(|e| NatstatError::ProtocolViolation(format!("getmsg(ctl) failed: {e}")))?;
        let received = &ctl[..got.len.min(ctl.len())];

        if got.more & MOREDATA == 0 {
            if let Some(err) = tpi::parse_error_ack(received) {
                return Err(NatstatError::ProtocolViolation(format!(
                    "request rejected: TLI error {}, UNIX error {}",
                    err.tli_error, err.unix_error
                )));
            }
            log::debug!("reply stream complete after {messages} table(s)");
            return Ok(tables);
        }
        if got.more & MORECTL != 0 {
            return Err(NatstatError::ProtocolViolation(format!(
                "table reply control part exceeds {} bytes",
                tpi::MESSAGE_LEN
            )));
        }

        let header = tpi::parse_reply(received)
            .map_err(|e| NatstatError::ProtocolViolation(e.to_string()))?;

        messages += 1;
        if let Some(max) = budget.max_messages.filter(|&max| messages > max) {
            return Err(NatstatError::BudgetExhausted { messages: max });
        }

        let declared = header.len as usize;
        if declared > budget.max_payload_bytes {
            return Err(NatstatError::ProtocolViolation(format!(
                "table {} declares {declared} bytes, limit is {}",
                header.tag, budget.max_payload_bytes
            )));
        }

        let mut payload = vec![0u8; declared];
        let got = channel.get_data(&mut payload).map_err(|e| {
            NatstatError::ProtocolViolation(format!(
                "getmsg(data) for table {} failed: {e}",
                header.tag
            ))
        })?;
        if got.more != 0 {
            return Err(NatstatError::ProtocolViolation(format!(
                "table {} carries more than the declared {declared} bytes",
                header.tag
            )));
        }
        payload.truncate(got.len.min(declared));

        log::debug!("table {}: {} byte(s)", header.tag, payload.len());
        tables.absorb(header.tag, &payload, caps);
    }
}

/// Take one snapshot of the kernel's TCP and UDP tables.
///
/// Opens `config.device`, pushes the protocol modules, issues the request
/// and drains the replies. The device is closed on every return path.
#[cfg(any(target_os = "solaris", target_os = "illumos"))]
pub fn snapshot(config: &SnapshotConfig) -> Result<Vec<ConnectionRecord>, NatstatError> {
    let mut channel = crate::streams::StreamsChannel::open(&config.device)?;
    for module in &config.modules {
        channel.push_module(module)?;
    }
    collect(&mut channel, &config.capabilities, &config.budget)
}

#[cfg(not(any(target_os = "solaris", target_os = "illumos")))]
pub fn snapshot(_config: &SnapshotConfig) -> Result<Vec<ConnectionRecord>, NatstatError> {
    Err(NatstatError::UnsupportedPlatform(
        "the STREAMS MIB2 interface exists only on Solaris and illumos",
    ))
}
