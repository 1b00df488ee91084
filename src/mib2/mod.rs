// MIB2 table tags, kernel capabilities and per-family aggregation.
//
// Tag values and TCP state codes follow <inet/mib2.h>. The IPv6 tables share
// their level with the IPv4 ones and differ only in the name.

pub mod record;

use crate::model::{ConnectionRecord, ConnectionState, Protocol};

// ---------------------------------------------------------------------------
// Levels and names
// ---------------------------------------------------------------------------

pub const MIB2_IP: u32 = 0;
pub const MIB2_TCP: u32 = 6;
pub const MIB2_UDP: u32 = 17;
pub const MIB2_TCP6: u32 = MIB2_TCP;
pub const MIB2_UDP6: u32 = MIB2_UDP;

pub const MIB2_UDP_ENTRY: u32 = 5;
pub const MIB2_UDP6_ENTRY: u32 = 6;
pub const MIB2_TCP_CONN: u32 = 13;
pub const MIB2_TCP6_CONN: u32 = 14;

// ---------------------------------------------------------------------------
// TCP state codes
// ---------------------------------------------------------------------------

pub const MIB2_TCP_CLOSED: i32 = 1;
pub const MIB2_TCP_LISTEN: i32 = 2;
pub const MIB2_TCP_SYN_SENT: i32 = 3;
pub const MIB2_TCP_SYN_RECEIVED: i32 = 4;
pub const MIB2_TCP_ESTABLISHED: i32 = 5;
pub const MIB2_TCP_FIN_WAIT_1: i32 = 6;
pub const MIB2_TCP_FIN_WAIT_2: i32 = 7;
pub const MIB2_TCP_CLOSE_WAIT: i32 = 8;
pub const MIB2_TCP_LAST_ACK: i32 = 9;
pub const MIB2_TCP_CLOSING: i32 = 10;
pub const MIB2_TCP_TIME_WAIT: i32 = 11;
pub const MIB2_TCP_DELETE_TCB: i32 = 12;

/// Map a kernel TCP state code to a [`ConnectionState`].
pub fn tcp_state(code: i32) -> ConnectionState {
    match code {
        MIB2_TCP_ESTABLISHED => ConnectionState::Established,
        MIB2_TCP_SYN_SENT => ConnectionState::SynSent,
        MIB2_TCP_SYN_RECEIVED => ConnectionState::SynReceived,
        MIB2_TCP_FIN_WAIT_1 => ConnectionState::FinWait1,
        MIB2_TCP_FIN_WAIT_2 => ConnectionState::FinWait2,
        MIB2_TCP_TIME_WAIT => ConnectionState::TimeWait,
        MIB2_TCP_CLOSED => ConnectionState::Closed,
        MIB2_TCP_CLOSE_WAIT => ConnectionState::CloseWait,
        MIB2_TCP_LAST_ACK => ConnectionState::LastAck,
        MIB2_TCP_LISTEN => ConnectionState::Listen,
        MIB2_TCP_CLOSING | MIB2_TCP_DELETE_TCB => ConnectionState::Closing,
        _ => ConnectionState::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Tags and capabilities
// ---------------------------------------------------------------------------

/// `(level, name)` pair identifying the table carried by one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableTag {
    pub level: u32,
    pub name: u32,
}

impl std::fmt::Display for TableTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.level, self.name)
    }
}

/// Optional parts of the kernel's MIB2 ABI.
///
/// Resolved once at startup and passed down to decoding. `process_id` also
/// changes the record sizes, since the creation-process and creation-time
/// fields are appended to every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelCapabilities {
    /// The kernel answers with the IPv6 TCP/UDP tables.
    pub ipv6_tables: bool,
    /// Entries carry `*CreationProcess` / `*CreationTime`.
    pub process_id: bool,
}

impl KernelCapabilities {
    /// Defaults for the build target: Solaris 11 exposes the creating
    /// process, illumos entries stop before it. Both have IPv6 tables.
    pub fn detect() -> Self {
        Self {
            ipv6_tables: true,
            process_id: cfg!(target_os = "solaris"),
        }
    }
}

impl Default for KernelCapabilities {
    fn default() -> Self {
        Self::detect()
    }
}

/// The four tables this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Tcp4,
    Tcp6,
    Udp4,
    Udp6,
}

impl TableKind {
    /// Identify a reply tag. Unknown tags, and IPv6 tags on kernels without
    /// IPv6 tables, yield `None`.
    pub fn from_tag(tag: TableTag, caps: &KernelCapabilities) -> Option<Self> {
        match (tag.level, tag.name) {
            (MIB2_TCP, MIB2_TCP_CONN) => Some(Self::Tcp4),
            (MIB2_UDP, MIB2_UDP_ENTRY) => Some(Self::Udp4),
            (MIB2_TCP6, MIB2_TCP6_CONN) if caps.ipv6_tables => Some(Self::Tcp6),
            (MIB2_UDP6, MIB2_UDP6_ENTRY) if caps.ipv6_tables => Some(Self::Udp6),
            _ => None,
        }
    }

    pub fn protocol(self) -> Protocol {
        match self {
            Self::Tcp4 => Protocol::Tcp4,
            Self::Tcp6 => Protocol::Tcp6,
            Self::Udp4 => Protocol::Udp4,
            Self::Udp6 => Protocol::Udp6,
        }
    }

    /// Size in bytes of one entry on a kernel with `caps`.
    pub fn record_size(self, caps: &KernelCapabilities) -> usize {
        let base = match self {
            Self::Tcp4 => record::TCP4_BASE_LEN,
            Self::Tcp6 => record::TCP6_BASE_LEN,
            Self::Udp4 => record::UDP4_BASE_LEN,
            Self::Udp6 => record::UDP6_BASE_LEN,
        };
        if caps.process_id {
            base + record::CREATION_FIELDS_LEN
        } else {
            base
        }
    }

    fn decode_one(self, rec: &[u8], caps: &KernelCapabilities) -> Option<ConnectionRecord> {
        match self {
            Self::Tcp4 => record::decode_tcp4(rec, caps),
            Self::Tcp6 => record::decode_tcp6(rec, caps),
            Self::Udp4 => record::decode_udp4(rec, caps),
            Self::Udp6 => record::decode_udp6(rec, caps),
        }
    }
}

// ---------------------------------------------------------------------------
// Table decoding
// ---------------------------------------------------------------------------

/// Decode a whole table payload.
///
/// The payload is cut into whole records; trailing bytes that do not fill a
/// record are ignored.
pub fn decode_table(
    kind: TableKind,
    payload: &[u8],
    caps: &KernelCapabilities,
) -> Vec<ConnectionRecord> {
    let size = kind.record_size(caps);
    let chunks = payload.chunks_exact(size);
    let trailing = chunks.remainder().len();
    if trailing != 0 {
        log::debug!(
            "{}: ignoring {} trailing byte(s) after {} record(s)",
            kind.protocol(),
            trailing,
            payload.len() / size
        );
    }

    chunks.filter_map(|rec| kind.decode_one(rec, caps)).collect()
}

/// Records collected per family during one snapshot.
///
/// Replies can arrive in any order; [`FamilyTables::into_records`] always
/// yields TCP4, TCP6, UDP4, then UDP6, each in kernel order.
#[derive(Debug, Default)]
pub struct FamilyTables {
    tcp4: Vec<ConnectionRecord>,
    tcp6: Vec<ConnectionRecord>,
    udp4: Vec<ConnectionRecord>,
    udp6: Vec<ConnectionRecord>,
}

impl FamilyTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one drained payload into its family list.
    ///
    /// Returns the number of records added; unrecognized tags add nothing.
    pub fn absorb(&mut self, tag: TableTag, payload: &[u8], caps: &KernelCapabilities) -> usize {
        let Some(kind) = TableKind::from_tag(tag, caps) else {
            log::debug!("skipping MIB2 table {tag} ({} bytes)", payload.len());
            return 0;
        };

        if !payload.is_empty() && payload.len() < kind.record_size(caps) {
            log::warn!(
                "{} table of {} bytes is smaller than one {}-byte record",
                kind.protocol(),
                payload.len(),
                kind.record_size(caps)
            );
        }

        let decoded = decode_table(kind, payload, caps);
        let added = decoded.len();
        log::debug!("{}: decoded {} record(s)", kind.protocol(), added);

        let list = match kind {
            TableKind::Tcp4 => &mut self.tcp4,
            TableKind::Tcp6 => &mut self.tcp6,
            TableKind::Udp4 => &mut self.udp4,
            TableKind::Udp6 => &mut self.udp6,
        };
        list.extend(decoded);
        added
    }

    pub fn len(&self) -> usize {
        self.tcp4.len() + self.tcp6.len() + self.udp4.len() + self.udp6.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenate the families in TCP4, TCP6, UDP4, UDP6 order.
    pub fn into_records(self) -> Vec<ConnectionRecord> {
        let mut out = Vec::with_capacity(self.len());
        out.extend(self.tcp4);
        out.extend(self.tcp6);
        out.extend(self.udp4);
        out.extend(self.udp6);
        out
    }
}
