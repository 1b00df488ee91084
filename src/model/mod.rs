use serde::{Serialize, Serializer};

/// Protocol family of a connection record.
#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp4,
    Tcp6,
    Udp4,
    Udp6,
}

impl Protocol {
    pub fn is_tcp(self) -> bool {
        matches!(self, Self::Tcp4 | Self::Tcp6)
    }

    pub fn is_udp(self) -> bool {
        !self.is_tcp()
    }
}

/// Connection state as reported by the kernel.
///
/// `NotApplicable` is used for UDP endpoints, which have no state machine.
/// `Unknown` covers any TCP state code outside the MIB2 range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Established,
    SynSent,
    SynReceived,
    FinWait1,
    FinWait2,
    TimeWait,
    Closed,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    Unknown,
    NotApplicable,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Established => "ESTABLISHED",
            Self::SynSent => "SYN_SENT",
            Self::SynReceived => "SYN_RECV",
            Self::FinWait1 => "FIN_WAIT1",
            Self::FinWait2 => "FIN_WAIT2",
            Self::TimeWait => "TIME_WAIT",
            Self::Closed => "CLOSE",
            Self::CloseWait => "CLOSE_WAIT",
            Self::LastAck => "LAST_ACK",
            Self::Listen => "LISTEN",
            Self::Closing => "CLOSING",
            Self::Unknown => "UNKNOWN",
            Self::NotApplicable => "-",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ConnectionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp4 => write!(f, "tcp4"),
            Self::Tcp6 => write!(f, "tcp6"),
            Self::Udp4 => write!(f, "udp4"),
            Self::Udp6 => write!(f, "udp6"),
        }
    }
}

/// One TCP connection or UDP listener from a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConnectionRecord {
    pub protocol: Protocol,
    pub local_address: String,
    pub local_port: u16,
    pub remote_address: String,
    pub remote_port: u16,
    pub state: ConnectionState,
    /// Pid of the creating process, when the kernel exposes it and the
    /// field is meaningful for the connection's state.
    pub owning_process_id: Option<u32>,
}

impl ConnectionRecord {
    /// Pid rendered for tabular output, `-` when unknown.
    pub fn pid_label(&self) -> String {
        match self.owning_process_id {
            Some(pid) => pid.to_string(),
            None => "-".to_string(),
        }
    }
}
