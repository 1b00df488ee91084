// Fixed-layout MIB2 entries.
//
// <inet/mib2.h> packs these structures to 4-byte alignment so 32- and 64-bit
// consumers see the same layout. Integers are host byte order, addresses are
// raw network-order octets, and each port is the low 16 bits of a 32-bit
// field holding the port in network byte order.
//
// Kernels that record the creating process append `uint32_t pid` and
// `uint64_t creation time` to every entry.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::model::{ConnectionRecord, ConnectionState, Protocol};

use super::{KernelCapabilities, TableKind, tcp_state};

/// `uint32_t *CreationProcess` + `uint64_t *CreationTime`.
pub const CREATION_FIELDS_LEN: usize = 12;

/// `struct tcpConnEntryInfo_s`: eight counters/gauges and the internal state.
const TCP_CONN_INFO_LEN: usize = 36;

// mib2_tcpConnEntry_t
const TCP4_STATE: usize = 0;
const TCP4_LOCAL_ADDR: usize = 4;
const TCP4_LOCAL_PORT: usize = 8;
const TCP4_REM_ADDR: usize = 12;
const TCP4_REM_PORT: usize = 16;
pub const TCP4_BASE_LEN: usize = 20 + TCP_CONN_INFO_LEN;
const TCP4_PID: usize = TCP4_BASE_LEN;

// mib2_tcp6ConnEntry_t
const TCP6_LOCAL_ADDR: usize = 0;
const TCP6_LOCAL_PORT: usize = 16;
const TCP6_REM_ADDR: usize = 20;
const TCP6_REM_PORT: usize = 36;
const TCP6_STATE: usize = 44;
pub const TCP6_BASE_LEN: usize = 48 + TCP_CONN_INFO_LEN;
const TCP6_PID: usize = TCP6_BASE_LEN;

// mib2_udpEntry_t, udpEntryInfo is state + remote address + remote port
const UDP4_LOCAL_ADDR: usize = 0;
const UDP4_LOCAL_PORT: usize = 4;
pub const UDP4_BASE_LEN: usize = 8 + 12;
const UDP4_PID: usize = UDP4_BASE_LEN;

// mib2_udp6Entry_t, udp6EntryInfo is state + remote address + remote port
const UDP6_LOCAL_ADDR: usize = 0;
const UDP6_LOCAL_PORT: usize = 16;
pub const UDP6_BASE_LEN: usize = 24 + 24;
const UDP6_PID: usize = UDP6_BASE_LEN;

const _: () = assert!(TCP4_BASE_LEN == 56);
const _: () = assert!(TCP6_BASE_LEN == 84);
const _: () = assert!(UDP4_BASE_LEN == 20);
const _: () = assert!(UDP6_BASE_LEN == 48);

// ---------------------------------------------------------------------------
// Per-family decoders
// ---------------------------------------------------------------------------

/// Decode one TCP4 entry. `None` if `rec` is shorter than the entry size.
pub fn decode_tcp4(rec: &[u8], caps: &KernelCapabilities) -> Option<ConnectionRecord> {
    if rec.len() < TableKind::Tcp4.record_size(caps) {
        return None;
    }
    let state = tcp_state(read_i32(rec, TCP4_STATE));
    Some(ConnectionRecord {
        protocol: Protocol::Tcp4,
        local_address: ipv4_at(rec, TCP4_LOCAL_ADDR),
        local_port: port_at(rec, TCP4_LOCAL_PORT),
        remote_address: ipv4_at(rec, TCP4_REM_ADDR),
        remote_port: port_at(rec, TCP4_REM_PORT),
        state,
        owning_process_id: tcp_pid(rec, TCP4_PID, state, caps),
    })
}

/// Decode one TCP6 entry. `None` if `rec` is shorter than the entry size.
pub fn decode_tcp6(rec: &[u8], caps: &KernelCapabilities) -> Option<ConnectionRecord> {
    if rec.len() < TableKind::Tcp6.record_size(caps) {
        return None;
    }
    let state = tcp_state(read_i32(rec, TCP6_STATE));
    Some(ConnectionRecord {
        protocol: Protocol::Tcp6,
        local_address: ipv6_at(rec, TCP6_LOCAL_ADDR),
        local_port: port_at(rec, TCP6_LOCAL_PORT),
        remote_address: ipv6_at(rec, TCP6_REM_ADDR),
        remote_port: port_at(rec, TCP6_REM_PORT),
        state,
        owning_process_id: tcp_pid(rec, TCP6_PID, state, caps),
    })
}

/// Decode one UDP4 entry. The remote side is always `0.0.0.0:0`.
pub fn decode_udp4(rec: &[u8], caps: &KernelCapabilities) -> Option<ConnectionRecord> {
    if rec.len() < TableKind::Udp4.record_size(caps) {
        return None;
    }
    Some(ConnectionRecord {
        protocol: Protocol::Udp4,
        local_address: ipv4_at(rec, UDP4_LOCAL_ADDR),
        local_port: port_at(rec, UDP4_LOCAL_PORT),
        remote_address: Ipv4Addr::UNSPECIFIED.to_string(),
        remote_port: 0,
        state: ConnectionState::NotApplicable,
        owning_process_id: udp_pid(rec, UDP4_PID, caps),
    })
}

/// Decode one UDP6 entry. The remote side is always `:::0`.
pub fn decode_udp6(rec: &[u8], caps: &KernelCapabilities) -> Option<ConnectionRecord> {
    if rec.len() < TableKind::Udp6.record_size(caps) {
        return None;
    }
    Some(ConnectionRecord {
        protocol: Protocol::Udp6,
        local_address: ipv6_at(rec, UDP6_LOCAL_ADDR),
        local_port: port_at(rec, UDP6_LOCAL_PORT),
        remote_address: Ipv6Addr::UNSPECIFIED.to_string(),
        remote_port: 0,
        state: ConnectionState::NotApplicable,
        owning_process_id: udp_pid(rec, UDP6_PID, caps),
    })
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

// The creation-process field is stale once a connection reaches TIME_WAIT.
fn tcp_pid(
    rec: &[u8],
    offset: usize,
    state: ConnectionState,
    caps: &KernelCapabilities,
) -> Option<u32> {
    if state == ConnectionState::TimeWait {
        return None;
    }
    udp_pid(rec, offset, caps)
}

fn udp_pid(rec: &[u8], offset: usize, caps: &KernelCapabilities) -> Option<u32> {
    caps.process_id.then(|| read_u32(rec, offset))
}

fn read_u32(rec: &[u8], offset: usize) -> u32 {
    u32::from_ne_bytes([
        rec[offset],
        rec[offset + 1],
        rec[offset + 2],
        rec[offset + 3],
    ])
}

fn read_i32(rec: &[u8], offset: usize) -> i32 {
    read_u32(rec, offset) as i32
}

fn port_at(rec: &[u8], offset: usize) -> u16 {
    u16::from_be(read_u32(rec, offset) as u16)
}

fn ipv4_at(rec: &[u8], offset: usize) -> String {
    Ipv4Addr::new(
        rec[offset],
        rec[offset + 1],
        rec[offset + 2],
        rec[offset + 3],
    )
    .to_string()
}

fn ipv6_at(rec: &[u8], offset: usize) -> String {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&rec[offset..offset + 16]);
    Ipv6Addr::from(octets).to_string()
}
