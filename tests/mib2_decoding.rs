//! Cross-platform tests for MIB2 record decoding.
//!
//! Records are built byte-by-byte at the kernel offsets and decoded through
//! the public `mib2` API.
//!
//! Run with: `cargo test --test mib2_decoding`

use natstat::mib2::{self, KernelCapabilities, TableKind, decode_table};
use natstat::model::{ConnectionState, Protocol};

const LABELS: [&str; 12] = [
    "ESTABLISHED",
    "SYN_SENT",
    "SYN_RECV",
    "FIN_WAIT1",
    "FIN_WAIT2",
    "TIME_WAIT",
    "CLOSE",
    "CLOSE_WAIT",
    "LAST_ACK",
    "LISTEN",
    "CLOSING",
    "UNKNOWN",
];

fn caps(process_id: bool) -> KernelCapabilities {
    KernelCapabilities {
        ipv6_tables: true,
        process_id,
    }
}

fn tcp4_with_state(state: i32, process_id: bool) -> Vec<u8> {
    let mut rec = vec![0u8; TableKind::Tcp4.record_size(&caps(process_id))];
    rec[0..4].copy_from_slice(&state.to_ne_bytes());
    rec
}

/// Every state code decodes to one of the defined labels.
#[test]
fn tcp_state_always_a_known_label() {
    for code in -5..300 {
        let rec = tcp4_with_state(code, false);
        let decoded = decode_table(TableKind::Tcp4, &rec, &caps(false));
        assert_eq!(decoded.len(), 1);
        let label = decoded[0].state.to_string();
        assert!(LABELS.contains(&label.as_str()), "code {code} -> {label}");
    }
}

/// closing (10) and deleteTCB (12) are distinct codes with the same label.
#[test]
fn closing_tie_break() {
    let closing = decode_table(TableKind::Tcp4, &tcp4_with_state(10, false), &caps(false));
    let delete_tcb = decode_table(TableKind::Tcp4, &tcp4_with_state(12, false), &caps(false));
    assert_eq!(closing[0].state, ConnectionState::Closing);
    assert_eq!(delete_tcb[0].state, ConnectionState::Closing);
    assert_eq!(closing[0].state.to_string(), "CLOSING");
}

/// A payload of `k * size + r` bytes yields exactly `k` records.
#[test]
fn whole_records_only() {
    let kinds = [
        TableKind::Tcp4,
        TableKind::Tcp6,
        TableKind::Udp4,
        TableKind::Udp6,
    ];
    for process_id in [false, true] {
        let caps = caps(process_id);
        for kind in kinds {
            let size = kind.record_size(&caps);
            for k in [0usize, 1, 4] {
                for r in [0, 1, size / 2, size - 1] {
                    let payload = vec![0u8; k * size + r];
                    let records = decode_table(kind, &payload, &caps);
                    assert_eq!(records.len(), k, "{kind:?} k={k} r={r} pid={process_id}");
                    assert!(records.iter().all(|rec| rec.protocol == kind.protocol()));
                }
            }
        }
    }
}

/// Ports stored in network order come back in host order.
#[test]
fn port_conversion() {
    let caps = caps(true);
    for port in [7u16, 80, 443, 1024, 49152, 65535] {
        let mut rec = vec![0u8; TableKind::Tcp6.record_size(&caps)];
        rec[16..20].copy_from_slice(&(port.to_be() as u32).to_ne_bytes());
        rec[36..40].copy_from_slice(&(port.wrapping_add(1).to_be() as u32).to_ne_bytes());
        let decoded = decode_table(TableKind::Tcp6, &rec, &caps);
        assert_eq!(decoded[0].local_port, port);
        assert_eq!(decoded[0].remote_port, port.wrapping_add(1));
    }
}

/// UDP records always report the family's unspecified remote endpoint.
#[test]
fn udp_remote_placeholders() {
    let caps = caps(false);
    let mut rec4 = vec![0xFFu8; TableKind::Udp4.record_size(&caps)];
    rec4[0..4].copy_from_slice(&[172, 16, 0, 1]);
    let mut rec6 = vec![0xFFu8; TableKind::Udp6.record_size(&caps)];
    rec6[0..16].copy_from_slice(&[0u8; 16]);

    let v4 = decode_table(TableKind::Udp4, &rec4, &caps);
    assert_eq!(v4[0].local_address, "172.16.0.1");
    assert_eq!(v4[0].remote_address, "0.0.0.0");
    assert_eq!(v4[0].remote_port, 0);
    assert_eq!(v4[0].state, ConnectionState::NotApplicable);

    let v6 = decode_table(TableKind::Udp6, &rec6, &caps);
    assert_eq!(v6[0].local_address, "::");
    assert_eq!(v6[0].remote_address, "::");
    assert_eq!(v6[0].remote_port, 0);
    assert_eq!(v6[0].protocol, Protocol::Udp6);
}

/// IPv4-mapped and full IPv6 addresses use the canonical text form.
#[test]
fn ipv6_canonical_text() {
    let caps = caps(false);
    let cases: [([u8; 16], &str); 3] = [
        (
            [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 192, 0, 2, 1],
            "::ffff:192.0.2.1",
        ),
        (
            [
                0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 1,
            ],
            "2001:db8::1:0:0:1",
        ),
        (
            [
                0x20, 0x01, 0x0d, 0xb8, 0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0, 0x11,
                0x22, 0x33, 0x44,
            ],
            "2001:db8:1234:5678:9abc:def0:1122:3344",
        ),
    ];
    for (octets, text) in cases {
        let mut rec = vec![0u8; TableKind::Tcp6.record_size(&caps)];
        rec[0..16].copy_from_slice(&octets);
        let decoded = decode_table(TableKind::Tcp6, &rec, &caps);
        assert_eq!(decoded[0].local_address, text);
    }
}

/// Kernel order within a table is preserved.
#[test]
fn kernel_order_preserved() {
    let caps = caps(false);
    let size = TableKind::Udp4.record_size(&caps);
    let mut payload = vec![0u8; size * 5];
    for (i, rec) in payload.chunks_exact_mut(size).enumerate() {
        rec[3] = i as u8;
    }
    let decoded = decode_table(TableKind::Udp4, &payload, &caps);
    let addrs: Vec<_> = decoded.iter().map(|r| r.local_address.as_str()).collect();
    assert_eq!(addrs, ["0.0.0.0", "0.0.0.1", "0.0.0.2", "0.0.0.3", "0.0.0.4"]);
}

/// The state mapping is exposed directly for callers formatting raw codes.
#[test]
fn tcp_state_function() {
    assert_eq!(mib2::tcp_state(mib2::MIB2_TCP_LISTEN), ConnectionState::Listen);
    assert_eq!(mib2::tcp_state(0), ConnectionState::Unknown);
}
