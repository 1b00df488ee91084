// Transport Provider Interface option-management messages.
//
// The request is `struct T_optmgmt_req` followed by `struct opthdr`; every
// reply starts with `struct T_optmgmt_ack` followed by `struct opthdr`.
// All fields are 32-bit integers in host byte order (<sys/tihdr.h>).

use crate::mib2::TableTag;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const T_SVR4_OPTMGMT_REQ: i32 = 9;
pub const T_ERROR_ACK: i32 = 18;
pub const T_OPTMGMT_ACK: i32 = 22;

/// `MGMT_flags` value asking for the current values.
pub const T_CURRENT: i32 = 0x080;

/// `struct T_optmgmt_req` / `struct T_optmgmt_ack`: four `t_scalar_t`.
pub const OPTMGMT_HDR_LEN: usize = 16;
/// `struct opthdr`: level, name, len.
pub const OPTHDR_LEN: usize = 12;
/// Control part of a request or a reply header.
pub const MESSAGE_LEN: usize = OPTMGMT_HDR_LEN + OPTHDR_LEN;

/// `struct T_error_ack`: PRIM_type, ERROR_prim, TLI_error, UNIX_error.
const ERROR_ACK_LEN: usize = 16;

const _: () = assert!(MESSAGE_LEN == 28);

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Encode a "current data" option-management request for every table at
/// `level` (option name 0 is the wildcard).
pub fn encode_request(level: u32) -> [u8; MESSAGE_LEN] {
    let mut buf = [0u8; MESSAGE_LEN];
    put_i32(&mut buf, 0, T_SVR4_OPTMGMT_REQ);
    put_i32(&mut buf, 4, OPTHDR_LEN as i32);
    put_i32(&mut buf, 8, OPTMGMT_HDR_LEN as i32);
    put_i32(&mut buf, 12, T_CURRENT);
    put_u32(&mut buf, 16, level);
    put_u32(&mut buf, 20, 0);
    put_u32(&mut buf, 24, 0);
    buf
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// Decoded and validated reply header announcing one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub tag: TableTag,
    /// Declared payload length in bytes.
    pub len: u32,
}

/// Reasons a reply header is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ReplyError {
    #[error("reply primitive {prim_type} is not T_OPTMGMT_ACK ({ack})", ack = T_OPTMGMT_ACK)]
    NotAnAck { prim_type: i32 },
    #[error("reply control part is {received} bytes, need {need}", need = MESSAGE_LEN)]
    ShortControl { received: usize },
    #[error(
        "reply OPT_length {opt_length} is smaller than opthdr ({min})",
        min = OPTHDR_LEN
    )]
    ShortOption { opt_length: i32 },
}

/// Validate the control part of a reply that announced trailing data.
///
/// `ctl` is the bytes actually received.
pub fn parse_reply(ctl: &[u8]) -> Result<ReplyHeader, ReplyError> {
    if ctl.len() >= 4 {
        let prim_type = get_i32(ctl, 0);
        if prim_type != T_OPTMGMT_ACK {
            return Err(ReplyError::NotAnAck { prim_type });
        }
    }
    if ctl.len() < MESSAGE_LEN {
        return Err(ReplyError::ShortControl {
            received: ctl.len(),
        });
    }
    let opt_length = get_i32(ctl, 4);
    if opt_length < OPTHDR_LEN as i32 {
        return Err(ReplyError::ShortOption { opt_length });
    }

    Ok(ReplyHeader {
        tag: TableTag {
            level: get_u32(ctl, 16),
            name: get_u32(ctl, 20),
        },
        len: get_u32(ctl, 24),
    })
}

/// Kernel rejection carried by a `T_ERROR_ACK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorAck {
    pub tli_error: i32,
    pub unix_error: i32,
}

/// Returns the error codes if `ctl` is a `T_ERROR_ACK`.
pub fn parse_error_ack(ctl: &[u8]) -> Option<ErrorAck> {
    if ctl.len() < ERROR_ACK_LEN || get_i32(ctl, 0) != T_ERROR_ACK {
        return None;
    }
    Some(ErrorAck {
        tli_error: get_i32(ctl, 8),
        unix_error: get_i32(ctl, 12),
    })
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn put_i32(buf: &mut [u8], offset: usize, val: i32) {
    buf[offset..offset + 4].copy_from_slice(&val.to_ne_bytes());
}

fn put_u32(buf: &mut [u8], offset: usize, val: u32) {
    buf[offset..offset + 4].copy_from_slice(&val.to_ne_bytes());
}

fn get_i32(buf: &[u8], offset: usize) -> i32 {
    i32::from_ne_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn get_u32(buf: &[u8], offset: usize) -> u32 {
    get_i32(buf, offset) as u32
}
