// STREAMS control device (Solaris / illumos).
//
// The device is opened read/write, the `tcp` and `udp` modules are pushed on
// top of it, and the MIB2 request/replies travel as putmsg/getmsg messages.
// TPI acknowledgements are high-priority messages, so readiness is polled
// with POLLPRI as well as POLLIN.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::time::Duration;

use crate::error::NatstatError;
use crate::snapshot::{MessageChannel, Received};

// ---------------------------------------------------------------------------
// FFI: <stropts.h>
// ---------------------------------------------------------------------------

const STR: libc::c_int = (b'S' as libc::c_int) << 8;
const I_PUSH: libc::c_int = STR | 0o2;

const _: () = assert!(I_PUSH == 0x5302);

#[repr(C)]
struct strbuf {
    maxlen: libc::c_int,
    len: libc::c_int,
    buf: *mut libc::c_char,
}

unsafe extern "C" {
    fn getmsg(
        fildes: libc::c_int,
        ctlptr: *mut strbuf,
        dataptr: *mut strbuf,
        flagsp: *mut libc::c_int,
    ) -> libc::c_int;

    fn putmsg(
        fildes: libc::c_int,
        ctlptr: *const strbuf,
        dataptr: *const strbuf,
        flags: libc::c_int,
    ) -> libc::c_int;
}

/// Open STREAMS control channel.
///
/// Drop closes the fd automatically via OwnedFd, on success and error paths
/// alike.
pub struct StreamsChannel {
    fd: OwnedFd,
    device: String,
}

impl StreamsChannel {
    /// Open `device` for read/write.
    pub fn open(device: &str) -> Result<Self, NatstatError> {
        let c_path = CString::new(device).map_err(|_| NatstatError::ChannelUnavailable {
            path: device.to_string(),
            source: io::Error::from(io::ErrorKind::InvalidInput),
        })?;

        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR) };
        if fd < 0 {
            return Err(NatstatError::ChannelUnavailable {
                path: device.to_string(),
                source: io::Error::last_os_error(),
            });
        }
        log::debug!("opened {device} (fd {fd})");

        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
            device: device.to_string(),
        })
    }

    /// Push `module` onto the stream (`I_PUSH`).
    pub fn push_module(&mut self, module: &str) -> Result<(), NatstatError> {
        let c_name = CString::new(module).map_err(|_| NatstatError::ModuleStack {
            module: module.to_string(),
            source: io::Error::from(io::ErrorKind::InvalidInput),
        })?;

        let ret = unsafe { libc::ioctl(self.fd.as_raw_fd(), I_PUSH as _, c_name.as_ptr()) };
        if ret == -1 {
            return Err(NatstatError::ModuleStack {
                module: module.to_string(),
                source: io::Error::last_os_error(),
            });
        }
        log::debug!("pushed module {module} onto {}", self.device);
        Ok(())
    }

    fn getmsg_retry(
        &mut self,
        ctl: Option<&mut [u8]>,
        data: Option<&mut [u8]>,
    ) -> io::Result<(Received, Received)> {
        let mut ctl_buf = ctl.map(as_strbuf);
        let mut data_buf = data.map(as_strbuf);
        let ctl_ptr = ctl_buf
            .as_mut()
            .map_or(std::ptr::null_mut(), |b| b as *mut strbuf);
        let data_ptr = data_buf
            .as_mut()
            .map_or(std::ptr::null_mut(), |b| b as *mut strbuf);

        loop {
            let mut flags: libc::c_int = 0;
            let ret = unsafe { getmsg(self.fd.as_raw_fd(), ctl_ptr, data_ptr, &mut flags) };
            if ret >= 0 {
                let ctl_len = ctl_buf.as_ref().map_or(0, |b| b.len.max(0) as usize);
                let data_len = data_buf.as_ref().map_or(0, |b| b.len.max(0) as usize);
                return Ok((
                    Received {
                        len: ctl_len,
                        more: ret,
                    },
                    Received {
                        len: data_len,
                        more: ret,
                    },
                ));
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

impl MessageChannel for StreamsChannel {
    fn put_control(&mut self, ctl: &[u8]) -> io::Result<()> {
        let buf = strbuf {
            maxlen: 0,
            len: ctl.len() as libc::c_int,
            buf: ctl.as_ptr() as *mut libc::c_char,
        };
        let ret = unsafe { putmsg(self.fd.as_raw_fd(), &buf, std::ptr::null(), 0) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn get_control(&mut self, buf: &mut [u8]) -> io::Result<Received> {
        self.getmsg_retry(Some(buf), None).map(|(ctl, _)| ctl)
    }

    fn get_data(&mut self, buf: &mut [u8]) -> io::Result<Received> {
        self.getmsg_retry(None, Some(buf)).map(|(_, data)| data)
    }

    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN | libc::POLLPRI,
            revents: 0,
        };
        // round up so a sub-millisecond remainder still waits
        let millis = timeout.as_micros().div_ceil(1000).min(libc::c_int::MAX as u128);

        loop {
            let ret = unsafe { libc::poll(&mut pfd, 1, millis as libc::c_int) };
            if ret >= 0 {
                return Ok(ret > 0);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

fn as_strbuf(buf: &mut [u8]) -> strbuf {
    strbuf {
        maxlen: buf.len().min(libc::c_int::MAX as usize) as libc::c_int,
        len: 0,
        buf: buf.as_mut_ptr() as *mut libc::c_char,
    }
}
