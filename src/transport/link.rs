// SPDX-License-Identifier: GPL-3.0-only

//! Physical links to the controller board
//!
//! A [`Link`] opens into independent read and write halves. The read half must
//! return periodically (timeout or zero-length read) so the read loop can
//! observe shutdown, and knows whether a zero-length read means the peer hung up.

use crate::constants;
use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::time::Duration;
use tracing::{debug, info};

pub type LinkWriter = Box<dyn Write + Send>;

/// Meaning of a zero-length read on a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroRead {
    /// End of stream: the peer closed the link
    Eof,
    /// Read timeout (TTY with VMIN=0); poll the descriptor for a hang-up
    CheckHangup(RawFd),
}

/// Read half of a link
pub struct LinkReader {
    inner: Box<dyn Read + Send>,
    zero_read: ZeroRead,
}

impl LinkReader {
    pub fn new(inner: Box<dyn Read + Send>, zero_read: ZeroRead) -> Self {
        Self { inner, zero_read }
    }

    /// Whether the peer is gone, asked after a zero-length read
    pub fn hung_up(&self) -> bool {
        match self.zero_read {
            ZeroRead::Eof => true,
            ZeroRead::CheckHangup(fd) => poll_hangup(fd),
        }
    }
}

impl Read for LinkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Non-blocking `poll(2)` for POLLHUP/POLLERR/POLLNVAL on `fd`
fn poll_hangup(fd: RawFd) -> bool {
    let mut pfd = libc::pollfd {
        fd,
        events: 0,
        revents: 0,
    };
    // SAFETY: pfd is a valid pollfd for the duration of the call, nfds is 1
    let rc = unsafe { libc::poll(&mut pfd, 1, 0) };
    rc > 0 && pfd.revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0
}

/// Something the transport can connect over
pub trait Link {
    /// Endpoint name for logs and errors
    fn name(&self) -> String;

    /// Open the link and split it into read and write halves
    fn open(self) -> io::Result<(LinkReader, LinkWriter)>;
}

/// Serial TTY (RFCOMM Bluetooth bridge, USB-UART, ...)
#[derive(Debug, Clone)]
pub struct SerialLink {
    path: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialLink {
    pub fn new(path: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            read_timeout: Duration::from_millis(constants::link::READ_TIMEOUT_MS),
        }
    }

    pub fn from_config(config: &crate::config::LinkConfig) -> Self {
        Self {
            path: config.device.clone(),
            baud_rate: config.baud_rate,
            read_timeout: config.read_timeout(),
        }
    }
}

impl Link for SerialLink {
    fn name(&self) -> String {
        self.path.clone()
    }

    fn open(self) -> io::Result<(LinkReader, LinkWriter)> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&self.path)?;

        let fd = file.as_raw_fd();
        configure_tty(fd, self.baud_rate, self.read_timeout)?;
        info!(path = %self.path, baud = self.baud_rate, "Serial link configured");

        let writer = file.try_clone()?;
        let reader = LinkReader::new(Box::new(file), ZeroRead::CheckHangup(fd));
        Ok((reader, Box::new(writer)))
    }
}

/// Map a numeric baud rate to its termios constant
fn baud_constant(baud: u32) -> Option<libc::speed_t> {
    Some(match baud {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        230400 => libc::B230400,
        _ => return None,
    })
}

/// Raw mode, 8N1, no flow control, VMIN=0 with VTIME as read timeout
fn configure_tty(fd: RawFd, baud: u32, read_timeout: Duration) -> io::Result<()> {
    let speed = baud_constant(baud).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported baud rate {}", baud),
        )
    })?;

    let mut tio: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        return Err(io::Error::last_os_error());
    }

    unsafe { libc::cfmakeraw(&mut tio) };
    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    tio.c_cflag &= !(libc::CSTOPB | libc::PARENB);

    // VTIME is in tenths of a second
    let deciseconds = (read_timeout.as_millis() / 100).clamp(1, 255) as libc::cc_t;
    tio.c_cc[libc::VMIN] = 0;
    tio.c_cc[libc::VTIME] = deciseconds;

    if unsafe { libc::cfsetispeed(&mut tio, speed) } != 0
        || unsafe { libc::cfsetospeed(&mut tio, speed) } != 0
    {
        return Err(io::Error::last_os_error());
    }

    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } != 0 {
        return Err(io::Error::last_os_error());
    }

    // Drop anything the board sent before we were listening
    unsafe { libc::tcflush(fd, libc::TCIFLUSH) };
    debug!(fd, baud, vtime = deciseconds, "TTY set to raw mode");
    Ok(())
}

/// Unix socket link, used for serial relays (socat) and tests
impl Link for UnixStream {
    fn name(&self) -> String {
        match self.peer_addr() {
            Ok(addr) => match addr.as_pathname() {
                Some(path) => path.display().to_string(),
                None => "unix-stream".to_string(),
            },
            Err(_) => "unix-stream".to_string(),
        }
    }

    fn open(self) -> io::Result<(LinkReader, LinkWriter)> {
        let timeout = Duration::from_millis(constants::link::READ_TIMEOUT_MS);
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(Duration::from_secs(1)))?;
        let writer = self.try_clone()?;
        // Timeouts surface as WouldBlock, so a zero-length read is EOF
        Ok((LinkReader::new(Box::new(self), ZeroRead::Eof), Box::new(writer)))
    }
}
