//! Socket transport: connect with an ownership check, then issue v1
//! lines or v2 JSON-RPC calls, reading one `\n`-terminated response per
//! request.

use anyhow::Context as _;
use codec::{Request, Response, RpcError, MAX_FRAME_LENGTH};
use serde_json::Value;
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("timed out waiting for a response")]
pub struct Timeout;

pub struct Client {
    stream: UnixStream,
    buffer: Vec<u8>,
    next_id: u64,
}

impl Client {
    /// Connect to the control socket, refusing sockets owned by another
    /// user and turning the usual failure modes into actionable messages.
    pub fn connect(path: &Path, timeout: Duration) -> anyhow::Result<Self> {
        let meta = std::fs::metadata(path).with_context(|| {
            format!(
                "no control socket at {}; is the app running? \
                 (set {} to use a different path)",
                path.display(),
                config::SOCKET_PATH_ENV
            )
        })?;
        let us = unsafe { libc::geteuid() };
        if meta.uid() != us {
            anyhow::bail!(
                "control socket {} is owned by uid {}, not by you (uid {}); refusing to connect",
                path.display(),
                meta.uid(),
                us
            );
        }

        let stream = UnixStream::connect(path)
            .with_context(|| format!("connecting to {}", path.display()))?;
        stream.set_read_timeout(Some(timeout)).context("set_read_timeout")?;
        stream.set_write_timeout(Some(timeout)).context("set_write_timeout")?;
        Ok(Self {
            stream,
            buffer: vec![],
            next_id: 1,
        })
    }

    pub fn connect_default() -> anyhow::Result<Self> {
        let cfg = config::configuration();
        Self::connect(&cfg.socket_path, cfg.cli_response_timeout)
    }

    /// Issue a v1 command and return the raw response text (without the
    /// trailing newline).  v1 listings span several lines, so the reader
    /// drains until the server goes quiet.
    pub fn send_line(&mut self, line: &str) -> anyhow::Result<String> {
        anyhow::ensure!(!line.contains('\n'), "v1 command must be a single line");
        self.stream
            .write_all(line.as_bytes())
            .context("writing command")?;
        self.stream.write_all(b"\n").context("writing command")?;
        self.read_frame(false)
    }

    /// Issue a v2 call and return the result, with protocol errors
    /// surfaced as [`RpcError`].
    pub fn call(&mut self, method: &str, params: Value) -> anyhow::Result<Result<Value, RpcError>> {
        let id = self.next_id;
        self.next_id += 1;
        let request = Request {
            id: Some(Value::from(id)),
            method: method.to_string(),
            params,
        };
        let mut line = serde_json::to_string(&request).context("encoding request")?;
        line.push('\n');
        self.stream
            .write_all(line.as_bytes())
            .context("writing request")?;

        let text = self.read_frame(true)?;
        let response: Response = serde_json::from_str(&text)
            .with_context(|| format!("malformed response: {:?}", text))?;
        Ok(response.into_result())
    }

    /// Like [`Client::call`], but protocol errors become `anyhow` errors.
    pub fn call_ok(&mut self, method: &str, params: Value) -> anyhow::Result<Value> {
        self.call(method, params)?.map_err(|e| anyhow::anyhow!("{}", e))
    }

    /// Read one response frame, terminated by `\n`.  When `single_line`,
    /// the first line is the whole frame (v2).  Otherwise we keep
    /// draining while the server still has bytes in flight so that
    /// multi-line listings come back intact.
    fn read_frame(&mut self, single_line: bool) -> anyhow::Result<String> {
        let mut chunk = [0u8; 8192];
        loop {
            if single_line {
                if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                    let rest = self.buffer.split_off(pos + 1);
                    let mut frame = std::mem::replace(&mut self.buffer, rest);
                    frame.pop();
                    return String::from_utf8(frame).context("response is not valid utf-8");
                }
            } else if self.buffer.ends_with(b"\n") && !self.more_pending()? {
                return self.take_frame();
            }
            if self.buffer.len() > MAX_FRAME_LENGTH {
                anyhow::bail!("response exceeded {} bytes", MAX_FRAME_LENGTH);
            }
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    if self.buffer.is_empty() {
                        anyhow::bail!("server closed the connection");
                    }
                    return self.take_frame();
                }
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock
                        || err.kind() == ErrorKind::TimedOut =>
                {
                    return Err(Timeout.into());
                }
                Err(err) => return Err(err).context("reading response"),
            }
        }
    }

    fn take_frame(&mut self) -> anyhow::Result<String> {
        let mut frame = std::mem::take(&mut self.buffer);
        while frame.ends_with(b"\n") {
            frame.pop();
        }
        String::from_utf8(frame).context("response is not valid utf-8")
    }

    /// Check (with a short grace period) whether more response bytes are
    /// already in flight.
    fn more_pending(&mut self) -> anyhow::Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.stream.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let res = unsafe { libc::poll(&mut pfd, 1, 30) };
        if res < 0 {
            return Err(std::io::Error::last_os_error()).context("poll");
        }
        Ok(res > 0 && (pfd.revents & libc::POLLIN) != 0)
    }
}
