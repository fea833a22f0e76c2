//! Per-client request loop: newline-delimited frames in, one response
//! frame (terminated by exactly one `\n`) out, in order.  Requests are
//! marshalled onto the main scheduler; the handler thread blocks until
//! the reply is available, so a client's requests are never reordered.

use crate::Server;
use anyhow::Context as _;
use codec::MAX_FRAME_LENGTH;
use std::io::{BufRead, BufReader, Read as _, Write as _};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::Duration;

/// A client producing no complete line within this window is closed.
const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(30);
const CLIENT_WRITE_TIMEOUT: Duration = Duration::from_secs(15);

pub fn process(stream: UnixStream, server: &Server) -> anyhow::Result<()> {
    stream
        .set_read_timeout(Some(CLIENT_READ_TIMEOUT))
        .context("set_read_timeout")?;
    stream
        .set_write_timeout(Some(CLIENT_WRITE_TIMEOUT))
        .context("set_write_timeout")?;

    let mut reader = BufReader::new(stream.try_clone().context("cloning client stream")?);
    let mut writer = stream;
    let mut line = String::new();

    loop {
        line.clear();
        let n = match reader
            .by_ref()
            .take(MAX_FRAME_LENGTH as u64)
            .read_line(&mut line)
        {
            Ok(n) => n,
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                log::debug!("closing idle client");
                return Ok(());
            }
            Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
                // non-utf8 frame
                write_frame(&mut writer, "ERROR: parse_error: request is not valid utf-8")?;
                continue;
            }
            Err(err) => return Err(err).context("reading request line"),
        };
        if n == 0 {
            // client disconnected: no need to make a noise
            return Ok(());
        }
        if !line.ends_with('\n') && n >= MAX_FRAME_LENGTH {
            write_frame(&mut writer, "ERROR: parse_error: request line too long")?;
            return Ok(());
        }

        let response = run_request(server, line.trim_end_matches(['\n', '\r']))?;
        write_frame(&mut writer, &response)?;
    }
}

/// browser.wait polls a deadline; it runs on this handler thread (reads
/// only) so it cannot stall every other client behind the scheduler.
fn run_request(server: &Server, line: &str) -> anyhow::Result<String> {
    let handler = Arc::clone(&server.handler);
    if crate::sessionhandler::SessionHandler::is_wait_request(line) {
        return Ok(handler.process_request(line));
    }
    let line = line.to_string();
    server
        .scheduler
        .call(move || handler.process_request(&line))
}

fn write_frame(writer: &mut UnixStream, response: &str) -> anyhow::Result<()> {
    let mut frame = response.trim_end_matches('\n').to_string();
    frame.push('\n');
    writer
        .write_all(frame.as_bytes())
        .context("writing response")?;
    writer.flush().context("flushing response")?;
    Ok(())
}
