//! Unix-domain socket listener.
//!
//! On start: unlink any stale socket path, bind, restrict permissions to
//! the owner, listen.  Each accepted client is checked against the
//! process uid (fail closed) and then served by a dedicated handler
//! thread.  The path is unlinked again on shutdown.

use crate::Server;
use anyhow::Context as _;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Listener {
    listener: UnixListener,
    path: PathBuf,
}

impl Listener {
    pub fn bind(path: &Path) -> anyhow::Result<Self> {
        let listener = safely_create_sock_path(path)?;
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn local_path(&self) -> &Path {
        &self.path
    }

    /// Run the accept loop on the calling thread.
    pub fn run(&mut self, server: Arc<Server>) {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(err) = check_peer(&stream) {
                        log::error!("refusing client: {:#}", err);
                        continue;
                    }
                    let server = Arc::clone(&server);
                    std::thread::Builder::new()
                        .name("client".to_string())
                        .spawn(move || {
                            if let Err(err) = crate::dispatch::process(stream, &server) {
                                log::error!("client handler: {:#}", err);
                            }
                        })
                        .ok();
                }
                Err(err) => {
                    log::error!("accept failed: {}", err);
                    return;
                }
            }
        }
    }

    /// Spawn the accept loop on its own thread.
    pub fn spawn(mut self, server: Arc<Server>) -> std::thread::JoinHandle<()> {
        std::thread::Builder::new()
            .name("accept".to_string())
            .spawn(move || self.run(server))
            .expect("failed to spawn accept thread")
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        std::fs::remove_file(&self.path).ok();
    }
}

/// Unlink any pre-existing path, bind, and clamp permissions so that only
/// the owning user can connect.
fn safely_create_sock_path(sock_path: &Path) -> anyhow::Result<UnixListener> {
    log::trace!("setting up {}", sock_path.display());

    if let Some(sock_dir) = sock_path.parent() {
        if !sock_dir.as_os_str().is_empty() {
            std::fs::create_dir_all(sock_dir)
                .with_context(|| format!("creating {}", sock_dir.display()))?;
        }
    }

    match std::fs::remove_file(sock_path) {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).context(format!("unable to remove {}", sock_path.display()));
        }
    }

    let listener = UnixListener::bind(sock_path)
        .with_context(|| format!("failed to bind to {}", sock_path.display()))?;

    let mut permissions = std::fs::metadata(sock_path)
        .with_context(|| format!("stat {}", sock_path.display()))?
        .permissions();
    permissions.set_mode(0o600);
    std::fs::set_permissions(sock_path, permissions)
        .with_context(|| format!("chmod 0600 {}", sock_path.display()))?;

    Ok(listener)
}

/// Verify that the connecting peer is the same user as this process.
fn check_peer(stream: &UnixStream) -> anyhow::Result<()> {
    let peer = peer_uid(stream.as_raw_fd())?;
    let us = unsafe { libc::geteuid() };
    if peer != us {
        anyhow::bail!("peer uid {} does not match process uid {}", peer, us);
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn peer_uid(fd: std::os::unix::io::RawFd) -> anyhow::Result<libc::uid_t> {
    let mut cred: libc::ucred = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;
    let res = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_PEERCRED,
            &mut cred as *mut _ as *mut _,
            &mut len,
        )
    };
    if res != 0 {
        return Err(std::io::Error::last_os_error()).context("SO_PEERCRED");
    }
    Ok(cred.uid)
}

#[cfg(not(target_os = "linux"))]
fn peer_uid(fd: std::os::unix::io::RawFd) -> anyhow::Result<libc::uid_t> {
    let mut uid: libc::uid_t = 0;
    let mut gid: libc::gid_t = 0;
    let res = unsafe { libc::getpeereid(fd, &mut uid, &mut gid) };
    if res != 0 {
        return Err(std::io::Error::last_os_error()).context("getpeereid");
    }
    Ok(uid)
}
