//! CLI to daemon transport
//!
//! The daemon owns the single mode engine instance; CLI invocations reach it
//! through a Unix socket. Each connection carries one request and one
//! response, framed as a u32 little-endian length followed by JSON.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::daemon::CLIENT_READ_TIMEOUT_MS;
use crate::constants::paths::{APP_DIR, SOCKET_FILENAME};

mod messages;
pub use messages::{DaemonRequest, DaemonResponse, DisplaySummary, ModeSummary, PreferenceUpdate};

/// Largest frame either side accepts
const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// `$XDG_RUNTIME_DIR/res-switcher/daemon.sock`, or the cache dir without a runtime dir
pub fn default_socket_path() -> Result<PathBuf> {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME));
    }

    let cache = dirs::cache_dir()
        .context("Failed to determine cache directory (no XDG_RUNTIME_DIR or HOME)")?;
    Ok(cache.join(APP_DIR).join(SOCKET_FILENAME))
}

/// Connection to the daemon (used by the CLI)
pub struct DaemonClient {
    pub(crate) stream: UnixStream,
}

impl DaemonClient {
    /// Connect to the daemon socket
    pub fn connect() -> Result<Self> {
        let path = default_socket_path()?;
        Self::connect_to(&path)
    }

    pub fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .context(format!("No daemon listening at {}", path.display()))?;
        Ok(Self { stream })
    }

    pub fn send_request(&mut self, req: &DaemonRequest) -> Result<()> {
        write_message(&mut self.stream, req)
    }

    pub fn recv_response(&mut self) -> Result<DaemonResponse> {
        read_message(&mut self.stream)
    }

    /// One round trip; blocks until the daemon has executed the request
    pub fn request(&mut self, req: DaemonRequest) -> Result<DaemonResponse> {
        self.send_request(&req)?;
        self.recv_response()
    }
}

/// Listening socket owned by the daemon; the socket file is removed on drop
pub struct DaemonServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl DaemonServer {
    pub fn bind() -> Result<Self> {
        let socket_path = default_socket_path()?;
        Self::bind_to(socket_path)
    }

    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create socket directory: {}", parent.display()))?;
        }

        // Refuse to steal the socket from a live daemon
        if socket_path.exists() {
            if UnixStream::connect(&socket_path).is_ok() {
                return Err(anyhow!("Daemon already running at {}", socket_path.display()));
            }
            std::fs::remove_file(&socket_path)
                .context(format!("Failed to remove stale socket: {}", socket_path.display()))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .context(format!("Failed to bind socket at {}", socket_path.display()))?;

        // Owner only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))
                .context("Failed to set socket permissions")?;
        }

        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Independent handle for an accept loop on another thread
    pub fn acceptor(&self) -> Result<DaemonAcceptor> {
        let listener = self
            .listener
            .try_clone()
            .context("Failed to clone IPC listener")?;
        Ok(DaemonAcceptor {
            listener,
            read_timeout: Duration::from_millis(CLIENT_READ_TIMEOUT_MS),
        })
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for DaemonServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

pub struct DaemonAcceptor {
    listener: UnixListener,
    read_timeout: Duration,
}

impl DaemonAcceptor {
    #[cfg(test)]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Blocks for the next client. Reads on the returned stream time out so an
    /// idle client cannot hold the listener.
    pub fn accept(&self) -> Result<DaemonClient> {
        let (stream, _addr) = self
            .listener
            .accept()
            .context("Failed to accept IPC connection")?;
        stream
            .set_read_timeout(Some(self.read_timeout))
            .context("Failed to set IPC read timeout")?;
        Ok(DaemonClient { stream })
    }
}

pub(crate) fn write_message<T: Serialize>(stream: &mut UnixStream, msg: &T) -> Result<()> {
    let json = serde_json::to_vec(msg).context("Failed to encode IPC frame")?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {MAX_MESSAGE_SIZE})", json.len()));
    }

    let len = json.len() as u32;
    stream
        .write_all(&len.to_le_bytes())
        .and_then(|()| stream.write_all(&json))
        .and_then(|()| stream.flush())
        .context("Failed to write IPC frame")
}

pub(crate) fn read_message<T: for<'de> Deserialize<'de>>(stream: &mut UnixStream) -> Result<T> {
    let mut prefix = [0u8; 4];
    stream
        .read_exact(&mut prefix)
        .context("Failed to read IPC frame length")?;
    let len = u32::from_le_bytes(prefix) as usize;
    // Checked before allocating
    if len > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {len} bytes (max: {MAX_MESSAGE_SIZE})"));
    }

    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .context("Failed to read IPC frame payload")?;
    serde_json::from_slice(&payload).context("Failed to decode IPC frame")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framed_round_trip_over_socket_pair() {
        let (mut a, mut b) = UnixStream::pair().unwrap();
        let request = DaemonRequest::SetMode {
            spec: "1920x1080@60".to_string(),
            display: Some("HDMI-1".to_string()),
        };
        write_message(&mut a, &request).unwrap();
        let received: DaemonRequest = read_message(&mut b).unwrap();
        assert!(matches!(
            received,
            DaemonRequest::SetMode { ref spec, display: Some(ref d) } if spec == "1920x1080@60" && d == "HDMI-1"
        ));
    }

    #[test]
    fn test_oversized_length_prefix_rejected() {
        let (mut a, mut b) = UnixStream::pair().unwrap();
        a.write_all(&(u32::MAX).to_le_bytes()).unwrap();
        let result: Result<DaemonResponse> = read_message(&mut b);
        assert!(result.unwrap_err().to_string().contains("too large"));
    }

    #[test]
    fn test_client_server_over_temp_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        let server = DaemonServer::bind_to(path.clone()).unwrap();
        let acceptor = server.acceptor().unwrap();

        let handle = std::thread::spawn(move || {
            let mut conn = acceptor.accept().unwrap();
            let request: DaemonRequest = read_message(&mut conn.stream).unwrap();
            assert!(matches!(request, DaemonRequest::Ping));
            write_message(&mut conn.stream, &DaemonResponse::Pong).unwrap();
        });

        let mut client = DaemonClient::connect_to(&path).unwrap();
        assert!(matches!(client.request(DaemonRequest::Ping).unwrap(), DaemonResponse::Pong));
        handle.join().unwrap();

        drop(server);
        assert!(!path.exists());
    }

    #[test]
    fn test_bind_refuses_live_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        let _first = DaemonServer::bind_to(path.clone()).unwrap();
        assert!(DaemonServer::bind_to(path).is_err());
    }
}
