//! IPC listener thread for the daemon
//!
//! The listener never touches the mode engine. Each request is forwarded to the
//! main thread together with a reply channel and executed there.

use anyhow::{Context, Result};
use std::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::ipc::{DaemonAcceptor, DaemonClient, DaemonRequest, DaemonResponse};

/// One request waiting for the main thread
pub struct IpcJob {
    pub request: DaemonRequest,
    pub reply: mpsc::Sender<DaemonResponse>,
}

/// Spawn IPC listener thread to handle CLI requests
pub fn spawn_ipc_listener(
    acceptor: DaemonAcceptor,
    job_tx: mpsc::Sender<IpcJob>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        if let Err(e) = run_ipc_loop(&acceptor, &job_tx) {
            error!(error = ?e, "IPC listener thread crashed");
        }
    })
}

fn run_ipc_loop(acceptor: &DaemonAcceptor, job_tx: &mpsc::Sender<IpcJob>) -> Result<()> {
    info!("IPC listener started");

    loop {
        let mut client = acceptor
            .accept()
            .context("Failed to accept IPC connection")?;
        debug!("Client connected");

        if !serve_client(&mut client, job_tx) {
            info!("Main loop gone, stopping IPC listener");
            return Ok(());
        }
    }
}

/// Serve the client's single request, then let the connection close.
/// False once the main loop is gone.
fn serve_client(client: &mut DaemonClient, job_tx: &mpsc::Sender<IpcJob>) -> bool {
    let request: DaemonRequest = match crate::ipc::read_message(&mut client.stream) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = ?e, "No request from client, dropping connection");
            return true;
        }
    };
    debug!(request = ?request, "Received IPC request");

    let (reply_tx, reply_rx) = mpsc::channel();
    if job_tx
        .send(IpcJob {
            request,
            reply: reply_tx,
        })
        .is_err()
    {
        return false;
    }

    let Ok(response) = reply_rx.recv() else {
        return false;
    };
    if let Err(e) = crate::ipc::write_message(&mut client.stream, &response) {
        warn!(error = ?e, "Failed to send IPC response");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::DaemonServer;
    use std::os::unix::net::UnixStream;
    use std::time::Duration;

    #[test]
    fn test_idle_client_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        let server = DaemonServer::bind_to(path.clone()).unwrap();
        let acceptor = server
            .acceptor()
            .unwrap()
            .with_read_timeout(Duration::from_millis(100));
        let (job_tx, job_rx) = mpsc::channel::<IpcJob>();
        let _listener = spawn_ipc_listener(acceptor, job_tx);

        // Connects first and never sends anything
        let _idle = UnixStream::connect(&path).unwrap();

        let active = std::thread::spawn(move || {
            let mut client = DaemonClient::connect_to(&path).unwrap();
            client.request(DaemonRequest::Ping).unwrap()
        });

        let job = job_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(job.request, DaemonRequest::Ping));
        job.reply.send(DaemonResponse::Pong).unwrap();
        assert!(matches!(active.join().unwrap(), DaemonResponse::Pong));
    }

    #[test]
    fn test_connection_closed_after_one_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        let server = DaemonServer::bind_to(path.clone()).unwrap();
        let (job_tx, job_rx) = mpsc::channel::<IpcJob>();
        let _listener = spawn_ipc_listener(server.acceptor().unwrap(), job_tx);

        let responder = std::thread::spawn(move || {
            let job = job_rx.recv().unwrap();
            job.reply.send(DaemonResponse::Pong).unwrap();
            job_rx
        });

        let mut client = DaemonClient::connect_to(&path).unwrap();
        assert!(matches!(client.request(DaemonRequest::Ping).unwrap(), DaemonResponse::Pong));
        let _job_rx = responder.join().unwrap();
        // The daemon has hung up, so a second read sees end of stream
        assert!(client.recv_response().is_err());
    }
}
