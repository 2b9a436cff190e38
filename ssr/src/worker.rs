use std::{
    fmt, io,
    net::{Ipv4Addr, SocketAddr},
    path::Path,
    process::Stdio,
    time::Duration,
};

use tokio::{
    net::TcpStream,
    process::{Child, Command},
    time,
};
use uuid::Uuid;

use crate::config::JsWorkerLog;

const MAX_CONNECT_ATTEMPTS: u64 = 5;

#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
pub(crate) struct Port(u16);

impl Port {
    pub fn new(port: u16) -> Self {
        Self(port)
    }

    pub fn to_socket_addr(self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.0))
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Process;

impl Process {
    #[cfg(unix)]
    pub const SHELL: &'static str = "/bin/sh";

    #[cfg(windows)]
    pub const SHELL: &'static str = "cmd";

    #[cfg(unix)]
    pub fn cmd(cmd: &str) -> [&str; 2] {
        ["-c", cmd]
    }

    #[cfg(windows)]
    pub fn cmd(cmd: &str) -> [&str; 2] {
        ["/c", cmd]
    }

    pub fn spawn(
        port: Port,
        js_worker: &Path,
        js_worker_log: JsWorkerLog,
        global_js_renderer: Option<&Path>,
    ) -> Result<Child, io::Error> {
        let mut cmd = Command::new(Process::SHELL);

        cmd.args(Process::cmd(&format!("node {}", js_worker.display())));
        cmd.env("PORT", port.to_string());
        cmd.env("LOG", js_worker_log.to_str());

        if let Some(global_renderer) = global_js_renderer {
            cmd.env("GLOBAL_RENDERER", global_renderer.display().to_string());
        }

        cmd.stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
    }
}

/// Render worker the node renderer talks to.
///
/// A worker is either a node process spawned (and owned) by this crate or an
/// address of a worker managed elsewhere.
pub(crate) struct Worker {
    addr: SocketAddr,
    process: Option<Child>,
}

impl Worker {
    pub fn spawn(
        port: Port,
        js_worker: &Path,
        js_worker_log: JsWorkerLog,
        global_js_renderer: Option<&Path>,
    ) -> Result<Self, io::Error> {
        let process = Process::spawn(port, js_worker, js_worker_log, global_js_renderer)?;

        Ok(Self {
            addr: port.to_socket_addr(),
            process: Some(process),
        })
    }

    pub fn attach(addr: SocketAddr) -> Self {
        Self {
            addr,
            process: None,
        }
    }

    fn pid(&self) -> String {
        match self.process.as_ref().and_then(Child::id) {
            Some(id) => id.to_string(),
            None => "external".to_owned(),
        }
    }

    pub fn display(&self) -> String {
        format!("[RS] Worker [id: {} port: {}]", self.pid(), self.addr.port())
    }

    pub fn display_with_request_id(&self, request_id: &Uuid) -> String {
        format!(
            "[RS] Worker [id: {} port: {} request: {}]",
            self.pid(),
            self.addr.port(),
            request_id
        )
    }

    /// Connects to the worker, retrying while it is still starting up.
    pub async fn connect(&self) -> Result<TcpStream, io::Error> {
        let mut attempt = 1;
        loop {
            match attempt {
                1 => trace!("{worker}: Connecting to the js worker", worker = self),
                _ => {
                    let delay = attempt * 3;
                    trace!(
                        "{worker}: Trying to reconnect to the js worker. Attempt: {attempt}. Delay: {delay}ms",
                        worker = self,
                        attempt = attempt,
                        delay = delay
                    );
                    time::sleep(Duration::from_millis(delay)).await
                }
            }
            match TcpStream::connect(self.addr).await {
                Ok(stream) => {
                    trace!("{worker}: Connected to the js worker", worker = self);
                    return Ok(stream);
                }
                Err(err) if err.kind() == io::ErrorKind::ConnectionRefused => {
                    if attempt == MAX_CONNECT_ATTEMPTS {
                        trace!(
                            "{worker}: Failed to connect to the js worker. Exiting.",
                            worker = self
                        );
                        return Err(err);
                    }
                    trace!(
                        "{worker}: Failed to connect to the js worker. Retrying.",
                        worker = self
                    );
                    attempt += 1;
                }
                Err(err) => {
                    trace!(
                        "{worker}: Failed to connect to the js worker due to unexpected error: {err}",
                        worker = self,
                        err = err
                    );
                    return Err(err);
                }
            };
        }
    }
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_binds_to_loopback() {
        let addr = Port::new(9000).to_socket_addr();
        assert_eq!(addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn attached_worker_has_no_process_id() {
        let worker = Worker::attach("127.0.0.1:9100".parse().unwrap());
        assert_eq!(worker.to_string(), "[RS] Worker [id: external port: 9100]");
    }

    #[tokio::test]
    async fn gives_up_when_nothing_listens() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let worker = Worker::attach(addr);
        let err = worker.connect().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }
}
