//! Report output: log sinks and the remote JSON stream.
//!
//! Log sinks come from the `VIGIL_FILE` environment variable, a
//! path-separator-separated list of file names where `stdout` and
//! `stderr` are special tokens; every report block is written to every
//! sink. The remote stream comes from `VIGIL_SERVER` (a `tcp://` URL)
//! plus `VIGIL_UUID`; frames that would block are queued and re-flushed
//! from engine idle ticks, other write errors are logged and the frame
//! dropped.

use std::{
    collections::VecDeque,
    env,
    fs::File,
    io::{self, Write},
    net::TcpStream,
    sync::Arc,
};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, warn};
use url::Url;
use vigil_protocol::{StartupFrame, encode_frame};

use crate::{Error, Report, Result};

/// Environment variable naming the log sinks.
pub const FILE_ENV: &str = "VIGIL_FILE";
/// Environment variable naming the remote controller URL.
pub const SERVER_ENV: &str = "VIGIL_SERVER";
/// Environment variable carrying the session UUID.
pub const UUID_ENV: &str = "VIGIL_UUID";
/// Environment variable naming the topology-dump directory.
pub const DOT_DIR_ENV: &str = "VIGIL_DOT_DIR";

/// An in-memory writer for tests and embedders that capture output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The captured bytes as a string.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The connected remote stream plus its retry queue.
struct Remote {
    stream: TcpStream,
    pending: VecDeque<Vec<u8>>,
    offset: usize,
}

impl Remote {
    /// Drain as much of the queue as the socket accepts right now.
    fn pump(&mut self) {
        while let Some(front) = self.pending.front() {
            match self.stream.write(&front[self.offset..]) {
                Ok(written) => {
                    self.offset += written;
                    if self.offset >= front.len() {
                        let _ = self.pending.pop_front();
                        self.offset = 0;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    debug!("remote stream busy, retrying on next tick");
                    return;
                }
                Err(e) => {
                    error!("can't write to remote: {}", e);
                    let _ = self.pending.pop_front();
                    self.offset = 0;
                }
            }
        }
    }
}

/// Fan-out for report output.
pub struct Sink {
    outputs: Mutex<Vec<Box<dyn Write + Send>>>,
    dot_dir: Option<String>,
    remote: Mutex<Option<Remote>>,
}

impl Default for Sink {
    fn default() -> Self {
        Self {
            outputs: Mutex::new(vec![Box::new(io::stdout())]),
            dot_dir: None,
            remote: Mutex::new(None),
        }
    }
}

impl Sink {
    /// Build a sink from the environment (log list, remote URL, UUID,
    /// dot directory).
    pub fn from_env() -> Self {
        let mut sink = Self {
            outputs: Mutex::new(Self::outputs_from_env()),
            dot_dir: env::var(DOT_DIR_ENV).ok(),
            remote: Mutex::new(None),
        };

        match (env::var(SERVER_ENV), env::var(UUID_ENV)) {
            (Ok(server), Ok(uuid)) => {
                if let Err(e) = sink.connect_remote(&server, &uuid) {
                    error!("could not reach remote controller: {}", e);
                }
            }
            (Ok(_), Err(_)) => {
                debug!("no {} specified, remote reporting disabled", UUID_ENV);
            }
            _ => {}
        }
        sink
    }

    /// Build a sink writing only to the given output (tests, embedders).
    pub fn with_output(output: Box<dyn Write + Send>) -> Self {
        Self {
            outputs: Mutex::new(vec![output]),
            dot_dir: None,
            remote: Mutex::new(None),
        }
    }

    fn outputs_from_env() -> Vec<Box<dyn Write + Send>> {
        let spec = match env::var(FILE_ENV) {
            Ok(spec) if !spec.is_empty() => spec,
            _ => return vec![Box::new(io::stdout())],
        };
        let mut outputs: Vec<Box<dyn Write + Send>> = Vec::new();
        for name in spec.split(PATH_SEPARATOR).filter(|n| !n.is_empty()) {
            match name {
                "stdout" => outputs.push(Box::new(io::stdout())),
                "stderr" => outputs.push(Box::new(io::stderr())),
                path => match File::create(path) {
                    Ok(file) => outputs.push(Box::new(file)),
                    Err(e) => {
                        eprintln!("Could not open log file '{}' for writing: {}", path, e);
                        outputs.push(Box::new(io::stderr()));
                    }
                },
            }
        }
        outputs
    }

    /// Connect the remote stream and write the startup handshake.
    pub fn connect_remote(&mut self, server: &str, uuid: &str) -> Result<()> {
        let parsed = Url::parse(server).map_err(|e| Error::BadRemoteUrl {
            url: server.to_string(),
            message: e.to_string(),
        })?;
        if parsed.scheme() != "tcp" {
            return Err(Error::BadRemoteUrl {
                url: server.to_string(),
                message: format!("unsupported scheme `{}`", parsed.scheme()),
            });
        }
        let host = parsed.host_str().ok_or_else(|| Error::BadRemoteUrl {
            url: server.to_string(),
            message: "missing host".to_string(),
        })?;
        let port = parsed.port().ok_or_else(|| Error::BadRemoteUrl {
            url: server.to_string(),
            message: "missing port".to_string(),
        })?;

        let mut stream = TcpStream::connect((host, port)).map_err(|e| Error::BadRemoteUrl {
            url: server.to_string(),
            message: e.to_string(),
        })?;

        // The handshake is written blocking so a controller always sees
        // it first; subsequent frames go through the non-blocking queue.
        let startup = StartupFrame {
            uuid: uuid.to_string(),
            started: true,
        };
        if let Ok(frame) = encode_frame(&startup) {
            if let Err(e) = stream.write_all(&frame) {
                warn!("could not write startup frame: {}", e);
            }
        }
        if let Err(e) = stream.set_nonblocking(true) {
            warn!("could not switch remote stream to non-blocking: {}", e);
        }

        *self.remote.lock() = Some(Remote {
            stream,
            pending: VecDeque::new(),
            offset: 0,
        });
        Ok(())
    }

    /// The configured topology-dump directory.
    pub fn dot_dir(&self) -> Option<&str> {
        self.dot_dir.as_deref()
    }

    /// Write text to every log sink.
    pub fn write_text(&self, text: &str) {
        let mut outputs = self.outputs.lock();
        for output in outputs.iter_mut() {
            let _ = output.write_all(text.as_bytes());
            let _ = output.flush();
        }
    }

    /// Write a report's pretty block to every log sink.
    pub fn write_report(&self, report: &Report) {
        self.write_text(&report.render(self.dot_dir()));
    }

    /// Queue one frame on the remote stream (no-op without a remote).
    pub fn send_frame<T: Serialize>(&self, body: &T) {
        let mut guard = self.remote.lock();
        let Some(remote) = guard.as_mut() else {
            return;
        };
        match encode_frame(body) {
            Ok(frame) => {
                remote.pending.push_back(frame);
                remote.pump();
            }
            Err(e) => error!("could not serialize frame: {}", e),
        }
    }

    /// Retry frames a busy socket previously refused. Called from engine
    /// idle ticks.
    pub fn flush_remote(&self) {
        if let Some(remote) = self.remote.lock().as_mut() {
            remote.pump();
        }
    }
}

/// Platform search-path separator used by the log-file list.
#[cfg(unix)]
const PATH_SEPARATOR: char = ':';
#[cfg(not(unix))]
const PATH_SEPARATOR: char = ';';

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    use vigil_protocol::{ActionDoneFrame, decode_frames};

    #[test]
    fn shared_buffer_captures_text() {
        let buffer = SharedBuffer::new();
        let sink = Sink::with_output(Box::new(buffer.clone()));
        sink.write_text("hello\n");
        sink.write_text("world\n");
        assert_eq!(buffer.contents(), "hello\nworld\n");
    }

    #[test]
    fn remote_handshake_and_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut sink = Sink::with_output(Box::new(SharedBuffer::new()));
        sink.connect_remote(&format!("tcp://{}", addr), "uuid-1234")
            .unwrap();

        sink.send_frame(&ActionDoneFrame::new("seek", 0.5));

        let (mut conn, _) = listener.accept().unwrap();
        let mut bytes = Vec::new();
        use std::io::Read;
        conn.set_read_timeout(Some(std::time::Duration::from_secs(2)))
            .unwrap();
        let mut chunk = [0u8; 4096];
        while let Ok(n) = conn.read(&mut chunk) {
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            if let Ok(frames) = decode_frames(&bytes) {
                if frames.len() >= 2 {
                    break;
                }
            }
        }
        drop(sink);

        let frames = decode_frames(&bytes).unwrap();
        assert_eq!(frames[0]["uuid"], "uuid-1234");
        assert_eq!(frames[0]["started"], true);
        assert_eq!(frames[1]["type"], "action-done");
    }

    #[test]
    fn bad_remote_urls_are_rejected() {
        let mut sink = Sink::with_output(Box::new(SharedBuffer::new()));
        assert!(sink.connect_remote("http://localhost:1", "u").is_err());
        assert!(sink.connect_remote("tcp://localhost", "u").is_err());
        assert!(sink.connect_remote("not a url", "u").is_err());
    }
}
