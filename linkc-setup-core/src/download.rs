//! Mirror-fallback downloader
//!
//! Tries each [`MirrorCandidate`] of a [`MirrorList`] once, in order, and stops
//! at the first transfer that completes with a non-empty body. Data is
//! streamed into `<dest>.part` and renamed into place on success, so a failed
//! or cancelled attempt never leaves anything at the destination.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cancel::Cancellation;
use crate::error::SetupError;
use crate::mirrors::{MirrorCandidate, MirrorList};

const USER_AGENT: &str = concat!("linkc-setup/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Whole-request limit; installers are a few hundred MB at most
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const CHUNK_SIZE: usize = 64 * 1024;

/// Response body of a successful request
pub struct Body {
    /// Length announced by the server, if any
    pub length: Option<u64>,
    pub reader: Box<dyn Read>,
}

/// Fetches a URL. Anything other than a 200 response is an error.
pub trait Transport {
    fn get(&self, url: &str) -> Result<Body>;
}

/// Blocking HTTP(S) transport
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Body> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        log::debug!("GET {} -> {}", url, status);
        if status != reqwest::StatusCode::OK {
            anyhow::bail!("HTTP {} from {}", status, url);
        }

        Ok(Body {
            length: response.content_length(),
            reader: Box::new(response),
        })
    }
}

/// Progress notifications for the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    Started {
        source: String,
        url: String,
        total: Option<u64>,
    },
    Progress {
        downloaded: u64,
        total: Option<u64>,
    },
    Finished {
        bytes: u64,
    },
    Failed {
        error: String,
    },
}

/// What to do when the destination already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingFile {
    /// A non-empty existing file is used as-is and nothing is downloaded
    Reuse,
    /// The existing file is deleted before the first attempt
    Replace,
}

/// One try against one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based position in the mirror list
    pub position: usize,
    pub source: String,
    pub url: String,
    /// `None` for the successful attempt
    pub error: Option<String>,
}

/// Result of [`Downloader::fetch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The destination already held a non-empty file
    Reused { path: PathBuf, bytes: u64 },
    Downloaded {
        path: PathBuf,
        /// 1-based position of the candidate that succeeded
        position: usize,
        source: String,
        bytes: u64,
        attempts: Vec<Attempt>,
    },
    /// Every candidate failed; nothing is left at the destination
    Failed { attempts: Vec<Attempt> },
}

impl DownloadOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self, DownloadOutcome::Failed { .. })
    }

    pub fn attempts(&self) -> &[Attempt] {
        match self {
            DownloadOutcome::Reused { .. } => &[],
            DownloadOutcome::Downloaded { attempts, .. } | DownloadOutcome::Failed { attempts } => {
                attempts
            }
        }
    }
}

enum TransferError {
    /// The source is at fault; move on to the next candidate
    Remote(anyhow::Error),
    /// Local disk problem; every other candidate would fail the same way
    Local(anyhow::Error),
    Cancelled,
}

/// Mirror-fallback download procedure
pub struct Downloader<'a> {
    transport: &'a dyn Transport,
    cancel: &'a Cancellation,
    progress: Option<&'a dyn Fn(&DownloadEvent)>,
}

impl<'a> Downloader<'a> {
    pub fn new(transport: &'a dyn Transport, cancel: &'a Cancellation) -> Self {
        Self {
            transport,
            cancel,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn Fn(&DownloadEvent)) -> Self {
        self.progress = Some(progress);
        self
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(cb) = self.progress {
            cb(&event);
        }
    }

    /// Fetches the artifact into `dest`, trying each candidate exactly once
    ///
    /// `Err` is reserved for cancellation and local I/O failures; exhausting
    /// all mirrors is reported as [`DownloadOutcome::Failed`].
    pub fn fetch(
        &self,
        mirrors: &MirrorList,
        dest: &Path,
        existing: ExistingFile,
    ) -> Result<DownloadOutcome> {
        if let Some(outcome) = prepare_destination(dest, existing)? {
            return Ok(outcome);
        }

        let partial = partial_path(dest);
        let mut attempts = Vec::with_capacity(mirrors.len());

        for (position, candidate) in mirrors.iter() {
            self.cancel.check()?;
            let url = candidate.url();
            log::debug!("Trying mirror {} ({}): {}", position, candidate.name, url);

            match self.transfer(candidate, &url, &partial) {
                Ok(bytes) => {
                    fs::rename(&partial, dest).with_context(|| {
                        remove_partial(&partial);
                        format!(
                            "Failed to move {} to {}",
                            partial.display(),
                            dest.display()
                        )
                    })?;
                    self.emit(DownloadEvent::Finished { bytes });
                    attempts.push(Attempt {
                        position,
                        source: candidate.name.clone(),
                        url,
                        error: None,
                    });
                    return Ok(DownloadOutcome::Downloaded {
                        path: dest.to_path_buf(),
                        position,
                        source: candidate.name.clone(),
                        bytes,
                        attempts,
                    });
                }
                Err(TransferError::Remote(e)) => {
                    remove_partial(&partial);
                    let error = format!("{:#}", e);
                    log::warn!("Mirror {} ({}) failed: {}", position, candidate.name, error);
                    self.emit(DownloadEvent::Failed {
                        error: error.clone(),
                    });
                    attempts.push(Attempt {
                        position,
                        source: candidate.name.clone(),
                        url,
                        error: Some(error),
                    });
                }
                Err(TransferError::Local(e)) => {
                    remove_partial(&partial);
                    return Err(e);
                }
                Err(TransferError::Cancelled) => {
                    remove_partial(&partial);
                    return Err(SetupError::Cancelled.into());
                }
            }
        }

        Ok(DownloadOutcome::Failed { attempts })
    }

    fn transfer(
        &self,
        candidate: &MirrorCandidate,
        url: &str,
        partial: &Path,
    ) -> Result<u64, TransferError> {
        let Body { length, mut reader } = self.transport.get(url).map_err(TransferError::Remote)?;

        self.emit(DownloadEvent::Started {
            source: candidate.name.clone(),
            url: url.to_string(),
            total: length,
        });

        let mut file = File::create(partial)
            .with_context(|| format!("Failed to create {}", partial.display()))
            .map_err(TransferError::Local)?;

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut downloaded: u64 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(TransferError::Remote(
                        anyhow::Error::new(e).context("Transfer interrupted"),
                    ))
                }
            };
            file.write_all(&buffer[..read])
                .with_context(|| format!("Failed to write {}", partial.display()))
                .map_err(TransferError::Local)?;
            downloaded += read as u64;
            self.emit(DownloadEvent::Progress {
                downloaded,
                total: length,
            });
        }

        if downloaded == 0 {
            return Err(TransferError::Remote(anyhow::anyhow!(
                "Server returned an empty file"
            )));
        }
        if let Some(expected) = length {
            if downloaded != expected {
                return Err(TransferError::Remote(anyhow::anyhow!(
                    "Transfer truncated: got {} of {} bytes",
                    downloaded,
                    expected
                )));
            }
        }

        file.sync_all()
            .with_context(|| format!("Failed to sync {}", partial.display()))
            .map_err(TransferError::Local)?;
        Ok(downloaded)
    }
}

/// Applies the existing-file policy. Returns an outcome when no download is needed.
fn prepare_destination(dest: &Path, existing: ExistingFile) -> Result<Option<DownloadOutcome>> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let size = match fs::metadata(dest) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to inspect {}", dest.display()))
        }
    };

    if existing == ExistingFile::Reuse && size > 0 {
        log::debug!("Reusing existing file {}", dest.display());
        return Ok(Some(DownloadOutcome::Reused {
            path: dest.to_path_buf(),
            bytes: size,
        }));
    }

    fs::remove_file(dest)
        .with_context(|| format!("Failed to remove existing file: {}", dest.display()))?;
    Ok(None)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "download".into());
    name.push(".part");
    dest.with_file_name(name)
}

fn remove_partial(partial: &Path) {
    match fs::remove_file(partial) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove partial download {}: {}", partial.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::Cursor;
    use tempfile::TempDir;

    /// What the fake server does for a URL
    #[derive(Clone)]
    enum Reply {
        Ok(Vec<u8>),
        Refuse,
        /// Sends some bytes, then the connection drops
        DropAfter(Vec<u8>),
        /// Announces `announced` bytes but closes after the body
        Short { announced: u64, body: Vec<u8> },
    }

    struct FakeTransport {
        replies: HashMap<String, Reply>,
        requested: RefCell<Vec<String>>,
    }

    impl FakeTransport {
        fn new(replies: &[(&str, Reply)]) -> Self {
            Self {
                replies: replies
                    .iter()
                    .map(|(url, reply)| (url.to_string(), reply.clone()))
                    .collect(),
                requested: RefCell::new(Vec::new()),
            }
        }
    }

    struct DroppingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for DroppingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.data.read(buf)?;
            if n == 0 {
                Err(std::io::Error::new(ErrorKind::ConnectionReset, "connection reset"))
            } else {
                Ok(n)
            }
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str) -> Result<Body> {
            self.requested.borrow_mut().push(url.to_string());
            match self.replies.get(url) {
                Some(Reply::Ok(data)) => Ok(Body {
                    length: Some(data.len() as u64),
                    reader: Box::new(Cursor::new(data.clone())),
                }),
                Some(Reply::DropAfter(data)) => Ok(Body {
                    length: None,
                    reader: Box::new(DroppingReader {
                        data: Cursor::new(data.clone()),
                    }),
                }),
                Some(Reply::Short { announced, body }) => Ok(Body {
                    length: Some(*announced),
                    reader: Box::new(Cursor::new(body.clone())),
                }),
                Some(Reply::Refuse) | None => anyhow::bail!("HTTP 404 Not Found from {}", url),
            }
        }
    }

    /// Delivers one chunk, then raises the cancellation flag like Ctrl+C would
    struct InterruptingReader {
        cancel: Cancellation,
        chunk: Option<Vec<u8>>,
    }

    impl Read for InterruptingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.chunk.take() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    self.cancel.cancel();
                    Ok(n)
                }
                None => Ok(0),
            }
        }
    }

    struct InterruptingTransport {
        cancel: Cancellation,
    }

    impl Transport for InterruptingTransport {
        fn get(&self, _url: &str) -> Result<Body> {
            Ok(Body {
                length: Some(1024),
                reader: Box::new(InterruptingReader {
                    cancel: self.cancel.clone(),
                    chunk: Some(vec![1u8; 16]),
                }),
            })
        }
    }

    fn mirrors(names: &[&str]) -> MirrorList {
        MirrorList::new(
            names
                .iter()
                .map(|n| MirrorCandidate::new(*n, format!("https://{}.example", n), "artifact.bin"))
                .collect(),
        )
        .unwrap()
    }

    fn url(name: &str) -> String {
        format!("https://{}.example/artifact.bin", name)
    }

    #[test]
    fn test_third_mirror_succeeds_after_two_failures() -> Result<()> {
        let temp = TempDir::new()?;
        let dest = temp.path().join("artifact.bin");
        let transport = FakeTransport::new(&[
            (&url("bad1"), Reply::Refuse),
            (&url("bad2"), Reply::DropAfter(b"partial".to_vec())),
            (&url("good"), Reply::Ok(b"installer bytes".to_vec())),
        ]);
        let cancel = Cancellation::new();

        let outcome = Downloader::new(&transport, &cancel).fetch(
            &mirrors(&["bad1", "bad2", "good"]),
            &dest,
            ExistingFile::Replace,
        )?;

        match &outcome {
            DownloadOutcome::Downloaded {
                position,
                source,
                attempts,
                bytes,
                ..
            } => {
                assert_eq!(*position, 3);
                assert_eq!(source, "good");
                assert_eq!(attempts.len(), 3);
                assert!(attempts[0].error.is_some());
                assert!(attempts[1].error.is_some());
                assert!(attempts[2].error.is_none());
                assert_eq!(*bytes, 15);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(transport.requested.borrow().len(), 3);
        assert_eq!(fs::read(&dest)?, b"installer bytes");
        assert!(!partial_path(&dest).exists());
        Ok(())
    }

    #[test]
    fn test_stops_at_first_success() -> Result<()> {
        let temp = TempDir::new()?;
        let dest = temp.path().join("artifact.bin");
        let transport = FakeTransport::new(&[
            (&url("a"), Reply::Refuse),
            (&url("b"), Reply::Ok(b"data".to_vec())),
            (&url("c"), Reply::Ok(b"never fetched".to_vec())),
        ]);
        let cancel = Cancellation::new();

        let outcome = Downloader::new(&transport, &cancel).fetch(
            &mirrors(&["a", "b", "c"]),
            &dest,
            ExistingFile::Replace,
        )?;

        assert!(outcome.succeeded());
        assert_eq!(outcome.attempts().len(), 2);
        assert_eq!(*transport.requested.borrow(), vec![url("a"), url("b")]);
        Ok(())
    }

    #[test]
    fn test_all_failures_leave_no_file() -> Result<()> {
        let temp = TempDir::new()?;
        let dest = temp.path().join("artifact.bin");
        let transport = FakeTransport::new(&[
            (&url("a"), Reply::DropAfter(vec![1, 2, 3])),
            (&url("b"), Reply::Refuse),
        ]);
        let cancel = Cancellation::new();

        let outcome = Downloader::new(&transport, &cancel).fetch(
            &mirrors(&["a", "b"]),
            &dest,
            ExistingFile::Replace,
        )?;

        assert!(!outcome.succeeded());
        assert_eq!(outcome.attempts().len(), 2);
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
        Ok(())
    }

    #[test]
    fn test_zero_byte_body_is_a_failure() -> Result<()> {
        let temp = TempDir::new()?;
        let dest = temp.path().join("artifact.bin");
        let transport = FakeTransport::new(&[(&url("empty"), Reply::Ok(Vec::new()))]);
        let cancel = Cancellation::new();

        let outcome = Downloader::new(&transport, &cancel).fetch(
            &mirrors(&["empty"]),
            &dest,
            ExistingFile::Replace,
        )?;

        assert!(!outcome.succeeded());
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    fn test_reuse_existing_makes_no_request() -> Result<()> {
        let temp = TempDir::new()?;
        let dest = temp.path().join("artifact.bin");
        fs::write(&dest, b"already here")?;
        let transport = FakeTransport::new(&[]);
        let cancel = Cancellation::new();

        let outcome = Downloader::new(&transport, &cancel).fetch(
            &mirrors(&["a"]),
            &dest,
            ExistingFile::Reuse,
        )?;

        assert_eq!(
            outcome,
            DownloadOutcome::Reused {
                path: dest.clone(),
                bytes: 12
            }
        );
        assert!(transport.requested.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn test_empty_existing_file_is_replaced_even_when_reusing() -> Result<()> {
        let temp = TempDir::new()?;
        let dest = temp.path().join("artifact.bin");
        fs::write(&dest, b"")?;
        let transport = FakeTransport::new(&[(&url("a"), Reply::Ok(b"fresh".to_vec()))]);
        let cancel = Cancellation::new();

        let outcome = Downloader::new(&transport, &cancel).fetch(
            &mirrors(&["a"]),
            &dest,
            ExistingFile::Reuse,
        )?;

        assert!(matches!(outcome, DownloadOutcome::Downloaded { .. }));
        assert_eq!(fs::read(&dest)?, b"fresh");
        Ok(())
    }

    #[test]
    fn test_replace_deletes_existing_before_failed_attempts() -> Result<()> {
        let temp = TempDir::new()?;
        let dest = temp.path().join("artifact.bin");
        fs::write(&dest, b"stale")?;
        let transport = FakeTransport::new(&[]);
        let cancel = Cancellation::new();

        let outcome = Downloader::new(&transport, &cancel).fetch(
            &mirrors(&["a"]),
            &dest,
            ExistingFile::Replace,
        )?;

        assert!(!outcome.succeeded());
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    fn test_cancellation_aborts_without_trying_mirrors() -> Result<()> {
        let temp = TempDir::new()?;
        let dest = temp.path().join("artifact.bin");
        let transport = FakeTransport::new(&[(&url("a"), Reply::Ok(b"data".to_vec()))]);
        let cancel = Cancellation::new();
        cancel.cancel();

        let err = Downloader::new(&transport, &cancel)
            .fetch(&mirrors(&["a"]), &dest, ExistingFile::Replace)
            .unwrap_err();

        assert!(crate::error::is_cancelled(&err));
        assert!(transport.requested.borrow().is_empty());
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    fn test_body_shorter_than_announced_is_a_failure() -> Result<()> {
        let temp = TempDir::new()?;
        let dest = temp.path().join("artifact.bin");
        let transport = FakeTransport::new(&[
            (
                &url("short"),
                Reply::Short {
                    announced: 100,
                    body: vec![9u8; 40],
                },
            ),
            (&url("full"), Reply::Ok(vec![9u8; 100])),
        ]);
        let cancel = Cancellation::new();

        let outcome = Downloader::new(&transport, &cancel).fetch(
            &mirrors(&["short", "full"]),
            &dest,
            ExistingFile::Replace,
        )?;

        let attempts = outcome.attempts();
        assert_eq!(attempts.len(), 2);
        assert!(attempts[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("40 of 100")));
        assert_eq!(fs::read(&dest)?.len(), 100);
        Ok(())
    }

    #[test]
    fn test_cancellation_mid_transfer_removes_partial_file() -> Result<()> {
        let temp = TempDir::new()?;
        let dest = temp.path().join("artifact.bin");
        let cancel = Cancellation::new();
        let transport = InterruptingTransport {
            cancel: cancel.clone(),
        };

        let err = Downloader::new(&transport, &cancel)
            .fetch(&mirrors(&["a", "b"]), &dest, ExistingFile::Replace)
            .unwrap_err();

        assert!(crate::error::is_cancelled(&err));
        assert!(!partial_path(&dest).exists());
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    fn test_local_write_failure_skips_remaining_mirrors() -> Result<()> {
        let temp = TempDir::new()?;
        let dest = temp.path().join("artifact.bin");
        // A directory where the partial file should go cannot be created as a file
        fs::create_dir_all(partial_path(&dest))?;
        let transport = FakeTransport::new(&[
            (&url("a"), Reply::Ok(b"data".to_vec())),
            (&url("b"), Reply::Ok(b"data".to_vec())),
        ]);
        let cancel = Cancellation::new();

        let err = Downloader::new(&transport, &cancel)
            .fetch(&mirrors(&["a", "b"]), &dest, ExistingFile::Replace)
            .unwrap_err();

        assert!(!crate::error::is_cancelled(&err));
        assert_eq!(*transport.requested.borrow(), vec![url("a")]);
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    fn test_progress_events() -> Result<()> {
        let temp = TempDir::new()?;
        let dest = temp.path().join("artifact.bin");
        let transport = FakeTransport::new(&[
            (&url("a"), Reply::Refuse),
            (&url("b"), Reply::Ok(vec![7u8; 10])),
        ]);
        let cancel = Cancellation::new();
        let events = RefCell::new(Vec::new());
        let record = |e: &DownloadEvent| events.borrow_mut().push(e.clone());

        Downloader::new(&transport, &cancel)
            .with_progress(&record)
            .fetch(&mirrors(&["a", "b"]), &dest, ExistingFile::Replace)?;

        let events = events.into_inner();
        assert!(matches!(events[0], DownloadEvent::Failed { .. }));
        assert_eq!(
            events[1],
            DownloadEvent::Started {
                source: "b".to_string(),
                url: url("b"),
                total: Some(10)
            }
        );
        assert_eq!(events.last(), Some(&DownloadEvent::Finished { bytes: 10 }));
        Ok(())
    }

    #[test]
    fn test_http_transport_against_loopback_server() -> Result<()> {
        use std::io::BufRead;
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let server = std::thread::spawn(move || {
            // Two connections: one 404, one 200
            for status in ["404 Not Found", "200 OK"] {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = std::io::BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                loop {
                    line.clear();
                    reader.read_line(&mut line).unwrap();
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                }
                let body = if status.starts_with("200") { "payload" } else { "" };
                write!(
                    stream,
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                )
                .unwrap();
            }
        });

        let temp = TempDir::new()?;
        let dest = temp.path().join("payload.txt");
        let list = MirrorList::new(vec![
            MirrorCandidate::new("missing", format!("http://{}/missing", addr), "payload.txt"),
            MirrorCandidate::new("local", format!("http://{}/ok", addr), "payload.txt"),
        ])?;
        let transport = HttpTransport::new()?;
        let cancel = Cancellation::new();

        let outcome = Downloader::new(&transport, &cancel).fetch(&list, &dest, ExistingFile::Replace)?;
        server.join().unwrap();

        match outcome {
            DownloadOutcome::Downloaded { position, .. } => assert_eq!(position, 2),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(fs::read_to_string(&dest)?, "payload");
        Ok(())
    }
}
