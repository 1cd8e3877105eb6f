//! Sink contract and implementations.
//!
//! A sink is any append-only byte destination. The flush pipeline owns its
//! sink exclusively; producers never touch it.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::AsyncWriteExt;

/// Trait for append-only byte destinations.
///
/// Uses native async fn in traits. The engine makes one `write` call per
/// drained region; a short write is reported as an error rather than retried.
///
/// # Note on Object Safety
///
/// The `impl Future` return types are not object-safe. For dynamic dispatch
/// use `Box<dyn SinkBoxed>`; the blanket impl below covers every `Sink`.
pub trait Sink: Send {
    /// Appends `buf` in full, or fails.
    fn write(&mut self, buf: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Forces buffered data to durable storage.
    fn sync(&mut self) -> impl Future<Output = io::Result<()>> + Send;

    /// Releases the destination. Later writes fail.
    fn close(&mut self) -> impl Future<Output = io::Result<()>> + Send;

    /// Returns the sink name for diagnostics.
    fn name(&self) -> &str;
}

/// Object-safe version of [`Sink`] for dynamic dispatch.
pub trait SinkBoxed: Send {
    fn write_boxed<'a>(
        &'a mut self,
        buf: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>;

    fn sync_boxed(&mut self) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>>;

    fn close_boxed(&mut self) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>>;

    fn name(&self) -> &str;
}

/// Blanket implementation: any Sink can be used as SinkBoxed.
impl<T: Sink> SinkBoxed for T {
    fn write_boxed<'a>(
        &'a mut self,
        buf: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>> {
        Box::pin(self.write(buf))
    }

    fn sync_boxed(&mut self) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        Box::pin(self.sync())
    }

    fn close_boxed(&mut self) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        Box::pin(self.close())
    }

    fn name(&self) -> &str {
        Sink::name(self)
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "sink is closed")
}

/// Append-mode file sink.
pub struct FileSink {
    file: Option<tokio::fs::File>,
    path: PathBuf,
}

impl FileSink {
    /// Opens (or creates) the file at `path` for appending, creating parent
    /// directories as needed.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await?;
        Ok(Self {
            file: Some(file),
            path,
        })
    }

    /// The path this sink appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        let file = self.file.as_mut().ok_or_else(closed_error)?;
        let n = file.write(buf).await?;
        if n < buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {n} of {} bytes", buf.len()),
            ));
        }
        Ok(())
    }

    async fn sync(&mut self) -> io::Result<()> {
        let file = self.file.as_mut().ok_or_else(closed_error)?;
        file.flush().await?;
        file.sync_all().await
    }

    async fn close(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.shutdown().await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    data: Vec<u8>,
    syncs: u64,
    closes: u64,
}

/// In-memory sink for tests and demos; inspected through its handle.
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
    closed: bool,
}

/// Cloneable inspection handle for a [`MemorySink`].
#[derive(Clone)]
pub struct MemorySinkHandle {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    /// Creates a sink and its inspection handle.
    pub fn new() -> (Self, MemorySinkHandle) {
        let state = Arc::new(Mutex::new(MemoryState::default()));
        (
            Self {
                state: Arc::clone(&state),
                closed: false,
            },
            MemorySinkHandle { state },
        )
    }
}

impl MemorySinkHandle {
    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.state().data.clone()
    }

    /// The written bytes split into newline-terminated records.
    pub fn lines(&self) -> Vec<String> {
        self.contents()
            .split(|&b| b == b'\n')
            .filter(|l| !l.is_empty())
            .map(|l| String::from_utf8_lossy(l).into_owned())
            .collect()
    }

    /// Total bytes written.
    pub fn byte_len(&self) -> usize {
        self.state().data.len()
    }

    /// Number of `sync` calls observed.
    pub fn sync_count(&self) -> u64 {
        self.state().syncs
    }

    /// Number of `close` calls observed.
    pub fn close_count(&self) -> u64 {
        self.state().closes
    }
}

impl Sink for MemorySink {
    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(closed_error());
        }
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .data
            .extend_from_slice(buf);
        Ok(())
    }

    async fn sync(&mut self) -> io::Result<()> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .syncs += 1;
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closes += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Sink that discards everything (for benchmarking).
#[derive(Debug, Default)]
pub struct NullSink;

impl NullSink {
    pub fn new() -> Self {
        Self
    }
}

impl Sink for NullSink {
    async fn write(&mut self, _buf: &[u8]) -> io::Result<()> {
        Ok(())
    }

    async fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}
