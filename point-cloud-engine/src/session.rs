//! Decode sessions and the worker boundary.
//!
//! A session owns one submitted byte source end to end: it hashes the
//! content, skips the decode entirely when the hash matches the
//! previous completed session, sniffs the format, and runs the right
//! decoder with a shared cancellation token. [`SessionHandle`] moves
//! all of that onto a dedicated thread and exposes the event stream
//! over a channel; [`PointCloudLoader`] is the single-slot front door
//! that fingerprints submissions and aborts superseded sessions.

use crate::config::DecodeConfig;
use crate::error::{DecodeError, Result};
use crate::events::{
    DecodeCtx, DecodeEvent, DecodeOutcome, DecodeSummary, EventSink, ProgressThrottle,
};
use crate::las_batch::decode_las_batches;
use crate::las_decoder::decode_las_stream;
use crate::las_header::read_las_header;
use crate::pcd_decoder::decode_pcd;
use crate::pcd_header::read_pcd_header;
use crate::sampling;
use crate::schedule::{CancelToken, Telemetry, TimeSliceScheduler};
use crate::source::{ByteSource, FileFingerprint, FileSource};
use constants::DEFAULT_BYTES_PER_POINT;
use crossbeam_channel::{Receiver, bounded};
use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::thread::{self, JoinHandle};

/// Bytes hashed per block, with a cancellation check between blocks.
const HASH_BLOCK_BYTES: usize = 1024 * 1024;

/// Channel capacity between the decode thread and its consumer.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle of one decode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Hashing,
    Decoding,
    Completed,
    /// The content hash matched the previous completed session.
    Skipped,
    /// Cancelled cooperatively; no terminal event is emitted.
    Aborted,
    Failed,
}

/// Container format, decided by content alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Las,
    Pcd,
}

/// Sniff the container format from content alone; file extensions are
/// never consulted. PCD keywords are searched over the same bounded
/// window the PCD header parser scans, so a long leading comment block
/// cannot hide a valid header from the sniff.
fn detect_format(source: &mut dyn ByteSource) -> Result<SourceFormat> {
    let window = source.read_range(
        0,
        source.len().min(constants::PCD_HEADER_WINDOW_BYTES as u64) as usize,
    )?;
    if window.len() >= 4 && &window[0..4] == constants::las::SIGNATURE {
        return Ok(SourceFormat::Las);
    }
    let text = String::from_utf8_lossy(&window);
    if text.contains(".PCD") || text.contains("FIELDS") || text.contains("DATA") {
        return Ok(SourceFormat::Pcd);
    }
    Err(DecodeError::InvalidFormat(
        "content is neither LAS nor PCD".to_string(),
    ))
}

/// SHA-256 of the full content as lowercase hex, read in bounded
/// blocks so an abort lands between blocks rather than after the file.
fn hash_source(source: &mut dyn ByteSource, cancel: &CancelToken) -> Result<String> {
    let mut hasher = Sha256::new();
    let len = source.len();
    let mut offset = 0u64;
    while offset < len {
        if cancel.is_cancelled() {
            return Err(DecodeError::Cancelled);
        }
        let take = (len - offset).min(HASH_BLOCK_BYTES as u64) as usize;
        hasher.update(source.read_range(offset, take)?);
        offset += take as u64;
    }
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(hex, "{byte:02x}");
    }
    Ok(hex)
}

/// Record size used for budgeting: the format's declared size when it
/// has one, then the caller's hint, then the engine default.
fn bytes_per_point(declared: u32, config: &DecodeConfig) -> u32 {
    if declared > 0 {
        declared
    } else {
        config
            .bytes_per_point_hint
            .unwrap_or(DEFAULT_BYTES_PER_POINT)
    }
}

fn decode_source(
    mut source: Box<dyn ByteSource + Send + Sync>,
    config: &DecodeConfig,
    cancel: &CancelToken,
    sink: &mut dyn EventSink,
) -> Result<DecodeOutcome> {
    let mut scheduler = TimeSliceScheduler::new();
    let mut throttle = ProgressThrottle::new();
    let mut ctx = DecodeCtx {
        sink,
        scheduler: &mut scheduler,
        cancel,
        throttle: &mut throttle,
    };

    match detect_format(source.as_mut())? {
        SourceFormat::Las => {
            let window = source.read_range(
                0,
                source.len().min(constants::las::HEADER_MIN_BYTES as u64) as usize,
            )?;
            let header = read_las_header(&window)?;
            let plan = sampling::plan(
                header.point_count,
                bytes_per_point(u32::from(header.record_length), config),
                config.max_budget_mb,
            );
            info!(
                "LAS {} format {} with {} points, keeping every {}",
                header.version(),
                header.point_format,
                header.point_count,
                plan.sample_every
            );
            // Compressed input always goes to the batch reader, which
            // owns LAZ decompression; the raw fixed-point path only
            // understands uncompressed records.
            if header.needs_custom_parse() && !header.is_compressed() {
                decode_las_stream(source.as_mut(), &header, &plan, config.chunk_points, &mut ctx)
            } else {
                decode_las_batches(source, &header, &plan, config.chunk_points, &mut ctx)
            }
        }
        SourceFormat::Pcd => {
            let window = source.read_range(
                0,
                source.len().min(constants::PCD_HEADER_WINDOW_BYTES as u64) as usize,
            )?;
            let header = read_pcd_header(&window)?;
            let plan = sampling::plan(
                header.point_count,
                bytes_per_point(header.point_stride() as u32, config),
                config.max_budget_mb,
            );
            info!(
                "PCD {:?} with {} points, keeping every {}",
                header.data, header.point_count, plan.sample_every
            );
            decode_pcd(source.as_mut(), &header, &plan, config.chunk_points, &mut ctx)
        }
    }
}

/// Run one session inline on the current thread, emitting its events
/// into `sink`. Returns the terminal state.
pub fn run_session(
    mut source: Box<dyn ByteSource + Send + Sync>,
    config: &DecodeConfig,
    previous_hash: Option<&str>,
    cancel: CancelToken,
    sink: &mut dyn EventSink,
) -> SessionState {
    let mut telemetry = Telemetry::new("session");
    telemetry.mark("hash");

    let hash = match hash_source(source.as_mut(), &cancel) {
        Ok(hash) => hash,
        Err(DecodeError::Cancelled) => return SessionState::Aborted,
        Err(err) => {
            sink.emit(DecodeEvent::Error(err.to_string()));
            return SessionState::Failed;
        }
    };
    sink.emit(DecodeEvent::Hash(hash.clone()));

    if previous_hash == Some(hash.as_str()) {
        debug!("content hash unchanged, skipping decode");
        sink.emit(DecodeEvent::Skip(hash));
        return SessionState::Skipped;
    }

    telemetry.mark("decode");
    let state = match decode_source(source, config, &cancel, sink) {
        Ok(outcome) => {
            sink.emit(DecodeEvent::Done(DecodeSummary {
                total_points: outcome.total_points,
                accepted_points: outcome.accepted_points,
                sample_every: outcome.sample_every,
                hash,
            }));
            SessionState::Completed
        }
        Err(DecodeError::Cancelled) => SessionState::Aborted,
        Err(err) => {
            warn!("decode failed: {err}");
            sink.emit(DecodeEvent::Error(err.to_string()));
            SessionState::Failed
        }
    };
    telemetry.mark("done");
    state
}

/// A session running on its own thread. Events arrive over a bounded
/// channel; dropping the handle aborts and joins the worker.
pub struct SessionHandle {
    cancel: CancelToken,
    events: Receiver<DecodeEvent>,
    worker: Option<JoinHandle<SessionState>>,
}

impl SessionHandle {
    /// Spawn a decode worker for `source`.
    pub fn spawn(
        source: Box<dyn ByteSource + Send + Sync>,
        config: DecodeConfig,
        previous_hash: Option<String>,
    ) -> Result<Self> {
        let (sender, events) = bounded(EVENT_CHANNEL_CAPACITY);
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let worker = thread::Builder::new()
            .name("pointcloud-decode".to_string())
            .spawn(move || {
                // A failed send means the consumer hung up; the
                // decode winds down quietly.
                let mut sink = move |event| {
                    let _ = sender.send(event);
                };
                run_session(
                    source,
                    &config,
                    previous_hash.as_deref(),
                    worker_cancel,
                    &mut sink,
                )
            })?;
        Ok(Self {
            cancel,
            events,
            worker: Some(worker),
        })
    }

    /// Stream of session events, ending when the worker finishes.
    pub fn events(&self) -> &Receiver<DecodeEvent> {
        &self.events
    }

    /// Request cooperative termination. Idempotent.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// Wait for the worker and return its terminal state.
    pub fn join(mut self) -> SessionState {
        match self.worker.take() {
            Some(worker) => worker.join().unwrap_or(SessionState::Failed),
            None => SessionState::Idle,
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Single-slot loader front door.
///
/// Holds at most one in-flight session; a new submission aborts the
/// previous one. Re-submission of an unchanged file is caught twice:
/// by metadata fingerprint before any I/O, and by content hash inside
/// the session.
pub struct PointCloudLoader {
    config: DecodeConfig,
    last_fingerprint: Option<FileFingerprint>,
    last_hash: Option<String>,
    active: Option<SessionHandle>,
}

impl PointCloudLoader {
    pub fn new(config: DecodeConfig) -> Self {
        Self {
            config,
            last_fingerprint: None,
            last_hash: None,
            active: None,
        }
    }

    /// Submit a file by path. Returns `None` when the fingerprint
    /// matches the last completed submission and nothing was started.
    pub fn submit_path(&mut self, path: &Path) -> Result<Option<&SessionHandle>> {
        let fingerprint = FileFingerprint::from_path(path)?;
        if self.last_hash.is_some() && self.last_fingerprint.as_ref() == Some(&fingerprint) {
            debug!("fingerprint unchanged, ignoring re-submission");
            return Ok(None);
        }
        let source = Box::new(FileSource::open(path)?);
        self.submit_source(source, Some(fingerprint)).map(Some)
    }

    /// Submit an already-open source, aborting any in-flight session.
    pub fn submit_source(
        &mut self,
        source: Box<dyn ByteSource + Send + Sync>,
        fingerprint: Option<FileFingerprint>,
    ) -> Result<&SessionHandle> {
        if let Some(active) = self.active.take() {
            active.abort();
            active.join();
        }
        let handle = SessionHandle::spawn(source, self.config.clone(), self.last_hash.clone())?;
        self.last_fingerprint = fingerprint;
        Ok(&*self.active.insert(handle))
    }

    /// Record the hash of a session the consumer observed completing,
    /// arming the skip paths for the next submission.
    pub fn record_completed(&mut self, hash: String) {
        self.last_hash = Some(hash);
    }

    pub fn active(&self) -> Option<&SessionHandle> {
        self.active.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[test]
    fn format_detection_is_content_based() {
        let mut las = MemorySource::new(b"LASFxxxx".to_vec());
        assert_eq!(detect_format(&mut las).unwrap(), SourceFormat::Las);

        let mut pcd = MemorySource::new(b"# .PCD v0.7\nFIELDS x y z\n".to_vec());
        assert_eq!(detect_format(&mut pcd).unwrap(), SourceFormat::Pcd);

        let mut junk = MemorySource::new(vec![0u8; 32]);
        assert!(matches!(
            detect_format(&mut junk),
            Err(DecodeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn long_comment_blocks_still_sniff_as_pcd() {
        // Several hundred bytes of keyword-free comments ahead of the
        // schema lines.
        let mut text = "# exported point set, calibration pass\n".repeat(12);
        text.push_str("FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nPOINTS 1\nDATA binary\n");
        let mut source = MemorySource::new(text.into_bytes());
        assert_eq!(detect_format(&mut source).unwrap(), SourceFormat::Pcd);
    }

    #[test]
    fn hashing_is_deterministic_and_cancellable() {
        let bytes: Vec<u8> = (0u8..=255).cycle().take(4096).collect();
        let token = CancelToken::new();
        let first = hash_source(&mut MemorySource::new(bytes.clone()), &token).unwrap();
        let second = hash_source(&mut MemorySource::new(bytes.clone()), &token).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);

        token.cancel();
        assert!(matches!(
            hash_source(&mut MemorySource::new(bytes), &token),
            Err(DecodeError::Cancelled)
        ));
    }

    #[test]
    fn matching_hash_skips_the_decode() {
        let bytes = b"LASF but never parsed".to_vec();
        let token = CancelToken::new();
        let hash = hash_source(&mut MemorySource::new(bytes.clone()), &token).unwrap();

        let mut events = Vec::new();
        let state = run_session(
            Box::new(MemorySource::new(bytes)),
            &DecodeConfig::default(),
            Some(hash.as_str()),
            token,
            &mut |event| events.push(event),
        );
        assert_eq!(state, SessionState::Skipped);
        assert!(matches!(&events[0], DecodeEvent::Hash(h) if *h == hash));
        assert!(matches!(&events[1], DecodeEvent::Skip(h) if *h == hash));
        assert_eq!(events.len(), 2);
    }
}
