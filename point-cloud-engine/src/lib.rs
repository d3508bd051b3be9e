//! Bounded-memory streaming decode engine for LAS and PCD point
//! clouds.
//!
//! A submitted file is hashed, budget-sampled to a fixed point count,
//! and decoded in bounded windows on a worker thread; positions and
//! colours stream out as ownership-transferring chunks so the full
//! cloud is never resident at once. LAS 1.2-1.3 goes through the batch
//! reader collaborator, LAS 1.4 through the custom fixed-point path,
//! and PCD binary/binary_compressed through the layout-resolving
//! decoder.

pub mod assembler;
pub mod colour;
pub mod config;
pub mod error;
pub mod events;
pub mod las_batch;
pub mod las_decoder;
pub mod las_header;
pub mod lzf;
pub mod pcd_decoder;
pub mod pcd_header;
pub mod pcd_layout;
pub mod pcd_value;
pub mod sampling;
pub mod schedule;
pub mod session;
pub mod source;

pub use assembler::ChunkAssembler;
pub use config::DecodeConfig;
pub use error::{DecodeError, Result};
pub use events::{DecodeEvent, DecodeProgress, DecodeSummary, PointChunk};
pub use sampling::SamplingPlan;
pub use schedule::CancelToken;
pub use session::{PointCloudLoader, SessionHandle, SessionState, run_session};
pub use source::{ByteSource, FileFingerprint, FileSource, MemorySource};
