//! # rce-core
//!
//! Shared vocabulary for the RoboEarth Cloud Engine client.
//!
//! - **Codec**: [`Envelope`], [`Payload`], [`Attachment`] and the
//!   [`FrameAssembler`] that joins JSON frames with their out-of-band binaries
//! - **IDs**: [`CorrelationId`] for matching service calls to responses
//! - **Constants**: protocol version and control-operation names
//! - **Logging**: `tracing` subscriber setup and log capture for tests

#![deny(unsafe_code)]

pub mod codec;
pub mod constants;
pub mod errors;
pub mod ids;
pub mod logging;

pub use codec::{Attachment, Envelope, FrameAssembler, Payload, WireFrame};
pub use errors::CodecError;
pub use ids::CorrelationId;
