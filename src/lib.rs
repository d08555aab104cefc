// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A library for streaming, read-side access to FLAC-formatted
//! audio streams.
//!
//! A FLAC stream starts with a 32-bit `"fLaC"` signature, followed by
//! one or more metadata blocks, followed by one or more audio frames.
//! The first metadata block (STREAMINFO) describes the basic properties
//! of the stream and is the only mandatory block.
//!
//! Open a stream with one of the [`Stream`](stream::Stream)
//! constructors, then pull frames with
//! [`next_frame`](stream::Stream::next_frame):
//!
//! ```
//! use flac_stream::{Error, stream::Stream};
//! use std::io::Cursor;
//!
//! fn decoded_samples(flac: &[u8]) -> Result<u64, Error> {
//!     let mut stream = Stream::open_lazy(Cursor::new(flac))?;
//!     loop {
//!         match stream.next_frame() {
//!             Ok(_frame) => { /* use frame.samples */ }
//!             Err(Error::Eof) => return Ok(stream.samples_decoded()),
//!             Err(e) => return Err(e),
//!         }
//!     }
//! }
//! # assert!(decoded_samples(b"not a FLAC stream").is_err());
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bits;
mod crc;
pub mod frame;
pub mod metadata;
pub mod stream;

/// A unified FLAC format error
#[derive(Debug)]
pub enum Error {
    /// A general I/O error from the underlying stream
    Io(std::io::Error),
    /// A UTF-8 formatting error
    Utf8(std::string::FromUtf8Error),
    /// A graceful end of stream, reached at a frame or block boundary
    Eof,
    /// The underlying stream ended in the middle of a read
    UnexpectedEof,
    /// More than 64 bits requested from a single bit read
    ExcessiveBitCount,
    /// An aligned byte read requested while bits are still buffered
    NotByteAligned,
    /// A FLAC file missing its initial "fLaC" file tag
    MissingFlacTag,
    /// A FLAC file missing its initial STREAMINFO block
    MissingStreaminfo,
    /// A STREAMINFO block with out-of-range or inconsistent fields
    InvalidStreaminfo,
    /// A reserved metadata block encountered
    ReservedMetadataBlock,
    /// An invalid metadata block encountered
    InvalidMetadataBlock,
    /// A metadata block's contents are larger than the size
    /// indicated in the metadata block header.
    InvalidMetadataBlockSize,
    /// An APPLICATION metadata block which is not large enough
    /// to hold any contents beyond its ID.
    InsufficientApplicationBlock,
    /// A SEEKTABLE block whose size isn't evenly divisible
    /// by a whole number of seek points.
    InvalidSeekTableSize,
    /// A SEEKTABLE point whose offsets do not increment properly
    InvalidSeekTablePoint,
    /// Invalid frame sync code
    InvalidSyncCode,
    /// Invalid frame block size
    InvalidBlockSize,
    /// Invalid frame sample rate
    InvalidSampleRate,
    /// Invalid frame channel assignment
    InvalidChannels,
    /// Invalid frame bits-per-sample
    InvalidBitsPerSample,
    /// Invalid frame or sample number
    InvalidFrameNumber,
    /// Invalid subframe header
    InvalidSubframeHeader,
    /// An undefined subframe header type
    InvalidSubframeHeaderType,
    /// More wasted bits-per-sample than bits-per-sample
    ExcessiveWastedBits,
    /// An invalid residual coding method or partition order
    InvalidRicePartition,
    /// An invalid LPC coefficient precision or shift
    InvalidLpcParameter,
    /// A frame whose channel count differs from STREAMINFO's
    ChannelsMismatch,
    /// More samples decoded than STREAMINFO's declared total
    SampleCountOverflow,
    /// Frame header CRC-8 verification failed
    Crc8Mismatch,
    /// Frame footer CRC-16 verification failed
    Crc16Mismatch,
    /// A seek requested on a stream without seeking enabled
    NotSeekable,
    /// A seek requested with no seek points available
    NoSeekTable,
    /// A seek requested beyond the stream's declared total samples
    SeekOutOfRange,
}

impl Error {
    /// Converts a graceful `Eof` into `UnexpectedEof`
    ///
    /// Applied wherever the end of the source can only mean a
    /// truncated stream, such as in the middle of a frame or a
    /// metadata block body.
    pub(crate) fn into_unexpected(self) -> Self {
        match self {
            Self::Eof => Self::UnexpectedEof,
            e => e,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(error: std::string::FromUtf8Error) -> Self {
        Self::Utf8(error)
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Io(e) => e.fmt(f),
            Self::Utf8(e) => e.fmt(f),
            Self::Eof => "end of stream".fmt(f),
            Self::UnexpectedEof => "unexpected end of stream".fmt(f),
            Self::ExcessiveBitCount => "bit reads are limited to 64 bits".fmt(f),
            Self::NotByteAligned => "reader not aligned to a byte boundary".fmt(f),
            Self::MissingFlacTag => "missing FLAC tag".fmt(f),
            Self::MissingStreaminfo => "STREAMINFO block not first in file".fmt(f),
            Self::InvalidStreaminfo => "invalid STREAMINFO block".fmt(f),
            Self::ReservedMetadataBlock => "reserved metadata block".fmt(f),
            Self::InvalidMetadataBlock => "invalid metadata block".fmt(f),
            Self::InvalidMetadataBlockSize => "invalid metadata block size".fmt(f),
            Self::InsufficientApplicationBlock => "APPLICATION block too small for data".fmt(f),
            Self::InvalidSeekTableSize => "invalid SEEKTABLE block size".fmt(f),
            Self::InvalidSeekTablePoint => "invalid SEEKTABLE point".fmt(f),
            Self::InvalidSyncCode => "invalid frame sync code".fmt(f),
            Self::InvalidBlockSize => "invalid frame block size".fmt(f),
            Self::InvalidSampleRate => "invalid frame sample rate".fmt(f),
            Self::InvalidChannels => "invalid frame channel assignment".fmt(f),
            Self::InvalidBitsPerSample => "invalid frame bits-per-sample".fmt(f),
            Self::InvalidFrameNumber => "invalid frame number".fmt(f),
            Self::InvalidSubframeHeader => "invalid subframe header".fmt(f),
            Self::InvalidSubframeHeaderType => "invalid subframe header type".fmt(f),
            Self::ExcessiveWastedBits => "excessive wasted bits-per-sample".fmt(f),
            Self::InvalidRicePartition => "invalid residual partition".fmt(f),
            Self::InvalidLpcParameter => "invalid LPC parameter".fmt(f),
            Self::ChannelsMismatch => {
                "frame channel count differs from STREAMINFO channel count".fmt(f)
            }
            Self::SampleCountOverflow => {
                "decoded samples exceed STREAMINFO total sample count".fmt(f)
            }
            Self::Crc8Mismatch => "frame header CRC-8 mismatch".fmt(f),
            Self::Crc16Mismatch => "frame CRC-16 mismatch".fmt(f),
            Self::NotSeekable => "stream does not support seeking".fmt(f),
            Self::NoSeekTable => "no seek points available".fmt(f),
            Self::SeekOutOfRange => "seek beyond total sample count".fmt(f),
        }
    }
}
