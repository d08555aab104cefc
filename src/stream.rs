// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For reading the frames of a FLAC stream
//!
//! [`Stream`] sequences the whole pipeline: it verifies the stream
//! signature (tolerating a prepended ID3v2 tag), parses the STREAMINFO
//! block, walks the remaining metadata chain, and then hands out audio
//! frames one at a time, cross-checking each against STREAMINFO.

use crate::Error;
use crate::bits::BitReader;
use crate::frame::{Frame, FrameHeader};
use crate::metadata::{Block, BlockHeader, BlockType, Reserved, SeekPoint, SeekTable, Streaminfo};
use std::io::{Read, Seek, SeekFrom};

const FLAC_TAG: &[u8; 4] = b"fLaC";

const ID3_TAG: &[u8; 3] = b"ID3";

// Number of seek points past which a seek table is synthesized for
// seekable streams that carry none.  Synthesis emits one point per
// frame regardless; a value of 0 disables it.
const DEFAULT_SEEK_TABLE_SIZE: usize = 100;

/// A FLAC stream, delivering frames from an underlying byte source
///
/// The three constructors differ in how much metadata they retain and
/// whether seeking is enabled:
///
/// * [`open_lazy`](Stream::open_lazy) skips every metadata block past
///   STREAMINFO
/// * [`open_full`](Stream::open_full) retains every metadata block
/// * [`open_seekable`](Stream::open_seekable) requires a seekable
///   source and enables [`seek`](Stream::seek)
pub struct Stream<R> {
    info: Streaminfo,
    blocks: Vec<Block>,
    seek_table: Option<SeekTable>,
    seek_table_size: usize,
    // offset of the first frame header; seek point offsets are
    // relative to this position
    data_start: Option<u64>,
    // running total of inter-channel samples decoded so far
    samples_decoded: u64,
    br: BitReader<R>,
}

impl<R: Read> Stream<R> {
    /// Opens a FLAC stream, skipping all metadata past STREAMINFO
    ///
    /// # Errors
    ///
    /// Returns an error if the signature is missing (after skipping any
    /// prepended ID3v2 tag), the first metadata block is not a valid
    /// STREAMINFO, or the source fails or ends inside the metadata.
    pub fn open_lazy(r: R) -> Result<Self, Error> {
        let mut br = BitReader::new(r);
        let (info, mut last) = parse_stream_start(&mut br)?;

        while !last {
            let header = BlockHeader::parse(&mut br).map_err(Error::into_unexpected)?;
            br.skip_bytes(u64::from(header.length))?;
            last = header.last;
        }

        Ok(Self {
            info,
            blocks: Vec::new(),
            seek_table: None,
            seek_table_size: 0,
            data_start: None,
            samples_decoded: 0,
            br,
        })
    }

    /// Opens a FLAC stream, parsing and retaining every metadata block
    ///
    /// Reserved metadata blocks are skipped and retained as opaque
    /// [`Block::Reserved`] entries.  The STREAMINFO block is available
    /// through [`info`](Stream::info) rather than the block list.
    ///
    /// # Errors
    ///
    /// As [`open_lazy`](Stream::open_lazy), plus any error from the
    /// individual block body parsers.  An invalid block type (127)
    /// aborts the open.
    pub fn open_full(r: R) -> Result<Self, Error> {
        let mut br = BitReader::new(r);
        let (info, mut last) = parse_stream_start(&mut br)?;

        let mut blocks = Vec::new();
        while !last {
            let header = BlockHeader::parse(&mut br).map_err(Error::into_unexpected)?;
            last = header.last;

            match Block::parse(&mut br, &header) {
                Ok(block) => blocks.push(block),
                Err(Error::ReservedMetadataBlock) => {
                    // skip the body of unknown (reserved) metadata
                    // blocks, as stated by the specification
                    br.skip_bytes(u64::from(header.length))?;
                    if let BlockType::Reserved(block_type) = header.block_type {
                        blocks.push(Block::Reserved(Reserved {
                            block_type,
                            length: header.length,
                        }));
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Ok(Self {
            info,
            blocks,
            seek_table: None,
            seek_table_size: 0,
            data_start: None,
            samples_decoded: 0,
            br,
        })
    }

    /// Returns the stream's STREAMINFO block
    pub fn info(&self) -> &Streaminfo {
        &self.info
    }

    /// Returns the metadata blocks collected by
    /// [`open_full`](Stream::open_full)
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Returns the stream's seek table, if one was retained by
    /// [`open_seekable`](Stream::open_seekable) or synthesized by a
    /// previous [`seek`](Stream::seek)
    pub fn seek_table(&self) -> Option<&SeekTable> {
        self.seek_table.as_ref()
    }

    /// Returns the running total of inter-channel samples decoded
    pub fn samples_decoded(&self) -> u64 {
        self.samples_decoded
    }

    /// Returns the underlying byte source
    pub fn into_inner(self) -> R {
        self.br.into_inner()
    }

    /// Parses the header of the next audio frame
    ///
    /// The reader is left positioned at the frame's first subframe;
    /// use [`next_frame`](Stream::next_frame) when iterating whole
    /// frames.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Eof`] at the end of the stream,
    /// [`Error::ChannelsMismatch`] if the frame's channel count
    /// differs from STREAMINFO's, and [`Error::SampleCountOverflow`]
    /// if the frame pushes the decoded total past STREAMINFO's declared
    /// sample count.
    pub fn next_header(&mut self) -> Result<FrameHeader, Error> {
        let header = FrameHeader::parse(&mut self.br, &self.info)?;
        self.validate(&header)?;
        Ok(header)
    }

    /// Parses the entire next audio frame, including samples
    ///
    /// # Errors
    ///
    /// As [`next_header`](Stream::next_header), plus any subframe or
    /// CRC-16 error.
    pub fn next_frame(&mut self) -> Result<Frame, Error> {
        let frame = Frame::parse(&mut self.br, &self.info)?;
        self.validate(&frame.header)?;
        Ok(frame)
    }

    // Cross-checks a successfully parsed frame against STREAMINFO.
    //
    // Callers allocate interleave buffers from STREAMINFO's channel
    // count and total sample count, so a frame overrunning either
    // would index past those buffers; fail fast instead.
    fn validate(&mut self, header: &FrameHeader) -> Result<(), Error> {
        if header.channel_assignment.count() != self.info.channels.get() {
            return Err(Error::ChannelsMismatch);
        }

        self.samples_decoded += u64::from(header.block_size);
        if let Some(total) = self.info.total_samples {
            // a missing total disables the check
            if self.samples_decoded > total.get() {
                return Err(Error::SampleCountOverflow);
            }
        }

        Ok(())
    }
}

impl<R: Read + Seek> Stream<R> {
    /// Opens a FLAC stream with seeking enabled
    ///
    /// Metadata past STREAMINFO is jumped over rather than drained,
    /// except for a SEEKTABLE block, which is parsed and retained.  The
    /// offset of the first frame header is captured so that seek point
    /// offsets can be resolved later.
    ///
    /// # Errors
    ///
    /// As [`open_lazy`](Stream::open_lazy), plus any error from
    /// parsing a SEEKTABLE block or positioning the source.
    pub fn open_seekable(r: R) -> Result<Self, Error> {
        let mut br = BitReader::new(r);
        let (info, mut last) = parse_stream_start(&mut br)?;

        let mut seek_table = None;
        while !last {
            let header = BlockHeader::parse(&mut br).map_err(Error::into_unexpected)?;
            last = header.last;

            if header.block_type == BlockType::SeekTable {
                match Block::parse(&mut br, &header)? {
                    Block::SeekTable(table) => seek_table = Some(table),
                    _ => unreachable!(), // dispatched on SeekTable
                }
            } else {
                br.seek(SeekFrom::Current(i64::from(header.length)))?;
            }
        }

        let data_start = br.position()?;

        Ok(Self {
            info,
            blocks: Vec::new(),
            seek_table,
            seek_table_size: DEFAULT_SEEK_TABLE_SIZE,
            data_start: Some(data_start),
            samples_decoded: 0,
            br,
        })
    }

    /// Seeks to the frame containing the given inter-channel sample
    ///
    /// Returns the sample number of the first sample in the landing
    /// frame, which the next call to [`next_frame`](Stream::next_frame)
    /// will decode in full.  The running decoded-sample counter is
    /// rewound to match the new position.
    ///
    /// If the stream carries no SEEKTABLE block, the first seek scans
    /// the whole stream once to synthesize a table with one point per
    /// frame, then restores the current position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSeekable`] unless the stream was opened with
    /// [`open_seekable`](Stream::open_seekable), [`Error::SeekOutOfRange`]
    /// if `sample` is at or past STREAMINFO's declared total, and
    /// [`Error::NoSeekTable`] if no usable seek points exist.
    pub fn seek(&mut self, sample: u64) -> Result<u64, Error> {
        let data_start = self.data_start.ok_or(Error::NotSeekable)?;

        if self.seek_table.is_none() && self.seek_table_size > 0 {
            self.make_seek_table()?;
        }

        if let Some(total) = self.info.total_samples {
            if sample >= total.get() {
                return Err(Error::SeekOutOfRange);
            }
        }

        let (start_sample, byte_offset) = self.search_from_start(sample)?;
        self.br.seek(SeekFrom::Start(data_start + byte_offset))?;

        // scanning forward from the seek point goes through next_frame,
        // which keeps accumulating the decoded-sample counter; starting
        // it from the seek point's sample number keeps validation
        // consistent with the actual stream position
        self.samples_decoded = start_sample;

        loop {
            let offset = self.br.position()?;
            let frame = self.next_frame()?;
            let start = frame.header.sample_number();

            if start + u64::from(frame.header.block_size) > sample {
                // rewind to the start of the landing frame so the
                // caller's next call re-decodes it; its block size
                // re-enters the counter at that point
                self.samples_decoded = start;
                self.br.seek(SeekFrom::Start(offset))?;
                return Ok(start);
            }
        }
    }

    // Searches for the last seek point starting at or before the given
    // sample number.  If the sample number is lower than the first
    // point, the first point is returned.
    fn search_from_start(&self, sample: u64) -> Result<(u64, u64), Error> {
        fn defined(point: &SeekPoint) -> Option<(u64, u64, u16)> {
            match point {
                SeekPoint::Defined {
                    sample_offset,
                    byte_offset,
                    frame_samples,
                } => Some((*sample_offset, *byte_offset, *frame_samples)),
                SeekPoint::Placeholder => None,
            }
        }

        let points = self
            .seek_table
            .as_ref()
            .map(|table| table.points.as_slice())
            .unwrap_or_default();

        let mut real = points.iter().map_while(defined);
        let first = real.next().ok_or(Error::NoSeekTable)?;

        let mut previous = first;
        for point in std::iter::once(first).chain(real) {
            if point.0 + u64::from(point.2) >= sample {
                break;
            }
            previous = point;
        }

        Ok((previous.0, previous.1))
    }

    // Scans every frame of the stream once, emitting a seek point per
    // frame, then restores the position and decoded-sample counter.
    fn make_seek_table(&mut self) -> Result<(), Error> {
        let data_start = self.data_start.ok_or(Error::NotSeekable)?;

        let position = self.br.position()?;
        self.br.seek(SeekFrom::Start(data_start))?;

        // the scan is an internal operation, not decoding progress;
        // without the save and restore, the counter would accumulate
        // the entire stream and reject legitimate reads afterwards
        let saved_samples = self.samples_decoded;
        self.samples_decoded = 0;

        let mut points = Vec::new();
        let mut sample_offset = 0;
        loop {
            let offset = self.br.position()?;
            let frame = match self.next_frame() {
                Ok(frame) => frame,
                Err(Error::Eof) => break,
                Err(e) => return Err(e),
            };

            points.push(SeekPoint::Defined {
                sample_offset,
                byte_offset: offset - data_start,
                frame_samples: frame.header.block_size,
            });
            sample_offset += u64::from(frame.header.block_size);
        }

        self.seek_table = Some(SeekTable { points });
        self.samples_decoded = saved_samples;
        self.br.seek(SeekFrom::Start(position))?;

        Ok(())
    }
}

// Verifies the stream signature, skipping over any prepended ID3v2
// tag, then parses the mandatory STREAMINFO block.  Returns the
// STREAMINFO and whether it was the last metadata block.
fn parse_stream_start<R: Read>(br: &mut BitReader<R>) -> Result<(Streaminfo, bool), Error> {
    let mut tag = [0; 4];
    br.read_aligned(&mut tag)?;

    if tag[..3] == *ID3_TAG {
        skip_id3v2(br)?;

        // second attempt at the signature
        br.read_aligned(&mut tag).map_err(Error::into_unexpected)?;
    }

    if tag != *FLAC_TAG {
        return Err(Error::MissingFlacTag);
    }

    let header = BlockHeader::parse(br).map_err(Error::into_unexpected)?;
    if header.block_type != BlockType::Streaminfo || header.length != Streaminfo::SIZE {
        return Err(Error::MissingStreaminfo);
    }

    let info = Streaminfo::parse(br).map_err(Error::into_unexpected)?;
    Ok((info, header.last))
}

// Skips an ID3v2 tag whose leading "ID3" was already consumed.
fn skip_id3v2<R: Read>(br: &mut BitReader<R>) -> Result<(), Error> {
    // remainder of the version and flags bytes
    br.skip_bytes(2)?;

    // the payload size is a 4-byte synchsafe integer: 7 bits per
    // byte, high bits cleared
    let mut size = [0; 4];
    br.read_aligned(&mut size).map_err(Error::into_unexpected)?;
    let size = size
        .iter()
        .fold(0, |acc, byte| acc << 7 | u64::from(byte & 0x7F));

    br.skip_bytes(size)
}
