// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling a FLAC stream's metadata blocks
//!
//! Many items are capitalized simply because they were capitalized
//! in the original FLAC format documentation.
//!
//! # Metadata Blocks
//!
//! FLAC supports seven different metadata block types
//!
//! | Block Type | Purpose |
//! |-----------:|---------|
//! | [STREAMINFO](`Streaminfo`) | stream information such as sample rate, channel count, etc. |
//! | [PADDING](`Padding`) | empty data which can easily be resized as needed |
//! | [APPLICATION](`Application`) | application-specific data such as foreign RIFF WAVE chunks |
//! | [SEEKTABLE](`SeekTable`) | to allow for more efficient seeking within a FLAC stream |
//! | [VORBIS_COMMENT](`VorbisComment`) | textual metadata such as track title, artist name, album name, etc. |
//! | [CUESHEET](`Cuesheet`) | the original disc's layout, for CD images |
//! | [PICTURE](`Picture`) | embedded image files such as cover art |
//!
//! Block types 7 through 126 are reserved for future use and surface
//! as [`Error::ReservedMetadataBlock`], which callers may convert into
//! a skip; their bodies are retained only as opaque [`Reserved`]
//! entries.  Block type 127 is forbidden.

use crate::Error;
use crate::bits::BitReader;
use std::io::Read;
use std::num::NonZero;

/// A trait for indicating various pieces of FLAC stream metadata
pub trait Metadata {
    /// Returns channel count
    ///
    /// From 1 to 8
    fn channel_count(&self) -> u8;

    /// Returns sample rate, in Hz
    fn sample_rate(&self) -> u32;

    /// Returns bits-per-sample
    ///
    /// From 4 to 32
    fn bits_per_sample(&self) -> u32;

    /// Returns total number of inter-channel samples, if known
    fn total_samples(&self) -> Option<u64> {
        None
    }

    /// Returns MD5 of the decoded stream, if known
    fn md5(&self) -> Option<&[u8; 16]> {
        None
    }

    /// Returns duration of the stream, if known
    fn duration(&self) -> Option<std::time::Duration> {
        const NANOS_PER_SEC: u64 = 1_000_000_000;

        let sample_rate = u64::from(self.sample_rate());

        self.total_samples().map(|s| {
            std::time::Duration::new(
                s / sample_rate,
                u32::try_from(((s % sample_rate) * NANOS_PER_SEC) / sample_rate)
                    .unwrap_or_default(),
            )
        })
    }
}

/// A FLAC metadata block header
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 1    | `last` | final metadata block in the stream |
/// | 7    | `block_type` | type of block |
/// | 24   | `length` | block body size, in bytes |
///
/// # Example
/// ```
/// use flac_stream::bits::BitReader;
/// use flac_stream::metadata::{BlockHeader, BlockType};
///
/// let data: &[u8] = &[0b1_0000000, 0x00, 0x00, 0x22];
/// let header = BlockHeader::parse(&mut BitReader::new(data)).unwrap();
/// assert_eq!(
///     header,
///     BlockHeader {
///         last: true,                         // 0b1
///         block_type: BlockType::Streaminfo,  // 0b0000000
///         length: 0x00_00_22,                 // 0x00, 0x00, 0x22
///     },
/// );
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BlockHeader {
    /// Whether we are the final block
    pub last: bool,
    /// Our block type
    pub block_type: BlockType,
    /// Our block body size, in bytes
    pub length: u32,
}

impl BlockHeader {
    /// Reads a block header from the given reader
    ///
    /// # Errors
    ///
    /// A source that ends at the header position yields a graceful
    /// [`Error::Eof`].  Valid FLAC streams always carry at least one
    /// audio frame after the last metadata block, so whoever walks the
    /// block chain is expected to treat that condition as malformed.
    pub fn parse<R: Read>(r: &mut BitReader<R>) -> Result<Self, Error> {
        let mut buf = [0; 4];
        match r.read_aligned(&mut buf) {
            Ok(()) => {}
            Err(Error::UnexpectedEof) => return Err(Error::Eof),
            Err(e) => return Err(e),
        }

        Ok(Self {
            last: buf[0] & 0x80 != 0,
            block_type: BlockType::from(buf[0] & 0x7F),
            length: u32::from(buf[1]) << 16 | u32::from(buf[2]) << 8 | u32::from(buf[3]),
        })
    }
}

/// A FLAC metadata block type
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlockType {
    /// The STREAMINFO block
    Streaminfo,
    /// The PADDING block
    Padding,
    /// The APPLICATION block
    Application,
    /// The SEEKTABLE block
    SeekTable,
    /// The VORBIS_COMMENT block
    VorbisComment,
    /// The CUESHEET block
    Cuesheet,
    /// The PICTURE block
    Picture,
    /// A reserved block type, from 7 to 126
    Reserved(u8),
    /// The forbidden block type 127
    Invalid,
}

impl From<u8> for BlockType {
    fn from(tag: u8) -> Self {
        match tag {
            0 => Self::Streaminfo,
            1 => Self::Padding,
            2 => Self::Application,
            3 => Self::SeekTable,
            4 => Self::VorbisComment,
            5 => Self::Cuesheet,
            6 => Self::Picture,
            7..=126 => Self::Reserved(tag),
            _ => Self::Invalid,
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Streaminfo => "STREAMINFO".fmt(f),
            Self::Padding => "PADDING".fmt(f),
            Self::Application => "APPLICATION".fmt(f),
            Self::SeekTable => "SEEKTABLE".fmt(f),
            Self::VorbisComment => "VORBIS_COMMENT".fmt(f),
            Self::Cuesheet => "CUESHEET".fmt(f),
            Self::Picture => "PICTURE".fmt(f),
            Self::Reserved(tag) => write!(f, "RESERVED ({tag})"),
            Self::Invalid => "INVALID".fmt(f),
        }
    }
}

/// A parsed FLAC metadata block body
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Block {
    /// The STREAMINFO block
    Streaminfo(Streaminfo),
    /// The PADDING block
    Padding(Padding),
    /// The APPLICATION block
    Application(Application),
    /// The SEEKTABLE block
    SeekTable(SeekTable),
    /// The VORBIS_COMMENT block
    VorbisComment(VorbisComment),
    /// The CUESHEET block
    Cuesheet(Cuesheet),
    /// The PICTURE block
    Picture(Picture),
    /// A reserved block whose body was skipped
    Reserved(Reserved),
}

impl Block {
    /// Our block type
    pub fn block_type(&self) -> BlockType {
        match self {
            Self::Streaminfo(_) => BlockType::Streaminfo,
            Self::Padding(_) => BlockType::Padding,
            Self::Application(_) => BlockType::Application,
            Self::SeekTable(_) => BlockType::SeekTable,
            Self::VorbisComment(_) => BlockType::VorbisComment,
            Self::Cuesheet(_) => BlockType::Cuesheet,
            Self::Picture(_) => BlockType::Picture,
            Self::Reserved(r) => BlockType::Reserved(r.block_type),
        }
    }

    /// Reads a block body of the type declared by `header`
    ///
    /// # Errors
    ///
    /// Reserved block types yield [`Error::ReservedMetadataBlock`]
    /// without consuming the body; callers may skip `header.length`
    /// bytes and continue.  The forbidden type 127 yields
    /// [`Error::InvalidMetadataBlock`].  A source that ends inside a
    /// block body yields [`Error::UnexpectedEof`].
    pub fn parse<R: Read>(r: &mut BitReader<R>, header: &BlockHeader) -> Result<Self, Error> {
        match header.block_type {
            BlockType::Streaminfo => Streaminfo::parse(r).map(Self::Streaminfo),
            BlockType::Padding => Padding::parse(r, header.length).map(Self::Padding),
            BlockType::Application => Application::parse(r, header.length).map(Self::Application),
            BlockType::SeekTable => SeekTable::parse(r, header.length).map(Self::SeekTable),
            BlockType::VorbisComment => {
                VorbisComment::parse(r, header.length).map(Self::VorbisComment)
            }
            BlockType::Cuesheet => Cuesheet::parse(r, header.length).map(Self::Cuesheet),
            BlockType::Picture => Picture::parse(r, header.length).map(Self::Picture),
            BlockType::Reserved(_) => Err(Error::ReservedMetadataBlock),
            BlockType::Invalid => Err(Error::InvalidMetadataBlock),
        }
        .map_err(Error::into_unexpected)
    }
}

/// A STREAMINFO metadata block
///
/// This block contains metadata about the stream's contents.
///
/// It must *always* be present in a FLAC stream,
/// must *always* be the first metadata block,
/// and must *not* be present more than once.
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 16   | `minimum_block_size` | minimum block size (in samples) in the stream
/// | 16   | `maximum_block_size` | maximum block size (in samples) in the stream
/// | 24   | `minimum_frame_size` | minimum frame size (in bytes) in the stream
/// | 24   | `maximum_frame_size` | maximum frame size (in bytes) in the stream
/// | 20   | `sample_rate` | stream's sample rate, in Hz
/// | 3    | `channels` | stream's channel count (+1)
/// | 5    | `bits_per_sample` | stream's bits-per-sample (+1)
/// | 36   | `total_samples` | stream's total inter-channel samples
/// | 16×8 | `md5` | decoded stream's MD5 sum hash
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Streaminfo {
    /// The minimum block size (in samples) used in the stream,
    /// excluding the last block.
    pub minimum_block_size: u16,
    /// The maximum block size (in samples) used in the stream.
    pub maximum_block_size: u16,
    /// The minimum frame size (in bytes) used in the stream.
    ///
    /// `None` indicates the value is unknown.
    pub minimum_frame_size: Option<NonZero<u32>>,
    /// The maximum frame size (in bytes) used in the stream.
    ///
    /// `None` indicates the value is unknown.
    pub maximum_frame_size: Option<NonZero<u32>>,
    /// Sample rate in Hz, from 1 to 655350
    pub sample_rate: u32,
    /// Number of channels, from 1 to 8
    pub channels: NonZero<u8>,
    /// Number of bits-per-sample, from 4 to 32
    pub bits_per_sample: u32,
    /// Total number of inter-channel samples in the stream.
    ///
    /// `None` indicates the value is unknown.
    pub total_samples: Option<NonZero<u64>>,
    /// MD5 hash of the unencoded audio data.
    ///
    /// `None` indicates the value is unknown.
    pub md5: Option<[u8; 16]>,
}

impl Streaminfo {
    /// The maximum sample rate, in Hz
    pub const MAX_SAMPLE_RATE: u32 = 655350;

    /// Defined size of the STREAMINFO block body, in bytes
    pub const SIZE: u32 = 0x22;

    /// Reads a STREAMINFO block body from the given reader
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStreaminfo`] if any field is out of
    /// range or the minimum block or frame size exceeds its maximum.
    pub fn parse<R: Read>(r: &mut BitReader<R>) -> Result<Self, Error> {
        let streaminfo = Self {
            minimum_block_size: r.read_bits(16)? as u16,
            maximum_block_size: r.read_bits(16)? as u16,
            minimum_frame_size: NonZero::new(r.read_bits(24)? as u32),
            maximum_frame_size: NonZero::new(r.read_bits(24)? as u32),
            sample_rate: r.read_bits(20)? as u32,
            channels: NonZero::new(r.read_bits(3)? as u8 + 1).unwrap(),
            bits_per_sample: r.read_bits(5)? as u32 + 1,
            total_samples: NonZero::new(r.read_bits(36)?),
            md5: {
                let mut md5 = [0; 16];
                r.read_aligned(&mut md5)?;
                md5.iter().any(|b| *b != 0).then_some(md5)
            },
        };

        if streaminfo.sample_rate == 0
            || streaminfo.sample_rate > Self::MAX_SAMPLE_RATE
            || streaminfo.bits_per_sample < 4
            || streaminfo.minimum_block_size > streaminfo.maximum_block_size
            || matches!(
                (streaminfo.minimum_frame_size, streaminfo.maximum_frame_size),
                (Some(min), Some(max)) if min > max
            )
        {
            return Err(Error::InvalidStreaminfo);
        }

        Ok(streaminfo)
    }
}

impl Metadata for Streaminfo {
    fn channel_count(&self) -> u8 {
        self.channels.get()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn bits_per_sample(&self) -> u32 {
        self.bits_per_sample
    }

    fn total_samples(&self) -> Option<u64> {
        self.total_samples.map(|s| s.get())
    }

    fn md5(&self) -> Option<&[u8; 16]> {
        self.md5.as_ref()
    }
}

/// A PADDING metadata block
///
/// Padding blocks consist of all 0 bytes and exist so other metadata
/// can be resized without rewriting the stream's audio frames.
/// The body is not retained; only its size is.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Padding {
    /// The size of the padding, in bytes
    pub length: u32,
}

impl Padding {
    fn parse<R: Read>(r: &mut BitReader<R>, length: u32) -> Result<Self, Error> {
        r.skip_bytes(u64::from(length))?;
        Ok(Self { length })
    }
}

/// An APPLICATION metadata block
///
/// This block is for handling application-specific binary metadata,
/// such as foreign RIFF WAVE tags.
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 32   | `id` | registered application ID
/// | rest of block | `data` | application-specific data
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Application {
    /// A registered application ID
    pub id: u32,
    /// Application-specific data
    pub data: Vec<u8>,
}

impl Application {
    fn parse<R: Read>(r: &mut BitReader<R>, length: u32) -> Result<Self, Error> {
        let data_len = length
            .checked_sub(4)
            .ok_or(Error::InsufficientApplicationBlock)?;

        let id = r.read_bits(32)? as u32;
        let mut data = vec![0; data_len as usize];
        r.read_aligned(&mut data)?;

        Ok(Self { id, data })
    }
}

/// A SEEKTABLE metadata block
///
/// Because FLAC frames do not store their compressed length,
/// a seek table is used for random access within a FLAC stream.
/// By mapping a sample number to a byte offset,
/// one can quickly reach different parts of the stream
/// without decoding the whole thing.
///
/// Note that seek point byte offsets are relative to the start of the
/// first FLAC frame, *not* to the start of the entire stream.  This
/// allows the metadata section to be resized without recalculating
/// the table's contents.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct SeekTable {
    /// The seek table's individual seek points
    ///
    /// Non-placeholder points are ordered strictly by sample offset
    /// and by byte offset; placeholder points, if any, trail.
    pub points: Vec<SeekPoint>,
}

impl SeekTable {
    const POINT_SIZE: u32 = (64 + 64 + 16) / 8;

    fn parse<R: Read>(r: &mut BitReader<R>, length: u32) -> Result<Self, Error> {
        if length % Self::POINT_SIZE != 0 {
            return Err(Error::InvalidSeekTableSize);
        }

        let mut points = Vec::with_capacity((length / Self::POINT_SIZE) as usize);
        for _ in 0..length / Self::POINT_SIZE {
            points.push(SeekPoint::parse(r)?);
        }

        // non-placeholder points must increment by sample offset and
        // by byte offset, and cannot follow a placeholder
        let mut previous: Option<(u64, u64)> = None;
        for point in &points {
            match (point, previous) {
                (SeekPoint::Placeholder, _) => previous = Some((u64::MAX, u64::MAX)),
                (SeekPoint::Defined { .. }, None) => previous = point.offsets(),
                (
                    SeekPoint::Defined {
                        sample_offset,
                        byte_offset,
                        ..
                    },
                    Some((prev_sample, prev_byte)),
                ) => {
                    if *sample_offset <= prev_sample || *byte_offset <= prev_byte {
                        return Err(Error::InvalidSeekTablePoint);
                    }
                    previous = point.offsets();
                }
            }
        }

        Ok(Self { points })
    }
}

/// An individual SEEKTABLE seek point
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 64   | `sample_offset` | sample number of first sample in target frame
/// | 64   | `byte_offset` | offset, in bytes, from first frame to target frame's header
/// | 16   | `frame_samples` | number of samples in target frame
///
/// A sample offset of all 1 bits marks a placeholder point.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SeekPoint {
    /// A defined, non-placeholder seek point
    Defined {
        /// The sample number of the first sample in the target frame
        sample_offset: u64,
        /// Offset, in bytes, from the first byte of the first frame header
        /// to the first byte in the target frame's header
        byte_offset: u64,
        /// Number of samples in the target frame
        frame_samples: u16,
    },
    /// A placeholder seek point
    Placeholder,
}

impl SeekPoint {
    fn parse<R: Read>(r: &mut BitReader<R>) -> Result<Self, Error> {
        match r.read_bits(64)? {
            u64::MAX => {
                let _byte_offset = r.read_bits(64)?;
                let _frame_samples = r.read_bits(16)?;
                Ok(Self::Placeholder)
            }
            sample_offset => Ok(Self::Defined {
                sample_offset,
                byte_offset: r.read_bits(64)?,
                frame_samples: r.read_bits(16)? as u16,
            }),
        }
    }

    fn offsets(&self) -> Option<(u64, u64)> {
        match self {
            Self::Defined {
                sample_offset,
                byte_offset,
                ..
            } => Some((*sample_offset, *byte_offset)),
            Self::Placeholder => None,
        }
    }
}

/// A VORBIS_COMMENT metadata block
///
/// This block contains metadata such as track name,
/// artist name, album name, etc.  Its contents are
/// UTF-8 encoded, `=`-delimited text fields
/// with a field name followed by value, such as:
///
/// ```text
/// TITLE=Track Title
/// ```
///
/// # Byte Order
///
/// Unlike the rest of a FLAC stream, the Vorbis comment's
/// length fields are stored in little-endian byte order.
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 32   | vendor string len | length of vendor string, in bytes
/// | `vendor string len`×8 | `vendor_string` | vendor string, in UTF-8
/// | 32   | field count | number of fields
/// | 32   | field₀ len | length of field₀, in bytes
/// | `field₀ len`×8 | `fields₀` | first field value, in UTF-8
/// | | | ⋮
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct VorbisComment {
    /// The vendor string
    pub vendor_string: String,
    /// The individual metadata comment strings
    pub fields: Vec<String>,
}

impl VorbisComment {
    /// Given a field name, returns first matching value, if any
    ///
    /// Fields are matched case-insensitively.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.iter().find_map(|f| {
            f.split_once('=')
                .filter(|(name, _)| name.eq_ignore_ascii_case(field))
                .map(|(_, value)| value)
        })
    }

    fn parse<R: Read>(r: &mut BitReader<R>, length: u32) -> Result<Self, Error> {
        let mut remaining = length;

        let vendor_string = read_sized_string(r, &mut remaining)?;

        let fields = (0..read_u32_le(r, &mut remaining)?)
            .map(|_| read_sized_string(r, &mut remaining))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            vendor_string,
            fields,
        })
    }
}

/// A CUESHEET metadata block
///
/// This block stores the original disc's table of contents,
/// for CD images.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Cuesheet {
    /// The media catalog number, in printable ASCII
    pub catalog_number: String,
    /// The number of lead-in samples, for CDDA cuesheets
    pub lead_in_samples: u64,
    /// Whether the cuesheet corresponds to a compact disc
    pub is_cdda: bool,
    /// The cuesheet's individual tracks
    pub tracks: Vec<CuesheetTrack>,
}

impl Cuesheet {
    fn parse<R: Read>(r: &mut BitReader<R>, length: u32) -> Result<Self, Error> {
        // catalog number (128 bytes), lead-in (8), flag + reserved
        // (1 + 258), track count (1), at least one track (36)
        if length < 128 + 8 + 259 + 1 + 36 {
            return Err(Error::InvalidMetadataBlockSize);
        }

        let mut catalog = [0; 128];
        r.read_aligned(&mut catalog)?;
        let nul = catalog.iter().position(|b| *b == 0).unwrap_or(128);
        let catalog_number = String::from_utf8(catalog[..nul].to_vec())?;

        let lead_in_samples = r.read_bits(64)?;
        let is_cdda = r.read_bits(1)? == 1;
        r.read_bits(7)?;
        r.skip_bytes(258)?;

        let tracks = (0..r.read_bits(8)?)
            .map(|_| CuesheetTrack::parse(r))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            catalog_number,
            lead_in_samples,
            is_cdda,
            tracks,
        })
    }
}

/// A single track within a CUESHEET metadata block
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CuesheetTrack {
    /// The track's offset in samples, relative to the stream's start
    pub offset: u64,
    /// The track's number, from 1 to 99 for CDDA
    /// (or 170/255 for the lead-out track)
    pub number: u8,
    /// The track's ISRC, if any
    pub isrc: Option<[u8; 12]>,
    /// Whether the track is non-audio
    pub non_audio: bool,
    /// Whether the track has pre-emphasis
    pub pre_emphasis: bool,
    /// The track's index points
    pub index_points: Vec<CuesheetIndex>,
}

impl CuesheetTrack {
    fn parse<R: Read>(r: &mut BitReader<R>) -> Result<Self, Error> {
        let offset = r.read_bits(64)?;
        let number = r.read_bits(8)? as u8;

        let mut isrc = [0; 12];
        r.read_aligned(&mut isrc)?;

        let non_audio = r.read_bits(1)? == 1;
        let pre_emphasis = r.read_bits(1)? == 1;
        r.read_bits(6)?;
        r.skip_bytes(13)?;

        let index_points = (0..r.read_bits(8)?)
            .map(|_| CuesheetIndex::parse(r))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            offset,
            number,
            isrc: isrc.iter().any(|b| *b != 0).then_some(isrc),
            non_audio,
            pre_emphasis,
            index_points,
        })
    }
}

/// A single index point within a cuesheet track
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CuesheetIndex {
    /// The index point's offset in samples, relative to the track offset
    pub offset: u64,
    /// The index point number
    pub number: u8,
}

impl CuesheetIndex {
    fn parse<R: Read>(r: &mut BitReader<R>) -> Result<Self, Error> {
        let index = Self {
            offset: r.read_bits(64)?,
            number: r.read_bits(8)? as u8,
        };
        r.skip_bytes(3)?;
        Ok(index)
    }
}

/// A PICTURE metadata block
///
/// This block stores an embedded image, such as cover art.
///
/// | Bits | Field | Meaning |
/// |-----:|------:|---------|
/// | 32   | `picture_type` | image's type, per the ID3v2 APIC frame
/// | 32   | MIME type len | length of MIME type string, in bytes
/// | MIME type len×8 | `media_type` | MIME type string, in printable ASCII
/// | 32   | description len | length of description, in bytes
/// | description len×8 | `description` | image description, in UTF-8
/// | 32   | `width` | image width, in pixels
/// | 32   | `height` | image height, in pixels
/// | 32   | `color_depth` | image color depth, in bits-per-pixel
/// | 32   | `colors_used` | number of colors for indexed-color images
/// | 32   | data len | length of image data, in bytes
/// | data len×8 | `data` | binary image data
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Picture {
    /// The image's type, per the ID3v2 APIC frame
    pub picture_type: u32,
    /// The image's MIME type
    pub media_type: String,
    /// A text description of the image
    pub description: String,
    /// The image's width, in pixels
    pub width: u32,
    /// The image's height, in pixels
    pub height: u32,
    /// The image's color depth, in bits-per-pixel
    pub color_depth: u32,
    /// For indexed-color images, the number of colors used
    pub colors_used: u32,
    /// The binary image data
    pub data: Vec<u8>,
}

impl Picture {
    fn parse<R: Read>(r: &mut BitReader<R>, length: u32) -> Result<Self, Error> {
        let mut remaining = length;

        let picture_type = read_u32_be(r, &mut remaining)?;
        let media_type = read_sized_string_be(r, &mut remaining)?;
        let description = read_sized_string_be(r, &mut remaining)?;
        let width = read_u32_be(r, &mut remaining)?;
        let height = read_u32_be(r, &mut remaining)?;
        let color_depth = read_u32_be(r, &mut remaining)?;
        let colors_used = read_u32_be(r, &mut remaining)?;

        let data_len = read_u32_be(r, &mut remaining)?;
        if data_len > remaining {
            return Err(Error::InvalidMetadataBlockSize);
        }
        let mut data = vec![0; data_len as usize];
        r.read_aligned(&mut data)?;

        Ok(Self {
            picture_type,
            media_type,
            description,
            width,
            height,
            color_depth,
            colors_used,
            data,
        })
    }
}

/// A metadata block of a reserved type whose body was skipped
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Reserved {
    /// The block's 7-bit type tag, from 7 to 126
    pub block_type: u8,
    /// The size of the skipped body, in bytes
    pub length: u32,
}

// Reads a little-endian u32 length prefix, debiting it from the
// block's remaining byte count.
fn read_u32_le<R: Read>(r: &mut BitReader<R>, remaining: &mut u32) -> Result<u32, Error> {
    let mut buf = [0; 4];
    *remaining = remaining
        .checked_sub(4)
        .ok_or(Error::InvalidMetadataBlockSize)?;
    r.read_aligned(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u32_be<R: Read>(r: &mut BitReader<R>, remaining: &mut u32) -> Result<u32, Error> {
    *remaining = remaining
        .checked_sub(4)
        .ok_or(Error::InvalidMetadataBlockSize)?;
    Ok(r.read_bits(32)? as u32)
}

// Reads a length-prefixed UTF-8 string, verifying the declared length
// is plausible for the block before allocating storage for it.
fn read_sized_string<R: Read>(r: &mut BitReader<R>, remaining: &mut u32) -> Result<String, Error> {
    let len = read_u32_le(r, remaining)?;
    *remaining = remaining
        .checked_sub(len)
        .ok_or(Error::InvalidMetadataBlockSize)?;

    let mut buf = vec![0; len as usize];
    r.read_aligned(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

fn read_sized_string_be<R: Read>(
    r: &mut BitReader<R>,
    remaining: &mut u32,
) -> Result<String, Error> {
    let len = read_u32_be(r, remaining)?;
    *remaining = remaining
        .checked_sub(len)
        .ok_or(Error::InvalidMetadataBlockSize)?;

    let mut buf = vec![0; len as usize];
    r.read_aligned(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}
