// Copyright 2025 Brian Langenberger
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! For handling FLAC audio frames
//!
//! Each frame consists of a header (sync code, coding parameters,
//! a coded frame or sample number, and a CRC-8), one subframe per
//! channel, and a CRC-16 footer covering the whole frame.

use crate::Error;
use crate::bits::BitReader;
use crate::metadata::Streaminfo;
use arrayvec::ArrayVec;
use std::io::Read;
use std::num::NonZero;

/// The maximum number of channels in a FLAC frame
pub const MAX_CHANNELS: usize = 8;

/// A FLAC frame header
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FrameHeader {
    /// The blocking strategy bit
    pub blocking_strategy: BlockingStrategy,
    /// The block size, in inter-channel samples
    pub block_size: u16,
    /// The sample rate, in Hz
    pub sample_rate: u32,
    /// How the channels are assigned
    pub channel_assignment: ChannelAssignment,
    /// The number of bits per sample
    pub bits_per_sample: u32,
    /// The frame's coded number: a frame number for fixed blocking,
    /// a sample number for variable blocking
    pub number: u64,
}

impl FrameHeader {
    // 14 bits of sync code and a 0 reserved bit
    const SYNC_CODE: u64 = 0b111111111111100;

    /// Returns the number of the frame's first inter-channel sample
    pub fn sample_number(&self) -> u64 {
        match self.blocking_strategy {
            BlockingStrategy::Fixed => self.number * u64::from(self.block_size),
            BlockingStrategy::Variable => self.number,
        }
    }

    /// Reads a frame header from the given reader
    ///
    /// This enables both of the reader's checksums, consumes through
    /// the header's CRC-8 byte and verifies it, leaving CRC-16
    /// accumulation running for the frame's remainder.
    ///
    /// Sample rate and bits-per-sample fields deferring to STREAMINFO
    /// are resolved against `streaminfo`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Eof`] if the stream ends cleanly at the frame
    /// boundary, [`Error::UnexpectedEof`] if it ends inside the header,
    /// [`Error::Crc8Mismatch`] on checksum failure, or an appropriate
    /// error for invalid header fields.
    pub fn parse<R: Read>(r: &mut BitReader<R>, streaminfo: &Streaminfo) -> Result<Self, Error> {
        r.enable_crc8();
        r.enable_crc16();

        match r.read_bits(15)? {
            Self::SYNC_CODE => {
                Self::parse_after_sync(r, streaminfo).map_err(Error::into_unexpected)
            }
            _ => Err(Error::InvalidSyncCode),
        }
    }

    fn parse_after_sync<R: Read>(
        r: &mut BitReader<R>,
        streaminfo: &Streaminfo,
    ) -> Result<Self, Error> {
        let blocking_strategy = match r.read_bits(1)? {
            0 => BlockingStrategy::Fixed,
            _ => BlockingStrategy::Variable,
        };
        let encoded_block_size = r.read_bits(4)? as u8;
        let encoded_sample_rate = r.read_bits(4)? as u8;
        let encoded_channels = r.read_bits(4)? as u8;
        let encoded_bps = r.read_bits(3)? as u8;
        r.read_bits(1)?;

        let number = read_coded_number(r, blocking_strategy)?;

        let frame_header = Self {
            blocking_strategy,
            number,
            block_size: match encoded_block_size {
                0b0000 => return Err(Error::InvalidBlockSize),
                0b0001 => 192,
                v @ 0b0010..=0b0101 => 144 << v,
                0b0110 => r.read_bits(8)? as u16 + 1,
                0b0111 => u16::try_from(r.read_bits(16)? + 1).map_err(|_| Error::InvalidBlockSize)?,
                v @ 0b1000..=0b1111 => 1 << v,
                _ => unreachable!(), // 4-bit field
            },
            sample_rate: match encoded_sample_rate {
                0b0000 => streaminfo.sample_rate,
                0b0001 => 88200,
                0b0010 => 176400,
                0b0011 => 192000,
                0b0100 => 8000,
                0b0101 => 16000,
                0b0110 => 22050,
                0b0111 => 24000,
                0b1000 => 32000,
                0b1001 => 44100,
                0b1010 => 48000,
                0b1011 => 96000,
                0b1100 => r.read_bits(8)? as u32 * 1000,
                0b1101 => r.read_bits(16)? as u32,
                0b1110 => r.read_bits(16)? as u32 * 10,
                0b1111 => return Err(Error::InvalidSampleRate),
                _ => unreachable!(), // 4-bit field
            },
            channel_assignment: match encoded_channels {
                c @ 0b0000..=0b0111 => ChannelAssignment::Independent(c + 1),
                0b1000 => ChannelAssignment::LeftSide,
                0b1001 => ChannelAssignment::SideRight,
                0b1010 => ChannelAssignment::MidSide,
                0b1011..=0b1111 => return Err(Error::InvalidChannels),
                _ => unreachable!(), // 4-bit field
            },
            bits_per_sample: match encoded_bps {
                0b000 => streaminfo.bits_per_sample,
                0b001 => 8,
                0b010 => 12,
                0b011 => return Err(Error::InvalidBitsPerSample),
                0b100 => 16,
                0b101 => 20,
                0b110 => 24,
                0b111 => 32,
                _ => unreachable!(), // 3-bit field
            },
        };

        // the accumulated CRC-8 covers every header byte before this one
        let expected_crc8 = r.crc8();
        let stored_crc8 = r.read_bits(8)? as u8;
        r.disable_crc8();
        if stored_crc8 != expected_crc8 {
            return Err(Error::Crc8Mismatch);
        }

        Ok(frame_header)
    }
}

/// A frame's blocking strategy
///
/// The blocking strategy must be the same throughout the entire stream.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BlockingStrategy {
    /// A fixed-blocksize stream; the frame header codes the frame number
    Fixed,
    /// A variable-blocksize stream; the frame header codes the sample
    /// number of the frame's first sample
    Variable,
}

/// How the channels are assigned in a FLAC frame
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ChannelAssignment {
    /// Channels are stored independently
    Independent(u8),
    /// Channel 0 is stored verbatim, channel 1 derived from both
    LeftSide,
    /// Channel 0 is derived from both, channel 1 is stored verbatim
    SideRight,
    /// Channel 0 is averaged from both, channel 1 is derived from both
    MidSide,
}

impl ChannelAssignment {
    /// Returns total number of channels defined by assignment
    pub fn count(&self) -> u8 {
        match self {
            Self::Independent(c) => *c,
            _ => 2,
        }
    }

    // The difference channel of the stereo modes carries one extra bit.
    fn extra_bit(&self, channel: u8) -> u32 {
        match (self, channel) {
            (Self::LeftSide, 1) | (Self::SideRight, 0) | (Self::MidSide, 1) => 1,
            _ => 0,
        }
    }
}

/// A fully decoded FLAC frame
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame {
    /// The frame's header
    pub header: FrameHeader,
    /// One decoded sample vector per channel, each `block_size` long
    ///
    /// Inter-channel decorrelation has already been applied, so the
    /// channels hold independent PCM samples in SMPTE/ITU-R order.
    pub samples: ArrayVec<Vec<i32>, MAX_CHANNELS>,
}

impl Frame {
    /// Reads an entire frame from the given reader
    ///
    /// Consumes the header, one subframe per channel and the CRC-16
    /// footer, verifying both checksums along the way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Eof`] if the stream ends cleanly at the frame
    /// boundary and [`Error::UnexpectedEof`] if it ends mid-frame, in
    /// addition to any header, subframe or checksum error.
    pub fn parse<R: Read>(r: &mut BitReader<R>, streaminfo: &Streaminfo) -> Result<Self, Error> {
        let header = FrameHeader::parse(r, streaminfo)?;
        Self::parse_body(r, header).map_err(Error::into_unexpected)
    }

    fn parse_body<R: Read>(r: &mut BitReader<R>, header: FrameHeader) -> Result<Self, Error> {
        let mut samples = ArrayVec::new();

        for channel in 0..header.channel_assignment.count() {
            let bps = header.bits_per_sample + header.channel_assignment.extra_bit(channel);
            let mut buf = vec![0; usize::from(header.block_size)];
            decode_subframe(r, bps, &mut buf)?;
            samples.push(buf);
        }

        decorrelate(header.channel_assignment, &mut samples);

        r.byte_align();
        let expected_crc16 = r.crc16();
        let stored_crc16 = r.read_bits(16)? as u16;
        r.disable_crc16();
        if stored_crc16 != expected_crc16 {
            return Err(Error::Crc16Mismatch);
        }

        Ok(Self { header, samples })
    }
}

// Reads the frame's UTF-8-style coded number: a frame number of at
// most 31 bits for fixed blocking, or a sample number of at most
// 36 bits for variable blocking.
fn read_coded_number<R: Read>(
    r: &mut BitReader<R>,
    blocking_strategy: BlockingStrategy,
) -> Result<u64, Error> {
    let b0 = r.read_bits(8)? as u8;

    let extra = match b0.leading_ones() {
        0 => return Ok(u64::from(b0)),
        1 => return Err(Error::InvalidFrameNumber),
        n @ 2..=7 => n - 1,
        _ => return Err(Error::InvalidFrameNumber),
    };

    let max_extra = match blocking_strategy {
        BlockingStrategy::Fixed => 5,
        BlockingStrategy::Variable => 6,
    };
    if extra > max_extra {
        return Err(Error::InvalidFrameNumber);
    }

    let mut number = u64::from(b0) & (0xFF >> (extra + 2));
    for _ in 0..extra {
        let b = r.read_bits(8)? as u8;
        if b & 0b1100_0000 != 0b1000_0000 {
            return Err(Error::InvalidFrameNumber);
        }
        number = number << 6 | u64::from(b & 0b0011_1111);
    }

    Ok(number)
}

/// A subframe header
#[derive(Debug)]
struct SubframeHeader {
    /// The subframe's type
    type_: SubframeHeaderType,
    /// The number of wasted bits-per-sample
    wasted_bps: u32,
}

impl SubframeHeader {
    fn parse<R: Read>(r: &mut BitReader<R>) -> Result<Self, Error> {
        if r.read_bits(1)? != 0 {
            return Err(Error::InvalidSubframeHeader);
        }
        Ok(Self {
            type_: match r.read_bits(6)? as u8 {
                0b000000 => SubframeHeaderType::Constant,
                0b000001 => SubframeHeaderType::Verbatim,
                0b001000 => SubframeHeaderType::Fixed(&[]),
                0b001001 => SubframeHeaderType::Fixed(&[1]),
                0b001010 => SubframeHeaderType::Fixed(&[2, -1]),
                0b001011 => SubframeHeaderType::Fixed(&[3, -3, 1]),
                0b001100 => SubframeHeaderType::Fixed(&[4, -6, 4, -1]),
                v @ 0b100000..=0b111111 => {
                    SubframeHeaderType::Lpc(NonZero::new(v - 31).unwrap())
                }
                _ => return Err(Error::InvalidSubframeHeaderType),
            },
            wasted_bps: match r.read_bits(1)? {
                0 => 0,
                _ => r.read_unary()? as u32 + 1,
            },
        })
    }
}

/// A subframe header's type
#[derive(Debug)]
enum SubframeHeaderType {
    /// All samples are the same
    Constant,
    /// All samples are stored verbatim, without compression
    Verbatim,
    /// Samples are stored with one of a set of fixed LPC parameters
    Fixed(&'static [i64]),
    /// Samples are stored with dynamic LPC parameters
    Lpc(NonZero<u8>),
}

// Decodes one channel's subframe into `buf`, whose length is the
// frame's block size.
fn decode_subframe<R: Read>(
    r: &mut BitReader<R>,
    bits_per_sample: u32,
    buf: &mut [i32],
) -> Result<(), Error> {
    let header = SubframeHeader::parse(r)?;

    let bps = bits_per_sample
        .checked_sub(header.wasted_bps)
        .filter(|bps| *bps > 0)
        .ok_or(Error::ExcessiveWastedBits)?;

    match header.type_ {
        SubframeHeaderType::Constant => {
            let sample = read_signed(r, bps)?;
            buf.fill(sample);
        }
        SubframeHeaderType::Verbatim => {
            for sample in buf.iter_mut() {
                *sample = read_signed(r, bps)?;
            }
        }
        SubframeHeaderType::Fixed(coefficients) => {
            let order = coefficients.len();
            if order > buf.len() {
                return Err(Error::InvalidSubframeHeader);
            }
            for sample in buf[..order].iter_mut() {
                *sample = read_signed(r, bps)?;
            }
            decode_residual(r, buf, order)?;
            predict(coefficients, 0, buf);
        }
        SubframeHeaderType::Lpc(order) => {
            let order = usize::from(order.get());
            if order > buf.len() {
                return Err(Error::InvalidSubframeHeader);
            }
            for sample in buf[..order].iter_mut() {
                *sample = read_signed(r, bps)?;
            }

            let precision = r.read_bits(4)? as u32 + 1;
            if precision == 16 {
                return Err(Error::InvalidLpcParameter);
            }
            let shift = read_signed(r, 5)?;
            if shift < 0 {
                return Err(Error::InvalidLpcParameter);
            }

            let mut coefficients = [0_i64; 32];
            for coefficient in coefficients[..order].iter_mut() {
                *coefficient = i64::from(read_signed(r, precision)?);
            }

            decode_residual(r, buf, order)?;
            predict(&coefficients[..order], shift as u32, buf);
        }
    }

    if header.wasted_bps > 0 {
        for sample in buf.iter_mut() {
            *sample <<= header.wasted_bps;
        }
    }

    Ok(())
}

// Decodes the partitioned-Rice residual for a subframe of the given
// predictor order into `buf[order..]`.
fn decode_residual<R: Read>(
    r: &mut BitReader<R>,
    buf: &mut [i32],
    order: usize,
) -> Result<(), Error> {
    let parameter_bits = match r.read_bits(2)? {
        0b00 => 4,
        0b01 => 5,
        _ => return Err(Error::InvalidRicePartition),
    };
    let escape = (1 << parameter_bits) - 1;

    let partition_order = r.read_bits(4)? as u32;
    let partitions = 1_usize << partition_order;
    if buf.len() % partitions != 0 {
        return Err(Error::InvalidRicePartition);
    }
    let partition_len = buf.len() >> partition_order;
    if partition_len < order {
        return Err(Error::InvalidRicePartition);
    }

    let mut index = order;
    for partition in 0..partitions {
        let parameter = r.read_bits(parameter_bits)?;
        let count = match partition {
            0 => partition_len - order,
            _ => partition_len,
        };

        if parameter == escape {
            // escaped partition: residuals in raw two's complement
            let bits = r.read_bits(5)? as u32;
            for _ in 0..count {
                buf[index] = read_signed(r, bits)?;
                index += 1;
            }
        } else {
            for _ in 0..count {
                buf[index] = r.read_rice(parameter as u32)?;
                index += 1;
            }
        }
    }

    Ok(())
}

// Applies the predictor in-place: each sample past the warm-up gets
// the shifted dot product of the coefficients and its predecessors.
fn predict(coefficients: &[i64], shift: u32, buf: &mut [i32]) {
    for i in coefficients.len()..buf.len() {
        let predicted: i64 = coefficients
            .iter()
            .enumerate()
            .map(|(j, c)| c * i64::from(buf[i - 1 - j]))
            .sum();
        buf[i] = buf[i].wrapping_add((predicted >> shift) as i32);
    }
}

// Converts decorrelated stereo channels to independent left/right.
fn decorrelate(channel_assignment: ChannelAssignment, samples: &mut [Vec<i32>]) {
    match channel_assignment {
        ChannelAssignment::Independent(_) => {}
        ChannelAssignment::LeftSide => {
            if let [left, side] = samples {
                for (l, s) in left.iter().zip(side.iter_mut()) {
                    // side = left - right, so right = left - side
                    *s = l.wrapping_sub(*s);
                }
            }
        }
        ChannelAssignment::SideRight => {
            if let [side, right] = samples {
                for (s, r) in side.iter_mut().zip(right.iter()) {
                    // side = left - right, so left = side + right
                    *s = s.wrapping_add(*r);
                }
            }
        }
        ChannelAssignment::MidSide => {
            if let [mid, side] = samples {
                for (m, s) in mid.iter_mut().zip(side.iter_mut()) {
                    // double mid, then correct for the truncation that
                    // occurred if side is odd
                    let side_sample = *s;
                    let mid_sample = m.wrapping_mul(2) | (side_sample & 1);
                    *m = mid_sample.wrapping_add(side_sample) >> 1;
                    *s = mid_sample.wrapping_sub(side_sample) >> 1;
                }
            }
        }
    }
}

// Reads a two's complement signed value of the given width.
fn read_signed<R: Read>(r: &mut BitReader<R>, bits: u32) -> Result<i32, Error> {
    if bits == 0 {
        return Ok(0);
    } else if bits > 32 {
        return Err(Error::InvalidBitsPerSample);
    }
    let value = r.read_bits(bits)? as u32;
    Ok((value << (32 - bits)) as i32 >> (32 - bits))
}
