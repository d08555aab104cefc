mod common;

use common::*;
use flac_stream::frame::{BlockingStrategy, ChannelAssignment};
use flac_stream::metadata::{Block, BlockType, Metadata};
use flac_stream::stream::Stream;
use flac_stream::Error;
use std::io::Cursor;
use std::num::NonZero;

#[test]
fn test_single_frame_mono() {
    let spec = StreamSpec::mono(4096, 4096);
    let frames = ramp_frames(1, 4096, 1);
    let flac = build_flac(&spec, &[], &frames);

    let mut stream = Stream::open_lazy(Cursor::new(flac)).unwrap();

    let info = stream.info();
    assert_eq!(info.channels, NonZero::new(1).unwrap());
    assert_eq!(info.bits_per_sample, 16);
    assert_eq!(info.sample_rate, 44100);
    assert_eq!(info.total_samples, NonZero::new(4096));
    assert_eq!(info.minimum_block_size, 4096);
    assert_eq!(info.maximum_block_size, 4096);
    assert_eq!(info.md5, None);

    let frame = stream.next_frame().unwrap();
    assert_eq!(frame.header.sample_number(), 0);
    assert_eq!(frame.header.block_size, 4096);
    assert_eq!(frame.header.blocking_strategy, BlockingStrategy::Fixed);
    assert_eq!(frame.header.sample_rate, 44100);
    assert_eq!(
        frame.header.channel_assignment,
        ChannelAssignment::Independent(1)
    );
    assert_eq!(frame.samples.len(), 1);
    assert_eq!(frame.samples[0], frames[0][0]);

    assert!(matches!(stream.next_frame(), Err(Error::Eof)));
    assert_eq!(stream.samples_decoded(), 4096);
}

#[test]
fn test_multi_frame_stereo() {
    let spec = StreamSpec::stereo(256, 10 * 256);
    let frames = ramp_frames(10, 256, 2);
    let flac = build_flac(&spec, &[], &frames);

    let mut stream = Stream::open_lazy(Cursor::new(flac)).unwrap();

    for (number, expected) in frames.iter().enumerate() {
        let frame = stream.next_frame().unwrap();
        assert_eq!(frame.header.sample_number(), number as u64 * 256);
        assert_eq!(frame.samples.len(), 2);
        assert_eq!(frame.samples[0], expected[0]);
        assert_eq!(frame.samples[1], expected[1]);
    }

    assert!(matches!(stream.next_frame(), Err(Error::Eof)));
    assert!(matches!(stream.next_frame(), Err(Error::Eof)));
    assert_eq!(stream.samples_decoded(), 10 * 256);
}

#[test]
fn test_next_header() {
    let spec = StreamSpec::mono(4096, 4096);
    let flac = build_flac(&spec, &[], &ramp_frames(1, 4096, 1));

    let mut stream = Stream::open_lazy(Cursor::new(flac)).unwrap();
    let header = stream.next_header().unwrap();
    assert_eq!(header.block_size, 4096);
    assert_eq!(header.sample_number(), 0);
    assert_eq!(stream.samples_decoded(), 4096);
}

#[test]
fn test_id3v2_prefix() {
    let spec = StreamSpec::mono(192, 192);
    let flac = build_flac(&spec, &[], &ramp_frames(1, 192, 1));

    let mut stream = Stream::open_lazy(Cursor::new(with_id3_prefix(127, &flac))).unwrap();
    assert_eq!(stream.info().sample_rate, 44100);
    assert_eq!(stream.info().total_samples, NonZero::new(192));

    let frame = stream.next_frame().unwrap();
    assert_eq!(frame.header.block_size, 192);
    assert!(matches!(stream.next_frame(), Err(Error::Eof)));

    // an empty ID3 payload is equally tolerable
    let stream = Stream::open_lazy(Cursor::new(with_id3_prefix(0, &flac))).unwrap();
    assert_eq!(stream.info().total_samples, NonZero::new(192));
}

#[test]
fn test_channel_mismatch() {
    // STREAMINFO declares 2 channels but the frame encodes 1;
    // decoders allocating interleave buffers from STREAMINFO would
    // index out of bounds, so this must fail fast
    let spec = StreamSpec::stereo(256, 256);
    let frames = ramp_frames(1, 256, 1);
    let flac = build_flac(&spec, &[], &frames);

    let mut stream = Stream::open_lazy(Cursor::new(flac)).unwrap();
    assert!(matches!(stream.next_header(), Err(Error::ChannelsMismatch)));
}

#[test]
fn test_sample_count_overflow() {
    // STREAMINFO declares 1000 total samples but the first frame
    // already holds 1024
    let spec = StreamSpec::mono(1024, 1000);
    let flac = build_flac(&spec, &[], &ramp_frames(1, 1024, 1));

    let mut stream = Stream::open_lazy(Cursor::new(flac)).unwrap();
    assert!(matches!(
        stream.next_frame(),
        Err(Error::SampleCountOverflow)
    ));
}

#[test]
fn test_unknown_total_disables_overflow_check() {
    let spec = StreamSpec::mono(256, 0);
    let flac = build_flac(&spec, &[], &ramp_frames(3, 256, 1));

    let mut stream = Stream::open_lazy(Cursor::new(flac)).unwrap();
    assert_eq!(stream.info().total_samples, None);
    for _ in 0..3 {
        stream.next_frame().unwrap();
    }
    assert!(matches!(stream.next_frame(), Err(Error::Eof)));
    assert_eq!(stream.samples_decoded(), 3 * 256);
}

#[test]
fn test_missing_signature() {
    assert!(matches!(
        Stream::open_lazy(Cursor::new(b"fLaX0000".to_vec())),
        Err(Error::MissingFlacTag)
    ));

    // an ID3 tag must still be followed by a FLAC signature
    assert!(matches!(
        Stream::open_lazy(Cursor::new(with_id3_prefix(16, b"OggS\x00\x00\x00\x00"))),
        Err(Error::MissingFlacTag)
    ));
}

#[test]
fn test_missing_streaminfo() {
    // first metadata block is PADDING instead of STREAMINFO
    let mut flac = b"fLaC".to_vec();
    flac.extend(metadata_block(1, true, &[0; 16]));

    assert!(matches!(
        Stream::open_lazy(Cursor::new(flac)),
        Err(Error::MissingStreaminfo)
    ));
}

#[test]
fn test_open_full_collects_blocks() {
    let spec = StreamSpec::mono(256, 256);

    let mut application = 0x52494646_u32.to_be_bytes().to_vec();
    application.extend(b"chunk");

    let extra = vec![
        (1, vec![0; 32]), // PADDING
        (2, application),
        (
            4,
            vorbis_comment_body("test vendor", &["TITLE=Testing", "ALBUM=Test Album"]),
        ),
        (100, b"mystery bytes".to_vec()), // reserved type
    ];
    let flac = build_flac(&spec, &extra, &ramp_frames(1, 256, 1));

    let mut stream = Stream::open_full(Cursor::new(flac)).unwrap();

    let blocks = stream.blocks();
    assert_eq!(blocks.len(), 4);
    assert_eq!(blocks[0].block_type(), BlockType::Padding);

    match &blocks[1] {
        Block::Application(application) => {
            assert_eq!(application.id, 0x52494646);
            assert_eq!(application.data, b"chunk");
        }
        block => panic!("expected APPLICATION block, got {block:?}"),
    }

    match &blocks[2] {
        Block::VorbisComment(comment) => {
            assert_eq!(comment.vendor_string, "test vendor");
            assert_eq!(comment.get("title"), Some("Testing"));
            assert_eq!(comment.get("ALBUM"), Some("Test Album"));
            assert_eq!(comment.get("ARTIST"), None);
        }
        block => panic!("expected VORBIS_COMMENT block, got {block:?}"),
    }

    match &blocks[3] {
        Block::Reserved(reserved) => {
            assert_eq!(reserved.block_type, 100);
            assert_eq!(reserved.length, 13);
        }
        block => panic!("expected reserved block, got {block:?}"),
    }

    // the frames still follow
    let frame = stream.next_frame().unwrap();
    assert_eq!(frame.header.block_size, 256);
}

#[test]
fn test_metadata_accessors() {
    let spec = StreamSpec::stereo(4096, 44100 * 2);
    let flac = build_flac(&spec, &[], &[]);

    let stream = Stream::open_lazy(Cursor::new(flac)).unwrap();
    let info = stream.info();
    assert_eq!(info.channel_count(), 2);
    assert_eq!(info.bits_per_sample(), 16);
    assert_eq!(Metadata::total_samples(info), Some(44100 * 2));
    assert_eq!(info.duration(), Some(std::time::Duration::from_secs(2)));
    assert_eq!(Metadata::md5(info), None);
}

#[test]
fn test_invalid_block_type() {
    let spec = StreamSpec::mono(256, 256);
    let extra = vec![(127, vec![0; 4])];
    let flac = build_flac(&spec, &extra, &ramp_frames(1, 256, 1));

    // the full open refuses the forbidden type
    assert!(matches!(
        Stream::open_full(Cursor::new(flac.clone())),
        Err(Error::InvalidMetadataBlock)
    ));

    // the lazy open never dispatches on it and skips it like
    // anything else
    let mut stream = Stream::open_lazy(Cursor::new(flac)).unwrap();
    assert!(stream.next_frame().is_ok());
}

#[test]
fn test_truncated_metadata() {
    let spec = StreamSpec::mono(256, 256);
    let flac = build_flac(&spec, &[(1, vec![0; 64])], &[]);

    // cut inside the PADDING body
    assert!(matches!(
        Stream::open_lazy(Cursor::new(flac[..flac.len() - 32].to_vec())),
        Err(Error::UnexpectedEof)
    ));

    // cut at the block header boundary: still malformed, because
    // frames must follow the metadata
    let cut = 4 + 4 + 34;
    assert!(matches!(
        Stream::open_lazy(Cursor::new(flac[..cut].to_vec())),
        Err(Error::UnexpectedEof)
    ));
}

#[test]
fn test_truncated_frame() {
    let spec = StreamSpec::mono(256, 256);
    let flac = build_flac(&spec, &[], &ramp_frames(1, 256, 1));

    let mut stream = Stream::open_lazy(Cursor::new(flac[..flac.len() - 40].to_vec())).unwrap();
    assert!(matches!(stream.next_frame(), Err(Error::UnexpectedEof)));
}

#[test]
fn test_corrupt_frame_crc() {
    let spec = StreamSpec::mono(256, 256);
    let flac = build_flac(&spec, &[], &ramp_frames(1, 256, 1));

    // flip a bit in the subframe data; the footer CRC-16 must object
    let mut corrupt = flac.clone();
    let middle = (42 + flac.len()) / 2;
    corrupt[middle] ^= 0x01;

    let mut stream = Stream::open_lazy(Cursor::new(corrupt)).unwrap();
    assert!(matches!(stream.next_frame(), Err(Error::Crc16Mismatch)));
}

#[test]
fn test_random_corruption_is_caught() {
    let spec = StreamSpec::stereo(256, 5 * 256);
    let flac = build_flac(&spec, &[], &ramp_frames(5, 256, 2));

    // frame data starts after the signature and STREAMINFO block
    let frame_region = 4 + 4 + 34..flac.len();

    for _ in 0..100 {
        let mut corrupt = flac.clone();
        corrupt[fastrand::usize(frame_region.clone())] ^= 1 << fastrand::u32(0..8);

        let mut stream = Stream::open_lazy(Cursor::new(corrupt)).unwrap();
        let result = loop {
            match stream.next_frame() {
                Ok(_) => {}
                Err(Error::Eof) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        assert!(result.is_err());
    }
}

#[test]
fn test_into_inner() {
    let spec = StreamSpec::mono(192, 192);
    let flac = build_flac(&spec, &[], &ramp_frames(1, 192, 1));
    let len = flac.len() as u64;

    let mut stream = Stream::open_seekable(Cursor::new(flac)).unwrap();
    stream.next_frame().unwrap();

    let cursor = stream.into_inner();
    assert_eq!(cursor.get_ref().len() as u64, len);
}
