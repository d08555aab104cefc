mod common;

use common::*;
use flac_stream::Error;
use flac_stream::metadata::{Block, SeekPoint};
use flac_stream::stream::Stream;
use std::io::Cursor;

fn open_full_with(extra: &[(u8, Vec<u8>)]) -> Result<Stream<Cursor<Vec<u8>>>, Error> {
    let spec = StreamSpec::mono(256, 256);
    let flac = build_flac(&spec, extra, &ramp_frames(1, 256, 1));
    Stream::open_full(Cursor::new(flac))
}

#[test]
fn test_streaminfo_fields() {
    let spec = StreamSpec {
        block_size: 1152,
        sample_rate: 96000,
        channels: 6,
        total_samples: (1 << 36) - 1,
    };
    let flac = build_flac(&spec, &[], &[]);

    let stream = Stream::open_lazy(Cursor::new(flac)).unwrap();
    let info = stream.info();
    assert_eq!(info.minimum_block_size, 1152);
    assert_eq!(info.maximum_block_size, 1152);
    assert_eq!(info.minimum_frame_size, None);
    assert_eq!(info.maximum_frame_size, None);
    assert_eq!(info.sample_rate, 96000);
    assert_eq!(info.channels.get(), 6);
    assert_eq!(info.bits_per_sample, 16);
    assert_eq!(info.total_samples.map(|s| s.get()), Some((1 << 36) - 1));
}

#[test]
fn test_invalid_streaminfo() {
    // zero out the sample rate inside an otherwise valid block
    let spec = StreamSpec::mono(256, 256);
    let mut flac = build_flac(&spec, &[], &[]);
    // sample rate occupies the 20 bits after 4 + 4 + 10 body bytes
    flac[18] = 0;
    flac[19] = 0;
    flac[20] &= 0x0F;

    assert!(matches!(
        Stream::open_lazy(Cursor::new(flac)),
        Err(Error::InvalidStreaminfo)
    ));
}

#[test]
fn test_seek_table_block() {
    let points = [
        (0, 0, 256),
        (1024, 2084, 256),
        (2048, 4168, 256),
        (u64::MAX, 0, 0),
    ];
    let stream = open_full_with(&[(3, seek_table_body(&points))]).unwrap();

    match &stream.blocks()[0] {
        Block::SeekTable(table) => {
            assert_eq!(table.points.len(), 4);
            assert_eq!(
                table.points[1],
                SeekPoint::Defined {
                    sample_offset: 1024,
                    byte_offset: 2084,
                    frame_samples: 256,
                }
            );
            assert_eq!(table.points[3], SeekPoint::Placeholder);
        }
        block => panic!("expected SEEKTABLE block, got {block:?}"),
    }
}

#[test]
fn test_seek_table_rejects_bad_sizes() {
    // 19 bytes is not a whole number of 18-byte points
    assert!(matches!(
        open_full_with(&[(3, vec![0; 19])]),
        Err(Error::InvalidSeekTableSize)
    ));
}

#[test]
fn test_seek_table_rejects_bad_ordering() {
    // sample offsets must strictly increase
    let body = seek_table_body(&[(1024, 0, 256), (1024, 2084, 256)]);
    assert!(matches!(
        open_full_with(&[(3, body)]),
        Err(Error::InvalidSeekTablePoint)
    ));

    // byte offsets must strictly increase too
    let body = seek_table_body(&[(0, 100, 256), (1024, 100, 256)]);
    assert!(matches!(
        open_full_with(&[(3, body)]),
        Err(Error::InvalidSeekTablePoint)
    ));

    // defined points cannot follow placeholders
    let body = seek_table_body(&[(0, 0, 256), (u64::MAX, 0, 0), (1024, 2084, 256)]);
    assert!(matches!(
        open_full_with(&[(3, body)]),
        Err(Error::InvalidSeekTablePoint)
    ));
}

#[test]
fn test_vorbis_comment_block() {
    let body = vorbis_comment_body(
        "reference libFLAC 1.4.3 20230623",
        &["TITLE=Testing", "ARTIST=Someone", "artist=Someone Else"],
    );
    let stream = open_full_with(&[(4, body)]).unwrap();

    match &stream.blocks()[0] {
        Block::VorbisComment(comment) => {
            assert_eq!(comment.vendor_string, "reference libFLAC 1.4.3 20230623");
            assert_eq!(comment.fields.len(), 3);
            assert_eq!(comment.get("TITLE"), Some("Testing"));
            // first match wins, case-insensitively
            assert_eq!(comment.get("Artist"), Some("Someone"));
            assert_eq!(comment.get("ALBUM"), None);
        }
        block => panic!("expected VORBIS_COMMENT block, got {block:?}"),
    }
}

#[test]
fn test_vorbis_comment_rejects_oversized_lengths() {
    // the vendor string claims more bytes than the block holds;
    // nothing should be allocated for it
    let mut body = 0xFFFF_FF00_u32.to_le_bytes().to_vec();
    body.extend_from_slice(b"tiny");
    assert!(matches!(
        open_full_with(&[(4, body)]),
        Err(Error::InvalidMetadataBlockSize)
    ));
}

#[test]
fn test_application_block() {
    let mut body = 0x61696666_u32.to_be_bytes().to_vec(); // "aiff"
    body.extend_from_slice(b"FORM");
    let stream = open_full_with(&[(2, body)]).unwrap();

    match &stream.blocks()[0] {
        Block::Application(application) => {
            assert_eq!(application.id, 0x61696666);
            assert_eq!(application.data, b"FORM");
        }
        block => panic!("expected APPLICATION block, got {block:?}"),
    }

    // a body too short to hold even its ID
    assert!(matches!(
        open_full_with(&[(2, vec![0; 3])]),
        Err(Error::InsufficientApplicationBlock)
    ));
}

#[test]
fn test_padding_block() {
    let stream = open_full_with(&[(1, vec![0; 4096])]).unwrap();
    match &stream.blocks()[0] {
        Block::Padding(padding) => assert_eq!(padding.length, 4096),
        block => panic!("expected PADDING block, got {block:?}"),
    }
}

#[test]
fn test_picture_block() {
    let image = b"\x89PNG\r\n\x1a\nrest of a fake image";

    let mut body = 3_u32.to_be_bytes().to_vec(); // front cover
    body.extend_from_slice(&9_u32.to_be_bytes());
    body.extend_from_slice(b"image/png");
    body.extend_from_slice(&("cover art ♥".len() as u32).to_be_bytes());
    body.extend_from_slice("cover art ♥".as_bytes());
    body.extend_from_slice(&32_u32.to_be_bytes()); // width
    body.extend_from_slice(&32_u32.to_be_bytes()); // height
    body.extend_from_slice(&24_u32.to_be_bytes()); // depth
    body.extend_from_slice(&0_u32.to_be_bytes()); // not indexed
    body.extend_from_slice(&(image.len() as u32).to_be_bytes());
    body.extend_from_slice(image);

    let stream = open_full_with(&[(6, body)]).unwrap();
    match &stream.blocks()[0] {
        Block::Picture(picture) => {
            assert_eq!(picture.picture_type, 3);
            assert_eq!(picture.media_type, "image/png");
            assert_eq!(picture.description, "cover art ♥");
            assert_eq!(picture.width, 32);
            assert_eq!(picture.height, 32);
            assert_eq!(picture.color_depth, 24);
            assert_eq!(picture.colors_used, 0);
            assert_eq!(picture.data, image);
        }
        block => panic!("expected PICTURE block, got {block:?}"),
    }
}

#[test]
fn test_picture_rejects_oversized_data_length() {
    let mut body = 3_u32.to_be_bytes().to_vec();
    body.extend_from_slice(&0_u32.to_be_bytes()); // empty MIME type
    body.extend_from_slice(&0_u32.to_be_bytes()); // empty description
    body.extend_from_slice(&[0; 16]); // dimensions
    body.extend_from_slice(&0x00FF_FFFF_u32.to_be_bytes()); // data length
    body.extend_from_slice(b"short");

    assert!(matches!(
        open_full_with(&[(6, body)]),
        Err(Error::InvalidMetadataBlockSize)
    ));
}

#[test]
fn test_cuesheet_block() {
    let mut body = Vec::new();

    let mut catalog = [0_u8; 128];
    catalog[..13].copy_from_slice(b"1234567890123");
    body.extend_from_slice(&catalog);
    body.extend_from_slice(&88200_u64.to_be_bytes()); // lead-in
    body.push(0x80); // CD-DA flag, reserved bits zero
    body.extend_from_slice(&[0; 258]);
    body.push(2); // two tracks

    // track 1: audio, one index point
    body.extend_from_slice(&0_u64.to_be_bytes());
    body.push(1);
    body.extend_from_slice(b"USRC17607839");
    body.push(0x00);
    body.extend_from_slice(&[0; 13]);
    body.push(1);
    body.extend_from_slice(&0_u64.to_be_bytes());
    body.push(1);
    body.extend_from_slice(&[0; 3]);

    // lead-out track: no index points, no ISRC
    body.extend_from_slice(&176400_u64.to_be_bytes());
    body.push(170);
    body.extend_from_slice(&[0; 12]);
    body.push(0x00);
    body.extend_from_slice(&[0; 13]);
    body.push(0);

    let stream = open_full_with(&[(5, body)]).unwrap();
    match &stream.blocks()[0] {
        Block::Cuesheet(cuesheet) => {
            assert_eq!(cuesheet.catalog_number, "1234567890123");
            assert_eq!(cuesheet.lead_in_samples, 88200);
            assert!(cuesheet.is_cdda);
            assert_eq!(cuesheet.tracks.len(), 2);

            let track = &cuesheet.tracks[0];
            assert_eq!(track.offset, 0);
            assert_eq!(track.number, 1);
            assert_eq!(track.isrc.as_ref().map(|i| &i[..]), Some(&b"USRC17607839"[..]));
            assert!(!track.non_audio);
            assert!(!track.pre_emphasis);
            assert_eq!(track.index_points.len(), 1);
            assert_eq!(track.index_points[0].offset, 0);
            assert_eq!(track.index_points[0].number, 1);

            let lead_out = &cuesheet.tracks[1];
            assert_eq!(lead_out.offset, 176400);
            assert_eq!(lead_out.number, 170);
            assert_eq!(lead_out.isrc, None);
            assert!(lead_out.index_points.is_empty());
        }
        block => panic!("expected CUESHEET block, got {block:?}"),
    }
}

#[test]
fn test_utf8_error_surfaces() {
    // a vendor string that is not valid UTF-8
    let mut body = 2_u32.to_le_bytes().to_vec();
    body.extend_from_slice(&[0xFF, 0xFE]);
    body.extend_from_slice(&0_u32.to_le_bytes());

    assert!(matches!(
        open_full_with(&[(4, body)]),
        Err(Error::Utf8(_))
    ));
}
