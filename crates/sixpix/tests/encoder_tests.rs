use pretty_assertions::assert_eq;
use sixpix::{encode_frame, sixel_decode, Bitmap, Palette, TransparencyMode};

fn bitmap_of(pixels: &[[u8; 4]], width: usize, height: usize) -> Bitmap {
    let raw: Vec<u8> = pixels.iter().flatten().copied().collect();
    Bitmap::new(raw, width, height).unwrap()
}

fn solid_row(rgba: [u8; 4], width: usize) -> Bitmap {
    bitmap_of(&vec![rgba; width], width, 1)
}

fn encode(bitmap: &Bitmap) -> String {
    let palette = Palette::from_bitmap(bitmap, TransparencyMode::None, None, None);
    encode_frame(bitmap, &palette, TransparencyMode::None).unwrap()
}

#[test]
fn two_by_two_scenario_string() {
    let bitmap = bitmap_of(
        &[
            [255, 0, 0, 255],
            [0, 255, 0, 255],
            [255, 0, 0, 255],
            [0, 255, 0, 255],
        ],
        2,
        2,
    );
    let sixel = encode(&bitmap);
    assert_eq!(
        sixel,
        "\x1bP7;0;q\"1;1;2;2#0;2;100;0;0#1;2;0;100;0#0B$#1?B\x1b\\"
    );
}

#[test]
fn repeat_wraps_at_255() {
    // Widths straddling the repeat-introducer limit
    for (width, expected_data) in [
        (255usize, "!255@"),
        (256, "!255@@"),
        (510, "!255@!255@"),
    ] {
        let sixel = encode(&solid_row([255, 0, 0, 255], width));
        let body = sixel
            .strip_prefix(&format!("\x1bP7;0;q\"1;1;{width};1#0;2;100;0;0#0"))
            .unwrap_or_else(|| panic!("unexpected prefix for width {width}: {sixel:?}"));
        assert_eq!(body.strip_suffix("\x1b\\").unwrap(), expected_data);

        let decoded = sixel_decode(sixel.as_bytes()).unwrap();
        assert_eq!(decoded.width, width, "decoded run length for {width}");
        assert_eq!(decoded.height, 1);
        assert!(decoded
            .pixels
            .chunks_exact(4)
            .all(|px| px == [255, 0, 0, 255]));
    }
}

#[test]
fn short_runs_stay_literal() {
    let sixel = encode(&solid_row([255, 0, 0, 255], 3));
    assert!(sixel.contains("#0@@@"), "runs up to 3 are literal: {sixel:?}");
    assert!(!sixel.contains('!'));
}

#[test]
fn encoding_is_deterministic() {
    let bitmap = bitmap_of(
        &[
            [10, 20, 30, 255],
            [40, 50, 60, 255],
            [10, 20, 30, 255],
            [70, 80, 90, 255],
        ],
        2,
        2,
    );
    assert_eq!(encode(&bitmap), encode(&bitmap));
}

#[test]
fn transparent_pixels_leave_gaps() {
    let bitmap = bitmap_of(&[[255, 0, 0, 255], [0, 0, 0, 0]], 2, 1);
    let palette = Palette::from_bitmap(&bitmap, TransparencyMode::Default, None, None);
    let sixel = encode_frame(&bitmap, &palette, TransparencyMode::Default).unwrap();
    assert!(sixel.starts_with("\x1bP7;1;q"), "transparent-capable header");
    // The transparent slot is defined (as black) but never painted
    assert!(sixel.contains("#1;2;0;0;0"));
    assert!(!sixel.contains('$'), "no second color pass: {sixel:?}");
}

#[test]
fn opaque_header_flag_requires_none_mode() {
    let bitmap = solid_row([255, 0, 0, 255], 2);
    let palette = Palette::from_bitmap(&bitmap, TransparencyMode::None, None, None);
    let sixel = encode_frame(&bitmap, &palette, TransparencyMode::None).unwrap();
    assert!(sixel.starts_with("\x1bP7;0;q"));
}

#[test]
fn tall_images_emit_band_separators() {
    // 1x12 column: two bands
    let bitmap = bitmap_of(&vec![[255, 0, 0, 255]; 12], 1, 12);
    let sixel = encode(&bitmap);
    assert_eq!(sixel.matches('-').count(), 1);
    let decoded = sixel_decode(sixel.as_bytes()).unwrap();
    assert_eq!((decoded.width, decoded.height), (1, 12));
}

#[test]
fn foreign_pixel_is_rejected_with_its_position() {
    let bitmap = bitmap_of(&[[255, 0, 0, 255], [1, 2, 3, 255]], 2, 1);
    let only_red = Palette::from_bitmap(
        &solid_row([255, 0, 0, 255], 1),
        TransparencyMode::Default,
        None,
        None,
    );
    let err = encode_frame(&bitmap, &only_red, TransparencyMode::Default).unwrap_err();
    match err {
        sixpix::SixelError::ColorNotInPalette { x, y } => assert_eq!((x, y), (1, 0)),
        other => panic!("unexpected error: {other}"),
    }
}
