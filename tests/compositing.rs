use std::sync::Arc;

use image::{ImageEncoder, Rgba, RgbaImage};
use text_behind_image::layers::{TextPatch, Transform};
use text_behind_image::loader::ImageSource;
use text_behind_image::removal::{BackgroundRemover, RemovalOptions};
use text_behind_image::text::FontBook;
use text_behind_image::{
    CompositeWarning, Compositor, CompositorOptions, EditorState, RemovalError,
};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

fn png(img: &RgbaImage) -> Vec<u8> {
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
    out
}

fn solid(w: u32, h: u32, px: Rgba<u8>) -> ImageSource {
    ImageSource::from_bytes(png(&RgbaImage::from_pixel(w, h, px)))
}

/// 800x600, transparent except for an opaque green block over `x0..x1, y0..y1`.
fn cutout(x0: u32, x1: u32, y0: u32, y1: u32) -> ImageSource {
    let img = RgbaImage::from_fn(800, 600, |x, y| {
        if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
            GREEN
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    ImageSource::from_bytes(png(&img))
}

/// Resampled edges may be off by a rounding step.
fn assert_near(actual: &Rgba<u8>, expected: Rgba<u8>) {
    let close = actual
        .0
        .iter()
        .zip(expected.0)
        .all(|(a, e)| a.abs_diff(e) <= 2);
    assert!(close, "expected ~{expected:?}, got {actual:?}");
}

fn white_background() -> EditorState {
    EditorState::new().with_background(solid(800, 600, WHITE))
}

fn no_fonts() -> Compositor {
    Compositor::new(Arc::new(FontBook::empty()), CompositorOptions::default())
}

const TEST_FONT: &[u8] = include_bytes!("fonts/DejaVuSansMono.ttf");

fn bundled_font() -> Compositor {
    let mut fonts = FontBook::empty();
    fonts.load_font_data(TEST_FONT.to_vec());
    Compositor::new(Arc::new(fonts), CompositorOptions::default())
}

fn with_text(state: EditorState, text: &str, color: &str, font_size: f32) -> EditorState {
    let (id, state) = state.add_text();
    state
        .update_text(id, TextPatch::Text(text.into()))
        .update_text(id, TextPatch::Color(color.into()))
        .update_text(id, TextPatch::FontSize(font_size))
}

fn is_reddish(p: &Rgba<u8>) -> bool {
    p[0] > 128 && p[1] < 128 && p[2] < 128
}

async fn render(compositor: &Compositor, state: &EditorState) -> (RgbaImage, Vec<CompositeWarning>) {
    let composite = compositor
        .composite(state.composition_input().unwrap())
        .await
        .unwrap();
    let img = image::load_from_memory(&composite.artifact.png)
        .unwrap()
        .to_rgba8();
    assert_eq!(img.dimensions(), (composite.artifact.width, composite.artifact.height));
    (img, composite.warnings)
}

#[tokio::test]
async fn centred_text_is_drawn_around_canvas_centre() {
    let state = with_text(white_background(), "HI", "black", 40.0);
    let (img, warnings) = render(&bundled_font(), &state).await;
    assert!(warnings.is_empty(), "{warnings:?}");
    assert_eq!(img.dimensions(), (800, 600));

    let inked: Vec<(u32, u32)> = img
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] < 128)
        .map(|(x, y, _)| (x, y))
        .collect();
    assert!(!inked.is_empty());
    let (sx, sy) = inked
        .iter()
        .fold((0u64, 0u64), |(ax, ay), &(x, y)| (ax + x as u64, ay + y as u64));
    let cx = sx as f32 / inked.len() as f32;
    let cy = sy as f32 / inked.len() as f32;
    assert!((cx - 400.0).abs() < 40.0, "centroid x {cx}");
    assert!((cy - 300.0).abs() < 40.0, "centroid y {cy}");
    assert_eq!(img.get_pixel(5, 5), &WHITE);
}

#[tokio::test]
async fn later_text_is_drawn_over_earlier_text() {
    let state = with_text(white_background(), "HI", "red", 40.0);
    let state = with_text(state, "HI", "blue", 40.0);
    let (img, warnings) = render(&bundled_font(), &state).await;
    assert!(warnings.is_empty(), "{warnings:?}");
    assert!(img.pixels().all(|p| *p != RED));
    assert!(img.pixels().any(|p| p[2] > 200 && p[0] < 50));
}

#[tokio::test]
async fn text_sits_below_overlays_and_foreground() {
    // left half covered by the subject, blue overlay over 500..700 x 200..400
    let state = white_background().with_foreground(cutout(0, 400, 0, 600));
    let state = with_text(state, "HHHHHHHH", "red", 40.0);
    let (_, state) = state.add_overlay_cutout(
        solid(10, 10, BLUE),
        Transform {
            x: 75.0,
            scale: 0.5,
            ..Transform::default()
        },
    );
    let (img, warnings) = render(&bundled_font(), &state).await;
    assert!(warnings.is_empty(), "{warnings:?}");

    let under_subject = img
        .enumerate_pixels()
        .filter(|(x, _, p)| *x < 400 && is_reddish(p))
        .count();
    assert_eq!(under_subject, 0);
    let under_overlay = img
        .enumerate_pixels()
        .filter(|(x, y, p)| (502..698).contains(x) && (202..398).contains(y) && is_reddish(p))
        .count();
    assert_eq!(under_overlay, 0);
    assert_near(img.get_pixel(600, 300), BLUE);
    // the strip between the two still shows the text
    assert!(
        img.enumerate_pixels()
            .any(|(x, _, p)| (400..500).contains(&x) && is_reddish(p))
    );
}

#[tokio::test]
async fn huge_overlay_and_text_stay_within_bounds() {
    let state = with_text(white_background(), "HI", "black", 100_000.0);
    let (_, state) = state.add_overlay_cutout(
        solid(100, 100, RED),
        Transform {
            scale: 60.0,
            ..Transform::default()
        },
    );
    let (img, warnings) = render(&bundled_font(), &state).await;
    assert!(warnings.is_empty(), "{warnings:?}");
    assert_eq!(img.dimensions(), (800, 600));
    // the overlay covers the whole canvas and sits above the text
    for (x, y) in [(0, 0), (400, 300), (799, 599), (10, 590)] {
        assert_near(img.get_pixel(x, y), RED);
    }
}

#[tokio::test]
async fn overlay_is_half_canvas_wide_and_centred() {
    let (_, state) =
        white_background().add_overlay_cutout(solid(100, 100, RED), Transform::default());
    let (img, warnings) = render(&no_fonts(), &state).await;
    assert!(warnings.is_empty());
    // 400x400 centred on (400, 300)
    assert_near(img.get_pixel(400, 300), RED);
    assert_near(img.get_pixel(201, 101), RED);
    assert_near(img.get_pixel(598, 498), RED);
    assert_eq!(img.get_pixel(198, 300), &WHITE);
    assert_eq!(img.get_pixel(602, 300), &WHITE);
    assert_eq!(img.get_pixel(400, 98), &WHITE);
    assert_eq!(img.get_pixel(400, 502), &WHITE);
}

#[tokio::test]
async fn foreground_is_drawn_over_overlays() {
    let (_, state) = white_background()
        .with_foreground(cutout(350, 450, 250, 350))
        .add_overlay_cutout(solid(100, 100, RED), Transform::default());
    let (img, _) = render(&no_fonts(), &state).await;
    assert_eq!(img.get_pixel(400, 300), &GREEN);
    // overlay still visible where the cut-out is transparent
    assert_near(img.get_pixel(250, 300), RED);
    assert_eq!(img.get_pixel(10, 10), &WHITE);
}

#[tokio::test]
async fn overlay_opacity_does_not_leak_into_later_layers() {
    let faint = Transform {
        x: 25.0,
        opacity: 0.3,
        scale: 0.5,
        ..Transform::default()
    };
    let opaque = Transform {
        x: 75.0,
        opacity: 1.0,
        scale: 0.5,
        ..Transform::default()
    };
    let (_, state) = white_background()
        .with_foreground(cutout(10, 20, 10, 20))
        .add_overlay_cutout(solid(10, 10, RED), faint);
    let (_, state) = state.add_overlay_cutout(solid(10, 10, BLUE), opaque);
    let (img, _) = render(&no_fonts(), &state).await;

    let dimmed = img.get_pixel(200, 300);
    assert_eq!(dimmed[0], 255);
    assert!((170..=190).contains(&dimmed[1]), "{dimmed:?}");
    assert_near(img.get_pixel(600, 300), BLUE);
    assert_eq!(img.get_pixel(15, 15), &GREEN);
}

#[tokio::test]
async fn undecodable_overlay_is_skipped_with_warning() {
    let (bad, state) = white_background().add_overlay_cutout(
        ImageSource::from_bytes(b"not an image".to_vec()),
        Transform {
            x: 25.0,
            ..Transform::default()
        },
    );
    let (_, state) = state.add_overlay_cutout(
        solid(10, 10, RED),
        Transform {
            x: 75.0,
            scale: 0.5,
            ..Transform::default()
        },
    );
    let (img, warnings) = render(&no_fonts(), &state).await;
    match warnings.as_slice() {
        [CompositeWarning::OverlayDecode { id, .. }] => assert_eq!(*id, bad),
        other => panic!("unexpected warnings {other:?}"),
    }
    assert_near(img.get_pixel(600, 300), RED);
    assert_eq!(img.get_pixel(200, 300), &WHITE);
}

struct FailingRemover;

impl BackgroundRemover for FailingRemover {
    async fn remove_background(
        &self,
        _image: &[u8],
        _options: &RemovalOptions,
    ) -> Result<Vec<u8>, RemovalError> {
        Err(RemovalError::Other("segmentation model missing".into()))
    }
}

#[tokio::test]
async fn failed_setup_composites_without_foreground() {
    let state = white_background();
    let res = state
        .setup_image(&FailingRemover, &RemovalOptions::default())
        .await;
    assert!(res.is_err());
    assert!(!state.is_image_setup_done());

    let (_, state) = state.add_overlay_cutout(solid(10, 10, RED), Transform::default());
    let (img, warnings) = render(&no_fonts(), &state).await;
    assert!(warnings.is_empty());
    assert_near(img.get_pixel(400, 300), RED);
    assert_eq!(img.get_pixel(10, 10), &WHITE);
}

#[tokio::test]
async fn concurrent_composites_are_independent() {
    let compositor = no_fonts();
    let (_, red) = white_background().add_overlay_cutout(solid(4, 4, RED), Transform::default());
    let (_, blue) = white_background().add_overlay_cutout(solid(4, 4, BLUE), Transform::default());
    let (a, b) = tokio::join!(
        compositor.composite(red.composition_input().unwrap()),
        compositor.composite(blue.composition_input().unwrap()),
    );
    let a = image::load_from_memory(&a.unwrap().artifact.png).unwrap().to_rgba8();
    let b = image::load_from_memory(&b.unwrap().artifact.png).unwrap().to_rgba8();
    assert_near(a.get_pixel(400, 300), RED);
    assert_near(b.get_pixel(400, 300), BLUE);
}
