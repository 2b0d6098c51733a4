mod common;

use std::fs;

use common::init_logging;
use common::synthetic_image::{solid_bgr, square_on_black, two_squares_on_black};
use image::{DynamicImage, ImageFormat};
use pharm_drone::batch::{generate_palette, locate_batch};
use pharm_drone::color::rgb_image_from_bgr;
use pharm_drone::{
    build_palette, locate_flowers_bytes, Config, DetectionConfig, FlowerLocator, HsvPolar,
    Palette, PaletteConfig, PaletteEntry, PipelineError,
};

const RED: [u8; 3] = [255, 0, 0];

fn red_palette() -> Palette {
    Palette::new(vec![PaletteEntry::new(
        HsvPolar::new(0.0, 100.0, 100.0),
        HsvPolar::new(0.0, 0.0, 0.0),
    )
    .unwrap()])
    .unwrap()
}

fn hue_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

#[test]
fn red_training_image_yields_single_red_entry() {
    init_logging();
    let rgb = rgb_image_from_bgr(5, 5, 3, &solid_bgr(5, 5, [0, 0, 255])).unwrap();
    let palette = build_palette(&[DynamicImage::ImageRgb8(rgb)], &PaletteConfig::default()).unwrap();

    assert_eq!(palette.len(), 1);
    let entry = &palette.entries()[0];
    assert!(hue_distance(entry.mean.h, 0.0) < 1e-6, "hue {}", entry.mean.h);
    assert!((entry.mean.s - 100.0).abs() < 1e-6);
    assert!((entry.mean.v - 100.0).abs() < 1e-6);
    for std in entry.std_dev.channels() {
        assert!(std.abs() < 1e-9, "std {std}");
    }
}

#[test]
fn red_square_on_black_gives_one_enclosing_contour() {
    init_logging();
    let image = DynamicImage::ImageRgb8(square_on_black(40, 15, 15, 10, RED));
    let palette = red_palette();
    let locator = FlowerLocator::new(&palette, DetectionConfig::default());

    let detection = locator.locate(&image).unwrap();

    assert_eq!(detection.contours.len(), 1);
    let (min_x, min_y, max_x, max_y) = detection.contours[0].bounding_box().unwrap();
    assert!(min_x <= 15 && min_y <= 15, "box starts at ({min_x}, {min_y})");
    assert!(max_x >= 24 && max_y >= 24, "box ends at ({max_x}, {max_y})");
    assert_eq!(detection.annotated.dimensions(), (40, 40));
}

#[test]
fn separated_squares_stay_separate() {
    init_logging();
    let image = DynamicImage::ImageRgb8(two_squares_on_black(RED));
    let palette = red_palette();

    let detection = pharm_drone::detect::locate_flowers(&image, &palette, &DetectionConfig::default()).unwrap();

    assert_eq!(detection.contours.len(), 2);
}

#[test]
fn image_without_palette_colors_has_no_contours() {
    init_logging();
    let image = DynamicImage::ImageRgb8(square_on_black(40, 15, 15, 10, [0, 0, 255]));
    let palette = red_palette();

    let detection = pharm_drone::detect::locate_flowers(&image, &palette, &DetectionConfig::default()).unwrap();

    assert!(detection.contours.is_empty());
    assert_eq!(detection.annotated, image.to_rgb8());
}

#[test]
fn learned_palette_detects_its_own_color() {
    init_logging();
    let training = DynamicImage::ImageRgb8(square_on_black(5, 0, 0, 5, RED));
    let palette = build_palette(&[training], &PaletteConfig::default()).unwrap();

    let scene = DynamicImage::ImageRgb8(square_on_black(40, 15, 15, 10, RED));
    let detection = pharm_drone::detect::locate_flowers(&scene, &palette, &DetectionConfig::default()).unwrap();

    assert_eq!(detection.contours.len(), 1);
}

#[test]
fn encoded_entry_points_round_trip_png() {
    init_logging();
    let mut png = Vec::new();
    DynamicImage::ImageRgb8(square_on_black(40, 15, 15, 10, RED))
        .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();

    let palette = pharm_drone::generate_palette_bytes(&[png.clone()], &PaletteConfig::default()).unwrap();
    assert!(!palette.is_empty());

    let (annotated, contours) = locate_flowers_bytes(&png, &red_palette(), &DetectionConfig::default()).unwrap();
    assert_eq!(contours, 1);
    let decoded = image::load_from_memory(&annotated).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (40, 40));
}

#[test]
fn grayscale_input_is_rejected() {
    let gray = DynamicImage::ImageLuma8(image::GrayImage::new(8, 8));
    let err = FlowerLocator::new(&red_palette(), DetectionConfig::default())
        .locate(&gray)
        .unwrap_err();
    assert!(matches!(err, PipelineError::ChannelCount { found: 1 }));
}

#[test]
fn batch_keeps_going_past_a_bad_file() {
    init_logging();
    let dir = std::env::temp_dir().join(format!("pharm_drone_batch_{}", std::process::id()));
    let input_dir = dir.join("in");
    let out_dir = dir.join("out");
    fs::create_dir_all(&input_dir).unwrap();

    let good = input_dir.join("field.png");
    square_on_black(40, 15, 15, 10, RED).save(&good).unwrap();
    let bad = input_dir.join("broken.png");
    fs::write(&bad, b"not an image").unwrap();

    let config = Config::default();
    let palette = generate_palette(std::slice::from_ref(&good), &config.palette, Some(2)).unwrap();
    assert!(!palette.is_empty());

    let outcomes = locate_batch(&[bad.clone(), good.clone()], &red_palette(), &config.detection, &out_dir, Some(2)).unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].input, bad);
    assert!(matches!(outcomes[0].result, Err(PipelineError::Input { .. })));
    let located = outcomes[1].result.as_ref().unwrap();
    assert_eq!(located.contours, 1);
    assert_eq!(located.output, out_dir.join("field.png"));
    assert!(located.output.exists());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn zero_threads_is_invalid() {
    let err = generate_palette(&[], &PaletteConfig::default(), Some(0)).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidParameter { .. }));
}

#[test]
fn colliding_output_names_fail_without_writing() {
    init_logging();
    let dir = std::env::temp_dir().join(format!("pharm_drone_collide_{}", std::process::id()));
    let north = dir.join("north").join("plot.png");
    let south = dir.join("south").join("plot.png");
    let other = dir.join("south").join("edge.png");
    let out_dir = dir.join("out");
    for path in [&north, &south, &other] {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        square_on_black(40, 15, 15, 10, RED).save(path).unwrap();
    }

    let outcomes = locate_batch(
        &[north.clone(), south.clone(), other.clone()],
        &red_palette(),
        &DetectionConfig::default(),
        &out_dir,
        Some(2),
    )
    .unwrap();

    for outcome in &outcomes[..2] {
        match &outcome.result {
            Err(PipelineError::Input { source, .. }) => {
                assert!(matches!(**source, PipelineError::DuplicateOutput { .. }), "{source}")
            }
            other => panic!("expected a collision error, got {other:?}"),
        }
    }
    assert!(!out_dir.join("plot.png").exists());
    assert_eq!(outcomes[2].result.as_ref().unwrap().contours, 1);

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn palette_file_without_entries_is_rejected() {
    let dir = std::env::temp_dir().join(format!("pharm_drone_empty_palette_{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("palette.csv");
    fs::write(&path, "m0,m1,m2,std0,std1,std2\n").unwrap();

    let result = Palette::load(&path);
    let _ = fs::remove_dir_all(dir);

    assert!(matches!(result, Err(PipelineError::EmptyPalette)));
}

#[test]
fn batch_rejects_invalid_detection_config_up_front() {
    let mut config = DetectionConfig::default();
    config.edges.blur_kernel = 4;
    let out_dir = std::env::temp_dir().join(format!("pharm_drone_bad_config_{}", std::process::id()));

    let err = locate_batch(&[], &red_palette(), &config, &out_dir, None).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidParameter { .. }));
    assert!(!out_dir.exists());
}
