use std::path::PathBuf;

use geolesson::grid::{GRID_DIVISIONS, annotate_grid, grid_positions};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("geolesson-tests").join(name);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn grid_lines_tint_a_white_image() {
    let dir = scratch_dir("grid_lines");
    let src = dir.join("white.png");
    let dst = dir.join("white_grid.png");
    image::RgbImage::from_pixel(200, 100, image::Rgb([255, 255, 255]))
        .save(&src)
        .unwrap();

    let dims = annotate_grid(&src, &dst, None).unwrap();
    assert_eq!(dims, (200, 100));

    let out = image::open(&dst).unwrap().to_rgb8();
    assert_eq!(out.dimensions(), (200, 100));

    // Vertical line at x = 100, well below the labels.
    let on_line = out.get_pixel(100, 75).0;
    assert_eq!(on_line[0], 255);
    assert!(on_line[1] < 160 && on_line[2] < 160, "{on_line:?}");

    // Between lines and away from the label margins.
    assert_eq!(out.get_pixel(150, 75).0, [255, 255, 255]);
}

#[test]
fn last_gridline_stays_inside_the_image() {
    let xs = grid_positions(200);
    assert_eq!(xs.len() as u32, GRID_DIVISIONS + 1);
    assert_eq!(xs.first(), Some(&0));
    assert_eq!(xs.last(), Some(&199));
}

#[test]
fn jpeg_output_keeps_dimensions() {
    let dir = scratch_dir("grid_jpeg");
    let src = dir.join("photo.png");
    let dst = dir.join("photo_grid.jpg");
    image::RgbImage::from_pixel(333, 257, image::Rgb([40, 90, 200]))
        .save(&src)
        .unwrap();
    annotate_grid(&src, &dst, None).unwrap();
    let out = image::open(&dst).unwrap();
    assert_eq!((out.width(), out.height()), (333, 257));
}

#[test]
fn missing_source_is_an_input_error() {
    let dir = scratch_dir("grid_missing");
    let err = annotate_grid(&dir.join("absent.png"), &dir.join("out.png"), None).unwrap_err();
    assert!(matches!(err, geolesson::GeoError::Input(_)));
}
