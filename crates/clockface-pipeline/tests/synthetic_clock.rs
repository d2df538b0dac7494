//! Integration test: read synthetic clock faces through the full image pipeline.
//!
//! A drawn stroke has two edges, so line detection reports each hand as a
//! pair of parallel segments and the runner-up is usually the minute hand's
//! other flank. These tests therefore only pin down the minute reading.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use clockface_pipeline::{
    Circle, FaceSource, GrayImage, PipelineConfig, UNESTIMABLE_MESSAGE, estimate, estimate_gray,
};
use image::Luma;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_circle_mut};
use imageproc::rect::Rect;

const SIZE: u32 = 360;
const CENTER: (i32, i32) = (180, 180);

/// White dial with a 3 px black rim of radius 150 and two filled hands.
fn clock(minute_hand: Rect, hour_hand: Rect) -> GrayImage {
    let mut img = GrayImage::from_pixel(SIZE, SIZE, Luma([255]));
    for r in 149..=151 {
        draw_hollow_circle_mut(&mut img, CENTER, r, Luma([0]));
    }
    draw_filled_rect_mut(&mut img, minute_hand, Luma([0]));
    draw_filled_rect_mut(&mut img, hour_hand, Luma([0]));
    img
}

fn minute_of(img: &GrayImage) -> u8 {
    let estimate = estimate_gray(img, &PipelineConfig::default()).unwrap();
    eprintln!(
        "face {:?} ({:?}), {} segments, reading {estimate}",
        estimate.face,
        estimate.face_source,
        estimate.segments.len(),
    );
    estimate.time.expect("hands should be detected").minute
}

fn png_bytes(img: &GrayImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::L8,
    )
    .unwrap();
    buf
}

#[test]
fn minute_hand_at_three() {
    let img = clock(
        Rect::at(180, 179).of_size(110, 3),
        Rect::at(179, 110).of_size(3, 70),
    );
    assert_eq!(minute_of(&img), 15);
}

#[test]
fn minute_hand_at_nine() {
    let img = clock(
        Rect::at(71, 179).of_size(110, 3),
        Rect::at(179, 110).of_size(3, 70),
    );
    assert_eq!(minute_of(&img), 45);
}

#[test]
fn minute_hand_at_six() {
    let img = clock(
        Rect::at(179, 180).of_size(3, 110),
        Rect::at(180, 179).of_size(60, 3),
    );
    assert_eq!(minute_of(&img), 30);
}

#[test]
fn encoded_clock_reads_the_same() {
    let img = clock(
        Rect::at(180, 179).of_size(110, 3),
        Rect::at(179, 110).of_size(3, 70),
    );
    let from_bytes = estimate(&png_bytes(&img), &PipelineConfig::default()).unwrap();
    let from_gray = estimate_gray(&img, &PipelineConfig::default()).unwrap();
    assert_eq!(from_bytes, from_gray);
}

#[test]
fn all_white_image_is_unestimable() {
    let img = GrayImage::from_pixel(200, 150, Luma([255]));
    let estimate = estimate(&png_bytes(&img), &PipelineConfig::default()).unwrap();
    assert!(estimate.time.is_none());
    assert_eq!(estimate.face_source, FaceSource::Defaulted);
    assert_eq!(estimate.face, Circle::fallback(200, 150));
    assert_eq!(estimate.to_string(), UNESTIMABLE_MESSAGE);
}
