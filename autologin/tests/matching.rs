//! End-to-end matching against a synthetic full-HD frame.

use autologin::{matcher, Frame, MatchResult, Point, Template};
use image::{GrayImage, Luma};

fn speckle(width: u32, height: u32, seed: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let mut v = x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663)
            ^ seed.wrapping_mul(83_492_791);
        v ^= v >> 13;
        v = v.wrapping_mul(0x5bd1_e995);
        v ^= v >> 15;
        Luma([v as u8])
    })
}

fn frame_from_gray(gray: &GrayImage) -> Frame {
    let mut data = Vec::with_capacity((gray.width() * gray.height() * 4) as usize);
    for p in gray.pixels() {
        data.extend_from_slice(&[p.0[0], p.0[0], p.0[0], 255]);
    }
    Frame::from_rgba(data, gray.width(), gray.height(), Point::new(0, 0))
}

#[test]
fn enter_game_button_is_located_in_a_full_hd_frame() {
    let button = speckle(120, 40, 42);
    let mut screen = speckle(1920, 1080, 7);
    for y in 0..button.height() {
        for x in 0..button.width() {
            screen.put_pixel(100 + x, 200 + y, *button.get_pixel(x, y));
        }
    }

    let template = Template::new("enter-game", button, 0.8).unwrap();
    let frame = frame_from_gray(&screen);

    match matcher::find(&frame, &template, 0.8) {
        MatchResult::Found { region, score } => {
            assert_eq!(region.top_left, Point::new(100, 200));
            assert_eq!(region.bottom_right, Point::new(220, 240));
            assert!(score >= 0.8, "score was {score}");
        }
        MatchResult::NotFound { score } => {
            panic!("embedded button not found, best score {score}");
        }
    }
}

#[test]
fn a_frame_without_the_button_stays_below_the_threshold() {
    let button = speckle(120, 40, 42);
    let screen = speckle(1920, 1080, 1234);

    let template = Template::new("enter-game", button, 0.8).unwrap();
    let frame = frame_from_gray(&screen);

    match matcher::find(&frame, &template, 0.8) {
        MatchResult::NotFound { score } => assert!(score < 0.8),
        MatchResult::Found { score, .. } => panic!("false positive with score {score}"),
    }
}
