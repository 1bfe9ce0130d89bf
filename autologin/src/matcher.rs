//! Template localization by normalized cross-correlation.
//!
//! A sliding-window search scores every candidate position and the global
//! maximum wins. Scores are brightness/contrast invariant and clamped to
//! [0, 1]; anti-correlated windows score 0. Large frames are searched
//! coarse-to-fine: a decimated sweep finds the neighborhood, a
//! full-resolution pass around it settles the exact offset and score.

use image::{imageops, GrayImage};
use tracing::trace;

use crate::capture::Frame;
use crate::template::Template;
use crate::types::Region;

/// Outcome of a template search.
///
/// `Found` iff the best score reached the threshold used for the call; a
/// miss keeps the best observed score for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Found { region: Region, score: f64 },
    NotFound { score: f64 },
}

impl MatchResult {
    pub fn is_found(&self) -> bool {
        matches!(self, MatchResult::Found { .. })
    }

    pub fn score(&self) -> f64 {
        match self {
            MatchResult::Found { score, .. } | MatchResult::NotFound { score } => *score,
        }
    }
}

/// Decimate the haystack until its longest side fits this.
const COARSE_MAX_DIM: u32 = 480;
/// But never let the decimated needle shrink below this on its short side.
const COARSE_MIN_TEMPLATE: u32 = 8;
const MAX_DECIMATION: u32 = 8;
/// Full-resolution refinement window reaches this many decimation steps
/// around the coarse peak.
const REFINE_RADIUS_FACTOR: u32 = 4;

/// Locate `template` inside `frame`. The returned region is in frame
/// coordinates; callers add the frame origin to obtain screen coordinates.
///
/// Degenerate inputs (empty frame, empty or flat template, template larger
/// than the frame) yield `NotFound` with score 0 rather than an error.
/// Matching is deterministic: identical inputs give identical results.
pub fn find(frame: &Frame, template: &Template, threshold: f64) -> MatchResult {
    if frame.is_empty() {
        return MatchResult::NotFound { score: 0.0 };
    }
    let Some(haystack) = frame.to_luma() else {
        return MatchResult::NotFound { score: 0.0 };
    };
    find_in_gray(&haystack, template.image(), threshold)
}

pub(crate) fn find_in_gray(
    haystack: &GrayImage,
    needle: &GrayImage,
    threshold: f64,
) -> MatchResult {
    let (hw, hh) = haystack.dimensions();
    let (nw, nh) = needle.dimensions();
    if hw == 0 || hh == 0 || nw == 0 || nh == 0 || nw > hw || nh > hh {
        return MatchResult::NotFound { score: 0.0 };
    }

    let stats = NeedleStats::of(needle);
    if stats.den == 0 {
        // A flat template correlates with nothing in particular.
        return MatchResult::NotFound { score: 0.0 };
    }

    let factor = decimation(hw, hh, nw, nh);
    let best = if factor == 1 {
        best_in_window(haystack, needle, &stats, 0, hw - nw, 0, hh - nh)
    } else {
        coarse_then_refine(haystack, needle, &stats, factor)
    };

    trace!(
        x = best.x,
        y = best.y,
        score = best.score,
        threshold,
        "correlation maximum"
    );

    if best.score >= threshold {
        MatchResult::Found {
            region: Region::from_origin_size(best.x as i32, best.y as i32, nw, nh),
            score: best.score,
        }
    } else {
        MatchResult::NotFound { score: best.score }
    }
}

fn coarse_then_refine(
    haystack: &GrayImage,
    needle: &GrayImage,
    stats: &NeedleStats,
    factor: u32,
) -> BestMatch {
    let (hw, hh) = haystack.dimensions();
    let (nw, nh) = needle.dimensions();

    let coarse_hay = imageops::resize(
        haystack,
        hw / factor,
        hh / factor,
        imageops::FilterType::Triangle,
    );
    let coarse_needle = imageops::resize(
        needle,
        (nw / factor).max(1),
        (nh / factor).max(1),
        imageops::FilterType::Triangle,
    );
    let (cw, ch) = coarse_hay.dimensions();
    let (cnw, cnh) = coarse_needle.dimensions();

    let coarse_stats = NeedleStats::of(&coarse_needle);
    if cnw > cw || cnh > ch || coarse_stats.den == 0 {
        // Decimation degenerated; fall back to the exhaustive sweep.
        return best_in_window(haystack, needle, stats, 0, hw - nw, 0, hh - nh);
    }

    let coarse = best_in_window(
        &coarse_hay,
        &coarse_needle,
        &coarse_stats,
        0,
        cw - cnw,
        0,
        ch - cnh,
    );

    let radius = REFINE_RADIUS_FACTOR * factor;
    let cx = coarse.x * factor;
    let cy = coarse.y * factor;
    let x0 = cx.saturating_sub(radius);
    let y0 = cy.saturating_sub(radius);
    let x1 = (cx + radius).min(hw - nw);
    let y1 = (cy + radius).min(hh - nh);

    best_in_window(haystack, needle, stats, x0.min(x1), x1, y0.min(y1), y1)
}

/// Precomputed template sums. `den` is `n * Σt² - (Σt)²`, zero iff the
/// template has no variation.
struct NeedleStats {
    n: u64,
    sum: u64,
    den: i128,
}

impl NeedleStats {
    fn of(needle: &GrayImage) -> Self {
        let mut sum = 0u64;
        let mut sum_sq = 0u64;
        for &p in needle.as_raw() {
            let v = p as u64;
            sum += v;
            sum_sq += v * v;
        }
        let n = (needle.width() as u64) * (needle.height() as u64);
        Self {
            n,
            sum,
            den: (n as i128) * (sum_sq as i128) - (sum as i128) * (sum as i128),
        }
    }
}

struct BestMatch {
    x: u32,
    y: u32,
    score: f64,
}

/// Exhaustive scan of the inclusive position window, all integer arithmetic
/// until the final score so equal inputs always produce equal output. The
/// first position reaching the maximum wins.
fn best_in_window(
    haystack: &GrayImage,
    needle: &GrayImage,
    stats: &NeedleStats,
    x0: u32,
    x1: u32,
    y0: u32,
    y1: u32,
) -> BestMatch {
    let integral = Integral::of(haystack);
    let hay = haystack.as_raw();
    let hw = haystack.width() as usize;
    let ndl = needle.as_raw();
    let (nw, nh) = (needle.width() as usize, needle.height() as usize);

    let mut best = BestMatch {
        x: x0,
        y: y0,
        score: 0.0,
    };
    let mut best_seen = false;

    for y in y0..=y1 {
        for x in x0..=x1 {
            let (sum_i, sum_i_sq) = integral.window(x as usize, y as usize, nw, nh);
            let den_i = (stats.n as i128) * (sum_i_sq as i128) - (sum_i as i128) * (sum_i as i128);
            if den_i <= 0 {
                // Flat window, nothing to correlate against.
                continue;
            }

            let mut cross = 0u64;
            for row in 0..nh {
                let hay_row = &hay[(y as usize + row) * hw + x as usize..][..nw];
                let ndl_row = &ndl[row * nw..][..nw];
                cross += hay_row
                    .iter()
                    .zip(ndl_row)
                    .map(|(&a, &b)| a as u64 * b as u64)
                    .sum::<u64>();
            }

            let num = (stats.n as i128) * (cross as i128) - (sum_i as i128) * (stats.sum as i128);
            if num <= 0 {
                continue;
            }

            // Cauchy-Schwarz bounds num² by den_i * den; equality is a
            // pixel-perfect correlation, reported as exactly 1.0.
            let score = if num * num >= den_i * stats.den {
                1.0
            } else {
                (num as f64) / ((den_i as f64).sqrt() * (stats.den as f64).sqrt())
            };

            if !best_seen || score > best.score {
                best = BestMatch { x, y, score };
                best_seen = true;
            }
        }
    }

    best
}

/// Summed-area tables over pixel values and their squares, giving O(1)
/// window sums during the sweep.
struct Integral {
    stride: usize,
    sum: Vec<u64>,
    sum_sq: Vec<u64>,
}

impl Integral {
    fn of(img: &GrayImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0u64; stride * (h + 1)];
        let mut sum_sq = vec![0u64; stride * (h + 1)];
        let raw = img.as_raw();

        for y in 0..h {
            let row = &raw[y * w..][..w];
            let base = (y + 1) * stride;
            let prev = y * stride;
            for (x, &p) in row.iter().enumerate() {
                let v = p as u64;
                let idx = base + x + 1;
                sum[idx] = v + sum[idx - 1] + sum[prev + x + 1] - sum[prev + x];
                sum_sq[idx] = v * v + sum_sq[idx - 1] + sum_sq[prev + x + 1] - sum_sq[prev + x];
            }
        }

        Self {
            stride,
            sum,
            sum_sq,
        }
    }

    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (u64, u64) {
        let (a, b) = (y * self.stride + x, y * self.stride + x + w);
        let (c, d) = ((y + h) * self.stride + x, (y + h) * self.stride + x + w);
        (
            self.sum[d] + self.sum[a] - self.sum[b] - self.sum[c],
            self.sum_sq[d] + self.sum_sq[a] - self.sum_sq[b] - self.sum_sq[c],
        )
    }
}

fn decimation(hw: u32, hh: u32, nw: u32, nh: u32) -> u32 {
    let mut factor = 1;
    while factor < MAX_DECIMATION
        && hw.max(hh) / (factor * 2) >= COARSE_MAX_DIM
        && nw.min(nh) / (factor * 2) >= COARSE_MIN_TEMPLATE
    {
        factor *= 2;
    }
    factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{embed, speckle};
    use crate::types::Point;
    use image::Luma;

    #[test]
    fn exact_embed_is_found_at_its_offset_even_at_threshold_one() {
        let needle = speckle(16, 16, 7);
        let mut hay = speckle(64, 64, 1);
        embed(&mut hay, &needle, 20, 12);

        match find_in_gray(&hay, &needle, 1.0) {
            MatchResult::Found { region, score } => {
                assert_eq!(region.top_left, Point::new(20, 12));
                assert_eq!(region.bottom_right, Point::new(36, 28));
                assert_eq!(score, 1.0);
            }
            other => panic!("expected exact match, got {other:?}"),
        }
    }

    #[test]
    fn matching_is_deterministic() {
        let needle = speckle(12, 10, 3);
        let mut hay = speckle(80, 60, 9);
        embed(&mut hay, &needle, 33, 21);

        let first = find_in_gray(&hay, &needle, 0.5);
        let second = find_in_gray(&hay, &needle, 0.5);
        assert_eq!(first, second);
    }

    #[test]
    fn oversized_needle_is_never_found() {
        let needle = speckle(32, 8, 2);
        let hay = speckle(16, 16, 4);
        for threshold in [0.0, 0.5, 1.0] {
            assert_eq!(
                find_in_gray(&hay, &needle, threshold),
                MatchResult::NotFound { score: 0.0 }
            );
        }
    }

    #[test]
    fn flat_needle_is_never_found() {
        let needle = GrayImage::from_pixel(8, 8, Luma([77]));
        let hay = speckle(32, 32, 5);
        assert_eq!(
            find_in_gray(&hay, &needle, 0.0),
            MatchResult::NotFound { score: 0.0 }
        );
    }

    #[test]
    fn miss_below_threshold_keeps_the_observed_score() {
        let needle = speckle(16, 16, 11);
        let hay = speckle(64, 64, 12);

        let result = find_in_gray(&hay, &needle, 0.99);
        match result {
            MatchResult::NotFound { score } => {
                assert!((0.0..0.99).contains(&score), "score was {score}");
            }
            other => panic!("unrelated speckle should not reach 0.99: {other:?}"),
        }
    }

    #[test]
    fn empty_frame_is_a_defined_miss() {
        let template = Template::new("t", speckle(8, 8, 1), 0.5).unwrap();
        let frame = Frame::from_rgba(Vec::new(), 0, 0, Point::new(0, 0));
        assert_eq!(
            find(&frame, &template, 0.5),
            MatchResult::NotFound { score: 0.0 }
        );
    }

    #[test]
    fn decimation_kicks_in_only_for_large_frames() {
        assert_eq!(decimation(320, 200, 16, 16), 1);
        assert_eq!(decimation(1920, 1080, 120, 40), 4);
        assert_eq!(decimation(1920, 1080, 16, 16), 2);
    }
}
