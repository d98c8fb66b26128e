use edge_filter::{EdgeFilterPipeline, EdgeSettings, FrameView, SharedSettings};
use image::GrayImage;

/// Deterministic BGRA scene: a few filled shapes on a gradient.
fn scene(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let mut v = (x / 4 + y / 6) as u8;
            let (dx, dy) = (x as i32 - 200, y as i32 - 150);
            if dx * dx + dy * dy < 80 * 80 {
                v = 220;
            }
            if (40..120).contains(&x) && (30..90).contains(&y) {
                v = 15;
            }
            if (260..380).contains(&x) && (200..280).contains(&y) && (x + y) % 40 < 20 {
                v = 180;
            }
            data.extend_from_slice(&[v, v.wrapping_add(7), v / 2, 255]);
        }
    }
    data
}

const BINOMIAL: [i64; 5] = [1, 4, 6, 4, 1];

fn mirror(i: i64, len: i64) -> i64 {
    let mut i = i;
    while i < 0 || i >= len {
        i = if i < 0 { -i } else { 2 * (len - 1) - i };
    }
    i
}

/// Independent reference: direct 2D 5x5 blur, Sobel, angle-based
/// non-maximum suppression, hysteresis grown to a fixed point, then a
/// brute-force square dilation checking every neighbor.
fn reference_mask(data: &[u8], width: u32, height: u32, settings: &EdgeSettings) -> GrayImage {
    let (w, h) = (i64::from(width), i64::from(height));
    let idx = |x: i64, y: i64| (y * w + x) as usize;

    let gray: Vec<i64> = data
        .chunks_exact(4)
        .map(|px| {
            let luma = i64::from(px[0]) * 1868 + i64::from(px[1]) * 9617 + i64::from(px[2]) * 4899;
            (luma + 8192) >> 14
        })
        .collect();

    let mut blurred = vec![0i64; gray.len()];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0;
            for (j, wy) in BINOMIAL.iter().enumerate() {
                for (i, wx) in BINOMIAL.iter().enumerate() {
                    let sx = mirror(x + i as i64 - 2, w);
                    let sy = mirror(y + j as i64 - 2, h);
                    sum += wx * wy * gray[idx(sx, sy)];
                }
            }
            blurred[idx(x, y)] = (sum + 128) / 256;
        }
    }

    let px = |x: i64, y: i64| blurred[idx(x.clamp(0, w - 1), y.clamp(0, h - 1))];
    let mut gx = vec![0i64; gray.len()];
    let mut gy = vec![0i64; gray.len()];
    for y in 0..h {
        for x in 0..w {
            gx[idx(x, y)] = px(x + 1, y - 1) + 2 * px(x + 1, y) + px(x + 1, y + 1)
                - px(x - 1, y - 1)
                - 2 * px(x - 1, y)
                - px(x - 1, y + 1);
            gy[idx(x, y)] = px(x - 1, y + 1) + 2 * px(x, y + 1) + px(x + 1, y + 1)
                - px(x - 1, y - 1)
                - 2 * px(x, y - 1)
                - px(x + 1, y - 1);
        }
    }
    let mag = |x: i64, y: i64| {
        if x < 0 || y < 0 || x >= w || y >= h {
            0
        } else {
            gx[idx(x, y)].abs() + gy[idx(x, y)].abs()
        }
    };

    let (low, high) = {
        let t = settings.thresholds();
        let (a, b) = (i64::from(t.low), i64::from(t.high));
        (a.min(b), a.max(b))
    };

    // 0 = none, 1 = weak, 2 = strong
    let mut class = vec![0u8; gray.len()];
    for y in 0..h {
        for x in 0..w {
            let m = mag(x, y);
            if m <= low {
                continue;
            }
            let (dx, dy) = (gx[idx(x, y)], gy[idx(x, y)]);
            let angle = (dy.abs() as f64).atan2(dx.abs() as f64).to_degrees();
            let keep = if angle < 22.5 {
                m > mag(x - 1, y) && m >= mag(x + 1, y)
            } else if angle > 67.5 {
                m > mag(x, y - 1) && m >= mag(x, y + 1)
            } else if (dx > 0) == (dy > 0) {
                m > mag(x - 1, y - 1) && m > mag(x + 1, y + 1)
            } else {
                m > mag(x + 1, y - 1) && m > mag(x - 1, y + 1)
            };
            if keep {
                class[idx(x, y)] = if m > high { 2 } else { 1 };
            }
        }
    }

    let mut grew = true;
    while grew {
        grew = false;
        for y in 0..h {
            for x in 0..w {
                if class[idx(x, y)] != 1 {
                    continue;
                }
                let touches_strong = (-1..=1).any(|oy: i64| {
                    (-1..=1).any(|ox: i64| {
                        let (nx, ny) = (x + ox, y + oy);
                        nx >= 0 && ny >= 0 && nx < w && ny < h && class[idx(nx, ny)] == 2
                    })
                });
                if touches_strong {
                    class[idx(x, y)] = 2;
                    grew = true;
                }
            }
        }
    }

    let k = i64::from(settings.thickness);
    let before = k / 2;
    GrayImage::from_fn(width, height, |x, y| {
        for oy in -before..k - before {
            for ox in -before..k - before {
                let (sx, sy) = (i64::from(x) + ox, i64::from(y) + oy);
                if sx >= 0 && sy >= 0 && sx < w && sy < h && class[idx(sx, sy)] == 2 {
                    return image::Luma([255]);
                }
            }
        }
        image::Luma([0])
    })
}

/// Gray vertical step, dark left of column 5.
fn step(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..height {
        for x in 0..width {
            let v = if x < 5 { 0 } else { 200 };
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    data
}

fn lit_columns(out: &image::RgbaImage) -> Vec<Vec<u32>> {
    out.rows()
        .map(|row| {
            row.enumerate()
                .filter(|(_, p)| p.0[3] != 0)
                .map(|(x, _)| x as u32)
                .collect()
        })
        .collect()
}

#[test]
fn vertical_step_yields_single_column_edge() {
    // Blurred row is [0, 0, 0, 13, 63, 138, 188, 200, 200, 200], so |dx| peaks
    // at 500 on columns 4 and 5 and suppression keeps the left one.
    let data = step(10, 6);
    let out = EdgeFilterPipeline::new()
        .process_with(FrameView::new(&data, 10, 6), &EdgeSettings::default())
        .unwrap();

    assert_eq!(lit_columns(&out), vec![vec![4]; 6]);
    assert_eq!(out.get_pixel(4, 0).0, [0, 255, 0, 255]);
}

#[test]
fn vertical_step_dilates_around_anchor() {
    let data = step(10, 6);
    let settings = EdgeSettings {
        thickness: 3,
        ..Default::default()
    };
    let out = EdgeFilterPipeline::new()
        .process_with(FrameView::new(&data, 10, 6), &settings)
        .unwrap();

    assert_eq!(lit_columns(&out), vec![vec![3, 4, 5]; 6]);
}

#[test]
fn reference_matches_hand_derived_step() {
    let data = step(10, 6);
    let mask = reference_mask(&data, 10, 6, &EdgeSettings::default());
    for (x, y, p) in mask.enumerate_pixels() {
        assert_eq!(p.0[0] != 0, x == 4, "({x}, {y})");
    }
}

#[test]
fn region_renders_dilated_canny_mask_in_edge_color() {
    let (width, height) = (400, 300);
    let data = scene(width, height);
    let settings = EdgeSettings {
        thickness: 3,
        opacity: 128,
        color: [0, 255, 0],
        ..Default::default()
    };

    let out = EdgeFilterPipeline::new()
        .process(FrameView::new(&data, width, height), &SharedSettings::new(settings), false)
        .unwrap();
    let expected = reference_mask(&data, width, height, &settings);

    assert_eq!(out.dimensions(), (width, height));
    let mut lit = 0;
    for (x, y, pixel) in out.enumerate_pixels() {
        match pixel.0 {
            [0, 255, 0, 128] => {
                lit += 1;
                assert_eq!(expected.get_pixel(x, y).0[0], 255, "unexpected edge at ({x}, {y})");
            }
            [0, 0, 0, 0] => {
                assert_eq!(expected.get_pixel(x, y).0[0], 0, "missing edge at ({x}, {y})");
            }
            other => panic!("pixel ({x}, {y}) has foreign value {other:?}"),
        }
    }
    assert!(lit > 0, "scene should produce edges");
}

#[test]
fn repeated_runs_are_bit_identical() {
    let (width, height) = (160, 120);
    let data = scene(width, height);
    let shared = SharedSettings::new(EdgeSettings {
        thickness: 2,
        realtime_auto: true,
        ..Default::default()
    });

    let mut pipeline = EdgeFilterPipeline::new();
    let first = pipeline.process(FrameView::new(&data, width, height), &shared, false).unwrap();
    let second = pipeline.process(FrameView::new(&data, width, height), &shared, false).unwrap();
    let fresh = EdgeFilterPipeline::new()
        .process(FrameView::new(&data, width, height), &shared, false)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(first, fresh);
}

#[test]
fn frame_size_change_reuses_pipeline() {
    let mut pipeline = EdgeFilterPipeline::new();
    let settings = EdgeSettings::default();

    let big = scene(120, 90);
    let small = scene(30, 20);
    assert_eq!(
        pipeline.process_with(FrameView::new(&big, 120, 90), &settings).unwrap().dimensions(),
        (120, 90)
    );
    assert_eq!(
        pipeline.process_with(FrameView::new(&small, 30, 20), &settings).unwrap().dimensions(),
        (30, 20)
    );
}
