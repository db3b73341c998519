// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the fieldscan-document crate: the full image
// enhancement pass on a synthetic region crop, and text normalization of a
// multi-region page.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, Luma};

use fieldscan_document::{ImageEnhancer, TextNormalizer};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Full preprocessing on a 600x200 crop of faint pencil-like strokes, the
/// low-contrast path that triggers equalization and boosting.
fn bench_preprocess(c: &mut Criterion) {
    let (width, height) = (600u32, 200u32);
    let mut img = GrayImage::from_pixel(width, height, Luma([200u8]));
    for y in 60..140 {
        for x in (20..580).step_by(12) {
            img.put_pixel(x, y, Luma([170u8]));
            img.put_pixel(x + 1, y, Luma([170u8]));
        }
    }
    let dynamic = DynamicImage::ImageLuma8(img);
    let enhancer = ImageEnhancer::default();

    c.bench_function("preprocess (600x200 faint)", |b| {
        b.iter(|| {
            let rescued = enhancer.rescue_region(black_box(&dynamic));
            black_box(enhancer.preprocess(&rescued));
        });
    });
}

/// Normalization of a page with twenty marker-annotated regions.
fn bench_normalize(c: &mut Criterion) {
    let page: Vec<String> = (1..=20)
        .map(|i| {
            format!(
                "[REGION:Text|{i}|bbox:10,{top},590,{bottom}]\n\
                 RFI No:   O0002209{i:02}   CH2{i:02}\n\
                 Date: 12.05.2024 ~ P16017 *** ooo",
                top = i * 40,
                bottom = i * 40 + 30,
            )
        })
        .collect();
    let text = page.join("\n\n\n");
    let normalizer = TextNormalizer::new();

    c.bench_function("normalize (20 regions)", |b| {
        b.iter(|| black_box(normalizer.clean(black_box(&text))));
    });
}

criterion_group!(benches, bench_preprocess, bench_normalize);
criterion_main!(benches);
