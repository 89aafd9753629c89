//! Box Detection Benchmarks
//!
//! Edge map and rectangle search over a synthetic A4 form page rendered at
//! 2x, plus coordinate-mode filling of a one-page document.
//!
//! Run with: `cargo bench --bench box_detection`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use image::{GrayImage, Rgba, RgbaImage};
use lopdf::{dictionary, Document, Object, Stream};
use std::time::Duration;

use pdf_form_engine::config::DetectionConfig;
use pdf_form_engine::detection::{detect_boxes, find_rectangles, EdgeMap};
use pdf_form_engine::filler::{FillOptions, FormData, FormFiller};

/// A4 at 2x with two columns of outlined boxes
fn create_form_page() -> RgbaImage {
    let mut page = RgbaImage::from_pixel(1190, 1684, Rgba([255, 255, 255, 255]));
    let black = Rgba([0, 0, 0, 255]);

    for row in 0..20u32 {
        for (x0, x1) in [(100u32, 520u32), (640, 1060)] {
            let y0 = 120 + row * 70;
            let y1 = y0 + 36;
            for x in x0..=x1 {
                page.put_pixel(x, y0, black);
                page.put_pixel(x, y1, black);
            }
            for y in y0..=y1 {
                page.put_pixel(x0, y, black);
                page.put_pixel(x1, y, black);
            }
        }
    }
    page
}

fn create_blank_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).expect("Failed to save PDF");
    out
}

/// Benchmark edge map construction and rectangle search
fn bench_box_detection(c: &mut Criterion) {
    let page = create_form_page();
    let gray: GrayImage = image::imageops::grayscale(&page);
    let config = DetectionConfig::default();

    let mut group = c.benchmark_group("box_detection");
    group.throughput(Throughput::Elements((page.width() * page.height()) as u64));
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("edge_map", |b| {
        b.iter(|| black_box(EdgeMap::from_gray(black_box(&gray), config.edge_threshold)))
    });

    let edges = EdgeMap::from_gray(&gray, config.edge_threshold);
    group.bench_function("find_rectangles", |b| {
        b.iter(|| black_box(find_rectangles(black_box(&edges), &config)))
    });

    group.bench_function("detect_boxes_a4", |b| {
        b.iter(|| black_box(detect_boxes(black_box(&page), &config)))
    });

    group.finish();
}

/// Benchmark coordinate-mode filling with auto-layout
fn bench_coordinate_fill(c: &mut Criterion) {
    let pdf = create_blank_pdf();
    let filler = FormFiller::new();
    let options = FillOptions::default();

    let mut group = c.benchmark_group("coordinate_fill");

    for count in [10usize, 60] {
        let data: FormData = (0..count)
            .map(|i| (format!("field_{}", i), serde_json::Value::from(format!("wartość {}", i))))
            .collect();

        group.bench_with_input(BenchmarkId::new("auto_layout", count), &data, |b, data| {
            b.iter(|| {
                let filled = filler
                    .fill_form(black_box(&pdf), data, &options)
                    .expect("Failed to fill PDF");
                black_box(filled.bytes.len())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_box_detection, bench_coordinate_fill);
criterion_main!(benches);
