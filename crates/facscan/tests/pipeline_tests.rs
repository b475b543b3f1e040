//! End-to-end runs of the filing pipeline against fake collaborators.

mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;

use common::harness::{FailingCompressor, ShrinkingCompressor, PANIC_SCRIPT};
use common::TestHarness;

use facscan::extract::Extraction;
use facscan::pipeline::{DocumentState, PipelineContext, PipelineWarning};
use facscan::worker::{BatchRunner, DirectoryScanner, Job, Routing};

const SCENARIO_A: &str = "FACTURA ELECTRONICA N° 123456 RUT: 76.466.343-8";
const SCENARIO_A_NAME: &str = "local_76466343-8_factura_123456_2024.pdf";
const UNREADABLE: &str = "Gracias por su compra\nvuelva pronto";

#[test]
fn scenario_a_identified_invoice_is_filed() {
    let harness = TestHarness::new();
    let source = harness.add_document("escaneo_1.pdf", SCENARIO_A);
    let pipeline = harness.pipeline();

    let (result, ctx) = pipeline.run(PipelineContext::new(Job::new(source)));

    assert_eq!(result.routing, Routing::Filed);
    assert_eq!(ctx.state, DocumentState::Filed);
    let outcome = result.outcome.unwrap();
    assert_eq!(outcome.tax_id, Extraction::Found("76466343-8".to_string()));
    assert_eq!(
        outcome.invoice_number,
        Extraction::Found("123456".to_string())
    );
    assert_eq!(harness.filed(2024), vec![SCENARIO_A_NAME]);
    assert!(harness.remaining_input().is_empty());
}

#[test]
fn scenario_b_unreadable_fields_go_to_manual_review_untouched() {
    let harness = TestHarness::new();
    let source = harness.add_document("escaneo_2.pdf", UNREADABLE);
    let original = std::fs::read(&source).unwrap();
    let pipeline = harness.pipeline_with_compressor(Box::new(ShrinkingCompressor));

    let (result, ctx) = pipeline.run(PipelineContext::new(Job::new(source)));

    assert_eq!(result.routing, Routing::ManualReview);
    assert_eq!(ctx.state, DocumentState::ManualReview);
    assert_eq!(
        harness.in_review(),
        vec!["documento_escaneado_20240601_1030.pdf"]
    );
    assert_eq!(
        std::fs::read(harness.review_dir.join("documento_escaneado_20240601_1030.pdf")).unwrap(),
        original
    );
    assert!(harness.filed(2024).is_empty());
}

#[test]
fn scenario_c_same_base_name_from_two_workers_gets_distinct_suffixes() {
    let harness = TestHarness::new();
    let first = harness.add_document("a.pdf", SCENARIO_A);
    let second = harness.add_document("b.pdf", SCENARIO_A);
    let pipeline = harness.pipeline();
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [first, second]
        .into_iter()
        .map(|source| {
            let pipeline = Arc::clone(&pipeline);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                pipeline.run(PipelineContext::new(Job::new(source))).0
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().routing, Routing::Filed);
    }

    assert_eq!(
        harness.filed(2024),
        vec![
            "local_76466343-8_factura_123456_2024.pdf",
            "local_76466343-8_factura_123456_2024_1.pdf",
        ]
    );
}

#[test]
fn corrupt_page_is_routed_to_manual_review() {
    let harness = TestHarness::new();
    let source = harness.add_corrupt_document("roto.pdf");
    let pipeline = harness.pipeline();

    let (result, ctx) = pipeline.run(PipelineContext::new(Job::new(source)));

    assert_eq!(result.routing, Routing::ManualReview);
    assert!(ctx.recognition.is_none());
    assert!(result.error.unwrap().contains("Invalid page image"));
    assert_eq!(harness.in_review().len(), 1);
}

#[test]
fn empty_ocr_result_is_routed_to_manual_review() {
    let harness = TestHarness::new();
    let source = harness.add_document("blanco.pdf", "");
    let pipeline = harness.pipeline();

    let (result, _ctx) = pipeline.run(PipelineContext::new(Job::new(source)));

    assert_eq!(result.routing, Routing::ManualReview);
    assert_eq!(result.error.as_deref(), Some("Document processing failed: OCR returned no text"));
}

#[test]
fn compression_runs_before_filing() {
    let harness = TestHarness::new();
    let source = harness.add_document("escaneo.pdf", SCENARIO_A);
    let pipeline = harness.pipeline_with_compressor(Box::new(ShrinkingCompressor));

    let (result, ctx) = pipeline.run(PipelineContext::new(Job::new(source)));

    assert_eq!(result.routing, Routing::Filed);
    assert!(ctx.compression.unwrap().replaced());
    assert_eq!(
        std::fs::read(harness.output_dir.join("2024").join(SCENARIO_A_NAME)).unwrap(),
        b"%PDF-small"
    );
}

#[test]
fn compression_failure_keeps_original_and_files_it() {
    let harness = TestHarness::new();
    let source = harness.add_document("escaneo.pdf", SCENARIO_A);
    let original = std::fs::read(&source).unwrap();
    let pipeline = harness.pipeline_with_compressor(Box::new(FailingCompressor));

    let (result, ctx) = pipeline.run(PipelineContext::new(Job::new(source)));

    assert_eq!(result.routing, Routing::Filed);
    assert!(matches!(
        ctx.warnings.as_slice(),
        [PipelineWarning::CompressionFailed { .. }]
    ));
    assert_eq!(
        std::fs::read(harness.output_dir.join("2024").join(SCENARIO_A_NAME)).unwrap(),
        original
    );
}

#[test]
fn debug_zone_is_written_when_configured() {
    let harness = TestHarness::new();
    let source = harness.add_document("escaneo_7.pdf", SCENARIO_A);
    let debug_dir = harness.temp_path().join("debug");

    let mut config = harness.pipeline_config();
    config.debug_directory = Some(debug_dir.clone());
    let pipeline = harness.pipeline_from(config, Box::new(facscan::processor::NoopCompressor));

    pipeline.run(PipelineContext::new(Job::new(source)));

    assert!(debug_dir.join("escaneo_7_zona.png").is_file());
}

#[test]
fn identify_does_not_move_the_document() {
    let harness = TestHarness::new();
    let source = harness.add_document("escaneo.pdf", SCENARIO_A);
    let pipeline = harness.pipeline();

    let identification = pipeline.identify(&source).unwrap();

    assert_eq!(identification.raw_text, SCENARIO_A);
    assert_eq!(
        identification.filed_name.as_deref(),
        Some("local_76466343-8_factura_123456_2024")
    );
    assert!(source.exists());
    assert!(harness.filed(2024).is_empty());
}

#[test]
fn batch_counts_every_routing_and_survives_failures() {
    let harness = TestHarness::new();
    harness.add_document("a.pdf", SCENARIO_A);
    harness.add_document("b.pdf", PANIC_SCRIPT);
    harness.add_corrupt_document("c.pdf");
    harness.add_document("d.pdf", "RUT 12.345.678-5\nFOLIO 99887");
    harness.add_document("e.pdf", UNREADABLE);
    std::fs::write(harness.input_dir.join("notas.txt"), "no es un pdf").unwrap();

    let runner = BatchRunner::new(harness.pipeline(), 1);
    let summary = runner
        .run_directory(&DirectoryScanner::new(&harness.input_dir))
        .unwrap();

    assert_eq!(summary.filed, 2);
    assert_eq!(summary.manual_review, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.results.len(), 5);

    assert_eq!(
        harness.filed(2024),
        vec![
            "local_12345678-5_factura_99887_2024.pdf",
            SCENARIO_A_NAME,
        ]
    );
    assert_eq!(
        harness.in_review(),
        vec![
            "documento_escaneado_20240601_1030.pdf",
            "documento_escaneado_20240601_1030_1.pdf",
        ]
    );
    // The panicking document is never moved
    assert_eq!(harness.remaining_input(), vec!["b.pdf", "notas.txt"]);
}

#[test]
fn batch_with_several_workers_files_everything() {
    let harness = TestHarness::new();
    for i in 0..12 {
        harness.add_document(
            &format!("escaneo_{:02}.pdf", i),
            &format!("FACTURA ELECTRONICA\nN° {}\nR.U.T.: 76.466.343-8", 100200 + i),
        );
    }

    let runner = BatchRunner::new(harness.pipeline(), 4);
    let summary = runner
        .run_directory(&DirectoryScanner::new(&harness.input_dir))
        .unwrap();

    assert_eq!(summary.filed, 12);
    assert_eq!(summary.processed(), 12);
    assert_eq!(harness.filed(2024).len(), 12);
    assert!(harness
        .filed(2024)
        .contains(&"local_76466343-8_factura_100211_2024.pdf".to_string()));
    assert!(harness.remaining_input().is_empty());
}

#[test]
fn interrupted_batch_leaves_documents_in_place() {
    let harness = TestHarness::new();
    harness.add_document("a.pdf", SCENARIO_A);
    harness.add_document("b.pdf", SCENARIO_A);

    let runner = BatchRunner::new(harness.pipeline(), 2);
    runner.interrupt_flag().store(true, Ordering::SeqCst);

    let summary = runner
        .run_directory(&DirectoryScanner::new(&harness.input_dir))
        .unwrap();

    assert_eq!(summary.processed(), 0);
    assert_eq!(harness.remaining_input(), vec!["a.pdf", "b.pdf"]);
}

#[test]
fn empty_input_directory_is_a_no_op() {
    let harness = TestHarness::new();
    let runner = BatchRunner::new(harness.pipeline(), 2);

    let summary = runner
        .run_directory(&DirectoryScanner::new(&harness.input_dir))
        .unwrap();

    assert_eq!(summary.processed(), 0);
    assert_eq!(summary.filed, 0);
}
