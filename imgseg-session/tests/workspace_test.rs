//! Workspace behavior tests against in-process fakes

use async_trait::async_trait;
use bytes::Bytes;
use imgseg_client::SegmentBackend;
use imgseg_core::{
    BoxPrompt, EmbeddingTensor, ImageSource, Mask, MaskExport, MaskRaster, Mode, Point,
    PointsPrompt, Result, Rgba, SegmentConfig, SegmentError, Segmentation,
};
use imgseg_onnx::{DecoderInput, DecoderLoader, MaskDecoder};
use imgseg_session::{
    Completion, DispatchPath, ExportSinks, MemorySink, PathState, RemoteOutcome, Workspace,
    COPIED_MESSAGE,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Points(PointsPrompt),
    Box(BoxPrompt),
    Text(String),
    Everything,
    Embedding,
}

/// Records every call; optionally holds responses until permits are added
struct FakeBackend {
    calls: Mutex<Vec<Call>>,
    fail: AtomicBool,
    gate: Option<Arc<Semaphore>>,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
            gate: None,
        }
    }

    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Record the call and return its index
    async fn record(&self, call: Call) -> Result<usize> {
        let index = {
            let mut calls = self.calls.lock();
            calls.push(call);
            calls.len() - 1
        };
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.map_err(|_| SegmentError::Cancelled)?;
            permit.forget();
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SegmentError::Backend { code: 1 });
        }
        Ok(index)
    }

    fn masks_for(index: usize) -> Vec<Mask> {
        vec![Mask::new(Segmentation::RowIndices(vec![vec![0]]))
            .with_field("call", serde_json::json!(index))]
    }
}

#[async_trait]
impl SegmentBackend for FakeBackend {
    async fn segment_points(&self, _image: &ImageSource, points: &[Point]) -> Result<Vec<Mask>> {
        let index = self.record(Call::Points(PointsPrompt::from_points(points))).await?;
        Ok(Self::masks_for(index))
    }

    async fn segment_box(&self, _image: &ImageSource, prompt: BoxPrompt) -> Result<Vec<Mask>> {
        let index = self.record(Call::Box(prompt)).await?;
        Ok(Self::masks_for(index))
    }

    async fn segment_text(&self, _image: &ImageSource, text: &str) -> Result<Vec<Mask>> {
        let index = self.record(Call::Text(text.to_string())).await?;
        Ok(Self::masks_for(index))
    }

    async fn segment_everything(&self, _image: &ImageSource) -> Result<Vec<Mask>> {
        let index = self.record(Call::Everything).await?;
        let mut masks = Self::masks_for(index);
        masks.push(Mask::new(Segmentation::RunLength("1F1T2F".to_string())));
        Ok(masks)
    }

    async fn fetch_embedding(&self, _image: &ImageSource) -> Result<EmbeddingTensor> {
        self.record(Call::Embedding).await?;
        EmbeddingTensor::from_flat([1, 2, 2, 2], vec![0.25; 8])
    }

    async fn fetch_model(&self) -> Result<Bytes> {
        Ok(Bytes::from_static(b"model"))
    }
}

/// Paints one pixel per real (non-padding) point
struct FakeDecoder;

impl MaskDecoder for FakeDecoder {
    fn decode(&self, input: &DecoderInput) -> Result<MaskRaster> {
        let [height, width] = input.orig_im_size;
        let mut raster = MaskRaster::transparent(width as u32, height as u32);
        for i in 0..input.point_count() - 1 {
            raster.paint_index(i, Rgba::OVERLAY_BLUE);
        }
        Ok(raster)
    }
}

#[derive(Default)]
struct FakeLoader {
    loads: AtomicUsize,
    panics: AtomicBool,
}

#[async_trait]
impl DecoderLoader for FakeLoader {
    async fn load(&self) -> Result<Arc<dyn MaskDecoder>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.panics.load(Ordering::SeqCst) {
            panic!("decoder model is corrupt");
        }
        Ok(Arc::new(FakeDecoder))
    }
}

struct Harness {
    ws: Workspace,
    backend: Arc<FakeBackend>,
    loader: Arc<FakeLoader>,
    file: Arc<MemorySink>,
    clipboard: Arc<MemorySink>,
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgba8(image::RgbaImage::new(width, height));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageOutputFormat::Png).unwrap();
    buf.into_inner()
}

fn test_image() -> ImageSource {
    ImageSource::from_bytes("street.png", png_bytes(4, 3)).unwrap()
}

fn harness_with(backend: FakeBackend) -> Harness {
    let backend = Arc::new(backend);
    let loader = Arc::new(FakeLoader::default());
    let file = Arc::new(MemorySink::new());
    let clipboard = Arc::new(MemorySink::new());
    let ws = Workspace::new(
        Arc::new(SegmentConfig::default()),
        backend.clone(),
        loader.clone(),
        ExportSinks {
            file: file.clone(),
            clipboard: clipboard.clone(),
        },
    );
    Harness {
        ws,
        backend,
        loader,
        file,
        clipboard,
    }
}

fn harness() -> Harness {
    let mut h = harness_with(FakeBackend::new());
    h.ws.load_image(test_image());
    h
}

fn call_index(mask: &Mask) -> Option<u64> {
    mask.metadata.get("call").and_then(|v| v.as_u64())
}

#[tokio::test]
async fn test_click_dispatches_accumulated_points() {
    let mut h = harness();
    assert_eq!(h.ws.mode(), Mode::Click);

    h.ws.add_point(Point::foreground(1.4, 0.6)).unwrap();
    assert!(h.ws.is_processing());
    h.ws.settle().await;

    h.ws.add_point(Point::background(2.5, 1.49)).unwrap();
    h.ws.settle().await;

    assert_eq!(
        h.backend.calls(),
        vec![
            Call::Points(PointsPrompt::from_points(&[Point::foreground(1.0, 1.0)])),
            Call::Points(PointsPrompt::from_points(&[
                Point::foreground(1.0, 1.0),
                Point::background(3.0, 1.0),
            ])),
        ]
    );
    assert_eq!(h.ws.masks().len(), 1);
    assert_eq!(call_index(&h.ws.masks()[0]), Some(1));
    assert_eq!(h.ws.points().len(), 2);
    assert_eq!(h.ws.path_state(DispatchPath::Click), PathState::Succeeded);
    assert!(!h.ws.is_processing());
}

#[tokio::test]
async fn test_new_click_cancels_running_request() {
    let gate = Arc::new(Semaphore::new(0));
    let mut h = harness_with(FakeBackend::gated(gate.clone()));
    h.ws.load_image(test_image());

    h.ws.add_point(Point::foreground(1.0, 1.0)).unwrap();
    // Let the first request reach the backend and block there
    while h.backend.calls().is_empty() {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.backend.calls().len(), 1);

    h.ws.add_point(Point::foreground(2.0, 2.0)).unwrap();
    gate.add_permits(2);
    h.ws.settle().await;

    assert_eq!(h.ws.masks().len(), 1);
    assert_eq!(call_index(&h.ws.masks()[0]), Some(1));
    assert_eq!(h.ws.path_state(DispatchPath::Click), PathState::Succeeded);
}

#[tokio::test]
async fn test_stale_completion_is_dropped() {
    let mut h = harness();
    h.ws.add_point(Point::foreground(1.0, 1.0)).unwrap();

    let stale = Completion::Remote {
        path: DispatchPath::Click,
        generation: 999,
        outcome: RemoteOutcome::Masks(Ok(FakeBackend::masks_for(42))),
    };
    assert!(!h.ws.apply(stale));
    assert!(h.ws.masks().is_empty());
    assert!(h.ws.path_state(DispatchPath::Click).is_in_flight());

    let stale_inference = Completion::Inference {
        generation: 999,
        result: Ok(MaskRaster::transparent(4, 3)),
    };
    assert!(!h.ws.apply(stale_inference));
    assert!(h.ws.mask_raster().is_none());

    h.ws.settle().await;
    assert_eq!(call_index(&h.ws.masks()[0]), Some(0));
}

#[tokio::test]
async fn test_box_requires_ready_and_two_points() {
    let mut h = harness();
    h.ws.select_mode(Mode::Box);

    h.ws.add_point(Point::foreground(0.6, 0.4)).unwrap();
    h.ws.add_point(Point::foreground(3.5, 2.2)).unwrap();
    h.ws.settle().await;
    assert!(h.backend.calls().is_empty());

    h.ws.set_box_ready(true);
    assert!(h.ws.path_state(DispatchPath::Box).is_in_flight());
    h.ws.settle().await;

    assert_eq!(
        h.backend.calls(),
        vec![Call::Box(BoxPrompt {
            x1: 1,
            y1: 0,
            x2: 4,
            y2: 2
        })]
    );
    assert_eq!(h.ws.masks().len(), 1);
    assert!(h.ws.points().is_empty());
    assert!(!h.ws.box_ready());
}

#[tokio::test]
async fn test_box_ready_with_one_point_does_nothing() {
    let mut h = harness();
    h.ws.select_mode(Mode::Box);
    h.ws.add_point(Point::foreground(1.0, 1.0)).unwrap();
    h.ws.set_box_ready(true);
    assert!(!h.ws.is_processing());
    assert!(h.backend.calls().is_empty());

    // Third corner restarts the box
    h.ws.set_box_ready(false);
    h.ws.add_point(Point::foreground(2.0, 2.0)).unwrap();
    h.ws.add_point(Point::foreground(3.0, 3.0)).unwrap();
    assert_eq!(h.ws.points(), &[Point::foreground(3.0, 3.0)]);
}

#[tokio::test]
async fn test_draw_box() {
    let mut h = harness();
    assert!(h
        .ws
        .draw_box(Point::foreground(0.0, 0.0), Point::foreground(2.0, 2.0))
        .is_err());

    h.ws.select_mode(Mode::Box);
    h.ws
        .draw_box(Point::foreground(0.0, 0.0), Point::foreground(2.0, 2.0))
        .unwrap();
    h.ws.settle().await;
    assert_eq!(
        h.backend.calls(),
        vec![Call::Box(BoxPrompt {
            x1: 0,
            y1: 0,
            x2: 2,
            y2: 2
        })]
    );
    assert!(h.ws.points().is_empty());
}

#[tokio::test]
async fn test_everything_clears_then_replaces() {
    let mut h = harness();
    h.ws.add_point(Point::foreground(1.0, 1.0)).unwrap();
    h.ws.settle().await;
    assert_eq!(h.ws.masks().len(), 1);

    h.ws.run_everything();
    assert_eq!(h.ws.mode(), Mode::Everything);
    assert!(h.ws.points().is_empty());
    assert!(h.ws.masks().is_empty());

    h.ws.settle().await;
    assert_eq!(h.backend.calls().last(), Some(&Call::Everything));
    assert_eq!(h.ws.masks().len(), 2);

    // Clicks in everything mode are recorded but not sent
    h.ws.add_point(Point::foreground(2.0, 2.0)).unwrap();
    assert!(!h.ws.is_processing());
    assert_eq!(h.ws.points().len(), 1);

    let overlay = h.ws.overlay().unwrap();
    assert_eq!((overlay.width(), overlay.height()), (4, 3));
    assert_eq!(overlay.painted_count(), 1);
}

#[tokio::test]
async fn test_mode_switch_clears_and_supersedes() {
    let mut h = harness();
    h.ws.add_point(Point::foreground(1.0, 1.0)).unwrap();
    h.ws.settle().await;

    h.ws.add_point(Point::foreground(2.0, 2.0)).unwrap();
    h.ws.select_mode(Mode::Box);

    assert_eq!(h.ws.mode(), Mode::Box);
    assert!(h.ws.points().is_empty());
    assert!(h.ws.masks().is_empty());
    assert_eq!(h.ws.path_state(DispatchPath::Click), PathState::Superseded);
    assert!(!h.ws.is_processing());

    // Nothing left to apply; a late completion must not resurrect masks
    tokio::task::yield_now().await;
    h.ws.poll_completions();
    assert!(h.ws.masks().is_empty());
}

#[tokio::test]
async fn test_embedding_loads_once_and_survives_mode_round_trip() {
    let mut h = harness();
    h.ws.select_mode(Mode::Embedding);
    assert!(h.ws.path_state(DispatchPath::ModelLoad).is_in_flight());
    assert!(h.ws.path_state(DispatchPath::EmbeddingFetch).is_in_flight());
    h.ws.settle().await;

    assert!(h.ws.decoder_ready());
    assert_eq!(h.ws.embedding().map(|e| e.shape()), Some([1, 2, 2, 2]));

    h.ws.select_mode(Mode::Click);
    h.ws.select_mode(Mode::Embedding);
    h.ws.settle().await;

    assert_eq!(h.loader.loads.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.backend
            .calls()
            .iter()
            .filter(|c| **c == Call::Embedding)
            .count(),
        1
    );
    assert!(h.ws.embedding().is_some());
}

#[tokio::test]
async fn test_embedding_inference_paints_points() {
    let mut h = harness();
    h.ws.select_mode(Mode::Embedding);
    // Click before the model and tensor arrive; inference runs once both land
    h.ws.add_point(Point::foreground(1.0, 1.0)).unwrap();
    h.ws.settle().await;

    let raster = h.ws.mask_raster().unwrap();
    assert_eq!((raster.width(), raster.height()), (4, 3));
    assert_eq!(raster.painted_count(), 1);
    assert!(h
        .backend
        .calls()
        .iter()
        .all(|c| matches!(c, Call::Embedding)));

    // Rapid clicks: only the newest run may land
    h.ws.add_point(Point::foreground(2.0, 1.0)).unwrap();
    let PathState::InFlight { generation: superseded } =
        h.ws.path_state(DispatchPath::LocalInference)
    else {
        panic!("inference should be running after a click");
    };
    h.ws.add_point(Point::background(3.0, 2.0)).unwrap();
    h.ws.settle().await;
    assert_eq!(h.ws.mask_raster().unwrap().painted_count(), 3);

    // A late result from the older run must not replace the newer raster
    let late = Completion::Inference {
        generation: superseded,
        result: Ok(MaskRaster::transparent(4, 3)),
    };
    assert!(!h.ws.apply(late));
    assert_eq!(h.ws.mask_raster().unwrap().painted_count(), 3);
    assert_eq!(h.ws.overlay().unwrap().painted_count(), 3);
    assert_eq!(
        h.ws.path_state(DispatchPath::LocalInference),
        PathState::Succeeded
    );
}

#[tokio::test]
async fn test_failure_keeps_previous_masks() {
    let mut h = harness();
    h.ws.add_point(Point::foreground(1.0, 1.0)).unwrap();
    h.ws.settle().await;

    h.backend.fail.store(true, Ordering::SeqCst);
    h.ws.add_point(Point::foreground(2.0, 2.0)).unwrap();
    h.ws.settle().await;

    assert_eq!(h.ws.path_state(DispatchPath::Click), PathState::Failed);
    assert_eq!(h.ws.masks().len(), 1);
    assert_eq!(call_index(&h.ws.masks()[0]), Some(0));
    assert!(!h.ws.is_processing());
}

#[tokio::test]
async fn test_exports_are_identical_and_popup_expires() {
    let mut h = harness();
    h.ws.add_point(Point::foreground(1.0, 1.0)).unwrap();
    h.ws.settle().await;

    tokio_test::assert_ok!(h.ws.export_to_file());
    tokio_test::assert_ok!(h.ws.export_to_clipboard());

    let file = h.file.last().unwrap();
    let clipboard = h.clipboard.last().unwrap();
    assert_eq!(file, clipboard);
    assert_eq!(file, h.ws.export_json().unwrap());

    let parsed = MaskExport::from_json(&file).unwrap();
    assert_eq!(parsed.masks, h.ws.masks());
    assert_eq!(parsed.points, h.ws.points());

    let now = Instant::now();
    let active = h.ws.notifications(now);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].message, COPIED_MESSAGE);

    let later = now + h.ws.config().popup_timeout() + Duration::from_millis(1);
    assert!(h.ws.notifications(later).is_empty());
    h.ws.prune_notifications(later);
    assert!(h.ws.notifications(now).is_empty());
}

#[tokio::test]
async fn test_export_with_nothing_selected() {
    let h = harness();
    assert_eq!(h.ws.export_json().unwrap(), r#"{"masks":[],"points":[]}"#);
}

#[tokio::test]
async fn test_clean_segment_and_clean_all() {
    let mut h = harness();
    h.ws.select_mode(Mode::Embedding);
    h.ws.add_point(Point::foreground(1.0, 1.0)).unwrap();
    h.ws.settle().await;
    assert!(h.ws.mask_raster().is_some());

    h.ws.clean_segment();
    assert_eq!(h.ws.mode(), Mode::Embedding);
    assert!(h.ws.points().is_empty());
    assert!(h.ws.mask_raster().is_none());
    assert!(h.ws.embedding().is_some());
    assert!(h.ws.image().is_some());

    h.ws.clean_all();
    assert_eq!(h.ws.mode(), Mode::Click);
    assert!(h.ws.image().is_none());
    assert!(h.ws.embedding().is_none());
    assert!(matches!(
        h.ws.add_point(Point::foreground(1.0, 1.0)),
        Err(SegmentError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_text_prompt() {
    let mut h = harness();
    h.ws.set_prompt("   ");
    assert!(!h.ws.send_text_prompt());
    assert!(h.backend.calls().is_empty());

    h.ws.set_prompt("  red car ");
    assert!(h.ws.send_text_prompt());
    h.ws.settle().await;
    assert_eq!(h.backend.calls(), vec![Call::Text("red car".to_string())]);
    assert_eq!(h.ws.masks().len(), 1);
    assert_eq!(h.ws.prompt(), "  red car ");
}

#[tokio::test]
async fn test_no_image_means_no_dispatch() {
    let mut h = harness_with(FakeBackend::new());
    h.ws.set_prompt("dog");
    assert!(!h.ws.send_text_prompt());
    h.ws.run_everything();
    h.ws.select_mode(Mode::Embedding);
    assert!(!h.ws.is_processing());
    assert!(h.backend.calls().is_empty());
    assert_eq!(h.loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_scale_and_point_validation() {
    let mut h = harness();
    assert!(h.ws.set_scale(0.0).is_err());
    assert!(h.ws.set_scale(f64::NAN).is_err());
    h.ws.set_scale(0.5).unwrap();
    assert_eq!(h.ws.scale(), 0.5);

    assert!(h.ws.add_point(Point::foreground(f64::NAN, 1.0)).is_err());
    assert!(h.ws.points().is_empty());
}

#[tokio::test]
async fn test_load_image_resets_session() {
    let mut h = harness();
    h.ws.select_mode(Mode::Embedding);
    h.ws.settle().await;

    h.ws.load_image(ImageSource::from_bytes("other.png", png_bytes(2, 2)).unwrap());
    assert_eq!(h.ws.mode(), Mode::Click);
    assert!(h.ws.embedding().is_none());
    assert!(h.ws.decoder_ready());
    assert_eq!(h.ws.image().map(|i| i.file_name()), Some("other.png"));
}

/// Wait until the gated backend has received `count` calls
async fn wait_for_calls(backend: &FakeBackend, count: usize) {
    while backend.calls().len() < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_click_cancels_outstanding_everything() {
    let gate = Arc::new(Semaphore::new(0));
    let mut h = harness_with(FakeBackend::gated(gate.clone()));
    h.ws.load_image(test_image());

    h.ws.run_everything();
    wait_for_calls(&h.backend, 1).await;

    h.ws.select_mode(Mode::Click);
    h.ws.add_point(Point::foreground(1.0, 1.0)).unwrap();
    gate.add_permits(2);
    h.ws.settle().await;

    assert_eq!(h.ws.path_state(DispatchPath::Everything), PathState::Superseded);
    assert_eq!(h.ws.path_state(DispatchPath::Click), PathState::Succeeded);
    assert_eq!(h.ws.masks().len(), 1);
    assert_eq!(call_index(&h.ws.masks()[0]), Some(1));
}

#[tokio::test]
async fn test_click_cancels_outstanding_text_prompt() {
    let gate = Arc::new(Semaphore::new(0));
    let mut h = harness_with(FakeBackend::gated(gate.clone()));
    h.ws.load_image(test_image());

    h.ws.set_prompt("bicycle");
    assert!(h.ws.send_text_prompt());
    wait_for_calls(&h.backend, 1).await;

    // Same mode, different path: the shared slot still aborts the prompt
    h.ws.add_point(Point::foreground(2.0, 2.0)).unwrap();
    gate.add_permits(2);
    h.ws.settle().await;

    assert_eq!(h.ws.path_state(DispatchPath::TextPrompt), PathState::Superseded);
    assert_eq!(call_index(&h.ws.masks()[0]), Some(1));
    assert_eq!(
        h.backend.calls(),
        vec![
            Call::Text("bicycle".to_string()),
            Call::Points(PointsPrompt::from_points(&[Point::foreground(2.0, 2.0)])),
        ]
    );
}

#[tokio::test]
async fn test_clean_segment_keeps_pending_embedding_fetch() {
    let gate = Arc::new(Semaphore::new(0));
    let mut h = harness_with(FakeBackend::gated(gate.clone()));
    h.ws.load_image(test_image());

    h.ws.select_mode(Mode::Embedding);
    wait_for_calls(&h.backend, 1).await;

    h.ws.clean_segment();
    assert!(h.ws.path_state(DispatchPath::EmbeddingFetch).is_in_flight());

    gate.add_permits(1);
    h.ws.settle().await;
    assert_eq!(h.ws.mode(), Mode::Embedding);
    assert!(h.ws.embedding().is_some());
    assert_eq!(h.ws.path_state(DispatchPath::EmbeddingFetch), PathState::Succeeded);

    h.ws.add_point(Point::foreground(1.0, 1.0)).unwrap();
    h.ws.settle().await;
    assert_eq!(h.ws.mask_raster().unwrap().painted_count(), 1);
    assert_eq!(h.backend.calls(), vec![Call::Embedding]);
}

#[tokio::test]
async fn test_clean_segment_cancels_other_requests() {
    let gate = Arc::new(Semaphore::new(0));
    let mut h = harness_with(FakeBackend::gated(gate.clone()));
    h.ws.load_image(test_image());

    h.ws.add_point(Point::foreground(1.0, 1.0)).unwrap();
    wait_for_calls(&h.backend, 1).await;
    h.ws.clean_segment();

    assert_eq!(h.ws.path_state(DispatchPath::Click), PathState::Superseded);
    assert!(!h.ws.is_processing());
    gate.add_permits(1);
    h.ws.settle().await;
    assert!(h.ws.masks().is_empty());
}

#[tokio::test]
async fn test_panicking_model_load_settles_and_retries() {
    let mut h = harness();
    h.loader.panics.store(true, Ordering::SeqCst);

    h.ws.select_mode(Mode::Embedding);
    h.ws.settle().await;

    assert_eq!(h.ws.path_state(DispatchPath::ModelLoad), PathState::Failed);
    assert!(!h.ws.decoder_ready());
    assert!(h.ws.embedding().is_some());

    h.loader.panics.store(false, Ordering::SeqCst);
    h.ws.select_mode(Mode::Click);
    h.ws.select_mode(Mode::Embedding);
    h.ws.settle().await;

    assert!(h.ws.decoder_ready());
    assert_eq!(h.loader.loads.load(Ordering::SeqCst), 2);
}
