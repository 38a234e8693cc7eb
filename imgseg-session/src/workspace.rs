//! Interactive segmentation workspace
//!
//! The workspace owns one [`SessionState`] and decides, on every state
//! change, whether a backend request or a local decoder run is due. Async
//! work never touches state directly: each task posts a [`Completion`] back
//! through a channel and the owner applies it with [`Workspace::apply`] (or
//! [`Workspace::settle`]). Every completion carries the generation it was
//! issued under, so results of superseded work are dropped instead of
//! overwriting newer state.
//!
//! All remote paths share a single cancellation slot. Starting any backend
//! request aborts the one before it, whichever path issued it.

use crate::completion::{Completion, RemoteOutcome};
use crate::notify::{Notification, NotificationQueue};
use crate::path::{DispatchPath, PathState, PathTracker};
use crate::sink::ResultSink;
use crate::state::SessionState;
use imgseg_client::SegmentBackend;
use imgseg_core::{
    BoxPrompt, EmbeddingTensor, ImageSource, Mask, MaskExport, MaskRaster, Mode, Point, Result,
    SegmentConfig, SegmentError,
};
use imgseg_onnx::{DecoderInput, DecoderLoader, MaskDecoder, ModelScale};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// Message shown after a successful clipboard export
pub const COPIED_MESSAGE: &str = "Copied";

/// Destinations for the two export actions
#[derive(Clone)]
pub struct ExportSinks {
    pub file: Arc<dyn ResultSink>,
    pub clipboard: Arc<dyn ResultSink>,
}

enum DecoderSlot {
    Absent,
    Loading,
    Ready(Arc<dyn MaskDecoder>),
}

struct RemoteRequest {
    path: DispatchPath,
    generation: u64,
    handle: JoinHandle<()>,
}

enum RemoteCall {
    Points(Vec<Point>),
    Box(BoxPrompt),
    Text(String),
    Everything,
    Embedding,
}

impl RemoteCall {
    fn path(&self) -> DispatchPath {
        match self {
            RemoteCall::Points(_) => DispatchPath::Click,
            RemoteCall::Box(_) => DispatchPath::Box,
            RemoteCall::Text(_) => DispatchPath::TextPrompt,
            RemoteCall::Everything => DispatchPath::Everything,
            RemoteCall::Embedding => DispatchPath::EmbeddingFetch,
        }
    }

    async fn execute(self, backend: &dyn SegmentBackend, image: &ImageSource) -> RemoteOutcome {
        match self {
            RemoteCall::Points(points) => {
                RemoteOutcome::Masks(backend.segment_points(image, &points).await)
            }
            RemoteCall::Box(prompt) => {
                RemoteOutcome::Masks(backend.segment_box(image, prompt).await)
            }
            RemoteCall::Text(text) => {
                RemoteOutcome::Masks(backend.segment_text(image, &text).await)
            }
            RemoteCall::Everything => RemoteOutcome::Masks(backend.segment_everything(image).await),
            RemoteCall::Embedding => RemoteOutcome::Embedding(backend.fetch_embedding(image).await),
        }
    }
}

/// Session state machine plus the dispatcher driving it
pub struct Workspace {
    config: Arc<SegmentConfig>,
    backend: Arc<dyn SegmentBackend>,
    loader: Arc<dyn DecoderLoader>,
    sinks: ExportSinks,
    state: SessionState,
    decoder: DecoderSlot,
    paths: PathTracker,
    remote: Option<RemoteRequest>,
    remote_generation: u64,
    model_generation: u64,
    inference_generation: u64,
    notifications: NotificationQueue,
    events_tx: mpsc::UnboundedSender<Completion>,
    events_rx: mpsc::UnboundedReceiver<Completion>,
}

impl Workspace {
    /// Create an empty workspace. Must be called inside a tokio runtime
    /// before any operation that dispatches work.
    pub fn new(
        config: Arc<SegmentConfig>,
        backend: Arc<dyn SegmentBackend>,
        loader: Arc<dyn DecoderLoader>,
        sinks: ExportSinks,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            backend,
            loader,
            sinks,
            state: SessionState::default(),
            decoder: DecoderSlot::Absent,
            paths: PathTracker::new(),
            remote: None,
            remote_generation: 0,
            model_generation: 0,
            inference_generation: 0,
            notifications: NotificationQueue::new(),
            events_tx,
            events_rx,
        }
    }

    // ----- accessors -----

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    pub fn image(&self) -> Option<&ImageSource> {
        self.state.image.as_ref()
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn points(&self) -> &[Point] {
        &self.state.points
    }

    pub fn masks(&self) -> &[Mask] {
        self.state.store.masks()
    }

    /// Raster produced by the local decoder, if any
    pub fn mask_raster(&self) -> Option<&MaskRaster> {
        self.state.mask_raster.as_ref()
    }

    pub fn box_ready(&self) -> bool {
        self.state.box_ready
    }

    pub fn prompt(&self) -> &str {
        &self.state.prompt
    }

    pub fn scale(&self) -> f64 {
        self.state.scale
    }

    pub fn embedding(&self) -> Option<&EmbeddingTensor> {
        self.state.embedding.as_deref()
    }

    pub fn decoder_ready(&self) -> bool {
        matches!(self.decoder, DecoderSlot::Ready(_))
    }

    /// True while any path has work outstanding
    pub fn is_processing(&self) -> bool {
        self.paths.any_in_flight()
    }

    pub fn path_state(&self, path: DispatchPath) -> PathState {
        self.paths.state(path)
    }

    pub fn in_flight(&self) -> Vec<DispatchPath> {
        self.paths.in_flight()
    }

    pub fn notifications(&self, now: Instant) -> Vec<&Notification> {
        self.notifications.active(now)
    }

    pub fn prune_notifications(&mut self, now: Instant) {
        self.notifications.prune(now);
    }

    /// Displayable overlay for the current mode.
    ///
    /// Embedding mode shows the decoder raster; every other mode composites
    /// the stored backend masks at the image size.
    pub fn overlay(&self) -> Option<MaskRaster> {
        if self.state.mode == Mode::Embedding {
            return self.state.mask_raster.clone();
        }
        let image = self.state.image.as_ref()?;
        if self.state.store.is_empty() {
            return None;
        }
        Some(
            self.state
                .store
                .overlay(image.width(), image.height(), self.config.overlay_color),
        )
    }

    // ----- operations -----

    /// Start a new session on `image`. Points, masks, raster, embedding and
    /// mode are reset; a loaded decoder is kept.
    pub fn load_image(&mut self, image: ImageSource) {
        info!(
            "Loading image {} ({}x{})",
            image.file_name(),
            image.width(),
            image.height()
        );
        self.cancel_remote();
        self.invalidate_inference();
        self.state.reset();
        self.state.image = Some(image);
    }

    pub fn select_mode(&mut self, mode: Mode) {
        debug!("Selecting mode {}", mode);
        match mode {
            Mode::Click | Mode::Box => {
                self.reset_annotations();
                self.state.mode = mode;
            }
            Mode::Everything => self.run_everything(),
            Mode::Embedding => self.enter_embedding(),
        }
    }

    /// Record a click and run whatever the current mode triggers on it
    pub fn add_point(&mut self, point: Point) -> Result<()> {
        point.validate()?;
        if self.state.image.is_none() {
            return Err(SegmentError::InvalidInput("No image loaded".to_string()));
        }

        match self.state.mode {
            Mode::Click => {
                self.state.points.push(point);
                let points = self.state.points.clone();
                self.dispatch_remote(RemoteCall::Points(points));
            }
            Mode::Box => {
                // A third corner starts a new box
                if self.state.points.len() >= 2 {
                    self.state.points.clear();
                }
                self.state.points.push(point);
                self.maybe_dispatch_box();
            }
            Mode::Everything => self.state.points.push(point),
            Mode::Embedding => {
                self.state.points.push(point);
                self.maybe_run_inference();
            }
        }
        Ok(())
    }

    /// Finish a box drag from corner `a` to corner `b`
    pub fn draw_box(&mut self, a: Point, b: Point) -> Result<()> {
        a.validate()?;
        b.validate()?;
        if self.state.image.is_none() {
            return Err(SegmentError::InvalidInput("No image loaded".to_string()));
        }
        if self.state.mode != Mode::Box {
            return Err(SegmentError::InvalidInput(format!(
                "Boxes can only be drawn in box mode, current mode is {}",
                self.state.mode
            )));
        }
        self.state.points = vec![a, b];
        self.state.box_ready = true;
        self.maybe_dispatch_box();
        Ok(())
    }

    /// Arm or disarm the box trigger
    pub fn set_box_ready(&mut self, ready: bool) {
        self.state.box_ready = ready;
        self.maybe_dispatch_box();
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.state.prompt = prompt.into();
    }

    /// Send the current prompt to the text endpoint. Returns false when
    /// nothing was sent (no image or blank prompt).
    pub fn send_text_prompt(&mut self) -> bool {
        let text = self.state.prompt.trim().to_string();
        if text.is_empty() || self.state.image.is_none() {
            debug!("Ignoring text prompt: nothing to send");
            return false;
        }
        self.invalidate_inference();
        self.dispatch_remote(RemoteCall::Text(text));
        true
    }

    /// Segment everything in the image, discarding current annotations
    pub fn run_everything(&mut self) {
        self.reset_annotations();
        self.state.mode = Mode::Everything;
        self.dispatch_remote(RemoteCall::Everything);
    }

    pub fn set_scale(&mut self, scale: f64) -> Result<()> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(SegmentError::InvalidInput(format!(
                "Scale must be a positive finite number, got {}",
                scale
            )));
        }
        self.state.scale = scale;
        Ok(())
    }

    /// Drop points and results but keep the image and mode
    pub fn clean_segment(&mut self) {
        info!("Cleaning segmentation");
        // The embedding belongs to the image, so a pending fetch keeps running
        let fetching = matches!(
            &self.remote,
            Some(req) if req.path == DispatchPath::EmbeddingFetch
        );
        if !fetching {
            self.cancel_remote();
        }
        self.invalidate_inference();
        self.state.clear_segment();
    }

    /// Drop everything including the image
    pub fn clean_all(&mut self) {
        info!("Cleaning workspace");
        self.cancel_remote();
        self.invalidate_inference();
        self.state.reset();
    }

    /// `{masks, points}` document for the current results
    pub fn export_json(&self) -> Result<String> {
        MaskExport::new(self.state.store.masks(), &self.state.points).to_json()
    }

    pub fn export_to_file(&self) -> Result<()> {
        let json = self.export_json()?;
        self.sinks.file.deliver(&json)
    }

    /// Copy the export to the clipboard and raise the confirmation popup
    pub fn export_to_clipboard(&mut self) -> Result<()> {
        let json = self.export_json()?;
        self.sinks.clipboard.deliver(&json)?;
        self.notifications
            .push(COPIED_MESSAGE, self.config.popup_timeout(), Instant::now());
        Ok(())
    }

    // ----- completion handling -----

    /// Apply a finished operation. Returns false if it was stale and dropped.
    pub fn apply(&mut self, completion: Completion) -> bool {
        debug!(
            "Applying {} completion (generation {})",
            completion.path(),
            completion.generation()
        );
        match completion {
            Completion::Remote {
                path,
                generation,
                outcome,
            } => self.apply_remote(path, generation, outcome),
            Completion::ModelLoaded { generation, result } => {
                if generation != self.model_generation {
                    debug!("Dropping stale model load (generation {})", generation);
                    return false;
                }
                let outcome = match result {
                    Ok(decoder) => {
                        info!("Decoder loaded");
                        self.decoder = DecoderSlot::Ready(decoder);
                        PathState::Succeeded
                    }
                    Err(e) => {
                        warn!("Decoder load failed: {}", e);
                        self.decoder = DecoderSlot::Absent;
                        PathState::Failed
                    }
                };
                self.paths.settle(DispatchPath::ModelLoad, generation, outcome);
                self.maybe_run_inference();
                true
            }
            Completion::Inference { generation, result } => {
                if generation != self.inference_generation {
                    debug!("Dropping stale inference result (generation {})", generation);
                    return false;
                }
                let outcome = match result {
                    Ok(raster) => {
                        debug!("Inference painted {} pixels", raster.painted_count());
                        self.state.mask_raster = Some(raster);
                        PathState::Succeeded
                    }
                    Err(e) => {
                        warn!("Local inference failed: {}", e);
                        PathState::Failed
                    }
                };
                self.paths
                    .settle(DispatchPath::LocalInference, generation, outcome);
                true
            }
        }
    }

    /// Wait for the next posted completion without applying it
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.events_rx.recv().await
    }

    /// Apply every completion already posted; returns how many were current
    pub fn poll_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.events_rx.try_recv() {
            if self.apply(completion) {
                applied += 1;
            }
        }
        applied
    }

    /// Apply completions until no path is in flight
    pub async fn settle(&mut self) {
        while self.paths.any_in_flight() {
            match self.next_completion().await {
                Some(completion) => {
                    self.apply(completion);
                }
                None => break,
            }
        }
    }

    fn apply_remote(
        &mut self,
        path: DispatchPath,
        generation: u64,
        outcome: RemoteOutcome,
    ) -> bool {
        let current = matches!(
            &self.remote,
            Some(req) if req.path == path && req.generation == generation
        );
        if !current {
            debug!("Dropping stale {} response (generation {})", path, generation);
            return false;
        }
        self.remote = None;

        let settled = match outcome {
            RemoteOutcome::Masks(Ok(masks)) => {
                info!("{} returned {} masks", path, masks.len());
                self.state.store.replace(masks);
                if path == DispatchPath::Box {
                    self.state.points.clear();
                }
                PathState::Succeeded
            }
            RemoteOutcome::Embedding(Ok(tensor)) => {
                info!("Embedding received with shape {:?}", tensor.shape());
                self.state.embedding = Some(Arc::new(tensor));
                PathState::Succeeded
            }
            RemoteOutcome::Masks(Err(e)) | RemoteOutcome::Embedding(Err(e)) => {
                warn!("{} request failed: {}", path, e);
                PathState::Failed
            }
        };
        if path == DispatchPath::Box {
            self.state.box_ready = false;
        }
        self.paths.settle(path, generation, settled);

        if path == DispatchPath::EmbeddingFetch && settled == PathState::Succeeded {
            self.maybe_run_inference();
        }
        true
    }

    // ----- dispatch -----

    fn reset_annotations(&mut self) {
        self.cancel_remote();
        self.invalidate_inference();
        self.state.clear_segment();
    }

    fn enter_embedding(&mut self) {
        self.reset_annotations();
        self.state.mode = Mode::Embedding;
        if self.state.image.is_none() {
            return;
        }
        self.start_model_load();
        if self.state.embedding.is_none() {
            self.dispatch_remote(RemoteCall::Embedding);
        }
    }

    fn maybe_dispatch_box(&mut self) {
        if self.state.mode != Mode::Box || !self.state.box_ready {
            return;
        }
        if let Some(prompt) = BoxPrompt::from_points(&self.state.points) {
            self.dispatch_remote(RemoteCall::Box(prompt));
        }
    }

    /// Abort the outstanding backend request, if any
    fn cancel_remote(&mut self) {
        if let Some(req) = self.remote.take() {
            debug!("Cancelling {} request (generation {})", req.path, req.generation);
            req.handle.abort();
            self.paths.supersede(req.path);
        }
    }

    /// Make any pending decoder result stale
    fn invalidate_inference(&mut self) {
        self.inference_generation += 1;
        self.paths.supersede(DispatchPath::LocalInference);
    }

    fn dispatch_remote(&mut self, call: RemoteCall) {
        let Some(image) = self.state.image.clone() else {
            return;
        };
        self.cancel_remote();

        let path = call.path();
        self.remote_generation += 1;
        let generation = self.remote_generation;
        self.paths.begin(path, generation);
        info!("Dispatching {} request (generation {})", path, generation);

        let backend = self.backend.clone();
        let tx = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            let outcome = call.execute(backend.as_ref(), &image).await;
            let _ = tx.send(Completion::Remote {
                path,
                generation,
                outcome,
            });
        });
        self.remote = Some(RemoteRequest {
            path,
            generation,
            handle,
        });
    }

    fn start_model_load(&mut self) {
        if !matches!(self.decoder, DecoderSlot::Absent) {
            return;
        }
        self.decoder = DecoderSlot::Loading;
        self.model_generation += 1;
        let generation = self.model_generation;
        self.paths.begin(DispatchPath::ModelLoad, generation);
        info!("Loading local decoder");

        let loader = self.loader.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = match tokio::spawn(async move { loader.load().await }).await {
                Ok(result) => result,
                Err(e) => Err(task_failure("Decoder load", e)),
            };
            let _ = tx.send(Completion::ModelLoaded { generation, result });
        });
    }

    /// Run the decoder when mode, points, embedding and model all line up
    fn maybe_run_inference(&mut self) {
        if self.state.mode != Mode::Embedding || self.state.points.is_empty() {
            return;
        }
        let decoder = match &self.decoder {
            DecoderSlot::Ready(decoder) => decoder.clone(),
            _ => return,
        };
        let Some(embedding) = self.state.embedding.clone() else {
            return;
        };
        let Some(image) = &self.state.image else {
            return;
        };
        let (width, height) = (image.width(), image.height());

        let scale = ModelScale::new(self.config.sam_scale, width, height);
        let input = match DecoderInput::build(&self.state.points, embedding, scale) {
            Ok(input) => input,
            Err(e) => {
                warn!("Cannot build decoder input: {}", e);
                return;
            }
        };

        self.inference_generation += 1;
        let generation = self.inference_generation;
        self.paths.begin(DispatchPath::LocalInference, generation);
        debug!(
            "Running local inference with {} points (generation {})",
            input.point_count(),
            generation
        );

        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = match tokio::task::spawn_blocking(move || decoder.decode(&input)).await {
                Ok(result) => result,
                Err(e) => Err(task_failure("Decoder", e)),
            };
            let _ = tx.send(Completion::Inference { generation, result });
        });
    }
}

/// Map a lost task to an error so its path still settles
fn task_failure(task: &str, err: JoinError) -> SegmentError {
    if err.is_cancelled() {
        SegmentError::Cancelled
    } else {
        SegmentError::Inference(format!("{} task failed: {}", task, err))
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(req) = self.remote.take() {
            req.handle.abort();
        }
    }
}
