//! Render engine implementation.
//!
//! The engine walks a captured stack snapshot over a source raster, then
//! resizes and encodes the result.

use crate::core::error::{KitError, KitResult};
use crate::core::operation::OperationDescriptor;
use crate::core::options::Options;
use crate::core::types::{ImageFormat, RasterImage};
use crate::operations::registry::OperationRegistry;
use crate::render::encoder::{Encoder, RasterEncoder};
use crate::render::request::{RenderRequest, RenderType, DEFAULT_MAX_OUTPUT_PIXELS};
use crate::render::tracker::{RenderCallback, RenderState, RenderStats, RenderTracker};
use crate::stack::structure::{ConfiguredOperation, OperationStack};
use image::imageops::FilterType;
use log::{info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// One stack entry plus the descriptor it resolved to when captured.
#[derive(Debug, Clone)]
pub struct PlannedStage {
    /// Stack index.
    pub index: usize,
    /// Configured entry, copied out of the stack.
    pub entry: ConfiguredOperation,
    /// `None` when the identifier was not registered at capture time.
    pub descriptor: Option<Arc<OperationDescriptor>>,
}

impl PlannedStage {
    /// Options with schema defaults filled in, as the stage will apply them.
    pub fn resolved_options(&self) -> Options {
        let mut options = self.entry.options.clone();
        if let Some(descriptor) = &self.descriptor {
            descriptor.schema().apply_defaults(&mut options);
        }
        options
    }

    /// Whether the stage leaves the raster unchanged. Unresolved stages never are.
    pub fn is_noop(&self) -> bool {
        match &self.descriptor {
            Some(descriptor) => descriptor.operation().is_noop(&self.resolved_options()),
            None => false,
        }
    }
}

/// Immutable snapshot of a stack and the descriptors it resolved to.
///
/// Later registry or stack changes never reach a captured plan.
#[derive(Debug, Clone, Default)]
pub struct RenderPlan {
    stages: Vec<PlannedStage>,
}

impl RenderPlan {
    /// Capture `stack` against `registry`.
    pub fn capture(stack: &OperationStack, registry: &OperationRegistry) -> Self {
        let stages = stack
            .iter()
            .enumerate()
            .map(|(index, entry)| PlannedStage {
                index,
                entry: entry.clone(),
                descriptor: registry.get(&entry.identifier).cloned(),
            })
            .collect();
        Self { stages }
    }

    /// Captured stages in application order.
    pub fn stages(&self) -> &[PlannedStage] {
        &self.stages
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the plan has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// The delivered render output.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutput {
    /// The final raster.
    Image(RasterImage),
    /// The encoded raster as a data URL.
    DataUrl(String),
}

impl RenderOutput {
    /// The raster, for `image` renders.
    pub fn as_image(&self) -> Option<&RasterImage> {
        match self {
            RenderOutput::Image(image) => Some(image),
            RenderOutput::DataUrl(_) => None,
        }
    }

    /// The data URL, for `data-url` renders.
    pub fn as_data_url(&self) -> Option<&str> {
        match self {
            RenderOutput::DataUrl(url) => Some(url),
            RenderOutput::Image(_) => None,
        }
    }

    /// Which render type produced this output.
    pub fn render_type(&self) -> RenderType {
        match self {
            RenderOutput::Image(_) => RenderType::Image,
            RenderOutput::DataUrl(_) => RenderType::DataUrl,
        }
    }
}

/// Result of a successful render.
#[derive(Debug, Clone)]
pub struct RenderResult {
    /// The output in the requested representation.
    pub output: RenderOutput,
    /// The requested image format.
    pub format: ImageFormat,
    /// Timing and counts.
    pub stats: RenderStats,
}

/// Render engine options.
#[derive(Clone)]
pub struct RenderOptions {
    /// Limit for each of the apply and encode phases.
    pub stage_timeout: Option<Duration>,
    /// Filter used when resizing.
    pub resize_filter: FilterType,
    /// Largest pixel count a resize may produce.
    pub max_output_pixels: u64,
    /// State callback.
    pub progress_callback: Option<Arc<RenderCallback>>,
}

impl std::fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderOptions")
            .field("stage_timeout", &self.stage_timeout)
            .field("resize_filter", &self.resize_filter)
            .field("max_output_pixels", &self.max_output_pixels)
            .field("progress_callback", &self.progress_callback.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            stage_timeout: None,
            resize_filter: FilterType::Lanczos3,
            max_output_pixels: DEFAULT_MAX_OUTPUT_PIXELS,
            progress_callback: None,
        }
    }
}

impl RenderOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-phase timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    /// Set the resize filter.
    pub fn with_resize_filter(mut self, filter: FilterType) -> Self {
        self.resize_filter = filter;
        self
    }

    /// Set the output pixel cap.
    pub fn with_max_output_pixels(mut self, max_pixels: u64) -> Self {
        self.max_output_pixels = max_pixels;
        self
    }

    /// Set a state callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(RenderState) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(Box::new(callback)));
        self
    }
}

/// Runs captured plans.
#[derive(Clone)]
pub struct RenderEngine {
    encoder: Arc<dyn Encoder>,
    options: RenderOptions,
}

impl RenderEngine {
    /// Create an engine with the default encoder.
    pub fn new() -> Self {
        Self::with_encoder(Arc::new(RasterEncoder::new()))
    }

    /// Create an engine with a custom encoder.
    pub fn with_encoder(encoder: Arc<dyn Encoder>) -> Self {
        Self {
            encoder,
            options: RenderOptions::default(),
        }
    }

    /// Set options.
    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Current options.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render `plan` over `source`.
    ///
    /// Apply and encode run on the blocking pool. Any failure aborts the whole
    /// render; nothing partial is delivered.
    pub async fn render(
        &self,
        source: RasterImage,
        plan: RenderPlan,
        request: RenderRequest,
    ) -> KitResult<RenderResult> {
        let tracker = RenderTracker::new_shared(self.options.progress_callback.clone());
        let result = self.run(source, plan, request, &tracker).await;
        match &result {
            Ok(result) => {
                tracker.advance(RenderState::Done);
                info!(
                    "Rendered {} stage(s) to {}x{} {} ({}) in {}ms",
                    result.stats.stages_applied,
                    result.stats.output_dimensions.0,
                    result.stats.output_dimensions.1,
                    result.format,
                    result.output.render_type(),
                    result.stats.total_ms
                );
            }
            Err(_) => tracker.fail(),
        }
        result
    }

    async fn run(
        &self,
        source: RasterImage,
        plan: RenderPlan,
        request: RenderRequest,
        tracker: &Arc<RenderTracker>,
    ) -> KitResult<RenderResult> {
        tracker.advance(RenderState::Validating);
        request.validate_within(self.options.max_output_pixels)?;

        let stages_applied = plan.len();
        let noop_stages = plan.stages().iter().filter(|s| s.is_noop()).count();

        let apply_start = Instant::now();
        let apply_tracker = tracker.clone();
        let raster = self
            .run_blocking("apply", move || {
                Self::apply_plan(&source, &plan, Some(apply_tracker.as_ref()))
            })
            .await?;
        let apply_ms = apply_start.elapsed().as_millis() as u64;

        tracker.advance(RenderState::Encoding);
        let encode_start = Instant::now();
        let encoder = self.encoder.clone();
        let filter = self.options.resize_filter;
        let max_pixels = self.options.max_output_pixels;
        let (output, output_dimensions) = self
            .run_blocking("encode", move || {
                Self::finish(raster, &request, filter, max_pixels, encoder.as_ref())
            })
            .await?;
        let encode_ms = encode_start.elapsed().as_millis() as u64;

        Ok(RenderResult {
            output,
            format: request.image_format,
            stats: RenderStats {
                stages_applied,
                noop_stages,
                apply_ms,
                encode_ms,
                total_ms: tracker.elapsed_ms(),
                output_dimensions,
            },
        })
    }

    /// Apply every stage of `plan` in order, synchronously.
    ///
    /// Each stage resolves its descriptor, fills schema defaults, validates
    /// against the raster it receives and applies.
    pub fn apply_plan(
        source: &RasterImage,
        plan: &RenderPlan,
        tracker: Option<&RenderTracker>,
    ) -> KitResult<RasterImage> {
        let mut current = source.clone();

        for stage in plan.stages() {
            if let Some(tracker) = tracker {
                tracker.advance(RenderState::Applying(stage.index));
            }

            let applied = Self::apply_stage(stage, &current);
            match applied {
                Ok(next) => current = next,
                Err(err) => {
                    warn!(
                        "Stage {} ('{}') failed, last good raster is {}x{}: {}",
                        stage.index,
                        stage.entry.identifier,
                        current.width(),
                        current.height(),
                        err
                    );
                    return Err(err);
                }
            }
        }

        Ok(current)
    }

    fn apply_stage(stage: &PlannedStage, input: &RasterImage) -> KitResult<RasterImage> {
        let descriptor = stage
            .descriptor
            .as_ref()
            .ok_or_else(|| KitError::UnknownOperation(stage.entry.identifier.clone()))?;

        let options = stage.resolved_options();
        descriptor
            .validate(&options, &input.info())
            .map_err(|e| e.at_stage(stage.index))?;

        descriptor
            .operation()
            .apply(input, &options)
            .map_err(|err| match err {
                KitError::InvalidOperationOptions(e) => e.at_stage(stage.index).into(),
                other => other,
            })
    }

    /// Resize if requested, then produce the requested representation.
    fn finish(
        raster: RasterImage,
        request: &RenderRequest,
        filter: FilterType,
        max_pixels: u64,
        encoder: &dyn Encoder,
    ) -> KitResult<(RenderOutput, (u32, u32))> {
        let raster = match request.dimensions {
            Some(dimensions) => {
                let (width, height) = dimensions.resolve_within(raster.dimensions(), max_pixels)?;
                if (width, height) == raster.dimensions() {
                    raster
                } else {
                    RasterImage::new(raster.image().resize_exact(width, height, filter))
                }
            }
            None => raster,
        };

        let dimensions = raster.dimensions();
        let output = match request.render_type {
            RenderType::Image => RenderOutput::Image(raster),
            RenderType::DataUrl => {
                RenderOutput::DataUrl(encoder.encode_data_url(&raster, request.image_format)?)
            }
        };
        Ok((output, dimensions))
    }

    /// Run `work` on the blocking pool, bounded by the stage timeout.
    async fn run_blocking<T, F>(&self, stage: &str, work: F) -> KitResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> KitResult<T> + Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(work);

        let joined = match self.options.stage_timeout {
            Some(limit) => match timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    return Err(KitError::Timeout {
                        stage: stage.to_string(),
                        timeout_ms: limit.as_millis() as u64,
                    })
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(result) => result,
            Err(e) => Err(KitError::TaskFailed(format!("{} task: {}", stage, e))),
        }
    }
}

impl Default for RenderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("options", &self.options)
            .finish()
    }
}
