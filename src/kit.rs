//! The editing-session facade.
//!
//! A [`Kit`] owns one source image, one operation registry and one operation
//! stack. Every method takes `&self`; the registry and stack live behind a
//! single mutex, so a `Kit` can be shared through an `Arc`.

use crate::config::KitConfig;
use crate::core::error::{KitError, KitResult, ValidationReport};
use crate::core::operation::{Operation, OperationDescriptor, OperationMetadata};
use crate::core::options::Options;
use crate::core::types::RasterImage;
use crate::operations::registry::OperationRegistry;
use crate::render::encoder::Encoder;
use crate::render::engine::{RenderEngine, RenderPlan, RenderResult};
use crate::render::request::RenderRequest;
use crate::render::tracker::RenderState;
use crate::stack::serialization::SerializedStack;
use crate::stack::structure::{ConfiguredOperation, OperationStack};
use crate::validation::StackValidator;
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;

/// Mutable state of a session.
struct Session {
    source: RasterImage,
    registry: OperationRegistry,
    stack: OperationStack,
}

/// An image-editing session.
pub struct Kit {
    session: Mutex<Session>,
    config: KitConfig,
    engine: RenderEngine,
}

impl Kit {
    /// Create a new builder.
    pub fn builder() -> KitBuilder {
        KitBuilder::new()
    }

    /// Create a session over `source` with default configuration.
    pub fn new(source: RasterImage) -> KitResult<Self> {
        Self::builder().source(source).build()
    }

    /// Session configuration.
    pub fn config(&self) -> &KitConfig {
        &self.config
    }

    /// The current source image.
    pub fn source(&self) -> RasterImage {
        self.session.lock().source.clone()
    }

    /// Replace the source image. The stack and registry are kept.
    pub fn set_source(&self, source: RasterImage) -> KitResult<()> {
        check_source(&source)?;
        self.session.lock().source = source;
        Ok(())
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Restore the default registry and empty the stack.
    pub fn reset(&self) {
        let mut session = self.session.lock();
        session.registry.reset();
        session.stack.clear();
        debug!("Session reset");
    }

    /// Register an operation.
    pub fn register<O>(&self, operation: O) -> KitResult<()>
    where
        O: Operation + 'static,
    {
        self.register_descriptor(OperationDescriptor::new(operation))
    }

    /// Register a prepared descriptor.
    pub fn register_descriptor(&self, descriptor: OperationDescriptor) -> KitResult<()> {
        self.session.lock().registry.register(descriptor)
    }

    /// Unregister an operation. Returns whether an entry was removed.
    pub fn unregister(&self, identifier: &str) -> bool {
        self.session.lock().registry.unregister(identifier)
    }

    /// Registered identifiers in registration order.
    pub fn identifiers(&self) -> Vec<String> {
        self.session
            .lock()
            .registry
            .identifiers()
            .map(String::from)
            .collect()
    }

    /// Metadata of a registered operation.
    pub fn describe(&self, identifier: &str) -> KitResult<OperationMetadata> {
        let descriptor = self.session.lock().registry.resolve(identifier)?;
        Ok(descriptor.metadata().clone())
    }

    // ========================================================================
    // Stack
    // ========================================================================

    /// Append an operation; it is applied last.
    pub fn push(&self, identifier: &str, options: Options) -> KitResult<()> {
        let mut session = self.session.lock();
        let Session { registry, stack, .. } = &mut *session;
        stack.push(ConfiguredOperation::new(identifier, options), registry)
    }

    /// Insert an operation at `index` in `[0, len]`.
    pub fn insert_at(&self, index: usize, identifier: &str, options: Options) -> KitResult<()> {
        let mut session = self.session.lock();
        let Session { registry, stack, .. } = &mut *session;
        stack.insert_at(index, ConfiguredOperation::new(identifier, options), registry)
    }

    /// Remove the operation at `index`.
    pub fn remove_at(&self, index: usize) -> KitResult<ConfiguredOperation> {
        self.session.lock().stack.remove_at(index)
    }

    /// Move the operation at `from` to `to`.
    pub fn move_to(&self, from: usize, to: usize) -> KitResult<()> {
        self.session.lock().stack.move_to(from, to)
    }

    /// Replace the operation at `index`.
    pub fn replace(
        &self,
        index: usize,
        identifier: &str,
        options: Options,
    ) -> KitResult<ConfiguredOperation> {
        let mut session = self.session.lock();
        let Session { registry, stack, .. } = &mut *session;
        stack.replace(index, ConfiguredOperation::new(identifier, options), registry)
    }

    /// Merge `options` into the operation at `index`.
    pub fn set_options(&self, index: usize, options: Options) -> KitResult<()> {
        let mut session = self.session.lock();
        let Session { registry, stack, .. } = &mut *session;
        stack.set_options(index, options, registry)
    }

    /// Empty the stack. The registry is untouched.
    pub fn clear(&self) {
        self.session.lock().stack.clear();
    }

    /// Ordered copy of the stack.
    pub fn operations(&self) -> Vec<ConfiguredOperation> {
        self.session.lock().stack.to_list()
    }

    /// Serialize the stack as a JSON preset.
    pub fn export_stack(&self) -> KitResult<String> {
        let preset = SerializedStack::from(&self.session.lock().stack);
        Ok(preset.to_json()?)
    }

    /// Replace the stack with a JSON preset.
    ///
    /// Entries get the same checks as [`Kit::push`]; on error the current
    /// stack is kept.
    pub fn import_stack(&self, json: &str) -> KitResult<()> {
        let preset = SerializedStack::from_json(json)?;
        let mut session = self.session.lock();
        let Session { registry, stack, .. } = &mut *session;

        let mut imported = OperationStack::new();
        for entry in preset.operations {
            imported.push(entry, registry)?;
        }
        debug!("Imported {} operation(s) from preset", imported.len());
        *stack = imported;
        Ok(())
    }

    // ========================================================================
    // Validation and Rendering
    // ========================================================================

    /// Capture the source and an immutable plan of the current stack.
    fn snapshot(&self) -> (RasterImage, RenderPlan) {
        let session = self.session.lock();
        (
            session.source.clone(),
            RenderPlan::capture(&session.stack, &session.registry),
        )
    }

    /// Check the stack against the source dimensions without touching pixels.
    pub fn validate(&self) -> ValidationReport {
        let (source, plan) = self.snapshot();
        StackValidator::new().validate(&plan, source.info())
    }

    /// Render the current stack.
    ///
    /// The stack and registry are captured when the future first runs; later
    /// changes do not affect it.
    pub async fn render(&self, request: RenderRequest) -> KitResult<RenderResult> {
        request.validate_within(self.engine.options().max_output_pixels)?;
        let (source, plan) = self.snapshot();
        debug!(
            "Rendering {} stage(s) over {}x{} source",
            plan.len(),
            source.width(),
            source.height()
        );
        self.engine.render(source, plan, request).await
    }

    /// Render with the configured defaults.
    pub async fn render_default(&self) -> KitResult<RenderResult> {
        self.render(self.config.render.default_request()).await
    }

    /// Render from external string forms; `None` uses the configured default.
    pub async fn render_with(
        &self,
        render_type: Option<&str>,
        image_format: Option<&str>,
        dimensions: Option<&str>,
    ) -> KitResult<RenderResult> {
        let request = self
            .config
            .render
            .default_request()
            .parse_over(render_type, image_format, dimensions)?;
        self.render(request).await
    }
}

impl std::fmt::Debug for Kit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.session.lock();
        f.debug_struct("Kit")
            .field("source", &session.source.info())
            .field("registry", &session.registry.identifiers().collect::<Vec<_>>())
            .field("stack", &session.stack.len())
            .field("config", &self.config)
            .finish()
    }
}

fn check_source(source: &RasterImage) -> KitResult<()> {
    if source.width() == 0 || source.height() == 0 {
        return Err(KitError::InvalidConfiguration(format!(
            "source image has zero dimensions ({}x{})",
            source.width(),
            source.height()
        )));
    }
    Ok(())
}

/// Builder for a [`Kit`].
pub struct KitBuilder {
    source: Option<RasterImage>,
    config: KitConfig,
    encoder: Option<Arc<dyn Encoder>>,
    extra: Vec<OperationDescriptor>,
    progress: Option<Box<dyn Fn(RenderState) + Send + Sync>>,
}

impl KitBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            source: None,
            config: KitConfig::default(),
            encoder: None,
            extra: Vec::new(),
            progress: None,
        }
    }

    /// Set the source image.
    pub fn source(mut self, source: RasterImage) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: KitConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default encoder.
    pub fn encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Register a custom operation after the built-ins.
    pub fn register<O>(mut self, operation: O) -> Self
    where
        O: Operation + 'static,
    {
        self.extra.push(OperationDescriptor::new(operation));
        self
    }

    /// Observe render state transitions.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(RenderState) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Build the session.
    pub fn build(self) -> KitResult<Kit> {
        let source = self.source.ok_or_else(|| {
            KitError::InvalidConfiguration("a source image is required".to_string())
        })?;
        check_source(&source)?;
        self.config.validate()?;

        let mut registry = OperationRegistry::with_builtins();
        registry.set_strict(self.config.registry.strict);
        for descriptor in self.extra {
            registry.register(descriptor)?;
        }

        let encoder = self
            .encoder
            .unwrap_or_else(|| Arc::new(self.config.render.encoder()) as Arc<dyn Encoder>);
        let mut options = self.config.render.render_options();
        if let Some(callback) = self.progress {
            options.progress_callback = Some(Arc::new(callback));
        }
        let engine = RenderEngine::with_encoder(encoder).with_options(options);

        info!(
            "Session ready: {}x{} source, {} operation(s) registered",
            source.width(),
            source.height(),
            registry.len()
        );

        Ok(Kit {
            session: Mutex::new(Session {
                source,
                registry,
                stack: OperationStack::new(),
            }),
            config: self.config,
            engine,
        })
    }
}

impl Default for KitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::InvalidOptionsError;
    use crate::core::operation::Category;
    use crate::core::types::{ImageFormat, ImageInfo};
    use crate::render::encoder::{parse_data_url, RasterEncoder};
    use crate::render::request::RenderType;
    use image::{DynamicImage, Rgba, RgbaImage};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    /// Each pixel encodes its own coordinates: R = x, G = y.
    fn coordinate_source(width: u32, height: u32) -> RasterImage {
        RasterImage::new(DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([x as u8, y as u8, 42, 255])
        })))
    }

    fn kit(width: u32, height: u32) -> Kit {
        Kit::new(coordinate_source(width, height)).unwrap()
    }

    fn crop(x: i64, y: i64, width: i64, height: i64) -> Options {
        Options::new()
            .with("x", x)
            .with("y", y)
            .with("width", width)
            .with("height", height)
    }

    fn angle(degrees: i64) -> Options {
        Options::new().with("angle", degrees)
    }

    fn pixel(raster: &RasterImage, x: u32, y: u32) -> (u8, u8) {
        let p = raster.image().to_rgba8().get_pixel(x, y).0;
        (p[0], p[1])
    }

    fn image_of(result: &RenderResult) -> &RasterImage {
        result.output.as_image().expect("image output")
    }

    /// Counts how often it is applied.
    struct CountingOperation {
        calls: Arc<AtomicUsize>,
    }

    impl Operation for CountingOperation {
        fn metadata(&self) -> OperationMetadata {
            OperationMetadata::builder("count", "Count").build()
        }

        fn validate(&self, _: &Options, _: &ImageInfo) -> Result<(), InvalidOptionsError> {
            Ok(())
        }

        fn apply(&self, input: &RasterImage, _: &Options) -> KitResult<RasterImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(input.clone())
        }
    }

    /// Paints the raster one color, optionally waiting on two barriers first.
    struct TintOperation {
        color: [u8; 4],
        gates: Option<(Arc<Barrier>, Arc<Barrier>)>,
        delay: Option<Duration>,
    }

    impl TintOperation {
        fn new(color: [u8; 4]) -> Self {
            Self {
                color,
                gates: None,
                delay: None,
            }
        }
    }

    impl Operation for TintOperation {
        fn metadata(&self) -> OperationMetadata {
            OperationMetadata::builder("tint", "Tint")
                .category(Category::Color)
                .build()
        }

        fn validate(&self, _: &Options, _: &ImageInfo) -> Result<(), InvalidOptionsError> {
            Ok(())
        }

        fn apply(&self, input: &RasterImage, _: &Options) -> KitResult<RasterImage> {
            if let Some((started, release)) = &self.gates {
                started.wait();
                release.wait();
            }
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            let (w, h) = input.dimensions();
            Ok(RasterImage::new(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                w,
                h,
                Rgba(self.color),
            ))))
        }
    }

    #[test]
    fn test_builder_requires_valid_source() {
        let err = Kit::builder().build().unwrap_err();
        assert!(matches!(err, KitError::InvalidConfiguration(_)));

        let empty = RasterImage::new(DynamicImage::new_rgba8(0, 10));
        let err = Kit::new(empty).unwrap_err();
        assert!(matches!(err, KitError::InvalidConfiguration(_)));

        let mut config = KitConfig::default();
        config.render.jpeg_quality = 0;
        let err = Kit::builder()
            .source(coordinate_source(2, 2))
            .config(config)
            .build()
            .unwrap_err();
        assert!(matches!(err, KitError::Config(_)));
    }

    #[tokio::test]
    async fn test_identity_for_every_output_pair() {
        let kit = kit(16, 9);
        let source = kit.source();
        let encoder = RasterEncoder::new();

        for render_type in RenderType::ALL {
            for format in ImageFormat::ALL {
                let request = RenderRequest::new()
                    .with_render_type(render_type)
                    .with_format(format);
                let result = kit.render(request).await.unwrap();
                assert_eq!(result.format, format);

                match render_type {
                    RenderType::Image => assert_eq!(image_of(&result), &source),
                    RenderType::DataUrl => {
                        let url = result.output.as_data_url().unwrap();
                        assert_eq!(url, encoder.encode_data_url(&source, format).unwrap());
                        let (parsed, bytes) = parse_data_url(url).unwrap();
                        assert_eq!(parsed, format);
                        let decoded = RasterImage::from_bytes(&bytes).unwrap();
                        assert_eq!(decoded.dimensions(), source.dimensions());
                        if format == ImageFormat::Png {
                            assert_eq!(decoded, source);
                        }
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_invalid_render_parameters_run_no_operation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let kit = kit(4, 4);
        kit.register(CountingOperation { calls: calls.clone() }).unwrap();
        kit.push("count", Options::new()).unwrap();

        for (render_type, format, dimensions) in [
            (Some("bitmap"), None, None),
            (None, Some("image/webp"), None),
            (None, None, Some("0x0")),
            (None, None, Some("wide")),
        ] {
            let err = kit.render_with(render_type, format, dimensions).await.unwrap_err();
            assert!(matches!(err, KitError::InvalidRenderParameter(_)), "{err}");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        kit.render_with(Some("image"), Some("image/png"), None).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_crop_rotation_scenario() {
        let kit = kit(100, 200);

        kit.push("crop", crop(0, 0, 100, 100)).unwrap();
        kit.push("rotation", angle(90)).unwrap();
        let crop_first = kit.render(RenderRequest::new()).await.unwrap();

        kit.move_to(1, 0).unwrap();
        assert_eq!(kit.operations()[0].identifier, "rotation");
        let rotate_first = kit.render(RenderRequest::new()).await.unwrap();

        let a = image_of(&crop_first);
        let b = image_of(&rotate_first);
        assert_eq!(a.dimensions(), (100, 100));
        assert_eq!(b.dimensions(), (100, 100));

        // Clockwise rotation puts the bottom-left of its input at the top-left.
        assert_eq!(pixel(a, 0, 0), (0, 99));
        assert_eq!(pixel(b, 0, 0), (0, 199));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_crop_checked_against_upstream_width() {
        let kit = kit(100, 200);

        // Accepted at push time: only the schema is checked there.
        kit.push("crop", crop(0, 0, 150, 50)).unwrap();
        let err = kit.render(RenderRequest::new()).await.unwrap_err();
        match err {
            KitError::InvalidOperationOptions(e) => {
                assert_eq!(e.operation, "crop");
                assert_eq!(e.option, "width");
                assert_eq!(e.stage, Some(0));
            }
            other => panic!("unexpected error: {other}"),
        }

        // A preceding rotation widens the raster to 200, so the same crop fits.
        kit.insert_at(0, "rotation", angle(90)).unwrap();
        let result = kit.render(RenderRequest::new()).await.unwrap();
        assert_eq!(image_of(&result).dimensions(), (150, 50));
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let kit = kit(12, 7);
        kit.register(TintOperation::new([255, 0, 0, 255])).unwrap();
        kit.push("tint", Options::new()).unwrap();
        kit.push("rotation", angle(180)).unwrap();

        kit.reset();
        assert!(kit.operations().is_empty());
        assert_eq!(kit.identifiers(), vec!["filters", "rotation", "crop"]);
        let first = kit.render_with(Some("data-url"), Some("png"), None).await.unwrap();

        kit.reset();
        let second = kit.render_with(Some("data-url"), Some("png"), None).await.unwrap();
        assert_eq!(first.output, second.output);
    }

    #[tokio::test]
    async fn test_unknown_operation_fails_at_render() {
        let kit = kit(5, 5);
        kit.push("rotation", angle(90)).unwrap();
        kit.push("sharpen", Options::new().with("amount", 2)).unwrap();

        let err = kit.render(RenderRequest::new()).await.unwrap_err();
        assert!(matches!(err, KitError::UnknownOperation(ref id) if id == "sharpen"));

        kit.unregister("rotation");
        kit.remove_at(1).unwrap();
        let err = kit.render(RenderRequest::new()).await.unwrap_err();
        assert!(matches!(err, KitError::UnknownOperation(ref id) if id == "rotation"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reregistration_does_not_reach_inflight_render() {
        let started = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let kit = Arc::new(kit(3, 3));

        let red = [255, 0, 0, 255];
        let blue = [0, 0, 255, 255];
        kit.register(TintOperation {
            color: red,
            gates: Some((started.clone(), release.clone())),
            delay: None,
        })
        .unwrap();
        kit.push("tint", Options::new()).unwrap();

        let in_flight = {
            let kit = kit.clone();
            tokio::spawn(async move { kit.render(RenderRequest::new()).await })
        };

        let wait = started.clone();
        tokio::task::spawn_blocking(move || wait.wait()).await.unwrap();

        // The render is inside apply; replace the operation underneath it.
        kit.register(TintOperation::new(blue)).unwrap();
        let open = release.clone();
        tokio::task::spawn_blocking(move || open.wait()).await.unwrap();

        let result = in_flight.await.unwrap().unwrap();
        assert_eq!(image_of(&result).image().to_rgba8().get_pixel(0, 0).0, red);

        let later = kit.render(RenderRequest::new()).await.unwrap();
        assert_eq!(image_of(&later).image().to_rgba8().get_pixel(0, 0).0, blue);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stack_edits_do_not_reach_inflight_render() {
        let started = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let kit = Arc::new(kit(3, 5));

        let red = [255, 0, 0, 255];
        kit.register(TintOperation {
            color: red,
            gates: Some((started.clone(), release.clone())),
            delay: None,
        })
        .unwrap();
        kit.push("tint", Options::new()).unwrap();

        let in_flight = {
            let kit = kit.clone();
            tokio::spawn(async move { kit.render(RenderRequest::new()).await })
        };

        let wait = started.clone();
        tokio::task::spawn_blocking(move || wait.wait()).await.unwrap();

        // The render is inside apply; rewrite the stack underneath it.
        kit.clear();
        kit.push("crop", crop(0, 0, 3, 4)).unwrap();
        kit.push("rotation", angle(90)).unwrap();
        kit.move_to(1, 0).unwrap();
        assert_eq!(kit.remove_at(1).unwrap().identifier, "crop");
        let open = release.clone();
        tokio::task::spawn_blocking(move || open.wait()).await.unwrap();

        let result = in_flight.await.unwrap().unwrap();
        assert_eq!(result.stats.stages_applied, 1);
        assert_eq!(image_of(&result).dimensions(), (3, 5));
        assert_eq!(image_of(&result).image().to_rgba8().get_pixel(2, 4).0, red);

        let later = kit.render(RenderRequest::new()).await.unwrap();
        assert_eq!(later.stats.stages_applied, 1);
        assert_eq!(image_of(&later).dimensions(), (5, 3));
        assert_ne!(image_of(&later).image().to_rgba8().get_pixel(0, 0).0, red);
    }

    #[tokio::test]
    async fn test_oversized_render_is_rejected() {
        let kit = kit(4, 4);
        let err = kit
            .render_with(None, None, Some("4000000000x4000000000"))
            .await
            .unwrap_err();
        assert!(err.is_parameter_error());

        let mut config = KitConfig::default();
        config.render.max_output_pixels = 1_000;
        let kit = Kit::builder()
            .source(coordinate_source(100, 10))
            .config(config)
            .build()
            .unwrap();
        let err = kit.render_with(None, None, Some("x50")).await.unwrap_err();
        assert!(matches!(err, KitError::InvalidRenderParameter(_)));

        let ok = kit.render_with(None, None, Some("x3")).await.unwrap();
        assert_eq!(ok.stats.output_dimensions, (30, 3));
    }

    #[tokio::test]
    async fn test_stage_timeout() {
        let mut config = KitConfig::default();
        config.render.stage_timeout_ms = Some(20);
        let kit = Kit::builder()
            .source(coordinate_source(2, 2))
            .config(config)
            .register(TintOperation {
                color: [0, 0, 0, 255],
                gates: None,
                delay: Some(Duration::from_millis(500)),
            })
            .build()
            .unwrap();
        kit.push("tint", Options::new()).unwrap();

        let err = kit.render(RenderRequest::new()).await.unwrap_err();
        assert!(matches!(err, KitError::Timeout { ref stage, timeout_ms: 20 } if stage == "apply"));
    }

    #[tokio::test]
    async fn test_progress_callback() {
        let states = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = states.clone();
        let kit = Kit::builder()
            .source(coordinate_source(4, 4))
            .on_progress(move |s| sink.lock().push(s))
            .build()
            .unwrap();
        kit.push("filters", Options::new().with("filter", "sepia")).unwrap();

        kit.render_default().await.unwrap();
        assert_eq!(
            *states.lock(),
            vec![
                RenderState::Validating,
                RenderState::Applying(0),
                RenderState::Encoding,
                RenderState::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_resize_after_stack() {
        let kit = kit(100, 200);
        kit.push("crop", crop(0, 0, 100, 150)).unwrap();

        let result = kit.render_with(None, None, Some("x75")).await.unwrap();
        assert_eq!(image_of(&result).dimensions(), (50, 75));
        assert_eq!(result.stats.output_dimensions, (50, 75));
    }

    #[test]
    fn test_stack_mutations_through_facade() {
        let kit = kit(10, 10);
        kit.push("rotation", angle(90)).unwrap();
        kit.push("filters", Options::new()).unwrap();

        kit.replace(1, "crop", crop(1, 1, 2, 2)).unwrap();
        kit.set_options(0, angle(270)).unwrap();
        let ops = kit.operations();
        assert_eq!(ops[1].identifier, "crop");
        assert_eq!(ops[0].options.get("angle"), Some(&crate::core::types::Value::Integer(270)));

        assert!(matches!(kit.remove_at(9), Err(KitError::IndexOutOfRange { index: 9, len: 2 })));
        kit.clear();
        assert!(kit.operations().is_empty());
        assert_eq!(kit.identifiers().len(), 3);
    }

    #[test]
    fn test_strict_registration() {
        let mut config = KitConfig::default();
        config.registry.strict = true;
        let kit = Kit::builder()
            .source(coordinate_source(2, 2))
            .config(config)
            .build()
            .unwrap();

        let err = kit.register(crate::operations::builtin::RotationOperation).unwrap_err();
        assert!(matches!(err, KitError::DuplicateOperation(ref id) if id == "rotation"));
    }

    #[test]
    fn test_preset_export_import() {
        let kit = kit(100, 200);
        kit.push("crop", crop(0, 0, 100, 100)).unwrap();
        kit.push("rotation", angle(90)).unwrap();
        let json = kit.export_stack().unwrap();

        let other = Kit::new(coordinate_source(100, 200)).unwrap();
        other.import_stack(&json).unwrap();
        assert_eq!(other.operations(), kit.operations());

        // A bad entry leaves the current stack alone.
        let bad = r#"{"version": "1.0.0", "operations": [{"identifier": "rotation", "options": {"angle": 45}}]}"#;
        assert!(other.import_stack(bad).is_err());
        assert_eq!(other.operations().len(), 2);

        assert!(matches!(other.import_stack("not json"), Err(KitError::Serialization(_))));
    }

    #[test]
    fn test_dry_run_validation() {
        let kit = kit(100, 200);
        kit.push("rotation", angle(90)).unwrap();
        kit.push("crop", crop(0, 0, 150, 50)).unwrap();
        kit.push("filters", Options::new().with("intensity", 0.5)).unwrap();

        let report = kit.validate();
        assert!(report.can_render());
        assert_eq!(report.output_dimensions, Some((150, 50)));
        // identity filter at any intensity changes nothing
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].index, 2);

        kit.move_to(1, 0).unwrap();
        let report = kit.validate();
        assert!(!report.can_render());
        assert_eq!(report.errors[0].index, 0);
    }

    #[test]
    fn test_describe() {
        let kit = kit(2, 2);
        let metadata = kit.describe("crop").unwrap();
        assert_eq!(metadata.schema.names(), vec!["x", "y", "width", "height"]);
        assert!(matches!(kit.describe("blur"), Err(KitError::UnknownOperation(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_rotation_round_trip(width in 1u32..24, height in 1u32..24, turn in 0usize..4) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let degrees = [0i64, 90, 180, 270][turn];
            let kit = kit(width, height);
            kit.push("rotation", angle(degrees)).unwrap();
            kit.push("rotation", angle((360 - degrees) % 360)).unwrap();

            let result = runtime.block_on(kit.render(RenderRequest::new())).unwrap();
            prop_assert_eq!(image_of(&result), &kit.source());

            kit.remove_at(1).unwrap();
            let result = runtime.block_on(kit.render(RenderRequest::new())).unwrap();
            let expected = if degrees % 180 == 0 { (width, height) } else { (height, width) };
            prop_assert_eq!(image_of(&result).dimensions(), expected);
        }
    }
}
