//! Orchestration of a tile generation run.
//!
//! The [`RenderDispatcher`] walks the zoom levels of a [`RenderPlan`] one by one. For every zoom
//! level the metatiles covering the plan extent are put into a shared queue, and a fixed set of
//! workers pulls them, renders each with its own [`RenderConfig`], slices the result into tiles
//! and hands them to the [`TileWriter`].

use std::ops::RangeInclusive;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use image::RgbaImage;
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tilepress_types::cartesian::Size;
use tilepress_types::geo::GeoExtent;

use crate::error::TilepressError;
use crate::metatile::{count_metatiles_in_range, MetaTile, MetatileIter, Metatiles};
use crate::progress::{CancellationToken, Feedback, ProgressTracker};
use crate::raster::{slice_metatile, TileFormat};
use crate::render::{MapRenderer, RenderConfig, RenderError, RenderSettings};
use crate::writer::{TileParams, TileWriter};

/// Highest supported zoom level.
pub const MAX_ZOOM: u8 = 25;
/// Allowed metatile sizes.
pub const METATILE_SIZE_RANGE: RangeInclusive<u32> = 1..=20;
/// Allowed tile widths and heights.
pub const TILE_SIZE_RANGE: RangeInclusive<u32> = 1..=4096;

/// Stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// The run has not started yet.
    Idle,
    /// Render configurations, the writer and the worker pool are being set up.
    Configuring,
    /// Metatiles of the zoom level are being rendered.
    RenderingZoom(u8),
    /// The writer is closed. The run is over, successfully or not.
    Closed,
}

/// What to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    /// Area to cover, in WGS84 coordinates inside the Web Mercator latitude limits.
    pub extent: GeoExtent,
    /// Lowest zoom level.
    pub min_zoom: u8,
    /// Highest zoom level.
    pub max_zoom: u8,
    /// Metatiles have up to `metatile_size × metatile_size` tiles.
    pub metatile_size: u32,
    /// Tile width in pixels.
    pub tile_width: u32,
    /// Tile height in pixels.
    pub tile_height: u32,
    /// Number of render workers.
    pub threads: usize,
    /// Image format of the tiles.
    pub format: TileFormat,
    /// JPEG quality.
    pub quality: u8,
}

impl RenderPlan {
    /// Checks that the plan describes a pyramid that can be rendered: zoom levels up to
    /// [`MAX_ZOOM`], metatile and tile sizes inside [`METATILE_SIZE_RANGE`] and
    /// [`TILE_SIZE_RANGE`], and at least one thread.
    pub fn check(&self) -> Result<(), TilepressError> {
        check_pyramid(
            self.min_zoom..=self.max_zoom,
            self.metatile_size,
            (self.tile_width, self.tile_height),
            self.threads,
        )
    }

    /// Parameters given to the tile writer.
    pub fn tile_params(&self) -> TileParams {
        TileParams {
            format: self.format,
            quality: self.quality,
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            extent: self.extent,
        }
    }
}

pub(crate) fn check_pyramid(
    zooms: RangeInclusive<u8>,
    metatile_size: u32,
    (tile_width, tile_height): (u32, u32),
    threads: usize,
) -> Result<(), TilepressError> {
    let error = |message: String| -> Result<(), TilepressError> {
        Err(TilepressError::InvalidParameters(message))
    };

    if zooms.is_empty() || *zooms.end() > MAX_ZOOM {
        return error("Invalid zoom levels range.".into());
    }
    if !METATILE_SIZE_RANGE.contains(&metatile_size) {
        return error(format!(
            "Metatile size must be in range {METATILE_SIZE_RANGE:?}."
        ));
    }
    if !TILE_SIZE_RANGE.contains(&tile_width) || !TILE_SIZE_RANGE.contains(&tile_height) {
        return error(format!("Tile size must be in range {TILE_SIZE_RANGE:?}."));
    }
    if threads == 0 {
        return error("Number of threads must be positive.".into());
    }

    Ok(())
}

/// Summary of a finished run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Number of metatiles covering the plan.
    pub metatiles_total: u64,
    /// Number of metatiles rendered and written.
    pub metatiles_rendered: u64,
    /// Number of tiles written.
    pub tiles_written: u64,
    /// The run was stopped by a [`CancellationToken`] before all metatiles were rendered.
    pub canceled: bool,
}

/// Drives the renderer and the writer through a [`RenderPlan`].
pub struct RenderDispatcher<R> {
    renderer: R,
    plan: RenderPlan,
    settings: RenderSettings,
    state: Mutex<DispatchState>,
}

impl<R: MapRenderer> RenderDispatcher<R> {
    /// Creates a new dispatcher. Fails if the plan is inconsistent.
    pub fn new(
        renderer: R,
        plan: RenderPlan,
        settings: RenderSettings,
    ) -> Result<Self, TilepressError> {
        plan.check()?;

        Ok(Self {
            renderer,
            plan,
            settings,
            state: Mutex::new(DispatchState::Idle),
        })
    }

    /// The plan of the dispatcher.
    pub fn plan(&self) -> &RenderPlan {
        &self.plan
    }

    /// Current stage.
    pub fn state(&self) -> DispatchState {
        *self.state.lock()
    }

    /// Renders all metatiles of the plan and writes them with the writer.
    ///
    /// The writer is configured at the start and closed at the end, also when the run fails or
    /// is canceled. The first error of any worker stops the run and is returned. Cancellation is
    /// not an error: the returned report has `canceled` set.
    ///
    /// # Panics
    ///
    /// A panic of the renderer or the writer is resumed after the writer is closed.
    pub fn run(
        &self,
        writer: &mut dyn TileWriter,
        feedback: &dyn Feedback,
        cancel: &CancellationToken,
    ) -> Result<RunReport, TilepressError> {
        self.set_state(DispatchState::Configuring);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.render_all(writer, feedback, cancel)
        }));

        let close_result = writer.close();
        self.set_state(DispatchState::Closed);

        let result = match result {
            Ok(result) => result,
            Err(payload) => {
                if let Err(err) = close_result {
                    warn!("Failed to close tile writer after a panic: {err}");
                }
                panic::resume_unwind(payload);
            }
        };

        match (result, close_result) {
            (Ok(report), Ok(())) => {
                info!(
                    "Run finished: {} of {} metatiles rendered, {} tiles written{}",
                    report.metatiles_rendered,
                    report.metatiles_total,
                    report.tiles_written,
                    if report.canceled { " (canceled)" } else { "" }
                );
                Ok(report)
            }
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!("Failed to close tile writer after an error: {close_err}");
                Err(err)
            }
        }
    }

    fn set_state(&self, state: DispatchState) {
        debug!("Dispatcher state: {state:?}");
        *self.state.lock() = state;
    }

    fn render_all(
        &self,
        writer: &mut dyn TileWriter,
        feedback: &dyn Feedback,
        cancel: &CancellationToken,
    ) -> Result<RunReport, TilepressError> {
        let plan = &self.plan;
        let total = count_metatiles_in_range(
            &plan.extent,
            plan.min_zoom..=plan.max_zoom,
            plan.metatile_size,
        )?;

        let threads = plan.threads;
        if threads == 1 {
            feedback.push_info("Using 1 CPU Thread:");
        } else {
            feedback.push_info(&format!("Using {threads} CPU Threads:"));
        }

        let configs: Vec<_> = (0..threads)
            .map(|_| Mutex::new(self.settings.build_config()))
            .collect();
        writer.configure(&plan.tile_params())?;
        let pool = if threads > 1 {
            Some(build_thread_pool(threads)?)
        } else {
            None
        };

        let writer: &dyn TileWriter = writer;
        let progress = ProgressTracker::new(total, feedback);
        let tiles_written = AtomicU64::new(0);

        for zoom in plan.min_zoom..=plan.max_zoom {
            if cancel.is_canceled() {
                break;
            }

            self.set_state(DispatchState::RenderingZoom(zoom));
            let metatiles = Metatiles::new(&plan.extent, zoom, plan.metatile_size)?;
            feedback.push_info(&format!("Generating tiles for zoom level: {zoom}"));
            debug!(
                "Zoom level {zoom}: {} tiles in {} metatiles",
                metatiles.grid().tile_count(),
                metatiles.count()
            );

            let job = ZoomJob {
                renderer: &self.renderer,
                plan,
                configs: &configs,
                queue: Mutex::new(metatiles.iter()),
                writer,
                progress: &progress,
                tiles_written: &tiles_written,
                cancel,
                abort: AtomicBool::new(false),
                error: Mutex::new(None),
            };

            match &pool {
                Some(pool) => {
                    pool.broadcast(|context| job.work(context.index()));
                }
                None => job.work(0),
            }

            if let Some(err) = job.error.into_inner() {
                return Err(err);
            }
        }

        let metatiles_rendered = progress.completed();
        Ok(RunReport {
            metatiles_total: total,
            metatiles_rendered,
            tiles_written: tiles_written.load(Ordering::Relaxed),
            canceled: cancel.is_canceled() && metatiles_rendered < total,
        })
    }
}

fn build_thread_pool(threads: usize) -> Result<ThreadPool, TilepressError> {
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("tilepress-render-{index}"))
        .build()
        .map_err(|e| TilepressError::ThreadPool(format!("failed to build rayon thread pool: {e}")))
}

/// Shared state of the workers rendering one zoom level.
struct ZoomJob<'a, R> {
    renderer: &'a R,
    plan: &'a RenderPlan,
    configs: &'a [Mutex<RenderConfig>],
    queue: Mutex<MetatileIter>,
    writer: &'a dyn TileWriter,
    progress: &'a ProgressTracker<'a>,
    tiles_written: &'a AtomicU64,
    cancel: &'a CancellationToken,
    abort: AtomicBool,
    error: Mutex<Option<TilepressError>>,
}

impl<R: MapRenderer> ZoomJob<'_, R> {
    /// Worker loop. `slot` selects the render configuration owned by the worker.
    fn work(&self, slot: usize) {
        let Some(config) = self.configs.get(slot) else {
            self.fail(TilepressError::ThreadPool(format!(
                "no render configuration for worker {slot}"
            )));
            return;
        };
        let mut config = config.lock();

        loop {
            if self.abort.load(Ordering::Acquire) || self.cancel.is_canceled() {
                break;
            }

            let Some(metatile) = self.queue.lock().next() else {
                break;
            };

            match self.process(&mut config, &metatile) {
                Ok(tiles) => {
                    self.tiles_written.fetch_add(tiles, Ordering::Relaxed);
                    self.progress.increment();
                }
                Err(err) => {
                    self.fail(err);
                    break;
                }
            }
        }
    }

    fn process(&self, config: &mut RenderConfig, metatile: &MetaTile) -> Result<u64, TilepressError> {
        let plan = self.plan;
        let width = metatile.columns() * plan.tile_width;
        let height = metatile.rows() * plan.tile_height;
        let geo_extent = metatile
            .extent()
            .ok_or_else(|| TilepressError::MetaTile("metatile has no tiles".into()))?;
        let extent = config.destination_crs().project_extent(&geo_extent)?;

        config.set_extent_and_size(extent, Size::new(width, height));
        let image = self.renderer.render(config)?;
        check_image_size(&image, width, height)?;

        let tiles = slice_metatile(&image, metatile, plan.tile_width, plan.tile_height)?;
        for (tile, tile_image) in &tiles {
            self.writer.write_tile(tile, tile_image)?;
        }
        trace!("Metatile {:?}: {} tiles written", geo_extent, tiles.len());

        Ok(tiles.len() as u64)
    }

    fn fail(&self, err: TilepressError) {
        self.abort.store(true, Ordering::Release);
        let mut error = self.error.lock();
        match *error {
            None => *error = Some(err),
            Some(_) => debug!("Ignoring error after the run was aborted: {err}"),
        }
    }
}

fn check_image_size(image: &RgbaImage, width: u32, height: u32) -> Result<(), RenderError> {
    if image.dimensions() != (width, height) {
        return Err(RenderError::UnexpectedSize {
            expected: (width, height),
            actual: image.dimensions(),
        });
    }

    Ok(())
}
