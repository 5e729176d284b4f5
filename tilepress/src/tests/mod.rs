use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgba, RgbaImage};
use parking_lot::Mutex;

use crate::error::TilepressError;
use crate::progress::{CancellationToken, Feedback};
use crate::render::{MapRenderer, RenderConfig, RenderError};
use crate::tile::Tile;
use crate::writer::{TileParams, TileWriter};

/// Renderer painting every pixel by its map coordinates, so the same map point always gets the
/// same color regardless of which metatile it is rendered in.
#[derive(Default)]
pub struct TestRenderer {
    pub calls: AtomicUsize,
    pub fail_on_call: Option<usize>,
    pub panic_on_call: Option<usize>,
    pub extra_pixels: u32,
    pub cancel_on_call: Option<(usize, CancellationToken)>,
}

impl TestRenderer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MapRenderer for TestRenderer {
    fn render(&self, config: &RenderConfig) -> Result<RgbaImage, RenderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(RenderError::Failed(format!("test failure on call {call}")));
        }
        if self.panic_on_call == Some(call) {
            panic!("test panic on call {call}");
        }

        if let Some((cancel_call, token)) = &self.cancel_on_call {
            if *cancel_call == call {
                token.cancel();
            }
        }

        let size = config.output_size();
        let extent = config.extent();
        let x_step = extent.width() / size.width() as f64;
        let y_step = extent.height() / size.height() as f64;
        let background = config.background();

        Ok(RgbaImage::from_fn(
            size.width() + self.extra_pixels,
            size.height(),
            |x, y| {
                let map_x = extent.x_min() + (x as f64 + 0.5) * x_step;
                let map_y = extent.y_max() - (y as f64 + 0.5) * y_step;
                let cell_x = (map_x / 50_000.0).floor() as i64;
                let cell_y = (map_y / 50_000.0).floor() as i64;
                if (cell_x + cell_y) % 3 == 0 {
                    background.into()
                } else {
                    Rgba([
                        cell_x.rem_euclid(256) as u8,
                        cell_y.rem_euclid(256) as u8,
                        (cell_x ^ cell_y).rem_euclid(256) as u8,
                        255,
                    ])
                }
            },
        ))
    }
}

/// Writer keeping all written tiles in memory.
#[derive(Default)]
pub struct RecordingWriter {
    pub params: Option<TileParams>,
    pub tiles: Mutex<Vec<(Tile, RgbaImage)>>,
    pub close_count: usize,
    pub fail_on_tile: Option<Tile>,
}

impl RecordingWriter {
    /// Written tiles ordered by index.
    pub fn sorted_tiles(&self) -> Vec<(Tile, RgbaImage)> {
        let mut tiles = self.tiles.lock().clone();
        tiles.sort_by_key(|(tile, _)| (tile.z, tile.x, tile.y));
        tiles
    }
}

impl TileWriter for RecordingWriter {
    fn configure(&mut self, params: &TileParams) -> Result<(), TilepressError> {
        self.params = Some(params.clone());
        Ok(())
    }

    fn write_tile(&self, tile: &Tile, image: &RgbaImage) -> Result<(), TilepressError> {
        if self.fail_on_tile == Some(*tile) {
            return Err(TilepressError::Writer(format!("test failure on {tile:?}")));
        }

        self.tiles.lock().push((*tile, image.clone()));
        Ok(())
    }

    fn close(&mut self) -> Result<(), TilepressError> {
        self.close_count += 1;
        Ok(())
    }
}

/// Feedback remembering everything reported to it.
#[derive(Default)]
pub struct RecordingFeedback {
    progress: Mutex<Vec<f64>>,
    texts: Mutex<Vec<String>>,
    info: Mutex<Vec<String>>,
}

impl RecordingFeedback {
    pub fn progress(&self) -> Vec<f64> {
        self.progress.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().clone()
    }

    pub fn info(&self) -> Vec<String> {
        self.info.lock().clone()
    }
}

impl Feedback for RecordingFeedback {
    fn set_progress(&self, percent: f64) {
        self.progress.lock().push(percent);
    }

    fn set_progress_text(&self, text: &str) {
        self.texts.lock().push(text.to_string());
    }

    fn push_info(&self, info: &str) {
        self.info.lock().push(info.to_string());
    }
}
