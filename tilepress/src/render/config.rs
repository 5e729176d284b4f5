use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tilepress_types::cartesian::{Rect, Size};
use tilepress_types::geo::Crs;

use crate::render::Color;

/// Name of the expression scope describing the map being rendered.
pub const MAP_SCOPE: &str = "map";

const METERS_PER_INCH: f64 = 0.0254;

/// Label placement policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelingSettings {
    /// Allow drawing labels that do not fit into the image. Must stay `false` when rendering
    /// tiles, otherwise labels are cut at tile borders.
    #[serde(default)]
    pub partial_labels: bool,
}

/// Value of an expression variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Variable {
    /// Numeric value.
    Number(f64),
    /// String value.
    Text(String),
    /// Rectangle in map units.
    Rect(Rect),
}

/// Named set of variables available to style expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionScope {
    name: String,
    variables: Vec<(String, Variable)>,
}

impl ExpressionScope {
    /// Creates an empty scope.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
        }
    }

    /// Name of the scope.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the variable, replacing the previous value with the same name.
    pub fn set_variable(&mut self, name: impl Into<String>, value: Variable) {
        let name = name.into();
        match self.variables.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.variables.push((name, value)),
        }
    }

    /// Builder-style version of [`set_variable`](Self::set_variable).
    pub fn with_variable(mut self, name: impl Into<String>, value: Variable) -> Self {
        self.set_variable(name, value);
        self
    }

    /// Value of the variable.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }
}

/// Stack of expression scopes. Scopes added later shadow variables of the earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpressionContext {
    scopes: Vec<ExpressionScope>,
}

impl ExpressionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the scope to the top of the stack, or replaces the scope with the same name in place.
    pub fn set_scope(&mut self, scope: ExpressionScope) {
        match self.scopes.iter_mut().find(|s| s.name == scope.name) {
            Some(existing) => *existing = scope,
            None => self.scopes.push(scope),
        }
    }

    /// Scope with the given name.
    pub fn scope(&self, name: &str) -> Option<&ExpressionScope> {
        self.scopes.iter().find(|s| s.name == name)
    }

    /// All scopes, from the bottom of the stack to the top.
    pub fn scopes(&self) -> &[ExpressionScope] {
        &self.scopes
    }

    /// Looks up the variable in the scopes starting from the top of the stack.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.scopes.iter().rev().find_map(|s| s.variable(name))
    }
}

/// Run-wide render settings. Every render worker gets its own [`RenderConfig`] built from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// CRS of the rendered images.
    pub destination_crs: Crs,
    /// Identifiers of the layers to render, from top to bottom.
    pub layers: Vec<String>,
    /// Resolution of the output images.
    pub output_dpi: f64,
    /// Fill of the image before anything is drawn.
    pub background: Color,
    /// Draw with antialiasing.
    pub antialiasing: bool,
    /// Label placement policy.
    pub labeling: LabelingSettings,
    /// Scopes shared by all renders.
    pub expression_context: ExpressionContext,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            destination_crs: Crs::EPSG3857,
            layers: Vec::new(),
            output_dpi: 96.0,
            background: Color::TRANSPARENT,
            antialiasing: true,
            labeling: LabelingSettings::default(),
            expression_context: ExpressionContext::default(),
        }
    }
}

impl RenderSettings {
    /// Creates a render configuration with empty extent and zero size.
    pub fn build_config(&self) -> RenderConfig {
        RenderConfig {
            destination_crs: self.destination_crs.clone(),
            layers: self.layers.clone(),
            output_dpi: self.output_dpi,
            background: self.background,
            antialiasing: self.antialiasing,
            labeling: self.labeling,
            expression_context: self.expression_context.clone(),
            extent: Rect::new(0.0, 0.0, 0.0, 0.0),
            output_size: Size::new(0, 0),
        }
    }
}

/// Everything a [`MapRenderer`](super::MapRenderer) needs to draw one image.
///
/// The extent and the output size change for every rendered metatile, the rest stays as set up
/// by [`RenderSettings::build_config`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    destination_crs: Crs,
    layers: Vec<String>,
    output_dpi: f64,
    background: Color,
    antialiasing: bool,
    labeling: LabelingSettings,
    expression_context: ExpressionContext,
    extent: Rect,
    output_size: Size<u32>,
}

impl RenderConfig {
    /// CRS of the image.
    pub fn destination_crs(&self) -> &Crs {
        &self.destination_crs
    }

    /// Layers to render, from top to bottom.
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Output resolution.
    pub fn output_dpi(&self) -> f64 {
        self.output_dpi
    }

    /// Background fill.
    pub fn background(&self) -> Color {
        self.background
    }

    /// Antialiasing flag.
    pub fn antialiasing(&self) -> bool {
        self.antialiasing
    }

    /// Label placement policy.
    pub fn labeling(&self) -> LabelingSettings {
        self.labeling
    }

    /// Expression scopes, including the [`MAP_SCOPE`] of the current render.
    pub fn expression_context(&self) -> &ExpressionContext {
        &self.expression_context
    }

    /// Area to render, in units of the destination CRS.
    pub fn extent(&self) -> Rect {
        self.extent
    }

    /// Size of the image to produce.
    pub fn output_size(&self) -> Size<u32> {
        self.output_size
    }

    /// Map units of the destination CRS per pixel along the x axis.
    pub fn map_units_per_pixel(&self) -> f64 {
        if self.output_size.width() == 0 {
            return 0.0;
        }

        self.extent.width() / self.output_size.width() as f64
    }

    /// Scale denominator of the image (`1:scale`).
    pub fn map_scale(&self) -> f64 {
        let meters_per_unit = if self.destination_crs.is_projected() {
            1.0
        } else {
            self.destination_crs.datum().semimajor() * PI / 180.0
        };

        self.map_units_per_pixel() * meters_per_unit * self.output_dpi / METERS_PER_INCH
    }

    /// Sets the area and the image size of the next render and refreshes the [`MAP_SCOPE`]
    /// variables (`map_extent`, `map_crs`, `map_width`, `map_height`, `map_scale`).
    pub fn set_extent_and_size(&mut self, extent: Rect, output_size: Size<u32>) {
        self.extent = extent;
        self.output_size = output_size;

        let scope = ExpressionScope::new(MAP_SCOPE)
            .with_variable("map_extent", Variable::Rect(extent))
            .with_variable(
                "map_crs",
                Variable::Text(self.destination_crs.code().to_string()),
            )
            .with_variable("map_width", Variable::Number(output_size.width() as f64))
            .with_variable("map_height", Variable::Number(output_size.height() as f64))
            .with_variable("map_scale", Variable::Number(self.map_scale()));
        self.expression_context.set_scope(scope);
    }
}
