use std::path::{Path, PathBuf};

use log::debug;
use tilepress_types::geo::{GeoExtent, GeoPoint};
use urlencoding::encode;

use crate::error::TilepressError;
use crate::raster::TileFormat;
use crate::writer::TileParams;

const DEFAULT_TITLE: &str = "Leaflet Preview";
const DEFAULT_ATTRIBUTION: &str = "Created by tilepress: Generate XYZ tiles (Directory)";
const LEAFLET_VERSION: &str = "1.9.3";

/// Static HTML page showing a tile folder tree with [Leaflet](https://leafletjs.com).
#[derive(Debug, Clone)]
pub struct LeafletPreview {
    tile_directory: PathBuf,
    format: TileFormat,
    extent: GeoExtent,
    min_zoom: u8,
    max_zoom: u8,
    tms: bool,
    title: Option<String>,
    attribution: Option<String>,
    osm: bool,
}

impl LeafletPreview {
    /// Creates a page for the tiles of a run stored in `tile_directory`.
    pub fn new(tile_directory: impl AsRef<Path>, params: &TileParams, tms: bool) -> Self {
        Self {
            tile_directory: tile_directory.as_ref().into(),
            format: params.format,
            extent: params.extent,
            min_zoom: params.min_zoom,
            max_zoom: params.max_zoom,
            tms,
            title: None,
            attribution: None,
            osm: false,
        }
    }

    /// Sets the page title. Empty titles are replaced by the default one.
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title.filter(|t| !t.is_empty());
        self
    }

    /// Sets the attribution of the tile layer. Empty values are replaced by the default one.
    pub fn with_attribution(mut self, attribution: Option<String>) -> Self {
        self.attribution = attribution.filter(|a| !a.is_empty());
        self
    }

    /// Adds OpenStreetMap as a base layer under the tiles.
    pub fn with_osm(mut self, osm: bool) -> Self {
        self.osm = osm;
        self
    }

    /// `file://` URL template of the tiles.
    pub fn tile_url(&self) -> String {
        let directory = self.tile_directory.to_string_lossy().replace('\\', "/");
        let encoded = directory
            .trim_start_matches('/')
            .split('/')
            .map(|segment| encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        format!("file:///{encoded}/{{z}}/{{x}}/{{y}}.{}", self.format.extension())
    }

    /// Generates the page.
    pub fn render(&self) -> String {
        let title = self.title.as_deref().unwrap_or(DEFAULT_TITLE);
        let attribution = self.attribution.as_deref().unwrap_or(DEFAULT_ATTRIBUTION);
        let center = self.extent.center();
        let average_zoom = (self.min_zoom as f64 + self.max_zoom as f64) / 2.0;

        let mut html = format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <title>{title}</title>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0">

  <link rel="stylesheet" href="https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.css" crossorigin=""/>
  <script src="https://unpkg.com/leaflet@{LEAFLET_VERSION}/dist/leaflet.js" crossorigin=""></script>
  <style type="text/css">
    body {{
       margin: 0;
       padding: 0;
    }}
    html, body, #map {{
       width: 100%;
       height: 100%;
    }}
  </style>
</head>
<body>
  <div id="map"></div>
  <script>
      var map = L.map('map', {{ attributionControl: false }}).setView([{lat}, {lon}], {average_zoom});
      L.control.attribution({{ prefix: false }}).addTo(map);
"#,
            title = escape_html(title),
            lat = center.lat(),
            lon = center.lon(),
        );

        if self.osm {
            html.push_str(&format!(
                r#"      var osm_layer = L.tileLayer('https://tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
        minZoom: {min_zoom},
        maxZoom: {max_zoom},
        attribution: '&copy; <a href="https://www.openstreetmap.org/copyright">OpenStreetMap</a> contributors'
      }}).addTo(map);
"#,
                min_zoom = self.min_zoom,
                max_zoom = self.max_zoom,
            ));
        }

        html.push_str(&format!(
            r#"      var tilesource_layer = L.tileLayer('{url}', {{
        minZoom: {min_zoom},
        maxZoom: {max_zoom},
        tms: {tms},
        attribution: '{attribution}'
      }}).addTo(map);
  </script>
</body>
</html>
"#,
            url = escape_js(&self.tile_url()),
            min_zoom = self.min_zoom,
            max_zoom = self.max_zoom,
            tms = self.tms,
            attribution = escape_js(attribution),
        ));

        html
    }

    /// Writes the page into the file, creating the parent folder if needed.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), TilepressError> {
        let path = path.as_ref();
        if let Some(folder) = path.parent() {
            if !folder.as_os_str().is_empty() {
                std::fs::create_dir_all(folder)?;
            }
        }

        std::fs::write(path, self.render())?;
        debug!("Preview page written to {path:?}");

        Ok(())
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_js(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> TileParams {
        TileParams {
            format: TileFormat::Png,
            quality: 75,
            tile_width: 256,
            tile_height: 256,
            min_zoom: 2,
            max_zoom: 5,
            extent: GeoExtent::new(-10.0, 40.0, 10.0, 50.0).unwrap(),
        }
    }

    #[test]
    fn tile_url_is_percent_encoded() {
        let preview = LeafletPreview::new("/data/my tiles", &params(), false);
        assert_eq!(
            preview.tile_url(),
            "file:///data/my%20tiles/{z}/{x}/{y}.png"
        );
    }

    #[test]
    fn default_page() {
        let html = LeafletPreview::new("/data/tiles", &params(), true).render();
        assert!(html.contains("<title>Leaflet Preview</title>"));
        assert!(html.contains("setView([45, 0], 3.5)"));
        assert!(html.contains("L.tileLayer('file:///data/tiles/{z}/{x}/{y}.png'"));
        assert!(html.contains("minZoom: 2,"));
        assert!(html.contains("maxZoom: 5,"));
        assert!(html.contains("tms: true,"));
        assert!(html.contains(&format!("attribution: '{DEFAULT_ATTRIBUTION}'")));
        assert!(!html.contains("osm_layer"));
    }

    #[test]
    fn customized_page() {
        let html = LeafletPreview::new("/data/tiles", &params(), false)
            .with_title(Some("Alps & more".into()))
            .with_attribution(Some("Me's".into()))
            .with_osm(true)
            .render();
        assert!(html.contains("<title>Alps &amp; more</title>"));
        assert!(html.contains("attribution: 'Me\\'s'"));
        assert!(html.contains("tms: false,"));
        assert!(html.contains("tile.openstreetmap.org"));

        let osm = html.find("var osm_layer").unwrap();
        let tiles = html.find("var tilesource_layer").unwrap();
        assert!(osm < tiles);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.trim_end().ends_with("</html>"));
        assert_eq!(html.matches("</script>").count(), 2);

        let html = LeafletPreview::new("/data/tiles", &params(), false)
            .with_title(Some(String::new()))
            .render();
        assert!(html.contains("<title>Leaflet Preview</title>"));
    }

    #[test]
    fn writes_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("html/index.html");
        let preview = LeafletPreview::new(dir.path(), &params(), false);
        preview.write(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), preview.render());
    }
}
