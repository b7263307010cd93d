use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use geojson::{GeoJson, Value as GeoJsonValue};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::ConvertError;

// A named collection of features sharing one spatial reference. The
// adapter's whole interface: everything downstream only ever sees layers of
// geometries plus an optional source CRS per layer.
#[derive(Debug)]
pub struct Layer {
    pub name: String,
    pub spatial_ref: Option<String>,
    pub geometries: Vec<Geometry<f64>>,
}

#[derive(Debug)]
pub struct Dataset {
    pub name: String,
    pub driver: &'static str,
    pub layers: Vec<Layer>,
}

pub struct Driver {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    open: fn(&Path) -> Result<Vec<Layer>, ConvertError>,
}

pub const DRIVERS: &[Driver] = &[
    Driver {
        name: "GeoJSON",
        extensions: &["geojson", "json"],
        open: open_geojson,
    },
    Driver {
        name: "KML",
        extensions: &["kml"],
        open: open_kml,
    },
];

// Dispatches on file extension (case-insensitive) to the matching driver.
pub fn open_dataset(path: &Path) -> Result<Dataset, ConvertError> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let driver = DRIVERS
        .iter()
        .find(|driver| driver.extensions.contains(&extension.as_str()))
        .ok_or_else(|| ConvertError::UnsupportedFormat(path.to_path_buf()))?;

    let layers = (driver.open)(path)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    Ok(Dataset {
        name,
        driver: driver.name,
        layers,
    })
}

fn open_file(path: &Path) -> Result<BufReader<File>, ConvertError> {
    let file = File::open(path).map_err(|source| ConvertError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

fn layer_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "layer".to_string())
}

// --- GeoJSON driver ---

fn open_geojson(path: &Path) -> Result<Vec<Layer>, ConvertError> {
    let geojson = GeoJson::from_reader(open_file(path)?)
        .map_err(|err| ConvertError::GeoJson(geojson::Error::MalformedJson(err)))?;
    Ok(vec![geojson_layer(geojson, layer_name(path))])
}

// A GeoJSON document is a single layer. The spatial reference comes from
// the legacy `crs` foreign member; without one the coordinates are already
// WGS84 and no reprojection is wanted.
fn geojson_layer(geojson: GeoJson, name: String) -> Layer {
    let mut spatial_ref = None;
    let mut geometries = Vec::new();
    match geojson {
        GeoJson::FeatureCollection(collection) => {
            spatial_ref = crs_name(collection.foreign_members.as_ref());
            for feature in collection.features {
                if let Some(geometry) = feature.geometry {
                    geometries.push(geojson_to_geo(&geometry.value));
                }
            }
        }
        GeoJson::Feature(feature) => {
            if let Some(geometry) = feature.geometry {
                geometries.push(geojson_to_geo(&geometry.value));
            }
        }
        GeoJson::Geometry(geometry) => geometries.push(geojson_to_geo(&geometry.value)),
    }
    Layer {
        name,
        spatial_ref,
        geometries,
    }
}

// Legacy GeoJSON CRS member, e.g. {"type": "name", "properties": {"name":
// "urn:ogc:def:crs:EPSG::25832"}}. CRS84 is WGS84 lon/lat already.
fn crs_name(foreign_members: Option<&serde_json::Map<String, serde_json::Value>>) -> Option<String> {
    let name = foreign_members?
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    if name == "urn:ogc:def:crs:OGC:1.3:CRS84" {
        return None;
    }
    if name.to_uppercase().starts_with("URN:OGC:DEF:CRS:EPSG") {
        if let Some(code) = name.rsplit(':').next() {
            return Some(format!("EPSG:{}", code));
        }
    }
    Some(name.to_string())
}

fn coord(position: &[f64]) -> Coord<f64> {
    (position[0], position[1]).into()
}

fn ring(positions: &[Vec<f64>]) -> LineString<f64> {
    LineString::new(positions.iter().map(|p| coord(p)).collect())
}

// A polygon without rings is kept as a degenerate empty exterior rather
// than rejected; it flattens into a way with no node refs downstream.
fn polygon(rings: &[Vec<Vec<f64>>]) -> Polygon<f64> {
    let exterior = rings
        .first()
        .map(|r| ring(r))
        .unwrap_or_else(|| LineString::new(Vec::new()));
    let interiors = rings.iter().skip(1).map(|r| ring(r)).collect();
    Polygon::new(exterior, interiors)
}

fn geojson_to_geo(value: &GeoJsonValue) -> Geometry<f64> {
    match value {
        GeoJsonValue::Point(position) => Geometry::Point(Point::from(coord(position))),
        GeoJsonValue::MultiPoint(positions) => Geometry::MultiPoint(MultiPoint::new(
            positions.iter().map(|p| Point::from(coord(p))).collect(),
        )),
        GeoJsonValue::LineString(positions) => Geometry::LineString(ring(positions)),
        GeoJsonValue::MultiLineString(lines) => Geometry::MultiLineString(MultiLineString::new(
            lines.iter().map(|l| ring(l)).collect(),
        )),
        GeoJsonValue::Polygon(rings) => Geometry::Polygon(polygon(rings)),
        GeoJsonValue::MultiPolygon(polygons) => Geometry::MultiPolygon(MultiPolygon::new(
            polygons.iter().map(|p| polygon(p)).collect(),
        )),
        GeoJsonValue::GeometryCollection(children) => Geometry::GeometryCollection(
            children
                .iter()
                .map(|child| geojson_to_geo(&child.value))
                .collect::<Vec<_>>()
                .into(),
        ),
    }
}

// --- KML driver ---

// KML coordinates are always WGS84, so the layer never declares a spatial
// reference. Streams Placemark Point/LineString/Polygon elements; the first
// ring of a Polygon is the outer boundary, the rest are holes.
fn open_kml(path: &Path) -> Result<Vec<Layer>, ConvertError> {
    let mut reader = Reader::from_reader(open_file(path)?);
    reader.trim_text(true);
    let geometries = parse_kml(&mut reader)?;
    Ok(vec![Layer {
        name: layer_name(path),
        spatial_ref: None,
        geometries,
    }])
}

fn parse_kml<R: BufRead>(reader: &mut Reader<R>) -> Result<Vec<Geometry<f64>>, ConvertError> {
    let mut geometries = Vec::new();
    let mut rings: Vec<Vec<Coord<f64>>> = Vec::new();
    let mut in_coordinates = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(element) => match element.local_name().as_ref() {
                b"Point" | b"LineString" | b"Polygon" => rings.clear(),
                b"coordinates" => in_coordinates = true,
                _ => {}
            },
            Event::Text(text) if in_coordinates => {
                let text = text.unescape()?;
                rings.push(parse_kml_coordinates(&text));
            }
            Event::End(element) => match element.local_name().as_ref() {
                b"coordinates" => in_coordinates = false,
                b"Point" => {
                    if let Some(coord) = rings.pop().and_then(|ring| ring.first().copied()) {
                        geometries.push(Geometry::Point(Point::from(coord)));
                    }
                }
                b"LineString" => {
                    if let Some(ring) = rings.pop() {
                        geometries.push(Geometry::LineString(LineString::new(ring)));
                    }
                }
                b"Polygon" => {
                    if !rings.is_empty() {
                        let mut taken = std::mem::take(&mut rings);
                        let exterior = LineString::new(taken.remove(0));
                        let interiors = taken.into_iter().map(LineString::new).collect();
                        geometries.push(Geometry::Polygon(Polygon::new(exterior, interiors)));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(geometries)
}

// "lon,lat[,alt]" tuples separated by whitespace; unparseable tuples are
// skipped rather than failing the whole placemark.
fn parse_kml_coordinates(text: &str) -> Vec<Coord<f64>> {
    let mut coords = Vec::new();
    for tuple in text.split_whitespace() {
        let mut parts = tuple.split(',');
        if let (Some(lon), Some(lat)) = (parts.next(), parts.next()) {
            if let (Ok(x), Ok(y)) = (lon.parse::<f64>(), lat.parse::<f64>()) {
                coords.push(Coord { x, y });
            }
        }
    }
    coords
}
