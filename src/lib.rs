use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod converter;
pub mod reader;
pub mod reproject;
pub mod writer;

pub use converter::{Converter, OsmNode, OsmWay};
pub use reader::{open_dataset, DRIVERS};
pub use reproject::Reprojection;

// Source projection override selected on the command line. When absent, the
// layer's own declared spatial reference decides whether to reproject.
#[derive(Debug, Clone)]
pub enum SourceCrs {
    Epsg(u32),
    Proj4(String),
}

#[derive(Debug, Default)]
pub struct ConvertOptions {
    pub source_crs: Option<SourceCrs>,
    pub verbose: bool,
}

#[derive(Debug)]
pub struct ConvertSummary {
    pub output: PathBuf,
    pub nodes: usize,
    pub ways: usize,
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("no driver recognizes `{0}`")]
    UnsupportedFormat(PathBuf),

    #[error("unable to open datasource `{path}`: {source}")]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("datasource `{0}` contains no layers")]
    EmptyDatasource(PathBuf),

    #[error("malformed GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("cannot build transformation to EPSG:4326: {0}")]
    ProjCreate(#[from] proj::ProjCreateError),

    #[error("reprojection failed: {0}")]
    Reproject(#[from] proj::ProjError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// Runs the whole pipeline: open the datasource, reproject each layer to
// WGS84, flatten every geometry into nodes and ways, write the OSM XML.
// The output file lands in the current working directory as `<name>.osm`.
pub fn convert_file(
    path: &Path,
    options: &ConvertOptions,
) -> Result<ConvertSummary, ConvertError> {
    let dataset = reader::open_dataset(path)?;
    if dataset.layers.is_empty() {
        return Err(ConvertError::EmptyDatasource(path.to_path_buf()));
    }

    let output = PathBuf::from(format!("{}.osm", dataset.name));
    println!(
        "Processing {} ({}) into {}",
        path.display(),
        dataset.driver,
        output.display()
    );

    let mut converter = Converter::new();
    for layer in dataset.layers {
        // One transform per layer; reprojection parameters are layer-invariant.
        let reprojection =
            Reprojection::for_layer(layer.spatial_ref.as_deref(), options.source_crs.as_ref())?;
        let total = layer.geometries.len();
        if options.verbose {
            let crs_note = if reprojection.is_identity() {
                "no spatial reference, coordinates pass through".to_string()
            } else if options.source_crs.is_some() {
                "reprojecting from the override projection".to_string()
            } else {
                match layer.spatial_ref.as_deref() {
                    Some(crs) => format!("reprojecting from {}", crs),
                    None => "reprojecting".to_string(),
                }
            };
            println!("Layer `{}`: {} features, {}", layer.name, total, crs_note);
        }

        for (count, mut geometry) in layer.geometries.into_iter().enumerate() {
            if options.verbose && (count + 1) % 1000 == 0 {
                println!("Processing feature {}/{}", count + 1, total);
            }
            reprojection.apply(&mut geometry)?;
            converter.flatten(&geometry);
        }
    }

    let (nodes, ways) = (converter.nodes().len(), converter.ways().len());
    println!("Generating {} nodes and {} ways.", nodes, ways);
    writer::write_osm(&output, converter.nodes(), converter.ways())?;

    Ok(ConvertSummary {
        output,
        nodes,
        ways,
    })
}
