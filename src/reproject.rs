use geo::Geometry;
use proj::{Proj, Transform};

use crate::{ConvertError, SourceCrs};

// Destination projection is always EPSG:4326, WGS84 lon/lat.
const WGS84: &str = "EPSG:4326";

// Decided once per layer and applied uniformly to every feature in it.
pub enum Reprojection {
    Identity,
    Project(Proj),
}

impl Reprojection {
    // A command-line override beats the layer's declared reference. With
    // neither, coordinates pass through untouched.
    pub fn for_layer(
        layer_crs: Option<&str>,
        override_crs: Option<&SourceCrs>,
    ) -> Result<Self, ConvertError> {
        let source = match override_crs {
            Some(SourceCrs::Epsg(code)) => Some(format!("EPSG:{}", code)),
            Some(SourceCrs::Proj4(definition)) => Some(definition.clone()),
            None => layer_crs.map(str::to_owned),
        };
        match source {
            None => Ok(Reprojection::Identity),
            Some(source) => Ok(Reprojection::Project(Proj::new_known_crs(
                &source, WGS84, None,
            )?)),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Reprojection::Identity)
    }

    // Mutates the geometry's coordinates in place; a no-op for Identity.
    pub fn apply(&self, geometry: &mut Geometry<f64>) -> Result<(), ConvertError> {
        match self {
            Reprojection::Identity => Ok(()),
            Reprojection::Project(proj) => {
                geometry.transform(proj)?;
                Ok(())
            }
        }
    }
}
