/* Coordinate reference systems and point reprojection (pure Rust, proj4rs + crs-definitions) */

use crate::error::{GeometryError, Result, SampleError};
use geo_types::Coord;
use proj4rs::{proj::Proj, transform::transform};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub const WGS84: Crs = Crs::Epsg(4326);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    Epsg(u16),
    Proj4(String),
}

impl Crs {
    /// PROJ.4 definition, looked up in the crs-definitions database for EPSG codes.
    pub fn proj_string(&self) -> Result<&str> {
        match self {
            Crs::Epsg(code) => crs_definitions::from_code(*code)
                .map(|def| def.proj4)
                .ok_or_else(|| SampleError::projection(self.to_string(), "code is not in the EPSG database")),
            Crs::Proj4(def) => Ok(def.as_str()),
        }
    }

    pub fn is_geographic(&self) -> bool {
        self.proj_string()
            .map(|def| def.contains("+proj=longlat") || def.contains("+proj=latlong"))
            .unwrap_or(false)
    }
}

impl FromStr for Crs {
    type Err = SampleError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.starts_with('+') {
            return Ok(Crs::Proj4(trimmed.to_string()));
        }

        let code = trimmed
            .split_once(':')
            .filter(|(authority, _)| authority.eq_ignore_ascii_case("epsg"))
            .map(|(_, code)| code)
            .ok_or_else(|| SampleError::projection(trimmed, "expected `EPSG:<code>` or a PROJ.4 string"))?;

        code.trim()
            .parse::<u16>()
            .map(Crs::Epsg)
            .map_err(|e| SampleError::projection(trimmed, e))
    }
}

impl TryFrom<String> for Crs {
    type Error = SampleError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{code}"),
            Crs::Proj4(def) => f.write_str(def),
        }
    }
}

// source and target projections resolved once per run
enum Projections {
    Identity,
    Transform {
        source: Box<Proj>,
        target: Box<Proj>,
        source_geographic: bool,
        target_geographic: bool,
    },
}

pub struct Reprojector {
    source_crs: Crs,
    target_crs: Crs,
    projections: Projections,
}

impl Reprojector {
    pub fn new(source_crs: &Crs, target_crs: &Crs) -> Result<Self> {
        let source_def = source_crs.proj_string()?;
        let target_def = target_crs.proj_string()?;

        let projections = if source_def.trim() == target_def.trim() {
            Projections::Identity
        } else {
            let source = Proj::from_proj_string(source_def)
                .map_err(|e| SampleError::projection(source_crs.to_string(), format!("{e:?}")))?;
            let target = Proj::from_proj_string(target_def)
                .map_err(|e| SampleError::projection(target_crs.to_string(), format!("{e:?}")))?;

            Projections::Transform {
                source: Box::new(source),
                target: Box::new(target),
                source_geographic: source_crs.is_geographic(),
                target_geographic: target_crs.is_geographic(),
            }
        };

        Ok(Self {
            source_crs: source_crs.clone(),
            target_crs: target_crs.clone(),
            projections,
        })
    }

    pub fn source_crs(&self) -> &Crs {
        &self.source_crs
    }

    pub fn target_crs(&self) -> &Crs {
        &self.target_crs
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.projections, Projections::Identity)
    }

    /// Project a point sequence, keeping length and order. Axis order is always (x, y).
    pub fn project(&self, coords: &[Coord<f64>]) -> std::result::Result<Vec<Coord<f64>>, GeometryError> {
        let Projections::Transform {
            source,
            target,
            source_geographic,
            target_geographic,
        } = &self.projections
        else {
            return Ok(coords.to_vec());
        };

        coords
            .iter()
            .enumerate()
            .map(|(index, c)| {
                // proj4rs works in radians for geographic systems
                let mut point = if *source_geographic {
                    (c.x.to_radians(), c.y.to_radians(), 0.0)
                } else {
                    (c.x, c.y, 0.0)
                };

                transform(source, target, &mut point).map_err(|e| GeometryError::Unprojectable {
                    index,
                    x: c.x,
                    y: c.y,
                    reason: format!("{e:?}"),
                })?;

                let (x, y) = if *target_geographic {
                    (point.0.to_degrees(), point.1.to_degrees())
                } else {
                    (point.0, point.1)
                };

                if !x.is_finite() || !y.is_finite() {
                    return Err(GeometryError::Unprojectable {
                        index,
                        x: c.x,
                        y: c.y,
                        reason: "non-finite result".into(),
                    });
                }

                Ok(Coord { x, y })
            })
            .collect()
    }
}

impl fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reprojector")
            .field("source_crs", &self.source_crs)
            .field("target_crs", &self.target_crs)
            .field("identity", &self.is_identity())
            .finish()
    }
}
