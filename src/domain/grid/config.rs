use super::{GridError, PlanarCartesianGrid};
use crate::domain::geometry::{Geometry, GeometryError};
use crate::domain::refinement::RefineBoundaries;
use crate::domain::DEFAULT_SEEDS_PER_SIDE;
use crate::integration::glq::QuadratureRule;

use json::JsonValue;
use log::debug;
use std::fmt;
use std::fs::read_to_string;
use std::sync::Arc;

/// Default number of samples along each axis
pub const DEFAULT_SAMPLE_COUNT: [usize; 2] = [100, 100];

/// Parameters describing how to construct, refine and mask a [PlanarCartesianGrid]
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// `[x_start, y_start, x_end, y_end]`
    pub bounds: [f64; 4],
    /// Number of base cells along x and y
    pub resolution: [usize; 2],
    /// Number of Gauss-Legendre points along each axis of a cell
    pub quadrature_order: usize,
    pub refinement: Option<RefinementConfig>,
    pub active_domain: Option<ActiveDomainConfig>,
    pub samples: Option<SamplesConfig>,
}

/// Boundary refinement around a geometry
#[derive(Debug, Clone)]
pub struct RefinementConfig {
    pub depth: u8,
    pub seeds_per_side: usize,
    pub geometry: Geometry,
}

/// Mask the grid so that only leaves inside a geometry are active
#[derive(Debug, Clone)]
pub struct ActiveDomainConfig {
    pub seeds_per_side: usize,
    pub geometry: Geometry,
}

/// A lattice of sample points, optionally restricted to a geometry
#[derive(Debug, Clone)]
pub struct SamplesConfig {
    pub count: [usize; 2],
    pub geometry: Option<Geometry>,
}

impl GridConfig {
    /// A configuration with only the grid's dimensions set
    pub fn new(bounds: [f64; 4], resolution: [usize; 2]) -> Self {
        Self {
            bounds,
            resolution,
            quadrature_order: 2,
            refinement: None,
            active_domain: None,
            samples: None,
        }
    }

    /// Load a configuration from a JSON file with the following format
    ///
    /// Only the "Grid" section is required. `quadrature_order`, `seeds_per_side` and the "Samples"
    /// `count` and `geometry` can be omitted to use their defaults.
    ///
    /// grid.json
    /// ```JSON
    /// {
    ///     "Grid": {
    ///         "bounds": [x_start, y_start, x_end, y_end],
    ///         "resolution": [resolution_x, resolution_y],
    ///         "quadrature_order": 2
    ///     },
    ///     "Refinement": {
    ///         "depth": 3,
    ///         "seeds_per_side": 10,
    ///         "geometry": { "type": "circular_hole", "center": [0.0, 0.0], "radius": 0.5 }
    ///     },
    ///     "ActiveDomain": {
    ///         "seeds_per_side": 10,
    ///         "geometry": { "type": "circular_hole", "center": [0.0, 0.0], "radius": 0.5 }
    ///     },
    ///     "Samples": {
    ///         "count": [100, 100],
    ///         "geometry": { "type": "circular_hole", "center": [0.0, 0.0], "radius": 0.5 }
    ///     }
    /// }
    /// ```
    pub fn from_file(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        let config_file_contents = read_to_string(path.as_ref())?;
        Self::from_json_str(&config_file_contents)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Self::from_json(&json::parse(text)?)
    }

    pub fn from_json(config_json: &JsonValue) -> Result<Self, ConfigError> {
        let grid_json = section(config_json, "Grid").ok_or(ConfigError::MissingSection("Grid"))?;

        let mut config = Self::new(
            f64_array(grid_json, "Grid", "bounds")?,
            usize_array(grid_json, "Grid", "resolution")?,
        );
        config.quadrature_order = optional_usize(grid_json, "Grid", "quadrature_order", 2)?;

        if let Some(refinement_json) = section(config_json, "Refinement") {
            let depth = &refinement_json["depth"];
            if depth.is_null() {
                return Err(ConfigError::MissingField("Refinement", "depth"));
            }

            config.refinement = Some(RefinementConfig {
                depth: depth
                    .as_u8()
                    .ok_or(ConfigError::InvalidField("Refinement", "depth"))?,
                seeds_per_side: optional_usize(
                    refinement_json,
                    "Refinement",
                    "seeds_per_side",
                    DEFAULT_SEEDS_PER_SIDE,
                )?,
                geometry: required_geometry(refinement_json, "Refinement")?,
            });
        }

        if let Some(active_json) = section(config_json, "ActiveDomain") {
            config.active_domain = Some(ActiveDomainConfig {
                seeds_per_side: optional_usize(
                    active_json,
                    "ActiveDomain",
                    "seeds_per_side",
                    DEFAULT_SEEDS_PER_SIDE,
                )?,
                geometry: required_geometry(active_json, "ActiveDomain")?,
            });
        }

        if let Some(samples_json) = section(config_json, "Samples") {
            config.samples = Some(SamplesConfig {
                count: if samples_json["count"].is_null() {
                    DEFAULT_SAMPLE_COUNT
                } else {
                    usize_array(samples_json, "Samples", "count")?
                },
                geometry: match section(samples_json, "geometry") {
                    Some(geometry_json) => Some(
                        Geometry::from_json(geometry_json)
                            .map_err(|err| ConfigError::Geometry("Samples", err))?,
                    ),
                    None => None,
                },
            });
        }

        Ok(config)
    }

    /// Generate, refine, mask and sample a grid as described by this configuration
    pub fn build_grid(&self) -> Result<PlanarCartesianGrid, GridError> {
        let [x_start, y_start, x_end, y_end] = self.bounds;
        let [resolution_x, resolution_y] = self.resolution;

        let rule = QuadratureRule::gauss_legendre(self.quadrature_order)?;
        let mut grid =
            PlanarCartesianGrid::new(x_start, y_start, x_end, y_end, resolution_x, resolution_y)?
                .with_quadrature_rule(rule);

        if let Some(refinement) = &self.refinement {
            grid.set_refinement_strategy(Arc::new(RefineBoundaries::new(
                refinement.depth,
                refinement.geometry.clone(),
            )));
            grid.refine(refinement.seeds_per_side)?;
        }

        if let Some(active_domain) = &self.active_domain {
            grid.set_active_state_with_filter(&active_domain.geometry, active_domain.seeds_per_side)?;
        }

        if let Some(samples) = &self.samples {
            grid.prepare_samples(samples.geometry.as_ref(), samples.count[0], samples.count[1])?;
        }

        debug!(
            "Built grid from configuration: {} leaves ({} active)",
            grid.leaf_count(),
            grid.active_leaf_count()
        );

        Ok(grid)
    }
}

fn section<'a>(value: &'a JsonValue, name: &str) -> Option<&'a JsonValue> {
    let member = &value[name];
    if member.is_null() {
        None
    } else {
        Some(member)
    }
}

fn json_array<'a>(
    value: &'a JsonValue,
    section: &'static str,
    field: &'static str,
    len: usize,
) -> Result<&'a JsonValue, ConfigError> {
    let member = &value[field];
    if member.is_null() {
        Err(ConfigError::MissingField(section, field))
    } else if !member.is_array() || member.len() != len {
        Err(ConfigError::InvalidField(section, field))
    } else {
        Ok(member)
    }
}

fn f64_array<const N: usize>(
    value: &JsonValue,
    section: &'static str,
    field: &'static str,
) -> Result<[f64; N], ConfigError> {
    let mut values = [0.0; N];
    for (v, member) in values
        .iter_mut()
        .zip(json_array(value, section, field, N)?.members())
    {
        *v = member
            .as_f64()
            .ok_or(ConfigError::InvalidField(section, field))?;
    }
    Ok(values)
}

fn usize_array<const N: usize>(
    value: &JsonValue,
    section: &'static str,
    field: &'static str,
) -> Result<[usize; N], ConfigError> {
    let mut values = [0; N];
    for (v, member) in values
        .iter_mut()
        .zip(json_array(value, section, field, N)?.members())
    {
        *v = member
            .as_usize()
            .ok_or(ConfigError::InvalidField(section, field))?;
    }
    Ok(values)
}

fn optional_usize(
    value: &JsonValue,
    section: &'static str,
    field: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    let member = &value[field];
    if member.is_null() {
        Ok(default)
    } else {
        member
            .as_usize()
            .ok_or(ConfigError::InvalidField(section, field))
    }
}

fn required_geometry(value: &JsonValue, section: &'static str) -> Result<Geometry, ConfigError> {
    let geometry_json = &value["geometry"];
    if geometry_json.is_null() {
        return Err(ConfigError::MissingField(section, "geometry"));
    }
    Geometry::from_json(geometry_json).map_err(|err| ConfigError::Geometry(section, err))
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(json::Error),
    MissingSection(&'static str),
    MissingField(&'static str, &'static str),
    InvalidField(&'static str, &'static str),
    Geometry(&'static str, GeometryError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{}; Cannot read configuration!", err),
            Self::Parse(err) => write!(f, "{}; Cannot parse configuration as JSON!", err),
            Self::MissingSection(section) => write!(f, "Configuration has no \"{}\" section; Cannot load configuration!", section),
            Self::MissingField(section, field) => write!(f, "\"{}\" is missing \"{}\"; Cannot load configuration!", section, field),
            Self::InvalidField(section, field) => write!(f, "\"{}\" has an invalid \"{}\"; Cannot load configuration!", section, field),
            Self::Geometry(section, err) => write!(f, "In \"{}\": {}", section, err),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Geometry(_, err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<json::Error> for ConfigError {
    fn from(err: json::Error) -> Self {
        Self::Parse(err)
    }
}
