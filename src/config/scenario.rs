use serde::{Deserialize, Serialize};

use super::{seq, PropagationConfig, RayFan};
use crate::eigenray::TargetGrid;
use crate::error::Result;
use crate::geo::{EarthModel, GeoPosition};
use crate::ocean::{
    Attenuation, Boundary, ConstantAttenuation, FlatBoundary, LinearProfile, MunkProfile, Ocean, ReflectLoss,
    SlopedBoundary, SoundSpeedProfile, TableProfile, ThorpAttenuation,
};
use crate::proploss::{Proploss, SumMode};
use crate::sim::{propagate, propagate_with, WavefrontObserver};

// ---------------------------------------------------------------------------
// Built scenario: everything a run needs
// ---------------------------------------------------------------------------

/// A ready-to-run propagation problem.
#[derive(Debug)]
pub struct Scenario {
    pub name: String,
    pub earth: EarthModel,
    pub ocean: Ocean,
    pub fan: RayFan,
    pub source: GeoPosition,
    pub targets: TargetGrid,
    pub config: PropagationConfig,
}

impl Scenario {
    pub fn run(&self) -> Result<Proploss> {
        propagate(&self.ocean, &self.earth, &self.fan, self.source, self.targets.clone(), &self.config)
    }

    pub fn run_with(&self, observer: &mut dyn WavefrontObserver) -> Result<Proploss> {
        propagate_with(&self.ocean, &self.earth, &self.fan, self.source, self.targets.clone(), &self.config, observer)
    }
}

// ---------------------------------------------------------------------------
// Serializable description (JSON scenario files)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProfileConfig {
    Linear {
        surface_speed: f64,
        #[serde(default)]
        gradient: f64,
    },
    Munk {
        axis_speed: f64,
        axis_depth: f64,
        scale: f64,
        epsilon: f64,
    },
    Table {
        depths: Vec<f64>,
        speeds: Vec<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttenuationConfig {
    #[default]
    None,
    Constant {
        db_per_km: f64,
    },
    Thorp,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundaryConfig {
    Flat {
        depth: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reflect: Option<ReflectLoss>,
    },
    /// Planar slope through `origin` (the source when omitted).
    Sloped {
        depth: f64,
        slope: f64,   // deg
        azimuth: f64, // deg, down-slope direction
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<GeoPosition>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reflect: Option<ReflectLoss>,
    },
}

impl BoundaryConfig {
    fn sea_surface() -> Self {
        BoundaryConfig::Flat { depth: 0.0, reflect: None }
    }

    fn build(&self, earth: &EarthModel, source: &GeoPosition, default_reflect: ReflectLoss) -> Box<dyn Boundary> {
        match *self {
            BoundaryConfig::Flat { depth, reflect } => Box::new(FlatBoundary {
                depth,
                reflect: reflect.unwrap_or(default_reflect),
            }),
            BoundaryConfig::Sloped { depth, slope, azimuth, origin, reflect } => Box::new(SlopedBoundary::new(
                *earth,
                origin.unwrap_or(*source),
                depth,
                slope,
                azimuth,
                reflect.unwrap_or(default_reflect),
            )),
        }
    }
}

/// Fan axis: explicit values or a linear sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AxisConfig {
    Values(Vec<f64>),
    Linear { first: f64, step: f64, last: f64 },
}

impl AxisConfig {
    pub fn values(&self) -> Vec<f64> {
        match self {
            AxisConfig::Values(v) => v.clone(),
            AxisConfig::Linear { first, step, last } => seq::linear(*first, *step, *last),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetConfig {
    Single(GeoPosition),
    Grid { rows: usize, cols: usize, positions: Vec<GeoPosition> },
}

/// JSON-friendly scenario description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub latitude: f64, // deg, area of operations
    pub profile: ProfileConfig,
    #[serde(default)]
    pub attenuation: AttenuationConfig,
    #[serde(default = "BoundaryConfig::sea_surface")]
    pub surface: BoundaryConfig,
    pub bottom: BoundaryConfig,
    pub source: GeoPosition,
    pub de: AxisConfig,
    pub az: AxisConfig,
    pub frequencies: Vec<f64>,
    pub targets: TargetConfig,
    #[serde(default)]
    pub propagation: PropagationConfig,
}

impl ScenarioConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate everything and assemble the environment.
    pub fn build(&self) -> Result<Scenario> {
        let earth = EarthModel::from_latitude(self.latitude);

        let profile: Box<dyn SoundSpeedProfile> = match &self.profile {
            ProfileConfig::Linear { surface_speed, gradient } => Box::new(LinearProfile::new(*surface_speed, *gradient)),
            ProfileConfig::Munk { axis_speed, axis_depth, scale, epsilon } => Box::new(MunkProfile {
                axis_speed: *axis_speed,
                axis_depth: *axis_depth,
                scale: *scale,
                epsilon: *epsilon,
            }),
            ProfileConfig::Table { depths, speeds } => Box::new(TableProfile::new(depths.clone(), speeds.clone())?),
        };
        let attenuation: Box<dyn Attenuation> = match self.attenuation {
            AttenuationConfig::None => Box::new(ConstantAttenuation::default()),
            AttenuationConfig::Constant { db_per_km } => Box::new(ConstantAttenuation::new(db_per_km)),
            AttenuationConfig::Thorp => Box::new(ThorpAttenuation),
        };
        let surface = self.surface.build(&earth, &self.source, ReflectLoss::pressure_release());
        let bottom = self.bottom.build(&earth, &self.source, ReflectLoss::rigid());
        let ocean = Ocean::new(surface, bottom, profile).with_attenuation(attenuation);

        let fan = RayFan::new(self.de.values(), self.az.values(), self.frequencies.clone())?;
        let targets = match &self.targets {
            TargetConfig::Single(p) => TargetGrid::new(1, 1, vec![*p])?,
            TargetConfig::Grid { rows, cols, positions } => TargetGrid::new(*rows, *cols, positions.clone())?,
        };
        self.propagation.validate()?;

        Ok(Scenario {
            name: self.name.clone(),
            earth,
            ocean,
            fan,
            source: self.source,
            targets,
            config: self.propagation,
        })
    }
}

// ---------------------------------------------------------------------------
// Fluent builder
// ---------------------------------------------------------------------------

/// Builds a [`Scenario`] in code. Defaults: 45 deg latitude, 1500 m/s
/// isovelocity water over a rigid bottom at 3000 m, 1 kHz.
pub struct ScenarioBuilder {
    name: String,
    latitude: f64,
    profile: Box<dyn SoundSpeedProfile>,
    attenuation: Box<dyn Attenuation>,
    surface: Option<Box<dyn Boundary>>,
    bottom: Option<Box<dyn Boundary>>,
    bottom_depth: f64,
    source: GeoPosition,
    de: Vec<f64>,
    az: Vec<f64>,
    frequencies: Vec<f64>,
    targets: Vec<GeoPosition>,
    grid: Option<(usize, usize)>,
    config: PropagationConfig,
}

impl ScenarioBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latitude: 45.0,
            profile: Box::new(LinearProfile::constant(1500.0)),
            attenuation: Box::new(ConstantAttenuation::default()),
            surface: None,
            bottom: None,
            bottom_depth: 3000.0,
            source: GeoPosition::new(45.0, -45.0, -100.0),
            de: seq::linear(-60.0, 1.0, 60.0),
            az: seq::linear(-4.0, 1.0, 4.0),
            frequencies: vec![1000.0],
            targets: vec![],
            grid: None,
            config: PropagationConfig::default(),
        }
    }

    pub fn latitude(mut self, deg: f64) -> Self {
        self.latitude = deg;
        self
    }

    pub fn profile(mut self, profile: impl SoundSpeedProfile + 'static) -> Self {
        self.profile = Box::new(profile);
        self
    }

    pub fn attenuation(mut self, attenuation: impl Attenuation + 'static) -> Self {
        self.attenuation = Box::new(attenuation);
        self
    }

    pub fn surface(mut self, surface: impl Boundary + 'static) -> Self {
        self.surface = Some(Box::new(surface));
        self
    }

    pub fn bottom(mut self, bottom: impl Boundary + 'static) -> Self {
        self.bottom = Some(Box::new(bottom));
        self
    }

    /// Flat rigid bottom at `depth` m.
    pub fn bottom_depth(mut self, depth: f64) -> Self {
        self.bottom_depth = depth;
        self
    }

    pub fn source(mut self, source: GeoPosition) -> Self {
        self.source = source;
        self
    }

    pub fn de(mut self, de: Vec<f64>) -> Self {
        self.de = de;
        self
    }

    pub fn az(mut self, az: Vec<f64>) -> Self {
        self.az = az;
        self
    }

    pub fn frequencies(mut self, frequencies: Vec<f64>) -> Self {
        self.frequencies = frequencies;
        self
    }

    pub fn target(mut self, target: GeoPosition) -> Self {
        self.targets.push(target);
        self
    }

    /// Arrange the targets added so far as a `rows` x `cols` grid.
    pub fn target_grid(mut self, rows: usize, cols: usize) -> Self {
        self.grid = Some((rows, cols));
        self
    }

    pub fn time_step(mut self, dt: f64) -> Self {
        self.config.time_step = dt;
        self
    }

    pub fn max_time(mut self, t: f64) -> Self {
        self.config.max_time = t;
        self
    }

    pub fn max_steps(mut self, n: usize) -> Self {
        self.config.max_steps = Some(n);
        self
    }

    pub fn sum_mode(mut self, mode: SumMode) -> Self {
        self.config.sum_mode = mode;
        self
    }

    pub fn build(self) -> Result<Scenario> {
        let earth = EarthModel::from_latitude(self.latitude);
        let surface: Box<dyn Boundary> = match self.surface {
            Some(b) => b,
            None => Box::new(FlatBoundary::surface()),
        };
        let bottom: Box<dyn Boundary> = match self.bottom {
            Some(b) => b,
            None => Box::new(FlatBoundary::bottom(self.bottom_depth)),
        };
        let ocean = Ocean::new(surface, bottom, self.profile).with_attenuation(self.attenuation);
        let fan = RayFan::new(self.de, self.az, self.frequencies)?;
        let (rows, cols) = self.grid.unwrap_or((1, self.targets.len()));
        let targets = TargetGrid::new(rows, cols, self.targets)?;
        self.config.validate()?;
        Ok(Scenario { name: self.name, earth, ocean, fan, source: self.source, targets, config: self.config })
    }
}

// ---------------------------------------------------------------------------
// Reference scenarios
// ---------------------------------------------------------------------------

pub mod presets {
    use super::*;

    /// Direct, surface and bottom paths in 3000 m of isovelocity water.
    /// Target 0.02 deg north of the source at the same depth.
    pub fn eigenray_basic() -> ScenarioConfig {
        ScenarioConfig {
            name: "eigenray_basic".into(),
            latitude: 45.0,
            profile: ProfileConfig::Linear { surface_speed: 1500.0, gradient: 0.0 },
            attenuation: AttenuationConfig::None,
            surface: BoundaryConfig::sea_surface(),
            bottom: BoundaryConfig::Flat { depth: 3000.0, reflect: None },
            source: GeoPosition::new(45.0, -45.0, -1000.0),
            de: AxisConfig::Linear { first: -60.0, step: 5.0, last: 60.0 },
            az: AxisConfig::Linear { first: -4.0, step: 1.0, last: 4.0 },
            frequencies: vec![10e3],
            targets: TargetConfig::Single(GeoPosition::new(45.02, -45.0, -1000.0)),
            propagation: PropagationConfig { max_time: 3.5, ..Default::default() },
        }
    }

    /// Long-range surface paths on a curved earth: three surface roots
    /// plus the direct path 1.2 deg north of the source.
    pub fn eigenray_concave() -> ScenarioConfig {
        ScenarioConfig {
            name: "eigenray_concave".into(),
            latitude: 45.0,
            profile: ProfileConfig::Linear { surface_speed: 1500.0, gradient: 0.0 },
            attenuation: AttenuationConfig::None,
            surface: BoundaryConfig::sea_surface(),
            bottom: BoundaryConfig::Flat { depth: 1e5, reflect: None },
            source: GeoPosition::new(45.0, -45.0, -200.0),
            de: AxisConfig::Linear { first: -1.0, step: 0.05, last: 1.0 },
            az: AxisConfig::Linear { first: -4.0, step: 1.0, last: 4.0 },
            frequencies: vec![2000.0],
            targets: TargetConfig::Single(GeoPosition::new(46.2, -45.0, -150.0)),
            propagation: PropagationConfig { max_time: 120.0, ..Default::default() },
        }
    }

    /// Look up a preset by name.
    pub fn by_name(name: &str) -> Option<ScenarioConfig> {
        match name {
            "eigenray_basic" => Some(eigenray_basic()),
            "eigenray_concave" => Some(eigenray_concave()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
