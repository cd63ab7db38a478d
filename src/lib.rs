//! cumulus library - procedural noise fields for volumetric clouds
//!
//! - [`worley`]: multi-layer cellular noise into a 4-channel 3D shape volume
//! - [`weather_map`]: fractal simplex noise into a 2D coverage map
//! - [`codec`] / [`assets`]: slice-stack persistence of the shape volume
//! - [`atmosphere`]: preset library and timed crossfade between cloud states
//! - [`sky`]: per-frame hand-off to an external renderer

pub mod assets;
pub mod atmosphere;
pub mod codec;
pub mod compute;
pub mod error;
pub mod field;
pub mod params;
pub mod sampler;
pub mod sky;
pub mod weather;
pub mod weather_map;
pub mod worley;

pub use atmosphere::{AtmosphereStateInterpolator, PresetLibrary};
pub use error::{Error, Result};
pub use sky::{CloudRenderParams, CloudSystem, FrameOutputs};
pub use weather_map::WeatherMapSynthesizer;
pub use worley::VolumetricNoiseSynthesizer;
