//! Multi-layer cellular noise into the shape volume.

use std::sync::Arc;

use crate::assets::AssetStore;
use crate::compute::{ComputeDevice, MinMaxAccumulator, WorleyJob, WorleyParams};
use crate::error::Result;
use crate::field::VolumetricField;
use crate::params::{NoiseLayerConfig, VolumeSettings};
use crate::sampler::generate_layer_points;

/// Owns the shape volume and regenerates it on demand.
///
/// The field is cached together with the layer set it was generated from;
/// repeated calls with the same layers return it without any dispatch.
pub struct VolumetricNoiseSynthesizer {
    device: Arc<dyn ComputeDevice>,
    settings: VolumeSettings,
    assets: Option<Arc<AssetStore>>,
    field: Option<VolumetricField>,
    generated_from: Option<Vec<NoiseLayerConfig>>,
}

impl VolumetricNoiseSynthesizer {
    pub fn new(device: Arc<dyn ComputeDevice>, settings: VolumeSettings) -> Self {
        Self {
            device,
            settings,
            assets: None,
            field: None,
            generated_from: None,
        }
    }

    /// Load the stored asset into every freshly created field
    pub fn with_assets(mut self, assets: Arc<AssetStore>) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn settings(&self) -> &VolumeSettings {
        &self.settings
    }

    /// Takes effect on the next `synthesize`, which recreates the field
    pub fn set_resolution(&mut self, resolution: u32) {
        self.settings.resolution = resolution;
    }

    /// Last completed field, if any
    pub fn field(&self) -> Option<&VolumetricField> {
        self.field.as_ref().filter(|_| self.generated_from.is_some())
    }

    /// Whether the cached field matches `layers` at the configured resolution
    pub fn is_current(&self, layers: &[NoiseLayerConfig]) -> bool {
        let resolution_ok = self
            .field
            .as_ref()
            .is_some_and(|f| f.resolution() == self.settings.resolution);
        resolution_ok && self.generated_from.as_deref() == Some(layers)
    }

    /// Generate every layer into its channel, or return the cached field
    pub fn synthesize(&mut self, layers: &[NoiseLayerConfig]) -> Result<&VolumetricField> {
        let resolution = self.settings.resolution;

        if !self.is_current(layers) {
            self.generated_from = None;
            let field = prepare_field(&mut self.field, &self.settings, self.assets.as_deref());
            for layer in layers {
                synthesize_layer(self.device.as_ref(), field, layer, resolution)?;
            }

            self.generated_from = Some(layers.to_vec());
            log::info!(
                "synthesized {} cellular layers into {}³ volume on {}",
                layers.len(),
                resolution,
                self.device.label()
            );
        }

        Ok(prepare_field(&mut self.field, &self.settings, self.assets.as_deref()))
    }

    /// Release the cached field
    pub fn release(&mut self) {
        self.field = None;
        self.generated_from = None;
    }
}

/// Recreate the field if it is missing or has the wrong resolution.
///
/// A new field is seeded from the stored asset when one is configured.
fn prepare_field<'a>(
    slot: &'a mut Option<VolumetricField>,
    settings: &VolumeSettings,
    assets: Option<&AssetStore>,
) -> &'a mut VolumetricField {
    let resolution = settings.resolution;
    let stale = slot.as_ref().map_or(true, |f| f.resolution() != resolution);

    if stale {
        if let Some(old) = slot.take() {
            log::debug!(
                "releasing {}³ shape volume, need {}³",
                old.resolution(),
                resolution
            );
        }

        let mut field = VolumetricField::new(resolution);
        if let (true, Some(assets)) = (settings.load_on_create, assets) {
            if let Err(e) = assets.load_into(&settings.asset_name, &mut field) {
                log::warn!("could not load volume asset '{}': {}", settings.asset_name, e);
            }
        }
        *slot = Some(field);
    }

    slot.get_or_insert_with(|| VolumetricField::new(resolution))
}

fn synthesize_layer(
    device: &dyn ComputeDevice,
    field: &mut VolumetricField,
    layer: &NoiseLayerConfig,
    resolution: u32,
) -> Result<()> {
    let stats = device.stats();
    let divisions = layer.clamped_divisions();
    if divisions != layer.cell_divisions {
        log::warn!(
            "layer {:?}: cell divisions {:?} clamped to {:?}",
            layer.channel,
            layer.cell_divisions,
            divisions
        );
    }

    let [a, b, c] = generate_layer_points(layer.seed, divisions);
    let points_a = stats.transient("points_a", a);
    let points_b = stats.transient("points_b", b);
    let points_c = stats.transient("points_c", c);
    let bounds = MinMaxAccumulator::new(stats);

    let job = WorleyJob {
        params: WorleyParams::from_layer(layer, resolution),
        points: [&points_a[..], &points_b[..], &points_c[..]],
        bounds: &bounds,
    };
    let raw = device.dispatch_worley(field, &job)?;

    if raw.is_degenerate() {
        log::warn!("layer {:?} is constant ({}), channel set to 0", layer.channel, raw.min);
    } else {
        log::debug!(
            "layer {:?} seed {} raw range [{:.4}, {:.4}]",
            layer.channel,
            layer.seed,
            raw.min,
            raw.max
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::CpuDevice;
    use crate::params::Channel;

    fn settings(resolution: u32) -> VolumeSettings {
        VolumeSettings {
            resolution,
            load_on_create: false,
            ..Default::default()
        }
    }

    fn small_layers() -> Vec<NoiseLayerConfig> {
        vec![
            NoiseLayerConfig {
                cell_divisions: [2, 3, 4],
                ..NoiseLayerConfig::new(Channel::R, 0)
            },
            NoiseLayerConfig {
                cell_divisions: [3, 4, 5],
                ..NoiseLayerConfig::new(Channel::G, 1)
            },
        ]
    }

    #[test]
    fn test_second_call_is_cached() {
        let device = Arc::new(CpuDevice::new());
        let mut synth = VolumetricNoiseSynthesizer::new(device.clone(), settings(8));
        let layers = small_layers();

        let first = synth.synthesize(&layers).unwrap().clone();
        let dispatches = device.stats().dispatches();
        assert_eq!(dispatches, 4);

        let second = synth.synthesize(&layers).unwrap();
        assert_eq!(device.stats().dispatches(), dispatches);
        assert_eq!(&first, second);
    }

    #[test]
    fn test_layers_normalize_to_unit_range() {
        let device = Arc::new(CpuDevice::new());
        let mut synth = VolumetricNoiseSynthesizer::new(device, settings(8));
        let field = synth.synthesize(&small_layers()).unwrap();

        for channel in [Channel::R, Channel::G] {
            let (lo, hi) = field.channel_range(channel);
            assert!(lo.abs() < 1e-6, "{:?} min {}", channel, lo);
            assert!((hi - 1.0).abs() < 1e-6, "{:?} max {}", channel, hi);
        }
        assert_eq!(field.channel_range(Channel::B), (0.0, 0.0));
        assert_eq!(field.channel_range(Channel::A), (0.0, 0.0));
    }

    #[test]
    fn test_transient_buffers_released() {
        let device = Arc::new(CpuDevice::new());
        let mut synth = VolumetricNoiseSynthesizer::new(device.clone(), settings(4));
        let layers = small_layers();

        synth.synthesize(&layers).unwrap();
        synth.synthesize(&layers).unwrap();
        assert_eq!(device.stats().transient_created(), 8);
        assert_eq!(device.stats().transient_live(), 0);
    }

    #[test]
    fn test_same_layers_are_deterministic() {
        let layers = small_layers();
        let a = VolumetricNoiseSynthesizer::new(Arc::new(CpuDevice::new()), settings(6))
            .synthesize(&layers)
            .unwrap()
            .clone();
        let b = VolumetricNoiseSynthesizer::new(Arc::new(CpuDevice::new()), settings(6))
            .synthesize(&layers)
            .unwrap()
            .clone();
        assert_eq!(a, b);
    }

    #[test]
    fn test_changed_layers_regenerate() {
        let device = Arc::new(CpuDevice::new());
        let mut synth = VolumetricNoiseSynthesizer::new(device.clone(), settings(4));
        let mut layers = small_layers();
        synth.synthesize(&layers).unwrap();

        layers[0].seed = 7;
        assert!(!synth.is_current(&layers));
        synth.synthesize(&layers).unwrap();
        assert_eq!(device.stats().dispatches(), 8);
    }

    #[test]
    fn test_release_forces_regeneration() {
        let device = Arc::new(CpuDevice::new());
        let mut synth = VolumetricNoiseSynthesizer::new(device.clone(), settings(4));
        let layers = small_layers();
        synth.synthesize(&layers).unwrap();

        synth.release();
        assert!(synth.field().is_none());
        synth.synthesize(&layers).unwrap();
        assert_eq!(device.stats().dispatches(), 8);
    }

    #[test]
    fn test_resolution_change_recreates_field() {
        let device = Arc::new(CpuDevice::new());
        let mut synth = VolumetricNoiseSynthesizer::new(device.clone(), settings(4));
        let layers = small_layers();
        synth.synthesize(&layers).unwrap();

        synth.set_resolution(6);
        assert!(!synth.is_current(&layers));
        let field = synth.synthesize(&layers).unwrap();
        assert_eq!(field.resolution(), 6);
        assert_eq!(field.len(), 216);
        assert_eq!(device.stats().dispatches(), 8);
    }

    #[test]
    fn test_missing_asset_on_create_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let device: Arc<dyn ComputeDevice> = Arc::new(CpuDevice::new());
        let assets = Arc::new(AssetStore::new(dir.path(), device.clone()));
        let mut synth = VolumetricNoiseSynthesizer::new(
            device,
            VolumeSettings {
                resolution: 4,
                ..Default::default()
            },
        )
        .with_assets(assets);

        let field = synth.synthesize(&small_layers()).unwrap();
        assert_eq!(field.resolution(), 4);
    }
}
