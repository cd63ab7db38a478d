//! cumulus - offline tooling for procedural cloud noise
//!
//! Builds the shape volume asset, exports slice and weather map previews,
//! and runs the weather classifier from the command line.

mod cli;

use std::time::Instant;

use clap::Parser;

use cli::{Args, Command};
use cumulus::assets::AssetStore;
use cumulus::codec::VolumeSliceCodec;
use cumulus::field::VolumetricField;
use cumulus::weather::WeatherObservation;
use cumulus::{VolumetricNoiseSynthesizer, WeatherMapSynthesizer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let config = args.load_config()?;
    let start = Instant::now();

    match &args.command {
        Command::Generate { resolution, name } => {
            let mut settings = config.volume.clone();
            if let Some(resolution) = resolution {
                settings.resolution = *resolution;
            }
            // Building the asset must not start from the previous one
            settings.load_on_create = false;
            let name = name.clone().unwrap_or_else(|| settings.asset_name.clone());

            println!("Generating shape volume");
            println!("  Resolution: {}³", settings.resolution);
            println!("  Layers: {}", config.layers.len());

            let device = args.create_device()?;
            let store = AssetStore::new(&args.asset_root, device.clone());
            let mut synth = VolumetricNoiseSynthesizer::new(device, settings);
            let field = synth.synthesize(&config.layers)?;
            save_asset(&store, field, &name)?;
        }

        Command::Slices { out, from_asset } => {
            let device = args.create_device()?;
            let codec = VolumeSliceCodec::new(device.clone());

            let field = if *from_asset {
                let store = AssetStore::new(&args.asset_root, device.clone());
                let name = &config.volume.asset_name;
                let stack = store
                    .read(name)?
                    .ok_or_else(|| format!("no asset at {}", store.path(name).display()))?;
                VolumeSliceCodec::decode(&stack)
            } else {
                let mut settings = config.volume.clone();
                settings.load_on_create = false;
                let mut synth = VolumetricNoiseSynthesizer::new(device, settings);
                synth.synthesize(&config.layers)?.clone()
            };

            let stack = codec.encode(&field)?;
            let written = stack.export_png(out)?;
            println!("  Slices: {}", written.len());
            println!("  Output: {}", out.display());
        }

        Command::WeatherMap { out, seed } => {
            let mut noise = config.weather_map.noise.clone();
            if let Some(seed) = seed {
                noise.seed = *seed;
            }

            println!("Generating weather map");
            println!("  Seed: {}", noise.seed);
            println!("  Octaves: {}", noise.clamped_octaves());
            println!("  Size: {0}x{0}", config.weather_map.resolution);

            let device = args.create_device()?;
            let mut synth = WeatherMapSynthesizer::from_settings(device, &config.weather_map);
            let map = synth.synthesize(
                &noise,
                config.render.container_position,
                config.render.height_offset,
            )?;
            map.to_preview_image().save(out)?;
            println!("  Output: {}", out.display());
        }

        Command::Classify {
            description,
            coverage,
            wind_deg,
            wind_mps,
            temp_k,
        } => {
            let defaults = WeatherObservation::default();
            let observation = WeatherObservation {
                descriptions: vec![description.clone()],
                cloud_percent: *coverage,
                wind_degrees: wind_deg.unwrap_or(defaults.wind_degrees),
                wind_speed_mps: wind_mps.unwrap_or(defaults.wind_speed_mps),
                temperature_k: temp_k.unwrap_or(defaults.temperature_k),
            };

            println!("Cloud state: {}", observation.cloud_state().name());
            println!(
                "  Wind: {:.2} mph from {}",
                observation.wind_mph(),
                observation.wind_compass()
            );
            println!("  Temperature: {:.1} °F", observation.temperature_f());
        }
    }

    println!("  Time: {:.2}ms", start.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}

#[cfg(feature = "asset-build")]
fn save_asset(
    store: &AssetStore,
    field: &VolumetricField,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = store.save(field, name)?;
    println!("  Output: {}", path.display());
    Ok(())
}

#[cfg(not(feature = "asset-build"))]
fn save_asset(
    _store: &AssetStore,
    _field: &VolumetricField,
    _name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    Err("saving assets requires the `asset-build` feature".into())
}
