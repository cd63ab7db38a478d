//! On-disk volume assets.
//!
//! `<root>/Textures/<name>.vol3d` layout (little endian):
//!
//! | bytes | field |
//! |---|---|
//! | 4 | magic `CMLS` |
//! | 4 | format version |
//! | 4 | resolution |
//! | 4 | channel count (4) |
//! | 4 | CRC32 of the uncompressed payload |
//! | 8 | compressed payload length |
//! | n | zlib-compressed u16 payload, depth-major slices |

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::ZlibDecoder;

use crate::codec::{SliceStack, VolumeSliceCodec};
use crate::compute::ComputeDevice;
use crate::error::{Error, Result};
use crate::field::VolumetricField;

const ASSET_MAGIC: &[u8; 4] = b"CMLS";
const ASSET_FORMAT_VERSION: u32 = 1;
const ASSET_CHANNELS: u32 = 4;
const HEADER_LEN: usize = 28;

/// Directory under the root holding volume assets
pub const TEXTURE_DIR: &str = "Textures";

/// File extension of volume assets
pub const ASSET_EXTENSION: &str = "vol3d";

pub struct AssetStore {
    root: PathBuf,
    codec: VolumeSliceCodec,
}

impl AssetStore {
    pub fn new(root: impl Into<PathBuf>, device: Arc<dyn ComputeDevice>) -> Self {
        Self {
            root: root.into(),
            codec: VolumeSliceCodec::new(device),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn codec(&self) -> &VolumeSliceCodec {
        &self.codec
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root
            .join(TEXTURE_DIR)
            .join(format!("{}.{}", name, ASSET_EXTENSION))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Encode `field` and write it as `name`, replacing any previous asset
    #[cfg(feature = "asset-build")]
    pub fn save(&self, field: &VolumetricField, name: &str) -> Result<PathBuf> {
        let stack = self.codec.encode(field)?;
        let bytes = write_container(&stack).map_err(|e| Error::io(self.path(name), e))?;

        let path = self.path(name);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        std::fs::write(&path, &bytes).map_err(|e| Error::io(&path, e))?;

        log::info!(
            "saved {}³ volume '{}' ({} bytes) to {}",
            stack.resolution(),
            name,
            bytes.len(),
            path.display()
        );
        Ok(path)
    }

    /// Read the slice stack stored as `name`; `None` if there is no such asset
    pub fn read(&self, name: &str) -> Result<Option<SliceStack>> {
        let path = self.path(name);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(&path, e)),
        };
        read_container(&path, &bytes).map(Some)
    }

    /// Copy the stored asset into `target` with one copy dispatch.
    ///
    /// A missing asset is logged and leaves `target` untouched (`Ok(false)`).
    pub fn load_into(&self, name: &str, target: &mut VolumetricField) -> Result<bool> {
        let Some(stack) = self.read(name)? else {
            log::warn!(
                "volume asset '{}' not found at {}",
                name,
                self.path(name).display()
            );
            return Ok(false);
        };

        let loaded = VolumeSliceCodec::decode(&stack);
        self.codec.device().copy_volume(&loaded, target)?;
        log::info!("loaded volume asset '{}' ({}³)", name, stack.resolution());
        Ok(true)
    }
}

#[cfg(feature = "asset-build")]
fn write_container(stack: &SliceStack) -> std::io::Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let payload: Vec<u8> = stack.payload().flat_map(u16::to_le_bytes).collect();
    let checksum = crc32fast::hash(&payload);

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&payload)?;
    let compressed = encoder.finish()?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + compressed.len());
    bytes.extend_from_slice(ASSET_MAGIC);
    bytes.extend_from_slice(&ASSET_FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&stack.resolution().to_le_bytes());
    bytes.extend_from_slice(&ASSET_CHANNELS.to_le_bytes());
    bytes.extend_from_slice(&checksum.to_le_bytes());
    bytes.extend_from_slice(&(compressed.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&compressed);
    Ok(bytes)
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Uncompressed payload size in bytes of an R³ asset, if it is addressable
fn payload_len(resolution: u32) -> Option<u64> {
    let bytes = (resolution as u64)
        .checked_pow(3)?
        .checked_mul(ASSET_CHANNELS as u64 * 2)?;
    usize::try_from(bytes).ok()?;
    Some(bytes)
}

fn read_container(path: &Path, bytes: &[u8]) -> Result<SliceStack> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::corrupt(path, "truncated header"));
    }
    if &bytes[0..4] != ASSET_MAGIC {
        return Err(Error::corrupt(path, "invalid magic"));
    }

    let version = le_u32(bytes, 4);
    if version != ASSET_FORMAT_VERSION {
        return Err(Error::VersionMismatch {
            expected: ASSET_FORMAT_VERSION,
            found: version,
        });
    }

    let resolution = le_u32(bytes, 8);
    let channels = le_u32(bytes, 12);
    if channels != ASSET_CHANNELS {
        return Err(Error::corrupt(path, format!("unsupported channel count {}", channels)));
    }
    let checksum = le_u32(bytes, 16);
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[20..28]);
    let compressed_len = u64::from_le_bytes(len_bytes) as usize;

    let compressed = HEADER_LEN
        .checked_add(compressed_len)
        .and_then(|end| bytes.get(HEADER_LEN..end))
        .ok_or_else(|| Error::corrupt(path, "truncated payload"))?;

    let expected_len = payload_len(resolution)
        .ok_or_else(|| Error::corrupt(path, format!("resolution {} out of range", resolution)))?;

    // One byte past the expected size is enough to detect an oversized payload
    let mut payload = Vec::new();
    ZlibDecoder::new(compressed)
        .take(expected_len.saturating_add(1))
        .read_to_end(&mut payload)
        .map_err(|e| Error::corrupt(path, format!("decompression failed: {}", e)))?;
    if payload.len() as u64 != expected_len {
        return Err(Error::corrupt(path, "payload size does not match resolution"));
    }

    if crc32fast::hash(&payload) != checksum {
        return Err(Error::corrupt(path, "checksum mismatch"));
    }

    let texels = payload
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    SliceStack::from_payload(resolution, texels)
        .ok_or_else(|| Error::corrupt(path, "payload size does not match resolution"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::CpuDevice;

    fn store(root: &Path) -> AssetStore {
        AssetStore::new(root, Arc::new(CpuDevice::new()))
    }

    fn sample_field() -> VolumetricField {
        let mut field = VolumetricField::new(4);
        for (i, voxel) in field.voxels_mut().iter_mut().enumerate() {
            let t = i as f32 / 63.0;
            *voxel = [t, 1.0 - t, 0.5, 0.0];
        }
        field
    }

    #[test]
    fn test_asset_path_layout() {
        let store = store(Path::new("/data"));
        assert_eq!(
            store.path("Shape Texture"),
            PathBuf::from("/data/Textures/Shape Texture.vol3d")
        );
    }

    #[test]
    fn test_missing_asset_leaves_target_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let mut target = sample_field();
        let before = target.clone();
        assert!(!store.load_into("Shape Texture", &mut target).unwrap());
        assert_eq!(target.as_bytes(), before.as_bytes());
        assert_eq!(store.codec().device().stats().dispatches(), 0);
    }

    #[cfg(feature = "asset-build")]
    #[test]
    fn test_save_then_load_into() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let field = sample_field();

        let path = store.save(&field, "Shape Texture").unwrap();
        assert!(path.ends_with("Textures/Shape Texture.vol3d"));
        assert!(store.exists("Shape Texture"));

        let mut target = VolumetricField::new(4);
        assert!(store.load_into("Shape Texture", &mut target).unwrap());
        for (a, b) in field.voxels().iter().zip(target.voxels()) {
            for c in 0..4 {
                assert!((a[c] - b[c]).abs() <= 1.0 / 65535.0);
            }
        }
    }

    #[cfg(feature = "asset-build")]
    #[test]
    fn test_load_into_wrong_resolution_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.save(&sample_field(), "small").unwrap();

        let mut target = VolumetricField::new(5);
        let before = target.clone();
        assert!(matches!(
            store.load_into("small", &mut target),
            Err(Error::ResolutionMismatch { .. })
        ));
        assert_eq!(target, before);
    }

    #[cfg(feature = "asset-build")]
    #[test]
    fn test_corrupt_assets_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let path = store.save(&sample_field(), "vol").unwrap();
        let original = std::fs::read(&path).unwrap();

        let mut bad_magic = original.clone();
        bad_magic[0] = b'X';
        std::fs::write(&path, &bad_magic).unwrap();
        assert!(matches!(store.read("vol"), Err(Error::CorruptAsset { .. })));

        let mut bad_version = original.clone();
        bad_version[4] = 9;
        std::fs::write(&path, &bad_version).unwrap();
        assert!(matches!(
            store.read("vol"),
            Err(Error::VersionMismatch { expected: 1, found: 9 })
        ));

        let mut bad_checksum = original.clone();
        bad_checksum[16] ^= 0xff;
        std::fs::write(&path, &bad_checksum).unwrap();
        assert!(matches!(store.read("vol"), Err(Error::CorruptAsset { .. })));

        std::fs::write(&path, &original[..original.len() - 3]).unwrap();
        assert!(matches!(store.read("vol"), Err(Error::CorruptAsset { .. })));
    }

    #[cfg(feature = "asset-build")]
    #[test]
    fn test_hostile_resolution_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let path = store.save(&sample_field(), "vol").unwrap();
        let saved = std::fs::read(&path).unwrap();
        let dispatches = store.codec().device().stats().dispatches();

        for resolution in [u32::MAX, 1 << 21, 3, 5] {
            let mut bytes = saved.clone();
            bytes[8..12].copy_from_slice(&resolution.to_le_bytes());
            std::fs::write(&path, &bytes).unwrap();

            let mut target = sample_field();
            let before = target.clone();
            assert!(
                matches!(
                    store.load_into("vol", &mut target),
                    Err(Error::CorruptAsset { .. })
                ),
                "resolution {}",
                resolution
            );
            assert_eq!(target, before);
        }
        assert_eq!(store.codec().device().stats().dispatches(), dispatches);
    }

    #[test]
    fn test_payload_len_overflow() {
        assert_eq!(payload_len(4), Some(4 * 4 * 4 * 8));
        assert_eq!(payload_len(0), Some(0));
        assert_eq!(payload_len(u32::MAX), None);
    }
}
