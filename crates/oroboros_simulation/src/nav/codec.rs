//! Nav volume file format.
//!
//! GZip stream wrapping a little-endian payload:
//!
//! ```text
//! magic        i32   0x564F584C
//! version      i32   read, not enforced
//! grid x/y/z   i32 ×3
//! origin       f32 ×3
//! voxel size   f32
//! area mask    i32
//! sample rad.  f32
//! bitset len   i32
//! bitset       u8 × len
//! ```

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use oroboros_shared::constants::NAV_MAGIC;
use oroboros_shared::Vec3;

use super::grid::VoxelGrid;
use crate::error::{SimError, SimResult};

/// Version written by [`encode`].
pub const NAV_FORMAT_VERSION: i32 = 1;

/// Header size in bytes, bitset excluded.
pub const NAV_HEADER_SIZE: usize = 12 * 4;

/// Little-endian cursor over a decompressed payload.
struct ByteReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    fn take(&mut self, len: usize, what: &str) -> SimResult<&'a [u8]> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or_else(|| SimError::NavDecode(format!("truncated while reading {what}")))?;
        let slice = &self.buffer[self.position..end];
        self.position = end;
        Ok(slice)
    }

    fn read_i32(&mut self, what: &str) -> SimResult<i32> {
        let b = self.take(4, what)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_f32(&mut self, what: &str) -> SimResult<f32> {
        let b = self.take(4, what)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Decompresses and parses a nav volume.
///
/// # Errors
///
/// [`SimError::BadMagic`] on a magic mismatch, [`SimError::NavDecode`] on a
/// truncated or inconsistent stream, [`SimError::Io`] if the gzip layer
/// fails.
pub fn decode(compressed: &[u8]) -> SimResult<VoxelGrid> {
    let mut payload = Vec::new();
    GzDecoder::new(compressed).read_to_end(&mut payload)?;
    let mut r = ByteReader::new(&payload);

    let magic = r.read_i32("magic")?;
    if magic != NAV_MAGIC {
        return Err(SimError::BadMagic {
            expected: NAV_MAGIC,
            found: magic,
        });
    }
    let version = r.read_i32("version")?;
    let size = [r.read_i32("grid x")?, r.read_i32("grid y")?, r.read_i32("grid z")?];
    let origin = Vec3::new(r.read_f32("origin x")?, r.read_f32("origin y")?, r.read_f32("origin z")?);
    let voxel_size = r.read_f32("voxel size")?;
    let area_mask = r.read_i32("area mask")?;
    let sample_radius = r.read_f32("sample radius")?;
    let bitset_len = r.read_i32("bitset length")?;

    if size.iter().any(|s| *s < 0) {
        return Err(SimError::NavDecode(format!("negative grid size {size:?}")));
    }
    if !(voxel_size.is_finite() && voxel_size > 0.0) {
        return Err(SimError::NavDecode(format!("invalid voxel size {voxel_size}")));
    }
    let voxels = size
        .iter()
        .try_fold(1usize, |acc, s| acc.checked_mul(*s as usize))
        .ok_or_else(|| SimError::NavDecode(format!("grid size {size:?} overflows")))?;
    let bitset_len = usize::try_from(bitset_len)
        .map_err(|_| SimError::NavDecode(format!("negative bitset length {bitset_len}")))?;
    if bitset_len < voxels.div_ceil(8) {
        return Err(SimError::NavDecode(format!(
            "bitset holds {bitset_len} bytes, grid needs {}",
            voxels.div_ceil(8)
        )));
    }
    let bits = r.take(bitset_len, "bitset")?;

    tracing::debug!(
        "Decoded nav volume v{}: {}x{}x{} voxels of {} at {:?}",
        version,
        size[0],
        size[1],
        size[2],
        voxel_size,
        origin
    );

    let mut grid = VoxelGrid::new(size, origin, voxel_size);
    grid.area_mask = area_mask;
    grid.sample_radius = sample_radius;
    grid.bits = bits.to_vec();
    Ok(grid)
}

/// Serializes and compresses a grid in the layout [`decode`] reads.
///
/// # Errors
///
/// [`SimError::Io`] if compression fails, [`SimError::NavDecode`] if the
/// bitset is too large for the length field.
pub fn encode(grid: &VoxelGrid) -> SimResult<Vec<u8>> {
    encode_with_magic(grid, NAV_MAGIC)
}

/// Like [`encode`] but with an arbitrary magic, for tooling that writes
/// foreign files.
///
/// # Errors
///
/// Same as [`encode`].
pub fn encode_with_magic(grid: &VoxelGrid, magic: i32) -> SimResult<Vec<u8>> {
    let bitset_len = i32::try_from(grid.bits.len())
        .map_err(|_| SimError::NavDecode("bitset too large to encode".to_string()))?;

    let mut payload = Vec::with_capacity(NAV_HEADER_SIZE + grid.bits.len());
    for value in [magic, NAV_FORMAT_VERSION, grid.size_x, grid.size_y, grid.size_z] {
        payload.extend_from_slice(&value.to_le_bytes());
    }
    for value in [grid.origin.x, grid.origin.y, grid.origin.z, grid.voxel_size] {
        payload.extend_from_slice(&value.to_le_bytes());
    }
    payload.extend_from_slice(&grid.area_mask.to_le_bytes());
    payload.extend_from_slice(&grid.sample_radius.to_le_bytes());
    payload.extend_from_slice(&bitset_len.to_le_bytes());
    payload.extend_from_slice(&grid.bits);

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&payload)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::GridCoord;

    fn sample() -> VoxelGrid {
        let mut grid = VoxelGrid::new([3, 4, 5], Vec3::new(1.0, -2.0, 3.0), 0.25);
        grid.area_mask = 7;
        grid.sample_radius = 0.4;
        grid.set_walkable(GridCoord::new(2, 3, 4), true);
        grid.set_walkable(GridCoord::new(0, 1, 0), true);
        grid
    }

    #[test]
    fn test_decode_reads_what_encode_writes() {
        let grid = sample();
        let decoded = decode(&encode(&grid).unwrap()).unwrap();
        assert_eq!(decoded, grid);
        assert!(decoded.is_walkable(GridCoord::new(2, 3, 4)));
        assert!(!decoded.is_walkable(GridCoord::new(2, 3, 3)));
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode(&sample()).unwrap();
        let mut payload = Vec::new();
        GzDecoder::new(bytes.as_slice()).read_to_end(&mut payload).unwrap();
        assert_eq!(&payload[0..4], &[0x4C, 0x58, 0x4F, 0x56]);
        assert_eq!(&payload[8..12], &3i32.to_le_bytes());
        assert_eq!(&payload[32..36], &0.25f32.to_le_bytes());
        assert_eq!(&payload[44..48], &8i32.to_le_bytes());
        assert_eq!(payload.len(), NAV_HEADER_SIZE + 8);
    }

    #[test]
    fn test_bad_magic() {
        let bytes = encode_with_magic(&sample(), 0x1234).unwrap();
        match decode(&bytes) {
            Err(SimError::BadMagic { expected, found }) => {
                assert_eq!(expected, NAV_MAGIC);
                assert_eq!(found, 0x1234);
            }
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_stream() {
        let grid = sample();
        let mut payload = Vec::new();
        GzDecoder::new(encode(&grid).unwrap().as_slice())
            .read_to_end(&mut payload)
            .unwrap();
        payload.truncate(payload.len() - 3);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(&payload).unwrap();
        let bytes = encoder.finish().unwrap();
        assert!(matches!(decode(&bytes), Err(SimError::NavDecode(_))));
    }

    #[test]
    fn test_not_gzip() {
        assert!(decode(b"definitely not gzip").is_err());
    }
}
