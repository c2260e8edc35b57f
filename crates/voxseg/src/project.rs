//! Label back-projection: from a dense per-voxel prediction back onto each
//! original point, re-encoded into the original label taxonomy.
//!
//! Every point inherits the label of its owning voxel, so points sharing a
//! cell receive identical labels. That resolution loss is inherent to
//! voxel-based inference, not something to paper over here.

use crate::error::{Result, VoxsegError};
use crate::model::PredictionVolume;
use crate::taxonomy::LabelTaxonomy;

/// Only the low 16 bits of each output value carry the label; the high bits
/// are the instance-id half of the packed external format and stay zero here.
pub const LABEL_MASK: u32 = 0xFFFF;

/// Project per-voxel predictions onto points and encode them.
///
/// Steps: argmax over the class axis, gather by each point's voxel index,
/// remap learning-space to original-space, mask to the low 16 bits. Output
/// has exactly one entry per input point, in input order.
///
/// An out-of-bounds voxel index is a broken adapter invariant and fails with
/// `IndexOutOfRange`; nothing is clamped or dropped.
pub fn project(
    volume: &PredictionVolume,
    voxel_index: &[[usize; 3]],
    taxonomy: &LabelTaxonomy,
) -> Result<Vec<u32>> {
    let grid = volume.grid_size();
    let voxel_labels = volume.argmax_labels();

    let mut out = Vec::with_capacity(voxel_index.len());
    for (point, &index) in voxel_index.iter().enumerate() {
        let [x, y, z] = index;
        if x >= grid[0] || y >= grid[1] || z >= grid[2] {
            return Err(VoxsegError::IndexOutOfRange { point, index, grid });
        }
        let learning = voxel_labels[[x, y, z]];
        let original = taxonomy.remap(learning)?;
        out.push(original & LABEL_MASK);
    }
    Ok(out)
}
