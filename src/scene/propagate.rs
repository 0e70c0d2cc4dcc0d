//! Dirty-flag driven matrix propagation
//!
//! Parents always sit at lower slots than their children, so one forward
//! pass over a [`Hierarchy`] sees every parent's fresh world data before
//! its children need it.
//!
//! Rotations are composed as given. Nothing renormalizes them, so callers
//! accumulating many small rotations should renormalize themselves.

use glam::{Mat4, Vec4};

use super::hierarchy::Hierarchy;

/// Invert a scale/rotate/translate matrix with no shear.
///
/// The linear part is inverted by transposing and dividing each row by the
/// squared length of the matching column, the translation becomes
/// `-R⁻¹·t`. A zero scale axis yields non-finite values.
#[must_use]
pub fn scale_rotate_translate_inverse(matrix: &Mat4) -> Mat4 {
    let x = matrix.x_axis;
    let y = matrix.y_axis;
    let z = matrix.z_axis;
    let t = matrix.w_axis;

    let nx = Vec4::new(x.x, y.x, z.x, 0.0);
    let ny = Vec4::new(x.y, y.y, z.y, 0.0);
    let nz = Vec4::new(x.z, y.z, z.z, 0.0);
    let nt = Vec4::W - t.x * nx - t.y * ny - t.z * nz;
    // W keeps the translation column's 1 intact.
    let s = (nx * nx + ny * ny + nz * nz + Vec4::W).recip();

    Mat4::from_cols(nx * s, ny * s, nz * s, nt * s)
}

impl Hierarchy {
    /// Recompute the cached world data of every dirty node and its
    /// descendants, then clear all dirty flags. Local inverses are kept
    /// current by the pose setters themselves.
    ///
    /// Returns how many nodes had their world data recomputed; a second
    /// call with no edits in between returns zero.
    pub fn update_matrices(&mut self) -> usize {
        let len = self.len();
        if len == 0 {
            return 0;
        }

        let mut updated = 0;
        if self.modified[0] {
            self.world_matrix[0] = self.local_matrix[0];
            self.world_inverse[0] = self.local_inverse[0];
            self.world_rotation[0] = self.local_rotation[0];
            self.world_scale[0] = self.local_scale[0];
            updated += 1;
        }
        for i in 1..len {
            let parent = self.parent_index[i] as usize;
            if !(self.modified[i] || self.modified[parent]) {
                continue;
            }
            let parent_matrix = self.world_matrix[parent];
            self.world_matrix[i] = parent_matrix * self.local_matrix[i];
            self.world_inverse[i] = self.local_inverse[i] * self.world_inverse[parent];
            self.world_rotation[i] = self.world_rotation[parent] * self.local_rotation[i];
            // Scale does not compose per axis once rotation is involved.
            self.world_scale[i] = parent_matrix.transform_vector3(self.local_scale[i]);
            // Pass the change on to this node's own children.
            self.modified[i] = true;
            updated += 1;
        }

        self.modified.fill(false);
        updated
    }
}
