// SPDX-License-Identifier: Apache-2.0
//! Structural validation of a [`DrawableBucket`] before it is published.

use pathspace_core::Error;

use crate::commands::{payload_size_bytes, DrawCommandKind, StrokeCommand, TextGlyphsCommand};
use crate::types::{ClipNodeType, DrawableBucket};

fn check_size(actual: usize, expected: usize, name: &str) -> Result<(), Error> {
    if actual != expected {
        return Err(Error::InvalidType(format!("{name} size mismatch")));
    }
    Ok(())
}

/// Validates that every parallel array in `bucket` is internally consistent: sizes
/// line up with `drawable_ids`, every index into another array is in range, and the
/// command payload exactly covers every command's fixed-size record with no trailing
/// bytes.
///
/// # Errors
///
/// Returns [`Error::InvalidType`] describing the first inconsistency found.
pub fn ensure_valid_bucket(bucket: &DrawableBucket) -> Result<(), Error> {
    let drawable_size = bucket.drawable_ids.len();

    check_size(bucket.world_transforms.len(), drawable_size, "world_transforms")?;
    check_size(bucket.bounds_spheres.len(), drawable_size, "bounds_spheres")?;
    check_size(bucket.bounds_box_valid.len(), drawable_size, "bounds_box_valid")?;
    if !bucket.bounds_boxes.is_empty() {
        check_size(bucket.bounds_boxes.len(), drawable_size, "bounds_boxes")?;
    }
    check_size(bucket.layers.len(), drawable_size, "layers")?;
    check_size(bucket.z_values.len(), drawable_size, "z_values")?;
    check_size(bucket.material_ids.len(), drawable_size, "material_ids")?;
    check_size(bucket.pipeline_flags.len(), drawable_size, "pipeline_flags")?;
    check_size(bucket.visibility.len(), drawable_size, "visibility")?;
    check_size(bucket.command_offsets.len(), drawable_size, "command_offsets")?;
    check_size(bucket.command_counts.len(), drawable_size, "command_counts")?;
    if !bucket.clip_head_indices.is_empty() {
        check_size(bucket.clip_head_indices.len(), drawable_size, "clip_head_indices")?;
    }

    let clip_node_count = bucket.clip_nodes.len();
    for &head in &bucket.clip_head_indices {
        if head < -1 || (head >= 0 && head as usize >= clip_node_count) {
            return Err(Error::InvalidType(
                "clip_head_indices contains out-of-range index".to_string(),
            ));
        }
    }
    for node in &bucket.clip_nodes {
        if node.next < -1 || (node.next >= 0 && node.next as usize >= clip_node_count) {
            return Err(Error::InvalidType(
                "clip_nodes contains next index out of range".to_string(),
            ));
        }
        match node.node_type {
            ClipNodeType::Rect => {}
            ClipNodeType::Path => {
                if node.path.command_count == 0 {
                    return Err(Error::InvalidType(
                        "clip_nodes path reference missing command count".to_string(),
                    ));
                }
            }
        }
    }

    if !bucket.authoring_map.is_empty() {
        check_size(bucket.authoring_map.len(), drawable_size, "authoring_map")?;
        for (i, entry) in bucket.authoring_map.iter().enumerate() {
            if entry.drawable_id != 0 && entry.drawable_id != bucket.drawable_ids[i] {
                return Err(Error::InvalidType("authoring_map drawable_id mismatch".to_string()));
            }
        }
    }

    if !bucket.drawable_fingerprints.is_empty() {
        check_size(bucket.drawable_fingerprints.len(), drawable_size, "drawable_fingerprints")?;
    }

    let mut payload_cursor = 0usize;
    for &kind_value in &bucket.command_kinds {
        let payload_size = payload_size_bytes(kind_value);
        if payload_cursor + payload_size > bucket.command_payload.len() {
            return Err(Error::InvalidType(
                "command payload buffer too small for recorded kinds".to_string(),
            ));
        }
        if DrawCommandKind::from_u32(kind_value) == Some(DrawCommandKind::Stroke) {
            let span = &bucket.command_payload[payload_cursor..payload_cursor + payload_size];
            let stroke = StrokeCommand::from_bytes(span)
                .ok_or_else(|| Error::InvalidType("stroke command payload truncated".to_string()))?;
            if stroke.thickness < 0.0 {
                return Err(Error::InvalidType(
                    "stroke command thickness must be non-negative".to_string(),
                ));
            }
            let offset = stroke.point_offset as usize;
            let count = stroke.point_count as usize;
            let in_range = offset <= bucket.stroke_points.len()
                && count <= bucket.stroke_points.len()
                && offset.checked_add(count).is_some_and(|end| end <= bucket.stroke_points.len());
            if !in_range {
                return Err(Error::InvalidType(
                    "stroke command references point buffer out of range".to_string(),
                ));
            }
        }
        if DrawCommandKind::from_u32(kind_value) == Some(DrawCommandKind::TextGlyphs) {
            let span = &bucket.command_payload[payload_cursor..payload_cursor + payload_size];
            let glyphs = TextGlyphsCommand::from_bytes(span)
                .ok_or_else(|| Error::InvalidType("text-glyphs command payload truncated".to_string()))?;
            let offset = glyphs.glyph_offset as usize;
            let count = glyphs.glyph_count as usize;
            let in_range = offset <= bucket.glyph_vertices.len()
                && count <= bucket.glyph_vertices.len()
                && offset.checked_add(count).is_some_and(|end| end <= bucket.glyph_vertices.len());
            if !in_range {
                return Err(Error::InvalidType(
                    "text-glyphs command references glyph vertex buffer out of range".to_string(),
                ));
            }
        }
        payload_cursor += payload_size;
    }
    if payload_cursor != bucket.command_payload.len() {
        return Err(Error::InvalidType("command payload contains trailing bytes".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClipNode, ClipPathRef, ClipRect};

    fn valid_bucket() -> DrawableBucket {
        DrawableBucket {
            drawable_ids: vec![1],
            world_transforms: vec![crate::types::Transform { elements: [0.0; 16] }],
            bounds_spheres: vec![crate::types::BoundingSphere { center: [0.0; 3], radius: 1.0 }],
            bounds_box_valid: vec![0],
            layers: vec![0],
            z_values: vec![0.0],
            material_ids: vec![0],
            pipeline_flags: vec![0],
            visibility: vec![1],
            command_offsets: vec![0],
            command_counts: vec![0],
            ..Default::default()
        }
    }

    #[test]
    fn accepts_a_well_formed_bucket() {
        assert!(ensure_valid_bucket(&valid_bucket()).is_ok());
    }

    #[test]
    fn rejects_mismatched_array_length() {
        let mut bucket = valid_bucket();
        bucket.z_values.push(1.0);
        assert_eq!(
            ensure_valid_bucket(&bucket),
            Err(Error::InvalidType("z_values size mismatch".to_string()))
        );
    }

    #[test]
    fn rejects_trailing_command_payload_bytes() {
        let mut bucket = valid_bucket();
        bucket.command_payload = vec![0, 1, 2, 3];
        assert!(ensure_valid_bucket(&bucket).is_err());
    }

    #[test]
    fn rejects_out_of_range_clip_head() {
        let mut bucket = valid_bucket();
        bucket.clip_head_indices = vec![0];
        assert!(ensure_valid_bucket(&bucket).is_err());
    }

    #[test]
    fn rejects_path_clip_node_with_zero_commands() {
        let mut bucket = valid_bucket();
        bucket.clip_head_indices = vec![0];
        bucket.clip_nodes = vec![ClipNode {
            node_type: ClipNodeType::Path,
            next: -1,
            rect: ClipRect::default(),
            path: ClipPathRef { command_offset: 0, command_count: 0 },
        }];
        assert!(ensure_valid_bucket(&bucket).is_err());
    }

    #[test]
    fn rejects_negative_thickness_stroke() {
        let mut bucket = valid_bucket();
        bucket.command_kinds = vec![DrawCommandKind::Stroke as u32];
        let stroke = StrokeCommand { thickness: -1.0, point_offset: 0, point_count: 0 };
        bucket.command_payload = stroke.to_bytes().to_vec();
        bucket.command_counts = vec![1];
        assert!(ensure_valid_bucket(&bucket).is_err());
    }

    #[test]
    fn rejects_text_glyphs_command_out_of_range() {
        let mut bucket = valid_bucket();
        bucket.command_kinds = vec![DrawCommandKind::TextGlyphs as u32];
        let glyphs = crate::commands::TextGlyphsCommand {
            atlas_fingerprint: 0,
            flags: 0,
            glyph_offset: 0,
            glyph_count: 1,
        };
        bucket.command_payload = glyphs.to_bytes().to_vec();
        bucket.command_counts = vec![1];
        assert!(bucket.glyph_vertices.is_empty());
        assert!(ensure_valid_bucket(&bucket).is_err());
    }

    #[test]
    fn accepts_text_glyphs_command_in_range() {
        let mut bucket = valid_bucket();
        bucket.command_kinds = vec![DrawCommandKind::TextGlyphs as u32];
        let glyphs = crate::commands::TextGlyphsCommand {
            atlas_fingerprint: 0,
            flags: 0,
            glyph_offset: 0,
            glyph_count: 1,
        };
        bucket.command_payload = glyphs.to_bytes().to_vec();
        bucket.command_counts = vec![1];
        bucket.glyph_vertices = vec![crate::types::GlyphVertex {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 1.0,
            max_y: 1.0,
            u0: 0.0,
            v0: 0.0,
            u1: 1.0,
            v1: 1.0,
        }];
        assert!(ensure_valid_bucket(&bucket).is_ok());
    }
}
