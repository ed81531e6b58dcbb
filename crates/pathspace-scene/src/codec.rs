// SPDX-License-Identifier: Apache-2.0
//! CBOR encoding for the binary sub-arrays a published bucket is split into on disk.
//!
//! Every other piece of snapshot bookkeeping (the revision index, GC metrics, the
//! current revision pointer, `meta.json`) is a native typed value living directly in
//! the store. These twelve sub-arrays are the exception: they are meant to be read back
//! as an opaque byte blob by tooling outside this process, so they round-trip through a
//! small, explicit CBOR envelope instead.

use minicbor::{Decoder, Encoder};

use crate::types::{
    BoundingBox, BoundingSphere, ClipNode, ClipNodeType, ClipPathRef, ClipRect, DrawableBucket,
    DrawableAuthoringMapEntry, FontAssetReference, GlyphVertex, StrokePoint, Transform,
};

fn encode_transform<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    transform: &Transform,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(16)?;
    for value in transform.elements {
        e.f32(value)?;
    }
    Ok(())
}

fn decode_transform(d: &mut Decoder<'_>) -> Result<Transform, minicbor::decode::Error> {
    let len = d
        .array()?
        .ok_or_else(|| minicbor::decode::Error::message("expected definite array for Transform"))?;
    if len != 16 {
        return Err(minicbor::decode::Error::message(format!(
            "Transform expected 16 elements, got {len}"
        )));
    }
    let mut elements = [0f32; 16];
    for slot in &mut elements {
        *slot = d.f32()?;
    }
    Ok(Transform { elements })
}

fn encode_sphere<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    sphere: &BoundingSphere,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(4)?;
    for value in sphere.center {
        e.f32(value)?;
    }
    e.f32(sphere.radius)?;
    Ok(())
}

fn decode_sphere(d: &mut Decoder<'_>) -> Result<BoundingSphere, minicbor::decode::Error> {
    let len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for BoundingSphere")
    })?;
    if len != 4 {
        return Err(minicbor::decode::Error::message(format!(
            "BoundingSphere expected 4 fields, got {len}"
        )));
    }
    let mut center = [0f32; 3];
    for slot in &mut center {
        *slot = d.f32()?;
    }
    Ok(BoundingSphere { center, radius: d.f32()? })
}

fn encode_box<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    bbox: &BoundingBox,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(6)?;
    for value in bbox.min {
        e.f32(value)?;
    }
    for value in bbox.max {
        e.f32(value)?;
    }
    Ok(())
}

fn decode_box(d: &mut Decoder<'_>) -> Result<BoundingBox, minicbor::decode::Error> {
    let len = d
        .array()?
        .ok_or_else(|| minicbor::decode::Error::message("expected definite array for BoundingBox"))?;
    if len != 6 {
        return Err(minicbor::decode::Error::message(format!(
            "BoundingBox expected 6 fields, got {len}"
        )));
    }
    let mut min = [0f32; 3];
    for slot in &mut min {
        *slot = d.f32()?;
    }
    let mut max = [0f32; 3];
    for slot in &mut max {
        *slot = d.f32()?;
    }
    Ok(BoundingBox { min, max })
}

fn encode_clip_node<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    node: &ClipNode,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(8)?;
    e.u32(node.node_type as u32)?;
    e.i32(node.next)?;
    e.f32(node.rect.min_x)?;
    e.f32(node.rect.min_y)?;
    e.f32(node.rect.max_x)?;
    e.f32(node.rect.max_y)?;
    e.u32(node.path.command_offset)?;
    e.u32(node.path.command_count)?;
    Ok(())
}

fn decode_clip_node(d: &mut Decoder<'_>) -> Result<ClipNode, minicbor::decode::Error> {
    let len = d
        .array()?
        .ok_or_else(|| minicbor::decode::Error::message("expected definite array for ClipNode"))?;
    if len != 8 {
        return Err(minicbor::decode::Error::message(format!(
            "ClipNode expected 8 fields, got {len}"
        )));
    }
    let node_type_value = d.u32()?;
    let node_type = ClipNodeType::from_u32(node_type_value).ok_or_else(|| {
        minicbor::decode::Error::message(format!("unknown ClipNodeType {node_type_value}"))
    })?;
    let next = d.i32()?;
    let rect = ClipRect {
        min_x: d.f32()?,
        min_y: d.f32()?,
        max_x: d.f32()?,
        max_y: d.f32()?,
    };
    let path = ClipPathRef { command_offset: d.u32()?, command_count: d.u32()? };
    Ok(ClipNode { node_type, next, rect, path })
}

fn encode_authoring_entry<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    entry: &DrawableAuthoringMapEntry,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(4)?;
    e.u64(entry.drawable_id)?;
    e.u32(entry.drawable_index_within_node)?;
    e.u32(entry.generation)?;
    e.str(&entry.authoring_node_id)?;
    Ok(())
}

fn decode_authoring_entry(
    d: &mut Decoder<'_>,
) -> Result<DrawableAuthoringMapEntry, minicbor::decode::Error> {
    let len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for DrawableAuthoringMapEntry")
    })?;
    if len != 4 {
        return Err(minicbor::decode::Error::message(format!(
            "DrawableAuthoringMapEntry expected 4 fields, got {len}"
        )));
    }
    Ok(DrawableAuthoringMapEntry {
        drawable_id: d.u64()?,
        drawable_index_within_node: d.u32()?,
        generation: d.u32()?,
        authoring_node_id: d.str()?.to_owned(),
    })
}

fn encode_font_asset<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    asset: &FontAssetReference,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(4)?;
    e.u64(asset.drawable_id)?;
    e.str(&asset.resource_root)?;
    e.u32(asset.revision)?;
    e.u64(asset.fingerprint)?;
    Ok(())
}

fn decode_font_asset(d: &mut Decoder<'_>) -> Result<FontAssetReference, minicbor::decode::Error> {
    let len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for FontAssetReference")
    })?;
    if len != 4 {
        return Err(minicbor::decode::Error::message(format!(
            "FontAssetReference expected 4 fields, got {len}"
        )));
    }
    Ok(FontAssetReference {
        drawable_id: d.u64()?,
        resource_root: d.str()?.to_owned(),
        revision: d.u32()?,
        fingerprint: d.u64()?,
    })
}

fn encode_stroke_point<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    point: &StrokePoint,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(2)?;
    e.f32(point.x)?;
    e.f32(point.y)?;
    Ok(())
}

fn decode_stroke_point(d: &mut Decoder<'_>) -> Result<StrokePoint, minicbor::decode::Error> {
    let len = d
        .array()?
        .ok_or_else(|| minicbor::decode::Error::message("expected definite array for StrokePoint"))?;
    if len != 2 {
        return Err(minicbor::decode::Error::message(format!(
            "StrokePoint expected 2 fields, got {len}"
        )));
    }
    Ok(StrokePoint { x: d.f32()?, y: d.f32()? })
}

fn encode_glyph_vertex<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    glyph: &GlyphVertex,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(8)?;
    e.f32(glyph.min_x)?;
    e.f32(glyph.min_y)?;
    e.f32(glyph.max_x)?;
    e.f32(glyph.max_y)?;
    e.f32(glyph.u0)?;
    e.f32(glyph.v0)?;
    e.f32(glyph.u1)?;
    e.f32(glyph.v1)?;
    Ok(())
}

fn decode_glyph_vertex(d: &mut Decoder<'_>) -> Result<GlyphVertex, minicbor::decode::Error> {
    let len = d
        .array()?
        .ok_or_else(|| minicbor::decode::Error::message("expected definite array for GlyphVertex"))?;
    if len != 8 {
        return Err(minicbor::decode::Error::message(format!(
            "GlyphVertex expected 8 fields, got {len}"
        )));
    }
    Ok(GlyphVertex {
        min_x: d.f32()?,
        min_y: d.f32()?,
        max_x: d.f32()?,
        max_y: d.f32()?,
        u0: d.f32()?,
        v0: d.f32()?,
        u1: d.f32()?,
        v1: d.f32()?,
    })
}

macro_rules! envelope_codec {
    ($encode_fn:ident, $decode_fn:ident, $inner_encode:ident, $inner_decode:ident) => {
        #[must_use]
        pub fn $encode_fn(bucket: &DrawableBucket) -> Vec<u8> {
            let mut buf = Vec::new();
            let mut encoder = Encoder::new(&mut buf);
            $inner_encode(&mut encoder, bucket).expect("encoding should not fail");
            buf
        }

        pub fn $decode_fn(bytes: &[u8]) -> Result<DrawableBucket, minicbor::decode::Error> {
            let mut decoder = Decoder::new(bytes);
            let bucket = $inner_decode(&mut decoder)?;
            if decoder.position() < bytes.len() {
                return Err(minicbor::decode::Error::message("trailing bytes in bucket sub-array"));
            }
            Ok(bucket)
        }
    };
}

fn encode_drawables_inner<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    bucket: &DrawableBucket,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(3)?;
    e.array(bucket.drawable_ids.len() as u64)?;
    for id in &bucket.drawable_ids {
        e.u64(*id)?;
    }
    e.array(bucket.command_offsets.len() as u64)?;
    for offset in &bucket.command_offsets {
        e.u32(*offset)?;
    }
    e.array(bucket.command_counts.len() as u64)?;
    for count in &bucket.command_counts {
        e.u32(*count)?;
    }
    Ok(())
}

fn decode_drawables_inner(d: &mut Decoder<'_>) -> Result<DrawableBucket, minicbor::decode::Error> {
    let len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for drawables envelope")
    })?;
    if len != 3 {
        return Err(minicbor::decode::Error::message("drawables envelope expected 3 fields"));
    }
    let ids_len = d
        .array()?
        .ok_or_else(|| minicbor::decode::Error::message("expected definite array for drawable_ids"))?;
    let mut drawable_ids = Vec::with_capacity(ids_len as usize);
    for _ in 0..ids_len {
        drawable_ids.push(d.u64()?);
    }
    let offsets_len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for command_offsets")
    })?;
    let mut command_offsets = Vec::with_capacity(offsets_len as usize);
    for _ in 0..offsets_len {
        command_offsets.push(d.u32()?);
    }
    let counts_len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for command_counts")
    })?;
    let mut command_counts = Vec::with_capacity(counts_len as usize);
    for _ in 0..counts_len {
        command_counts.push(d.u32()?);
    }
    Ok(DrawableBucket { drawable_ids, command_offsets, command_counts, ..Default::default() })
}

envelope_codec!(
    encode_drawables,
    decode_drawables,
    encode_drawables_inner,
    decode_drawables_inner
);

fn encode_fingerprints_inner<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    bucket: &DrawableBucket,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(1)?;
    e.array(bucket.drawable_fingerprints.len() as u64)?;
    for fingerprint in &bucket.drawable_fingerprints {
        e.u64(*fingerprint)?;
    }
    Ok(())
}

fn decode_fingerprints_inner(d: &mut Decoder<'_>) -> Result<DrawableBucket, minicbor::decode::Error> {
    let len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for fingerprints envelope")
    })?;
    if len != 1 {
        return Err(minicbor::decode::Error::message("fingerprints envelope expected 1 field"));
    }
    let fp_len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for drawable_fingerprints")
    })?;
    let mut drawable_fingerprints = Vec::with_capacity(fp_len as usize);
    for _ in 0..fp_len {
        drawable_fingerprints.push(d.u64()?);
    }
    Ok(DrawableBucket { drawable_fingerprints, ..Default::default() })
}

envelope_codec!(
    encode_fingerprints,
    decode_fingerprints,
    encode_fingerprints_inner,
    decode_fingerprints_inner
);

fn encode_transforms_inner<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    bucket: &DrawableBucket,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(1)?;
    e.array(bucket.world_transforms.len() as u64)?;
    for transform in &bucket.world_transforms {
        encode_transform(e, transform)?;
    }
    Ok(())
}

fn decode_transforms_inner(d: &mut Decoder<'_>) -> Result<DrawableBucket, minicbor::decode::Error> {
    let len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for transforms envelope")
    })?;
    if len != 1 {
        return Err(minicbor::decode::Error::message("transforms envelope expected 1 field"));
    }
    let transforms_len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for world_transforms")
    })?;
    let mut world_transforms = Vec::with_capacity(transforms_len as usize);
    for _ in 0..transforms_len {
        world_transforms.push(decode_transform(d)?);
    }
    Ok(DrawableBucket { world_transforms, ..Default::default() })
}

envelope_codec!(
    encode_transforms,
    decode_transforms,
    encode_transforms_inner,
    decode_transforms_inner
);

fn encode_bounds_inner<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    bucket: &DrawableBucket,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(3)?;
    e.array(bucket.bounds_spheres.len() as u64)?;
    for sphere in &bucket.bounds_spheres {
        encode_sphere(e, sphere)?;
    }
    e.array(bucket.bounds_boxes.len() as u64)?;
    for bbox in &bucket.bounds_boxes {
        encode_box(e, bbox)?;
    }
    e.bytes(&bucket.bounds_box_valid)?;
    Ok(())
}

fn decode_bounds_inner(d: &mut Decoder<'_>) -> Result<DrawableBucket, minicbor::decode::Error> {
    let len = d
        .array()?
        .ok_or_else(|| minicbor::decode::Error::message("expected definite array for bounds envelope"))?;
    if len != 3 {
        return Err(minicbor::decode::Error::message("bounds envelope expected 3 fields"));
    }
    let spheres_len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for bounds_spheres")
    })?;
    let mut bounds_spheres = Vec::with_capacity(spheres_len as usize);
    for _ in 0..spheres_len {
        bounds_spheres.push(decode_sphere(d)?);
    }
    let boxes_len = d
        .array()?
        .ok_or_else(|| minicbor::decode::Error::message("expected definite array for bounds_boxes"))?;
    let mut bounds_boxes = Vec::with_capacity(boxes_len as usize);
    for _ in 0..boxes_len {
        bounds_boxes.push(decode_box(d)?);
    }
    let bounds_box_valid = d.bytes()?.to_vec();
    Ok(DrawableBucket { bounds_spheres, bounds_boxes, bounds_box_valid, ..Default::default() })
}

envelope_codec!(encode_bounds, decode_bounds, encode_bounds_inner, decode_bounds_inner);

fn encode_state_inner<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    bucket: &DrawableBucket,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(5)?;
    e.array(bucket.layers.len() as u64)?;
    for layer in &bucket.layers {
        e.u32(*layer)?;
    }
    e.array(bucket.z_values.len() as u64)?;
    for z in &bucket.z_values {
        e.f32(*z)?;
    }
    e.array(bucket.material_ids.len() as u64)?;
    for material_id in &bucket.material_ids {
        e.u32(*material_id)?;
    }
    e.array(bucket.pipeline_flags.len() as u64)?;
    for flags in &bucket.pipeline_flags {
        e.u32(*flags)?;
    }
    e.bytes(&bucket.visibility)?;
    Ok(())
}

fn decode_state_inner(d: &mut Decoder<'_>) -> Result<DrawableBucket, minicbor::decode::Error> {
    let len = d
        .array()?
        .ok_or_else(|| minicbor::decode::Error::message("expected definite array for state envelope"))?;
    if len != 5 {
        return Err(minicbor::decode::Error::message("state envelope expected 5 fields"));
    }
    let layers_len = d
        .array()?
        .ok_or_else(|| minicbor::decode::Error::message("expected definite array for layers"))?;
    let mut layers = Vec::with_capacity(layers_len as usize);
    for _ in 0..layers_len {
        layers.push(d.u32()?);
    }
    let z_len = d
        .array()?
        .ok_or_else(|| minicbor::decode::Error::message("expected definite array for z_values"))?;
    let mut z_values = Vec::with_capacity(z_len as usize);
    for _ in 0..z_len {
        z_values.push(d.f32()?);
    }
    let material_len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for material_ids")
    })?;
    let mut material_ids = Vec::with_capacity(material_len as usize);
    for _ in 0..material_len {
        material_ids.push(d.u32()?);
    }
    let flags_len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for pipeline_flags")
    })?;
    let mut pipeline_flags = Vec::with_capacity(flags_len as usize);
    for _ in 0..flags_len {
        pipeline_flags.push(d.u32()?);
    }
    let visibility = d.bytes()?.to_vec();
    Ok(DrawableBucket {
        layers,
        z_values,
        material_ids,
        pipeline_flags,
        visibility,
        ..Default::default()
    })
}

envelope_codec!(encode_state, decode_state, encode_state_inner, decode_state_inner);

fn encode_cmd_buffer_inner<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    bucket: &DrawableBucket,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(2)?;
    e.array(bucket.command_kinds.len() as u64)?;
    for kind in &bucket.command_kinds {
        e.u32(*kind)?;
    }
    e.bytes(&bucket.command_payload)?;
    Ok(())
}

fn decode_cmd_buffer_inner(d: &mut Decoder<'_>) -> Result<DrawableBucket, minicbor::decode::Error> {
    let len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for cmd-buffer envelope")
    })?;
    if len != 2 {
        return Err(minicbor::decode::Error::message("cmd-buffer envelope expected 2 fields"));
    }
    let kinds_len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for command_kinds")
    })?;
    let mut command_kinds = Vec::with_capacity(kinds_len as usize);
    for _ in 0..kinds_len {
        command_kinds.push(d.u32()?);
    }
    let command_payload = d.bytes()?.to_vec();
    Ok(DrawableBucket { command_kinds, command_payload, ..Default::default() })
}

envelope_codec!(
    encode_cmd_buffer,
    decode_cmd_buffer,
    encode_cmd_buffer_inner,
    decode_cmd_buffer_inner
);

fn encode_strokes_inner<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    bucket: &DrawableBucket,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(1)?;
    e.array(bucket.stroke_points.len() as u64)?;
    for point in &bucket.stroke_points {
        encode_stroke_point(e, point)?;
    }
    Ok(())
}

fn decode_strokes_inner(d: &mut Decoder<'_>) -> Result<DrawableBucket, minicbor::decode::Error> {
    let len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for strokes envelope")
    })?;
    if len != 1 {
        return Err(minicbor::decode::Error::message("strokes envelope expected 1 field"));
    }
    let points_len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for stroke_points")
    })?;
    let mut stroke_points = Vec::with_capacity(points_len as usize);
    for _ in 0..points_len {
        stroke_points.push(decode_stroke_point(d)?);
    }
    Ok(DrawableBucket { stroke_points, ..Default::default() })
}

envelope_codec!(encode_strokes, decode_strokes, encode_strokes_inner, decode_strokes_inner);

fn encode_clip_heads_inner<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    bucket: &DrawableBucket,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(1)?;
    e.array(bucket.clip_head_indices.len() as u64)?;
    for head in &bucket.clip_head_indices {
        e.i32(*head)?;
    }
    Ok(())
}

fn decode_clip_heads_inner(d: &mut Decoder<'_>) -> Result<DrawableBucket, minicbor::decode::Error> {
    let len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for clip-heads envelope")
    })?;
    if len != 1 {
        return Err(minicbor::decode::Error::message("clip-heads envelope expected 1 field"));
    }
    let heads_len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for clip_head_indices")
    })?;
    let mut clip_head_indices = Vec::with_capacity(heads_len as usize);
    for _ in 0..heads_len {
        clip_head_indices.push(d.i32()?);
    }
    Ok(DrawableBucket { clip_head_indices, ..Default::default() })
}

envelope_codec!(
    encode_clip_heads,
    decode_clip_heads,
    encode_clip_heads_inner,
    decode_clip_heads_inner
);

fn encode_clip_nodes_inner<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    bucket: &DrawableBucket,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(1)?;
    e.array(bucket.clip_nodes.len() as u64)?;
    for node in &bucket.clip_nodes {
        encode_clip_node(e, node)?;
    }
    Ok(())
}

fn decode_clip_nodes_inner(d: &mut Decoder<'_>) -> Result<DrawableBucket, minicbor::decode::Error> {
    let len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for clip-nodes envelope")
    })?;
    if len != 1 {
        return Err(minicbor::decode::Error::message("clip-nodes envelope expected 1 field"));
    }
    let nodes_len = d
        .array()?
        .ok_or_else(|| minicbor::decode::Error::message("expected definite array for clip_nodes"))?;
    let mut clip_nodes = Vec::with_capacity(nodes_len as usize);
    for _ in 0..nodes_len {
        clip_nodes.push(decode_clip_node(d)?);
    }
    Ok(DrawableBucket { clip_nodes, ..Default::default() })
}

envelope_codec!(
    encode_clip_nodes,
    decode_clip_nodes,
    encode_clip_nodes_inner,
    decode_clip_nodes_inner
);

fn encode_authoring_map_inner<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    bucket: &DrawableBucket,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(1)?;
    e.array(bucket.authoring_map.len() as u64)?;
    for entry in &bucket.authoring_map {
        encode_authoring_entry(e, entry)?;
    }
    Ok(())
}

fn decode_authoring_map_inner(d: &mut Decoder<'_>) -> Result<DrawableBucket, minicbor::decode::Error> {
    let len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for authoring-map envelope")
    })?;
    if len != 1 {
        return Err(minicbor::decode::Error::message("authoring-map envelope expected 1 field"));
    }
    let entries_len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for authoring_map")
    })?;
    let mut authoring_map = Vec::with_capacity(entries_len as usize);
    for _ in 0..entries_len {
        authoring_map.push(decode_authoring_entry(d)?);
    }
    Ok(DrawableBucket { authoring_map, ..Default::default() })
}

envelope_codec!(
    encode_authoring_map,
    decode_authoring_map,
    encode_authoring_map_inner,
    decode_authoring_map_inner
);

fn encode_font_assets_inner<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    bucket: &DrawableBucket,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(1)?;
    e.array(bucket.font_assets.len() as u64)?;
    for asset in &bucket.font_assets {
        encode_font_asset(e, asset)?;
    }
    Ok(())
}

fn decode_font_assets_inner(d: &mut Decoder<'_>) -> Result<DrawableBucket, minicbor::decode::Error> {
    let len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for font-assets envelope")
    })?;
    if len != 1 {
        return Err(minicbor::decode::Error::message("font-assets envelope expected 1 field"));
    }
    let assets_len = d
        .array()?
        .ok_or_else(|| minicbor::decode::Error::message("expected definite array for font_assets"))?;
    let mut font_assets = Vec::with_capacity(assets_len as usize);
    for _ in 0..assets_len {
        font_assets.push(decode_font_asset(d)?);
    }
    Ok(DrawableBucket { font_assets, ..Default::default() })
}

envelope_codec!(
    encode_font_assets,
    decode_font_assets,
    encode_font_assets_inner,
    decode_font_assets_inner
);

fn encode_glyph_vertices_inner<W: minicbor::encode::Write>(
    e: &mut Encoder<W>,
    bucket: &DrawableBucket,
) -> Result<(), minicbor::encode::Error<W::Error>> {
    e.array(1)?;
    e.array(bucket.glyph_vertices.len() as u64)?;
    for glyph in &bucket.glyph_vertices {
        encode_glyph_vertex(e, glyph)?;
    }
    Ok(())
}

fn decode_glyph_vertices_inner(d: &mut Decoder<'_>) -> Result<DrawableBucket, minicbor::decode::Error> {
    let len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for glyph-vertices envelope")
    })?;
    if len != 1 {
        return Err(minicbor::decode::Error::message("glyph-vertices envelope expected 1 field"));
    }
    let glyphs_len = d.array()?.ok_or_else(|| {
        minicbor::decode::Error::message("expected definite array for glyph_vertices")
    })?;
    let mut glyph_vertices = Vec::with_capacity(glyphs_len as usize);
    for _ in 0..glyphs_len {
        glyph_vertices.push(decode_glyph_vertex(d)?);
    }
    Ok(DrawableBucket { glyph_vertices, ..Default::default() })
}

envelope_codec!(
    encode_glyph_vertices,
    decode_glyph_vertices,
    encode_glyph_vertices_inner,
    decode_glyph_vertices_inner
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingSphere, ClipPathRef, ClipRect};

    #[test]
    fn drawables_roundtrip() {
        let bucket = DrawableBucket {
            drawable_ids: vec![1, 2, 3],
            command_offsets: vec![0, 2, 2],
            command_counts: vec![2, 0, 1],
            ..Default::default()
        };
        let bytes = encode_drawables(&bucket);
        let decoded = decode_drawables(&bytes).expect("decode");
        assert_eq!(decoded.drawable_ids, bucket.drawable_ids);
        assert_eq!(decoded.command_offsets, bucket.command_offsets);
        assert_eq!(decoded.command_counts, bucket.command_counts);
    }

    #[test]
    fn transforms_roundtrip() {
        let bucket = DrawableBucket {
            world_transforms: vec![Transform { elements: core::array::from_fn(|i| i as f32) }],
            ..Default::default()
        };
        let bytes = encode_transforms(&bucket);
        let decoded = decode_transforms(&bytes).expect("decode");
        assert_eq!(decoded.world_transforms, bucket.world_transforms);
    }

    #[test]
    fn bounds_roundtrip_with_empty_boxes() {
        let bucket = DrawableBucket {
            bounds_spheres: vec![BoundingSphere { center: [1.0, 2.0, 3.0], radius: 4.0 }],
            bounds_boxes: Vec::new(),
            bounds_box_valid: vec![0],
            ..Default::default()
        };
        let bytes = encode_bounds(&bucket);
        let decoded = decode_bounds(&bytes).expect("decode");
        assert_eq!(decoded.bounds_spheres, bucket.bounds_spheres);
        assert!(decoded.bounds_boxes.is_empty());
        assert_eq!(decoded.bounds_box_valid, bucket.bounds_box_valid);
    }

    #[test]
    fn clip_nodes_roundtrip() {
        let bucket = DrawableBucket {
            clip_nodes: vec![ClipNode {
                node_type: ClipNodeType::Path,
                next: -1,
                rect: ClipRect::default(),
                path: ClipPathRef { command_offset: 3, command_count: 2 },
            }],
            ..Default::default()
        };
        let bytes = encode_clip_nodes(&bucket);
        let decoded = decode_clip_nodes(&bytes).expect("decode");
        assert_eq!(decoded.clip_nodes, bucket.clip_nodes);
    }

    #[test]
    fn cmd_buffer_rejects_trailing_bytes() {
        let mut bytes = encode_cmd_buffer(&DrawableBucket::default());
        bytes.push(0xFF);
        assert!(decode_cmd_buffer(&bytes).is_err());
    }

    #[test]
    fn authoring_map_roundtrips_empty_node_id() {
        let bucket = DrawableBucket {
            authoring_map: vec![DrawableAuthoringMapEntry {
                drawable_id: 7,
                drawable_index_within_node: 1,
                generation: 2,
                authoring_node_id: String::new(),
            }],
            ..Default::default()
        };
        let bytes = encode_authoring_map(&bucket);
        let decoded = decode_authoring_map(&bytes).expect("decode");
        assert_eq!(decoded.authoring_map, bucket.authoring_map);
    }
}
