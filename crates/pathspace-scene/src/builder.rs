// SPDX-License-Identifier: Apache-2.0
//! Revisioned scene snapshot publishing, pruning, and readback.

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use pathspace::PathSpace;
use pathspace_core::{Error, In, Out, Result};
use serde::Serialize;
use tracing::{debug, trace};

use crate::codec;
use crate::fingerprint::compute_drawable_fingerprints;
use crate::types::{
    DrawableAuthoringMapEntry, DrawableBucket, RetentionPolicy, SnapshotGcMetrics,
    SnapshotMetadata, SnapshotPublishOptions, SnapshotRecord, SnapshotSummary,
};
use crate::validate::ensure_valid_bucket;

/// Per-revision bookkeeping kept alongside the binary bucket, used only to reconstruct
/// `current_revision` bookkeeping on eviction.
#[derive(Debug, Clone, PartialEq)]
struct RevisionDesc {
    revision: u64,
    published_at_ms: i64,
    author: String,
}

#[derive(Serialize)]
struct MetaJson {
    revision: u64,
    created_at_ms: i64,
    author: String,
    tool_version: String,
    drawable_count: u64,
    command_count: u64,
    fingerprint_count: u64,
    font_asset_count: u64,
    authoring_map_entries: u64,
    unique_authoring_nodes: u64,
}

/// Zero-pads a revision number to 16 digits, matching the on-disk directory name.
#[must_use]
pub fn format_revision(revision: u64) -> String {
    format!("{revision:016}")
}

/// Builds the path prefix every sub-array of a revision is stored under.
#[must_use]
pub fn make_revision_base(scene_path: &str, revision: u64) -> String {
    format!("{scene_path}/builds/{}", format_revision(revision))
}

fn now_epoch_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

fn drain_queue<T: Any + Clone + Send + Sync>(space: &PathSpace, path: &str) -> Result<()> {
    loop {
        match space.take::<T>(path, Out::new()) {
            Ok(_) => continue,
            Err(Error::NoObjectFound | Error::NoSuchPath(_)) => return Ok(()),
            Err(other) => return Err(other),
        }
    }
}

/// Drains whatever is queued at `path` and inserts `value` as the sole occupant,
/// mirroring the "replace the current value" idiom every snapshot bookkeeping entry
/// uses.
fn replace_single<T: Any + Clone + Send + Sync>(space: &PathSpace, path: &str, value: T) -> Result<()> {
    drain_queue::<T>(space, path)?;
    let outcome = space.insert(path, value, In::new());
    if let Some((_, err)) = outcome.errors.into_iter().next() {
        return Err(err);
    }
    Ok(())
}

fn decode_err(err: minicbor::decode::Error) -> Error {
    Error::MalformedInput(err.to_string())
}

/// Builds, publishes, and garbage-collects revisioned scene snapshots under a single
/// scene path.
///
/// Every public method takes an internal lock, so one builder can be shared across
/// threads publishing to the same scene without interleaving a partial revision.
pub struct SceneSnapshotBuilder {
    space: Arc<PathSpace>,
    scene_path: String,
    policy: RetentionPolicy,
    mutex: Mutex<()>,
}

impl SceneSnapshotBuilder {
    /// Creates a builder that publishes revisions under `scene_path`.
    #[must_use]
    pub fn new(space: Arc<PathSpace>, scene_path: impl Into<String>, policy: RetentionPolicy) -> Self {
        Self { space, scene_path: scene_path.into(), policy, mutex: Mutex::new(()) }
    }

    /// Publishes `bucket` as a new revision, then runs retention pruning.
    ///
    /// Returns the revision number assigned to this publish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidType`] if `bucket` fails structural validation, or
    /// whatever error the underlying store reports for a failed read/write.
    pub fn publish(&self, options: &SnapshotPublishOptions, bucket: &DrawableBucket) -> Result<u64> {
        let _guard = self.mutex.lock();
        ensure_valid_bucket(bucket)?;

        let revision = self.next_revision(options.revision)?;
        let mut meta = options.metadata.clone();
        meta.drawable_count = bucket.drawable_ids.len() as u64;
        meta.command_count = bucket.command_kinds.len() as u64;

        self.store_bucket(revision, bucket, &meta)?;
        self.record_snapshot(revision, &meta)?;

        let mut records = self.load_index()?;
        let mut metrics = SnapshotGcMetrics::default();
        self.prune_impl(&mut records, &mut metrics)?;
        self.persist_index(&records)?;
        metrics.last_revision = revision;
        self.record_metrics(&metrics)?;

        debug!(scene = %self.scene_path, revision, "published scene snapshot");
        Ok(revision)
    }

    /// Runs retention pruning without publishing a new revision.
    ///
    /// # Errors
    ///
    /// Returns an error if the revision index or GC metrics cannot be read or written.
    pub fn prune(&self) -> Result<()> {
        let _guard = self.mutex.lock();
        let mut records = self.load_index()?;
        let mut metrics = SnapshotGcMetrics::default();
        self.prune_impl(&mut records, &mut metrics)?;
        self.persist_index(&records)?;
        if let Some(last) = records.last() {
            metrics.last_revision = last.revision;
        }
        self.record_metrics(&metrics)
    }

    /// Returns the currently retained revision index, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the revision index cannot be read.
    pub fn snapshot_records(&self) -> Result<Vec<SnapshotRecord>> {
        let _guard = self.mutex.lock();
        self.load_index()
    }

    /// Reconstructs a [`DrawableBucket`] from a revision's persisted binary sub-arrays.
    ///
    /// # Errors
    ///
    /// Returns an error if any sub-array is missing (the revision was pruned or never
    /// published) or fails to decode.
    pub fn decode_bucket(&self, revision: u64) -> Result<DrawableBucket> {
        let base = make_revision_base(&self.scene_path, revision);

        let drawables = codec::decode_drawables(&self.read_bytes(&format!("{base}/bucket/drawables.bin"))?)
            .map_err(decode_err)?;
        let fingerprints =
            codec::decode_fingerprints(&self.read_bytes(&format!("{base}/bucket/fingerprints.bin"))?)
                .map_err(decode_err)?;
        let transforms =
            codec::decode_transforms(&self.read_bytes(&format!("{base}/bucket/transforms.bin"))?)
                .map_err(decode_err)?;
        let bounds = codec::decode_bounds(&self.read_bytes(&format!("{base}/bucket/bounds.bin"))?)
            .map_err(decode_err)?;
        let state = codec::decode_state(&self.read_bytes(&format!("{base}/bucket/state.bin"))?)
            .map_err(decode_err)?;
        let cmd_buffer =
            codec::decode_cmd_buffer(&self.read_bytes(&format!("{base}/bucket/cmd-buffer.bin"))?)
                .map_err(decode_err)?;
        let strokes = codec::decode_strokes(&self.read_bytes(&format!("{base}/bucket/strokes.bin"))?)
            .map_err(decode_err)?;
        let clip_heads =
            codec::decode_clip_heads(&self.read_bytes(&format!("{base}/bucket/clip-heads.bin"))?)
                .map_err(decode_err)?;
        let clip_nodes =
            codec::decode_clip_nodes(&self.read_bytes(&format!("{base}/bucket/clip-nodes.bin"))?)
                .map_err(decode_err)?;
        let authoring_map =
            codec::decode_authoring_map(&self.read_bytes(&format!("{base}/bucket/authoring-map.bin"))?)
                .map_err(decode_err)?;
        let font_assets =
            codec::decode_font_assets(&self.read_bytes(&format!("{base}/bucket/font-assets.bin"))?)
                .map_err(decode_err)?;
        let glyph_vertices = codec::decode_glyph_vertices(
            &self.read_bytes(&format!("{base}/bucket/glyph-vertices.bin"))?,
        )
        .map_err(decode_err)?;

        let opaque_indices = self.space.read::<Vec<u32>>(&format!("{base}/bucket/indices/opaque.bin"), Out::new())?;
        let alpha_indices = self.space.read::<Vec<u32>>(&format!("{base}/bucket/indices/alpha.bin"), Out::new())?;

        let summary = self.space.read::<SnapshotSummary>(&format!("{base}/bucket/summary"), Out::new())?;
        let mut layer_indices = Vec::with_capacity(summary.layer_ids.len());
        for layer_id in summary.layer_ids {
            let indices = self
                .space
                .read::<Vec<u32>>(&format!("{base}/bucket/indices/layer/{layer_id}.bin"), Out::new())?;
            layer_indices.push(crate::types::LayerIndices { layer: layer_id, indices });
        }

        Ok(DrawableBucket {
            drawable_ids: drawables.drawable_ids,
            world_transforms: transforms.world_transforms,
            bounds_spheres: bounds.bounds_spheres,
            bounds_boxes: bounds.bounds_boxes,
            bounds_box_valid: bounds.bounds_box_valid,
            layers: state.layers,
            z_values: state.z_values,
            material_ids: state.material_ids,
            pipeline_flags: state.pipeline_flags,
            visibility: state.visibility,
            command_offsets: drawables.command_offsets,
            command_counts: drawables.command_counts,
            command_kinds: cmd_buffer.command_kinds,
            command_payload: cmd_buffer.command_payload,
            stroke_points: strokes.stroke_points,
            glyph_vertices: glyph_vertices.glyph_vertices,
            clip_head_indices: clip_heads.clip_head_indices,
            clip_nodes: clip_nodes.clip_nodes,
            authoring_map: authoring_map.authoring_map,
            drawable_fingerprints: fingerprints.drawable_fingerprints,
            font_assets: font_assets.font_assets,
            layer_indices,
            opaque_indices,
            alpha_indices,
        })
    }

    fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        self.space.read::<Vec<u8>>(path, Out::new())
    }

    fn next_revision(&self, requested: Option<u64>) -> Result<u64> {
        if let Some(revision) = requested {
            return Ok(revision);
        }
        match self.space.read::<u64>(&format!("{}/current_revision", self.scene_path), Out::new()) {
            Ok(current) => Ok(current + 1),
            Err(Error::NoObjectFound | Error::NoSuchPath(_)) => Ok(1),
            Err(other) => Err(other),
        }
    }

    fn store_bucket(&self, revision: u64, bucket: &DrawableBucket, meta: &SnapshotMetadata) -> Result<()> {
        let base = make_revision_base(&self.scene_path, revision);
        let drawable_count = bucket.drawable_ids.len();

        let mut working = bucket.clone();
        if working.drawable_fingerprints.len() != drawable_count {
            working.drawable_fingerprints = compute_drawable_fingerprints(&working);
        }
        if working.clip_head_indices.is_empty() {
            working.clip_head_indices = vec![-1; drawable_count];
        }
        if working.authoring_map.is_empty() {
            working.authoring_map = working
                .drawable_ids
                .iter()
                .map(|&drawable_id| DrawableAuthoringMapEntry { drawable_id, ..Default::default() })
                .collect();
        }

        replace_single(&self.space, &format!("{base}/bucket/drawables.bin"), codec::encode_drawables(&working))?;
        replace_single(
            &self.space,
            &format!("{base}/bucket/fingerprints.bin"),
            codec::encode_fingerprints(&working),
        )?;
        replace_single(
            &self.space,
            &format!("{base}/bucket/transforms.bin"),
            codec::encode_transforms(&working),
        )?;
        replace_single(&self.space, &format!("{base}/bucket/bounds.bin"), codec::encode_bounds(&working))?;
        replace_single(&self.space, &format!("{base}/bucket/state.bin"), codec::encode_state(&working))?;
        replace_single(
            &self.space,
            &format!("{base}/bucket/cmd-buffer.bin"),
            codec::encode_cmd_buffer(&working),
        )?;
        replace_single(&self.space, &format!("{base}/bucket/strokes.bin"), codec::encode_strokes(&working))?;
        replace_single(
            &self.space,
            &format!("{base}/bucket/clip-heads.bin"),
            codec::encode_clip_heads(&working),
        )?;
        replace_single(
            &self.space,
            &format!("{base}/bucket/clip-nodes.bin"),
            codec::encode_clip_nodes(&working),
        )?;
        replace_single(
            &self.space,
            &format!("{base}/bucket/authoring-map.bin"),
            codec::encode_authoring_map(&working),
        )?;
        replace_single(
            &self.space,
            &format!("{base}/bucket/font-assets.bin"),
            codec::encode_font_assets(&working),
        )?;
        replace_single(
            &self.space,
            &format!("{base}/bucket/glyph-vertices.bin"),
            codec::encode_glyph_vertices(&working),
        )?;

        replace_single(&self.space, &format!("{base}/bucket/indices/opaque.bin"), bucket.opaque_indices.clone())?;
        replace_single(&self.space, &format!("{base}/bucket/indices/alpha.bin"), bucket.alpha_indices.clone())?;

        let mut layer_ids = Vec::with_capacity(bucket.layer_indices.len());
        for layer in &bucket.layer_indices {
            layer_ids.push(layer.layer);
            let layer_path = format!("{base}/bucket/indices/layer/{}.bin", layer.layer);
            replace_single(&self.space, &layer_path, layer.indices.clone())?;
        }

        let fingerprint_count = meta.fingerprint_digests.len() as u64;

        let mut unique_nodes = HashSet::new();
        for entry in &working.authoring_map {
            if !entry.authoring_node_id.is_empty() {
                unique_nodes.insert(entry.authoring_node_id.as_str());
            }
        }
        let meta_json = MetaJson {
            revision,
            created_at_ms: meta.created_at_ms,
            author: meta.author.clone(),
            tool_version: meta.tool_version.clone(),
            drawable_count: meta.drawable_count,
            command_count: meta.command_count,
            fingerprint_count,
            font_asset_count: bucket.font_assets.len() as u64,
            authoring_map_entries: working.authoring_map.len() as u64,
            unique_authoring_nodes: unique_nodes.len() as u64,
        };
        let meta_text = serde_json::to_string(&meta_json)
            .map_err(|err| Error::SerializationFunctionMissing(err.to_string()))?;
        replace_single(&self.space, &format!("{base}/bucket/meta.json"), meta_text)?;

        let summary = SnapshotSummary {
            drawable_count: meta.drawable_count,
            command_count: meta.command_count,
            layer_ids,
            fingerprint_count,
        };
        replace_single(&self.space, &format!("{base}/bucket/summary"), summary)?;

        replace_single(
            &self.space,
            &format!("{base}/desc"),
            RevisionDesc { revision, published_at_ms: meta.created_at_ms, author: meta.author.clone() },
        )?;
        replace_single(&self.space, &format!("{base}/metadata"), meta.clone())?;

        replace_single(&self.space, &format!("{}/current_revision", self.scene_path), revision)
    }

    fn record_snapshot(&self, revision: u64, meta: &SnapshotMetadata) -> Result<()> {
        let mut records = self.load_index()?;
        records.push(SnapshotRecord {
            revision,
            created_at_ms: meta.created_at_ms,
            drawable_count: meta.drawable_count,
            command_count: meta.command_count,
            fingerprint_count: meta.fingerprint_digests.len() as u64,
        });
        records.sort_by_key(|record| record.revision);
        self.persist_index(&records)
    }

    fn load_index(&self) -> Result<Vec<SnapshotRecord>> {
        match self
            .space
            .read::<Vec<SnapshotRecord>>(&format!("{}/meta/snapshots/index", self.scene_path), Out::new())
        {
            Ok(records) => Ok(records),
            Err(Error::NoObjectFound | Error::NoSuchPath(_)) => Ok(Vec::new()),
            Err(other) => Err(other),
        }
    }

    fn persist_index(&self, records: &[SnapshotRecord]) -> Result<()> {
        replace_single(&self.space, &format!("{}/meta/snapshots/index", self.scene_path), records.to_vec())
    }

    fn prune_impl(&self, records: &mut Vec<SnapshotRecord>, metrics: &mut SnapshotGcMetrics) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let current = self
            .space
            .read::<u64>(&format!("{}/current_revision", self.scene_path), Out::new())
            .unwrap_or(0);
        let now_ms = now_epoch_ms();

        records.sort_by(|a, b| b.revision.cmp(&a.revision));

        let min_duration_ms = self.policy.min_duration.as_millis() as i64;
        let mut retain: HashSet<u64> = HashSet::new();
        for (position, record) in records.iter().enumerate() {
            let age_ms = now_ms - record.created_at_ms;
            let keep = record.revision == current
                || (position as u32) < self.policy.min_revisions
                || age_ms <= min_duration_ms;
            if keep {
                retain.insert(record.revision);
            }
        }

        let mut filtered = Vec::with_capacity(records.len());
        let mut evicted = 0u64;
        for record in records.iter() {
            if retain.contains(&record.revision) {
                filtered.push(*record);
                continue;
            }
            self.evict_revision(record.revision);
            evicted += 1;
        }

        filtered.sort_by_key(|record| record.revision);
        metrics.evicted += evicted;
        metrics.retained = filtered.len() as u64;
        metrics.total_fingerprint_count = filtered.iter().map(|record| record.fingerprint_count).sum();
        *records = filtered;
        Ok(())
    }

    fn evict_revision(&self, revision: u64) {
        let base = make_revision_base(&self.scene_path, revision);
        trace!(scene = %self.scene_path, revision, "evicting scene snapshot");

        let layer_ids = self
            .space
            .take::<SnapshotSummary>(&format!("{base}/bucket/summary"), Out::new())
            .map(|summary| summary.layer_ids)
            .unwrap_or_default();

        let _ = self.space.take::<RevisionDesc>(&format!("{base}/desc"), Out::new());
        let _ = self.space.take::<SnapshotMetadata>(&format!("{base}/metadata"), Out::new());
        let _ = self.space.take::<Vec<u8>>(&format!("{base}/bucket/drawables.bin"), Out::new());
        let _ = self.space.take::<Vec<u8>>(&format!("{base}/bucket/fingerprints.bin"), Out::new());
        let _ = self.space.take::<Vec<u8>>(&format!("{base}/bucket/transforms.bin"), Out::new());
        let _ = self.space.take::<Vec<u8>>(&format!("{base}/bucket/bounds.bin"), Out::new());
        let _ = self.space.take::<Vec<u8>>(&format!("{base}/bucket/state.bin"), Out::new());
        let _ = self.space.take::<Vec<u8>>(&format!("{base}/bucket/cmd-buffer.bin"), Out::new());
        let _ = self.space.take::<Vec<u8>>(&format!("{base}/bucket/strokes.bin"), Out::new());
        let _ = self.space.take::<Vec<u8>>(&format!("{base}/bucket/clip-heads.bin"), Out::new());
        let _ = self.space.take::<Vec<u8>>(&format!("{base}/bucket/clip-nodes.bin"), Out::new());
        let _ = self.space.take::<Vec<u8>>(&format!("{base}/bucket/authoring-map.bin"), Out::new());
        let _ = self.space.take::<Vec<u8>>(&format!("{base}/bucket/font-assets.bin"), Out::new());
        let _ = self.space.take::<Vec<u8>>(&format!("{base}/bucket/glyph-vertices.bin"), Out::new());
        let _ = self.space.take::<String>(&format!("{base}/bucket/meta.json"), Out::new());
        let _ = self.space.take::<Vec<u32>>(&format!("{base}/bucket/indices/opaque.bin"), Out::new());
        let _ = self.space.take::<Vec<u32>>(&format!("{base}/bucket/indices/alpha.bin"), Out::new());
        for layer_id in layer_ids {
            let _ = self.space.take::<Vec<u32>>(&format!("{base}/bucket/indices/layer/{layer_id}.bin"), Out::new());
        }
    }

    fn record_metrics(&self, metrics: &SnapshotGcMetrics) -> Result<()> {
        replace_single(&self.space, &format!("{}/metrics/snapshots/state", self.scene_path), *metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transform;
    use std::time::Duration;

    fn one_drawable_bucket(z: f32) -> DrawableBucket {
        DrawableBucket {
            drawable_ids: vec![1],
            world_transforms: vec![Transform { elements: [0.0; 16] }],
            bounds_spheres: vec![crate::types::BoundingSphere { center: [0.0; 3], radius: 1.0 }],
            bounds_box_valid: vec![0],
            layers: vec![0],
            z_values: vec![z],
            material_ids: vec![0],
            pipeline_flags: vec![0],
            visibility: vec![1],
            command_offsets: vec![0],
            command_counts: vec![0],
            ..Default::default()
        }
    }

    #[test]
    fn publish_assigns_sequential_revisions() {
        let space = Arc::new(PathSpace::new());
        let builder = SceneSnapshotBuilder::new(space, "/scene", RetentionPolicy::default());
        let options = SnapshotPublishOptions::default();

        let first = builder.publish(&options, &one_drawable_bucket(1.0)).expect("publish 1");
        let second = builder.publish(&options, &one_drawable_bucket(2.0)).expect("publish 2");

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn publish_rejects_invalid_bucket() {
        let space = Arc::new(PathSpace::new());
        let builder = SceneSnapshotBuilder::new(space, "/scene", RetentionPolicy::default());
        let mut bucket = one_drawable_bucket(0.0);
        bucket.z_values.push(9.0);

        assert!(builder.publish(&SnapshotPublishOptions::default(), &bucket).is_err());
    }

    #[test]
    fn decode_bucket_reconstructs_published_revision() {
        let space = Arc::new(PathSpace::new());
        let builder = SceneSnapshotBuilder::new(space, "/scene", RetentionPolicy::default());
        let bucket = one_drawable_bucket(5.0);

        let revision = builder.publish(&SnapshotPublishOptions::default(), &bucket).expect("publish");
        let decoded = builder.decode_bucket(revision).expect("decode");

        assert_eq!(decoded.drawable_ids, bucket.drawable_ids);
        assert_eq!(decoded.z_values, bucket.z_values);
        assert_eq!(decoded.drawable_fingerprints.len(), 1);
    }

    #[test]
    fn prune_evicts_revisions_past_retention_window() {
        let space = Arc::new(PathSpace::new());
        let policy = RetentionPolicy { min_revisions: 1, min_duration: Duration::ZERO };
        let builder = SceneSnapshotBuilder::new(space, "/scene", policy);
        let options = SnapshotPublishOptions::default();

        let first = builder.publish(&options, &one_drawable_bucket(1.0)).expect("publish 1");
        let _second = builder.publish(&options, &one_drawable_bucket(2.0)).expect("publish 2");
        let third = builder.publish(&options, &one_drawable_bucket(3.0)).expect("publish 3");

        let records = builder.snapshot_records().expect("records");
        let revisions: Vec<u64> = records.iter().map(|record| record.revision).collect();

        assert!(!revisions.contains(&first));
        assert!(revisions.contains(&third));
        assert!(builder.decode_bucket(first).is_err());
    }

    #[test]
    fn min_revisions_retains_recent_history_even_when_not_current() {
        let space = Arc::new(PathSpace::new());
        let policy = RetentionPolicy { min_revisions: 2, min_duration: Duration::ZERO };
        let builder = SceneSnapshotBuilder::new(space, "/scene", policy);
        let options = SnapshotPublishOptions::default();

        let first = builder.publish(&options, &one_drawable_bucket(1.0)).expect("publish 1");
        let second = builder.publish(&options, &one_drawable_bucket(2.0)).expect("publish 2");
        let _third = builder.publish(&options, &one_drawable_bucket(3.0)).expect("publish 3");

        let records = builder.snapshot_records().expect("records");
        let revisions: Vec<u64> = records.iter().map(|record| record.revision).collect();

        assert!(!revisions.contains(&first));
        assert!(revisions.contains(&second));
    }

    #[test]
    fn explicit_revision_number_is_honored() {
        let space = Arc::new(PathSpace::new());
        let builder = SceneSnapshotBuilder::new(space, "/scene", RetentionPolicy::default());
        let options = SnapshotPublishOptions { revision: Some(42), ..Default::default() };

        let revision = builder.publish(&options, &one_drawable_bucket(1.0)).expect("publish");
        assert_eq!(revision, 42);
    }
}
