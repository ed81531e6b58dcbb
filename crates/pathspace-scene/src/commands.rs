// SPDX-License-Identifier: Apache-2.0
//! Draw command kinds and their fixed-size payloads.
//!
//! The command buffer stores a flat `command_kinds` array alongside a byte blob
//! `command_payload`. Each kind has a fixed payload size; a drawable's commands are a
//! contiguous `[offset, offset + count)` slice into `command_kinds`, and each command's
//! payload sits back-to-back in `command_payload` in the same order.

/// Discriminant for an entry in a command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DrawCommandKind {
    /// Axis-aligned filled rectangle.
    Rect = 0,
    /// Filled circle.
    Circle = 1,
    /// Straight line segment.
    Line = 2,
    /// Polyline stroke referencing a range of `stroke_points`.
    Stroke = 3,
    /// Shaped glyph run referencing a range of `glyph_vertices`.
    TextGlyphs = 4,
}

impl DrawCommandKind {
    /// Recovers a kind from its wire discriminant, if known.
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Rect),
            1 => Some(Self::Circle),
            2 => Some(Self::Line),
            3 => Some(Self::Stroke),
            4 => Some(Self::TextGlyphs),
            _ => None,
        }
    }
}

/// Fixed payload size in bytes for a command kind. Unknown discriminants are treated
/// as a zero-size payload so layout computation can still make progress.
#[must_use]
pub fn payload_size_bytes(kind_value: u32) -> usize {
    match DrawCommandKind::from_u32(kind_value) {
        Some(DrawCommandKind::Rect) => RectCommand::SIZE,
        Some(DrawCommandKind::Circle) => CircleCommand::SIZE,
        Some(DrawCommandKind::Line) => LineCommand::SIZE,
        Some(DrawCommandKind::Stroke) => StrokeCommand::SIZE,
        Some(DrawCommandKind::TextGlyphs) => TextGlyphsCommand::SIZE,
        None => 0,
    }
}

/// Filled rectangle payload: top-left corner and extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectCommand {
    /// X coordinate of the top-left corner.
    pub x: f32,
    /// Y coordinate of the top-left corner.
    pub y: f32,
    /// Width.
    pub w: f32,
    /// Height.
    pub h: f32,
}

impl RectCommand {
    const SIZE: usize = 16;
}

/// Filled circle payload: center and radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleCommand {
    /// X coordinate of the center.
    pub x: f32,
    /// Y coordinate of the center.
    pub y: f32,
    /// Radius.
    pub radius: f32,
}

impl CircleCommand {
    const SIZE: usize = 12;
}

/// Straight line segment payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineCommand {
    /// Start X.
    pub x0: f32,
    /// Start Y.
    pub y0: f32,
    /// End X.
    pub x1: f32,
    /// End Y.
    pub y1: f32,
}

impl LineCommand {
    const SIZE: usize = 16;
}

/// Polyline stroke payload: thickness plus a `[point_offset, point_offset + point_count)`
/// range into the bucket's `stroke_points` array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeCommand {
    /// Stroke thickness. Must be non-negative.
    pub thickness: f32,
    /// First index into `stroke_points`.
    pub point_offset: u32,
    /// Number of points referenced, starting at `point_offset`.
    pub point_count: u32,
}

impl StrokeCommand {
    const SIZE: usize = 12;

    /// Parses a stroke payload from its little-endian byte representation.
    ///
    /// Returns `None` if `bytes` is shorter than [`StrokeCommand::SIZE`].
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            thickness: f32::from_le_bytes(bytes[0..4].try_into().ok()?),
            point_offset: u32::from_le_bytes(bytes[4..8].try_into().ok()?),
            point_count: u32::from_le_bytes(bytes[8..12].try_into().ok()?),
        })
    }

    /// Encodes this payload to its little-endian byte representation.
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.thickness.to_le_bytes());
        out[4..8].copy_from_slice(&self.point_offset.to_le_bytes());
        out[8..12].copy_from_slice(&self.point_count.to_le_bytes());
        out
    }
}

/// Shaped text payload: an atlas reference plus a `[glyph_offset, glyph_offset +
/// glyph_count)` range into the bucket's `glyph_vertices` array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextGlyphsCommand {
    /// Fingerprint of the glyph atlas this run was shaped against.
    pub atlas_fingerprint: u64,
    /// Renderer-defined flags (e.g. subpixel hinting mode).
    pub flags: u32,
    /// First index into `glyph_vertices`.
    pub glyph_offset: u32,
    /// Number of glyphs referenced, starting at `glyph_offset`.
    pub glyph_count: u32,
}

impl TextGlyphsCommand {
    const SIZE: usize = 20;

    /// Parses a text-glyphs payload from its little-endian byte representation.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            atlas_fingerprint: u64::from_le_bytes(bytes[0..8].try_into().ok()?),
            flags: u32::from_le_bytes(bytes[8..12].try_into().ok()?),
            glyph_offset: u32::from_le_bytes(bytes[12..16].try_into().ok()?),
            glyph_count: u32::from_le_bytes(bytes[16..20].try_into().ok()?),
        })
    }

    /// Encodes this payload to its little-endian byte representation.
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.atlas_fingerprint.to_le_bytes());
        out[8..12].copy_from_slice(&self.flags.to_le_bytes());
        out[12..16].copy_from_slice(&self.glyph_offset.to_le_bytes());
        out[16..20].copy_from_slice(&self.glyph_count.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_roundtrips_through_u32() {
        for kind in [
            DrawCommandKind::Rect,
            DrawCommandKind::Circle,
            DrawCommandKind::Line,
            DrawCommandKind::Stroke,
            DrawCommandKind::TextGlyphs,
        ] {
            assert_eq!(DrawCommandKind::from_u32(kind as u32), Some(kind));
        }
        assert_eq!(DrawCommandKind::from_u32(99), None);
    }

    #[test]
    fn payload_sizes_match_wire_layout() {
        assert_eq!(payload_size_bytes(DrawCommandKind::Rect as u32), 16);
        assert_eq!(payload_size_bytes(DrawCommandKind::Stroke as u32), 12);
        assert_eq!(payload_size_bytes(DrawCommandKind::TextGlyphs as u32), 20);
        assert_eq!(payload_size_bytes(12345), 0);
    }

    #[test]
    fn stroke_command_roundtrips() {
        let cmd = StrokeCommand { thickness: 2.5, point_offset: 3, point_count: 7 };
        let bytes = cmd.to_bytes();
        assert_eq!(StrokeCommand::from_bytes(&bytes), Some(cmd));
        assert_eq!(StrokeCommand::from_bytes(&bytes[..4]), None);
    }

    #[test]
    fn text_glyphs_command_roundtrips() {
        let cmd = TextGlyphsCommand {
            atlas_fingerprint: 0xdead_beef_0000_0001,
            flags: 7,
            glyph_offset: 2,
            glyph_count: 4,
        };
        let bytes = cmd.to_bytes();
        assert_eq!(TextGlyphsCommand::from_bytes(&bytes), Some(cmd));
    }
}
