//! Visual styles of placemark texts and icons, and their translation from configuration
//! fields. Every style is built from scratch, starting from its defaults, so fields which
//! are absent or malformed simply keep the default value.

use egui::{Color32, Pos2, Rect, pos2};

use crate::value::{DecodeError, Fields, FromValue, Params, Value};

/// Where the text is placed relative to the placemark's icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextPlacement {
    #[default]
    Center,
    Left,
    Right,
    Top,
    Bottom,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl TextPlacement {
    const ALL: [Self; 9] = [
        Self::Center,
        Self::Left,
        Self::Right,
        Self::Top,
        Self::Bottom,
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
    ];
}

impl TryFrom<u32> for TextPlacement {
    type Error = DecodeError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        usize::try_from(raw)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or(DecodeError::UnknownVariant {
                kind: "text placement",
                value: raw,
            })
    }
}

/// Whether the icon follows the placemark's direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationType {
    NoRotation,
    Rotate,
}

impl TryFrom<u32> for RotationType {
    type Error = DecodeError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::NoRotation),
            1 => Ok(Self::Rotate),
            value => Err(DecodeError::UnknownVariant {
                kind: "rotation type",
                value,
            }),
        }
    }
}

/// How the icon's anchor is interpreted: relative to the icon size, or in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorType {
    Normalized,
    Absolute,
}

impl TryFrom<u32> for AnchorType {
    type Error = DecodeError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Normalized),
            1 => Ok(Self::Absolute),
            value => Err(DecodeError::UnknownVariant {
                kind: "anchor type",
                value,
            }),
        }
    }
}

/// Decode an enum transmitted as its raw integer value.
fn raw_enum<T>(value: &Value) -> Result<T, DecodeError>
where
    T: TryFrom<u32, Error = DecodeError>,
{
    T::try_from(u32::from_value(value)?)
}

/// Convert a packed `0xAARRGGBB` integer into a color.
pub fn color_from_argb(argb: u32) -> Color32 {
    let [a, r, g, b] = argb.to_be_bytes();
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

fn argb_color(value: &Value) -> Result<Color32, DecodeError> {
    // Only the lower 32 bits carry the color.
    i64::from_value(value).map(|raw| color_from_argb(raw as u32))
}

/// Points travel as `{"x": .., "y": ..}` maps.
impl FromValue<'_> for Pos2 {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let fields = Fields::new(<&Params>::from_value(value)?, "point");
        Ok(pos2(fields.require("x")?, fields.require("y")?))
    }
}

/// Rectangles travel as `{"min": {..}, "max": {..}}` maps.
impl FromValue<'_> for Rect {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let fields = Fields::new(<&Params>::from_value(value)?, "rect");
        Ok(Self::from_min_max(
            fields.require("min")?,
            fields.require("max")?,
        ))
    }
}

/// Style of the placemark's text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub color: Color32,
    pub outline_color: Color32,
    pub placement: TextPlacement,
    /// Offset from the placement point, in pixels.
    pub offset: f32,
    /// Whether `offset` is measured from the icon's edge instead of its center.
    pub offset_from_icon: bool,
    /// Text may be hidden when it collides with other objects while the icon stays visible.
    pub text_optional: bool,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 8.,
            color: Color32::BLACK,
            outline_color: Color32::WHITE,
            placement: TextPlacement::default(),
            offset: 0.,
            offset_from_icon: true,
            text_optional: false,
        }
    }
}

impl TextStyle {
    pub fn from_fields(fields: Fields<'_>) -> Self {
        let mut style = Self::default();

        if let Some(color) = fields.decode("color", argb_color) {
            style.color = color;
        }

        if let Some(outline_color) = fields.decode("outlineColor", argb_color) {
            style.outline_color = outline_color;
        }

        if let Some(size) = fields.get("size") {
            style.size = size;
        }

        if let Some(offset) = fields.get("offset") {
            style.offset = offset;
        }

        if let Some(offset_from_icon) = fields.get("offsetFromIcon") {
            style.offset_from_icon = offset_from_icon;
        }

        if let Some(text_optional) = fields.get("textOptional") {
            style.text_optional = text_optional;
        }

        if let Some(placement) = fields.decode("placement", raw_enum) {
            style.placement = placement;
        }

        style
    }
}

/// Style of an icon or of a single part of a composite icon. Fields left as `None` fall back to
/// the map's own defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IconStyle {
    pub anchor: Option<Pos2>,
    pub anchor_type: Option<AnchorType>,
    pub rotation_type: Option<RotationType>,
    pub z_index: Option<f32>,
    pub flat: Option<bool>,
    pub visible: Option<bool>,
    pub scale: Option<f32>,
    /// Area reacting to taps, relative to the anchor.
    pub tappable_area: Option<Rect>,
    pub direction: Option<f32>,
}

impl IconStyle {
    pub fn from_fields(fields: Fields<'_>) -> Self {
        Self {
            anchor: fields.get("anchor"),
            anchor_type: fields.decode("anchorType", raw_enum),
            rotation_type: fields.decode("rotationType", raw_enum),
            z_index: fields.get("zIndex"),
            flat: fields.get("flat"),
            visible: fields.get("visible"),
            scale: fields.get("scale"),
            tappable_area: fields.get("tappableArea"),
            direction: fields.get("direction"),
        }
    }
}
