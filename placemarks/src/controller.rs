//! [`PlacemarkController`] keeps a single placemark in sync with its configuration and reports
//! user interactions with it.
//!
//! Configuration arrives as loosely-typed [`Params`]. Every field of an update is optional and
//! applied independently of the others. Fields which are malformed are skipped with a warning,
//! so that the rest of the update still takes effect.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use egui::ColorImage;

use crate::images::{ImageLoader, resolve_image};
use crate::map_objects::{
    MapObjectDragListener, MapObjectTapListener, MapObjects, PlacemarkMapObject,
};
use crate::position::Position;
use crate::style::{IconStyle, TextStyle};
use crate::value::{DecodeError, Fields, Params, Value};

/// Who controls the placemark's position, visibility and lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The controller created the placemark and fully owns it.
    Independent,
    /// The placemark belongs to someone else, e.g. a clusterized collection. The controller
    /// only drives its secondary visual properties.
    Attached,
}

/// Receiver of interaction events, keyed by the placemark's id.
pub trait MapObjectEvents {
    fn map_object_tap(&self, id: &str, point: Position);
    fn map_object_drag_start(&self, id: &str);
    fn map_object_drag(&self, id: &str, point: Position);
    fn map_object_drag_end(&self, id: &str);
}

/// Collaborators shared by the controllers of a map.
#[derive(Clone)]
pub struct Context {
    /// Held weakly, events are dropped once the receiver is gone.
    pub events: Weak<dyn MapObjectEvents>,
    pub images: Rc<dyn ImageLoader>,
}

impl Context {
    pub fn new(events: Weak<dyn MapObjectEvents>, images: Rc<dyn ImageLoader>) -> Self {
        Self { events, images }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("'point' is missing")]
    MissingPoint,
    #[error("'point' is invalid: {0}")]
    InvalidPoint(DecodeError),
    #[error("parent collection cannot hold placemarks")]
    UnsupportedParent,
    #[error("'id' is missing")]
    MissingId,
    #[error("'id' is invalid: {0}")]
    InvalidId(DecodeError),
    #[error("parent collection refused to create a placemark")]
    AllocationFailed,
    #[error("placemark '{0}' already exists")]
    DuplicateId(String),
}

fn decode_id(fields: &Fields<'_>) -> Result<String, Error> {
    match fields.require::<&str>("id") {
        Ok(id) => Ok(id.to_owned()),
        Err(DecodeError::MissingField(_)) => Err(Error::MissingId),
        Err(e) => Err(Error::InvalidId(e)),
    }
}

/// Controls a single placemark.
pub struct PlacemarkController {
    id: String,
    ownership: Ownership,
    placemark: PlacemarkMapObject,
    consume_tap_events: Cell<bool>,
    context: Context,
}

impl PlacemarkController {
    /// Create a placemark in `parent` and a controller owning it, then apply `params` to it.
    ///
    /// `params` must contain `id` and `point`. Everything is validated before the placemark is
    /// created, so a failure leaves `parent` untouched.
    ///
    /// # Errors
    ///
    /// If `point` or `id` is missing or malformed, if `parent` cannot hold placemarks, or if it
    /// refuses to create one.
    pub fn new(
        parent: &dyn MapObjects,
        params: &Params,
        context: Context,
    ) -> Result<Rc<Self>, Error> {
        let fields = Fields::new(params, "placemark");

        match fields.require::<Position>("point") {
            Ok(_) => {}
            Err(DecodeError::MissingField("point")) => return Err(Error::MissingPoint),
            Err(e) => return Err(Error::InvalidPoint(e)),
        }

        let factory = parent.placemark_factory().ok_or(Error::UnsupportedParent)?;
        let id = decode_id(&fields)?;
        let placemark = factory.add_placemark().ok_or(Error::AllocationFailed)?;

        log::debug!("Created placemark '{id}'.");
        Ok(Self::bind(
            id,
            Ownership::Independent,
            placemark,
            params,
            context,
        ))
    }

    /// Take control over a placemark owned by someone else, then apply `params` to it.
    ///
    /// # Panics
    ///
    /// If `params` has no valid `id`. Attached placemarks come from trusted callers only, so
    /// this is a bug on their side.
    pub fn attach(placemark: PlacemarkMapObject, params: &Params, context: Context) -> Rc<Self> {
        let id = match decode_id(&Fields::new(params, "placemark")) {
            Ok(id) => id,
            Err(e) => panic!("attached placemark needs an id: {e}"),
        };

        log::debug!("Attached to placemark '{id}'.");
        Self::bind(id, Ownership::Attached, placemark, params, context)
    }

    fn bind(
        id: String,
        ownership: Ownership,
        placemark: PlacemarkMapObject,
        params: &Params,
        context: Context,
    ) -> Rc<Self> {
        placemark.set_user_data(&id);

        let controller = Rc::new(Self {
            id,
            ownership,
            placemark,
            consume_tap_events: Cell::new(false),
            context,
        });

        let listener = Rc::downgrade(&controller);
        controller.placemark.add_tap_listener(Weak::<Self>::clone(&listener));
        controller.placemark.set_drag_listener(listener);

        controller.update(params);
        controller
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn placemark(&self) -> &PlacemarkMapObject {
        &self.placemark
    }

    pub fn consumes_tap_events(&self) -> bool {
        self.consume_tap_events.get()
    }

    /// Merge `params` into the placemark. Absent fields are left as they are.
    pub fn update(&self, params: &Params) {
        let fields = Fields::new(params, "placemark");

        match self.ownership {
            Ownership::Independent => {
                if let Some(point) = fields.get("point") {
                    self.placemark.set_geometry(point);
                }

                if let Some(visible) = fields.get("isVisible") {
                    self.placemark.set_visible(visible);
                }
            }
            Ownership::Attached => {
                if fields.contains("point") || fields.contains("isVisible") {
                    log::debug!(
                        "Placemark '{}' is attached, its position and visibility are not ours.",
                        self.id
                    );
                }
            }
        }

        if let Some(z_index) = fields.get("zIndex") {
            self.placemark.set_z_index(z_index);
        }

        if let Some(draggable) = fields.get("isDraggable") {
            self.placemark.set_draggable(draggable);
        }

        if let Some(opacity) = fields.get("opacity") {
            self.placemark.set_opacity(opacity);
        }

        if let Some(direction) = fields.get("direction") {
            self.placemark.set_direction(direction);
        }

        if let Some(text) = fields.nested("text", "text") {
            self.set_text(text);
        }

        if let Some(icon) = fields.nested("icon", "icon") {
            self.set_icon(icon);
        }

        if let Some(consume_tap_events) = fields.get("consumeTapEvents") {
            self.consume_tap_events.set(consume_tap_events);
        }
    }

    /// Remove the placemark from the map. Attached placemarks are left alone, as their
    /// removal is up to their owner.
    pub fn remove(&self) {
        match self.ownership {
            Ownership::Independent => {
                if self.placemark.remove_from_parent() {
                    log::debug!("Removed placemark '{}'.", self.id);
                } else {
                    log::debug!("Placemark '{}' was already gone.", self.id);
                }
            }
            Ownership::Attached => {
                log::debug!("Not removing attached placemark '{}'.", self.id);
            }
        }
    }

    fn set_text(&self, text: Fields<'_>) {
        // Text and its style go together, there is no such thing as partial text styling.
        let (Some(string), Some(style)) =
            (text.get::<&str>("text"), text.nested("style", "text.style"))
        else {
            log::warn!(
                "Ignoring text of placemark '{}', both 'text' and 'style' are required.",
                self.id
            );
            return;
        };

        self.placemark.set_text(string, TextStyle::from_fields(style));
    }

    fn set_icon(&self, icon: Fields<'_>) {
        match icon.get::<&str>("type") {
            Some("single") => self.set_single_icon(icon),
            Some("composite") => self.set_composite_icon(icon),
            Some(other) => log::warn!(
                "Ignoring icon of placemark '{}', unknown type '{}'.",
                self.id,
                other
            ),
            None => log::warn!("Ignoring icon of placemark '{}', type is missing.", self.id),
        }
    }

    /// Image and style of an icon (or one of its parts), out of the `style` fields.
    fn icon_layer(&self, style: Fields<'_>) -> Option<(ColorImage, IconStyle)> {
        let image = style.nested("image", "icon.style.image")?;
        Some((
            resolve_image(image, self.context.images.as_ref()),
            IconStyle::from_fields(style),
        ))
    }

    fn set_single_icon(&self, icon: Fields<'_>) {
        let Some((image, style)) = icon
            .nested("style", "icon.style")
            .and_then(|style| self.icon_layer(style))
        else {
            log::warn!(
                "Ignoring icon of placemark '{}', 'style' with 'image' is required.",
                self.id
            );
            return;
        };

        self.placemark.set_icon(image, style);
    }

    fn set_composite_icon(&self, icon: Fields<'_>) {
        let Some(parts) = icon.get::<&[Value]>("iconParts") else {
            log::warn!(
                "Ignoring composite icon of placemark '{}', 'iconParts' are required.",
                self.id
            );
            return;
        };

        let composite = self.placemark.use_composite_icon();

        for (index, part) in parts.iter().enumerate() {
            let Value::Map(part) = part else {
                log::warn!(
                    "Skipping icon part #{} of placemark '{}', expected a map, got {}.",
                    index,
                    self.id,
                    part.kind()
                );
                continue;
            };

            let part = Fields::new(part, "icon.iconParts");
            let Some(name) = part.get::<&str>("name") else {
                log::warn!(
                    "Skipping icon part #{} of placemark '{}', 'name' is required.",
                    index,
                    self.id
                );
                continue;
            };

            let Some((image, style)) = part
                .nested("style", "icon.iconParts.style")
                .and_then(|style| self.icon_layer(style))
            else {
                log::warn!(
                    "Skipping icon part '{}' of placemark '{}', 'style' with 'image' is required.",
                    name,
                    self.id
                );
                continue;
            };

            composite.set_icon(name, image, style);
        }
    }

    fn events(&self) -> Option<Rc<dyn MapObjectEvents>> {
        self.context.events.upgrade()
    }
}

impl MapObjectTapListener for PlacemarkController {
    fn on_map_object_tap(&self, _map_object: &PlacemarkMapObject, point: Position) -> bool {
        if let Some(events) = self.events() {
            events.map_object_tap(&self.id, point);
        }
        self.consume_tap_events.get()
    }
}

impl MapObjectDragListener for PlacemarkController {
    fn on_map_object_drag_start(&self, _map_object: &PlacemarkMapObject) {
        if let Some(events) = self.events() {
            events.map_object_drag_start(&self.id);
        }
    }

    fn on_map_object_drag(&self, _map_object: &PlacemarkMapObject, point: Position) {
        if let Some(events) = self.events() {
            events.map_object_drag(&self.id, point);
        }
    }

    fn on_map_object_drag_end(&self, _map_object: &PlacemarkMapObject) {
        if let Some(events) = self.events() {
            events.map_object_drag_end(&self.id);
        }
    }
}
