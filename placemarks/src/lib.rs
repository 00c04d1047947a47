//! Placemarks driven by loosely-typed configuration.
//!
//! A [`PlacemarkController`] owns (or is attached to) a single placemark of a map, merges
//! partial configuration updates into it, and forwards taps and drags to a
//! [`MapObjectEvents`] receiver. [`PlacemarkRegistry`] keeps the controllers of a collection
//! and routes batches of changes to them.
//!
//! ```
//! use std::rc::Rc;
//! use placemarks::{
//!     AssetBundle, Context, MapObjectCollection, MapObjectEvents, PlacemarkController, Position,
//!     params_from_json,
//! };
//!
//! struct Events;
//!
//! impl MapObjectEvents for Events {
//!     fn map_object_tap(&self, id: &str, _point: Position) {
//!         println!("{id} tapped");
//!     }
//!     fn map_object_drag_start(&self, _id: &str) {}
//!     fn map_object_drag(&self, _id: &str, _point: Position) {}
//!     fn map_object_drag_end(&self, _id: &str) {}
//! }
//!
//! let events: Rc<dyn MapObjectEvents> = Rc::new(Events);
//! let context = Context::new(Rc::downgrade(&events), Rc::new(AssetBundle::default()));
//! let collection = MapObjectCollection::new();
//!
//! let params = params_from_json(serde_json::json!({
//!     "id": "zoo",
//!     "point": {"latitude": 51.104, "longitude": 17.075},
//!     "opacity": 0.8,
//! }))
//! .unwrap();
//!
//! let controller = PlacemarkController::new(&collection, &params, context).unwrap();
//! assert_eq!(collection.len(), 1);
//!
//! controller.remove();
//! assert!(collection.is_empty());
//! ```
#![deny(clippy::unwrap_used, rustdoc::broken_intra_doc_links)]

mod controller;
mod images;
mod map_objects;
mod position;
mod registry;
mod style;
mod value;

pub use controller::{Context, Error, MapObjectEvents, Ownership, PlacemarkController};
pub use images::{AssetBundle, AssetOptions, ImageLoader, decode_image, resolve_image};
pub use map_objects::{
    ClusterizedPlacemarkCollection, CompositeIcon, Icon, IconLayer, MapObjectCollection,
    MapObjectDragListener, MapObjectTapListener, MapObjects, PlacemarkFactory,
    PlacemarkMapObject, PlacemarkState, PlacemarkText,
};
pub use position::{Position, lat_lon, lon_lat};
pub use registry::PlacemarkRegistry;
pub use style::{AnchorType, IconStyle, RotationType, TextPlacement, TextStyle, color_from_argb};
pub use value::{DecodeError, Fields, FromValue, Params, Value, params_from_json};
