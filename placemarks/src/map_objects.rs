//! In-memory model of the map's objects: placemarks and the collections holding them.
//!
//! Handles are shared. Cloning a [`PlacemarkMapObject`] yields another handle to the same
//! placemark, the way map SDKs hand out references to objects which they own. Everything here
//! is single-threaded.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use egui::ColorImage;

use crate::position::Position;
use crate::style::{IconStyle, TextStyle};

/// Image together with the style it is drawn with.
#[derive(Debug, Clone, PartialEq)]
pub struct IconLayer {
    pub image: ColorImage,
    pub style: IconStyle,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Icon {
    #[default]
    None,
    Single(IconLayer),
    /// Named parts, drawn together.
    Composite(BTreeMap<String, IconLayer>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacemarkText {
    pub text: String,
    pub style: TextStyle,
}

/// Snapshot of everything a placemark displays.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacemarkState {
    pub geometry: Position,
    pub visible: bool,
    pub z_index: f32,
    pub draggable: bool,
    pub opacity: f32,
    pub direction: f32,
    pub text: Option<PlacemarkText>,
    pub icon: Icon,
    /// Arbitrary tag, used to find the owner of the placemark in callbacks.
    pub user_data: Option<String>,
}

impl Default for PlacemarkState {
    fn default() -> Self {
        Self {
            geometry: Position::new(0., 0.),
            visible: true,
            z_index: 0.,
            draggable: false,
            opacity: 1.,
            direction: 0.,
            text: None,
            icon: Icon::None,
            user_data: None,
        }
    }
}

pub trait MapObjectTapListener {
    /// Return `true` to consume the tap, so that it does not propagate to objects below.
    fn on_map_object_tap(&self, map_object: &PlacemarkMapObject, point: Position) -> bool;
}

pub trait MapObjectDragListener {
    fn on_map_object_drag_start(&self, map_object: &PlacemarkMapObject);
    fn on_map_object_drag(&self, map_object: &PlacemarkMapObject, point: Position);
    fn on_map_object_drag_end(&self, map_object: &PlacemarkMapObject);
}

struct Placemark {
    state: PlacemarkState,
    parent: Weak<RefCell<Store>>,
    valid: bool,
    tap_listeners: Vec<Weak<dyn MapObjectTapListener>>,
    drag_listener: Option<Weak<dyn MapObjectDragListener>>,
}

/// Handle to a placemark living in one of the map's collections.
#[derive(Clone)]
pub struct PlacemarkMapObject {
    inner: Rc<RefCell<Placemark>>,
}

impl PartialEq for PlacemarkMapObject {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for PlacemarkMapObject {}

impl fmt::Debug for PlacemarkMapObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let placemark = self.inner.borrow();
        f.debug_struct("PlacemarkMapObject")
            .field("state", &placemark.state)
            .field("valid", &placemark.valid)
            .finish_non_exhaustive()
    }
}

impl PlacemarkMapObject {
    fn new(parent: Weak<RefCell<Store>>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Placemark {
                state: PlacemarkState::default(),
                parent,
                valid: true,
                tap_listeners: Vec::new(),
                drag_listener: None,
            })),
        }
    }

    pub fn state(&self) -> PlacemarkState {
        self.inner.borrow().state.clone()
    }

    fn modify(&self, f: impl FnOnce(&mut PlacemarkState)) {
        f(&mut self.inner.borrow_mut().state);
    }

    pub fn set_geometry(&self, geometry: Position) {
        self.modify(|state| state.geometry = geometry);
    }

    pub fn set_visible(&self, visible: bool) {
        self.modify(|state| state.visible = visible);
    }

    pub fn set_z_index(&self, z_index: f32) {
        self.modify(|state| state.z_index = z_index);
    }

    pub fn set_draggable(&self, draggable: bool) {
        self.modify(|state| state.draggable = draggable);
    }

    pub fn set_opacity(&self, opacity: f32) {
        self.modify(|state| state.opacity = opacity);
    }

    pub fn set_direction(&self, direction: f32) {
        self.modify(|state| state.direction = direction);
    }

    pub fn set_text(&self, text: &str, style: TextStyle) {
        self.modify(|state| {
            state.text = Some(PlacemarkText {
                text: text.to_owned(),
                style,
            });
        });
    }

    /// Replace the icon with a single image.
    pub fn set_icon(&self, image: ColorImage, style: IconStyle) {
        self.modify(|state| state.icon = Icon::Single(IconLayer { image, style }));
    }

    /// Switch to a composite icon. Parts of an icon which is already composite are kept.
    pub fn use_composite_icon(&self) -> CompositeIcon {
        self.modify(|state| {
            if !matches!(state.icon, Icon::Composite(_)) {
                state.icon = Icon::Composite(BTreeMap::new());
            }
        });
        CompositeIcon {
            placemark: self.clone(),
        }
    }

    pub fn set_user_data(&self, user_data: &str) {
        self.modify(|state| state.user_data = Some(user_data.to_owned()));
    }

    pub fn user_data(&self) -> Option<String> {
        self.inner.borrow().state.user_data.clone()
    }

    /// Whether the placemark is still on the map.
    pub fn is_valid(&self) -> bool {
        self.inner.borrow().valid
    }

    /// Listeners are held weakly, a dropped listener is silently skipped and forgotten the
    /// next time a listener is added.
    pub fn add_tap_listener(&self, listener: Weak<dyn MapObjectTapListener>) {
        let mut placemark = self.inner.borrow_mut();
        placemark
            .tap_listeners
            .retain(|listener| listener.strong_count() > 0);
        placemark.tap_listeners.push(listener);
    }

    pub fn set_drag_listener(&self, listener: Weak<dyn MapObjectDragListener>) {
        self.inner.borrow_mut().drag_listener = Some(listener);
    }

    /// Remove the placemark from the collection it was created in. Returns `false` if it was
    /// already gone.
    pub fn remove_from_parent(&self) -> bool {
        let parent = {
            let mut placemark = self.inner.borrow_mut();
            placemark.valid = false;
            placemark.parent.upgrade()
        };

        parent.is_some_and(|store| store.borrow_mut().remove(self))
    }

    /// Deliver a tap at `point` to the listeners. Returns whether any of them consumed it.
    pub fn tap(&self, point: Position) -> bool {
        let listeners: Vec<_> = {
            let placemark = self.inner.borrow();
            if !placemark.valid || !placemark.state.visible {
                return false;
            }
            placemark
                .tap_listeners
                .iter()
                .filter_map(Weak::upgrade)
                .collect()
        };

        // Every listener gets the tap, regardless of the others.
        listeners
            .iter()
            .fold(false, |consumed, listener| {
                listener.on_map_object_tap(self, point) || consumed
            })
    }

    fn drag_listener(&self) -> Option<Rc<dyn MapObjectDragListener>> {
        let placemark = self.inner.borrow();
        if placemark.valid && placemark.state.draggable {
            placemark.drag_listener.as_ref().and_then(Weak::upgrade)
        } else {
            None
        }
    }

    /// Start dragging. Returns `false` if the placemark is not draggable.
    pub fn drag_start(&self) -> bool {
        if !self.is_valid() || !self.state().draggable {
            return false;
        }

        if let Some(listener) = self.drag_listener() {
            listener.on_map_object_drag_start(self);
        }
        true
    }

    /// Move the placemark to `point` and notify the listener.
    pub fn drag(&self, point: Position) {
        if !self.is_valid() || !self.state().draggable {
            return;
        }

        self.set_geometry(point);
        if let Some(listener) = self.drag_listener() {
            listener.on_map_object_drag(self, point);
        }
    }

    pub fn drag_end(&self) {
        if let Some(listener) = self.drag_listener() {
            listener.on_map_object_drag_end(self);
        }
    }
}

/// Composite icon of a placemark, obtained with [`PlacemarkMapObject::use_composite_icon`].
pub struct CompositeIcon {
    placemark: PlacemarkMapObject,
}

impl CompositeIcon {
    /// Set the part called `name`, replacing it if it already exists.
    pub fn set_icon(&self, name: &str, image: ColorImage, style: IconStyle) {
        self.placemark.modify(|state| {
            if let Icon::Composite(parts) = &mut state.icon {
                parts.insert(name.to_owned(), IconLayer { image, style });
            } else {
                // A single icon was set in the meantime, start over.
                state.icon = Icon::Composite(BTreeMap::from([(
                    name.to_owned(),
                    IconLayer { image, style },
                )]));
            }
        });
    }
}

/// Placemarks of a single collection.
struct Store {
    placemarks: Vec<PlacemarkMapObject>,
    valid: bool,
}

impl Store {
    fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            placemarks: Vec::new(),
            valid: true,
        }))
    }

    fn add_placemark(store: &Rc<RefCell<Self>>) -> Option<PlacemarkMapObject> {
        if !store.borrow().valid {
            log::debug!("Refusing to add a placemark to a detached collection.");
            return None;
        }

        let placemark = PlacemarkMapObject::new(Rc::downgrade(store));
        store.borrow_mut().placemarks.push(placemark.clone());
        Some(placemark)
    }

    fn remove(&mut self, placemark: &PlacemarkMapObject) -> bool {
        let before = self.placemarks.len();
        self.placemarks.retain(|p| p != placemark);
        self.placemarks.len() < before
    }

    fn detach(&mut self) {
        self.valid = false;
        for placemark in self.placemarks.drain(..) {
            placemark.inner.borrow_mut().valid = false;
        }
    }
}

/// Creates placemarks. Implemented by the collections which can hold them.
pub trait PlacemarkFactory {
    /// `None` if the collection cannot take new objects anymore.
    fn add_placemark(&self) -> Option<PlacemarkMapObject>;
}

/// Any collection of map objects.
pub trait MapObjects {
    /// Capability of creating placemarks, `None` for collections which cannot hold them.
    fn placemark_factory(&self) -> Option<&dyn PlacemarkFactory> {
        None
    }
}

/// Plain collection of map objects.
#[derive(Clone)]
pub struct MapObjectCollection {
    store: Rc<RefCell<Store>>,
}

impl Default for MapObjectCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl MapObjectCollection {
    pub fn new() -> Self {
        Self {
            store: Store::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.store.borrow().placemarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn placemarks(&self) -> Vec<PlacemarkMapObject> {
        self.store.borrow().placemarks.clone()
    }

    pub fn contains(&self, placemark: &PlacemarkMapObject) -> bool {
        self.store.borrow().placemarks.contains(placemark)
    }

    /// Take the collection off the map. Its placemarks become invalid and no new ones can be
    /// added.
    pub fn detach_from_map(&self) {
        self.store.borrow_mut().detach();
    }
}

impl PlacemarkFactory for MapObjectCollection {
    fn add_placemark(&self) -> Option<PlacemarkMapObject> {
        Store::add_placemark(&self.store)
    }
}

impl MapObjects for MapObjectCollection {
    fn placemark_factory(&self) -> Option<&dyn PlacemarkFactory> {
        Some(self)
    }
}

/// Collection which groups nearby placemarks into clusters when displayed.
#[derive(Clone)]
pub struct ClusterizedPlacemarkCollection {
    store: Rc<RefCell<Store>>,
}

impl Default for ClusterizedPlacemarkCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterizedPlacemarkCollection {
    pub fn new() -> Self {
        Self {
            store: Store::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.store.borrow().placemarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn placemarks(&self) -> Vec<PlacemarkMapObject> {
        self.store.borrow().placemarks.clone()
    }

    pub fn contains(&self, placemark: &PlacemarkMapObject) -> bool {
        self.store.borrow().placemarks.contains(placemark)
    }

    pub fn detach_from_map(&self) {
        self.store.borrow_mut().detach();
    }
}

impl PlacemarkFactory for ClusterizedPlacemarkCollection {
    fn add_placemark(&self) -> Option<PlacemarkMapObject> {
        Store::add_placemark(&self.store)
    }
}

impl MapObjects for ClusterizedPlacemarkCollection {
    fn placemark_factory(&self) -> Option<&dyn PlacemarkFactory> {
        Some(self)
    }
}
