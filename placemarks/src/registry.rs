//! Controllers of a single collection, keyed by placemark id.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::controller::{Context, Error, PlacemarkController};
use crate::map_objects::{MapObjects, PlacemarkMapObject};
use crate::value::{Fields, Params, Value};

/// Owns a collection together with the controllers of its placemarks, and routes
/// configuration changes to them by id.
pub struct PlacemarkRegistry<P> {
    parent: P,
    context: Context,
    controllers: BTreeMap<String, Rc<PlacemarkController>>,
}

impl<P: MapObjects> PlacemarkRegistry<P> {
    pub fn new(parent: P, context: Context) -> Self {
        Self {
            parent,
            context,
            controllers: BTreeMap::new(),
        }
    }

    pub fn parent(&self) -> &P {
        &self.parent
    }

    fn ensure_unique(&self, params: &Params) -> Result<(), Error> {
        match params.get("id") {
            Some(Value::String(id)) if self.controllers.contains_key(id) => {
                Err(Error::DuplicateId(id.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Create a new placemark in the collection.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateId`] if a placemark with the same id exists already, otherwise the same
    /// as [`PlacemarkController::new`].
    pub fn add(&mut self, params: &Params) -> Result<Rc<PlacemarkController>, Error> {
        self.ensure_unique(params)?;
        let controller = PlacemarkController::new(&self.parent, params, self.context.clone())?;
        self.controllers
            .insert(controller.id().to_owned(), Rc::clone(&controller));
        Ok(controller)
    }

    /// Take control over a placemark owned by someone else.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateId`] if a placemark with the same id exists already.
    ///
    /// # Panics
    ///
    /// Same as [`PlacemarkController::attach`].
    pub fn attach(
        &mut self,
        placemark: PlacemarkMapObject,
        params: &Params,
    ) -> Result<Rc<PlacemarkController>, Error> {
        self.ensure_unique(params)?;
        let controller = PlacemarkController::attach(placemark, params, self.context.clone());
        self.controllers
            .insert(controller.id().to_owned(), Rc::clone(&controller));
        Ok(controller)
    }

    /// Update the placemark identified by `params.id`. Returns `false` if there is no such
    /// placemark.
    pub fn change(&self, params: &Params) -> bool {
        let Some(id) = Fields::new(params, "placemark").get::<&str>("id") else {
            log::warn!("Cannot change a placemark without an id.");
            return false;
        };

        match self.controllers.get(id) {
            Some(controller) => {
                controller.update(params);
                true
            }
            None => {
                log::warn!("Cannot change placemark '{id}', it does not exist.");
                false
            }
        }
    }

    /// Remove the placemark and forget its controller. Returns `false` if there is no such
    /// placemark.
    pub fn remove(&mut self, id: &str) -> bool {
        match self.controllers.remove(id) {
            Some(controller) => {
                controller.remove();
                true
            }
            None => {
                log::warn!("Cannot remove placemark '{id}', it does not exist.");
                false
            }
        }
    }

    /// Remove all placemarks.
    pub fn clear(&mut self) {
        for controller in std::mem::take(&mut self.controllers).into_values() {
            controller.remove();
        }
    }

    pub fn get(&self, id: &str) -> Option<&Rc<PlacemarkController>> {
        self.controllers.get(id)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.controllers.keys().map(String::as_str)
    }

    /// Apply a batch of changes: `{"toRemove": [..], "toAdd": [..], "toChange": [..]}`, in
    /// that order. Removals are given either as ids or as maps with an `id`. A failing entry
    /// does not stop the others. Returns the number of entries which failed.
    pub fn apply(&mut self, changes: &Params) -> usize {
        let fields = Fields::new(changes, "changes");
        let mut failures = 0;

        for entry in entries(&fields, "toRemove") {
            let id = match entry {
                Value::String(id) => Some(id.as_str()),
                Value::Map(params) => Fields::new(params, "toRemove").get::<&str>("id"),
                _ => None,
            };

            if !id.is_some_and(|id| self.remove(id)) {
                failures += 1;
            }
        }

        for entry in entries(&fields, "toAdd") {
            let Value::Map(params) = entry else {
                log::warn!("Cannot add a placemark out of {}.", entry.kind());
                failures += 1;
                continue;
            };

            if let Err(e) = self.add(params) {
                log::warn!("Failed to add a placemark: {e}.");
                failures += 1;
            }
        }

        for entry in entries(&fields, "toChange") {
            let changed = match entry {
                Value::Map(params) => self.change(params),
                _ => false,
            };

            if !changed {
                failures += 1;
            }
        }

        failures
    }
}

fn entries<'a>(fields: &Fields<'a>, key: &str) -> &'a [Value] {
    fields.get::<&[Value]>(key).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{MapObjectEvents, Ownership};
    use crate::images::AssetBundle;
    use crate::map_objects::{ClusterizedPlacemarkCollection, MapObjectCollection, PlacemarkFactory};
    use crate::position::{Position, lat_lon};
    use crate::value::params_from_json;
    use serde_json::json;

    struct NoEvents;

    impl MapObjectEvents for NoEvents {
        fn map_object_tap(&self, _id: &str, _point: Position) {}
        fn map_object_drag_start(&self, _id: &str) {}
        fn map_object_drag(&self, _id: &str, _point: Position) {}
        fn map_object_drag_end(&self, _id: &str) {}
    }

    fn registry<P: MapObjects>(parent: P) -> PlacemarkRegistry<P> {
        let events: Rc<dyn MapObjectEvents> = Rc::new(NoEvents);
        PlacemarkRegistry::new(
            parent,
            Context::new(Rc::downgrade(&events), Rc::new(AssetBundle::default())),
        )
    }

    fn params(json: serde_json::Value) -> Params {
        params_from_json(json).unwrap()
    }

    fn placemark(id: &str) -> Params {
        params(json!({"id": id, "point": {"latitude": 10, "longitude": 20}}))
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = registry(MapObjectCollection::new());

        registry.add(&placemark("a")).unwrap();
        assert_eq!(
            registry.add(&placemark("a")).err(),
            Some(Error::DuplicateId("a".to_owned()))
        );

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.parent().len(), 1);
    }

    #[test]
    fn changes_are_routed_by_id() {
        let _ = env_logger::try_init();

        let mut registry = registry(MapObjectCollection::new());
        registry.add(&placemark("a")).unwrap();
        registry.add(&placemark("b")).unwrap();

        assert!(registry.change(&params(json!({"id": "b", "opacity": 0.5}))));
        assert!(!registry.change(&params(json!({"id": "c", "opacity": 0.5}))));
        assert!(!registry.change(&params(json!({"opacity": 0.5}))));

        assert_eq!(registry.get("a").unwrap().placemark().state().opacity, 1.);
        assert_eq!(registry.get("b").unwrap().placemark().state().opacity, 0.5);
    }

    #[test]
    fn removing_placemarks() {
        let _ = env_logger::try_init();

        let mut registry = registry(MapObjectCollection::new());
        registry.add(&placemark("a")).unwrap();
        registry.add(&placemark("b")).unwrap();

        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert_eq!(registry.ids().collect::<Vec<_>>(), ["b"]);
        assert_eq!(registry.parent().len(), 1);

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.parent().is_empty());
    }

    #[test]
    fn attached_placemarks_stay_with_their_owner() {
        let collection = ClusterizedPlacemarkCollection::new();
        let placemark = collection.add_placemark().unwrap();
        let mut registry = registry(MapObjectCollection::new());

        let controller = registry
            .attach(placemark.clone(), &params(json!({"id": "x"})))
            .unwrap();
        assert_eq!(controller.ownership(), Ownership::Attached);
        assert!(matches!(
            registry.attach(placemark.clone(), &params(json!({"id": "x"}))),
            Err(Error::DuplicateId(_))
        ));

        assert!(registry.remove("x"));
        assert!(collection.contains(&placemark));
    }

    #[test]
    fn applying_a_batch() {
        let _ = env_logger::try_init();

        let mut registry = registry(MapObjectCollection::new());
        registry.add(&placemark("old")).unwrap();
        registry.add(&placemark("older")).unwrap();

        let failures = registry.apply(&params(json!({
            "toRemove": [{"id": "old"}, "older", {"id": "missing"}],
            "toAdd": [
                {"id": "new", "point": {"latitude": 1, "longitude": 1}},
                {"id": "pointless"},
                "garbage",
            ],
            "toChange": [
                {"id": "new", "point": {"latitude": 2, "longitude": 3}},
                {"id": "old", "opacity": 0},
            ],
        })));

        // Missing removal, the pointless and garbage additions, and the change of a removed
        // placemark.
        assert_eq!(failures, 4);
        assert_eq!(registry.ids().collect::<Vec<_>>(), ["new"]);
        assert_eq!(
            registry.get("new").unwrap().placemark().state().geometry,
            lat_lon(2., 3.)
        );
        assert_eq!(registry.parent().len(), 1);
    }
}
