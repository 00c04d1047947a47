//! Replays a script of placemark changes and interactions against an in-memory collection,
//! logging what happens along the way.
//!
//! Usage: `placemarks_demo [script.json]`. The bundled script is used when no path is given.
//! Assets are looked up under the directory given in `PLACEMARKS_ASSETS`, if set.
//!
//! A script is a list of steps, each being one of:
//!
//! - `{"changes": {"toAdd": [..], "toChange": [..], "toRemove": [..]}}`
//! - `{"tap": "<id>", "point": {"latitude": .., "longitude": ..}}`
//! - `{"drag": "<id>", "path": [{"latitude": .., "longitude": ..}, ..]}`

use std::path::PathBuf;
use std::rc::Rc;

use placemarks::{
    AssetBundle, AssetOptions, Context, Fields, Icon, MapObjectCollection, MapObjectEvents,
    Params, PlacemarkRegistry, PlacemarkState, Position, Value, params_from_json,
};

const BUNDLED_SCRIPT: &str = include_str!("../assets/script.json");

/// Logs every event it receives.
struct EventLog;

impl MapObjectEvents for EventLog {
    fn map_object_tap(&self, id: &str, point: Position) {
        log::info!("'{}' tapped at {:.5}, {:.5}.", id, point.y(), point.x());
    }

    fn map_object_drag_start(&self, id: &str) {
        log::info!("'{id}' drag started.");
    }

    fn map_object_drag(&self, id: &str, point: Position) {
        log::info!("'{}' dragged to {:.5}, {:.5}.", id, point.y(), point.x());
    }

    fn map_object_drag_end(&self, id: &str) {
        log::info!("'{id}' drag ended.");
    }
}

fn describe(state: &PlacemarkState) -> String {
    let icon = match &state.icon {
        Icon::None => "no icon".to_owned(),
        Icon::Single(layer) => format!("icon {}x{}", layer.image.size[0], layer.image.size[1]),
        Icon::Composite(parts) => format!(
            "composite icon [{}]",
            parts.keys().cloned().collect::<Vec<_>>().join(", ")
        ),
    };

    format!(
        "at {:.5}, {:.5}, {}, z-index {}, opacity {}, text {:?}, {}",
        state.geometry.y(),
        state.geometry.x(),
        if state.visible { "visible" } else { "hidden" },
        state.z_index,
        state.opacity,
        state.text.as_ref().map(|text| text.text.as_str()),
        icon,
    )
}

fn run_step(registry: &mut PlacemarkRegistry<MapObjectCollection>, step: &Params) {
    let fields = Fields::new(step, "step");

    if let Some(changes) = fields.get::<&Params>("changes") {
        let failures = registry.apply(changes);
        if failures > 0 {
            log::warn!("{failures} change(s) could not be applied.");
        }
    } else if let Some(id) = fields.get::<&str>("tap") {
        let (Some(controller), Some(point)) = (registry.get(id), fields.get("point")) else {
            log::warn!("Cannot tap '{id}'.");
            return;
        };

        let consumed = controller.placemark().tap(point);
        log::info!("Tap on '{id}' consumed: {consumed}.");
    } else if let Some(id) = fields.get::<&str>("drag") {
        let Some(controller) = registry.get(id) else {
            log::warn!("Cannot drag '{id}'.");
            return;
        };

        let placemark = controller.placemark();
        if !placemark.drag_start() {
            log::warn!("'{id}' is not draggable.");
            return;
        }

        for point in fields.get::<&[Value]>("path").unwrap_or_default() {
            match placemarks::FromValue::from_value(point) {
                Ok(point) => placemark.drag(point),
                Err(e) => log::warn!("Skipping a drag point: {e}."),
            }
        }
        placemark.drag_end();
    } else {
        log::warn!("Unknown step: {:?}.", step.keys().collect::<Vec<_>>());
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let script = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => BUNDLED_SCRIPT.to_owned(),
    };
    let steps: Vec<serde_json::Value> = serde_json::from_str(&script)?;

    let assets = match std::env::var_os("PLACEMARKS_ASSETS") {
        Some(root) => AssetOptions {
            root: PathBuf::from(root),
            ..Default::default()
        },
        None => AssetOptions::default(),
    };

    let events: Rc<dyn MapObjectEvents> = Rc::new(EventLog);
    let context = Context::new(Rc::downgrade(&events), Rc::new(AssetBundle::new(assets)));
    let mut registry = PlacemarkRegistry::new(MapObjectCollection::new(), context);

    for (index, step) in steps.into_iter().enumerate() {
        match params_from_json(step) {
            Some(step) => run_step(&mut registry, &step),
            None => log::warn!("Step #{index} is not an object."),
        }
    }

    for id in registry.ids() {
        if let Some(controller) = registry.get(id) {
            log::info!("'{}' {}.", id, describe(&controller.placemark().state()));
        }
    }

    Ok(())
}
