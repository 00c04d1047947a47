//! Types and functions for working with positions.

use crate::value::{DecodeError, Fields, FromValue, Params, Value};

/// Geographical position with latitude and longitude.
pub type Position = geo_types::Point;

/// Construct `Position` from latitude and longitude.
pub fn lat_lon(lat: f64, lon: f64) -> Position {
    Position::new(lon, lat)
}

/// Construct `Position` from longitude and latitude. Note that it is common standard to write
/// coordinates starting with the latitude instead.
pub fn lon_lat(lon: f64, lat: f64) -> Position {
    Position::new(lon, lat)
}

/// Positions travel as `{"latitude": .., "longitude": ..}` maps.
impl FromValue<'_> for Position {
    fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let fields = Fields::new(<&Params>::from_value(value)?, "point");
        Ok(lat_lon(
            fields.require("latitude")?,
            fields.require("longitude")?,
        ))
    }
}
