pub(crate) const MEDIA_MAX_UNACKED: u32 = 1;
pub(crate) const MEDIA_CONFIGURATION_INDEX: u32 = 0;
pub(crate) const MEDIA_ACK_COUNT: u32 = 1;

pub(crate) const LOCATION_DEGREES_SCALE: f64 = 1e7;
pub(crate) const LOCATION_ACCURACY_SCALE: f64 = 1e3;
pub(crate) const LOCATION_ALTITUDE_SCALE: f64 = 1e2;
pub(crate) const LOCATION_SPEED_SCALE: f64 = 1e3;
pub(crate) const LOCATION_BEARING_SCALE: f64 = 1e6;
pub(crate) const KNOTS_PER_METER_PER_SECOND: f64 = 1.94384;

pub(crate) const EVENT_BUS_CAPACITY: usize = 64;
