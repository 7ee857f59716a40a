//! What the stage layer needs to know about vehicles.
//!
//! Stages never own vehicles.  A ride keeps only a [`VehicleId`] handle and
//! resolves it through [`VehicleLookup`] each time it needs live data; once
//! the vehicle is gone the handle stops resolving and the ride falls back to
//! the values it cached at boarding.

use tp_core::{EdgeId, Position, StopId, VehicleClass, VehicleId};

/// A vehicle that can carry transportables.
pub trait TransportVehicle {
    fn id(&self) -> VehicleId;

    /// External vehicle id, e.g. `"17.0"` or `"p3_car"`.
    fn name(&self) -> &str;

    /// Line identifier matched against a ride's candidate lines.  Private
    /// vehicles use their own name.
    fn line(&self) -> &str;

    fn vehicle_class(&self) -> VehicleClass;

    /// Distance driven since the vehicle entered the network, in metres.
    fn odometer(&self) -> f64;

    fn position(&self) -> Position;
    fn angle(&self) -> f64;
    fn edge(&self) -> EdgeId;
    fn edge_pos(&self) -> f64;
    fn speed(&self) -> f64;

    /// Whether the vehicle's remaining route halts at `stop`.
    fn stops_at(&self, stop: StopId) -> bool;

    /// Whether the vehicle's remaining route passes `edge`.
    fn stops_at_edge(&self, edge: EdgeId) -> bool;
}

/// Resolves vehicle handles.  Implemented by the driver's fleet.
pub trait VehicleLookup {
    fn vehicle(&self, id: VehicleId) -> Option<&dyn TransportVehicle>;
}

/// A lookup with no vehicles, for contexts where no ride is aboard.
pub struct NoVehicles;

impl VehicleLookup for NoVehicles {
    fn vehicle(&self, _id: VehicleId) -> Option<&dyn TransportVehicle> {
        None
    }
}
