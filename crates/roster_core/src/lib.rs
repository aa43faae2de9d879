//! Roster coordination: a typed notification bus, the coordinator that owns the
//! member list, the persistence gateway it saves through, and the transient
//! add/edit surfaces that talk to it over the bus.

pub mod bus;
pub mod coordinator;
pub mod gateway;
pub mod surface;

pub use bus::{BusError, NotificationBus, SubscriptionId};
pub use coordinator::{RosterChange, RosterCoordinator};
pub use gateway::{MemberGateway, StorageGateway};
pub use surface::{Closable, FormHost, MemberForm, SurfaceError, SurfaceHost, SurfaceKind};
