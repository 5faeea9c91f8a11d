//! Application core: the two monitor loops and the ports they talk through.
//!
//! [`sampling::SamplingLoop`] writes the shared series, [`server::CommandServer`]
//! reads it to answer chat commands.  Every outside dependency (sensor,
//! chat service, chart renderer, clock) is reached through a trait in
//! [`ports`], so both loops run unchanged against the mocks in the tests.

pub mod commands;
pub mod context;
pub mod events;
pub mod ports;
pub mod sampling;
pub mod server;
