//! A desktop companion sheep. Click to plant grass; it walks over, eats,
//! hops about, wanders home and naps when ignored.
//!
//! [`pet::Companion`] owns everything: the grass pool, the agent record and
//! a virtual-clock scheduler. The binary only translates window events.

pub mod config;
pub mod error;
pub mod grass;
pub mod guide;
pub mod input;
pub mod pet;
pub mod schedule;
