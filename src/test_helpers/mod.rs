//! Infrastructure to exercise the MAC without hardware.
//!
//! [`mock`] drives a single MAC instance by hand, [`aether`] connects any
//! number of simulated radios and [`run`] puts complete networks on top of it.

pub mod aether;
pub mod mock;
pub mod run;
