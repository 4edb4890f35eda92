//! Types that are used across multiple components of the integrity layer.
//!
//! Types that are specific to a single component, e.g., the reservation handles of
//! [`crate::signed_state`], can be found in that component's module.

pub mod data_types;

pub mod event;

pub mod event_window;

pub mod roster;
