#![allow(dead_code)]

pub(crate) mod clock;

pub(crate) mod events;

pub(crate) mod logging;

pub(crate) mod snapshot;
