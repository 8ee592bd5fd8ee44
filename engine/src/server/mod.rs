//! Admin HTTP surface

pub mod http;
