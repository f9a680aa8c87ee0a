//! Decoded Lottie document model.
//!
//! These types mirror the JSON document closely (short field names included) and
//! are consumed by `lottie-core` to build a layer composition tree.

pub mod model;
