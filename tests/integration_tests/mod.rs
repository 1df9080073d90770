//! Integration tests module
//!
//! End-to-end harvest scenarios against a scriptable provider:
//! - Sequential pagination stop conditions
//! - Scroll endpoint fallback and continuation limits
//! - Bypass segmentation and seeding from stored domains
//! - Background harvests through the public interface

pub mod bypass_test;
pub mod fixtures;
pub mod harvester_test;
pub mod pagination_test;
pub mod scroll_test;
