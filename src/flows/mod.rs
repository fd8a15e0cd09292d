//! Flow identity and FlowPolicy (component C5, §4.5).

pub mod policy;

pub use policy::{FlowPolicy, FlowPolicyConfig, PolicyMetrics};
