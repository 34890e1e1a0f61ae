//! Buffer-policy autoscaling for game-server fleets.
//!
//! Provides [`apply_buffer_policy`], a pure function computing how many
//! replicas a fleet should have so that a configured amount of spare
//! (non-allocated) capacity is always available, and [`evaluate`], which turns
//! that decision into the status an autoscaler publishes.
//!
//! # Example
//!
//! ```rust
//! use fleet_autoscaler::{apply_buffer_policy, BufferPolicy, BufferSize, FleetState};
//!
//! let policy = BufferPolicy::new(BufferSize::Count(5), 0, 100);
//! let fleet = FleetState::new("fleet-1", "default").with_replicas(5).with_allocated(2);
//!
//! let decision = apply_buffer_policy(&policy, &fleet).unwrap();
//! assert_eq!(decision.target_replicas, 7);
//! assert!(!decision.limited);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod error;
pub mod types;

pub use buffer::{apply_buffer_policy, apply_or_hold, evaluate, ScaleDecision};
pub use error::{AutoscalerError, Result};
pub use types::{AutoscalerStatus, BufferPolicy, BufferSize, FleetAutoscaler, FleetState};
