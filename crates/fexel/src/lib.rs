//! # Fexel — Scene Graph with a Step-Granular Frame Scheduler
//!
//! A small scene-graph engine: a tree of [`Entity`](scene::Entity) nodes, each
//! carrying [`Behavior`](scene::Behavior) units with mount/update/unmount
//! hooks. Once per frame the [`Scene`](scene::Scene) produces a lazily-pulled
//! [`Stepper`](scene::Stepper) that mounts new behaviors in tree order, then
//! updates every behavior in execution order, one unit of work per pull.
//!
//! Start with `use fexel::prelude::*`, build a scene, and either pull the
//! stepper yourself or hand the scene to a [`Driver`](driver::Driver).

pub mod driver;
pub mod error;
pub mod input;
pub mod math;
pub mod prelude;
pub mod scene;
pub mod time;
