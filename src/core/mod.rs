//! Core simulation types: entities, components, the world surface, RNG, configuration.
//!
//! This module contains the collaborator contracts the interpreter runs
//! against. Games implement [`World`] over their own storage; `SimWorld`
//! is the in-memory implementation used by tests and tools.

pub mod entity;
pub mod component;
pub mod position;
pub mod world;
pub mod sim_world;
pub mod rng;
pub mod config;

pub use entity::{Entity, EntityId};
pub use component::{
    names, Component, Health, HealthBoost, ItemStack, StatBlock, StatModifier, StatusInstance, StatusSet,
    Transformation,
};
pub use position::{Bounds, Position};
pub use world::{World, WorldEvent};
pub use sim_world::{SimWorld, TickReport};
pub use rng::EffectRng;
pub use config::{InterpreterConfig, Registries, DEFAULT_LINE_WIDTH, KNOWN_STATS};
