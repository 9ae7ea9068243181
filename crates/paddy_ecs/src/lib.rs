//! 一个基于原型（archetype）的 Entity-Component-System 核心
//!
//! 实体按其精确的组件签名被分到各自的 [`archetype`]，每个 archetype 对应一张列式存储的 [`storage::table::Table`]，
//! 使得同一签名下的实体可以被紧凑、缓存友好地批量访问
//!
//! 整个 crate 运行在单线程协作模型下：所有的可变性都通过 `&mut World` 静态借用检查来保证互斥，
//! 没有运行时锁或原子引用计数

mod arena;
mod archetype;
mod bundle;
mod component;
mod entity;
pub mod error;
mod storage;
mod type_storage;
mod world;

pub use arena::{Arena, Handle};
pub use bundle::{Bundle, DynamicBundle};
pub use component::{Component, ComponentDescriptor, ComponentId, ComponentInfo, Components};
pub use entity::{Entity, EntityLocation};
pub use error::EcsError;
pub use type_storage::TypeStorage;
pub use world::{World, WorldId};
