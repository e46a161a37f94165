//! Ember App Core Library
//!
//! Provides the composition layer for modular services: a capability container
//! that classifies and dispatches modules, named resource factories with
//! memoized construction and orchestrated teardown, and a service runtime.

pub mod config;
pub mod container;
pub mod error;

// 资源工厂与资源提供方
pub mod factory;
pub mod redis;

// 宿主子系统
pub mod cron;
pub mod runtime;

// Re-exports
pub use config::{Config, ServiceConfig};
pub use container::{
    CloserProvider, CommandProvider, Container, CronProvider, GrpcProvider, HttpProvider, Module,
    ModuleCollection, RunProvider,
};
pub use error::{BoxError, CoreError, Result};
pub use factory::{Builder, Closer, Factory, Pair, Resource, TypedFactory};

pub use cron::Crontab;
pub use redis::{RedisConfig, RedisInterceptor, RedisProvider};

// 运行时框架 re-exports
pub use runtime::{RuntimeConfig, ServiceRuntime, ShutdownHandle, SpawnTask, Task, TaskResult};
