//! 命名资源工厂
//!
//! 按逻辑名称惰性构建并缓存资源实例，供各资源提供方（redis、对象存储等）
//! 以完全相同的语义复用：
//! - 同名实例全生命周期内至多构建一次，首个成功的 `make` 记忆化结果
//! - 构建失败不记忆化，下一次 `make` 重新尝试
//! - `close` 统一调用所有已构建实例的清理动作并清空缓存

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::{CoreError, Result};

/// 类型擦除后的资源实例
pub type Resource = Arc<dyn Any + Send + Sync>;

/// 资源清理动作，由构建方提供，随实例一起被记忆化
pub type Closer = Box<dyn FnOnce() + Send>;

/// 构建函数：`名称 -> (实例, 清理动作)`
pub type Builder = Box<dyn Fn(&str) -> Result<Pair> + Send + Sync>;

/// 构建产物：资源实例与其清理动作
pub struct Pair {
    resource: Resource,
    closer: Closer,
}

impl Pair {
    pub fn new<T>(resource: T, closer: impl FnOnce() + Send + 'static) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            resource: Arc::new(resource),
            closer: Box::new(closer),
        }
    }
}

/// 已记忆化的条目
///
/// 清理动作只能被消费一次，用 `Mutex<Option<_>>` 保证 `close` 与
/// 潜在的重复 `close` 之间的独占取出
struct Entry {
    resource: Resource,
    closer: Mutex<Option<Closer>>,
}

/// 每个名称对应的一次性初始化单元
#[derive(Default)]
struct Slot {
    cell: OnceCell<Entry>,
}

/// 命名资源工厂
///
/// 并发契约：
/// - 同名并发 `make`：槽位内的一次性单元保证构建函数至多执行一次，
///   其余调用方阻塞等待首个结果
/// - 异名并发 `make`：槽位表锁只覆盖"取槽"这一步，互不阻塞
/// - `close` 开始后不应再请求新资源；与 `close` 竞争的 `make`
///   可能构建出清理动作永远不会执行的实例
pub struct Factory {
    builder: Builder,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl Factory {
    pub fn new(builder: impl Fn(&str) -> Result<Pair> + Send + Sync + 'static) -> Self {
        Self {
            builder: Box::new(builder),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// 获取或构建名为 `name` 的资源
    ///
    /// 命中缓存直接返回；否则执行构建函数，成功则记忆化，
    /// 失败则原样返回错误且不记忆化
    pub fn make(&self, name: &str) -> Result<Resource> {
        let slot = {
            let mut slots = self.lock_slots();
            Arc::clone(slots.entry(name.to_string()).or_default())
        };

        let entry = slot.cell.get_or_try_init(|| {
            let pair = (self.builder)(name)?;
            debug!(name, "Resource constructed");
            Ok::<_, CoreError>(Entry {
                resource: pair.resource,
                closer: Mutex::new(Some(pair.closer)),
            })
        })?;

        Ok(Arc::clone(&entry.resource))
    }

    /// 关闭所有已构建的资源并清空缓存
    ///
    /// 清理动作自身不返回错误（应各自记录日志）；`close` 之后
    /// 再次 `make` 会重新构建
    pub fn close(&self) {
        let drained: Vec<Arc<Slot>> = {
            let mut slots = self.lock_slots();
            slots.drain().map(|(_, slot)| slot).collect()
        };

        let mut closed = 0usize;
        for slot in drained {
            if let Some(entry) = slot.cell.get() {
                let closer = entry
                    .closer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(closer) = closer {
                    closer();
                    closed += 1;
                }
            }
        }

        if closed > 0 {
            debug!(closed, "Factory closed");
        }
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Slot>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 按资源类别收窄的工厂适配器
///
/// 将类型擦除的实例收窄为该类别期望的具体类型；收窄失败说明
/// 构建函数实现有误，以 [`CoreError::TypeMismatch`] 报告而不是 panic
pub struct TypedFactory<T> {
    inner: Arc<Factory>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedFactory<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _marker: PhantomData,
        }
    }
}

impl<T: Any + Send + Sync> TypedFactory<T> {
    pub fn new(inner: Arc<Factory>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// 获取或构建名为 `name` 的资源并收窄为 `T`
    pub fn make(&self, name: &str) -> Result<Arc<T>> {
        let resource = self.inner.make(name)?;
        resource
            .downcast::<T>()
            .map_err(|_| CoreError::type_mismatch(name, std::any::type_name::<T>()))
    }

    /// 关闭底层工厂中所有已构建的资源
    pub fn close(&self) {
        self.inner.close();
    }

    /// 访问未收窄的底层工厂
    pub fn untyped(&self) -> &Arc<Factory> {
        &self.inner
    }
}
