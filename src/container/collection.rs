//! 模块集合
//!
//! 容器持有的类型擦除模块列表，供外部协作方按自定义类型扫描
//! （例如数据库模块扫描所有提供迁移脚本的模块）

use std::any::Any;
use std::sync::Arc;

use crate::container::Module;

/// `&dyn Module` 到 `&dyn Any` 的桥接
///
/// 由 blanket impl 覆盖所有具体类型，模块无需手写
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 模块集合
///
/// 支持按具体类型过滤（[`ModuleCollection::filter`]），或用自定义谓词
/// 扫描（[`ModuleCollection::filter_map`]），容器本身无需预先知道
/// 协作方关心的能力
#[derive(Default, Clone)]
pub struct ModuleCollection {
    inner: Vec<Arc<dyn Module>>,
}

impl ModuleCollection {
    pub(crate) fn push(&mut self, module: Arc<dyn Module>) {
        self.inner.push(module);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// 遍历所有模块
    pub fn iter(&self) -> impl Iterator<Item = &dyn Module> {
        self.inner.iter().map(|m| m.as_ref())
    }

    /// 按具体类型过滤模块
    ///
    /// 注意先经过 `as_ref`：直接在 `Arc<dyn Module>` 上调用 `as_any`
    /// 会命中 `Arc` 自身的 blanket impl，向下转型永远失败
    pub fn filter<T: Any>(&self) -> impl Iterator<Item = &T> {
        self.inner
            .iter()
            .filter_map(|m| m.as_ref().as_any().downcast_ref::<T>())
    }

    /// 用自定义谓词扫描模块
    pub fn filter_map<'a, T>(
        &'a self,
        f: impl Fn(&'a dyn Any) -> Option<T> + 'a,
    ) -> impl Iterator<Item = T> + 'a {
        self.inner.iter().filter_map(move |m| f(m.as_ref().as_any()))
    }
}
