use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 服务的生命周期
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceLifetime {
    /// 单例：每次解析得到同一个实例
    Singleton,
    /// 按次解析：每次解析都由工厂新建
    Transient,
}

enum Provider<S: ?Sized> {
    Instance(Arc<S>),
    Factory(Arc<dyn Fn() -> Arc<S> + Send + Sync>),
}

impl<S: ?Sized> Provider<S> {
    fn resolve(&self) -> Arc<S> {
        match self {
            Provider::Instance(instance) => Arc::clone(instance),
            Provider::Factory(factory) => factory(),
        }
    }
}

struct ServiceEntry {
    sequence: usize,
    implementation: &'static str,
    lifetime: ServiceLifetime,
    provider: Box<dyn Any + Send + Sync>,
}

/// 服务注册表
///
/// 以服务接口（通常是 `dyn Trait`）的 `TypeId` 为键，保存按注册顺序排列的实现：
/// - `try_get` 取最后一次注册的实现（后注册者生效）；
/// - `get_all` 按注册顺序返回全部实现；
/// - 每条注册都带有全局递增的序号，用于在不同接口之间合并顺序。
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<TypeId, Vec<ServiceEntry>>,
    sequence: usize,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册单例实例
    pub fn add_instance<S>(&mut self, implementation: &'static str, instance: Arc<S>)
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.push::<S>(implementation, ServiceLifetime::Singleton, Provider::Instance(instance));
    }

    /// 注册工厂，每次解析调用一次
    pub fn add_factory<S, F>(&mut self, implementation: &'static str, factory: F)
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<S> + Send + Sync + 'static,
    {
        self.push::<S>(
            implementation,
            ServiceLifetime::Transient,
            Provider::Factory(Arc::new(factory)),
        );
    }

    fn push<S>(&mut self, implementation: &'static str, lifetime: ServiceLifetime, provider: Provider<S>)
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.sequence += 1;
        self.services
            .entry(TypeId::of::<S>())
            .or_default()
            .push(ServiceEntry {
                sequence: self.sequence,
                implementation,
                lifetime,
                provider: Box::new(provider),
            });
    }

    fn entries<S>(&self) -> impl DoubleEndedIterator<Item = (&ServiceEntry, &Provider<S>)> + '_
    where
        S: ?Sized + 'static,
    {
        self.services
            .get(&TypeId::of::<S>())
            .into_iter()
            .flatten()
            .filter_map(|entry| {
                entry
                    .provider
                    .downcast_ref::<Provider<S>>()
                    .map(|provider| (entry, provider))
            })
    }

    /// 解析最后注册的实现
    pub fn try_get<S>(&self) -> Option<Arc<S>>
    where
        S: ?Sized + 'static,
    {
        self.entries::<S>().next_back().map(|(_, p)| p.resolve())
    }

    /// 按注册顺序解析全部实现
    pub fn get_all<S>(&self) -> Vec<Arc<S>>
    where
        S: ?Sized + 'static,
    {
        self.entries::<S>().map(|(_, p)| p.resolve()).collect()
    }

    pub(crate) fn get_all_sequenced<S>(&self) -> Vec<(usize, Arc<S>)>
    where
        S: ?Sized + 'static,
    {
        self.entries::<S>()
            .map(|(entry, p)| (entry.sequence, p.resolve()))
            .collect()
    }

    /// 已注册实现的类型名（按注册顺序）
    pub fn implementations<S>(&self) -> Vec<&'static str>
    where
        S: ?Sized + 'static,
    {
        self.entries::<S>().map(|(entry, _)| entry.implementation).collect()
    }

    /// 已注册实现的生命周期（按注册顺序）
    pub fn lifetimes<S>(&self) -> Vec<ServiceLifetime>
    where
        S: ?Sized + 'static,
    {
        self.entries::<S>().map(|(entry, _)| entry.lifetime).collect()
    }

    pub fn contains<S>(&self) -> bool
    where
        S: ?Sized + 'static,
    {
        self.entries::<S>().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.services.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for entries in self.services.values() {
            for entry in entries {
                list.entry(&(entry.sequence, entry.implementation, entry.lifetime));
            }
        }
        list.finish()
    }
}

/// 服务实现的展示名
pub(crate) fn implementation_name<T: ?Sized>() -> &'static str {
    type_name::<T>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;
    struct French;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    impl Greeter for French {
        fn greet(&self) -> String {
            "bonjour".into()
        }
    }

    #[test]
    fn last_registration_wins_for_single_resolution() {
        let mut registry = ServiceRegistry::new();
        registry.add_instance::<dyn Greeter>("English", Arc::new(English));
        registry.add_instance::<dyn Greeter>("French", Arc::new(French));

        let greeter = registry.try_get::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "bonjour");

        let all: Vec<_> = registry.get_all::<dyn Greeter>().iter().map(|g| g.greet()).collect();
        assert_eq!(all, vec!["hello", "bonjour"]);
        assert_eq!(registry.implementations::<dyn Greeter>(), vec!["English", "French"]);
    }

    #[test]
    fn factory_builds_per_resolution_and_instance_is_shared() {
        let built = Arc::new(AtomicUsize::new(0));
        let mut registry = ServiceRegistry::new();
        let counter = built.clone();
        registry.add_factory::<dyn Greeter, _>("English", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(English)
        });

        registry.try_get::<dyn Greeter>().unwrap();
        registry.try_get::<dyn Greeter>().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(registry.lifetimes::<dyn Greeter>(), vec![ServiceLifetime::Transient]);

        let mut registry = ServiceRegistry::new();
        registry.add_instance::<dyn Greeter>("French", Arc::new(French));
        let a = registry.try_get::<dyn Greeter>().unwrap();
        let b = registry.try_get::<dyn Greeter>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn sequence_is_global_across_services() {
        let mut registry = ServiceRegistry::new();
        registry.add_instance::<dyn Greeter>("English", Arc::new(English));
        registry.add_instance::<u32>("u32", Arc::new(1));
        registry.add_instance::<dyn Greeter>("French", Arc::new(French));

        let seq: Vec<_> = registry
            .get_all_sequenced::<dyn Greeter>()
            .into_iter()
            .map(|(seq, _)| seq)
            .collect();
        assert_eq!(seq, vec![1, 3]);
        assert_eq!(registry.len(), 3);
        assert!(!registry.contains::<String>());
    }
}
