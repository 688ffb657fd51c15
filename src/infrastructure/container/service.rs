//! 服务实例与工厂
//!
//! - `Service`：所有模块实例实现的 trait，可选地暴露生命周期钩子
//! - `Factory`：值模块或带依赖的工厂模块（编译期确定参数个数）

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::BoxError;

/// 容器中缓存的模块实例
pub type Instance = Arc<dyn Service>;

/// 类型擦除辅助 trait，为所有 `Any + Send + Sync` 类型自动实现
pub trait AsAny: Any + Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn service_type_id(&self) -> TypeId;

    fn service_type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn service_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn service_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// 模块实例接口
///
/// 普通模块只需 `impl Service for MyType {}`。可启动模块覆盖 `has_hook`
/// 与 `call_hook`，由容器的 `start`/`stop` 按名称调用。
#[async_trait]
pub trait Service: AsAny {
    /// 是否存在名为 `hook` 的生命周期钩子
    fn has_hook(&self, _hook: &str) -> bool {
        false
    }

    /// 执行钩子；返回的 future 即钩子的完成句柄
    async fn call_hook(&self, hook: &str) -> Result<(), BoxError> {
        Err(format!("lifecycle hook '{hook}' is not implemented").into())
    }
}

impl fmt::Debug for dyn Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service<{}>", self.service_type_name())
    }
}

/// 将实例向下转型为具体类型
pub fn downcast_instance<T: Service>(instance: &Instance) -> Option<Arc<T>> {
    Arc::clone(instance).into_any().downcast::<T>().ok()
}

type FactoryFn = dyn Fn(&[Instance]) -> Result<Option<Instance>, BoxError> + Send + Sync;

/// 模块工厂
#[derive(Clone)]
pub enum Factory {
    /// 现成的值，本身即为已解析实例
    Value(Instance),
    /// 接收按声明顺序解析好的依赖实例
    Function { arity: usize, call: Arc<FactoryFn> },
}

impl Factory {
    pub fn value<T: Service>(value: T) -> Self {
        Factory::Value(Arc::new(value))
    }

    pub fn from_instance(instance: Instance) -> Self {
        Factory::Value(instance)
    }

    /// 无依赖工厂
    pub fn from_fn<T, F>(factory: F) -> Self
    where
        T: Service,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::dynamic(0, move |_| Ok(Some(Arc::new(factory()) as Instance)))
    }

    pub fn from_fn1<A, T, F>(factory: F) -> Self
    where
        A: Service,
        T: Service,
        F: Fn(Arc<A>) -> T + Send + Sync + 'static,
    {
        Self::dynamic(1, move |deps| {
            let a = dependency::<A>(deps, 0)?;
            Ok(Some(Arc::new(factory(a)) as Instance))
        })
    }

    pub fn from_fn2<A, B, T, F>(factory: F) -> Self
    where
        A: Service,
        B: Service,
        T: Service,
        F: Fn(Arc<A>, Arc<B>) -> T + Send + Sync + 'static,
    {
        Self::dynamic(2, move |deps| {
            let a = dependency::<A>(deps, 0)?;
            let b = dependency::<B>(deps, 1)?;
            Ok(Some(Arc::new(factory(a, b)) as Instance))
        })
    }

    pub fn from_fn3<A, B, C, T, F>(factory: F) -> Self
    where
        A: Service,
        B: Service,
        C: Service,
        T: Service,
        F: Fn(Arc<A>, Arc<B>, Arc<C>) -> T + Send + Sync + 'static,
    {
        Self::dynamic(3, move |deps| {
            let a = dependency::<A>(deps, 0)?;
            let b = dependency::<B>(deps, 1)?;
            let c = dependency::<C>(deps, 2)?;
            Ok(Some(Arc::new(factory(a, b, c)) as Instance))
        })
    }

    /// 由注册方显式声明参数个数的工厂。返回 `Ok(None)` 表示未能产生实例。
    pub fn dynamic<F>(arity: usize, factory: F) -> Self
    where
        F: Fn(&[Instance]) -> Result<Option<Instance>, BoxError> + Send + Sync + 'static,
    {
        Factory::Function {
            arity,
            call: Arc::new(factory),
        }
    }

    /// 工厂期望的依赖个数，值模块为 0
    pub fn arity(&self) -> usize {
        match self {
            Factory::Value(_) => 0,
            Factory::Function { arity, .. } => *arity,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Factory::Value(_))
    }

    pub(crate) fn instantiate(&self, dependencies: &[Instance]) -> Result<Option<Instance>, BoxError> {
        match self {
            Factory::Value(instance) => Ok(Some(Arc::clone(instance))),
            Factory::Function { call, .. } => call(dependencies),
        }
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factory::Value(instance) => f
                .debug_tuple("Value")
                .field(&(**instance).service_type_name())
                .finish(),
            Factory::Function { arity, .. } => {
                f.debug_struct("Function").field("arity", arity).finish_non_exhaustive()
            }
        }
    }
}

fn dependency<T: Service>(deps: &[Instance], index: usize) -> Result<Arc<T>, BoxError> {
    let instance = deps
        .get(index)
        .ok_or_else(|| format!("dependency #{index} was not supplied"))?;
    downcast_instance::<T>(instance).ok_or_else(|| {
        format!(
            "dependency #{index} is a {}, expected {}",
            (**instance).service_type_name(),
            std::any::type_name::<T>()
        )
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Port(u16);
    impl Service for Port {}

    #[derive(Debug)]
    struct Server {
        port: Arc<Port>,
    }
    impl Service for Server {}

    #[test]
    fn test_arity_follows_signature() {
        assert_eq!(Factory::value(Port(80)).arity(), 0);
        assert_eq!(Factory::from_fn(|| Port(80)).arity(), 0);
        assert_eq!(Factory::from_fn1(|port: Arc<Port>| Server { port }).arity(), 1);
        assert_eq!(Factory::dynamic(4, |_| Ok(None)).arity(), 4);
        assert!(Factory::value(Port(1)).is_value());
    }

    #[test]
    fn test_typed_factory_receives_dependency() {
        let factory = Factory::from_fn1(|port: Arc<Port>| Server { port });
        let port: Instance = Arc::new(Port(8080));

        let instance = factory.instantiate(&[port]).unwrap().unwrap();
        let server = downcast_instance::<Server>(&instance).unwrap();
        assert_eq!(*server.port, Port(8080));
    }

    #[test]
    fn test_wrong_dependency_type_is_an_error() {
        let factory = Factory::from_fn1(|port: Arc<Port>| Server { port });
        let wrong: Instance = Arc::new(Server {
            port: Arc::new(Port(1)),
        });

        let err = factory.instantiate(&[wrong]).unwrap_err();
        assert!(err.to_string().contains("dependency #0"));
    }

    #[test]
    fn test_value_factory_shares_instance() {
        let factory = Factory::value(Port(1));
        let a = factory.instantiate(&[]).unwrap().unwrap();
        let b = factory.instantiate(&[]).unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_default_hooks_are_absent() {
        let port = Port(1);
        assert!(!port.has_hook("start"));
        assert!(tokio_test::block_on(port.call_hook("start")).is_err());
    }
}
