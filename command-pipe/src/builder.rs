use crate::{
    chain::{BoxFuture, Next},
    config::PipeConfig,
    context::CommandContext,
    error::PipeError,
    handler::{CommandExecutor, CommandHandler, Executor, RelayHandler},
    middleware::{CommandInterceptor, CommandMiddleware, Intercepted, RelayMiddleware},
    open::{AnyCommand, AnyResult, OpenCommandMiddleware},
    pipe::{CommandPipe, RouteTable},
    proxy::{ProxyFactory, Route, TypedRoute, build_proxy},
    registry::{ServiceRegistry, implementation_name},
    scan::{self, ModuleDescriptor},
    validation::{CommandValidator, RuleValidator},
};
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// 命令管道构造器
///
/// 所有注册方法都返回 `&mut Self` 以便链式调用；
/// 同一 `(C, R)` 重复注册处理器时，最后一次注册生效。
#[derive(Default)]
pub struct CommandPipeBuilder {
    registry: ServiceRegistry,
    routes: RouteTable,
    proxy_factories: HashMap<TypeId, ProxyFactory>,
    scanned: HashSet<&'static str>,
    config: PipeConfig,
}

impl CommandPipeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(&mut self, config: PipeConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn build(self) -> CommandPipe {
        CommandPipe::from_parts(self.registry, self.routes, self.proxy_factories, self.config)
    }

    fn record_route<C, R>(&mut self)
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
    {
        let route: Arc<dyn Route<C>> = Arc::new(TypedRoute::<C, R>::new());
        self.routes.insert((TypeId::of::<C>(), TypeId::of::<R>()), Box::new(route));
        self.proxy_factories
            .entry(TypeId::of::<C>())
            .or_insert(build_proxy::<C> as ProxyFactory);
    }

    // ---- 处理器 ----

    /// 注册处理器类型，每次分发新建一个实例
    pub fn add_handler<C, R, H>(&mut self) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
        H: CommandHandler<C, R> + Default + 'static,
    {
        self.add_handler_factory::<C, R, H, _>(H::default)
    }

    pub fn add_handler_factory<C, R, H, F>(&mut self, factory: F) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
        H: CommandHandler<C, R> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.registry.add_factory::<dyn CommandHandler<C, R>, _>(implementation_name::<H>(), move || {
            Arc::new(factory()) as Arc<dyn CommandHandler<C, R>>
        });
        self.record_route::<C, R>();
        self
    }

    /// 注册处理器单例
    pub fn add_handler_instance<C, R, H>(&mut self, handler: H) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
        H: CommandHandler<C, R> + 'static,
    {
        let handler: Arc<dyn CommandHandler<C, R>> = Arc::new(handler);
        self.registry.add_instance(implementation_name::<H>(), handler);
        self.record_route::<C, R>();
        self
    }

    pub fn add_executor<C, R, E>(&mut self) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
        E: CommandExecutor<C, R> + Default + 'static,
    {
        self.add_executor_factory::<C, R, E, _>(E::default)
    }

    pub fn add_executor_factory<C, R, E, F>(&mut self, factory: F) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
        E: CommandExecutor<C, R> + 'static,
        F: Fn() -> E + Send + Sync + 'static,
    {
        self.registry.add_factory::<dyn CommandHandler<C, R>, _>(implementation_name::<E>(), move || {
            Arc::new(Executor(factory())) as Arc<dyn CommandHandler<C, R>>
        });
        self.record_route::<C, R>();
        self
    }

    pub fn add_executor_instance<C, R, E>(&mut self, executor: E) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
        E: CommandExecutor<C, R> + 'static,
    {
        let handler: Arc<dyn CommandHandler<C, R>> = Arc::new(Executor(executor));
        self.registry.add_instance(implementation_name::<E>(), handler);
        self.record_route::<C, R>();
        self
    }

    /// 以闭包注册处理器
    pub fn add_handler_fn<C, R, F, Fut>(&mut self, f: F) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
        F: Fn(Arc<C>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, PipeError>> + Send + 'static,
    {
        self.add_handler_instance::<C, R, _>(RelayHandler::new(f))
    }

    /// 以闭包注册无返回值的处理器，成功时结果为 `true`
    pub fn add_fire_and_forget_fn<C, F, Fut>(&mut self, f: F) -> &mut Self
    where
        C: Send + Sync + 'static,
        F: Fn(Arc<C>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), PipeError>> + Send + 'static,
    {
        self.add_handler_fn::<C, bool, _, _>(move |command, cancel| {
            let done = f(command, cancel);
            async move { done.await.map(|()| true) }
        })
    }

    /// 注册处理器，并在回调中为该命令注册中间件
    pub fn add_command_handler<C, R, H>(&mut self, configure: impl FnOnce(&mut CommandBuilder<'_, C, R>)) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
        H: CommandHandler<C, R> + Default + 'static,
    {
        self.add_handler::<C, R, H>();
        configure(&mut CommandBuilder {
            pipe: &mut *self,
            _marker: PhantomData,
        });
        self
    }

    // ---- 中间件 ----

    pub fn add_middleware<C, R, M>(&mut self) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
        M: CommandMiddleware<C, R> + Default + 'static,
    {
        self.add_middleware_factory::<C, R, M, _>(M::default)
    }

    pub fn add_middleware_factory<C, R, M, F>(&mut self, factory: F) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
        M: CommandMiddleware<C, R> + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.registry.add_factory::<dyn CommandMiddleware<C, R>, _>(implementation_name::<M>(), move || {
            Arc::new(factory()) as Arc<dyn CommandMiddleware<C, R>>
        });
        self
    }

    pub fn add_middleware_instance<C, R, M>(&mut self, middleware: M) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
        M: CommandMiddleware<C, R> + 'static,
    {
        let middleware: Arc<dyn CommandMiddleware<C, R>> = Arc::new(middleware);
        self.registry.add_instance(implementation_name::<M>(), middleware);
        self
    }

    /// 以闭包注册中间件
    pub fn add_middleware_fn<C, R, F>(&mut self, f: F) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
        F: for<'a> Fn(&'a mut CommandContext<C, R>, Next<'a, C, R>, &'a CancellationToken) -> BoxFuture<'a, Result<(), PipeError>>
            + Send
            + Sync
            + 'static,
    {
        self.add_middleware_instance::<C, R, _>(RelayMiddleware::new(f))
    }

    /// 注册拦截器：只看到命令与后续结果的中间件
    pub fn add_interceptor<C, R, I>(&mut self) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
        I: CommandInterceptor<C, R> + Default + 'static,
    {
        self.add_interceptor_factory::<C, R, I, _>(I::default)
    }

    pub fn add_interceptor_factory<C, R, I, F>(&mut self, factory: F) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
        I: CommandInterceptor<C, R> + 'static,
        F: Fn() -> I + Send + Sync + 'static,
    {
        self.registry.add_factory::<dyn CommandMiddleware<C, R>, _>(implementation_name::<I>(), move || {
            Arc::new(Intercepted(factory())) as Arc<dyn CommandMiddleware<C, R>>
        });
        self
    }

    pub fn add_interceptor_instance<C, R, I>(&mut self, interceptor: I) -> &mut Self
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
        I: CommandInterceptor<C, R> + 'static,
    {
        let middleware: Arc<dyn CommandMiddleware<C, R>> = Arc::new(Intercepted(interceptor));
        self.registry.add_instance(implementation_name::<I>(), middleware);
        self
    }

    /// 注册开放泛型中间件：作用于所有命令
    pub fn add_open_middleware<M>(&mut self) -> &mut Self
    where
        M: CommandMiddleware<AnyCommand, AnyResult> + Default + 'static,
    {
        self.add_open_middleware_factory::<M, _>(M::default)
    }

    pub fn add_open_middleware_factory<M, F>(&mut self, factory: F) -> &mut Self
    where
        M: CommandMiddleware<AnyCommand, AnyResult> + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.registry.add_factory::<dyn OpenCommandMiddleware, _>(implementation_name::<M>(), move || {
            Arc::new(factory()) as Arc<dyn OpenCommandMiddleware>
        });
        self
    }

    pub fn add_open_middleware_instance<M>(&mut self, middleware: M) -> &mut Self
    where
        M: CommandMiddleware<AnyCommand, AnyResult> + 'static,
    {
        let middleware: Arc<dyn OpenCommandMiddleware> = Arc::new(middleware);
        self.registry.add_instance(implementation_name::<M>(), middleware);
        self
    }

    // ---- 校验器 ----

    pub fn add_validator<C, V>(&mut self) -> &mut Self
    where
        C: Send + Sync + 'static,
        V: CommandValidator<C> + Default + 'static,
    {
        self.add_validator_factory::<C, V, _>(V::default)
    }

    pub fn add_validator_factory<C, V, F>(&mut self, factory: F) -> &mut Self
    where
        C: Send + Sync + 'static,
        V: CommandValidator<C> + 'static,
        F: Fn() -> V + Send + Sync + 'static,
    {
        self.registry.add_factory::<dyn CommandValidator<C>, _>(implementation_name::<V>(), move || {
            Arc::new(factory()) as Arc<dyn CommandValidator<C>>
        });
        self
    }

    pub fn add_validator_instance<C, V>(&mut self, validator: V) -> &mut Self
    where
        C: Send + Sync + 'static,
        V: CommandValidator<C> + 'static,
    {
        let validator: Arc<dyn CommandValidator<C>> = Arc::new(validator);
        self.registry.add_instance(implementation_name::<V>(), validator);
        self
    }

    /// 以规则注册校验器
    pub fn add_rules<C>(&mut self, configure: impl FnOnce(RuleValidator<C>) -> RuleValidator<C>) -> &mut Self
    where
        C: Send + Sync + 'static,
    {
        self.add_validator_instance::<C, _>(configure(RuleValidator::new()))
    }

    // ---- 扫描 ----

    /// 扫描 `#[command_module]` 生成的模块描述并注册其中的候选类型
    ///
    /// 同名模块只扫描一次。
    pub fn scan(&mut self, module: ModuleDescriptor) -> &mut Self {
        if !self.scanned.insert(module.name()) {
            debug!(module = module.name(), "module already scanned");
            return self;
        }

        scan::register(self, &module);
        self
    }

    pub fn scan_modules(&mut self, modules: impl IntoIterator<Item = ModuleDescriptor>) -> &mut Self {
        for module in modules {
            self.scan(module);
        }
        self
    }
}

/// 单个命令的构造器：为该命令注册中间件
pub struct CommandBuilder<'b, C, R> {
    pipe: &'b mut CommandPipeBuilder,
    _marker: PhantomData<fn() -> (C, R)>,
}

impl<C, R> CommandBuilder<'_, C, R>
where
    C: Send + Sync + 'static,
    R: Send + Sync + 'static,
{
    pub fn add_middleware<M>(&mut self) -> &mut Self
    where
        M: CommandMiddleware<C, R> + Default + 'static,
    {
        self.pipe.add_middleware::<C, R, M>();
        self
    }

    pub fn add_middleware_factory<M, F>(&mut self, factory: F) -> &mut Self
    where
        M: CommandMiddleware<C, R> + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.pipe.add_middleware_factory::<C, R, M, F>(factory);
        self
    }

    pub fn add_middleware_instance<M>(&mut self, middleware: M) -> &mut Self
    where
        M: CommandMiddleware<C, R> + 'static,
    {
        self.pipe.add_middleware_instance::<C, R, M>(middleware);
        self
    }

    pub fn add_middleware_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut CommandContext<C, R>, Next<'a, C, R>, &'a CancellationToken) -> BoxFuture<'a, Result<(), PipeError>>
            + Send
            + Sync
            + 'static,
    {
        self.pipe.add_middleware_fn::<C, R, F>(f);
        self
    }

    pub fn add_interceptor<I>(&mut self) -> &mut Self
    where
        R: Default,
        I: CommandInterceptor<C, R> + Default + 'static,
    {
        self.pipe.add_interceptor::<C, R, I>();
        self
    }

    pub fn add_interceptor_instance<I>(&mut self, interceptor: I) -> &mut Self
    where
        R: Default,
        I: CommandInterceptor<C, R> + 'static,
    {
        self.pipe.add_interceptor_instance::<C, R, I>(interceptor);
        self
    }
}
