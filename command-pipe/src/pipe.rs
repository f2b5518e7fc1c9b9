use crate::{
    builder::CommandPipeBuilder,
    chain::Pipeline,
    config::PipeConfig,
    context::CommandContext,
    error::PipeError,
    handler::CommandHandler,
    middleware::CommandMiddleware,
    open::{OpenAdapter, OpenCommandMiddleware},
    proxy::{CommandProxy, DynCommand, ProxyFactory, ResultType, Route},
    registry::ServiceRegistry,
    sender::CommandSender,
    validation::{CommandValidator, ValidationMiddleware},
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub(crate) type RouteTable = HashMap<(TypeId, TypeId), Box<dyn Any + Send + Sync>>;

/// 进程内命令管道
///
/// 由 [`CommandPipeBuilder`] 构造，构造后注册表只读；克隆共享同一份状态。
///
/// ```rust
/// use command_pipe::{CancellationToken, CommandPipe, CommandSenderExt, PipeError};
/// use std::sync::Arc;
///
/// struct Add(i32, i32);
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let pipe = CommandPipe::configure(|pipe| {
///     pipe.add_handler_fn(|cmd: Arc<Add>, _cancel: CancellationToken| async move {
///         Ok::<_, PipeError>(cmd.0 + cmd.1)
///     });
/// });
///
/// let sum: i32 = pipe.send(Add(1, 2), &CancellationToken::new()).await.unwrap();
/// assert_eq!(sum, 3);
/// # }
/// ```
#[derive(Clone)]
pub struct CommandPipe {
    inner: Arc<PipeInner>,
}

struct PipeInner {
    registry: ServiceRegistry,
    routes: RouteTable,
    proxy_factories: HashMap<TypeId, ProxyFactory>,
    proxies: DashMap<TypeId, Arc<dyn CommandProxy>>,
    proxies_built: AtomicUsize,
    config: PipeConfig,
}

impl CommandPipe {
    pub fn builder() -> CommandPipeBuilder {
        CommandPipeBuilder::new()
    }

    /// 以回调配置并构造管道
    pub fn configure<F>(configure: F) -> Self
    where
        F: FnOnce(&mut CommandPipeBuilder),
    {
        let mut builder = Self::builder();
        configure(&mut builder);
        builder.build()
    }

    pub(crate) fn from_parts(
        registry: ServiceRegistry,
        routes: RouteTable,
        proxy_factories: HashMap<TypeId, ProxyFactory>,
        config: PipeConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PipeInner {
                registry,
                routes,
                proxy_factories,
                proxies: DashMap::new(),
                proxies_built: AtomicUsize::new(0),
                config,
            }),
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &PipeConfig {
        &self.inner.config
    }

    /// 已构造的命令代理数量
    pub fn proxies_built(&self) -> usize {
        self.inner.proxies_built.load(Ordering::SeqCst)
    }

    fn handler<C, R>(&self) -> Result<Arc<dyn CommandHandler<C, R>>, PipeError>
    where
        C: Send + Sync + 'static,
        R: Send + Sync + 'static,
    {
        self.inner
            .registry
            .try_get::<dyn CommandHandler<C, R>>()
            .ok_or(PipeError::HandlerNotFound {
                command: type_name::<C>(),
                result: type_name::<R>(),
            })
    }

    /// 本次分发的中间件：校验中间件在最前，其余按注册顺序
    fn middlewares<C, R>(&self) -> Vec<Arc<dyn CommandMiddleware<C, R>>>
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
    {
        let registry = &self.inner.registry;

        let mut ordered = registry.get_all_sequenced::<dyn CommandMiddleware<C, R>>();
        ordered.extend(
            registry
                .get_all_sequenced::<dyn OpenCommandMiddleware>()
                .into_iter()
                .map(|(seq, open)| {
                    (seq, Arc::new(OpenAdapter::<C, R>::new(open)) as Arc<dyn CommandMiddleware<C, R>>)
                }),
        );
        ordered.sort_by_key(|(seq, _)| *seq);

        let mut chain = Vec::with_capacity(ordered.len() + 1);
        if self.inner.config.validation {
            let validators = registry.get_all::<dyn CommandValidator<C>>();
            chain.push(Arc::new(ValidationMiddleware::new(validators)) as Arc<dyn CommandMiddleware<C, R>>);
        }
        chain.extend(ordered.into_iter().map(|(_, m)| m));
        chain
    }

    pub(crate) fn route<C>(&self, result: ResultType) -> Result<Arc<dyn Route<C>>, PipeError>
    where
        C: Send + Sync + 'static,
    {
        self.inner
            .routes
            .get(&(TypeId::of::<C>(), result.id))
            .and_then(|route| route.downcast_ref::<Arc<dyn Route<C>>>())
            .cloned()
            .ok_or(PipeError::HandlerNotFound {
                command: type_name::<C>(),
                result: result.name,
            })
    }

    fn proxy(&self, command: &DynCommand, result: ResultType) -> Result<Arc<dyn CommandProxy>, PipeError> {
        let key = command.command_type();
        if let Some(proxy) = self.inner.proxies.get(&key) {
            return Ok(Arc::clone(proxy.value()));
        }

        let Some(factory) = self.inner.proxy_factories.get(&key) else {
            return Err(PipeError::HandlerNotFound {
                command: command.type_name(),
                result: result.name,
            });
        };

        let proxy = self
            .inner
            .proxies
            .entry(key)
            .or_insert_with(|| {
                self.inner.proxies_built.fetch_add(1, Ordering::SeqCst);
                debug!(command = command.type_name(), "command proxy created");
                factory()
            })
            .value()
            .clone();

        Ok(proxy)
    }

    /// 发送装箱的命令
    ///
    /// 命令缺失时返回 `NullArgument { parameter: "command" }`；
    /// 没有 `(命令类型, R)` 的处理器时返回 `HandlerNotFound`。
    pub async fn send_dyn<R>(&self, command: Option<DynCommand>, cancel: &CancellationToken) -> Result<R, PipeError>
    where
        R: Default + Send + Sync + 'static,
    {
        let Some(command) = command else {
            return Err(PipeError::NullArgument { parameter: "command" });
        };

        let result = ResultType::of::<R>();
        let proxy = self.proxy(&command, result)?;
        let mut outcome = proxy.send(self, command, result, cancel).await?;
        outcome.take::<R>()
    }

    /// 发送结果为 `bool` 的装箱命令
    pub async fn execute_dyn(&self, command: Option<DynCommand>, cancel: &CancellationToken) -> Result<bool, PipeError> {
        self.send_dyn::<bool>(command, cancel).await
    }
}

#[async_trait]
impl CommandSender for CommandPipe {
    async fn send_context<'c, C, R>(
        &self,
        context: &'c mut CommandContext<C, R>,
        cancel: &CancellationToken,
    ) -> Result<&'c R, PipeError>
    where
        C: Send + Sync + 'static,
        R: Default + Send + Sync + 'static,
    {
        let handler = self.handler::<C, R>()?;
        let pipeline = Pipeline::compose(self.middlewares::<C, R>(), self.inner.config.trace_middleware);

        pipeline.run(context, handler.as_ref(), cancel).await?;
        Ok(context.result())
    }
}
