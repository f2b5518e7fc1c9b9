use bon::Builder;

/// 管道配置
///
/// ```rust
/// use command_pipe::PipeConfig;
///
/// let config = PipeConfig::builder().validation(false).build();
/// assert!(!config.validation);
/// assert!(config.trace_middleware);
/// ```
#[derive(Builder, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipeConfig {
    /// 是否在链首自动安装校验中间件
    #[builder(default = true)]
    pub validation: bool,
    /// 是否在每个中间件前后发出 debug 追踪事件
    #[builder(default = true)]
    pub trace_middleware: bool,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
