use proc_macro::TokenStream;
use syn::{ItemMod, parse_macro_input, spanned::Spanned};

mod candidate;
mod capability;
mod model;
mod utils;

/// 命令模块宏
///
/// 标注在内联模块上，在编译期提取其中（含内联子模块）的结构信息，
/// 生成 `pub fn module() -> ::command_pipe::scan::ModuleDescriptor`：
/// - 候选类型：结构体与枚举的路径、可见性、可构造性、泛型参数，以及 `#[scan(skip)]` 排除标记；
/// - 能力实现：`CommandHandler` / `CommandExecutor` / `CommandMiddleware` / `CommandValidator`
///   的 impl，连同可直接实例化时的注册函数。
///
/// 是否注册由运行期的 `CommandPipeBuilder::scan` 按规则决定。
///
/// ```ignore
/// #[command_module]
/// pub mod commands {
///     use command_pipe::{CommandExecutor, CancellationToken, PipeError, async_trait};
///
///     pub struct Ping;
///
///     #[derive(Default)]
///     pub struct PingHandler;
///
///     #[async_trait]
///     impl CommandExecutor<Ping, bool> for PingHandler {
///         async fn execute(&self, _: &Ping, _: &CancellationToken) -> Result<bool, PipeError> {
///             Ok(true)
///         }
///     }
/// }
///
/// let pipe = CommandPipe::configure(|pipe| {
///     pipe.scan(commands::module());
/// });
/// ```
#[proc_macro_attribute]
pub fn command_module(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(proc_macro2::Span::call_site(), "#[command_module] takes no arguments")
            .to_compile_error()
            .into();
    }

    let mut module = parse_macro_input!(item as ItemMod);
    if module.content.is_none() {
        return syn::Error::new(module.span(), "#[command_module] requires an inline module body")
            .to_compile_error()
            .into();
    }

    let model = match model::Model::build(&mut module) {
        Ok(model) => model,
        Err(err) => return err.to_compile_error().into(),
    };
    model.emit(&mut module);

    TokenStream::from(quote::quote! { #module })
}
