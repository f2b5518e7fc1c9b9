/// 命令标记（Command Tag）
///
/// 把命令类型与其结果类型绑定在一起，
/// 使 `send_command` 可以仅凭命令值推断出结果类型：
///
/// ```rust
/// use command_pipe::Command;
///
/// struct CreateUser {
///     name: String,
/// }
///
/// impl Command for CreateUser {
///     type Result = u64;
/// }
/// ```
///
/// 标记是可选的：任何 `Send + Sync + 'static` 的类型都可以作为命令发送。
pub trait Command: Send + Sync + 'static {
    type Result: Default + Send + Sync + 'static;
}
