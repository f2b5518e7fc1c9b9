use command_pipe::command_module;

#[command_module]
mod nothing_here {
    #[allow(dead_code)]
    fn helper() {}
}

fn main() {
    let module = nothing_here::module();
    assert!(module.types().is_empty());
    assert!(module.impls().is_empty());
    assert!(module.plan().is_empty());
}
