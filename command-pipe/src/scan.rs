//! 模块扫描
//!
//! `#[command_module]` 在编译期提取模块中的候选类型与能力实现，生成 [`ModuleDescriptor`]；
//! 这里在运行期套用结构规则，决定哪些实现被注册到构造器中。
//!
//! 规则：
//! - 候选类型必须公开（自身及所在的各级被扫描模块均为 `pub`）、可构造、未标注 `#[scan(skip)]`；
//! - 处理器与校验器只接受无泛型参数的类型；
//! - 中间件：无泛型参数的按封闭类型注册；泛型参数恰好就是能力的类型实参时按开放泛型注册，
//!   其余（部分泛型）跳过。

use crate::builder::CommandPipeBuilder;
use tracing::{debug, trace, warn};

/// 把一个能力实现注册到构造器上
pub type Registrar = fn(&mut CommandPipeBuilder);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Restricted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    Handler,
    Middleware,
    Validator,
}

/// 候选类型
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    /// 相对扫描根模块的路径，如 `orders::PlaceOrderHandler`
    pub path: &'static str,
    pub visibility: Visibility,
    /// 单元结构体、仅含 `PhantomData` 字段，或实现了 `Default`
    pub constructible: bool,
    pub generics: &'static [&'static str],
    pub skip: bool,
}

/// 候选类型上的一个能力实现
#[derive(Clone, Debug)]
pub struct CapabilityImpl {
    pub target: &'static str,
    pub capability: Capability,
    /// 能力的类型实参；泛型类型的参数以其形参名表示
    pub type_args: &'static [&'static str],
    pub register: Option<Registrar>,
}

/// 一个被扫描模块的结构描述
#[derive(Clone, Debug, Default)]
pub struct ModuleDescriptor {
    name: &'static str,
    types: Vec<TypeDescriptor>,
    impls: Vec<CapabilityImpl>,
}

impl ModuleDescriptor {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn types(&self) -> &[TypeDescriptor] {
        &self.types
    }

    pub fn impls(&self) -> &[CapabilityImpl] {
        &self.impls
    }

    pub fn push_type(&mut self, ty: TypeDescriptor) {
        self.types.push(ty);
    }

    pub fn push_impl(&mut self, capability: CapabilityImpl) {
        self.impls.push(capability);
    }

    /// 按声明顺序给出每个能力实现的扫描结论
    pub fn plan(&self) -> Vec<ScanDecision> {
        self.types
            .iter()
            .flat_map(|ty| {
                self.impls
                    .iter()
                    .filter(move |cap| cap.target == ty.path)
                    .map(move |cap| ScanDecision {
                        target: ty.path,
                        capability: cap.capability,
                        outcome: eligibility(ty, cap),
                        register: cap.register,
                    })
            })
            .collect()
    }
}

/// 通过规则后的注册方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    Closed,
    OpenGeneric,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Excluded,
    NotPublic,
    NotConstructible,
    GenericType,
    PartiallyGeneric,
}

#[derive(Clone, Debug)]
pub struct ScanDecision {
    pub target: &'static str,
    pub capability: Capability,
    pub outcome: Result<Registration, SkipReason>,
    register: Option<Registrar>,
}

pub fn eligibility(ty: &TypeDescriptor, cap: &CapabilityImpl) -> Result<Registration, SkipReason> {
    if ty.skip {
        return Err(SkipReason::Excluded);
    }
    if ty.visibility != Visibility::Public {
        return Err(SkipReason::NotPublic);
    }
    if !ty.constructible {
        return Err(SkipReason::NotConstructible);
    }
    if ty.generics.is_empty() {
        return Ok(Registration::Closed);
    }

    match cap.capability {
        Capability::Handler | Capability::Validator => Err(SkipReason::GenericType),
        Capability::Middleware if same_generic_parameters(cap.type_args, ty.generics) => {
            Ok(Registration::OpenGeneric)
        }
        Capability::Middleware => Err(SkipReason::PartiallyGeneric),
    }
}

fn same_generic_parameters(args: &[&str], params: &[&str]) -> bool {
    args.len() == params.len() && args.iter().all(|arg| params.contains(arg))
}

pub(crate) fn register(builder: &mut CommandPipeBuilder, module: &ModuleDescriptor) {
    let mut registered = 0;

    for decision in module.plan() {
        match (decision.outcome, decision.register) {
            (Ok(registration), Some(register)) => {
                debug!(
                    module = module.name(),
                    target = decision.target,
                    capability = ?decision.capability,
                    ?registration,
                    "registering scanned type"
                );
                register(builder);
                registered += 1;
            }
            (Ok(registration), None) => warn!(
                module = module.name(),
                target = decision.target,
                capability = ?decision.capability,
                ?registration,
                "scanned type is eligible but has no registrar"
            ),
            (Err(reason), _) => trace!(
                module = module.name(),
                target = decision.target,
                capability = ?decision.capability,
                ?reason,
                "skipping scanned type"
            ),
        }
    }

    debug!(module = module.name(), registered, "module scanned");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(path: &'static str, generics: &'static [&'static str]) -> TypeDescriptor {
        TypeDescriptor {
            path,
            visibility: Visibility::Public,
            constructible: true,
            generics,
            skip: false,
        }
    }

    fn cap(target: &'static str, capability: Capability, type_args: &'static [&'static str]) -> CapabilityImpl {
        CapabilityImpl {
            target,
            capability,
            type_args,
            register: None,
        }
    }

    #[test]
    fn concrete_public_types_register_closed() {
        let t = ty("Handler", &[]);
        for capability in [Capability::Handler, Capability::Middleware, Capability::Validator] {
            assert_eq!(
                eligibility(&t, &cap("Handler", capability, &["Cmd", "bool"])),
                Ok(Registration::Closed)
            );
        }
    }

    #[test]
    fn structural_exclusions() {
        let mut hidden = ty("Hidden", &[]);
        hidden.visibility = Visibility::Restricted;
        let mut abstract_like = ty("NoDefault", &[]);
        abstract_like.constructible = false;
        let mut skipped = ty("Skipped", &[]);
        skipped.skip = true;
        skipped.visibility = Visibility::Restricted;

        let c = cap("_", Capability::Handler, &["Cmd", "bool"]);
        assert_eq!(eligibility(&hidden, &c), Err(SkipReason::NotPublic));
        assert_eq!(eligibility(&abstract_like, &c), Err(SkipReason::NotConstructible));
        assert_eq!(eligibility(&skipped, &c), Err(SkipReason::Excluded));
    }

    #[test]
    fn generic_middleware_needs_matching_parameters() {
        let open = ty("Timing", &["C", "R"]);
        assert_eq!(
            eligibility(&open, &cap("Timing", Capability::Middleware, &["C", "R"])),
            Ok(Registration::OpenGeneric)
        );
        assert_eq!(
            eligibility(&open, &cap("Timing", Capability::Middleware, &["R", "C"])),
            Ok(Registration::OpenGeneric)
        );

        let partial = ty("Partial", &["C"]);
        assert_eq!(
            eligibility(&partial, &cap("Partial", Capability::Middleware, &["C", "bool"])),
            Err(SkipReason::PartiallyGeneric)
        );
    }

    #[test]
    fn generic_handlers_and_validators_are_skipped() {
        let generic = ty("Generic", &["C", "R"]);
        assert_eq!(
            eligibility(&generic, &cap("Generic", Capability::Handler, &["C", "R"])),
            Err(SkipReason::GenericType)
        );
        let generic = ty("GenericValidator", &["C"]);
        assert_eq!(
            eligibility(&generic, &cap("GenericValidator", Capability::Validator, &["C"])),
            Err(SkipReason::GenericType)
        );
    }

    #[test]
    fn plan_joins_impls_to_types_in_declaration_order() {
        let mut module = ModuleDescriptor::new("app::commands");
        module.push_type(ty("A", &[]));
        module.push_type(ty("B", &["C"]));
        module.push_impl(cap("B", Capability::Middleware, &["C", "bool"]));
        module.push_impl(cap("A", Capability::Handler, &["Cmd", "bool"]));
        module.push_impl(cap("A", Capability::Validator, &["Cmd"]));
        module.push_impl(cap("Elsewhere", Capability::Handler, &["Cmd", "bool"]));

        let plan: Vec<_> = module
            .plan()
            .into_iter()
            .map(|d| (d.target, d.capability, d.outcome))
            .collect();

        assert_eq!(
            plan,
            vec![
                ("A", Capability::Handler, Ok(Registration::Closed)),
                ("A", Capability::Validator, Ok(Registration::Closed)),
                ("B", Capability::Middleware, Err(SkipReason::PartiallyGeneric)),
            ]
        );
    }
}
