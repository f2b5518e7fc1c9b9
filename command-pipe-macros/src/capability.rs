use crate::candidate::Candidate;
use crate::utils::{mentions, resolve_path, single_ident, type_text};
use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use std::collections::HashMap;
use syn::{GenericArgument, GenericParam, Ident, ItemImpl, Path, PathArguments, Type};

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    Handler,
    Executor,
    Middleware,
    Validator,
}

impl Kind {
    fn from_trait(path: &Path) -> Option<(Self, Vec<Type>)> {
        let last = path.segments.last()?;
        let kind = match last.ident.to_string().as_str() {
            "CommandHandler" => Kind::Handler,
            "CommandExecutor" => Kind::Executor,
            "CommandMiddleware" => Kind::Middleware,
            "CommandValidator" => Kind::Validator,
            _ => return None,
        };
        let args = type_args(&last.arguments);
        let arity = if kind == Kind::Validator { 1 } else { 2 };
        (args.len() == arity).then_some((kind, args))
    }

    fn capability(self) -> TokenStream {
        match self {
            Kind::Handler | Kind::Executor => quote! { Handler },
            Kind::Middleware => quote! { Middleware },
            Kind::Validator => quote! { Validator },
        }
    }
}

/// 模块中的一个能力实现（`impl CommandHandler<..> for T` 等）
pub(crate) struct CapabilityImpl {
    pub(crate) module: Vec<Ident>,
    pub(crate) target: String,
    kind: Kind,
    trait_args: Vec<Type>,
    self_ty: Type,
    self_path: Path,
    self_args: Vec<GenericArgument>,
    impl_params: Vec<Ident>,
}

impl CapabilityImpl {
    pub(crate) fn parse(item: &ItemImpl, module: &[Ident]) -> Option<Self> {
        let (_, trait_path, _) = item.trait_.as_ref()?;
        let (kind, trait_args) = Kind::from_trait(trait_path)?;
        let (self_path, target) = self_type_path(&item.self_ty, module)?;

        let self_args = match &self_path.segments.last()?.arguments {
            PathArguments::AngleBracketed(args) => args.args.iter().cloned().collect(),
            _ => Vec::new(),
        };
        let impl_params = item
            .generics
            .params
            .iter()
            .filter_map(|p| match p {
                GenericParam::Type(t) => Some(t.ident.clone()),
                _ => None,
            })
            .collect();

        Some(Self {
            module: module.to_vec(),
            target,
            kind,
            trait_args,
            self_ty: (*item.self_ty).clone(),
            self_path,
            self_args,
            impl_params,
        })
    }

    /// impl 形参到类型声明形参名的映射（按位置对齐）
    fn param_map(&self, candidate: &Candidate) -> HashMap<Ident, String> {
        self.self_args
            .iter()
            .zip(candidate.generics.iter())
            .filter_map(|(arg, name)| match arg {
                GenericArgument::Type(ty) => single_ident(ty)
                    .filter(|i| self.impl_params.contains(i))
                    .map(|i| (i.clone(), name.clone())),
                _ => None,
            })
            .collect()
    }

    /// 能力实参；泛型类型的形参以声明中的名字表示
    fn mapped_args(&self, candidate: &Candidate) -> Vec<String> {
        let map = self.param_map(candidate);
        self.trait_args
            .iter()
            .map(|ty| match single_ident(ty).and_then(|i| map.get(i)) {
                Some(name) => name.clone(),
                None => type_text(ty),
            })
            .collect()
    }

    pub(crate) fn descriptor(&self, candidate: &Candidate) -> TokenStream {
        let target = &self.target;
        let capability = self.kind.capability();
        let type_args = self.mapped_args(candidate);
        let register = match self.registration(candidate) {
            Some(body) => quote! {
                ::core::option::Option::Some(
                    (|builder: &mut ::command_pipe::CommandPipeBuilder| { #body; })
                        as ::command_pipe::scan::Registrar
                )
            },
            None => quote! { ::core::option::Option::None },
        };

        quote! {
            module.push_impl(::command_pipe::scan::CapabilityImpl {
                target: #target,
                capability: ::command_pipe::scan::Capability::#capability,
                type_args: &[#(#type_args),*],
                register: #register,
            });
        }
    }

    /// 注册语句；无法在编译期实例化时返回 `None`
    fn registration(&self, candidate: &Candidate) -> Option<TokenStream> {
        if !candidate.constructible() {
            return None;
        }
        if candidate.generics.is_empty() {
            self.closed_registration(candidate)
        } else {
            self.open_registration(candidate)
        }
    }

    fn closed_registration(&self, candidate: &Candidate) -> Option<TokenStream> {
        if self.trait_args.iter().any(|ty| mentions(ty, &self.impl_params)) {
            return None;
        }

        let ty = self.self_ty.to_token_stream();
        let ctor = candidate.constructor(&bare_path(&self.self_path), &ty);
        let args = &self.trait_args;

        Some(match self.kind {
            Kind::Handler => quote! {
                builder.add_handler_factory::<#(#args,)* #ty, _>(|| #ctor)
            },
            Kind::Executor => quote! {
                builder.add_executor_factory::<#(#args,)* #ty, _>(|| #ctor)
            },
            Kind::Middleware => quote! {
                builder.add_middleware_factory::<#(#args,)* #ty, _>(|| #ctor)
            },
            Kind::Validator => quote! {
                builder.add_validator_factory::<#(#args,)* #ty, _>(|| #ctor)
            },
        })
    }

    fn open_registration(&self, candidate: &Candidate) -> Option<TokenStream> {
        if self.kind != Kind::Middleware {
            return None;
        }

        let args = self.mapped_args(candidate);
        let forwarding = args.len() == candidate.generics.len()
            && args.iter().all(|a| candidate.generics.contains(a))
            && args[0] != args[1];
        if !forwarding {
            return None;
        }

        let erased = candidate.generics.iter().map(|param| {
            if *param == args[0] {
                quote! { ::command_pipe::AnyCommand }
            } else {
                quote! { ::command_pipe::AnyResult }
            }
        });
        let path = bare_path(&self.self_path);
        let ty = quote! { #path<#(#erased),*> };
        let ctor = candidate.constructor(&path, &ty);

        Some(quote! {
            builder.add_open_middleware_factory::<#ty, _>(|| #ctor)
        })
    }
}

fn type_args(arguments: &PathArguments) -> Vec<Type> {
    match arguments {
        PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|a| match a {
                GenericArgument::Type(ty) => Some(ty.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn bare_path(path: &Path) -> Path {
    let mut bare = path.clone();
    if let Some(last) = bare.segments.last_mut() {
        last.arguments = PathArguments::None;
    }
    bare
}

/// 把 impl 的 self 类型解析为相对扫描根的路径
fn self_type_path(ty: &Type, module: &[Ident]) -> Option<(Path, String)> {
    let Type::Path(tp) = ty else {
        return None;
    };
    if tp.qself.is_some() {
        return None;
    }
    resolve_path(module, &tp.path).map(|target| (tp.path.clone(), target))
}
