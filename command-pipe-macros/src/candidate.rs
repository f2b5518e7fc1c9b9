use crate::utils::{derives_default, last_ident_is, take_scan_skip};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Fields, GenericParam, Generics, Ident, ItemEnum, ItemStruct, Path, Type, Visibility};

/// 候选类型的字段形态
pub(crate) enum Shape {
    Unit,
    /// 所有字段都是 `PhantomData`（含空字段列表）
    PhantomNamed(Vec<Ident>),
    PhantomUnnamed(usize),
    Other,
}

/// 被扫描模块中的一个结构体或枚举
pub(crate) struct Candidate {
    pub(crate) key: String,
    pub(crate) public: bool,
    pub(crate) generics: Vec<String>,
    pub(crate) shape: Shape,
    pub(crate) has_default: bool,
    pub(crate) skip: bool,
}

impl Candidate {
    pub(crate) fn from_struct(item: &mut ItemStruct, module: &[Ident], public: bool) -> syn::Result<Self> {
        let skip = take_scan_skip(&mut item.attrs)?;
        let shape = match &item.fields {
            Fields::Unit => Shape::Unit,
            Fields::Named(named) if named.named.iter().all(|f| is_phantom(&f.ty)) => Shape::PhantomNamed(
                named.named.iter().filter_map(|f| f.ident.clone()).collect(),
            ),
            Fields::Unnamed(unnamed) if unnamed.unnamed.iter().all(|f| is_phantom(&f.ty)) => {
                Shape::PhantomUnnamed(unnamed.unnamed.len())
            }
            _ => Shape::Other,
        };

        Ok(Self {
            key: key(module, &item.ident),
            public: public && is_pub(&item.vis),
            generics: generic_names(&item.generics),
            shape,
            has_default: derives_default(&item.attrs),
            skip,
        })
    }

    pub(crate) fn from_enum(item: &mut ItemEnum, module: &[Ident], public: bool) -> syn::Result<Self> {
        let skip = take_scan_skip(&mut item.attrs)?;
        Ok(Self {
            key: key(module, &item.ident),
            public: public && is_pub(&item.vis),
            generics: generic_names(&item.generics),
            shape: Shape::Other,
            has_default: derives_default(&item.attrs),
            skip,
        })
    }

    pub(crate) fn constructible(&self) -> bool {
        !matches!(self.shape, Shape::Other) || self.has_default
    }

    /// 构造表达式；`path` 为不带泛型实参的类型路径，`ty` 为完整类型
    pub(crate) fn constructor(&self, path: &Path, ty: &TokenStream) -> TokenStream {
        match &self.shape {
            Shape::Unit => quote! { #path },
            Shape::PhantomNamed(fields) => quote! {
                #path { #(#fields: ::core::marker::PhantomData),* }
            },
            Shape::PhantomUnnamed(n) => {
                let phantoms = (0..*n).map(|_| quote! { ::core::marker::PhantomData });
                quote! { #path ( #(#phantoms),* ) }
            }
            Shape::Other => quote! { <#ty as ::core::default::Default>::default() },
        }
    }
}

pub(crate) fn key(module: &[Ident], ident: &Ident) -> String {
    module
        .iter()
        .chain(std::iter::once(ident))
        .map(Ident::to_string)
        .collect::<Vec<_>>()
        .join("::")
}

pub(crate) fn is_pub(vis: &Visibility) -> bool {
    matches!(vis, Visibility::Public(_))
}

fn is_phantom(ty: &Type) -> bool {
    match ty {
        Type::Path(p) => last_ident_is(&p.path, "PhantomData"),
        _ => false,
    }
}

fn generic_names(generics: &Generics) -> Vec<String> {
    generics
        .params
        .iter()
        .map(|param| match param {
            GenericParam::Type(t) => t.ident.to_string(),
            GenericParam::Lifetime(l) => l.lifetime.to_string(),
            GenericParam::Const(c) => c.ident.to_string(),
        })
        .collect()
}
