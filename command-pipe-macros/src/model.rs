use crate::candidate::{Candidate, is_pub};
use crate::capability::CapabilityImpl;
use crate::utils::{last_ident_is, resolve_path};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Ident, Item, ItemMod, parse_quote};

/// 被标注模块（含内联子模块）的结构模型
#[derive(Default)]
pub(crate) struct Model {
    candidates: Vec<(Vec<Ident>, Candidate)>,
    impls: Vec<CapabilityImpl>,
    default_impls: Vec<String>,
}

impl Model {
    pub(crate) fn build(root: &mut ItemMod) -> syn::Result<Self> {
        let mut model = Self::default();
        if let Some((_, items)) = root.content.as_mut() {
            model.collect(items, &mut Vec::new(), true)?;
        }
        for (_, candidate) in model.candidates.iter_mut() {
            if model.default_impls.contains(&candidate.key) {
                candidate.has_default = true;
            }
        }
        Ok(model)
    }

    fn collect(&mut self, items: &mut [Item], module: &mut Vec<Ident>, public: bool) -> syn::Result<()> {
        for item in items.iter_mut() {
            match item {
                Item::Struct(s) => {
                    let candidate = Candidate::from_struct(s, module, public)?;
                    self.candidates.push((module.clone(), candidate));
                }
                Item::Enum(e) => {
                    let candidate = Candidate::from_enum(e, module, public)?;
                    self.candidates.push((module.clone(), candidate));
                }
                Item::Impl(i) => {
                    if let Some(capability) = CapabilityImpl::parse(i, module) {
                        self.impls.push(capability);
                    } else if i.trait_.as_ref().is_some_and(|(_, p, _)| last_ident_is(p, "Default")) {
                        if let Some(target) = default_target(i, module) {
                            self.default_impls.push(target);
                        }
                    }
                }
                Item::Mod(m) => {
                    if let Some((_, nested)) = m.content.as_mut() {
                        module.push(m.ident.clone());
                        let result = self.collect(nested, module, public && is_pub(&m.vis));
                        module.pop();
                        result?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// 某个模块收集函数的主体
    fn collector_body(&self, module: &[Ident], children: &[Ident]) -> TokenStream {
        let types = self
            .candidates
            .iter()
            .filter(|(m, _)| m.as_slice() == module)
            .map(|(_, c)| {
                let path = &c.key;
                let visibility = if c.public {
                    quote! { Public }
                } else {
                    quote! { Restricted }
                };
                let constructible = c.constructible();
                let generics = &c.generics;
                let skip = c.skip;
                quote! {
                    module.push_type(::command_pipe::scan::TypeDescriptor {
                        path: #path,
                        visibility: ::command_pipe::scan::Visibility::#visibility,
                        constructible: #constructible,
                        generics: &[#(#generics),*],
                        skip: #skip,
                    });
                }
            });

        let impls = self
            .impls
            .iter()
            .filter(|i| i.module.as_slice() == module)
            .filter_map(|i| {
                self.candidates
                    .iter()
                    .find(|(_, c)| c.key == i.target)
                    .map(|(_, c)| i.descriptor(c))
            });

        quote! {
            #(#types)*
            #(#impls)*
            #(#children::__command_pipe_collect(module);)*
        }
    }

    /// 在各模块中生成收集函数，根模块生成 `pub fn module()`
    pub(crate) fn emit(&self, root: &mut ItemMod) {
        let Some((_, items)) = root.content.as_mut() else {
            return;
        };

        let body = self.collector_body(&[], &child_modules(items));
        items.push(parse_quote! {
            /// 本模块的扫描描述，交给 `CommandPipeBuilder::scan` 使用
            pub fn module() -> ::command_pipe::scan::ModuleDescriptor {
                let mut descriptor = ::command_pipe::scan::ModuleDescriptor::new(::core::module_path!());
                #[allow(unused_variables)]
                let module = &mut descriptor;
                #body
                descriptor
            }
        });

        self.emit_nested(items, &mut Vec::new());
    }

    fn emit_nested(&self, items: &mut [Item], module: &mut Vec<Ident>) {
        for item in items.iter_mut() {
            let Item::Mod(m) = item else {
                continue;
            };
            let Some((_, nested)) = m.content.as_mut() else {
                continue;
            };

            module.push(m.ident.clone());
            let body = self.collector_body(module, &child_modules(nested));
            nested.push(parse_quote! {
                #[doc(hidden)]
                #[allow(unused_variables)]
                pub(super) fn __command_pipe_collect(module: &mut ::command_pipe::scan::ModuleDescriptor) {
                    #body
                }
            });
            self.emit_nested(nested, module);
            module.pop();
        }
    }
}

fn child_modules(items: &[Item]) -> Vec<Ident> {
    items
        .iter()
        .filter_map(|item| match item {
            Item::Mod(m) if m.content.is_some() => Some(m.ident.clone()),
            _ => None,
        })
        .collect()
}

fn default_target(item: &syn::ItemImpl, module: &[Ident]) -> Option<String> {
    match item.self_ty.as_ref() {
        syn::Type::Path(tp) if tp.qself.is_none() => resolve_path(module, &tp.path),
        _ => None,
    }
}
