use proc_macro2::{TokenStream, TokenTree};
use quote::ToTokens;
use syn::{Attribute, Ident, Path, PathSegment, Token, Type, punctuated::Punctuated};

// 提取 derive 列表中的路径
pub(crate) fn derives(attrs: &[Attribute]) -> Vec<Path> {
    let mut existing = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("derive")) {
        if let Ok(list) = attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated) {
            existing.extend(list);
        }
    }
    existing
}

pub(crate) fn derives_default(attrs: &[Attribute]) -> bool {
    derives(attrs).iter().any(|p| last_ident_is(p, "Default"))
}

pub(crate) fn last_ident_is(path: &Path, name: &str) -> bool {
    path.segments.last().map(|s| s.ident == name).unwrap_or(false)
}

// 取出并移除 `#[scan(skip)]`；其它 `#[scan(..)]` 参数报错
pub(crate) fn take_scan_skip(attrs: &mut Vec<Attribute>) -> syn::Result<bool> {
    let mut skip = false;
    let mut retained = Vec::with_capacity(attrs.len());
    for attr in attrs.drain(..) {
        if !attr.path().is_ident("scan") {
            retained.push(attr);
            continue;
        }
        let arg: Ident = attr.parse_args()?;
        if arg != "skip" {
            return Err(syn::Error::new(arg.span(), "expected `#[scan(skip)]`"));
        }
        skip = true;
    }
    *attrs = retained;
    Ok(skip)
}

// 类型中是否出现了给定的标识符
pub(crate) fn mentions(ty: &Type, idents: &[Ident]) -> bool {
    fn walk(tokens: TokenStream, idents: &[Ident]) -> bool {
        tokens.into_iter().any(|tt| match tt {
            TokenTree::Ident(i) => idents.contains(&i),
            TokenTree::Group(g) => walk(g.stream(), idents),
            _ => false,
        })
    }
    walk(ty.to_token_stream(), idents)
}

// 单个标识符构成的类型（如 `C`）
pub(crate) fn single_ident(ty: &Type) -> Option<&Ident> {
    match ty {
        Type::Path(p) if p.qself.is_none() => p.path.get_ident(),
        _ => None,
    }
}

// 类型的紧凑文本形式
pub(crate) fn type_text(ty: &Type) -> String {
    ty.to_token_stream().to_string().replace(' ', "")
}

// 把模块内书写的类型路径解析为相对扫描根的路径（`a::b::Name`）；越出扫描根时返回 None
pub(crate) fn resolve_path(module: &[Ident], path: &Path) -> Option<String> {
    if path.leading_colon.is_some() {
        return None;
    }

    let mut resolved: Vec<String> = module.iter().map(Ident::to_string).collect();
    let mut segments: Vec<&PathSegment> = path.segments.iter().collect();
    let last = segments.pop()?;

    for segment in segments {
        match segment.ident.to_string().as_str() {
            "self" => {}
            "super" => {
                resolved.pop()?;
            }
            "crate" | "Self" => return None,
            name => resolved.push(name.to_string()),
        }
    }
    resolved.push(last.ident.to_string());

    Some(resolved.join("::"))
}
