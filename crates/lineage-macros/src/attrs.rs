//! Implementation of `lineage_attrs! { ... }`.
//!
//! Parses one or more owner blocks of attribute declarations and generates
//! an inherent `impl` per owner with a getter and a `set_` setter for each
//! declaration (only one of them under `reader` or `writer`). Each attribute is backed by a lazily built
//! `lineage_core::Attribute<T>` resolved against the native provider.

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::meta::ParseNestedMeta;
use syn::parse::{Parse, ParseStream};
use syn::{Attribute, Expr, Ident, Result, Token, Type, Visibility, braced};

/// Which accessor halves are restricted to the owner's module.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Privacy {
    Public,
    Private,
    Reader,
    Writer,
}

/// Which accessors are generated.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Installed {
    Both,
    Reader,
    Writer,
}

enum DefaultValue {
    None,
    Value(Expr),
    Fallible(Expr),
}

struct AttrDecl {
    docs: Vec<Attribute>,
    vis: Visibility,
    name: Ident,
    ty: Type,
    inherit: bool,
    default: DefaultValue,
    privacy: Privacy,
    installed: Installed,
}

impl AttrDecl {
    fn parse_option(&mut self, meta: ParseNestedMeta, seen: &mut Vec<String>) -> Result<()> {
        let Some(option) = meta.path.get_ident().map(ToString::to_string) else {
            return Err(meta.error("expected `inherit`, `default`, `try_default`, `private`, `reader` or `writer`"));
        };
        if seen.contains(&option) {
            return Err(meta.error(format!("`{option}` given more than once")));
        }
        seen.push(option.clone());

        match option.as_str() {
            "inherit" => {
                self.inherit = true;
                Ok(())
            }
            "default" | "try_default" => {
                if !matches!(self.default, DefaultValue::None) {
                    return Err(meta.error("`default` and `try_default` are mutually exclusive"));
                }
                let expr: Expr = meta.value()?.parse()?;
                self.default = if option == "default" {
                    DefaultValue::Value(expr)
                } else {
                    DefaultValue::Fallible(expr)
                };
                Ok(())
            }
            "private" => {
                self.privacy = if meta.input.peek(Token![=]) {
                    let half: Ident = meta.value()?.parse()?;
                    if half == "reader" {
                        Privacy::Reader
                    } else if half == "writer" {
                        Privacy::Writer
                    } else {
                        return Err(syn::Error::new_spanned(
                            half,
                            "expected `private`, `private = reader` or `private = writer`",
                        ));
                    }
                } else {
                    Privacy::Private
                };
                Ok(())
            }
            "reader" | "writer" => {
                if self.installed != Installed::Both {
                    return Err(meta.error("`reader` and `writer` are mutually exclusive"));
                }
                self.installed = if option == "reader" {
                    Installed::Reader
                } else {
                    Installed::Writer
                };
                Ok(())
            }
            _ => Err(meta.error("expected `inherit`, `default`, `try_default`, `private`, `reader` or `writer`")),
        }
    }
}

impl Parse for AttrDecl {
    fn parse(input: ParseStream) -> Result<Self> {
        let attrs = input.call(Attribute::parse_outer)?;
        let vis: Visibility = input.parse()?;
        let name: Ident = input.parse()?;
        input.parse::<Token![:]>()?;
        let ty: Type = input.parse()?;
        input.parse::<Token![;]>()?;

        let mut decl = AttrDecl {
            docs: Vec::new(),
            vis,
            name,
            ty,
            inherit: false,
            default: DefaultValue::None,
            privacy: Privacy::Public,
            installed: Installed::Both,
        };

        let mut seen = Vec::new();
        for attr in attrs {
            if attr.path().is_ident("lineage") {
                attr.parse_nested_meta(|meta| decl.parse_option(meta, &mut seen))?;
            } else if attr.path().is_ident("doc") {
                decl.docs.push(attr);
            } else {
                return Err(syn::Error::new_spanned(
                    attr,
                    "only doc comments and `#[lineage(...)]` are allowed here",
                ));
            }
        }
        Ok(decl)
    }
}

struct OwnerBlock {
    owner: Ident,
    decls: Vec<AttrDecl>,
}

impl Parse for OwnerBlock {
    fn parse(input: ParseStream) -> Result<Self> {
        let owner: Ident = input.parse()?;
        let content;
        braced!(content in input);

        let mut decls: Vec<AttrDecl> = Vec::new();
        while !content.is_empty() {
            let decl: AttrDecl = content.parse()?;
            if decls.iter().any(|d| d.name == decl.name) {
                return Err(syn::Error::new_spanned(
                    &decl.name,
                    format!("`{}` is already declared on `{owner}`", decl.name),
                ));
            }
            decls.push(decl);
        }
        Ok(OwnerBlock { owner, decls })
    }
}

/// Top-level macro input: a sequence of owner blocks.
pub struct AttrsInput {
    blocks: Vec<OwnerBlock>,
}

impl Parse for AttrsInput {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut blocks = Vec::new();
        while !input.is_empty() {
            blocks.push(input.parse()?);
        }
        if blocks.is_empty() {
            return Err(syn::Error::new(
                Span::call_site(),
                "expected at least one `Owner { ... }` block",
            ));
        }
        Ok(AttrsInput { blocks })
    }
}

pub fn expand(input: AttrsInput) -> Result<TokenStream> {
    let impls = input.blocks.iter().map(expand_owner);
    Ok(quote! { #(#impls)* })
}

fn expand_owner(block: &OwnerBlock) -> TokenStream {
    let owner = &block.owner;
    let owner_str = owner.to_string();
    let accessors = block.decls.iter().map(|decl| expand_decl(&owner_str, decl));

    quote! {
        impl #owner {
            #(#accessors)*
        }
    }
}

fn expand_decl(owner: &str, decl: &AttrDecl) -> TokenStream {
    let AttrDecl {
        docs,
        vis,
        name,
        ty,
        inherit,
        default,
        privacy,
        installed,
    } = decl;

    let name_str = name.to_string();
    let handle_fn = format_ident!("{}_attribute", name);
    let setter = format_ident!("set_{}", name);

    let private = Visibility::Inherited;
    let reader_vis = match privacy {
        Privacy::Private | Privacy::Reader => &private,
        _ => vis,
    };
    let writer_vis = match privacy {
        Privacy::Private | Privacy::Writer => &private,
        _ => vis,
    };
    let handle_vis = match (privacy, installed) {
        (Privacy::Public, Installed::Both) => vis,
        _ => &private,
    };

    let with_default = match default {
        DefaultValue::None => quote! {},
        DefaultValue::Value(expr) => quote! { .with_default(|| -> #ty { #expr }) },
        DefaultValue::Fallible(expr) => quote! {
            .with_try_default(|| -> ::core::result::Result<#ty, _> { #expr })
        },
    };

    let getter = match default {
        _ if *installed == Installed::Writer => quote! {},
        DefaultValue::None => quote! {
            #(#docs)*
            #reader_vis fn #name() -> ::core::option::Option<#ty> {
                Self::#handle_fn().get()
            }
        },
        DefaultValue::Value(_) => quote! {
            #(#docs)*
            #reader_vis fn #name() -> #ty {
                match Self::#handle_fn().get() {
                    ::core::option::Option::Some(value) => value,
                    ::core::option::Option::None => {
                        ::core::unreachable!("attribute with a default resolved to nothing")
                    }
                }
            }
        },
        DefaultValue::Fallible(_) => quote! {
            #(#docs)*
            #reader_vis fn #name() -> ::core::result::Result<#ty, ::lineage_core::AttributeError> {
                match Self::#handle_fn().try_get()? {
                    ::core::option::Option::Some(value) => ::core::result::Result::Ok(value),
                    ::core::option::Option::None => {
                        ::core::unreachable!("attribute with a default resolved to nothing")
                    }
                }
            }
        },
    };

    let setter_fn = match installed {
        Installed::Reader => quote! {},
        _ => quote! {
            #writer_vis fn #setter(value: #ty) -> #ty {
                Self::#handle_fn().set(value)
            }
        },
    };

    quote! {
        /// The typed handle backing this attribute's accessors.
        #handle_vis fn #handle_fn() -> &'static ::lineage_core::Attribute<#ty> {
            static ATTRIBUTE: ::lineage_core::__private::Lazy<::lineage_core::Attribute<#ty>> =
                ::lineage_core::__private::Lazy::new(|| {
                    ::lineage_core::Attribute::native(
                        ::core::concat!(::core::module_path!(), "::", #owner),
                        #name_str,
                        ::lineage_core::Policy::new().inherit(#inherit) #with_default,
                    )
                });
            &ATTRIBUTE
        }

        #getter

        #setter_fn
    }
}
