// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::{format_ident, quote, ToTokens};
use std::collections::HashSet;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Fields, GenericArgument, LitStr,
    PathArguments, Type,
};

/// How a field stores its value.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// `T`, always present.
    Inline,
    /// `Option<T>`
    Optional,
    /// `Option<Box<T>>`
    Boxed,
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    primary: bool,
    hidden: bool,
    hidden_null: bool,
    skip: bool,
}

struct FieldInfo {
    ident: syn::Ident,
    name: String,
    shape: Shape,
    /// Type the descriptor describes (inner type for `Option` fields).
    value_ty: Type,
    attrs: FieldAttrs,
}

/// `#[derive(Record)]`: generates a static `TypeDescriptor` and the
/// `Reflect`/`Record` impls
///
/// Field types must implement `sqxc::Reflect`: scalars, `String`, `Blob`,
/// `Vec<T>` and other records. `Option<T>` fields are nullable and
/// `Option<Box<T>>` fields are stored out of line. A field may not refer to
/// the struct itself: recursive records are rejected at compile time.
///
/// Attributes:
/// - `#[sqxc(rename = "name")]` on the struct or a field
/// - `#[sqxc(primary)]`, `#[sqxc(hidden)]`, `#[sqxc(hidden_null)]`
/// - `#[sqxc(skip)]` leaves the field out of the descriptor
///
/// Example:
/// ```ignore
/// use sqxc::Record;
///
/// #[derive(Record, Default)]
/// #[sqxc(rename = "users")]
/// struct User {
///     #[sqxc(primary)]
///     id: i64,
///     name: String,
///     manager: Option<Box<User2>>,
///     #[sqxc(skip)]
///     cache: Vec<u8>,
/// }
/// ```
#[proc_macro_derive(Record, attributes(sqxc))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let ident = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(f) => &f.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Only named fields are supported",
                ))
            }
        },
        _ => return Err(syn::Error::new_spanned(input, "Only structs are supported")),
    };

    let type_attrs = parse_attrs(&input.attrs)?;
    let type_name = type_attrs.rename.unwrap_or_else(|| ident.to_string());

    let mut infos = Vec::new();
    let mut seen = HashSet::new();
    for field in fields {
        let Some(field_ident) = field.ident.clone() else {
            return Err(syn::Error::new_spanned(field, "Field must have a name"));
        };
        let attrs = parse_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let name = attrs
            .rename
            .clone()
            .unwrap_or_else(|| field_ident.to_string().trim_start_matches("r#").to_owned());
        if !seen.insert(name.clone()) {
            return Err(syn::Error::new_spanned(
                field,
                format!("duplicate field name '{name}'"),
            ));
        }
        if mentions(field.ty.to_token_stream(), ident) {
            return Err(syn::Error::new_spanned(
                &field.ty,
                format!("field '{name}' refers to `{ident}`: recursive records are not supported"),
            ));
        }
        let (shape, value_ty) = classify(&field.ty);
        infos.push(FieldInfo {
            ident: field_ident,
            name,
            shape,
            value_ty,
            attrs,
        });
    }

    let field_calls: Vec<_> = infos.iter().map(|f| field_tokens(ident, f)).collect();

    Ok(quote! {
        impl ::sqxc::types::Record for #ident {
            fn type_descriptor() -> &'static ::sqxc::types::TypeDescriptor {
                static DESCRIPTOR: ::std::sync::OnceLock<::sqxc::types::TypeDescriptor> =
                    ::std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    ::sqxc::types::TypeDescriptorBuilder::record::<#ident>(#type_name)
                        #(#field_calls)*
                        .build_static()
                })
            }
        }

        impl ::sqxc::types::Reflect for #ident {
            fn type_ref() -> ::sqxc::types::TypeRef {
                ::sqxc::types::TypeRef::from_static(
                    <#ident as ::sqxc::types::Record>::type_descriptor(),
                )
            }
        }
    })
}

/// `.accessor_field(...)` call with its accessor functions.
fn field_tokens(owner: &syn::Ident, f: &FieldInfo) -> proc_macro2::TokenStream {
    let field = &f.ident;
    let name = &f.name;
    let value_ty = &f.value_ty;
    let get_fn = format_ident!("__sqxc_get_{}", field);
    let get_mut_fn = format_ident!("__sqxc_get_mut_{}", field);

    let mut flags = vec![quote!(::sqxc::types::FieldFlags::NONE)];
    match f.shape {
        Shape::Inline => {}
        Shape::Optional => flags.push(quote!(::sqxc::types::FieldFlags::NULLABLE)),
        Shape::Boxed => {
            flags.push(quote!(::sqxc::types::FieldFlags::NULLABLE));
            flags.push(quote!(::sqxc::types::FieldFlags::POINTER));
        }
    }
    for (set, flag) in [
        (f.attrs.primary, "PRIMARY"),
        (f.attrs.hidden, "HIDDEN"),
        (f.attrs.hidden_null, "HIDDEN_NULL"),
    ] {
        if set {
            let flag = syn::Ident::new(flag, Span::call_site());
            flags.push(quote!(::sqxc::types::FieldFlags::#flag));
        }
    }

    let (get_body, get_mut_body) = match f.shape {
        Shape::Inline => (
            quote!(Some(&owner.downcast_ref::<#owner>()?.#field as &dyn ::std::any::Any)),
            quote!(Some(&mut owner.downcast_mut::<#owner>()?.#field as &mut dyn ::std::any::Any)),
        ),
        Shape::Optional => (
            quote!(owner.downcast_ref::<#owner>()?.#field.as_ref().map(|v| v as &dyn ::std::any::Any)),
            quote!(owner.downcast_mut::<#owner>()?.#field.as_mut().map(|v| v as &mut dyn ::std::any::Any)),
        ),
        Shape::Boxed => (
            quote!(owner.downcast_ref::<#owner>()?.#field.as_deref().map(|v| v as &dyn ::std::any::Any)),
            quote!(owner.downcast_mut::<#owner>()?.#field.as_deref_mut().map(|v| v as &mut dyn ::std::any::Any)),
        ),
    };

    let (install, clear) = if f.shape == Shape::Inline {
        (quote!(None), quote!(None))
    } else {
        let install_fn = format_ident!("__sqxc_install_{}", field);
        let clear_fn = format_ident!("__sqxc_clear_{}", field);
        let store = if f.shape == Shape::Boxed {
            quote!(value)
        } else {
            quote!(*value)
        };
        (
            quote!({
                fn #install_fn(
                    owner: &mut dyn ::std::any::Any,
                    value: ::sqxc::types::Instance,
                ) -> bool {
                    let Some(owner) = owner.downcast_mut::<#owner>() else {
                        return false;
                    };
                    match value.downcast::<#value_ty>() {
                        Ok(value) => {
                            owner.#field = Some(#store);
                            true
                        }
                        Err(_) => false,
                    }
                }
                Some(#install_fn as fn(&mut dyn ::std::any::Any, ::sqxc::types::Instance) -> bool)
            }),
            quote!({
                fn #clear_fn(owner: &mut dyn ::std::any::Any) {
                    if let Some(owner) = owner.downcast_mut::<#owner>() {
                        owner.#field = None;
                    }
                }
                Some(#clear_fn as fn(&mut dyn ::std::any::Any))
            }),
        )
    };

    quote! {
        .accessor_field(
            #name,
            <#value_ty as ::sqxc::types::Reflect>::type_ref(),
            ::core::mem::offset_of!(#owner, #field),
            #(#flags)|*,
            {
                fn #get_fn(owner: &dyn ::std::any::Any) -> Option<&dyn ::std::any::Any> {
                    #get_body
                }
                fn #get_mut_fn(owner: &mut dyn ::std::any::Any) -> Option<&mut dyn ::std::any::Any> {
                    #get_mut_body
                }
                ::sqxc::types::FieldAccessor {
                    get: #get_fn,
                    get_mut: #get_mut_fn,
                    install: #install,
                    clear: #clear,
                }
            },
        )
    }
}

fn parse_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut out = FieldAttrs::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("sqxc")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let lit: LitStr = meta.value()?.parse()?;
                out.rename = Some(lit.value());
            } else if meta.path.is_ident("primary") {
                out.primary = true;
            } else if meta.path.is_ident("hidden") {
                out.hidden = true;
            } else if meta.path.is_ident("hidden_null") {
                out.hidden_null = true;
            } else if meta.path.is_ident("skip") {
                out.skip = true;
            } else {
                return Err(meta.error("unsupported sqxc attribute"));
            }
            Ok(())
        })?;
    }
    Ok(out)
}

/// Single generic argument of `Wrapper<T>`.
fn generic_arg<'t>(ty: &'t Type, wrapper: &str) -> Option<&'t Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) if args.args.len() == 1 => Some(inner),
        _ => None,
    }
}

/// `tokens` name `owner` (or `Self`) at any depth.
fn mentions(tokens: proc_macro2::TokenStream, owner: &syn::Ident) -> bool {
    tokens.into_iter().any(|tree| match tree {
        proc_macro2::TokenTree::Ident(ident) => ident == *owner || ident == "Self",
        proc_macro2::TokenTree::Group(group) => mentions(group.stream(), owner),
        _ => false,
    })
}

fn classify(ty: &Type) -> (Shape, Type) {
    match generic_arg(ty, "Option") {
        Some(inner) => match generic_arg(inner, "Box") {
            Some(boxed) => (Shape::Boxed, boxed.clone()),
            None => (Shape::Optional, inner.clone()),
        },
        None => (Shape::Inline, ty.clone()),
    }
}
